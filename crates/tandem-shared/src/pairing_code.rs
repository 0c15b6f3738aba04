//! Human-shareable pairing codes.
//!
//! A pairing code is what one partner reads to the other so the second can
//! send a pairing request.  Codes are short, case-insensitive, and drawn
//! from an alphabet without visually ambiguous characters.

use rand::Rng;

use crate::constants::{PAIRING_CODE_ALPHABET, PAIRING_CODE_LEN};

/// Generate a fresh random pairing code.
///
/// Uniqueness is enforced by the storage layer; callers retry on collision.
pub fn generate() -> String {
    let mut rng = rand::thread_rng();
    (0..PAIRING_CODE_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..PAIRING_CODE_ALPHABET.len());
            PAIRING_CODE_ALPHABET[idx] as char
        })
        .collect()
}

/// Normalize user input: uppercase, with spaces and hyphens stripped
/// (people often type `ABCD-2345` or `abcd 2345`).
pub fn normalize(input: &str) -> String {
    input
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Returns `true` if `code` has the right length and alphabet.
pub fn is_valid(code: &str) -> bool {
    code.len() == PAIRING_CODE_LEN
        && code.bytes().all(|b| PAIRING_CODE_ALPHABET.contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_codes_are_valid() {
        for _ in 0..100 {
            let code = generate();
            assert!(is_valid(&code), "invalid code generated: {code}");
        }
    }

    #[test]
    fn test_normalize_handles_common_input() {
        assert_eq!(normalize("abcd-2345"), "ABCD2345");
        assert_eq!(normalize("  AbCd 2345 "), "ABCD2345");
    }

    #[test]
    fn test_ambiguous_characters_rejected() {
        assert!(!is_valid("ABCD234O")); // letter O
        assert!(!is_valid("ABCD2340")); // digit 0
        assert!(!is_valid("ABCD234I"));
        assert!(!is_valid("ABCD2341"));
    }

    #[test]
    fn test_wrong_length_rejected() {
        assert!(!is_valid("ABC"));
        assert!(!is_valid("ABCD23456"));
    }
}
