//! # tandem-shared
//!
//! Pure domain vocabulary for the tandem backend: lifecycle enums, the
//! mutual-consent model, streak day-math, pairing-code generation, and
//! domain constants.  No I/O lives here; everything is unit-testable in
//! isolation.

pub mod constants;
pub mod consent;
pub mod pairing_code;
pub mod streak;
pub mod types;
