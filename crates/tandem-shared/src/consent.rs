//! The mutual-consent model.
//!
//! Each partner keeps an independent set of per-feature opt-in flags; a
//! feature is *active* only when both partners' flags are true.  The
//! computation is pure and always evaluated fresh — revoking consent takes
//! effect on the very next check, with no caching lag.

use serde::{Deserialize, Serialize};

/// The three consent-gated feature toggles.  Any wire binding must preserve
/// these names exactly.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConsentFeature {
    PhotoSharing,
    MemoryAccess,
    LocationSharing,
}

impl ConsentFeature {
    /// All toggles, in a fixed order.
    pub const ALL: [ConsentFeature; 3] = [
        Self::PhotoSharing,
        Self::MemoryAccess,
        Self::LocationSharing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PhotoSharing => "photo_sharing",
            Self::MemoryAccess => "memory_access",
            Self::LocationSharing => "location_sharing",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "photo_sharing" => Some(Self::PhotoSharing),
            "memory_access" => Some(Self::MemoryAccess),
            "location_sharing" => Some(Self::LocationSharing),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConsentFeature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One partner's half of the consent record.  Flags never default to on.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConsentFlags {
    pub photo_sharing: bool,
    pub memory_access: bool,
    pub location_sharing: bool,
}

impl ConsentFlags {
    pub fn get(&self, feature: ConsentFeature) -> bool {
        match feature {
            ConsentFeature::PhotoSharing => self.photo_sharing,
            ConsentFeature::MemoryAccess => self.memory_access,
            ConsentFeature::LocationSharing => self.location_sharing,
        }
    }

    pub fn set(&mut self, feature: ConsentFeature, value: bool) {
        match feature {
            ConsentFeature::PhotoSharing => self.photo_sharing = value,
            ConsentFeature::MemoryAccess => self.memory_access = value,
            ConsentFeature::LocationSharing => self.location_sharing = value,
        }
    }
}

/// Returns `true` iff both partners have opted in to `feature`.
pub fn is_feature_active(a: &ConsentFlags, b: &ConsentFlags, feature: ConsentFeature) -> bool {
    a.get(feature) && b.get(feature)
}

/// The derived active-feature set: toggles where both partners' flags are
/// true.  Never stored; recomputed on every call.
pub fn active_features(a: &ConsentFlags, b: &ConsentFlags) -> Vec<ConsentFeature> {
    ConsentFeature::ALL
        .into_iter()
        .filter(|f| is_feature_active(a, b, *f))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consent_is_conjunctive() {
        let mut a = ConsentFlags::default();
        let mut b = ConsentFlags::default();

        assert!(!is_feature_active(&a, &b, ConsentFeature::PhotoSharing));

        a.photo_sharing = true;
        assert!(!is_feature_active(&a, &b, ConsentFeature::PhotoSharing));

        b.photo_sharing = true;
        assert!(is_feature_active(&a, &b, ConsentFeature::PhotoSharing));

        // Revocation by either party deactivates immediately.
        a.photo_sharing = false;
        assert!(!is_feature_active(&a, &b, ConsentFeature::PhotoSharing));
    }

    #[test]
    fn test_active_features_set() {
        let a = ConsentFlags {
            photo_sharing: true,
            memory_access: true,
            location_sharing: false,
        };
        let b = ConsentFlags {
            photo_sharing: true,
            memory_access: false,
            location_sharing: true,
        };

        assert_eq!(active_features(&a, &b), vec![ConsentFeature::PhotoSharing]);
    }

    #[test]
    fn test_feature_names_round_trip() {
        for feature in ConsentFeature::ALL {
            assert_eq!(ConsentFeature::parse(feature.as_str()), Some(feature));
        }
        assert_eq!(ConsentFeature::parse("telepathy"), None);
    }
}
