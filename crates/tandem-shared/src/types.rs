use serde::{Deserialize, Serialize};

/// Lifecycle state of a couple.  `Dissolved` is terminal: a new pairing
/// between the same two people requires a brand-new couple.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CoupleState {
    Pending,
    Active,
    Dissolved,
}

impl CoupleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Dissolved => "dissolved",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "active" => Some(Self::Active),
            "dissolved" => Some(Self::Dissolved),
            _ => None,
        }
    }
}

/// Status of the pairing-request sub-record embedded in a couple.
/// Immutable once `Accepted` or `Rejected`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// A user's own view of their relationship state.
///
/// Invariant: `Paired` iff the user's `couple_id` references an `active`
/// couple.  Readers reconcile defensively when the two disagree.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipStatus {
    Single,
    Paired,
}

impl RelationshipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Paired => "paired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "single" => Some(Self::Single),
            "paired" => Some(Self::Paired),
            _ => None,
        }
    }
}

/// Soft-delete lifecycle of a shared memory.  Queries default to `Active`;
/// dissolution moves active rows to `Archived`, never deletes them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MemoryStatus {
    Active,
    Archived,
    Deleted,
}

impl MemoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Archived => "archived",
            Self::Deleted => "deleted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "archived" => Some(Self::Archived),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_couple_state_round_trip() {
        for state in [CoupleState::Pending, CoupleState::Active, CoupleState::Dissolved] {
            assert_eq!(CoupleState::parse(state.as_str()), Some(state));
        }
        assert_eq!(CoupleState::parse("divorced"), None);
    }

    #[test]
    fn test_request_status_round_trip() {
        for status in [
            RequestStatus::Pending,
            RequestStatus::Accepted,
            RequestStatus::Rejected,
        ] {
            assert_eq!(RequestStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn test_memory_status_round_trip() {
        for status in [MemoryStatus::Active, MemoryStatus::Archived, MemoryStatus::Deleted] {
            assert_eq!(MemoryStatus::parse(status.as_str()), Some(status));
        }
    }
}
