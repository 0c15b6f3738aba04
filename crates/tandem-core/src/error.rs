use thiserror::Error;

use tandem_shared::consent::ConsentFeature;
use tandem_store::StoreError;

/// Domain errors surfaced by the engine.
///
/// Every variant except [`EngineError::Store`] is an expected,
/// recoverable-by-the-caller condition that names the failed precondition.
/// Storage failures are fatal to the request: logged, generic to the caller.
#[derive(Error, Debug)]
pub enum EngineError {
    // -- Conflict family --
    #[error("you are already in a pending or active relationship")]
    AlreadyPaired,

    #[error("that user is already in a relationship")]
    TargetAlreadyPaired,

    #[error("you cannot pair with yourself")]
    SelfPairing,

    #[error("a pairing request between you two is already pending")]
    DuplicateRequest,

    // -- NotFound family --
    #[error("no user matches that pairing code")]
    TargetNotFound,

    #[error("no matching pending pairing request")]
    RequestNotFound,

    #[error("streak photo not found")]
    ItemNotFound,

    // -- InvalidState family --
    #[error("you are not in a relationship")]
    NoActiveRelationship,

    #[error("your relationship is not active")]
    RelationshipNotActive,

    #[error("consent is not configured for this relationship")]
    ConsentNotConfigured,

    // -- Consent gate --
    #[error("both partners must enable {0} first")]
    ConsentRequired(ConsentFeature),

    // -- Limits --
    #[error("streak photo limit reached")]
    ItemLimitReached,

    #[error("you cannot view your own streak photo")]
    CannotViewOwnItem,

    // -- Input --
    #[error("{0}")]
    Validation(String),

    // -- Infrastructure --
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Stable machine-readable label for the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AlreadyPaired
            | Self::TargetAlreadyPaired
            | Self::SelfPairing
            | Self::DuplicateRequest => "conflict",
            Self::TargetNotFound | Self::RequestNotFound | Self::ItemNotFound => "not_found",
            Self::NoActiveRelationship
            | Self::RelationshipNotActive
            | Self::ConsentNotConfigured => "invalid_state",
            Self::ConsentRequired(_) => "consent_required",
            Self::ItemLimitReached => "limit_exceeded",
            Self::CannotViewOwnItem => "forbidden",
            Self::Validation(_) => "validation",
            Self::Store(_) => "internal",
        }
    }

    /// The missing toggle, when the gate denied for lack of consent.
    pub fn missing_feature(&self) -> Option<ConsentFeature> {
        match self {
            Self::ConsentRequired(feature) => Some(*feature),
            _ => None,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EngineError>;
