//! # tandem-core
//!
//! The transport-agnostic engine of the tandem backend: the pairing state
//! machine, the mutual-consent ledger and its authorization gate, and the
//! ephemeral content store for streak photos.
//!
//! All operations live on [`Engine`], which holds the database behind an
//! async lock; the HTTP layer in `tandem-server` is a thin binding over it.

pub mod consent;
pub mod engine;
pub mod ephemeral;
pub mod gate;
pub mod pairing;

mod error;

#[cfg(test)]
pub(crate) mod testutil;

pub use engine::Engine;
pub use error::EngineError;
pub use gate::FeatureGrant;
