//! The [`Engine`] handle.
//!
//! One engine per process, cheaply cloneable.  The database sits behind an
//! `Arc<tokio::sync::Mutex<_>>`: every operation acquires the lock (the
//! request's suspension point) and runs its reads and writes while holding
//! it, so multi-step transitions never interleave with other requests.
//! Cross-entity transitions are additionally single SQLite transactions in
//! the store layer.

use std::sync::Arc;

use tokio::sync::Mutex;

use tandem_store::Database;

/// The transport-agnostic core: pairing state machine, consent ledger and
/// gate, ephemeral content store.  Operations are defined in the per-domain
/// modules ([`crate::pairing`], [`crate::consent`], [`crate::gate`],
/// [`crate::ephemeral`]).
#[derive(Clone)]
pub struct Engine {
    db: Arc<Mutex<Database>>,
}

impl Engine {
    /// Wrap an open database handle.
    pub fn new(db: Arc<Mutex<Database>>) -> Self {
        Self { db }
    }

    /// The shared database handle (same lock the engine uses).
    pub fn db(&self) -> &Arc<Mutex<Database>> {
        &self.db
    }

    pub(crate) async fn lock(&self) -> tokio::sync::MutexGuard<'_, Database> {
        self.db.lock().await
    }
}
