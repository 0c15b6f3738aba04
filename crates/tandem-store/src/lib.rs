//! # tandem-store
//!
//! SQLite persistence for the tandem backend, backed by rusqlite.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD helpers for every domain
//! model, plus the multi-entity lifecycle transitions (accept, reject,
//! dissolve, photo submission) expressed as single SQLite transactions.

pub mod buzzes;
pub mod calendar;
pub mod chat;
pub mod consent;
pub mod couples;
pub mod database;
pub mod locations;
pub mod memories;
pub mod migrations;
pub mod models;
pub mod sessions;
pub mod streaks;
pub mod users;

mod error;
mod sql;

#[cfg(test)]
pub(crate) mod testutil;

pub use database::Database;
pub use error::StoreError;
pub use models::*;
