//! HTTP route handlers, one module per feature surface.

pub mod account;
pub mod buzzes;
pub mod calendar;
pub mod chat;
pub mod consent;
pub mod location;
pub mod memories;
pub mod mood;
pub mod pairing;
pub mod streaks;
