//! Local cache and category tree for the FRED economic data API.
//!
//! [`sync::SyncOrchestrator`] answers requests for categories, series and
//! observations from a SQLite cache ([`db::LocalStore`]) and falls back to the
//! remote API ([`fred::FredClient`]) on a miss or when the cached copy is
//! stale. [`tree::CategoryTree`] turns the flat category lists it returns back
//! into a navigable hierarchy.

pub mod config;
pub mod db;
pub mod error;
pub mod fred;
pub mod model;
pub mod source;
pub mod sync;
pub mod tree;

pub use error::{Error, Result};
