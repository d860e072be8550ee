//! Remote source: the FRED REST API.

pub mod api_types;
mod client;

pub use client::{FredClient, FRED_URL, REQUEST_TIMEOUT_SECS};
