//! Miner statistics retrieval from the Ethermine JSON API.
//!
//! - `rest` - HTTP client and response parsing
//! - `error` - `FetchError` and its user-facing reason text

pub mod error;
pub mod rest;

pub use error::*;
pub use rest::*;
