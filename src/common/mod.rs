//! Common types and utilities shared across the crate.
//!
//! This module contains fundamental primitives used throughout the codebase:
//! - Configuration constants and [`TreeConfig`]
//! - Error types
//! - Block identifiers ([`Address`])

mod address;
pub mod config;
pub mod error;

pub use address::Address;
pub use config::TreeConfig;
pub use error::{Error, Result};
