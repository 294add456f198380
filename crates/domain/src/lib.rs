//! # Tokenwarden Domain
//!
//! Domain types for the OAuth token lifecycle.
//!
//! This crate contains:
//! - Platform identifiers, tokens and app credentials
//! - The authentication error taxonomy and Result definitions
//! - Health reports, alerts and metrics
//! - Configuration structures and their defaults
//!
//! ## Architecture
//! - Depends only on the foundation tier of `tokenwarden-common`
//! - No I/O, no async runtime, no logging

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
