//! # Tokenwarden Infrastructure
//!
//! Infrastructure implementations of core token lifecycle ports.
//!
//! This crate contains:
//! - Token stores (in-memory and JSON file)
//! - OAuth 2.0 provider adapters and their endpoint profiles
//! - The outbound HTTP client and provider error mapping
//! - Configuration loading from files and the environment
//!
//! ## Architecture
//! - Implements traits defined in `tokenwarden-core`
//! - Depends on `tokenwarden-common`, `tokenwarden-domain` and `tokenwarden-core`
//! - Contains all "impure" code (file system, network)

pub mod adapters;
pub mod config;
pub mod errors;
pub mod http;
pub mod storage;

// Re-export commonly used items
pub use adapters::{default_registry, NoAuthAdapter, OAuth2PlatformAdapter, ProviderProfile};
pub use http::HttpClient;
pub use storage::{open_store, FileTokenStore, InMemoryTokenStore};
