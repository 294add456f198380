//! # Tokenwarden App
//!
//! Composition root and command-line entry point.
//!
//! This crate contains:
//! - Application context (dependency injection)
//! - CLI commands over the auth coordinator
//! - Logging setup and the aggregate health view
//!
//! ## Architecture
//! - Depends on `common`, `domain`, `core`, and `infra`
//! - Wires up the hexagonal architecture

pub mod commands;
pub mod context;
pub mod utils;

// Re-export for convenience
pub use commands::{execute, Cli, Command};
pub use context::{AppContext, ContextError};
