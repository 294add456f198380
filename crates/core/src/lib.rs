//! # Tokenwarden Core
//!
//! Token lifecycle logic - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port interfaces for token storage and provider adapters
//! - The auth coordinator (refresh deduplication, circuit gating, retries)
//! - The background token health monitor
//!
//! ## Architecture Principles
//! - Only depends on `tokenwarden-common` and `tokenwarden-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits

pub mod auth;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use auth::{
    AdapterRegistry, AuthCoordinator, AuthCoordinatorBuilder, AuthObserver, CoordinatorConfig,
    HealthCheckOutcome, MonitorConfig, MonitorError, NoopObserver, PlatformAdapter,
    TokenHealthMonitor, TokenStore,
};
