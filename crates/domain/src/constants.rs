//! Domain-level defaults
//!
//! Centralized location for the default tuning values used by configuration.

// Health monitor
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 5 * 60;
pub const DEFAULT_MONITOR_REFRESH_THRESHOLD_SECS: u64 = 10 * 60;
pub const DEFAULT_MAX_CONCURRENT_REFRESHES: usize = 3;
pub const DEFAULT_WARNING_BEFORE_EXPIRY_SECS: u64 = 30 * 60;
pub const DEFAULT_CRITICAL_BEFORE_EXPIRY_SECS: u64 = 10 * 60;
pub const DEFAULT_RETRY_FAILED_AFTER_SECS: u64 = 15 * 60;
pub const DEFAULT_ALERT_HISTORY: usize = 100;

// Circuit breaker
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
pub const DEFAULT_RECOVERY_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_SUCCESS_THRESHOLD: u32 = 1;

// Coordinator
pub const DEFAULT_COORDINATOR_REFRESH_THRESHOLD_SECS: u64 = 5 * 60;

// Provider HTTP
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_USER_AGENT: &str = concat!("tokenwarden/", env!("CARGO_PKG_VERSION"));

/// Lifetime of the placeholder token issued for platforms without auth.
pub const NO_AUTH_TOKEN_LIFETIME_SECS: u64 = 365 * 24 * 60 * 60;
