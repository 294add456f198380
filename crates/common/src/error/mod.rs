//! Shared error classification primitives.
//!
//! Module-specific errors stay in their own crates; this module only provides
//! the vocabulary the resilience layer needs to reason about them:
//!
//! 1. **`ErrorClassification` trait**: a standard interface for classifying
//!    errors by retryability, severity and provider-supplied retry hints.
//! 2. **`ErrorSeverity` enum**: a unified severity level for logging and
//!    alerting decisions.
//! 3. **`ConfigError`**: the validation error returned by configuration
//!    builders across the workspace.
//!
//! ```rust
//! use std::time::Duration;
//!
//! use tokenwarden_common::error::{ErrorClassification, ErrorSeverity};
//!
//! #[derive(Debug)]
//! struct Throttled(u64);
//!
//! impl ErrorClassification for Throttled {
//!     fn is_retryable(&self) -> bool {
//!         true
//!     }
//!
//!     fn severity(&self) -> ErrorSeverity {
//!         ErrorSeverity::Warning
//!     }
//!
//!     fn retry_after(&self) -> Option<Duration> {
//!         Some(Duration::from_secs(self.0))
//!     }
//! }
//!
//! let err = Throttled(30);
//! assert!(err.is_retryable());
//! assert!(!err.is_critical());
//! ```

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Standard interface for classifying errors.
pub trait ErrorClassification {
    /// Whether another attempt may succeed: timeouts, throttling, provider
    /// 5xx. The retry executor stops on the first `false`.
    fn is_retryable(&self) -> bool;

    fn severity(&self) -> ErrorSeverity;

    fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }

    /// Minimum wait requested by the remote side, usually from `Retry-After`.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    /// Expected during normal operation, e.g. an expired token about to be refreshed.
    Info,
    /// Transient trouble that retries usually absorb.
    Warning,
    Error,
    /// Needs an operator, e.g. rejected app credentials.
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "INFO",
            Self::Warning => "WARN",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        })
    }
}

/// Validation error returned by configuration builders.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A field holds a value outside its accepted range.
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

impl ConfigError {
    /// Shorthand for [`ConfigError::Invalid`].
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid { message: message.into() }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
