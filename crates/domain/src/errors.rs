//! Error types used throughout the token lifecycle

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokenwarden_common::error::{ErrorClassification, ErrorSeverity};

use crate::impl_domain_str_conversions;
use crate::types::{Platform, TokenError};

/// Failure taxonomy shared by adapters, the coordinator and the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthErrorKind {
    /// Terminal until an operator fixes configuration or re-authorizes.
    InvalidCredentials,
    /// Recoverable through a refresh.
    TokenExpired,
    /// Recoverable after the provider's delay.
    RateLimited,
    InsufficientPermissions,
    NetworkError,
    /// Provider 5xx or anything unclassified.
    PlatformError,
}

impl_domain_str_conversions!(AuthErrorKind {
    InvalidCredentials => "invalid_credentials",
    TokenExpired => "token_expired",
    RateLimited => "rate_limited",
    InsufficientPermissions => "insufficient_permissions",
    NetworkError => "network_error",
    PlatformError => "platform_error",
});

/// Authentication failure for one platform, typed by [`AuthErrorKind`].
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub struct AuthError {
    pub kind: AuthErrorKind,
    pub platform: Platform,
    pub message: String,
    /// HTTP status returned by the provider, when there was one.
    pub status: Option<u16>,
    /// Provider-supplied wait before retrying.
    pub retry_after: Option<Duration>,
    /// Raised by an open circuit breaker without contacting the provider.
    pub circuit_open: bool,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.kind, self.platform, self.message)?;
        if let Some(status) = self.status {
            write!(f, " [HTTP {status}]")?;
        }
        Ok(())
    }
}

impl AuthError {
    pub fn new(kind: AuthErrorKind, platform: Platform, message: impl Into<String>) -> Self {
        Self {
            kind,
            platform,
            message: message.into(),
            status: None,
            retry_after: None,
            circuit_open: false,
        }
    }

    pub fn invalid_credentials(platform: Platform, message: impl Into<String>) -> Self {
        Self::new(AuthErrorKind::InvalidCredentials, platform, message)
    }

    pub fn token_expired(platform: Platform, message: impl Into<String>) -> Self {
        Self::new(AuthErrorKind::TokenExpired, platform, message)
    }

    pub fn rate_limited(platform: Platform, retry_after: Option<Duration>) -> Self {
        let mut err = Self::new(AuthErrorKind::RateLimited, platform, "rate limit exceeded");
        err.retry_after = retry_after;
        err
    }

    pub fn insufficient_permissions(platform: Platform, message: impl Into<String>) -> Self {
        Self::new(AuthErrorKind::InsufficientPermissions, platform, message)
    }

    pub fn network(platform: Platform, message: impl Into<String>) -> Self {
        Self::new(AuthErrorKind::NetworkError, platform, message)
    }

    pub fn platform_error(platform: Platform, message: impl Into<String>) -> Self {
        Self::new(AuthErrorKind::PlatformError, platform, message)
    }

    /// Synthetic failure for calls rejected by an open circuit.
    pub fn circuit_open(platform: Platform) -> Self {
        let mut err =
            Self::platform_error(platform, "circuit breaker open, provider temporarily disabled");
        err.circuit_open = true;
        err
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    pub fn is_kind(&self, kind: AuthErrorKind) -> bool {
        self.kind == kind
    }
}

impl ErrorClassification for AuthError {
    fn is_retryable(&self) -> bool {
        if self.circuit_open {
            return false;
        }
        match self.kind {
            AuthErrorKind::RateLimited
            | AuthErrorKind::NetworkError
            | AuthErrorKind::PlatformError => true,
            AuthErrorKind::InvalidCredentials
            | AuthErrorKind::TokenExpired
            | AuthErrorKind::InsufficientPermissions => false,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self.kind {
            AuthErrorKind::InvalidCredentials => ErrorSeverity::Critical,
            AuthErrorKind::InsufficientPermissions | AuthErrorKind::PlatformError => {
                ErrorSeverity::Error
            }
            AuthErrorKind::RateLimited | AuthErrorKind::NetworkError => ErrorSeverity::Warning,
            AuthErrorKind::TokenExpired => ErrorSeverity::Info,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        Self::platform_error(err.platform(), err.to_string())
    }
}

/// Token store failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("no token stored for {platform}")]
    NotFound { platform: Platform },

    #[error("token store backend error: {message}")]
    Backend { message: String },
}

impl StoreError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend { message: message.into() }
    }

    /// Store failures reach callers as unclassified platform errors.
    pub fn into_auth_error(self, platform: Platform) -> AuthError {
        AuthError::platform_error(platform, self.to_string())
    }
}

/// Result type alias for token lifecycle operations
pub type Result<T, E = AuthError> = std::result::Result<T, E>;
