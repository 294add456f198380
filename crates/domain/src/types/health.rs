//! Derived health views, alerts and batch outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Platform;
use crate::errors::AuthError;
use crate::impl_domain_str_conversions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStatus {
    Valid,
    Expired,
    Revoked,
    Invalid,
}

impl_domain_str_conversions!(TokenStatus {
    Valid => "valid",
    Expired => "expired",
    Revoked => "revoked",
    Invalid => "invalid",
});

/// Point-in-time summary of one platform's token. Recomputed on demand and
/// never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenHealthReport {
    pub platform: Platform,
    pub status: TokenStatus,
    /// Seconds until expiry, clamped at zero.
    pub time_until_expiry: u64,
    pub expires_at: Option<DateTime<Utc>>,
    pub refresh_count: u64,
    pub circuit_open: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl TokenHealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == TokenStatus::Valid && self.errors.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

impl_domain_str_conversions!(AlertSeverity {
    Warning => "warning",
    Critical => "critical",
});

/// Expiry alert raised by the health monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthAlert {
    pub id: Uuid,
    pub severity: AlertSeverity,
    pub platform: Platform,
    pub message: String,
    pub time_until_expiry: u64,
    pub raised_at: DateTime<Utc>,
}

impl HealthAlert {
    pub fn new(
        severity: AlertSeverity,
        platform: Platform,
        message: impl Into<String>,
        time_until_expiry: u64,
        raised_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            severity,
            platform,
            message: message.into(),
            time_until_expiry,
            raised_at,
        }
    }
}

/// A platform whose refresh failed inside a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshFailure {
    pub platform: Platform,
    pub error: AuthError,
}

/// Outcome of refreshing several platforms independently.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchRefreshResult {
    pub successful: Vec<Platform>,
    pub failed: Vec<RefreshFailure>,
    pub total_processed: usize,
}

impl BatchRefreshResult {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_platforms(&self) -> Vec<Platform> {
        self.failed.iter().map(|f| f.platform).collect()
    }
}
