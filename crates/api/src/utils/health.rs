//! Aggregate health view over every managed platform.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokenwarden_domain::{Platform, TokenHealthReport, TokenStatus};

/// Share of healthy platforms required for an overall healthy status.
pub const HEALTHY_SCORE_THRESHOLD: f64 = 0.8;

/// Overall token health, one entry per platform with a report.
///
/// # Example
/// ```no_run
/// use chrono::Utc;
/// use tokenwarden_app::utils::health::HealthStatus;
///
/// let status = HealthStatus::from_reports(&[], Utc::now());
/// assert!(status.is_healthy);
/// assert_eq!(status.score, 1.0);
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub is_healthy: bool,
    /// Healthy platforms divided by reported platforms.
    pub score: f64,
    pub message: Option<String>,
    pub platforms: Vec<PlatformHealth>,
    pub checked_at: DateTime<Utc>,
}

impl HealthStatus {
    /// Score the reports taken at `checked_at`. No reports counts as healthy.
    pub fn from_reports(reports: &[TokenHealthReport], checked_at: DateTime<Utc>) -> Self {
        let platforms: Vec<PlatformHealth> = reports.iter().map(PlatformHealth::from).collect();
        let healthy = platforms.iter().filter(|p| p.is_healthy).count();

        #[allow(clippy::cast_precision_loss)]
        let score = if platforms.is_empty() { 1.0 } else { healthy as f64 / platforms.len() as f64 };

        let message = (healthy < platforms.len())
            .then(|| format!("{} of {} platforms degraded", platforms.len() - healthy, platforms.len()));

        Self {
            is_healthy: score >= HEALTHY_SCORE_THRESHOLD,
            score,
            message,
            platforms,
            checked_at,
        }
    }

    /// Status for a check that could not run at all.
    pub fn unhealthy(message: impl Into<String>, checked_at: DateTime<Utc>) -> Self {
        Self {
            is_healthy: false,
            score: 0.0,
            message: Some(message.into()),
            platforms: Vec::new(),
            checked_at,
        }
    }

    pub fn platform(&self, platform: Platform) -> Option<&PlatformHealth> {
        self.platforms.iter().find(|p| p.platform == platform)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlatformHealth {
    pub platform: Platform,
    pub status: TokenStatus,
    pub is_healthy: bool,
    pub circuit_open: bool,
    /// Report errors joined, or the status when there are none.
    pub message: Option<String>,
}

impl From<&TokenHealthReport> for PlatformHealth {
    fn from(report: &TokenHealthReport) -> Self {
        let is_healthy = report.is_healthy();
        let message = if is_healthy {
            None
        } else if report.errors.is_empty() {
            Some(format!("token {}", report.status))
        } else {
            Some(report.errors.join("; "))
        };

        Self {
            platform: report.platform,
            status: report.status,
            is_healthy,
            circuit_open: report.circuit_open,
            message,
        }
    }
}
