//! Counters kept by the coordinator and the health monitor.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Smoothing factor for the response time moving average.
pub const RESPONSE_TIME_SMOOTHING: f64 = 0.1;

/// Per-platform request counters.
///
/// Counters only grow; `average_response_time_ms` is an exponential moving
/// average. The only way back to zero is an explicit operator reset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthMetrics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub token_refresh_count: u64,
    pub rate_limit_hits: u64,
    pub average_response_time_ms: f64,
    pub last_request_time: Option<DateTime<Utc>>,
}

impl AuthMetrics {
    /// Record one provider-facing request.
    pub fn record_request(&mut self, success: bool, elapsed: Duration, at: DateTime<Utc>) {
        let sample = elapsed.as_secs_f64() * 1000.0;
        self.average_response_time_ms = if self.total_requests == 0 {
            sample
        } else {
            RESPONSE_TIME_SMOOTHING * sample
                + (1.0 - RESPONSE_TIME_SMOOTHING) * self.average_response_time_ms
        };
        self.total_requests += 1;
        if success {
            self.successful_requests += 1;
        } else {
            self.failed_requests += 1;
        }
        self.last_request_time = Some(at);
    }

    pub fn record_refresh(&mut self) {
        self.token_refresh_count += 1;
    }

    pub fn record_rate_limit(&mut self) {
        self.rate_limit_hits += 1;
    }

    /// Fraction of requests that succeeded, `None` before the first request.
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> Option<f64> {
        (self.total_requests > 0)
            .then(|| self.successful_requests as f64 / self.total_requests as f64)
    }
}

/// Rolling counters kept by the health monitor.
///
/// `healthy`, `expired` and `expiring` describe the most recent check;
/// refresh counters accumulate across checks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorMetrics {
    pub total_checks: u64,
    pub healthy: usize,
    pub expired: usize,
    pub expiring: usize,
    pub successful_refreshes: u64,
    pub failed_refreshes: u64,
    pub last_check: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Validates the moving average and counters.
    ///
    /// Assertions:
    /// - The first sample seeds the average.
    /// - Later samples move it by the smoothing factor.
    /// - Success and failure counters split the total.
    #[test]
    fn test_record_request_smooths_response_time() {
        let mut metrics = AuthMetrics::default();
        let at = Utc::now();

        metrics.record_request(true, Duration::from_millis(100), at);
        assert!((metrics.average_response_time_ms - 100.0).abs() < 1e-9);

        metrics.record_request(false, Duration::from_millis(200), at);
        assert!((metrics.average_response_time_ms - 110.0).abs() < 1e-9);

        assert_eq!(metrics.total_requests, 2);
        assert_eq!(metrics.successful_requests, 1);
        assert_eq!(metrics.failed_requests, 1);
        assert_eq!(metrics.last_request_time, Some(at));
        assert_eq!(metrics.success_rate(), Some(0.5));
    }

    #[test]
    fn test_success_rate_empty() {
        assert_eq!(AuthMetrics::default().success_rate(), None);
    }
}
