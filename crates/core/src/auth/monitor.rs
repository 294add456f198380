//! Token health monitor
//!
//! Background scheduler that periodically asks the coordinator for health
//! reports, raises expiry alerts and proactively refreshes tokens nearing
//! expiry in bounded batches.
//!
//! Stopping the monitor only ends the scheduling of new checks. A check that
//! is already running completes, and refreshes it started are not aborted.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use thiserror::Error;
use tokenwarden_common::collections::RingBuffer;
use tokenwarden_common::error::{ConfigError, ConfigResult};
use tokenwarden_common::time::Clock;
use tokenwarden_domain::{
    AlertSeverity, AuthToken, BatchRefreshResult, HealthAlert, MonitorMetrics, MonitorSettings,
    Platform, Result, StoreError, TokenHealthReport, TokenStatus,
};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::coordinator::AuthCoordinator;

const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Monitor lifecycle errors
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("health monitor did not stop within {duration:?}")]
    Timeout {
        duration: Duration,
        #[source]
        source: tokio::time::error::Elapsed,
    },

    #[error("health monitor task failed: {0}")]
    TaskJoinFailed(#[from] tokio::task::JoinError),
}

/// Monitor tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    pub check_interval: Duration,
    /// Remaining lifetime at or below which a token is refreshed proactively.
    pub refresh_threshold: Duration,
    pub max_concurrent_refreshes: usize,
    pub warning_before_expiry: Duration,
    pub critical_before_expiry: Duration,
    /// Cool-down before a platform whose refresh failed is retried.
    pub retry_failed_refresh_after: Duration,
    pub alert_history: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::from(&MonitorSettings::default())
    }
}

impl From<&MonitorSettings> for MonitorConfig {
    fn from(settings: &MonitorSettings) -> Self {
        Self {
            check_interval: settings.check_interval(),
            refresh_threshold: settings.refresh_threshold(),
            max_concurrent_refreshes: settings.max_concurrent_refreshes,
            warning_before_expiry: settings.warning_before_expiry(),
            critical_before_expiry: settings.critical_before_expiry(),
            retry_failed_refresh_after: settings.retry_failed_refresh_after(),
            alert_history: settings.alert_history,
        }
    }
}

impl MonitorConfig {
    pub fn from_settings(settings: &MonitorSettings) -> ConfigResult<Self> {
        let config = Self::from(settings);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.check_interval.is_zero() {
            return Err(ConfigError::invalid("check_interval must be greater than 0"));
        }
        if self.max_concurrent_refreshes == 0 {
            return Err(ConfigError::invalid("max_concurrent_refreshes must be greater than 0"));
        }
        if self.critical_before_expiry >= self.warning_before_expiry {
            return Err(ConfigError::invalid(
                "critical_before_expiry must be below warning_before_expiry",
            ));
        }
        Ok(())
    }
}

/// Result of one health check.
#[derive(Debug, Clone, Default)]
pub struct HealthCheckOutcome {
    pub reports: Vec<TokenHealthReport>,
    pub alerts: Vec<HealthAlert>,
    pub refreshed: BatchRefreshResult,
}

struct MonitorInner {
    coordinator: AuthCoordinator,
    config: MonitorConfig,
    alerts: Mutex<RingBuffer<HealthAlert>>,
    metrics: Mutex<MonitorMetrics>,
    failed_at: Mutex<HashMap<Platform, DateTime<Utc>>>,
}

struct MonitorTask {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

/// Periodic health checker driving proactive refresh.
pub struct TokenHealthMonitor {
    inner: Arc<MonitorInner>,
    task: Mutex<MonitorTask>,
}

impl TokenHealthMonitor {
    pub fn new(coordinator: AuthCoordinator, config: MonitorConfig) -> ConfigResult<Self> {
        config.validate()?;
        let alerts = RingBuffer::new(config.alert_history);
        Ok(Self {
            inner: Arc::new(MonitorInner {
                coordinator,
                config,
                alerts: Mutex::new(alerts),
                metrics: Mutex::new(MonitorMetrics::default()),
                failed_at: Mutex::new(HashMap::new()),
            }),
            task: Mutex::new(MonitorTask { cancel: CancellationToken::new(), handle: None }),
        })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.inner.config
    }

    /// Spawn the check loop on the current Tokio runtime.
    ///
    /// The first check runs immediately. Calling `start` while running logs a
    /// warning and does nothing.
    #[instrument(skip(self))]
    pub fn start(&self) {
        let mut task = self.task.lock();
        if task.handle.as_ref().is_some_and(|h| !h.is_finished()) {
            warn!("Token health monitor already running");
            return;
        }

        // Fresh token so the monitor can be restarted after stop
        let cancel = CancellationToken::new();
        task.cancel = cancel.clone();

        let inner = Arc::clone(&self.inner);
        task.handle = Some(tokio::spawn(async move { inner.run_loop(cancel).await }));

        info!(
            interval_secs = self.inner.config.check_interval.as_secs(),
            max_concurrent = self.inner.config.max_concurrent_refreshes,
            "Token health monitor started"
        );
    }

    /// Cancel the check loop and wait for it to exit. Stopping a monitor that
    /// is not running is a no-op.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> Result<(), MonitorError> {
        let handle = {
            let mut task = self.task.lock();
            task.cancel.cancel();
            task.handle.take()
        };

        let Some(handle) = handle else {
            debug!("Token health monitor not running");
            return Ok(());
        };

        tokio::time::timeout(STOP_TIMEOUT, handle)
            .await
            .map_err(|source| MonitorError::Timeout { duration: STOP_TIMEOUT, source })??;

        info!("Token health monitor stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Run one check now, independent of the schedule.
    pub async fn run_health_check(&self) -> Result<HealthCheckOutcome, StoreError> {
        self.inner.run_check().await
    }

    /// Refresh one platform now, ignoring the failure cool-down.
    #[instrument(skip(self), fields(platform = %platform))]
    pub async fn force_refresh(&self, platform: Platform) -> Result<AuthToken> {
        let outcome = self.inner.coordinator.refresh_token(platform, None).await;
        let now = self.inner.coordinator.clock().utc_now();
        self.inner.record_refresh(platform, outcome.is_ok(), now);
        outcome
    }

    /// Refresh every stored token now, in bounded batches.
    pub async fn force_refresh_all(&self) -> Result<BatchRefreshResult, StoreError> {
        let platforms: Vec<Platform> = self
            .inner
            .coordinator
            .get_token_health_report()
            .await?
            .into_iter()
            .filter(|r| r.expires_at.is_some())
            .map(|r| r.platform)
            .collect();
        info!(count = platforms.len(), "Forcing refresh of all tokens");
        Ok(self.inner.refresh_in_batches(&platforms).await)
    }

    /// Most recent alerts, newest first.
    pub fn recent_alerts(&self, n: usize) -> Vec<HealthAlert> {
        self.inner.alerts.lock().recent(n).into_iter().cloned().collect()
    }

    pub fn metrics(&self) -> MonitorMetrics {
        self.inner.metrics.lock().clone()
    }
}

impl Drop for TokenHealthMonitor {
    fn drop(&mut self) {
        let task = self.task.get_mut();
        if task.handle.as_ref().is_some_and(|h| !h.is_finished()) {
            warn!("TokenHealthMonitor dropped while running; cancelling");
            task.cancel.cancel();
        }
    }
}

impl MonitorInner {
    async fn run_loop(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.check_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Health check loop cancelled");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(err) = self.run_check().await {
                        warn!(error = %err, "Scheduled health check failed");
                        self.coordinator.observer().on_check_failed(&err);
                    }
                }
            }
        }
    }

    async fn run_check(&self) -> Result<HealthCheckOutcome, StoreError> {
        let reports = self.coordinator.get_token_health_report().await?;
        let now = self.coordinator.clock().utc_now();

        let alerts: Vec<HealthAlert> =
            reports.iter().filter_map(|report| self.alert_for(report, now)).collect();
        for alert in &alerts {
            self.emit(alert);
        }

        let due = self.refresh_candidates(&reports, now);
        let refreshed = self.refresh_in_batches(&due).await;

        let snapshot = {
            let warning = self.config.warning_before_expiry.as_secs();
            let mut metrics = self.metrics.lock();
            metrics.total_checks += 1;
            metrics.last_check = Some(now);
            metrics.expired = reports.iter().filter(|r| r.status == TokenStatus::Expired).count();
            metrics.expiring = reports
                .iter()
                .filter(|r| r.status == TokenStatus::Valid && r.time_until_expiry <= warning)
                .count();
            metrics.healthy = reports
                .iter()
                .filter(|r| r.status == TokenStatus::Valid && r.time_until_expiry > warning)
                .count();
            metrics.clone()
        };
        log_metric("monitor.checks", snapshot.total_checks);
        log_metric("monitor.tokens.expiring", snapshot.expiring as u64);
        log_metric("monitor.tokens.expired", snapshot.expired as u64);
        log_metric("monitor.refresh.success", snapshot.successful_refreshes);
        log_metric("monitor.refresh.failure", snapshot.failed_refreshes);

        debug!(
            reports = reports.len(),
            alerts = alerts.len(),
            refreshed = refreshed.successful.len(),
            failed = refreshed.failed.len(),
            "Health check completed"
        );
        Ok(HealthCheckOutcome { reports, alerts, refreshed })
    }

    fn alert_for(&self, report: &TokenHealthReport, now: DateTime<Utc>) -> Option<HealthAlert> {
        let remaining = Duration::from_secs(report.time_until_expiry);
        let (severity, message) = match report.status {
            TokenStatus::Revoked => return None,
            TokenStatus::Invalid => {
                (AlertSeverity::Critical, "credentials rejected; re-authorization required".to_string())
            }
            TokenStatus::Expired => (AlertSeverity::Critical, "token expired".to_string()),
            TokenStatus::Valid if remaining <= self.config.critical_before_expiry => (
                AlertSeverity::Critical,
                format!("token expires in {}s", report.time_until_expiry),
            ),
            TokenStatus::Valid if remaining <= self.config.warning_before_expiry => (
                AlertSeverity::Warning,
                format!("token expires in {}s", report.time_until_expiry),
            ),
            TokenStatus::Valid => return None,
        };
        Some(HealthAlert::new(severity, report.platform, message, report.time_until_expiry, now))
    }

    fn emit(&self, alert: &HealthAlert) {
        match alert.severity {
            AlertSeverity::Critical => error!(
                platform = %alert.platform,
                time_until_expiry = alert.time_until_expiry,
                "{}", alert.message
            ),
            AlertSeverity::Warning => warn!(
                platform = %alert.platform,
                time_until_expiry = alert.time_until_expiry,
                "{}", alert.message
            ),
        }
        self.alerts.lock().push(alert.clone());
        self.coordinator.observer().on_alert(alert);
    }

    /// Platforms eligible for proactive refresh: live or expired tokens
    /// within the threshold, not already refreshing, circuit not open, and
    /// outside the failure cool-down.
    fn refresh_candidates(&self, reports: &[TokenHealthReport], now: DateTime<Utc>) -> Vec<Platform> {
        let threshold = self.config.refresh_threshold.as_secs();
        let failed_at = self.failed_at.lock();

        reports
            .iter()
            .filter(|r| matches!(r.status, TokenStatus::Valid | TokenStatus::Expired))
            .filter(|r| r.time_until_expiry <= threshold)
            .filter(|r| !r.circuit_open)
            .filter(|r| {
                if self.coordinator.is_refreshing(r.platform) {
                    debug!(platform = %r.platform, "Refresh already in flight, skipping");
                    return false;
                }
                true
            })
            .filter(|r| match failed_at.get(&r.platform) {
                Some(at) => {
                    let cooling = (now - *at).to_std().unwrap_or_default()
                        < self.config.retry_failed_refresh_after;
                    if cooling {
                        debug!(platform = %r.platform, "Recent refresh failure, cooling down");
                    }
                    !cooling
                }
                None => true,
            })
            .map(|r| r.platform)
            .collect()
    }

    async fn refresh_in_batches(&self, platforms: &[Platform]) -> BatchRefreshResult {
        let mut result =
            BatchRefreshResult { total_processed: platforms.len(), ..BatchRefreshResult::default() };

        for chunk in platforms.chunks(self.config.max_concurrent_refreshes.max(1)) {
            let batch = self.coordinator.batch_refresh_tokens(chunk).await;
            let now = self.coordinator.clock().utc_now();
            for platform in &batch.successful {
                self.record_refresh(*platform, true, now);
            }
            for failure in &batch.failed {
                self.record_refresh(failure.platform, false, now);
            }
            result.successful.extend(batch.successful);
            result.failed.extend(batch.failed);
        }
        result
    }

    fn record_refresh(&self, platform: Platform, success: bool, at: DateTime<Utc>) {
        let mut metrics = self.metrics.lock();
        if success {
            metrics.successful_refreshes += 1;
            self.failed_at.lock().remove(&platform);
        } else {
            metrics.failed_refreshes += 1;
            self.failed_at.lock().insert(platform, at);
        }
    }
}

fn log_metric(metric: &'static str, value: u64) {
    debug!(metric, value, "Monitor metric");
}
