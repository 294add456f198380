//! Tracing subscriber setup and structured log helpers.

use std::time::Duration;

use tokenwarden_domain::{LoggingSettings, TokenHealthReport};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured level. Returns an error if a global
/// subscriber is already installed.
pub fn init_tracing(settings: &LoggingSettings) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    if settings.json {
        builder.json().try_init().map_err(|err| anyhow::anyhow!("failed to install tracing subscriber: {err}"))?;
    } else {
        builder.try_init().map_err(|err| anyhow::anyhow!("failed to install tracing subscriber: {err}"))?;
    }
    Ok(())
}

/// Log the outcome of a CLI operation with structured fields.
///
/// `operation` should be a stable identifier without sensitive data.
#[inline]
pub fn log_operation(operation: &str, elapsed: Duration, success: bool) {
    let duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);

    if success {
        info!(operation, duration_ms, "operation_success");
    } else {
        warn!(operation, duration_ms, "operation_failure");
    }
}

/// Emit a counter as a structured event.
#[inline]
pub fn log_metric(metric: &str, value: u64) {
    info!(metric, value, "metric");
}

/// One line per platform summarising a health report.
pub fn log_health_reports(reports: &[TokenHealthReport]) {
    for report in reports {
        if report.is_healthy() {
            info!(
                platform = %report.platform,
                status = %report.status,
                time_until_expiry = report.time_until_expiry,
                refresh_count = report.refresh_count,
                "token_health"
            );
        } else {
            warn!(
                platform = %report.platform,
                status = %report.status,
                time_until_expiry = report.time_until_expiry,
                circuit_open = report.circuit_open,
                errors = ?report.errors,
                "token_health"
            );
        }
    }
}
