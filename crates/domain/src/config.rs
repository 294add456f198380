//! Configuration structures
//!
//! Every section is fully defaulted so an empty file (or no file) yields a
//! working configuration. Durations are expressed in whole seconds.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokenwarden_common::error::{ConfigError, ConfigResult};

use crate::constants::{
    DEFAULT_ALERT_HISTORY, DEFAULT_CHECK_INTERVAL_SECS, DEFAULT_COORDINATOR_REFRESH_THRESHOLD_SECS,
    DEFAULT_CRITICAL_BEFORE_EXPIRY_SECS, DEFAULT_FAILURE_THRESHOLD, DEFAULT_HTTP_TIMEOUT_SECS,
    DEFAULT_MAX_CONCURRENT_REFRESHES, DEFAULT_MONITOR_REFRESH_THRESHOLD_SECS,
    DEFAULT_RECOVERY_TIMEOUT_SECS, DEFAULT_RETRY_FAILED_AFTER_SECS, DEFAULT_SUCCESS_THRESHOLD,
    DEFAULT_USER_AGENT, DEFAULT_WARNING_BEFORE_EXPIRY_SECS,
};
use crate::types::{Platform, PlatformCredentials};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub platforms: BTreeMap<Platform, PlatformCredentials>,
    pub monitor: MonitorSettings,
    pub circuit_breaker: CircuitBreakerSettings,
    pub coordinator: CoordinatorSettings,
    pub http: HttpSettings,
    pub store: StoreSettings,
    pub logging: LoggingSettings,
}

impl Settings {
    pub fn validate(&self) -> ConfigResult<()> {
        self.monitor.validate()?;
        self.circuit_breaker.validate()?;
        if self.http.timeout_secs == 0 {
            return Err(ConfigError::invalid("http.timeout_secs must be greater than 0"));
        }
        if self.store.kind == StoreKind::File && self.store.path.is_none() {
            return Err(ConfigError::invalid("store.path is required for the file store"));
        }
        for (platform, credentials) in &self.platforms {
            let missing = credentials.missing_fields();
            if !missing.is_empty() {
                return Err(ConfigError::invalid(format!(
                    "platforms.{platform}: missing {}",
                    missing.join(", ")
                )));
            }
        }
        Ok(())
    }
}

/// Health monitor tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub enabled: bool,
    pub check_interval_secs: u64,
    pub refresh_threshold_secs: u64,
    pub max_concurrent_refreshes: usize,
    pub warning_before_expiry_secs: u64,
    pub critical_before_expiry_secs: u64,
    pub retry_failed_refresh_after_secs: u64,
    pub alert_history: usize,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval_secs: DEFAULT_CHECK_INTERVAL_SECS,
            refresh_threshold_secs: DEFAULT_MONITOR_REFRESH_THRESHOLD_SECS,
            max_concurrent_refreshes: DEFAULT_MAX_CONCURRENT_REFRESHES,
            warning_before_expiry_secs: DEFAULT_WARNING_BEFORE_EXPIRY_SECS,
            critical_before_expiry_secs: DEFAULT_CRITICAL_BEFORE_EXPIRY_SECS,
            retry_failed_refresh_after_secs: DEFAULT_RETRY_FAILED_AFTER_SECS,
            alert_history: DEFAULT_ALERT_HISTORY,
        }
    }
}

impl MonitorSettings {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn refresh_threshold(&self) -> Duration {
        Duration::from_secs(self.refresh_threshold_secs)
    }

    pub fn warning_before_expiry(&self) -> Duration {
        Duration::from_secs(self.warning_before_expiry_secs)
    }

    pub fn critical_before_expiry(&self) -> Duration {
        Duration::from_secs(self.critical_before_expiry_secs)
    }

    pub fn retry_failed_refresh_after(&self) -> Duration {
        Duration::from_secs(self.retry_failed_refresh_after_secs)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.check_interval_secs == 0 {
            return Err(ConfigError::invalid("monitor.check_interval_secs must be greater than 0"));
        }
        if self.max_concurrent_refreshes == 0 {
            return Err(ConfigError::invalid(
                "monitor.max_concurrent_refreshes must be greater than 0",
            ));
        }
        if self.critical_before_expiry_secs >= self.warning_before_expiry_secs {
            return Err(ConfigError::invalid(
                "monitor.critical_before_expiry_secs must be below warning_before_expiry_secs",
            ));
        }
        Ok(())
    }
}

/// Circuit breaker tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    pub failure_threshold: u32,
    pub recovery_timeout_secs: u64,
    pub success_threshold: u32,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            recovery_timeout_secs: DEFAULT_RECOVERY_TIMEOUT_SECS,
            success_threshold: DEFAULT_SUCCESS_THRESHOLD,
        }
    }
}

impl CircuitBreakerSettings {
    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_secs(self.recovery_timeout_secs)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.failure_threshold == 0 || self.success_threshold == 0 {
            return Err(ConfigError::invalid("circuit_breaker thresholds must be greater than 0"));
        }
        if self.recovery_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "circuit_breaker.recovery_timeout_secs must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Coordinator tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorSettings {
    /// Remaining lifetime at or below which `get_valid_token` refreshes.
    pub refresh_threshold_secs: u64,
    /// Per-platform overrides of `refresh_threshold_secs`.
    pub refresh_threshold_overrides: BTreeMap<Platform, u64>,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            refresh_threshold_secs: DEFAULT_COORDINATOR_REFRESH_THRESHOLD_SECS,
            refresh_threshold_overrides: BTreeMap::new(),
        }
    }
}

impl CoordinatorSettings {
    pub fn refresh_threshold(&self, platform: Platform) -> Duration {
        Duration::from_secs(
            self.refresh_threshold_overrides
                .get(&platform)
                .copied()
                .unwrap_or(self.refresh_threshold_secs),
        )
    }
}

/// Outbound HTTP settings for provider adapters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self { timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS, user_agent: DEFAULT_USER_AGENT.to_string() }
    }
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Memory,
    File,
}

/// Token store backend selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub kind: StoreKind,
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}
