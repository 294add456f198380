//! Application context - dependency injection container

use std::sync::Arc;

use thiserror::Error;
use tokenwarden_common::error::ConfigError;
use tokenwarden_common::time::{Clock, SystemClock};
use tokenwarden_core::{
    AdapterRegistry, AuthCoordinator, CoordinatorConfig, MonitorConfig, MonitorError,
    TokenHealthMonitor, TokenStore,
};
use tokenwarden_domain::{Settings, StoreError};
use tokenwarden_infra::{default_registry, open_store};
use tracing::info;

use crate::utils::health::HealthStatus;

/// Failures while assembling or tearing down the context.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to open token store: {0}")]
    Store(#[from] StoreError),

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Monitor(#[from] MonitorError),
}

/// Application context - holds all services and dependencies
pub struct AppContext {
    pub settings: Settings,
    pub store: Arc<dyn TokenStore>,
    pub coordinator: AuthCoordinator,
    pub monitor: Arc<TokenHealthMonitor>,
}

impl AppContext {
    /// Wire production components: the configured store, HTTP adapters for
    /// every platform and the system clock.
    pub async fn new(settings: Settings) -> Result<Self, ContextError> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let store = open_store(&settings.store).await?;
        let registry = default_registry(&settings.http, clock.clone())?;
        Self::with_components(settings, store, registry, clock)
    }

    /// Wire the context from caller-supplied components. Tests use this to
    /// inject mock adapters and clocks.
    pub fn with_components(
        settings: Settings,
        store: Arc<dyn TokenStore>,
        registry: AdapterRegistry,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ContextError> {
        let coordinator = settings
            .platforms
            .iter()
            .fold(
                AuthCoordinator::builder(store.clone(), registry)
                    .config(CoordinatorConfig::from_settings(&settings)?)
                    .clock(clock),
                |builder, (platform, credentials)| builder.credentials(*platform, credentials.clone()),
            )
            .build()?;

        let monitor_config = MonitorConfig::from_settings(&settings.monitor)?;
        let monitor = Arc::new(TokenHealthMonitor::new(coordinator.clone(), monitor_config)?);

        info!(
            platforms = coordinator.platforms().len(),
            configured = settings.platforms.len(),
            store = ?settings.store.kind,
            "context_initialized"
        );

        Ok(Self { settings, store, coordinator, monitor })
    }

    /// Start background work. The monitor only runs when enabled.
    pub fn start(&self) {
        if self.settings.monitor.enabled {
            self.monitor.start();
        } else {
            info!("token health monitor disabled by configuration");
        }
    }

    /// Aggregate token health across every platform with a report.
    pub async fn health_check(&self) -> HealthStatus {
        let checked_at = self.coordinator.clock().utc_now();
        match self.coordinator.get_token_health_report().await {
            Ok(reports) => HealthStatus::from_reports(&reports, checked_at),
            Err(err) => {
                tracing::warn!(error = %err, "health check could not read the token store");
                HealthStatus::unhealthy(format!("token store unavailable: {err}"), checked_at)
            }
        }
    }

    /// Stop background work. Safe to call more than once.
    pub async fn shutdown(&self) -> Result<(), ContextError> {
        info!("shutdown called on AppContext");
        self.monitor.stop().await?;
        info!(component = "TokenHealthMonitor", cleanup_method = "stop (CancellationToken)", "monitor_cleanup");
        Ok(())
    }
}
