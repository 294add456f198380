//! Token lifecycle: ports, adapter registry, coordinator and health monitor.

pub mod coordinator;
pub mod monitor;
pub mod ports;
pub mod registry;

pub use coordinator::{AuthCoordinator, AuthCoordinatorBuilder, CoordinatorConfig};
pub use monitor::{HealthCheckOutcome, MonitorConfig, MonitorError, TokenHealthMonitor};
pub use ports::{AuthObserver, NoopObserver, PlatformAdapter, TokenStore, DEFAULT_RATE_LIMIT_WAIT};
pub use registry::AdapterRegistry;
