//! Domain types and models

pub mod health;
pub mod metrics;
pub mod platform;
pub mod token;

pub use health::{
    AlertSeverity, BatchRefreshResult, HealthAlert, RefreshFailure, TokenHealthReport, TokenStatus,
};
pub use metrics::{AuthMetrics, MonitorMetrics, RESPONSE_TIME_SMOOTHING};
pub use platform::Platform;
pub use token::{AuthToken, PlatformCredentials, TokenError, TokenType, UserInfo};
