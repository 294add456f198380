//! Port interfaces for the token lifecycle
//!
//! These traits define the boundaries between the coordinator and the
//! infrastructure that stores tokens and talks to providers.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use tokenwarden_domain::{
    AuthError, AuthToken, HealthAlert, Platform, PlatformCredentials, Result, StoreError, UserInfo,
};

/// Wait applied by [`PlatformAdapter::handle_rate_limit`] when the provider
/// gave no hint.
pub const DEFAULT_RATE_LIMIT_WAIT: Duration = Duration::from_secs(60);

/// Persistence for exactly one token per platform.
///
/// Implementations must make every operation atomic with respect to a single
/// platform key.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Insert or replace the token for `platform`.
    async fn store(&self, platform: Platform, token: AuthToken) -> Result<(), StoreError>;

    async fn get(&self, platform: Platform) -> Result<Option<AuthToken>, StoreError>;

    /// Replace an existing token; fails with [`StoreError::NotFound`] when
    /// nothing is stored for `platform`.
    async fn update(&self, platform: Platform, token: AuthToken) -> Result<(), StoreError>;

    /// Remove the token, returning whether one was stored.
    async fn remove(&self, platform: Platform) -> Result<bool, StoreError>;

    async fn get_all(&self) -> Result<BTreeMap<Platform, AuthToken>, StoreError>;

    async fn has(&self, platform: Platform) -> Result<bool, StoreError> {
        Ok(self.get(platform).await?.is_some())
    }
}

/// Uniform contract over one external provider's OAuth flavour.
///
/// Implementations normalise provider failures into [`AuthError`] kinds
/// before returning them.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    fn requires_authentication(&self) -> bool {
        self.platform().requires_auth()
    }

    /// URL the user visits to grant access, for authorization-code flows.
    fn authorization_url(&self, credentials: &PlatformCredentials, state: &str) -> Result<String>;

    /// Obtain a token without user interaction (client credentials or
    /// anonymous platforms).
    async fn authenticate(&self, credentials: &PlatformCredentials) -> Result<AuthToken>;

    async fn exchange_authorization_code(
        &self,
        credentials: &PlatformCredentials,
        code: &str,
    ) -> Result<AuthToken>;

    /// Exchange the token's refresh credential for a new token. Fails with
    /// `TokenExpired` when the provider or token has no refresh capability.
    async fn refresh_token(
        &self,
        credentials: &PlatformCredentials,
        token: &AuthToken,
    ) -> Result<AuthToken>;

    /// Best-effort validity probe. Only an explicit invalid-credential answer
    /// should yield `false`.
    async fn validate_token(&self, token: &AuthToken) -> Result<bool>;

    /// Revoke the grant with the provider. Callers treat failures as
    /// non-fatal.
    async fn revoke_token(&self, credentials: &PlatformCredentials, token: &AuthToken)
        -> Result<()>;

    async fn get_user_info(&self, token: &AuthToken) -> Result<UserInfo>;

    /// Suspend the caller for the provider-supplied or default duration.
    async fn handle_rate_limit(&self, retry_after: Option<Duration>) {
        tokio::time::sleep(retry_after.unwrap_or(DEFAULT_RATE_LIMIT_WAIT)).await;
    }
}

/// Explicit channel for lifecycle events that are otherwise only logged.
///
/// All methods default to no-ops so implementors subscribe to what they need.
pub trait AuthObserver: Send + Sync {
    fn on_token_refreshed(&self, _platform: Platform, _token: &AuthToken) {}

    fn on_refresh_failed(&self, _platform: Platform, _error: &AuthError) {}

    /// A best-effort sub-operation (such as provider revocation) failed and
    /// was swallowed.
    fn on_best_effort_failure(&self, _platform: Platform, _operation: &str, _error: &AuthError) {}

    fn on_token_revoked(&self, _platform: Platform) {}

    fn on_alert(&self, _alert: &HealthAlert) {}

    /// A scheduled health check could not read the token store.
    fn on_check_failed(&self, _error: &StoreError) {}
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl AuthObserver for NoopObserver {}
