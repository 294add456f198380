//! Test doubles for the auth ports
//!
//! Available to unit tests and, through the `test-utils` feature, to
//! integration tests and downstream crates.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokenwarden_common::time::Clock;
use tokenwarden_domain::{
    AlertSeverity, AuthError, AuthErrorKind, AuthToken, HealthAlert, Platform,
    PlatformCredentials, Result, StoreError, UserInfo,
};

use crate::auth::ports::{AuthObserver, PlatformAdapter, TokenStore};

// =============================================================================
// MockTokenStore
// =============================================================================

/// In-memory store with switchable failure injection.
#[derive(Debug, Default)]
pub struct MockTokenStore {
    tokens: Mutex<BTreeMap<Platform, AuthToken>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MockTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of stored tokens, bypassing failure injection.
    pub fn snapshot(&self) -> BTreeMap<Platform, AuthToken> {
        self.tokens.lock().clone()
    }

    /// Insert directly, bypassing validation and failure injection.
    pub fn seed(&self, token: AuthToken) {
        self.tokens.lock().insert(token.platform, token);
    }

    fn check(&self, flag: &AtomicBool) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            Err(StoreError::backend("injected failure"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl TokenStore for MockTokenStore {
    async fn store(&self, platform: Platform, token: AuthToken) -> Result<(), StoreError> {
        self.check(&self.fail_writes)?;
        self.tokens.lock().insert(platform, token);
        Ok(())
    }

    async fn get(&self, platform: Platform) -> Result<Option<AuthToken>, StoreError> {
        self.check(&self.fail_reads)?;
        Ok(self.tokens.lock().get(&platform).cloned())
    }

    async fn update(&self, platform: Platform, token: AuthToken) -> Result<(), StoreError> {
        self.check(&self.fail_writes)?;
        let mut tokens = self.tokens.lock();
        match tokens.get_mut(&platform) {
            Some(slot) => {
                *slot = token;
                Ok(())
            }
            None => Err(StoreError::NotFound { platform }),
        }
    }

    async fn remove(&self, platform: Platform) -> Result<bool, StoreError> {
        self.check(&self.fail_writes)?;
        Ok(self.tokens.lock().remove(&platform).is_some())
    }

    async fn get_all(&self) -> Result<BTreeMap<Platform, AuthToken>, StoreError> {
        self.check(&self.fail_reads)?;
        Ok(self.tokens.lock().clone())
    }
}

// =============================================================================
// MockAdapter
// =============================================================================

#[derive(Debug, Clone)]
enum Outcome {
    Token(Duration),
    Error(AuthError),
}

/// Scriptable provider adapter.
///
/// Token-issuing calls (`authenticate`, `exchange_authorization_code`,
/// `refresh_token`) consume scripted outcomes in order and fall back to a
/// successful token with the default lifetime once the script is empty.
/// Issued access tokens are named `access-{platform}-{n}`.
pub struct MockAdapter {
    platform: Platform,
    clock: Arc<dyn Clock>,
    lifetime: Duration,
    latency: Option<Duration>,
    requires_auth: bool,
    revoke_fails: bool,
    leak_secret: bool,
    script: Mutex<VecDeque<Outcome>>,
    issued: AtomicUsize,
    refresh_calls: AtomicUsize,
    authenticate_calls: AtomicUsize,
    exchange_calls: AtomicUsize,
    revoke_calls: AtomicUsize,
    validate_calls: AtomicUsize,
    valid: AtomicBool,
    last_refresh_token: Mutex<Option<String>>,
}

impl MockAdapter {
    pub fn new(platform: Platform, clock: Arc<dyn Clock>) -> Self {
        Self {
            platform,
            clock,
            lifetime: Duration::from_secs(86_400),
            latency: None,
            requires_auth: platform.requires_auth(),
            revoke_fails: false,
            leak_secret: false,
            script: Mutex::new(VecDeque::new()),
            issued: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            authenticate_calls: AtomicUsize::new(0),
            exchange_calls: AtomicUsize::new(0),
            revoke_calls: AtomicUsize::new(0),
            validate_calls: AtomicUsize::new(0),
            valid: AtomicBool::new(true),
            last_refresh_token: Mutex::new(None),
        }
    }

    /// Lifetime of tokens issued once the script is exhausted.
    #[must_use]
    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Delay every token-issuing call (uses tokio time, so paused tests
    /// auto-advance).
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    #[must_use]
    pub fn with_requires_auth(mut self, requires_auth: bool) -> Self {
        self.requires_auth = requires_auth;
        self
    }

    #[must_use]
    pub fn failing_revoke(mut self) -> Self {
        self.revoke_fails = true;
        self
    }

    /// Embed the client secret in issued refresh tokens.
    #[must_use]
    pub fn leaking_secret(mut self) -> Self {
        self.leak_secret = true;
        self
    }

    pub fn push_token(&self, lifetime: Duration) {
        self.script.lock().push_back(Outcome::Token(lifetime));
    }

    pub fn push_error(&self, error: AuthError) {
        self.script.lock().push_back(Outcome::Error(error));
    }

    /// Script `times` consecutive failures of `kind`.
    pub fn fail_next(&self, times: usize, kind: AuthErrorKind) {
        let mut script = self.script.lock();
        for _ in 0..times {
            script.push_back(Outcome::Error(AuthError::new(kind, self.platform, "scripted failure")));
        }
    }

    pub fn set_valid(&self, valid: bool) {
        self.valid.store(valid, Ordering::SeqCst);
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn authenticate_calls(&self) -> usize {
        self.authenticate_calls.load(Ordering::SeqCst)
    }

    pub fn exchange_calls(&self) -> usize {
        self.exchange_calls.load(Ordering::SeqCst)
    }

    pub fn revoke_calls(&self) -> usize {
        self.revoke_calls.load(Ordering::SeqCst)
    }

    pub fn validate_calls(&self) -> usize {
        self.validate_calls.load(Ordering::SeqCst)
    }

    /// Refresh credential presented on the most recent refresh call.
    pub fn last_refresh_token(&self) -> Option<String> {
        self.last_refresh_token.lock().clone()
    }

    async fn issue(&self, credentials: &PlatformCredentials) -> Result<AuthToken> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let outcome = self.script.lock().pop_front().unwrap_or(Outcome::Token(self.lifetime));
        let lifetime = match outcome {
            Outcome::Token(lifetime) => lifetime,
            Outcome::Error(err) => return Err(err),
        };

        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let refresh_token = if self.leak_secret {
            format!("refresh-{}", credentials.client_secret)
        } else {
            format!("refresh-{}-{n}", self.platform)
        };
        let token = AuthToken::with_lifetime(
            self.platform,
            format!("access-{}-{n}", self.platform),
            lifetime,
            self.clock.utc_now(),
        )?;
        Ok(if self.requires_auth { token.with_refresh_token(refresh_token) } else { token })
    }
}

impl std::fmt::Debug for MockAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockAdapter").field("platform", &self.platform).finish_non_exhaustive()
    }
}

#[async_trait]
impl PlatformAdapter for MockAdapter {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn requires_authentication(&self) -> bool {
        self.requires_auth
    }

    fn authorization_url(&self, credentials: &PlatformCredentials, state: &str) -> Result<String> {
        Ok(format!(
            "https://auth.example.test/{}?client_id={}&state={state}",
            self.platform, credentials.client_id
        ))
    }

    async fn authenticate(&self, credentials: &PlatformCredentials) -> Result<AuthToken> {
        self.authenticate_calls.fetch_add(1, Ordering::SeqCst);
        self.issue(credentials).await
    }

    async fn exchange_authorization_code(
        &self,
        credentials: &PlatformCredentials,
        _code: &str,
    ) -> Result<AuthToken> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        self.issue(credentials).await
    }

    async fn refresh_token(
        &self,
        credentials: &PlatformCredentials,
        token: &AuthToken,
    ) -> Result<AuthToken> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_refresh_token.lock() = token.refresh_token.clone();
        self.issue(credentials).await
    }

    async fn validate_token(&self, _token: &AuthToken) -> Result<bool> {
        self.validate_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.valid.load(Ordering::SeqCst))
    }

    async fn revoke_token(&self, _credentials: &PlatformCredentials, _token: &AuthToken) -> Result<()> {
        self.revoke_calls.fetch_add(1, Ordering::SeqCst);
        if self.revoke_fails {
            return Err(AuthError::network(self.platform, "revocation endpoint unreachable"));
        }
        Ok(())
    }

    async fn get_user_info(&self, token: &AuthToken) -> Result<UserInfo> {
        Ok(UserInfo {
            platform: self.platform,
            id: token.user_id.clone().unwrap_or_else(|| format!("user-{}", self.platform)),
            username: Some(format!("{}-tester", self.platform)),
            display_name: None,
            extra: serde_json::Map::new(),
        })
    }
}

// =============================================================================
// RecordingObserver
// =============================================================================

/// Lifecycle event captured by [`RecordingObserver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservedEvent {
    Refreshed(Platform),
    RefreshFailed(Platform, AuthErrorKind),
    BestEffortFailure(Platform, String),
    Revoked(Platform),
    Alert(AlertSeverity, Platform),
    CheckFailed,
}

#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ObservedEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ObservedEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, predicate: impl Fn(&ObservedEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }

    fn push(&self, event: ObservedEvent) {
        self.events.lock().push(event);
    }
}

impl AuthObserver for RecordingObserver {
    fn on_token_refreshed(&self, platform: Platform, _token: &AuthToken) {
        self.push(ObservedEvent::Refreshed(platform));
    }

    fn on_refresh_failed(&self, platform: Platform, error: &AuthError) {
        self.push(ObservedEvent::RefreshFailed(platform, error.kind));
    }

    fn on_best_effort_failure(&self, platform: Platform, operation: &str, _error: &AuthError) {
        self.push(ObservedEvent::BestEffortFailure(platform, operation.to_string()));
    }

    fn on_token_revoked(&self, platform: Platform) {
        self.push(ObservedEvent::Revoked(platform));
    }

    fn on_alert(&self, alert: &HealthAlert) {
        self.push(ObservedEvent::Alert(alert.severity, alert.platform));
    }

    fn on_check_failed(&self, _error: &StoreError) {
        self.push(ObservedEvent::CheckFailed);
    }
}
