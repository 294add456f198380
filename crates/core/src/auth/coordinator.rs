//! Auth coordinator - central orchestrator of the token lifecycle
//!
//! The coordinator owns every write to the token store. Provider calls go
//! through the circuit breaker (per platform) and the retry executor, and at
//! most one refresh per platform is ever in flight: concurrent callers join
//! the pending refresh and observe the same outcome.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::{self, BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokenwarden_common::error::{ConfigResult, ErrorClassification};
use tokenwarden_common::resilience::{
    policies, retry_with_backoff, CircuitBreaker, CircuitBreakerConfig, CircuitSnapshot,
    CircuitState, RetryPolicy,
};
use tokenwarden_common::time::{Clock, SystemClock};
use tokenwarden_domain::{
    AuthError, AuthErrorKind, AuthMetrics, AuthToken, BatchRefreshResult, Platform,
    PlatformCredentials, RefreshFailure, Result, Settings, StoreError, TokenHealthReport,
    TokenStatus, UserInfo,
};
use tracing::{debug, info, instrument, warn};

use super::ports::{AuthObserver, NoopObserver, PlatformAdapter, TokenStore};
use super::registry::AdapterRegistry;

type PendingRefresh = Shared<BoxFuture<'static, Result<AuthToken>>>;

/// Coordinator tuning
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Remaining lifetime at or below which `get_valid_token` refreshes.
    pub refresh_threshold: Duration,
    pub refresh_threshold_overrides: HashMap<Platform, Duration>,
    pub circuit_breaker: CircuitBreakerConfig,
    /// Retry policy around provider refresh calls.
    pub refresh_policy: RetryPolicy,
    /// Retry policy around other provider calls.
    pub request_policy: RetryPolicy,
    /// Second round for a refresh that is still rate limited once
    /// `refresh_policy` is spent, run after the adapter's rate-limit wait.
    pub rate_limit_policy: RetryPolicy,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            refresh_threshold: Duration::from_secs(300),
            refresh_threshold_overrides: HashMap::new(),
            circuit_breaker: CircuitBreakerConfig::default(),
            refresh_policy: RetryPolicy::token_refresh(),
            request_policy: RetryPolicy::auth(),
            rate_limit_policy: RetryPolicy::rate_limited(),
        }
    }
}

impl CoordinatorConfig {
    pub fn from_settings(settings: &Settings) -> ConfigResult<Self> {
        let breaker = &settings.circuit_breaker;
        let circuit_breaker = CircuitBreakerConfig::builder()
            .failure_threshold(breaker.failure_threshold)
            .recovery_timeout(breaker.recovery_timeout())
            .success_threshold(breaker.success_threshold)
            .build()?;

        let refresh_threshold_overrides = settings
            .coordinator
            .refresh_threshold_overrides
            .iter()
            .map(|(platform, secs)| (*platform, Duration::from_secs(*secs)))
            .collect();

        Ok(Self {
            refresh_threshold: Duration::from_secs(settings.coordinator.refresh_threshold_secs),
            refresh_threshold_overrides,
            circuit_breaker,
            ..Self::default()
        })
    }

    pub fn refresh_threshold_for(&self, platform: Platform) -> Duration {
        self.refresh_threshold_overrides.get(&platform).copied().unwrap_or(self.refresh_threshold)
    }
}

#[derive(Debug, Clone, Default)]
struct PlatformState {
    refresh_count: u64,
    last_error: Option<AuthError>,
    revoked: bool,
    last_refreshed_at: Option<DateTime<Utc>>,
}

impl PlatformState {
    fn credentials_rejected(&self) -> bool {
        self.last_error.as_ref().is_some_and(|e| e.kind == AuthErrorKind::InvalidCredentials)
    }
}

struct Inner {
    store: Arc<dyn TokenStore>,
    adapters: AdapterRegistry,
    credentials: RwLock<HashMap<Platform, PlatformCredentials>>,
    breaker: CircuitBreaker<Platform, Arc<dyn Clock>>,
    clock: Arc<dyn Clock>,
    config: CoordinatorConfig,
    in_flight: Mutex<HashMap<Platform, PendingRefresh>>,
    /// Serializes token writes per platform: refresh, revoke, onboarding.
    write_locks: Mutex<HashMap<Platform, Arc<AsyncMutex<()>>>>,
    states: Mutex<HashMap<Platform, PlatformState>>,
    metrics: Mutex<HashMap<Platform, AuthMetrics>>,
    observer: Arc<dyn AuthObserver>,
}

/// Builder for [`AuthCoordinator`]
pub struct AuthCoordinatorBuilder {
    store: Arc<dyn TokenStore>,
    adapters: AdapterRegistry,
    config: CoordinatorConfig,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn AuthObserver>,
    credentials: HashMap<Platform, PlatformCredentials>,
}

impl AuthCoordinatorBuilder {
    pub fn config(mut self, config: CoordinatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a custom clock (useful for testing)
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn AuthObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn credentials(mut self, platform: Platform, credentials: PlatformCredentials) -> Self {
        self.credentials.insert(platform, credentials);
        self
    }

    pub fn build(self) -> ConfigResult<AuthCoordinator> {
        self.config.refresh_policy.validate()?;
        self.config.request_policy.validate()?;
        self.config.rate_limit_policy.validate()?;
        let breaker =
            CircuitBreaker::with_clock(self.config.circuit_breaker.clone(), Arc::clone(&self.clock))?;

        Ok(AuthCoordinator {
            inner: Arc::new(Inner {
                store: self.store,
                adapters: self.adapters,
                credentials: RwLock::new(self.credentials),
                breaker,
                clock: self.clock,
                config: self.config,
                in_flight: Mutex::new(HashMap::new()),
                write_locks: Mutex::new(HashMap::new()),
                states: Mutex::new(HashMap::new()),
                metrics: Mutex::new(HashMap::new()),
                observer: self.observer,
            }),
        })
    }
}

/// Central orchestrator for token retrieval, refresh and revocation.
///
/// Cloning is cheap; clones share all state.
#[derive(Clone)]
pub struct AuthCoordinator {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for AuthCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthCoordinator")
            .field("adapters", &self.inner.adapters)
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl AuthCoordinator {
    pub fn builder(store: Arc<dyn TokenStore>, adapters: AdapterRegistry) -> AuthCoordinatorBuilder {
        AuthCoordinatorBuilder {
            store,
            adapters,
            config: CoordinatorConfig::default(),
            clock: Arc::new(SystemClock),
            observer: Arc::new(NoopObserver),
            credentials: HashMap::new(),
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.inner.clock)
    }

    pub fn observer(&self) -> Arc<dyn AuthObserver> {
        Arc::clone(&self.inner.observer)
    }

    pub fn platforms(&self) -> Vec<Platform> {
        self.inner.adapters.platforms()
    }

    // =========================================================================
    // Token access
    // =========================================================================

    /// Return a token for `platform` that is not within its refresh
    /// threshold, refreshing it first when needed.
    ///
    /// Fails with `InvalidCredentials` when nothing is stored, and fails fast
    /// with a circuit-open `PlatformError` while the platform's circuit is
    /// open.
    #[instrument(skip(self), fields(platform = %platform))]
    pub async fn get_valid_token(&self, platform: Platform) -> Result<AuthToken> {
        let Some(token) = self.load(platform).await? else {
            return Err(AuthError::invalid_credentials(platform, "no token for platform"));
        };

        if self.inner.breaker.is_circuit_open(&platform) {
            debug!("Circuit open, failing fast");
            return Err(AuthError::circuit_open(platform));
        }

        let now = self.inner.clock.utc_now();
        let threshold = self.inner.config.refresh_threshold_for(platform);
        if !token.needs_refresh(now, threshold) {
            return Ok(token);
        }

        debug!(remaining_secs = token.seconds_until_expiry(now), "Token near expiry, refreshing");
        self.refresh_token(platform, None).await
    }

    /// Refresh the token for `platform`.
    ///
    /// If a refresh for the platform is already running, the caller joins it
    /// and receives the same result; `refresh_token_override` is then
    /// ignored. The pending entry is cleared as soon as the refresh settles.
    #[instrument(skip(self, refresh_token_override), fields(platform = %platform))]
    pub async fn refresh_token(
        &self,
        platform: Platform,
        refresh_token_override: Option<String>,
    ) -> Result<AuthToken> {
        let pending = {
            let mut in_flight = self.inner.in_flight.lock();
            if let Some(pending) = in_flight.get(&platform).cloned() {
                debug!("Joining in-flight refresh");
                pending
            } else {
                let this = self.clone();
                let pending = async move {
                    let result = this.perform_refresh(platform, refresh_token_override).await;
                    this.inner.in_flight.lock().remove(&platform);
                    result
                }
                .boxed()
                .shared();
                in_flight.insert(platform, pending.clone());
                pending
            }
        };
        pending.await
    }

    /// Whether a refresh for `platform` is currently in flight.
    pub fn is_refreshing(&self, platform: Platform) -> bool {
        self.inner.in_flight.lock().contains_key(&platform)
    }

    /// Revoke with the provider (best effort), then remove the token locally.
    ///
    /// Waits for a refresh already in flight, so its result cannot be
    /// written back after the removal.
    #[instrument(skip(self), fields(platform = %platform))]
    pub async fn revoke_token(&self, platform: Platform) -> Result<()> {
        let _guard = self.lock_platform(platform).await;
        if let Some(token) = self.load(platform).await? {
            if let Some(adapter) = self.inner.adapters.get(platform) {
                let credentials =
                    self.credentials_for(platform, adapter.as_ref()).unwrap_or_default();
                if let Err(err) = adapter.revoke_token(&credentials, &token).await {
                    self.best_effort_failed(platform, "revoke", &err);
                }
            }
        }
        self.remove_locally(platform, None).await
    }

    /// Refresh several platforms independently; one failure never aborts the
    /// others.
    pub async fn batch_refresh_tokens(&self, platforms: &[Platform]) -> BatchRefreshResult {
        let outcomes = future::join_all(
            platforms.iter().map(|&platform| async move {
                (platform, self.refresh_token(platform, None).await)
            }),
        )
        .await;

        let mut result =
            BatchRefreshResult { total_processed: platforms.len(), ..BatchRefreshResult::default() };
        for (platform, outcome) in outcomes {
            match outcome {
                Ok(_) => result.successful.push(platform),
                Err(error) => result.failed.push(RefreshFailure { platform, error }),
            }
        }
        info!(
            total = result.total_processed,
            successful = result.successful.len(),
            failed = result.failed.len(),
            "Batch refresh completed"
        );
        result
    }

    /// Refresh every stored token that is expired or within its threshold.
    pub async fn refresh_expired_tokens(&self) -> Result<BatchRefreshResult, StoreError> {
        let now = self.inner.clock.utc_now();
        let due: Vec<Platform> = self
            .inner
            .store
            .get_all()
            .await?
            .into_iter()
            .filter(|(platform, token)| {
                token.needs_refresh(now, self.inner.config.refresh_threshold_for(*platform))
            })
            .map(|(platform, _)| platform)
            .collect();

        if due.is_empty() {
            debug!("No tokens due for refresh");
        }
        Ok(self.batch_refresh_tokens(&due).await)
    }

    /// React to a failure reported by a token consumer.
    ///
    /// - `TokenExpired`: refresh
    /// - `RateLimited`: count the hit, leave the token alone
    /// - `InvalidCredentials`: drop the token locally
    /// - anything else: log only
    #[instrument(skip(self), fields(platform = %platform))]
    pub async fn handle_auth_failure(&self, platform: Platform, kind: AuthErrorKind) -> Result<()> {
        match kind {
            AuthErrorKind::TokenExpired => self.refresh_token(platform, None).await.map(|_| ()),
            AuthErrorKind::RateLimited => {
                self.with_metrics(platform, AuthMetrics::record_rate_limit);
                info!("Rate limit reported by consumer");
                Ok(())
            }
            AuthErrorKind::InvalidCredentials => {
                warn!("Credentials rejected, removing token locally");
                let _guard = self.lock_platform(platform).await;
                let cause = AuthError::invalid_credentials(platform, "credentials rejected by provider");
                self.remove_locally(platform, Some(cause)).await
            }
            AuthErrorKind::InsufficientPermissions
            | AuthErrorKind::NetworkError
            | AuthErrorKind::PlatformError => {
                warn!(kind = %kind, "Auth failure reported, no action taken");
                Ok(())
            }
        }
    }

    // =========================================================================
    // Credentials and onboarding
    // =========================================================================

    pub fn store_credentials(&self, platform: Platform, credentials: PlatformCredentials) -> Result<()> {
        let missing = credentials.missing_fields();
        if !missing.is_empty() {
            return Err(AuthError::invalid_credentials(
                platform,
                format!("missing {}", missing.join(", ")),
            ));
        }
        self.inner.credentials.write().insert(platform, credentials);
        info!(platform = %platform, "Stored platform credentials");
        Ok(())
    }

    pub fn has_credentials(&self, platform: Platform) -> bool {
        self.inner.credentials.read().contains_key(&platform)
    }

    /// Persist a token obtained outside the coordinator (for example from an
    /// authorization callback handled elsewhere).
    pub async fn store_token(&self, platform: Platform, token: AuthToken) -> Result<()> {
        let credentials = self.inner.credentials.read().get(&platform).cloned().unwrap_or_default();
        let _guard = self.lock_platform(platform).await;
        self.accept_token(platform, token, &credentials).await.map(|_| ())
    }

    pub fn authorization_url(&self, platform: Platform, state: &str) -> Result<String> {
        let adapter = self.inner.adapters.require(platform)?;
        let credentials = self.credentials_for(platform, adapter.as_ref())?;
        adapter.authorization_url(&credentials, state)
    }

    /// Obtain and persist a token without user interaction.
    #[instrument(skip(self), fields(platform = %platform))]
    pub async fn authenticate(&self, platform: Platform) -> Result<AuthToken> {
        let adapter = self.inner.adapters.require(platform)?;
        let credentials = self.credentials_for(platform, adapter.as_ref())?;
        let policy = self.inner.config.request_policy.clone();
        let _guard = self.lock_platform(platform).await;
        let token = self
            .with_retry(platform, &policy, "authenticate", || adapter.authenticate(&credentials))
            .await?;
        let token = self.accept_token(platform, token, &credentials).await?;
        info!(expires_at = %token.expires_at, "Authenticated");
        Ok(token)
    }

    /// Exchange an authorization code and persist the resulting token.
    /// Codes are single-use, so the exchange is never retried.
    #[instrument(skip(self, code), fields(platform = %platform))]
    pub async fn exchange_authorization_code(&self, platform: Platform, code: &str) -> Result<AuthToken> {
        let adapter = self.inner.adapters.require(platform)?;
        let credentials = self.credentials_for(platform, adapter.as_ref())?;
        let _guard = self.lock_platform(platform).await;
        let token = self
            .with_retry(platform, &RetryPolicy::no_retry(), "code exchange", || {
                adapter.exchange_authorization_code(&credentials, code)
            })
            .await?;
        let token = self.accept_token(platform, token, &credentials).await?;
        info!(expires_at = %token.expires_at, "Authorization code exchanged");
        Ok(token)
    }

    /// Ask the provider whether the stored token is still accepted.
    ///
    /// Only an explicit credential rejection yields `false`; other failures
    /// are logged and treated as valid.
    pub async fn validate_token(&self, platform: Platform) -> Result<bool> {
        let Some(token) = self.load(platform).await? else {
            return Ok(false);
        };
        let adapter = self.inner.adapters.require(platform)?;
        match self.call_provider(platform, adapter.validate_token(&token)).await {
            Ok(valid) => Ok(valid),
            Err(err) if err.kind == AuthErrorKind::InvalidCredentials => Ok(false),
            Err(err) => {
                self.best_effort_failed(platform, "validate", &err);
                Ok(true)
            }
        }
    }

    pub async fn get_user_info(&self, platform: Platform) -> Result<UserInfo> {
        let token = self.get_valid_token(platform).await?;
        let adapter = self.inner.adapters.require(platform)?;
        let policy = self.inner.config.request_policy.clone();
        self.with_retry(platform, &policy, "user info", || adapter.get_user_info(&token)).await
    }

    // =========================================================================
    // Health, metrics, circuits
    // =========================================================================

    /// Derive one report per stored token, plus revoked or rejected platforms
    /// that no longer hold one. Mutates nothing.
    pub async fn get_token_health_report(&self) -> Result<Vec<TokenHealthReport>, StoreError> {
        let tokens = self.inner.store.get_all().await?;
        let states = self.inner.states.lock().clone();
        let now = self.inner.clock.utc_now();

        let mut reports: Vec<TokenHealthReport> = tokens
            .iter()
            .map(|(platform, token)| self.report_for_token(*platform, token, states.get(platform), now))
            .collect();

        for (platform, state) in &states {
            if !tokens.contains_key(platform) && (state.revoked || state.credentials_rejected()) {
                reports.push(Self::report_without_token(*platform, state));
            }
        }

        reports.sort_by_key(|r| r.platform);
        Ok(reports)
    }

    pub fn get_metrics(&self, platform: Platform) -> AuthMetrics {
        self.inner.metrics.lock().get(&platform).cloned().unwrap_or_default()
    }

    pub fn all_metrics(&self) -> BTreeMap<Platform, AuthMetrics> {
        self.inner.metrics.lock().iter().map(|(p, m)| (*p, m.clone())).collect()
    }

    /// Operator reset of metrics for one platform, or all when `None`.
    pub fn reset_metrics(&self, platform: Option<Platform>) {
        let mut metrics = self.inner.metrics.lock();
        match platform {
            Some(platform) => {
                metrics.remove(&platform);
            }
            None => metrics.clear(),
        }
        info!(platform = ?platform, "Auth metrics reset");
    }

    pub fn circuit_status(&self) -> BTreeMap<Platform, CircuitSnapshot> {
        self.inner.breaker.status().into_iter().collect()
    }

    pub fn reset_circuit(&self, platform: Platform) {
        self.inner.breaker.reset(&platform);
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn perform_refresh(
        &self,
        platform: Platform,
        refresh_token_override: Option<String>,
    ) -> Result<AuthToken> {
        let _guard = self.lock_platform(platform).await;
        let result = self.refresh_with_provider(platform, refresh_token_override).await;
        match &result {
            Ok(token) => self.on_refreshed(platform, token),
            Err(err) => self.on_refresh_failed(platform, err),
        }
        result
    }

    async fn refresh_with_provider(
        &self,
        platform: Platform,
        refresh_token_override: Option<String>,
    ) -> Result<AuthToken> {
        let adapter = self.inner.adapters.require(platform)?;
        let credentials = self.credentials_for(platform, adapter.as_ref())?;
        let policy = self.inner.config.refresh_policy.clone();

        let issued = match self.load(platform).await? {
            Some(mut current) => {
                if let Some(refresh_token) = refresh_token_override {
                    current.refresh_token = Some(refresh_token);
                }
                let first = self
                    .with_retry(platform, &policy, "token refresh", || {
                        adapter.refresh_token(&credentials, &current)
                    })
                    .await;
                match first {
                    Err(err) if err.kind == AuthErrorKind::RateLimited => {
                        warn!(retry_after = ?err.retry_after, "Refresh rate limited, backing off");
                        adapter.handle_rate_limit(err.retry_after).await;
                        self.with_retry(
                            platform,
                            &self.inner.config.rate_limit_policy,
                            "rate-limited token refresh",
                            || adapter.refresh_token(&credentials, &current),
                        )
                        .await?
                    }
                    other => other?,
                }
            }
            None if !adapter.requires_authentication() => {
                self.with_retry(platform, &policy, "anonymous authentication", || {
                    adapter.authenticate(&credentials)
                })
                .await?
            }
            None => {
                return Err(AuthError::invalid_credentials(platform, "no token stored for platform"))
            }
        };

        self.accept_token(platform, issued, &credentials).await
    }

    /// Check a freshly issued token against the lifecycle invariants and
    /// persist it.
    async fn accept_token(
        &self,
        platform: Platform,
        token: AuthToken,
        credentials: &PlatformCredentials,
    ) -> Result<AuthToken> {
        if token.platform != platform {
            return Err(AuthError::platform_error(
                platform,
                format!("adapter returned a token for {}", token.platform),
            ));
        }
        if token.is_expired(self.inner.clock.utc_now()) {
            return Err(AuthError::platform_error(platform, "issued token is already expired"));
        }
        if token.contains_secret(&credentials.client_secret) {
            return Err(AuthError::platform_error(
                platform,
                "issued token embeds the client secret",
            ));
        }

        self.inner
            .store
            .store(platform, token.clone())
            .await
            .map_err(|err| err.into_auth_error(platform))?;

        let mut states = self.inner.states.lock();
        let state = states.entry(platform).or_default();
        state.revoked = false;
        state.last_error = None;
        Ok(token)
    }

    async fn remove_locally(&self, platform: Platform, cause: Option<AuthError>) -> Result<()> {
        let removed = self
            .inner
            .store
            .remove(platform)
            .await
            .map_err(|err| err.into_auth_error(platform))?;
        {
            let mut states = self.inner.states.lock();
            let state = states.entry(platform).or_default();
            state.revoked = true;
            state.last_error = cause;
        }
        self.inner.observer.on_token_revoked(platform);
        info!(platform = %platform, removed, "Token removed locally");
        Ok(())
    }

    async fn lock_platform(&self, platform: Platform) -> OwnedMutexGuard<()> {
        let lock = Arc::clone(self.inner.write_locks.lock().entry(platform).or_default());
        lock.lock_owned().await
    }

    async fn load(&self, platform: Platform) -> Result<Option<AuthToken>> {
        self.inner.store.get(platform).await.map_err(|err| err.into_auth_error(platform))
    }

    fn credentials_for(
        &self,
        platform: Platform,
        adapter: &dyn PlatformAdapter,
    ) -> Result<PlatformCredentials> {
        if let Some(credentials) = self.inner.credentials.read().get(&platform) {
            return Ok(credentials.clone());
        }
        if adapter.requires_authentication() {
            Err(AuthError::invalid_credentials(platform, "no credentials configured for platform"))
        } else {
            Ok(PlatformCredentials::default())
        }
    }

    /// Run `operation` under `policy`, each attempt gated by the breaker.
    async fn with_retry<T, F, Fut>(
        &self,
        platform: Platform,
        policy: &RetryPolicy,
        context: &str,
        mut operation: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        retry_with_backoff(
            || self.call_provider(platform, operation()),
            policy,
            &policies::Classified,
            context,
        )
        .await
    }

    /// One breaker-gated provider call with metrics.
    ///
    /// Only retryable failures (network, 5xx, rate limits) count against the
    /// circuit; a provider that answers with a client error is reachable.
    async fn call_provider<T, Fut>(&self, platform: Platform, call: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        if self.inner.breaker.is_circuit_open(&platform) {
            debug!(platform = %platform, "Circuit open, provider call skipped");
            return Err(AuthError::circuit_open(platform));
        }

        let started = tokio::time::Instant::now();
        let result = call.await;
        let elapsed = started.elapsed();

        match &result {
            Ok(_) => self.inner.breaker.record_success(&platform),
            Err(err) if err.is_retryable() => self.inner.breaker.record_failure(&platform),
            Err(_) => {}
        }

        let at = self.inner.clock.utc_now();
        let rate_limited = matches!(&result, Err(err) if err.kind == AuthErrorKind::RateLimited);
        self.with_metrics(platform, |m| {
            m.record_request(result.is_ok(), elapsed, at);
            if rate_limited {
                m.record_rate_limit();
            }
        });
        result
    }

    fn with_metrics(&self, platform: Platform, update: impl FnOnce(&mut AuthMetrics)) {
        update(self.inner.metrics.lock().entry(platform).or_default());
    }

    fn on_refreshed(&self, platform: Platform, token: &AuthToken) {
        let now = self.inner.clock.utc_now();
        {
            let mut states = self.inner.states.lock();
            let state = states.entry(platform).or_default();
            state.refresh_count += 1;
            state.last_refreshed_at = Some(now);
        }
        self.with_metrics(platform, AuthMetrics::record_refresh);
        self.inner.observer.on_token_refreshed(platform, token);
        info!(platform = %platform, expires_at = %token.expires_at, "Token refreshed");
    }

    fn on_refresh_failed(&self, platform: Platform, error: &AuthError) {
        self.inner.states.lock().entry(platform).or_default().last_error = Some(error.clone());
        self.inner.observer.on_refresh_failed(platform, error);
        warn!(platform = %platform, kind = %error.kind, error = %error, "Token refresh failed");
    }

    fn best_effort_failed(&self, platform: Platform, operation: &str, error: &AuthError) {
        warn!(platform = %platform, operation, error = %error, "Best-effort provider call failed");
        self.inner.observer.on_best_effort_failure(platform, operation, error);
    }

    fn report_for_token(
        &self,
        platform: Platform,
        token: &AuthToken,
        state: Option<&PlatformState>,
        now: DateTime<Utc>,
    ) -> TokenHealthReport {
        let remaining = token.seconds_until_expiry(now);
        let threshold = self.inner.config.refresh_threshold_for(platform);
        let circuit = self.inner.breaker.snapshot_of(&platform);
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let status = if state.is_some_and(PlatformState::credentials_rejected) {
            TokenStatus::Invalid
        } else if token.is_expired(now) {
            TokenStatus::Expired
        } else {
            TokenStatus::Valid
        };

        if status == TokenStatus::Expired {
            errors.push(format!("token expired at {}", token.expires_at.to_rfc3339()));
        } else if remaining <= threshold.as_secs() {
            warnings.push(format!("token expires in {remaining}s"));
        }
        if let Some(err) = state.and_then(|s| s.last_error.as_ref()) {
            errors.push(format!("last refresh failed: {err}"));
        }
        match circuit.state {
            CircuitState::Open => errors.push("circuit breaker open".to_string()),
            CircuitState::HalfOpen => warnings.push("circuit breaker half-open".to_string()),
            CircuitState::Closed if circuit.failure_count > 0 => {
                warnings.push(format!("{} recent provider failures", circuit.failure_count));
            }
            CircuitState::Closed => {}
        }
        if platform.requires_auth() && !token.has_refresh_token() {
            warnings.push("no refresh token available".to_string());
        }

        TokenHealthReport {
            platform,
            status,
            time_until_expiry: remaining,
            expires_at: Some(token.expires_at),
            refresh_count: state.map_or(0, |s| s.refresh_count),
            circuit_open: circuit.is_open,
            errors,
            warnings,
        }
    }

    fn report_without_token(platform: Platform, state: &PlatformState) -> TokenHealthReport {
        let (status, errors, warnings) = if state.credentials_rejected() {
            let reason = state
                .last_error
                .as_ref()
                .map_or_else(|| "credentials rejected".to_string(), ToString::to_string);
            (TokenStatus::Invalid, vec![reason], Vec::new())
        } else {
            (TokenStatus::Revoked, Vec::new(), vec!["token revoked; re-authorization required".to_string()])
        };

        TokenHealthReport {
            platform,
            status,
            time_until_expiry: 0,
            expires_at: None,
            refresh_count: state.refresh_count,
            circuit_open: false,
            errors,
            warnings,
        }
    }
}
