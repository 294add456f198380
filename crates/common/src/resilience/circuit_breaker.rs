//! Keyed circuit breaker
//!
//! One breaker instance tracks an independent circuit per key (for example
//! one per upstream provider). Each circuit follows the classic state
//! machine:
//!
//! - **Closed**: calls flow; consecutive failures are counted.
//! - **Open**: once failures reach `failure_threshold`, calls are rejected
//!   without touching the dependency.
//! - **Half-open**: after `recovery_timeout` has elapsed since the last
//!   failure, the next availability check lets a probe through. A success
//!   closes the circuit, a failure re-opens it and restarts the timer.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::time::{Clock, SystemClock};

/// Errors that can occur in resilience operations
///
/// Generic over the underlying operation error type `E` so the original error
/// is preserved when the call itself failed.
#[derive(Debug, Error)]
pub enum ResilienceError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Circuit breaker is open, rejecting calls
    #[error("Circuit breaker is open, rejecting calls")]
    CircuitOpen,

    /// The underlying operation failed
    #[error("Operation failed: {source}")]
    OperationFailed {
        #[source]
        source: E,
    },
}

impl<E> ResilienceError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Returns the wrapped operation error, if the call was attempted.
    pub fn into_source(self) -> Option<E> {
        match self {
            Self::CircuitOpen => None,
            Self::OperationFailed { source } => Some(source),
        }
    }
}

/// Result type for resilience operations
pub type ResilienceResult<T, E> = Result<T, ResilienceError<E>>;

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, allowing requests
    Closed,
    /// Circuit is open, rejecting requests
    Open,
    /// Circuit is half-open, allowing a probe to test recovery
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// Time to wait after the last failure before allowing a probe
    pub recovery_timeout: Duration,
    /// Number of successes needed to close the circuit once it has tripped
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, recovery_timeout: Duration::from_secs(60), success_threshold: 1 }
    }
}

impl CircuitBreakerConfig {
    /// Create a configuration builder
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::invalid("failure_threshold must be greater than 0"));
        }
        if self.success_threshold == 0 {
            return Err(ConfigError::invalid("success_threshold must be greater than 0"));
        }
        if self.recovery_timeout.is_zero() {
            return Err(ConfigError::invalid("recovery_timeout must be greater than 0"));
        }
        Ok(())
    }
}

/// Builder for [`CircuitBreakerConfig`]
#[derive(Debug, Default)]
pub struct CircuitBreakerConfigBuilder {
    config: CircuitBreakerConfig,
}

impl CircuitBreakerConfigBuilder {
    pub fn new() -> Self {
        Self { config: CircuitBreakerConfig::default() }
    }

    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    pub fn recovery_timeout(mut self, timeout: Duration) -> Self {
        self.config.recovery_timeout = timeout;
        self
    }

    pub fn success_threshold(mut self, threshold: u32) -> Self {
        self.config.success_threshold = threshold;
        self
    }

    pub fn build(self) -> ConfigResult<CircuitBreakerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Point-in-time view of one circuit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    pub failure_count: u32,
    pub is_open: bool,
    pub last_failure_at: Option<DateTime<Utc>>,
    /// Remaining cooldown before a probe is allowed, when open.
    pub retry_in: Option<Duration>,
}

#[derive(Debug, Clone)]
struct Circuit {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure: Option<(Instant, DateTime<Utc>)>,
}

impl Circuit {
    const fn closed() -> Self {
        Self { state: CircuitState::Closed, failure_count: 0, success_count: 0, last_failure: None }
    }

    fn cooldown_elapsed(&self, now: Instant, timeout: Duration) -> bool {
        self.last_failure.map_or(true, |(at, _)| now.saturating_duration_since(at) >= timeout)
    }
}

/// Circuit breaker tracking one circuit per key.
///
/// Unknown keys are implicitly closed; an entry is created on first failure.
pub struct CircuitBreaker<K, C: Clock = SystemClock> {
    config: CircuitBreakerConfig,
    circuits: Mutex<HashMap<K, Circuit>>,
    clock: C,
}

impl<K, C: Clock> fmt::Debug for CircuitBreaker<K, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .field("tracked", &self.circuits.lock().len())
            .finish()
    }
}

impl<K> CircuitBreaker<K, SystemClock>
where
    K: Eq + Hash + Clone + fmt::Display,
{
    /// Create a new circuit breaker with the given configuration using the
    /// system clock
    pub fn new(config: CircuitBreakerConfig) -> ConfigResult<Self> {
        Self::with_clock(config, SystemClock)
    }
}

impl<K, C> CircuitBreaker<K, C>
where
    K: Eq + Hash + Clone + fmt::Display,
    C: Clock,
{
    /// Create a new circuit breaker with a custom clock (useful for testing)
    pub fn with_clock(config: CircuitBreakerConfig, clock: C) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self { config, circuits: Mutex::new(HashMap::new()), clock })
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Returns `true` while calls for `key` must be rejected.
    ///
    /// An open circuit whose recovery timeout has elapsed moves to half-open
    /// here and reports `false`, letting the next call act as a probe.
    pub fn is_circuit_open(&self, key: &K) -> bool {
        let mut circuits = self.circuits.lock();
        let Some(circuit) = circuits.get_mut(key) else {
            return false;
        };

        match circuit.state {
            CircuitState::Closed | CircuitState::HalfOpen => false,
            CircuitState::Open => {
                if circuit.cooldown_elapsed(self.clock.now(), self.config.recovery_timeout) {
                    circuit.state = CircuitState::HalfOpen;
                    circuit.success_count = 0;
                    info!(key = %key, "Circuit breaker half-open, allowing probe");
                    false
                } else {
                    true
                }
            }
        }
    }

    /// Record a successful call for `key`.
    pub fn record_success(&self, key: &K) {
        let mut circuits = self.circuits.lock();
        let Some(circuit) = circuits.get_mut(key) else {
            return;
        };

        match circuit.state {
            CircuitState::Closed => {
                circuit.failure_count = 0;
            }
            CircuitState::HalfOpen | CircuitState::Open => {
                circuit.success_count += 1;
                if circuit.success_count >= self.config.success_threshold {
                    *circuit = Circuit::closed();
                    info!(key = %key, "Circuit breaker closed after successful probe");
                }
            }
        }
    }

    /// Record a failed call for `key`.
    pub fn record_failure(&self, key: &K) {
        let now = (self.clock.now(), self.clock.utc_now());
        let mut circuits = self.circuits.lock();
        let circuit = circuits.entry(key.clone()).or_insert_with(Circuit::closed);

        circuit.failure_count = circuit.failure_count.saturating_add(1);
        circuit.last_failure = Some(now);

        match circuit.state {
            CircuitState::Closed => {
                if circuit.failure_count >= self.config.failure_threshold {
                    circuit.state = CircuitState::Open;
                    warn!(
                        key = %key,
                        failures = circuit.failure_count,
                        recovery_timeout_secs = self.config.recovery_timeout.as_secs(),
                        "Circuit breaker opened"
                    );
                }
            }
            CircuitState::HalfOpen => {
                circuit.state = CircuitState::Open;
                circuit.success_count = 0;
                warn!(key = %key, "Circuit breaker re-opened after failed probe");
            }
            CircuitState::Open => {}
        }
    }

    /// Execute an operation with circuit breaker protection
    ///
    /// Rejects immediately with [`ResilienceError::CircuitOpen`] while the
    /// circuit is open; otherwise runs the operation and records its outcome.
    pub async fn execute<F, Fut, T, E>(&self, key: &K, operation: F) -> ResilienceResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        if self.is_circuit_open(key) {
            debug!(key = %key, "Circuit breaker rejecting call");
            return Err(ResilienceError::CircuitOpen);
        }

        match operation().await {
            Ok(value) => {
                self.record_success(key);
                Ok(value)
            }
            Err(error) => {
                self.record_failure(key);
                Err(ResilienceError::OperationFailed { source: error })
            }
        }
    }

    /// Current state of the circuit for `key`, without triggering the
    /// open→half-open transition.
    pub fn state(&self, key: &K) -> CircuitState {
        self.circuits.lock().get(key).map_or(CircuitState::Closed, |c| c.state)
    }

    pub fn failure_count(&self, key: &K) -> u32 {
        self.circuits.lock().get(key).map_or(0, |c| c.failure_count)
    }

    /// Snapshot of every tracked circuit.
    pub fn status(&self) -> HashMap<K, CircuitSnapshot> {
        let now = self.clock.now();
        self.circuits
            .lock()
            .iter()
            .map(|(key, circuit)| (key.clone(), self.snapshot(circuit, now)))
            .collect()
    }

    /// Snapshot of the circuit for `key` (closed and empty when untracked).
    pub fn snapshot_of(&self, key: &K) -> CircuitSnapshot {
        let now = self.clock.now();
        let circuits = self.circuits.lock();
        let closed = Circuit::closed();
        self.snapshot(circuits.get(key).unwrap_or(&closed), now)
    }

    /// An open circuit past its recovery timeout reads as half-open, the
    /// state the next `is_circuit_open` call moves it to.
    fn snapshot(&self, circuit: &Circuit, now: Instant) -> CircuitSnapshot {
        let recovery_due = circuit.state == CircuitState::Open
            && circuit.cooldown_elapsed(now, self.config.recovery_timeout);
        let state = if recovery_due { CircuitState::HalfOpen } else { circuit.state };
        let retry_in = match (state, circuit.last_failure) {
            (CircuitState::Open, Some((at, _))) => {
                Some(self.config.recovery_timeout.saturating_sub(now.saturating_duration_since(at)))
            }
            _ => None,
        };
        CircuitSnapshot {
            state,
            failure_count: circuit.failure_count,
            is_open: state == CircuitState::Open,
            last_failure_at: circuit.last_failure.map(|(_, wall)| wall),
            retry_in,
        }
    }

    /// Reset the circuit for `key` to closed with a zero failure count.
    pub fn reset(&self, key: &K) {
        if self.circuits.lock().remove(key).is_some() {
            info!(key = %key, "Circuit breaker manually reset to closed state");
        }
    }

    /// Reset every circuit.
    pub fn reset_all(&self) {
        self.circuits.lock().clear();
        info!("All circuit breakers reset to closed state");
    }
}
