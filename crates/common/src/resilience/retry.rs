//! Exponential backoff retry with jitter
//!
//! [`RetryPolicy`] is an immutable value object describing how aggressively
//! to retry. [`retry_with_backoff`] drives an async operation under a policy,
//! asking a [`RetryClassifier`] after every failure whether the error is worth
//! another attempt. Only the final error is surfaced to the caller.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::error::{ConfigError, ConfigResult, ErrorClassification};

/// Decision for whether to retry an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the operation with the policy's backoff delay
    Retry,
    /// Retry, waiting at least the given provider-supplied delay
    RetryAfter(Duration),
    /// Don't retry the operation
    Stop,
}

/// Decides whether a failed attempt should be retried.
pub trait RetryClassifier<E> {
    fn classify(&self, error: &E, attempt: u32) -> RetryDecision;
}

impl<E, F> RetryClassifier<E> for F
where
    F: Fn(&E, u32) -> RetryDecision,
{
    fn classify(&self, error: &E, attempt: u32) -> RetryDecision {
        self(error, attempt)
    }
}

/// Retry configuration
///
/// Delay before retrying after attempt `a` (1-based) is
/// `min(base_delay * backoff_multiplier^(a-1), max_delay)`, then perturbed by
/// ±25% when jitter is enabled.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    backoff_multiplier: f64,
    jitter: bool,
    max_elapsed: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::auth()
    }
}

impl RetryPolicy {
    /// Policy for general provider calls.
    pub const fn auth() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: true,
            max_elapsed: None,
        }
    }

    /// Policy for token refresh calls: few attempts, short waits.
    pub const fn token_refresh() -> Self {
        Self {
            max_attempts: 2,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            jitter: true,
            max_elapsed: None,
        }
    }

    /// Policy for calls that already hit a provider rate limit.
    pub const fn rate_limited() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(300),
            backoff_multiplier: 1.5,
            jitter: true,
            max_elapsed: None,
        }
    }

    /// A single attempt with no retries.
    pub const fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            jitter: false,
            max_elapsed: None,
        }
    }

    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::new()
    }

    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub const fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub const fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub const fn backoff_multiplier(&self) -> f64 {
        self.backoff_multiplier
    }

    pub const fn jitter(&self) -> bool {
        self.jitter
    }

    pub const fn max_elapsed(&self) -> Option<Duration> {
        self.max_elapsed
    }

    /// Validate the policy
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid("max_attempts must be greater than 0"));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(ConfigError::invalid("backoff_multiplier must be a finite value >= 1.0"));
        }
        if self.base_delay > self.max_delay {
            return Err(ConfigError::invalid("base_delay must not exceed max_delay"));
        }
        Ok(())
    }

    /// Backoff delay after `attempt` before jitter, always within
    /// `[0, max_delay]`.
    pub fn base_delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.base_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else if secs <= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(secs)
        }
    }

    /// Backoff delay after `attempt`, with ±25% jitter when enabled.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.base_delay_for_attempt(attempt);
        if !self.jitter || delay.is_zero() {
            return delay;
        }
        let factor = rand::thread_rng().gen_range(0.75..=1.25);
        delay.mul_f64(factor)
    }
}

/// Builder for [`RetryPolicy`], starting from [`RetryPolicy::auth`].
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl Default for RetryPolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryPolicyBuilder {
    pub fn new() -> Self {
        Self { policy: RetryPolicy::auth() }
    }

    /// Start from an existing policy.
    pub fn from_policy(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.policy.max_attempts = attempts;
        self
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.policy.base_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.policy.max_delay = delay;
        self
    }

    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.policy.backoff_multiplier = multiplier;
        self
    }

    pub fn jitter(mut self, enabled: bool) -> Self {
        self.policy.jitter = enabled;
        self
    }

    /// Bound the total time spent retrying; a retry whose delay would cross
    /// the bound is not attempted.
    pub fn max_elapsed(mut self, bound: Duration) -> Self {
        self.policy.max_elapsed = Some(bound);
        self
    }

    pub fn build(self) -> ConfigResult<RetryPolicy> {
        self.policy.validate()?;
        Ok(self.policy)
    }
}

/// Run `operation` under `policy`, retrying failures the classifier allows.
///
/// A `Stop` decision fails fast without consuming further attempts. A
/// `RetryAfter` hint replaces the computed backoff when it is larger.
pub async fn retry_with_backoff<F, Fut, T, E, R>(
    mut operation: F,
    policy: &RetryPolicy,
    classifier: &R,
    context: &str,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
    R: RetryClassifier<E> + ?Sized,
{
    let started = tokio::time::Instant::now();
    let mut attempt = 1;

    loop {
        let error = match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(context, attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) => error,
        };

        let decision = classifier.classify(&error, attempt);
        if decision == RetryDecision::Stop {
            debug!(context, attempt, error = %error, "Non-retryable failure");
            return Err(error);
        }
        if attempt >= policy.max_attempts() {
            warn!(context, attempts = attempt, error = %error, "Retry attempts exhausted");
            return Err(error);
        }

        let backoff = policy.delay_for_attempt(attempt);
        let delay = match decision {
            RetryDecision::RetryAfter(hint) => backoff.max(hint),
            _ => backoff,
        };

        if let Some(bound) = policy.max_elapsed() {
            if started.elapsed() + delay > bound {
                warn!(context, attempts = attempt, error = %error, "Retry time budget exhausted");
                return Err(error);
            }
        }

        warn!(
            context,
            attempt,
            max_attempts = policy.max_attempts(),
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %error,
            "Attempt failed, retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

/// Built-in classifiers
pub mod policies {
    use super::{ErrorClassification, RetryClassifier, RetryDecision};

    /// Retries according to [`ErrorClassification`], honoring `retry_after`
    /// hints.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct Classified;

    impl<E: ErrorClassification> RetryClassifier<E> for Classified {
        fn classify(&self, error: &E, _attempt: u32) -> RetryDecision {
            if !error.is_retryable() {
                return RetryDecision::Stop;
            }
            error.retry_after().map_or(RetryDecision::Retry, RetryDecision::RetryAfter)
        }
    }

    /// Retries every error.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct AlwaysRetry;

    impl<E> RetryClassifier<E> for AlwaysRetry {
        fn classify(&self, _error: &E, _attempt: u32) -> RetryDecision {
            RetryDecision::Retry
        }
    }
}
