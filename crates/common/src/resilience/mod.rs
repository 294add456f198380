//! Resilience patterns for fault tolerance
//!
//! - **Circuit Breaker**: stops calling a dependency that keeps failing,
//!   tracked independently per key
//! - **Retry Logic**: exponential backoff with jitter, driven by an error
//!   classifier
//!
//! Both are generic over the error type and take a [`Clock`](crate::time::Clock)
//! or the tokio timer, so tests control time without real waits.

pub mod circuit_breaker;
pub mod retry;

// Re-export circuit breaker types
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerConfigBuilder, CircuitSnapshot,
    CircuitState, ResilienceError, ResilienceResult,
};
// Re-export retry types
pub use retry::{
    policies, retry_with_backoff, RetryClassifier, RetryDecision, RetryPolicy, RetryPolicyBuilder,
};
