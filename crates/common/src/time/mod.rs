//! Time utilities and abstractions
//!
//! - **[`clock`]**: real and mock clocks for deterministic tests
//!
//! ```rust
//! use std::time::Duration;
//!
//! use tokenwarden_common::time::{Clock, MockClock};
//!
//! let clock = MockClock::new();
//! let before = clock.utc_now();
//! clock.advance(Duration::from_secs(5));
//! assert_eq!((clock.utc_now() - before).num_seconds(), 5);
//! ```

pub mod clock;

pub use clock::{Clock, MockClock, SystemClock};
