//! # Backoff between retry attempts.
//!
//! [`BackoffPolicy`] computes the pause after a failed attempt:
//! `first × factor^n`, clamped to `max`, then jittered. The base is derived
//! from the attempt number alone, so jitter never feeds back into later delays.
//!
//! The default is a constant interval, which is what reconnecting to a local
//! game server wants: the server either comes back or it does not.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use mcvisor::{BackoffPolicy, JitterPolicy};
//!
//! let fixed = BackoffPolicy::fixed(Duration::from_secs(3));
//! assert_eq!(fixed.next(0), Duration::from_secs(3));
//! assert_eq!(fixed.next(7), Duration::from_secs(3));
//!
//! let growing = BackoffPolicy {
//!     first: Duration::from_millis(250),
//!     max: Duration::from_secs(2),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//! assert_eq!(growing.next(1), Duration::from_millis(500));
//! assert_eq!(growing.next(10), Duration::from_secs(2));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Delay policy between retry attempts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Delay after the first failure.
    pub first: Duration,
    /// Upper bound for any delay.
    pub max: Duration,
    /// Multiplicative growth factor (`1.0` = constant).
    pub factor: f64,
    /// Randomization applied to the clamped delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Constant 3s interval without jitter.
    fn default() -> Self {
        Self::fixed(Duration::from_secs(3))
    }
}

impl BackoffPolicy {
    /// Constant delay of `interval` between attempts.
    pub fn fixed(interval: Duration) -> Self {
        Self {
            first: interval,
            max: interval,
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }

    /// Computes the delay after failed attempt number `attempt` (0-indexed).
    ///
    /// Non-finite or negative intermediate values clamp to `max`.
    pub fn next(&self, attempt: u32) -> Duration {
        let exp = attempt.min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if !secs.is_finite() || secs < 0.0 || secs > self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        };
        self.jitter.apply(base)
    }
}
