//! Retry policies and the retry loop.
//!
//! This module groups the knobs that control **how long** to wait between
//! attempts and **whether** to keep trying, plus the loop that applies them.
//!
//! ## Contents
//! - [`RetryLoop`]     shared, cancellable "retry until success" driver
//! - [`RetryPolicy`]   backoff + optional attempt cap
//! - [`BackoffPolicy`] how delays evolve (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization strategy
//! - [`Retryable`]     lets an error end the loop early
//!
//! ## Defaults
//! - `RetryPolicy::default()` → constant 3s interval, unlimited attempts.
//! - `BackoffPolicy::default()` → first=3s, factor=1.0 (constant), max=3s, jitter=None.
//! - `JitterPolicy::None`.

mod backoff;
mod jitter;
mod retry;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
pub use retry::{RetryLoop, RetryOutcome, RetryPolicy, Retryable};
