//! # RetryLoop: retry an async operation until it succeeds or is cancelled.
//!
//! A [`RetryLoop`] wraps a zero-argument operation and drives it on a
//! background task with a [`RetryPolicy`]:
//!
//! ```text
//! run() ──► current attempt still running? ──yes──► await the same shared outcome
//!                    │ no
//!                    ▼
//!            spawn driver:
//!            loop {
//!              ├─► attempt += 1
//!              ├─► op().await (cancellable)
//!              │      ├─ Ok(v)                      ─► Succeeded(v), exit
//!              │      ├─ Err(e), !e.is_retryable()  ─► GaveUp, exit
//!              │      ├─ Err(e), attempts exhausted ─► GaveUp, exit
//!              │      └─ Err(e)                     ─► sleep(backoff.next(n)) (cancellable)
//!              └─ token cancelled ─► Abandoned, exit
//!            }
//! ```
//!
//! ## Rules
//! - At most **one driver** per loop at a time; concurrent `run()` calls share its outcome.
//! - A new `run()` after the driver finished starts a fresh logical attempt.
//! - `cancel()` is permanent: the current and every later `run()` settle as
//!   [`RetryOutcome::Abandoned`], which is not an error of the operation.
//! - Dropping the last handle cancels the loop.

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tokio::{select, time};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::BackoffPolicy;

/// Errors that can end a [`RetryLoop`] before its attempts are exhausted.
pub trait Retryable {
    /// `false` stops the loop with [`RetryOutcome::GaveUp`].
    fn is_retryable(&self) -> bool {
        true
    }
}

/// How a [`RetryLoop`] paces and bounds its attempts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Delay between attempts.
    pub backoff: BackoffPolicy,
    /// Maximum number of attempts (`None` = until success or cancellation).
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    /// Constant 3s interval, unlimited attempts.
    fn default() -> Self {
        Self::fixed(Duration::from_secs(3))
    }
}

impl RetryPolicy {
    /// Constant `interval` between attempts, unlimited attempts.
    pub fn fixed(interval: Duration) -> Self {
        Self {
            backoff: BackoffPolicy::fixed(interval),
            max_attempts: None,
        }
    }

    /// Caps the number of attempts (clamped to at least 1).
    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = Some(max.max(1));
        self
    }

    fn exhausted(&self, attempt: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempt >= max)
    }
}

/// How one logical attempt of a [`RetryLoop`] ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryOutcome<T, E> {
    /// The operation succeeded.
    Succeeded(T),
    /// A non-retryable error, or the attempt cap was reached.
    GaveUp {
        /// Last error returned by the operation.
        error: E,
        /// Attempts made, including the last one.
        attempts: u32,
    },
    /// The loop was cancelled before the operation succeeded.
    Abandoned,
}

impl<T, E> RetryOutcome<T, E> {
    /// Converts into a `Result`, mapping [`RetryOutcome::Abandoned`] with `abandoned`.
    pub fn into_result(self, abandoned: impl FnOnce() -> E) -> Result<T, E> {
        match self {
            RetryOutcome::Succeeded(v) => Ok(v),
            RetryOutcome::GaveUp { error, .. } => Err(error),
            RetryOutcome::Abandoned => Err(abandoned()),
        }
    }
}

type Operation<T, E> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, E>> + Send + Sync>;
type SharedOutcome<T, E> = Shared<BoxFuture<'static, RetryOutcome<T, E>>>;

struct Attempt<T, E> {
    outcome: SharedOutcome<T, E>,
    driver: JoinHandle<()>,
}

struct Inner<T, E> {
    name: Cow<'static, str>,
    op: Operation<T, E>,
    policy: RetryPolicy,
    token: CancellationToken,
    current: Mutex<Option<Attempt<T, E>>>,
}

impl<T, E> Drop for Inner<T, E> {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Shared, cancellable retry driver. Cheap to clone; clones drive the same loop.
pub struct RetryLoop<T, E> {
    inner: Arc<Inner<T, E>>,
}

impl<T, E> Clone for RetryLoop<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, E> RetryLoop<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Retryable + fmt::Display + Clone + Send + Sync + 'static,
{
    /// Creates a loop around `op`. Nothing runs until [`RetryLoop::run`].
    pub fn new<F, Fut>(name: impl Into<Cow<'static, str>>, policy: RetryPolicy, op: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let op: Operation<T, E> = Arc::new(move || op().boxed());
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                op,
                policy,
                token: CancellationToken::new(),
                current: Mutex::new(None),
            }),
        }
    }

    /// Runs the operation until it succeeds, gives up, or the loop is cancelled.
    ///
    /// While a driver is running, every caller awaits the same outcome.
    /// The driver keeps going even if all callers stop awaiting.
    pub async fn run(&self) -> RetryOutcome<T, E> {
        let outcome = {
            let mut current = self.inner.current.lock().await;
            match current.as_ref() {
                Some(attempt) if !attempt.driver.is_finished() => attempt.outcome.clone(),
                _ => {
                    let attempt = self.spawn_attempt();
                    let outcome = attempt.outcome.clone();
                    *current = Some(attempt);
                    outcome
                }
            }
        };
        outcome.await
    }

    /// Cancels the loop permanently. Idempotent.
    pub fn cancel(&self) {
        self.inner.token.cancel();
    }

    /// True once [`RetryLoop::cancel`] was called.
    pub fn is_cancelled(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    fn spawn_attempt(&self) -> Attempt<T, E> {
        let (tx, rx) = oneshot::channel();
        let name = self.inner.name.clone();
        let op = Arc::clone(&self.inner.op);
        let policy = self.inner.policy;
        let token = self.inner.token.clone();

        let driver = tokio::spawn(async move {
            let _ = tx.send(drive(name, op, policy, token).await);
        });
        let outcome = async move { rx.await.unwrap_or(RetryOutcome::Abandoned) }
            .boxed()
            .shared();
        Attempt { outcome, driver }
    }
}

async fn drive<T, E>(
    name: Cow<'static, str>,
    op: Operation<T, E>,
    policy: RetryPolicy,
    token: CancellationToken,
) -> RetryOutcome<T, E>
where
    E: Retryable + fmt::Display,
{
    let mut attempt: u32 = 0;

    loop {
        if token.is_cancelled() {
            return RetryOutcome::Abandoned;
        }
        attempt = attempt.saturating_add(1);

        let res = select! {
            res = op() => res,
            _ = token.cancelled() => return RetryOutcome::Abandoned,
        };
        let error = match res {
            Ok(v) => return RetryOutcome::Succeeded(v),
            Err(e) => e,
        };

        if !error.is_retryable() {
            warn!(retry_loop = %name, attempt, error = %error, "giving up: error is not retryable");
            return RetryOutcome::GaveUp {
                error,
                attempts: attempt,
            };
        }
        if policy.exhausted(attempt) {
            warn!(retry_loop = %name, attempt, error = %error, "giving up: attempts exhausted");
            return RetryOutcome::GaveUp {
                error,
                attempts: attempt,
            };
        }

        let delay = policy.backoff.next(attempt - 1);
        debug!(
            retry_loop = %name,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "attempt failed, retrying"
        );

        let sleep = time::sleep(delay);
        tokio::pin!(sleep);
        select! {
            _ = &mut sleep => {}
            _ = token.cancelled() => return RetryOutcome::Abandoned,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, Clone, PartialEq)]
    struct Failure {
        fatal: bool,
    }

    impl fmt::Display for Failure {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "failure(fatal={})", self.fatal)
        }
    }

    impl Retryable for Failure {
        fn is_retryable(&self) -> bool {
            !self.fatal
        }
    }

    fn counting_loop(
        policy: RetryPolicy,
        succeed_on: Option<u32>,
        fatal: bool,
    ) -> (RetryLoop<u32, Failure>, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let lp = RetryLoop::new("test", policy, move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                match succeed_on {
                    Some(k) if n >= k => Ok(n),
                    _ => Err(Failure { fatal }),
                }
            }
        });
        (lp, calls)
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_failures_until_success() {
        let (lp, calls) = counting_loop(RetryPolicy::fixed(Duration::from_secs(3)), Some(3), false);
        assert_eq!(lp.run().await, RetryOutcome::Succeeded(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_runs_share_one_driver() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let lp: RetryLoop<&'static str, Failure> =
            RetryLoop::new("shared", RetryPolicy::default(), move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async {
                    time::sleep(Duration::from_millis(100)).await;
                    Ok("connected")
                }
            });

        let (a, b) = tokio::join!(lp.run(), lp.run());
        assert_eq!(a, RetryOutcome::Succeeded("connected"));
        assert_eq!(b, RetryOutcome::Succeeded("connected"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_error_ends_the_loop_at_once() {
        let (lp, calls) = counting_loop(RetryPolicy::default(), None, true);
        assert_eq!(
            lp.run().await,
            RetryOutcome::GaveUp {
                error: Failure { fatal: true },
                attempts: 1
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn attempt_cap_is_honoured() {
        let policy = RetryPolicy::fixed(Duration::from_secs(1)).with_max_attempts(3);
        let (lp, calls) = counting_loop(policy, None, false);
        match lp.run().await {
            RetryOutcome::GaveUp { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_abandons_current_and_later_runs() {
        let (lp, calls) = counting_loop(RetryPolicy::fixed(Duration::from_secs(3)), None, false);
        let runner = lp.clone();
        let pending = tokio::spawn(async move { runner.run().await });

        time::sleep(Duration::from_secs(10)).await;
        lp.cancel();

        assert_eq!(pending.await.unwrap(), RetryOutcome::Abandoned);
        assert!(calls.load(Ordering::SeqCst) >= 1);
        assert!(lp.is_cancelled());

        let before = calls.load(Ordering::SeqCst);
        assert_eq!(lp.run().await, RetryOutcome::Abandoned);
        assert_eq!(calls.load(Ordering::SeqCst), before);
    }

    #[tokio::test(start_paused = true)]
    async fn run_after_completion_starts_a_new_attempt() {
        let (lp, calls) = counting_loop(RetryPolicy::default(), Some(1), false);
        assert_eq!(lp.run().await, RetryOutcome::Succeeded(1));
        tokio::task::yield_now().await;
        assert_eq!(lp.run().await, RetryOutcome::Succeeded(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn outcome_converts_into_result() {
        let ok: RetryOutcome<u8, Failure> = RetryOutcome::Succeeded(1);
        assert_eq!(ok.into_result(|| Failure { fatal: true }), Ok(1));
        let abandoned: RetryOutcome<u8, Failure> = RetryOutcome::Abandoned;
        assert_eq!(
            abandoned.into_result(|| Failure { fatal: true }),
            Err(Failure { fatal: true })
        );
    }
}
