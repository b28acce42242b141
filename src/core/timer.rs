//! # CancellableTimer: single-shot delayed callback.
//!
//! ```text
//! start() ─► armed? ──yes──► no-op (the delay is NOT reset)
//!               │ no
//!               ▼
//!         spawn: select! { sleep(delay) ─► disarm, callback()
//!                          token       ─► exit quietly }
//!
//! cancel()  ─► disarm + cancel token (idempotent)
//! restart() ─► cancel(); start()
//! ```
//!
//! Each arming gets a generation number so a firing task never disarms a
//! newer arming started after it.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::{select, time};
use tokio_util::sync::CancellationToken;
use tracing::trace;

type Callback = Arc<dyn Fn() + Send + Sync>;

struct Armed {
    generation: u64,
    token: CancellationToken,
}

#[derive(Default)]
struct Slot {
    armed: Option<Armed>,
    generation: u64,
}

/// Single-shot timer that runs a callback after a fixed delay unless cancelled.
///
/// Must be started from within a tokio runtime. Dropping the timer cancels it.
pub struct CancellableTimer {
    delay: Duration,
    callback: Callback,
    slot: Arc<Mutex<Slot>>,
}

impl CancellableTimer {
    /// Creates a disarmed timer.
    pub fn new<F>(delay: Duration, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            delay,
            callback: Arc::new(callback),
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    /// Configured delay.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Arms the timer if it is not armed already.
    pub fn start(&self) {
        let mut slot = self.lock();
        if slot.armed.is_some() {
            return;
        }
        slot.generation = slot.generation.wrapping_add(1);
        let generation = slot.generation;
        let token = CancellationToken::new();
        slot.armed = Some(Armed {
            generation,
            token: token.clone(),
        });
        drop(slot);

        trace!(delay_ms = self.delay.as_millis() as u64, generation, "timer armed");
        let delay = self.delay;
        let callback = Arc::clone(&self.callback);
        let slot = Arc::clone(&self.slot);
        tokio::spawn(async move {
            select! {
                _ = time::sleep(delay) => {}
                _ = token.cancelled() => return,
            }
            {
                let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
                let current = slot
                    .armed
                    .as_ref()
                    .is_some_and(|armed| armed.generation == generation);
                if !current {
                    return;
                }
                slot.armed = None;
            }
            callback();
        });
    }

    /// Disarms the timer if armed.
    pub fn cancel(&self) {
        if let Some(armed) = self.lock().armed.take() {
            armed.token.cancel();
            trace!(generation = armed.generation, "timer cancelled");
        }
    }

    /// Cancels, then arms again with the full delay.
    pub fn restart(&self) {
        self.cancel();
        self.start();
    }

    /// True while armed and not yet fired.
    pub fn is_running(&self) -> bool {
        self.lock().armed.is_some()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for CancellableTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for CancellableTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellableTimer")
            .field("delay", &self.delay)
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counting(delay: Duration) -> (CancellableTimer, Arc<AtomicU32>) {
        let fired = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&fired);
        let timer = CancellableTimer::new(delay, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (timer, fired)
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_after_delay() {
        let (timer, fired) = counting(Duration::from_secs(60));
        timer.start();
        assert!(timer.is_running());

        time::sleep(Duration::from_secs(59)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!timer.is_running());

        time::sleep(Duration::from_secs(120)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_does_not_reset_the_delay() {
        let (timer, fired) = counting(Duration::from_secs(10));
        timer.start();
        time::sleep(Duration::from_secs(6)).await;
        timer.start();
        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_firing_and_is_idempotent() {
        let (timer, fired) = counting(Duration::from_secs(10));
        timer.start();
        time::sleep(Duration::from_secs(5)).await;
        timer.cancel();
        timer.cancel();
        assert!(!timer.is_running());

        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_rearms_with_full_delay() {
        let (timer, fired) = counting(Duration::from_secs(10));
        timer.start();
        time::sleep(Duration::from_secs(8)).await;
        timer.restart();

        time::sleep(Duration::from_secs(8)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        time::sleep(Duration::from_secs(3)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn drop_disarms() {
        let (timer, fired) = counting(Duration::from_secs(1));
        timer.start();
        drop(timer);
        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
