//! Response deadlines.
//!
//! A deadline is a short-lived coroutine that sleeps for the configured budget
//! and then posts a signal on the dispatcher's race channel. A non-positive
//! budget disables it: nothing is spawned and nothing is ever posted.

use may::coroutine::{self, JoinHandle};
use may::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};
use tracing::error;

/// Timer coroutines only sleep and send; they need very little stack.
const TIMER_STACK_SIZE: usize = 0x2000;

/// Budget in milliseconds to an optional duration; `<= 0` disables the deadline.
#[must_use]
pub fn normalize(millis: i64) -> Option<Duration> {
    u64::try_from(millis)
        .ok()
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
}

/// A pending deadline. Dropping it cancels the timer if it has not fired.
#[derive(Default)]
pub struct Armed {
    handle: Option<JoinHandle<()>>,
}

impl Armed {
    /// Whether a timer coroutine was started.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.handle.is_some()
    }

    /// Stop the timer before it fires.
    pub fn disarm(mut self) {
        self.cancel();
    }

    fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            if !handle.is_done() {
                // SAFETY: may marks cancellation unsafe. The timer coroutine
                // owns nothing but a sender and is parked in `sleep`, where
                // cancellation unwinds it cleanly.
                unsafe {
                    handle.coroutine().cancel();
                }
            }
        }
    }
}

impl Drop for Armed {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Post `signal` on `sender` once `timeout` elapses.
///
/// Returns an unarmed handle when `timeout` is `None` or the timer coroutine
/// cannot be spawned (logged; the request then runs without a deadline).
pub fn arm<T: Send + 'static>(timeout: Option<Duration>, sender: Sender<T>, signal: T) -> Armed {
    let Some(timeout) = timeout else {
        return Armed::default();
    };

    // SAFETY: may::coroutine::Builder::spawn() is marked unsafe by the may
    // runtime. The closure is 'static and owns everything it touches.
    let spawned = unsafe {
        coroutine::Builder::new()
            .name("deadline".to_string())
            .stack_size(TIMER_STACK_SIZE)
            .spawn(move || {
                coroutine::sleep(timeout);
                // The receiver is gone once the request finalized without us.
                let _ = sender.send(signal);
            })
    };

    match spawned {
        Ok(handle) => Armed {
            handle: Some(handle),
        },
        Err(e) => {
            error!(
                error = %e,
                timeout_ms = timeout.as_millis() as u64,
                "Failed to spawn deadline coroutine"
            );
            Armed::default()
        }
    }
}

/// A receiver that yields the firing instant once after `timeout`.
///
/// When `timeout` is `None` no timer runs and the receiver never yields a
/// value (`recv` reports a disconnected channel).
#[must_use]
pub fn timer(timeout: Option<Duration>) -> Receiver<Instant> {
    let (tx, rx) = mpsc::channel();
    let Some(timeout) = timeout else {
        return rx;
    };
    // SAFETY: see `arm`; the closure owns only the sender.
    let spawned = unsafe {
        coroutine::Builder::new()
            .name("timer".to_string())
            .stack_size(TIMER_STACK_SIZE)
            .spawn(move || {
                coroutine::sleep(timeout);
                let _ = tx.send(Instant::now());
            })
    };
    if let Err(e) = spawned {
        error!(error = %e, "Failed to spawn timer coroutine");
    }
    rx
}
