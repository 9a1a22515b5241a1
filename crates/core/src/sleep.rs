use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Cooperative cancellation flag shared between the control thread and the
/// run worker. Cloning shares the underlying flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Granularity of cancellable waits. Long sleeps are decomposed into
/// slices so a stop request lands within one slice.
const SLICE: Duration = Duration::from_millis(25);

/// Sleep for up to `dur`, waking early on cancellation.
/// Returns `false` if the token was cancelled before the full duration.
pub fn sleep_cancellable(dur: Duration, cancel: &CancelToken) -> bool {
    let deadline = Instant::now() + dur;
    loop {
        if cancel.is_cancelled() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(SLICE));
    }
}

/// Sleep for a duration drawn uniformly from `[lo, hi]` seconds.
pub fn sleep_range(lo: f64, hi: f64) {
    let secs = if hi > lo {
        rand::thread_rng().gen_range(lo..hi)
    } else {
        lo
    };
    thread::sleep(Duration::from_secs_f64(secs.max(0.0)));
}
