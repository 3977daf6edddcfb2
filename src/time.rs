//! Monotonic clock abstraction. The room accumulator must use a single
//! monotonic clock and never wall-clock-corrected time; the `Clock` trait
//! also lets tests drive the tick loop explicitly instead of sleeping in
//! real time.

use std::time::Instant;

/// Milliseconds since some arbitrary, monotonic reference point.
pub type Millis = f64;

pub trait Clock: Send + Sync {
    fn now_ms(&self) -> Millis;
}

/// Wall-clock-backed, monotonic clock used in production.
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> Millis {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// A clock a test can advance by hand, with no dependency on real time.
#[derive(Default)]
pub struct ManualClock {
    current_ms: std::sync::atomic::AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self { current_ms: std::sync::atomic::AtomicU64::new(0) }
    }

    pub fn advance(&self, ms: f64) {
        self.current_ms
            .fetch_add(ms as u64, std::sync::atomic::Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> Millis {
        self.current_ms.load(std::sync::atomic::Ordering::SeqCst) as f64
    }
}
