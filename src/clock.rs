//! Monotonic time sources.
//!
//! Exchange and connection latencies are measured as the difference of two
//! `nano_time()` reads from the same ticker. The values are opaque: only
//! differences are meaningful.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// A source of monotonic nanosecond timestamps.
pub trait Ticker: Send + Sync + fmt::Debug {
    /// Current reading in nanoseconds.
    fn nano_time(&self) -> u64;
}

/// Elapsed time between two readings of the same ticker.
pub fn elapsed(start_nanos: u64, end_nanos: u64) -> Duration {
    Duration::from_nanos(end_nanos.saturating_sub(start_nanos))
}

/// Ticker backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct MonotonicTicker {
    origin: Instant,
}

impl MonotonicTicker {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicTicker {
    fn default() -> Self {
        Self::new()
    }
}

impl Ticker for MonotonicTicker {
    fn nano_time(&self) -> u64 {
        // u64 nanoseconds overflow after ~584 years of uptime.
        self.origin.elapsed().as_nanos() as u64
    }
}

/// Ticker that advances by a fixed step on every read.
///
/// Two consecutive reads are always exactly one step apart, which makes
/// latency observations deterministic.
#[derive(Debug)]
pub struct StepTicker {
    step: u64,
    tick: AtomicU64,
}

impl StepTicker {
    pub fn new(step: Duration) -> Self {
        Self {
            step: step.as_nanos() as u64,
            tick: AtomicU64::new(0),
        }
    }

    /// One millisecond per read.
    pub fn millis() -> Self {
        Self::new(Duration::from_millis(1))
    }
}

impl Ticker for StepTicker {
    fn nano_time(&self) -> u64 {
        (self.tick.fetch_add(1, Ordering::Relaxed) + 1) * self.step
    }
}
