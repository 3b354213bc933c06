//! Interactive playback plumbing: clocks, drift correction and the cross-thread control handle.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Nominal interval between playback ticks.
pub const TICK_MS: f64 = 40.0;

/// Wall-clock source of the play loop.
pub trait Clock: Send {
    /// Milliseconds since an arbitrary fixed origin.
    fn now_ms(&self) -> f64;
    fn sleep_ms(&mut self, ms: f64);
}

#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }

    fn sleep_ms(&mut self, ms: f64) {
        if ms > 0.0 {
            std::thread::sleep(Duration::from_secs_f64(ms / 1000.0));
        }
    }
}

/// Clock that only moves when slept on, plus an optional extra delay per sleep to simulate a
/// slow host.
#[derive(Clone, Copy, Debug, Default)]
pub struct ManualClock {
    now: f64,
    lag_ms: f64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lag(mut self, lag_ms: f64) -> Self {
        self.lag_ms = lag_ms.max(0.0);
        self
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        self.now
    }

    fn sleep_ms(&mut self, ms: f64) {
        self.now += ms.max(0.0) + self.lag_ms;
    }
}

/// Proportional-integral correction of the virtual clock against the wall clock.
///
/// `error` is virtual elapsed minus wall elapsed (ms). The returned adjustment is subtracted
/// from the next tick's virtual step, truncated to whole milliseconds and clamped to one tick.
#[derive(Clone, Copy, Debug)]
pub struct DriftController {
    kp: f64,
    ki: f64,
    limit: f64,
    accumulated: f64,
}

impl DriftController {
    pub fn new(limit_ms: f64) -> Self {
        Self {
            kp: 0.2,
            ki: 0.01,
            limit: limit_ms.abs(),
            accumulated: 0.0,
        }
    }

    pub fn with_gains(mut self, kp: f64, ki: f64) -> Self {
        self.kp = kp;
        self.ki = ki;
        self
    }

    pub fn update(&mut self, error_ms: f64) -> f64 {
        if error_ms == 0.0 || !error_ms.is_finite() {
            return 0.0;
        }
        self.accumulated += error_ms;
        (error_ms * self.kp + self.accumulated * self.ki)
            .trunc()
            .clamp(-self.limit, self.limit)
    }

    pub fn reset(&mut self) {
        self.accumulated = 0.0;
    }
}

impl Default for DriftController {
    fn default() -> Self {
        Self::new(TICK_MS)
    }
}

#[derive(Debug)]
struct Control {
    rate: AtomicU64,
    seek: Mutex<Option<f64>>,
}

/// Thread-safe remote control of a running play loop.
///
/// The loop reads the rate and any pending seek at the top of every tick; a rate of `0`
/// stops it.
#[derive(Clone, Debug)]
pub struct PlaybackHandle {
    inner: Arc<Control>,
}

impl Default for PlaybackHandle {
    fn default() -> Self {
        Self {
            inner: Arc::new(Control {
                rate: AtomicU64::new(0f64.to_bits()),
                seek: Mutex::new(None),
            }),
        }
    }
}

impl PlaybackHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rate(&self) -> f64 {
        f64::from_bits(self.inner.rate.load(Ordering::SeqCst))
    }

    /// Negative or non-finite rates are treated as `0`.
    pub fn set_rate(&self, rate: f64) {
        let rate = if rate.is_finite() { rate.max(0.0) } else { 0.0 };
        self.inner.rate.store(rate.to_bits(), Ordering::SeqCst);
    }

    pub fn pause(&self) {
        self.set_rate(0.0);
    }

    pub fn is_paused(&self) -> bool {
        self.rate() <= 0.0
    }

    /// Request a seek; the latest request wins.
    pub fn seek(&self, ms: f64) {
        if let Ok(mut s) = self.inner.seek.lock() {
            *s = Some(ms);
        }
    }

    pub(crate) fn take_seek(&self) -> Option<f64> {
        self.inner.seek.lock().ok().and_then(|mut s| s.take())
    }
}

/// How a play loop stopped.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PlaybackOutcome {
    Ended,
    Paused { current_ms: f64 },
}
