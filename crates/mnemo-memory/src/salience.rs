use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// A `[0, 1]` score that can be nudged through a shared reference.
///
/// Stored as `f64` bits in an `AtomicU64`. Every write clamps, so readers
/// never observe a value outside the unit interval.
#[derive(Debug)]
pub struct Salience(AtomicU64);

impl Salience {
    pub fn new(value: f64) -> Self {
        Self(AtomicU64::new(clamp_unit(value).to_bits()))
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, value: f64) {
        self.0.store(clamp_unit(value).to_bits(), Ordering::Release);
    }

    /// Add `delta` (capped at 1.0) and return the new value.
    pub fn bump(&self, delta: f64) -> f64 {
        self.update(|v| v + delta)
    }

    /// Multiply by `factor` and return the new value.
    pub fn scale(&self, factor: f64) -> f64 {
        self.update(|v| v * factor)
    }

    fn update(&self, f: impl Fn(f64) -> f64) -> f64 {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            let next = clamp_unit(f(f64::from_bits(current))).to_bits();
            match self
                .0
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return f64::from_bits(next),
                Err(actual) => current = actual,
            }
        }
    }
}

impl Clone for Salience {
    fn clone(&self) -> Self {
        Self::new(self.get())
    }
}

/// Access bookkeeping: how often and when an item was last recalled.
#[derive(Debug)]
pub struct AccessStats {
    count: AtomicU64,
    last_ms: AtomicI64,
}

impl AccessStats {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            count: AtomicU64::new(0),
            last_ms: AtomicI64::new(at.timestamp_millis()),
        }
    }

    pub fn record(&self, at: DateTime<Utc>) -> u64 {
        self.last_ms.fetch_max(at.timestamp_millis(), Ordering::AcqRel);
        self.count.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    pub fn last_accessed(&self) -> DateTime<Utc> {
        let ms = self.last_ms.load(Ordering::Acquire);
        Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
    }

    /// How much of `elapsed` an item should decay for, given it was last
    /// accessed at some point before `now`. Access resets the decay clock.
    pub fn decay_window(&self, elapsed: Duration, now: DateTime<Utc>) -> Duration {
        let since_access = now - self.last_accessed();
        elapsed.min(since_access).max(Duration::zero())
    }
}

impl Clone for AccessStats {
    fn clone(&self) -> Self {
        Self {
            count: AtomicU64::new(self.count()),
            last_ms: AtomicI64::new(self.last_ms.load(Ordering::Acquire)),
        }
    }
}

pub(crate) fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Fractional hours in a duration.
pub(crate) fn hours(d: Duration) -> f64 {
    d.num_milliseconds() as f64 / 3_600_000.0
}
