//! Wall-clock abstraction so throttling, TTL and staleness rules can be tested.

use std::sync::{Arc, Mutex};

use chrono::Utc;

/// Source of "now" as fractional seconds since the Unix epoch.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> f64;
}

/// Live implementation backed by `chrono::Utc::now()`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        Utc::now().timestamp_micros() as f64 / 1_000_000.0
    }
}

/// Manually driven clock for tests. Clones share the same time.
#[derive(Clone, Debug, Default)]
pub struct MockClock {
    current: Arc<Mutex<f64>>,
}

impl MockClock {
    pub fn at(secs: f64) -> Self {
        Self {
            current: Arc::new(Mutex::new(secs)),
        }
    }

    pub fn set(&self, secs: f64) {
        *self.lock() = secs;
    }

    pub fn advance(&self, secs: f64) {
        *self.lock() += secs;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, f64> {
        self.current.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Clock for MockClock {
    fn now(&self) -> f64 {
        *self.lock()
    }
}
