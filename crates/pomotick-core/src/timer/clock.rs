//! Wall-clock source for the engine.
//!
//! The engine never sleeps or counts ticks; it only asks "what time is it"
//! and compares against an absolute end timestamp. Swapping the clock is
//! enough to simulate time in tests.

use std::cell::Cell;
use std::rc::Rc;

use chrono::Utc;

/// Supplies the current time in milliseconds since the Unix epoch.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
    }
}

/// Hand-driven clock. Clones share the same instant.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ms: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now_ms: Rc::new(Cell::new(start_ms)),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now_ms.set(self.now_ms.get().saturating_add(ms));
    }

    pub fn set(&self, ms: u64) {
        self.now_ms.set(ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.get()
    }
}
