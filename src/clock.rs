use std::cell::Cell;
use std::rc::Rc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use serde::Serialize;

/// Milliseconds since the Unix epoch. Every timeout in the relay is measured in these units.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, Serialize)]
pub struct Timestamp {
    pub ms_since_1970: u64,
}

impl Timestamp {
    pub const fn from_ms(ms_since_1970: u64) -> Self {
        Self { ms_since_1970 }
    }

    pub fn adding(&self, ms: u64) -> Self {
        Self {
            ms_since_1970: self.ms_since_1970.saturating_add(ms),
        }
    }

    pub fn removing(&self, ms: u64) -> Self {
        Self {
            ms_since_1970: self.ms_since_1970.saturating_sub(ms),
        }
    }

    pub fn difference(&self, other: &Self) -> Option<u64> {
        self.ms_since_1970.checked_sub(other.ms_since_1970)
    }

    /// True once `ms` milliseconds have passed since `self`, as seen at `now`.
    pub fn has_elapsed(&self, ms: u64, now: Timestamp) -> bool {
        self.adding(ms) <= now
    }
}

pub trait Clock {
    fn now(&mut self) -> Timestamp;
}

pub struct MonotonicClock {
    reference: Instant,
    reference_ms: u64,
}

impl MonotonicClock {
    pub fn new() -> Self {
        let reference_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .ok()
            .and_then(|d| u64::try_from(d.as_millis()).ok())
            .unwrap_or(u64::MAX);
        Self {
            reference: Instant::now(),
            reference_ms,
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&mut self) -> Timestamp {
        let millis = u64::try_from(Instant::now().duration_since(self.reference).as_millis())
            .unwrap_or(u64::MAX);

        Timestamp {
            ms_since_1970: self.reference_ms.saturating_add(millis),
        }
    }
}

/// A clock that only moves when told to. Clones share the same time, so a test can keep one
/// handle while the relay owns another.
#[derive(Clone, Default, Debug)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn new(ms_since_1970: u64) -> Self {
        Self {
            now: Rc::new(Cell::new(ms_since_1970)),
        }
    }

    pub fn set(&self, ms_since_1970: u64) {
        self.now.set(ms_since_1970);
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get().saturating_add(ms));
    }
}

impl Clock for ManualClock {
    fn now(&mut self) -> Timestamp {
        Timestamp::from_ms(self.now.get())
    }
}
