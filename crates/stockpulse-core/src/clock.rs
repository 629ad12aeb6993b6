//! Wall-clock sources for market-hours decisions and snapshot timestamps.

use std::sync::{Mutex, PoisonError};

use crate::UtcDateTime;

/// Source of the current UTC wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> UtcDateTime;
}

/// Reads the operating system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> UtcDateTime {
        UtcDateTime::now()
    }
}

/// Manually driven clock for deterministic tests and replays.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<UtcDateTime>,
}

impl FixedClock {
    pub fn new(now: UtcDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: UtcDateTime) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> UtcDateTime {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_returns_what_was_set() {
        let start = UtcDateTime::parse("2024-01-10T15:00:00Z").expect("timestamp");
        let later = UtcDateTime::parse("2024-01-10T21:00:00Z").expect("timestamp");
        let clock = FixedClock::new(start);
        assert_eq!(clock.now(), start);

        clock.set(later);
        assert_eq!(clock.now(), later);
    }
}
