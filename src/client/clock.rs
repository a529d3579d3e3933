//! The source of "now" for every timer the session runs.
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

/// A clock that is either the system clock or a manually driven one for tests.
#[derive(Clone, Debug)]
pub enum Clock {
    /// The system wall clock.
    System,
    /// A clock that only moves when told to.
    Manual(Arc<Mutex<DateTime<Utc>>>),
}

impl Default for Clock {
    fn default() -> Clock {
        Clock::System
    }
}

impl Clock {
    /// Creates a manual clock starting at `start`.
    pub fn manual(start: DateTime<Utc>) -> Clock {
        Clock::Manual(Arc::new(Mutex::new(start)))
    }

    /// The current time.
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Manual(now) => *now.lock(),
        }
    }

    /// Moves a manual clock forward. The system clock ignores this.
    pub fn advance(&self, secs: i64) {
        if let Clock::Manual(now) = self {
            let mut now = now.lock();
            *now = *now + Duration::seconds(secs);
        }
    }

    /// Sets a manual clock to `date`. The system clock ignores this.
    pub fn set(&self, date: DateTime<Utc>) {
        if let Clock::Manual(now) = self {
            *now.lock() = date;
        }
    }
}

#[cfg(test)]
mod test {
    use chrono::{TimeZone, Utc};

    use super::Clock;

    #[test]
    fn manual_clock_moves_only_when_told() {
        let start = Utc.timestamp(1_000_000, 0);
        let clock = Clock::manual(start);
        assert_eq!(clock.now(), start);
        let other = clock.clone();
        other.advance(30);
        assert_eq!(clock.now().timestamp(), 1_000_030);
        clock.set(start);
        assert_eq!(other.now(), start);
    }
}
