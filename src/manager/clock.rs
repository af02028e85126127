use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Time source for batch windows and bounded waits.
///
/// Times are offsets from an arbitrary per-clock origin.
pub trait Clock {
    fn now(&self) -> Duration;

    /// Suspend the caller between polls.
    fn sleep(&self, duration: Duration);
}

/// Wall-clock time
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Virtual time that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, duration: Duration) {
        self.now.set(self.now.get() + duration);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }

    /// Sleeping advances virtual time.
    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_is_shared() {
        let clock = ManualClock::new();
        let other = clock.clone();

        clock.advance(Duration::from_millis(40));
        other.sleep(Duration::from_millis(60));

        assert_eq!(clock.now(), Duration::from_millis(100));
        assert_eq!(other.now(), Duration::from_millis(100));
    }

    #[test]
    fn test_system_clock_moves_forward() {
        let clock = SystemClock::new();
        let before = clock.now();
        clock.sleep(Duration::from_millis(2));
        assert!(clock.now() > before);
    }
}
