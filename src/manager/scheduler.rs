use std::time::Duration;

/// Debounce timer for one atlas.
///
/// Every arm pushes the deadline out again; the batch fires only once the
/// atlas has been quiet for the whole delay.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchScheduler {
    deadline: Option<Duration>,
}

impl BatchScheduler {
    pub fn arm(&mut self, now: Duration, delay: Duration) {
        self.deadline = Some(now + delay);
    }

    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    pub fn is_due(&self, now: Duration) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(100);

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_rearm_restarts_window() {
        let mut scheduler = BatchScheduler::default();
        assert!(!scheduler.is_due(ms(1_000)));

        scheduler.arm(ms(0), DELAY);
        scheduler.arm(ms(80), DELAY);

        assert!(!scheduler.is_due(ms(100)));
        assert!(scheduler.is_due(ms(180)));
        assert_eq!(scheduler.deadline(), Some(ms(180)));
    }

    #[test]
    fn test_disarm() {
        let mut scheduler = BatchScheduler::default();
        scheduler.arm(ms(0), DELAY);
        scheduler.disarm();
        assert!(!scheduler.is_due(ms(500)));
        assert_eq!(scheduler.deadline(), None);
    }
}
