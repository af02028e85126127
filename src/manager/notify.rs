use std::fmt;
use std::rc::Rc;

/// Returned by `subscribe`, used to unsubscribe later
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(crate) u64);

pub(crate) type Subscriber = Rc<dyn Fn()>;

/// Update listeners of one atlas, in subscription order
#[derive(Default)]
pub struct NotificationBus {
    subscribers: Vec<(SubscriptionId, Subscriber)>,
}

impl fmt::Debug for NotificationBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationBus")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl NotificationBus {
    pub fn subscribe(&mut self, id: SubscriptionId, subscriber: Subscriber) {
        self.subscribers.push((id, subscriber));
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Copy of the current list for delivery.
    ///
    /// Delivery iterates the copy, so subscribers may unsubscribe anyone
    /// (themselves included) while being notified.
    pub(crate) fn snapshot(&self) -> Vec<Subscriber> {
        self.subscribers.iter().map(|(_, s)| Rc::clone(s)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_snapshot_preserves_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut bus = NotificationBus::default();
        for n in 0..3 {
            let log = Rc::clone(&log);
            bus.subscribe(SubscriptionId(n), Rc::new(move || log.borrow_mut().push(n)));
        }

        for subscriber in bus.snapshot() {
            subscriber();
        }
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn test_unsubscribe() {
        let mut bus = NotificationBus::default();
        bus.subscribe(SubscriptionId(1), Rc::new(|| {}));
        bus.subscribe(SubscriptionId(2), Rc::new(|| {}));

        assert!(bus.unsubscribe(SubscriptionId(1)));
        assert!(!bus.unsubscribe(SubscriptionId(1)));
        assert_eq!(bus.len(), 1);
    }
}
