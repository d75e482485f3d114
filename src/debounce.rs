use std::time::{Duration, Instant};

/// Holds back a rapidly changing value until it has been stable for `delay`.
///
/// Time is passed in explicitly: callers feed new input with [`set`] and
/// advance with [`poll`]. Each `set` replaces the pending value and restarts
/// the timer, so only the latest input of a burst can ever be applied.
///
/// [`set`]: Debouncer::set
/// [`poll`]: Debouncer::poll
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    delay: Duration,
    current: T,
    pending: Option<(T, Instant)>,
}

impl<T: Clone + PartialEq> Debouncer<T> {
    pub fn new(initial: T, delay: Duration) -> Self {
        Self {
            delay,
            current: initial,
            pending: None,
        }
    }

    /// The debounced value.
    pub fn value(&self) -> &T {
        &self.current
    }

    /// When the pending value will be applied, if there is one.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, at)| *at)
    }

    pub fn set(&mut self, value: T, now: Instant) {
        let latest = self.pending.as_ref().map(|(v, _)| v).unwrap_or(&self.current);
        if *latest == value {
            return;
        }
        self.pending = Some((value, now + self.delay));
    }

    /// Apply the pending value if its deadline has passed.
    /// Returns true when the debounced value changed.
    pub fn poll(&mut self, now: Instant) -> bool {
        match &self.pending {
            Some((_, at)) if now >= *at => self.apply_pending(),
            _ => false,
        }
    }

    /// Apply the pending value immediately.
    pub fn flush(&mut self) -> bool {
        self.apply_pending()
    }

    fn apply_pending(&mut self) -> bool {
        let Some((value, _)) = self.pending.take() else {
            return false;
        };
        let changed = value != self.current;
        self.current = value;
        changed
    }
}
