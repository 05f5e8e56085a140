//! Millisecond clock helpers: deadlines, retry schedules, cancellation and
//! debouncing for the single-threaded poll loop.

use std::cell::Cell;
use std::rc::Rc;

/// Monotonic milliseconds supplied by the caller of every `poll`
pub type Millis = u64;

/// Shared cancellation flag, checked before every side-effecting step
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Rc<Cell<bool>>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}

/// Fixed-interval retry loop with an overall time bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySchedule {
    pub started_at: Millis,
    pub interval: Millis,
    pub timeout: Millis,
    next_attempt: Millis,
}

impl RetrySchedule {
    /// First attempt is due immediately
    pub fn start(now: Millis, interval: Millis, timeout: Millis) -> Self {
        Self {
            started_at: now,
            interval,
            timeout,
            next_attempt: now,
        }
    }

    /// First attempt is due after one interval
    pub fn start_delayed(now: Millis, interval: Millis, timeout: Millis) -> Self {
        Self {
            next_attempt: now + interval,
            ..Self::start(now, interval, timeout)
        }
    }

    pub fn is_due(&self, now: Millis) -> bool {
        now >= self.next_attempt
    }

    pub fn reschedule(&mut self, now: Millis) {
        self.next_attempt = now + self.interval;
    }

    pub fn is_expired(&self, now: Millis) -> bool {
        now > self.started_at + self.timeout
    }

    pub fn elapsed(&self, now: Millis) -> Millis {
        now.saturating_sub(self.started_at)
    }
}

/// Collapses bursts of triggers into one firing `delay` ms after the last
#[derive(Debug, Clone, Default)]
pub struct Debounce {
    delay: Millis,
    fire_at: Option<Millis>,
}

impl Debounce {
    pub fn new(delay: Millis) -> Self {
        Self {
            delay,
            fire_at: None,
        }
    }

    pub fn trigger(&mut self, now: Millis) {
        self.fire_at = Some(now + self.delay);
    }

    /// Returns true exactly once per burst, when the delay has passed
    pub fn fire(&mut self, now: Millis) -> bool {
        match self.fire_at {
            Some(at) if now >= at => {
                self.fire_at = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.fire_at.is_some()
    }

    pub fn cancel(&mut self) {
        self.fire_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_schedule() {
        let mut retry = RetrySchedule::start(100, 30, 1000);
        assert!(retry.is_due(100));
        retry.reschedule(100);
        assert!(!retry.is_due(129));
        assert!(retry.is_due(130));
        assert!(!retry.is_expired(1100));
        assert!(retry.is_expired(1101));
        assert_eq!(retry.elapsed(400), 300);
    }

    #[test]
    fn test_debounce_fires_once_after_last_trigger() {
        let mut d = Debounce::new(500);
        d.trigger(0);
        d.trigger(300);
        assert!(!d.fire(600));
        assert!(d.fire(800));
        assert!(!d.fire(900));
    }

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let held = token.clone();
        token.cancel();
        assert!(held.is_cancelled());
    }
}
