//! Sliding-window admission control for job executions.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

/// Admits at most `max` events in any `window`-long span.
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    max: usize,
    window: Duration,
    admitted: VecDeque<Instant>,
}

impl SlidingWindowLimiter {
    /// A limiter admitting `max` events per `window`. Zero means unlimited.
    pub fn new(max: u32, window: Duration) -> Self {
        let max = usize::try_from(max).unwrap_or(usize::MAX);
        Self {
            max,
            window,
            admitted: VecDeque::with_capacity(max.min(1_024)),
        }
    }

    /// Admit one event at `now` if the window has room.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        if self.max == 0 {
            return true;
        }
        while self
            .admitted
            .front()
            .is_some_and(|t| now.saturating_duration_since(*t) >= self.window)
        {
            self.admitted.pop_front();
        }
        if self.admitted.len() >= self.max {
            return false;
        }
        self.admitted.push_back(now);
        true
    }

    /// Events admitted in the window ending at `now`.
    pub fn in_window(&self, now: Instant) -> usize {
        self.admitted
            .iter()
            .filter(|t| now.saturating_duration_since(**t) < self.window)
            .count()
    }
}
