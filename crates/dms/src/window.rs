//! Time helpers and event-time sliding windows

use std::collections::VecDeque;

pub(crate) use alerting::clock::{deadline_ms, elapsed_ms, secs_to_ms};

/// Seconds from `since` to `now`, clamped at zero
pub(crate) fn elapsed_secs(since_ms: i64, now_ms: i64) -> f32 {
    elapsed_ms(since_ms, now_ms) as f32 / 1000.0
}

/// Timestamps of discrete events, oldest first, pruned by age
#[derive(Debug, Clone)]
pub struct TimeWindow {
    window_ms: i64,
    times: VecDeque<i64>,
}

impl TimeWindow {
    pub fn new(window_ms: i64) -> Self {
        Self {
            window_ms,
            times: VecDeque::new(),
        }
    }

    /// Record an event
    pub fn push(&mut self, time_ms: i64) {
        self.times.push_back(time_ms);
    }

    /// Drop events older than the window
    pub fn prune(&mut self, now_ms: i64) {
        while let Some(&oldest) = self.times.front() {
            if elapsed_ms(oldest, now_ms) > self.window_ms {
                self.times.pop_front();
            } else {
                break;
            }
        }
    }

    /// Events no older than `span_ms`
    pub fn count_within(&self, now_ms: i64, span_ms: i64) -> usize {
        self.times
            .iter()
            .filter(|&&t| elapsed_ms(t, now_ms) <= span_ms)
            .count()
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn clear(&mut self) {
        self.times.clear();
    }
}
