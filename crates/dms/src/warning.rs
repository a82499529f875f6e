//! Sustained eye closure warnings

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::WarningConfig;
use crate::window::{elapsed_ms, secs_to_ms, TimeWindow};

/// Warning analyzer output for one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WarningResult {
    /// Eyes have been closed past the warning threshold
    pub warning_active: bool,
    /// First warning frame of this closure episode
    pub new_warning_event: bool,
    /// First frame past the long-close threshold in this episode
    pub long_close: bool,
    /// Warning episodes within the short window
    pub warnings_short: usize,
    /// Warning episodes within the long window
    pub warnings_long: usize,
    /// Length of the current closure, 0 when eyes are open
    pub eyes_closed_secs: f32,
}

/// Tracks closure episodes and counts warnings over two sliding windows
#[derive(Debug, Clone)]
pub struct WarningAnalyzer {
    config: WarningConfig,
    closed_since_ms: Option<i64>,
    warning_active: bool,
    warning_fired: bool,
    long_close_fired: bool,
    history: TimeWindow,
}

impl WarningAnalyzer {
    pub fn new(config: WarningConfig) -> Self {
        let retention_ms = secs_to_ms(config.long_window_secs);
        Self {
            config,
            closed_since_ms: None,
            warning_active: false,
            warning_fired: false,
            long_close_fired: false,
            history: TimeWindow::new(retention_ms),
        }
    }

    pub fn update(&mut self, both_eyes_closed: bool, now_ms: i64) -> WarningResult {
        let mut new_warning_event = false;
        let mut long_close = false;

        if both_eyes_closed {
            let since = *self.closed_since_ms.get_or_insert(now_ms);
            let closed_ms = elapsed_ms(since, now_ms);

            if closed_ms >= secs_to_ms(self.config.warning_closed_secs) {
                self.warning_active = true;
                if !self.warning_fired {
                    self.warning_fired = true;
                    new_warning_event = true;
                    self.history.push(now_ms);
                    debug!(closed_ms, episodes = self.history.len(), "eye closure warning");
                }
            }

            if closed_ms >= secs_to_ms(self.config.long_closed_secs) && !self.long_close_fired {
                self.long_close_fired = true;
                long_close = true;
                warn!(closed_ms, "long eye closure");
            }
        } else {
            self.closed_since_ms = None;
            self.warning_active = false;
            self.warning_fired = false;
            self.long_close_fired = false;
        }

        self.history.prune(now_ms);

        WarningResult {
            warning_active: self.warning_active,
            new_warning_event,
            long_close,
            warnings_short: self
                .history
                .count_within(now_ms, secs_to_ms(self.config.short_window_secs)),
            warnings_long: self.history.len(),
            eyes_closed_secs: self
                .closed_since_ms
                .map_or(0.0, |since| elapsed_ms(since, now_ms) as f32 / 1000.0),
        }
    }

    /// Forget recorded episodes; the current closure keeps its progress
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }
}
