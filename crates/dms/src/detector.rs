//! Frame-debounced blink and yawn detection

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::{BlinkConfig, YawnConfig};

/// Detector output for one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCount {
    /// Event fired on this frame
    pub detected: bool,
    /// Events since construction or reset
    pub count: u32,
}

/// Blink detector.
///
/// A blink fires once both eyes have been below the EAR threshold for
/// `min_frames` consecutive frames, and cannot fire again until they reopen.
#[derive(Debug, Clone)]
pub struct BlinkDetector {
    config: BlinkConfig,
    closed_frames: u32,
    in_blink: bool,
    count: u32,
}

impl BlinkDetector {
    pub fn new(config: BlinkConfig) -> Self {
        Self {
            config,
            closed_frames: 0,
            in_blink: false,
            count: 0,
        }
    }

    /// Both eyes below threshold. Degenerate eyes read as open.
    pub fn eyes_closed(&self, left_ear: Option<f32>, right_ear: Option<f32>) -> bool {
        let closed = |ear: Option<f32>| ear.is_some_and(|v| v < self.config.ear_threshold);
        closed(left_ear) && closed(right_ear)
    }

    pub fn detect(&mut self, left_ear: Option<f32>, right_ear: Option<f32>) -> EventCount {
        let mut detected = false;

        if self.eyes_closed(left_ear, right_ear) {
            self.closed_frames = self.closed_frames.saturating_add(1);
            if self.closed_frames >= self.config.min_frames && !self.in_blink {
                self.count += 1;
                self.in_blink = true;
                detected = true;
                trace!(count = self.count, "blink");
            }
        } else {
            self.closed_frames = 0;
            self.in_blink = false;
        }

        EventCount {
            detected,
            count: self.count,
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }
}

/// Yawn detector with start/end hysteresis
#[derive(Debug, Clone)]
pub struct YawnDetector {
    config: YawnConfig,
    active_frames: u32,
    yawning: bool,
    count: u32,
}

impl YawnDetector {
    pub fn new(config: YawnConfig) -> Self {
        Self {
            config,
            active_frames: 0,
            yawning: false,
            count: 0,
        }
    }

    pub fn detect(&mut self, mar: Option<f32>) -> EventCount {
        let threshold = if self.yawning {
            self.config.end_threshold
        } else {
            self.config.start_threshold
        };
        let active = mar.is_some_and(|v| v > threshold);
        let mut detected = false;

        if active {
            self.active_frames = self.active_frames.saturating_add(1);
            if self.active_frames >= self.config.min_frames && !self.yawning {
                self.count += 1;
                self.yawning = true;
                detected = true;
                trace!(count = self.count, "yawn");
            }
        } else {
            self.active_frames = 0;
            self.yawning = false;
        }

        EventCount {
            detected,
            count: self.count,
        }
    }

    /// Currently inside a counted yawn
    pub fn is_yawning(&self) -> bool {
        self.yawning
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }
}
