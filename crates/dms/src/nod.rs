//! Head nod detection from nose-tip motion
//!
//! The nose position is smoothed with a fast EMA and compared against a slow
//! baseline EMA. A nod is a fast downward dip that holds long enough and deep
//! enough. Baseline tracking pauses while a dip is pending so the nod itself
//! does not pull the baseline down.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::NodConfig;
use crate::window::{deadline_ms, elapsed_secs, secs_to_ms, TimeWindow};

/// Nod detector output for one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodResult {
    /// Nod confirmed on this frame
    pub nod_detected: bool,
    /// Nods since construction or reset
    pub nod_count: u32,
    /// Within the flash window of the last nod
    pub show_flash: bool,
    /// At least two nods inside the nod window
    pub double_nod: bool,
}

#[derive(Debug, Clone, Copy)]
struct PendingDip {
    started_ms: i64,
    peak_delta: f32,
}

/// Head nod detector
#[derive(Debug, Clone)]
pub struct NodDetector {
    config: NodConfig,
    count: u32,
    smoothed_y: Option<f32>,
    baseline_y: Option<f32>,
    /// Previous smoothed position and its timestamp
    previous: Option<(f32, i64)>,
    last_face_ms: Option<i64>,
    cooldown_until_ms: Option<i64>,
    flash_until_ms: Option<i64>,
    pending: Option<PendingDip>,
    nod_times: TimeWindow,
}

impl NodDetector {
    pub fn new(config: NodConfig) -> Self {
        let window_ms = secs_to_ms(config.window_secs);
        Self {
            config,
            count: 0,
            smoothed_y: None,
            baseline_y: None,
            previous: None,
            last_face_ms: None,
            cooldown_until_ms: None,
            flash_until_ms: None,
            pending: None,
            nod_times: TimeWindow::new(window_ms),
        }
    }

    /// Process one frame. `nose_y` is `None` when no face was detected.
    ///
    /// A non-finite sample counts as a face sighting but leaves the smoothed
    /// position and baseline untouched.
    pub fn update(&mut self, nose_y: Option<f32>, now_ms: i64) -> NodResult {
        let nod_detected = match nose_y {
            Some(y) if y.is_finite() => self.track(y, now_ms),
            Some(_) => {
                self.last_face_ms = Some(now_ms);
                false
            }
            None => self.face_lost(now_ms),
        };

        self.nod_times.prune(now_ms);

        NodResult {
            nod_detected,
            nod_count: self.count,
            show_flash: self.flash_until_ms.is_some_and(|until| now_ms < until),
            double_nod: self.nod_times.len() >= 2,
        }
    }

    fn track(&mut self, nose_y: f32, now_ms: i64) -> bool {
        self.last_face_ms = Some(now_ms);

        let alpha = self.config.smoothing_alpha;
        let smoothed = match self.smoothed_y {
            Some(prev) => alpha * nose_y + (1.0 - alpha) * prev,
            None => nose_y,
        };
        self.smoothed_y = Some(smoothed);

        if self.pending.is_none() {
            let beta = self.config.baseline_beta;
            self.baseline_y = Some(match self.baseline_y {
                Some(base) => beta * smoothed + (1.0 - beta) * base,
                None => smoothed,
            });
        }
        let baseline = self.baseline_y.unwrap_or(smoothed);

        // Positive is downward in image coordinates
        let velocity = match self.previous {
            Some((prev_y, prev_ms)) => {
                let dt = elapsed_secs(prev_ms, now_ms).max(self.config.min_dt_secs);
                (smoothed - prev_y) / dt
            }
            None => 0.0,
        };
        self.previous = Some((smoothed, now_ms));

        if self.in_cooldown(now_ms) {
            return false;
        }

        let delta = smoothed - baseline;
        if delta > self.config.dip_threshold && velocity > self.config.velocity_threshold {
            match self.pending.as_mut() {
                Some(dip) => dip.peak_delta = dip.peak_delta.max(delta),
                None => {
                    self.pending = Some(PendingDip {
                        started_ms: now_ms,
                        peak_delta: delta,
                    })
                }
            }
        }

        let Some(dip) = self.pending else {
            return false;
        };

        let duration = elapsed_secs(dip.started_ms, now_ms);
        if duration >= self.config.min_dip_secs && dip.peak_delta >= self.config.peak_confirm {
            debug!(peak = dip.peak_delta, duration, "nod confirmed");
            self.confirm(now_ms);
            true
        } else {
            if duration > self.config.dip_abandon_secs {
                debug!(peak = dip.peak_delta, "pending dip abandoned");
                self.pending = None;
            }
            false
        }
    }

    /// A head dropping out of view right after a dip started still counts as a nod.
    fn face_lost(&mut self, now_ms: i64) -> bool {
        let Some(last_face) = self.last_face_ms else {
            return false;
        };

        let since_face = elapsed_secs(last_face, now_ms);
        if since_face > self.config.face_loss_grace_secs {
            self.pending = None;
            return false;
        }

        match self.pending {
            Some(dip)
                if elapsed_secs(dip.started_ms, now_ms) <= self.config.face_loss_dip_secs
                    && !self.in_cooldown(now_ms) =>
            {
                debug!(since_face, "nod confirmed on face loss");
                self.confirm(now_ms);
                true
            }
            _ => false,
        }
    }

    fn confirm(&mut self, now_ms: i64) {
        self.count += 1;
        self.cooldown_until_ms = Some(deadline_ms(now_ms, secs_to_ms(self.config.cooldown_secs)));
        self.flash_until_ms = Some(deadline_ms(now_ms, self.config.flash_ms));
        self.pending = None;
        self.nod_times.push(now_ms);
    }

    fn in_cooldown(&self, now_ms: i64) -> bool {
        self.cooldown_until_ms.is_some_and(|until| now_ms < until)
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Forget recent nods so double-nod status starts over
    pub fn clear_nod_times(&mut self) {
        self.nod_times.clear();
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }
}
