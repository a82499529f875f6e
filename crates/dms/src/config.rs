//! DMS configuration

use std::path::Path;

use alerting::AlarmConfig;
use serde::{Deserialize, Serialize};

use crate::DmsError;

/// Face-mesh indices of the landmark groups used by the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LandmarkIndices {
    /// Left eye, ordered corner, upper, upper, corner, lower, lower
    pub left_eye: [usize; 6],
    /// Right eye, same ordering as the left eye
    pub right_eye: [usize; 6],
    /// Mouth, ordered corner, 3 upper, corner, 3 lower (mirrored)
    pub mouth: [usize; 8],
    /// Nose tip
    pub nose: usize,
}

impl Default for LandmarkIndices {
    fn default() -> Self {
        Self {
            left_eye: [33, 160, 158, 133, 153, 144],
            right_eye: [362, 385, 387, 263, 373, 380],
            mouth: [61, 13, 82, 312, 291, 317, 87, 14],
            nose: 1,
        }
    }
}

impl LandmarkIndices {
    /// Minimum landmark count a frame must supply
    pub fn required_len(&self) -> usize {
        self.left_eye
            .iter()
            .chain(self.right_eye.iter())
            .chain(self.mouth.iter())
            .copied()
            .chain(std::iter::once(self.nose))
            .max()
            .map_or(0, |max| max + 1)
    }
}

/// Blink detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlinkConfig {
    /// EAR below which an eye counts as closed
    pub ear_threshold: f32,
    /// Consecutive closed frames before a blink counts
    pub min_frames: u32,
}

impl Default for BlinkConfig {
    fn default() -> Self {
        Self {
            ear_threshold: 0.21,
            min_frames: 2,
        }
    }
}

/// Yawn detection (hysteresis thresholds)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YawnConfig {
    /// MAR needed to enter a yawn
    pub start_threshold: f32,
    /// MAR needed to stay in a yawn
    pub end_threshold: f32,
    /// Consecutive active frames before a yawn counts
    pub min_frames: u32,
}

impl Default for YawnConfig {
    fn default() -> Self {
        Self {
            start_threshold: 0.35,
            end_threshold: 0.25,
            min_frames: 5,
        }
    }
}

/// Head nod detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodConfig {
    /// Fast EMA weight for nose position
    pub smoothing_alpha: f32,
    /// Slow EMA weight for the resting baseline
    pub baseline_beta: f32,
    /// Drop below baseline that starts a dip (normalized units)
    pub dip_threshold: f32,
    /// Downward velocity that starts a dip (units/second)
    pub velocity_threshold: f32,
    /// Minimum dip duration before confirming (seconds)
    pub min_dip_secs: f32,
    /// Peak drop needed to confirm a dip
    pub peak_confirm: f32,
    /// Dead time after a confirmed nod (seconds)
    pub cooldown_secs: f32,
    /// Window for double-nod counting (seconds)
    pub window_secs: f32,
    /// Pending dip lifetime before it is abandoned (seconds)
    pub dip_abandon_secs: f32,
    /// Face absence that still counts as a nod out of frame (seconds)
    pub face_loss_grace_secs: f32,
    /// Maximum dip age for a face-loss nod (seconds)
    pub face_loss_dip_secs: f32,
    /// Visibility of the nod flash (ms)
    pub flash_ms: i64,
    /// Lower bound on frame delta for velocity (seconds)
    pub min_dt_secs: f32,
}

impl Default for NodConfig {
    fn default() -> Self {
        Self {
            smoothing_alpha: 0.25,
            baseline_beta: 0.02,
            dip_threshold: 0.035,
            velocity_threshold: 0.08,
            min_dip_secs: 0.10,
            peak_confirm: 0.045,
            cooldown_secs: 1.0,
            window_secs: 15.0,
            dip_abandon_secs: 1.5,
            face_loss_grace_secs: 0.6,
            face_loss_dip_secs: 0.7,
            flash_ms: 400,
            min_dt_secs: 0.001,
        }
    }
}

/// Sustained eye closure warnings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarningConfig {
    /// Closure time that raises a warning (seconds)
    pub warning_closed_secs: f32,
    /// Closure time that raises a long-close event (seconds)
    pub long_closed_secs: f32,
    /// Short counting window (seconds)
    pub short_window_secs: f32,
    /// Long counting window, also the history retention (seconds)
    pub long_window_secs: f32,
    /// Episodes in the short window that trip the alarm
    pub short_window_trip: usize,
    /// Episodes in the long window that trip the alarm
    pub long_window_trip: usize,
}

impl Default for WarningConfig {
    fn default() -> Self {
        Self {
            warning_closed_secs: 2.0,
            long_closed_secs: 4.0,
            short_window_secs: 60.0,
            long_window_secs: 180.0,
            short_window_trip: 2,
            long_window_trip: 3,
        }
    }
}

/// Drowsiness state machine timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateMachineConfig {
    /// Absence after which the face counts as lost (ms)
    pub face_present_timeout_ms: i64,
    /// Continuous eyes-open time that confirms wakefulness (ms)
    pub eyes_open_confirm_ms: i64,
    /// Time per escalation level (ms)
    pub escalation_step_ms: i64,
    /// Highest escalation level
    pub max_alert_level: u32,
    /// Re-alert cooldown indexed by level; the last entry covers higher levels (ms)
    pub alert_cooldown_ms: Vec<i64>,
}

impl Default for StateMachineConfig {
    fn default() -> Self {
        Self {
            face_present_timeout_ms: 800,
            eyes_open_confirm_ms: 1200,
            escalation_step_ms: 5000,
            max_alert_level: 5,
            alert_cooldown_ms: vec![10_000, 8_000, 6_000, 4_000, 2_000, 1_500],
        }
    }
}

impl StateMachineConfig {
    /// Re-alert cooldown for an escalation level (ms)
    pub fn cooldown_ms(&self, level: u32) -> i64 {
        self.alert_cooldown_ms
            .get(level as usize)
            .or_else(|| self.alert_cooldown_ms.last())
            .copied()
            .unwrap_or(0)
    }
}

/// DMS configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DmsConfig {
    pub landmarks: LandmarkIndices,
    pub blink: BlinkConfig,
    pub yawn: YawnConfig,
    pub nod: NodConfig,
    pub warning: WarningConfig,
    pub state_machine: StateMachineConfig,
    pub alarm: AlarmConfig,
    /// How long DROWSY stays displayed after the alarm was last active (ms)
    pub drowsy_display_ms: i64,
}

impl Default for DmsConfig {
    fn default() -> Self {
        Self {
            landmarks: LandmarkIndices::default(),
            blink: BlinkConfig::default(),
            yawn: YawnConfig::default(),
            nod: NodConfig::default(),
            warning: WarningConfig::default(),
            state_machine: StateMachineConfig::default(),
            alarm: AlarmConfig::default(),
            drowsy_display_ms: 4000,
        }
    }
}

impl DmsConfig {
    /// Create strict config (lower thresholds)
    pub fn strict() -> Self {
        Self {
            blink: BlinkConfig {
                ear_threshold: 0.23,
                ..Default::default()
            },
            warning: WarningConfig {
                warning_closed_secs: 1.5,
                long_closed_secs: 3.0,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Create lenient config (higher thresholds)
    pub fn lenient() -> Self {
        Self {
            blink: BlinkConfig {
                ear_threshold: 0.19,
                ..Default::default()
            },
            warning: WarningConfig {
                warning_closed_secs: 2.5,
                long_closed_secs: 5.0,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Load from a config file layered with `DMS__*` environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DmsError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("DMS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: DmsConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the detectors cannot work with
    pub fn validate(&self) -> Result<(), DmsError> {
        fn positive(name: &str, value: f32) -> Result<(), DmsError> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(DmsError::Config(format!("{} must be positive, got {}", name, value)))
            }
        }

        positive("blink.ear_threshold", self.blink.ear_threshold)?;
        positive("yawn.start_threshold", self.yawn.start_threshold)?;
        positive("yawn.end_threshold", self.yawn.end_threshold)?;
        positive("nod.smoothing_alpha", self.nod.smoothing_alpha)?;
        positive("nod.baseline_beta", self.nod.baseline_beta)?;
        positive("nod.min_dt_secs", self.nod.min_dt_secs)?;
        positive("warning.warning_closed_secs", self.warning.warning_closed_secs)?;
        positive("alarm.min_interval_secs", self.alarm.min_interval_secs)?;

        if self.blink.min_frames == 0 || self.yawn.min_frames == 0 {
            return Err(DmsError::Config("debounce frame counts must be at least 1".into()));
        }
        if self.yawn.end_threshold >= self.yawn.start_threshold {
            return Err(DmsError::Config(format!(
                "yawn.end_threshold ({}) must be below yawn.start_threshold ({})",
                self.yawn.end_threshold, self.yawn.start_threshold
            )));
        }
        if self.nod.smoothing_alpha > 1.0 || self.nod.baseline_beta > 1.0 {
            return Err(DmsError::Config("nod EMA weights must be within (0, 1]".into()));
        }
        if self.warning.long_closed_secs < self.warning.warning_closed_secs {
            return Err(DmsError::Config(
                "warning.long_closed_secs must not be shorter than warning.warning_closed_secs".into(),
            ));
        }
        if self.warning.short_window_secs > self.warning.long_window_secs {
            return Err(DmsError::Config(
                "warning.short_window_secs must not exceed warning.long_window_secs".into(),
            ));
        }
        if self.state_machine.escalation_step_ms <= 0 {
            return Err(DmsError::Config("state_machine.escalation_step_ms must be positive".into()));
        }
        if self.state_machine.alert_cooldown_ms.is_empty() {
            return Err(DmsError::Config("state_machine.alert_cooldown_ms must not be empty".into()));
        }
        if self.alarm.min_interval_secs > self.alarm.start_interval_secs {
            return Err(DmsError::Config(
                "alarm.min_interval_secs must not exceed alarm.start_interval_secs".into(),
            ));
        }

        Ok(())
    }
}
