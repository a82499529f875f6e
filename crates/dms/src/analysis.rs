//! DMS analysis results

use alerting::{AlarmState, BeepPattern};
use serde::{Deserialize, Serialize};

use crate::geometry::Metrics;
use crate::nod::NodResult;
use crate::state::DrowsyState;
use crate::warning::WarningResult;

/// Alert classification shown to the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertLevel {
    #[default]
    Normal,
    Warning,
    Drowsy,
}

/// Face measurements and running event counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FaceMetrics {
    #[serde(flatten)]
    pub ratios: Metrics,
    pub blink_count: u32,
    pub yawn_count: u32,
    pub nod_count: u32,
    /// Length of the current eye closure
    pub eyes_closed_secs: f32,
}

/// Complete per-frame analysis result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DmsAnalysis {
    pub timestamp_ms: i64,

    /// Whether a face was detected
    pub face_detected: bool,

    /// Face measurements (if detected)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<FaceMetrics>,

    /// Fused alert classification
    pub alert_level: AlertLevel,

    pub blink_detected: bool,
    pub yawn_detected: bool,
    pub nod: NodResult,
    pub warning: WarningResult,

    /// Alarm activation requested this frame
    pub should_activate_alarm: bool,
    /// Alarm stop requested this frame (driver confirmed awake)
    pub should_stop_alarm: bool,

    /// Face visible with eyes open
    pub awake: bool,
    /// Eyes closed or face missing
    pub risky: bool,

    /// Alarm manager output after this frame
    pub alarm: AlarmState,

    /// Raw state machine state
    pub state: DrowsyState,
    /// Raw state machine escalation level
    pub state_level: u32,
}

impl DmsAnalysis {
    /// Check if the driver should currently be treated as drowsy
    pub fn is_drowsy(&self) -> bool {
        self.alert_level == AlertLevel::Drowsy
    }

    /// Beep the caller should play for this frame
    pub fn beep(&self) -> Option<BeepPattern> {
        self.alarm.beep
    }

    /// Any discrete event fired on this frame
    pub fn has_events(&self) -> bool {
        self.blink_detected
            || self.yawn_detected
            || self.nod.nod_detected
            || self.warning.new_warning_event
            || self.warning.long_close
    }
}
