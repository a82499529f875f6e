//! Driver Monitoring System (DMS)
//!
//! Landmark-based drowsiness analysis:
//! - Eye and mouth aspect ratios
//! - Blink, yawn and head nod detection
//! - Sustained eye closure warnings
//! - Drowsy/awake state machine with escalating re-alerts
//! - Alarm escalation (via the `alerting` crate)

pub mod analysis;
pub mod config;
pub mod detector;
pub mod geometry;
pub mod nod;
pub mod state;
pub mod warning;
mod window;

pub use alerting::{AlarmConfig, AlarmManager, AlarmState, BeepPattern};
pub use analysis::{AlertLevel, DmsAnalysis, FaceMetrics};
pub use config::DmsConfig;
pub use detector::{BlinkDetector, EventCount, YawnDetector};
pub use geometry::{eye_aspect_ratio, mouth_aspect_ratio, Metrics, Point};
pub use nod::{NodDetector, NodResult};
pub use state::{DrowsinessStateMachine, DrowsyState, StateOutput};
pub use warning::{WarningAnalyzer, WarningResult};

use thiserror::Error;
use tracing::{debug, info};

use window::deadline_ms;

/// DMS error types
#[derive(Error, Debug)]
pub enum DmsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to load configuration: {0}")]
    ConfigLoad(#[from] ::config::ConfigError),

    #[error("Keypoints missing for feature calculation: need {required}, got {available}")]
    KeypointsMissing { required: usize, available: usize },
}

/// Driver monitoring module.
///
/// Runs every detector once per frame, in order, and fuses the results into a
/// single [`DmsAnalysis`]. Owns all per-session state; call [`DmsModule::reset`]
/// to start a new session without rebuilding it.
pub struct DmsModule {
    config: DmsConfig,
    blink: BlinkDetector,
    yawn: YawnDetector,
    nod: NodDetector,
    warning: WarningAnalyzer,
    state_machine: DrowsinessStateMachine,
    alarm: AlarmManager,
    drowsy_until_ms: Option<i64>,
}

impl DmsModule {
    /// Create a new DMS module with configuration
    pub fn new(config: DmsConfig) -> Result<Self, DmsError> {
        config.validate()?;
        info!("Creating DMS module");
        debug!("DMS config: {:?}", config);

        Ok(Self {
            blink: BlinkDetector::new(config.blink.clone()),
            yawn: YawnDetector::new(config.yawn.clone()),
            nod: NodDetector::new(config.nod.clone()),
            warning: WarningAnalyzer::new(config.warning.clone()),
            state_machine: DrowsinessStateMachine::new(config.state_machine.clone()),
            alarm: AlarmManager::new(config.alarm.clone()),
            drowsy_until_ms: None,
            config,
        })
    }

    pub fn config(&self) -> &DmsConfig {
        &self.config
    }

    /// Analyze a single frame.
    ///
    /// `landmarks` is `None` when no face was found. `now_ms` must be
    /// monotonic within a session.
    pub fn analyze(
        &mut self,
        landmarks: Option<&[Point]>,
        now_ms: i64,
    ) -> Result<DmsAnalysis, DmsError> {
        let mut analysis = match landmarks {
            Some(points) => self.analyze_face(points, now_ms)?,
            None => self.analyze_face_lost(now_ms),
        };

        analysis.alarm = self.alarm.update(
            analysis.awake,
            analysis.risky,
            now_ms,
            analysis.should_activate_alarm,
            analysis.should_stop_alarm,
        );

        if analysis.alarm.active {
            self.drowsy_until_ms = Some(deadline_ms(now_ms, self.config.drowsy_display_ms));
        }
        if matches!(self.drowsy_until_ms, Some(until) if now_ms < until) {
            analysis.alert_level = AlertLevel::Drowsy;
        }

        // A double nod that raised the alarm consumes the episode
        if analysis.should_activate_alarm && analysis.nod.double_nod {
            info!("Double nod alarm, clearing warning history");
            self.clear_warnings();
        }

        Ok(analysis)
    }

    fn analyze_face(&mut self, points: &[Point], now_ms: i64) -> Result<DmsAnalysis, DmsError> {
        let required = self.config.landmarks.required_len();
        if points.len() < required {
            return Err(DmsError::KeypointsMissing {
                required,
                available: points.len(),
            });
        }

        let ratios = Metrics::from_landmarks(points, &self.config.landmarks);
        let blink = self.blink.detect(ratios.left_ear, ratios.right_ear);
        let eyes_closed = self.blink.eyes_closed(ratios.left_ear, ratios.right_ear);
        let yawn = self.yawn.detect(ratios.mar);
        let nod = self.nod.update(Some(points[self.config.landmarks.nose].y), now_ms);
        let warning = self.warning.update(eyes_closed, now_ms);
        let output = self.state_machine.update(true, !eyes_closed, nod.nod_detected, now_ms);

        let trips = &self.config.warning;
        let should_activate_alarm = output.should_alert
            || warning.long_close
            || warning.warnings_short >= trips.short_window_trip
            || warning.warnings_long >= trips.long_window_trip;

        Ok(DmsAnalysis {
            timestamp_ms: now_ms,
            face_detected: true,
            metrics: Some(FaceMetrics {
                ratios,
                blink_count: blink.count,
                yawn_count: yawn.count,
                nod_count: nod.nod_count,
                eyes_closed_secs: warning.eyes_closed_secs,
            }),
            alert_level: if warning.warning_active {
                AlertLevel::Warning
            } else {
                AlertLevel::Normal
            },
            blink_detected: blink.detected,
            yawn_detected: yawn.detected,
            nod,
            warning,
            should_activate_alarm,
            should_stop_alarm: output.should_stop_alert,
            awake: !eyes_closed,
            risky: eyes_closed,
            alarm: AlarmState::default(),
            state: output.state,
            state_level: output.alert_level,
        })
    }

    fn analyze_face_lost(&mut self, now_ms: i64) -> DmsAnalysis {
        let nod = self.nod.update(None, now_ms);
        // Eyes count as closed so a missing face never confirms wakefulness
        let output = self.state_machine.update(false, false, nod.nod_detected, now_ms);

        DmsAnalysis {
            timestamp_ms: now_ms,
            face_detected: false,
            metrics: None,
            alert_level: AlertLevel::Normal,
            blink_detected: false,
            yawn_detected: false,
            nod,
            warning: WarningResult::default(),
            should_activate_alarm: output.should_alert,
            should_stop_alarm: output.should_stop_alert,
            awake: false,
            risky: true,
            alarm: AlarmState::default(),
            state: output.state,
            state_level: output.alert_level,
        }
    }

    /// Forget warning episodes and recent nods and return the state machine to awake
    pub fn clear_warnings(&mut self) {
        self.warning.clear_history();
        self.nod.clear_nod_times();
        self.state_machine.reset();
    }

    /// Current state machine state
    pub fn state(&self) -> DrowsyState {
        self.state_machine.state()
    }

    /// Whether the alarm is armed
    pub fn alarm_active(&self) -> bool {
        self.alarm.is_active()
    }

    /// Reset all session state (on driver change or restart)
    pub fn reset(&mut self) {
        info!("Resetting DMS session state");
        self.blink.reset();
        self.yawn.reset();
        self.nod.reset();
        self.warning.reset();
        self.state_machine.reset();
        self.alarm.reset();
        self.drowsy_until_ms = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = DmsConfig::default();
        config.blink.min_frames = 0;

        assert!(matches!(DmsModule::new(config), Err(DmsError::Config(_))));
    }

    #[test]
    fn test_short_landmark_list_is_an_error() {
        let mut module = DmsModule::new(DmsConfig::default()).unwrap();
        let points = vec![Point::new(0.5, 0.5); 100];

        match module.analyze(Some(&points), 0) {
            Err(DmsError::KeypointsMissing { required, available }) => {
                assert_eq!(required, 388);
                assert_eq!(available, 100);
            }
            other => panic!("expected KeypointsMissing, got {:?}", other.map(|a| a.face_detected)),
        }
    }

    #[test]
    fn test_face_lost_frame() {
        let mut module = DmsModule::new(DmsConfig::default()).unwrap();
        let analysis = module.analyze(None, 0).unwrap();

        assert!(!analysis.face_detected);
        assert!(analysis.metrics.is_none());
        assert!(analysis.risky);
        assert!(!analysis.awake);
        assert!(!analysis.should_activate_alarm);
        assert!(!analysis.alarm.active);
        assert_eq!(analysis.alert_level, AlertLevel::Normal);
        assert_eq!(analysis.state, DrowsyState::Awake);
    }

    fn closed_eyes_face() -> Vec<Point> {
        let indices = crate::config::LandmarkIndices::default();
        let mut points = vec![Point::new(0.5, 0.5); 468];
        for (eye, x0) in [(indices.left_eye, 0.3f32), (indices.right_eye, 0.6)] {
            let layout = [
                (0.0, 0.0),
                (0.03, -0.005),
                (0.07, -0.005),
                (0.1, 0.0),
                (0.07, 0.005),
                (0.03, 0.005),
            ];
            for (idx, (dx, dy)) in eye.iter().zip(layout) {
                points[*idx] = Point::new(x0 + dx, 0.4 + dy);
            }
        }
        points
    }

    #[test]
    fn test_long_closure_near_clock_end() {
        let mut module = DmsModule::new(DmsConfig::default()).unwrap();
        let points = closed_eyes_face();
        let start = i64::MAX - 4_500;

        let last = (0..=44)
            .map(|i| module.analyze(Some(&points), start + i * 100).unwrap())
            .last()
            .unwrap();

        assert!(last.alarm.active);
        assert_eq!(last.alert_level, AlertLevel::Drowsy);
        assert_eq!(module.drowsy_until_ms, Some(i64::MAX));
    }

    #[test]
    fn test_degenerate_face_reads_awake() {
        let mut module = DmsModule::new(DmsConfig::default()).unwrap();
        let points = vec![Point::new(0.5, 0.5); 468];

        for t in (0..3_000).step_by(100) {
            let analysis = module.analyze(Some(&points), t).unwrap();
            assert!(analysis.awake);
            assert!(!analysis.yawn_detected);
            assert_eq!(analysis.metrics.unwrap().ratios.left_ear, None);
        }
    }
}
