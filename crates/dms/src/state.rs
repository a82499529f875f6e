//! Drowsiness state machine
//!
//! A nod puts the driver into `DrowsyActive`, which re-alerts on an
//! escalating cooldown until the driver shows their face with eyes open
//! continuously for the confirmation period.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::StateMachineConfig;
use crate::window::elapsed_ms;

/// Driver state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DrowsyState {
    #[default]
    Awake,
    /// Reserved; never entered
    DrowsyPending,
    DrowsyActive,
}

/// State machine decision for one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateOutput {
    pub state: DrowsyState,
    pub should_alert: bool,
    pub should_stop_alert: bool,
    pub alert_level: u32,
}

impl StateOutput {
    fn quiet(state: DrowsyState) -> Self {
        Self {
            state,
            should_alert: false,
            should_stop_alert: false,
            alert_level: 0,
        }
    }
}

/// Drowsiness state machine (one per detection session)
#[derive(Debug, Clone)]
pub struct DrowsinessStateMachine {
    config: StateMachineConfig,
    state: DrowsyState,
    drowsy_since_ms: Option<i64>,
    last_alert_ms: Option<i64>,
    alert_level: u32,
    /// Level at the last alert; selects the current re-alert cooldown
    cooldown_level: u32,
    last_face_seen_ms: Option<i64>,
    face_lost_since_ms: Option<i64>,
    awake_confirm_since_ms: Option<i64>,
}

impl DrowsinessStateMachine {
    pub fn new(config: StateMachineConfig) -> Self {
        Self {
            config,
            state: DrowsyState::Awake,
            drowsy_since_ms: None,
            last_alert_ms: None,
            alert_level: 0,
            cooldown_level: 0,
            last_face_seen_ms: None,
            face_lost_since_ms: None,
            awake_confirm_since_ms: None,
        }
    }

    /// Advance by one frame
    pub fn update(
        &mut self,
        face_detected: bool,
        eyes_open: bool,
        nod_event: bool,
        now_ms: i64,
    ) -> StateOutput {
        self.track_face(face_detected, now_ms);

        match self.state {
            DrowsyState::Awake if nod_event => {
                info!("Nod detected, entering DROWSY_ACTIVE");
                self.state = DrowsyState::DrowsyActive;
                self.drowsy_since_ms = Some(now_ms);
                self.last_alert_ms = Some(now_ms);
                self.alert_level = 0;
                self.cooldown_level = 0;
                self.awake_confirm_since_ms = None;
                StateOutput {
                    state: self.state,
                    should_alert: true,
                    should_stop_alert: false,
                    alert_level: 0,
                }
            }
            DrowsyState::Awake | DrowsyState::DrowsyPending => StateOutput::quiet(self.state),
            DrowsyState::DrowsyActive => self.update_active(face_detected, eyes_open, now_ms),
        }
    }

    fn track_face(&mut self, face_detected: bool, now_ms: i64) {
        if face_detected {
            self.last_face_seen_ms = Some(now_ms);
            self.face_lost_since_ms = None;
        } else if self.face_lost_since_ms.is_none() && self.last_face_seen_ms.is_some() {
            self.face_lost_since_ms = Some(now_ms);
        }
    }

    fn update_active(&mut self, face_detected: bool, eyes_open: bool, now_ms: i64) -> StateOutput {
        let face_lost = self.face_lost(now_ms);

        if face_detected && eyes_open {
            let since = *self.awake_confirm_since_ms.get_or_insert_with(|| {
                debug!("Awake confirmation started");
                now_ms
            });

            let confirmed_ms = elapsed_ms(since, now_ms);
            if confirmed_ms >= self.config.eyes_open_confirm_ms {
                info!(confirmed_ms, "Awake confirmed, leaving DROWSY_ACTIVE");
                self.clear_drowsy();
                return StateOutput {
                    state: self.state,
                    should_alert: false,
                    should_stop_alert: true,
                    alert_level: 0,
                };
            }
        } else if self.awake_confirm_since_ms.take().is_some() {
            if face_lost {
                debug!("Awake confirmation interrupted: face lost");
            } else if !eyes_open {
                debug!("Awake confirmation interrupted: eyes closed");
            } else {
                debug!("Awake confirmation interrupted: face not detected");
            }
        }

        let drowsy_ms = self.drowsy_since_ms.map_or(0, |since| elapsed_ms(since, now_ms));
        self.alert_level = self.level_for(drowsy_ms);

        let since_alert = self
            .last_alert_ms
            .map_or(i64::MAX, |last| elapsed_ms(last, now_ms));
        let should_alert = since_alert >= self.config.cooldown_ms(self.cooldown_level);

        if should_alert {
            self.last_alert_ms = Some(now_ms);
            self.cooldown_level = self.alert_level;
            let reason = if face_lost {
                "face lost"
            } else if !eyes_open {
                "eyes closed"
            } else {
                "eyes not confirmed open"
            };
            debug!(level = self.alert_level, reason, "DROWSY_ACTIVE re-alert");
        }

        StateOutput {
            state: self.state,
            should_alert,
            should_stop_alert: false,
            alert_level: self.alert_level,
        }
    }

    fn level_for(&self, drowsy_ms: i64) -> u32 {
        let steps = drowsy_ms / self.config.escalation_step_ms.max(1);
        steps.min(self.config.max_alert_level as i64) as u32
    }

    fn clear_drowsy(&mut self) {
        self.state = DrowsyState::Awake;
        self.drowsy_since_ms = None;
        self.last_alert_ms = None;
        self.alert_level = 0;
        self.cooldown_level = 0;
        self.awake_confirm_since_ms = None;
    }

    /// Face has been missing longer than the presence timeout
    pub fn face_lost(&self, now_ms: i64) -> bool {
        self.face_lost_since_ms
            .is_some_and(|since| elapsed_ms(since, now_ms) > self.config.face_present_timeout_ms)
    }

    pub fn state(&self) -> DrowsyState {
        self.state
    }

    pub fn alert_level(&self) -> u32 {
        self.alert_level
    }

    /// Back to `Awake` with all timers cleared
    pub fn reset(&mut self) {
        info!("State machine reset");
        *self = Self::new(self.config.clone());
    }
}

impl Default for DrowsinessStateMachine {
    fn default() -> Self {
        Self::new(StateMachineConfig::default())
    }
}
