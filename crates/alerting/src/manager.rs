//! Alarm Manager Implementation

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::clock::{deadline_ms, elapsed_ms, secs_to_ms};

/// Alarm configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlarmConfig {
    /// Beep interval at level 0 (seconds)
    pub start_interval_secs: f32,
    /// Shortest beep interval at high levels (seconds)
    pub min_interval_secs: f32,
    /// Continuous risky time per escalation step (seconds)
    pub accel_every_secs: f32,
    /// Interval reduction per level (seconds)
    pub accel_rate_secs: f32,
    /// Highest escalation level
    pub max_level: u32,
    /// Continuous awake time that disarms the alarm on its own (seconds)
    pub stable_awake_secs: f32,
    /// Re-beep interval while the driver is awake but not yet stable (ms)
    pub awake_beep_interval_ms: i64,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            start_interval_secs: 3.0,
            min_interval_secs: 0.5,
            accel_every_secs: 2.0,
            accel_rate_secs: 0.4,
            max_level: 10,
            stable_awake_secs: 2.0,
            awake_beep_interval_ms: 1000,
        }
    }
}

impl AlarmConfig {
    /// Beep interval for an escalation level (ms)
    pub fn interval_ms(&self, level: u32) -> i64 {
        let secs = (self.start_interval_secs - level as f32 * self.accel_rate_secs)
            .max(self.min_interval_secs);
        secs_to_ms(secs)
    }
}

/// Tone pattern the caller should play this frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BeepPattern {
    Single,
    Double,
    Triple,
}

impl BeepPattern {
    /// Pattern for an escalation level
    pub fn for_level(level: u32) -> Self {
        match level {
            0..=1 => BeepPattern::Single,
            2..=4 => BeepPattern::Double,
            _ => BeepPattern::Triple,
        }
    }
}

/// Alarm output for one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmState {
    /// Alarm is armed
    pub active: bool,
    /// Escalation level (0..=max_level)
    pub level: u32,
    /// Beep command issued this frame
    #[serde(skip_serializing_if = "Option::is_none")]
    pub beep: Option<BeepPattern>,
}

/// Escalating alarm scheduler.
///
/// Arms on an external activation signal, escalates while the driver stays
/// risky, and disarms either on a forced stop or after the driver has been
/// awake long enough on their own.
#[derive(Debug, Clone)]
pub struct AlarmManager {
    config: AlarmConfig,
    active: bool,
    level: u32,
    next_alarm_ms: i64,
    awake_since_ms: Option<i64>,
    last_risky_ms: Option<i64>,
}

impl AlarmManager {
    /// Create a new alarm manager
    pub fn new(config: AlarmConfig) -> Self {
        debug!("Creating alarm manager with config: {:?}", config);
        Self {
            config,
            active: false,
            level: 0,
            next_alarm_ms: 0,
            awake_since_ms: None,
            last_risky_ms: None,
        }
    }

    /// Advance the alarm by one frame
    pub fn update(
        &mut self,
        awake: bool,
        risky: bool,
        now_ms: i64,
        should_activate: bool,
        should_stop: bool,
    ) -> AlarmState {
        if should_stop && self.active {
            info!("Stopping alarm (driver confirmed awake)");
            self.disarm();
            return self.snapshot(None);
        }

        if !self.active && should_activate {
            info!("Activating alarm");
            self.active = true;
            self.level = 0;
            self.next_alarm_ms = now_ms;
            self.awake_since_ms = None;
            self.last_risky_ms = Some(now_ms);
        }

        if !self.active {
            return self.snapshot(None);
        }

        let mut beep = None;

        if awake {
            let since = *self.awake_since_ms.get_or_insert(now_ms);
            if elapsed_ms(since, now_ms) >= secs_to_ms(self.config.stable_awake_secs) {
                info!("Alarm disarmed after {}ms of stable wakefulness", elapsed_ms(since, now_ms));
                self.disarm();
            } else if now_ms >= self.next_alarm_ms {
                beep = Some(BeepPattern::Triple);
                self.next_alarm_ms = deadline_ms(now_ms, self.config.awake_beep_interval_ms);
            }
        } else {
            self.awake_since_ms = None;

            if risky {
                match self.last_risky_ms {
                    None => self.last_risky_ms = Some(now_ms),
                    Some(last)
                        if elapsed_ms(last, now_ms) >= secs_to_ms(self.config.accel_every_secs) =>
                    {
                        self.level = (self.level + 1).min(self.config.max_level);
                        self.last_risky_ms = Some(now_ms);
                        debug!("Alarm escalated to level {}", self.level);
                    }
                    Some(_) => {}
                }

                if now_ms >= self.next_alarm_ms {
                    beep = Some(BeepPattern::for_level(self.level));
                    self.next_alarm_ms = deadline_ms(now_ms, self.config.interval_ms(self.level));
                }
            }
        }

        self.snapshot(beep)
    }

    /// Whether the alarm is armed
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Current escalation level
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Return to the initial, disarmed state
    pub fn reset(&mut self) {
        self.disarm();
    }

    fn disarm(&mut self) {
        self.active = false;
        self.level = 0;
        self.next_alarm_ms = 0;
        self.awake_since_ms = None;
        self.last_risky_ms = None;
    }

    fn snapshot(&self, beep: Option<BeepPattern>) -> AlarmState {
        AlarmState {
            active: self.active,
            level: self.level,
            beep,
        }
    }
}

impl Default for AlarmManager {
    fn default() -> Self {
        Self::new(AlarmConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Feed risky frames every `step` ms over `[from, to]`
    fn run_risky(manager: &mut AlarmManager, from: i64, to: i64, step: i64) -> Vec<(i64, AlarmState)> {
        (from..=to)
            .step_by(step as usize)
            .map(|t| (t, manager.update(false, true, t, false, false)))
            .collect()
    }

    #[test]
    fn test_inactive_without_activation() {
        let mut manager = AlarmManager::default();
        let state = manager.update(false, true, 0, false, false);

        assert!(!state.active);
        assert_eq!(state.beep, None);
    }

    #[test]
    fn test_activation_beeps_immediately() {
        let mut manager = AlarmManager::default();
        let state = manager.update(false, true, 1_000, true, false);

        assert!(state.active);
        assert_eq!(state.level, 0);
        assert_eq!(state.beep, Some(BeepPattern::Single));

        // Next beep at start interval (3.0s)
        assert_eq!(manager.update(false, true, 3_999, false, false).beep, None);
        assert!(manager.update(false, true, 4_000, false, false).beep.is_some());
    }

    #[test]
    fn test_escalation_every_two_seconds() {
        let mut manager = AlarmManager::default();
        manager.update(false, true, 0, true, false);

        let frames = run_risky(&mut manager, 100, 30_000, 100);
        for (t, state) in frames {
            let expected = (t / 2_000).min(10) as u32;
            assert_eq!(state.level, expected, "level at t={}", t);
        }
        assert_eq!(manager.level(), 10);
    }

    #[test]
    fn test_beep_pattern_tiers() {
        assert_eq!(BeepPattern::for_level(0), BeepPattern::Single);
        assert_eq!(BeepPattern::for_level(1), BeepPattern::Single);
        assert_eq!(BeepPattern::for_level(2), BeepPattern::Double);
        assert_eq!(BeepPattern::for_level(4), BeepPattern::Double);
        assert_eq!(BeepPattern::for_level(5), BeepPattern::Triple);
        assert_eq!(BeepPattern::for_level(10), BeepPattern::Triple);
    }

    #[test]
    fn test_interval_shrinks_to_minimum() {
        let config = AlarmConfig::default();

        assert_eq!(config.interval_ms(0), 3_000);
        assert_eq!(config.interval_ms(1), 2_600);
        assert_eq!(config.interval_ms(5), 1_000);
        assert_eq!(config.interval_ms(7), 500);
        assert_eq!(config.interval_ms(10), 500);
    }

    #[test]
    fn test_schedule_saturates_at_clock_end() {
        let mut manager = AlarmManager::default();
        let start = i64::MAX - 1_000;

        let first = manager.update(false, true, start, true, false);
        assert!(first.active);
        assert_eq!(first.beep, Some(BeepPattern::Single));

        // Next beep would land past i64::MAX; it is pinned there instead
        let later = manager.update(false, true, i64::MAX - 1, false, false);
        assert!(later.active);
        assert_eq!(later.beep, None);
        assert_eq!(manager.next_alarm_ms, i64::MAX);

        let awake = manager.update(true, false, i64::MAX, false, false);
        assert_eq!(awake.beep, Some(BeepPattern::Triple));
    }

    #[test]
    fn test_force_stop_clears_state() {
        let mut manager = AlarmManager::default();
        manager.update(false, true, 0, true, false);
        run_risky(&mut manager, 100, 6_000, 100);
        assert!(manager.level() > 0);

        let state = manager.update(false, true, 6_100, true, true);
        assert_eq!(state, AlarmState::default());
        assert!(!manager.is_active());
    }

    #[test]
    fn test_stop_ignored_when_inactive() {
        let mut manager = AlarmManager::default();

        // Stop has nothing to stop, activation still arms
        let state = manager.update(false, true, 0, true, true);
        assert!(state.active);
    }

    #[test]
    fn test_stable_awake_disarms() {
        let mut manager = AlarmManager::default();

        // Awake but not yet stable: fast triple beeps capped at 1/s
        let state = manager.update(true, false, 0, true, false);
        assert!(state.active);
        assert_eq!(state.beep, Some(BeepPattern::Triple));
        assert_eq!(manager.update(true, false, 900, false, false).beep, None);
        assert_eq!(
            manager.update(true, false, 1_000, false, false).beep,
            Some(BeepPattern::Triple)
        );

        assert!(manager.update(true, false, 1_999, false, false).active);
        let state = manager.update(true, false, 2_000, false, false);
        assert!(!state.active);
        assert_eq!(state.level, 0);
    }

    #[test]
    fn test_risky_frame_restarts_awake_timer() {
        let mut manager = AlarmManager::default();
        manager.update(false, true, 0, true, false);

        manager.update(true, false, 100, false, false);
        manager.update(false, true, 1_500, false, false);
        manager.update(true, false, 1_600, false, false);

        // 2.0s after 100 but only 0.5s after restart
        assert!(manager.update(true, false, 2_100, false, false).active);
        assert!(!manager.update(true, false, 3_600, false, false).active);
    }

    proptest! {
        #[test]
        fn prop_level_within_bounds(
            frames in prop::collection::vec(
                (any::<bool>(), any::<bool>(), any::<bool>(), any::<bool>(), 0i64..3_000),
                1..200,
            )
        ) {
            let mut manager = AlarmManager::default();
            let mut now = 0i64;
            for (awake, risky, activate, stop, dt) in frames {
                now += dt;
                let state = manager.update(awake, risky, now, activate, stop);
                prop_assert!(state.level <= 10);
                if !state.active {
                    prop_assert_eq!(state.level, 0);
                }
            }
        }
    }
}
