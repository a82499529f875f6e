//! Alerting System
//!
//! Escalating alarm scheduling for the drowsiness pipeline. The manager only
//! decides *when* and *how loud* to beep; playing the tone is left to the caller.

pub mod clock;
mod manager;

pub use manager::{AlarmConfig, AlarmManager, AlarmState, BeepPattern};
