//! Scheduler state machine and speed control.

use crate::{
    error::{SimError, SimResult},
    state::GaugeKind,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// Every gauge inside its vivable band.
    Win,
    /// A gauge reached a catastrophic bound with population present.
    Loss { gauge: GaugeKind, value: f64 },
    Abandoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SchedulerState {
    Running,
    Paused,
    Ended { outcome: Outcome },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimClock {
    pub state: SchedulerState,
    pub speed: SimSpeed,
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SimClock {
    /// A fresh session starts running.
    pub fn new() -> Self {
        Self {
            state: SchedulerState::Running,
            speed: SimSpeed::Normal,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == SchedulerState::Running
    }

    pub fn is_ended(&self) -> bool {
        matches!(self.state, SchedulerState::Ended { .. })
    }

    pub fn outcome(&self) -> Option<Outcome> {
        match self.state {
            SchedulerState::Ended { outcome } => Some(outcome),
            _ => None,
        }
    }

    /// Fails with `InvalidState` once the session has ended.
    pub fn ensure_not_ended(&self, operation: &'static str) -> SimResult<()> {
        if self.is_ended() {
            return Err(SimError::InvalidState {
                operation,
                state: self.state,
            });
        }
        Ok(())
    }

    pub fn pause(&mut self) -> SimResult<()> {
        self.ensure_not_ended("pause")?;
        self.state = SchedulerState::Paused;
        Ok(())
    }

    pub fn resume(&mut self) -> SimResult<()> {
        self.ensure_not_ended("resume")?;
        self.state = SchedulerState::Running;
        Ok(())
    }

    pub fn end(&mut self, outcome: Outcome) {
        self.state = SchedulerState::Ended { outcome };
    }

    pub fn set_speed(&mut self, speed: SimSpeed) {
        self.speed = speed;
    }

    pub fn ticks_per_step(&self) -> u32 {
        match self.speed {
            SimSpeed::Normal => 1,
            SimSpeed::Accelerated => 2,
            SimSpeed::FastForward => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SimSpeed {
    Normal,
    Accelerated,
    FastForward,
}
