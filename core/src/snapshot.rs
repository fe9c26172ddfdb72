//! Snapshot serialization: full session state to/from JSON.
//!
//! A snapshot is taken every `snapshot_interval` ticks and on demand.
//! It captures everything needed to resume from that tick without
//! replaying from tick 0: the planet, the RNG positions, the clock.

use crate::{
    clock::{SchedulerState, SimSpeed},
    error::SimResult,
    rng::RngBankState,
    state::PlanetState,
    types::{RunId, Tick},
};
use serde::{Deserialize, Serialize};

/// Bumped whenever the layout below changes incompatibly.
pub const SNAPSHOT_FORMAT: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub format: u32,
    pub run_id: RunId,
    pub tick: Tick,
    pub planet: PlanetState,
    pub rng: RngBankState,
    pub scheduler: SchedulerState,
    pub speed: SimSpeed,
}

impl SessionSnapshot {
    pub fn to_json(&self) -> SimResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> SimResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
