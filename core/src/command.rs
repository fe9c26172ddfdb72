use crate::{
    clock::SimSpeed,
    types::{BuildingKind, EventId, TechId},
};
use serde::{Deserialize, Serialize};

/// All player-issued commands.
/// Variants are only ever appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum PlayerCommand {
    // ── Clock control ─────────────────────────────
    Pause,
    Resume,
    SetSpeed { speed: SimSpeed },
    Abandon,

    // ── Research ──────────────────────────────────
    /// Research immediately, between ticks.
    Research { tech_id: TechId },
    /// Research during the next tick's research step.
    QueueResearch { tech_id: TechId },

    // ── Construction ──────────────────────────────
    Construct { kind: BuildingKind, count: u32 },
    Demolish { kind: BuildingKind, count: u32 },

    // ── Debug ─────────────────────────────────────
    ForceEvent { event_id: EventId },
}
