//! The event bus: everything that happened during a tick.
//!
//! RULE: Subsystems report through events; they never call each other.
//! The engine hands the collected events to the caller and, when a
//! store is attached, appends each one to the journal.

use crate::{
    clock::Outcome,
    event_catalog::EventCategory,
    state::ResourceKind,
    types::{BuildingKind, EventId, RunId, TechId, Tick},
};
use serde::{Deserialize, Serialize};

/// Every event emitted during simulation.
/// Variants are only ever appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimEvent {
    // ── Engine events ──────────────────────────────
    RunInitialized {
        run_id: RunId,
        seed: u64,
        planet: String,
    },
    TickStarted {
        tick: Tick,
    },
    TickCompleted {
        tick: Tick,
        habitability: f64,
    },
    SessionEnded {
        tick: Tick,
        outcome: Outcome,
    },

    // ── Research ───────────────────────────────────
    ResearchCompleted {
        tick: Tick,
        tech_id: TechId,
        unlocks: Vec<String>,
    },
    ResearchRejected {
        tick: Tick,
        tech_id: TechId,
        reason: String,
    },
    SpecialTechGranted {
        tick: Tick,
        tech_id: TechId,
        event_id: EventId,
        unlocks: Vec<String>,
    },

    // ── Catalog events ─────────────────────────────
    EventTriggered {
        tick: Tick,
        event_id: EventId,
        category: EventCategory,
        duration: u32,
    },
    EffectExpired {
        tick: Tick,
        event_id: EventId,
    },
    BuildingDamaged {
        tick: Tick,
        event_id: EventId,
        kind: BuildingKind,
    },

    // ── Economy ────────────────────────────────────
    /// A cost or consumption could only be partly paid.
    ResourceShortfall {
        tick: Tick,
        resource: ResourceKind,
        requested: f64,
        deducted: f64,
        source: String,
    },

    // ── Construction ───────────────────────────────
    BuildingsConstructed {
        tick: Tick,
        kind: BuildingKind,
        count: u32,
    },
    BuildingsDemolished {
        tick: Tick,
        kind: BuildingKind,
        count: u32,
    },
}

impl SimEvent {
    /// Stable name, used for the event_type column of the journal.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::RunInitialized { .. } => "run_initialized",
            Self::TickStarted { .. } => "tick_started",
            Self::TickCompleted { .. } => "tick_completed",
            Self::SessionEnded { .. } => "session_ended",
            Self::ResearchCompleted { .. } => "research_completed",
            Self::ResearchRejected { .. } => "research_rejected",
            Self::SpecialTechGranted { .. } => "special_tech_granted",
            Self::EventTriggered { .. } => "event_triggered",
            Self::EffectExpired { .. } => "effect_expired",
            Self::BuildingDamaged { .. } => "building_damaged",
            Self::ResourceShortfall { .. } => "resource_shortfall",
            Self::BuildingsConstructed { .. } => "buildings_constructed",
            Self::BuildingsDemolished { .. } => "buildings_demolished",
        }
    }
}

/// The event log entry as persisted to SQLite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id: Option<i64>,
    pub run_id: RunId,
    pub tick: Tick,
    pub subsystem: String,
    pub event_type: String,
    pub payload: String, // JSON-serialized SimEvent
}
