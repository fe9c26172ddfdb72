use crate::{
    clock::SchedulerState,
    types::{BuildingKind, EventId, PlanetKind, TechId},
};
use thiserror::Error;

/// Load-time failures. A session never starts on any of these.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed catalog {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Malformed entry '{entry}': {reason}")]
    Malformed { entry: String, reason: String },

    #[error("Invalid technology graph at '{tech_id}': {reason}")]
    InvalidTechGraph { tech_id: TechId, reason: String },

    #[error("Event '{event_id}' uses unknown effect key '{key}'")]
    UnknownEffectKey { event_id: EventId, key: String },

    #[error("Event '{event_id}' uses unknown requirement key '{key}'")]
    UnknownRequirementKey { event_id: EventId, key: String },
}

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Technology '{tech_id}' is not researchable")]
    NotResearchable { tech_id: TechId },

    #[error("Technology '{tech_id}' needs {required} science, {available} available")]
    InsufficientScience {
        tech_id: TechId,
        required: f64,
        available: f64,
    },

    #[error("Cannot {operation} while {state:?}")]
    InvalidState {
        operation: &'static str,
        state: SchedulerState,
    },

    #[error("Event '{event_id}' not found")]
    UnknownEvent { event_id: EventId },

    #[error("Building kind '{kind}' is not configured")]
    UnknownBuilding { kind: BuildingKind },

    #[error("Building kind '{kind}' is not unlocked")]
    BuildingLocked { kind: BuildingKind },

    #[error("Insufficient resources: need {credits} credits and {energy} energy")]
    InsufficientResources { credits: f64, energy: f64 },

    #[error("Planet '{planet}' not found")]
    UnknownPlanet { planet: PlanetKind },

    #[error("Snapshot does not match the loaded catalogs: {reason}")]
    SnapshotMismatch { reason: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type SimResult<T> = Result<T, SimError>;
