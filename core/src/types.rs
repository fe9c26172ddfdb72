//! Shared primitive types used across the entire simulation.

/// A simulation tick. The engine has no wall-clock notion of time.
pub type Tick = u64;

/// Identifier of a technology catalog entry.
pub type TechId = String;

/// Identifier of an event catalog entry.
pub type EventId = String;

/// Building kind, e.g. `"solar_panel"`. Opaque outside the balance config.
pub type BuildingKind = String;

/// Planet identifier, e.g. `"Mars"`. Fixed for a session.
pub type PlanetKind = String;

/// The canonical run identifier used by the journal.
pub type RunId = String;
