//! Terra core: a deterministic, tick-driven terraforming simulation.
//!
//! The engine owns one `PlanetState` per session and advances it in
//! fixed steps against read-only catalogs of technologies, random
//! events and planets. Everything a UI needs arrives as `SimEvent`s.

pub mod catalog;
pub mod clock;
pub mod command;
pub mod config;
pub mod effect_subsystem;
pub mod engine;
pub mod error;
pub mod event;
pub mod event_catalog;
pub mod event_subsystem;
pub mod research_subsystem;
pub mod rng;
pub mod snapshot;
pub mod state;
pub mod store;
pub mod subsystem;
pub mod tech_tree;
pub mod types;
