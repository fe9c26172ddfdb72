//! Subsystem trait.
//!
//! RULE: Every tick step implements SimSubsystem.
//! The engine calls update() on each registered subsystem
//! in registration order, every tick.
//! Execution order is fixed and documented in engine.rs.

use crate::{
    catalog::Catalogs,
    config::SimConfig,
    error::SimResult,
    event::SimEvent,
    rng::RngBank,
    state::PlanetState,
    types::Tick,
};

/// What a subsystem may see and touch during one tick.
pub struct TickContext<'a> {
    /// The tick being computed (tick_count + 1 until the tick finishes).
    pub tick: Tick,
    pub state: &'a mut PlanetState,
    pub catalogs: &'a Catalogs,
    pub config: &'a SimConfig,
}

/// The contract every subsystem must fulfill.
pub trait SimSubsystem: Send {
    /// Unique stable name for this subsystem.
    fn name(&self) -> &'static str;

    /// Called once per tick by the engine.
    ///
    /// - `ctx`: the state and read-only data for this tick
    /// - `rng`: the session's RNG bank; a subsystem only draws
    ///          from the slots it owns
    ///
    /// Returns the events to add to the tick's event log.
    fn update(&mut self, ctx: &mut TickContext<'_>, rng: &mut RngBank) -> SimResult<Vec<SimEvent>>;
}
