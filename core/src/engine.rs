//! The simulation engine. Owns one session and drives its tick loop.
//!
//! EXECUTION ORDER (fixed, documented, never reordered):
//!   1. Production: building output into the resource pools
//!   2. Research: drain the research queue
//!   3. Events: expire, evaluate, roll, trigger
//!   4. Settlement: terraform drift, effective gauges
//!   then: advance tick_count, evaluate win/loss.
//!
//! RULES:
//!   - `tick()` is valid only while Running.
//!   - A failed tick leaves state, RNG and journal exactly as before.
//!   - All randomness flows through the RngBank.
//!   - With a store attached, every emitted event is journalled.

use crate::{
    catalog::Catalogs,
    clock::{Outcome, SchedulerState, SimClock, SimSpeed},
    command::PlayerCommand,
    config::{GaugeLimitSet, GaugeLimits, OutcomeConfig, SimConfig},
    effect_subsystem::{habitability, refresh_gauges, ProductionSubsystem, SettlementSubsystem},
    error::{SimError, SimResult},
    event::{EventLogEntry, SimEvent},
    event_subsystem::{self, EventSubsystem},
    research_subsystem::ResearchSubsystem,
    rng::{RngBank, SubsystemSlot},
    snapshot::{SessionSnapshot, SNAPSHOT_FORMAT},
    state::{GaugeKind, InitialConditions, PlanetState, Resources},
    store::SimStore,
    subsystem::{SimSubsystem, TickContext},
    types::{RunId, Tick},
};
use std::collections::BTreeSet;
use std::sync::Arc;

const ENGINE: &str = "engine";
const SCHEDULER: &str = "scheduler";
const COMMAND: &str = "command";

pub struct SimEngine {
    pub run_id: RunId,
    clock: SimClock,
    rng_bank: RngBank,
    state: PlanetState,
    catalogs: Arc<Catalogs>,
    config: SimConfig,
    subsystems: Vec<Box<dyn SimSubsystem>>,
    store: Option<SimStore>,
}

impl SimEngine {
    /// Start a fresh session from explicit initial conditions.
    pub fn new(
        run_id: RunId,
        seed: u64,
        catalogs: Arc<Catalogs>,
        config: SimConfig,
        initial: InitialConditions,
    ) -> Self {
        log::info!(
            "Session {run_id} started on {} (seed {seed})",
            initial.planet_kind
        );
        Self::assemble(
            run_id,
            SimClock::new(),
            RngBank::new(seed),
            PlanetState::new(initial),
            catalogs,
            config,
        )
    }

    /// Start a fresh session on a catalog planet.
    pub fn for_planet(
        run_id: RunId,
        seed: u64,
        catalogs: Arc<Catalogs>,
        config: SimConfig,
        planet: &str,
    ) -> SimResult<Self> {
        let initial = InitialConditions::for_planet(&catalogs, &config, planet)?;
        Ok(Self::new(run_id, seed, catalogs, config, initial))
    }

    /// Resume a session from a snapshot. The catalogs must still know
    /// every tech and active event the snapshot refers to.
    pub fn restore(
        snapshot: SessionSnapshot,
        catalogs: Arc<Catalogs>,
        config: SimConfig,
    ) -> SimResult<Self> {
        let mismatch = |reason: String| SimError::SnapshotMismatch { reason };

        if snapshot.format != SNAPSHOT_FORMAT {
            return Err(mismatch(format!(
                "snapshot format {} (expected {SNAPSHOT_FORMAT})",
                snapshot.format
            )));
        }
        if snapshot.tick != snapshot.planet.tick_count {
            return Err(mismatch(format!(
                "snapshot tick {} disagrees with planet tick_count {}",
                snapshot.tick, snapshot.planet.tick_count
            )));
        }
        let tree = catalogs.tech_tree();
        if let Some(tech) = snapshot.planet.unlocked_techs.iter().find(|t| tree.get(t).is_none()) {
            return Err(mismatch(format!("unknown technology '{tech}'")));
        }
        if let Some(effect) = snapshot
            .planet
            .active_effects
            .iter()
            .find(|e| catalogs.event(&e.event_id).is_none())
        {
            return Err(mismatch(format!("unknown active event '{}'", effect.event_id)));
        }

        log::info!(
            "Session {} restored at tick {} ({:?})",
            snapshot.run_id,
            snapshot.tick,
            snapshot.scheduler
        );
        let clock = SimClock {
            state: snapshot.scheduler,
            speed: snapshot.speed,
        };
        Ok(Self::assemble(
            snapshot.run_id,
            clock,
            RngBank::restore(&snapshot.rng),
            snapshot.planet,
            catalogs,
            config,
        ))
    }

    fn assemble(
        run_id: RunId,
        clock: SimClock,
        rng_bank: RngBank,
        state: PlanetState,
        catalogs: Arc<Catalogs>,
        config: SimConfig,
    ) -> Self {
        // EXECUTION ORDER: fixed, documented, never reordered.
        let subsystems: Vec<Box<dyn SimSubsystem>> = vec![
            Box::new(ProductionSubsystem),
            Box::new(ResearchSubsystem),
            Box::new(EventSubsystem),
            Box::new(SettlementSubsystem),
        ];
        Self {
            run_id,
            clock,
            rng_bank,
            state,
            catalogs,
            config,
            subsystems,
            store: None,
        }
    }

    /// Attach a journal. Registers the run and, for a fresh session,
    /// journals `RunInitialized`. The store must already be migrated.
    pub fn with_store(mut self, store: SimStore, started_at: &str) -> SimResult<Self> {
        store.insert_run(
            &self.run_id,
            self.rng_bank.seed(),
            &self.state.planet_kind,
            env!("CARGO_PKG_VERSION"),
            started_at,
        )?;
        if self.state.tick_count == 0 {
            let init = SimEvent::RunInitialized {
                run_id: self.run_id.clone(),
                seed: self.rng_bank.seed(),
                planet: self.state.planet_kind.clone(),
            };
            store.append_event(&self.log_entry(ENGINE, 0, &init)?)?;
        }
        self.store = Some(store);
        Ok(self)
    }

    // ── Read access (between ticks) ────────────────────────────

    pub fn state(&self) -> &PlanetState {
        &self.state
    }

    pub fn catalogs(&self) -> &Catalogs {
        &self.catalogs
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.clock.state
    }

    pub fn store(&self) -> Option<&SimStore> {
        self.store.as_ref()
    }

    pub fn habitability(&self) -> f64 {
        habitability(&self.state.gauges, &self.config.habitability)
    }

    pub fn is_researchable(&self, tech_id: &str) -> bool {
        self.catalogs
            .tech_tree()
            .is_researchable(&self.state.unlocked_techs, tech_id)
    }

    /// Building kinds that may be constructed right now.
    pub fn unlocked_buildings(&self) -> BTreeSet<String> {
        let mut kinds = self
            .catalogs
            .tech_tree()
            .unlocked_ids(&self.state.unlocked_techs);
        kinds.retain(|kind| self.config.building(kind).is_some());
        kinds.extend(
            self.config
                .buildings
                .iter()
                .filter(|(_, spec)| spec.always_available)
                .map(|(kind, _)| kind.clone()),
        );
        kinds
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            format: SNAPSHOT_FORMAT,
            run_id: self.run_id.clone(),
            tick: self.state.tick_count,
            planet: self.state.clone(),
            rng: self.rng_bank.state(),
            scheduler: self.clock.state,
            speed: self.clock.speed,
        }
    }

    // ── Tick loop ──────────────────────────────────────────────

    /// Advance the session by exactly one tick.
    pub fn tick(&mut self) -> SimResult<Vec<SimEvent>> {
        if !self.clock.is_running() {
            return Err(SimError::InvalidState {
                operation: "tick",
                state: self.clock.state,
            });
        }

        let tick = self.state.tick_count + 1;
        self.with_rollback(Self::step).map_err(|e| {
            log::error!("Tick {tick} failed, state rolled back: {e}");
            e
        })
    }

    /// Run `op` against a checkpoint of state, RNG bank and clock. On
    /// error all three are restored, so a failed call changes nothing.
    fn with_rollback<T>(&mut self, op: impl FnOnce(&mut Self) -> SimResult<T>) -> SimResult<T> {
        let checkpoint = (self.state.clone(), self.rng_bank.clone(), self.clock.clone());
        let result = op(self);
        if result.is_err() {
            (self.state, self.rng_bank, self.clock) = checkpoint;
        }
        result
    }

    fn step(&mut self) -> SimResult<Vec<SimEvent>> {
        let tick = self.state.tick_count + 1;
        let mut tagged: Vec<(&'static str, SimEvent)> = vec![(ENGINE, SimEvent::TickStarted { tick })];

        let mut ctx = TickContext {
            tick,
            state: &mut self.state,
            catalogs: &self.catalogs,
            config: &self.config,
        };
        for subsystem in &mut self.subsystems {
            let name = subsystem.name();
            let events = subsystem.update(&mut ctx, &mut self.rng_bank)?;
            tagged.extend(events.into_iter().map(|e| (name, e)));
        }

        self.state.tick_count = tick;

        if let Some(outcome) = evaluate_outcome(&self.state, &self.config.outcome) {
            log::info!("Session {} ended at tick {tick}: {outcome:?}", self.run_id);
            self.clock.end(outcome);
            tagged.push((SCHEDULER, SimEvent::SessionEnded { tick, outcome }));
        }

        let score = self.habitability();
        tagged.push((ENGINE, SimEvent::TickCompleted { tick, habitability: score }));
        log::debug!("Tick {tick} complete: habitability {score:.1}");

        self.journal_tick(tick, &tagged)?;
        Ok(tagged.into_iter().map(|(_, e)| e).collect())
    }

    fn journal_tick(&self, tick: Tick, tagged: &[(&'static str, SimEvent)]) -> SimResult<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let entries = tagged
            .iter()
            .map(|(subsystem, event)| self.log_entry(subsystem, tick, event))
            .collect::<SimResult<Vec<_>>>()?;

        let interval = self.config.snapshot_interval;
        let snapshot_json = if interval > 0 && tick % interval == 0 {
            Some(self.snapshot().to_json()?)
        } else {
            None
        };
        store.commit_tick(
            &self.run_id,
            &entries,
            snapshot_json.as_deref().map(|json| (tick, json)),
        )?;
        if snapshot_json.is_some() {
            log::debug!("Snapshot saved at tick {tick}");
        }
        Ok(())
    }

    /// Run up to `n` ticks, stopping early if the session ends.
    pub fn run_ticks(&mut self, n: u64) -> SimResult<Vec<SimEvent>> {
        let mut events = Vec::new();
        for _ in 0..n {
            events.extend(self.tick()?);
            if self.clock.is_ended() {
                break;
            }
        }
        Ok(events)
    }

    /// One UI step: as many ticks as the current speed asks for.
    pub fn advance(&mut self) -> SimResult<Vec<SimEvent>> {
        self.run_ticks(u64::from(self.clock.ticks_per_step()))
    }

    // ── Clock control ──────────────────────────────────────────

    pub fn pause(&mut self) -> SimResult<()> {
        self.clock.pause()
    }

    pub fn resume(&mut self) -> SimResult<()> {
        self.clock.resume()
    }

    pub fn set_speed(&mut self, speed: SimSpeed) -> SimResult<()> {
        self.clock.ensure_not_ended("set_speed")?;
        self.clock.set_speed(speed);
        Ok(())
    }

    pub fn abandon(&mut self) -> SimResult<Vec<SimEvent>> {
        self.clock.ensure_not_ended("abandon")?;
        self.with_rollback(|engine| {
            let outcome = Outcome::Abandoned;
            engine.clock.end(outcome);
            let event = SimEvent::SessionEnded {
                tick: engine.state.tick_count,
                outcome,
            };
            engine.journal_command(SCHEDULER, std::slice::from_ref(&event))?;
            log::info!("Session {} abandoned at tick {}", engine.run_id, engine.state.tick_count);
            Ok(vec![event])
        })
    }

    // ── Player actions (between ticks) ─────────────────────────

    /// Research immediately, paying the science cost now.
    pub fn research(&mut self, tech_id: &str) -> SimResult<Vec<SimEvent>> {
        self.clock.ensure_not_ended("research")?;
        self.with_rollback(|engine| {
            let node = engine.catalogs.tech_tree().research(&mut engine.state, tech_id)?;
            let event = SimEvent::ResearchCompleted {
                tick: engine.state.tick_count,
                tech_id: node.id.clone(),
                unlocks: node.unlocks.clone(),
            };
            engine.journal_command("research", std::slice::from_ref(&event))?;
            Ok(vec![event])
        })
    }

    /// Research during the next tick's research step.
    pub fn queue_research(&mut self, tech_id: &str) -> SimResult<()> {
        self.clock.ensure_not_ended("queue_research")?;
        self.state.research_queue.push(tech_id.to_string());
        Ok(())
    }

    /// Build `count` buildings of `kind`, all or nothing.
    pub fn construct(&mut self, kind: &str, count: u32) -> SimResult<Vec<SimEvent>> {
        self.clock.ensure_not_ended("construct")?;
        let spec = self
            .config
            .building(kind)
            .ok_or_else(|| SimError::UnknownBuilding { kind: kind.to_string() })?;
        if !self.unlocked_buildings().contains(kind) {
            return Err(SimError::BuildingLocked { kind: kind.to_string() });
        }
        if count == 0 {
            return Ok(vec![]);
        }

        let n = f64::from(count);
        let cost = Resources {
            credits: spec.cost.credits * n,
            energy: spec.cost.energy * n,
            science: 0.0,
        };
        self.with_rollback(|engine| {
            if !engine.state.try_spend(&cost) {
                return Err(SimError::InsufficientResources {
                    credits: cost.credits,
                    energy: cost.energy,
                });
            }
            engine.state.add_buildings(kind, count);
            engine.state.stats.buildings_built += u64::from(count);

            let event = SimEvent::BuildingsConstructed {
                tick: engine.state.tick_count,
                kind: kind.to_string(),
                count,
            };
            engine.journal_command(COMMAND, std::slice::from_ref(&event))?;
            log::info!("Constructed {count} × {kind}");
            Ok(vec![event])
        })
    }

    /// Remove up to `count` buildings of `kind`. No refund.
    pub fn demolish(&mut self, kind: &str, count: u32) -> SimResult<Vec<SimEvent>> {
        self.clock.ensure_not_ended("demolish")?;
        self.with_rollback(|engine| {
            let removed = engine.state.remove_buildings(kind, count);
            if removed == 0 {
                return Ok(vec![]);
            }
            let event = SimEvent::BuildingsDemolished {
                tick: engine.state.tick_count,
                kind: kind.to_string(),
                count: removed,
            };
            engine.journal_command(COMMAND, std::slice::from_ref(&event))?;
            log::info!("Demolished {removed} × {kind}");
            Ok(vec![event])
        })
    }

    /// Trigger a catalog event now, bypassing requirements and probability.
    pub fn force_event(&mut self, event_id: &str) -> SimResult<Vec<SimEvent>> {
        self.clock.ensure_not_ended("force_event")?;
        self.with_rollback(|engine| {
            let tick = engine.state.tick_count;
            let damage = engine.rng_bank.stream(SubsystemSlot::BuildingDamage);
            let events = event_subsystem::force_event(
                tick,
                event_id,
                &mut engine.state,
                &engine.catalogs,
                &engine.config,
                damage,
            )?;
            // Effective gauges reflect the new offsets before the next tick.
            refresh_gauges(&mut engine.state);
            engine.journal_command("events", &events)?;
            Ok(events)
        })
    }

    pub fn apply_command(&mut self, command: PlayerCommand) -> SimResult<Vec<SimEvent>> {
        log::debug!("Command: {command:?}");
        match command {
            PlayerCommand::Pause => self.pause().map(|_| vec![]),
            PlayerCommand::Resume => self.resume().map(|_| vec![]),
            PlayerCommand::SetSpeed { speed } => self.set_speed(speed).map(|_| vec![]),
            PlayerCommand::Abandon => self.abandon(),
            PlayerCommand::Research { tech_id } => self.research(&tech_id),
            PlayerCommand::QueueResearch { tech_id } => self.queue_research(&tech_id).map(|_| vec![]),
            PlayerCommand::Construct { kind, count } => self.construct(&kind, count),
            PlayerCommand::Demolish { kind, count } => self.demolish(&kind, count),
            PlayerCommand::ForceEvent { event_id } => self.force_event(&event_id),
        }
    }

    // ── Journal helpers ────────────────────────────────────────

    fn log_entry(&self, subsystem: &str, tick: Tick, event: &SimEvent) -> SimResult<EventLogEntry> {
        Ok(EventLogEntry {
            id: None,
            run_id: self.run_id.clone(),
            tick,
            subsystem: subsystem.to_string(),
            event_type: event.type_name().to_string(),
            payload: serde_json::to_string(event)?,
        })
    }

    fn journal_command(&self, subsystem: &str, events: &[SimEvent]) -> SimResult<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let tick = self.state.tick_count;
        let entries = events
            .iter()
            .map(|event| self.log_entry(subsystem, tick, event))
            .collect::<SimResult<Vec<_>>>()?;
        store.commit_tick(&self.run_id, &entries, None)
    }
}

fn limits_for(set: &GaugeLimitSet, gauge: GaugeKind) -> GaugeLimits {
    match gauge {
        GaugeKind::Oxygen => set.oxygen,
        GaugeKind::Pressure => set.pressure,
        GaugeKind::Temperature => set.temperature,
        GaugeKind::Biodiversity => set.biodiversity,
    }
}

/// Loss is checked before win: a populated planet past a catastrophic
/// bound is lost even if every other gauge is fine.
pub fn evaluate_outcome(state: &PlanetState, config: &OutcomeConfig) -> Option<Outcome> {
    let populated = config
        .populated_by
        .iter()
        .any(|kind| state.building_count(kind) > 0);
    if populated {
        for gauge in GaugeKind::ALL {
            let value = state.gauges.get(gauge);
            if limits_for(&config.catastrophic, gauge).breached_by(value) {
                return Some(Outcome::Loss { gauge, value });
            }
        }
    }

    let vivable = GaugeKind::ALL
        .iter()
        .all(|&gauge| limits_for(&config.vivable, gauge).contains(state.gauges.get(gauge)));
    vivable.then_some(Outcome::Win)
}

impl std::fmt::Debug for SimEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimEngine")
            .field("run_id", &self.run_id)
            .field("tick", &self.state.tick_count)
            .field("scheduler", &self.clock.state)
            .finish()
    }
}
