//! Event engine: step 3 of the tick.
//!
//! ORDER within a pass:
//!   1. Age every active effect; drop those that reach zero.
//!   2. Compute habitability once from the current gauges.
//!   3. Walk the catalog in declaration order. Ineligible events are
//!      skipped without drawing. Eligible events draw exactly one
//!      trigger sample and fire when it is below their probability.
//!
//! Ageing before triggering gives an effect of duration D exactly D
//! ticks of presence: it is live for the trigger tick and the D-1
//! ticks after, and gone from tick D+1 on.

use crate::{
    catalog::Catalogs,
    config::SimConfig,
    effect_subsystem::{apply_one_shots, apply_permanent_offsets, habitability},
    error::{SimError, SimResult},
    event::SimEvent,
    event_catalog::EventDefinition,
    rng::{RngBank, SampleSource},
    state::{ActiveEffect, PlanetState},
    subsystem::{SimSubsystem, TickContext},
    types::Tick,
};

/// Decrement every active effect and remove the finished ones.
pub fn expire_effects(tick: Tick, state: &mut PlanetState) -> Vec<SimEvent> {
    let mut expired = Vec::new();
    state.active_effects.retain_mut(|effect| {
        effect.remaining_ticks = effect.remaining_ticks.saturating_sub(1);
        if effect.remaining_ticks == 0 {
            log::info!("tick={tick} effect of '{}' expired", effect.event_id);
            expired.push(SimEvent::EffectExpired {
                tick,
                event_id: effect.event_id.clone(),
            });
            false
        } else {
            true
        }
    });
    expired
}

/// Apply a triggered event. Requirements and probability are the
/// caller's business.
pub fn trigger_event(
    tick: Tick,
    definition: &EventDefinition,
    state: &mut PlanetState,
    catalogs: &Catalogs,
    config: &SimConfig,
    damage: &mut dyn SampleSource,
) -> Vec<SimEvent> {
    log::info!(
        "tick={tick} event '{}' triggered ({:?}, {} ticks)",
        definition.id,
        definition.category,
        definition.duration
    );
    state.stats.events_encountered += 1;
    let mut events = vec![SimEvent::EventTriggered {
        tick,
        event_id: definition.id.clone(),
        category: definition.category,
        duration: definition.duration,
    }];

    events.extend(apply_one_shots(
        tick,
        &definition.id,
        &definition.effects,
        state,
        catalogs,
        config,
        damage,
    ));

    if definition.is_instantaneous() {
        apply_permanent_offsets(state, &definition.effects);
    } else {
        state.active_effects.push(ActiveEffect {
            event_id: definition.id.clone(),
            payload: definition.effects.clone(),
            remaining_ticks: definition.duration,
        });
    }
    events
}

/// One full event pass with explicit sample sources.
pub fn run_pass(
    tick: Tick,
    state: &mut PlanetState,
    catalogs: &Catalogs,
    config: &SimConfig,
    trigger: &mut dyn SampleSource,
    damage: &mut dyn SampleSource,
) -> Vec<SimEvent> {
    let mut events = expire_effects(tick, state);
    let score = habitability(&state.gauges, &config.habitability);

    for definition in catalogs.events() {
        if !definition.requirements.is_met(state, score) {
            continue;
        }
        if trigger.next_f64() < definition.probability {
            events.extend(trigger_event(tick, definition, state, catalogs, config, damage));
        }
    }
    events
}

/// Trigger a catalog event outside the random pass.
pub fn force_event(
    tick: Tick,
    event_id: &str,
    state: &mut PlanetState,
    catalogs: &Catalogs,
    config: &SimConfig,
    damage: &mut dyn SampleSource,
) -> SimResult<Vec<SimEvent>> {
    let definition = catalogs
        .event(event_id)
        .ok_or_else(|| SimError::UnknownEvent { event_id: event_id.to_string() })?;
    Ok(trigger_event(tick, definition, state, catalogs, config, damage))
}

pub struct EventSubsystem;

impl SimSubsystem for EventSubsystem {
    fn name(&self) -> &'static str {
        "events"
    }

    fn update(&mut self, ctx: &mut TickContext<'_>, rng: &mut RngBank) -> SimResult<Vec<SimEvent>> {
        let (trigger, damage) = rng.event_streams();
        Ok(run_pass(ctx.tick, ctx.state, ctx.catalogs, ctx.config, trigger, damage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        event_catalog::{Effect, EffectPayload},
        state::{Gauges, InitialConditions, Resources},
    };
    use std::collections::{BTreeMap, BTreeSet};

    fn state() -> PlanetState {
        PlanetState::new(InitialConditions {
            planet_kind: "Mars".into(),
            gauges: Gauges { oxygen: 1.0, pressure: 0.5, temperature: -20.0, biodiversity: 0.0 },
            resources: Resources { credits: 100.0, energy: 10.0, science: 0.0 },
            buildings: BTreeMap::new(),
            unlocked_techs: BTreeSet::new(),
        })
    }

    #[test]
    fn expiry_removes_only_finished_effects() {
        let mut s = state();
        for (id, left) in [("a", 1), ("b", 3)] {
            s.active_effects.push(ActiveEffect {
                event_id: id.into(),
                payload: EffectPayload::new(vec![Effect::TemperatureModifier(1.0)]),
                remaining_ticks: left,
            });
        }
        let events = expire_effects(7, &mut s);
        assert_eq!(events, vec![SimEvent::EffectExpired { tick: 7, event_id: "a".into() }]);
        assert_eq!(s.active_effects.len(), 1);
        assert_eq!(s.active_effects[0].remaining_ticks, 2);
    }
}
