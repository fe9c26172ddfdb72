//! Effect resolver: turns buildings and active modifiers into deltas.
//!
//! Two steps of the tick live here:
//!   1. Production: building output into the resource pools, scaled
//!      by active rate modifiers and by habitability.
//!   4. Settlement: terraform drift into the baseline gauges, then the
//!      effective gauges = clamp(baseline + active offsets).
//!
//! Combination rules:
//!   - Flat offsets (temperature/pressure/oxygen) add up.
//!   - Rate modifiers add up inside a factor: base × max(0, 1 + Σ).
//!
//! Totals are recomputed from the active list every time they are
//! needed, so an expired effect's contribution is gone exactly.

use crate::{
    catalog::Catalogs,
    config::{HabitabilityConfig, SimConfig},
    error::SimResult,
    event::SimEvent,
    event_catalog::{Effect, EffectPayload},
    rng::{RngBank, SampleSource},
    state::{ActiveEffect, Gauges, PlanetState, ResourceKind, ResourceShortfall},
    subsystem::{SimSubsystem, TickContext},
    types::Tick,
};

/// Summed contribution of a set of effects.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ModifierTotals {
    pub temperature: f64,
    pub pressure: f64,
    pub oxygen: f64,
    pub energy_production: f64,
    pub science_production: f64,
    pub solar_efficiency: f64,
    pub energy_consumption: f64,
}

impl ModifierTotals {
    pub fn from_active(active: &[ActiveEffect]) -> Self {
        let mut totals = Self::default();
        for effect in active.iter().flat_map(|a| a.payload.iter()) {
            totals.add(effect);
        }
        totals
    }

    fn add(&mut self, effect: &Effect) {
        match *effect {
            Effect::TemperatureModifier(v) => self.temperature += v,
            Effect::PressureModifier(v) => self.pressure += v,
            Effect::OxygenModifier(v) => self.oxygen += v,
            Effect::EnergyProductionModifier(v) => self.energy_production += v,
            Effect::ScienceProductionModifier(v) => self.science_production += v,
            Effect::SolarEfficiencyModifier(v) => self.solar_efficiency += v,
            Effect::EnergyConsumptionModifier(v) => self.energy_consumption += v,
            // one-shots carry no standing contribution
            _ => {}
        }
    }

    pub fn offsets(&self) -> Gauges {
        Gauges {
            oxygen: self.oxygen,
            pressure: self.pressure,
            temperature: self.temperature,
            biodiversity: 0.0,
        }
    }
}

/// Multiplier for a summed rate modifier. Never negative.
pub fn rate_factor(sum: f64) -> f64 {
    (1.0 + sum).max(0.0)
}

/// Weighted closeness of the gauges to their targets, 0–100.
pub fn habitability(gauges: &Gauges, config: &HabitabilityConfig) -> f64 {
    let parts = [
        (config.temperature, gauges.temperature),
        (config.pressure, gauges.pressure),
        (config.oxygen, gauges.oxygen),
        (config.biodiversity, gauges.biodiversity),
    ];
    let total_weight: f64 = parts.iter().map(|(t, _)| t.weight).sum();
    if total_weight <= 0.0 {
        return 0.0;
    }
    let score: f64 = parts.iter().map(|(t, v)| t.score(*v) * t.weight).sum();
    (score / total_weight * 100.0).clamp(0.0, 100.0)
}

pub fn habitability_status(score: f64) -> &'static str {
    match score {
        s if s >= 80.0 => "habitable",
        s if s >= 50.0 => "terraforming",
        s if s >= 20.0 => "hostile",
        _ => "uninhabitable",
    }
}

/// One tick's worth of resource flow, before capacities.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProductionReport {
    pub credits: f64,
    pub energy_produced: f64,
    pub energy_consumed: f64,
    pub science: f64,
}

impl ProductionReport {
    pub fn net_energy(&self) -> f64 {
        self.energy_produced - self.energy_consumed
    }
}

/// Per-tick production for the current buildings and active effects.
pub fn production(state: &PlanetState, config: &SimConfig) -> ProductionReport {
    let totals = ModifierTotals::from_active(&state.active_effects);
    let mut credits = config.base_income;
    let mut science = 0.0;
    let mut solar_energy = 0.0;
    let mut other_energy = 0.0;
    let mut consumption = 0.0;

    for (kind, &count) in &state.buildings {
        let Some(spec) = config.building(kind) else {
            continue;
        };
        let n = f64::from(count);
        credits += spec.credits * n;
        science += spec.science * n;
        consumption += spec.energy_consumption * n;
        if spec.solar {
            solar_energy += spec.energy * n;
        } else {
            other_energy += spec.energy * n;
        }
    }

    let bonus = habitability(&state.gauges, &config.habitability) / 100.0;
    credits *= 1.0 + bonus * config.habitability.credits_bonus;
    science *= (1.0 + bonus * config.habitability.science_bonus)
        * rate_factor(totals.science_production);
    let energy = (other_energy + solar_energy * rate_factor(totals.solar_efficiency))
        * rate_factor(totals.energy_production);
    consumption *= rate_factor(totals.energy_consumption);

    ProductionReport {
        credits,
        energy_produced: energy,
        energy_consumed: consumption,
        science,
    }
}

fn shortfall_event(tick: Tick, shortfall: ResourceShortfall, source: &str) -> SimEvent {
    log::warn!(
        "tick={tick} shortfall: {:?} requested {:.2}, deducted {:.2} ({source})",
        shortfall.resource,
        shortfall.requested,
        shortfall.deducted
    );
    SimEvent::ResourceShortfall {
        tick,
        resource: shortfall.resource,
        requested: shortfall.requested,
        deducted: shortfall.deducted,
        source: source.to_string(),
    }
}

/// Step 1: pay building output into the pools.
pub fn apply_production(tick: Tick, state: &mut PlanetState, config: &SimConfig) -> Vec<SimEvent> {
    let report = production(state, config);
    let mut events = Vec::new();

    let earned = state.credit(ResourceKind::Credits, report.credits, None);
    state.stats.credits_earned += earned;
    let generated = state.credit(
        ResourceKind::Science,
        report.science,
        config.storage.science_capacity,
    );
    state.stats.science_generated += generated;

    let net_energy = report.net_energy();
    if net_energy >= 0.0 {
        state.credit(ResourceKind::Energy, net_energy, config.storage.energy_capacity);
    } else if let Some(shortfall) = state.deduct_up_to(ResourceKind::Energy, -net_energy) {
        events.push(shortfall_event(tick, shortfall, "energy_consumption"));
    }

    log::debug!(
        "tick={tick} production: credits +{:.2} science +{:.2} energy {:+.2}",
        report.credits,
        report.science,
        net_energy
    );
    events
}

/// Apply the one-shot part of a triggered event.
///
/// Costs never push a pool below zero: the available balance is
/// taken and a shortfall is reported.
pub fn apply_one_shots(
    tick: Tick,
    event_id: &str,
    payload: &EffectPayload,
    state: &mut PlanetState,
    catalogs: &Catalogs,
    config: &SimConfig,
    damage: &mut dyn SampleSource,
) -> Vec<SimEvent> {
    let mut events = Vec::new();
    for effect in payload.iter() {
        match *effect {
            Effect::CreditsBonus(amount) => {
                if amount >= 0.0 {
                    let earned = state.credit(ResourceKind::Credits, amount, None);
                    state.stats.credits_earned += earned;
                } else if let Some(s) = state.deduct_up_to(ResourceKind::Credits, -amount) {
                    events.push(shortfall_event(tick, s, event_id));
                }
            }
            Effect::ScienceBonus(amount) => {
                if amount >= 0.0 {
                    let generated = state.credit(
                        ResourceKind::Science,
                        amount,
                        config.storage.science_capacity,
                    );
                    state.stats.science_generated += generated;
                } else if let Some(s) = state.deduct_up_to(ResourceKind::Science, -amount) {
                    events.push(shortfall_event(tick, s, event_id));
                }
            }
            Effect::CreditsCost(amount) => {
                if let Some(s) = state.deduct_up_to(ResourceKind::Credits, amount) {
                    events.push(shortfall_event(tick, s, event_id));
                }
            }
            Effect::EnergyCost(amount) => {
                if let Some(s) = state.deduct_up_to(ResourceKind::Energy, amount) {
                    events.push(shortfall_event(tick, s, event_id));
                }
            }
            Effect::BuildingDamageChance(chance) => {
                let kinds: Vec<String> = state.buildings.keys().cloned().collect();
                for kind in kinds {
                    if damage.next_f64() < chance && state.remove_buildings(&kind, 1) == 1 {
                        log::info!("tick={tick} '{event_id}' damaged a {kind}");
                        events.push(SimEvent::BuildingDamaged {
                            tick,
                            event_id: event_id.to_string(),
                            kind,
                        });
                    }
                }
            }
            Effect::UnlockSpecialTech(true) => {
                match catalogs.tech_tree().grant_special(state) {
                    Some(node) => events.push(SimEvent::SpecialTechGranted {
                        tick,
                        tech_id: node.id.clone(),
                        event_id: event_id.to_string(),
                        unlocks: node.unlocks.clone(),
                    }),
                    None => log::debug!("tick={tick} '{event_id}': no special tech available"),
                }
            }
            _ => {}
        }
    }
    events
}

/// Fold an instantaneous event's gauge offsets into the baseline.
pub fn apply_permanent_offsets(state: &mut PlanetState, payload: &EffectPayload) {
    let mut totals = ModifierTotals::default();
    for effect in payload.iter() {
        totals.add(effect);
    }
    state.baseline = (state.baseline + totals.offsets()).clamped();
}

/// Effective gauges = clamp(baseline + active offsets).
pub fn refresh_gauges(state: &mut PlanetState) {
    let totals = ModifierTotals::from_active(&state.active_effects);
    state.gauges = (state.baseline + totals.offsets()).clamped();
}

/// Step 4: drift the baseline, then recompute the effective gauges.
pub fn settle(tick: Tick, state: &mut PlanetState, config: &SimConfig) {
    let drift = state
        .buildings
        .iter()
        .filter_map(|(kind, &count)| {
            config
                .building(kind)
                .map(|spec| spec.terraform.scaled(f64::from(count)))
        })
        .fold(Gauges::default(), |acc, d| acc + d);

    state.baseline = (state.baseline + drift).clamped();
    refresh_gauges(state);

    log::debug!(
        "tick={tick} gauges: T={:.2}C P={:.3}atm O2={:.2}% bio={:.2}",
        state.gauges.temperature,
        state.gauges.pressure,
        state.gauges.oxygen,
        state.gauges.biodiversity
    );
}

pub struct ProductionSubsystem;

impl SimSubsystem for ProductionSubsystem {
    fn name(&self) -> &'static str {
        "production"
    }

    fn update(&mut self, ctx: &mut TickContext<'_>, _rng: &mut RngBank) -> SimResult<Vec<SimEvent>> {
        Ok(apply_production(ctx.tick, ctx.state, ctx.config))
    }
}

pub struct SettlementSubsystem;

impl SimSubsystem for SettlementSubsystem {
    fn name(&self) -> &'static str {
        "settlement"
    }

    fn update(&mut self, ctx: &mut TickContext<'_>, _rng: &mut RngBank) -> SimResult<Vec<SimEvent>> {
        settle(ctx.tick, ctx.state, ctx.config);
        Ok(vec![])
    }
}
