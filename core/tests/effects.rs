//! Effect resolver: production, modifiers, bounds and shortfalls.

use terra_core::{
    catalog::Catalogs,
    config::SimConfig,
    effect_subsystem::{
        apply_one_shots, apply_production, habitability, habitability_status, production,
        rate_factor, settle, ModifierTotals,
    },
    event::SimEvent,
    event_catalog::{Effect, EffectPayload},
    rng::ScriptedSamples,
    state::{ActiveEffect, Gauges, InitialConditions, PlanetState, ResourceKind, Resources},
};

fn state_with(gauges: Gauges, resources: Resources) -> PlanetState {
    PlanetState::new(InitialConditions {
        planet_kind: "Mars".into(),
        gauges,
        resources,
        buildings: Default::default(),
        unlocked_techs: Default::default(),
    })
}

fn mars_gauges() -> Gauges {
    Gauges { temperature: -63.0, pressure: 0.006, oxygen: 0.13, biodiversity: 0.0 }
}

fn earthlike() -> Gauges {
    Gauges { temperature: 15.0, pressure: 1.0, oxygen: 21.0, biodiversity: 50.0 }
}

fn active(effect: Effect, remaining_ticks: u32) -> ActiveEffect {
    ActiveEffect {
        event_id: format!("{}-event", effect.key()),
        payload: EffectPayload::new(vec![effect]),
        remaining_ticks,
    }
}

fn one_shot(state: &mut PlanetState, effects: Vec<Effect>) -> Vec<SimEvent> {
    let catalogs = Catalogs::default();
    let config = SimConfig::default_test();
    let mut damage = ScriptedSamples::never_trigger();
    apply_one_shots(
        1,
        "test_event",
        &EffectPayload::new(effects),
        state,
        &catalogs,
        &config,
        &mut damage,
    )
}

#[test]
fn base_production_from_buildings() {
    let config = SimConfig::default_test();
    let mut state = state_with(mars_gauges(), Resources::default());
    state.add_buildings("solar_panel", 2);
    state.add_buildings("research_lab", 1);

    let report = production(&state, &config);
    // Habitability is 0 on Mars, so no bonus applies.
    assert_eq!(report.credits, 2.0);
    assert_eq!(report.science, 2.0);
    assert_eq!(report.energy_produced, 10.0);
    assert_eq!(report.energy_consumed, 3.0);
    assert_eq!(report.net_energy(), 7.0);
}

#[test]
fn habitability_boosts_credits_and_science() {
    let config = SimConfig::default_test();
    let mut state = state_with(earthlike(), Resources::default());
    state.add_buildings("research_lab", 1);

    let report = production(&state, &config);
    assert_eq!(habitability(&state.gauges, &config.habitability), 100.0);
    assert_eq!(report.credits, 1.5);
    assert!((report.science - 2.6).abs() < 1e-12);
}

#[test]
fn rate_modifiers_combine_additively_inside_the_factor() {
    let config = SimConfig::default_test();
    let mut state = state_with(mars_gauges(), Resources::default());
    state.add_buildings("solar_panel", 2);
    state.add_buildings("research_lab", 1);

    state.active_effects.push(active(Effect::SolarEfficiencyModifier(-0.6), 10));
    assert!((production(&state, &config).energy_produced - 4.0).abs() < 1e-12);

    state.active_effects.push(active(Effect::SolarEfficiencyModifier(0.1), 10));
    assert!((production(&state, &config).energy_produced - 5.0).abs() < 1e-12);

    state.active_effects.push(active(Effect::ScienceProductionModifier(0.5), 10));
    state.active_effects.push(active(Effect::EnergyConsumptionModifier(1.0), 10));
    let report = production(&state, &config);
    assert_eq!(report.science, 3.0);
    assert_eq!(report.energy_consumed, 6.0);
}

#[test]
fn rate_factor_is_floored_at_zero() {
    assert_eq!(rate_factor(0.0), 1.0);
    assert_eq!(rate_factor(0.25), 1.25);
    assert_eq!(rate_factor(-1.0), 0.0);
    assert_eq!(rate_factor(-2.5), 0.0);

    let config = SimConfig::default_test();
    let mut state = state_with(mars_gauges(), Resources::default());
    state.add_buildings("solar_panel", 3);
    state.active_effects.push(active(Effect::EnergyProductionModifier(-1.7), 5));
    assert_eq!(production(&state, &config).energy_produced, 0.0);
}

#[test]
fn energy_deficit_drains_to_zero_and_reports_shortfall() {
    let config = SimConfig::default_test();
    let mut state = state_with(
        mars_gauges(),
        Resources { credits: 0.0, energy: 1.0, science: 0.0 },
    );
    state.add_buildings("research_lab", 1);

    let events = apply_production(4, &mut state, &config);
    assert_eq!(state.resources.energy, 0.0);
    assert_eq!(
        events,
        vec![SimEvent::ResourceShortfall {
            tick: 4,
            resource: ResourceKind::Energy,
            requested: 3.0,
            deducted: 1.0,
            source: "energy_consumption".into(),
        }]
    );
}

#[test]
fn production_respects_storage_capacity() {
    let config = SimConfig::default_test();
    let mut state = state_with(
        mars_gauges(),
        Resources { credits: 0.0, energy: 998.0, science: 9_999.0 },
    );
    state.add_buildings("solar_panel", 1);
    state.add_buildings("research_lab", 1);
    state.active_effects.push(active(Effect::EnergyConsumptionModifier(-1.0), 5));

    apply_production(1, &mut state, &config);
    assert_eq!(state.resources.energy, 1_000.0);
    assert_eq!(state.resources.science, 10_000.0);
    assert_eq!(state.stats.science_generated, 1.0);
}

#[test]
fn costs_never_drive_pools_negative() {
    let mut state = state_with(
        mars_gauges(),
        Resources { credits: 50.0, energy: 80.0, science: 0.0 },
    );

    let events = one_shot(&mut state, vec![Effect::CreditsCost(200.0), Effect::EnergyCost(50.0)]);

    assert_eq!(state.resources.credits, 0.0);
    assert_eq!(state.resources.energy, 30.0);
    assert_eq!(
        events,
        vec![SimEvent::ResourceShortfall {
            tick: 1,
            resource: ResourceKind::Credits,
            requested: 200.0,
            deducted: 50.0,
            source: "test_event".into(),
        }]
    );
}

#[test]
fn bonuses_count_towards_session_stats() {
    let mut state = state_with(mars_gauges(), Resources::default());
    let events = one_shot(&mut state, vec![Effect::CreditsBonus(500.0), Effect::ScienceBonus(100.0)]);

    assert!(events.is_empty());
    assert_eq!(state.resources.credits, 500.0);
    assert_eq!(state.resources.science, 100.0);
    assert_eq!(state.stats.credits_earned, 500.0);
    assert_eq!(state.stats.science_generated, 100.0);
}

#[test]
fn gauges_are_clamped_to_physical_ranges() {
    let config = SimConfig::default_test();
    let mut state = state_with(
        Gauges { temperature: 500.0, pressure: 0.5, oxygen: 99.99, biodiversity: 99.995 },
        Resources::default(),
    );
    state.add_buildings("oxygen_generator", 10);
    state.add_buildings("greenhouse", 1);
    state.add_buildings("heater", 100);
    state.active_effects.push(active(Effect::PressureModifier(-5.0), 2));

    settle(1, &mut state, &config);

    assert_eq!(state.gauges.oxygen, 100.0);
    assert_eq!(state.gauges.biodiversity, 100.0);
    assert_eq!(state.gauges.pressure, 0.0);
    // Temperature has no physical bound.
    assert!(state.gauges.temperature > 500.0);
    // The underlying baseline is untouched by the offset.
    assert_eq!(state.baseline.pressure, 0.5);

    state.active_effects.clear();
    settle(2, &mut state, &config);
    assert_eq!(state.gauges.pressure, 0.5);
}

#[test]
fn building_drift_moves_the_baseline() {
    let config = SimConfig::default_test();
    let mut state = state_with(mars_gauges(), Resources::default());
    state.add_buildings("heater", 4);

    for tick in 1..=10 {
        settle(tick, &mut state, &config);
    }
    assert!((state.gauges.temperature - (-61.0)).abs() < 1e-9);
    assert_eq!(state.gauges, state.baseline);
}

#[test]
fn modifier_totals_sum_every_active_instance() {
    let effects = vec![
        active(Effect::TemperatureModifier(10.0), 3),
        active(Effect::TemperatureModifier(-4.0), 1),
        active(Effect::OxygenModifier(-2.0), 5),
        active(Effect::CreditsBonus(500.0), 5),
    ];
    let totals = ModifierTotals::from_active(&effects);
    assert_eq!(totals.temperature, 6.0);
    assert_eq!(totals.oxygen, -2.0);
    assert_eq!(totals.offsets().pressure, 0.0);
}

#[test]
fn habitability_status_labels() {
    let config = SimConfig::default_test();
    assert_eq!(habitability(&mars_gauges(), &config.habitability), 0.0);
    assert_eq!(habitability_status(0.0), "uninhabitable");
    assert_eq!(habitability_status(20.0), "hostile");
    assert_eq!(habitability_status(50.0), "terraforming");
    assert_eq!(habitability_status(80.0), "habitable");

    // Half a tolerance off on temperature alone: 100 − 0.4 × 50.
    let gauges = Gauges { temperature: 25.0, ..earthlike() };
    assert!((habitability(&gauges, &config.habitability) - 80.0).abs() < 1e-9);
}
