//! Event definitions: typed effect payloads and requirement predicates.
//!
//! Catalog records arrive as loose JSON maps. Every key is matched
//! against a closed set of variants here, so an unknown effect or
//! requirement key fails the catalog load instead of being ignored.

use crate::{
    catalog::Ordered,
    error::CatalogError,
    state::PlanetState,
    types::{EventId, PlanetKind},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Key-sorted view of one record's `effects` or `requirements` object.
/// A key given twice is an error rather than last-one-wins.
fn unique_keys<'a>(
    event_id: &str,
    section: &str,
    raw: &'a Ordered<Value>,
) -> Result<BTreeMap<&'a str, &'a Value>, CatalogError> {
    let mut keyed = BTreeMap::new();
    for (key, value) in &raw.0 {
        if keyed.insert(key.as_str(), value).is_some() {
            return Err(CatalogError::Malformed {
                entry: event_id.to_string(),
                reason: format!("duplicate {section} key '{key}'"),
            });
        }
    }
    Ok(keyed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Positive,
    Negative,
    Mixed,
}

/// One recognised effect key and its value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "key", content = "value", rename_all = "snake_case")]
pub enum Effect {
    EnergyProductionModifier(f64),
    BuildingDamageChance(f64),
    CreditsBonus(f64),
    ScienceBonus(f64),
    SolarEfficiencyModifier(f64),
    TemperatureModifier(f64),
    ScienceProductionModifier(f64),
    CreditsCost(f64),
    EnergyCost(f64),
    OxygenModifier(f64),
    PressureModifier(f64),
    EnergyConsumptionModifier(f64),
    UnlockSpecialTech(bool),
}

impl Effect {
    fn parse(event_id: &str, key: &str, value: &Value) -> Result<Self, CatalogError> {
        let number = || {
            value.as_f64().ok_or_else(|| CatalogError::Malformed {
                entry: event_id.to_string(),
                reason: format!("effect '{key}' must be a number, got {value}"),
            })
        };
        let effect = match key {
            "energy_production_modifier" => Self::EnergyProductionModifier(number()?),
            "building_damage_chance" => {
                let p = number()?;
                if !(0.0..=1.0).contains(&p) {
                    return Err(CatalogError::Malformed {
                        entry: event_id.to_string(),
                        reason: format!("building_damage_chance {p} outside [0, 1]"),
                    });
                }
                Self::BuildingDamageChance(p)
            }
            "credits_bonus" => Self::CreditsBonus(number()?),
            "science_bonus" => Self::ScienceBonus(number()?),
            "solar_efficiency_modifier" => Self::SolarEfficiencyModifier(number()?),
            "temperature_modifier" => Self::TemperatureModifier(number()?),
            "science_production_modifier" => Self::ScienceProductionModifier(number()?),
            "credits_cost" => Self::CreditsCost(number()?),
            "energy_cost" => Self::EnergyCost(number()?),
            "oxygen_modifier" => Self::OxygenModifier(number()?),
            "pressure_modifier" => Self::PressureModifier(number()?),
            "energy_consumption_modifier" => Self::EnergyConsumptionModifier(number()?),
            "unlock_special_tech" => Self::UnlockSpecialTech(value.as_bool().ok_or_else(|| {
                CatalogError::Malformed {
                    entry: event_id.to_string(),
                    reason: format!("effect 'unlock_special_tech' must be a boolean, got {value}"),
                }
            })?),
            other => {
                return Err(CatalogError::UnknownEffectKey {
                    event_id: event_id.to_string(),
                    key: other.to_string(),
                })
            }
        };
        Ok(effect)
    }

    pub fn key(&self) -> &'static str {
        match self {
            Self::EnergyProductionModifier(_) => "energy_production_modifier",
            Self::BuildingDamageChance(_) => "building_damage_chance",
            Self::CreditsBonus(_) => "credits_bonus",
            Self::ScienceBonus(_) => "science_bonus",
            Self::SolarEfficiencyModifier(_) => "solar_efficiency_modifier",
            Self::TemperatureModifier(_) => "temperature_modifier",
            Self::ScienceProductionModifier(_) => "science_production_modifier",
            Self::CreditsCost(_) => "credits_cost",
            Self::EnergyCost(_) => "energy_cost",
            Self::OxygenModifier(_) => "oxygen_modifier",
            Self::PressureModifier(_) => "pressure_modifier",
            Self::EnergyConsumptionModifier(_) => "energy_consumption_modifier",
            Self::UnlockSpecialTech(_) => "unlock_special_tech",
        }
    }

    /// Scales a production rate while active.
    pub fn is_rate_modifier(&self) -> bool {
        matches!(
            self,
            Self::EnergyProductionModifier(_)
                | Self::ScienceProductionModifier(_)
                | Self::SolarEfficiencyModifier(_)
                | Self::EnergyConsumptionModifier(_)
        )
    }
}

/// The effects of one event, in key order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EffectPayload(Vec<Effect>);

impl EffectPayload {
    pub fn new(effects: Vec<Effect>) -> Self {
        Self(effects)
    }

    fn parse(event_id: &str, raw: &Ordered<Value>) -> Result<Self, CatalogError> {
        unique_keys(event_id, "effect", raw)?
            .into_iter()
            .map(|(key, value)| Effect::parse(event_id, key, value))
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Effect> {
        self.0.iter()
    }
}

/// One recognised requirement key and its threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "key", content = "value", rename_all = "snake_case")]
pub enum Requirement {
    MinBuildings(u32),
    MinResearchLabs(u32),
    Planets(Vec<PlanetKind>),
    MinHabitability(f64),
    MinScience(f64),
    MinMiningFacilities(u32),
    MinPressure(f64),
}

pub const RESEARCH_LAB: &str = "research_lab";
pub const MINING_FACILITY: &str = "mining_facility";

impl Requirement {
    fn parse(event_id: &str, key: &str, value: &Value) -> Result<Self, CatalogError> {
        let malformed = |expected: &str| CatalogError::Malformed {
            entry: event_id.to_string(),
            reason: format!("requirement '{key}' must be {expected}, got {value}"),
        };
        let count = || {
            value
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| malformed("a non-negative integer"))
        };
        let number = || value.as_f64().ok_or_else(|| malformed("a number"));

        let requirement = match key {
            "min_buildings" => Self::MinBuildings(count()?),
            "min_research_labs" => Self::MinResearchLabs(count()?),
            "min_mining_facilities" => Self::MinMiningFacilities(count()?),
            "min_habitability" => Self::MinHabitability(number()?),
            "min_science" => Self::MinScience(number()?),
            "min_pressure" => Self::MinPressure(number()?),
            "planets" => {
                let list = value.as_array().ok_or_else(|| malformed("a list of planet names"))?;
                let planets = list
                    .iter()
                    .map(|p| p.as_str().map(str::to_string))
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| malformed("a list of planet names"))?;
                Self::Planets(planets)
            }
            other => {
                return Err(CatalogError::UnknownRequirementKey {
                    event_id: event_id.to_string(),
                    key: other.to_string(),
                })
            }
        };
        Ok(requirement)
    }

    pub fn is_met(&self, state: &PlanetState, habitability: f64) -> bool {
        match self {
            Self::MinBuildings(n) => state.total_buildings() >= *n,
            Self::MinResearchLabs(n) => state.building_count(RESEARCH_LAB) >= *n,
            Self::MinMiningFacilities(n) => state.building_count(MINING_FACILITY) >= *n,
            Self::Planets(planets) => planets.iter().any(|p| *p == state.planet_kind),
            Self::MinHabitability(min) => habitability >= *min,
            Self::MinScience(min) => state.resources.science >= *min,
            Self::MinPressure(min) => state.gauges.pressure >= *min,
        }
    }
}

/// Conjunction of requirements. Empty means always eligible.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequirementSet(Vec<Requirement>);

impl RequirementSet {
    pub fn new(requirements: Vec<Requirement>) -> Self {
        Self(requirements)
    }

    fn parse(event_id: &str, raw: &Ordered<Value>) -> Result<Self, CatalogError> {
        unique_keys(event_id, "requirement", raw)?
            .into_iter()
            .map(|(key, value)| Requirement::parse(event_id, key, value))
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    pub fn is_met(&self, state: &PlanetState, habitability: f64) -> bool {
        self.0.iter().all(|r| r.is_met(state, habitability))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Requirement> {
        self.0.iter()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventDefinition {
    pub id: EventId,
    pub name: String,
    pub description: String,
    pub category: EventCategory,
    /// Per-tick trigger chance when eligible, in [0, 1].
    pub probability: f64,
    /// 0 = instantaneous.
    pub duration: u32,
    pub effects: EffectPayload,
    pub requirements: RequirementSet,
}

impl EventDefinition {
    pub fn is_instantaneous(&self) -> bool {
        self.duration == 0
    }
}

/// Event record as it appears in `events.json`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawEvent {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "type")]
    category: EventCategory,
    probability: f64,
    #[serde(default)]
    duration: u32,
    #[serde(default)]
    effects: Ordered<Value>,
    #[serde(default)]
    requirements: Ordered<Value>,
}

impl RawEvent {
    pub(crate) fn into_definition(self, id: EventId) -> Result<EventDefinition, CatalogError> {
        if !(0.0..=1.0).contains(&self.probability) {
            return Err(CatalogError::Malformed {
                entry: id,
                reason: format!("probability {} outside [0, 1]", self.probability),
            });
        }
        let effects = EffectPayload::parse(&id, &self.effects)?;
        let requirements = RequirementSet::parse(&id, &self.requirements)?;

        if self.duration == 0 {
            if let Some(effect) = effects.iter().find(|e| e.is_rate_modifier()) {
                log::warn!(
                    "Event '{id}' is instantaneous; rate modifier '{}' will have no effect",
                    effect.key()
                );
            }
        }

        Ok(EventDefinition {
            id,
            name: self.name,
            description: self.description,
            category: self.category,
            probability: self.probability,
            duration: self.duration,
            effects,
            requirements,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawEvent {
        serde_json::from_value(value).expect("raw event")
    }

    #[test]
    fn parses_every_recognised_effect_key() {
        let def = raw(json!({
            "name": "Everything",
            "type": "mixed",
            "probability": 0.5,
            "duration": 10,
            "effects": {
                "energy_production_modifier": -0.5,
                "building_damage_chance": 0.1,
                "credits_bonus": 500,
                "science_bonus": 100,
                "solar_efficiency_modifier": 0.2,
                "temperature_modifier": 10.0,
                "science_production_modifier": 0.25,
                "credits_cost": 200,
                "energy_cost": 50,
                "oxygen_modifier": -2.0,
                "pressure_modifier": 0.1,
                "energy_consumption_modifier": 0.3,
                "unlock_special_tech": true
            }
        }))
        .into_definition("everything".into())
        .expect("valid");

        assert_eq!(def.effects.iter().count(), 13);
        assert!(def
            .effects
            .iter()
            .any(|e| *e == Effect::UnlockSpecialTech(true)));
    }

    #[test]
    fn unknown_effect_key_is_rejected() {
        let err = raw(json!({
            "name": "Bad",
            "type": "negative",
            "probability": 0.1,
            "effects": { "gravity_modifier": 1.0 }
        }))
        .into_definition("bad".into())
        .unwrap_err();

        assert!(
            matches!(err, CatalogError::UnknownEffectKey { ref key, .. } if key == "gravity_modifier"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn unknown_requirement_key_is_rejected() {
        let err = raw(json!({
            "name": "Bad",
            "type": "positive",
            "probability": 0.1,
            "requirements": { "min_population": 10 }
        }))
        .into_definition("bad".into())
        .unwrap_err();

        assert!(matches!(err, CatalogError::UnknownRequirementKey { .. }));
    }

    #[test]
    fn probability_outside_unit_interval_is_rejected() {
        let err = raw(json!({ "name": "Bad", "type": "positive", "probability": 1.5 }))
            .into_definition("bad".into())
            .unwrap_err();
        assert!(matches!(err, CatalogError::Malformed { .. }));
    }

    #[test]
    fn wrongly_typed_values_are_rejected() {
        let err = raw(json!({
            "name": "Bad",
            "type": "positive",
            "probability": 0.1,
            "requirements": { "planets": "Mars" }
        }))
        .into_definition("bad".into())
        .unwrap_err();
        assert!(matches!(err, CatalogError::Malformed { .. }));

        let err = raw(json!({
            "name": "Bad",
            "type": "positive",
            "probability": 0.1,
            "effects": { "unlock_special_tech": 1 }
        }))
        .into_definition("bad".into())
        .unwrap_err();
        assert!(matches!(err, CatalogError::Malformed { .. }));
    }

    #[test]
    fn empty_requirements_are_always_met() {
        let def = raw(json!({ "name": "Free", "type": "positive", "probability": 0.1 }))
            .into_definition("free".into())
            .expect("valid");
        let state = PlanetState::new(crate::state::InitialConditions {
            planet_kind: "Mars".into(),
            gauges: Default::default(),
            resources: Default::default(),
            buildings: Default::default(),
            unlocked_techs: Default::default(),
        });
        assert!(def.requirements.is_met(&state, 0.0));
    }
}
