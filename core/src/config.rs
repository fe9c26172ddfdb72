//! Balancing data the engine consumes but does not own.
//!
//! Everything here is plain serde data loaded once from
//! `balance.json`. Nothing in this module mutates state.

use crate::{
    state::{Gauges, Resources},
    types::{BuildingKind, Tick},
};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Construction price of a single building.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstructionCost {
    #[serde(default)]
    pub credits: f64,
    #[serde(default)]
    pub energy: f64,
}

/// Per-building, per-tick output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildingSpec {
    #[serde(default)]
    pub cost: ConstructionCost,
    #[serde(default)]
    pub credits: f64,
    #[serde(default)]
    pub energy: f64,
    #[serde(default)]
    pub science: f64,
    #[serde(default)]
    pub energy_consumption: f64,
    /// Energy output is also scaled by `solar_efficiency_modifier`.
    #[serde(default)]
    pub solar: bool,
    /// Buildable without any researched technology.
    #[serde(default)]
    pub always_available: bool,
    /// Per-tick drift of the baseline gauges.
    #[serde(default)]
    pub terraform: Gauges,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HabitabilityTarget {
    pub target: f64,
    pub tolerance: f64,
    pub weight: f64,
}

impl HabitabilityTarget {
    /// 1.0 at the target, falling linearly to 0.0 at one tolerance away.
    pub fn score(&self, value: f64) -> f64 {
        if self.tolerance <= 0.0 {
            return if value == self.target { 1.0 } else { 0.0 };
        }
        (1.0 - (value - self.target).abs() / self.tolerance).max(0.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HabitabilityConfig {
    pub temperature: HabitabilityTarget,
    pub pressure: HabitabilityTarget,
    pub oxygen: HabitabilityTarget,
    pub biodiversity: HabitabilityTarget,
    /// Credits output multiplier at 100% habitability is `1 + credits_bonus`.
    pub credits_bonus: f64,
    pub science_bonus: f64,
}

/// Inclusive bounds on a gauge. An unset side is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GaugeLimits {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl GaugeLimits {
    pub fn between(min: f64, max: f64) -> Self {
        Self { min: Some(min), max: Some(max) }
    }

    pub fn at_or_below(min: f64) -> Self {
        Self { min: Some(min), max: None }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min.map_or(true, |m| value >= m) && self.max.map_or(true, |m| value <= m)
    }

    /// True when `value` has reached either bound.
    pub fn breached_by(&self, value: f64) -> bool {
        self.min.is_some_and(|m| value <= m) || self.max.is_some_and(|m| value >= m)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GaugeLimitSet {
    #[serde(default)]
    pub oxygen: GaugeLimits,
    #[serde(default)]
    pub pressure: GaugeLimits,
    #[serde(default)]
    pub temperature: GaugeLimits,
    #[serde(default)]
    pub biodiversity: GaugeLimits,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeConfig {
    /// Win when every gauge sits inside its band.
    pub vivable: GaugeLimitSet,
    /// Loss when any gauge reaches one of these bounds while populated.
    pub catastrophic: GaugeLimitSet,
    /// Building kinds that house population.
    #[serde(default)]
    pub populated_by: Vec<BuildingKind>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub energy_capacity: Option<f64>,
    #[serde(default)]
    pub science_capacity: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// Credits earned every tick regardless of buildings.
    pub base_income: f64,
    pub starting_resources: Resources,
    #[serde(default)]
    pub storage: StorageConfig,
    pub buildings: BTreeMap<BuildingKind, BuildingSpec>,
    pub habitability: HabitabilityConfig,
    pub outcome: OutcomeConfig,
    /// Journal a session snapshot every this many ticks. 0 disables.
    #[serde(default)]
    pub snapshot_interval: Tick,
}

impl SimConfig {
    /// Load from `<data_dir>/balance.json`.
    /// In tests, use SimConfig::default_test().
    pub fn load(data_dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = data_dir.as_ref().join("balance.json");
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Cannot read {}", path.display()))?;
        let config: SimConfig = serde_json::from_str(&content)
            .with_context(|| format!("Malformed balance file {}", path.display()))?;
        log::info!(
            "Loaded balance config: {} building kinds",
            config.buildings.len()
        );
        Ok(config)
    }

    pub fn building(&self, kind: &str) -> Option<&BuildingSpec> {
        self.buildings.get(kind)
    }

    /// Config with hardcoded defaults for use in unit tests.
    pub fn default_test() -> Self {
        let mut buildings = BTreeMap::new();
        let mut add = |kind: &str, spec: BuildingSpec| {
            buildings.insert(kind.to_string(), spec);
        };
        add("solar_panel", BuildingSpec {
            cost: ConstructionCost { credits: 100.0, energy: 10.0 },
            energy: 5.0,
            credits: 0.5,
            solar: true,
            always_available: true,
            ..Default::default()
        });
        add("research_lab", BuildingSpec {
            cost: ConstructionCost { credits: 400.0, energy: 40.0 },
            science: 2.0,
            energy_consumption: 3.0,
            ..Default::default()
        });
        add("mining_facility", BuildingSpec {
            cost: ConstructionCost { credits: 350.0, energy: 35.0 },
            credits: 3.0,
            energy_consumption: 2.0,
            ..Default::default()
        });
        add("heater", BuildingSpec {
            cost: ConstructionCost { credits: 150.0, energy: 20.0 },
            energy_consumption: 4.0,
            terraform: Gauges { temperature: 0.05, ..Default::default() },
            ..Default::default()
        });
        add("cooler", BuildingSpec {
            cost: ConstructionCost { credits: 150.0, energy: 20.0 },
            energy_consumption: 4.0,
            terraform: Gauges { temperature: -0.05, ..Default::default() },
            ..Default::default()
        });
        add("atmosphere_processor", BuildingSpec {
            cost: ConstructionCost { credits: 300.0, energy: 50.0 },
            credits: 1.0,
            energy_consumption: 6.0,
            terraform: Gauges { pressure: 0.001, ..Default::default() },
            ..Default::default()
        });
        add("oxygen_generator", BuildingSpec {
            cost: ConstructionCost { credits: 200.0, energy: 30.0 },
            energy_consumption: 5.0,
            terraform: Gauges { oxygen: 0.02, ..Default::default() },
            ..Default::default()
        });
        add("greenhouse", BuildingSpec {
            cost: ConstructionCost { credits: 250.0, energy: 25.0 },
            science: 1.0,
            energy_consumption: 2.0,
            terraform: Gauges {
                temperature: 0.02,
                oxygen: 0.01,
                biodiversity: 0.01,
                ..Default::default()
            },
            ..Default::default()
        });
        add("habitat_dome", BuildingSpec {
            cost: ConstructionCost { credits: 500.0, energy: 50.0 },
            ..Default::default()
        });

        Self {
            base_income: 1.0,
            starting_resources: Resources {
                credits: 1000.0,
                energy: 100.0,
                science: 0.0,
            },
            storage: StorageConfig {
                energy_capacity: Some(1000.0),
                science_capacity: Some(10_000.0),
            },
            buildings,
            habitability: HabitabilityConfig {
                temperature: HabitabilityTarget { target: 15.0, tolerance: 20.0, weight: 0.4 },
                pressure: HabitabilityTarget { target: 1.0, tolerance: 0.3, weight: 0.3 },
                oxygen: HabitabilityTarget { target: 21.0, tolerance: 5.0, weight: 0.3 },
                biodiversity: HabitabilityTarget { target: 100.0, tolerance: 100.0, weight: 0.0 },
                credits_bonus: 0.5,
                science_bonus: 0.3,
            },
            outcome: OutcomeConfig {
                vivable: GaugeLimitSet {
                    temperature: GaugeLimits::between(-5.0, 35.0),
                    pressure: GaugeLimits::between(0.7, 1.3),
                    oxygen: GaugeLimits::between(16.0, 26.0),
                    biodiversity: GaugeLimits::default(),
                },
                catastrophic: GaugeLimitSet {
                    oxygen: GaugeLimits::at_or_below(0.0),
                    ..Default::default()
                },
                populated_by: vec!["habitat_dome".into()],
            },
            snapshot_interval: 30,
        }
    }
}
