//! The planetary state store: the mutable aggregate root of a session.
//!
//! RULE: Only the engine holds a `&mut PlanetState` during a tick.
//! Collaborators read it between ticks through `SimEngine::state()`.

use crate::{
    catalog::Catalogs,
    config::SimConfig,
    error::{SimError, SimResult},
    event_catalog::EffectPayload,
    types::{BuildingKind, EventId, PlanetKind, TechId, Tick},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Add;

/// Continuous environmental measurements.
///
/// Also used for per-tick drifts and summed offsets, where any
/// component may be negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Gauges {
    /// Percent, 0–100.
    #[serde(default)]
    pub oxygen: f64,
    /// Atmospheres, ≥ 0.
    #[serde(default)]
    pub pressure: f64,
    /// Degrees Celsius, unbounded.
    #[serde(default)]
    pub temperature: f64,
    /// Index, 0–100.
    #[serde(default)]
    pub biodiversity: f64,
}

impl Gauges {
    /// Clamp every component to its physical range.
    pub fn clamped(self) -> Self {
        Self {
            oxygen: self.oxygen.clamp(0.0, 100.0),
            pressure: self.pressure.max(0.0),
            temperature: self.temperature,
            biodiversity: self.biodiversity.clamp(0.0, 100.0),
        }
    }

    pub fn scaled(self, factor: f64) -> Self {
        Self {
            oxygen: self.oxygen * factor,
            pressure: self.pressure * factor,
            temperature: self.temperature * factor,
            biodiversity: self.biodiversity * factor,
        }
    }

    pub fn get(&self, gauge: GaugeKind) -> f64 {
        match gauge {
            GaugeKind::Oxygen => self.oxygen,
            GaugeKind::Pressure => self.pressure,
            GaugeKind::Temperature => self.temperature,
            GaugeKind::Biodiversity => self.biodiversity,
        }
    }
}

impl Add for Gauges {
    type Output = Gauges;

    fn add(self, rhs: Gauges) -> Gauges {
        Gauges {
            oxygen: self.oxygen + rhs.oxygen,
            pressure: self.pressure + rhs.pressure,
            temperature: self.temperature + rhs.temperature,
            biodiversity: self.biodiversity + rhs.biodiversity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GaugeKind {
    Oxygen,
    Pressure,
    Temperature,
    Biodiversity,
}

impl GaugeKind {
    pub const ALL: [GaugeKind; 4] = [
        Self::Oxygen,
        Self::Pressure,
        Self::Temperature,
        Self::Biodiversity,
    ];
}

/// Non-negative accumulating pools.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Resources {
    pub credits: f64,
    pub energy: f64,
    pub science: f64,
}

impl Resources {
    pub fn get(&self, kind: ResourceKind) -> f64 {
        match kind {
            ResourceKind::Credits => self.credits,
            ResourceKind::Energy => self.energy,
            ResourceKind::Science => self.science,
        }
    }

    fn get_mut(&mut self, kind: ResourceKind) -> &mut f64 {
        match kind {
            ResourceKind::Credits => &mut self.credits,
            ResourceKind::Energy => &mut self.energy,
            ResourceKind::Science => &mut self.science,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Credits,
    Energy,
    Science,
}

/// A cost that could only be partly paid. Not an error: the tick
/// proceeds and the UI is told.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceShortfall {
    pub resource: ResourceKind,
    pub requested: f64,
    pub deducted: f64,
}

/// A live, expiring instance of a triggered event's modifiers.
/// Several instances of one event may coexist; each expires on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveEffect {
    pub event_id: EventId,
    pub payload: EffectPayload,
    pub remaining_ticks: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub credits_earned: f64,
    pub science_generated: f64,
    pub buildings_built: u64,
    pub technologies_researched: u64,
    pub events_encountered: u64,
}

/// Everything needed to create a fresh `PlanetState`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialConditions {
    pub planet_kind: PlanetKind,
    pub gauges: Gauges,
    pub resources: Resources,
    #[serde(default)]
    pub buildings: BTreeMap<BuildingKind, u32>,
    #[serde(default)]
    pub unlocked_techs: BTreeSet<TechId>,
}

impl InitialConditions {
    /// Starting gauges from the planet catalog, resources from the config.
    pub fn for_planet(catalogs: &Catalogs, config: &SimConfig, planet: &str) -> SimResult<Self> {
        let definition = catalogs
            .planet(planet)
            .ok_or_else(|| SimError::UnknownPlanet { planet: planet.to_string() })?;
        Ok(Self {
            planet_kind: definition.id.clone(),
            gauges: definition.initial,
            resources: config.starting_resources,
            buildings: BTreeMap::new(),
            unlocked_techs: BTreeSet::new(),
        })
    }

    pub fn with_buildings(mut self, kind: &str, count: u32) -> Self {
        *self.buildings.entry(kind.to_string()).or_insert(0) += count;
        self
    }

    pub fn with_tech(mut self, tech_id: &str) -> Self {
        self.unlocked_techs.insert(tech_id.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanetState {
    pub planet_kind: PlanetKind,
    /// Underlying gauges, moved by terraform drift and instantaneous effects.
    pub baseline: Gauges,
    /// Effective gauges: baseline plus active offsets, clamped.
    pub gauges: Gauges,
    pub resources: Resources,
    pub buildings: BTreeMap<BuildingKind, u32>,
    pub unlocked_techs: BTreeSet<TechId>,
    /// Insertion order.
    pub active_effects: Vec<ActiveEffect>,
    /// Research requested by the construction collaborator, FIFO.
    #[serde(default)]
    pub research_queue: Vec<TechId>,
    #[serde(default)]
    pub stats: SessionStats,
    pub tick_count: Tick,
}

impl PlanetState {
    pub fn new(initial: InitialConditions) -> Self {
        let gauges = initial.gauges.clamped();
        let resources = Resources {
            credits: initial.resources.credits.max(0.0),
            energy: initial.resources.energy.max(0.0),
            science: initial.resources.science.max(0.0),
        };
        let buildings = initial
            .buildings
            .into_iter()
            .filter(|(_, count)| *count > 0)
            .collect();
        Self {
            planet_kind: initial.planet_kind,
            baseline: gauges,
            gauges,
            resources,
            buildings,
            unlocked_techs: initial.unlocked_techs,
            active_effects: Vec::new(),
            research_queue: Vec::new(),
            stats: SessionStats::default(),
            tick_count: 0,
        }
    }

    pub fn total_buildings(&self) -> u32 {
        self.buildings.values().sum()
    }

    pub fn building_count(&self, kind: &str) -> u32 {
        self.buildings.get(kind).copied().unwrap_or(0)
    }

    pub fn add_buildings(&mut self, kind: &str, count: u32) {
        if count == 0 {
            return;
        }
        *self.buildings.entry(kind.to_string()).or_insert(0) += count;
    }

    /// Remove up to `count` buildings. Returns how many were removed.
    pub fn remove_buildings(&mut self, kind: &str, count: u32) -> u32 {
        let Some(current) = self.buildings.get_mut(kind) else {
            return 0;
        };
        let removed = count.min(*current);
        *current -= removed;
        if *current == 0 {
            self.buildings.remove(kind);
        }
        removed
    }

    pub fn active_instances(&self, event_id: &str) -> usize {
        self.active_effects
            .iter()
            .filter(|e| e.event_id == event_id)
            .count()
    }

    pub fn can_afford(&self, cost: &Resources) -> bool {
        self.resources.credits >= cost.credits
            && self.resources.energy >= cost.energy
            && self.resources.science >= cost.science
    }

    /// Deduct `cost` in full or not at all.
    pub fn try_spend(&mut self, cost: &Resources) -> bool {
        if !self.can_afford(cost) {
            return false;
        }
        self.resources.credits -= cost.credits;
        self.resources.energy -= cost.energy;
        self.resources.science -= cost.science;
        true
    }

    /// Deduct as much of `amount` as the pool holds. Reports a shortfall
    /// when the pool could not cover it.
    pub fn deduct_up_to(&mut self, kind: ResourceKind, amount: f64) -> Option<ResourceShortfall> {
        if amount <= 0.0 {
            return None;
        }
        let pool = self.resources.get_mut(kind);
        let deducted = amount.min(*pool);
        *pool -= deducted;
        if deducted < amount {
            Some(ResourceShortfall {
                resource: kind,
                requested: amount,
                deducted,
            })
        } else {
            None
        }
    }

    /// Add to a pool, never pushing it past `capacity`. A pool already
    /// above capacity is left where it is.
    pub fn credit(&mut self, kind: ResourceKind, amount: f64, capacity: Option<f64>) -> f64 {
        if amount <= 0.0 {
            return 0.0;
        }
        let pool = self.resources.get_mut(kind);
        let before = *pool;
        let target = before + amount;
        *pool = match capacity {
            Some(cap) if target > cap => cap.max(before),
            _ => target,
        };
        *pool - before
    }
}
