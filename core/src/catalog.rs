//! Catalog loader: technologies, events and planets.
//!
//! Catalogs are parsed and validated once, then shared read-only.
//! Any failure here is fatal; a session never starts on a bad catalog.
//!
//! Files under the data directory:
//!   - technologies.json  tech id  → record
//!   - events.json        event id → record
//!   - planets.json       planet id → record
//!
//! Declaration order is preserved: the event pass walks events in
//! exactly the order they appear in the file.

use crate::{
    error::CatalogError,
    event_catalog::{EventDefinition, RawEvent},
    state::Gauges,
    tech_tree::{RawTech, TechTree},
    types::{EventId, PlanetKind},
};
use serde::{
    de::{MapAccess, Visitor},
    Deserialize, Deserializer,
};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::{Arc, OnceLock};

pub const TECHNOLOGIES_FILE: &str = "technologies.json";
pub const EVENTS_FILE: &str = "events.json";
pub const PLANETS_FILE: &str = "planets.json";

/// A JSON object read as an ordered list of (key, value) pairs.
/// Unlike a map, repeated keys survive parsing so callers can reject them.
#[derive(Debug, Clone)]
pub(crate) struct Ordered<T>(pub(crate) Vec<(String, T)>);

impl<T> Default for Ordered<T> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Ordered<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor<T>(PhantomData<T>);

        impl<'de, T: Deserialize<'de>> Visitor<'de> for OrderedVisitor<T> {
            type Value = Ordered<T>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a JSON object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((id, record)) = map.next_entry::<String, T>()? {
                    entries.push((id, record));
                }
                Ok(Ordered(entries))
            }
        }

        deserializer.deserialize_map(OrderedVisitor(PhantomData))
    }
}

fn parse_ordered<T: for<'de> Deserialize<'de>>(
    path: &str,
    content: &str,
) -> Result<Vec<(String, T)>, CatalogError> {
    let Ordered(entries) = serde_json::from_str::<Ordered<T>>(content).map_err(|source| {
        CatalogError::Parse {
            path: path.to_string(),
            source,
        }
    })?;
    Ok(entries)
}

fn read(path: &Path) -> Result<String, CatalogError> {
    std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.display().to_string(),
        source,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanetDefinition {
    pub id: PlanetKind,
    pub name: String,
    pub description: String,
    pub initial: Gauges,
}

#[derive(Debug, Clone, Deserialize)]
struct RawPlanet {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: String,
    initial_temperature: f64,
    initial_pressure: f64,
    initial_oxygen: f64,
    #[serde(default)]
    initial_biodiversity: f64,
}

/// Immutable, validated catalogs.
#[derive(Debug, Clone, Default)]
pub struct Catalogs {
    techs: TechTree,
    events: Vec<EventDefinition>,
    event_index: HashMap<EventId, usize>,
    planets: Vec<PlanetDefinition>,
}

impl Catalogs {
    /// Load and validate all three catalogs from `data_dir`.
    pub fn load(data_dir: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let dir = data_dir.as_ref();
        let techs = read(&dir.join(TECHNOLOGIES_FILE))?;
        let events = read(&dir.join(EVENTS_FILE))?;
        let planets = read(&dir.join(PLANETS_FILE))?;
        Self::from_json_strs(&techs, &events, &planets)
    }

    /// Build from in-memory JSON documents, through the same validation.
    pub fn from_json_strs(techs: &str, events: &str, planets: &str) -> Result<Self, CatalogError> {
        let tech_entries = parse_ordered::<RawTech>(TECHNOLOGIES_FILE, techs)?;
        let tech_tree = TechTree::build(tech_entries)?;

        let mut definitions = Vec::new();
        let mut event_index = HashMap::new();
        for (id, raw) in parse_ordered::<RawEvent>(EVENTS_FILE, events)? {
            if event_index.contains_key(&id) {
                return Err(CatalogError::Malformed {
                    entry: id,
                    reason: "duplicate event id".into(),
                });
            }
            event_index.insert(id.clone(), definitions.len());
            definitions.push(raw.into_definition(id)?);
        }

        let mut seen = HashSet::new();
        let mut planet_defs = Vec::new();
        for (id, raw) in parse_ordered::<RawPlanet>(PLANETS_FILE, planets)? {
            if !seen.insert(id.clone()) {
                return Err(CatalogError::Malformed {
                    entry: id,
                    reason: "duplicate planet id".into(),
                });
            }
            planet_defs.push(PlanetDefinition {
                name: raw.name.unwrap_or_else(|| id.clone()),
                id,
                description: raw.description,
                initial: Gauges {
                    oxygen: raw.initial_oxygen,
                    pressure: raw.initial_pressure,
                    temperature: raw.initial_temperature,
                    biodiversity: raw.initial_biodiversity,
                },
            });
        }

        let catalogs = Self {
            techs: tech_tree,
            events: definitions,
            event_index,
            planets: planet_defs,
        };
        catalogs.warn_on_unknown_planets();
        log::info!(
            "Loaded catalogs: {} technologies, {} events, {} planets",
            catalogs.techs.len(),
            catalogs.events.len(),
            catalogs.planets.len()
        );
        Ok(catalogs)
    }

    fn warn_on_unknown_planets(&self) {
        use crate::event_catalog::Requirement;
        for event in &self.events {
            for requirement in event.requirements.iter() {
                if let Requirement::Planets(planets) = requirement {
                    for planet in planets.iter().filter(|p| self.planet(p).is_none()) {
                        log::warn!("Event '{}' names unknown planet '{planet}'", event.id);
                    }
                }
            }
        }
    }

    pub fn tech_tree(&self) -> &TechTree {
        &self.techs
    }

    /// Declaration order.
    pub fn events(&self) -> &[EventDefinition] {
        &self.events
    }

    pub fn event(&self, event_id: &str) -> Option<&EventDefinition> {
        self.event_index.get(event_id).map(|&i| &self.events[i])
    }

    pub fn planets(&self) -> &[PlanetDefinition] {
        &self.planets
    }

    pub fn planet(&self, planet: &str) -> Option<&PlanetDefinition> {
        self.planets.iter().find(|p| p.id == planet)
    }
}

static GLOBAL: OnceLock<Arc<Catalogs>> = OnceLock::new();

/// Load the process-wide catalogs once. Later calls return the
/// catalogs installed by the first successful call.
pub fn init_global(data_dir: impl AsRef<Path>) -> Result<Arc<Catalogs>, CatalogError> {
    if let Some(existing) = GLOBAL.get() {
        return Ok(Arc::clone(existing));
    }
    let loaded = Arc::new(Catalogs::load(data_dir)?);
    Ok(Arc::clone(GLOBAL.get_or_init(|| loaded)))
}

/// The process-wide catalogs, if `init_global` has succeeded.
pub fn global() -> Option<Arc<Catalogs>> {
    GLOBAL.get().cloned()
}
