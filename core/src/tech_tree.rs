//! Technology dependency graph.
//!
//! Nodes live in an arena; prerequisite edges are indices into it.
//! The graph is validated once at load with Kahn's algorithm, which
//! also yields a topological order and a rank (longest prerequisite
//! chain) for every node. After load the tree is immutable.

use crate::{
    error::{CatalogError, SimError, SimResult},
    state::PlanetState,
    types::TechId,
};
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap, VecDeque};

#[derive(Debug, Clone, PartialEq)]
pub struct TechNode {
    pub id: TechId,
    pub name: String,
    pub description: String,
    /// Asset path, opaque to the engine.
    pub icon: String,
    pub science_cost: u32,
    /// Ordered, without duplicates.
    pub prerequisites: Vec<TechId>,
    /// Building/effect ids surfaced to the construction collaborator.
    pub unlocks: Vec<String>,
    /// May be granted for free by `unlock_special_tech` events.
    pub special: bool,
    /// 0 for roots; otherwise 1 + the highest prerequisite rank.
    pub rank: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RawCost {
    #[serde(default)]
    science: u32,
}

/// Technology record as it appears in `technologies.json`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawTech {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    icon: String,
    #[serde(default)]
    cost: RawCost,
    #[serde(default)]
    prerequisites: Vec<TechId>,
    #[serde(default)]
    unlocks: Vec<String>,
    #[serde(default)]
    special: bool,
}

#[derive(Debug, Clone, Default)]
pub struct TechTree {
    nodes: Vec<TechNode>,
    index: HashMap<TechId, usize>,
    prerequisite_edges: Vec<Vec<usize>>,
    topological: Vec<usize>,
}

impl TechTree {
    /// Build and validate the graph. Entries keep declaration order.
    pub(crate) fn build(entries: Vec<(TechId, RawTech)>) -> Result<Self, CatalogError> {
        let mut index = HashMap::with_capacity(entries.len());
        for (i, (id, _)) in entries.iter().enumerate() {
            if index.insert(id.clone(), i).is_some() {
                return Err(CatalogError::Malformed {
                    entry: id.clone(),
                    reason: "duplicate technology id".into(),
                });
            }
        }

        let mut nodes = Vec::with_capacity(entries.len());
        let mut prerequisite_edges = Vec::with_capacity(entries.len());
        for (id, raw) in entries {
            let mut prerequisites: Vec<TechId> = Vec::with_capacity(raw.prerequisites.len());
            let mut edges = Vec::with_capacity(raw.prerequisites.len());
            for prerequisite in raw.prerequisites {
                if prerequisites.contains(&prerequisite) {
                    continue;
                }
                let Some(&target) = index.get(&prerequisite) else {
                    return Err(CatalogError::InvalidTechGraph {
                        tech_id: id,
                        reason: format!("prerequisite '{prerequisite}' is not defined"),
                    });
                };
                edges.push(target);
                prerequisites.push(prerequisite);
            }
            prerequisite_edges.push(edges);
            nodes.push(TechNode {
                id,
                name: raw.name,
                description: raw.description,
                icon: raw.icon,
                science_cost: raw.cost.science,
                prerequisites,
                unlocks: raw.unlocks,
                special: raw.special,
                rank: 0,
            });
        }

        let topological = Self::topological_sort(&mut nodes, &prerequisite_edges)?;
        Ok(Self {
            nodes,
            index,
            prerequisite_edges,
            topological,
        })
    }

    /// Kahn's algorithm over prerequisite edges. Ties are broken by
    /// declaration order so the result is stable.
    fn topological_sort(
        nodes: &mut [TechNode],
        prerequisite_edges: &[Vec<usize>],
    ) -> Result<Vec<usize>, CatalogError> {
        let n = nodes.len();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut pending: Vec<usize> = vec![0; n];
        for (node, edges) in prerequisite_edges.iter().enumerate() {
            pending[node] = edges.len();
            for &prerequisite in edges {
                dependents[prerequisite].push(node);
            }
        }

        let mut ready: VecDeque<usize> = (0..n).filter(|&i| pending[i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        while let Some(node) = ready.pop_front() {
            order.push(node);
            for &dependent in &dependents[node] {
                nodes[dependent].rank = nodes[dependent].rank.max(nodes[node].rank + 1);
                pending[dependent] -= 1;
                if pending[dependent] == 0 {
                    ready.push_back(dependent);
                }
            }
        }

        if order.len() < n {
            let stuck: Vec<&str> = (0..n)
                .filter(|&i| pending[i] > 0)
                .map(|i| nodes[i].id.as_str())
                .collect();
            return Err(CatalogError::InvalidTechGraph {
                tech_id: stuck[0].to_string(),
                reason: format!("prerequisite cycle among [{}]", stuck.join(", ")),
            });
        }
        Ok(order)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, tech_id: &str) -> Option<&TechNode> {
        self.index.get(tech_id).map(|&i| &self.nodes[i])
    }

    /// Declaration order.
    pub fn nodes(&self) -> impl Iterator<Item = &TechNode> {
        self.nodes.iter()
    }

    /// Every node after all of its prerequisites.
    pub fn topological_order(&self) -> impl Iterator<Item = &TechNode> {
        self.topological.iter().map(|&i| &self.nodes[i])
    }

    fn prerequisites_met(&self, node: usize, unlocked: &BTreeSet<TechId>) -> bool {
        self.prerequisite_edges[node]
            .iter()
            .all(|&p| unlocked.contains(&self.nodes[p].id))
    }

    /// True iff every prerequisite is unlocked and the tech itself is not.
    pub fn is_researchable(&self, unlocked: &BTreeSet<TechId>, tech_id: &str) -> bool {
        match self.index.get(tech_id) {
            Some(&i) => !unlocked.contains(tech_id) && self.prerequisites_met(i, unlocked),
            None => false,
        }
    }

    /// Researchable right now, in topological order.
    pub fn available(&self, unlocked: &BTreeSet<TechId>) -> Vec<&TechNode> {
        self.topological_order()
            .filter(|node| self.is_researchable(unlocked, &node.id))
            .collect()
    }

    /// Complete research of `tech_id`, paying its science cost.
    /// On failure the state is untouched.
    pub fn research(&self, state: &mut PlanetState, tech_id: &str) -> SimResult<&TechNode> {
        if !self.is_researchable(&state.unlocked_techs, tech_id) {
            return Err(SimError::NotResearchable {
                tech_id: tech_id.to_string(),
            });
        }
        let node = self
            .get(tech_id)
            .ok_or_else(|| SimError::NotResearchable { tech_id: tech_id.to_string() })?;

        let cost = f64::from(node.science_cost);
        if state.resources.science < cost {
            return Err(SimError::InsufficientScience {
                tech_id: node.id.clone(),
                required: cost,
                available: state.resources.science,
            });
        }

        state.resources.science -= cost;
        state.unlocked_techs.insert(node.id.clone());
        state.stats.technologies_researched += 1;
        log::info!(
            "Research completed: {} (cost {}, unlocks {:?})",
            node.id,
            node.science_cost,
            node.unlocks
        );
        Ok(node)
    }

    /// Grant the first special tech, in topological order, whose
    /// prerequisites are met. Free of cost.
    pub fn grant_special(&self, state: &mut PlanetState) -> Option<&TechNode> {
        let node = self
            .topological_order()
            .find(|node| node.special && self.is_researchable(&state.unlocked_techs, &node.id))?;
        state.unlocked_techs.insert(node.id.clone());
        state.stats.technologies_researched += 1;
        log::info!("Special technology granted: {}", node.id);
        Some(node)
    }

    /// Union of `unlocks` over every unlocked tech.
    pub fn unlocked_ids(&self, unlocked: &BTreeSet<TechId>) -> BTreeSet<String> {
        unlocked
            .iter()
            .filter_map(|id| self.get(id))
            .flat_map(|node| node.unlocks.iter().cloned())
            .collect()
    }

    pub fn is_unlocked(&self, unlocked: &BTreeSet<TechId>, id: &str) -> bool {
        unlocked
            .iter()
            .filter_map(|t| self.get(t))
            .any(|node| node.unlocks.iter().any(|u| u == id))
    }
}
