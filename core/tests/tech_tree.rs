//! Tech tree resolver: researchability, research transitions, ordering.

use std::collections::BTreeSet;
use std::path::PathBuf;
use terra_core::{
    catalog::Catalogs,
    error::SimError,
    state::{Gauges, InitialConditions, PlanetState, Resources},
};

fn shipped() -> Catalogs {
    Catalogs::load(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../data"))
        .expect("shipped catalogs")
}

fn colony(science: f64) -> PlanetState {
    PlanetState::new(InitialConditions {
        planet_kind: "Mars".into(),
        gauges: Gauges::default(),
        resources: Resources { credits: 0.0, energy: 0.0, science },
        buildings: Default::default(),
        unlocked_techs: Default::default(),
    })
}

#[test]
fn energy_systems_requires_basic_infrastructure() {
    let catalogs = shipped();
    let tree = catalogs.tech_tree();
    let mut state = colony(150.0);

    assert!(!tree.is_researchable(&state.unlocked_techs, "energy_systems"));
    let err = tree.research(&mut state, "energy_systems").unwrap_err();
    assert!(matches!(err, SimError::NotResearchable { ref tech_id } if tech_id == "energy_systems"));
    assert_eq!(state.resources.science, 150.0);
    assert!(state.unlocked_techs.is_empty());

    tree.research(&mut state, "basic_infrastructure").expect("root tech");
    assert!(tree.is_researchable(&state.unlocked_techs, "energy_systems"));

    let node = tree.research(&mut state, "energy_systems").expect("prerequisites met");
    assert_eq!(node.unlocks, ["heater", "cooler"]);
    assert_eq!(state.resources.science, 50.0);
    assert!(state.unlocked_techs.contains("energy_systems"));
    assert_eq!(state.stats.technologies_researched, 2);
}

#[test]
fn insufficient_science_leaves_state_untouched() {
    let catalogs = shipped();
    let tree = catalogs.tech_tree();
    let mut state = colony(99.0);
    state.unlocked_techs.insert("basic_infrastructure".into());
    let before = state.clone();

    let err = tree.research(&mut state, "energy_systems").unwrap_err();
    match err {
        SimError::InsufficientScience { required, available, .. } => {
            assert_eq!(required, 100.0);
            assert_eq!(available, 99.0);
        }
        other => panic!("expected InsufficientScience, got {other}"),
    }
    assert_eq!(state, before);
}

#[test]
fn research_deducts_exactly_the_cost() {
    let catalogs = shipped();
    let tree = catalogs.tech_tree();
    let mut state = colony(100.0);
    state.unlocked_techs.insert("basic_infrastructure".into());

    tree.research(&mut state, "energy_systems").expect("exact balance is enough");
    assert_eq!(state.resources.science, 0.0);
}

#[test]
fn unknown_and_already_unlocked_techs_are_not_researchable() {
    let catalogs = shipped();
    let tree = catalogs.tech_tree();
    let mut state = colony(10_000.0);

    assert!(matches!(
        tree.research(&mut state, "warp_drive"),
        Err(SimError::NotResearchable { .. })
    ));

    tree.research(&mut state, "basic_infrastructure").expect("root");
    assert!(!tree.is_researchable(&state.unlocked_techs, "basic_infrastructure"));
    assert!(matches!(
        tree.research(&mut state, "basic_infrastructure"),
        Err(SimError::NotResearchable { .. })
    ));
}

#[test]
fn topological_order_puts_prerequisites_first() {
    let catalogs = shipped();
    let tree = catalogs.tech_tree();

    let order: Vec<&str> = tree.topological_order().map(|n| n.id.as_str()).collect();
    assert_eq!(order.len(), tree.len());
    for node in tree.nodes() {
        let at = order.iter().position(|id| *id == node.id).expect("in order");
        for prerequisite in &node.prerequisites {
            let before = order.iter().position(|id| id == prerequisite).expect("in order");
            assert!(before < at, "{prerequisite} must come before {}", node.id);
        }
    }
    assert_eq!(order[0], "basic_infrastructure");
}

#[test]
fn rank_is_longest_prerequisite_chain() {
    let catalogs = shipped();
    let tree = catalogs.tech_tree();
    let rank = |id: &str| tree.get(id).expect(id).rank;

    assert_eq!(rank("basic_infrastructure"), 0);
    assert_eq!(rank("energy_systems"), 1);
    assert_eq!(rank("life_support"), 1);
    assert_eq!(rank("atmospheric_engineering"), 2);
    assert_eq!(rank("oxygen_synthesis"), 3);
    assert_eq!(rank("biotechnology"), 4);
    assert_eq!(rank("planetary_engineering"), 5);
}

#[test]
fn duplicate_prerequisites_collapse() {
    let techs = r#"{
        "a": { "name": "A" },
        "b": { "name": "B", "prerequisites": ["a", "a"] }
    }"#;
    let catalogs = Catalogs::from_json_strs(techs, "{}", "{}").expect("valid");
    assert_eq!(catalogs.tech_tree().get("b").expect("b").prerequisites, ["a"]);
}

#[test]
fn available_lists_the_research_frontier() {
    let catalogs = shipped();
    let tree = catalogs.tech_tree();
    let mut unlocked = BTreeSet::new();

    let frontier: Vec<&str> = tree.available(&unlocked).iter().map(|n| n.id.as_str()).collect();
    assert_eq!(frontier, ["basic_infrastructure"]);

    unlocked.insert("basic_infrastructure".to_string());
    let frontier: BTreeSet<&str> = tree.available(&unlocked).iter().map(|n| n.id.as_str()).collect();
    assert_eq!(
        frontier,
        BTreeSet::from(["energy_systems", "life_support", "xenoarchaeology"])
    );

    let unlocks = tree.unlocked_ids(&unlocked);
    assert!(unlocks.contains("research_lab"));
    assert!(tree.is_unlocked(&unlocked, "mining_facility"));
    assert!(!tree.is_unlocked(&unlocked, "habitat_dome"));
}

#[test]
fn special_grant_skips_techs_with_missing_prerequisites() {
    let catalogs = shipped();
    let tree = catalogs.tech_tree();
    let mut state = colony(0.0);

    assert!(tree.grant_special(&mut state).is_none());

    state.unlocked_techs.insert("basic_infrastructure".into());
    let granted = tree.grant_special(&mut state).expect("xenoarchaeology qualifies");
    assert_eq!(granted.id, "xenoarchaeology");
    assert_eq!(state.resources.science, 0.0);
}
