//! Snapshots: save, restore, and replay identically.

use std::path::PathBuf;
use std::sync::Arc;
use terra_core::{
    catalog::Catalogs,
    clock::SchedulerState,
    config::SimConfig,
    engine::SimEngine,
    error::SimError,
    snapshot::SessionSnapshot,
    state::InitialConditions,
    store::SimStore,
};

fn catalogs() -> Arc<Catalogs> {
    Arc::new(
        Catalogs::load(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../data"))
            .expect("shipped catalogs"),
    )
}

/// A busy Mars colony: enough buildings that most events are eligible.
fn busy_colony(run_id: &str, seed: u64) -> SimEngine {
    let catalogs = catalogs();
    let config = SimConfig::default_test();
    let initial = InitialConditions::for_planet(&catalogs, &config, "Mars")
        .expect("Mars")
        .with_buildings("solar_panel", 6)
        .with_buildings("research_lab", 2)
        .with_buildings("mining_facility", 1)
        .with_tech("basic_infrastructure");
    SimEngine::new(run_id.into(), seed, catalogs, config, initial)
}

#[test]
fn restored_session_replays_identically() {
    let mut original = busy_colony("replay", 0xC0FFEE);
    original.run_ticks(250).expect("warm up");

    let json = original.snapshot().to_json().expect("serialize");
    let snapshot = SessionSnapshot::from_json(&json).expect("deserialize");
    let mut restored = SimEngine::restore(snapshot, catalogs(), SimConfig::default_test())
        .expect("restore");
    assert_eq!(restored.state(), original.state());

    let events_a = original.run_ticks(500).expect("original");
    let events_b = restored.run_ticks(500).expect("restored");

    assert_eq!(events_a, events_b);
    assert_eq!(restored.state(), original.state());
    assert_eq!(restored.snapshot(), original.snapshot());
}

#[test]
fn snapshot_carries_rng_position_and_scheduler_state() {
    let mut engine = busy_colony("rng", 11);
    engine.run_ticks(40).expect("run");
    engine.pause().expect("pause");

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.tick, 40);
    assert_eq!(snapshot.rng.seed, 11);
    assert!(snapshot.rng.draws.iter().any(|d| d.draws > 0));
    assert_eq!(snapshot.scheduler, SchedulerState::Paused);

    let mut restored = SimEngine::restore(snapshot, catalogs(), SimConfig::default_test())
        .expect("restore");
    assert!(matches!(restored.tick(), Err(SimError::InvalidState { .. })));
}

#[test]
fn snapshot_naming_unknown_content_is_rejected() {
    let engine = busy_colony("mismatch", 5);

    let mut snapshot = engine.snapshot();
    snapshot.planet.unlocked_techs.insert("time_travel".into());
    assert!(matches!(
        SimEngine::restore(snapshot, catalogs(), SimConfig::default_test()),
        Err(SimError::SnapshotMismatch { .. })
    ));

    let mut snapshot = engine.snapshot();
    snapshot.tick = 99;
    assert!(matches!(
        SimEngine::restore(snapshot, catalogs(), SimConfig::default_test()),
        Err(SimError::SnapshotMismatch { .. })
    ));

    let mut snapshot = engine.snapshot();
    snapshot.format += 1;
    assert!(matches!(
        SimEngine::restore(snapshot, catalogs(), SimConfig::default_test()),
        Err(SimError::SnapshotMismatch { .. })
    ));
}

#[test]
fn journal_keeps_periodic_snapshots() {
    let store = SimStore::in_memory().expect("in-memory store");
    store.migrate().expect("migration");
    let mut engine = busy_colony("journal", 21)
        .with_store(store, "2026-01-01T00:00:00Z")
        .expect("attach store");

    engine.run_ticks(75).expect("run");
    let store = engine.store().expect("store attached");

    let (tick, json) = store
        .latest_snapshot_before("journal", 75)
        .expect("query")
        .expect("a snapshot exists");
    assert_eq!(tick, 60);

    let saved = SessionSnapshot::from_json(&json).expect("stored snapshot parses");
    assert_eq!(saved.tick, 60);
    assert_eq!(saved.planet.tick_count, 60);

    assert!(store.latest_snapshot_before("journal", 29).expect("query").is_none());
    assert_eq!(store.run_seed("journal").expect("query"), Some(21));
}

#[test]
fn failed_journal_write_leaves_the_session_untouched() {
    let path = std::env::temp_dir().join(format!("terra-journal-{}.db", std::process::id()));
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
    }

    let catalogs = catalogs();
    let config = SimConfig::default_test();
    let mut initial = InitialConditions::for_planet(&catalogs, &config, "Mars")
        .expect("Mars")
        .with_buildings("solar_panel", 4);
    initial.resources.credits = 5000.0;
    initial.resources.energy = 500.0;

    let store = SimStore::open(&path).expect("file store");
    store.migrate().expect("migration");
    let mut engine = SimEngine::new("broken".into(), 9, catalogs, config, initial)
        .with_store(store, "2026-01-01T00:00:00Z")
        .expect("attach store");

    rusqlite::Connection::open(&path)
        .expect("second connection")
        .execute_batch("DROP TABLE event_log;")
        .expect("drop journal table");

    let before = engine.snapshot();
    assert!(matches!(engine.research("basic_infrastructure"), Err(SimError::Database(_))));
    assert_eq!(engine.snapshot(), before, "research");
    assert!(engine.construct("solar_panel", 2).is_err());
    assert_eq!(engine.snapshot(), before, "construct");
    assert!(engine.demolish("solar_panel", 1).is_err());
    assert_eq!(engine.snapshot(), before, "demolish");
    assert!(engine.force_event("solar_flare").is_err());
    assert_eq!(engine.snapshot(), before, "force_event");
    assert!(engine.abandon().is_err());
    assert_eq!(engine.snapshot(), before, "abandon");
    assert_eq!(engine.scheduler_state(), SchedulerState::Running);
    assert!(engine.tick().is_err());
    assert_eq!(engine.snapshot(), before, "tick");

    drop(engine);
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
    }
}
