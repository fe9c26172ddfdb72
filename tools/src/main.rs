//! sim-runner: headless runner for the terraforming simulation.
//!
//! Usage:
//!   sim-runner --seed 12345 --ticks 900 --planet Mars --db run.db
//!   sim-runner --seed 12345 --planet Venus --ipc-mode
//!
//! In IPC mode the runner reads one JSON request per line on stdin and
//! answers each with one JSON line on stdout.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::io::{self, BufRead, Write};
use terra_core::{
    catalog,
    clock::{SchedulerState, SimSpeed},
    command::PlayerCommand,
    config::SimConfig,
    effect_subsystem::habitability_status,
    engine::SimEngine,
    event::SimEvent,
    state::{Gauges, Resources},
    store::SimStore,
    types::Tick,
};

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcRequest {
    GetState,
    Tick { count: u64 },
    Advance,
    Command { command: PlayerCommand },
    Quit,
}

#[derive(Serialize)]
struct UiState<'a> {
    tick: Tick,
    scheduler: SchedulerState,
    speed: SimSpeed,
    gauges: Gauges,
    resources: Resources,
    buildings: &'a BTreeMap<String, u32>,
    unlocked_techs: &'a BTreeSet<String>,
    available_research: Vec<&'a str>,
    active_effects: usize,
    habitability: f64,
    status: &'static str,
    events: Vec<SimEvent>,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let ticks = parse_arg(&args, "--ticks", 900u64);
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let db = string_arg(&args, "--db").unwrap_or(":memory:");
    let data_dir = string_arg(&args, "--data-dir").unwrap_or("./data");
    let planet = string_arg(&args, "--planet").unwrap_or("Mars");

    if !ipc_mode {
        println!("Terraforming sim-runner");
        println!("  seed:      {seed}");
        println!("  ticks:     {ticks}");
        println!("  planet:    {planet}");
        println!("  db:        {db}");
        println!("  data_dir:  {data_dir}");
        println!();
    }

    let catalogs = catalog::init_global(data_dir)
        .with_context(|| format!("Cannot load catalogs from {data_dir}"))?;
    let config = SimConfig::load(data_dir)?;

    let store = SimStore::open(db)?;
    store.migrate()?;

    let run_id = uuid::Uuid::new_v4().to_string();
    let started_at = chrono::Utc::now().to_rfc3339();
    let mut engine = SimEngine::for_planet(run_id.clone(), seed, catalogs, config, planet)?
        .with_store(store, &started_at)?;

    if ipc_mode {
        run_ipc_loop(&mut engine)?;
    } else {
        let events = engine.run_ticks(ticks)?;
        print_summary(&engine, &events)?;
    }

    Ok(())
}

fn run_ipc_loop(engine: &mut SimEngine) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }

        let request: IpcRequest = match serde_json::from_str(&buffer) {
            Ok(r) => r,
            Err(e) => {
                write_error(&mut stdout, &e.to_string())?;
                continue;
            }
        };

        let outcome = match request {
            IpcRequest::Quit => break,
            IpcRequest::GetState => Ok(vec![]),
            IpcRequest::Tick { count } => engine.run_ticks(count),
            IpcRequest::Advance => engine.advance(),
            IpcRequest::Command { command } => engine.apply_command(command),
        };

        match outcome {
            Ok(events) => {
                let state = build_ui_state(engine, events);
                writeln!(stdout, "{}", serde_json::to_string(&state)?)?;
                stdout.flush()?;
            }
            // Rejected requests leave the session untouched; report and carry on.
            Err(e) => write_error(&mut stdout, &e.to_string())?,
        }
    }
    Ok(())
}

fn write_error(out: &mut impl Write, message: &str) -> Result<()> {
    let err_json = serde_json::json!({ "error": message });
    writeln!(out, "{err_json}")?;
    out.flush()?;
    Ok(())
}

fn build_ui_state(engine: &SimEngine, events: Vec<SimEvent>) -> UiState<'_> {
    let state = engine.state();
    let habitability = engine.habitability();
    UiState {
        tick: state.tick_count,
        scheduler: engine.scheduler_state(),
        speed: engine.clock().speed,
        gauges: state.gauges,
        resources: state.resources,
        buildings: &state.buildings,
        unlocked_techs: &state.unlocked_techs,
        available_research: engine
            .catalogs()
            .tech_tree()
            .available(&state.unlocked_techs)
            .into_iter()
            .map(|node| node.id.as_str())
            .collect(),
        active_effects: state.active_effects.len(),
        habitability,
        status: habitability_status(habitability),
        events,
    }
}

fn print_summary(engine: &SimEngine, events: &[SimEvent]) -> Result<()> {
    let state = engine.state();
    let triggered = events
        .iter()
        .filter(|e| matches!(e, SimEvent::EventTriggered { .. }))
        .count();
    let journalled = match engine.store() {
        Some(store) => store.event_count(&engine.run_id)?,
        None => 0,
    };

    println!("=== RUN SUMMARY ===");
    println!("  run_id:         {}", engine.run_id);
    println!("  final tick:     {}", state.tick_count);
    println!("  scheduler:      {:?}", engine.scheduler_state());
    println!("  events fired:   {triggered}");
    println!("  active effects: {}", state.active_effects.len());
    println!("  journal rows:   {journalled}");

    println!();
    println!("=== PLANET ===");
    println!("  temperature:    {:.2} °C", state.gauges.temperature);
    println!("  pressure:       {:.3} atm", state.gauges.pressure);
    println!("  oxygen:         {:.2} %", state.gauges.oxygen);
    println!("  biodiversity:   {:.2}", state.gauges.biodiversity);
    let habitability = engine.habitability();
    println!(
        "  habitability:   {habitability:.1} ({})",
        habitability_status(habitability)
    );

    println!();
    println!("=== ECONOMY ===");
    println!("  credits:        {:.0}", state.resources.credits);
    println!("  energy:         {:.0}", state.resources.energy);
    println!("  science:        {:.0}", state.resources.science);
    println!("  credits earned: {:.0}", state.stats.credits_earned);
    println!("  techs:          {}", state.unlocked_techs.len());
    Ok(())
}

fn string_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
