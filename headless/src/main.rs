//! Thin batch driver: load a scenario, run it for a fixed number of ticks with no rendering,
//! and print whatever the log accumulates. A structopt binary over the simulation crate, with no
//! HTTP control-plane surface.

use std::fs;
use std::path::PathBuf;
use std::process;

use anyhow::Context;
use structopt::StructOpt;

use aimsim::{ScenarioSpec, Simulator};

#[derive(StructOpt, Debug)]
#[structopt(name = "headless")]
struct Flags {
    /// Path to a scenario spec, as JSON.
    scenario: PathBuf,

    /// Number of timesteps to run.
    #[structopt(long, default_value = "600")]
    steps: u64,

    /// Print every log entry as it's produced, instead of just a final summary.
    #[structopt(long)]
    verbose: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let flags = Flags::from_args();
    if let Err(err) = run(&flags) {
        log::error!("{:#}", err);
        process::exit(exit_code_of(&err));
    }
}

fn run(flags: &Flags) -> anyhow::Result<()> {
    let raw = fs::read_to_string(&flags.scenario).with_context(|| format!("reading scenario file {}", flags.scenario.display()))?;
    let spec: ScenarioSpec = serde_json::from_str(&raw).with_context(|| format!("parsing scenario file {}", flags.scenario.display()))?;

    let mut sim = Simulator::new(&spec).context("building simulator from scenario")?;

    let mut spawned = 0u64;
    let mut departed = 0u64;
    for _ in 0..flags.steps {
        sim.step().context("stepping simulator")?;
        for entry in sim.fetch_log() {
            if flags.verbose {
                log::info!("{:?}", entry);
            }
            match entry {
                aimsim::LogEvent::Spawned { .. } => spawned += 1,
                aimsim::LogEvent::Departed { .. } => departed += 1,
                aimsim::LogEvent::ReservationCommitted { .. } => {}
            }
        }
    }

    log::info!("ran {} steps: {} spawned, {} departed, {} still in scope", flags.steps, spawned, departed, spawned - departed);
    Ok(())
}

/// Recovers the originating `AimError`'s exit code through `anyhow`'s source chain, falling back
/// to 1 for anything that isn't one (I/O and JSON-parsing failures reading the scenario file).
fn exit_code_of(err: &anyhow::Error) -> i32 {
    err.chain().find_map(|cause| cause.downcast_ref::<aimsim::AimError>()).map(|e| e.exit_code()).unwrap_or(1)
}
