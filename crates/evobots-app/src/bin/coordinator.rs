use anyhow::Result;
use clap::Parser;
use evobots_app::{CoordinatorArgs, init_tracing, run_coordinator};
use tracing::info;

fn main() -> Result<()> {
    init_tracing();
    let args = CoordinatorArgs::parse();
    let moved = run_coordinator(&args)?;
    info!(moved, rounds = args.rounds, "coordinator done");
    Ok(())
}
