use anyhow::Result;
use clap::Parser;
use evobots_app::{IslandArgs, init_tracing, run_island};

fn main() -> Result<()> {
    init_tracing();
    let args = IslandArgs::parse();
    run_island(&args)?;
    Ok(())
}
