//! Runtime glue shared by the `evobots` island binary and the
//! `evobots-coordinator` binary.

use anyhow::{Context, Result};
use clap::Parser;
use evobots_core::{EvoBotsConfig, Tick, WorldState};
use evobots_storage::{
    ArchiveStore, MigrationCoordinator, MigrationDir, MigrationSettings, RingCoordinator,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Read a JSON config file; missing fields take their defaults.
pub fn load_config(path: Option<&Path>) -> Result<EvoBotsConfig> {
    let Some(path) = path else {
        return Ok(EvoBotsConfig::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse config {}", path.display()))
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "evobots",
    version,
    about = "Run one EvoBots island: evolve agents, persist the gene pool, exchange migrants"
)]
pub struct IslandArgs {
    /// Island number used in migration file names.
    #[arg(long = "island_id", alias = "island-id", default_value_t = 0)]
    pub island_id: u32,

    /// Gene pool file; the hall of fame is kept next to it with a `.hof` suffix.
    #[arg(
        long = "gene_pool_file",
        alias = "gene-pool-file",
        default_value = "gene_pool.txt"
    )]
    pub gene_pool_file: PathBuf,

    /// Shared directory for migration files. Migration is off when omitted.
    #[arg(long = "migration_dir", alias = "migration-dir")]
    pub migration_dir: Option<PathBuf>,

    /// Run without a renderer.
    #[arg(long)]
    pub headless: bool,

    /// Stop after this many ticks.
    #[arg(long)]
    pub ticks: Option<u64>,

    /// JSON configuration file.
    #[arg(long, env = "EVOBOTS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the configured RNG seed.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Wall-clock interval between gene pool saves.
    #[arg(long, default_value_t = 5_000)]
    pub save_interval_ms: u64,

    /// Log a progress line every N ticks (0 disables).
    #[arg(long, default_value_t = 1_000)]
    pub report_every: u64,

    /// Ticks between migration rounds.
    #[arg(long, default_value_t = 1_000)]
    pub migration_interval: u64,

    /// Longest wait for inbound migrants per round.
    #[arg(long, default_value_t = 5_000)]
    pub migration_timeout_ms: u64,

    /// Pool entries exported per round.
    #[arg(long, default_value_t = 5)]
    pub export_count: usize,
}

impl IslandArgs {
    #[must_use]
    pub fn migration_settings(&self) -> MigrationSettings {
        MigrationSettings {
            interval_ticks: self.migration_interval,
            export_count: self.export_count,
            timeout: Duration::from_millis(self.migration_timeout_ms),
            ..MigrationSettings::default()
        }
    }
}

/// What an island run ended with.
#[derive(Debug, Clone, PartialEq)]
pub struct IslandOutcome {
    pub ticks: Tick,
    pub pool_size: usize,
    pub best_fitness: Option<f32>,
    pub stopped_by_sentinel: bool,
}

fn save_archives(store: &ArchiveStore, world: &WorldState) {
    if let Err(err) = store.save(world.population()) {
        warn!(%err, path = %store.pool_path().display(), "gene pool save failed");
    }
}

/// Run an island until `--ticks` is reached or its stop sentinel appears.
pub fn run_island(args: &IslandArgs) -> Result<IslandOutcome> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(seed) = args.seed {
        config.rng_seed = Some(seed);
    }
    if !args.headless {
        info!("no renderer is built in; running headless");
    }

    let store = ArchiveStore::new(&args.gene_pool_file);
    let loaded = store.load();
    info!(
        island = args.island_id,
        pool = loaded.pool.len(),
        hall_of_fame = loaded.hall_of_fame.len(),
        path = %store.pool_path().display(),
        "loaded gene archives"
    );
    let mut world = WorldState::with_archives(config, loaded.pool, loaded.hall_of_fame)
        .context("invalid world configuration")?;

    let migration = match &args.migration_dir {
        Some(dir) => {
            let dir = MigrationDir::new(dir);
            dir.ensure().context("failed to create migration directory")?;
            Some(MigrationCoordinator::new(
                dir,
                args.island_id,
                args.migration_settings(),
            ))
        }
        None => None,
    };

    let save_interval = Duration::from_millis(args.save_interval_ms);
    let mut last_save = Instant::now();
    let mut stopped_by_sentinel = false;

    loop {
        if args.ticks.is_some_and(|limit| world.tick().0 >= limit) {
            break;
        }
        if migration.as_ref().is_some_and(MigrationCoordinator::stop_requested) {
            info!(island = args.island_id, tick = world.tick().0, "stop sentinel found");
            stopped_by_sentinel = true;
            break;
        }

        let summary = world.step();
        if args.report_every > 0 && summary.tick.0.is_multiple_of(args.report_every) {
            info!(
                island = args.island_id,
                tick = summary.tick.0,
                bots = summary.living_bots,
                pool = summary.pool_size,
                best = ?summary.best_fitness,
                mutation_rate = summary.mutation_rate,
                "progress"
            );
        }

        if let Some(migration) = &migration
            && migration.due(summary.tick)
        {
            match migration.run_round(summary.tick, world.population()) {
                Ok(migrants) => {
                    let accepted = world.import_migrants(&migrants);
                    info!(
                        island = args.island_id,
                        tick = summary.tick.0,
                        received = migrants.len(),
                        accepted,
                        "migration round"
                    );
                }
                Err(err) => warn!(island = args.island_id, %err, "migration round failed"),
            }
        }

        if last_save.elapsed() >= save_interval {
            save_archives(&store, &world);
            last_save = Instant::now();
        }
    }

    save_archives(&store, &world);
    let pool = world.population().pool();
    let outcome = IslandOutcome {
        ticks: world.tick(),
        pool_size: pool.len(),
        best_fitness: pool.best().map(|entry| entry.fitness),
        stopped_by_sentinel,
    };
    info!(
        island = args.island_id,
        ticks = outcome.ticks.0,
        pool = outcome.pool_size,
        best = ?outcome.best_fitness,
        "island finished"
    );
    Ok(outcome)
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "evobots-coordinator",
    version,
    about = "Pass migrants between EvoBots islands in a ring"
)]
pub struct CoordinatorArgs {
    #[arg(
        long = "migration_dir",
        alias = "migration-dir",
        default_value = "migration"
    )]
    pub migration_dir: PathBuf,

    #[arg(long, default_value_t = 4)]
    pub islands: u32,

    /// Migration rounds to run before exiting.
    #[arg(long, default_value_t = 20)]
    pub rounds: u32,

    /// Longest wait for every island's export in one round.
    #[arg(long, default_value_t = 60_000)]
    pub timeout_ms: u64,

    #[arg(long, default_value_t = 10)]
    pub poll_ms: u64,

    /// Write stop sentinels for every island after the last round.
    #[arg(long)]
    pub stop_when_done: bool,
}

/// Run the configured number of ring rounds; returns migrants moved.
pub fn run_coordinator(args: &CoordinatorArgs) -> Result<usize> {
    let dir = MigrationDir::new(&args.migration_dir);
    dir.ensure().context("failed to create migration directory")?;
    let ring = RingCoordinator::new(dir, args.islands);
    let timeout = Duration::from_millis(args.timeout_ms);
    let poll = Duration::from_millis(args.poll_ms.max(1));
    let mut total = 0;

    for round in 0..args.rounds {
        let missing = ring.wait_for_exports(timeout, poll);
        if !missing.is_empty() {
            warn!(round, ?missing, "islands missed the export deadline");
        }
        let batches = ring.collect();
        let moved = ring
            .redistribute(&batches)
            .with_context(|| format!("failed to forward migrants in round {round}"))?;
        total += moved;
        info!(round, islands = batches.len(), moved, "migration round complete");
        for island in 0..ring.islands() {
            match ring.last_fitness_line(island) {
                Ok(Some(line)) => info!(island, "{line}"),
                Ok(None) => info!(island, "no fitness log found"),
                Err(err) => warn!(island, %err, "failed to read fitness log"),
            }
        }
    }

    if args.stop_when_done {
        ring.request_stop().context("failed to write stop sentinels")?;
        info!(islands = ring.islands(), "stop sentinels written");
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn island_flags_accept_snake_and_kebab_case() {
        let snake = IslandArgs::try_parse_from([
            "evobots",
            "--island_id",
            "3",
            "--gene_pool_file",
            "pool.txt",
            "--migration_dir",
            "mig",
            "--headless",
        ])
        .expect("snake case");
        let kebab = IslandArgs::try_parse_from([
            "evobots",
            "--island-id",
            "3",
            "--gene-pool-file",
            "pool.txt",
            "--migration-dir",
            "mig",
            "--headless",
        ])
        .expect("kebab case");
        assert_eq!(snake.island_id, 3);
        assert_eq!(kebab.island_id, 3);
        assert_eq!(snake.gene_pool_file, kebab.gene_pool_file);
        assert_eq!(snake.migration_dir, Some(PathBuf::from("mig")));
        assert!(kebab.headless);
        assert_eq!(snake.save_interval_ms, 5_000);
    }

    #[test]
    fn migration_settings_follow_flags() {
        let args = IslandArgs::try_parse_from([
            "evobots",
            "--migration-interval",
            "250",
            "--migration-timeout-ms",
            "40",
            "--export-count",
            "3",
        ])
        .expect("args");
        let settings = args.migration_settings();
        assert_eq!(settings.interval_ticks, 250);
        assert_eq!(settings.timeout, Duration::from_millis(40));
        assert_eq!(settings.export_count, 3);
    }

    #[test]
    fn config_file_overrides_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "min_bots": 10, "hunters": { "count": 1 } }"#).expect("write");
        let config = load_config(Some(&path)).expect("config");
        assert_eq!(config.min_bots, 10);
        assert_eq!(config.hunters.count, 1);
        assert_eq!(config.food_count, 25);
        assert!(load_config(Some(&dir.path().join("missing.json"))).is_err());
    }

    #[test]
    fn short_island_run_saves_archives() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pool = dir.path().join("pool.txt");
        let args = IslandArgs::try_parse_from([
            "evobots",
            "--gene_pool_file",
            pool.to_str().expect("utf8"),
            "--ticks",
            "30",
            "--seed",
            "9",
            "--headless",
        ])
        .expect("args");
        let outcome = run_island(&args).expect("run");
        assert_eq!(outcome.ticks, Tick(30));
        assert!(!outcome.stopped_by_sentinel);
        assert!(pool.exists());
        assert!(evobots_storage::hall_of_fame_path(&pool).exists());
    }
}
