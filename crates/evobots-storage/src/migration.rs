//! Island migration over a shared directory.
//!
//! Each island exports its best genomes to `migrants_from_<id>.dat`, a ring
//! coordinator moves them to `migrants_to_<next>.dat`, and the receiving
//! island consumes and deletes that file. `stop_island_<id>` asks an island
//! to shut down; `fitness_log_island_<id>.txt` gets one line per round.

use evobots_core::{GeneEntry, PopulationManager, Tick};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

use crate::{FileKind, StorageError, encode_entries, read_entries, write_atomic};

/// File naming inside the migration directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationDir {
    root: PathBuf,
}

impl MigrationDir {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the directory if it does not exist yet.
    pub fn ensure(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root).map_err(StorageError::io(&self.root))
    }

    #[must_use]
    pub fn outbound(&self, island: u32) -> PathBuf {
        self.root.join(format!("migrants_from_{island}.dat"))
    }

    #[must_use]
    pub fn inbound(&self, island: u32) -> PathBuf {
        self.root.join(format!("migrants_to_{island}.dat"))
    }

    #[must_use]
    pub fn stop_sentinel(&self, island: u32) -> PathBuf {
        self.root.join(format!("stop_island_{island}"))
    }

    #[must_use]
    pub fn fitness_log(&self, island: u32) -> PathBuf {
        self.root.join(format!("fitness_log_island_{island}.txt"))
    }
}

/// Rename `path` out of the way, read it and delete it. `Ok(None)` when the
/// file does not exist.
fn consume(path: &Path) -> Result<Option<Vec<GeneEntry>>, StorageError> {
    let mut claimed = path.as_os_str().to_owned();
    claimed.push(".claimed");
    let claimed = PathBuf::from(claimed);
    match fs::rename(path, &claimed) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(StorageError::io(path)(err)),
    }
    let entries = read_entries(&claimed, FileKind::Migrants);
    if let Err(err) = fs::remove_file(&claimed) {
        warn!(path = %claimed.display(), %err, "failed to remove consumed migrant file");
    }
    Ok(Some(entries?.unwrap_or_default()))
}

/// Timing and volume of migration rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationSettings {
    /// Ticks between rounds.
    pub interval_ticks: u64,
    /// Best pool entries exported per round.
    pub export_count: usize,
    /// Longest wait for inbound migrants.
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for MigrationSettings {
    fn default() -> Self {
        Self {
            interval_ticks: 1_000,
            export_count: 5,
            timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(10),
        }
    }
}

/// One line of an island's fitness log.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitnessLogLine {
    pub tick: Tick,
    pub best: Option<f32>,
    pub average: Option<f32>,
    /// Fitness of the most recently scored death.
    pub last: Option<f32>,
    pub pool_size: usize,
    pub diversity: f32,
    pub unix_ms: u128,
}

impl FitnessLogLine {
    #[must_use]
    pub fn from_population(tick: Tick, population: &PopulationManager) -> Self {
        let pool = population.pool();
        Self {
            tick,
            best: pool.best().map(|entry| entry.fitness),
            average: pool.average_fitness(),
            last: population.last_death_fitness(),
            pool_size: pool.len(),
            diversity: pool.diversity(),
            unix_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|elapsed| elapsed.as_millis())
                .unwrap_or_default(),
        }
    }
}

struct Maybe(Option<f32>);

impl fmt::Display for Maybe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(value) => write!(f, "{value:.3}"),
            None => f.write_str("-"),
        }
    }
}

impl fmt::Display for FitnessLogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tick={} best={} avg={} last={} pool={} diversity={:.4} time_ms={}",
            self.tick.0,
            Maybe(self.best),
            Maybe(self.average),
            Maybe(self.last),
            self.pool_size,
            self.diversity,
            self.unix_ms
        )
    }
}

/// Island side of the migration protocol.
#[derive(Debug, Clone)]
pub struct MigrationCoordinator {
    dir: MigrationDir,
    island_id: u32,
    settings: MigrationSettings,
}

impl MigrationCoordinator {
    #[must_use]
    pub fn new(dir: MigrationDir, island_id: u32, settings: MigrationSettings) -> Self {
        Self {
            dir,
            island_id,
            settings,
        }
    }

    #[must_use]
    pub fn island_id(&self) -> u32 {
        self.island_id
    }

    #[must_use]
    pub fn settings(&self) -> &MigrationSettings {
        &self.settings
    }

    #[must_use]
    pub fn dir(&self) -> &MigrationDir {
        &self.dir
    }

    /// Whether a round is due after `tick` completed.
    #[must_use]
    pub fn due(&self, tick: Tick) -> bool {
        self.settings.interval_ticks > 0
            && tick.0 > 0
            && tick.0.is_multiple_of(self.settings.interval_ticks)
    }

    #[must_use]
    pub fn stop_requested(&self) -> bool {
        self.dir.stop_sentinel(self.island_id).exists()
    }

    /// Write the first `export_count` entries of a fitness-sorted pool.
    pub fn export(&self, pool: &[GeneEntry]) -> Result<usize, StorageError> {
        let count = pool.len().min(self.settings.export_count);
        let path = self.dir.outbound(self.island_id);
        write_atomic(&path, &encode_entries(&pool[..count], FileKind::Migrants))?;
        debug!(island = self.island_id, count, "exported migrants");
        Ok(count)
    }

    /// Consume the inbound file if it is already present.
    pub fn take_inbound(&self) -> Result<Option<Vec<GeneEntry>>, StorageError> {
        consume(&self.dir.inbound(self.island_id))
    }

    /// Poll for inbound migrants until the configured timeout; an absent file
    /// yields no migrants.
    pub fn wait_for_inbound(&self) -> Result<Vec<GeneEntry>, StorageError> {
        let deadline = Instant::now() + self.settings.timeout;
        loop {
            if let Some(entries) = self.take_inbound()? {
                debug!(island = self.island_id, count = entries.len(), "received migrants");
                return Ok(entries);
            }
            let now = Instant::now();
            if now >= deadline {
                info!(
                    island = self.island_id,
                    timeout_ms = self.settings.timeout.as_millis() as u64,
                    "no inbound migrants before timeout"
                );
                return Ok(Vec::new());
            }
            thread::sleep(self.settings.poll_interval.min(deadline - now));
        }
    }

    pub fn append_fitness_log(&self, line: &FitnessLogLine) -> Result<(), StorageError> {
        let path = self.dir.fitness_log(self.island_id);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(StorageError::io(&path))?;
        writeln!(file, "{line}").map_err(StorageError::io(&path))
    }

    /// Export, log and wait for inbound migrants. Returns the migrants for the
    /// caller to offer to its gene pool.
    pub fn run_round(
        &self,
        tick: Tick,
        population: &PopulationManager,
    ) -> Result<Vec<GeneEntry>, StorageError> {
        self.export(population.pool().entries())?;
        self.append_fitness_log(&FitnessLogLine::from_population(tick, population))?;
        self.wait_for_inbound()
    }
}

/// Coordinator side: moves island `i`'s export to island `(i + 1) % n`.
#[derive(Debug, Clone)]
pub struct RingCoordinator {
    dir: MigrationDir,
    islands: u32,
}

impl RingCoordinator {
    #[must_use]
    pub fn new(dir: MigrationDir, islands: u32) -> Self {
        Self { dir, islands }
    }

    #[must_use]
    pub fn islands(&self) -> u32 {
        self.islands
    }

    #[must_use]
    pub fn destination(&self, island: u32) -> u32 {
        (island + 1) % self.islands.max(1)
    }

    fn pending(&self) -> Vec<u32> {
        (0..self.islands)
            .filter(|&island| !self.dir.outbound(island).exists())
            .collect()
    }

    /// Wait until every island has exported or `timeout` elapses. Returns the
    /// islands still missing.
    pub fn wait_for_exports(&self, timeout: Duration, poll: Duration) -> Vec<u32> {
        let deadline = Instant::now() + timeout;
        loop {
            let pending = self.pending();
            let now = Instant::now();
            if pending.is_empty() || now >= deadline {
                return pending;
            }
            thread::sleep(poll.min(deadline - now));
        }
    }

    /// Consume every available export as `(island, entries)`. Unreadable
    /// exports are logged and skipped.
    pub fn collect(&self) -> Vec<(u32, Vec<GeneEntry>)> {
        let mut batches = Vec::new();
        for island in 0..self.islands {
            match consume(&self.dir.outbound(island)) {
                Ok(Some(entries)) => batches.push((island, entries)),
                Ok(None) => {}
                Err(err) => warn!(island, %err, "dropping unreadable export"),
            }
        }
        batches
    }

    /// Append each batch to its destination's inbound file. Returns the number
    /// of migrants moved.
    pub fn redistribute(&self, batches: &[(u32, Vec<GeneEntry>)]) -> Result<usize, StorageError> {
        let mut moved = 0;
        for (island, entries) in batches {
            let destination = self.destination(*island);
            let path = self.dir.inbound(destination);
            let mut merged = match read_entries(&path, FileKind::Migrants) {
                Ok(existing) => existing.unwrap_or_default(),
                Err(err) => {
                    warn!(island = destination, %err, "replacing unreadable inbound file");
                    Vec::new()
                }
            };
            merged.extend(entries.iter().cloned());
            write_atomic(&path, &encode_entries(&merged, FileKind::Migrants))?;
            moved += entries.len();
            debug!(from = island, to = destination, count = entries.len(), "forwarded migrants");
        }
        Ok(moved)
    }

    /// Last non-empty line of an island's fitness log.
    pub fn last_fitness_line(&self, island: u32) -> Result<Option<String>, StorageError> {
        let path = self.dir.fitness_log(island);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(text
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .map(str::to_owned)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StorageError::io(&path)(err)),
        }
    }

    /// Drop a stop sentinel for every island.
    pub fn request_stop(&self) -> Result<(), StorageError> {
        for island in 0..self.islands {
            let path = self.dir.stop_sentinel(island);
            fs::write(&path, b"").map_err(StorageError::io(&path))?;
        }
        Ok(())
    }
}
