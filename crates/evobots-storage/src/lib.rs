//! File-backed persistence for EvoBots gene archives and the island
//! migration handoff directory.

mod codec;
mod migration;

pub use codec::{FileKind, GENE_POOL_HEADER, decode_entries, encode_entries};
pub use migration::{
    FitnessLogLine, MigrationCoordinator, MigrationDir, MigrationSettings, RingCoordinator,
};

use evobots_brain::GenomeError;
use evobots_core::{GeneEntry, PopulationManager};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

/// Storage error wrapper.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed gene file at line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("genome shape rejected: {0}")]
    Genome(#[from] GenomeError),
}

impl StorageError {
    pub(crate) fn io(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Replace `path` with `contents` via a temp file in the same directory.
pub fn write_atomic(path: &Path, contents: &str) -> Result<(), StorageError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir).map_err(StorageError::io(path))?;
    file.write_all(contents.as_bytes())
        .map_err(StorageError::io(path))?;
    file.as_file().sync_all().map_err(StorageError::io(path))?;
    file.persist(path)
        .map_err(|err| StorageError::io(path)(err.error))?;
    Ok(())
}

/// Read entries from `path`. A missing file yields `Ok(None)`.
pub fn read_entries(path: &Path, kind: FileKind) -> Result<Option<Vec<GeneEntry>>, StorageError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(StorageError::io(path)(err)),
    };
    decode_entries(&text, kind).map(Some)
}

/// Sibling path holding the hall of fame for a gene pool file.
#[must_use]
pub fn hall_of_fame_path(pool_path: &Path) -> PathBuf {
    let mut name = pool_path.as_os_str().to_owned();
    name.push(".hof");
    PathBuf::from(name)
}

/// Gene pool and hall of fame as loaded from disk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedArchives {
    pub pool: Vec<GeneEntry>,
    pub hall_of_fame: Vec<GeneEntry>,
}

/// Gene pool file plus its hall of fame sibling.
#[derive(Debug, Clone)]
pub struct ArchiveStore {
    pool_path: PathBuf,
    hall_of_fame_path: PathBuf,
}

impl ArchiveStore {
    #[must_use]
    pub fn new(pool_path: impl Into<PathBuf>) -> Self {
        let pool_path = pool_path.into();
        Self {
            hall_of_fame_path: hall_of_fame_path(&pool_path),
            pool_path,
        }
    }

    #[must_use]
    pub fn pool_path(&self) -> &Path {
        &self.pool_path
    }

    #[must_use]
    pub fn hall_of_fame_path(&self) -> &Path {
        &self.hall_of_fame_path
    }

    /// Load both archives, sorted by descending fitness. Missing or malformed
    /// files load as empty archives.
    #[must_use]
    pub fn load(&self) -> LoadedArchives {
        LoadedArchives {
            pool: load_lenient(&self.pool_path),
            hall_of_fame: load_lenient(&self.hall_of_fame_path),
        }
    }

    /// Write both archives atomically.
    pub fn save_entries(
        &self,
        pool: &[GeneEntry],
        hall_of_fame: &[GeneEntry],
    ) -> Result<(), StorageError> {
        write_atomic(&self.pool_path, &encode_entries(pool, FileKind::GenePool))?;
        write_atomic(
            &self.hall_of_fame_path,
            &encode_entries(hall_of_fame, FileKind::GenePool),
        )?;
        debug!(
            path = %self.pool_path.display(),
            pool = pool.len(),
            hall_of_fame = hall_of_fame.len(),
            "saved gene archives"
        );
        Ok(())
    }

    pub fn save(&self, population: &PopulationManager) -> Result<(), StorageError> {
        self.save_entries(
            population.pool().entries(),
            population.hall_of_fame().entries(),
        )
    }
}

fn load_lenient(path: &Path) -> Vec<GeneEntry> {
    match read_entries(path, FileKind::GenePool) {
        Ok(Some(mut entries)) => {
            entries.sort_by(|a, b| b.fitness.total_cmp(&a.fitness));
            entries
        }
        Ok(None) => {
            debug!(path = %path.display(), "no gene file, starting empty");
            Vec::new()
        }
        Err(err) => {
            warn!(path = %path.display(), %err, "ignoring unreadable gene file");
            Vec::new()
        }
    }
}
