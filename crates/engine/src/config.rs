//! Tree configuration and on-disk layout.

use anyhow::{ensure, Result};
use bloom::{BloomFilter, Filter};
use memtable::{MemTableConstructor, Skiplist};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

/// Factory producing fresh filters; one instance per SSTable writer plus
/// one per node for membership checks.
pub type FilterConstructor = Arc<dyn Fn() -> Box<dyn Filter> + Send + Sync>;

/// Tunables for a [`Tree`](crate::Tree).
///
/// [`Config::new`] fills in the defaults; adjust fields directly before
/// handing the config to `Tree::new`.
#[derive(Clone)]
pub struct Config {
    /// Root directory. SSTables live here, WALs under `walfile/`.
    pub dir: PathBuf,
    /// Number of levels, `0..max_level`. At least 2.
    pub max_level: usize,
    /// Level-0 SSTable size threshold in bytes; each deeper level allows
    /// ten times more.
    pub sst_size: u64,
    /// Data block seal threshold in bytes.
    pub sst_data_block_size: usize,
    /// A level compacts when its total size exceeds its per-SST cap times
    /// this factor.
    pub sst_num_per_level: u64,
    /// Fsync after every WAL append. Off by default: appends still reach
    /// the OS page cache before `put` returns.
    pub wal_sync: bool,
    /// Pluggable block filter; bloom with a 1024-bit bitmap by default.
    pub filter_constructor: FilterConstructor,
    /// Pluggable memtable; skiplist by default.
    pub memtable_constructor: MemTableConstructor,
}

impl Config {
    /// A config for `dir` with default tunables.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_level: 7,
            sst_size: 1024 * 1024,
            sst_data_block_size: 16 * 1024,
            sst_num_per_level: 10,
            wal_sync: false,
            filter_constructor: Arc::new(|| Box::new(BloomFilter::new(1024)) as Box<dyn Filter>),
            memtable_constructor: Arc::new(|| {
                Box::new(Skiplist::new()) as Box<dyn memtable::MemTable>
            }),
        }
    }

    /// Validates the tunables and creates the directory layout.
    pub(crate) fn prepare(&self) -> Result<()> {
        ensure!(self.max_level >= 2, "max_level must be at least 2");
        ensure!(self.sst_size > 0, "sst_size must be positive");
        ensure!(
            self.sst_data_block_size > 0,
            "sst_data_block_size must be positive"
        );
        ensure!(
            self.sst_num_per_level > 0,
            "sst_num_per_level must be positive"
        );

        fs::create_dir_all(&self.dir)?;
        fs::create_dir_all(self.wal_dir())?;
        Ok(())
    }

    pub(crate) fn sst_path(&self, level: usize, seq: u32) -> PathBuf {
        self.dir.join(format!("{}_{}.sst", level, seq))
    }

    pub(crate) fn wal_dir(&self) -> PathBuf {
        self.dir.join("walfile")
    }

    pub(crate) fn wal_path(&self, memtable_index: usize) -> PathBuf {
        self.wal_dir().join(format!("{}.wal", memtable_index))
    }

    /// Per-SST size cap at `level`: `sst_size * 10^level`.
    pub(crate) fn level_sst_limit(&self, level: usize) -> u64 {
        self.sst_size * 10u64.pow(level as u32)
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("dir", &self.dir)
            .field("max_level", &self.max_level)
            .field("sst_size", &self.sst_size)
            .field("sst_data_block_size", &self.sst_data_block_size)
            .field("sst_num_per_level", &self.sst_num_per_level)
            .field("wal_sync", &self.wal_sync)
            .finish()
    }
}
