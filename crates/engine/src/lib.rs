//! # Engine — the Strata LSM tree
//!
//! The central orchestrator tying the [`memtable`], [`wal`], [`sstable`],
//! and [`bloom`] crates into a complete log-structured merge-tree
//! key-value store.
//!
//! ## Architecture
//!
//! ```text
//! Client
//!   |
//!   v
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          TREE                                │
//! │                                                              │
//! │ write.rs → WAL append → active memtable insert               │
//! │              |                                               │
//! │              | (memtable over threshold?)                    │
//! │              v            yes                                │
//! │        rotate memtable ──────────► flush channel             │
//! │                                        |                     │
//! │ read.rs → memtables → L0 → L1..Lmax    |                     │
//! │            (first match wins)          v                     │
//! │                               ┌─────────────────┐            │
//! │                               │ COMPACTOR THREAD │            │
//! │                               │  flush to L0     │            │
//! │                               │  merge L → L+1   │            │
//! │                               └─────────────────┘            │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module responsibilities
//!
//! | Module          | Purpose                                            |
//! |-----------------|----------------------------------------------------|
//! | `lib.rs`        | `Tree` struct, constructor, `close`, accessors     |
//! | [`config`]      | Tunables, directory layout, pluggable constructors |
//! | [`node`]        | One SSTable as a live tree node                    |
//! | [`write`]       | `put()` and memtable rotation                      |
//! | [`read`]        | `get()` across memtables and levels                |
//! | [`compaction`]  | Background thread: flushes and level merges        |
//! | [`recovery`]    | Cold start: SSTable loading and WAL replay         |
//!
//! ## Levels
//!
//! ```text
//! ┌────────────────────────────┐  ← freshest, checked first
//! │ active + read-only memtables│
//! ├────────────────────────────┤  ← from flushes (may overlap)
//! │ L0 SSTables                │
//! ├────────────────────────────┤  ← from compaction (disjoint, sorted)
//! │ L1 .. Lmax SSTables        │
//! └────────────────────────────┘
//! ```
//!
//! ## Crash safety
//!
//! Every write is appended to the active WAL **before** the memtable
//! insert; a WAL error leaves the memtable untouched. A rotated memtable's
//! WAL is deleted only after its SSTable flush completes, so on restart the
//! WAL directory reconstructs exactly the memtables that were lost. No
//! checksums are stored anywhere; bitrot detection is out of scope.

mod compaction;
mod config;
mod node;
mod read;
mod recovery;
mod write;

pub use config::{Config, FilterConstructor};

use anyhow::Result;
use crossbeam_channel::{unbounded, Sender};
use memtable::MemTable;
use node::Node;
use parking_lot::{Mutex, RwLock};
use std::path::PathBuf;
use std::sync::atomic::AtomicU32;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{error, info};
use wal::WalWriter;

/// A rotated memtable travelling to the compactor, paired with the WAL
/// file that made it durable.
pub(crate) struct FlushItem {
    pub(crate) wal_path: PathBuf,
    pub(crate) memtable: Box<dyn MemTable>,
}

/// Mutable write-side state, guarded by the tree-wide data lock.
pub(crate) struct DataState {
    /// The one writable memtable.
    pub(crate) memtable: Box<dyn MemTable>,
    /// WAL writer paired with the active memtable.
    pub(crate) wal_writer: WalWriter,
    /// Rotated memtables not yet flushed, oldest first.
    pub(crate) read_only: Vec<Arc<FlushItem>>,
    /// Monotonic index pairing memtables with `{index}.wal` files.
    pub(crate) memtable_index: usize,
}

/// State shared between the foreground handle and the compactor thread.
pub(crate) struct TreeInner {
    pub(crate) conf: Config,
    /// Tree-wide readers-writer lock over the memtable set and WAL identity.
    pub(crate) data: RwLock<DataState>,
    /// One lock per level so a merge at L3 does not block reads at L1.
    /// `levels[0]` may hold overlapping nodes in insertion order; deeper
    /// levels stay disjoint and sorted by start key.
    pub(crate) levels: Vec<RwLock<Vec<Arc<Node>>>>,
    /// Per-level SSTable sequence numbers; written only by the compactor.
    pub(crate) level_seq: Vec<AtomicU32>,
    pub(crate) flush_tx: Sender<Arc<FlushItem>>,
    pub(crate) compact_tx: Sender<usize>,
}

/// An embedded LSM-tree key-value store.
///
/// `put` and `get` may be called from any number of threads; one background
/// thread owns all flushing and compaction. Dropping the tree (or calling
/// [`close`](Tree::close)) stops the background thread and waits for it.
pub struct Tree {
    inner: Arc<TreeInner>,
    stop_tx: Sender<()>,
    compactor: Mutex<Option<JoinHandle<()>>>,
}

impl Tree {
    /// Opens a tree at `conf.dir`, recovering all persisted state.
    ///
    /// # Recovery steps
    ///
    /// 1. Validate the config; create `dir` and `dir/walfile` if absent.
    /// 2. Load every parseable `{level}_{seq}.sst` into its level.
    /// 3. Start the compactor thread.
    /// 4. Replay `walfile/*.wal`: the newest becomes the active memtable,
    ///    the rest re-enter the flush queue as read-only memtables.
    pub fn new(conf: Config) -> Result<Self> {
        conf.prepare()?;

        let (flush_tx, flush_rx) = unbounded();
        let (compact_tx, compact_rx) = unbounded();
        let (stop_tx, stop_rx) = unbounded();

        let (nodes, seqs) = recovery::load_nodes(&conf)?;
        let (data, pending) = recovery::restore_memtables(&conf)?;

        let inner = Arc::new(TreeInner {
            data: RwLock::new(data),
            levels: nodes.into_iter().map(RwLock::new).collect(),
            level_seq: seqs.into_iter().map(AtomicU32::new).collect(),
            conf,
            flush_tx,
            compact_tx,
        });

        let worker = Arc::clone(&inner);
        let handle = std::thread::Builder::new()
            .name("compactor".into())
            .spawn(move || worker.compact_loop(&stop_rx, &flush_rx, &compact_rx))?;

        // Memtables recovered behind the newest WAL still need flushing;
        // the compactor drains them in index order.
        for item in pending {
            inner.flush_tx.send(item).ok();
        }

        info!(dir = %inner.conf.dir.display(), "tree opened");
        Ok(Self {
            inner,
            stop_tx,
            compactor: Mutex::new(Some(handle)),
        })
    }

    /// Signals the compactor to stop and waits for it to finish its
    /// in-flight work. Idempotent; also runs on drop.
    ///
    /// SSTable readers close as the last references to their nodes drop.
    pub fn close(&self) {
        self.stop_tx.send(()).ok();
        if let Some(handle) = self.compactor.lock().take() {
            if handle.join().is_err() {
                error!("compactor thread panicked");
            }
            info!(dir = %self.inner.conf.dir.display(), "tree closed");
        }
    }

    /// Number of nodes currently at `level`.
    pub fn level_node_count(&self, level: usize) -> usize {
        self.inner.levels[level].read().len()
    }

    /// Entries in the active memtable.
    pub fn memtable_entries(&self) -> usize {
        self.inner.data.read().memtable.entries_cnt()
    }

    /// Bytes resident in the active memtable.
    pub fn memtable_size(&self) -> usize {
        self.inner.data.read().memtable.size()
    }
}

impl std::fmt::Debug for Tree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let data = self.inner.data.read();
        f.debug_struct("Tree")
            .field("dir", &self.inner.conf.dir)
            .field("memtable_index", &data.memtable_index)
            .field("memtable_entries", &data.memtable.entries_cnt())
            .field("read_only_memtables", &data.read_only.len())
            .field(
                "nodes_per_level",
                &self
                    .inner
                    .levels
                    .iter()
                    .map(|l| l.read().len())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Drop for Tree {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests;
