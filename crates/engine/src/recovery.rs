//! Cold start: SSTable loading and WAL replay.

use anyhow::{bail, Result};
use memtable::MemTable;
use sstable::SstReader;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;
use wal::{WalReader, WalWriter};

use crate::node::Node;
use crate::{Config, DataState, FlushItem};

/// Loads every SSTable in `conf.dir` into its level, returning the node
/// lists and the highest sequence seen per level.
///
/// Files are visited in `(level, seq)` order so level-0 insertion order
/// matches write order. A file whose footer does not parse is a partial
/// write from a crashed flush; it is skipped with a warning.
pub(crate) fn load_nodes(conf: &Config) -> Result<(Vec<Vec<Arc<Node>>>, Vec<u32>)> {
    let mut levels: Vec<Vec<Arc<Node>>> = (0..conf.max_level).map(|_| Vec::new()).collect();
    let mut seqs = vec![0u32; conf.max_level];

    let mut files: Vec<(usize, u32, PathBuf)> = Vec::new();
    for entry in fs::read_dir(&conf.dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some((level, seq)) = parse_sst_name(name) {
            files.push((level, seq, path));
        }
    }
    files.sort_by_key(|&(level, seq, _)| (level, seq));

    for (level, seq, path) in files {
        if level >= conf.max_level {
            bail!(
                "sstable {} is at level {} but max_level is {}",
                path.display(),
                level,
                conf.max_level
            );
        }

        let reader = match SstReader::open(&path) {
            Ok(reader) => reader,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "skipping unreadable sstable");
                continue;
            }
        };
        let block_to_filter = reader.read_filter()?;
        let index = reader.read_index()?;
        let size = reader.size();

        let node = Arc::new(Node::new(
            path,
            reader,
            level,
            seq,
            size,
            block_to_filter,
            index,
            (conf.filter_constructor)(),
        )?);

        if level == 0 {
            levels[0].push(node);
        } else {
            insert_sorted(&mut levels[level], node);
        }
        seqs[level] = seqs[level].max(seq);
    }

    Ok((levels, seqs))
}

/// Rebuilds the memtable set from `walfile/*.wal`.
///
/// With no WAL files the tree starts fresh at index 1. Otherwise every file
/// replays into a memtable: all but the newest become read-only entries
/// (returned for the caller to enqueue on the flush channel), and the
/// newest becomes the active memtable with its WAL reopened for appending.
pub(crate) fn restore_memtables(conf: &Config) -> Result<(DataState, Vec<Arc<FlushItem>>)> {
    let mut wals: Vec<(usize, PathBuf)> = Vec::new();
    for entry in fs::read_dir(conf.wal_dir())? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some(index) = parse_wal_name(name) {
            wals.push((index, path));
        }
    }

    if wals.is_empty() {
        let memtable_index = 1;
        let wal_writer = WalWriter::create(conf.wal_path(memtable_index), conf.wal_sync)?;
        return Ok((
            DataState {
                memtable: (conf.memtable_constructor)(),
                wal_writer,
                read_only: Vec::new(),
                memtable_index,
            },
            Vec::new(),
        ));
    }

    wals.sort_by_key(|&(index, _)| index);

    let mut read_only = Vec::new();
    let mut pending = Vec::new();
    let (active_index, active_path) = wals[wals.len() - 1].clone();

    for (_, path) in &wals[..wals.len() - 1] {
        let memtable = replay_into_memtable(conf, path)?;
        let item = Arc::new(FlushItem {
            wal_path: path.clone(),
            memtable,
        });
        read_only.push(Arc::clone(&item));
        pending.push(item);
    }

    let memtable = replay_into_memtable(conf, &active_path)?;
    let wal_writer = WalWriter::create(&active_path, conf.wal_sync)?;

    Ok((
        DataState {
            memtable,
            wal_writer,
            read_only,
            memtable_index: active_index,
        },
        pending,
    ))
}

/// Replays one WAL file into a fresh memtable. Any replay failure,
/// including a truncated tail, aborts startup.
fn replay_into_memtable(conf: &Config, path: &Path) -> Result<Box<dyn MemTable>> {
    let mut memtable = (conf.memtable_constructor)();
    let mut reader = WalReader::open(path)?;
    reader.replay(|key, value| memtable.put(key, value))?;
    Ok(memtable)
}

/// Keeps `nodes` sorted by start key: the new node lands before the first
/// successor whose start key exceeds its end key, or at the back.
pub(crate) fn insert_sorted(nodes: &mut Vec<Arc<Node>>, node: Arc<Node>) {
    for i in 0..nodes.len().saturating_sub(1) {
        if node.end_key() < nodes[i + 1].start_key() {
            nodes.insert(i + 1, node);
            return;
        }
    }
    nodes.push(node);
}

/// Parses `{level}_{seq}.sst`.
fn parse_sst_name(name: &str) -> Option<(usize, u32)> {
    let stem = name.strip_suffix(".sst")?;
    let (level, seq) = stem.split_once('_')?;
    Some((level.parse().ok()?, seq.parse().ok()?))
}

/// Parses `{memtable_index}.wal`.
fn parse_wal_name(name: &str) -> Option<usize> {
    name.strip_suffix(".wal")?.parse().ok()
}
