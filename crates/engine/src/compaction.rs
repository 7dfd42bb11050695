//! Background compaction: memtable flushes and level merges.
//!
//! A single thread owns every mutation of the on-disk tree. It multiplexes
//! three inputs (a stop signal, rotated memtables, and level-compaction
//! requests) and handles exactly one per iteration. Keeping the thread
//! strictly serial is load-bearing: flush completion drops every read-only
//! memtable up to the flushed one, which is only correct when flushes
//! finish in FIFO order.

use anyhow::Result;
use crossbeam_channel::{select, Receiver};
use memtable::{Kv, MemTable};
use sstable::{SstReader, SstWriter};
use std::collections::HashMap;
use std::fs;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::node::Node;
use crate::{FlushItem, TreeInner};

impl TreeInner {
    /// The compactor main loop. Runs until the stop signal arrives or a
    /// compaction fails; failures are fatal to the background task (the
    /// tree keeps serving reads and WAL-backed writes).
    pub(crate) fn compact_loop(
        &self,
        stop_rx: &Receiver<()>,
        flush_rx: &Receiver<Arc<FlushItem>>,
        compact_rx: &Receiver<usize>,
    ) {
        loop {
            select! {
                recv(stop_rx) -> _ => {
                    info!("compactor stopping");
                    return;
                }
                recv(flush_rx) -> item => {
                    let Ok(item) = item else { return };
                    if let Err(e) = self.compact_memtable(item) {
                        error!(error = %e, "memtable flush failed, compactor exiting");
                        return;
                    }
                }
                recv(compact_rx) -> level => {
                    let Ok(level) = level else { return };
                    if let Err(e) = self.compact_level(level) {
                        error!(level, error = %e, "level compaction failed, compactor exiting");
                        return;
                    }
                }
            }
        }
    }

    /// Flushes one rotated memtable to level 0, then retires it: the
    /// read-only list drops every entry up to and including it (FIFO, so
    /// nothing newer is discarded) and its WAL file is deleted.
    fn compact_memtable(&self, item: Arc<FlushItem>) -> Result<()> {
        if item.memtable.entries_cnt() > 0 {
            self.flush_memtable(item.memtable.as_ref())?;
        }

        {
            let mut data = self.data.write();
            if let Some(i) = data
                .read_only
                .iter()
                .position(|entry| Arc::ptr_eq(entry, &item))
            {
                data.read_only.drain(..=i);
            }
        }

        // The memtable's contents are on disk in an SSTable; the WAL is
        // no longer needed for recovery.
        let _ = fs::remove_file(&item.wal_path);

        self.try_trigger_compact(0);
        Ok(())
    }

    /// Writes a memtable's contents to a fresh level-0 SSTable and inserts
    /// the node.
    fn flush_memtable(&self, memtable: &dyn MemTable) -> Result<()> {
        let seq = self.level_seq[0].load(Ordering::Acquire) + 1;
        let path = self.conf.sst_path(0, seq);
        let mut writer = SstWriter::create(
            &path,
            self.conf.sst_data_block_size,
            (self.conf.filter_constructor)(),
        )?;

        for kv in memtable.all() {
            writer.append(&kv.key, &kv.value);
        }
        let (size, block_to_filter, index) = writer.finish()?;
        debug!(seq, size, "memtable flushed to level 0");

        self.insert_node(0, seq, size, block_to_filter, index)
    }

    /// Merges a slice of `level` into `level + 1`.
    fn compact_level(&self, level: usize) -> Result<()> {
        let picked = self.pick_compact_nodes(level);
        if picked.is_empty() {
            // A stale trigger; an earlier round already drained the level.
            return Ok(());
        }

        let kvs = self.picked_kvs(&picked)?;
        if kvs.is_empty() {
            return Ok(());
        }
        debug!(
            level,
            nodes = picked.len(),
            records = kvs.len(),
            "compacting into level {}",
            level + 1
        );

        let sst_limit = self.conf.level_sst_limit(level + 1);
        let mut seq = self.level_seq[level + 1].load(Ordering::Acquire) + 1;
        let mut writer = SstWriter::create(
            self.conf.sst_path(level + 1, seq),
            self.conf.sst_data_block_size,
            (self.conf.filter_constructor)(),
        )?;

        for kv in &kvs {
            if writer.size() > sst_limit {
                let (size, block_to_filter, index) = writer.finish()?;
                self.insert_node(level + 1, seq, size, block_to_filter, index)?;

                seq = self.level_seq[level + 1].load(Ordering::Acquire) + 1;
                writer = SstWriter::create(
                    self.conf.sst_path(level + 1, seq),
                    self.conf.sst_data_block_size,
                    (self.conf.filter_constructor)(),
                )?;
            }
            writer.append(&kv.key, &kv.value);
        }
        let (size, block_to_filter, index) = writer.finish()?;
        self.insert_node(level + 1, seq, size, block_to_filter, index)?;

        self.remove_nodes(level, picked);
        self.try_trigger_compact(level + 1);
        Ok(())
    }

    /// Selects the nodes for one compaction round: a seed range from the
    /// level's first and middle nodes, then every overlapping node in
    /// `level + 1` and `level`. The range widens to the union of selected
    /// ranges during the `level + 1` pass, so the second pass also catches
    /// source nodes that only overlap via a target node.
    fn pick_compact_nodes(&self, level: usize) -> Vec<Arc<Node>> {
        let (mut start_key, mut end_key) = {
            let nodes = self.levels[level].read();
            let Some(first) = nodes.first() else {
                return Vec::new();
            };
            let mut start_key = first.start_key().to_vec();
            let mut end_key = first.end_key().to_vec();

            let mid = &nodes[nodes.len() / 2];
            if mid.start_key() < start_key.as_slice() {
                start_key = mid.start_key().to_vec();
            }
            if mid.end_key() > end_key.as_slice() {
                end_key = mid.end_key().to_vec();
            }
            (start_key, end_key)
        };

        let mut picked = Vec::new();
        for l in [level + 1, level] {
            let nodes = self.levels[l].read();
            for node in nodes.iter() {
                if node.start_key() > end_key.as_slice() || node.end_key() < start_key.as_slice() {
                    continue;
                }
                if l == level + 1 {
                    if node.start_key() < start_key.as_slice() {
                        start_key = node.start_key().to_vec();
                    }
                    if node.end_key() > end_key.as_slice() {
                        end_key = node.end_key().to_vec();
                    }
                }
                picked.push(Arc::clone(node));
            }
        }
        picked
    }

    /// Merges the picked nodes' records through a fresh memtable.
    ///
    /// `picked` lists older data first (level + 1 before level), so later
    /// puts overwrite and the snapshot keeps only the newest value per key.
    fn picked_kvs(&self, picked: &[Arc<Node>]) -> Result<Vec<Kv>> {
        let mut memtable = (self.conf.memtable_constructor)();
        for node in picked {
            for kv in node.get_all()? {
                memtable.put(kv.key, kv.value);
            }
        }
        Ok(memtable.all())
    }

    /// Opens a reader for a just-written SSTable and inserts its node.
    fn insert_node(
        &self,
        level: usize,
        seq: u32,
        size: u64,
        block_to_filter: HashMap<u64, Vec<u8>>,
        index: Vec<sstable::Index>,
    ) -> Result<()> {
        let path = self.conf.sst_path(level, seq);
        let reader = SstReader::open(&path)?;
        let node = Arc::new(Node::new(
            path,
            reader,
            level,
            seq,
            size,
            block_to_filter,
            index,
            (self.conf.filter_constructor)(),
        )?);

        self.level_seq[level].store(seq, Ordering::Release);

        let mut nodes = self.levels[level].write();
        if level == 0 {
            nodes.push(node);
        } else {
            crate::recovery::insert_sorted(&mut nodes, node);
        }
        Ok(())
    }

    /// Removes the picked nodes from `level` and `level + 1`, then deletes
    /// their files on a detached thread. Removal takes each level lock
    /// exclusively, so no reader can still reach a node when its file goes.
    fn remove_nodes(&self, level: usize, picked: Vec<Arc<Node>>) {
        for l in [level + 1, level] {
            let mut nodes = self.levels[l].write();
            nodes.retain(|node| !picked.iter().any(|p| Arc::ptr_eq(p, node)));
        }

        std::thread::spawn(move || {
            for node in picked {
                node.destroy();
            }
        });
    }

    /// Requests a compaction of `level` when its total size outgrows
    /// `sst_size * 10^level * sst_num_per_level`. The deepest level never
    /// compacts.
    fn try_trigger_compact(&self, level: usize) {
        if level == self.conf.max_level - 1 {
            return;
        }

        let total: u64 = self.levels[level].read().iter().map(|n| n.size()).sum();
        if total <= self.conf.level_sst_limit(level) * self.conf.sst_num_per_level {
            return;
        }

        debug!(level, total, "triggering compaction");
        self.compact_tx.send(level).ok();
    }
}
