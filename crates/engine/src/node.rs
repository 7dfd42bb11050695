//! One SSTable as a live tree node.

use anyhow::{ensure, Result};
use bloom::Filter;
use memtable::Kv;
use sstable::{Index, RecordReader, SstReader};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// Live handle to one immutable SSTable: its cached index and filter
/// bitmaps plus the open reader.
///
/// Nodes are shared as `Arc<Node>`; a node removed from the tree keeps
/// serving any in-flight reads and its file handle closes when the last
/// reference drops.
pub(crate) struct Node {
    path: PathBuf,
    level: usize,
    seq: u32,
    /// Data-section size reported by the writer (or reader on recovery).
    size: u64,
    block_to_filter: HashMap<u64, Vec<u8>>,
    index: Vec<Index>,
    start_key: Vec<u8>,
    end_key: Vec<u8>,
    filter: Box<dyn Filter>,
    reader: SstReader,
}

impl Node {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        path: PathBuf,
        reader: SstReader,
        level: usize,
        seq: u32,
        size: u64,
        block_to_filter: HashMap<u64, Vec<u8>>,
        index: Vec<Index>,
        filter: Box<dyn Filter>,
    ) -> Result<Self> {
        ensure!(
            !index.is_empty(),
            "sstable {} has an empty index",
            path.display()
        );
        let start_key = index[0].key.clone();
        let end_key = index[index.len() - 1].key.clone();

        Ok(Self {
            path,
            level,
            seq,
            size,
            block_to_filter,
            index,
            start_key,
            end_key,
            filter,
            reader,
        })
    }

    /// Point lookup: index binary search → bloom gate → block scan.
    pub(crate) fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        // Smallest separator >= key names the only block that can hold it.
        let i = self.index.partition_point(|e| e.key.as_slice() < key);
        if i == self.index.len() {
            return Ok(None);
        }
        let entry = &self.index[i];

        if let Some(bitmap) = self.block_to_filter.get(&entry.prev_block_offset) {
            if !self.filter.exist(bitmap, key) {
                return Ok(None);
            }
        }

        let block = self
            .reader
            .read_block(entry.prev_block_offset, entry.prev_block_size)?;
        let mut records = RecordReader::new(&block);
        while let Some(kv) = records.next_record()? {
            if kv.key.as_slice() == key {
                return Ok(Some(kv.value));
            }
            if kv.key.as_slice() > key {
                break;
            }
        }
        Ok(None)
    }

    /// Every record in the SSTable, in key order.
    pub(crate) fn get_all(&self) -> Result<Vec<Kv>> {
        self.reader.read_data()
    }

    /// Removes the SSTable file. Callers remove the node from the tree
    /// first; the reader handle closes when the last `Arc` drops.
    pub(crate) fn destroy(&self) {
        debug!(level = self.level, seq = self.seq, "destroying node");
        let _ = fs::remove_file(&self.path);
    }

    pub(crate) fn start_key(&self) -> &[u8] {
        &self.start_key
    }

    pub(crate) fn end_key(&self) -> &[u8] {
        &self.end_key
    }

    pub(crate) fn size(&self) -> u64 {
        self.size
    }
}
