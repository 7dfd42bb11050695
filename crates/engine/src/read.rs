//! Read path: `get()` across memtables and levels.

use anyhow::Result;
use memtable::MemTable;

use crate::{Tree, TreeInner};

impl Tree {
    /// Looks up a key, returning the most recent value if any layer holds
    /// it.
    ///
    /// Resolution order: active memtable, read-only memtables newest
    /// first, level-0 nodes newest first, then one candidate node per
    /// deeper level. The first hit wins.
    ///
    /// # Errors
    ///
    /// Propagates I/O and corruption errors from SSTable reads. Absence is
    /// `Ok(None)`.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.inner.get(key)
    }
}

impl TreeInner {
    pub(crate) fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        // Memtable phase under the shared data lock, released before any
        // disk I/O.
        {
            let data = self.data.read();
            if let Some(value) = data.memtable.get(key) {
                return Ok(Some(value));
            }
            for item in data.read_only.iter().rev() {
                if let Some(value) = item.memtable.get(key) {
                    return Ok(Some(value));
                }
            }
        }

        // Level 0 nodes may overlap; newest (appended last) wins.
        {
            let level0 = self.levels[0].read();
            for node in level0.iter().rev() {
                if let Some(value) = node.get(key)? {
                    return Ok(Some(value));
                }
            }
        }

        // Deeper levels are disjoint and sorted: at most one candidate
        // node per level, found by range binary search.
        for level in 1..self.conf.max_level {
            let nodes = self.levels[level].read();
            let i = nodes.partition_point(|n| n.end_key() < key);
            if i < nodes.len() && nodes[i].start_key() <= key {
                if let Some(value) = nodes[i].get(key)? {
                    return Ok(Some(value));
                }
            }
        }

        Ok(None)
    }
}
