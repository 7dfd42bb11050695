//! Write path: `put()` and memtable rotation.
//!
//! All mutations flow through here under the exclusive data lock. A write
//! is durable (WAL) before it is visible (memtable); a WAL error surfaces
//! to the caller with the memtable untouched.

use anyhow::{ensure, Result};
use memtable::MemTable;
use std::mem;
use std::sync::Arc;
use wal::WalWriter;

use crate::{DataState, FlushItem, Tree, TreeInner};

impl Tree {
    /// Inserts or overwrites a key.
    ///
    /// When the active memtable (scaled by 5/4 for SSTable metadata
    /// overhead) outgrows the level-0 SSTable threshold, it is rotated out
    /// and handed to the compactor; the caller never waits on the flush.
    ///
    /// # Errors
    ///
    /// Rejects an empty key; propagates WAL append failures and the I/O of
    /// opening the next WAL file on rotation.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        ensure!(!key.is_empty(), "key must not be empty");

        let mut data = self.inner.data.write();

        data.wal_writer.append(key, value)?;
        data.memtable.put(key.to_vec(), value.to_vec());

        if data.memtable.size() as u64 * 5 / 4 > self.inner.conf.sst_size {
            self.inner.refresh_memtable(&mut data)?;
        }
        Ok(())
    }
}

impl TreeInner {
    /// Rotates the active memtable: the old one becomes read-only and is
    /// enqueued for flushing, a fresh memtable and WAL take over.
    ///
    /// Called with the data lock held exclusively. The next WAL is opened
    /// first so a failure leaves the current memtable/WAL pair intact.
    pub(crate) fn refresh_memtable(&self, data: &mut DataState) -> Result<()> {
        let next_index = data.memtable_index + 1;
        let next_wal = WalWriter::create(self.conf.wal_path(next_index), self.conf.wal_sync)?;

        let old_memtable = mem::replace(&mut data.memtable, (self.conf.memtable_constructor)());
        let old_wal_path = self.conf.wal_path(data.memtable_index);
        data.wal_writer = next_wal; // the old writer closes here
        data.memtable_index = next_index;

        let item = Arc::new(FlushItem {
            wal_path: old_wal_path,
            memtable: old_memtable,
        });
        data.read_only.push(Arc::clone(&item));
        // Unbounded channel: the send cannot block the writer.
        self.flush_tx.send(item).ok();
        Ok(())
    }
}
