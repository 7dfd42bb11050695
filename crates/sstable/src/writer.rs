//! Streaming SSTable writer.

use anyhow::{Context, Result};
use bloom::Filter;
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::block::Block;
use crate::format::{encode_footer, separator_between};
use crate::Index;

/// Builds one SSTable from records appended in ascending key order.
///
/// Records accumulate in the current data block; when it reaches
/// `block_size` it is sealed: its bloom bitmap is recorded under the
/// block's offset and the bytes move into the data buffer. The filter and
/// index blocks use the same record encoding as data blocks.
///
/// All buffering happens in memory; the file is written once, in
/// [`finish`](SstWriter::finish).
pub struct SstWriter {
    dest: File,
    path: PathBuf,
    block_size: usize,

    data_buf: Vec<u8>,
    filter_buf: Vec<u8>,
    index_buf: Vec<u8>,
    block_to_filter: HashMap<u64, Vec<u8>>,
    index: Vec<Index>,

    data_block: Block,
    filter_block: Block,
    index_block: Block,
    filter: Box<dyn Filter>,

    prev_key: Vec<u8>,
    prev_block_offset: u64,
    prev_block_size: u64,
}

impl SstWriter {
    /// Creates the destination file and an empty writer.
    pub fn create<P: AsRef<Path>>(
        path: P,
        block_size: usize,
        filter: Box<dyn Filter>,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let dest = File::create(&path)
            .with_context(|| format!("create sstable {}", path.display()))?;

        Ok(Self {
            dest,
            path,
            block_size,
            data_buf: Vec::new(),
            filter_buf: Vec::new(),
            index_buf: Vec::new(),
            block_to_filter: HashMap::new(),
            index: Vec::new(),
            data_block: Block::new(),
            filter_block: Block::new(),
            index_block: Block::new(),
            filter,
            prev_key: Vec::new(),
            prev_block_offset: 0,
            prev_block_size: 0,
        })
    }

    /// Appends one record. Keys must arrive in strictly ascending order.
    pub fn append(&mut self, key: &[u8], value: &[u8]) {
        // A fresh data block starting means the previous block is complete;
        // emit its index entry now that the first key of the next block is
        // known (the separator must sit between the two).
        if self.data_block.entries_cnt() == 0 {
            self.insert_index(key);
        }

        self.data_block.append(key, value);
        self.filter.add(key);
        self.prev_key.clear();
        self.prev_key.extend_from_slice(key);

        if self.data_block.size() >= self.block_size {
            self.refresh_block();
        }
    }

    /// Bytes of sealed data blocks so far.
    pub fn size(&self) -> u64 {
        self.data_buf.len() as u64
    }

    /// Path of the file being written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Seals the pending block, writes `data | filter | index | footer`,
    /// and returns the data-section size plus the filter map and index for
    /// caller-side caching.
    pub fn finish(mut self) -> Result<(u64, HashMap<u64, Vec<u8>>, Vec<Index>)> {
        self.refresh_block();
        // The last block has no successor; its separator is the final key
        // itself.
        if !self.prev_key.is_empty() {
            let prev_key = self.prev_key.clone();
            self.insert_index(&prev_key);
        }

        self.filter_block.flush_to(&mut self.filter_buf);
        self.index_block.flush_to(&mut self.index_buf);

        let data_size = self.data_buf.len() as u64;
        let footer = encode_footer(
            data_size,
            self.filter_buf.len() as u64,
            self.index_buf.len() as u64,
        );

        self.dest.write_all(&self.data_buf)?;
        self.dest.write_all(&self.filter_buf)?;
        self.dest.write_all(&self.index_buf)?;
        self.dest.write_all(&footer)?;
        self.dest.flush()?;

        Ok((data_size, self.block_to_filter, self.index))
    }

    /// Emits an index entry for the block that ended at
    /// `prev_block_offset + prev_block_size`. `key` is the first key of the
    /// block now starting (or the last written key, at finish time).
    fn insert_index(&mut self, key: &[u8]) {
        let index_key = separator_between(&self.prev_key, key);

        let mut scratch = Vec::with_capacity(2 * varint::MAX_VARINT_LEN);
        varint::put_uvarint(&mut scratch, self.prev_block_offset);
        varint::put_uvarint(&mut scratch, self.prev_block_size);

        self.index_block.append(&index_key, &scratch);
        self.index.push(Index {
            key: index_key,
            prev_block_offset: self.prev_block_offset,
            prev_block_size: self.prev_block_size,
        });
    }

    /// Seals the current data block: records its bloom bitmap under the
    /// block offset, moves the bytes into the data buffer, and resets the
    /// filter for the next block. No-op when nothing was appended since the
    /// last seal.
    fn refresh_block(&mut self) {
        if self.filter.key_len() == 0 {
            return;
        }

        self.prev_block_offset = self.data_buf.len() as u64;
        let bitmap = self.filter.hash();
        self.block_to_filter
            .insert(self.prev_block_offset, bitmap.clone());

        let mut offset_key = Vec::with_capacity(varint::MAX_VARINT_LEN);
        varint::put_uvarint(&mut offset_key, self.prev_block_offset);
        self.filter_block.append(&offset_key, &bitmap);
        self.filter.reset();

        self.prev_block_size = self.data_block.flush_to(&mut self.data_buf);
    }
}
