//! Prefix-compressed record encoding, shared by data, filter, and index
//! blocks.

use anyhow::{bail, Context, Result};
use memtable::Kv;

use crate::format::shared_prefix_len;

/// Record encoder for one block.
///
/// Each appended record stores the length of the prefix it shares with the
/// previous key, the remaining key bytes, and the value:
///
/// ```text
/// uvarint(shared_prefix_len) | uvarint(rest_key_len) | uvarint(value_len)
/// rest_key | value
/// ```
///
/// Keys must arrive in strictly increasing order. [`flush_to`](Block::flush_to)
/// clears the previous-key state, so the first record after a flush always
/// encodes a zero shared prefix.
pub struct Block {
    record: Vec<u8>,
    entries_cnt: usize,
    prev_key: Vec<u8>,
}

impl Block {
    pub fn new() -> Self {
        Self {
            record: Vec::new(),
            entries_cnt: 0,
            prev_key: Vec::new(),
        }
    }

    /// Appends one record. Data blocks rely on strictly increasing keys;
    /// the codec itself only needs the previous key for the shared prefix.
    pub fn append(&mut self, key: &[u8], value: &[u8]) {
        let shared = shared_prefix_len(&self.prev_key, key);

        varint::put_uvarint(&mut self.record, shared as u64);
        varint::put_uvarint(&mut self.record, (key.len() - shared) as u64);
        varint::put_uvarint(&mut self.record, value.len() as u64);
        self.record.extend_from_slice(&key[shared..]);
        self.record.extend_from_slice(value);

        self.prev_key.clear();
        self.prev_key.extend_from_slice(key);
        self.entries_cnt += 1;
    }

    /// Encoded size in bytes.
    pub fn size(&self) -> usize {
        self.record.len()
    }

    /// Number of records since the last flush.
    pub fn entries_cnt(&self) -> usize {
        self.entries_cnt
    }

    /// Appends the block's bytes to `dest`, clears all state, and returns
    /// the number of bytes moved.
    pub fn flush_to(&mut self, dest: &mut Vec<u8>) -> u64 {
        let n = self.record.len() as u64;
        dest.extend_from_slice(&self.record);
        self.record.clear();
        self.prev_key.clear();
        self.entries_cnt = 0;
        n
    }
}

impl Default for Block {
    fn default() -> Self {
        Self::new()
    }
}

/// Decoder for a buffer of prefix-compressed records.
///
/// Reaching the end of the buffer cleanly terminates the scan; a record
/// that ends mid-way is corruption.
pub struct RecordReader<'a> {
    buf: &'a [u8],
    pos: usize,
    prev_key: Vec<u8>,
}

impl<'a> RecordReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            prev_key: Vec::new(),
        }
    }

    /// Decodes the next record, or `None` at the end of the buffer.
    pub fn next_record(&mut self) -> Result<Option<Kv>> {
        if self.pos == self.buf.len() {
            return Ok(None);
        }

        let shared = self.read_len().context("shared prefix len")?;
        let rest_key_len = self.read_len().context("rest key len")?;
        let value_len = self.read_len().context("value len")?;

        if shared > self.prev_key.len() {
            bail!(
                "record shares {} bytes but previous key has {}",
                shared,
                self.prev_key.len()
            );
        }
        let payload = rest_key_len
            .checked_add(value_len)
            .filter(|&p| self.buf.len() - self.pos >= p);
        if payload.is_none() {
            bail!("record payload truncated");
        }

        let mut key = Vec::with_capacity(shared + rest_key_len);
        key.extend_from_slice(&self.prev_key[..shared]);
        key.extend_from_slice(&self.buf[self.pos..self.pos + rest_key_len]);
        self.pos += rest_key_len;

        let value = self.buf[self.pos..self.pos + value_len].to_vec();
        self.pos += value_len;

        self.prev_key.clear();
        self.prev_key.extend_from_slice(&key);
        Ok(Some(Kv { key, value }))
    }

    /// Decodes every remaining record.
    pub fn read_all(&mut self) -> Result<Vec<Kv>> {
        let mut kvs = Vec::new();
        while let Some(kv) = self.next_record()? {
            kvs.push(kv);
        }
        Ok(kvs)
    }

    fn read_len(&mut self) -> Result<usize> {
        let (v, n) = varint::uvarint(&self.buf[self.pos..])?;
        self.pos += n;
        Ok(v as usize)
    }
}
