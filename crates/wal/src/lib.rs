//! # WAL — Write-Ahead Log
//!
//! Durability for one memtable's contents. Every `put` is appended to the
//! active WAL **before** the memtable insert, so an acknowledged write
//! survives a crash: on restart the log is replayed into a fresh memtable.
//!
//! Each memtable has exactly one WAL file, named `{memtable_index}.wal`.
//! When the memtable is rotated out its WAL is closed, and once the flush to
//! an SSTable completes the file is deleted.
//!
//! ## Binary Record Format
//!
//! ```text
//! [key_len: uvarint][value_len: uvarint][key][value]
//! ```
//!
//! Records carry no checksums and no framing beyond the two length prefixes;
//! a record that ends early is reported as corruption, not silently dropped.
//!
//! ## Example
//!
//! ```rust,no_run
//! use wal::{WalWriter, WalReader};
//!
//! let mut w = WalWriter::create("1.wal", false).unwrap();
//! w.append(b"hello", b"world").unwrap();
//! drop(w);
//!
//! let mut r = WalReader::open("1.wal").unwrap();
//! r.replay(|key, value| println!("{:?} -> {:?}", key, value)).unwrap();
//! ```

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;

use thiserror::Error;

/// Errors that can occur during WAL operations.
#[derive(Debug, Error)]
pub enum WalError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A record's length prefix or payload ended before the file did what
    /// it promised -- truncated tail or garbage bytes.
    #[error("corrupt wal record")]
    Corrupt,
}

/// Append-only WAL writer.
///
/// Records are serialized into a reusable scratch buffer and handed to the
/// file in a single `write_all`, which places them in the OS page cache
/// before returning. When `sync` is `true`, every append is additionally
/// followed by `sync_all()` (fsync).
pub struct WalWriter {
    file: File,
    sync: bool,
    /// Reusable scratch buffer to avoid allocation on every append.
    buf: Vec<u8>,
}

impl WalWriter {
    /// Opens (or creates) a WAL file in append mode.
    ///
    /// # Arguments
    ///
    /// * `path` - file system path for the WAL (created if it does not exist).
    /// * `sync` - if true, every `append` call is followed by fsync.
    pub fn create<P: AsRef<Path>>(path: P, sync: bool) -> Result<Self, WalError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file,
            sync,
            buf: Vec::with_capacity(256),
        })
    }

    /// Serializes one key/value record and appends it to the WAL file.
    pub fn append(&mut self, key: &[u8], value: &[u8]) -> Result<(), WalError> {
        self.buf.clear();
        varint::put_uvarint(&mut self.buf, key.len() as u64);
        varint::put_uvarint(&mut self.buf, value.len() as u64);
        self.buf.extend_from_slice(key);
        self.buf.extend_from_slice(value);

        self.file.write_all(&self.buf)?;
        if self.sync {
            self.file.sync_all()?;
        }
        Ok(())
    }

    /// Forces everything written so far onto stable storage via fsync.
    ///
    /// Useful when `sync` is `false` and the caller wants a durability point
    /// (e.g. before acknowledging a batch).
    pub fn sync_to_disk(&mut self) -> Result<(), WalError> {
        self.file.sync_all()?;
        Ok(())
    }
}

/// Sequential WAL reader.
///
/// Reads the whole file at once and replays records in file order. Replay
/// is all-or-nothing: any malformed record, including a truncated tail from
/// a torn write, aborts with [`WalError::Corrupt`].
#[derive(Debug)]
pub struct WalReader {
    src: File,
}

impl WalReader {
    /// Opens an existing WAL file for replay. The file must exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, WalError> {
        Ok(Self {
            src: File::open(path)?,
        })
    }

    /// Replays every record, calling `apply(key, value)` for each in file
    /// order.
    ///
    /// # Errors
    ///
    /// [`WalError::Corrupt`] on a short varint or short payload;
    /// [`WalError::Io`] if reading the file fails.
    pub fn replay<F>(&mut self, mut apply: F) -> Result<(), WalError>
    where
        F: FnMut(Vec<u8>, Vec<u8>),
    {
        let mut body = Vec::new();
        self.src.read_to_end(&mut body)?;

        let mut pos = 0;
        while pos < body.len() {
            let (key_len, n) = varint::uvarint(&body[pos..]).map_err(|_| WalError::Corrupt)?;
            pos += n;
            let (value_len, n) = varint::uvarint(&body[pos..]).map_err(|_| WalError::Corrupt)?;
            pos += n;

            let key_len = key_len as usize;
            let value_len = value_len as usize;
            let payload = key_len.checked_add(value_len).ok_or(WalError::Corrupt)?;
            if body.len() - pos < payload {
                return Err(WalError::Corrupt);
            }

            let key = body[pos..pos + key_len].to_vec();
            pos += key_len;
            let value = body[pos..pos + value_len].to_vec();
            pos += value_len;

            apply(key, value);
        }

        Ok(())
    }
}
