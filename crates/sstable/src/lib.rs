//! # SSTable — Sorted String Table
//!
//! Immutable on-disk key/value files for the Strata storage engine.
//!
//! When a memtable is rotated out, the compactor streams it through an
//! [`SstWriter`] to become a level-0 SSTable; level compaction merges
//! overlapping tables into the next level the same way. SSTables are
//! *write-once, read-many*: once finished they are never modified, only
//! replaced and deleted by compaction.
//!
//! ## File layout
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │ DATA BLOCKS (concatenated, prefix-compressed records)         │
//! │                                                               │
//! │ shared_prefix_len (uvarint) | rest_key_len (uvarint)          │
//! │ value_len (uvarint) | rest_key | value                        │
//! │                                                               │
//! │ ... repeated; a fresh block starts whenever the previous      │
//! │ one reached the configured block size ...                     │
//! ├───────────────────────────────────────────────────────────────┤
//! │ FILTER BLOCK (same record encoding)                           │
//! │                                                               │
//! │ key   = uvarint(block_offset)                                 │
//! │ value = bloom bitmap of that block's keys                     │
//! ├───────────────────────────────────────────────────────────────┤
//! │ INDEX BLOCK (same record encoding)                            │
//! │                                                               │
//! │ key   = separator ≥ every key in the block it points at       │
//! │ value = uvarint(block_offset) | uvarint(block_size)           │
//! ├───────────────────────────────────────────────────────────────┤
//! │ FOOTER (fixed 32 bytes, zero padded)                          │
//! │                                                               │
//! │ uvarint(data_size) | uvarint(filter_size)                     │
//! │ uvarint(data_size + filter_size) | uvarint(index_size)        │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! Within a block, keys are strictly increasing and each record stores only
//! the suffix it does not share with its predecessor. The first record of
//! every block has a zero shared-prefix length (the encoder's previous-key
//! state is cleared on seal), which is what allows [`SstReader::read_data`]
//! to decode the whole data section as one record stream.

mod block;
mod format;
mod reader;
mod writer;

pub use block::{Block, RecordReader};
pub use format::{separator_between, shared_prefix_len, Footer, FOOTER_SIZE};
pub use reader::SstReader;
pub use writer::SstWriter;

/// One index entry: the block ending at `prev_block_offset +
/// prev_block_size` holds only keys `≤ key`.
///
/// Entries are ordered by `key`, and separators are strictly increasing
/// across the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    pub key: Vec<u8>,
    pub prev_block_offset: u64,
    pub prev_block_size: u64,
}
