//! Random-access SSTable reader.

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Mutex;

use memtable::Kv;

use crate::block::RecordReader;
use crate::format::{parse_footer, Footer, FOOTER_SIZE};
use crate::Index;

/// Reads one SSTable file.
///
/// The footer is parsed once at [`open`](SstReader::open); every block read
/// is a seek plus an exact-length read. The file handle sits behind a
/// `Mutex` so lookups work through a shared `&self`; nodes are read
/// concurrently by foreground gets and the compactor.
pub struct SstReader {
    /// Persistent file handle, wrapped for interior mutability.
    src: Mutex<BufReader<File>>,
    footer: Footer,
}

impl SstReader {
    /// Opens the file read-only and parses its footer from `EOF - 32`.
    ///
    /// # Errors
    ///
    /// Fails if the file is shorter than a footer, the footer varints do
    /// not parse, or any I/O operation fails. A partial file from a crashed
    /// writer fails here and nowhere later.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut src =
            File::open(path).with_context(|| format!("open sstable {}", path.display()))?;

        let file_size = src.metadata()?.len();
        if file_size < FOOTER_SIZE as u64 {
            bail!("sstable file too small: {} bytes", file_size);
        }

        src.seek(SeekFrom::End(-(FOOTER_SIZE as i64)))?;
        let mut raw = [0u8; FOOTER_SIZE];
        src.read_exact(&mut raw)?;
        let footer = parse_footer(&raw)
            .with_context(|| format!("parse footer of {}", path.display()))?;

        let sections_end = footer
            .index_offset
            .checked_add(footer.index_size)
            .and_then(|end| end.checked_add(FOOTER_SIZE as u64));
        if sections_end.map_or(true, |end| end > file_size) {
            bail!("footer sections exceed file size");
        }

        Ok(Self {
            src: Mutex::new(BufReader::new(src)),
            footer,
        })
    }

    /// Reads exactly `size` bytes starting at `offset`.
    pub fn read_block(&self, offset: u64, size: u64) -> Result<Vec<u8>> {
        let mut src = match self.src.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        src.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; size as usize];
        src.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Parses the filter block into a block-offset → bitmap map.
    pub fn read_filter(&self) -> Result<HashMap<u64, Vec<u8>>> {
        let block = self.read_block(self.footer.filter_offset, self.footer.filter_size)?;
        let mut reader = RecordReader::new(&block);

        let mut block_to_filter = HashMap::new();
        while let Some(kv) = reader.next_record()? {
            let (block_offset, _) = varint::uvarint(&kv.key).context("filter entry key")?;
            block_to_filter.insert(block_offset, kv.value);
        }
        Ok(block_to_filter)
    }

    /// Parses the index block into its ordered entries.
    pub fn read_index(&self) -> Result<Vec<Index>> {
        let block = self.read_block(self.footer.index_offset, self.footer.index_size)?;
        let mut reader = RecordReader::new(&block);

        let mut index = Vec::new();
        while let Some(kv) = reader.next_record()? {
            let (prev_block_offset, n) =
                varint::uvarint(&kv.value).context("index entry offset")?;
            let (prev_block_size, _) =
                varint::uvarint(&kv.value[n..]).context("index entry size")?;
            index.push(Index {
                key: kv.key,
                prev_block_offset,
                prev_block_size,
            });
        }
        Ok(index)
    }

    /// Decodes the entire data section as one record stream.
    ///
    /// Valid because every block's first record carries a zero shared
    /// prefix, so prefix resolution never crosses a block boundary.
    pub fn read_data(&self) -> Result<Vec<Kv>> {
        let block = self.read_block(0, self.footer.filter_offset)?;
        RecordReader::new(&block).read_all()
    }

    /// Total size of the data, filter, and index sections (the file minus
    /// its footer).
    pub fn size(&self) -> u64 {
        self.footer.index_offset + self.footer.index_size
    }

    /// The parsed footer.
    pub fn footer(&self) -> Footer {
        self.footer
    }
}
