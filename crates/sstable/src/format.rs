//! Footer codec and key helpers shared by the writer and reader.

use anyhow::{bail, Context, Result};

/// Fixed footer size: four `u64` varints, right-padded with zeros.
pub const FOOTER_SIZE: usize = 32;

/// Parsed footer: locations of the filter and index blocks. The data
/// section always starts at offset 0 and ends at `filter_offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footer {
    pub filter_offset: u64,
    pub filter_size: u64,
    pub index_offset: u64,
    pub index_size: u64,
}

/// Encodes a footer from the three section sizes.
pub fn encode_footer(data_size: u64, filter_size: u64, index_size: u64) -> [u8; FOOTER_SIZE] {
    let mut buf = Vec::with_capacity(FOOTER_SIZE);
    varint::put_uvarint(&mut buf, data_size);
    varint::put_uvarint(&mut buf, filter_size);
    varint::put_uvarint(&mut buf, data_size + filter_size);
    varint::put_uvarint(&mut buf, index_size);

    let mut footer = [0u8; FOOTER_SIZE];
    footer[..buf.len()].copy_from_slice(&buf);
    footer
}

/// Decodes the four section varints from a raw footer.
pub fn parse_footer(raw: &[u8; FOOTER_SIZE]) -> Result<Footer> {
    let mut pos = 0;
    let mut next = || -> Result<u64> {
        let (v, n) = varint::uvarint(&raw[pos..]).context("footer varint")?;
        pos += n;
        Ok(v)
    };

    let filter_offset = next()?;
    let filter_size = next()?;
    let index_offset = next()?;
    let index_size = next()?;

    if filter_offset.checked_add(filter_size) != Some(index_offset) {
        bail!(
            "inconsistent footer: index offset {} != {} + {}",
            index_offset,
            filter_offset,
            filter_size
        );
    }

    Ok(Footer {
        filter_offset,
        filter_size,
        index_offset,
        index_size,
    })
}

/// Length of the longest common prefix of `a` and `b`.
pub fn shared_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

/// Returns a separator `x` with `a ≤ x < b`. The caller guarantees `a < b`.
///
/// With a non-empty `a`, `a` itself is the separator. With an empty `a`
/// (no preceding block) any value below `b` works: `b`'s last byte is
/// decremented, or dropped when it is zero and cannot be decremented.
pub fn separator_between(a: &[u8], b: &[u8]) -> Vec<u8> {
    if a.is_empty() {
        let mut sep = b.to_vec();
        match sep.pop() {
            Some(0) | None => {}
            Some(last) => sep.push(last - 1),
        }
        return sep;
    }

    a.to_vec()
}
