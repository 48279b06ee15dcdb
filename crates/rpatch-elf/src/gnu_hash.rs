//! GNU hash section codec.
//!
//! Layout: four 32-bit header words (bucket count, symbol offset,
//! bloom word count, bloom shift), then `bloom_size` N-words, then
//! `bucket_count` 32-bit buckets, then the 32-bit chain array filling
//! the rest of the section.

use crate::GnuHashTableReadError;
use crate::word::{Class, Endian};

/// Fixed header: nbuckets, symoffset, bloom_size, bloom_shift.
const GNU_HASH_HEADER_LEN: usize = 16;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GnuHashTable {
    pub bucket_count: u32,
    pub symbol_offset: u32,
    pub bloom_shift: u32,
    pub bloom: Vec<u64>,
    pub buckets: Vec<u32>,
    pub chain: Vec<u32>,
}

impl GnuHashTable {
    /// On-disk size of the table.
    pub fn byte_count(&self, class: Class) -> usize {
        GNU_HASH_HEADER_LEN
            + self.bloom.len() * class.word_len()
            + (self.buckets.len() + self.chain.len()) * 4
    }
}

/// Decode a GNU hash section. `section_bytes` is the exact section
/// content; its size is validated against the declared counts.
pub fn extract_gnu_hash_table(
    section_bytes: &[u8],
    class: Class,
    endian: Endian,
) -> Result<GnuHashTable, GnuHashTableReadError> {
    if section_bytes.len() < GNU_HASH_HEADER_LEN {
        return Err(GnuHashTableReadError::SectionTooSmall {
            size: section_bytes.len() as u64,
            header_len: GNU_HASH_HEADER_LEN,
        });
    }

    let bucket_count = endian.read_u32(section_bytes);
    let symbol_offset = endian.read_u32(&section_bytes[4..]);
    let bloom_size = endian.read_u32(&section_bytes[8..]);
    let bloom_shift = endian.read_u32(&section_bytes[12..]);

    let word_len = class.word_len();
    let fixed_len = GNU_HASH_HEADER_LEN
        + bloom_size as usize * word_len
        + bucket_count as usize * 4;
    let chain_bytes = section_bytes.len().checked_sub(fixed_len);
    let Some(chain_bytes) = chain_bytes else {
        return Err(GnuHashTableReadError::InconsistentSize {
            size: section_bytes.len() as u64,
            buckets: bucket_count,
            bloom_size,
        });
    };
    if chain_bytes % 4 != 0 {
        return Err(GnuHashTableReadError::InconsistentSize {
            size: section_bytes.len() as u64,
            buckets: bucket_count,
            bloom_size,
        });
    }

    let mut at = GNU_HASH_HEADER_LEN;
    let mut bloom = Vec::with_capacity(bloom_size as usize);
    for _ in 0..bloom_size {
        bloom.push(endian.read_nword(&section_bytes[at..], class));
        at += word_len;
    }
    let mut buckets = Vec::with_capacity(bucket_count as usize);
    for _ in 0..bucket_count {
        buckets.push(endian.read_u32(&section_bytes[at..]));
        at += 4;
    }
    let mut chain = Vec::with_capacity(chain_bytes / 4);
    for _ in 0..chain_bytes / 4 {
        chain.push(endian.read_u32(&section_bytes[at..]));
        at += 4;
    }

    Ok(GnuHashTable {
        bucket_count,
        symbol_offset,
        bloom_shift,
        bloom,
        buckets,
        chain,
    })
}

/// Encode the table into `buf`.
pub fn encode_gnu_hash_table(buf: &mut [u8], table: &GnuHashTable, class: Class, endian: Endian) {
    assert!(buf.len() >= table.byte_count(class));

    endian.write_u32(buf, table.bucket_count);
    endian.write_u32(&mut buf[4..], table.symbol_offset);
    endian.write_u32(&mut buf[8..], table.bloom.len() as u32);
    endian.write_u32(&mut buf[12..], table.bloom_shift);

    let word_len = class.word_len();
    let mut at = GNU_HASH_HEADER_LEN;
    for &word in &table.bloom {
        endian.write_nword(&mut buf[at..], class, word);
        at += word_len;
    }
    for &bucket in &table.buckets {
        endian.write_u32(&mut buf[at..], bucket);
        at += 4;
    }
    for &link in &table.chain {
        endian.write_u32(&mut buf[at..], link);
        at += 4;
    }
}
