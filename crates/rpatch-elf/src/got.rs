//! Global offset table codec.
//!
//! The table is an array of address-sized slots. Slot 0 of `.got.plt`
//! (and on some layouts `.got`) holds the virtual address of the
//! dynamic section, so the relocation pipeline must retarget matching
//! slots when `.dynamic` moves.

use crate::ExecutableFileReadError;
use crate::section_header::SectionHeader;
use crate::word::{Class, Endian};

/// Decoded slot array of a `.got`/`.got.plt` section.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GlobalOffsetTable {
    entries: Vec<u64>,
}

impl GlobalOffsetTable {
    pub fn entries(&self) -> &[u64] {
        &self.entries
    }

    pub fn contains_address(&self, address: u64) -> bool {
        self.entries.contains(&address)
    }

    /// Rewrite every slot holding `old_address` to `new_address`.
    pub fn retarget_address(&mut self, old_address: u64, new_address: u64) {
        for entry in &mut self.entries {
            if *entry == old_address {
                *entry = new_address;
            }
        }
    }
}

/// Decode the slot array of a GOT section.
pub fn extract_global_offset_table(
    bytes: &[u8],
    header: &SectionHeader,
    class: Class,
    endian: Endian,
) -> Result<GlobalOffsetTable, ExecutableFileReadError> {
    let entry_len = class.word_len();
    let start = header.offset as usize;
    let size = header.size as usize;

    if start + size > bytes.len() {
        return Err(ExecutableFileReadError::SectionOutOfBounds {
            name: header.name.clone(),
            offset: header.offset,
            size: header.size,
            actual: bytes.len(),
        });
    }
    if size % entry_len != 0 {
        return Err(ExecutableFileReadError::InvalidEntrySize {
            name: header.name.clone(),
            size: header.size,
            entry_len,
        });
    }

    let entries = bytes[start..start + size]
        .chunks_exact(entry_len)
        .map(|chunk| endian.read_nword(chunk, class))
        .collect();
    Ok(GlobalOffsetTable { entries })
}

/// Encode the slot array into `buf`.
pub fn encode_global_offset_table(
    buf: &mut [u8],
    table: &GlobalOffsetTable,
    class: Class,
    endian: Endian,
) {
    let entry_len = class.word_len();
    assert!(buf.len() >= table.entries.len() * entry_len);

    for (i, &entry) in table.entries.iter().enumerate() {
        endian.write_nword(&mut buf[i * entry_len..], class, entry);
    }
}
