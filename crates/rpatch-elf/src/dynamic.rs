//! The dynamic section model: an ordered array of tag/value entries
//! plus the dynamic string table they index into.

use rustc_hash::FxHashMap;

use crate::DynamicSectionReadError;
use crate::constants::*;
use crate::string_table::StringTable;
use crate::word::{Class, Endian};

/// One `(tag, value)` entry of `.dynamic`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DynamicStruct {
    pub tag: i64,
    pub val: u64,
}

impl DynamicStruct {
    pub const fn new(tag: i64, val: u64) -> Self {
        Self { tag, val }
    }

    /// The terminator entry ending the live part of the section.
    pub const fn is_null(&self) -> bool {
        self.tag == DT_NULL
    }

    /// Whether `val` is a byte offset into the dynamic string table.
    pub const fn is_string_table_index(&self) -> bool {
        matches!(self.tag, DT_NEEDED | DT_SONAME | DT_RPATH | DT_RUNPATH)
    }
}

/// Decode the raw entry array from the `.dynamic` section content.
pub fn extract_dynamic_entries(
    section_bytes: &[u8],
    class: Class,
    endian: Endian,
) -> Result<Vec<DynamicStruct>, DynamicSectionReadError> {
    let entry_len = class.dynamic_entry_len();
    if section_bytes.len() % entry_len != 0 {
        return Err(DynamicSectionReadError::InvalidSectionSize {
            size: section_bytes.len() as u64,
            entry_len,
        });
    }

    let word_len = class.word_len();
    let mut entries = Vec::with_capacity(section_bytes.len() / entry_len);
    for chunk in section_bytes.chunks_exact(entry_len) {
        entries.push(DynamicStruct {
            tag: endian.read_nsword(chunk, class),
            val: endian.read_nword(&chunk[word_len..], class),
        });
    }
    Ok(entries)
}

/// The dynamic section with its owned string table.
///
/// Well-known single-occurrence tags are tracked in a tag-to-position
/// map that is rebuilt after every structural change; no position is
/// ever cached across an insert or remove.
#[derive(Clone, Debug)]
pub struct DynamicSection {
    entries: Vec<DynamicStruct>,
    string_table: StringTable,
    tag_index: FxHashMap<i64, usize>,
}

/// Tags tracked in the position map. DT_NEEDED may occur many times and
/// is deliberately absent.
const INDEXED_TAGS: [i64; 7] = [
    DT_STRTAB, DT_STRSZ, DT_SYMTAB, DT_SONAME, DT_RPATH, DT_RUNPATH, DT_GNU_HASH,
];

impl Default for DynamicSection {
    fn default() -> Self {
        Self::new()
    }
}

impl DynamicSection {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            string_table: StringTable::new(),
            tag_index: FxHashMap::default(),
        }
    }

    pub fn from_parts(entries: Vec<DynamicStruct>, string_table: StringTable) -> Self {
        let mut section = Self {
            entries,
            string_table,
            tag_index: FxHashMap::default(),
        };
        section.reindex();
        section
    }

    pub fn is_null(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[DynamicStruct] {
        &self.entries
    }

    pub fn string_table(&self) -> &StringTable {
        &self.string_table
    }

    /// On-disk size of the entry array.
    pub fn byte_count(&self, class: Class) -> usize {
        self.entries.len() * class.dynamic_entry_len()
    }

    /// Append an entry, keeping the tag index current.
    pub fn add_entry(&mut self, entry: DynamicStruct) {
        self.entries.push(entry);
        if INDEXED_TAGS.contains(&entry.tag) {
            self.tag_index.insert(entry.tag, self.entries.len() - 1);
        }
    }

    /// Rebuild the tag-to-position map from scratch. Must run after any
    /// structural change that is not a plain append.
    fn reindex(&mut self) {
        self.tag_index.clear();
        for (position, entry) in self.entries.iter().enumerate() {
            if INDEXED_TAGS.contains(&entry.tag) {
                self.tag_index.insert(entry.tag, position);
            }
        }
    }

    fn entry_value(&self, tag: i64) -> Option<u64> {
        self.tag_index.get(&tag).map(|&pos| self.entries[pos].val)
    }

    /// Virtual address of the dynamic string table (DT_STRTAB).
    pub fn string_table_address(&self) -> Option<u64> {
        self.entry_value(DT_STRTAB)
    }

    pub fn set_string_table_address(&mut self, address: u64) {
        if let Some(&pos) = self.tag_index.get(&DT_STRTAB) {
            self.entries[pos].val = address;
        }
    }

    /// Declared size of the dynamic string table (DT_STRSZ).
    pub fn string_table_size(&self) -> Option<u64> {
        self.entry_value(DT_STRSZ)
    }

    /// Virtual address of the GNU hash table (DT_GNU_HASH).
    pub fn gnu_hash_address(&self) -> Option<u64> {
        self.entry_value(DT_GNU_HASH)
    }

    /// Virtual address of the dynamic symbol table (DT_SYMTAB).
    pub fn symbol_table_address(&self) -> Option<u64> {
        self.entry_value(DT_SYMTAB)
    }

    fn string_from_index(&self, tag: i64, index: u64) -> Result<String, DynamicSectionReadError> {
        let table_size = self.string_table.byte_count();
        if index as usize >= table_size {
            return Err(DynamicSectionReadError::StringIndexOutOfBounds {
                tag,
                index,
                table_size,
            });
        }
        Ok(self.string_table.string_at_index(index as usize))
    }

    /// The SONAME, if this file declares one.
    pub fn so_name(&self) -> Result<Option<String>, DynamicSectionReadError> {
        match self.tag_index.get(&DT_SONAME) {
            Some(&pos) => {
                let entry = self.entries[pos];
                Ok(Some(self.string_from_index(entry.tag, entry.val)?))
            }
            None => Ok(None),
        }
    }

    /// Every DT_NEEDED library, in section order.
    pub fn needed_shared_libraries(&self) -> Result<Vec<String>, DynamicSectionReadError> {
        let mut needed = Vec::new();
        for entry in &self.entries {
            if entry.tag == DT_NEEDED {
                needed.push(self.string_from_index(entry.tag, entry.val)?);
            }
        }
        Ok(needed)
    }

    fn run_path_position(&self) -> Option<usize> {
        self.tag_index
            .get(&DT_RUNPATH)
            .or_else(|| self.tag_index.get(&DT_RPATH))
            .copied()
    }

    /// The raw run path string (DT_RUNPATH, falling back to DT_RPATH).
    pub fn get_run_path(&self) -> Result<Option<String>, DynamicSectionReadError> {
        match self.run_path_position() {
            Some(pos) => {
                let entry = self.entries[pos];
                Ok(Some(self.string_from_index(entry.tag, entry.val)?))
            }
            None => Ok(None),
        }
    }

    /// Shift the value of every string-indexing entry whose index lies
    /// past the edited one, after the string table changed by `delta`
    /// bytes at `edited_index`.
    fn shift_entries_indexing_strtab_after(&mut self, edited_index: u64, delta: i64) {
        if delta == 0 {
            return;
        }
        for entry in &mut self.entries {
            if entry.is_string_table_index() && entry.val > edited_index {
                entry.val = entry.val.checked_add_signed(delta).expect("index shift underflow");
            }
        }
    }

    fn refresh_string_table_size(&mut self) {
        let size = self.string_table.byte_count() as u64;
        if let Some(&pos) = self.tag_index.get(&DT_STRSZ) {
            self.entries[pos].val = size;
        }
    }

    /// Insert a fresh DT_RUNPATH entry immediately before the first
    /// DT_NULL terminator, keeping the live entries contiguous.
    fn add_run_path_entry(&mut self, string_index: u64) {
        let position = self
            .entries
            .iter()
            .position(DynamicStruct::is_null)
            .unwrap_or(self.entries.len());
        self.entries
            .insert(position, DynamicStruct::new(DT_RUNPATH, string_index));
        self.reindex();
    }

    /// Set or replace the run path. An empty string removes it.
    ///
    /// An existing DT_RPATH entry is rewritten as DT_RUNPATH so the
    /// file is not left with two competing search-path entries.
    pub fn set_run_path(&mut self, raw_path: &str) {
        if raw_path.is_empty() {
            self.remove_run_path();
            return;
        }

        match self.run_path_position() {
            Some(pos) => {
                let index = self.entries[pos].val;
                assert!(index > 0, "run path entry references the reserved null string");
                let delta = self
                    .string_table
                    .set_string_at_index(index as usize, raw_path);
                self.entries[pos].tag = DT_RUNPATH;
                self.shift_entries_indexing_strtab_after(index, delta);
                self.reindex();
            }
            None => {
                let index = self.string_table.append_string(raw_path) as u64;
                self.add_run_path_entry(index);
            }
        }
        self.refresh_string_table_size();
    }

    /// Drop the run path entry and its string. No-op if absent.
    pub fn remove_run_path(&mut self) {
        let Some(pos) = self.run_path_position() else {
            return;
        };
        let index = self.entries[pos].val;
        let delta = if index > 0 && self.string_table.index_is_valid(index as usize) {
            self.string_table.remove_string_at_index(index as usize)
        } else {
            0
        };
        self.entries.remove(pos);
        self.shift_entries_indexing_strtab_after(index, delta);
        self.reindex();
        self.refresh_string_table_size();
    }

    /// Set or replace the SONAME, following the same shifting rules as
    /// the run path.
    pub fn set_so_name(&mut self, name: &str) {
        assert!(!name.is_empty());

        match self.tag_index.get(&DT_SONAME).copied() {
            Some(pos) => {
                let index = self.entries[pos].val;
                assert!(index > 0, "SONAME entry references the reserved null string");
                let delta = self.string_table.set_string_at_index(index as usize, name);
                self.shift_entries_indexing_strtab_after(index, delta);
            }
            None => {
                let index = self.string_table.append_string(name) as u64;
                let position = self
                    .entries
                    .iter()
                    .position(DynamicStruct::is_null)
                    .unwrap_or(self.entries.len());
                self.entries
                    .insert(position, DynamicStruct::new(DT_SONAME, index));
                self.reindex();
            }
        }
        self.refresh_string_table_size();
    }
}

/// Encode the entry array into `buf`.
pub fn encode_dynamic_entries(
    buf: &mut [u8],
    entries: &[DynamicStruct],
    class: Class,
    endian: Endian,
) {
    let entry_len = class.dynamic_entry_len();
    assert!(buf.len() >= entries.len() * entry_len);

    let word_len = class.word_len();
    for (i, entry) in entries.iter().enumerate() {
        let at = i * entry_len;
        endian.write_nsword(&mut buf[at..], class, entry.tag);
        endian.write_nword(&mut buf[at + word_len..], class, entry.val);
    }
}
