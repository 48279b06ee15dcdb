//! ELF reader/writer for editing dynamic-linking metadata.
//!
//! Builds an in-memory editable model of an ELF executable or shared
//! library (headers, dynamic section, dynamic string table and the
//! auxiliary sections the write path has to carry), lets the caller
//! rewrite the run-time search path or the SONAME, and serializes the
//! model back into a byte buffer. Structures that no longer fit their
//! original footprint are relocated to the end of the file.
//!
//! # Example
//!
//! ```ignore
//! use rpatch_elf::{ElfFileIo, OpenMode, RPath};
//!
//! let mut file = ElfFileIo::open("libfoo.so", OpenMode::ReadWrite)?;
//! file.set_run_path(&RPath::parse("$ORIGIN/../lib"))?;
//! file.close();
//! ```

mod constants;
mod dynamic;
mod file_header;
mod gnu_hash;
mod got;
mod headers;
mod ident;
mod interp;
mod io;
mod layout;
mod note;
mod offset_changes;
mod program_header;
mod rpath;
mod section_header;
mod string_table;
mod symbol;
#[cfg(test)]
mod test_fixture;
mod word;
mod writer;

pub use constants::*;
pub use dynamic::{DynamicSection, DynamicStruct, encode_dynamic_entries, extract_dynamic_entries};
pub use file_header::{FileHeader, ObjectType, encode_file_header, extract_file_header};
pub use gnu_hash::{GnuHashTable, encode_gnu_hash_table, extract_gnu_hash_table};
pub use got::{GlobalOffsetTable, encode_global_offset_table, extract_global_offset_table};
pub use headers::FileAllHeaders;
pub use ident::{Ident, encode_ident, extract_ident};
pub use interp::{ProgramInterpreterSection, encode_program_interpreter, extract_program_interpreter};
pub use io::{ElfFileIo, OpenMode};
pub use layout::{find_aligned_size, find_next_aligned_address};
pub use note::{NoteRecord, NoteSection, encode_note_section, extract_note_section};
pub use offset_changes::FileOffsetChanges;
pub use program_header::{
    ProgramHeader, SegmentType, encode_program_header, extract_all_program_headers,
    extract_program_header,
};
pub use rpath::{RPath, RPathEntry};
pub use section_header::{
    SectionHeader, SectionType, encode_section_header, extract_all_section_headers,
    extract_section_header,
};
pub use string_table::{StringTable, read_null_terminated};
pub use symbol::{
    IndexedSymbol, PartialSymbolTable, SymbolTableEntry, encode_symbol, extract_partial_symbol_table,
    extract_symbol,
};
pub use word::{Class, Endian};
pub use writer::ElfEditableFile;

use thiserror::Error;

/// A bounded character region never reached a `\0` terminator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("string of at most {region_len} bytes is not null-terminated")]
pub struct NotNullTerminatedStringError {
    /// Length of the region that was scanned.
    pub region_len: usize,
}

/// A raw byte region does not satisfy the string table framing rules.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StringTableError {
    #[error("string table is empty")]
    Empty,
    #[error("string table does not start with a null byte")]
    DoesNotStartWithNull,
    #[error("string table does not end with a null byte")]
    DoesNotEndWithNull,
}

/// Corruption detected while decoding the dynamic section.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DynamicSectionReadError {
    #[error("dynamic entry with tag {tag:#x} references string index {index} outside the string table (size {table_size})")]
    StringIndexOutOfBounds { tag: i64, index: u64, table_size: usize },
    #[error("dynamic section size {size} is not a multiple of the {entry_len}-byte entry size")]
    InvalidSectionSize { size: u64, entry_len: usize },
    #[error(transparent)]
    NotNullTerminated(#[from] NotNullTerminatedStringError),
}

/// Corruption detected while decoding a GNU hash section.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GnuHashTableReadError {
    #[error("GNU hash section of {size} bytes is smaller than the {header_len}-byte header")]
    SectionTooSmall { size: u64, header_len: usize },
    #[error("GNU hash section size {size} does not match {buckets} buckets, {bloom_size} bloom words and the chain array")]
    InconsistentSize { size: u64, buckets: u32, bloom_size: u32 },
}

/// Corruption detected while decoding a note section.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NoteSectionReadError {
    #[error("note record at offset {offset} is truncated (section size {size})")]
    TruncatedRecord { offset: usize, size: usize },
    #[error("note record at offset {offset} declares a name of {name_len} bytes that overruns the section")]
    NameOverrun { offset: usize, name_len: usize },
    #[error("note record at offset {offset} declares a descriptor of {desc_len} bytes that overruns the section")]
    DescriptorOverrun { offset: usize, desc_len: usize },
    #[error(transparent)]
    NotNullTerminated(#[from] NotNullTerminatedStringError),
}

/// The file could not be opened.
#[derive(Error, Debug)]
pub enum FileOpenError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// The file content is structurally invalid or undersized for what its
/// headers declare.
#[derive(Error, Debug)]
pub enum ExecutableFileReadError {
    #[error("file of {actual} bytes is too small for an ELF identification block")]
    FileTooSmall { actual: usize },
    #[error("not an ELF file, or the class/data-format/version bytes are not recognized")]
    InvalidIdent,
    #[error("the ELF file header is not valid")]
    InvalidFileHeader,
    #[error("file of {actual} bytes is too small for {count} program headers at offset {offset}")]
    UndersizedForProgramHeaders { actual: usize, count: u16, offset: u64 },
    #[error("file of {actual} bytes is too small for {count} section headers at offset {offset}")]
    UndersizedForSectionHeaders { actual: usize, count: u16, offset: u64 },
    #[error("section `{name}` at offset {offset} with size {size} extends past the end of the file ({actual} bytes)")]
    SectionOutOfBounds { name: String, offset: u64, size: u64, actual: usize },
    #[error("section size {size} of `{name}` is not a multiple of its {entry_len}-byte entry size")]
    InvalidEntrySize { name: String, size: u64, entry_len: usize },
    #[error("no dynamic section found")]
    MissingDynamicSection,
    #[error("no dynamic string table found")]
    MissingDynamicStringTable,
    #[error("no dynamic symbol table found")]
    MissingDynamicSymbolTable,
    #[error(transparent)]
    StringTable(#[from] StringTableError),
    #[error(transparent)]
    DynamicSection(#[from] DynamicSectionReadError),
    #[error(transparent)]
    GnuHashTable(#[from] GnuHashTableReadError),
    #[error(transparent)]
    NoteSection(#[from] NoteSectionReadError),
    #[error(transparent)]
    NotNullTerminated(#[from] NotNullTerminatedStringError),
}

/// The edited model could not be written back to storage.
#[derive(Error, Debug)]
pub enum ExecutableFileWriteError {
    #[error(transparent)]
    Read(#[from] ExecutableFileReadError),
    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
