//! Aggregate view over the file, program and section header tables.

use crate::ExecutableFileReadError;
use crate::constants::*;
use crate::file_header::{FileHeader, extract_file_header};
use crate::ident::IDENT_LEN;
use crate::program_header::{ProgramHeader, extract_all_program_headers};
use crate::section_header::{SectionHeader, SectionType, extract_all_section_headers};
use crate::word::{Class, Endian};

/// Every header table of the file, plus the layout questions the read
/// and write pipelines ask of them.
#[derive(Clone, Debug)]
pub struct FileAllHeaders {
    pub file_header: FileHeader,
    pub program_headers: Vec<ProgramHeader>,
    pub section_headers: Vec<SectionHeader>,
}

impl FileAllHeaders {
    /// Extract all three tables from the raw file bytes.
    pub fn extract(bytes: &[u8]) -> Result<Self, ExecutableFileReadError> {
        if bytes.len() < IDENT_LEN {
            return Err(ExecutableFileReadError::FileTooSmall {
                actual: bytes.len(),
            });
        }
        let ident = crate::ident::extract_ident(bytes);
        if !ident.seems_valid() {
            return Err(ExecutableFileReadError::InvalidIdent);
        }
        let class = ident.class().expect("checked by seems_valid");
        if bytes.len() < class.file_header_len() {
            return Err(ExecutableFileReadError::FileTooSmall {
                actual: bytes.len(),
            });
        }

        let file_header = extract_file_header(bytes);
        if !file_header.seems_valid() {
            return Err(ExecutableFileReadError::InvalidFileHeader);
        }
        let program_headers = extract_all_program_headers(bytes, &file_header)?;
        let section_headers = extract_all_section_headers(bytes, &file_header)?;

        Ok(Self {
            file_header,
            program_headers,
            section_headers,
        })
    }

    pub fn class(&self) -> Class {
        self.file_header.ident.class().expect("populated from a valid file")
    }

    pub fn endian(&self) -> Endian {
        self.file_header.ident.endian().expect("populated from a valid file")
    }

    // ------------------------------------------------------------------
    // Section lookups
    // ------------------------------------------------------------------

    pub fn section_index_by_name(&self, name: &str) -> Option<usize> {
        self.section_headers.iter().position(|s| s.name == name)
    }

    fn section_index_by_type(&self, section_type: SectionType) -> Option<usize> {
        self.section_headers
            .iter()
            .position(|s| s.section_type() == section_type)
    }

    pub fn dynamic_section_index(&self) -> Option<usize> {
        self.section_index_by_type(SectionType::Dynamic)
    }

    /// The dynamic string table, located through `sh_link` of the
    /// dynamic section (falling back to the `.dynstr` name).
    pub fn dynamic_string_table_index(&self) -> Option<usize> {
        let dynamic = &self.section_headers[self.dynamic_section_index()?];
        let linked = dynamic.link as usize;
        if linked != 0 && linked < self.section_headers.len() {
            return Some(linked);
        }
        self.section_index_by_name(SECTION_NAME_DYNSTR)
    }

    pub fn dynamic_symbol_table_index(&self) -> Option<usize> {
        self.section_index_by_type(SectionType::DynSym)
    }

    pub fn symbol_table_index(&self) -> Option<usize> {
        self.section_index_by_type(SectionType::SymbolTable)
    }

    pub fn gnu_hash_section_index(&self) -> Option<usize> {
        self.section_index_by_type(SectionType::GnuHash)
    }

    pub fn got_section_index(&self) -> Option<usize> {
        self.section_index_by_name(SECTION_NAME_GOT)
    }

    pub fn got_plt_section_index(&self) -> Option<usize> {
        self.section_index_by_name(SECTION_NAME_GOT_PLT)
    }

    pub fn program_interpreter_section_index(&self) -> Option<usize> {
        self.section_index_by_name(SECTION_NAME_INTERP)
    }

    pub fn note_section_indexes(&self) -> Vec<usize> {
        self.section_headers
            .iter()
            .enumerate()
            .filter(|(_, s)| s.section_type() == SectionType::Note)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn contains_dynamic_section(&self) -> bool {
        self.dynamic_section_index().is_some()
    }

    pub fn contains_got_section(&self) -> bool {
        self.got_section_index().is_some()
    }

    pub fn contains_gnu_hash_section(&self) -> bool {
        self.gnu_hash_section_index().is_some()
    }

    pub fn contains_program_interpreter(&self) -> bool {
        self.program_interpreter_section_index().is_some()
    }

    /// Borrow the exact content slice of a section, bounds-checked
    /// against the file.
    pub fn section_bytes<'a>(
        &self,
        bytes: &'a [u8],
        index: usize,
    ) -> Result<&'a [u8], ExecutableFileReadError> {
        let header = &self.section_headers[index];
        let start = header.offset as usize;
        let end = start.checked_add(header.size as usize);
        match end {
            Some(end) if end <= bytes.len() => Ok(&bytes[start..end]),
            _ => Err(ExecutableFileReadError::SectionOutOfBounds {
                name: header.name.clone(),
                offset: header.offset,
                size: header.size,
                actual: bytes.len(),
            }),
        }
    }

    // ------------------------------------------------------------------
    // Segment lookups
    // ------------------------------------------------------------------

    pub fn dynamic_program_header_index(&self) -> Option<usize> {
        self.program_headers.iter().position(|p| p.p_type == PT_DYNAMIC)
    }

    pub fn program_header_table_segment_index(&self) -> Option<usize> {
        self.program_headers.iter().position(|p| p.p_type == PT_PHDR)
    }

    /// End of the highest PT_LOAD segment in the virtual address space.
    pub fn highest_load_segment_virtual_end(&self) -> u64 {
        self.program_headers
            .iter()
            .filter(|p| p.p_type == PT_LOAD)
            .map(ProgramHeader::virtual_end)
            .max()
            .unwrap_or(0)
    }

    /// Smallest file size that holds everything the headers describe.
    pub fn minimum_size_to_read(&self) -> u64 {
        let tables = self
            .file_header
            .minimum_size_to_read_all_program_headers()
            .max(self.file_header.minimum_size_to_read_all_section_headers());
        let sections = self
            .section_headers
            .iter()
            .filter(|s| s.section_type() != SectionType::NoBits)
            .map(SectionHeader::minimum_size_to_read)
            .max()
            .unwrap_or(0);
        tables.max(sections)
    }
}
