//! The editable file model and the write/relocation pipeline.
//!
//! One `ElfEditableFile` holds a copy of every structure extracted from
//! the original buffer. After mutation it decides whether the dynamic
//! section and its string table still fit their original footprints; a
//! structure that grew is relocated into one fresh page-aligned region
//! at the end of the file, covered by a new PT_LOAD segment. Adding
//! that segment grows the program header table, which therefore moves
//! into the same region. Serialization writes headers last, once every
//! other structure's placement is final.

use tracing::debug;

use crate::{DynamicSectionReadError, ExecutableFileReadError};
use crate::constants::*;
use crate::dynamic::{DynamicSection, encode_dynamic_entries, extract_dynamic_entries};
use crate::file_header::encode_file_header;
use crate::gnu_hash::{GnuHashTable, encode_gnu_hash_table, extract_gnu_hash_table};
use crate::got::{GlobalOffsetTable, encode_global_offset_table, extract_global_offset_table};
use crate::headers::FileAllHeaders;
use crate::interp::{
    ProgramInterpreterSection, encode_program_interpreter, extract_program_interpreter,
};
use crate::layout::{find_aligned_size, find_next_aligned_address};
use crate::note::{NoteSection, encode_note_section, extract_note_section};
use crate::offset_changes::FileOffsetChanges;
use crate::program_header::{ProgramHeader, encode_program_header};
use crate::rpath::RPath;
use crate::section_header::encode_section_header;
use crate::string_table::StringTable;
use crate::symbol::{PartialSymbolTable, encode_symbol, extract_partial_symbol_table};

/// File placement of the editable structures as found in the original
/// buffer, kept so stale regions can be zeroed after a move.
#[derive(Clone, Copy, Debug)]
struct OriginalLayout {
    file_size: u64,
    dynamic_section_offset: u64,
    dynamic_section_size: u64,
    dynamic_section_addr: u64,
    dynamic_string_table_offset: u64,
    dynamic_string_table_size: u64,
    dynamic_string_table_addr: u64,
    program_header_table_offset: u64,
    program_header_table_size: u64,
}

/// Placement decision taken once, after the last mutation.
#[derive(Clone, Copy, Debug)]
struct FinalLayout {
    required_size: u64,
    moved_region: Option<(u64, u64)>,
    move_dynamic_section: bool,
    move_dynamic_string_table: bool,
    move_program_header_table: bool,
}

/// The full editable model of one ELF file.
pub struct ElfEditableFile {
    headers: FileAllHeaders,
    dynamic_section: DynamicSection,
    offset_changes: FileOffsetChanges,
    original: OriginalLayout,
    dynamic_section_index: usize,
    dynamic_string_table_index: usize,
    dynsym_index: usize,
    dynsym: PartialSymbolTable,
    symtab: Option<(usize, PartialSymbolTable)>,
    got: Option<(usize, GlobalOffsetTable)>,
    got_plt: Option<(usize, GlobalOffsetTable)>,
    gnu_hash: Option<(usize, GnuHashTable)>,
    notes: Vec<(usize, NoteSection)>,
    interpreter: Option<(usize, ProgramInterpreterSection)>,
    layout: Option<FinalLayout>,
}

impl ElfEditableFile {
    /// Populate the model from the raw file bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ExecutableFileReadError> {
        let headers = FileAllHeaders::extract(bytes)?;
        let class = headers.class();
        let endian = headers.endian();

        let dynamic_section_index = headers
            .dynamic_section_index()
            .ok_or(ExecutableFileReadError::MissingDynamicSection)?;
        let dynamic_string_table_index = headers
            .dynamic_string_table_index()
            .ok_or(ExecutableFileReadError::MissingDynamicStringTable)?;
        let dynsym_index = headers
            .dynamic_symbol_table_index()
            .ok_or(ExecutableFileReadError::MissingDynamicSymbolTable)?;

        let entries = extract_dynamic_entries(
            headers.section_bytes(bytes, dynamic_section_index)?,
            class,
            endian,
        )?;
        let string_table =
            StringTable::from_bytes(headers.section_bytes(bytes, dynamic_string_table_index)?)?;
        let dynamic_section = DynamicSection::from_parts(entries, string_table);
        let offset_changes = FileOffsetChanges::set_original_sizes(&dynamic_section, class);

        let dynsym = extract_partial_symbol_table(
            bytes,
            &headers.section_headers[dynsym_index],
            class,
            endian,
        )?;
        let symtab = match headers.symbol_table_index() {
            Some(index) => Some((
                index,
                extract_partial_symbol_table(
                    bytes,
                    &headers.section_headers[index],
                    class,
                    endian,
                )?,
            )),
            None => None,
        };
        let got = match headers.got_section_index() {
            Some(index) => Some((
                index,
                extract_global_offset_table(
                    bytes,
                    &headers.section_headers[index],
                    class,
                    endian,
                )?,
            )),
            None => None,
        };
        let got_plt = match headers.got_plt_section_index() {
            Some(index) => Some((
                index,
                extract_global_offset_table(
                    bytes,
                    &headers.section_headers[index],
                    class,
                    endian,
                )?,
            )),
            None => None,
        };
        let gnu_hash = match headers.gnu_hash_section_index() {
            Some(index) => Some((
                index,
                extract_gnu_hash_table(headers.section_bytes(bytes, index)?, class, endian)?,
            )),
            None => None,
        };
        let mut notes = Vec::new();
        for index in headers.note_section_indexes() {
            notes.push((
                index,
                extract_note_section(headers.section_bytes(bytes, index)?, endian)?,
            ));
        }
        let interpreter = match headers.program_interpreter_section_index() {
            Some(index) => Some((
                index,
                extract_program_interpreter(headers.section_bytes(bytes, index)?)?,
            )),
            None => None,
        };

        let dynamic_header = &headers.section_headers[dynamic_section_index];
        let string_table_header = &headers.section_headers[dynamic_string_table_index];
        let original = OriginalLayout {
            file_size: bytes.len() as u64,
            dynamic_section_offset: dynamic_header.offset,
            dynamic_section_size: dynamic_header.size,
            dynamic_section_addr: dynamic_header.addr,
            dynamic_string_table_offset: string_table_header.offset,
            dynamic_string_table_size: string_table_header.size,
            dynamic_string_table_addr: string_table_header.addr,
            program_header_table_offset: headers.file_header.phoff,
            program_header_table_size: u64::from(headers.file_header.phnum)
                * u64::from(headers.file_header.phentsize),
        };

        debug!(
            file_size = original.file_size,
            dynamic_entries = dynamic_section.entries().len(),
            string_table_bytes = dynamic_section.string_table().byte_count(),
            "populated editable model"
        );

        Ok(Self {
            headers,
            dynamic_section,
            offset_changes,
            original,
            dynamic_section_index,
            dynamic_string_table_index,
            dynsym_index,
            dynsym,
            symtab,
            got,
            got_plt,
            gnu_hash,
            notes,
            interpreter,
            layout: None,
        })
    }

    pub fn headers(&self) -> &FileAllHeaders {
        &self.headers
    }

    pub fn dynamic_section(&self) -> &DynamicSection {
        &self.dynamic_section
    }

    pub fn so_name(&self) -> Result<Option<String>, DynamicSectionReadError> {
        self.dynamic_section.so_name()
    }

    pub fn needed_shared_libraries(&self) -> Result<Vec<String>, DynamicSectionReadError> {
        self.dynamic_section.needed_shared_libraries()
    }

    pub fn run_path(&self) -> Result<RPath, DynamicSectionReadError> {
        let raw = self.dynamic_section.get_run_path()?;
        Ok(raw.map(|r| RPath::from_raw_string(&r)).unwrap_or_default())
    }

    /// Set or replace the run path. An empty list removes it.
    pub fn set_run_path(&mut self, rpath: &RPath) {
        assert!(self.layout.is_none(), "model already serialized");
        self.dynamic_section.set_run_path(&rpath.to_raw_string());
    }

    pub fn remove_run_path(&mut self) {
        assert!(self.layout.is_none(), "model already serialized");
        self.dynamic_section.remove_run_path();
    }

    pub fn set_so_name(&mut self, name: &str) {
        assert!(self.layout.is_none(), "model already serialized");
        self.dynamic_section.set_so_name(name);
    }

    /// Smallest buffer the serialized file fits into. Finalizes the
    /// layout decision; no further mutation is allowed afterwards.
    pub fn minimum_size_to_write(&mut self) -> u64 {
        self.finalize_layout();
        self.layout.expect("finalized above").required_size
    }

    fn finalize_layout(&mut self) {
        if self.layout.is_some() {
            return;
        }
        let class = self.headers.class();
        let dynamic_size = self.dynamic_section.byte_count(class) as u64;
        let string_table_size = self.dynamic_section.string_table().byte_count() as u64;
        let move_dynamic_section = dynamic_size > self.original.dynamic_section_size;
        let move_dynamic_string_table = string_table_size > self.original.dynamic_string_table_size;
        let any_move = move_dynamic_section || move_dynamic_string_table;

        debug!(
            dynamic_delta = self.offset_changes.dynamic_section_changes_offset(&self.dynamic_section),
            string_table_delta = self
                .offset_changes
                .dynamic_string_table_changes_offset(&self.dynamic_section),
            move_dynamic_section,
            move_dynamic_string_table,
            "layout decision"
        );

        if !any_move {
            self.resize_dynamic_section_in_place(dynamic_size);
            self.resize_dynamic_string_table_in_place(string_table_size);
            self.layout = Some(FinalLayout {
                required_size: self.original.file_size,
                moved_region: None,
                move_dynamic_section: false,
                move_dynamic_string_table: false,
                move_program_header_table: false,
            });
            return;
        }

        // One page-aligned region past the end of the original file
        // holds every moved structure. Offsets and virtual addresses
        // advance in lockstep from page-aligned bases, which keeps the
        // load-segment congruence (offset mod page == vaddr mod page).
        let region_offset = find_aligned_size(self.original.file_size, PAGE_SIZE);
        let region_vaddr = find_next_aligned_address(
            self.headers.highest_load_segment_virtual_end(),
            PAGE_SIZE,
        );
        let mut cursor: u64 = 0;

        if move_dynamic_section {
            let align = self.headers.section_headers[self.dynamic_section_index]
                .addralign
                .max(class.word_len() as u64);
            cursor = find_aligned_size(cursor, align);
            self.relocate_dynamic_section(region_offset + cursor, region_vaddr + cursor, dynamic_size);
            cursor += dynamic_size;
        } else {
            self.resize_dynamic_section_in_place(dynamic_size);
        }

        if move_dynamic_string_table {
            self.relocate_dynamic_string_table(
                region_offset + cursor,
                region_vaddr + cursor,
                string_table_size,
            );
            cursor += string_table_size;
        } else {
            self.resize_dynamic_string_table_in_place(string_table_size);
        }

        // The region is covered by a fresh PT_LOAD; the extra entry
        // grows the program header table past its original slot, so the
        // table moves into the region as well.
        let phentsize = u64::from(self.headers.file_header.phentsize);
        let pht_count = self.headers.program_headers.len() as u64 + 1;
        let pht_size = pht_count * phentsize;
        cursor = find_aligned_size(cursor, class.word_len() as u64);
        let pht_offset = region_offset + cursor;
        let pht_vaddr = region_vaddr + cursor;
        cursor += pht_size;

        let region_size = cursor;
        self.headers.program_headers.push(ProgramHeader {
            p_type: PT_LOAD,
            flags: PF_R | PF_W,
            offset: region_offset,
            vaddr: region_vaddr,
            paddr: region_vaddr,
            filesz: region_size,
            memsz: region_size,
            align: PAGE_SIZE,
        });
        self.headers.file_header.phoff = pht_offset;
        self.headers.file_header.phnum = pht_count as u16;
        if let Some(index) = self.headers.program_header_table_segment_index() {
            let phdr = &mut self.headers.program_headers[index];
            phdr.offset = pht_offset;
            phdr.vaddr = pht_vaddr;
            phdr.paddr = pht_vaddr;
            phdr.filesz = pht_size;
            phdr.memsz = pht_size;
        }

        self.layout = Some(FinalLayout {
            required_size: region_offset + region_size,
            moved_region: Some((region_offset, region_size)),
            move_dynamic_section,
            move_dynamic_string_table,
            move_program_header_table: true,
        });
    }

    fn resize_dynamic_section_in_place(&mut self, size: u64) {
        self.headers.section_headers[self.dynamic_section_index].size = size;
        if let Some(index) = self.headers.dynamic_program_header_index() {
            let phdr = &mut self.headers.program_headers[index];
            phdr.filesz = size;
            phdr.memsz = size;
        }
    }

    fn resize_dynamic_string_table_in_place(&mut self, size: u64) {
        self.headers.section_headers[self.dynamic_string_table_index].size = size;
    }

    fn relocate_dynamic_section(&mut self, offset: u64, vaddr: u64, size: u64) {
        let old_addr = self.original.dynamic_section_addr;
        let header = &mut self.headers.section_headers[self.dynamic_section_index];
        header.offset = offset;
        header.addr = vaddr;
        header.size = size;
        if let Some(index) = self.headers.dynamic_program_header_index() {
            let phdr = &mut self.headers.program_headers[index];
            phdr.offset = offset;
            phdr.vaddr = vaddr;
            phdr.paddr = vaddr;
            phdr.filesz = size;
            phdr.memsz = size;
        }

        // Everything that holds the dynamic section's address follows.
        if let Some((_, got)) = &mut self.got {
            got.retarget_address(old_addr, vaddr);
        }
        if let Some((_, got_plt)) = &mut self.got_plt {
            got_plt.retarget_address(old_addr, vaddr);
        }
        self.dynsym
            .retarget_section(self.dynamic_section_index, old_addr, vaddr);
        if let Some((_, symtab)) = &mut self.symtab {
            symtab.retarget_section(self.dynamic_section_index, old_addr, vaddr);
        }
        debug!(offset, vaddr, size, "dynamic section moves to end of file");
    }

    fn relocate_dynamic_string_table(&mut self, offset: u64, vaddr: u64, size: u64) {
        let old_addr = self.original.dynamic_string_table_addr;
        let header = &mut self.headers.section_headers[self.dynamic_string_table_index];
        header.offset = offset;
        header.addr = vaddr;
        header.size = size;

        self.dynamic_section.set_string_table_address(vaddr);
        self.dynsym
            .retarget_section(self.dynamic_string_table_index, old_addr, vaddr);
        if let Some((_, symtab)) = &mut self.symtab {
            symtab.retarget_section(self.dynamic_string_table_index, old_addr, vaddr);
        }
        debug!(offset, vaddr, size, "dynamic string table moves to end of file");
    }

    /// Serialize the model into `buffer`, which must already hold at
    /// least [`Self::minimum_size_to_write`] bytes. Headers are written
    /// last, once every other structure's placement is final.
    pub fn write_to_buffer(&mut self, buffer: &mut [u8]) {
        self.finalize_layout();
        let layout = self.layout.expect("finalized above");
        assert!(
            buffer.len() as u64 >= layout.required_size,
            "buffer of {} bytes is smaller than the required {}",
            buffer.len(),
            layout.required_size
        );
        let class = self.headers.class();
        let endian = self.headers.endian();

        // Stale regions of moved structures, and the fresh region's
        // alignment gaps, are zeroed before any content lands.
        if layout.move_dynamic_section {
            zero_region(
                buffer,
                self.original.dynamic_section_offset,
                self.original.dynamic_section_size,
            );
        }
        if layout.move_dynamic_string_table {
            zero_region(
                buffer,
                self.original.dynamic_string_table_offset,
                self.original.dynamic_string_table_size,
            );
        }
        if layout.move_program_header_table {
            zero_region(
                buffer,
                self.original.program_header_table_offset,
                self.original.program_header_table_size,
            );
        }
        if let Some((offset, size)) = layout.moved_region {
            zero_region(buffer, offset, size);
        }

        if let Some((index, got)) = &self.got {
            let offset = self.headers.section_headers[*index].offset as usize;
            encode_global_offset_table(&mut buffer[offset..], got, class, endian);
        }
        if let Some((index, got_plt)) = &self.got_plt {
            let offset = self.headers.section_headers[*index].offset as usize;
            encode_global_offset_table(&mut buffer[offset..], got_plt, class, endian);
        }
        if let Some((index, interpreter)) = &self.interpreter {
            let offset = self.headers.section_headers[*index].offset as usize;
            encode_program_interpreter(&mut buffer[offset..], interpreter);
        }
        if let Some((index, gnu_hash)) = &self.gnu_hash {
            let offset = self.headers.section_headers[*index].offset as usize;
            encode_gnu_hash_table(&mut buffer[offset..], gnu_hash, class, endian);
        }
        for (index, note) in &self.notes {
            let offset = self.headers.section_headers[*index].offset as usize;
            encode_note_section(&mut buffer[offset..], note, endian);
        }

        if let Some((index, symtab)) = &self.symtab {
            write_partial_symbol_table(buffer, &self.headers, *index, symtab);
        }
        write_partial_symbol_table(buffer, &self.headers, self.dynsym_index, &self.dynsym);

        let dynamic_header = &self.headers.section_headers[self.dynamic_section_index];
        if !layout.move_dynamic_section {
            // In-place rewrite: clear the whole original footprint so a
            // shrink leaves no stale entry bytes behind.
            zero_region(
                buffer,
                self.original.dynamic_section_offset,
                self.original.dynamic_section_size,
            );
        }
        encode_dynamic_entries(
            &mut buffer[dynamic_header.offset as usize..],
            self.dynamic_section.entries(),
            class,
            endian,
        );

        let string_table_header = &self.headers.section_headers[self.dynamic_string_table_index];
        if !layout.move_dynamic_string_table {
            zero_region(
                buffer,
                self.original.dynamic_string_table_offset,
                self.original.dynamic_string_table_size,
            );
        }
        let pool = self.dynamic_section.string_table().as_bytes();
        let at = string_table_header.offset as usize;
        buffer[at..at + pool.len()].copy_from_slice(pool);

        // Headers last.
        encode_file_header(buffer, &self.headers.file_header);
        let phentsize = usize::from(self.headers.file_header.phentsize);
        for (i, phdr) in self.headers.program_headers.iter().enumerate() {
            let at = self.headers.file_header.phoff as usize + i * phentsize;
            encode_program_header(&mut buffer[at..], phdr, class, endian);
        }
        let shentsize = usize::from(self.headers.file_header.shentsize);
        for (i, shdr) in self.headers.section_headers.iter().enumerate() {
            let at = self.headers.file_header.shoff as usize + i * shentsize;
            encode_section_header(&mut buffer[at..], shdr, class, endian);
        }

        debug!(bytes = layout.required_size, "model serialized");
    }
}

fn zero_region(buffer: &mut [u8], offset: u64, size: u64) {
    let start = offset as usize;
    let end = start + size as usize;
    buffer[start..end].fill(0);
}

fn write_partial_symbol_table(
    buffer: &mut [u8],
    headers: &FileAllHeaders,
    section_index: usize,
    table: &PartialSymbolTable,
) {
    let class = headers.class();
    let endian = headers.endian();
    let offset = headers.section_headers[section_index].offset as usize;
    for indexed in table.entries() {
        let at = offset + indexed.table_index * class.symbol_len();
        encode_symbol(&mut buffer[at..], &indexed.symbol, class, endian);
    }
}
