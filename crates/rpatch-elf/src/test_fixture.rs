//! Hand-assembled ELF files shared by the unit tests.

use crate::constants::*;
use crate::dynamic::{DynamicStruct, encode_dynamic_entries};
use crate::file_header::{FileHeader, encode_file_header};
use crate::ident::Ident;
use crate::program_header::{ProgramHeader, encode_program_header};
use crate::section_header::{SectionHeader, encode_section_header};
use crate::symbol::{SymbolTableEntry, encode_symbol};
use crate::word::{Class, Endian};

const BASE_VADDR: u64 = 0x40_0000;
const PHT_OFFSET: u64 = 0x40;
const DYNSYM_OFFSET: u64 = 0xC0;
const DYNSTR_OFFSET: u64 = 0x100;
const DYNAMIC_OFFSET: u64 = 0x180;
const SHSTRTAB_OFFSET: u64 = 0x200;
const SHT_OFFSET: u64 = 0x240;
const FILE_SIZE: usize = 0x380;

/// Build a minimal dynamically linked ELF64 little-endian executable
/// with one needed library (`libA.so`) and, optionally, a run path.
pub fn minimal_elf64_dyn(run_path: Option<&str>) -> Vec<u8> {
    let class = Class::Elf64;
    let endian = Endian::Little;
    let mut bytes = vec![0_u8; FILE_SIZE];

    // Dynamic string table: \0[run_path\0]libA.so\0
    let mut dynstr = vec![0_u8];
    let needed_index;
    match run_path {
        Some(rp) => {
            dynstr.extend_from_slice(rp.as_bytes());
            dynstr.push(0);
            needed_index = dynstr.len() as u64;
            dynstr.extend_from_slice(b"libA.so\0");
        }
        None => {
            needed_index = 1;
            dynstr.extend_from_slice(b"libA.so\0");
        }
    }
    assert!(DYNSTR_OFFSET as usize + dynstr.len() <= DYNAMIC_OFFSET as usize);

    // Dynamic entries, terminated by DT_NULL.
    let mut entries = vec![
        DynamicStruct::new(DT_NEEDED, needed_index),
        DynamicStruct::new(DT_STRTAB, BASE_VADDR + DYNSTR_OFFSET),
        DynamicStruct::new(DT_SYMTAB, BASE_VADDR + DYNSYM_OFFSET),
        DynamicStruct::new(DT_STRSZ, dynstr.len() as u64),
    ];
    if run_path.is_some() {
        entries.push(DynamicStruct::new(DT_RUNPATH, 1));
    }
    entries.push(DynamicStruct::new(DT_NULL, 0));
    let dynamic_size = (entries.len() * class.dynamic_entry_len()) as u64;
    assert!(DYNAMIC_OFFSET + dynamic_size <= SHSTRTAB_OFFSET);

    // Section name pool.
    let shstrtab = b"\0.dynsym\0.dynstr\0.dynamic\0.shstrtab\0";

    let file_header = FileHeader {
        ident: Ident {
            magic: ELF_MAGIC,
            class: class.byte(),
            data: endian.byte(),
            version: ELF_VERSION_CURRENT,
            os_abi: 0,
            abi_version: 0,
        },
        e_type: ET_EXEC,
        machine: 62, // EM_X86_64
        version: 1,
        entry: BASE_VADDR,
        phoff: PHT_OFFSET,
        shoff: SHT_OFFSET,
        flags: 0,
        ehsize: class.file_header_len() as u16,
        phentsize: class.program_header_len() as u16,
        phnum: 2,
        shentsize: class.section_header_len() as u16,
        shnum: 5,
        shstrndx: 4,
    };
    encode_file_header(&mut bytes, &file_header);

    let program_headers = [
        ProgramHeader {
            p_type: PT_LOAD,
            flags: PF_R | PF_W | PF_X,
            offset: 0,
            vaddr: BASE_VADDR,
            paddr: BASE_VADDR,
            filesz: FILE_SIZE as u64,
            memsz: FILE_SIZE as u64,
            align: PAGE_SIZE,
        },
        ProgramHeader {
            p_type: PT_DYNAMIC,
            flags: PF_R | PF_W,
            offset: DYNAMIC_OFFSET,
            vaddr: BASE_VADDR + DYNAMIC_OFFSET,
            paddr: BASE_VADDR + DYNAMIC_OFFSET,
            filesz: dynamic_size,
            memsz: dynamic_size,
            align: 8,
        },
    ];
    for (i, header) in program_headers.iter().enumerate() {
        let at = PHT_OFFSET as usize + i * class.program_header_len();
        encode_program_header(&mut bytes[at..], header, class, endian);
    }

    // Symbols: the null entry plus _DYNAMIC referencing section 3.
    let symbols = [
        SymbolTableEntry {
            name_index: 0,
            value: 0,
            size: 0,
            info: 0,
            other: 0,
            shndx: SHN_UNDEF,
        },
        SymbolTableEntry {
            name_index: 0,
            value: BASE_VADDR + DYNAMIC_OFFSET,
            size: 0,
            info: STT_OBJECT,
            other: 0,
            shndx: 3,
        },
    ];
    for (i, symbol) in symbols.iter().enumerate() {
        let at = DYNSYM_OFFSET as usize + i * class.symbol_len();
        encode_symbol(&mut bytes[at..], symbol, class, endian);
    }

    bytes[DYNSTR_OFFSET as usize..DYNSTR_OFFSET as usize + dynstr.len()]
        .copy_from_slice(&dynstr);
    encode_dynamic_entries(
        &mut bytes[DYNAMIC_OFFSET as usize..],
        &entries,
        class,
        endian,
    );
    bytes[SHSTRTAB_OFFSET as usize..SHSTRTAB_OFFSET as usize + shstrtab.len()]
        .copy_from_slice(shstrtab);

    let blank = |name_index: u32| SectionHeader {
        name_index,
        name: String::new(),
        sh_type: SHT_NULL,
        flags: 0,
        addr: 0,
        offset: 0,
        size: 0,
        link: 0,
        info: 0,
        addralign: 0,
        entsize: 0,
    };
    let section_headers = [
        blank(0),
        SectionHeader {
            sh_type: SHT_DYNSYM,
            flags: SHF_ALLOC,
            addr: BASE_VADDR + DYNSYM_OFFSET,
            offset: DYNSYM_OFFSET,
            size: (symbols.len() * class.symbol_len()) as u64,
            link: 2,
            info: 1,
            addralign: 8,
            entsize: class.symbol_len() as u64,
            ..blank(1)
        },
        SectionHeader {
            sh_type: SHT_STRTAB,
            flags: SHF_ALLOC,
            addr: BASE_VADDR + DYNSTR_OFFSET,
            offset: DYNSTR_OFFSET,
            size: dynstr.len() as u64,
            addralign: 1,
            ..blank(9)
        },
        SectionHeader {
            sh_type: SHT_DYNAMIC,
            flags: SHF_ALLOC | SHF_WRITE,
            addr: BASE_VADDR + DYNAMIC_OFFSET,
            offset: DYNAMIC_OFFSET,
            size: dynamic_size,
            link: 2,
            addralign: 8,
            entsize: class.dynamic_entry_len() as u64,
            ..blank(17)
        },
        SectionHeader {
            sh_type: SHT_STRTAB,
            offset: SHSTRTAB_OFFSET,
            size: shstrtab.len() as u64,
            addralign: 1,
            ..blank(26)
        },
    ];
    for (i, header) in section_headers.iter().enumerate() {
        let at = SHT_OFFSET as usize + i * class.section_header_len();
        encode_section_header(&mut bytes[at..], header, class, endian);
    }

    bytes
}
