//! Shared fixture: a small dynamically linked shared object assembled
//! through the public codec API.

use rpatch_elf::{
    Class, DT_NEEDED, DT_NULL, DT_RUNPATH, DT_STRSZ, DT_STRTAB, DT_SYMTAB, DynamicStruct,
    ELF_CLASS_64, ELF_DATA_LSB, ELF_MAGIC, ELF_VERSION_CURRENT, ET_DYN, Endian, FileHeader, Ident,
    NoteRecord, NoteSection, PAGE_SIZE, PF_R, PF_W, PF_X, PT_DYNAMIC, PT_INTERP, PT_LOAD,
    ProgramHeader, ProgramInterpreterSection, SHF_ALLOC, SHF_WRITE, SHT_DYNAMIC, SHT_DYNSYM,
    SHT_NOTE, SHT_NULL, SHT_PROGBITS, SHT_STRTAB, SHN_UNDEF, STT_OBJECT, SectionHeader,
    SymbolTableEntry, encode_dynamic_entries, encode_file_header, encode_note_section,
    encode_program_header, encode_program_interpreter, encode_section_header, encode_symbol,
};

pub const INTERP_PATH: &str = "/lib64/ld-linux-x86-64.so.2";
pub const NEEDED_LIBRARY: &str = "libc.so.6";

const PHT_OFFSET: u64 = 0x40;
const INTERP_OFFSET: u64 = 0x100;
const NOTE_OFFSET: u64 = 0x120;
const DYNSYM_OFFSET: u64 = 0x140;
const DYNSTR_OFFSET: u64 = 0x180;
const DYNAMIC_OFFSET: u64 = 0x200;
const GOT_PLT_OFFSET: u64 = 0x270;
const SHSTRTAB_OFFSET: u64 = 0x290;
const SHT_OFFSET: u64 = 0x300;
const FILE_SIZE: usize = 0x500;

/// Index of `.dynamic` in the fixture's section header table.
pub const DYNAMIC_SECTION_INDEX: usize = 5;

/// Build a shared object with an interpreter, one note, a GOT.PLT whose
/// first slot holds the dynamic section address, one needed library
/// and, optionally, a run path.
pub fn build_shared_object(run_path: Option<&str>) -> Vec<u8> {
    let class = Class::Elf64;
    let endian = Endian::Little;
    let mut bytes = vec![0_u8; FILE_SIZE];

    // Dynamic string table: \0libc.so.6\0[run_path\0]
    let mut dynstr = vec![0_u8];
    dynstr.extend_from_slice(NEEDED_LIBRARY.as_bytes());
    dynstr.push(0);
    let run_path_index = dynstr.len() as u64;
    if let Some(rp) = run_path {
        dynstr.extend_from_slice(rp.as_bytes());
        dynstr.push(0);
    }
    assert!(DYNSTR_OFFSET as usize + dynstr.len() <= DYNAMIC_OFFSET as usize);

    let mut entries = vec![
        DynamicStruct::new(DT_NEEDED, 1),
        DynamicStruct::new(DT_STRTAB, DYNSTR_OFFSET),
        DynamicStruct::new(DT_SYMTAB, DYNSYM_OFFSET),
        DynamicStruct::new(DT_STRSZ, dynstr.len() as u64),
    ];
    if run_path.is_some() {
        entries.push(DynamicStruct::new(DT_RUNPATH, run_path_index));
    }
    entries.push(DynamicStruct::new(DT_NULL, 0));
    let dynamic_size = (entries.len() * class.dynamic_entry_len()) as u64;

    let interpreter = ProgramInterpreterSection {
        path: String::from(INTERP_PATH),
    };
    let note = NoteSection {
        records: vec![NoteRecord {
            note_type: 3,
            name: String::from("GNU"),
            descriptor: vec![0xAB; 8],
        }],
    };
    let symbols = [
        SymbolTableEntry {
            name_index: 0,
            value: 0,
            size: 0,
            info: 0,
            other: 0,
            shndx: SHN_UNDEF,
        },
        // _DYNAMIC marker.
        SymbolTableEntry {
            name_index: 0,
            value: DYNAMIC_OFFSET,
            size: 0,
            info: STT_OBJECT,
            other: 0,
            shndx: DYNAMIC_SECTION_INDEX as u16,
        },
    ];

    let file_header = FileHeader {
        ident: Ident {
            magic: ELF_MAGIC,
            class: ELF_CLASS_64,
            data: ELF_DATA_LSB,
            version: ELF_VERSION_CURRENT,
            os_abi: 0,
            abi_version: 0,
        },
        e_type: ET_DYN,
        machine: 62, // EM_X86_64
        version: 1,
        entry: 0,
        phoff: PHT_OFFSET,
        shoff: SHT_OFFSET,
        flags: 0,
        ehsize: class.file_header_len() as u16,
        phentsize: class.program_header_len() as u16,
        phnum: 3,
        shentsize: class.section_header_len() as u16,
        shnum: 8,
        shstrndx: 7,
    };
    encode_file_header(&mut bytes, &file_header);

    let program_headers = [
        ProgramHeader {
            p_type: PT_LOAD,
            flags: PF_R | PF_W | PF_X,
            offset: 0,
            vaddr: 0,
            paddr: 0,
            filesz: FILE_SIZE as u64,
            memsz: FILE_SIZE as u64,
            align: PAGE_SIZE,
        },
        ProgramHeader {
            p_type: PT_INTERP,
            flags: PF_R,
            offset: INTERP_OFFSET,
            vaddr: INTERP_OFFSET,
            paddr: INTERP_OFFSET,
            filesz: interpreter.byte_count() as u64,
            memsz: interpreter.byte_count() as u64,
            align: 1,
        },
        ProgramHeader {
            p_type: PT_DYNAMIC,
            flags: PF_R | PF_W,
            offset: DYNAMIC_OFFSET,
            vaddr: DYNAMIC_OFFSET,
            paddr: DYNAMIC_OFFSET,
            filesz: dynamic_size,
            memsz: dynamic_size,
            align: 8,
        },
    ];
    for (i, header) in program_headers.iter().enumerate() {
        let at = PHT_OFFSET as usize + i * class.program_header_len();
        encode_program_header(&mut bytes[at..], header, class, endian);
    }

    encode_program_interpreter(&mut bytes[INTERP_OFFSET as usize..], &interpreter);
    encode_note_section(&mut bytes[NOTE_OFFSET as usize..], &note, endian);
    for (i, symbol) in symbols.iter().enumerate() {
        let at = DYNSYM_OFFSET as usize + i * class.symbol_len();
        encode_symbol(&mut bytes[at..], symbol, class, endian);
    }
    bytes[DYNSTR_OFFSET as usize..DYNSTR_OFFSET as usize + dynstr.len()]
        .copy_from_slice(&dynstr);
    encode_dynamic_entries(&mut bytes[DYNAMIC_OFFSET as usize..], &entries, class, endian);

    // GOT.PLT: slot 0 points at the dynamic section.
    Endian::Little.write_u64(&mut bytes[GOT_PLT_OFFSET as usize..], DYNAMIC_OFFSET);

    let shstrtab =
        b"\0.interp\0.note.gnu.build-id\0.dynsym\0.dynstr\0.dynamic\0.got.plt\0.shstrtab\0";
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
            sh_type: SHT_PROGBITS,
            flags: SHF_ALLOC,
            addr: INTERP_OFFSET,
            offset: INTERP_OFFSET,
            size: interpreter.byte_count() as u64,
            addralign: 1,
            ..blank(1)
        },
        SectionHeader {
            sh_type: SHT_NOTE,
            flags: SHF_ALLOC,
            addr: NOTE_OFFSET,
            offset: NOTE_OFFSET,
            size: note.byte_count() as u64,
            addralign: 4,
            ..blank(9)
        },
        SectionHeader {
            sh_type: SHT_DYNSYM,
            flags: SHF_ALLOC,
            addr: DYNSYM_OFFSET,
            offset: DYNSYM_OFFSET,
            size: (symbols.len() * class.symbol_len()) as u64,
            link: 4,
            info: 1,
            addralign: 8,
            entsize: class.symbol_len() as u64,
            ..blank(28)
        },
        SectionHeader {
            sh_type: SHT_STRTAB,
            flags: SHF_ALLOC,
            addr: DYNSTR_OFFSET,
            offset: DYNSTR_OFFSET,
            size: dynstr.len() as u64,
            addralign: 1,
            ..blank(36)
        },
        SectionHeader {
            sh_type: SHT_DYNAMIC,
            flags: SHF_ALLOC | SHF_WRITE,
            addr: DYNAMIC_OFFSET,
            offset: DYNAMIC_OFFSET,
            size: dynamic_size,
            link: 4,
            addralign: 8,
            entsize: class.dynamic_entry_len() as u64,
            ..blank(44)
        },
        SectionHeader {
            sh_type: SHT_PROGBITS,
            flags: SHF_ALLOC | SHF_WRITE,
            addr: GOT_PLT_OFFSET,
            offset: GOT_PLT_OFFSET,
            size: 24,
            addralign: 8,
            entsize: 8,
            ..blank(53)
        },
        SectionHeader {
            sh_type: SHT_STRTAB,
            offset: SHSTRTAB_OFFSET,
            size: shstrtab.len() as u64,
            addralign: 1,
            ..blank(62)
        },
    ];
    for (i, header) in section_headers.iter().enumerate() {
        let at = SHT_OFFSET as usize + i * class.section_header_len();
        encode_section_header(&mut bytes[at..], header, class, endian);
    }

    bytes
}
