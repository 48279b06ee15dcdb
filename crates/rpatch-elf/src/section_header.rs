//! Section header codec.

use crate::ExecutableFileReadError;
use crate::constants::*;
use crate::file_header::FileHeader;
use crate::string_table::read_null_terminated;
use crate::word::{Class, Endian};

/// Section type, decoded from `sh_type`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SectionType {
    Null,
    ProgramData,
    SymbolTable,
    StringTable,
    Rela,
    Hash,
    Dynamic,
    Note,
    NoBits,
    Rel,
    DynSym,
    InitArray,
    FiniArray,
    GnuHash,
    Unknown(u32),
}

/// One section descriptor.
///
/// `name` is resolved from the section-name string table in a second
/// pass over the table; until then it is empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SectionHeader {
    pub name_index: u32,
    pub name: String,
    pub sh_type: u32,
    pub flags: u64,
    pub addr: u64,
    pub offset: u64,
    pub size: u64,
    pub link: u32,
    pub info: u32,
    pub addralign: u64,
    pub entsize: u64,
}

impl SectionHeader {
    pub fn section_type(&self) -> SectionType {
        match self.sh_type {
            SHT_NULL => SectionType::Null,
            SHT_PROGBITS => SectionType::ProgramData,
            SHT_SYMTAB => SectionType::SymbolTable,
            SHT_STRTAB => SectionType::StringTable,
            SHT_RELA => SectionType::Rela,
            SHT_HASH => SectionType::Hash,
            SHT_DYNAMIC => SectionType::Dynamic,
            SHT_NOTE => SectionType::Note,
            SHT_NOBITS => SectionType::NoBits,
            SHT_REL => SectionType::Rel,
            SHT_DYNSYM => SectionType::DynSym,
            SHT_INIT_ARRAY => SectionType::InitArray,
            SHT_FINI_ARRAY => SectionType::FiniArray,
            SHT_GNU_HASH => SectionType::GnuHash,
            other => SectionType::Unknown(other),
        }
    }

    /// File size needed to hold the section content.
    pub fn minimum_size_to_read(&self) -> u64 {
        self.offset + self.size
    }

    /// File offset of the last byte of the section; an empty section
    /// reports its own offset.
    pub fn last_address(&self) -> u64 {
        if self.size <= 1 {
            self.offset
        } else {
            self.offset + self.size - 1
        }
    }
}

/// Decode one entry at the start of `bytes`. The name is left empty.
pub fn extract_section_header(bytes: &[u8], class: Class, endian: Endian) -> SectionHeader {
    assert!(bytes.len() >= class.section_header_len());

    let word_len = class.word_len();
    let name_index = endian.read_u32(bytes);
    let sh_type = endian.read_u32(&bytes[4..]);
    let flags = endian.read_nword(&bytes[8..], class);
    let addr = endian.read_nword(&bytes[8 + word_len..], class);
    let offset = endian.read_nword(&bytes[8 + 2 * word_len..], class);
    let size = endian.read_nword(&bytes[8 + 3 * word_len..], class);
    let rest = 8 + 4 * word_len;
    let link = endian.read_u32(&bytes[rest..]);
    let info = endian.read_u32(&bytes[rest + 4..]);
    let addralign = endian.read_nword(&bytes[rest + 8..], class);
    let entsize = endian.read_nword(&bytes[rest + 8 + word_len..], class);

    SectionHeader {
        name_index,
        name: String::new(),
        sh_type,
        flags,
        addr,
        offset,
        size,
        link,
        info,
        addralign,
        entsize,
    }
}

/// Encode one entry at the start of `buf`.
pub fn encode_section_header(buf: &mut [u8], header: &SectionHeader, class: Class, endian: Endian) {
    assert!(buf.len() >= class.section_header_len());

    let word_len = class.word_len();
    endian.write_u32(buf, header.name_index);
    endian.write_u32(&mut buf[4..], header.sh_type);
    endian.write_nword(&mut buf[8..], class, header.flags);
    endian.write_nword(&mut buf[8 + word_len..], class, header.addr);
    endian.write_nword(&mut buf[8 + 2 * word_len..], class, header.offset);
    endian.write_nword(&mut buf[8 + 3 * word_len..], class, header.size);
    let rest = 8 + 4 * word_len;
    endian.write_u32(&mut buf[rest..], header.link);
    endian.write_u32(&mut buf[rest + 4..], header.info);
    endian.write_nword(&mut buf[rest + 8..], class, header.addralign);
    endian.write_nword(&mut buf[rest + 8 + word_len..], class, header.entsize);
}

/// Decode the whole section header table described by the file header,
/// resolving names through the section-name string table at `shstrndx`.
///
/// The name pass runs second because the string table section must
/// itself be located through the decoded table first. Sections whose
/// name index falls outside the string table keep an empty name.
pub fn extract_all_section_headers(
    bytes: &[u8],
    file_header: &FileHeader,
) -> Result<Vec<SectionHeader>, ExecutableFileReadError> {
    let class = file_header.ident.class().expect("valid file header");
    let endian = file_header.ident.endian().expect("valid file header");

    if (bytes.len() as u64) < file_header.minimum_size_to_read_all_section_headers() {
        return Err(ExecutableFileReadError::UndersizedForSectionHeaders {
            actual: bytes.len(),
            count: file_header.shnum,
            offset: file_header.shoff,
        });
    }

    let mut headers = Vec::with_capacity(usize::from(file_header.shnum));
    for i in 0..usize::from(file_header.shnum) {
        let offset = file_header.shoff as usize + i * usize::from(file_header.shentsize);
        headers.push(extract_section_header(&bytes[offset..], class, endian));
    }

    resolve_section_names(bytes, &mut headers, file_header)?;
    Ok(headers)
}

fn resolve_section_names(
    bytes: &[u8],
    headers: &mut [SectionHeader],
    file_header: &FileHeader,
) -> Result<(), ExecutableFileReadError> {
    let shstrndx = usize::from(file_header.shstrndx);
    let Some(strtab) = headers.get(shstrndx) else {
        return Ok(());
    };

    let start = strtab.offset as usize;
    let size = strtab.size as usize;
    if start + size > bytes.len() {
        return Err(ExecutableFileReadError::SectionOutOfBounds {
            name: String::from(".shstrtab"),
            offset: strtab.offset,
            size: strtab.size,
            actual: bytes.len(),
        });
    }
    let pool = &bytes[start..start + size];

    for header in headers.iter_mut() {
        let index = header.name_index as usize;
        if index >= pool.len() {
            continue;
        }
        let raw = read_null_terminated(&pool[index..])?;
        header.name = String::from_utf8_lossy(raw).into_owned();
    }
    Ok(())
}
