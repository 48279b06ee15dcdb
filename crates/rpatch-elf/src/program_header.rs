//! Program (segment) header codec.

use crate::ExecutableFileReadError;
use crate::constants::*;
use crate::file_header::FileHeader;
use crate::word::{Class, Endian};

/// Segment type, decoded from `p_type`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SegmentType {
    Null,
    Load,
    Dynamic,
    Interpreter,
    Note,
    ProgramHeaderTable,
    Tls,
    GnuEhFrame,
    GnuStack,
    GnuRelro,
    Unknown(u32),
}

/// One segment descriptor. Word-width fields are widened to `u64`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProgramHeader {
    pub p_type: u32,
    pub flags: u32,
    pub offset: u64,
    pub vaddr: u64,
    pub paddr: u64,
    pub filesz: u64,
    pub memsz: u64,
    pub align: u64,
}

impl ProgramHeader {
    pub fn segment_type(&self) -> SegmentType {
        match self.p_type {
            PT_NULL => SegmentType::Null,
            PT_LOAD => SegmentType::Load,
            PT_DYNAMIC => SegmentType::Dynamic,
            PT_INTERP => SegmentType::Interpreter,
            PT_NOTE => SegmentType::Note,
            PT_PHDR => SegmentType::ProgramHeaderTable,
            PT_TLS => SegmentType::Tls,
            PT_GNU_EH_FRAME => SegmentType::GnuEhFrame,
            PT_GNU_STACK => SegmentType::GnuStack,
            PT_GNU_RELRO => SegmentType::GnuRelro,
            other => SegmentType::Unknown(other),
        }
    }

    /// One past the last file byte of the segment.
    pub fn file_offset_end(&self) -> u64 {
        self.offset + self.filesz
    }

    /// File offset of the last byte of the segment.
    ///
    /// An empty segment reports its own offset, not `offset - 1`, so
    /// that overlap comparisons against it stay well defined.
    pub fn last_address(&self) -> u64 {
        if self.filesz <= 1 {
            self.offset
        } else {
            self.offset + self.filesz - 1
        }
    }

    /// End of the segment in the virtual address space.
    pub fn virtual_end(&self) -> u64 {
        self.vaddr + self.memsz
    }
}

/// Decode one entry at the start of `bytes`.
///
/// The two classes lay fields out differently: ELF64 places `p_flags`
/// directly after `p_type`, ELF32 places it after `p_memsz`.
pub fn extract_program_header(bytes: &[u8], class: Class, endian: Endian) -> ProgramHeader {
    assert!(bytes.len() >= class.program_header_len());

    let p_type = endian.read_u32(bytes);
    match class {
        Class::Elf64 => ProgramHeader {
            p_type,
            flags: endian.read_u32(&bytes[4..]),
            offset: endian.read_u64(&bytes[8..]),
            vaddr: endian.read_u64(&bytes[16..]),
            paddr: endian.read_u64(&bytes[24..]),
            filesz: endian.read_u64(&bytes[32..]),
            memsz: endian.read_u64(&bytes[40..]),
            align: endian.read_u64(&bytes[48..]),
        },
        Class::Elf32 => ProgramHeader {
            p_type,
            offset: u64::from(endian.read_u32(&bytes[4..])),
            vaddr: u64::from(endian.read_u32(&bytes[8..])),
            paddr: u64::from(endian.read_u32(&bytes[12..])),
            filesz: u64::from(endian.read_u32(&bytes[16..])),
            memsz: u64::from(endian.read_u32(&bytes[20..])),
            flags: endian.read_u32(&bytes[24..]),
            align: u64::from(endian.read_u32(&bytes[28..])),
        },
    }
}

/// Encode one entry at the start of `buf`.
pub fn encode_program_header(buf: &mut [u8], header: &ProgramHeader, class: Class, endian: Endian) {
    assert!(buf.len() >= class.program_header_len());

    endian.write_u32(buf, header.p_type);
    match class {
        Class::Elf64 => {
            endian.write_u32(&mut buf[4..], header.flags);
            endian.write_u64(&mut buf[8..], header.offset);
            endian.write_u64(&mut buf[16..], header.vaddr);
            endian.write_u64(&mut buf[24..], header.paddr);
            endian.write_u64(&mut buf[32..], header.filesz);
            endian.write_u64(&mut buf[40..], header.memsz);
            endian.write_u64(&mut buf[48..], header.align);
        }
        Class::Elf32 => {
            endian.write_nword(&mut buf[4..], class, header.offset);
            endian.write_nword(&mut buf[8..], class, header.vaddr);
            endian.write_nword(&mut buf[12..], class, header.paddr);
            endian.write_nword(&mut buf[16..], class, header.filesz);
            endian.write_nword(&mut buf[20..], class, header.memsz);
            endian.write_u32(&mut buf[24..], header.flags);
            endian.write_nword(&mut buf[28..], class, header.align);
        }
    }
}

/// Decode the whole program header table described by the file header.
pub fn extract_all_program_headers(
    bytes: &[u8],
    file_header: &FileHeader,
) -> Result<Vec<ProgramHeader>, ExecutableFileReadError> {
    let class = file_header.ident.class().expect("valid file header");
    let endian = file_header.ident.endian().expect("valid file header");

    if (bytes.len() as u64) < file_header.minimum_size_to_read_all_program_headers() {
        return Err(ExecutableFileReadError::UndersizedForProgramHeaders {
            actual: bytes.len(),
            count: file_header.phnum,
            offset: file_header.phoff,
        });
    }

    let mut headers = Vec::with_capacity(usize::from(file_header.phnum));
    for i in 0..usize::from(file_header.phnum) {
        let offset = file_header.phoff as usize + i * usize::from(file_header.phentsize);
        headers.push(extract_program_header(&bytes[offset..], class, endian));
    }

    Ok(headers)
}
