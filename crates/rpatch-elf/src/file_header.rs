//! The ELF file header.

use crate::constants::*;
use crate::ident::{Ident, encode_ident, extract_ident};
use crate::word::{Class, Endian};

/// Object file type, decoded from `e_type`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectType {
    None,
    RelocatableFile,
    ExecutableFile,
    SharedObject,
    CoreFile,
    Unknown(u16),
}

/// Decoded file header. Word-width fields are widened to `u64`; the
/// class recorded in `ident` narrows them again on encode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileHeader {
    pub ident: Ident,
    pub e_type: u16,
    pub machine: u16,
    pub version: u32,
    pub entry: u64,
    pub phoff: u64,
    pub shoff: u64,
    pub flags: u32,
    pub ehsize: u16,
    pub phentsize: u16,
    pub phnum: u16,
    pub shentsize: u16,
    pub shnum: u16,
    pub shstrndx: u16,
}

impl FileHeader {
    pub fn object_type(&self) -> ObjectType {
        match self.e_type {
            ET_NONE => ObjectType::None,
            ET_REL => ObjectType::RelocatableFile,
            ET_EXEC => ObjectType::ExecutableFile,
            ET_DYN => ObjectType::SharedObject,
            ET_CORE => ObjectType::CoreFile,
            other => ObjectType::Unknown(other),
        }
    }

    /// A machine of 0 (`EM_NONE`) is not a real target; any nonzero
    /// value is accepted so exotic architectures degrade gracefully.
    pub fn seems_valid(&self) -> bool {
        self.ident.seems_valid()
            && !matches!(self.object_type(), ObjectType::None | ObjectType::Unknown(_))
            && self.machine != 0
            && self.version == u32::from(ELF_VERSION_CURRENT)
    }

    pub fn is_executable_or_shared_library(&self) -> bool {
        self.seems_valid()
            && matches!(
                self.object_type(),
                ObjectType::ExecutableFile | ObjectType::SharedObject
            )
    }

    /// File size needed to hold the whole program header table.
    pub fn minimum_size_to_read_all_program_headers(&self) -> u64 {
        self.phoff + u64::from(self.phnum) * u64::from(self.phentsize)
    }

    /// File size needed to hold the whole section header table.
    pub fn minimum_size_to_read_all_section_headers(&self) -> u64 {
        self.shoff + u64::from(self.shnum) * u64::from(self.shentsize)
    }
}

/// Decode the file header. `bytes` must hold at least the per-class
/// header length and the identification block must be valid.
pub fn extract_file_header(bytes: &[u8]) -> FileHeader {
    let ident = extract_ident(bytes);
    let class = ident.class().expect("valid identification block");
    let endian = ident.endian().expect("valid identification block");
    assert!(bytes.len() >= class.file_header_len());

    let word_len = class.word_len();
    let e_type = endian.read_u16(&bytes[16..]);
    let machine = endian.read_u16(&bytes[18..]);
    let version = endian.read_u32(&bytes[20..]);
    let entry = endian.read_nword(&bytes[24..], class);
    let phoff = endian.read_nword(&bytes[24 + word_len..], class);
    let shoff = endian.read_nword(&bytes[24 + 2 * word_len..], class);
    let rest = 24 + 3 * word_len;

    FileHeader {
        ident,
        e_type,
        machine,
        version,
        entry,
        phoff,
        shoff,
        flags: endian.read_u32(&bytes[rest..]),
        ehsize: endian.read_u16(&bytes[rest + 4..]),
        phentsize: endian.read_u16(&bytes[rest + 6..]),
        phnum: endian.read_u16(&bytes[rest + 8..]),
        shentsize: endian.read_u16(&bytes[rest + 10..]),
        shnum: endian.read_u16(&bytes[rest + 12..]),
        shstrndx: endian.read_u16(&bytes[rest + 14..]),
    }
}

/// Encode the file header at the start of `buf`.
pub fn encode_file_header(buf: &mut [u8], header: &FileHeader) {
    let class = header.ident.class().expect("valid identification block");
    let endian = header.ident.endian().expect("valid identification block");
    assert!(buf.len() >= class.file_header_len());

    encode_ident(buf, &header.ident);
    let word_len = class.word_len();
    endian.write_u16(&mut buf[16..], header.e_type);
    endian.write_u16(&mut buf[18..], header.machine);
    endian.write_u32(&mut buf[20..], header.version);
    endian.write_nword(&mut buf[24..], class, header.entry);
    endian.write_nword(&mut buf[24 + word_len..], class, header.phoff);
    endian.write_nword(&mut buf[24 + 2 * word_len..], class, header.shoff);
    let rest = 24 + 3 * word_len;
    endian.write_u32(&mut buf[rest..], header.flags);
    endian.write_u16(&mut buf[rest + 4..], header.ehsize);
    endian.write_u16(&mut buf[rest + 6..], header.phentsize);
    endian.write_u16(&mut buf[rest + 8..], header.phnum);
    endian.write_u16(&mut buf[rest + 10..], header.shentsize);
    endian.write_u16(&mut buf[rest + 12..], header.shnum);
    endian.write_u16(&mut buf[rest + 14..], header.shstrndx);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(class: Class, endian: Endian) -> FileHeader {
        FileHeader {
            ident: Ident {
                magic: ELF_MAGIC,
                class: class.byte(),
                data: endian.byte(),
                version: ELF_VERSION_CURRENT,
                os_abi: 0,
                abi_version: 0,
            },
            e_type: ET_DYN,
            machine: 62, // EM_X86_64
            version: 1,
            entry: 0x1040,
            phoff: u64::from(class.file_header_len() as u32),
            shoff: 0x3000,
            flags: 0,
            ehsize: class.file_header_len() as u16,
            phentsize: class.program_header_len() as u16,
            phnum: 4,
            shentsize: class.section_header_len() as u16,
            shnum: 10,
            shstrndx: 9,
        }
    }

    #[test]
    fn test_round_trip_all_contexts() {
        for class in [Class::Elf32, Class::Elf64] {
            for endian in [Endian::Little, Endian::Big] {
                let expected = header(class, endian);
                let mut buf = vec![0_u8; class.file_header_len()];
                encode_file_header(&mut buf, &expected);
                assert_eq!(extract_file_header(&buf), expected);
            }
        }
    }

    #[test]
    fn test_fixed_field_positions_elf64() {
        let h = header(Class::Elf64, Endian::Little);
        let mut buf = vec![0_u8; 64];
        encode_file_header(&mut buf, &h);
        // e_shstrndx sits in the last two bytes of a 64-byte header.
        assert_eq!(Endian::Little.read_u16(&buf[62..]), 9);
        // e_phnum at offset 56.
        assert_eq!(Endian::Little.read_u16(&buf[56..]), 4);
    }

    #[test]
    fn test_seems_valid_rejects_unknown_type() {
        let mut h = header(Class::Elf64, Endian::Little);
        assert!(h.seems_valid());
        assert!(h.is_executable_or_shared_library());

        h.e_type = 0x1234;
        assert_eq!(h.object_type(), ObjectType::Unknown(0x1234));
        assert!(!h.seems_valid());

        let mut relocatable = header(Class::Elf32, Endian::Big);
        relocatable.e_type = ET_REL;
        assert!(relocatable.seems_valid());
        assert!(!relocatable.is_executable_or_shared_library());
    }

    #[test]
    fn test_minimum_table_sizes() {
        let h = header(Class::Elf64, Endian::Little);
        assert_eq!(h.minimum_size_to_read_all_program_headers(), 64 + 4 * 56);
        assert_eq!(h.minimum_size_to_read_all_section_headers(), 0x3000 + 10 * 64);
    }
}
