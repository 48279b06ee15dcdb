//! The 16-byte ELF identification block.

use crate::constants::*;
use crate::word::{Class, Endian};

/// Length of the identification block, shared by both classes.
pub const IDENT_LEN: usize = 16;

/// Decoded identification block.
///
/// Fields are kept as raw bytes; the query methods interpret them and
/// degrade unrecognized discriminants into `None` instead of failing, so
/// that a corrupted file reads as "not an ELF file" rather than aborting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ident {
    pub magic: [u8; 4],
    pub class: u8,
    pub data: u8,
    pub version: u8,
    pub os_abi: u8,
    pub abi_version: u8,
}

impl Ident {
    pub fn has_valid_magic(&self) -> bool {
        self.magic == ELF_MAGIC
    }

    pub fn class(&self) -> Option<Class> {
        Class::from_byte(self.class)
    }

    pub fn endian(&self) -> Option<Endian> {
        Endian::from_byte(self.data)
    }

    pub fn seems_valid(&self) -> bool {
        self.has_valid_magic()
            && self.class().is_some()
            && self.endian().is_some()
            && self.version == ELF_VERSION_CURRENT
    }
}

/// Decode the identification block. `bytes` must hold at least
/// [`IDENT_LEN`] bytes.
pub fn extract_ident(bytes: &[u8]) -> Ident {
    assert!(bytes.len() >= IDENT_LEN);

    Ident {
        magic: [bytes[0], bytes[1], bytes[2], bytes[3]],
        class: bytes[4],
        data: bytes[5],
        version: bytes[6],
        os_abi: bytes[7],
        abi_version: bytes[8],
    }
}

/// Encode the identification block, including its zero padding.
pub fn encode_ident(buf: &mut [u8], ident: &Ident) {
    assert!(buf.len() >= IDENT_LEN);

    buf[..4].copy_from_slice(&ident.magic);
    buf[4] = ident.class;
    buf[5] = ident.data;
    buf[6] = ident.version;
    buf[7] = ident.os_abi;
    buf[8] = ident.abi_version;
    buf[9..IDENT_LEN].fill(0);
}
