//! Note section codec.
//!
//! A note section is a sequence of records, each holding a 12-byte
//! header (name size, descriptor size, type), the owner name padded to
//! a 4-byte boundary, and the descriptor padded the same way.

use crate::NoteSectionReadError;
use crate::string_table::read_null_terminated;
use crate::word::Endian;

const NOTE_RECORD_HEADER_LEN: usize = 12;

fn padded(len: usize) -> usize {
    len.next_multiple_of(4)
}

/// One note record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NoteRecord {
    pub note_type: u32,
    pub name: String,
    pub descriptor: Vec<u8>,
}

impl NoteRecord {
    /// On-disk size of the record including padding.
    pub fn byte_count(&self) -> usize {
        NOTE_RECORD_HEADER_LEN + padded(self.name.len() + 1) + padded(self.descriptor.len())
    }
}

/// All records of one note section.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NoteSection {
    pub records: Vec<NoteRecord>,
}

impl NoteSection {
    pub fn byte_count(&self) -> usize {
        self.records.iter().map(NoteRecord::byte_count).sum()
    }
}

/// Decode a whole note section from its exact content slice.
pub fn extract_note_section(
    section_bytes: &[u8],
    endian: Endian,
) -> Result<NoteSection, NoteSectionReadError> {
    let size = section_bytes.len();
    let mut records = Vec::new();
    let mut offset = 0;

    while offset < size {
        if offset + NOTE_RECORD_HEADER_LEN > size {
            return Err(NoteSectionReadError::TruncatedRecord { offset, size });
        }
        let name_len = endian.read_u32(&section_bytes[offset..]) as usize;
        let desc_len = endian.read_u32(&section_bytes[offset + 4..]) as usize;
        let note_type = endian.read_u32(&section_bytes[offset + 8..]);

        let name_start = offset + NOTE_RECORD_HEADER_LEN;
        let name_end = name_start.checked_add(padded(name_len));
        let Some(name_end) = name_end.filter(|&end| end <= size) else {
            return Err(NoteSectionReadError::NameOverrun { offset, name_len });
        };
        let desc_end = name_end.checked_add(padded(desc_len));
        let Some(desc_end) = desc_end.filter(|&end| end <= size) else {
            return Err(NoteSectionReadError::DescriptorOverrun { offset, desc_len });
        };

        // The declared name length includes the terminator.
        let name = if name_len == 0 {
            String::new()
        } else {
            let raw = read_null_terminated(&section_bytes[name_start..name_start + name_len])?;
            String::from_utf8_lossy(raw).into_owned()
        };
        let descriptor = section_bytes[name_end..name_end + desc_len].to_vec();

        records.push(NoteRecord {
            note_type,
            name,
            descriptor,
        });
        offset = desc_end;
    }

    Ok(NoteSection { records })
}

/// Encode a note section into `buf`.
pub fn encode_note_section(buf: &mut [u8], section: &NoteSection, endian: Endian) {
    assert!(buf.len() >= section.byte_count());

    let mut offset = 0;
    for record in &section.records {
        let name_len = record.name.len() + 1;
        endian.write_u32(&mut buf[offset..], name_len as u32);
        endian.write_u32(&mut buf[offset + 4..], record.descriptor.len() as u32);
        endian.write_u32(&mut buf[offset + 8..], record.note_type);

        let name_start = offset + NOTE_RECORD_HEADER_LEN;
        buf[name_start..name_start + record.name.len()].copy_from_slice(record.name.as_bytes());
        buf[name_start + record.name.len()..name_start + padded(name_len)].fill(0);

        let desc_start = name_start + padded(name_len);
        buf[desc_start..desc_start + record.descriptor.len()].copy_from_slice(&record.descriptor);
        buf[desc_start + record.descriptor.len()..desc_start + padded(record.descriptor.len())]
            .fill(0);

        offset = desc_start + padded(record.descriptor.len());
    }
}
