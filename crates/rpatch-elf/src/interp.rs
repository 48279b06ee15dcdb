//! The program interpreter (`.interp`) section.

use crate::NotNullTerminatedStringError;
use crate::string_table::read_null_terminated;

/// The null-terminated dynamic loader path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgramInterpreterSection {
    pub path: String,
}

impl ProgramInterpreterSection {
    /// On-disk size including the terminator.
    pub fn byte_count(&self) -> usize {
        self.path.len() + 1
    }
}

/// Decode the interpreter path from the exact section content.
pub fn extract_program_interpreter(
    section_bytes: &[u8],
) -> Result<ProgramInterpreterSection, NotNullTerminatedStringError> {
    let raw = read_null_terminated(section_bytes)?;
    Ok(ProgramInterpreterSection {
        path: String::from_utf8_lossy(raw).into_owned(),
    })
}

/// Encode the interpreter path into `buf`.
pub fn encode_program_interpreter(buf: &mut [u8], section: &ProgramInterpreterSection) {
    assert!(buf.len() >= section.byte_count());

    buf[..section.path.len()].copy_from_slice(section.path.as_bytes());
    buf[section.path.len()] = 0;
}
