//! Byte-count snapshot of the dynamic section and its string table,
//! taken before an edit so the write pipeline can ask how much each
//! structure grew or shrank.

use crate::dynamic::DynamicSection;
use crate::word::Class;

/// Snapshot plus pure signed-delta queries. Holds no reference to the
/// section; deltas are computed against whatever section is passed in,
/// which must have the same class the snapshot was taken with.
#[derive(Clone, Copy, Debug)]
pub struct FileOffsetChanges {
    original_dynamic_section_byte_count: usize,
    original_string_table_byte_count: usize,
    class: Class,
}

impl FileOffsetChanges {
    /// Capture the current byte counts of `section`.
    pub fn set_original_sizes(section: &DynamicSection, class: Class) -> Self {
        Self {
            original_dynamic_section_byte_count: section.byte_count(class),
            original_string_table_byte_count: section.string_table().byte_count(),
            class,
        }
    }

    pub fn class(&self) -> Class {
        self.class
    }

    /// Signed growth of the dynamic section entry array.
    pub fn dynamic_section_changes_offset(&self, section: &DynamicSection) -> i64 {
        section.byte_count(self.class) as i64 - self.original_dynamic_section_byte_count as i64
    }

    /// Signed growth of the dynamic string table.
    pub fn dynamic_string_table_changes_offset(&self, section: &DynamicSection) -> i64 {
        section.string_table().byte_count() as i64 - self.original_string_table_byte_count as i64
    }

    /// Combined growth of both structures.
    pub fn global_changes_offset(&self, section: &DynamicSection) -> i64 {
        self.dynamic_section_changes_offset(section)
            + self.dynamic_string_table_changes_offset(section)
    }
}
