//! File-level façade: open, query, rewrite, close.
//!
//! The core operates on an owned byte buffer; this module realizes
//! that buffer with `std::fs`, growing it when the relocation pipeline
//! asks for more room and persisting it back on a successful edit.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::{ExecutableFileReadError, ExecutableFileWriteError, FileOpenError};
use crate::file_header::extract_file_header;
use crate::ident::{IDENT_LEN, extract_ident};
use crate::rpath::RPath;
use crate::writer::ElfEditableFile;

/// Access mode requested at open time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    ReadWrite,
}

/// One open-file session over an ELF executable or shared library.
pub struct ElfFileIo {
    path: PathBuf,
    mode: OpenMode,
    buffer: Vec<u8>,
}

impl ElfFileIo {
    /// Open `path` and load its content. In [`OpenMode::ReadWrite`] the
    /// file must also be writable.
    pub fn open(path: impl AsRef<Path>, mode: OpenMode) -> Result<Self, FileOpenError> {
        let path = path.as_ref();
        let io_error = |source| FileOpenError::Io {
            path: path.display().to_string(),
            source,
        };

        if mode == OpenMode::ReadWrite {
            // Surface a permission problem at open time, not after the
            // edit has already been computed.
            OpenOptions::new()
                .read(true)
                .write(true)
                .open(path)
                .map_err(io_error)?;
        }
        let buffer = std::fs::read(path).map_err(io_error)?;
        debug!(path = %path.display(), bytes = buffer.len(), "opened");

        Ok(Self {
            path: path.to_path_buf(),
            mode,
            buffer,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the content looks like an ELF executable or shared
    /// library. Never fails: anything unrecognizable answers `false`.
    pub fn is_executable_or_shared_library(&self) -> bool {
        if self.buffer.len() < IDENT_LEN {
            return false;
        }
        let ident = extract_ident(&self.buffer);
        if !ident.seems_valid() {
            return false;
        }
        let class = ident.class().expect("checked by seems_valid");
        if self.buffer.len() < class.file_header_len() {
            return false;
        }
        extract_file_header(&self.buffer).is_executable_or_shared_library()
    }

    fn editable(&self) -> Result<ElfEditableFile, ExecutableFileReadError> {
        ElfEditableFile::from_bytes(&self.buffer)
    }

    pub fn get_so_name(&self) -> Result<Option<String>, ExecutableFileReadError> {
        Ok(self.editable()?.so_name()?)
    }

    pub fn get_needed_shared_libraries(&self) -> Result<Vec<String>, ExecutableFileReadError> {
        Ok(self.editable()?.needed_shared_libraries()?)
    }

    pub fn get_run_path(&self) -> Result<RPath, ExecutableFileReadError> {
        Ok(self.editable()?.run_path()?)
    }

    /// Set or replace the run path and persist the rewritten file. An
    /// empty list removes the entry. Requires [`OpenMode::ReadWrite`].
    pub fn set_run_path(&mut self, rpath: &RPath) -> Result<(), ExecutableFileWriteError> {
        self.rewrite(|file| file.set_run_path(rpath))
    }

    /// Set or replace the SONAME and persist the rewritten file.
    pub fn set_so_name(&mut self, name: &str) -> Result<(), ExecutableFileWriteError> {
        self.rewrite(|file| file.set_so_name(name))
    }

    fn rewrite(
        &mut self,
        mutate: impl FnOnce(&mut ElfEditableFile),
    ) -> Result<(), ExecutableFileWriteError> {
        assert!(
            self.mode == OpenMode::ReadWrite,
            "file opened read-only; rewriting is a caller bug"
        );

        let mut file = ElfEditableFile::from_bytes(&self.buffer)
            .map_err(ExecutableFileWriteError::Read)?;
        mutate(&mut file);

        let required = file.minimum_size_to_write();
        let mut buffer = self.buffer.clone();
        if (buffer.len() as u64) < required {
            // The grow request of the relocation pipeline: fresh bytes
            // arrive zeroed.
            buffer.resize(required as usize, 0);
        }
        file.write_to_buffer(&mut buffer);

        std::fs::write(&self.path, &buffer).map_err(|source| ExecutableFileWriteError::Io {
            path: self.path.display().to_string(),
            source,
        })?;
        info!(path = %self.path.display(), bytes = buffer.len(), "rewrote file");
        self.buffer = buffer;
        Ok(())
    }

    /// End the session, dropping the buffer.
    pub fn close(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixture::minimal_elf64_dyn;
    use std::io::Write;

    fn write_fixture(run_path: Option<&str>) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&minimal_elf64_dyn(run_path)).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_open_missing_file_fails() {
        let err = ElfFileIo::open("/nonexistent/rpatch-test", OpenMode::ReadOnly);
        assert!(matches!(err, Err(FileOpenError::Io { .. })));
    }

    #[test]
    fn test_is_executable_or_shared_library() {
        let fixture = write_fixture(None);
        let file = ElfFileIo::open(fixture.path(), OpenMode::ReadOnly).unwrap();
        assert!(file.is_executable_or_shared_library());

        let mut other = tempfile::NamedTempFile::new().unwrap();
        other.write_all(b"#!/bin/sh\nexit 0\n").unwrap();
        other.flush().unwrap();
        let file = ElfFileIo::open(other.path(), OpenMode::ReadOnly).unwrap();
        assert!(!file.is_executable_or_shared_library());
    }

    #[test]
    fn test_read_queries() {
        let fixture = write_fixture(Some("/tmp"));
        let file = ElfFileIo::open(fixture.path(), OpenMode::ReadOnly).unwrap();

        assert_eq!(file.get_run_path().unwrap().to_string(), "/tmp");
        assert_eq!(
            file.get_needed_shared_libraries().unwrap(),
            vec![String::from("libA.so")]
        );
        assert_eq!(file.get_so_name().unwrap(), None);
    }

    #[test]
    fn test_set_run_path_persists() {
        let fixture = write_fixture(None);
        let original_len = std::fs::metadata(fixture.path()).unwrap().len();

        let mut file = ElfFileIo::open(fixture.path(), OpenMode::ReadWrite).unwrap();
        file.set_run_path(&RPath::parse("/opt/lib:/usr/lib")).unwrap();
        file.close();

        // The file on disk grew and re-reads with the new path.
        assert!(std::fs::metadata(fixture.path()).unwrap().len() > original_len);
        let reopened = ElfFileIo::open(fixture.path(), OpenMode::ReadOnly).unwrap();
        assert_eq!(reopened.get_run_path().unwrap().to_string(), "/opt/lib:/usr/lib");
        assert_eq!(
            reopened.get_needed_shared_libraries().unwrap(),
            vec![String::from("libA.so")]
        );
    }

    #[test]
    fn test_remove_run_path_via_empty_list() {
        let fixture = write_fixture(Some("/tmp"));
        let mut file = ElfFileIo::open(fixture.path(), OpenMode::ReadWrite).unwrap();
        file.set_run_path(&RPath::default()).unwrap();
        file.close();

        let reopened = ElfFileIo::open(fixture.path(), OpenMode::ReadOnly).unwrap();
        assert!(reopened.get_run_path().unwrap().is_empty());
    }

    #[test]
    #[should_panic(expected = "read-only")]
    fn test_rewrite_in_read_only_mode_is_a_caller_bug() {
        let fixture = write_fixture(None);
        let mut file = ElfFileIo::open(fixture.path(), OpenMode::ReadOnly).unwrap();
        let _ = file.set_run_path(&RPath::parse("/tmp"));
    }
}
