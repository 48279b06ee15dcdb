//! The mutating commands: set-runpath, remove-runpath, set-soname.

use std::path::Path;

use rpatch_elf::{ElfFileIo, OpenMode, RPath};
use tracing::{error, info};

use crate::cli::{EXIT_FAILURE, EXIT_SUCCESS};

fn open_for_edit(path: &Path) -> Option<ElfFileIo> {
    let file = match ElfFileIo::open(path, OpenMode::ReadWrite) {
        Ok(file) => file,
        Err(e) => {
            error!(error = %e, "cannot open file");
            return None;
        }
    };
    if !file.is_executable_or_shared_library() {
        error!(path = %path.display(), "not an ELF executable or shared library");
        return None;
    }
    Some(file)
}

/// Handle the `set-runpath` command.
pub fn cmd_set_runpath(path: &Path, paths: &str) -> i32 {
    let Some(mut file) = open_for_edit(path) else {
        return EXIT_FAILURE;
    };

    let rpath = RPath::parse(paths);
    match file.set_run_path(&rpath) {
        Ok(()) => {
            info!(path = %path.display(), runpath = %rpath, "run path updated");
            EXIT_SUCCESS
        }
        Err(e) => {
            error!(error = %e, "failed to set run path");
            EXIT_FAILURE
        }
    }
}

/// Handle the `remove-runpath` command.
pub fn cmd_remove_runpath(path: &Path) -> i32 {
    let Some(mut file) = open_for_edit(path) else {
        return EXIT_FAILURE;
    };

    match file.set_run_path(&RPath::default()) {
        Ok(()) => {
            info!(path = %path.display(), "run path removed");
            EXIT_SUCCESS
        }
        Err(e) => {
            error!(error = %e, "failed to remove run path");
            EXIT_FAILURE
        }
    }
}

/// Handle the `set-soname` command.
pub fn cmd_set_soname(path: &Path, name: &str) -> i32 {
    if name.is_empty() {
        error!("SONAME must not be empty");
        return EXIT_FAILURE;
    }
    let Some(mut file) = open_for_edit(path) else {
        return EXIT_FAILURE;
    };

    match file.set_so_name(name) {
        Ok(()) => {
            info!(path = %path.display(), soname = name, "SONAME updated");
            EXIT_SUCCESS
        }
        Err(e) => {
            error!(error = %e, "failed to set SONAME");
            EXIT_FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_fails() {
        let path = Path::new("/nonexistent/rpatch-test");
        assert_eq!(cmd_set_runpath(path, "/tmp"), EXIT_FAILURE);
        assert_eq!(cmd_remove_runpath(path), EXIT_FAILURE);
        assert_eq!(cmd_set_soname(path, "lib.so"), EXIT_FAILURE);
    }

    #[test]
    fn test_non_elf_file_fails() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not an elf").unwrap();
        file.flush().unwrap();
        assert_eq!(cmd_set_runpath(file.path(), "/tmp"), EXIT_FAILURE);
    }

    #[test]
    fn test_empty_soname_is_rejected() {
        assert_eq!(cmd_set_soname(Path::new("unused"), ""), EXIT_FAILURE);
    }
}
