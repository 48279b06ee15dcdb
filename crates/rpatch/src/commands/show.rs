//! The `show` command.

use std::path::Path;

use rpatch_elf::{ElfFileIo, OpenMode};
use tracing::error;

use crate::cli::{EXIT_FAILURE, EXIT_SUCCESS};

/// Print the dynamic-linking metadata of a file.
pub fn cmd_show(path: &Path) -> i32 {
    let file = match ElfFileIo::open(path, OpenMode::ReadOnly) {
        Ok(file) => file,
        Err(e) => {
            error!(error = %e, "cannot open file");
            return EXIT_FAILURE;
        }
    };
    if !file.is_executable_or_shared_library() {
        error!(path = %path.display(), "not an ELF executable or shared library");
        return EXIT_FAILURE;
    }

    let so_name = file.get_so_name();
    let needed = file.get_needed_shared_libraries();
    let run_path = file.get_run_path();
    let (so_name, needed, run_path) = match (so_name, needed, run_path) {
        (Ok(so_name), Ok(needed), Ok(run_path)) => (so_name, needed, run_path),
        (Err(e), ..) | (_, Err(e), _) | (.., Err(e)) => {
            error!(error = %e, "cannot read dynamic section");
            return EXIT_FAILURE;
        }
    };

    if let Some(so_name) = so_name {
        println!("SONAME:  {so_name}");
    }
    println!("RUNPATH: {run_path}");
    for library in needed {
        println!("NEEDED:  {library}");
    }
    EXIT_SUCCESS
}
