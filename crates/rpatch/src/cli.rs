//! CLI definitions and argument types.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Exit code for success.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code for failure.
pub const EXIT_FAILURE: i32 = 1;

#[derive(Parser)]
#[command(name = "rpatch")]
#[command(about = "Inspect and rewrite the run-time search path of ELF binaries")]
#[command(version)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress output (only show errors)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub silent: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print SONAME, needed libraries and run path of a file
    Show {
        /// ELF executable or shared library
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Set or replace the run path (DT_RUNPATH)
    SetRunpath {
        /// ELF executable or shared library
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Colon-separated search path list; $ORIGIN is accepted
        #[arg(value_name = "PATHS")]
        paths: String,
    },
    /// Remove the run path entry and its string
    RemoveRunpath {
        /// ELF executable or shared library
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Set or replace the SONAME (shared libraries)
    SetSoname {
        /// ELF shared library
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// New SONAME
        #[arg(value_name = "NAME")]
        name: String,
    },
}
