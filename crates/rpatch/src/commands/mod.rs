//! Command implementations.

mod runpath;
mod show;

use crate::cli::{Cli, Commands};

/// Dispatch CLI command to the appropriate handler.
pub fn run_command(cli: &Cli) -> i32 {
    match &cli.command {
        Commands::Show { file } => show::cmd_show(file),
        Commands::SetRunpath { file, paths } => runpath::cmd_set_runpath(file, paths),
        Commands::RemoveRunpath { file } => runpath::cmd_remove_runpath(file),
        Commands::SetSoname { file, name } => runpath::cmd_set_soname(file, name),
    }
}
