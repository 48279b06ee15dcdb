//! rpatch CLI - inspect and rewrite ELF run-time search paths.

mod cli;
mod commands;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Cli;

fn main() {
    let cli = Cli::parse();

    let level = if cli.silent {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    let mut filter = EnvFilter::from_default_env();
    for krate in ["rpatch", "rpatch_elf"] {
        filter = filter.add_directive(
            format!("{krate}={level}").parse().expect("static directive"),
        );
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let exit_code = commands::run_command(&cli);
    std::process::exit(exit_code);
}
