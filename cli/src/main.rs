//! Quill CLI - run and inspect compiled Quill programs.

use clap::Parser;
use quill_cli::cli::{Cli, Command};
use quill_cli::{commands, common};

fn main() {
    let cli = Cli::parse();

    // Initialize logging subscriber
    use tracing_subscriber::{EnvFilter, fmt};

    // RUST_LOG wins; otherwise WARN, or DEBUG with --verbose
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .compact()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let result = match cli.command {
        Command::Run(args) => commands::run::run(args),
        Command::Disasm(args) => commands::disasm::run(args),
    };

    if let Err(e) = result {
        common::error::render_and_exit(e, cli.no_color);
    }
}
