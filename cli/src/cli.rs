//! Command-line interface definitions.
//!
//! This module contains only clap struct definitions - no business logic.
//! All command implementations are in the `commands` module.

use clap::{Args, Parser, Subcommand};

/// Quill - run and inspect compiled Quill programs
#[derive(Parser, Debug)]
#[command(name = "quill", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Log compiler and VM activity to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a compiled program
    Run(RunArgs),

    /// Print the bytecode of a compiled program
    Disasm(DisasmArgs),
}

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Compiled program to run (use "-" for stdin)
    pub artifact: String,

    /// Nested calls allowed before a stack overflow
    #[arg(long)]
    pub max_call_depth: Option<usize>,

    /// Lower bound of the garbage collection threshold
    #[arg(long)]
    pub gc_threshold: Option<usize>,
}

/// Arguments for the `disasm` command.
#[derive(Args, Debug)]
pub struct DisasmArgs {
    /// Compiled program to disassemble (use "-" for stdin)
    pub artifact: String,
}
