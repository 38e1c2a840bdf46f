//! Command implementations.
//!
//! Each subcommand has its own module with a `run` function.

pub mod disasm;
pub mod run;
