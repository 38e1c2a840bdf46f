//! The `disasm` command - print a compiled program.

use crate::cli::DisasmArgs;
use crate::common::CliResult;
use crate::common::input::read_program;

pub fn run(args: DisasmArgs) -> CliResult<()> {
    let program = read_program(&args.artifact)?;
    print!("{}", program);
    Ok(())
}
