//! The `run` command - execute a compiled program.

use quill::{Engine, EngineOptions, VmOptionsOverride, stdlib};

use crate::cli::RunArgs;
use crate::common::CliResult;
use crate::common::input::read_program;

/// Runs the entry code, then prints everything the script printed followed
/// by its result.
pub fn run(args: RunArgs) -> CliResult<()> {
    let program = read_program(&args.artifact)?;
    let engine = Engine::new(EngineOptions::default(), stdlib::registry());
    let overrides = VmOptionsOverride {
        max_call_depth: args.max_call_depth,
        gc_min_threshold: args.gc_threshold,
        ..Default::default()
    };
    let mut vm = engine.instantiate_with(program, &overrides)?;

    let result = vm.run_entry();
    for line in vm.take_output() {
        println!("{}", line);
    }
    let value = result?;
    println!("{}", vm.format_value(value));

    tracing::debug!(
        live = vm.heap().live(),
        collections = vm.heap().collections(),
        "run finished"
    );
    Ok(())
}
