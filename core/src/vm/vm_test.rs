use pretty_assertions::assert_eq;
use quill_values::Value;

use super::*;
use crate::api::VmOptions;
use crate::bytecode::{
    BinaryOpcode, Constant, FunctionEntry, Instruction, NativeImport, Op, Program, Reg,
};
use crate::test_utils::init_test_logging;

fn program(code: Vec<Op>) -> Program {
    Program {
        code,
        constants: Vec::new(),
        static_objects: Vec::new(),
        functions: Vec::new(),
        natives: Vec::new(),
        labels: Vec::new(),
        trace: Vec::new(),
        statics: 0,
        entry: 0,
    }
}

fn function(name: &str, address: u32, arity: u16) -> FunctionEntry {
    FunctionEntry {
        name: name.to_owned(),
        address,
        arity,
    }
}

fn run(program: Program) -> (VMState, Result<Value, Exception>) {
    init_test_logging();
    let mut vm = VMState::new(program, NativeRegistry::new(), &VmOptions::default());
    let result = vm.run_entry();
    (vm, result)
}

#[test]
fn exception_unwinds_through_call_frames() {
    let mut p = program(vec![
        Instruction::TryBegin { catch: 4, locals: 0 },
        Instruction::Call {
            function: 0,
            argc: 0,
        },
        Instruction::TryEnd,
        Instruction::Halt,
        Instruction::Halt,
        // f
        Instruction::Throw { src: None },
    ]);
    p.functions.push(function("f", 5, 0));

    let (vm, result) = run(p);
    let message = result.unwrap();
    assert_eq!(vm.string(message), Some("exception thrown"));
}

#[test]
fn catch_block_finds_declared_locals_on_the_stack() {
    // Two locals are declared but only one was pushed before the throw.
    let mut p = program(vec![
        Instruction::TryBegin { catch: 3, locals: 2 },
        Instruction::Push { src: Reg::R0 },
        Instruction::Throw { src: None },
        Instruction::SubSp { count: 2 },
        Instruction::LoadConst {
            dst: Reg::R0,
            index: 0,
        },
        Instruction::Halt,
    ]);
    p.constants.push(Constant::Int(7));

    let (_, result) = run(p);
    assert_eq!(result, Ok(Value::Int(7)));
}

#[test]
fn uncaught_exception_reaches_the_host() {
    let mut p = program(vec![
        Instruction::LoadConst {
            dst: Reg::R0,
            index: 0,
        },
        Instruction::LoadConst {
            dst: Reg::R1,
            index: 1,
        },
        Instruction::Binary {
            op: BinaryOpcode::Div,
            dst: Reg::R0,
            lhs: Reg::R0,
            rhs: Reg::R1,
        },
        Instruction::Halt,
    ]);
    p.constants.extend([Constant::Int(1), Constant::Int(0)]);

    let (_, result) = run(p);
    let exception = result.unwrap_err();
    assert_eq!(exception.error, RuntimeError::DivisionByZero);
    assert_eq!(exception.message, "division by zero");
}

#[test]
fn runaway_recursion_is_a_stack_overflow() {
    let mut p = program(vec![
        Instruction::Call {
            function: 0,
            argc: 0,
        },
        Instruction::Halt,
        // f
        Instruction::Call {
            function: 0,
            argc: 0,
        },
        Instruction::Return,
    ]);
    p.functions.push(function("f", 2, 0));

    init_test_logging();
    let options = VmOptions {
        max_call_depth: 16,
        ..Default::default()
    };
    let mut vm = VMState::new(p, NativeRegistry::new(), &options);
    let exception = vm.run_entry().unwrap_err();
    assert_eq!(exception.error, RuntimeError::StackOverflow { limit: 16 });
}

fn fail(_: &mut NativeCall<'_, '_>) -> Value {
    Value::InvalidState("boom")
}

fn sum(call: &mut NativeCall<'_, '_>) -> Value {
    Value::Int(call.args().iter().filter_map(|v| v.as_int().ok()).sum())
}

#[test]
fn failing_native_raises_a_catchable_exception() {
    let mut p = program(vec![
        Instruction::TryBegin { catch: 3, locals: 0 },
        Instruction::CallNative { native: 0, argc: 0 },
        Instruction::TryEnd,
        Instruction::Halt,
    ]);
    p.natives.push(NativeImport {
        owner: "global".to_owned(),
        name: "fail".to_owned(),
        signature: "function<void>".to_owned(),
    });
    let mut natives = NativeRegistry::new();
    natives.bind("global", "fail", "function<void>", fail);

    let mut vm = VMState::new(p, natives, &VmOptions::default());
    let message = vm.run_entry().unwrap();
    assert_eq!(vm.string(message), Some("boom"));
}

#[test]
fn native_arguments_are_popped_after_the_call() {
    let mut p = program(vec![
        Instruction::LoadConst {
            dst: Reg::R0,
            index: 0,
        },
        Instruction::Push { src: Reg::R0 },
        Instruction::Push { src: Reg::R0 },
        Instruction::CallNative { native: 0, argc: 2 },
        Instruction::Halt,
    ]);
    p.constants.push(Constant::Int(21));
    p.natives.push(NativeImport {
        owner: "global".to_owned(),
        name: "sum".to_owned(),
        signature: "function<int, int, int>".to_owned(),
    });
    let mut natives = NativeRegistry::new();
    natives.bind("global", "sum", "function<int, int, int>", sum);

    let mut vm = VMState::new(p, natives, &VmOptions::default());
    assert_eq!(vm.run_entry(), Ok(Value::Int(42)));
}

#[test]
fn unbound_native_is_reported_and_thrown() {
    let mut p = program(vec![
        Instruction::CallNative { native: 0, argc: 0 },
        Instruction::Halt,
    ]);
    p.natives.push(NativeImport {
        owner: "global".to_owned(),
        name: "missing".to_owned(),
        signature: "function<void>".to_owned(),
    });
    let mut vm = VMState::new(p, NativeRegistry::new(), &VmOptions::default());
    assert_eq!(vm.unbound_natives(), vec!["global.missing".to_owned()]);
    let exception = vm.run_entry().unwrap_err();
    assert_eq!(
        exception.error,
        RuntimeError::UnknownFunction("global.missing".to_owned())
    );
}

struct MathLibrary;

impl LibraryProvider for MathLibrary {
    fn load(&mut self, name: &str) -> Result<NativeRegistry, String> {
        match name {
            "math" => {
                let mut natives = NativeRegistry::new();
                natives.bind("global", "sum", "function<int, int, int>", sum);
                Ok(natives)
            }
            _ => Err("no such library".to_owned()),
        }
    }
}

#[test]
fn libraries_bind_missing_natives() {
    let mut p = program(vec![
        Instruction::CallNative { native: 0, argc: 0 },
        Instruction::Halt,
    ]);
    p.natives.push(NativeImport {
        owner: "global".to_owned(),
        name: "sum".to_owned(),
        signature: "function<int>".to_owned(),
    });
    let mut vm = VMState::new(p, NativeRegistry::new(), &VmOptions::default());
    assert!(matches!(
        vm.load_library("math").unwrap_err().error,
        RuntimeError::LibraryLoad { .. }
    ));

    vm.set_library_provider(Box::new(MathLibrary));
    assert!(vm.load_library("nope").is_err());
    vm.load_library("math").unwrap();
    assert!(vm.unbound_natives().is_empty());
    assert_eq!(vm.run_entry(), Ok(Value::Int(0)));
}

#[test]
fn duplicate_bindings_are_recorded() {
    let mut natives = NativeRegistry::new();
    natives
        .bind("global", "sum", "function<int>", sum)
        .bind("global", "sum", "function<int>", fail);
    assert_eq!(natives.len(), 1);
    assert_eq!(natives.duplicates(), ["global.sum".to_owned()]);
}

#[test]
fn host_calls_run_on_their_own_thread() {
    let mut p = program(vec![
        Instruction::Halt,
        // add(a, b)
        Instruction::LoadLocal {
            dst: Reg::R0,
            slot: 0,
        },
        Instruction::LoadLocal {
            dst: Reg::R1,
            slot: 1,
        },
        Instruction::Binary {
            op: BinaryOpcode::Add,
            dst: Reg::R0,
            lhs: Reg::R0,
            rhs: Reg::R1,
        },
        Instruction::Return,
    ]);
    p.functions.push(function("add", 1, 2));
    let mut vm = VMState::new(p, NativeRegistry::new(), &VmOptions::default());

    assert_eq!(
        vm.call_function("add", &[Value::Int(40), Value::Int(2)]),
        Ok(Value::Int(42))
    );
    let exception = vm.call_function("add", &[Value::Int(1)]).unwrap_err();
    assert!(matches!(
        exception.error,
        RuntimeError::InvalidArgumentCount { expected: 2, found: 1, .. }
    ));
}

#[test]
fn thread_slots_are_bounded() {
    let mut p = program(vec![Instruction::Halt, Instruction::Return]);
    p.functions.push(function("f", 1, 0));
    let options = VmOptions {
        max_threads: 2,
        ..Default::default()
    };
    let mut vm = VMState::new(p, NativeRegistry::new(), &options);

    let first = vm.spawn("f", &[]).unwrap();
    vm.spawn("f", &[]).unwrap();
    assert_eq!(
        vm.spawn("f", &[]).unwrap_err().error,
        RuntimeError::TooManyThreads { limit: 2 }
    );
    vm.run_thread(first).unwrap();
    assert_eq!(vm.pending_threads(), 1);
    vm.spawn("f", &[]).unwrap();
}

#[test]
fn externals_round_trip_through_the_side_table() {
    let mut vm = VMState::new(program(vec![Instruction::Halt]), NativeRegistry::new(), &VmOptions::default());
    let handle = vm.add_external(Box::new(String::from("host data")));
    assert_eq!(
        vm.external(handle).and_then(|d| d.downcast_ref::<String>()),
        Some(&"host data".to_owned())
    );
    assert!(vm.external(Value::Int(0)).is_none());
}
