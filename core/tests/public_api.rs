//! Integration tests for the public API.
//!
//! Scripts are built with the tree helpers, compiled through the engine and
//! run on a VM the way an embedding host would.

use pretty_assertions::assert_eq;
use quill_core::api::{Engine, EngineOptions, Error, VmOptions, VmOptionsOverride};
use quill_core::stdlib;
use quill_core::syntax::build::*;
use quill_core::syntax::Stmt;
use quill_core::values::{SlotRef, Value};
use quill_core::vm::{LibraryProvider, NativeCall, NativeRegistry, RuntimeError, VMState};

fn engine() -> Engine {
    Engine::new(EngineOptions::default(), stdlib::registry())
}

fn instantiate(stmts: Vec<Stmt>, overrides: &VmOptionsOverride) -> VMState {
    let engine = engine();
    let program = engine.compile(script(stmts), &Default::default()).unwrap();
    engine.instantiate_with(program, overrides).unwrap()
}

fn twice() -> Stmt {
    function(
        "twice",
        vec![param("n", ty("int"))],
        Some(ty("int")),
        vec![ret(Some(mul(var("n"), int(2))))],
    )
}

#[test]
fn scripts_print_and_return_their_last_value() {
    let (vm, result) = engine()
        .run(
            script(vec![
                let_("greeting", string("hello")),
                expr_stmt(call(var("print"), vec![add(var("greeting"), string(", world"))])),
                expr_stmt(add(int(40), int(2))),
            ]),
            &Default::default(),
        )
        .unwrap();
    assert_eq!(result, Value::Int(42));
    assert_eq!(vm.output(), ["hello, world".to_owned()]);
}

#[test]
fn host_calls_script_functions() {
    let mut vm = instantiate(vec![twice()], &Default::default());
    vm.run_entry().unwrap();
    assert_eq!(vm.call_function("twice", &[Value::Int(21)]), Ok(Value::Int(42)));

    let error = vm.call_function("twice", &[]).unwrap_err().error;
    assert_eq!(
        error,
        RuntimeError::InvalidArgumentCount {
            name: "twice".to_owned(),
            expected: 1,
            found: 0,
        }
    );
    assert_eq!(
        vm.call_function("thrice", &[]).unwrap_err().error,
        RuntimeError::UnknownFunction("thrice".to_owned())
    );
}

#[test]
fn module_functions_are_exported_by_qualified_name() {
    let mut vm = instantiate(
        vec![module(
            "Geo",
            vec![export(function(
                "area",
                vec![param("w", ty("int")), param("h", ty("int"))],
                Some(ty("int")),
                vec![ret(Some(mul(var("w"), var("h"))))],
            ))],
        )],
        &Default::default(),
    );
    vm.run_entry().unwrap();
    assert!(matches!(vm.export("Geo.area"), Some(Value::Function(_))));
    assert_eq!(
        vm.call_function("Geo.area", &[Value::Int(6), Value::Int(7)]),
        Ok(Value::Int(42))
    );
}

#[test]
fn host_strings_flow_into_natives() {
    let mut vm = instantiate(
        vec![function(
            "shout",
            vec![param("text", ty("string"))],
            None,
            vec![expr_stmt(call(var("print"), vec![add(var("text"), string("!"))]))],
        )],
        &Default::default(),
    );
    let text = vm.alloc_string("hey");
    assert_eq!(vm.call_function("shout", &[text]), Ok(Value::Null));
    assert_eq!(vm.take_output(), vec!["hey!".to_owned()]);
    assert!(vm.output().is_empty());
}

#[test]
fn threads_are_limited_to_the_configured_count() {
    let mut vm = instantiate(
        vec![twice()],
        &VmOptionsOverride {
            max_threads: Some(1),
            ..Default::default()
        },
    );
    let first = vm.spawn("twice", &[Value::Int(1)]).unwrap();
    assert_eq!(vm.pending_threads(), 1);
    assert_eq!(
        vm.spawn("twice", &[Value::Int(2)]).unwrap_err().error,
        RuntimeError::TooManyThreads { limit: 1 }
    );

    assert_eq!(vm.run_thread(first), Ok(Value::Int(2)));
    assert_eq!(vm.pending_threads(), 0);
    let second = vm.spawn("twice", &[Value::Int(2)]).unwrap();
    assert_eq!(vm.run_thread(second), Ok(Value::Int(4)));
}

#[test]
fn runaway_recursion_overflows_the_call_depth() {
    let mut vm = instantiate(
        vec![function(
            "down",
            vec![param("n", ty("int"))],
            Some(ty("int")),
            vec![ret(Some(call(var("down"), vec![add(var("n"), int(1))])))],
        )],
        &VmOptionsOverride {
            max_call_depth: Some(16),
            ..Default::default()
        },
    );
    assert_eq!(
        vm.call_function("down", &[Value::Int(0)]).unwrap_err().error,
        RuntimeError::StackOverflow { limit: 16 }
    );
}

#[test]
fn uncaught_throw_is_a_runtime_error() {
    let Err(Error::Runtime(exception)) = engine().run(
        script(vec![throw(Some(string("boom")))]),
        &Default::default(),
    ) else {
        panic!("expected a runtime error");
    };
    assert_eq!(exception.message, "boom");
    assert_eq!(exception.error, RuntimeError::Thrown("boom".to_owned()));
}

#[test]
fn struct_instances_take_defaults_and_assignments() {
    let (vm, result) = engine()
        .run(
            script(vec![
                structure(
                    "Point",
                    vec![
                        field("x", ty("int")),
                        field_default("y", ty("int"), int(5)),
                    ],
                ),
                let_("p", new(ty("Point"), vec![int(1)])),
                expr_stmt(assign(member(var("p"), "x"), int(3))),
                expr_stmt(var("p")),
            ]),
            &Default::default(),
        )
        .unwrap();
    assert_eq!(vm.format_value(result), "Point { x: 3, y: 5 }");
}

#[test]
fn externals_pass_through_script_code() {
    let mut vm = instantiate(
        vec![function(
            "keep",
            vec![param("handle", ty("any"))],
            Some(ty("any")),
            vec![ret(Some(var("handle")))],
        )],
        &Default::default(),
    );
    let handle = vm.add_external(Box::new(vec![1u8, 2, 3]));
    let returned = vm.call_function("keep", &[handle]).unwrap();
    assert_eq!(returned, handle);
    assert_eq!(
        vm.external(returned).and_then(|d| d.downcast_ref::<Vec<u8>>()),
        Some(&vec![1u8, 2, 3])
    );
}

fn hypot2(call: &mut NativeCall<'_, '_>) -> Value {
    match (call.arg(0), call.arg(1)) {
        (Value::Int(a), Value::Int(b)) => Value::Int(a * a + b * b),
        _ => Value::InvalidState("hypot2 expects two ints"),
    }
}

struct Geometry;

impl LibraryProvider for Geometry {
    fn load(&mut self, name: &str) -> Result<NativeRegistry, String> {
        if name != "geometry" {
            return Err(format!("unknown library {}", name));
        }
        let mut natives = NativeRegistry::new();
        natives.bind("global", "hypot2", "function<int, int, int>", hypot2);
        Ok(natives)
    }
}

#[test]
fn libraries_satisfy_natives_missing_at_startup() {
    let mut natives = stdlib::registry();
    natives.bind("global", "hypot2", "function<int, int, int>", hypot2);
    let compiler = Engine::new(EngineOptions::default(), natives);
    let program = compiler
        .compile(
            script(vec![expr_stmt(call(var("hypot2"), vec![int(3), int(4)]))]),
            &Default::default(),
        )
        .unwrap();

    let Err(Error::Compilation { diagnostics }) = engine().instantiate(program.clone()) else {
        panic!("expected the missing native to be reported");
    };
    assert_eq!(diagnostics.len(), 1);

    let mut vm = VMState::new(program, stdlib::registry(), &VmOptions::default());
    assert_eq!(vm.unbound_natives(), vec!["global.hypot2".to_owned()]);
    vm.set_library_provider(Box::new(Geometry));
    assert!(vm.load_library("trig").is_err());
    vm.load_library("geometry").unwrap();
    vm.load_library("geometry").unwrap();
    assert!(vm.unbound_natives().is_empty());
    assert_eq!(vm.run_entry(), Ok(Value::Int(25)));
}

#[test]
fn returned_values_survive_collection_until_released() {
    let (mut vm, result) = engine()
        .run(
            script(vec![expr_stmt(add(
                call(var("to_string"), vec![int(4)]),
                string("x"),
            ))]),
            &Default::default(),
        )
        .unwrap();
    assert_eq!(vm.format_value(result), "4x");
    assert_eq!(vm.pinned(), 1);

    vm.collect_garbage();
    let other = vm.alloc_string("someone else");
    assert_ne!(other, result);
    assert_eq!(vm.string(result), Some("4x"));

    assert!(vm.release(result));
    assert!(!vm.release(result));
    vm.collect_garbage();
    assert_eq!(vm.string(result), None);
}

#[test]
fn function_results_are_pinned_per_call() {
    let mut vm = instantiate(
        vec![function(
            "label",
            vec![param("n", ty("int"))],
            Some(ty("string")),
            vec![ret(Some(add(string("#"), call(var("to_string"), vec![var("n")]))))],
        )],
        &Default::default(),
    );
    let first = vm.call_function("label", &[Value::Int(1)]).unwrap();
    let second = vm.call_function("label", &[Value::Int(2)]).unwrap();
    assert_eq!(vm.pinned(), 2);

    vm.release(first);
    vm.collect_garbage();
    assert_eq!(vm.string(first), None);
    assert_eq!(vm.string(second), Some("#2"));
}

#[test]
fn slot_references_pass_through_untouched() {
    let mut vm = instantiate(
        vec![function(
            "keep",
            vec![param("handle", ty("any"))],
            Some(ty("any")),
            vec![ret(Some(var("handle")))],
        )],
        &Default::default(),
    );
    let slot = Value::Ref(SlotRef::Static(3));
    assert_eq!(vm.call_function("keep", &[slot]), Ok(slot));
    assert_eq!(vm.pinned(), 0);
    vm.collect_garbage();
    assert_eq!(vm.format_value(slot), "&static[3]");
}
