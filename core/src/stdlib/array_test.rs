use pretty_assertions::assert_eq;
use quill_values::Value;

use crate::api::Error;
use crate::stdlib::test_support::run;
use crate::syntax::build::*;
use crate::vm::RuntimeError;

#[test]
fn length_counts_elements() {
    let (vm, _) = run(vec![
        let_("a", array(vec![int(1), int(2), int(3)])),
        export(let_("n", method(var("a"), "length", vec![]))),
        export(let_("e", method(array(vec![]), "length", vec![]))),
    ])
    .unwrap();
    assert_eq!(vm.export("n"), Some(Value::Int(3)));
    assert_eq!(vm.export("e"), Some(Value::Int(0)));
}

#[test]
fn push_grows_the_array_in_place() {
    let (vm, _) = run(vec![
        let_("a", array(vec![])),
        let_("i", int(0)),
        while_(
            lt(var("i"), int(100)),
            vec![
                expr_stmt(method(var("a"), "push", vec![var("i")])),
                expr_stmt(assign(var("i"), add(var("i"), int(1)))),
            ],
        ),
        export(let_("n", method(var("a"), "length", vec![]))),
        export(let_("last", index(var("a"), int(99)))),
    ])
    .unwrap();
    assert_eq!(vm.export("n"), Some(Value::Int(100)));
    assert_eq!(vm.export("last"), Some(Value::Int(99)));
}

#[test]
fn pop_returns_the_last_element() {
    let (vm, _) = run(vec![
        let_("a", array(vec![int(1), int(2)])),
        export(let_("last", method(var("a"), "pop", vec![]))),
        export(let_("n", method(var("a"), "length", vec![]))),
    ])
    .unwrap();
    assert_eq!(vm.export("last"), Some(Value::Int(2)));
    assert_eq!(vm.export("n"), Some(Value::Int(1)));
}

#[test]
fn pop_from_empty_array_is_catchable() {
    let (vm, result) = run(vec![
        let_("msg", string("")),
        try_catch(
            vec![
                let_("a", array(vec![])),
                expr_stmt(method(var("a"), "pop", vec![])),
            ],
            Some("e"),
            vec![expr_stmt(assign(var("msg"), var("e")))],
        ),
        expr_stmt(var("msg")),
    ])
    .unwrap();
    assert_eq!(vm.string(result), Some("pop from an empty array"));
}

#[test]
fn uncaught_native_failure_reaches_the_host() {
    let Err(Error::Runtime(exception)) = run(vec![expr_stmt(method(
        array(vec![]),
        "pop",
        vec![],
    ))]) else {
        panic!("expected a runtime error");
    };
    assert_eq!(
        exception.error,
        RuntimeError::Native("pop from an empty array".to_owned())
    );
}
