use pretty_assertions::assert_eq;
use quill_values::Value;

use crate::stdlib::test_support::run;
use crate::syntax::build::*;
use crate::syntax::{Expr, Stmt};

fn print(value: Expr) -> Stmt {
    expr_stmt(call(var("print"), vec![value]))
}

#[test]
fn print_renders_values_like_the_host_sees_them() {
    let (vm, _) = run(vec![
        print(int(1)),
        print(float(2.0)),
        print(boolean(true)),
        print(string("text")),
        print(array(vec![string("a"), string("b")])),
        print(null()),
    ])
    .unwrap();
    assert_eq!(vm.output(), ["1", "2.0", "true", "text", "[\"a\", \"b\"]", "null"]);
}

#[test]
fn to_string_allocates_a_script_string() {
    let (vm, _) = run(vec![
        export(let_("s", call(var("to_string"), vec![add(int(41), int(1))]))),
        export(let_(
            "n",
            method(call(var("to_string"), vec![float(3.5)]), "length", vec![]),
        )),
    ])
    .unwrap();
    let s = vm.export("s").unwrap();
    assert_eq!(vm.string(s), Some("42"));
    assert_eq!(vm.export("n"), Some(Value::Int(3)));
}

#[test]
fn to_string_of_a_string_is_the_same_string() {
    let (vm, result) = run(vec![
        let_("s", string("same")),
        expr_stmt(eq(call(var("to_string"), vec![var("s")]), var("s"))),
    ])
    .unwrap();
    assert_eq!(result, Value::Bool(true));
    assert_eq!(vm.output(), Vec::<String>::new());
}
