//! End-to-end checks of the guarantees the compiler and VM make.

use pretty_assertions::assert_eq;
use quill_core::api::{
    CompileOptionsOverride, Engine, EngineOptions, Error, VmOptionsOverride,
};
use quill_core::bytecode::{Constant, Instruction};
use quill_core::diagnostics::CompileErrorKind;
use quill_core::stdlib;
use quill_core::syntax::Stmt;
use quill_core::syntax::build::*;
use quill_core::types::{Member, SymbolType, TypeId, TypeKind};
use quill_core::unit::CompilationUnit;
use quill_core::values::Value;

fn engine() -> Engine {
    Engine::new(EngineOptions::default(), stdlib::registry())
}

fn no_optimization() -> CompileOptionsOverride {
    CompileOptionsOverride {
        optimize: Some(false),
        ..Default::default()
    }
}

#[test]
fn identical_type_declarations_share_an_id() {
    let mut unit = CompilationUnit::new();
    let pair = || {
        SymbolType::new("Pair", TypeKind::Struct).with_members(vec![
            Member::new("first", TypeId::INT),
            Member::new("second", TypeId::STRING),
        ])
    };
    let first = unit.types.register(pair());
    let count = unit.types.len();
    let second = unit.types.register(pair());
    assert_eq!(first, second);
    assert_eq!(unit.types.len(), count);

    let swapped = unit.types.register(
        SymbolType::new("Pair", TypeKind::Struct).with_members(vec![
            Member::new("second", TypeId::STRING),
            Member::new("first", TypeId::INT),
        ]),
    );
    assert_ne!(first, swapped);
}

#[test]
fn generic_instances_converge_across_uses() {
    let unit = engine()
        .compile_unit(
            script(vec![
                generic_structure("Box", &["T"], vec![field("value", ty("T"))]),
                let_typed("a", ty_args("Box", vec![ty("int")]), None),
                let_typed("b", ty_args("Box", vec![ty("int")]), None),
                let_typed("c", ty_args("Box", vec![ty("float")]), None),
            ]),
            &Default::default(),
        )
        .unwrap();
    let ty_of = |name| unit.idents.get(unit.find_ident(name).unwrap()).ty;
    assert_eq!(ty_of("a"), ty_of("b"));
    assert_ne!(ty_of("a"), ty_of("c"));
    assert_eq!(unit.type_name(ty_of("a")), "Box<int>");
}

#[test]
fn literal_arithmetic_compiles_to_one_constant_load() {
    let cases = [
        (add(int(1), mul(int(2), int(3))), 1 + 2 * 3),
        (sub(mul(int(6), int(7)), div(int(9), int(4))), 6 * 7 - 9 / 4),
        (neg(sub(int(3), int(10))), -(3 - 10)),
    ];
    let engine = engine();
    for (expr, expected) in cases {
        let program = engine
            .compile(script(vec![expr_stmt(expr)]), &Default::default())
            .unwrap();
        let arithmetic = program
            .code
            .iter()
            .filter(|op| matches!(op, Instruction::Binary { op, .. } if op.is_arithmetic()))
            .count();
        assert_eq!(arithmetic, 0);
        assert_eq!(program.constants, vec![Constant::Int(expected)]);
        assert!(matches!(program.code[0], Instruction::LoadConst { .. }));

        let mut vm = engine.instantiate(program).unwrap();
        assert_eq!(vm.run_entry(), Ok(Value::Int(expected)));
    }
}

#[test]
fn unfolded_arithmetic_agrees_with_folded() {
    let engine = engine();
    let source = || script(vec![expr_stmt(div(add(float(1.5), int(2)), int(4)))]);
    let folded = engine.run(source(), &Default::default()).unwrap().1;
    let computed = engine.run(source(), &no_optimization()).unwrap().1;
    assert_eq!(folded, Value::Float((1.5 + 2.0) / 4.0));
    assert_eq!(folded, computed);
}

#[test]
fn inlined_constants_leave_only_real_uses() {
    let source = || {
        script(vec![
            constant("k", int(5)),
            let_("v", int(1)),
            let_("a", add(var("k"), var("v"))),
            let_("b", mul(var("k"), var("k"))),
            expr_stmt(assign(var("v"), var("k"))),
        ])
    };
    let engine = engine();
    let optimized = engine.compile_unit(source(), &Default::default()).unwrap();
    let k = optimized.find_ident("k").unwrap();
    let v = optimized.find_ident("v").unwrap();
    assert_eq!(optimized.idents.use_count(k), 0);
    assert_eq!(optimized.idents.use_count(v), 1);

    let plain = engine.compile_unit(source(), &no_optimization()).unwrap();
    let k = plain.find_ident("k").unwrap();
    assert_eq!(plain.idents.use_count(k), 4);
}

fn try_two_locals_then_throw(handler: Vec<Stmt>) -> Vec<Stmt> {
    vec![try_catch(
        vec![declare("a"), declare("b"), throw(None)],
        None,
        handler,
    )]
}

#[test]
fn unwinding_discards_the_two_try_locals_once() {
    let program = engine()
        .compile(script(try_two_locals_then_throw(vec![])), &Default::default())
        .unwrap();
    let discards: Vec<_> = program
        .code
        .iter()
        .filter(|op| matches!(op, Instruction::SubSp { .. } | Instruction::Pop))
        .collect();
    assert_eq!(discards, vec![&Instruction::SubSp { count: 2 }]);
}

#[test]
fn catch_block_runs_exactly_once() {
    let mut stmts = vec![let_("runs", int(0))];
    stmts.extend(try_two_locals_then_throw(vec![expr_stmt(assign(
        var("runs"),
        add(var("runs"), int(1)),
    ))]));
    stmts.push(expr_stmt(add(mul(var("runs"), int(40)), int(2))));

    let (vm, result) = engine().run(script(stmts), &Default::default()).unwrap();
    assert_eq!(result, Value::Int(42));
    assert_eq!(vm.static_value(0), Some(Value::Int(1)));
}

#[test]
fn explicit_collection_keeps_only_the_reachable_object() {
    let threshold = 4;
    let engine = engine();
    let program = engine
        .compile(
            script(vec![
                let_("keep", array(vec![int(7)])),
                let_("i", int(0)),
                while_(
                    lt(var("i"), int(threshold)),
                    vec![
                        let_("garbage", array(vec![var("i")])),
                        expr_stmt(assign(var("i"), add(var("i"), int(1)))),
                    ],
                ),
            ]),
            &Default::default(),
        )
        .unwrap();
    let mut vm = engine
        .instantiate_with(
            program,
            &VmOptionsOverride {
                gc_min_threshold: Some(threshold as usize),
                gc_max_threshold: Some(1024),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(vm.heap().threshold(), threshold as usize);

    vm.run_entry().unwrap();
    vm.collect_garbage();
    assert_eq!(vm.heap().live(), 1);

    let keep = vm.static_value(0).unwrap();
    assert_eq!(vm.format_value(keep), "[7]");
}

fn modules(a_body: Vec<Stmt>, c_body: Vec<Stmt>) -> Vec<Stmt> {
    let mut a = vec![module("B", vec![export(let_("x", int(1)))])];
    a.extend(a_body);
    vec![module("A", a), module("C", c_body)]
}

#[test]
fn nested_module_resolves_from_its_parent_only() {
    let engine = engine();
    let (vm, _) = engine
        .run(
            script(modules(vec![export(let_("y", path("B.x")))], vec![])),
            &Default::default(),
        )
        .unwrap();
    assert_eq!(vm.export("A.y"), Some(Value::Int(1)));
    assert_eq!(vm.export("A.B.x"), Some(Value::Int(1)));

    let Err(Error::Compilation { diagnostics }) = engine.compile(
        script(modules(vec![], vec![let_("y", path("B.x"))])),
        &Default::default(),
    ) else {
        panic!("sibling lookup of a nested module compiled");
    };
    let unknown = CompileErrorKind::UnknownModule {
        name: "B".to_owned(),
    };
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].message, unknown.to_string());
}

#[test]
fn numeric_values_read_the_same_through_every_accessor() {
    for i in [0, 1, -1, 42, i64::MAX, i64::MIN] {
        let value = Value::Int(i);
        assert_eq!(value.to_int(), value.as_int());
        assert_eq!(value.to_float(), Ok(i as f64));
        assert_eq!(value.number().map(|n| n.to_int()), Some(i));
    }
    for x in [0.0, -0.5, 2.75, 1e300, f64::MIN_POSITIVE] {
        let value = Value::Float(x);
        assert_eq!(value.to_float(), value.as_float());
        assert_eq!(value.to_int(), Ok(x as i64));
        assert_eq!(value.number().map(|n| n.to_float()), Some(x));
    }
}
