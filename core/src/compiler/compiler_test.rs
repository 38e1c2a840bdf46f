use pretty_assertions::assert_eq;

use super::*;
use crate::analyzer::analyze;
use crate::api::CompileOptions;
use crate::bytecode::{BinaryOpcode, Op};
use crate::optimizer::optimize;
use crate::syntax::build::*;
use crate::syntax::{BinaryOp, Span};
use crate::test_utils::init_test_logging;

fn build(unit: &mut CompilationUnit, stmts: Vec<Stmt>, optimized: bool) -> Program {
    init_test_logging();
    let mut script = script(stmts);
    analyze(unit, &mut script, &CompileOptions::default()).unwrap();
    assert_eq!(unit.errors, vec![]);
    if optimized {
        optimize(unit, &mut script);
    }
    compile(unit, &script).unwrap()
}

fn compiled(stmts: Vec<Stmt>) -> Program {
    build(&mut CompilationUnit::new(), stmts, true)
}

fn unoptimized(stmts: Vec<Stmt>) -> Program {
    build(&mut CompilationUnit::new(), stmts, false)
}

fn count(program: &Program, f: impl Fn(&Op) -> bool) -> usize {
    program.code.iter().filter(|op| f(op)).count()
}

fn is_binary(op: &Op) -> bool {
    matches!(op, Instruction::Binary { .. })
}

/// Instructions of the entry code, up to and including `halt`.
fn entry(program: &Program) -> Vec<Op> {
    let mut code = Vec::new();
    for op in &program.code {
        code.push(*op);
        if *op == Instruction::Halt {
            break;
        }
    }
    code
}

#[test]
fn folded_arithmetic_is_a_single_constant_load() {
    let program = compiled(vec![let_(
        "x",
        sub(mul(add(int(1), int(2)), int(4)), div(int(9), int(3))),
    )]);
    assert_eq!(count(&program, is_binary), 0);
    assert_eq!(program.constants, vec![Constant::Int(9)]);
    assert_eq!(
        entry(&program),
        vec![
            Instruction::LoadConst {
                dst: Reg::R0,
                index: 0
            },
            Instruction::StoreStatic {
                index: 0,
                src: Reg::R0
            },
            Instruction::Halt,
        ]
    );
}

#[test]
fn unoptimized_arithmetic_keeps_its_opcodes() {
    let program = unoptimized(vec![let_("x", add(int(1), mul(int(2), int(3))))]);
    let ops: Vec<BinaryOpcode> = program
        .code
        .iter()
        .filter_map(|op| match op {
            Instruction::Binary { op, .. } => Some(*op),
            _ => None,
        })
        .collect();
    assert_eq!(ops, vec![BinaryOpcode::Mul, BinaryOpcode::Add]);
}

#[test]
fn constants_are_pooled_once() {
    let program = compiled(vec![
        let_("a", int(5)),
        let_("b", int(5)),
        let_("s", string("x")),
        let_("t", string("x")),
        let_("f", float(5.0)),
    ]);
    assert_eq!(
        program.constants,
        vec![
            Constant::Int(5),
            Constant::Str("x".to_owned()),
            Constant::Float(5.0),
        ]
    );
}

#[test]
fn evaluation_order_follows_operand_shape() {
    assert_eq!(
        EvalOrder::select(&add(var("a"), int(1)), &var("b")),
        EvalOrder::LeftThenRight
    );
    assert_eq!(
        EvalOrder::select(&int(2), &add(var("a"), int(1))),
        EvalOrder::RightThenLeft
    );
    assert_eq!(
        EvalOrder::select(&var("b"), &add(var("a"), int(1))),
        EvalOrder::LeftPushedThenRight
    );
}

#[test]
fn complex_right_operand_saves_the_left_one() {
    let program = compiled(vec![
        let_("v", int(3)),
        let_("w", int(4)),
        let_("r", mul(var("v"), add(var("w"), int(1)))),
    ]);
    assert_eq!(
        &entry(&program)[4..],
        &[
            Instruction::LoadStatic {
                dst: Reg::R0,
                index: 0
            },
            Instruction::Push { src: Reg::R0 },
            Instruction::LoadStatic {
                dst: Reg::R0,
                index: 1
            },
            Instruction::LoadConst {
                dst: Reg::R1,
                index: 2
            },
            Instruction::Binary {
                op: BinaryOpcode::Add,
                dst: Reg::R0,
                lhs: Reg::R0,
                rhs: Reg::R1
            },
            Instruction::Move {
                dst: Reg::R1,
                src: Reg::R0
            },
            Instruction::PopReg { dst: Reg::R0 },
            Instruction::Binary {
                op: BinaryOpcode::Mul,
                dst: Reg::R0,
                lhs: Reg::R0,
                rhs: Reg::R1
            },
            Instruction::StoreStatic {
                index: 2,
                src: Reg::R0
            },
            Instruction::Halt,
        ]
    );
}

#[test]
fn literal_left_operand_is_loaded_last() {
    let program = compiled(vec![
        let_("w", int(4)),
        let_("r", sub(int(10), add(var("w"), int(1)))),
    ]);
    let code = entry(&program);
    let n = code.len();
    assert_eq!(
        &code[n - 5..n - 2],
        &[
            Instruction::Move {
                dst: Reg::R1,
                src: Reg::R0
            },
            Instruction::LoadConst {
                dst: Reg::R0,
                index: 2
            },
            Instruction::Binary {
                op: BinaryOpcode::Sub,
                dst: Reg::R0,
                lhs: Reg::R0,
                rhs: Reg::R1
            },
        ]
    );
}

#[test]
fn try_catch_discards_body_locals_once() {
    let program = compiled(vec![try_catch(
        vec![declare("a"), declare("b"), throw(None)],
        None,
        vec![],
    )]);
    assert_eq!(
        count(&program, |op| matches!(op, Instruction::SubSp { count: 2 })),
        1
    );
    assert_eq!(count(&program, |op| matches!(op, Instruction::Pop)), 0);

    let try_begin = program
        .code
        .iter()
        .find_map(|op| match op {
            Instruction::TryBegin { catch, locals } => Some((*catch, *locals)),
            _ => None,
        })
        .unwrap();
    assert_eq!(try_begin.1, 2);
    assert_eq!(
        program.code[try_begin.0 as usize],
        Instruction::SubSp { count: 2 }
    );
}

#[test]
fn catch_binds_the_message_as_a_local() {
    let program = compiled(vec![try_catch(
        vec![declare("a"), throw(Some(string("boom")))],
        Some("e"),
        vec![expr_stmt(var("e"))],
    )]);
    let code = entry(&program);
    let catch = code
        .iter()
        .find_map(|op| match op {
            Instruction::TryBegin { catch, .. } => Some(*catch as usize),
            _ => None,
        })
        .unwrap();
    assert_eq!(
        &code[catch..catch + 4],
        &[
            Instruction::Pop,
            Instruction::Push { src: Reg::R0 },
            Instruction::LoadLocal {
                dst: Reg::R0,
                slot: 0
            },
            Instruction::Pop,
        ]
    );
}

#[test]
fn blocks_pop_their_locals() {
    let program = compiled(vec![
        block(vec![let_("a", int(1))]),
        block(vec![declare("a"), declare("b"), declare("c")]),
    ]);
    assert_eq!(count(&program, |op| matches!(op, Instruction::Pop)), 1);
    assert_eq!(
        count(&program, |op| matches!(op, Instruction::SubSp { count: 3 })),
        1
    );
}

#[test]
fn if_else_jumps_around_branches() {
    let program = compiled(vec![
        let_("c", boolean(true)),
        if_(
            var("c"),
            vec![let_("a", int(1))],
            Some(vec![let_("b", int(2))]),
        ),
    ]);
    let code = entry(&program);
    let jumps: Vec<&Op> = code
        .iter()
        .filter(|op| matches!(op, Instruction::Jump { .. } | Instruction::JumpIfFalse { .. }))
        .collect();
    assert_eq!(jumps.len(), 2);
    let Instruction::JumpIfFalse { target, .. } = jumps[0] else {
        unreachable!()
    };
    // The else branch starts right after the unconditional jump.
    assert!(matches!(code[*target as usize - 1], Instruction::Jump { .. }));
    let Instruction::Jump { target } = jumps[1] else {
        unreachable!()
    };
    assert_eq!(code[*target as usize], Instruction::Halt);
}

#[test]
fn while_loops_back_to_the_condition() {
    let program = compiled(vec![
        let_("i", int(0)),
        while_(
            lt(var("i"), int(3)),
            vec![expr_stmt(assign(var("i"), add(var("i"), int(1))))],
        ),
    ]);
    let code = entry(&program);
    let back = code
        .iter()
        .find_map(|op| match op {
            Instruction::Jump { target } => Some(*target as usize),
            _ => None,
        })
        .unwrap();
    assert_eq!(
        code[back],
        Instruction::LoadStatic {
            dst: Reg::R0,
            index: 0
        }
    );
}

#[test]
fn functions_use_frame_relative_slots() {
    let program = compiled(vec![
        function(
            "f",
            vec![param("a", ty("int")), param("b", ty("int"))],
            Some(ty("int")),
            vec![let_("t", var("b")), ret(Some(add(var("a"), var("t"))))],
        ),
        let_("r", call(var("f"), vec![int(1), int(2)])),
    ]);
    assert_eq!(
        program.functions,
        vec![FunctionEntry {
            name: "f".to_owned(),
            address: entry(&program).len() as u32,
            arity: 2,
        }]
    );
    let body = &program.code[program.functions[0].address as usize..];
    assert_eq!(
        &body[..6],
        &[
            Instruction::LoadLocal {
                dst: Reg::R0,
                slot: 1
            },
            Instruction::Push { src: Reg::R0 },
            Instruction::LoadLocal {
                dst: Reg::R0,
                slot: 0
            },
            Instruction::LoadLocal {
                dst: Reg::R1,
                slot: 3
            },
            Instruction::Binary {
                op: BinaryOpcode::Add,
                dst: Reg::R0,
                lhs: Reg::R0,
                rhs: Reg::R1
            },
            Instruction::Return,
        ]
    );
    assert_eq!(
        count(&program, |op| matches!(
            op,
            Instruction::Call {
                function: 0,
                argc: 2
            }
        )),
        1
    );
}

#[test]
fn void_functions_return_null() {
    let program = compiled(vec![function("noop", vec![], None, vec![])]);
    let body = &program.code[program.functions[0].address as usize..];
    assert_eq!(
        body,
        &[Instruction::LoadNull { dst: Reg::R0 }, Instruction::Return]
    );
}

#[test]
fn generic_templates_have_no_code() {
    let program = compiled(vec![
        generic_function(
            "id",
            &["T"],
            vec![param("x", ty("T"))],
            Some(ty("T")),
            vec![ret(Some(var("x")))],
        ),
        let_("a", call(var("id"), vec![int(1)])),
        let_("b", call(var("id"), vec![string("s")])),
    ]);
    let names: Vec<&str> = program.functions.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["id<int>", "id<string>"]);
}

#[test]
fn structs_get_static_objects() {
    let program = compiled(vec![
        structure(
            "Point",
            vec![field("x", ty("int")), field_default("y", ty("int"), int(0))],
        ),
        let_("p", new(ty("Point"), vec![int(1)])),
        expr_stmt(assign(member(var("p"), "y"), int(5))),
    ]);
    assert_eq!(
        program.static_objects,
        vec![StaticObject {
            name: "Point".to_owned(),
            members: vec!["x".to_owned(), "y".to_owned()],
        }]
    );
    assert_eq!(
        count(&program, |op| matches!(
            op,
            Instruction::NewObject {
                object: 0,
                argc: 2,
                ..
            }
        )),
        1
    );
    assert_eq!(
        count(&program, |op| matches!(
            op,
            Instruction::SetField {
                object: Reg::R2,
                field: 1,
                src: Reg::R0
            }
        )),
        1
    );
}

#[test]
fn exports_are_published_with_qualified_names() {
    let program = compiled(vec![module(
        "A",
        vec![
            export(let_("x", int(1))),
            export(function("f", vec![], None, vec![])),
        ],
    )]);
    let exported: Vec<&Constant> = program
        .code
        .iter()
        .filter_map(|op| match op {
            Instruction::Export { name, .. } => Some(&program.constants[*name as usize]),
            _ => None,
        })
        .collect();
    assert_eq!(
        exported,
        vec![
            &Constant::Str("A.f".to_owned()),
            &Constant::Str("A.x".to_owned()),
        ]
    );
}

#[test]
fn natives_become_imports() {
    let mut unit = CompilationUnit::new();
    unit.register_native("global", "print", "function<void, any>")
        .unwrap();
    unit.register_native("array", "length", "function<int, array>")
        .unwrap();
    let program = build(
        &mut unit,
        vec![
            expr_stmt(call(var("print"), vec![string("hi")])),
            let_("n", method(array(vec![int(1)]), "length", vec![])),
        ],
        true,
    );
    assert_eq!(
        program
            .natives
            .iter()
            .map(|n| format!("{}.{}", n.owner, n.name))
            .collect::<Vec<_>>(),
        vec!["global.print", "array.length"]
    );
    assert_eq!(
        count(&program, |op| matches!(
            op,
            Instruction::CallNative { native: 0, argc: 1 }
        )),
        1
    );
    assert_eq!(
        count(&program, |op| matches!(
            op,
            Instruction::CallNative { native: 1, argc: 1 }
        )),
        1
    );
}

#[test]
fn short_circuit_skips_the_right_operand() {
    let program = compiled(vec![
        let_("a", boolean(false)),
        let_("n", int(1)),
        let_("b", binary(BinaryOp::Or, var("a"), lt(var("n"), int(2)))),
    ]);
    let code = entry(&program);
    let (at, target) = code
        .iter()
        .enumerate()
        .find_map(|(i, op)| match op {
            Instruction::JumpIfTrue { target, .. } => Some((i, *target as usize)),
            _ => None,
        })
        .unwrap();
    assert!(matches!(code[at + 3], Instruction::Binary { op: BinaryOpcode::Lt, .. }));
    assert_eq!(
        code[target],
        Instruction::StoreStatic {
            index: 2,
            src: Reg::R0
        }
    );
}

#[test]
fn statements_leave_trace_markers() {
    let mut first = let_("a", int(1));
    first.span = Span::new(0, 10);
    let mut second = let_("b", int(2));
    second.span = Span::new(11, 21);
    let program = compiled(vec![first, second]);
    assert_eq!(program.span_at(0), Some(Span::new(0, 10)));
    assert_eq!(program.span_at(2), Some(Span::new(11, 21)));
    assert!(program.to_string().contains("; 11..21"));
}
