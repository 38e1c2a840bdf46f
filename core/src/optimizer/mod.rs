//! Tree-level optimizations run between analysis and code generation.
//!
//! Operators whose operands are all literals are evaluated at compile time,
//! and loads of constants known to hold a literal are replaced by that
//! literal. Folding goes through [`crate::vm::arith`] so a folded result is
//! the value the interpreter would have computed. Expression statements
//! with no side effects are dropped unless their value may still be the
//! result of the enclosing statement list.

use core::mem;

use quill_values::{Number, Value};

use crate::syntax::{
    Access, BinaryOp, ConstantValue, Expr, ExprKind, Literal, OpCategory, Script, SideEffects,
    Span, Stmt, StmtKind, UnaryOp,
};
use crate::types::TypeId;
use crate::unit::{CompilationUnit, IdentId};
use crate::vm::arith::{self, StringResult};

/// Optimizes the script and every analyzed function body in `unit`.
pub fn optimize(unit: &mut CompilationUnit, script: &mut Script) {
    let mut optimizer = Optimizer::new(unit);
    optimizer.optimize_stmts(&mut script.statements);
    for index in 0..optimizer.unit.functions.len() {
        let Some(mut body) = optimizer.unit.functions[index].body.take() else {
            continue;
        };
        optimizer.optimize_stmts(&mut body.stmts);
        optimizer.unit.functions[index].body = Some(body);
    }
    tracing::debug!(
        folded = optimizer.folded,
        inlined = optimizer.inlined,
        dropped = optimizer.dropped,
        "optimization finished"
    );
}

/// Evaluates `left op right` when both operands are literals.
///
/// Returns `None` when either side is not a literal or when evaluating would
/// fail at run time (division by zero, unsupported operands); such
/// expressions are left for the interpreter to report.
pub fn constant_fold(left: &Expr, right: &Expr, op: BinaryOp) -> Option<Literal> {
    let (a, b) = (left.constant_value()?, right.constant_value()?);
    if op.category() == OpCategory::Logical {
        return match (a, b) {
            (Literal::Bool(x), Literal::Bool(y)) => Some(Literal::Bool(match op {
                BinaryOp::And => *x && *y,
                _ => *x || *y,
            })),
            _ => None,
        };
    }
    let opcode = op.opcode()?;
    if let (Some(x), Some(y)) = (number(a), number(b)) {
        return arith::numeric_binary(opcode, x, y).ok().and_then(literal);
    }
    match (a, b) {
        (Literal::Str(x), Literal::Str(y)) => match arith::string_binary(opcode, x, y).ok()? {
            StringResult::Concat(text) => Some(Literal::Str(text)),
            StringResult::Bool(result) => Some(Literal::Bool(result)),
        },
        _ => match op {
            BinaryOp::Eq => Some(Literal::Bool(a == b)),
            BinaryOp::Ne => Some(Literal::Bool(a != b)),
            _ => None,
        },
    }
}

/// Evaluates a unary operator applied to a literal.
pub fn fold_unary(op: UnaryOp, operand: &Expr) -> Option<Literal> {
    let value = match operand.constant_value()? {
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Int(i) => Value::Int(*i),
        Literal::Float(f) => Value::Float(*f),
        Literal::Null | Literal::Str(_) => return None,
    };
    arith::unary(op.opcode(), value).ok().and_then(literal)
}

fn number(lit: &Literal) -> Option<Number> {
    match *lit {
        Literal::Int(i) => Some(Number::Int(i)),
        Literal::Float(f) => Some(Number::Float(f)),
        _ => None,
    }
}

fn literal(value: Value) -> Option<Literal> {
    match value {
        Value::Null => Some(Literal::Null),
        Value::Bool(b) => Some(Literal::Bool(b)),
        Value::Int(i) => Some(Literal::Int(i)),
        Value::Float(f) => Some(Literal::Float(f)),
        _ => None,
    }
}

pub struct Optimizer<'u> {
    unit: &'u mut CompilationUnit,
    folded: usize,
    inlined: usize,
    dropped: usize,
}

impl<'u> Optimizer<'u> {
    pub fn new(unit: &'u mut CompilationUnit) -> Self {
        Self {
            unit,
            folded: 0,
            inlined: 0,
            dropped: 0,
        }
    }

    pub fn optimize_stmts(&mut self, stmts: &mut Vec<Stmt>) {
        for stmt in stmts.iter_mut() {
            self.optimize_stmt(stmt);
        }
        self.drop_pure_statements(stmts);
    }

    /// Removes expression statements without side effects that come before
    /// the last statement generating code; only that one can leave the
    /// list's result behind.
    fn drop_pure_statements(&mut self, stmts: &mut Vec<Stmt>) {
        let Some(last) = stmts.iter().rposition(generates_code) else {
            return;
        };
        let before = stmts.len();
        let mut index = 0;
        stmts.retain(|stmt| {
            let pure = index < last
                && matches!(&stmt.kind, StmtKind::Expr(expr) if !expr.has_side_effects());
            index += 1;
            if pure {
                if let StmtKind::Expr(expr) = &stmt.kind {
                    release_loads(self.unit, expr);
                }
            }
            !pure
        });
        self.dropped += before - stmts.len();
    }

    fn optimize_stmt(&mut self, stmt: &mut Stmt) {
        match &mut stmt.kind {
            StmtKind::Module(decl) => self.optimize_stmts(&mut decl.body),
            StmtKind::Var(decl) => {
                let Some(init) = &mut decl.init else {
                    return;
                };
                self.optimize_expr(init);
                // A constant whose initializer only folded to a literal now
                // can be inlined from here on.
                if let (true, Some(ident)) = (decl.is_const, decl.ident) {
                    if init.literal().is_some() && self.unit.idents.get(ident).current.is_none() {
                        self.unit.idents.bind_current(ident, init.clone());
                    }
                }
            }
            StmtKind::Expr(expr) => self.optimize_expr(expr),
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.optimize_expr(cond);
                self.optimize_stmts(then_branch);
                if let Some(else_branch) = else_branch {
                    self.optimize_stmts(else_branch);
                }
            }
            StmtKind::While { cond, body } => {
                self.optimize_expr(cond);
                self.optimize_stmts(body);
            }
            StmtKind::Block(body) => self.optimize_stmts(body),
            StmtKind::Return(Some(value)) | StmtKind::Throw(Some(value)) => {
                self.optimize_expr(value)
            }
            StmtKind::Try(decl) => {
                self.optimize_stmts(&mut decl.body);
                self.optimize_stmts(&mut decl.handler);
            }
            // Function bodies live in the unit's function table by now.
            StmtKind::Function(_)
            | StmtKind::Struct(_)
            | StmtKind::Import { .. }
            | StmtKind::Using { .. }
            | StmtKind::Return(None)
            | StmtKind::Throw(None) => {}
        }
    }

    /// Optimizes `expr` in place, children first.
    pub fn optimize_expr(&mut self, expr: &mut Expr) {
        let replacement = match &mut expr.kind {
            ExprKind::Literal(_) | ExprKind::Empty => None,
            ExprKind::Variable { ident, .. } => match (*ident, expr.access) {
                (Some(ident), Access::Load) => self.inline_constant(ident, expr.span),
                _ => None,
            },
            ExprKind::Binary { op, left, right } => {
                self.optimize_expr(left);
                self.optimize_expr(right);
                if right.is_empty() {
                    Some(mem::replace(
                        left.as_mut(),
                        Expr::new(ExprKind::Empty, Span::default()),
                    ))
                } else {
                    constant_fold(left, right, *op).map(|lit| self.folded_literal(lit, expr.ty))
                }
            }
            ExprKind::Unary { op, operand } => {
                self.optimize_expr(operand);
                fold_unary(*op, operand).map(|lit| self.folded_literal(lit, expr.ty))
            }
            ExprKind::Assign { target, value } => {
                self.optimize_expr(target);
                self.optimize_expr(value);
                None
            }
            ExprKind::Call { callee, args, .. } => {
                self.optimize_expr(callee);
                for arg in args {
                    self.optimize_expr(arg);
                }
                None
            }
            ExprKind::Member { object, .. } => {
                self.optimize_expr(object);
                None
            }
            ExprKind::Index { object, index } => {
                self.optimize_expr(object);
                self.optimize_expr(index);
                None
            }
            ExprKind::New { args, .. } => {
                for arg in args {
                    self.optimize_expr(arg);
                }
                None
            }
            ExprKind::ArrayLit(items) => {
                for item in items {
                    self.optimize_expr(item);
                }
                None
            }
        };
        if let Some(mut replacement) = replacement {
            replacement.span = expr.span;
            if replacement.ty.is_none() {
                replacement.ty = expr.ty;
            }
            *expr = replacement;
        }
    }

    fn folded_literal(&mut self, lit: Literal, ty: Option<TypeId>) -> Expr {
        self.folded += 1;
        let mut folded = Expr::new(ExprKind::Literal(lit), Span::default());
        folded.ty = ty;
        folded
    }

    /// The literal a constant is bound to, with the use it replaces released.
    fn inline_constant(&mut self, ident: IdentId, span: Span) -> Option<Expr> {
        let target = self.unit.idents.get(ident);
        if !target.is_const() {
            return None;
        }
        let mut copy = target.current.clone().filter(|e| e.literal().is_some())?;
        self.optimize_expr(&mut copy);
        self.unit.idents.release_use(ident);
        self.inlined += 1;
        tracing::trace!(ident = ident.0, %span, "inlined constant");
        Some(copy)
    }
}

fn generates_code(stmt: &Stmt) -> bool {
    !matches!(
        stmt.kind,
        StmtKind::Function(_) | StmtKind::Struct(_) | StmtKind::Import { .. } | StmtKind::Using { .. }
    )
}

/// Gives back the uses recorded for the loads in a dropped expression.
fn release_loads(unit: &mut CompilationUnit, expr: &Expr) {
    match &expr.kind {
        ExprKind::Variable {
            ident: Some(ident), ..
        } if expr.access == Access::Load => unit.idents.release_use(*ident),
        ExprKind::ArrayLit(items) => {
            for item in items {
                release_loads(unit, item);
            }
        }
        _ => {}
    }
}
