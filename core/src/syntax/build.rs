//! Constructors for building syntax trees by hand.
//!
//! The parser lives outside this crate; hosts that generate programs
//! directly (and the tests) use these helpers instead. All nodes get an
//! empty span unless one is attached with [`Spanned::at`].

use crate::syntax::ast::*;
use crate::syntax::operators::{BinaryOp, UnaryOp};
use crate::syntax::Span;

/// Attaches a source span to a node.
pub trait Spanned: Sized {
    fn at(self, span: Span) -> Self;
}

impl Spanned for Expr {
    fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

impl Spanned for Stmt {
    fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

fn expr(kind: ExprKind) -> Expr {
    Expr::new(kind, Span::default())
}

fn stmt(kind: StmtKind) -> Stmt {
    Stmt {
        kind,
        span: Span::default(),
    }
}

// === Types ===

/// A type path such as `"int"` or `"A.Point"`.
pub fn ty(path: &str) -> TypeExpr {
    ty_args(path, Vec::new())
}

pub fn ty_args(path: &str, args: Vec<TypeExpr>) -> TypeExpr {
    TypeExpr {
        path: path.split('.').map(str::to_owned).collect(),
        args,
        span: Span::default(),
    }
}

// === Expressions ===

pub fn null() -> Expr {
    expr(ExprKind::Literal(Literal::Null))
}

pub fn boolean(b: bool) -> Expr {
    expr(ExprKind::Literal(Literal::Bool(b)))
}

pub fn int(i: i64) -> Expr {
    expr(ExprKind::Literal(Literal::Int(i)))
}

pub fn float(f: f64) -> Expr {
    expr(ExprKind::Literal(Literal::Float(f)))
}

pub fn string(s: &str) -> Expr {
    expr(ExprKind::Literal(Literal::Str(s.to_owned())))
}

pub fn empty() -> Expr {
    expr(ExprKind::Empty)
}

pub fn var(name: &str) -> Expr {
    expr(ExprKind::Variable {
        name: name.to_owned(),
        ident: None,
    })
}

/// A dotted reference: `path("A.B.x")` is `A.B.x`.
pub fn path(dotted: &str) -> Expr {
    let mut segments = dotted.split('.');
    let head = segments.next().unwrap_or_default();
    segments.fold(var(head), member)
}

pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    expr(ExprKind::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    })
}

pub fn add(left: Expr, right: Expr) -> Expr {
    binary(BinaryOp::Add, left, right)
}

pub fn sub(left: Expr, right: Expr) -> Expr {
    binary(BinaryOp::Sub, left, right)
}

pub fn mul(left: Expr, right: Expr) -> Expr {
    binary(BinaryOp::Mul, left, right)
}

pub fn div(left: Expr, right: Expr) -> Expr {
    binary(BinaryOp::Div, left, right)
}

pub fn lt(left: Expr, right: Expr) -> Expr {
    binary(BinaryOp::Lt, left, right)
}

pub fn eq(left: Expr, right: Expr) -> Expr {
    binary(BinaryOp::Eq, left, right)
}

pub fn unary(op: UnaryOp, operand: Expr) -> Expr {
    expr(ExprKind::Unary {
        op,
        operand: Box::new(operand),
    })
}

pub fn neg(operand: Expr) -> Expr {
    unary(UnaryOp::Neg, operand)
}

pub fn not(operand: Expr) -> Expr {
    unary(UnaryOp::Not, operand)
}

pub fn assign(target: Expr, value: Expr) -> Expr {
    expr(ExprKind::Assign {
        target: Box::new(target),
        value: Box::new(value),
    })
}

pub fn call(callee: Expr, args: Vec<Expr>) -> Expr {
    call_generic(callee, Vec::new(), args)
}

pub fn call_generic(callee: Expr, generic_args: Vec<TypeExpr>, args: Vec<Expr>) -> Expr {
    expr(ExprKind::Call {
        callee: Box::new(callee),
        generic_args,
        args,
        target: None,
    })
}

/// `receiver.method(args...)`
pub fn method(receiver: Expr, name: &str, args: Vec<Expr>) -> Expr {
    call(member(receiver, name), args)
}

pub fn member(object: Expr, name: &str) -> Expr {
    expr(ExprKind::Member {
        object: Box::new(object),
        name: name.to_owned(),
        field: None,
    })
}

pub fn index(object: Expr, index: Expr) -> Expr {
    expr(ExprKind::Index {
        object: Box::new(object),
        index: Box::new(index),
    })
}

pub fn new(ty: TypeExpr, args: Vec<Expr>) -> Expr {
    expr(ExprKind::New { ty, args })
}

pub fn array(items: Vec<Expr>) -> Expr {
    expr(ExprKind::ArrayLit(items))
}

// === Statements ===

pub fn module(name: &str, body: Vec<Stmt>) -> Stmt {
    stmt(StmtKind::Module(ModuleDecl {
        name: name.to_owned(),
        body,
        module: None,
    }))
}

pub fn import(dotted: &str) -> Stmt {
    stmt(StmtKind::Import {
        path: dotted.split('.').map(str::to_owned).collect(),
    })
}

pub fn using(alias: &str, target: &str) -> Stmt {
    stmt(StmtKind::Using {
        alias: alias.to_owned(),
        target: target.split('.').map(str::to_owned).collect(),
    })
}

fn var_decl(name: &str, is_const: bool, ty: Option<TypeExpr>, init: Option<Expr>) -> Stmt {
    stmt(StmtKind::Var(VarDecl {
        name: name.to_owned(),
        is_const,
        exported: false,
        ty,
        init,
        ident: None,
    }))
}

/// `var name = init;`
pub fn let_(name: &str, init: Expr) -> Stmt {
    var_decl(name, false, None, Some(init))
}

/// `var name: ty = init;` or `var name: ty;`
pub fn let_typed(name: &str, ty: TypeExpr, init: Option<Expr>) -> Stmt {
    var_decl(name, false, Some(ty), init)
}

/// `var name;`
pub fn declare(name: &str) -> Stmt {
    var_decl(name, false, None, None)
}

/// `const name = init;`
pub fn constant(name: &str, init: Expr) -> Stmt {
    var_decl(name, true, None, Some(init))
}

/// Marks a variable or function declaration as exported.
pub fn export(mut s: Stmt) -> Stmt {
    match &mut s.kind {
        StmtKind::Var(decl) => decl.exported = true,
        StmtKind::Function(decl) => decl.exported = true,
        _ => {}
    }
    s
}

pub fn param(name: &str, ty: TypeExpr) -> Param {
    Param {
        name: name.to_owned(),
        ty,
        default: None,
        ident: None,
    }
}

pub fn param_default(name: &str, ty: TypeExpr, default: Expr) -> Param {
    Param {
        default: Some(default),
        ..param(name, ty)
    }
}

pub fn function(name: &str, params: Vec<Param>, ret: Option<TypeExpr>, body: Vec<Stmt>) -> Stmt {
    generic_function(name, &[], params, ret, body)
}

pub fn generic_function(
    name: &str,
    generics: &[&str],
    params: Vec<Param>,
    ret: Option<TypeExpr>,
    body: Vec<Stmt>,
) -> Stmt {
    stmt(StmtKind::Function(FunctionDecl {
        name: name.to_owned(),
        generics: generics.iter().map(|g| (*g).to_owned()).collect(),
        params,
        ret,
        body,
        exported: false,
        func: None,
    }))
}

pub fn field(name: &str, ty: TypeExpr) -> FieldDecl {
    FieldDecl {
        name: name.to_owned(),
        ty,
        default: None,
    }
}

pub fn field_default(name: &str, ty: TypeExpr, default: Expr) -> FieldDecl {
    FieldDecl {
        default: Some(default),
        ..field(name, ty)
    }
}

pub fn structure(name: &str, fields: Vec<FieldDecl>) -> Stmt {
    generic_structure(name, &[], fields)
}

pub fn generic_structure(name: &str, generics: &[&str], fields: Vec<FieldDecl>) -> Stmt {
    stmt(StmtKind::Struct(StructDecl {
        name: name.to_owned(),
        generics: generics.iter().map(|g| (*g).to_owned()).collect(),
        fields,
        ty: None,
    }))
}

pub fn expr_stmt(e: Expr) -> Stmt {
    stmt(StmtKind::Expr(e))
}

pub fn if_(cond: Expr, then_branch: Vec<Stmt>, else_branch: Option<Vec<Stmt>>) -> Stmt {
    stmt(StmtKind::If {
        cond,
        then_branch,
        else_branch,
    })
}

pub fn while_(cond: Expr, body: Vec<Stmt>) -> Stmt {
    stmt(StmtKind::While { cond, body })
}

pub fn block(body: Vec<Stmt>) -> Stmt {
    stmt(StmtKind::Block(body))
}

pub fn ret(value: Option<Expr>) -> Stmt {
    stmt(StmtKind::Return(value))
}

pub fn try_catch(body: Vec<Stmt>, catch_name: Option<&str>, handler: Vec<Stmt>) -> Stmt {
    stmt(StmtKind::Try(TryStmt {
        body,
        catch_name: catch_name.map(str::to_owned),
        catch_ident: None,
        handler,
    }))
}

pub fn throw(value: Option<Expr>) -> Stmt {
    stmt(StmtKind::Throw(value))
}

pub fn script(statements: Vec<Stmt>) -> Script {
    Script::new(statements)
}
