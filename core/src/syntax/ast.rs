//! The syntax tree consumed by the compiler passes.
//!
//! Nodes start out as the parser produced them. The analyzer fills in the
//! resolution slots (`ident`, `ty`, `target`, ...) in place, the optimizer
//! rewrites expressions, and the code generator reads the result.
//!
//! `Clone` is a deep copy; generic functions are instantiated by cloning
//! their declaration and analyzing the copy.

use core::fmt;

use crate::syntax::operators::{BinaryOp, UnaryOp};
use crate::syntax::Span;
use crate::types::TypeId;
use crate::unit::{FuncId, IdentId, ModuleId};

/// A whole parsed program.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Script {
    pub statements: Vec<Stmt>,
}

impl Script {
    pub fn new(statements: Vec<Stmt>) -> Self {
        Self { statements }
    }
}

/// A type as written in source: `int`, `array<int>`, `A.Point`, `Box<float>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeExpr {
    pub path: Vec<String>,
    pub args: Vec<TypeExpr>,
    pub span: Span,
}

impl TypeExpr {
    pub fn last_segment(&self) -> &str {
        self.path.last().map(String::as_str).unwrap_or("")
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.join("."))?;
        if !self.args.is_empty() {
            write!(f, "<")?;
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", arg)?;
            }
            write!(f, ">")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Module(ModuleDecl),
    /// `import A.B;`
    Import {
        path: Vec<String>,
    },
    /// `using alias = A.B.name;`
    Using {
        alias: String,
        target: Vec<String>,
    },
    Var(VarDecl),
    Function(FunctionDecl),
    Struct(StructDecl),
    Expr(Expr),
    If {
        cond: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Option<Vec<Stmt>>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    Block(Vec<Stmt>),
    Return(Option<Expr>),
    Try(TryStmt),
    Throw(Option<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModuleDecl {
    pub name: String,
    pub body: Vec<Stmt>,
    pub module: Option<ModuleId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub name: String,
    pub is_const: bool,
    pub exported: bool,
    pub ty: Option<TypeExpr>,
    pub init: Option<Expr>,
    pub ident: Option<IdentId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: TypeExpr,
    pub default: Option<Expr>,
    pub ident: Option<IdentId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub generics: Vec<String>,
    pub params: Vec<Param>,
    pub ret: Option<TypeExpr>,
    pub body: Vec<Stmt>,
    pub exported: bool,
    pub func: Option<FuncId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeExpr,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDecl {
    pub name: String,
    pub generics: Vec<String>,
    pub fields: Vec<FieldDecl>,
    pub ty: Option<TypeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TryStmt {
    pub body: Vec<Stmt>,
    /// Name bound to the exception message inside the handler.
    pub catch_name: Option<String>,
    pub catch_ident: Option<IdentId>,
    pub handler: Vec<Stmt>,
}

/// Whether an expression is read or written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Access {
    #[default]
    Load,
    Store,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub access: Access,
    /// Filled in by the analyzer.
    pub ty: Option<TypeId>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => write!(f, "null"),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Int(i) => write!(f, "{}", i),
            Literal::Float(x) => write!(f, "{}", quill_values::Number::Float(*x)),
            Literal::Str(s) => write!(f, "{:?}", s),
        }
    }
}

/// How the analyzer resolved the callee of a call expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallTarget {
    /// A script function (or generic instance) called by index.
    Function(FuncId),
    /// A global native, by index into the unit's native table.
    Native(u32),
    /// A native method; the receiver is passed as the first argument.
    Method(u32),
    /// Whatever function value the callee evaluates to.
    Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    /// An elided operand. Evaluates to nothing.
    Empty,
    Variable {
        name: String,
        ident: Option<IdentId>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        generic_args: Vec<TypeExpr>,
        args: Vec<Expr>,
        target: Option<CallTarget>,
    },
    Member {
        object: Box<Expr>,
        name: String,
        /// Field index in the object's prototype.
        field: Option<u32>,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    New {
        ty: TypeExpr,
        args: Vec<Expr>,
    },
    ArrayLit(Vec<Expr>),
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self {
            kind,
            access: Access::Load,
            ty: None,
            span,
        }
    }

    pub fn literal(&self) -> Option<&Literal> {
        match &self.kind {
            ExprKind::Literal(lit) => Some(lit),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.kind, ExprKind::Empty)
    }

    /// The dotted path this expression spells, if it is only variables and
    /// member accesses (`A.B.c`).
    pub fn as_path(&self) -> Option<Vec<&str>> {
        match &self.kind {
            ExprKind::Variable { name, .. } => Some(vec![name.as_str()]),
            ExprKind::Member { object, name, .. } => {
                let mut path = object.as_path()?;
                path.push(name.as_str());
                Some(path)
            }
            _ => None,
        }
    }

    /// Cheap to evaluate into any register without touching the others.
    pub fn is_simple(&self) -> bool {
        matches!(self.kind, ExprKind::Literal(_) | ExprKind::Variable { .. })
    }

    fn precedence(&self) -> u8 {
        match &self.kind {
            ExprKind::Binary { op, .. } => op.precedence(),
            ExprKind::Assign { .. } => 0,
            ExprKind::Unary { .. } => UnaryOp::PRECEDENCE,
            _ => u8::MAX,
        }
    }
}

/// May evaluating this node have an observable effect?
pub trait SideEffects {
    fn has_side_effects(&self) -> bool;
}

/// Is this node a compile-time constant?
pub trait ConstantValue {
    fn constant_value(&self) -> Option<&Literal>;

    fn is_constant(&self) -> bool {
        self.constant_value().is_some()
    }
}

impl SideEffects for Expr {
    fn has_side_effects(&self) -> bool {
        match &self.kind {
            ExprKind::Literal(_) | ExprKind::Empty | ExprKind::Variable { .. } => false,
            // Arithmetic can throw (division by zero, bad operands).
            ExprKind::Binary { .. } | ExprKind::Unary { .. } => true,
            ExprKind::Assign { .. } | ExprKind::Call { .. } | ExprKind::New { .. } => true,
            ExprKind::Member { .. } | ExprKind::Index { .. } => true,
            ExprKind::ArrayLit(items) => items.iter().any(SideEffects::has_side_effects),
        }
    }
}

impl ConstantValue for Expr {
    fn constant_value(&self) -> Option<&Literal> {
        self.literal()
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let child = |f: &mut fmt::Formatter<'_>, e: &Expr, min: u8| {
            if e.precedence() < min {
                write!(f, "({})", e)
            } else {
                write!(f, "{}", e)
            }
        };
        match &self.kind {
            ExprKind::Literal(lit) => write!(f, "{}", lit),
            ExprKind::Empty => Ok(()),
            ExprKind::Variable { name, .. } => write!(f, "{}", name),
            ExprKind::Binary { op, left, right } => {
                let p = op.precedence();
                child(f, left, p)?;
                write!(f, " {} ", op.text())?;
                child(f, right, p + 1)
            }
            ExprKind::Unary { op, operand } => {
                write!(f, "{}", op.text())?;
                child(f, operand, UnaryOp::PRECEDENCE)
            }
            ExprKind::Assign { target, value } => write!(f, "{} = {}", target, value),
            ExprKind::Call { callee, args, .. } => {
                write!(f, "{}(", callee)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            ExprKind::Member { object, name, .. } => {
                child(f, object, u8::MAX)?;
                write!(f, ".{}", name)
            }
            ExprKind::Index { object, index } => {
                child(f, object, u8::MAX)?;
                write!(f, "[{}]", index)
            }
            ExprKind::New { ty, args } => {
                write!(f, "new {}(", ty)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            ExprKind::ArrayLit(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}
