//! Syntax tree, spans and the operator table.

pub mod ast;
pub mod build;
pub mod operators;
mod span;

pub use ast::{
    Access, CallTarget, ConstantValue, Expr, ExprKind, FieldDecl, FunctionDecl, Literal,
    ModuleDecl, Param, Script, SideEffects, Stmt, StmtKind, StructDecl, TryStmt, TypeExpr,
    VarDecl,
};
pub use operators::{BinaryOp, OpCategory, UnaryOp};
pub use span::Span;
