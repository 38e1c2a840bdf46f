//! Compile-time error taxonomy.
//!
//! User-facing problems are [`CompileError`]s: they are pushed onto the
//! compilation unit's error list and the pass keeps going. Compiler bugs are
//! [`InternalError`]s: they travel through `Result` and stop the compilation
//! on the spot.

use core::fmt;

use thiserror::Error;

use crate::syntax::Span;

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// A recorded problem in the analyzed program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    pub severity: Severity,
    pub kind: CompileErrorKind,
    pub span: Span,
}

impl CompileError {
    pub fn error(kind: CompileErrorKind, span: Span) -> Self {
        Self {
            severity: Severity::Error,
            kind,
            span,
        }
    }

    pub fn warning(kind: CompileErrorKind, span: Span) -> Self {
        Self {
            severity: Severity::Warning,
            kind,
            span,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn message(&self) -> String {
        self.kind.to_string()
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {} at {}", self.severity, self.kind, self.span)
    }
}

/// The message key of a [`CompileError`], with its interpolated context.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileErrorKind {
    #[error("unknown module `{name}`")]
    UnknownModule { name: String },

    #[error("unknown identifier `{name}`")]
    UnknownIdentifier { name: String },

    #[error("`{name}` is ambiguous: it is defined in both `{first}` and `{second}`")]
    AmbiguousIdentifier {
        name: String,
        first: String,
        second: String,
    },

    #[error("unknown type `{name}`")]
    UnknownType { name: String },

    #[error("type `{type_name}` has no prototype and cannot hold values")]
    MissingPrototype { type_name: String },

    #[error("type `{type_name}` cannot be used for a constant")]
    NotAConstantType { type_name: String },

    #[error("constant `{name}` must be initialized")]
    ConstWithoutValue { name: String },

    #[error("cannot assign to constant `{name}`")]
    AssignToConst { name: String },

    #[error("expected `{expected}` but found `{found}`")]
    TypeMismatch { expected: String, found: String },

    #[error("a value of type `{type_name}` cannot be called")]
    NotCallable { type_name: String },

    #[error("`{name}` expects {expected} argument(s) but was given {found}")]
    ArgumentCount {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("`{name}` expects {expected} type argument(s) but was given {found}")]
    GenericArgumentCount {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("cannot infer type parameter `{param}` of `{name}`")]
    CannotInferGeneric { name: String, param: String },

    #[error("type `{type_name}` has no member `{member}`")]
    MemberNotFound { type_name: String, member: String },

    #[error("operator `{op}` cannot be applied to `{left}` and `{right}`")]
    InvalidOperands {
        op: String,
        left: String,
        right: String,
    },

    #[error("condition must be `bool`, found `{found}`")]
    ConditionNotBool { found: String },

    #[error("`return` outside of a function")]
    ReturnOutsideFunction,

    #[error("`{name}` is already defined in this scope")]
    Redefinition { name: String },

    #[error("the program must start with a module declaration")]
    MissingModuleDeclaration,

    #[error("no native function `{name}` is bound for `{owner}`")]
    UnknownNative { owner: String, name: String },

    #[error("invalid native signature `{signature}`: {reason}")]
    InvalidSignature { signature: String, reason: String },

    #[error("`{name}` is a {what}, not a value")]
    NotAValue { name: String, what: &'static str },
}

/// A broken compiler invariant. Never caused by the input program alone.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InternalError {
    #[error("cannot go back {requested} byte(s) from offset {offset}")]
    StreamUnderflow { requested: usize, offset: usize },

    #[error("cannot read {requested} byte(s) with only {remaining} remaining")]
    StreamOverRead { requested: usize, remaining: usize },

    #[error("{node} is missing its {child}")]
    MissingChild {
        node: &'static str,
        child: &'static str,
    },

    #[error("malformed tree: {0}")]
    MalformedTree(String),

    #[error("identifier `{name}` reached code generation unresolved")]
    UnresolvedIdentifier { name: String },

    #[error("label {0} is used but never bound")]
    UnboundLabel(u32),

    #[error("label {0} is bound twice")]
    DuplicateLabel(u32),

    #[error("{what} exceeds the limit of {limit}")]
    LimitExceeded { what: &'static str, limit: usize },
}
