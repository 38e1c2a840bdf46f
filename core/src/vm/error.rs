use core::fmt;

use quill_values::ValueError;
use thiserror::Error;

/// A failure raised while executing bytecode.
///
/// Everything except [`RuntimeError::InvalidProgram`] is an exception that
/// script code can catch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("cannot compare {left} with {right}")]
    InvalidComparison {
        left: &'static str,
        right: &'static str,
    },

    #[error("invalid operation `{op}` on {left} and {right}")]
    InvalidOperation {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },

    #[error("expected {expected} but found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("{name} expects {expected} argument(s) but was given {found}")]
    InvalidArgumentCount {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("null reference")]
    NullReference,

    #[error("division by zero")]
    DivisionByZero,

    #[error("index {index} is out of bounds for length {len}")]
    OutOfBounds { index: i64, len: usize },

    #[error("member {member} not found on {type_name}")]
    MemberNotFound { type_name: String, member: String },

    #[error("failed to load library `{name}`: {reason}")]
    LibraryLoad { name: String, reason: String },

    #[error("stack overflow: call depth exceeded {limit}")]
    StackOverflow { limit: usize },

    #[error("heap value has the wrong payload: {0}")]
    PayloadMismatch(String),

    /// Raised by a script `throw`.
    #[error("{0}")]
    Thrown(String),

    /// A native function reported failure.
    #[error("{0}")]
    Native(String),

    #[error("all {limit} execution threads are in use")]
    TooManyThreads { limit: usize },

    #[error("unknown function `{0}`")]
    UnknownFunction(String),

    /// The bytecode itself is inconsistent. Not catchable.
    #[error("invalid program: {0}")]
    InvalidProgram(String),
}

impl RuntimeError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, RuntimeError::InvalidProgram(_))
    }

    pub(crate) fn invalid_program(message: impl Into<String>) -> Self {
        RuntimeError::InvalidProgram(message.into())
    }
}

impl From<ValueError> for RuntimeError {
    fn from(error: ValueError) -> Self {
        match error {
            ValueError::TagMismatch { expected, found } => {
                RuntimeError::TypeMismatch { expected, found }
            }
            ValueError::PayloadMismatch { .. } => RuntimeError::PayloadMismatch(error.to_string()),
            ValueError::OutOfBounds { index, len } => RuntimeError::OutOfBounds { index, len },
            ValueError::NoSuchField { index, .. } => RuntimeError::MemberNotFound {
                type_name: "object".to_owned(),
                member: format!("#{}", index),
            },
        }
    }
}

/// An uncaught exception as the host sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exception {
    pub message: String,
    /// The error that started the unwind.
    pub error: RuntimeError,
}

impl From<RuntimeError> for Exception {
    fn from(error: RuntimeError) -> Self {
        Self {
            message: error.to_string(),
            error,
        }
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Exception {}
