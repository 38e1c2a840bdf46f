use thiserror::Error;

use crate::PayloadTag;

/// Errors raised when a value is accessed as something it is not.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("expected {expected} but found {found}")]
    TagMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("heap payload is {found:?}, not {expected:?}")]
    PayloadMismatch {
        expected: PayloadTag,
        found: PayloadTag,
    },

    #[error("index {index} is out of bounds for length {len}")]
    OutOfBounds { index: i64, len: usize },

    #[error("field {index} does not exist (object has {count} fields)")]
    NoSuchField { index: usize, count: usize },
}
