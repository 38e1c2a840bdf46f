//! Public error types for the Quill API.
//!
//! Internal errors are converted to these types at API boundaries.

use core::fmt;

use crate::bytecode::ArtifactError;
use crate::diagnostics::{CompileError, CompileErrorKind, InternalError};
use crate::syntax::Span;
use crate::vm::Exception;

pub use crate::diagnostics::Severity;

/// Public error type for all Quill operations.
#[derive(Debug)]
pub enum Error {
    /// Invalid API usage (e.g. a native with a malformed signature).
    Api(String),

    /// The program has compile errors.
    ///
    /// Contains one diagnostic per recorded problem, in the order found.
    Compilation { diagnostics: Vec<Diagnostic> },

    /// An exception escaped the script.
    Runtime(Exception),

    /// A compiler invariant was broken. Always a bug in Quill.
    Internal(String),

    /// A serialized program could not be read or written.
    Artifact(String),
}

impl Error {
    /// Diagnostics of a [`Error::Compilation`], empty for other errors.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Error::Compilation { diagnostics } => diagnostics,
            _ => &[],
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Api(msg) => write!(f, "API error: {}", msg),
            Error::Compilation { diagnostics } => {
                let error_count = diagnostics
                    .iter()
                    .filter(|d| d.severity == Severity::Error)
                    .count();
                write!(f, "Compilation failed with {} error(s)", error_count)
            }
            Error::Runtime(exception) => write!(f, "Runtime error: {}", exception),
            Error::Internal(msg) => write!(f, "Internal error: {}", msg),
            Error::Artifact(msg) => write!(f, "Artifact error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

/// A diagnostic message (error, warning, or info) with source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,

    /// Primary diagnostic message.
    pub message: String,

    /// Source location of the primary issue. Empty when the problem has no
    /// place in the source, such as a missing native binding.
    pub span: Span,

    /// Help messages suggesting how to fix the issue.
    pub help: Vec<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>, span: Span) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            span,
            help: Vec::new(),
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help.push(help.into());
        self
    }
}

impl From<&CompileError> for Diagnostic {
    fn from(error: &CompileError) -> Self {
        let help = match &error.kind {
            CompileErrorKind::AmbiguousIdentifier { name, first, .. } => {
                vec![format!("qualify the name, e.g. `{}.{}`", first, name)]
            }
            CompileErrorKind::MissingModuleDeclaration => {
                vec!["add `module <name>;` as the first statement".to_owned()]
            }
            CompileErrorKind::ConstWithoutValue { .. } => {
                vec!["constants are bound once, at their declaration".to_owned()]
            }
            _ => Vec::new(),
        };
        Self {
            severity: error.severity,
            message: error.message(),
            span: error.span,
            help,
        }
    }
}

// ============================================================================
// Conversion from internal errors
// ============================================================================

impl From<Vec<CompileError>> for Error {
    fn from(errors: Vec<CompileError>) -> Self {
        Error::Compilation {
            diagnostics: errors.iter().map(Diagnostic::from).collect(),
        }
    }
}

impl From<InternalError> for Error {
    fn from(err: InternalError) -> Self {
        Error::Internal(err.to_string())
    }
}

impl From<Exception> for Error {
    fn from(exception: Exception) -> Self {
        Error::Runtime(exception)
    }
}

impl From<ArtifactError> for Error {
    fn from(err: ArtifactError) -> Self {
        Error::Artifact(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn compilation_counts_only_errors() {
        let error = Error::from(vec![
            CompileError::error(CompileErrorKind::ReturnOutsideFunction, Span::new(0, 6)),
            CompileError::warning(
                CompileErrorKind::Redefinition {
                    name: "x".to_owned(),
                },
                Span::new(7, 8),
            ),
        ]);
        assert_eq!(error.to_string(), "Compilation failed with 1 error(s)");
        assert_eq!(
            error.diagnostics()[0],
            Diagnostic::error("`return` outside of a function", Span::new(0, 6))
        );
        assert_eq!(error.diagnostics()[1].severity, Severity::Warning);
    }

    #[test]
    fn ambiguity_suggests_a_qualified_name() {
        let diagnostic = Diagnostic::from(&CompileError::error(
            CompileErrorKind::AmbiguousIdentifier {
                name: "shared".to_owned(),
                first: "A".to_owned(),
                second: "C".to_owned(),
            },
            Span::default(),
        ));
        assert_eq!(diagnostic.help, vec!["qualify the name, e.g. `A.shared`"]);
    }
}
