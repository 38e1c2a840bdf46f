//! Quill core: compiler passes and the bytecode virtual machine.
//!
//! The pipeline runs in three passes over an already-parsed [`syntax::Script`]:
//!
//! 1. [`analyzer`] resolves identifiers, modules and types and records
//!    user-facing errors in the [`unit::CompilationUnit`].
//! 2. [`optimizer`] folds literal expressions and inlines constants.
//! 3. [`compiler`] emits [`bytecode`] chunks and links them into a
//!    [`bytecode::Program`].
//!
//! The [`vm`] module executes a `Program` on one or more cooperative threads
//! with a mark-and-sweep collected heap.

pub mod analyzer;
pub mod api;
pub mod bytecode;
pub mod compiler;
pub mod diagnostics;
pub mod optimizer;
pub mod source;
pub mod stdlib;
pub mod syntax;
pub mod types;
pub mod unit;
pub mod vm;

pub use quill_values as values;
