//! The register/stack virtual machine.
//!
//! A [`VMState`] owns a loaded [`Program`](crate::bytecode::Program), its
//! static memory, the collected [`Heap`] and a fixed number of
//! [`ExecutionThread`] slots. Threads run cooperatively: one at a time, each
//! to completion.

pub mod arith;
mod error;
mod heap;
mod interpreter;
mod native;
mod state;
mod thread;

pub use error::{Exception, RuntimeError};
pub use heap::Heap;
pub use native::{LibraryProvider, NativeBinding, NativeCall, NativeFn, NativeRegistry};
pub use state::{ThreadId, VMState};
pub use thread::{ExecutionThread, TryHandler};

/// Upper bound on coexisting execution threads.
pub const MAX_THREADS: usize = 4;

#[cfg(test)]
#[path = "vm_test.rs"]
mod vm_test;
