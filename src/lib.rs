//! Quill - an embeddable, statically checked scripting subsystem
//!
//! # Overview
//!
//! Hosts hand Quill an already-parsed [`Script`]. The [`Engine`] resolves
//! modules, identifiers and types, folds constants, and emits a bytecode
//! [`Program`] that runs on a [`VMState`] with cooperative threads, script
//! level `try`/`catch`, and a mark-and-sweep collected heap.
//!
//! # Quick Start
//!
//! ```
//! use quill::{Engine, EngineOptions, Value};
//! use quill::build::*;
//!
//! let engine = Engine::new(EngineOptions::default(), quill::stdlib::registry());
//! let (vm, result) = engine
//!     .run(
//!         script(vec![
//!             constant("scale", int(10)),
//!             expr_stmt(call(var("print"), vec![string("scaling")])),
//!             expr_stmt(mul(var("scale"), add(int(1), int(3)))),
//!         ]),
//!         &Default::default(),
//!     )
//!     .unwrap();
//! assert_eq!(result, Value::Int(40));
//! assert_eq!(vm.output(), ["scaling".to_owned()]);
//! ```
//!
//! # Natives
//!
//! Host functions are bound by owner and name together with a signature
//! string whose first type is the return type:
//!
//! ```
//! use quill::{Engine, EngineOptions, NativeCall, NativeRegistry, Value};
//! use quill::build::*;
//!
//! fn add(call: &mut NativeCall<'_, '_>) -> Value {
//!     match (call.arg(0), call.arg(1)) {
//!         (Value::Int(a), Value::Int(b)) => Value::Int(a + b),
//!         _ => Value::InvalidState("add expects two ints"),
//!     }
//! }
//!
//! let mut natives = NativeRegistry::new();
//! natives.bind("global", "add", "function<int, int, int>", add);
//! let engine = Engine::new(EngineOptions::default(), natives);
//!
//! let (_, result) = engine
//!     .run(script(vec![expr_stmt(call(var("add"), vec![int(40), int(2)]))]), &Default::default())
//!     .unwrap();
//! assert_eq!(result, Value::Int(42));
//! ```

// Error rendering utilities
pub mod error_renderer;
pub use error_renderer::{CharSet, RenderConfig, render_diagnostics, render_error, render_error_to};

// Re-export public API from quill_core
pub use quill_core::api::{
    CompileOptions, CompileOptionsOverride, Diagnostic, Engine, EngineOptions, Error, Severity,
    VmOptions, VmOptionsOverride,
};

pub use quill_core::bytecode::Program;
pub use quill_core::stdlib;
pub use quill_core::syntax::{self, Script, build};
pub use quill_core::values::{self, Value};
pub use quill_core::vm::{
    Exception, LibraryProvider, NativeCall, NativeFn, NativeRegistry, RuntimeError, VMState,
};
