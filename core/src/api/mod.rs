//! Public API for embedding Quill.
//!
//! An [`Engine`] holds the native bindings and default options. It turns an
//! already-parsed [`Script`](crate::syntax::Script) into a
//! [`Program`](crate::bytecode::Program) and loads programs into
//! [`VMState`](crate::vm::VMState)s.
//!
//! # Example
//!
//! ```
//! use quill_core::api::{Engine, EngineOptions};
//! use quill_core::stdlib;
//! use quill_core::syntax::build::*;
//! use quill_core::values::Value;
//!
//! let engine = Engine::new(EngineOptions::default(), stdlib::registry());
//! let program = engine
//!     .compile(
//!         script(vec![function(
//!             "twice",
//!             vec![param("n", ty("int"))],
//!             Some(ty("int")),
//!             vec![ret(Some(mul(var("n"), int(2))))],
//!         )]),
//!         &Default::default(),
//!     )
//!     .unwrap();
//!
//! let mut vm = engine.instantiate(program).unwrap();
//! vm.run_entry().unwrap();
//! assert_eq!(vm.call_function("twice", &[Value::Int(21)]), Ok(Value::Int(42)));
//! ```

pub mod engine;
pub mod error;
pub mod options;

pub use engine::Engine;
pub use error::{Diagnostic, Error, Severity};
pub use options::{
    CompileOptions, CompileOptionsOverride, EngineOptions, VmOptions, VmOptionsOverride,
};
