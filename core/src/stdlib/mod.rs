//! Quill standard library.
//!
//! A deliberately small set of natives:
//! - runtime: `print`, `to_string`
//! - array: `length`, `push`, `pop`
//! - string: `length`
//!
//! Each package registers its functions on a [`NativeRegistry`]; the
//! registry is handed to [`Engine::new`](crate::api::Engine::new), which
//! declares the signatures to the compiler and binds the functions in every
//! VM it creates.

use crate::vm::NativeRegistry;

pub mod array;
pub mod runtime;
pub mod string;

pub use array::register_array_package;
pub use runtime::register_runtime_package;
pub use string::register_string_package;

/// Register all standard library packages.
pub fn register_stdlib(registry: &mut NativeRegistry) -> &mut NativeRegistry {
    register_runtime_package(registry);
    register_array_package(registry);
    register_string_package(registry)
}

/// A registry holding the whole standard library.
pub fn registry() -> NativeRegistry {
    let mut registry = NativeRegistry::new();
    register_stdlib(&mut registry);
    registry
}
