//! `string` methods.

use quill_values::Value;

use crate::vm::{NativeCall, NativeRegistry};

/// `s.length()`: length in code points, not bytes.
fn string_length(call: &mut NativeCall<'_, '_>) -> Value {
    match call.string(call.arg(0)) {
        Some(text) => Value::Int(text.chars().count() as i64),
        None => Value::InvalidState("length expects a string"),
    }
}

pub fn register_string_package(registry: &mut NativeRegistry) -> &mut NativeRegistry {
    registry.bind("string", "length", "function<int, string>", string_length)
}

#[cfg(test)]
#[path = "string_test.rs"]
mod string_test;
