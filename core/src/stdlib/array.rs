//! `array` methods.

use quill_values::Value;

use crate::vm::{NativeCall, NativeRegistry};

/// `a.length()`
fn array_length(call: &mut NativeCall<'_, '_>) -> Value {
    match call.array(call.arg(0)) {
        Some(array) => Value::Int(array.len() as i64),
        None => Value::InvalidState("length expects an array"),
    }
}

/// `a.push(value)`: appends in place, growing the array as needed.
fn array_push(call: &mut NativeCall<'_, '_>) -> Value {
    let value = call.arg(1);
    match call.array_mut(call.arg(0)) {
        Some(array) => {
            array.push(value);
            Value::Null
        }
        None => Value::InvalidState("push expects an array"),
    }
}

/// `a.pop()`: removes and returns the last element.
fn array_pop(call: &mut NativeCall<'_, '_>) -> Value {
    match call.array_mut(call.arg(0)) {
        Some(array) => array
            .pop()
            .unwrap_or(Value::InvalidState("pop from an empty array")),
        None => Value::InvalidState("pop expects an array"),
    }
}

pub fn register_array_package(registry: &mut NativeRegistry) -> &mut NativeRegistry {
    registry
        .bind("array", "length", "function<int, array>", array_length)
        .bind("array", "push", "function<void, array, any>", array_push)
        .bind("array", "pop", "function<any, array>", array_pop)
}

#[cfg(test)]
#[path = "array_test.rs"]
mod array_test;
