//! Global runtime functions.

use quill_values::Value;

use crate::unit::GLOBAL_OWNER;
use crate::vm::{NativeCall, NativeRegistry};

/// `print(value)`: appends the value's text to the VM output.
fn print(call: &mut NativeCall<'_, '_>) -> Value {
    let line = call.format(call.arg(0));
    call.print(line);
    Value::Null
}

/// `to_string(value)`: the text `print` would show.
fn to_string(call: &mut NativeCall<'_, '_>) -> Value {
    let value = call.arg(0);
    if call.string(value).is_some() {
        return value;
    }
    let text = call.format(value);
    call.alloc_string(text)
}

pub fn register_runtime_package(registry: &mut NativeRegistry) -> &mut NativeRegistry {
    registry
        .bind(GLOBAL_OWNER, "print", "function<void, any>", print)
        .bind(GLOBAL_OWNER, "to_string", "function<string, any>", to_string)
}

#[cfg(test)]
#[path = "runtime_test.rs"]
mod runtime_test;
