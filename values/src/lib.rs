//! Runtime values for the Quill virtual machine.
//!
//! This crate defines the fixed-size tagged [`Value`] that lives in registers,
//! stack slots and static memory, and the garbage-collected [`HeapValue`]
//! allocations it may point at.
//!
//! # Example
//!
//! ```
//! use quill_values::{HeapValue, Value, VMArray};
//!
//! let v = Value::Int(40);
//! assert_eq!(v.to_float().unwrap(), 40.0);
//!
//! let mut array = VMArray::new();
//! array.push(v);
//! let heap = HeapValue::new(array);
//! assert_eq!(heap.downcast::<VMArray>().unwrap().len(), 1);
//! ```

#![deny(unsafe_code)]

mod array;
mod error;
mod heap_value;
mod number;
mod object;
mod string;
mod value;

pub use array::VMArray;
pub use error::ValueError;
pub use heap_value::{HeapPayload, HeapValue, Payload, PayloadTag};
pub use number::Number;
pub use object::VMObject;
pub use string::VMString;
pub use value::{FunctionRef, HeapRef, NativeRef, ReturnRecord, SlotRef, Value};
