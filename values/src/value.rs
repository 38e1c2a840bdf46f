use core::fmt;

use crate::{Number, ValueError};

/// Index of an allocation in the VM heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeapRef(pub u32);

/// Index of a binding in the VM's native registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeRef(pub u32);

/// The slot a [`Value::Ref`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotRef {
    /// Absolute index into the owning thread's stack.
    Stack(u32),
    /// Index into static memory.
    Static(u32),
}

/// A script function: its index in the program's function table plus the
/// facts the call instruction needs without a table lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionRef {
    pub index: u32,
    pub address: u32,
    pub arity: u16,
}

/// Pushed by a call instruction just above the arguments; restores the
/// caller's frame on return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReturnRecord {
    pub return_address: u32,
    pub caller_base: u32,
    pub caller_argc: u16,
}

impl ReturnRecord {
    /// Return address meaning "hand control back to the host".
    pub const HOST: u32 = u32::MAX;
}

/// A fixed-size tagged runtime value.
///
/// Heap-backed values are owned by the heap; a `Value::Heap` is only a handle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// A reference to another value slot, reserved for host use. No
    /// instruction creates or dereferences it, and collection does not follow
    /// it: it names a slot, not an allocation.
    Ref(SlotRef),
    Heap(HeapRef),
    Function(FunctionRef),
    Native(NativeRef),
    /// Opaque data owned by the host.
    UserData(u64),
    Return(ReturnRecord),
    Address(u32),
    /// Handle into the VM's side table of host data that has no native
    /// representation.
    External(u32),
    /// Returned by native functions to report failure. Converted into a
    /// thrown exception by the instruction handler.
    InvalidState(&'static str),
}

static_assertions::const_assert!(core::mem::size_of::<Value>() <= 24);

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Ref(_) => "reference",
            Value::Heap(_) => "object",
            Value::Function(_) => "function",
            Value::Native(_) => "native function",
            Value::UserData(_) => "user data",
            Value::Return(_) => "return record",
            Value::Address(_) => "address",
            Value::External(_) => "external",
            Value::InvalidState(_) => "invalid state",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Truthiness used by conditional jumps.
    pub fn is_truthy(&self) -> bool {
        match *self {
            Value::Null => false,
            Value::Bool(b) => b,
            Value::Int(i) => i != 0,
            Value::Float(f) => f != 0.0,
            Value::InvalidState(_) => false,
            _ => true,
        }
    }

    fn mismatch(&self, expected: &'static str) -> ValueError {
        ValueError::TagMismatch {
            expected,
            found: self.type_name(),
        }
    }

    // === Exact accessors ===

    pub fn as_bool(&self) -> Result<bool, ValueError> {
        match *self {
            Value::Bool(b) => Ok(b),
            _ => Err(self.mismatch("bool")),
        }
    }

    /// Reads an `Int`. Fails on any other tag, including `Float`.
    pub fn as_int(&self) -> Result<i64, ValueError> {
        match *self {
            Value::Int(i) => Ok(i),
            _ => Err(self.mismatch("int")),
        }
    }

    /// Reads a `Float`. Fails on any other tag, including `Int`.
    pub fn as_float(&self) -> Result<f64, ValueError> {
        match *self {
            Value::Float(f) => Ok(f),
            _ => Err(self.mismatch("float")),
        }
    }

    pub fn as_heap(&self) -> Result<HeapRef, ValueError> {
        match *self {
            Value::Heap(r) => Ok(r),
            _ => Err(self.mismatch("object")),
        }
    }

    pub fn as_function(&self) -> Result<FunctionRef, ValueError> {
        match *self {
            Value::Function(f) => Ok(f),
            _ => Err(self.mismatch("function")),
        }
    }

    pub fn as_return(&self) -> Result<ReturnRecord, ValueError> {
        match *self {
            Value::Return(r) => Ok(r),
            _ => Err(self.mismatch("return record")),
        }
    }

    // === Coercing accessors ===

    /// The numeric payload, if this is an `Int` or a `Float`.
    pub fn number(&self) -> Option<Number> {
        match *self {
            Value::Int(i) => Some(Number::Int(i)),
            Value::Float(f) => Some(Number::Float(f)),
            _ => None,
        }
    }

    /// Reads any numeric value as an integer. Floats truncate toward zero
    /// and saturate at the `i64` bounds.
    pub fn to_int(&self) -> Result<i64, ValueError> {
        self.number()
            .map(Number::to_int)
            .ok_or_else(|| self.mismatch("number"))
    }

    /// Reads any numeric value as a float.
    pub fn to_float(&self) -> Result<f64, ValueError> {
        self.number()
            .map(Number::to_float)
            .ok_or_else(|| self.mismatch("number"))
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        match n {
            Number::Int(i) => Value::Int(i),
            Number::Float(f) => Value::Float(f),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

/// Formats scalar values. Heap values need the heap to be rendered and show
/// up as a handle here.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", Number::Float(*x)),
            Value::Ref(SlotRef::Stack(i)) => write!(f, "&stack[{}]", i),
            Value::Ref(SlotRef::Static(i)) => write!(f, "&static[{}]", i),
            Value::Heap(r) => write!(f, "<object #{}>", r.0),
            Value::Function(func) => write!(f, "<function @{}>", func.address),
            Value::Native(n) => write!(f, "<native #{}>", n.0),
            Value::UserData(d) => write!(f, "<user data {:#x}>", d),
            Value::Return(r) => write!(f, "<return @{}>", r.return_address),
            Value::Address(a) => write!(f, "@{}", a),
            Value::External(e) => write!(f, "<external #{}>", e),
            Value::InvalidState(msg) => write!(f, "<invalid state: {}>", msg),
        }
    }
}
