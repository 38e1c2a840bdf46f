use crate::{HeapRef, VMArray, VMObject, VMString, Value, ValueError};

/// Discriminates the payload a [`HeapValue`] holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadTag {
    Array,
    String,
    Object,
}

/// The closed set of payloads that can live on the heap.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Array(VMArray),
    String(VMString),
    Object(VMObject),
}

impl Payload {
    pub fn tag(&self) -> PayloadTag {
        match self {
            Payload::Array(_) => PayloadTag::Array,
            Payload::String(_) => PayloadTag::String,
            Payload::Object(_) => PayloadTag::Object,
        }
    }

    /// Calls `f` for every heap reference held directly by this payload.
    pub fn for_each_ref(&self, mut f: impl FnMut(HeapRef)) {
        let values: &[Value] = match self {
            Payload::Array(array) => array.as_slice(),
            Payload::Object(object) => object.fields(),
            Payload::String(_) => &[],
        };
        for value in values {
            if let Value::Heap(r) = value {
                f(*r);
            }
        }
    }
}

/// Typed access to a [`Payload`] variant.
pub trait HeapPayload: Sized {
    const TAG: PayloadTag;

    fn from_payload(payload: &Payload) -> Option<&Self>;
    fn from_payload_mut(payload: &mut Payload) -> Option<&mut Self>;
    fn into_payload(self) -> Payload;
}

macro_rules! heap_payload {
    ($ty:ty, $variant:ident) => {
        impl HeapPayload for $ty {
            const TAG: PayloadTag = PayloadTag::$variant;

            fn from_payload(payload: &Payload) -> Option<&Self> {
                match payload {
                    Payload::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn from_payload_mut(payload: &mut Payload) -> Option<&mut Self> {
                match payload {
                    Payload::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn into_payload(self) -> Payload {
                Payload::$variant(self)
            }
        }

        impl From<$ty> for Payload {
            fn from(v: $ty) -> Self {
                Payload::$variant(v)
            }
        }
    };
}

heap_payload!(VMArray, Array);
heap_payload!(VMString, String);
heap_payload!(VMObject, Object);

/// One garbage-collected allocation.
///
/// The payload tag is stored next to the payload and checked on every typed
/// access, so asking for the wrong payload type is an error rather than a
/// silent reinterpretation.
#[derive(Debug, Clone, PartialEq)]
pub struct HeapValue {
    tag: PayloadTag,
    marked: bool,
    payload: Payload,
}

impl HeapValue {
    pub fn new(payload: impl Into<Payload>) -> Self {
        let payload = payload.into();
        Self {
            tag: payload.tag(),
            marked: false,
            payload,
        }
    }

    pub fn tag(&self) -> PayloadTag {
        self.tag
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn downcast<T: HeapPayload>(&self) -> Result<&T, ValueError> {
        let mismatch = ValueError::PayloadMismatch {
            expected: T::TAG,
            found: self.tag,
        };
        if self.tag != T::TAG {
            return Err(mismatch);
        }
        T::from_payload(&self.payload).ok_or(mismatch)
    }

    pub fn downcast_mut<T: HeapPayload>(&mut self) -> Result<&mut T, ValueError> {
        let mismatch = ValueError::PayloadMismatch {
            expected: T::TAG,
            found: self.tag,
        };
        if self.tag != T::TAG {
            return Err(mismatch);
        }
        T::from_payload_mut(&mut self.payload).ok_or(mismatch)
    }

    pub fn is_marked(&self) -> bool {
        self.marked
    }

    /// Marks the allocation; returns `false` if it was already marked.
    pub fn mark(&mut self) -> bool {
        !core::mem::replace(&mut self.marked, true)
    }

    pub fn unmark(&mut self) {
        self.marked = false;
    }

    /// Content equality: same payload type and equal payloads.
    pub fn payload_eq(&self, other: &HeapValue) -> bool {
        self.tag == other.tag && self.payload == other.payload
    }
}
