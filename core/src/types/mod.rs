//! Compile-time types: descriptors, the deduplicating registry and the
//! native signature parser.

mod registry;
mod signature;
mod symbol;

pub use registry::TypeRegistry;
pub use signature::{FunctionSignature, parse_signature};
pub use symbol::{GenericInstance, Member, PROTO, SymbolType, TypeId, TypeKind};
