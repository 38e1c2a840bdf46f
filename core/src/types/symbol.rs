use core::fmt;

use crate::syntax::Expr;

/// Name of the member that describes a type's instance layout.
pub const PROTO: &str = "$proto";

/// Stable id of a registered [`SymbolType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

impl TypeId {
    pub const VOID: TypeId = TypeId(0);
    pub const NULL: TypeId = TypeId(1);
    pub const ANY: TypeId = TypeId(2);
    pub const BOOL: TypeId = TypeId(3);
    pub const INT: TypeId = TypeId(4);
    pub const FLOAT: TypeId = TypeId(5);
    pub const STRING: TypeId = TypeId(6);
    /// The generic `array<T>` base.
    pub const ARRAY: TypeId = TypeId(7);

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn is_numeric(self) -> bool {
        self == TypeId::INT || self == TypeId::FLOAT
    }

    /// Types whose literals can be bound to a `const`.
    pub fn is_constant_type(self) -> bool {
        matches!(
            self,
            TypeId::BOOL | TypeId::INT | TypeId::FLOAT | TypeId::STRING
        )
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Void,
    Null,
    Any,
    Bool,
    Int,
    Float,
    String,
    /// `None` is the uninstantiated `array<T>` base.
    Array { element: Option<TypeId> },
    Function { params: Vec<TypeId>, ret: TypeId },
    Struct,
    /// Instance layout of another type; its members are the fields.
    Prototype,
    GenericParam(u16),
    Module,
}

impl TypeKind {
    /// Values of this kind live on the heap or may be `null`.
    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            TypeKind::Null
                | TypeKind::Any
                | TypeKind::String
                | TypeKind::Array { .. }
                | TypeKind::Function { .. }
                | TypeKind::Struct
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub name: String,
    pub ty: TypeId,
    /// Used when an instance is created without a value for this member.
    pub default: Option<Expr>,
}

impl Member {
    pub fn new(name: impl Into<String>, ty: TypeId) -> Self {
        Self {
            name: name.into(),
            ty,
            default: None,
        }
    }
}

/// Records which generic type a concrete type was instantiated from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GenericInstance {
    pub base: TypeId,
    pub args: Vec<TypeId>,
}

/// Compile-time type descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolType {
    pub name: String,
    pub kind: TypeKind,
    pub members: Vec<Member>,
    pub generic_params: Vec<String>,
    pub instance: Option<GenericInstance>,
    /// Index of this type's entry in the program's static-object table.
    pub type_object: Option<u32>,
    /// Number of value slots an instance occupies.
    pub size: u32,
}

impl SymbolType {
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        let size = match kind {
            TypeKind::Void | TypeKind::Module | TypeKind::Prototype => 0,
            _ => 1,
        };
        Self {
            name: name.into(),
            kind,
            members: Vec::new(),
            generic_params: Vec::new(),
            instance: None,
            type_object: None,
            size,
        }
    }

    pub fn with_members(mut self, members: Vec<Member>) -> Self {
        self.members = members;
        self
    }

    pub fn member(&self, name: &str) -> Option<(usize, &Member)> {
        self.members.iter().enumerate().find(|(_, m)| m.name == name)
    }

    /// The `$proto` member's type, if this type can hold values.
    pub fn proto(&self) -> Option<TypeId> {
        self.member(PROTO).map(|(_, m)| m.ty)
    }

    pub fn is_generic(&self) -> bool {
        !self.generic_params.is_empty()
    }

    /// Same name, size, kind, members (by name and type), generic parameters
    /// and instantiation. Member defaults do not take part.
    pub fn structurally_equal(&self, other: &SymbolType) -> bool {
        self.name == other.name
            && self.size == other.size
            && self.kind == other.kind
            && self.generic_params == other.generic_params
            && self.instance == other.instance
            && self.members.len() == other.members.len()
            && self
                .members
                .iter()
                .zip(&other.members)
                .all(|(a, b)| a.name == b.name && a.ty == b.ty)
    }
}
