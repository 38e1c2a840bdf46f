use core::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::syntax::Span;

use super::Instruction;

/// Magic bytes in front of every serialized [`Program`].
pub const MAGIC: &[u8; 4] = b"QBC1";

/// A linked instruction.
pub type Op = Instruction<u32>;

static_assertions::const_assert!(core::mem::size_of::<Op>() <= 16);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constant {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Null => write!(f, "null"),
            Constant::Bool(b) => write!(f, "bool {}", b),
            Constant::Int(i) => write!(f, "int {}", i),
            Constant::Float(x) => write!(f, "float {}", quill_values::Number::Float(*x)),
            Constant::Str(s) => write!(f, "string {:?}", s),
        }
    }
}

/// A named struct layout: the member names of its instances, in field order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticObject {
    pub name: String,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionEntry {
    pub name: String,
    pub address: u32,
    pub arity: u16,
}

/// A native the program calls, bound by `(owner, name)` when loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeImport {
    pub owner: String,
    pub name: String,
    pub signature: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub address: u32,
    pub span: Span,
}

/// The relocatable artifact the VM loads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub code: Vec<Op>,
    pub constants: Vec<Constant>,
    pub static_objects: Vec<StaticObject>,
    pub functions: Vec<FunctionEntry>,
    pub natives: Vec<NativeImport>,
    /// Resolved address of every label, by label id.
    pub labels: Vec<Option<u32>>,
    pub trace: Vec<TraceEntry>,
    /// Number of static memory slots.
    pub statics: u32,
    /// Address the entry thread starts at.
    pub entry: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArtifactError {
    #[error("not a Quill bytecode artifact")]
    BadMagic,
    #[error("failed to decode artifact: {0}")]
    Decode(String),
    #[error("failed to encode artifact: {0}")]
    Encode(String),
}

impl Program {
    pub fn to_bytes(&self) -> Result<Vec<u8>, ArtifactError> {
        let body = postcard::to_allocvec(self).map_err(|e| ArtifactError::Encode(e.to_string()))?;
        let mut bytes = Vec::with_capacity(MAGIC.len() + body.len());
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&body);
        Ok(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArtifactError> {
        let body = bytes.strip_prefix(MAGIC).ok_or(ArtifactError::BadMagic)?;
        postcard::from_bytes(body).map_err(|e| ArtifactError::Decode(e.to_string()))
    }

    /// Source span of the statement that produced the instruction at
    /// `address`.
    pub fn span_at(&self, address: u32) -> Option<Span> {
        let index = self.trace.partition_point(|t| t.address <= address);
        index.checked_sub(1).map(|i| self.trace[i].span)
    }

    pub fn function(&self, name: &str) -> Option<(u32, &FunctionEntry)> {
        self.functions
            .iter()
            .enumerate()
            .find(|(_, f)| f.name == name)
            .map(|(i, f)| (i as u32, f))
    }
}

/// Disassembly listing.
impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.constants.is_empty() {
            writeln!(f, "constants:")?;
            for (i, constant) in self.constants.iter().enumerate() {
                writeln!(f, "  k{:<4} {}", i, constant)?;
            }
        }
        if !self.static_objects.is_empty() {
            writeln!(f, "objects:")?;
            for (i, object) in self.static_objects.iter().enumerate() {
                writeln!(f, "  o{:<4} {} {{ {} }}", i, object.name, object.members.join(", "))?;
            }
        }
        if !self.natives.is_empty() {
            writeln!(f, "natives:")?;
            for (i, native) in self.natives.iter().enumerate() {
                writeln!(f, "  n{:<4} {}.{} {}", i, native.owner, native.name, native.signature)?;
            }
        }
        writeln!(f, "code:")?;
        let mut trace = self.trace.iter().peekable();
        for (address, op) in self.code.iter().enumerate() {
            let address = address as u32;
            if address == self.entry {
                writeln!(f, "<entry>:")?;
            }
            for func in self.functions.iter().filter(|func| func.address == address) {
                writeln!(f, "<{}/{}>:", func.name, func.arity)?;
            }
            while let Some(entry) = trace.next_if(|t| t.address <= address) {
                if entry.address == address {
                    writeln!(f, "        ; {}", entry.span)?;
                }
            }
            match op {
                Instruction::LoadConst { index, .. } | Instruction::Export { name: index, .. } => {
                    let constant = self.constants.get(*index as usize);
                    match constant {
                        Some(c) => writeln!(f, "  {:04}  {:<28} ; {}", address, op.to_string(), c)?,
                        None => writeln!(f, "  {:04}  {}", address, op)?,
                    }
                }
                _ => writeln!(f, "  {:04}  {}", address, op)?,
            }
        }
        Ok(())
    }
}
