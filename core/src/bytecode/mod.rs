//! Bytecode: instructions, chunks, linearization and the loadable program.

mod chunk;
mod instruction;
mod program;

pub use chunk::{Buildable, BytecodeChunk, InstructionStream};
pub use instruction::{BinaryOpcode, Instruction, Label, Reg, UnaryOpcode};
pub use program::{
    ArtifactError, Constant, FunctionEntry, MAGIC, NativeImport, Op, Program, StaticObject,
    TraceEntry,
};
