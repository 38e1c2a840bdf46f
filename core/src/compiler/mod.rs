//! Code generation: turns the analyzed (and optionally optimized) tree into
//! [`BytecodeChunk`]s and links them into a [`Program`].
//!
//! Every expression leaves its value in `R0`. `R1` carries the right-hand
//! operand of binary operators and the index of indexed stores; `R2` carries
//! the object being written to. Function frames hold their arguments in
//! slots `0..argc`, the return record in slot `argc` and locals above it;
//! the entry frame has no arguments and starts its locals at slot 0.

mod expr;
mod stmt;

use core::mem;

use hashbrown::HashMap;

use crate::bytecode::{
    BytecodeChunk, Constant, FunctionEntry, Instruction, InstructionStream, Label, NativeImport,
    Program, Reg, StaticObject, TraceEntry,
};
use crate::diagnostics::InternalError;
use crate::syntax::{Script, Stmt, StmtKind};
use crate::types::{PROTO, TypeId, TypeKind};
use crate::unit::{CompilationUnit, FuncId, IdentId};

pub use expr::EvalOrder;

/// Most arguments a single call can pass.
pub const MAX_ARGS: usize = u8::MAX as usize;

/// Generates and links the program for an analyzed unit.
///
/// The unit must be free of compile errors; a tree that still contains
/// unresolved nodes is reported as an [`InternalError`].
pub fn compile(unit: &mut CompilationUnit, script: &Script) -> Result<Program, InternalError> {
    let mut compiler = Compiler::new(unit);
    let program = compiler.compile_script(script)?;
    tracing::debug!(
        instructions = program.code.len(),
        constants = program.constants.len(),
        functions = program.functions.len(),
        objects = program.static_objects.len(),
        "compiled program"
    );
    Ok(program)
}

/// Hashable form of a pooled constant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ConstantKey {
    Int(i64),
    Float(u64),
    Str(String),
}

/// Stack slots of the frame being generated.
#[derive(Debug, Default)]
struct Frame {
    slots: HashMap<IdentId, u32>,
    next_slot: u32,
}

impl Frame {
    fn entry() -> Self {
        Self::default()
    }

    /// Arguments first, then the return record, then locals.
    fn function(params: &[IdentId]) -> Self {
        let slots = params
            .iter()
            .enumerate()
            .map(|(slot, ident)| (*ident, slot as u32))
            .collect();
        Self {
            slots,
            next_slot: params.len() as u32 + 1,
        }
    }

    fn declare(&mut self, ident: IdentId) -> u32 {
        let slot = self.next_slot;
        self.slots.insert(ident, slot);
        self.next_slot += 1;
        slot
    }

    /// Forgets every slot at or above `mark`; returns how many there were.
    fn release(&mut self, mark: u32) -> u32 {
        let released = self.next_slot.saturating_sub(mark);
        self.slots.retain(|_, slot| *slot < mark);
        self.next_slot = mark;
        released
    }
}

pub struct Compiler<'u> {
    unit: &'u mut CompilationUnit,
    constants: Vec<Constant>,
    constant_map: HashMap<ConstantKey, u32>,
    static_objects: Vec<StaticObject>,
    /// Program function index of every function that has a body.
    function_index: HashMap<FuncId, u32>,
    next_label: u32,
    frame: Frame,
    /// Canonical path of the module being generated, for export names.
    module_path: String,
}

impl<'u> Compiler<'u> {
    pub fn new(unit: &'u mut CompilationUnit) -> Self {
        Self {
            unit,
            constants: Vec::new(),
            constant_map: HashMap::new(),
            static_objects: Vec::new(),
            function_index: HashMap::new(),
            next_label: 0,
            frame: Frame::entry(),
            module_path: String::new(),
        }
    }

    pub fn compile_script(&mut self, script: &Script) -> Result<Program, InternalError> {
        let compiled: Vec<FuncId> = (0..self.unit.functions.len())
            .map(|i| FuncId(i as u32))
            .filter(|id| self.unit.function(*id).body.is_some())
            .collect();
        for (index, id) in compiled.iter().enumerate() {
            self.function_index.insert(*id, index as u32);
        }
        self.link_struct_types();

        let mut chunks = vec![self.entry(script)?];
        let mut labels = Vec::with_capacity(compiled.len());
        for id in &compiled {
            let label = self.label();
            chunks.push(self.function(*id, label)?);
            labels.push(label);
        }

        let stream = InstructionStream::linearize(&chunks)?;
        let functions = compiled
            .iter()
            .zip(&labels)
            .map(|(id, label)| {
                let info = self.unit.function(*id);
                let address = stream
                    .address_of(*label)
                    .ok_or(InternalError::UnboundLabel(label.0))?;
                Ok(FunctionEntry {
                    name: info.name.clone(),
                    address,
                    arity: info.params.len() as u16,
                })
            })
            .collect::<Result<Vec<_>, InternalError>>()?;
        let natives = self
            .unit
            .natives
            .iter()
            .map(|n| NativeImport {
                owner: n.owner.clone(),
                name: n.name.clone(),
                signature: n.signature.clone(),
            })
            .collect();

        Ok(Program {
            code: stream.code,
            constants: mem::take(&mut self.constants),
            static_objects: mem::take(&mut self.static_objects),
            functions,
            natives,
            labels: stream.labels,
            trace: stream
                .trace
                .into_iter()
                .map(|(address, span)| TraceEntry { address, span })
                .collect(),
            statics: self.unit.static_count(),
            entry: 0,
        })
    }

    /// Top-level code: publishes exported functions, runs the script's
    /// statements and halts with the last value in `R0`.
    fn entry(&mut self, script: &Script) -> Result<BytecodeChunk, InternalError> {
        let mut chunk = BytecodeChunk::new();
        let mut exported: Vec<(String, u32)> = self
            .function_index
            .iter()
            .filter(|(id, _)| self.unit.function(**id).exported)
            .map(|(id, index)| (self.unit.function(*id).name.clone(), *index))
            .collect();
        exported.sort_by_key(|(_, index)| *index);
        for (name, index) in exported {
            let name = self.string_constant(&name);
            chunk
                .emit(Instruction::LoadFunction {
                    dst: Reg::R0,
                    function: index,
                })
                .emit(Instruction::Export { name, src: Reg::R0 });
        }

        self.frame = Frame::entry();
        self.scoped(&script.statements, &mut chunk)?;
        chunk.emit(Instruction::Halt);
        Ok(chunk)
    }

    fn function(&mut self, id: FuncId, label: Label) -> Result<BytecodeChunk, InternalError> {
        let info = &mut self.unit.functions[id.0 as usize];
        let body = info
            .body
            .take()
            .ok_or_else(|| InternalError::MalformedTree(format!("{} has no body", info.name)))?;
        let span = info
            .ident
            .map(|ident| self.unit.idents.get(ident).span)
            .unwrap_or_default();

        let params: Vec<IdentId> = body
            .params
            .iter()
            .map(|p| self.unit.idents.unalias(*p))
            .collect();
        self.frame = Frame::function(&params);

        let mut chunk = BytecodeChunk::new();
        chunk.bind(label).trace(span);
        let result = self.stmts(&body.stmts, &mut chunk);
        let falls_through = !ends_in_jump(&body.stmts);
        self.unit.functions[id.0 as usize].body = Some(body);
        result?;

        if falls_through {
            chunk
                .emit(Instruction::LoadNull { dst: Reg::R0 })
                .emit(Instruction::Return);
        }
        Ok(chunk)
    }

    /// Gives every concrete struct type an entry in the static-object table.
    fn link_struct_types(&mut self) {
        for index in 0..self.unit.types.len() {
            let id = TypeId(index as u32);
            let ty = self.unit.types.get(id);
            if ty.kind != TypeKind::Struct
                || !ty.generic_params.is_empty()
                || self.unit.types.is_open(id)
            {
                continue;
            }
            self.static_object(id);
        }
    }

    /// Index of the static object describing instances of `ty`, created on
    /// first use.
    fn static_object(&mut self, ty: TypeId) -> u32 {
        if let Some(index) = self.unit.types.get(ty).type_object {
            return index;
        }
        let members = self
            .unit
            .types
            .fields(ty)
            .iter()
            .filter(|m| m.name != PROTO)
            .map(|m| m.name.clone())
            .collect();
        let index = self.static_objects.len() as u32;
        self.static_objects.push(StaticObject {
            name: self.unit.type_name(ty),
            members,
        });
        self.unit.types.link_type_object(ty, index);
        index
    }

    fn label(&mut self) -> Label {
        let label = Label(self.next_label);
        self.next_label += 1;
        label
    }

    fn constant(&mut self, key: ConstantKey) -> u32 {
        if let Some(index) = self.constant_map.get(&key) {
            return *index;
        }
        let index = self.constants.len() as u32;
        self.constants.push(match &key {
            ConstantKey::Int(i) => Constant::Int(*i),
            ConstantKey::Float(bits) => Constant::Float(f64::from_bits(*bits)),
            ConstantKey::Str(s) => Constant::Str(s.clone()),
        });
        self.constant_map.insert(key, index);
        index
    }

    fn string_constant(&mut self, text: &str) -> u32 {
        self.constant(ConstantKey::Str(text.to_owned()))
    }

    fn export_name(&self, name: &str) -> String {
        if self.module_path.is_empty() {
            name.to_owned()
        } else {
            format!("{}.{}", self.module_path, name)
        }
    }

    fn local_slot(&self, ident: IdentId) -> Result<u32, InternalError> {
        let ident = self.unit.idents.unalias(ident);
        self.frame
            .slots
            .get(&ident)
            .copied()
            .ok_or_else(|| InternalError::UnresolvedIdentifier {
                name: self.unit.idents.get(ident).name.clone(),
            })
    }

    fn function_index(&self, id: FuncId) -> Result<u32, InternalError> {
        self.function_index.get(&id).copied().ok_or_else(|| {
            InternalError::MalformedTree(format!(
                "{} has no generated code",
                self.unit.function(id).name
            ))
        })
    }
}

/// Code after the last statement is unreachable.
fn ends_in_jump(stmts: &[Stmt]) -> bool {
    matches!(
        stmts.last().map(|s| &s.kind),
        Some(StmtKind::Return(_) | StmtKind::Throw(_))
    )
}

/// Discards `count` stack slots: one `Pop`, or a single `SubSp` for more.
fn pop_slots(chunk: &mut BytecodeChunk, count: u32) {
    match count {
        0 => {}
        1 => {
            chunk.emit(Instruction::Pop);
        }
        count => {
            chunk.emit(Instruction::SubSp { count });
        }
    }
}

#[cfg(test)]
#[path = "compiler_test.rs"]
mod compiler_test;
