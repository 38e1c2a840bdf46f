use crate::diagnostics::InternalError;
use crate::syntax::Span;

use super::{Instruction, Label};

/// One emitted unit, prior to linearization.
#[derive(Debug, Clone, PartialEq)]
pub enum Buildable {
    Instruction(Instruction<Label>),
    /// Binds a label to the address of the next instruction.
    Label(Label),
    /// The following instructions were generated from `span`.
    Trace(Span),
    Chunk(BytecodeChunk),
}

/// An ordered, appendable, nestable sequence of [`Buildable`] units.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BytecodeChunk {
    units: Vec<Buildable>,
}

impl BytecodeChunk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, instruction: Instruction<Label>) -> &mut Self {
        self.units.push(Buildable::Instruction(instruction));
        self
    }

    pub fn bind(&mut self, label: Label) -> &mut Self {
        self.units.push(Buildable::Label(label));
        self
    }

    pub fn trace(&mut self, span: Span) -> &mut Self {
        self.units.push(Buildable::Trace(span));
        self
    }

    pub fn append(&mut self, chunk: BytecodeChunk) -> &mut Self {
        if !chunk.units.is_empty() {
            self.units.push(Buildable::Chunk(chunk));
        }
        self
    }

    pub fn units(&self) -> &[Buildable] {
        &self.units
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Instructions in emission order, nested chunks flattened.
    pub fn instructions(&self) -> Vec<Instruction<Label>> {
        let mut out = Vec::new();
        self.collect_instructions(&mut out);
        out
    }

    fn collect_instructions(&self, out: &mut Vec<Instruction<Label>>) {
        for unit in &self.units {
            match unit {
                Buildable::Instruction(ins) => out.push(*ins),
                Buildable::Chunk(chunk) => chunk.collect_instructions(out),
                Buildable::Label(_) | Buildable::Trace(_) => {}
            }
        }
    }
}

/// The linear result of flattening chunks: resolved code, the label table
/// and source-trace markers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstructionStream {
    pub code: Vec<Instruction<u32>>,
    /// Address of each bound label, indexed by label id.
    pub labels: Vec<Option<u32>>,
    /// `(address, span)` for every trace marker, in address order.
    pub trace: Vec<(u32, Span)>,
}

impl InstructionStream {
    /// Flattens `chunks` in order and resolves every jump target.
    pub fn linearize(chunks: &[BytecodeChunk]) -> Result<Self, InternalError> {
        let mut pending = Vec::new();
        let mut labels: Vec<Option<u32>> = Vec::new();
        let mut trace = Vec::new();
        for chunk in chunks {
            flatten(chunk, &mut pending, &mut labels, &mut trace)?;
        }

        let code = pending
            .into_iter()
            .map(|ins: Instruction<Label>| {
                ins.map_target(|label| {
                    labels
                        .get(label.0 as usize)
                        .copied()
                        .flatten()
                        .ok_or(InternalError::UnboundLabel(label.0))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::trace!(
            instructions = code.len(),
            labels = labels.len(),
            "linearized bytecode"
        );
        Ok(Self {
            code,
            labels,
            trace,
        })
    }

    pub fn address_of(&self, label: Label) -> Option<u32> {
        self.labels.get(label.0 as usize).copied().flatten()
    }
}

fn flatten(
    chunk: &BytecodeChunk,
    code: &mut Vec<Instruction<Label>>,
    labels: &mut Vec<Option<u32>>,
    trace: &mut Vec<(u32, Span)>,
) -> Result<(), InternalError> {
    for unit in chunk.units() {
        let address = code.len() as u32;
        match unit {
            Buildable::Instruction(ins) => code.push(*ins),
            Buildable::Label(label) => {
                let index = label.0 as usize;
                if labels.len() <= index {
                    labels.resize(index + 1, None);
                }
                if labels[index].replace(address).is_some() {
                    return Err(InternalError::DuplicateLabel(label.0));
                }
            }
            Buildable::Trace(span) => {
                // Consecutive markers at one address: the last one wins.
                if let Some(last) = trace.last_mut().filter(|(a, _)| *a == address) {
                    last.1 = *span;
                } else {
                    trace.push((address, *span));
                }
            }
            Buildable::Chunk(inner) => flatten(inner, code, labels, trace)?,
        }
    }
    Ok(())
}
