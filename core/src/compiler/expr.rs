use crate::bytecode::{BytecodeChunk, Instruction, Reg};
use crate::diagnostics::InternalError;
use crate::syntax::{BinaryOp, CallTarget, Expr, ExprKind, Literal};
use crate::unit::{IdentId, Storage};

use super::{Compiler, ConstantKey, MAX_ARGS};

/// How the two operands of a binary operator reach `R0` and `R1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalOrder {
    /// The left operand is evaluated into `R0`, then the right one, a plain
    /// load, goes straight into `R1`.
    LeftThenRight,
    /// The right operand is evaluated into `R0` and moved to `R1`; the left
    /// one is a literal and is loaded last.
    RightThenLeft,
    /// The left operand is evaluated and pushed while the right one is
    /// evaluated, then popped back into `R0`.
    LeftPushedThenRight,
}

impl EvalOrder {
    pub fn select(left: &Expr, right: &Expr) -> Self {
        if right.is_simple() {
            EvalOrder::LeftThenRight
        } else if left.literal().is_some() {
            EvalOrder::RightThenLeft
        } else {
            EvalOrder::LeftPushedThenRight
        }
    }
}

impl Compiler<'_> {
    /// Emits code that leaves the value of `expr` in `R0`.
    pub(super) fn expr(&mut self, expr: &Expr, chunk: &mut BytecodeChunk) -> Result<(), InternalError> {
        match &expr.kind {
            ExprKind::Literal(_) | ExprKind::Variable { .. } => self.load(expr, Reg::R0, chunk)?,
            ExprKind::Empty => {}
            ExprKind::Binary { op, left, right } => {
                if right.is_empty() {
                    return self.expr(left, chunk);
                }
                match op.opcode() {
                    Some(opcode) => {
                        self.operands(left, right, chunk)?;
                        chunk.emit(Instruction::Binary {
                            op: opcode,
                            dst: Reg::R0,
                            lhs: Reg::R0,
                            rhs: Reg::R1,
                        });
                    }
                    None => self.short_circuit(*op, left, right, chunk)?,
                }
            }
            ExprKind::Unary { op, operand } => {
                self.expr(operand, chunk)?;
                chunk.emit(Instruction::Unary {
                    op: op.opcode(),
                    dst: Reg::R0,
                    src: Reg::R0,
                });
            }
            ExprKind::Assign { target, value } => self.assign(target, value, chunk)?,
            ExprKind::Call {
                callee,
                args,
                target,
                ..
            } => self.call(callee, args, *target, chunk)?,
            ExprKind::Member { object, field, name } => {
                let field = field.ok_or_else(|| {
                    InternalError::MalformedTree(format!("member `{}` was not resolved", name))
                })?;
                self.expr(object, chunk)?;
                chunk.emit(Instruction::GetField {
                    dst: Reg::R0,
                    object: Reg::R0,
                    field,
                });
            }
            ExprKind::Index { object, index } => {
                self.operands(object, index, chunk)?;
                chunk.emit(Instruction::GetIndex {
                    dst: Reg::R0,
                    object: Reg::R0,
                    index: Reg::R1,
                });
            }
            ExprKind::New { ty, args } => {
                let resolved = expr.ty.ok_or_else(|| {
                    InternalError::MalformedTree(format!("type of `new {}` was not resolved", ty))
                })?;
                let object = self.static_object(resolved);
                let argc = self.push_args(args, chunk)?;
                chunk.emit(Instruction::NewObject {
                    dst: Reg::R0,
                    object,
                    argc,
                });
            }
            ExprKind::ArrayLit(items) => {
                for item in items {
                    self.expr(item, chunk)?;
                    chunk.emit(Instruction::Push { src: Reg::R0 });
                }
                chunk.emit(Instruction::NewArray {
                    dst: Reg::R0,
                    count: items.len() as u32,
                });
            }
        }
        Ok(())
    }

    /// Loads a literal or a variable into `dst` without touching any other
    /// register.
    fn load(&mut self, expr: &Expr, dst: Reg, chunk: &mut BytecodeChunk) -> Result<(), InternalError> {
        let instruction = match &expr.kind {
            ExprKind::Literal(Literal::Null) => Instruction::LoadNull { dst },
            ExprKind::Literal(Literal::Bool(value)) => Instruction::LoadBool { dst, value: *value },
            ExprKind::Literal(Literal::Int(i)) => Instruction::LoadConst {
                dst,
                index: self.constant(ConstantKey::Int(*i)),
            },
            ExprKind::Literal(Literal::Float(f)) => Instruction::LoadConst {
                dst,
                index: self.constant(ConstantKey::Float(f.to_bits())),
            },
            ExprKind::Literal(Literal::Str(s)) => Instruction::LoadConst {
                dst,
                index: self.string_constant(s),
            },
            ExprKind::Variable { name, ident } => {
                let ident = resolved(name, *ident)?;
                match self.unit.idents.get(ident).storage {
                    Storage::Local => Instruction::LoadLocal {
                        dst,
                        slot: self.local_slot(ident)?,
                    },
                    Storage::Static(index) => Instruction::LoadStatic { dst, index },
                    Storage::Function(function) => Instruction::LoadFunction {
                        dst,
                        function: self.function_index(function)?,
                    },
                    Storage::Native(native) => Instruction::LoadNative { dst, native },
                    storage => {
                        return Err(InternalError::MalformedTree(format!(
                            "cannot load `{}` stored as {:?}",
                            name, storage
                        )));
                    }
                }
            }
            _ => {
                self.expr(expr, chunk)?;
                if dst != Reg::R0 {
                    chunk.emit(Instruction::Move { dst, src: Reg::R0 });
                }
                return Ok(());
            }
        };
        chunk.emit(instruction);
        Ok(())
    }

    /// Leaves `left` in `R0` and `right` in `R1`.
    fn operands(
        &mut self,
        left: &Expr,
        right: &Expr,
        chunk: &mut BytecodeChunk,
    ) -> Result<EvalOrder, InternalError> {
        let order = EvalOrder::select(left, right);
        match order {
            EvalOrder::LeftThenRight => {
                self.expr(left, chunk)?;
                self.load(right, Reg::R1, chunk)?;
            }
            EvalOrder::RightThenLeft => {
                self.expr(right, chunk)?;
                chunk.emit(Instruction::Move {
                    dst: Reg::R1,
                    src: Reg::R0,
                });
                self.load(left, Reg::R0, chunk)?;
            }
            EvalOrder::LeftPushedThenRight => {
                self.expr(left, chunk)?;
                chunk.emit(Instruction::Push { src: Reg::R0 });
                self.expr(right, chunk)?;
                chunk
                    .emit(Instruction::Move {
                        dst: Reg::R1,
                        src: Reg::R0,
                    })
                    .emit(Instruction::PopReg { dst: Reg::R0 });
            }
        }
        Ok(order)
    }

    /// `&&` and `||`: the right operand only runs when the left one does
    /// not decide the result.
    fn short_circuit(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        chunk: &mut BytecodeChunk,
    ) -> Result<(), InternalError> {
        let end = self.label();
        self.expr(left, chunk)?;
        chunk.emit(match op {
            BinaryOp::Or => Instruction::JumpIfTrue {
                cond: Reg::R0,
                target: end,
            },
            _ => Instruction::JumpIfFalse {
                cond: Reg::R0,
                target: end,
            },
        });
        self.expr(right, chunk)?;
        chunk.bind(end);
        Ok(())
    }

    fn assign(&mut self, target: &Expr, value: &Expr, chunk: &mut BytecodeChunk) -> Result<(), InternalError> {
        match &target.kind {
            ExprKind::Variable { name, ident } => {
                let ident = resolved(name, *ident)?;
                self.expr(value, chunk)?;
                let store = match self.unit.idents.get(ident).storage {
                    Storage::Local => Instruction::StoreLocal {
                        slot: self.local_slot(ident)?,
                        src: Reg::R0,
                    },
                    Storage::Static(index) => Instruction::StoreStatic { index, src: Reg::R0 },
                    storage => {
                        return Err(InternalError::MalformedTree(format!(
                            "cannot store to `{}` stored as {:?}",
                            name, storage
                        )));
                    }
                };
                chunk.emit(store);
            }
            ExprKind::Member { object, field, name } => {
                let field = field.ok_or_else(|| {
                    InternalError::MalformedTree(format!("member `{}` was not resolved", name))
                })?;
                self.expr(object, chunk)?;
                if value.is_simple() {
                    chunk.emit(Instruction::Move {
                        dst: Reg::R2,
                        src: Reg::R0,
                    });
                    self.load(value, Reg::R0, chunk)?;
                } else {
                    chunk.emit(Instruction::Push { src: Reg::R0 });
                    self.expr(value, chunk)?;
                    chunk.emit(Instruction::PopReg { dst: Reg::R2 });
                }
                chunk.emit(Instruction::SetField {
                    object: Reg::R2,
                    field,
                    src: Reg::R0,
                });
            }
            ExprKind::Index { object, index } => {
                self.expr(object, chunk)?;
                if index.is_simple() && value.is_simple() {
                    chunk.emit(Instruction::Move {
                        dst: Reg::R2,
                        src: Reg::R0,
                    });
                    self.load(index, Reg::R1, chunk)?;
                    self.load(value, Reg::R0, chunk)?;
                } else {
                    chunk.emit(Instruction::Push { src: Reg::R0 });
                    self.expr(index, chunk)?;
                    chunk.emit(Instruction::Push { src: Reg::R0 });
                    self.expr(value, chunk)?;
                    chunk
                        .emit(Instruction::PopReg { dst: Reg::R1 })
                        .emit(Instruction::PopReg { dst: Reg::R2 });
                }
                chunk.emit(Instruction::SetIndex {
                    object: Reg::R2,
                    index: Reg::R1,
                    src: Reg::R0,
                });
            }
            _ => {
                return Err(InternalError::MalformedTree(format!(
                    "`{}` is not assignable",
                    target
                )));
            }
        }
        Ok(())
    }

    /// Arguments are pushed left to right; the callee finds them below its
    /// return record.
    fn call(
        &mut self,
        callee: &Expr,
        args: &[Expr],
        target: Option<CallTarget>,
        chunk: &mut BytecodeChunk,
    ) -> Result<(), InternalError> {
        let target = target.ok_or_else(|| {
            InternalError::MalformedTree(format!("call target of `{}` was not resolved", callee))
        })?;
        let argc = self.push_args(args, chunk)?;
        match target {
            CallTarget::Function(function) => {
                chunk.emit(Instruction::Call {
                    function: self.function_index(function)?,
                    argc,
                });
            }
            CallTarget::Native(native) | CallTarget::Method(native) => {
                chunk.emit(Instruction::CallNative { native, argc });
            }
            CallTarget::Value => {
                self.expr(callee, chunk)?;
                chunk.emit(Instruction::CallValue {
                    callee: Reg::R0,
                    argc,
                });
            }
        }
        Ok(())
    }

    fn push_args(&mut self, args: &[Expr], chunk: &mut BytecodeChunk) -> Result<u8, InternalError> {
        let argc = u8::try_from(args.len()).map_err(|_| InternalError::LimitExceeded {
            what: "arguments",
            limit: MAX_ARGS,
        })?;
        for arg in args {
            self.expr(arg, chunk)?;
            chunk.emit(Instruction::Push { src: Reg::R0 });
        }
        Ok(argc)
    }
}

fn resolved(name: &str, ident: Option<IdentId>) -> Result<IdentId, InternalError> {
    ident.ok_or_else(|| InternalError::UnresolvedIdentifier {
        name: name.to_owned(),
    })
}
