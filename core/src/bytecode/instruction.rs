use core::fmt;

use serde::{Deserialize, Serialize};

/// A VM register. `R0` is the accumulator every expression leaves its
/// result in; `R1` holds the right operand; `R2` holds objects being
/// written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reg(pub u8);

impl Reg {
    pub const R0: Reg = Reg(0);
    pub const R1: Reg = Reg(1);
    pub const R2: Reg = Reg(2);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// A jump target before linking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Label(pub u32);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOpcode {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOpcode {
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOpcode::Add
                | BinaryOpcode::Sub
                | BinaryOpcode::Mul
                | BinaryOpcode::Div
                | BinaryOpcode::Mod
        )
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            BinaryOpcode::Add => "add",
            BinaryOpcode::Sub => "sub",
            BinaryOpcode::Mul => "mul",
            BinaryOpcode::Div => "div",
            BinaryOpcode::Mod => "mod",
            BinaryOpcode::Eq => "eq",
            BinaryOpcode::Ne => "ne",
            BinaryOpcode::Lt => "lt",
            BinaryOpcode::Le => "le",
            BinaryOpcode::Gt => "gt",
            BinaryOpcode::Ge => "ge",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOpcode {
    Neg,
    Not,
}

/// One VM instruction. `T` is the jump target: [`Label`] while code is being
/// generated, an absolute address (`u32`) once linked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction<T = Label> {
    Nop,
    /// Ends the thread; the result is in `R0`.
    Halt,
    LoadNull { dst: Reg },
    LoadBool { dst: Reg, value: bool },
    LoadConst { dst: Reg, index: u32 },
    LoadFunction { dst: Reg, function: u32 },
    LoadNative { dst: Reg, native: u32 },
    /// Slot is relative to the current frame base.
    LoadLocal { dst: Reg, slot: u32 },
    StoreLocal { slot: u32, src: Reg },
    LoadStatic { dst: Reg, index: u32 },
    StoreStatic { index: u32, src: Reg },
    Move { dst: Reg, src: Reg },
    Push { src: Reg },
    PopReg { dst: Reg },
    Pop,
    /// Discards `count` stack slots at once.
    SubSp { count: u32 },
    Binary {
        op: BinaryOpcode,
        dst: Reg,
        lhs: Reg,
        rhs: Reg,
    },
    Unary { op: UnaryOpcode, dst: Reg, src: Reg },
    Jump { target: T },
    JumpIfFalse { cond: Reg, target: T },
    JumpIfTrue { cond: Reg, target: T },
    /// Calls a script function; `argc` arguments are on the stack.
    Call { function: u32, argc: u8 },
    CallValue { callee: Reg, argc: u8 },
    CallNative { native: u32, argc: u8 },
    Return,
    /// Allocates an object of a static-object layout, initializing its first
    /// `argc` fields from the stack.
    NewObject { dst: Reg, object: u32, argc: u8 },
    GetField { dst: Reg, object: Reg, field: u32 },
    SetField { object: Reg, field: u32, src: Reg },
    /// Allocates an array from the top `count` stack slots.
    NewArray { dst: Reg, count: u32 },
    GetIndex { dst: Reg, object: Reg, index: Reg },
    SetIndex { object: Reg, index: Reg, src: Reg },
    /// Publishes `src` under the string constant `name`.
    Export { name: u32, src: Reg },
    /// Enters a try scope that declares `locals` stack slots.
    TryBegin { catch: T, locals: u32 },
    TryEnd,
    Throw { src: Option<Reg> },
}

impl<T> Instruction<T> {
    /// Rewrites the jump target, if this instruction has one.
    pub fn map_target<U, E>(
        self,
        mut f: impl FnMut(T) -> Result<U, E>,
    ) -> Result<Instruction<U>, E> {
        use Instruction::*;
        Ok(match self {
            Jump { target } => Jump { target: f(target)? },
            JumpIfFalse { cond, target } => JumpIfFalse {
                cond,
                target: f(target)?,
            },
            JumpIfTrue { cond, target } => JumpIfTrue {
                cond,
                target: f(target)?,
            },
            TryBegin { catch, locals } => TryBegin {
                catch: f(catch)?,
                locals,
            },
            Nop => Nop,
            Halt => Halt,
            LoadNull { dst } => LoadNull { dst },
            LoadBool { dst, value } => LoadBool { dst, value },
            LoadConst { dst, index } => LoadConst { dst, index },
            LoadFunction { dst, function } => LoadFunction { dst, function },
            LoadNative { dst, native } => LoadNative { dst, native },
            LoadLocal { dst, slot } => LoadLocal { dst, slot },
            StoreLocal { slot, src } => StoreLocal { slot, src },
            LoadStatic { dst, index } => LoadStatic { dst, index },
            StoreStatic { index, src } => StoreStatic { index, src },
            Move { dst, src } => Move { dst, src },
            Push { src } => Push { src },
            PopReg { dst } => PopReg { dst },
            Pop => Pop,
            SubSp { count } => SubSp { count },
            Binary { op, dst, lhs, rhs } => Binary { op, dst, lhs, rhs },
            Unary { op, dst, src } => Unary { op, dst, src },
            Call { function, argc } => Call { function, argc },
            CallValue { callee, argc } => CallValue { callee, argc },
            CallNative { native, argc } => CallNative { native, argc },
            Return => Return,
            NewObject { dst, object, argc } => NewObject { dst, object, argc },
            GetField { dst, object, field } => GetField { dst, object, field },
            SetField { object, field, src } => SetField { object, field, src },
            NewArray { dst, count } => NewArray { dst, count },
            GetIndex { dst, object, index } => GetIndex { dst, object, index },
            SetIndex { object, index, src } => SetIndex { object, index, src },
            Export { name, src } => Export { name, src },
            TryEnd => TryEnd,
            Throw { src } => Throw { src },
        })
    }
}

impl<T: fmt::Display> fmt::Display for Instruction<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;
        match self {
            Nop => write!(f, "nop"),
            Halt => write!(f, "halt"),
            LoadNull { dst } => write!(f, "load.null {}", dst),
            LoadBool { dst, value } => write!(f, "load.bool {}, {}", dst, value),
            LoadConst { dst, index } => write!(f, "load.const {}, k{}", dst, index),
            LoadFunction { dst, function } => write!(f, "load.func {}, f{}", dst, function),
            LoadNative { dst, native } => write!(f, "load.native {}, n{}", dst, native),
            LoadLocal { dst, slot } => write!(f, "load.local {}, ${}", dst, slot),
            StoreLocal { slot, src } => write!(f, "store.local ${}, {}", slot, src),
            LoadStatic { dst, index } => write!(f, "load.static {}, s{}", dst, index),
            StoreStatic { index, src } => write!(f, "store.static s{}, {}", index, src),
            Move { dst, src } => write!(f, "move {}, {}", dst, src),
            Push { src } => write!(f, "push {}", src),
            PopReg { dst } => write!(f, "pop {}", dst),
            Pop => write!(f, "pop"),
            SubSp { count } => write!(f, "sub.sp {}", count),
            Binary { op, dst, lhs, rhs } => {
                write!(f, "{} {}, {}, {}", op.mnemonic(), dst, lhs, rhs)
            }
            Unary { op, dst, src } => {
                let name = match op {
                    UnaryOpcode::Neg => "neg",
                    UnaryOpcode::Not => "not",
                };
                write!(f, "{} {}, {}", name, dst, src)
            }
            Jump { target } => write!(f, "jump {}", target),
            JumpIfFalse { cond, target } => write!(f, "jump.false {}, {}", cond, target),
            JumpIfTrue { cond, target } => write!(f, "jump.true {}, {}", cond, target),
            Call { function, argc } => write!(f, "call f{}, {}", function, argc),
            CallValue { callee, argc } => write!(f, "call.value {}, {}", callee, argc),
            CallNative { native, argc } => write!(f, "call.native n{}, {}", native, argc),
            Return => write!(f, "return"),
            NewObject { dst, object, argc } => {
                write!(f, "new.object {}, o{}, {}", dst, object, argc)
            }
            GetField { dst, object, field } => {
                write!(f, "get.field {}, {}.{}", dst, object, field)
            }
            SetField { object, field, src } => {
                write!(f, "set.field {}.{}, {}", object, field, src)
            }
            NewArray { dst, count } => write!(f, "new.array {}, {}", dst, count),
            GetIndex { dst, object, index } => {
                write!(f, "get.index {}, {}[{}]", dst, object, index)
            }
            SetIndex { object, index, src } => {
                write!(f, "set.index {}[{}], {}", object, index, src)
            }
            Export { name, src } => write!(f, "export k{}, {}", name, src),
            TryBegin { catch, locals } => write!(f, "try.begin {}, {}", catch, locals),
            TryEnd => write!(f, "try.end"),
            Throw { src: Some(src) } => write!(f, "throw {}", src),
            Throw { src: None } => write!(f, "throw"),
        }
    }
}
