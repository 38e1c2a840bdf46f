use quill_values::{ReturnRecord, Value};

use super::RuntimeError;

/// Where to resume when an exception unwinds into a `try` scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TryHandler {
    /// Address of the catch block.
    pub catch: u32,
    /// Stack length when the scope was entered.
    pub stack_height: usize,
    /// Locals the scope declares; the catch block pops them.
    pub locals: u32,
    pub frame_base: usize,
    pub frame_argc: u16,
    pub call_depth: usize,
}

/// One execution context: instruction pointer, value stack, registers and
/// exception state.
///
/// A frame is laid out as `args[0..argc]`, the caller's [`ReturnRecord`],
/// then the frame's locals. Local slot `n` is `stack[frame_base + n]`.
#[derive(Debug, Clone)]
pub struct ExecutionThread {
    pub(crate) ip: u32,
    pub(crate) stack: Vec<Value>,
    pub(crate) registers: Vec<Value>,
    pub(crate) frame_base: usize,
    pub(crate) frame_argc: u16,
    pub(crate) handlers: Vec<TryHandler>,
    /// Nesting of active `try` scopes.
    pub(crate) try_counter: u32,
    /// Nonzero while an exception is unwinding toward a catch block.
    pub(crate) exception_depth: u32,
    pub(crate) call_depth: usize,
    pub(crate) exception: Option<RuntimeError>,
}

impl ExecutionThread {
    /// A thread that starts at `entry` with an empty frame.
    pub fn new(entry: u32, register_count: usize) -> Self {
        Self {
            ip: entry,
            stack: Vec::new(),
            registers: vec![Value::Null; register_count.max(3)],
            frame_base: 0,
            frame_argc: 0,
            handlers: Vec::new(),
            try_counter: 0,
            exception_depth: 0,
            call_depth: 0,
            exception: None,
        }
    }

    /// A thread that calls a function at `address` with `args` and hands
    /// the result back to the host when it returns.
    pub fn for_call(address: u32, args: &[Value], register_count: usize) -> Self {
        let mut thread = Self::new(address, register_count);
        thread.stack.extend_from_slice(args);
        thread.stack.push(Value::Return(ReturnRecord {
            return_address: ReturnRecord::HOST,
            caller_base: 0,
            caller_argc: 0,
        }));
        thread.frame_argc = args.len() as u16;
        thread.call_depth = 1;
        thread
    }

    pub fn ip(&self) -> u32 {
        self.ip
    }

    pub fn stack(&self) -> &[Value] {
        &self.stack
    }

    pub fn registers(&self) -> &[Value] {
        &self.registers
    }

    pub fn try_depth(&self) -> u32 {
        self.try_counter
    }

    pub fn is_unwinding(&self) -> bool {
        self.exception_depth > 0
    }

    /// Values the collector must treat as roots.
    pub fn roots(&self) -> impl Iterator<Item = Value> + '_ {
        self.registers.iter().chain(self.stack.iter()).copied()
    }

    pub(crate) fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    pub(crate) fn pop(&mut self) -> Result<Value, RuntimeError> {
        self.stack
            .pop()
            .ok_or_else(|| RuntimeError::invalid_program("stack underflow"))
    }

    pub(crate) fn discard(&mut self, count: usize) -> Result<(), RuntimeError> {
        let len = self
            .stack
            .len()
            .checked_sub(count)
            .ok_or_else(|| RuntimeError::invalid_program("stack underflow"))?;
        self.stack.truncate(len);
        Ok(())
    }

    pub(crate) fn local_index(&self, slot: u32) -> usize {
        self.frame_base + slot as usize
    }

    /// Starts unwinding with `error`.
    pub(crate) fn throw_exception(&mut self, error: RuntimeError) {
        self.exception_depth = 1;
        self.exception = Some(error);
    }
}
