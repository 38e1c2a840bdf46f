use core::iter;

use quill_values::{
    FunctionRef, NativeRef, Payload, ReturnRecord, VMArray, VMObject, VMString, Value,
};
use smallvec::SmallVec;

use crate::bytecode::{BinaryOpcode, Constant, Instruction, Op, Reg};

use super::arith::{self, StringResult};
use super::native::NativeCall;
use super::state::Runtime;
use super::{Exception, ExecutionThread, RuntimeError, TryHandler};

enum Flow {
    Next,
    Finished(Value),
}

/// Runs one thread against the shared runtime. The other threads are only
/// visible as collection roots.
pub(crate) struct Interpreter<'a> {
    pub(crate) runtime: &'a mut Runtime,
    thread: &'a mut ExecutionThread,
    idle: &'a [Option<ExecutionThread>],
}

impl<'a> Interpreter<'a> {
    pub(crate) fn new(
        runtime: &'a mut Runtime,
        thread: &'a mut ExecutionThread,
        idle: &'a [Option<ExecutionThread>],
    ) -> Self {
        Self {
            runtime,
            thread,
            idle,
        }
    }

    /// Executes until the thread halts, returns to the host, or fails with
    /// an exception no `try` scope catches.
    pub(crate) fn run(&mut self) -> Result<Value, Exception> {
        loop {
            if self.thread.is_unwinding() && !self.unwind() {
                self.thread.exception_depth = 0;
                let error = self
                    .thread
                    .exception
                    .take()
                    .unwrap_or_else(|| RuntimeError::invalid_program("unwinding without exception"));
                tracing::debug!(%error, "uncaught exception");
                return Err(error.into());
            }

            match self.step() {
                Ok(Flow::Next) => {}
                Ok(Flow::Finished(value)) => return Ok(value),
                Err(error) if error.is_fatal() => {
                    tracing::error!(%error, ip = self.thread.ip, "aborting thread");
                    return Err(error.into());
                }
                Err(error) => {
                    let address = self.thread.ip.saturating_sub(1);
                    let span = self.runtime.program.span_at(address);
                    tracing::debug!(%error, address, ?span, "exception raised");
                    self.thread.throw_exception(error);
                }
            }
        }
    }

    fn step(&mut self) -> Result<Flow, RuntimeError> {
        let address = self.thread.ip;
        let op = *self
            .runtime
            .program
            .code
            .get(address as usize)
            .ok_or_else(|| {
                RuntimeError::invalid_program(format!("instruction pointer {} out of range", address))
            })?;
        self.thread.ip += 1;
        self.execute(op)
    }

    fn execute(&mut self, op: Op) -> Result<Flow, RuntimeError> {
        use Instruction::*;
        match op {
            Nop => {}
            Halt => return Ok(Flow::Finished(self.reg(Reg::R0)?)),
            LoadNull { dst } => self.set(dst, Value::Null)?,
            LoadBool { dst, value } => self.set(dst, Value::Bool(value))?,
            LoadConst { dst, index } => {
                let value = self
                    .runtime
                    .constants
                    .get(index as usize)
                    .copied()
                    .ok_or_else(|| RuntimeError::invalid_program(format!("no constant k{}", index)))?;
                self.set(dst, value)?;
            }
            LoadFunction { dst, function } => {
                let entry = self.runtime.function_entry(function)?;
                let value = Value::Function(FunctionRef {
                    index: function,
                    address: entry.address,
                    arity: entry.arity,
                });
                self.set(dst, value)?;
            }
            LoadNative { dst, native } => {
                if native as usize >= self.runtime.program.natives.len() {
                    return Err(RuntimeError::invalid_program(format!("no native n{}", native)));
                }
                self.set(dst, Value::Native(NativeRef(native)))?;
            }
            LoadLocal { dst, slot } => {
                let index = self.thread.local_index(slot);
                let value = self.thread.stack.get(index).copied().ok_or_else(|| {
                    RuntimeError::invalid_program(format!("local slot {} out of range", slot))
                })?;
                self.set(dst, value)?;
            }
            StoreLocal { slot, src } => {
                let value = self.reg(src)?;
                let index = self.thread.local_index(slot);
                let target = self.thread.stack.get_mut(index).ok_or_else(|| {
                    RuntimeError::invalid_program(format!("local slot {} out of range", slot))
                })?;
                *target = value;
            }
            LoadStatic { dst, index } => {
                let value = self
                    .runtime
                    .statics
                    .get(index as usize)
                    .copied()
                    .ok_or_else(|| RuntimeError::invalid_program(format!("no static s{}", index)))?;
                self.set(dst, value)?;
            }
            StoreStatic { index, src } => {
                let value = self.reg(src)?;
                let target = self
                    .runtime
                    .statics
                    .get_mut(index as usize)
                    .ok_or_else(|| RuntimeError::invalid_program(format!("no static s{}", index)))?;
                *target = value;
            }
            Move { dst, src } => {
                let value = self.reg(src)?;
                self.set(dst, value)?;
            }
            Push { src } => {
                let value = self.reg(src)?;
                self.thread.push(value);
            }
            PopReg { dst } => {
                let value = self.thread.pop()?;
                self.set(dst, value)?;
            }
            Pop => {
                self.thread.pop()?;
            }
            SubSp { count } => self.thread.discard(count as usize)?,
            Binary { op, dst, lhs, rhs } => {
                let (a, b) = (self.reg(lhs)?, self.reg(rhs)?);
                let value = self.binary(op, a, b)?;
                self.set(dst, value)?;
            }
            Unary { op, dst, src } => {
                let value = arith::unary(op, self.reg(src)?)?;
                self.set(dst, value)?;
            }
            Jump { target } => self.thread.ip = target,
            JumpIfFalse { cond, target } => {
                if !self.reg(cond)?.is_truthy() {
                    self.thread.ip = target;
                }
            }
            JumpIfTrue { cond, target } => {
                if self.reg(cond)?.is_truthy() {
                    self.thread.ip = target;
                }
            }
            Call { function, argc } => self.enter_function(function, argc as usize)?,
            CallValue { callee, argc } => match self.reg(callee)? {
                Value::Function(f) => self.enter_function(f.index, argc as usize)?,
                Value::Native(n) => self.call_native(n.0, argc as usize)?,
                Value::Null => return Err(RuntimeError::NullReference),
                other => {
                    return Err(RuntimeError::TypeMismatch {
                        expected: "function",
                        found: other.type_name(),
                    });
                }
            },
            CallNative { native, argc } => self.call_native(native, argc as usize)?,
            Return => return self.leave_function(),
            NewObject { dst, object, argc } => {
                let field_count = self
                    .runtime
                    .program
                    .static_objects
                    .get(object as usize)
                    .map(|o| o.members.len())
                    .ok_or_else(|| RuntimeError::invalid_program(format!("no object o{}", object)))?;
                let argc = argc as usize;
                if argc > field_count {
                    return Err(RuntimeError::invalid_program(format!(
                        "{} initializers for {} fields",
                        argc, field_count
                    )));
                }
                self.reserve();
                let start = self.stack_start(argc)?;
                let mut instance = VMObject::new(object, field_count);
                for (i, value) in self.thread.stack.drain(start..).enumerate() {
                    instance.set(i, value)?;
                }
                let r = self.runtime.heap.insert(instance);
                self.set(dst, Value::Heap(r))?;
            }
            GetField { dst, object, field } => {
                let target = self.reg(object)?;
                let value = self
                    .runtime
                    .heap
                    .get_as::<VMObject>(target)?
                    .get(field as usize)?;
                self.set(dst, value)?;
            }
            SetField { object, field, src } => {
                let (target, value) = (self.reg(object)?, self.reg(src)?);
                self.runtime
                    .heap
                    .get_as_mut::<VMObject>(target)?
                    .set(field as usize, value)?;
            }
            NewArray { dst, count } => {
                self.reserve();
                let start = self.stack_start(count as usize)?;
                let array = VMArray::from_values(self.thread.stack.drain(start..));
                let r = self.runtime.heap.insert(array);
                self.set(dst, Value::Heap(r))?;
            }
            GetIndex { dst, object, index } => {
                let (target, index) = (self.reg(object)?, self.reg(index)?.as_int()?);
                let value = self.get_index(target, index)?;
                self.set(dst, value)?;
            }
            SetIndex { object, index, src } => {
                let (target, index, value) =
                    (self.reg(object)?, self.reg(index)?.as_int()?, self.reg(src)?);
                self.runtime
                    .heap
                    .get_as_mut::<VMArray>(target)?
                    .set(index, value)?;
            }
            Export { name, src } => {
                let name = match self.runtime.program.constants.get(name as usize) {
                    Some(Constant::Str(name)) => name.clone(),
                    _ => {
                        return Err(RuntimeError::invalid_program(format!(
                            "export name k{} is not a string",
                            name
                        )));
                    }
                };
                let value = self.reg(src)?;
                tracing::trace!(%name, "export");
                self.runtime.exports.insert(name, value);
            }
            TryBegin { catch, locals } => {
                self.thread.handlers.push(TryHandler {
                    catch,
                    stack_height: self.thread.stack.len(),
                    locals,
                    frame_base: self.thread.frame_base,
                    frame_argc: self.thread.frame_argc,
                    call_depth: self.thread.call_depth,
                });
                self.thread.try_counter += 1;
            }
            TryEnd => {
                self.thread
                    .handlers
                    .pop()
                    .ok_or_else(|| RuntimeError::invalid_program("try.end without try.begin"))?;
                self.thread.try_counter -= 1;
            }
            Throw { src } => {
                let message = match src {
                    None => "exception thrown".to_owned(),
                    Some(src) => {
                        let value = self.reg(src)?;
                        match self.as_str(value) {
                            Some(text) => text.to_owned(),
                            None => self.runtime.format_value(value),
                        }
                    }
                };
                return Err(RuntimeError::Thrown(message));
            }
        }
        Ok(Flow::Next)
    }

    fn reg(&self, reg: Reg) -> Result<Value, RuntimeError> {
        self.thread
            .registers
            .get(reg.index())
            .copied()
            .ok_or_else(|| RuntimeError::invalid_program(format!("no register {}", reg)))
    }

    fn set(&mut self, reg: Reg, value: Value) -> Result<(), RuntimeError> {
        let slot = self
            .thread
            .registers
            .get_mut(reg.index())
            .ok_or_else(|| RuntimeError::invalid_program(format!("no register {}", reg)))?;
        *slot = value;
        Ok(())
    }

    fn stack_start(&self, count: usize) -> Result<usize, RuntimeError> {
        self.thread
            .stack
            .len()
            .checked_sub(count)
            .ok_or_else(|| RuntimeError::invalid_program("stack underflow"))
    }

    pub(crate) fn as_str(&self, value: Value) -> Option<&str> {
        self.runtime
            .heap
            .get_as::<VMString>(value)
            .ok()
            .map(VMString::as_str)
    }

    // === Calls ===

    fn enter_function(&mut self, function: u32, argc: usize) -> Result<(), RuntimeError> {
        let entry = self.runtime.function_entry(function)?;
        if argc != entry.arity as usize {
            return Err(RuntimeError::InvalidArgumentCount {
                name: entry.name.clone(),
                expected: entry.arity as usize,
                found: argc,
            });
        }
        let limit = self.runtime.options.max_call_depth;
        if self.thread.call_depth >= limit {
            return Err(RuntimeError::StackOverflow { limit });
        }
        let address = entry.address;
        let base = self.stack_start(argc)?;
        self.thread.push(Value::Return(ReturnRecord {
            return_address: self.thread.ip,
            caller_base: self.thread.frame_base as u32,
            caller_argc: self.thread.frame_argc,
        }));
        self.thread.frame_base = base;
        self.thread.frame_argc = argc as u16;
        self.thread.call_depth += 1;
        self.thread.ip = address;
        Ok(())
    }

    fn leave_function(&mut self) -> Result<Flow, RuntimeError> {
        let slot = self.thread.frame_base + self.thread.frame_argc as usize;
        let record = self
            .thread
            .stack
            .get(slot)
            .and_then(|v| v.as_return().ok())
            .ok_or_else(|| RuntimeError::invalid_program("missing return record"))?;

        self.thread.stack.truncate(self.thread.frame_base);
        self.thread.frame_base = record.caller_base as usize;
        self.thread.frame_argc = record.caller_argc;
        self.thread.call_depth = self.thread.call_depth.saturating_sub(1);

        // Try scopes opened by the returning frame are gone.
        let depth = self.thread.call_depth;
        while self
            .thread
            .handlers
            .last()
            .is_some_and(|h| h.call_depth > depth)
        {
            self.thread.handlers.pop();
            self.thread.try_counter -= 1;
        }

        if record.return_address == ReturnRecord::HOST {
            return Ok(Flow::Finished(self.reg(Reg::R0)?));
        }
        self.thread.ip = record.return_address;
        Ok(Flow::Next)
    }

    fn call_native(&mut self, native: u32, argc: usize) -> Result<(), RuntimeError> {
        let function = match self.runtime.bindings.get(native as usize) {
            Some(Some(function)) => *function,
            Some(None) => {
                let import = &self.runtime.program.natives[native as usize];
                return Err(RuntimeError::UnknownFunction(format!(
                    "{}.{}",
                    import.owner, import.name
                )));
            }
            None => {
                return Err(RuntimeError::invalid_program(format!("no native n{}", native)));
            }
        };

        let start = self.stack_start(argc)?;
        let args = SmallVec::from_slice(&self.thread.stack[start..]);
        let result = function(&mut NativeCall::new(self, args));
        self.thread.discard(argc)?;

        if let Value::InvalidState(message) = result {
            return Err(RuntimeError::Native(message.to_owned()));
        }
        self.set(Reg::R0, result)
    }

    // === Operators ===

    fn binary(&mut self, op: BinaryOpcode, a: Value, b: Value) -> Result<Value, RuntimeError> {
        if let (Some(x), Some(y)) = (a.number(), b.number()) {
            return arith::numeric_binary(op, x, y);
        }
        match op {
            BinaryOpcode::Eq => return Ok(Value::Bool(self.values_equal(a, b)?)),
            BinaryOpcode::Ne => return Ok(Value::Bool(!self.values_equal(a, b)?)),
            _ => {}
        }
        let result = match (self.as_str(a), self.as_str(b)) {
            (Some(x), Some(y)) => arith::string_binary(op, x, y)?,
            _ => return Err(arith::unsupported(op, &a, &b)),
        };
        Ok(match result {
            StringResult::Bool(result) => Value::Bool(result),
            StringResult::Concat(text) => self.alloc(VMString::new(text)),
        })
    }

    /// Strings compare by content; arrays and objects by identity.
    fn values_equal(&self, a: Value, b: Value) -> Result<bool, RuntimeError> {
        match (a, b) {
            (Value::Heap(x), Value::Heap(y)) if x != y => {
                let (x, y) = (self.runtime.heap.get(x)?, self.runtime.heap.get(y)?);
                Ok(matches!(x.payload(), Payload::String(_)) && x.payload_eq(y))
            }
            _ => Ok(a == b),
        }
    }

    fn get_index(&mut self, target: Value, index: i64) -> Result<Value, RuntimeError> {
        let r = match target {
            Value::Heap(r) => r,
            Value::Null => return Err(RuntimeError::NullReference),
            other => {
                return Err(RuntimeError::TypeMismatch {
                    expected: "array",
                    found: other.type_name(),
                });
            }
        };
        let ch = match self.runtime.heap.get(r)?.payload() {
            Payload::Array(array) => return Ok(array.get(index)?),
            Payload::String(text) => usize::try_from(index)
                .ok()
                .and_then(|i| text.as_str().chars().nth(i))
                .ok_or(RuntimeError::OutOfBounds {
                    index,
                    len: text.char_count(),
                })?,
            Payload::Object(_) => {
                return Err(RuntimeError::TypeMismatch {
                    expected: "array",
                    found: "object",
                });
            }
        };
        Ok(self.alloc(VMString::new(ch.to_string())))
    }

    // === Memory ===

    /// Collects first if the heap is over its threshold. Values that must
    /// survive have to be reachable from a register, the stack or static
    /// memory when this runs.
    fn reserve(&mut self) {
        if self.runtime.heap.needs_collection() {
            self.collect_garbage();
        }
    }

    pub(crate) fn alloc(&mut self, payload: impl Into<Payload>) -> Value {
        self.reserve();
        Value::Heap(self.runtime.heap.insert(payload))
    }

    pub(crate) fn collect_garbage(&mut self) -> usize {
        let threads = iter::once(&*self.thread).chain(self.idle.iter().flatten());
        self.runtime.collect_garbage(threads)
    }

    /// Transfers control to the innermost try handler. Returns `false` when
    /// there is none.
    fn unwind(&mut self) -> bool {
        let Some(handler) = self.thread.handlers.pop() else {
            return false;
        };
        self.thread.try_counter -= 1;
        self.thread.exception_depth = 0;
        let error = self.thread.exception.take();

        let discarded = self.thread.stack.len().saturating_sub(handler.stack_height);
        // The catch block pops the scope's locals, so exactly that many slots
        // must be present.
        self.thread
            .stack
            .resize(handler.stack_height + handler.locals as usize, Value::Null);
        self.thread.frame_base = handler.frame_base;
        self.thread.frame_argc = handler.frame_argc;
        self.thread.call_depth = handler.call_depth;
        self.thread.ip = handler.catch;

        let message = error.map(|e| e.to_string()).unwrap_or_default();
        let value = self.alloc(VMString::new(message));
        if let Some(r0) = self.thread.registers.first_mut() {
            *r0 = value;
        }
        tracing::debug!(catch = handler.catch, discarded, "exception caught");
        true
    }
}
