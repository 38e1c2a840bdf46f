use core::any::Any;
use core::fmt::Write as _;

use hashbrown::HashMap;
use quill_values::{Payload, VMString, Value};

use crate::api::VmOptions;
use crate::bytecode::{Constant, FunctionEntry, Program};

use super::interpreter::Interpreter;
use super::native::{LibraryProvider, NativeFn, NativeRegistry};
use super::{Exception, ExecutionThread, Heap, RuntimeError};

/// Nesting limit when rendering arrays and objects.
const FORMAT_DEPTH: usize = 8;

/// State shared by every thread of a VM instance.
pub(crate) struct Runtime {
    pub(crate) program: Program,
    pub(crate) options: VmOptions,
    pub(crate) heap: Heap,
    pub(crate) statics: Vec<Value>,
    /// The constant pool as values. String constants are interned once and
    /// stay rooted for the VM's lifetime.
    pub(crate) constants: Vec<Value>,
    pub(crate) exports: HashMap<String, Value>,
    pub(crate) registry: NativeRegistry,
    /// Bound function of each native import, by import index.
    pub(crate) bindings: Vec<Option<NativeFn>>,
    provider: Option<Box<dyn LibraryProvider>>,
    libraries: Vec<String>,
    externals: Vec<Box<dyn Any>>,
    /// Thread results handed to the host. Rooted until released.
    pinned: Vec<Value>,
    pub(crate) output: Vec<String>,
}

impl Runtime {
    fn new(program: Program, registry: NativeRegistry, options: VmOptions) -> Self {
        let mut heap = Heap::new(options.gc_min_threshold, options.gc_max_threshold);
        let constants = program
            .constants
            .iter()
            .map(|constant| match constant {
                Constant::Null => Value::Null,
                Constant::Bool(b) => Value::Bool(*b),
                Constant::Int(i) => Value::Int(*i),
                Constant::Float(f) => Value::Float(*f),
                Constant::Str(s) => Value::Heap(heap.insert(VMString::new(s.as_str()))),
            })
            .collect();
        let mut runtime = Self {
            statics: vec![Value::Null; program.statics as usize],
            bindings: vec![None; program.natives.len()],
            program,
            options,
            heap,
            constants,
            exports: HashMap::new(),
            registry,
            provider: None,
            libraries: Vec::new(),
            externals: Vec::new(),
            pinned: Vec::new(),
            output: Vec::new(),
        };
        runtime.bind_natives();
        runtime
    }

    /// Resolves every unbound native import against the registry.
    fn bind_natives(&mut self) {
        for (import, slot) in self.program.natives.iter().zip(self.bindings.iter_mut()) {
            if slot.is_some() {
                continue;
            }
            *slot = self
                .registry
                .find(&import.owner, &import.name)
                .map(|binding| binding.function);
            if slot.is_none() {
                tracing::warn!(owner = %import.owner, name = %import.name, "native import is unbound");
            }
        }
    }

    pub(crate) fn function_entry(&self, index: u32) -> Result<&FunctionEntry, RuntimeError> {
        self.program
            .functions
            .get(index as usize)
            .ok_or_else(|| RuntimeError::invalid_program(format!("no function f{}", index)))
    }

    pub(crate) fn collect_garbage<'t>(
        &mut self,
        threads: impl Iterator<Item = &'t ExecutionThread>,
    ) -> usize {
        let Runtime {
            heap,
            statics,
            constants,
            exports,
            pinned,
            ..
        } = self;
        let roots = statics
            .iter()
            .chain(constants.iter())
            .chain(exports.values())
            .chain(pinned.iter())
            .copied()
            .chain(threads.flat_map(ExecutionThread::roots));
        heap.collect(roots)
    }

    pub(crate) fn external(&self, value: Value) -> Option<&dyn Any> {
        match value {
            Value::External(index) => self.externals.get(index as usize).map(|b| &**b),
            _ => None,
        }
    }

    /// Renders a value for display: strings as their text, arrays and
    /// objects with their elements.
    pub(crate) fn format_value(&self, value: Value) -> String {
        let mut out = String::new();
        self.write_value(&mut out, value, 0);
        out
    }

    fn write_value(&self, out: &mut String, value: Value, depth: usize) {
        let Value::Heap(r) = value else {
            let _ = write!(out, "{}", value);
            return;
        };
        let Ok(heap_value) = self.heap.get(r) else {
            out.push_str("<freed>");
            return;
        };
        if depth >= FORMAT_DEPTH {
            out.push_str("...");
            return;
        }
        match heap_value.payload() {
            Payload::String(text) if depth == 0 => out.push_str(text.as_str()),
            Payload::String(text) => {
                let _ = write!(out, "{:?}", text.as_str());
            }
            Payload::Array(array) => {
                out.push('[');
                for (i, element) in array.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.write_value(out, *element, depth + 1);
                }
                out.push(']');
            }
            Payload::Object(object) => {
                let layout = self.program.static_objects.get(object.type_index as usize);
                out.push_str(layout.map_or("object", |l| l.name.as_str()));
                out.push_str(" { ");
                for (i, field) in object.fields().iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    match layout.and_then(|l| l.members.get(i)) {
                        Some(name) => {
                            let _ = write!(out, "{}: ", name);
                        }
                        None => {
                            let _ = write!(out, "#{}: ", i);
                        }
                    }
                    self.write_value(out, *field, depth + 1);
                }
                out.push_str(" }");
            }
        }
    }
}

/// A thread slot handed out by [`VMState::spawn`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadId(pub usize);

/// A loaded program: static memory, heap, exports, native bindings and up
/// to [`super::MAX_THREADS`] execution threads.
pub struct VMState {
    runtime: Runtime,
    threads: Vec<Option<ExecutionThread>>,
}

impl VMState {
    pub fn new(program: Program, registry: NativeRegistry, options: &VmOptions) -> Self {
        let options = options.normalized();
        let threads = (0..options.max_threads).map(|_| None).collect();
        tracing::debug!(
            instructions = program.code.len(),
            statics = program.statics,
            natives = program.natives.len(),
            "instantiating VM"
        );
        Self {
            runtime: Runtime::new(program, registry, options),
            threads,
        }
    }

    pub fn program(&self) -> &Program {
        &self.runtime.program
    }

    pub fn options(&self) -> &VmOptions {
        &self.runtime.options
    }

    pub fn heap(&self) -> &Heap {
        &self.runtime.heap
    }

    /// Runs the program's top-level code to completion.
    pub fn run_entry(&mut self) -> Result<Value, Exception> {
        let thread = ExecutionThread::new(self.runtime.program.entry, self.runtime.options.register_count);
        let id = self.install(thread)?;
        self.run_thread(id)
    }

    /// Prepares a thread that calls `function` with `args`. The thread runs
    /// when passed to [`VMState::run_thread`].
    pub fn spawn(&mut self, function: &str, args: &[Value]) -> Result<ThreadId, Exception> {
        let (_, entry) = self
            .runtime
            .program
            .function(function)
            .ok_or_else(|| RuntimeError::UnknownFunction(function.to_owned()))?;
        if entry.arity as usize != args.len() {
            return Err(RuntimeError::InvalidArgumentCount {
                name: function.to_owned(),
                expected: entry.arity as usize,
                found: args.len(),
            }
            .into());
        }
        let thread =
            ExecutionThread::for_call(entry.address, args, self.runtime.options.register_count);
        Ok(self.install(thread)?)
    }

    fn install(&mut self, thread: ExecutionThread) -> Result<ThreadId, RuntimeError> {
        let index = self
            .threads
            .iter()
            .position(Option::is_none)
            .ok_or(RuntimeError::TooManyThreads {
                limit: self.threads.len(),
            })?;
        self.threads[index] = Some(thread);
        Ok(ThreadId(index))
    }

    /// Runs a spawned thread until it finishes. The slot is released either
    /// way. A heap result stays rooted until passed to [`VMState::release`].
    pub fn run_thread(&mut self, id: ThreadId) -> Result<Value, Exception> {
        let mut thread = self
            .threads
            .get_mut(id.0)
            .and_then(Option::take)
            .ok_or_else(|| RuntimeError::invalid_program(format!("thread {} is not runnable", id.0)))?;
        let result = Interpreter::new(&mut self.runtime, &mut thread, &self.threads).run();
        tracing::debug!(thread = id.0, ok = result.is_ok(), "thread finished");
        if let Ok(value @ Value::Heap(_)) = result {
            self.runtime.pinned.push(value);
        }
        result
    }

    /// Drops the root that kept a returned thread result alive. Returns
    /// `false` if `value` was not pinned.
    pub fn release(&mut self, value: Value) -> bool {
        let pinned = &mut self.runtime.pinned;
        match pinned.iter().position(|v| *v == value) {
            Some(index) => {
                pinned.swap_remove(index);
                true
            }
            None => false,
        }
    }

    /// Thread results still rooted on behalf of the host.
    pub fn pinned(&self) -> usize {
        self.runtime.pinned.len()
    }

    /// Calls a script function by its qualified name on a fresh thread.
    pub fn call_function(&mut self, name: &str, args: &[Value]) -> Result<Value, Exception> {
        let id = self.spawn(name, args)?;
        self.run_thread(id)
    }

    /// Threads that are spawned but have not run yet.
    pub fn pending_threads(&self) -> usize {
        self.threads.iter().flatten().count()
    }

    pub fn export(&self, name: &str) -> Option<Value> {
        self.runtime.exports.get(name).copied()
    }

    pub fn exports(&self) -> impl Iterator<Item = (&str, Value)> {
        self.runtime.exports.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn static_value(&self, index: u32) -> Option<Value> {
        self.runtime.statics.get(index as usize).copied()
    }

    /// Runs a full collection now. Returns the number of freed allocations.
    pub fn collect_garbage(&mut self) -> usize {
        let Self { runtime, threads } = self;
        runtime.collect_garbage(threads.iter().flatten())
    }

    /// Allocates a string the host can pass as an argument. It is only kept
    /// alive by being stored somewhere reachable.
    pub fn alloc_string(&mut self, text: &str) -> Value {
        if self.runtime.heap.needs_collection() {
            self.collect_garbage();
        }
        Value::Heap(self.runtime.heap.insert(VMString::new(text)))
    }

    pub fn string(&self, value: Value) -> Option<&str> {
        self.runtime
            .heap
            .get_as::<VMString>(value)
            .ok()
            .map(VMString::as_str)
    }

    pub fn format_value(&self, value: Value) -> String {
        self.runtime.format_value(value)
    }

    /// Lines printed by scripts so far.
    pub fn output(&self) -> &[String] {
        &self.runtime.output
    }

    pub fn take_output(&mut self) -> Vec<String> {
        core::mem::take(&mut self.runtime.output)
    }

    /// Stores host data that scripts can carry around as an opaque value.
    pub fn add_external(&mut self, data: Box<dyn Any>) -> Value {
        self.runtime.externals.push(data);
        Value::External(self.runtime.externals.len() as u32 - 1)
    }

    pub fn external(&self, value: Value) -> Option<&dyn Any> {
        self.runtime.external(value)
    }

    pub fn set_library_provider(&mut self, provider: Box<dyn LibraryProvider>) {
        self.runtime.provider = Some(provider);
    }

    /// Loads a native library through the configured provider and binds any
    /// imports it satisfies. Loading the same library twice is a no-op.
    pub fn load_library(&mut self, name: &str) -> Result<(), Exception> {
        if self.runtime.libraries.iter().any(|l| l == name) {
            return Ok(());
        }
        let failure = |reason: String| RuntimeError::LibraryLoad {
            name: name.to_owned(),
            reason,
        };
        let provider = self
            .runtime
            .provider
            .as_mut()
            .ok_or_else(|| failure("no library provider".to_owned()))?;
        let natives = provider.load(name).map_err(failure)?;
        tracing::debug!(library = name, natives = natives.len(), "library loaded");
        self.runtime.registry.extend(natives);
        self.runtime.bind_natives();
        self.runtime.libraries.push(name.to_owned());
        Ok(())
    }

    /// Native imports that have no binding yet, as `owner.name`.
    pub fn unbound_natives(&self) -> Vec<String> {
        self.runtime
            .program
            .natives
            .iter()
            .zip(&self.runtime.bindings)
            .filter(|(_, binding)| binding.is_none())
            .map(|(import, _)| format!("{}.{}", import.owner, import.name))
            .collect()
    }
}
