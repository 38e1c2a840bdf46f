use core::any::Any;
use core::fmt;

use quill_values::{VMArray, VMString, Value};
use smallvec::SmallVec;

use super::interpreter::Interpreter;

/// A host function callable from scripts.
///
/// Failure is reported by returning [`Value::InvalidState`]; the VM turns it
/// into a catchable exception.
pub type NativeFn = fn(&mut NativeCall<'_, '_>) -> Value;

/// A named native together with its script-visible signature.
#[derive(Clone)]
pub struct NativeBinding {
    pub owner: String,
    pub name: String,
    /// `function<ret, params...>`, parsed by the compiler.
    pub signature: String,
    pub function: NativeFn,
}

impl fmt::Debug for NativeBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeBinding")
            .field("owner", &self.owner)
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// Native functions keyed by `(owner, name)`.
#[derive(Debug, Clone, Default)]
pub struct NativeRegistry {
    bindings: Vec<NativeBinding>,
    duplicates: Vec<String>,
}

impl NativeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a binding. A second binding for the same key is ignored and
    /// recorded in [`NativeRegistry::duplicates`].
    pub fn bind(
        &mut self,
        owner: &str,
        name: &str,
        signature: &str,
        function: NativeFn,
    ) -> &mut Self {
        if self.find(owner, name).is_some() {
            tracing::warn!(owner, name, "duplicate native binding ignored");
            self.duplicates.push(format!("{}.{}", owner, name));
            return self;
        }
        self.bindings.push(NativeBinding {
            owner: owner.to_owned(),
            name: name.to_owned(),
            signature: signature.to_owned(),
            function,
        });
        self
    }

    pub fn find(&self, owner: &str, name: &str) -> Option<&NativeBinding> {
        self.bindings
            .iter()
            .find(|b| b.owner == owner && b.name == name)
    }

    pub fn extend(&mut self, other: NativeRegistry) {
        for binding in other.bindings {
            self.bind(&binding.owner, &binding.name, &binding.signature, binding.function);
        }
        self.duplicates.extend(other.duplicates);
    }

    pub fn iter(&self) -> impl Iterator<Item = &NativeBinding> {
        self.bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// `owner.name` of every rejected duplicate binding.
    pub fn duplicates(&self) -> &[String] {
        &self.duplicates
    }
}

/// Supplies natives for [`VMState::load_library`](super::VMState::load_library).
pub trait LibraryProvider {
    fn load(&mut self, name: &str) -> Result<NativeRegistry, String>;
}

/// The view a native function gets of the VM while it runs.
///
/// Arguments are copied out of the stack, but the originals stay there until
/// the native returns, so they remain reachable if an allocation collects.
pub struct NativeCall<'h, 'a> {
    interpreter: &'h mut Interpreter<'a>,
    args: SmallVec<[Value; 8]>,
}

impl<'h, 'a> NativeCall<'h, 'a> {
    pub(crate) fn new(interpreter: &'h mut Interpreter<'a>, args: SmallVec<[Value; 8]>) -> Self {
        Self { interpreter, args }
    }

    pub fn argc(&self) -> usize {
        self.args.len()
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// The `index`th argument, or null when absent.
    pub fn arg(&self, index: usize) -> Value {
        self.args.get(index).copied().unwrap_or_default()
    }

    pub fn string(&self, value: Value) -> Option<&str> {
        self.interpreter.as_str(value)
    }

    pub fn array(&self, value: Value) -> Option<&VMArray> {
        self.interpreter.runtime.heap.get_as::<VMArray>(value).ok()
    }

    pub fn array_mut(&mut self, value: Value) -> Option<&mut VMArray> {
        self.interpreter.runtime.heap.get_as_mut::<VMArray>(value).ok()
    }

    pub fn alloc_string(&mut self, text: impl Into<String>) -> Value {
        self.interpreter.alloc(VMString::new(text))
    }

    pub fn alloc_array(&mut self, array: VMArray) -> Value {
        self.interpreter.alloc(array)
    }

    /// Renders a value the way `print` shows it.
    pub fn format(&self, value: Value) -> String {
        self.interpreter.runtime.format_value(value)
    }

    /// Appends a line to the VM's output buffer.
    pub fn print(&mut self, line: impl Into<String>) {
        let line = line.into();
        tracing::trace!(%line, "script output");
        self.interpreter.runtime.output.push(line);
    }

    pub fn external(&self, value: Value) -> Option<&dyn Any> {
        self.interpreter.runtime.external(value)
    }
}
