//! The Quill compilation engine.

use core::mem;

use quill_values::Value;

use super::{
    CompileOptionsOverride, Diagnostic, EngineOptions, Error, VmOptionsOverride,
};
use crate::bytecode::Program;
use crate::diagnostics::{CompileError, CompileErrorKind};
use crate::syntax::{Script, Span};
use crate::unit::CompilationUnit;
use crate::vm::{NativeRegistry, VMState};
use crate::{analyzer, compiler, optimizer};

/// The Quill compilation and execution engine.
///
/// The engine owns the native bindings every program it compiles may call
/// and the default options for compiling and running them.
///
/// # Example
///
/// ```
/// use quill_core::api::{Engine, EngineOptions};
/// use quill_core::stdlib;
/// use quill_core::syntax::build::*;
///
/// let engine = Engine::new(EngineOptions::default(), stdlib::registry());
/// let program = engine
///     .compile(
///         script(vec![expr_stmt(call(var("print"), vec![string("hi")]))]),
///         &Default::default(),
///     )
///     .unwrap();
///
/// let mut vm = engine.instantiate(program).unwrap();
/// vm.run_entry().unwrap();
/// assert_eq!(vm.output(), ["hi"]);
/// ```
pub struct Engine {
    natives: NativeRegistry,
    options: EngineOptions,
}

impl Engine {
    /// Create an engine that binds `natives` into every program.
    pub fn new(options: EngineOptions, natives: NativeRegistry) -> Self {
        for duplicate in natives.duplicates() {
            tracing::warn!(native = %duplicate, "native bound more than once; first binding wins");
        }
        Self { natives, options }
    }

    pub fn natives(&self) -> &NativeRegistry {
        &self.natives
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Analyze, optimize and compile `script` into a loadable program.
    pub fn compile(
        &self,
        script: Script,
        options_override: &CompileOptionsOverride,
    ) -> Result<Program, Error> {
        let unit = self.compile_unit(script, options_override)?;
        unit.program
            .ok_or_else(|| Error::Internal("compilation produced no program".to_owned()))
    }

    /// Like [`Engine::compile`], but returns the whole compilation unit:
    /// the linked program together with the identifier, type and module
    /// tables that produced it.
    pub fn compile_unit(
        &self,
        mut script: Script,
        options_override: &CompileOptionsOverride,
    ) -> Result<CompilationUnit, Error> {
        let mut options = self.options.default_compile_options.clone();
        options.override_with(options_override);

        let mut unit = CompilationUnit::new();
        for binding in self.natives.iter() {
            unit.register_native(&binding.owner, &binding.name, &binding.signature)
                .map_err(|kind| {
                    Error::Api(format!("native `{}.{}`: {}", binding.owner, binding.name, kind))
                })?;
        }

        analyzer::analyze(&mut unit, &mut script, &options)?;
        if unit.has_errors() {
            return Err(Error::from(mem::take(&mut unit.errors)));
        }
        if options.optimize {
            optimizer::optimize(&mut unit, &mut script);
        }
        let program = compiler::compile(&mut unit, &script)?;
        unit.program = Some(program);
        Ok(unit)
    }

    /// Load `program` into a fresh VM with the engine's default VM options.
    pub fn instantiate(&self, program: Program) -> Result<VMState, Error> {
        self.instantiate_with(program, &VmOptionsOverride::default())
    }

    /// Load `program` into a fresh VM.
    ///
    /// Every native the program imports must have a binding in this engine.
    pub fn instantiate_with(
        &self,
        program: Program,
        options_override: &VmOptionsOverride,
    ) -> Result<VMState, Error> {
        let missing: Vec<Diagnostic> = program
            .natives
            .iter()
            .filter(|import| self.natives.find(&import.owner, &import.name).is_none())
            .map(|import| {
                let error = CompileError::error(
                    CompileErrorKind::UnknownNative {
                        owner: import.owner.clone(),
                        name: import.name.clone(),
                    },
                    Span::default(),
                );
                Diagnostic::from(&error)
            })
            .collect();
        if !missing.is_empty() {
            return Err(Error::Compilation {
                diagnostics: missing,
            });
        }

        let mut options = self.options.default_vm_options.clone();
        options.override_with(options_override);
        Ok(VMState::new(program, self.natives.clone(), &options))
    }

    /// Decode a serialized program and load it.
    pub fn load_artifact(&self, bytes: &[u8]) -> Result<VMState, Error> {
        let program = Program::from_bytes(bytes)?;
        self.instantiate(program)
    }

    /// Compile `script`, load it and run its top-level code.
    ///
    /// Returns the VM so exports and output can be inspected afterwards.
    pub fn run(
        &self,
        script: Script,
        options_override: &CompileOptionsOverride,
    ) -> Result<(VMState, Value), Error> {
        let program = self.compile(script, options_override)?;
        let mut vm = self.instantiate(program)?;
        let value = vm.run_entry()?;
        Ok((vm, value))
    }
}
