//! The compilation unit and the symbol tables it owns.

mod identifier;
mod module;

pub use identifier::{IdentFlags, IdentId, Identifier, IdentifierArena, Storage};
pub use module::{Module, ModuleId, ModuleTree, Scope};

use hashbrown::HashMap;

use crate::bytecode::Program;
use crate::diagnostics::{CompileError, CompileErrorKind};
use crate::syntax::{Expr, FunctionDecl, Span, Stmt};
use crate::types::{TypeId, TypeRegistry, parse_signature};

/// Owner name of natives callable as plain functions.
pub const GLOBAL_OWNER: &str = "global";

/// Index of a [`FunctionInfo`] in the unit's function table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncId(pub u32);

/// Analyzed parameters and statements of a function ready for codegen.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionBody {
    pub params: Vec<IdentId>,
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct FunctionInfo {
    /// Qualified name (`A.B.f`); generic instances append their arguments.
    pub name: String,
    pub ident: Option<IdentId>,
    pub module: ModuleId,
    pub params: Vec<TypeId>,
    pub param_names: Vec<String>,
    pub defaults: Vec<Option<Expr>>,
    pub ret: TypeId,
    /// Generic parameter names; empty for ordinary functions.
    pub generics: Vec<String>,
    /// The declaration generic instances are cloned from.
    pub template: Option<FunctionDecl>,
    pub instances: HashMap<Vec<TypeId>, FuncId>,
    pub body: Option<FunctionBody>,
    pub exported: bool,
}

impl FunctionInfo {
    pub fn is_generic(&self) -> bool {
        !self.generics.is_empty()
    }

    /// Arguments that must be given explicitly.
    pub fn required_params(&self) -> usize {
        self.defaults
            .iter()
            .rposition(Option::is_none)
            .map_or(0, |i| i + 1)
    }
}

/// A native entry point as the compiler sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeSignature {
    pub owner: String,
    pub name: String,
    pub signature: String,
    pub params: Vec<TypeId>,
    pub ret: TypeId,
}

/// Root object of one compilation: modules, types, identifiers, functions,
/// natives, the accumulated errors and finally the linked program.
#[derive(Debug, Clone, Default)]
pub struct CompilationUnit {
    pub modules: ModuleTree,
    pub types: TypeRegistry,
    pub idents: IdentifierArena,
    /// Imported modules by canonical path.
    pub imports: HashMap<String, ModuleId>,
    pub natives: Vec<NativeSignature>,
    pub functions: Vec<FunctionInfo>,
    pub errors: Vec<CompileError>,
    statics: u32,
    pub program: Option<Program>,
}

impl CompilationUnit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, kind: CompileErrorKind, span: Span) {
        tracing::debug!(%kind, %span, "compile error");
        self.errors.push(CompileError::error(kind, span));
    }

    pub fn has_errors(&self) -> bool {
        self.errors.iter().any(CompileError::is_error)
    }

    pub fn allocate_static(&mut self) -> u32 {
        let slot = self.statics;
        self.statics += 1;
        slot
    }

    pub fn static_count(&self) -> u32 {
        self.statics
    }

    /// Makes a native callable from scripts. Natives owned by
    /// [`GLOBAL_OWNER`] become root-level identifiers; the others are
    /// methods of the type named `owner`.
    pub fn register_native(
        &mut self,
        owner: &str,
        name: &str,
        signature: &str,
    ) -> Result<u32, CompileErrorKind> {
        let parsed = parse_signature(&mut self.types, signature)?;
        let index = self.natives.len() as u32;
        if owner == GLOBAL_OWNER {
            let ty = self.types.function_type(parsed.params.clone(), parsed.ret);
            let ident = self.idents.declare(
                name,
                IdentFlags::NATIVE | IdentFlags::CONST,
                Storage::Native(index),
                ty,
                Span::default(),
            );
            self.modules.bind(ModuleId::ROOT, name, ident);
        }
        self.natives.push(NativeSignature {
            owner: owner.to_owned(),
            name: name.to_owned(),
            signature: signature.to_owned(),
            params: parsed.params,
            ret: parsed.ret,
        });
        Ok(index)
    }

    pub fn native_method(&self, owner: &str, name: &str) -> Option<u32> {
        self.natives
            .iter()
            .position(|n| n.owner == owner && n.name == name)
            .map(|i| i as u32)
    }

    pub fn add_function(&mut self, info: FunctionInfo) -> FuncId {
        let id = FuncId(self.functions.len() as u32);
        self.functions.push(info);
        id
    }

    pub fn function(&self, id: FuncId) -> &FunctionInfo {
        &self.functions[id.0 as usize]
    }

    pub fn function_mut(&mut self, id: FuncId) -> &mut FunctionInfo {
        &mut self.functions[id.0 as usize]
    }

    /// First non-alias identifier called `name`, in declaration order.
    pub fn find_ident(&self, name: &str) -> Option<IdentId> {
        self.idents
            .iter()
            .find(|i| i.name == name && i.aliasee.is_none())
            .map(|i| i.index)
    }

    pub fn type_name(&self, id: TypeId) -> String {
        self.types.name(id).to_owned()
    }
}
