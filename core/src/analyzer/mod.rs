//! Semantic analysis.
//!
//! The analyzer walks the script once, after a hoisting pre-pass, and fills
//! in every resolution slot of the tree: identifiers, call targets, field
//! indices and expression types. Problems in the program are recorded in the
//! [`CompilationUnit`]'s error list and analysis carries on; only broken
//! tree invariants abort with an [`InternalError`].

mod expr;
mod resolve;

use core::mem;

use hashbrown::HashMap;

use crate::api::CompileOptions;
use crate::diagnostics::{CompileErrorKind, InternalError};
use crate::syntax::{
    Expr, FunctionDecl, Script, Span, Stmt, StmtKind, StructDecl, TryStmt, VarDecl,
};
use crate::types::{Member, TypeId};
use crate::unit::{
    CompilationUnit, FuncId, FunctionBody, FunctionInfo, IdentFlags, IdentId, ModuleId, Storage,
};

pub use resolve::Lookup;

/// Runs semantic analysis over `script`, recording problems in `unit`.
pub fn analyze(
    unit: &mut CompilationUnit,
    script: &mut Script,
    options: &CompileOptions,
) -> Result<(), InternalError> {
    let mut analyzer = SemanticAnalyzer::new(unit);
    analyzer.analyze_script(script, options)?;
    tracing::debug!(
        errors = analyzer.unit.errors.len(),
        functions = analyzer.unit.functions.len(),
        types = analyzer.unit.types.len(),
        "semantic analysis finished"
    );
    Ok(())
}

/// The function whose body is being analyzed.
#[derive(Debug, Clone, Copy)]
struct FunctionContext {
    ret: TypeId,
}

/// Which declarations a hoisting pass picks up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Hoist {
    Modules,
    Structs,
    Functions,
}

pub struct SemanticAnalyzer<'u> {
    unit: &'u mut CompilationUnit,
    module: ModuleId,
    function: Option<FunctionContext>,
    /// Blocks entered since the innermost function or module body.
    block_depth: usize,
}

impl<'u> SemanticAnalyzer<'u> {
    pub fn new(unit: &'u mut CompilationUnit) -> Self {
        Self {
            unit,
            module: ModuleId::ROOT,
            function: None,
            block_depth: 0,
        }
    }

    pub fn analyze_script(
        &mut self,
        script: &mut Script,
        options: &CompileOptions,
    ) -> Result<(), InternalError> {
        if options.require_module_declaration {
            match script.statements.first() {
                Some(Stmt {
                    kind: StmtKind::Module(_),
                    ..
                }) => {}
                first => {
                    let span = first.map(|s| s.span).unwrap_or_default();
                    self.report(CompileErrorKind::MissingModuleDeclaration, span);
                }
            }
        }

        for phase in [Hoist::Modules, Hoist::Structs, Hoist::Functions] {
            self.hoist(&mut script.statements, phase)?;
        }
        for stmt in &mut script.statements {
            self.analyze_stmt(stmt)?;
        }
        Ok(())
    }

    fn report(&mut self, kind: CompileErrorKind, span: Span) {
        self.unit.report(kind, span);
    }

    fn in_module<R>(&mut self, module: ModuleId, f: impl FnOnce(&mut Self) -> R) -> R {
        let saved = mem::replace(&mut self.module, module);
        let result = f(self);
        self.module = saved;
        result
    }

    /// `A.B.name` for a declaration in module `A.B`.
    fn qualify(&self, name: &str) -> String {
        let path = self.unit.modules.canonical_path(self.module);
        if path.is_empty() {
            name.to_owned()
        } else {
            format!("{}.{}", path, name)
        }
    }

    /// Binds `name` in the innermost scope, reporting a redefinition.
    fn bind(&mut self, name: &str, ident: IdentId, span: Span) {
        if self.unit.modules.bind(self.module, name, ident).is_some() {
            self.report(
                CompileErrorKind::Redefinition {
                    name: name.to_owned(),
                },
                span,
            );
        }
    }

    // === Hoisting ===

    /// Pre-declares the modules, structs or function signatures of `stmts`
    /// and of every module nested in them.
    fn hoist(&mut self, stmts: &mut [Stmt], phase: Hoist) -> Result<(), InternalError> {
        for stmt in stmts.iter_mut() {
            let span = stmt.span;
            match &mut stmt.kind {
                StmtKind::Module(decl) => {
                    if phase == Hoist::Modules {
                        let id = self.unit.modules.add_child(self.module, &decl.name, span);
                        decl.module = Some(id);
                    }
                    let id = decl.module.ok_or(InternalError::MissingChild {
                        node: "module declaration",
                        child: "module",
                    })?;
                    self.in_module(id, |this| this.hoist(&mut decl.body, phase))?;
                }
                StmtKind::Struct(decl) if phase == Hoist::Structs && decl.ty.is_none() => {
                    self.declare_struct(decl, span);
                }
                StmtKind::Function(decl) if phase == Hoist::Functions && decl.func.is_none() => {
                    self.declare_function(decl, span);
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Binds generic parameter names as types in a fresh scope. The caller
    /// pops it.
    fn bind_generic_params(&mut self, generics: &[String], span: Span) {
        self.unit.modules.push_scope(self.module);
        for (index, name) in generics.iter().enumerate() {
            let ty = self.unit.types.generic_param(index as u16, name);
            let ident = self.unit.idents.declare(
                name,
                IdentFlags::GENERIC | IdentFlags::TYPE,
                Storage::Type(ty),
                ty,
                span,
            );
            self.bind(name, ident, span);
        }
    }

    fn declare_struct(&mut self, decl: &mut StructDecl, span: Span) {
        let qualified = self.qualify(&decl.name);
        self.bind_generic_params(&decl.generics, span);
        let members: Vec<Member> = decl
            .fields
            .iter()
            .map(|field| Member {
                name: field.name.clone(),
                ty: self.resolve_type(&field.ty),
                default: field.default.clone(),
            })
            .collect();
        self.unit.modules.pop_scope(self.module);

        let ty = self
            .unit
            .types
            .define_struct(&qualified, decl.generics.clone(), members);
        decl.ty = Some(ty);
        let ident = self.unit.idents.declare(
            &decl.name,
            IdentFlags::TYPE,
            Storage::Type(ty),
            ty,
            span,
        );
        self.bind(&decl.name, ident, span);
        tracing::trace!(name = %qualified, id = ty.0, "declared struct");
    }

    fn declare_function(&mut self, decl: &mut FunctionDecl, span: Span) -> FuncId {
        let qualified = self.qualify(&decl.name);
        self.bind_generic_params(&decl.generics, span);
        let params: Vec<TypeId> = decl
            .params
            .iter()
            .map(|p| self.resolve_type(&p.ty))
            .collect();
        let ret = decl
            .ret
            .as_ref()
            .map_or(TypeId::VOID, |ret| self.resolve_type(ret));
        self.unit.modules.pop_scope(self.module);

        let info = FunctionInfo {
            name: qualified,
            ident: None,
            module: self.module,
            params: params.clone(),
            param_names: decl.params.iter().map(|p| p.name.clone()).collect(),
            defaults: decl.params.iter().map(|p| p.default.clone()).collect(),
            ret,
            generics: decl.generics.clone(),
            template: (!decl.generics.is_empty()).then(|| decl.clone()),
            instances: HashMap::new(),
            body: None,
            exported: decl.exported,
        };
        let func = self.unit.add_function(info);

        let mut flags = IdentFlags::FUNCTION | IdentFlags::CONST;
        if decl.exported {
            flags |= IdentFlags::EXPORTED;
        }
        let ty = self.unit.types.function_type(params, ret);
        let ident = self
            .unit
            .idents
            .declare(&decl.name, flags, Storage::Function(func), ty, span);
        self.unit.function_mut(func).ident = Some(ident);
        self.bind(&decl.name, ident, span);
        decl.func = Some(func);
        func
    }

    // === Statements ===

    fn analyze_stmt(&mut self, stmt: &mut Stmt) -> Result<(), InternalError> {
        let span = stmt.span;
        match &mut stmt.kind {
            StmtKind::Module(decl) => {
                let id = match decl.module {
                    Some(id) => id,
                    // Declared inside a block: nothing hoisted it.
                    None => {
                        let id = self.unit.modules.add_child(self.module, &decl.name, span);
                        decl.module = Some(id);
                        for phase in [Hoist::Modules, Hoist::Structs, Hoist::Functions] {
                            self.in_module(id, |this| this.hoist(&mut decl.body, phase))?;
                        }
                        id
                    }
                };
                let saved_function = self.function.take();
                let saved_depth = mem::replace(&mut self.block_depth, 0);
                let result = self.in_module(id, |this| {
                    decl.body
                        .iter_mut()
                        .try_for_each(|stmt| this.analyze_stmt(stmt))
                });
                self.function = saved_function;
                self.block_depth = saved_depth;
                result?;
            }
            StmtKind::Import { path } => self.analyze_import(path, span),
            StmtKind::Using { alias, target } => self.analyze_using(alias, target, span),
            StmtKind::Var(decl) => self.analyze_var(decl, span)?,
            StmtKind::Function(decl) => {
                let func = match decl.func {
                    Some(func) => func,
                    None => self.declare_function(decl, span),
                };
                // Generic functions are analyzed per instantiation.
                if !self.unit.function(func).is_generic() {
                    self.analyze_function_body(decl, func, &[])?;
                }
            }
            StmtKind::Struct(decl) => {
                if decl.ty.is_none() {
                    self.declare_struct(decl, span);
                }
            }
            StmtKind::Expr(expr) => {
                self.analyze_expr(expr)?;
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.analyze_condition(cond)?;
                self.analyze_block(then_branch)?;
                if let Some(else_branch) = else_branch {
                    self.analyze_block(else_branch)?;
                }
            }
            StmtKind::While { cond, body } => {
                self.analyze_condition(cond)?;
                self.analyze_block(body)?;
            }
            StmtKind::Block(body) => self.analyze_block(body)?,
            StmtKind::Return(value) => self.analyze_return(value.as_mut(), span)?,
            StmtKind::Try(try_stmt) => self.analyze_try(try_stmt, span)?,
            StmtKind::Throw(value) => {
                if let Some(value) = value {
                    self.analyze_expr(value)?;
                }
            }
        }
        Ok(())
    }

    /// Analyzes `stmts` in a new lexical scope.
    fn analyze_block(&mut self, stmts: &mut [Stmt]) -> Result<(), InternalError> {
        self.unit.modules.push_scope(self.module);
        self.block_depth += 1;
        let result = self.analyze_scoped(stmts);
        self.block_depth -= 1;
        self.unit.modules.pop_scope(self.module);
        result
    }

    /// Analyzes `stmts` in the current scope, hoisting the structs and
    /// functions they declare.
    fn analyze_scoped(&mut self, stmts: &mut [Stmt]) -> Result<(), InternalError> {
        for stmt in stmts.iter_mut() {
            let span = stmt.span;
            if let StmtKind::Struct(decl) = &mut stmt.kind {
                if decl.ty.is_none() {
                    self.declare_struct(decl, span);
                }
            }
        }
        for stmt in stmts.iter_mut() {
            let span = stmt.span;
            if let StmtKind::Function(decl) = &mut stmt.kind {
                if decl.func.is_none() {
                    self.declare_function(decl, span);
                }
            }
        }
        stmts.iter_mut().try_for_each(|stmt| self.analyze_stmt(stmt))
    }

    fn analyze_condition(&mut self, cond: &mut Expr) -> Result<(), InternalError> {
        let ty = self.analyze_expr(cond)?;
        if ty != TypeId::BOOL && ty != TypeId::ANY {
            let found = self.unit.type_name(ty);
            self.report(CompileErrorKind::ConditionNotBool { found }, cond.span);
        }
        Ok(())
    }

    fn analyze_import(&mut self, path: &[String], span: Span) {
        let segments: Vec<&str> = path.iter().map(String::as_str).collect();
        let Some(module) = self.unit.modules.lookup_path(self.module, &segments) else {
            self.report(
                CompileErrorKind::UnknownModule {
                    name: path.join("."),
                },
                span,
            );
            return;
        };
        let canonical = self.unit.modules.canonical_path(module);
        self.unit.imports.insert(canonical.clone(), module);
        let ty = self.unit.types.module_type(&canonical);
        let name = self.unit.modules.get(module).name.clone();
        let ident =
            self.unit
                .idents
                .declare(&name, IdentFlags::MODULE, Storage::Module(module), ty, span);
        self.bind(&name, ident, span);
        tracing::trace!(module = %canonical, "imported module");
    }

    fn analyze_using(&mut self, alias: &str, target: &[String], span: Span) {
        let segments: Vec<&str> = target.iter().map(String::as_str).collect();
        if let Some(module) = self.unit.modules.lookup_path(self.module, &segments) {
            let canonical = self.unit.modules.canonical_path(module);
            let ty = self.unit.types.module_type(&canonical);
            let ident = self.unit.idents.declare(
                alias,
                IdentFlags::MODULE | IdentFlags::ALIAS,
                Storage::Module(module),
                ty,
                span,
            );
            self.bind(alias, ident, span);
            return;
        }
        if let Some(target) = self.lookup_qualified(&segments, span) {
            let ident = self.unit.idents.alias(alias, target, span);
            self.bind(alias, ident, span);
        }
    }

    fn analyze_var(&mut self, decl: &mut VarDecl, span: Span) -> Result<(), InternalError> {
        let declared = decl.ty.as_ref().map(|ty| self.resolve_type(ty));
        let init = match &mut decl.init {
            Some(init) => Some((self.analyze_expr(init)?, init.span)),
            None => None,
        };
        let ty = match (declared, init) {
            (Some(declared), Some((init, init_span))) => {
                self.ensure_type_assignment_compatibility(declared, init, init_span);
                declared
            }
            (Some(declared), None) => declared,
            (None, Some((TypeId::NULL, _))) | (None, None) => TypeId::ANY,
            (None, Some((init, _))) => init,
        };

        if self.unit.types.proto(ty).is_none() {
            let type_name = self.unit.type_name(ty);
            self.report(CompileErrorKind::MissingPrototype { type_name }, span);
        }
        if decl.is_const {
            if decl.init.is_none() {
                self.report(
                    CompileErrorKind::ConstWithoutValue {
                        name: decl.name.clone(),
                    },
                    span,
                );
            } else if !ty.is_constant_type() {
                let type_name = self.unit.type_name(ty);
                self.report(CompileErrorKind::NotAConstantType { type_name }, span);
            }
        }

        let storage = if self.function.is_none() && self.block_depth == 0 {
            Storage::Static(self.unit.allocate_static())
        } else {
            Storage::Local
        };
        let mut flags = IdentFlags::empty();
        if decl.is_const {
            flags |= IdentFlags::CONST;
        }
        if decl.exported {
            flags |= IdentFlags::EXPORTED;
        }
        let ident = self
            .unit
            .idents
            .declare(&decl.name, flags, storage, ty, span);
        decl.ident = Some(ident);
        self.bind(&decl.name, ident, span);

        if decl.is_const {
            if let Some(init) = decl.init.as_ref().filter(|init| init.literal().is_some()) {
                self.unit.idents.bind_current(ident, init.clone());
            }
        }
        Ok(())
    }

    /// Analyzes the body of `decl` as function `func`. `generic_args` binds
    /// the declaration's type parameters for a generic instance.
    ///
    /// The analyzed statements move into the function table; `decl` is left
    /// with an empty body.
    fn analyze_function_body(
        &mut self,
        decl: &mut FunctionDecl,
        func: FuncId,
        generic_args: &[TypeId],
    ) -> Result<(), InternalError> {
        let (module, ret, params) = {
            let info = self.unit.function(func);
            (info.module, info.ret, info.params.clone())
        };
        if params.len() != decl.params.len() {
            return Err(InternalError::MalformedTree(format!(
                "function `{}` has {} parameters but {} parameter types",
                decl.name,
                decl.params.len(),
                params.len()
            )));
        }

        let saved_module = mem::replace(&mut self.module, module);
        let saved_scopes = self.unit.modules.split_scopes(module);
        let saved_function = self.function.replace(FunctionContext { ret });
        let saved_depth = mem::replace(&mut self.block_depth, 1);
        self.unit.modules.push_scope(module);

        for (name, ty) in decl.generics.iter().zip(generic_args) {
            let ident = self.unit.idents.declare(
                name,
                IdentFlags::GENERIC | IdentFlags::TYPE,
                Storage::Generic(*ty),
                *ty,
                Span::default(),
            );
            self.bind(name, ident, Span::default());
        }
        let mut param_idents = Vec::with_capacity(params.len());
        for (param, ty) in decl.params.iter_mut().zip(params) {
            let ident = self.unit.idents.declare(
                &param.name,
                IdentFlags::ARGUMENT,
                Storage::Local,
                ty,
                param.ty.span,
            );
            self.bind(&param.name, ident, param.ty.span);
            param.ident = Some(ident);
            param_idents.push(ident);
        }

        let result = self.analyze_scoped(&mut decl.body);

        self.unit.modules.restore_scopes(module, saved_scopes);
        self.module = saved_module;
        self.function = saved_function;
        self.block_depth = saved_depth;
        result?;

        self.unit.function_mut(func).body = Some(FunctionBody {
            params: param_idents,
            stmts: mem::take(&mut decl.body),
        });
        Ok(())
    }

    fn analyze_return(
        &mut self,
        value: Option<&mut Expr>,
        span: Span,
    ) -> Result<(), InternalError> {
        let Some(context) = self.function else {
            if let Some(value) = value {
                self.analyze_expr(value)?;
            }
            self.report(CompileErrorKind::ReturnOutsideFunction, span);
            return Ok(());
        };
        match value {
            Some(value) => {
                let ty = self.analyze_expr(value)?;
                if context.ret == TypeId::VOID {
                    let found = self.unit.type_name(ty);
                    self.report(
                        CompileErrorKind::TypeMismatch {
                            expected: "void".to_owned(),
                            found,
                        },
                        value.span,
                    );
                } else {
                    self.ensure_type_assignment_compatibility(context.ret, ty, value.span);
                }
            }
            None if context.ret != TypeId::VOID => {
                let expected = self.unit.type_name(context.ret);
                self.report(
                    CompileErrorKind::TypeMismatch {
                        expected,
                        found: "void".to_owned(),
                    },
                    span,
                );
            }
            None => {}
        }
        Ok(())
    }

    fn analyze_try(&mut self, try_stmt: &mut TryStmt, span: Span) -> Result<(), InternalError> {
        self.analyze_block(&mut try_stmt.body)?;

        self.unit.modules.push_scope(self.module);
        self.block_depth += 1;
        if let Some(name) = &try_stmt.catch_name {
            let ident = self.unit.idents.declare(
                name,
                IdentFlags::empty(),
                Storage::Local,
                TypeId::STRING,
                span,
            );
            self.bind(name, ident, span);
            try_stmt.catch_ident = Some(ident);
        }
        let result = self.analyze_scoped(&mut try_stmt.handler);
        self.block_depth -= 1;
        self.unit.modules.pop_scope(self.module);
        result
    }
}
