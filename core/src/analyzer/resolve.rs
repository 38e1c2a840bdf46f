//! Name, module-path and type resolution.

use crate::diagnostics::{CompileErrorKind, InternalError};
use crate::syntax::{Expr, ExprKind, Span, TypeExpr};
use crate::types::{TypeId, TypeKind};
use crate::unit::{IdentFlags, IdentId, ModuleId, Storage};

use super::SemanticAnalyzer;

/// Outcome of looking a name up from the current module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(IdentId),
    Missing,
    /// Two sibling modules at the same level both define the name.
    Ambiguous { first: String, second: String },
}

/// What [`SemanticAnalyzer::resolve_module_path`] did to a member chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum PathResolution {
    /// The chain does not start at a module.
    NotAPath,
    /// The module prefix was folded into a single resolved variable.
    Rewritten,
    /// An error was reported.
    Failed,
}

impl SemanticAnalyzer<'_> {
    /// Searches the current scope chain, then the module scope of every
    /// ancestor, then the module scopes of the siblings at each level from
    /// the current module up to the root.
    pub fn find_identifier(&self, name: &str) -> Lookup {
        let modules = &self.unit.modules;
        if let Some(ident) = modules.lookup_in_scope_chain(self.module, name) {
            return Lookup::Found(ident);
        }
        for ancestor in modules.ancestors(self.module).skip(1) {
            if let Some(ident) = modules.lookup_in_module_scope(ancestor, name) {
                return Lookup::Found(ident);
            }
        }
        for level in modules.ancestors(self.module) {
            let mut found: Option<(IdentId, ModuleId)> = None;
            for sibling in modules.siblings(level) {
                let Some(ident) = modules.lookup_in_module_scope(sibling, name) else {
                    continue;
                };
                if let Some((_, first)) = found {
                    return Lookup::Ambiguous {
                        first: modules.canonical_path(first),
                        second: modules.canonical_path(sibling),
                    };
                }
                found = Some((ident, sibling));
            }
            if let Some((ident, _)) = found {
                return Lookup::Found(ident);
            }
        }
        Lookup::Missing
    }

    /// Like [`find_identifier`](Self::find_identifier), recording an error
    /// when the name is missing or ambiguous.
    pub(super) fn lookup_identifier(&mut self, name: &str, span: Span) -> Option<IdentId> {
        match self.find_identifier(name) {
            Lookup::Found(ident) => Some(ident),
            Lookup::Missing => {
                self.report(
                    CompileErrorKind::UnknownIdentifier {
                        name: name.to_owned(),
                    },
                    span,
                );
                None
            }
            Lookup::Ambiguous { first, second } => {
                self.report(
                    CompileErrorKind::AmbiguousIdentifier {
                        name: name.to_owned(),
                        first,
                        second,
                    },
                    span,
                );
                None
            }
        }
    }

    /// The module a name refers to: an imported or aliased module
    /// identifier, or a module reachable by the module lookup rule.
    fn module_named(&self, name: &str) -> Option<ModuleId> {
        if let Lookup::Found(ident) = self.find_identifier(name) {
            if let Storage::Module(module) = self.unit.idents.get(ident).storage {
                return Some(module);
            }
        }
        self.unit.modules.lookup_module(self.module, name)
    }

    /// Resolves `name` or `Module.Path.name`, reporting failures.
    pub(super) fn lookup_qualified(&mut self, path: &[&str], span: Span) -> Option<IdentId> {
        let (last, prefix) = path.split_last()?;
        if prefix.is_empty() {
            return self.lookup_identifier(last, span);
        }
        let module = self.module_path(prefix, span)?;
        let ident = self.unit.modules.lookup_in_module_scope(module, last);
        if ident.is_none() {
            self.report(
                CompileErrorKind::UnknownIdentifier {
                    name: path.join("."),
                },
                span,
            );
        }
        ident
    }

    /// Resolves a dotted module path, reporting the first unknown segment.
    fn module_path(&mut self, path: &[&str], span: Span) -> Option<ModuleId> {
        let (head, rest) = path.split_first()?;
        let Some(mut module) = self.module_named(head) else {
            self.report(
                CompileErrorKind::UnknownModule {
                    name: (*head).to_owned(),
                },
                span,
            );
            return None;
        };
        for (i, segment) in rest.iter().enumerate() {
            match self.unit.modules.child(module, segment) {
                Some(child) => module = child,
                None => {
                    self.report(
                        CompileErrorKind::UnknownModule {
                            name: path[..i + 2].join("."),
                        },
                        span,
                    );
                    return None;
                }
            }
        }
        Some(module)
    }

    /// Folds a module-qualified reference such as `A.B.x.field` into
    /// `Variable("A.B.x").field`, with the variable already resolved.
    pub(super) fn resolve_module_path(
        &mut self,
        expr: &mut Expr,
    ) -> Result<PathResolution, InternalError> {
        let path: Vec<String> = match expr.as_path() {
            Some(path) if path.len() > 1 => path.into_iter().map(str::to_owned).collect(),
            _ => return Ok(PathResolution::NotAPath),
        };
        if path_head_is_resolved(expr) {
            return Ok(PathResolution::NotAPath);
        }

        let head = path[0].as_str();
        let mut module = match self.find_identifier(head) {
            Lookup::Found(ident) => match self.unit.idents.get(ident).storage {
                Storage::Module(module) => module,
                _ => return Ok(PathResolution::NotAPath),
            },
            Lookup::Ambiguous { .. } => {
                self.lookup_identifier(head, expr.span);
                return Ok(PathResolution::Failed);
            }
            Lookup::Missing => match self.unit.modules.lookup_module(self.module, head) {
                Some(module) => module,
                None => {
                    self.report(
                        CompileErrorKind::UnknownModule {
                            name: head.to_owned(),
                        },
                        expr.span,
                    );
                    return Ok(PathResolution::Failed);
                }
            },
        };

        let mut next = 1;
        while let Some(child) = path
            .get(next)
            .and_then(|segment| self.unit.modules.child(module, segment))
        {
            module = child;
            next += 1;
        }
        if next == path.len() {
            self.report(
                CompileErrorKind::NotAValue {
                    name: path.join("."),
                    what: "module",
                },
                expr.span,
            );
            return Ok(PathResolution::Failed);
        }

        let qualified = path[..=next].join(".");
        let Some(ident) = self
            .unit
            .modules
            .lookup_in_module_scope(module, &path[next])
        else {
            self.report(
                CompileErrorKind::UnknownIdentifier { name: qualified },
                expr.span,
            );
            return Ok(PathResolution::Failed);
        };

        let depth = path.len() - 1 - next;
        replace_at_depth(
            expr,
            depth,
            ExprKind::Variable {
                name: qualified,
                ident: Some(ident),
            },
        )?;
        Ok(PathResolution::Rewritten)
    }

    // === Types ===

    /// Resolves a written type, reporting failures. Unresolvable types come
    /// back as `any` so analysis can continue.
    pub(super) fn resolve_type(&mut self, ty: &TypeExpr) -> TypeId {
        self.try_resolve_type(ty).unwrap_or(TypeId::ANY)
    }

    fn try_resolve_type(&mut self, ty: &TypeExpr) -> Option<TypeId> {
        let args: Vec<TypeId> = ty.args.iter().map(|arg| self.resolve_type(arg)).collect();

        if let [name] = ty.path.as_slice() {
            if name == "function" {
                let mut args = args.into_iter();
                let ret = args.next().unwrap_or(TypeId::VOID);
                return Some(self.unit.types.function_type(args.collect(), ret));
            }
            if let Some(builtin) = self.unit.types.builtin(name) {
                if builtin == TypeId::ARRAY {
                    if args.len() > 1 {
                        self.generic_count_error(name, 1, args.len(), ty.span);
                        return None;
                    }
                    let element = args.first().copied().unwrap_or(TypeId::ANY);
                    return Some(self.unit.types.array_of(element));
                }
                if !args.is_empty() {
                    self.generic_count_error(name, 0, args.len(), ty.span);
                    return None;
                }
                return Some(builtin);
            }
        }

        let base = self.lookup_type_path(&ty.path, ty.span)?;
        let expected = self.unit.types.get(base).generic_params.len();
        if expected != args.len() {
            let name = ty.path.join(".");
            self.generic_count_error(&name, expected, args.len(), ty.span);
            return None;
        }
        if expected == 0 {
            return Some(base);
        }
        Some(self.unit.types.instantiate(base, &args))
    }

    fn generic_count_error(&mut self, name: &str, expected: usize, found: usize, span: Span) {
        self.report(
            CompileErrorKind::GenericArgumentCount {
                name: name.to_owned(),
                expected,
                found,
            },
            span,
        );
    }

    fn lookup_type_path(&mut self, path: &[String], span: Span) -> Option<TypeId> {
        let (last, prefix) = path.split_last()?;
        let ident = if prefix.is_empty() {
            match self.find_identifier(last) {
                Lookup::Found(ident) => Some(ident),
                _ => None,
            }
        } else {
            let prefix: Vec<&str> = prefix.iter().map(String::as_str).collect();
            self.module_path(&prefix, span)
                .and_then(|module| self.unit.modules.lookup_in_module_scope(module, last))
        };
        let ty = ident.and_then(|ident| match self.unit.idents.get(ident).storage {
            Storage::Type(ty) | Storage::Generic(ty) => Some(ty),
            _ => None,
        });
        if ty.is_none() {
            self.report(
                CompileErrorKind::UnknownType {
                    name: path.join("."),
                },
                span,
            );
        }
        ty
    }

    // === Compatibility ===

    /// Can a value of type `value` be stored where `target` is expected?
    pub fn is_assignable(&self, target: TypeId, value: TypeId) -> bool {
        let types = &self.unit.types;
        target == value
            || target == TypeId::ANY
            || value == TypeId::ANY
            || (target == TypeId::FLOAT && value == TypeId::INT)
            || (value == TypeId::NULL && types.get(target).kind.is_reference())
            || (types.is_array(target)
                && types.element_type(target) == Some(TypeId::ANY)
                && types.is_array(value))
    }

    /// Records a type mismatch unless `value` can be stored into `target`.
    pub(super) fn ensure_type_assignment_compatibility(
        &mut self,
        target: TypeId,
        value: TypeId,
        span: Span,
    ) -> bool {
        if self.is_assignable(target, value) {
            return true;
        }
        let expected = self.unit.type_name(target);
        let found = self.unit.type_name(value);
        self.report(CompileErrorKind::TypeMismatch { expected, found }, span);
        false
    }

    /// Binds generic parameters of `param` by matching it against the
    /// argument type `arg`. The first binding of each parameter wins.
    pub(super) fn unify(&self, param: TypeId, arg: TypeId, bindings: &mut [Option<TypeId>]) {
        let types = &self.unit.types;
        match &types.get(param).kind {
            TypeKind::GenericParam(index) => {
                if let Some(slot) = bindings.get_mut(*index as usize) {
                    if slot.is_none() && arg != TypeId::VOID && arg != TypeId::NULL {
                        *slot = Some(arg);
                    }
                }
            }
            TypeKind::Array {
                element: Some(element),
            } => {
                if types.is_array(arg) {
                    if let Some(arg_element) = types.element_type(arg) {
                        self.unify(*element, arg_element, bindings);
                    }
                }
            }
            TypeKind::Function { params, ret } => {
                if let TypeKind::Function {
                    params: arg_params,
                    ret: arg_ret,
                } = &types.get(arg).kind
                {
                    for (p, a) in params.iter().zip(arg_params) {
                        self.unify(*p, *a, bindings);
                    }
                    self.unify(*ret, *arg_ret, bindings);
                }
            }
            _ => {
                let (Some(expected), Some(actual)) =
                    (&types.get(param).instance, &types.get(arg).instance)
                else {
                    return;
                };
                if expected.base == actual.base {
                    for (p, a) in expected.args.iter().zip(&actual.args) {
                        self.unify(*p, *a, bindings);
                    }
                }
            }
        }
    }

    /// Is `ident` usable as a runtime value?
    pub(super) fn value_kind_error(&self, ident: IdentId) -> Option<&'static str> {
        let record = self.unit.idents.get(ident);
        if record.flags.intersects(IdentFlags::MODULE | IdentFlags::TYPE) {
            return Some(record.describe());
        }
        match record.storage {
            Storage::Function(func) if self.unit.function(func).is_generic() => {
                Some("generic function")
            }
            _ => None,
        }
    }
}

/// Does the innermost variable of a member chain already carry its
/// identifier?
fn path_head_is_resolved(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Variable { ident, .. } => ident.is_some(),
        ExprKind::Member { object, .. } => path_head_is_resolved(object),
        _ => false,
    }
}

/// Replaces the node `depth` member-steps below `expr`.
fn replace_at_depth(expr: &mut Expr, depth: usize, kind: ExprKind) -> Result<(), InternalError> {
    if depth == 0 {
        expr.kind = kind;
        return Ok(());
    }
    match &mut expr.kind {
        ExprKind::Member { object, .. } => replace_at_depth(object, depth - 1, kind),
        _ => Err(InternalError::MalformedTree(
            "module path is not a member chain".to_owned(),
        )),
    }
}
