//! Expression typing and call resolution.

use core::mem;

use crate::diagnostics::{CompileErrorKind, InternalError};
use crate::syntax::{
    Access, BinaryOp, CallTarget, Expr, ExprKind, Literal, OpCategory, Span, TypeExpr, UnaryOp,
};
use crate::types::{TypeId, TypeKind};
use crate::unit::{FuncId, FunctionInfo, IdentId, ModuleId, Storage};

use super::SemanticAnalyzer;
use super::resolve::PathResolution;

/// How a member-call callee resolved.
enum MemberCall {
    /// A struct field holding a function value.
    Field(TypeId),
    /// A native method of the receiver's type.
    Method(u32),
    Missing,
}

impl SemanticAnalyzer<'_> {
    /// Types `expr` and records the type on the node.
    pub(super) fn analyze_expr(&mut self, expr: &mut Expr) -> Result<TypeId, InternalError> {
        let ty = self.expr_type(expr)?;
        expr.ty = Some(ty);
        Ok(ty)
    }

    fn expr_type(&mut self, expr: &mut Expr) -> Result<TypeId, InternalError> {
        if matches!(expr.kind, ExprKind::Member { .. })
            && self.resolve_module_path(expr)? == PathResolution::Failed
        {
            return Ok(TypeId::ANY);
        }

        let span = expr.span;
        let access = expr.access;
        let ty = match &mut expr.kind {
            ExprKind::Literal(lit) => match lit {
                Literal::Null => TypeId::NULL,
                Literal::Bool(_) => TypeId::BOOL,
                Literal::Int(_) => TypeId::INT,
                Literal::Float(_) => TypeId::FLOAT,
                Literal::Str(_) => TypeId::STRING,
            },
            ExprKind::Empty => TypeId::VOID,
            ExprKind::Variable { name, ident } => {
                let id = match *ident {
                    Some(id) => id,
                    None => match self.lookup_identifier(name, span) {
                        Some(id) => {
                            *ident = Some(id);
                            id
                        }
                        None => return Ok(TypeId::ANY),
                    },
                };
                self.variable_type(id, name, access, span)
            }
            ExprKind::Binary { op, left, right } => {
                let op = *op;
                let left = self.analyze_expr(left)?;
                if right.is_empty() {
                    right.ty = Some(TypeId::VOID);
                    left
                } else {
                    let right = self.analyze_expr(right)?;
                    self.binary_type(op, left, right, span)
                }
            }
            ExprKind::Unary { op, operand } => {
                let op = *op;
                let operand = self.analyze_expr(operand)?;
                self.unary_type(op, operand, span)
            }
            ExprKind::Assign { target, value } => {
                let value_ty = self.analyze_expr(value)?;
                target.access = Access::Store;
                let target_ty = match target.kind {
                    ExprKind::Variable { .. } | ExprKind::Member { .. } | ExprKind::Index { .. } => {
                        self.analyze_expr(target)?
                    }
                    _ => {
                        self.report(
                            CompileErrorKind::TypeMismatch {
                                expected: "assignable expression".to_owned(),
                                found: target.to_string(),
                            },
                            target.span,
                        );
                        return Ok(value_ty);
                    }
                };
                self.ensure_type_assignment_compatibility(target_ty, value_ty, value.span);
                target_ty
            }
            ExprKind::Call {
                callee,
                generic_args,
                args,
                target,
            } => self.analyze_call(callee, generic_args, args, target, span)?,
            ExprKind::Member {
                object,
                name,
                field,
            } => {
                let object_ty = self.analyze_expr(object)?;
                match self.unit.types.field(object_ty, name) {
                    Some((index, ty)) => {
                        *field = Some(index);
                        ty
                    }
                    None => {
                        self.member_not_found(object_ty, name, span);
                        TypeId::ANY
                    }
                }
            }
            ExprKind::Index { object, index } => {
                let object_ty = self.analyze_expr(object)?;
                let index_ty = self.analyze_expr(index)?;
                self.ensure_type_assignment_compatibility(TypeId::INT, index_ty, index.span);
                self.index_type(object_ty, access, span)
            }
            ExprKind::New { ty, args } => self.analyze_new(ty, args, span)?,
            ExprKind::ArrayLit(items) => {
                let mut element: Option<TypeId> = None;
                for item in items.iter_mut() {
                    let ty = self.analyze_expr(item)?;
                    element = Some(match element {
                        None => ty,
                        Some(current) if current == ty => current,
                        Some(current) if current.is_numeric() && ty.is_numeric() => TypeId::FLOAT,
                        Some(_) => TypeId::ANY,
                    });
                }
                let element = match element {
                    None | Some(TypeId::NULL) => TypeId::ANY,
                    Some(element) => element,
                };
                self.unit.types.array_of(element)
            }
        };
        Ok(ty)
    }

    fn variable_type(&mut self, ident: IdentId, name: &str, access: Access, span: Span) -> TypeId {
        if let Some(what) = self.value_kind_error(ident) {
            self.report(
                CompileErrorKind::NotAValue {
                    name: name.to_owned(),
                    what,
                },
                span,
            );
            return TypeId::ANY;
        }
        match access {
            Access::Load => self.unit.idents.add_use(ident),
            Access::Store if self.unit.idents.get(ident).is_const() => {
                self.report(
                    CompileErrorKind::AssignToConst {
                        name: name.to_owned(),
                    },
                    span,
                );
            }
            Access::Store => {}
        }
        self.unit.idents.get(ident).ty
    }

    fn member_not_found(&mut self, ty: TypeId, member: &str, span: Span) {
        let type_name = self.unit.type_name(ty);
        self.report(
            CompileErrorKind::MemberNotFound {
                type_name,
                member: member.to_owned(),
            },
            span,
        );
    }

    fn invalid_operands(&mut self, op: &str, left: TypeId, right: TypeId, span: Span) {
        let left = self.unit.type_name(left);
        let right = self.unit.type_name(right);
        self.report(
            CompileErrorKind::InvalidOperands {
                op: op.to_owned(),
                left,
                right,
            },
            span,
        );
    }

    fn binary_type(&mut self, op: BinaryOp, left: TypeId, right: TypeId, span: Span) -> TypeId {
        let any = left == TypeId::ANY || right == TypeId::ANY;
        match op.category() {
            OpCategory::Arithmetic => {
                if any {
                    TypeId::ANY
                } else if left == TypeId::INT && right == TypeId::INT {
                    TypeId::INT
                } else if left.is_numeric() && right.is_numeric() {
                    TypeId::FLOAT
                } else if op == BinaryOp::Add && left == TypeId::STRING && right == TypeId::STRING
                {
                    TypeId::STRING
                } else {
                    self.invalid_operands(op.text(), left, right, span);
                    TypeId::ANY
                }
            }
            OpCategory::Comparison => {
                let ordered = matches!(op, BinaryOp::Eq | BinaryOp::Ne)
                    || any
                    || (left.is_numeric() && right.is_numeric())
                    || (left == TypeId::STRING && right == TypeId::STRING);
                if !ordered {
                    self.invalid_operands(op.text(), left, right, span);
                }
                TypeId::BOOL
            }
            OpCategory::Logical => {
                let boolish = |ty: TypeId| ty == TypeId::BOOL || ty == TypeId::ANY;
                if !(boolish(left) && boolish(right)) {
                    self.invalid_operands(op.text(), left, right, span);
                }
                TypeId::BOOL
            }
        }
    }

    fn unary_type(&mut self, op: UnaryOp, operand: TypeId, span: Span) -> TypeId {
        let (ok, expected, result) = match op {
            UnaryOp::Neg => (
                operand.is_numeric() || operand == TypeId::ANY,
                "int or float",
                operand,
            ),
            UnaryOp::Not => (
                operand == TypeId::BOOL || operand == TypeId::ANY,
                "bool",
                TypeId::BOOL,
            ),
        };
        if ok {
            return result;
        }
        let found = self.unit.type_name(operand);
        self.report(
            CompileErrorKind::TypeMismatch {
                expected: expected.to_owned(),
                found,
            },
            span,
        );
        TypeId::ANY
    }

    fn index_type(&mut self, object: TypeId, access: Access, span: Span) -> TypeId {
        if object == TypeId::ANY {
            return TypeId::ANY;
        }
        if let Some(element) = self
            .unit
            .types
            .is_array(object)
            .then(|| self.unit.types.element_type(object))
            .flatten()
        {
            return element;
        }
        if object == TypeId::STRING && access == Access::Load {
            return TypeId::STRING;
        }
        let found = self.unit.type_name(object);
        self.report(
            CompileErrorKind::TypeMismatch {
                expected: "array".to_owned(),
                found,
            },
            span,
        );
        TypeId::ANY
    }

    fn analyze_new(
        &mut self,
        ty: &TypeExpr,
        args: &mut Vec<Expr>,
        span: Span,
    ) -> Result<TypeId, InternalError> {
        let id = self.resolve_type(ty);
        let arg_types = self.analyze_args(args)?;
        if id == TypeId::ANY {
            return Ok(TypeId::ANY);
        }
        let type_name = self.unit.type_name(id);
        if self.unit.types.proto(id).is_none() {
            self.report(CompileErrorKind::MissingPrototype { type_name }, span);
            return Ok(TypeId::ANY);
        }
        if !self.unit.types.is_struct(id) || self.unit.types.get(id).is_generic() {
            self.report(
                CompileErrorKind::TypeMismatch {
                    expected: "struct type".to_owned(),
                    found: type_name,
                },
                span,
            );
            return Ok(TypeId::ANY);
        }

        let fields = self.unit.types.fields(id).to_vec();
        if args.len() > fields.len() {
            self.report(
                CompileErrorKind::ArgumentCount {
                    name: type_name,
                    expected: fields.len(),
                    found: args.len(),
                },
                span,
            );
            return Ok(id);
        }
        for ((arg, arg_ty), field) in args.iter().zip(&arg_types).zip(&fields) {
            self.ensure_type_assignment_compatibility(field.ty, *arg_ty, arg.span);
        }
        for field in &fields[args.len()..] {
            let mut value = field
                .default
                .clone()
                .unwrap_or_else(|| Expr::new(ExprKind::Literal(Literal::Null), span));
            let value_ty = self.analyze_expr(&mut value)?;
            if field.default.is_some() {
                self.ensure_type_assignment_compatibility(field.ty, value_ty, value.span);
            }
            args.push(value);
        }
        Ok(id)
    }

    fn analyze_args(&mut self, args: &mut [Expr]) -> Result<Vec<TypeId>, InternalError> {
        args.iter_mut().map(|arg| self.analyze_expr(arg)).collect()
    }

    // === Calls ===

    fn analyze_call(
        &mut self,
        callee: &mut Expr,
        generic_args: &[TypeExpr],
        args: &mut Vec<Expr>,
        target: &mut Option<CallTarget>,
        span: Span,
    ) -> Result<TypeId, InternalError> {
        if matches!(callee.kind, ExprKind::Member { .. })
            && self.resolve_module_path(callee)? == PathResolution::Failed
        {
            self.analyze_args(args)?;
            return Ok(TypeId::ANY);
        }

        if let ExprKind::Variable { name, ident } = &mut callee.kind {
            let id = match *ident {
                Some(id) => id,
                None => match self.lookup_identifier(name, callee.span) {
                    Some(id) => {
                        *ident = Some(id);
                        id
                    }
                    None => {
                        self.analyze_args(args)?;
                        return Ok(TypeId::ANY);
                    }
                },
            };
            let name = name.clone();
            let record = self.unit.idents.get(id);
            let (storage, callee_ty) = (record.storage, record.ty);
            match storage {
                Storage::Function(func) => {
                    self.unit.idents.add_use(id);
                    callee.ty = Some(callee_ty);
                    let (func, ret) =
                        self.substitute_function_args(func, &name, generic_args, args, span)?;
                    *target = Some(CallTarget::Function(func));
                    return Ok(ret);
                }
                Storage::Native(native) => {
                    self.unit.idents.add_use(id);
                    callee.ty = Some(callee_ty);
                    self.reject_generic_args(&name, generic_args, span);
                    let arg_types = self.analyze_args(args)?;
                    let ret = self.check_native_args(native, &name, &arg_types, args, span);
                    *target = Some(CallTarget::Native(native));
                    return Ok(ret);
                }
                _ => {}
            }
        }

        if let ExprKind::Member {
            object,
            name,
            field,
        } = &mut callee.kind
        {
            let object_ty = self.analyze_expr(object)?;
            let resolved = match self.unit.types.field(object_ty, name) {
                Some((index, ty)) => {
                    *field = Some(index);
                    MemberCall::Field(ty)
                }
                None if object_ty == TypeId::ANY => MemberCall::Missing,
                None => {
                    let owner = self.unit.types.owner_name(object_ty).to_owned();
                    match self.unit.native_method(&owner, name) {
                        Some(native) => MemberCall::Method(native),
                        None => MemberCall::Missing,
                    }
                }
            };
            let name = name.clone();
            return match resolved {
                MemberCall::Field(ty) => {
                    callee.ty = Some(ty);
                    self.call_value(ty, args, target, span)
                }
                MemberCall::Method(native) => {
                    let kind = mem::replace(&mut callee.kind, ExprKind::Empty);
                    callee.ty = Some(TypeId::VOID);
                    let ExprKind::Member { object, .. } = kind else {
                        return Err(InternalError::MalformedTree(
                            "method callee changed shape".to_owned(),
                        ));
                    };
                    let mut arg_types = self.analyze_args(args)?;
                    args.insert(0, *object);
                    arg_types.insert(0, object_ty);
                    let qualified = format!("{}.{}", self.unit.types.owner_name(object_ty), name);
                    self.reject_generic_args(&qualified, generic_args, span);
                    let ret = self.check_native_args(native, &qualified, &arg_types, args, span);
                    *target = Some(CallTarget::Method(native));
                    Ok(ret)
                }
                MemberCall::Missing => {
                    self.member_not_found(object_ty, &name, callee.span);
                    self.analyze_args(args)?;
                    Ok(TypeId::ANY)
                }
            };
        }

        let callee_ty = self.analyze_expr(callee)?;
        self.call_value(callee_ty, args, target, span)
    }

    /// Calls whatever function value the callee evaluates to.
    fn call_value(
        &mut self,
        callee_ty: TypeId,
        args: &mut [Expr],
        target: &mut Option<CallTarget>,
        span: Span,
    ) -> Result<TypeId, InternalError> {
        let arg_types = self.analyze_args(args)?;
        match self.unit.types.get(callee_ty).kind.clone() {
            TypeKind::Function { params, ret } => {
                let name = self.unit.type_name(callee_ty);
                self.check_arguments(&name, &params, &arg_types, args, span);
                *target = Some(CallTarget::Value);
                Ok(ret)
            }
            TypeKind::Any => {
                *target = Some(CallTarget::Value);
                Ok(TypeId::ANY)
            }
            _ => {
                let type_name = self.unit.type_name(callee_ty);
                self.report(CompileErrorKind::NotCallable { type_name }, span);
                Ok(TypeId::ANY)
            }
        }
    }

    fn reject_generic_args(&mut self, name: &str, generic_args: &[TypeExpr], span: Span) {
        if !generic_args.is_empty() {
            self.report(
                CompileErrorKind::GenericArgumentCount {
                    name: name.to_owned(),
                    expected: 0,
                    found: generic_args.len(),
                },
                span,
            );
        }
    }

    /// Checks argument count and per-argument compatibility. Returns whether
    /// the count matched.
    fn check_arguments(
        &mut self,
        name: &str,
        params: &[TypeId],
        arg_types: &[TypeId],
        args: &[Expr],
        span: Span,
    ) -> bool {
        if params.len() != arg_types.len() {
            self.report(
                CompileErrorKind::ArgumentCount {
                    name: name.to_owned(),
                    expected: params.len(),
                    found: arg_types.len(),
                },
                span,
            );
            return false;
        }
        for ((param, arg_ty), arg) in params.iter().zip(arg_types).zip(args) {
            self.ensure_type_assignment_compatibility(*param, *arg_ty, arg.span);
        }
        true
    }

    fn check_native_args(
        &mut self,
        native: u32,
        name: &str,
        arg_types: &[TypeId],
        args: &[Expr],
        span: Span,
    ) -> TypeId {
        let Some(signature) = self.unit.natives.get(native as usize) else {
            return TypeId::ANY;
        };
        let (params, ret) = (signature.params.clone(), signature.ret);
        self.check_arguments(name, &params, arg_types, args, span);
        ret
    }

    /// Resolves the concrete callee and argument list of a call to `func`.
    ///
    /// Generic functions are instantiated from explicit type arguments or
    /// by matching parameter types against argument types. Missing trailing
    /// arguments are filled in from parameter defaults, analyzed in the
    /// callee's module. Returns the function to call and its return type.
    pub(super) fn substitute_function_args(
        &mut self,
        func: FuncId,
        name: &str,
        generic_args: &[TypeExpr],
        args: &mut Vec<Expr>,
        span: Span,
    ) -> Result<(FuncId, TypeId), InternalError> {
        let arg_types = self.analyze_args(args)?;
        let (param_count, required, generic) = {
            let info = self.unit.function(func);
            (info.params.len(), info.required_params(), info.is_generic())
        };
        if arg_types.len() < required || arg_types.len() > param_count {
            self.report(
                CompileErrorKind::ArgumentCount {
                    name: name.to_owned(),
                    expected: param_count,
                    found: arg_types.len(),
                },
                span,
            );
            let ret = if generic {
                TypeId::ANY
            } else {
                self.unit.function(func).ret
            };
            return Ok((func, ret));
        }

        let mut func = func;
        if generic {
            let bindings = match self.generic_bindings(func, name, generic_args, &arg_types, span)
            {
                Some(bindings) => bindings,
                None => return Ok((func, TypeId::ANY)),
            };
            func = self.instantiate_function(func, bindings)?;
        } else {
            self.reject_generic_args(name, generic_args, span);
        }

        let (params, defaults, module, ret) = {
            let info = self.unit.function(func);
            (
                info.params.clone(),
                info.defaults.clone(),
                info.module,
                info.ret,
            )
        };
        for ((param, arg_ty), arg) in params.iter().zip(&arg_types).zip(args.iter()) {
            self.ensure_type_assignment_compatibility(*param, *arg_ty, arg.span);
        }
        for index in args.len()..params.len() {
            let Some(mut default) = defaults.get(index).cloned().flatten() else {
                return Err(InternalError::MissingChild {
                    node: "parameter",
                    child: "default value",
                });
            };
            let default_ty = self.analyze_default(module, &mut default)?;
            self.ensure_type_assignment_compatibility(params[index], default_ty, default.span);
            args.push(default);
        }
        Ok((func, ret))
    }

    /// Analyzes a parameter default as if written at module level of the
    /// callee's module.
    fn analyze_default(
        &mut self,
        module: ModuleId,
        default: &mut Expr,
    ) -> Result<TypeId, InternalError> {
        let saved_scopes = self.unit.modules.split_scopes(module);
        let saved_function = self.function.take();
        let result = self.in_module(module, |this| this.analyze_expr(default));
        self.function = saved_function;
        self.unit.modules.restore_scopes(module, saved_scopes);
        result
    }

    fn generic_bindings(
        &mut self,
        func: FuncId,
        name: &str,
        generic_args: &[TypeExpr],
        arg_types: &[TypeId],
        span: Span,
    ) -> Option<Vec<TypeId>> {
        let (generics, params) = {
            let info = self.unit.function(func);
            (info.generics.clone(), info.params.clone())
        };
        if !generic_args.is_empty() {
            let explicit: Vec<TypeId> = generic_args
                .iter()
                .map(|ty| self.resolve_type(ty))
                .collect();
            if explicit.len() != generics.len() {
                self.report(
                    CompileErrorKind::GenericArgumentCount {
                        name: name.to_owned(),
                        expected: generics.len(),
                        found: explicit.len(),
                    },
                    span,
                );
                return None;
            }
            return Some(explicit);
        }

        let mut bindings = vec![None; generics.len()];
        for (param, arg) in params.iter().zip(arg_types) {
            self.unify(*param, *arg, &mut bindings);
        }
        let mut resolved = Vec::with_capacity(bindings.len());
        for (binding, param) in bindings.into_iter().zip(&generics) {
            match binding {
                Some(ty) => resolved.push(ty),
                None => {
                    self.report(
                        CompileErrorKind::CannotInferGeneric {
                            name: name.to_owned(),
                            param: param.clone(),
                        },
                        span,
                    );
                    return None;
                }
            }
        }
        Some(resolved)
    }

    /// Returns the instance of generic `func` for `bindings`, creating and
    /// analyzing it on first use. The instance is cached before its body is
    /// analyzed so recursive calls find it.
    fn instantiate_function(
        &mut self,
        func: FuncId,
        bindings: Vec<TypeId>,
    ) -> Result<FuncId, InternalError> {
        if let Some(existing) = self.unit.function(func).instances.get(&bindings) {
            return Ok(*existing);
        }
        let info = self.unit.function(func).clone();
        let mut decl = info.template.clone().ok_or(InternalError::MissingChild {
            node: "generic function",
            child: "template",
        })?;

        let arg_names: Vec<&str> = bindings.iter().map(|ty| self.unit.types.name(*ty)).collect();
        let name = format!("{}<{}>", info.name, arg_names.join(", "));
        let params: Vec<TypeId> = info
            .params
            .iter()
            .map(|param| self.unit.types.substitute(*param, &bindings))
            .collect();
        let ret = self.unit.types.substitute(info.ret, &bindings);

        let instance = self.unit.add_function(FunctionInfo {
            name,
            params,
            ret,
            generics: Vec::new(),
            template: None,
            instances: Default::default(),
            body: None,
            exported: false,
            ..info
        });
        self.unit
            .function_mut(func)
            .instances
            .insert(bindings.clone(), instance);
        tracing::debug!(
            function = %self.unit.function(instance).name,
            id = instance.0,
            "instantiated generic function"
        );

        self.analyze_function_body(&mut decl, instance, &bindings)?;
        Ok(instance)
    }
}
