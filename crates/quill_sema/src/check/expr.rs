use std::collections::BTreeSet;

use crate::ast::{Block, Expr, Literal, SpannedName, Stmt};
use crate::backend::{FunctionBody, Handle};
use crate::diagnostics::Span;
use crate::error::{CompileError, ErrorKind, SemaResult};
use crate::scope::{BoundValue, ScopeId, ScopeKind, ValueId};
use crate::types::{unify, Type, TypeKind};

use super::fitting::Usage;
use super::Checker;

/// A checked expression: its type and the backend value computing it.
#[derive(Debug, Clone)]
pub(crate) struct Typed {
    pub(crate) ty: Type,
    pub(crate) handle: Handle,
}

impl Checker<'_> {
    pub(crate) fn check_block(&mut self, scope: ScopeId, block: &Block) -> SemaResult<()> {
        let mut current = scope;
        for stmt in &block.stmts {
            current = self.check_stmt(current, stmt).map_err(|err| {
                err.with_frame(
                    format!("while checking statement `{}`", stmt.describe()),
                    stmt.span().clone(),
                )
            })?;
        }
        Ok(())
    }

    /// Returns the scope later statements of the block are checked in.
    fn check_stmt(&mut self, scope: ScopeId, stmt: &Stmt) -> SemaResult<ScopeId> {
        match stmt {
            Stmt::Let {
                name,
                ty,
                value,
                span,
            } => {
                let annotated = match ty {
                    Some(ty) => Some(self.lower_type(scope, ty, &BTreeSet::new())?),
                    None => None,
                };
                let typed = self.check_expr(scope, value, annotated.as_ref())?;
                let ty = match annotated {
                    Some(expected) => {
                        self.expect_type(scope, &expected, &typed.ty, value.span())?;
                        expected
                    }
                    None => typed.ty,
                };
                self.bind_type(scope, &ty, span)?;
                let child = self
                    .arena
                    .new_child(scope, &format!("let {}", name.name), ScopeKind::Local);
                self.arena.put_value(
                    child,
                    BoundValue {
                        name: name.name.clone(),
                        ty,
                        handle: typed.handle,
                        span: name.span.clone(),
                        scope: child,
                        origin: None,
                    },
                )?;
                Ok(child)
            }
            Stmt::Return { value, span } => {
                let Some(expected) = self.arena.return_type(scope) else {
                    return Err(CompileError::new(
                        ErrorKind::UnificationMismatch,
                        span.clone(),
                        "`return` outside of a function",
                    ));
                };
                let (actual, at) = match value {
                    Some(value) => {
                        let typed = self.check_expr(scope, value, Some(&expected))?;
                        (typed.ty, value.span())
                    }
                    None => (Type::unit(), span),
                };
                self.expect_type(scope, &expected, &actual, at)?;
                Ok(scope)
            }
            Stmt::If {
                cond,
                then_block,
                else_block,
                ..
            } => {
                let bool_ty = Type::id("Bool");
                let typed = self.check_expr(scope, cond, Some(&bool_ty))?;
                self.expect_type(scope, &bool_ty, &typed.ty, cond.span())?;
                let then_scope = self.arena.new_child(scope, "then", ScopeKind::Local);
                self.check_block(then_scope, then_block)?;
                if let Some(else_block) = else_block {
                    let else_scope = self.arena.new_child(scope, "else", ScopeKind::Local);
                    self.check_block(else_scope, else_block)?;
                }
                Ok(scope)
            }
            Stmt::Block(block) => {
                let inner = self.arena.new_child(scope, "block", ScopeKind::Local);
                self.check_block(inner, block)?;
                Ok(scope)
            }
            Stmt::Expr(expr) => {
                self.check_expr(scope, expr, None)?;
                Ok(scope)
            }
        }
    }

    /// `actual` must be usable where `expected` is wanted.
    fn expect_type(
        &self,
        scope: ScopeId,
        expected: &Type,
        actual: &Type,
        span: &Span,
    ) -> SemaResult<()> {
        let result = unify(expected, actual, &self.arena.type_env(scope));
        if !result.success {
            let mut message = format!("expected `{expected}`, found `{actual}`");
            if let Some(reason) = result.reason.filter(|reason| *reason != message) {
                message.push_str(&format!(" ({reason})"));
            }
            return Err(CompileError::new(
                ErrorKind::UnificationMismatch,
                span.clone(),
                message,
            ));
        }
        if result.coercions > 0 && !self.config.allow_coercions {
            return Err(CompileError::new(
                ErrorKind::UnificationMismatch,
                span.clone(),
                format!(
                    "`{actual}` converts to `{expected}` only implicitly \
                     and implicit conversions are disabled"
                ),
            ));
        }
        Ok(())
    }

    pub(crate) fn check_expr(
        &mut self,
        scope: ScopeId,
        expr: &Expr,
        expected: Option<&Type>,
    ) -> SemaResult<Typed> {
        match expr {
            Expr::Literal { value, span } => {
                let ty = Type::id(match value {
                    Literal::Int(_) => "Int",
                    Literal::Float(_) => "Float",
                    Literal::Str(_) => "Str",
                    Literal::Bool(_) => "Bool",
                    Literal::Unit => "Unit",
                });
                self.bind_type(scope, &ty, span)?;
                let handle = self.backend.emit_constant(&ty, value);
                Ok(Typed { ty, handle })
            }
            Expr::Ident(name) => {
                let id = match self.resolve_local_name(scope, &name.name)? {
                    Some(local) => local,
                    None => self.resolve_overload(scope, name, Usage::Value, expected)?,
                };
                let value = self.arena.value(id);
                Ok(Typed {
                    ty: value.ty.clone(),
                    handle: value.handle,
                })
            }
            Expr::Call { callee, args, span } => {
                let args = self.check_args(scope, args)?;
                if let Expr::Ident(name) = callee.as_ref() {
                    if let Some(local) = self.resolve_local_name(scope, &name.name)? {
                        let value = self.arena.value(local);
                        let callee = Typed {
                            ty: value.ty.clone(),
                            handle: value.handle,
                        };
                        return self.call_value(scope, callee, &args, span);
                    }
                    return self.call_overload(scope, name, &args, expected);
                }
                let callee = self.check_expr(scope, callee, None)?;
                self.call_value(scope, callee, &args, span)
            }
            Expr::Binary {
                op,
                left,
                right,
                span,
            } => {
                let args = vec![
                    self.check_expr(scope, left, None)?,
                    self.check_expr(scope, right, None)?,
                ];
                let name = SpannedName {
                    name: op.function_name().to_string(),
                    span: span.clone(),
                };
                self.call_overload(scope, &name, &args, expected)
            }
            Expr::Tuple { items, span } => {
                let items = self.check_args(scope, items)?;
                let ty = Type::tuple(items.iter().map(|item| item.ty.clone()).collect());
                let ctor = self.tuple_ctor(scope, &ty, span)?;
                let handles: Vec<Handle> = items.iter().map(|item| item.handle).collect();
                let handle = self.backend.emit_call(ctor, &handles);
                Ok(Typed { ty, handle })
            }
            Expr::Field { base, field, span } => {
                let base = self.check_expr(scope, base, None)?;
                self.field_access(scope, base, field, span)
            }
            Expr::Function(literal) => self.check_function_literal(scope, literal, expected),
        }
    }

    /// Locals only; qualified names always refer to module members.
    fn resolve_local_name(&mut self, scope: ScopeId, name: &str) -> SemaResult<Option<ValueId>> {
        if name.contains("::") {
            return Ok(None);
        }
        self.resolve_local(scope, name)
    }

    fn check_args(&mut self, scope: ScopeId, args: &[Expr]) -> SemaResult<Vec<Typed>> {
        args.iter().map(|arg| self.check_expr(scope, arg, None)).collect()
    }

    fn call_overload(
        &mut self,
        scope: ScopeId,
        name: &SpannedName,
        args: &[Typed],
        expected: Option<&Type>,
    ) -> SemaResult<Typed> {
        let arg_types: Vec<Type> = args.iter().map(|arg| arg.ty.clone()).collect();
        let id = self.resolve_overload(scope, name, Usage::Call { args: &arg_types }, expected)?;
        let value = self.arena.value(id);
        let (callee, ty) = (value.handle, value.ty.clone());
        let ret = match ty.as_function() {
            Some((_, ret)) => ret.clone(),
            None => ty.clone(),
        };
        let handles: Vec<Handle> = args.iter().map(|arg| arg.handle).collect();
        let handle = self.backend.emit_call(callee, &handles);
        Ok(Typed { ty: ret, handle })
    }

    /// Calls something that is already a value, such as a parameter or a
    /// captured closure. No overloading applies.
    fn call_value(
        &mut self,
        scope: ScopeId,
        callee: Typed,
        args: &[Typed],
        span: &Span,
    ) -> SemaResult<Typed> {
        let Some((params, ret)) = callee.ty.as_function() else {
            return Err(CompileError::new(
                ErrorKind::UnificationMismatch,
                span.clone(),
                format!("a value of type `{}` is not callable", callee.ty),
            ));
        };
        if params.len() != args.len() {
            return Err(CompileError::new(
                ErrorKind::UnificationMismatch,
                span.clone(),
                format!(
                    "`{}` takes {} argument(s) but {} were given",
                    callee.ty,
                    params.len(),
                    args.len()
                ),
            ));
        }
        for (param, arg) in params.iter().zip(args) {
            self.expect_type(scope, param, &arg.ty, span)?;
        }
        let handles: Vec<Handle> = args.iter().map(|arg| arg.handle).collect();
        let handle = self.backend.emit_call(callee.handle, &handles);
        Ok(Typed {
            ty: ret.clone(),
            handle,
        })
    }

    fn tuple_ctor(&mut self, scope: ScopeId, ty: &Type, span: &Span) -> SemaResult<Handle> {
        let key = self.arena.type_env(scope).key(ty);
        if let Some(handle) = self.tuple_ctors.get(&key) {
            return Ok(*handle);
        }
        self.bind_type(scope, ty, span)?;
        let TypeKind::Tuple(dims) = ty.kind() else {
            return Err(CompileError::new(
                ErrorKind::UnificationMismatch,
                span.clone(),
                format!("`{ty}` is not a tuple type"),
            ));
        };
        let ctor_ty = Type::function(dims.clone(), ty.clone());
        let name = format!("__tuple{}", self.tuple_ctors.len());
        let handle = self.backend.emit_function(&name, &ctor_ty, FunctionBody::None);
        self.tuple_ctors.insert(key, handle);
        Ok(handle)
    }

    fn field_access(
        &mut self,
        scope: ScopeId,
        base: Typed,
        field: &SpannedName,
        span: &Span,
    ) -> SemaResult<Typed> {
        let env = self.arena.type_env(scope);
        let mut ty = base.ty.clone();
        loop {
            if let Some(expanded) = env.expand(&ty) {
                ty = expanded;
                continue;
            }
            let TypeKind::Ref(inner) = ty.kind() else {
                break;
            };
            let inner = inner.clone();
            ty = inner;
        }
        let fields: Vec<(String, Type)> = match ty.kind() {
            TypeKind::Tuple(dims) => dims
                .iter()
                .enumerate()
                .map(|(index, dim)| (index.to_string(), dim.clone()))
                .collect(),
            _ => env.struct_fields(&ty).unwrap_or_default(),
        };
        let Some((index, (_, field_ty))) = fields
            .iter()
            .enumerate()
            .find(|(_, (name, _))| *name == field.name)
        else {
            return Err(CompileError::new(
                ErrorKind::UnboundSymbol,
                field.span.clone(),
                format!("`{}` has no field `{}`", base.ty, field.name),
            ));
        };
        self.bind_type(scope, field_ty, span)?;
        let handle = self.backend.emit_field(base.handle, index, field_ty);
        Ok(Typed {
            ty: field_ty.clone(),
            handle,
        })
    }
}
