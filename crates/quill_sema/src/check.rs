//! The checker context shared by every phase of one `check_program` run.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::trace;

use crate::ast::TypeExpr;
use crate::backend::{Backend, Handle, TypeHandle};
use crate::config::SemaConfig;
use crate::diagnostics::Span;
use crate::error::{CompileError, ErrorKind, SemaResult};
use crate::scope::{ScopeArena, ScopeId, UncheckedId, UncheckedNode};
use crate::types::Type;

mod closure;
mod expr;
mod fitting;
mod instantiate;
mod register;

pub(crate) use self::expr::Typed;

pub(crate) struct Checker<'b> {
    pub(crate) arena: ScopeArena,
    backend: &'b mut dyn Backend,
    config: SemaConfig,
    fresh_counter: usize,
    depth: usize,
    /// Keyed by canonical signature.
    type_handles: HashMap<String, TypeHandle>,
    tuple_ctors: HashMap<String, Handle>,
    /// Instantiations whose check failed, by definition and canonical key.
    failed: HashMap<(UncheckedId, String), ErrorKind>,
    builtin_arities: BTreeMap<String, Vec<usize>>,
}

impl<'b> Checker<'b> {
    pub(crate) fn new(backend: &'b mut dyn Backend, config: SemaConfig) -> Self {
        Self {
            arena: ScopeArena::new(),
            backend,
            config,
            fresh_counter: 0,
            depth: 0,
            type_handles: HashMap::new(),
            tuple_ctors: HashMap::new(),
            failed: HashMap::new(),
            builtin_arities: BTreeMap::new(),
        }
    }

    pub(crate) fn into_arena(self) -> ScopeArena {
        self.arena
    }

    /// Hands a concrete type to the backend once per canonical signature, so
    /// `Int` and `Int64` share one handle.
    pub(crate) fn bind_type(
        &mut self,
        scope: ScopeId,
        ty: &Type,
        span: &Span,
    ) -> SemaResult<TypeHandle> {
        let key = self.arena.type_env(scope).key(ty);
        if let Some(handle) = self.type_handles.get(&key) {
            return Ok(*handle);
        }
        if !ty.is_concrete() {
            let vars: Vec<String> = ty.ftvs().into_iter().map(|v| format!("'{v}")).collect();
            return Err(CompileError::new(
                ErrorKind::UnboundTypeVariable,
                span.clone(),
                format!(
                    "type `{ty}` still mentions {}; add a type annotation",
                    vars.join(", ")
                ),
            ));
        }
        let handle = self.backend.bind_type(ty);
        trace!(signature = %ty, %key, "bound type");
        self.type_handles.insert(key, handle);
        Ok(handle)
    }

    /// A type variable no source program can name.
    pub(crate) fn fresh(&mut self, prefix: &str) -> Type {
        Type::var(&self.fresh_name(prefix))
    }

    pub(crate) fn fresh_name(&mut self, prefix: &str) -> String {
        let name = format!("__{prefix}{}", self.fresh_counter);
        self.fresh_counter += 1;
        name
    }

    /// Lowers a written type in `scope`. Names in `generics` become type
    /// variables; names bound by an enclosing substitution become their
    /// bound type.
    pub(crate) fn lower_type(
        &self,
        scope: ScopeId,
        expr: &TypeExpr,
        generics: &BTreeSet<String>,
    ) -> SemaResult<Type> {
        let lower_all = |items: &[TypeExpr]| -> SemaResult<Vec<Type>> {
            items
                .iter()
                .map(|item| self.lower_type(scope, item, generics))
                .collect()
        };
        Ok(match expr {
            TypeExpr::Name(name) => {
                if generics.contains(&name.name) {
                    Type::var(&name.name)
                } else if let Some(bound) = self.arena.type_bindings(scope).get(&name.name) {
                    bound.clone()
                } else if self.arena.type_env(scope).contains(&name.name) {
                    Type::id(&name.name)
                } else {
                    return Err(CompileError::new(
                        ErrorKind::UnboundSymbol,
                        name.span.clone(),
                        format!("unknown type `{}`", name.name),
                    ));
                }
            }
            TypeExpr::Apply { base, args } => {
                Type::apply(self.lower_type(scope, base, generics)?, lower_all(args)?)
            }
            TypeExpr::Func { params, ret } => {
                Type::function(lower_all(params)?, self.lower_type(scope, ret, generics)?)
            }
            TypeExpr::Tuple(items) => Type::tuple(lower_all(items)?),
            TypeExpr::Sum(options) => Type::sum(lower_all(options)?),
            TypeExpr::Ref(inner) => Type::reference(self.lower_type(scope, inner, generics)?),
            TypeExpr::Maybe(inner) => Type::maybe(self.lower_type(scope, inner, generics)?),
            TypeExpr::Pointer(inner) => Type::pointer(self.lower_type(scope, inner, generics)?),
            TypeExpr::Extern(inner) => Type::extern_(self.lower_type(scope, inner, generics)?),
        })
    }

    /// The type a definition was written with, rebuilt in its defining
    /// module. Unannotated parameters become implicit type variables.
    pub(crate) fn declared_type(&self, id: UncheckedId) -> SemaResult<Type> {
        let def = self.arena.unchecked(id);
        match &def.node {
            UncheckedNode::Function(defn) => {
                let mut generics: BTreeSet<String> =
                    defn.type_params.iter().map(|p| p.name.clone()).collect();
                for param in &defn.params {
                    if param.ty.is_none() {
                        generics.insert(implicit_param_var(&param.name.name));
                    }
                }
                let mut args = Vec::with_capacity(defn.params.len());
                for param in &defn.params {
                    let ty = match &param.ty {
                        Some(ty) => self.lower_type(def.module, ty, &generics)?,
                        None => Type::var(&implicit_param_var(&param.name.name)),
                    };
                    args.push((Some(param.name.name.clone()), ty));
                }
                let ret = match &defn.ret {
                    Some(ret) => self.lower_type(def.module, ret, &generics)?,
                    None => Type::unit(),
                };
                Ok(Type::function_named(args, ret))
            }
            UncheckedNode::DataCtor(decl) => {
                let generics: BTreeSet<String> =
                    decl.type_params.iter().map(|p| p.name.clone()).collect();
                let mut args = Vec::with_capacity(decl.fields.len());
                for field in &decl.fields {
                    args.push((
                        Some(field.name.name.clone()),
                        self.lower_type(def.module, &field.ty, &generics)?,
                    ));
                }
                let ret = Type::apply(
                    Type::id(&decl.name.name),
                    decl.type_params.iter().map(|p| Type::var(&p.name)),
                );
                Ok(Type::function_named(args, ret))
            }
        }
    }
}

pub(crate) fn implicit_param_var(param: &str) -> String {
    format!("_{param}")
}

/// `(A, B)`, for argument lists in error messages.
pub(crate) fn describe_args(args: &[Type]) -> String {
    let parts: Vec<&str> = args.iter().map(Type::signature).collect();
    format!("({})", parts.join(", "))
}
