//! Monomorphization: turning an unchecked definition plus a set of type
//! bindings into one checked value, at most once per concrete signature.

use std::rc::Rc;

use tracing::debug;

use crate::ast::{FunctionDefn, StructDecl};
use crate::backend::FunctionBody;
use crate::diagnostics::Span;
use crate::error::{CompileError, ErrorKind, SemaResult};
use crate::scope::{BoundValue, ScopeId, ScopeKind, UncheckedId, UncheckedNode, ValueId};
use crate::types::{BindingMap, Type};

use super::Checker;

impl Checker<'_> {
    pub(crate) fn instantiate(
        &mut self,
        id: UncheckedId,
        bindings: &BindingMap,
        site: &Span,
    ) -> SemaResult<ValueId> {
        let def = self.arena.unchecked(id).clone();
        let fqn = self.arena.fqn(def.module, &def.name);
        let declared = self.declared_type(id)?;
        let concrete = declared.rebind(bindings);
        if !concrete.is_concrete() {
            let vars: Vec<String> = concrete.ftvs().into_iter().map(|v| format!("'{v}")).collect();
            return Err(CompileError::new(
                ErrorKind::UnboundTypeVariable,
                site.clone(),
                format!(
                    "cannot infer {} for `{fqn}`; the best candidate is `{concrete}`",
                    vars.join(", ")
                ),
            ));
        }

        let key = self.arena.type_env(def.module).key(&concrete);
        if let Some(kind) = self.failed.get(&(id, key.clone())) {
            debug!(name = %fqn, signature = %concrete, "instantiation failed before");
            return Err(CompileError::depends_on_failed(
                *kind,
                &fqn,
                concrete.signature(),
                site.clone(),
            ));
        }

        if let Some(existing) = self.arena.lookup_signature(def.module, &def.name, &key) {
            let value = self.arena.value(existing);
            let clash = match value.origin {
                Some(origin) if origin != id => {
                    !def.is_generic() && !self.arena.unchecked(origin).is_generic()
                }
                _ => false,
            };
            if clash {
                return Err(CompileError::new(
                    ErrorKind::DuplicateDefinition,
                    def.span().clone(),
                    format!(
                        "`{fqn}` with signature `{concrete}` is already defined at {}",
                        value.span
                    ),
                ));
            }
            debug!(name = %fqn, signature = %concrete, "instantiation memo hit");
            return Ok(existing);
        }

        // Only generic substitutions count toward the depth limit; a chain of
        // ordinary calls always terminates through the memo.
        let generic = def.is_generic();
        if generic && self.depth >= self.config.max_instantiation_depth {
            return Err(CompileError::new(
                ErrorKind::RecursionDepthExceeded,
                site.clone(),
                format!(
                    "instantiating `{fqn}` as `{concrete}` nests more than {} \
                     generic substitutions",
                    self.config.max_instantiation_depth
                ),
            ));
        }

        debug!(name = %fqn, signature = %concrete, depth = self.depth, "instantiating");
        if generic {
            self.depth += 1;
        }
        let result = match &def.node {
            UncheckedNode::Function(defn) => {
                self.instantiate_function(id, defn.clone(), def.module, &fqn, &concrete, bindings)
            }
            UncheckedNode::DataCtor(decl) => {
                self.instantiate_ctor(id, decl.clone(), def.module, &fqn, &concrete)
            }
        };
        if generic {
            self.depth -= 1;
        }
        result.map_err(|err| {
            // Depth failures depend on how deep the request came from, so
            // they are not remembered.
            if err.kind != ErrorKind::RecursionDepthExceeded {
                self.failed.insert((id, key), err.kind);
            }
            err.with_frame(
                format!("while instantiating `{fqn}` as `{concrete}`"),
                def.span().clone(),
            )
        })
    }

    fn instantiate_function(
        &mut self,
        id: UncheckedId,
        defn: Rc<FunctionDefn>,
        module: ScopeId,
        fqn: &str,
        concrete: &Type,
        bindings: &BindingMap,
    ) -> SemaResult<ValueId> {
        let Some((params, ret)) = concrete.as_function() else {
            return Err(CompileError::new(
                ErrorKind::UnificationMismatch,
                defn.span.clone(),
                format!("`{fqn}` was instantiated with non-function type `{concrete}`"),
            ));
        };
        let ret = ret.clone();

        let subst = self.arena.new_child(
            module,
            &defn.name.name,
            ScopeKind::GenericSubstitution {
                callee: fqn.to_string(),
            },
        );
        for (name, ty) in bindings.iter() {
            // Call-site placeholders such as `__ret0` are not the callee's variables.
            if !name.starts_with("__") {
                self.arena.put_type_binding(subst, name, ty.rebind(bindings));
            }
        }

        for param in &params {
            self.bind_type(module, param, &defn.span)?;
        }
        self.bind_type(module, &ret, &defn.span)?;
        let handle = self
            .backend
            .emit_function(fqn, concrete, FunctionBody::Checked);
        // Registered before the body so recursive calls hit the memo.
        let value = self.arena.put_value(
            module,
            BoundValue {
                name: defn.name.name.clone(),
                ty: concrete.clone(),
                handle,
                span: defn.span.clone(),
                scope: module,
                origin: Some(id),
            },
        )?;

        let scope = self.arena.new_child(
            subst,
            &defn.name.name,
            ScopeKind::Function {
                handle,
                return_type: ret,
            },
        );
        for (index, (param, ty)) in defn.params.iter().zip(&params).enumerate() {
            let param_handle = self.backend.emit_param(handle, index, &param.name.name, ty);
            self.arena.put_value(
                scope,
                BoundValue {
                    name: param.name.name.clone(),
                    ty: ty.clone(),
                    handle: param_handle,
                    span: param.name.span.clone(),
                    scope,
                    origin: None,
                },
            )?;
        }

        self.check_block(scope, &defn.body)?;
        Ok(value)
    }

    fn instantiate_ctor(
        &mut self,
        id: UncheckedId,
        decl: Rc<StructDecl>,
        module: ScopeId,
        fqn: &str,
        concrete: &Type,
    ) -> SemaResult<ValueId> {
        if let Some((fields, ret)) = concrete.as_function() {
            for field in &fields {
                self.bind_type(module, field, &decl.span)?;
            }
            self.bind_type(module, ret, &decl.span)?;
        }
        let handle = self.backend.emit_function(fqn, concrete, FunctionBody::None);
        self.arena.put_value(
            module,
            BoundValue {
                name: decl.name.name.clone(),
                ty: concrete.clone(),
                handle,
                span: decl.span.clone(),
                scope: module,
                origin: Some(id),
            },
        )
    }
}
