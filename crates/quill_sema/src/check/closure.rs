//! Function literals and the environments they capture.
//!
//! A closure scope hangs off its module, not off the block it appears in, so
//! ordinary lookup cannot see the enclosing function's locals. Names that
//! resolve in the running scope instead are captured: each gets a slot in the
//! closure's environment and a placeholder value read from that slot.

use std::collections::BTreeSet;
use std::rc::Rc;

use tracing::debug;

use crate::ast::FunctionLiteral;
use crate::backend::FunctionBody;
use crate::error::{CompileError, ErrorKind, SemaResult};
use crate::scope::{BoundValue, Capture, ClosureFrame, ScopeId, ScopeKind, ValueId};
use crate::types::Type;

use super::{Checker, Typed};

impl Checker<'_> {
    /// Finds `name` among the locals visible from `scope`, capturing it into
    /// every closure environment the lookup crosses. Module-level names are
    /// never local.
    pub(crate) fn resolve_local(
        &mut self,
        scope: ScopeId,
        name: &str,
    ) -> SemaResult<Option<ValueId>> {
        let module = self.arena.module_of(scope);
        if scope == module {
            return Ok(None);
        }
        // A closure scope's parent is its module, so this walk ends at the
        // innermost closure around `scope`.
        if let Some((_, ids)) = self.arena.lookup(scope, name, Some(module)) {
            return Ok(ids.first().copied());
        }
        let mut current = scope;
        let frame = loop {
            if let Some(frame) = self.arena.closure_frame(current) {
                break frame;
            }
            match self.arena.scope(current).parent {
                Some(parent) if parent != module => current = parent,
                _ => return Ok(None),
            }
        };
        let (running, env, slot) = (frame.running, frame.env, frame.captures.len() + 1);
        let Some(original) = self.resolve_local(running, name)? else {
            return Ok(None);
        };
        let captured = self.arena.value(original).clone();
        let handle = self.backend.emit_field(env, slot, &captured.ty);
        let inside = self.arena.put_value(
            current,
            BoundValue {
                name: name.to_string(),
                ty: captured.ty.clone(),
                handle,
                span: captured.span.clone(),
                scope: current,
                origin: None,
            },
        )?;
        debug!(name, slot, ty = %captured.ty, "captured into closure environment");
        if let Some(frame) = self.arena.closure_frame_mut(current) {
            frame.captures.push(Capture {
                name: name.to_string(),
                original,
                inside,
            });
        }
        Ok(Some(inside))
    }

    pub(crate) fn check_function_literal(
        &mut self,
        scope: ScopeId,
        literal: &Rc<FunctionLiteral>,
        expected: Option<&Type>,
    ) -> SemaResult<Typed> {
        let expected_fn = expected
            .and_then(Type::as_function)
            .filter(|(params, _)| params.len() == literal.params.len());
        let no_generics = BTreeSet::new();

        let mut params = Vec::with_capacity(literal.params.len());
        for (index, param) in literal.params.iter().enumerate() {
            let ty = match (&param.ty, &expected_fn) {
                (Some(ty), _) => self.lower_type(scope, ty, &no_generics)?,
                (None, Some((expected_params, _))) => expected_params[index].clone(),
                (None, None) => {
                    return Err(CompileError::new(
                        ErrorKind::UnboundTypeVariable,
                        param.name.span.clone(),
                        format!(
                            "cannot infer the type of closure parameter `{}`; annotate it",
                            param.name.name
                        ),
                    ))
                }
            };
            self.bind_type(scope, &ty, &param.name.span)?;
            params.push((Some(param.name.name.clone()), ty));
        }
        let ret = match (&literal.ret, &expected_fn) {
            (Some(ret), _) => self.lower_type(scope, ret, &no_generics)?,
            (None, Some((_, ret))) => (*ret).clone(),
            (None, None) => Type::unit(),
        };
        self.bind_type(scope, &ret, &literal.span)?;
        let fn_ty = Type::function_named(params.clone(), ret.clone());

        let module = self.arena.module_of(scope);
        let local_name = self.fresh_name("closure");
        let name = self.arena.fqn(module, &local_name);
        let handle = self.backend.emit_function(&name, &fn_ty, FunctionBody::Checked);
        let env = self.backend.emit_env(handle);
        let closure = self.arena.new_child(
            module,
            &name,
            ScopeKind::Closure(ClosureFrame {
                running: scope,
                handle,
                env,
                return_type: ret,
                captures: Vec::new(),
            }),
        );
        for (index, (param, (_, ty))) in literal.params.iter().zip(&params).enumerate() {
            let param_handle = self.backend.emit_param(handle, index, &param.name.name, ty);
            self.arena.put_value(
                closure,
                BoundValue {
                    name: param.name.name.clone(),
                    ty: ty.clone(),
                    handle: param_handle,
                    span: param.name.span.clone(),
                    scope: closure,
                    origin: None,
                },
            )?;
        }

        self.check_block(closure, &literal.body)?;

        let captures = self
            .arena
            .closure_frame(closure)
            .map(|frame| frame.captures.clone())
            .unwrap_or_default();
        let mut dims = vec![fn_ty.clone()];
        let mut names = vec!["fn".to_string()];
        let mut args = vec![handle];
        for capture in &captures {
            let original = self.arena.value(capture.original);
            dims.push(original.ty.clone());
            names.push(capture.name.clone());
            args.push(original.handle);
        }
        let env_ty = Type::structure(dims.clone(), Some(names));
        self.bind_type(scope, &env_ty, &literal.span)?;
        let ctor_ty = Type::function(dims, env_ty);
        let ctor = self
            .backend
            .emit_function(&format!("{name}::env"), &ctor_ty, FunctionBody::None);
        let value = self.backend.emit_call(ctor, &args);
        debug!(closure = %name, captures = captures.len(), "built closure environment");
        Ok(Typed {
            ty: fn_ty,
            handle: value,
        })
    }
}
