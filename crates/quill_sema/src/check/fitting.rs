//! Overload resolution: choosing the one definition a call or a value
//! reference denotes among everything visible under that name.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::ast::SpannedName;
use crate::error::{CompileError, ErrorKind, SemaResult};
use crate::scope::{ScopeId, UncheckedId, ValueId};
use crate::types::{unify_with, BindingMap, Type, TypeEnv};

use super::{describe_args, Checker};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Checked(ValueId),
    Unchecked(UncheckedId),
}

#[derive(Debug, Clone)]
struct Fit {
    source: Source,
    bindings: BindingMap,
    /// The candidate's type with the fit's bindings applied.
    resolved: Type,
    coercions: usize,
    /// Free variables of the candidate's template; more means more generic.
    generality: usize,
}

/// What the resolved name is used for.
pub(crate) enum Usage<'a> {
    Call { args: &'a [Type] },
    Value,
}

impl Usage<'_> {
    fn describe(&self, name: &str) -> String {
        match self {
            Usage::Call { args } => format!("`{name}` called with {}", describe_args(args)),
            Usage::Value => format!("`{name}` used as a value"),
        }
    }
}

impl Checker<'_> {
    /// Resolves `name` in `scope` to exactly one checked value, instantiating
    /// a generic definition if that is what fits. `expected` is the type the
    /// context wants the call's result (or the value) to have.
    pub(crate) fn resolve_overload(
        &mut self,
        scope: ScopeId,
        name: &SpannedName,
        usage: Usage<'_>,
        expected: Option<&Type>,
    ) -> SemaResult<ValueId> {
        let callables = self.arena.callables(scope, &name.name);
        if callables.is_empty() {
            return Err(CompileError::unbound_symbol(&name.name, name.span.clone()));
        }
        let env = self.arena.type_env(scope);
        let context = match expected {
            Some(ty) => ty.clone(),
            None => self.fresh("ret"),
        };

        let mut fits: BTreeMap<String, Fit> = BTreeMap::new();
        let mut rejected: Vec<String> = Vec::new();
        let mut candidates: Vec<(Source, Type, TypeEnv, usize)> = Vec::new();
        let program = self.arena.program();
        let mut builtin_rejected = false;
        for id in callables.checked {
            let value = self.arena.value(id);
            if let (Usage::Call { args }, Some(arities)) =
                (&usage, self.builtin_arities.get(&value.name))
            {
                let builtin = value.scope == program && value.origin.is_none();
                if builtin && !arities.contains(&args.len()) {
                    if !builtin_rejected {
                        let counts: Vec<String> = arities.iter().map(usize::to_string).collect();
                        rejected.push(format!(
                            "builtin `{}` takes {} argument(s)",
                            value.name,
                            counts.join(" or ")
                        ));
                        builtin_rejected = true;
                    }
                    continue;
                }
            }
            // An instance ranks with the generality of the template it came from.
            let generality = value
                .origin
                .and_then(|origin| self.declared_type(origin).ok())
                .map_or(0, |declared| declared.ftv_count());
            candidates.push((Source::Checked(id), value.ty.clone(), env.clone(), generality));
        }
        for id in callables.unchecked {
            let def = self.arena.unchecked(id);
            if let Usage::Call { args } = &usage {
                if def.arity != args.len() {
                    rejected.push(format!(
                        "`{}` takes {} argument(s)",
                        self.arena.fqn(def.module, &def.name),
                        def.arity
                    ));
                    continue;
                }
            }
            let def_env = env.overlay(&self.arena.type_env(def.module));
            match self.declared_type(id) {
                Ok(ty) => {
                    let generality = ty.ftv_count();
                    candidates.push((Source::Unchecked(id), ty, def_env, generality));
                }
                Err(err) => rejected.push(err.message),
            }
        }

        for (source, ty, env, generality) in candidates {
            match self.try_fit(source, &ty, &usage, &context, &env, generality) {
                Ok(fit) => {
                    if fit.coercions > 0 && !self.config.allow_coercions {
                        rejected.push(format!("`{ty}` needs an implicit conversion"));
                        continue;
                    }
                    trace!(
                        candidate = %ty,
                        resolved = %fit.resolved,
                        coercions = fit.coercions,
                        "candidate fits"
                    );
                    let key = env.key(&fit.resolved);
                    match fits.get(&key) {
                        Some(kept) if !prefer(&fit, kept) => {}
                        _ => {
                            fits.insert(key, fit);
                        }
                    }
                }
                Err(reason) => rejected.push(format!("`{ty}`: {reason}")),
            }
        }

        let winner = self.select(name, &usage, fits, rejected)?;
        debug!(
            name = %name.name,
            resolved = %winner.resolved,
            coercions = winner.coercions,
            "overload resolved"
        );
        match winner.source {
            Source::Checked(id) => Ok(id),
            Source::Unchecked(id) => self.instantiate(id, &winner.bindings, &name.span),
        }
    }

    fn try_fit(
        &self,
        source: Source,
        ty: &Type,
        usage: &Usage<'_>,
        context: &Type,
        env: &TypeEnv,
        generality: usize,
    ) -> Result<Fit, String> {
        let mut bindings = BindingMap::new();
        let mut coercions = 0;
        match usage {
            Usage::Call { args } => {
                let Some((params, ret)) = ty.as_function() else {
                    return Err("not callable".to_string());
                };
                if params.len() != args.len() {
                    return Err(format!("takes {} argument(s)", params.len()));
                }
                for (param, arg) in params.iter().zip(args.iter()) {
                    let result = unify_with(param, arg, env, bindings);
                    if !result.success {
                        return Err(result.reason.unwrap_or_default());
                    }
                    bindings = result.bindings;
                    coercions += result.coercions;
                }
                let result = unify_with(context, ret, env, bindings);
                if !result.success {
                    return Err(format!("result: {}", result.reason.unwrap_or_default()));
                }
                bindings = result.bindings;
                coercions += result.coercions;
            }
            Usage::Value => {
                let result = unify_with(context, ty, env, bindings);
                if !result.success {
                    return Err(result.reason.unwrap_or_default());
                }
                bindings = result.bindings;
                coercions += result.coercions;
            }
        }
        Ok(Fit {
            source,
            resolved: ty.rebind(&bindings),
            bindings,
            coercions,
            generality,
        })
    }

    fn select(
        &self,
        name: &SpannedName,
        usage: &Usage<'_>,
        fits: BTreeMap<String, Fit>,
        rejected: Vec<String>,
    ) -> SemaResult<Fit> {
        let limit = self.config.max_listed_candidates;
        let (mut exact, mut coercing): (Vec<Fit>, Vec<Fit>) =
            fits.into_values().partition(|fit| fit.coercions == 0);

        match exact.len() {
            0 => {}
            1 => return Ok(exact.remove(0)),
            _ => return Err(self.ambiguous(name, usage, &exact)),
        }
        if coercing.is_empty() {
            let mut message = format!("no overload of {} fits", usage.describe(&name.name));
            for reason in rejected.iter().take(limit) {
                message.push_str(&format!("\n    {reason}"));
            }
            if rejected.len() > limit {
                message.push_str(&format!("\n    ... and {} more", rejected.len() - limit));
            }
            return Err(CompileError::new(
                ErrorKind::UnificationMismatch,
                name.span.clone(),
                message,
            ));
        }

        coercing.sort_by(|a, b| b.generality.cmp(&a.generality));
        if coercing.len() > 1 && coercing[0].generality == coercing[1].generality {
            let tied: Vec<Fit> = coercing
                .iter()
                .take_while(|fit| fit.generality == coercing[0].generality)
                .cloned()
                .collect();
            return Err(self.ambiguous(name, usage, &tied));
        }
        Ok(coercing.swap_remove(0))
    }

    fn ambiguous(&self, name: &SpannedName, usage: &Usage<'_>, fits: &[Fit]) -> CompileError {
        let limit = self.config.max_listed_candidates;
        let mut message = format!("{} is ambiguous between", usage.describe(&name.name));
        for fit in fits.iter().take(limit) {
            message.push_str(&format!("\n    `{}`", fit.resolved));
        }
        if fits.len() > limit {
            message.push_str(&format!("\n    ... and {} more", fits.len() - limit));
        }
        CompileError::new(ErrorKind::AmbiguousOverload, name.span.clone(), message)
    }
}

/// Between two fits with the same resolved signature: an already checked
/// value first, then the less generic template.
fn prefer(candidate: &Fit, kept: &Fit) -> bool {
    match (candidate.source, kept.source) {
        (Source::Checked(_), Source::Unchecked(_)) => true,
        (Source::Unchecked(_), Source::Checked(_)) => false,
        _ => candidate.generality < kept.generality,
    }
}
