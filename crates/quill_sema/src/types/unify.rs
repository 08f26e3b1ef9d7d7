use tracing::trace;

use super::{BindingMap, Type, TypeEnv, TypeKind};

/// Outcome of matching an actual type against an expected one.
#[derive(Debug, Clone)]
pub struct Unification {
    pub success: bool,
    pub bindings: BindingMap,
    /// Implicit conversions the match relies on; fitting prefers zero.
    pub coercions: usize,
    pub reason: Option<String>,
}

impl Unification {
    /// `ty` with every binding of this result applied.
    pub fn apply(&self, ty: &Type) -> Type {
        ty.rebind(&self.bindings)
    }
}

pub fn unify(expected: &Type, actual: &Type, env: &TypeEnv) -> Unification {
    unify_with(expected, actual, env, BindingMap::new())
}

/// Unifies starting from `bindings`; a failed result still carries the
/// bindings that were in effect when it started.
pub fn unify_with(
    expected: &Type,
    actual: &Type,
    env: &TypeEnv,
    bindings: BindingMap,
) -> Unification {
    let mut unifier = Unifier {
        env,
        bindings: bindings.clone(),
        coercions: 0,
    };
    match unifier.unify(expected, actual) {
        Ok(()) => Unification {
            success: true,
            bindings: unifier.bindings,
            coercions: unifier.coercions,
            reason: None,
        },
        Err(reason) => {
            trace!(expected = %expected, actual = %actual, %reason, "unification failed");
            Unification {
                success: false,
                bindings,
                coercions: unifier.coercions,
                reason: Some(reason),
            }
        }
    }
}

struct Unifier<'a> {
    env: &'a TypeEnv,
    bindings: BindingMap,
    coercions: usize,
}

impl Unifier<'_> {
    fn unify(&mut self, expected: &Type, actual: &Type) -> Result<(), String> {
        let expected = expected.rebind(&self.bindings);
        let actual = actual.rebind(&self.bindings);
        if expected == actual {
            return Ok(());
        }
        match (expected.kind(), actual.kind()) {
            (TypeKind::Variable(var), _) => self.bind_var(var, &actual),
            (_, TypeKind::Variable(var)) => self.bind_var(var, &expected),
            (TypeKind::Integer { .. }, TypeKind::Integer { .. }) => {
                self.coercions += 1;
                Ok(())
            }
            (
                TypeKind::Function {
                    args: expected_args,
                    ret: expected_ret,
                },
                TypeKind::Function {
                    args: actual_args,
                    ret: actual_ret,
                },
            ) => {
                if expected_args.len() != actual_args.len() {
                    return Err(format!(
                        "expected a function of {} argument(s), found {}: `{}` vs `{}`",
                        expected_args.len(),
                        actual_args.len(),
                        expected,
                        actual
                    ));
                }
                for ((_, e), (_, a)) in expected_args.iter().zip(actual_args) {
                    self.unify(e, a)?;
                }
                self.unify(expected_ret, actual_ret)
            }
            (TypeKind::Operator(el, er), TypeKind::Operator(al, ar)) => {
                let saved = (self.bindings.clone(), self.coercions);
                match self.unify(el, al).and_then(|()| self.unify(er, ar)) {
                    Ok(()) => Ok(()),
                    Err(reason) => {
                        (self.bindings, self.coercions) = saved;
                        self.retry_expanded(&expected, &actual).unwrap_or(Err(reason))
                    }
                }
            }
            (TypeKind::Struct { dims: e, .. }, TypeKind::Struct { dims: a, .. })
            | (TypeKind::Tuple(e), TypeKind::Tuple(a)) => {
                if e.len() != a.len() {
                    return Err(format!(
                        "expected `{expected}` with {} element(s), found `{actual}` with {}",
                        e.len(),
                        a.len()
                    ));
                }
                for (e, a) in e.iter().zip(a) {
                    self.unify(e, a)?;
                }
                Ok(())
            }
            (TypeKind::Ref(e), TypeKind::Ref(a))
            | (TypeKind::Maybe(e), TypeKind::Maybe(a))
            | (TypeKind::Pointer(e), TypeKind::Pointer(a))
            | (TypeKind::Extern(e), TypeKind::Extern(a)) => self.unify(e, a),
            (TypeKind::Sum(_), TypeKind::Sum(options)) => {
                for option in options {
                    self.unify(&expected, option)?;
                }
                Ok(())
            }
            _ => {
                if let Some(result) = self.retry_expanded(&expected, &actual) {
                    return result;
                }
                self.unify_mismatched(&expected, &actual)
            }
        }
    }

    /// Rules that apply only once alias expansion has nothing left to offer.
    fn unify_mismatched(&mut self, expected: &Type, actual: &Type) -> Result<(), String> {
        match (expected.kind(), actual.kind()) {
            (TypeKind::Sum(options), _) => {
                for option in options {
                    let saved = (self.bindings.clone(), self.coercions);
                    if self.unify(option, actual).is_ok() {
                        return Ok(());
                    }
                    (self.bindings, self.coercions) = saved;
                }
                Err(format!("`{actual}` is not one of the options of `{expected}`"))
            }
            (TypeKind::Maybe(element), _) => {
                self.unify(element, actual)?;
                self.coercions += 1;
                Ok(())
            }
            (_, TypeKind::Ref(inner)) => self.unify(expected, inner),
            _ => Err(format!("expected `{expected}`, found `{actual}`")),
        }
    }

    fn retry_expanded(&mut self, expected: &Type, actual: &Type) -> Option<Result<(), String>> {
        let expanded_expected = self.env.expand(expected);
        let expanded_actual = self.env.expand(actual);
        if expanded_expected.is_none() && expanded_actual.is_none() {
            return None;
        }
        let expected = expanded_expected.unwrap_or_else(|| expected.clone());
        let actual = expanded_actual.unwrap_or_else(|| actual.clone());
        Some(self.unify(&expected, &actual))
    }

    fn bind_var(&mut self, var: &str, ty: &Type) -> Result<(), String> {
        if ty.ftvs().contains(var) {
            return Err(format!("recursive unification: `'{var}` occurs in `{ty}`"));
        }
        self.bindings.insert(var.to_string(), ty.clone());
        Ok(())
    }
}
