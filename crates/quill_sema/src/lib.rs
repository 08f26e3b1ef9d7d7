pub mod ast;
pub mod backend;
pub mod builtins;
mod check;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod scope;
pub mod types;

use tracing::{debug, info};

pub use ast::Program;
pub use backend::{Backend, BackendEvent, FunctionBody, Handle, RecordingBackend, TypeHandle};
pub use builtins::Builtins;
pub use config::{ConfigError, SemaConfig};
pub use diagnostics::{render_diagnostics, render_diagnostics_json, Diagnostic, Position, Span};
pub use error::{CheckFailure, CompileError, ContextFrame, ErrorKind, SemaResult};
pub use types::{BindingMap, Type, TypeKind};

use check::Checker;
use scope::{BoundValue, ScopeArena, ScopeId, ScopeKind, UncheckedId};

/// The checked state of a whole program.
#[derive(Debug)]
pub struct Compilation {
    arena: ScopeArena,
}

impl Compilation {
    pub fn arena(&self) -> &ScopeArena {
        &self.arena
    }

    pub fn module_scope(&self, name: &str) -> Option<ScopeId> {
        self.arena.module(name)
    }

    /// Top-level checked values called `name` in any module, builtins included.
    pub fn checked_values(&self, name: &str) -> Vec<&BoundValue> {
        self.arena
            .values()
            .map(|(_, value)| value)
            .filter(|value| value.name == name)
            .filter(|value| {
                matches!(
                    self.arena.scope(value.scope).kind,
                    ScopeKind::Module | ScopeKind::Program
                )
            })
            .collect()
    }

    /// Checked values of `name` defined in `module`.
    pub fn module_values(&self, module: &str, name: &str) -> Vec<&BoundValue> {
        let Some(scope) = self.arena.module(module) else {
            return Vec::new();
        };
        self.arena
            .scope(scope)
            .own_values(name)
            .into_iter()
            .map(|id| self.arena.value(id))
            .collect()
    }
}

/// Checks every module of `program`. Non-generic functions and structs are
/// instantiated at their declared types; generic ones only where something
/// calls them. A failing definition is rolled back and the run continues, so
/// the error list covers the whole program; a definition that fails only
/// because something it uses already failed adds no second report.
pub fn check_program(
    program: &Program,
    builtins: &Builtins,
    config: &SemaConfig,
    backend: &mut dyn Backend,
) -> Result<Compilation, CheckFailure> {
    let mut checker = Checker::new(backend, config.clone());
    let mut errors = checker.register_builtins(builtins);
    errors.extend(checker.register_program(program));

    let roots: Vec<UncheckedId> = checker
        .arena
        .unchecked_defs()
        .filter(|(_, def)| !def.is_generic())
        .map(|(id, _)| id)
        .collect();
    info!(
        modules = program.modules.len(),
        definitions = roots.len(),
        "checking program"
    );

    for id in roots {
        let def = checker.arena.unchecked(id);
        let fqn = checker.arena.fqn(def.module, &def.name);
        let span = def.span().clone();
        let checkpoint = checker.arena.checkpoint();
        if let Err(err) = checker.instantiate(id, &BindingMap::new(), &span) {
            debug!(definition = %fqn, error = %err, "definition failed; rolling back");
            checker.arena.rollback(checkpoint);
            // The failure it repeats has its own report already.
            if err.depends_on.is_none() {
                errors.push(err.with_frame(format!("while checking definition `{fqn}`"), span));
            }
        }
    }

    if errors.is_empty() {
        Ok(Compilation {
            arena: checker.into_arena(),
        })
    } else {
        Err(CheckFailure { errors })
    }
}
