use std::collections::BTreeSet;

use tracing::debug;

use crate::ast::{ModuleItem, Program};
use crate::backend::FunctionBody;
use crate::builtins::Builtins;
use crate::diagnostics::Span;
use crate::error::CompileError;
use crate::scope::{BoundValue, ScopeId, UncheckedDef, UncheckedNode};
use crate::types::{AliasInfo, StructInfo, TypeDecl};

use super::Checker;

impl Checker<'_> {
    pub(crate) fn register_builtins(&mut self, builtins: &Builtins) -> Vec<CompileError> {
        let program = self.arena.program();
        self.builtin_arities = builtins.arities();
        for (name, decl) in &builtins.types {
            self.arena.put_type_decl(program, name, decl.clone());
        }
        let mut errors = Vec::new();
        for symbol in &builtins.symbols {
            let handle = self
                .backend
                .emit_function(&symbol.name, &symbol.ty, FunctionBody::None);
            let bound = self.arena.put_value(
                program,
                BoundValue {
                    name: symbol.name.clone(),
                    ty: symbol.ty.clone(),
                    handle,
                    span: Span::default(),
                    scope: program,
                    origin: None,
                },
            );
            if let Err(err) = bound {
                errors.push(err);
            }
        }
        debug!(
            symbols = builtins.symbols.len(),
            names = self.builtin_arities.len(),
            types = builtins.types.len(),
            "registered builtins"
        );
        errors
    }

    /// Scope setup: every module gets a scope, every type name is declared,
    /// then every function and struct constructor is registered unchecked.
    pub(crate) fn register_program(&mut self, program: &Program) -> Vec<CompileError> {
        let mut errors = Vec::new();
        let scopes: Vec<ScopeId> = program
            .modules
            .iter()
            .map(|module| self.arena.new_module(&module.name.name, module.global))
            .collect();

        // Names first so declarations can refer to each other in any order.
        for (module, &scope) in program.modules.iter().zip(&scopes) {
            for item in &module.items {
                let name = match item {
                    ModuleItem::Struct(decl) => &decl.name.name,
                    ModuleItem::TypeAlias(alias) => &alias.name.name,
                    ModuleItem::Function(_) => continue,
                };
                self.arena.put_type_decl(scope, name, TypeDecl::Pending);
            }
        }

        for (module, &scope) in program.modules.iter().zip(&scopes) {
            for item in &module.items {
                match item {
                    ModuleItem::TypeAlias(alias) => {
                        let params: Vec<String> =
                            alias.params.iter().map(|p| p.name.clone()).collect();
                        let generics: BTreeSet<String> = params.iter().cloned().collect();
                        match self.lower_type(scope, &alias.aliased, &generics) {
                            Ok(body) => self.arena.put_type_decl(
                                scope,
                                &alias.name.name,
                                TypeDecl::Alias(AliasInfo { params, body }),
                            ),
                            Err(err) => errors.push(err.with_frame(
                                format!("while declaring type `{}`", alias.name.name),
                                alias.span.clone(),
                            )),
                        }
                    }
                    ModuleItem::Struct(decl) => {
                        let params: Vec<String> =
                            decl.type_params.iter().map(|p| p.name.clone()).collect();
                        let generics: BTreeSet<String> = params.iter().cloned().collect();
                        let fields: Result<Vec<_>, _> = decl
                            .fields
                            .iter()
                            .map(|field| {
                                self.lower_type(scope, &field.ty, &generics)
                                    .map(|ty| (field.name.name.clone(), ty))
                            })
                            .collect();
                        match fields {
                            Ok(fields) => self.arena.put_type_decl(
                                scope,
                                &decl.name.name,
                                TypeDecl::Struct(StructInfo { params, fields }),
                            ),
                            Err(err) => errors.push(err.with_frame(
                                format!("while declaring type `{}`", decl.name.name),
                                decl.span.clone(),
                            )),
                        }
                    }
                    ModuleItem::Function(_) => {}
                }
            }
        }

        for (module, &scope) in program.modules.iter().zip(&scopes) {
            for item in &module.items {
                let def = match item {
                    ModuleItem::Function(defn) => UncheckedDef {
                        name: defn.name.name.clone(),
                        arity: defn.params.len(),
                        module: scope,
                        node: UncheckedNode::Function(defn.clone()),
                    },
                    ModuleItem::Struct(decl) => UncheckedDef {
                        name: decl.name.name.clone(),
                        arity: decl.fields.len(),
                        module: scope,
                        node: UncheckedNode::DataCtor(decl.clone()),
                    },
                    ModuleItem::TypeAlias(_) => continue,
                };
                debug!(
                    module = %module.name.name,
                    name = %def.name,
                    arity = def.arity,
                    "registered unchecked"
                );
                self.arena.put_unchecked(scope, def);
            }
        }
        errors
    }
}
