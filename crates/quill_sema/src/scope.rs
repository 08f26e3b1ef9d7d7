//! Scope tree and symbol tables.
//!
//! Scopes live in one arena and refer to each other by index. Symbol tables
//! only ever grow while a definition is being checked; the batch driver takes
//! a [`Checkpoint`] before each top-level definition and rolls back to it when
//! that definition fails.

use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::trace;

use crate::ast::{FunctionDefn, StructDecl};
use crate::backend::Handle;
use crate::diagnostics::Span;
use crate::error::{CompileError, ErrorKind, SemaResult};
use crate::types::{BindingMap, Type, TypeDecl, TypeEnv};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UncheckedId(usize);

#[derive(Debug, Clone)]
pub struct Capture {
    pub name: String,
    /// The value as seen from the running scope.
    pub original: ValueId,
    /// The placeholder read out of the closure environment.
    pub inside: ValueId,
}

#[derive(Debug, Clone)]
pub struct ClosureFrame {
    pub running: ScopeId,
    pub handle: Handle,
    pub env: Handle,
    pub return_type: Type,
    pub captures: Vec<Capture>,
}

#[derive(Debug, Clone)]
pub enum ScopeKind {
    Program,
    Module,
    Function { handle: Handle, return_type: Type },
    Local,
    Closure(ClosureFrame),
    GenericSubstitution { callee: String },
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub name: String,
    pub parent: Option<ScopeId>,
    pub kind: ScopeKind,
    /// name -> canonical signature -> value.
    values: BTreeMap<String, BTreeMap<String, ValueId>>,
    unchecked: BTreeMap<String, Vec<UncheckedId>>,
    type_bindings: BindingMap,
    types: TypeEnv,
}

impl Scope {
    fn new(name: &str, parent: Option<ScopeId>, kind: ScopeKind) -> Self {
        Self {
            name: name.to_string(),
            parent,
            kind,
            values: BTreeMap::new(),
            unchecked: BTreeMap::new(),
            type_bindings: BindingMap::new(),
            types: TypeEnv::default(),
        }
    }

    pub fn own_values(&self, name: &str) -> Vec<ValueId> {
        self.values
            .get(name)
            .map(|by_sig| by_sig.values().copied().collect())
            .unwrap_or_default()
    }
}

/// A checked definition: something the backend has a handle for.
#[derive(Debug, Clone)]
pub struct BoundValue {
    pub name: String,
    pub ty: Type,
    pub handle: Handle,
    pub span: Span,
    pub scope: ScopeId,
    /// The unchecked definition this value was instantiated from.
    pub origin: Option<UncheckedId>,
}

#[derive(Debug, Clone)]
pub enum UncheckedNode {
    Function(Rc<FunctionDefn>),
    DataCtor(Rc<StructDecl>),
}

#[derive(Debug, Clone)]
pub struct UncheckedDef {
    pub name: String,
    pub arity: usize,
    pub module: ScopeId,
    pub node: UncheckedNode,
}

impl UncheckedDef {
    pub fn span(&self) -> &Span {
        match &self.node {
            UncheckedNode::Function(defn) => &defn.span,
            UncheckedNode::DataCtor(decl) => &decl.span,
        }
    }

    pub fn is_generic(&self) -> bool {
        match &self.node {
            UncheckedNode::Function(defn) => {
                !defn.type_params.is_empty() || defn.params.iter().any(|param| param.ty.is_none())
            }
            UncheckedNode::DataCtor(decl) => !decl.type_params.is_empty(),
        }
    }
}

/// Everything a name could refer to when called.
#[derive(Debug, Clone, Default)]
pub struct Callables {
    pub checked: Vec<ValueId>,
    pub unchecked: Vec<UncheckedId>,
}

impl Callables {
    pub fn is_empty(&self) -> bool {
        self.checked.is_empty() && self.unchecked.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Checkpoint {
    scopes: usize,
    values: usize,
    journal: usize,
}

#[derive(Debug)]
pub struct ScopeArena {
    scopes: Vec<Scope>,
    values: Vec<BoundValue>,
    unchecked: Vec<UncheckedDef>,
    modules: BTreeMap<String, ScopeId>,
    /// (scope, name, key) of every symbol inserted, for rollback.
    journal: Vec<(ScopeId, String, String)>,
}

impl Default for ScopeArena {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeArena {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::new("", None, ScopeKind::Program)],
            values: Vec::new(),
            unchecked: Vec::new(),
            modules: BTreeMap::new(),
            journal: Vec::new(),
        }
    }

    pub fn program(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    pub fn value(&self, id: ValueId) -> &BoundValue {
        &self.values[id.0]
    }

    pub fn values(&self) -> impl Iterator<Item = (ValueId, &BoundValue)> {
        self.values
            .iter()
            .enumerate()
            .map(|(index, value)| (ValueId(index), value))
    }

    pub fn unchecked(&self, id: UncheckedId) -> &UncheckedDef {
        &self.unchecked[id.0]
    }

    pub fn unchecked_defs(&self) -> impl Iterator<Item = (UncheckedId, &UncheckedDef)> {
        self.unchecked
            .iter()
            .enumerate()
            .map(|(index, def)| (UncheckedId(index), def))
    }

    pub fn module(&self, name: &str) -> Option<ScopeId> {
        self.modules.get(name).copied()
    }

    /// A global module shares the program scope instead of getting its own.
    pub fn new_module(&mut self, name: &str, global: bool) -> ScopeId {
        if global {
            let program = self.program();
            self.modules.insert(name.to_string(), program);
            return program;
        }
        if let Some(existing) = self.modules.get(name) {
            return *existing;
        }
        let id = self.new_child(self.program(), name, ScopeKind::Module);
        self.modules.insert(name.to_string(), id);
        id
    }

    pub fn new_child(&mut self, parent: ScopeId, name: &str, kind: ScopeKind) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope::new(name, Some(parent), kind));
        id
    }

    /// Binds `value` in `scope`, keyed by its canonical signature so that
    /// alias spellings of one type collide.
    pub fn put_value(&mut self, scope: ScopeId, value: BoundValue) -> SemaResult<ValueId> {
        let key = self.type_env(scope).key(&value.ty);
        if let Some(existing) = self.lookup_signature(scope, &value.name, &key) {
            let previous = &self.values[existing.0];
            return Err(CompileError::new(
                ErrorKind::DuplicateDefinition,
                value.span.clone(),
                format!(
                    "`{}` with signature `{}` is already defined at {}",
                    value.name, value.ty, previous.span
                ),
            ));
        }
        let id = ValueId(self.values.len());
        trace!(scope = scope.0, name = %value.name, %key, "bound value");
        self.scopes[scope.0]
            .values
            .entry(value.name.clone())
            .or_default()
            .insert(key.clone(), id);
        self.journal.push((scope, value.name.clone(), key));
        self.values.push(value);
        Ok(id)
    }

    pub fn put_unchecked(&mut self, scope: ScopeId, def: UncheckedDef) -> UncheckedId {
        let id = UncheckedId(self.unchecked.len());
        self.scopes[scope.0]
            .unchecked
            .entry(def.name.clone())
            .or_default()
            .push(id);
        self.unchecked.push(def);
        id
    }

    pub fn put_type_binding(&mut self, scope: ScopeId, name: &str, ty: Type) {
        self.scopes[scope.0].type_bindings.insert(name.to_string(), ty);
    }

    pub fn put_type_decl(&mut self, scope: ScopeId, name: &str, decl: TypeDecl) {
        self.scopes[scope.0].types.insert(name, decl);
    }

    /// The scope that name resolution continues in after `id`: a closure
    /// continues in the scope it is running in.
    fn outer(&self, id: ScopeId) -> Option<ScopeId> {
        match &self.scopes[id.0].kind {
            ScopeKind::Closure(frame) => Some(frame.running),
            _ => self.scopes[id.0].parent,
        }
    }

    /// Type-variable bindings visible from `id`, innermost first.
    pub fn type_bindings(&self, id: ScopeId) -> BindingMap {
        let own = self.scopes[id.0].type_bindings.clone();
        match self.outer(id) {
            Some(outer) => own.union(self.type_bindings(outer)),
            None => own,
        }
    }

    pub fn type_env(&self, id: ScopeId) -> TypeEnv {
        let own = &self.scopes[id.0].types;
        match self.outer(id) {
            Some(outer) => self.type_env(outer).overlay(own),
            None => own.clone(),
        }
    }

    /// Walks from `scope` toward the root and returns the first scope that
    /// binds `name`, with all of its overloads. The walk follows parents and
    /// stops before `stopping`.
    pub fn lookup(
        &self,
        scope: ScopeId,
        name: &str,
        stopping: Option<ScopeId>,
    ) -> Option<(ScopeId, Vec<ValueId>)> {
        let mut current = Some(scope);
        while let Some(id) = current {
            if Some(id) == stopping {
                return None;
            }
            let found = self.scopes[id.0].own_values(name);
            if !found.is_empty() {
                return Some((id, found));
            }
            current = self.scopes[id.0].parent;
        }
        None
    }

    /// Memo lookup: the value registered in `scope` under `name` with this
    /// canonical signature key.
    pub fn lookup_signature(&self, scope: ScopeId, name: &str, key: &str) -> Option<ValueId> {
        self.scopes[scope.0]
            .values
            .get(name)
            .and_then(|by_key| by_key.get(key))
            .copied()
    }

    /// Overloads of `name` collected from `scope` out to the program scope.
    /// `module::name` skips straight to that module.
    pub fn callables(&self, scope: ScopeId, name: &str) -> Callables {
        let mut out = Callables::default();
        if let Some((module, member)) = name.rsplit_once("::") {
            if let Some(module) = self.module(module) {
                self.collect_callables(module, member, &mut out);
            }
            return out;
        }
        let mut current = Some(scope);
        while let Some(id) = current {
            self.collect_callables(id, name, &mut out);
            current = self.scopes[id.0].parent;
        }
        out
    }

    fn collect_callables(&self, id: ScopeId, name: &str, out: &mut Callables) {
        let scope = &self.scopes[id.0];
        for value in scope.own_values(name) {
            if !out.checked.contains(&value) {
                out.checked.push(value);
            }
        }
        if let Some(unchecked) = scope.unchecked.get(name) {
            out.unchecked.extend(unchecked.iter().copied());
        }
    }

    pub fn module_of(&self, id: ScopeId) -> ScopeId {
        let mut current = id;
        loop {
            match self.scopes[current.0].kind {
                ScopeKind::Module | ScopeKind::Program => return current,
                _ => match self.scopes[current.0].parent {
                    Some(parent) => current = parent,
                    None => return current,
                },
            }
        }
    }

    /// Innermost function or closure scope containing `id`.
    pub fn enclosing_function(&self, id: ScopeId) -> Option<ScopeId> {
        let mut current = Some(id);
        while let Some(scope) = current {
            match self.scopes[scope.0].kind {
                ScopeKind::Function { .. } | ScopeKind::Closure(_) => return Some(scope),
                ScopeKind::Module | ScopeKind::Program => return None,
                _ => current = self.scopes[scope.0].parent,
            }
        }
        None
    }

    pub fn return_type(&self, id: ScopeId) -> Option<Type> {
        let function = self.enclosing_function(id)?;
        match &self.scopes[function.0].kind {
            ScopeKind::Function { return_type, .. } => Some(return_type.clone()),
            ScopeKind::Closure(frame) => Some(frame.return_type.clone()),
            _ => None,
        }
    }

    pub fn closure_frame_mut(&mut self, id: ScopeId) -> Option<&mut ClosureFrame> {
        match &mut self.scopes[id.0].kind {
            ScopeKind::Closure(frame) => Some(frame),
            _ => None,
        }
    }

    pub fn closure_frame(&self, id: ScopeId) -> Option<&ClosureFrame> {
        match &self.scopes[id.0].kind {
            ScopeKind::Closure(frame) => Some(frame),
            _ => None,
        }
    }

    /// Fully qualified name of `name` defined in `scope`'s module.
    pub fn fqn(&self, scope: ScopeId, name: &str) -> String {
        let module = self.module_of(scope);
        match self.scopes[module.0].kind {
            ScopeKind::Program => name.to_string(),
            _ => format!("{}::{}", self.scopes[module.0].name, name),
        }
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            scopes: self.scopes.len(),
            values: self.values.len(),
            journal: self.journal.len(),
        }
    }

    /// Forgets every scope and value created after `checkpoint`.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        for (scope, name, key) in self.journal.drain(checkpoint.journal..) {
            let Some(scope) = self.scopes.get_mut(scope.0) else {
                continue;
            };
            if let Some(by_key) = scope.values.get_mut(&name) {
                by_key.remove(&key);
                if by_key.is_empty() {
                    scope.values.remove(&name);
                }
            }
        }
        self.scopes.truncate(checkpoint.scopes);
        self.values.truncate(checkpoint.values);
    }
}
