//! Immutable type trees.
//!
//! Every node caches its canonical signature when it is built, so equality,
//! hashing and memo keys are plain string comparisons.

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

mod unify;

pub use self::unify::{unify, unify_with, Unification};

/// Type-variable name to type.
pub type BindingMap = im::OrdMap<String, Type>;

#[derive(Debug, Clone)]
pub enum TypeKind {
    Variable(String),
    Id(String),
    /// Type application, curried: `Map K V` is `Operator(Operator(Map, K), V)`.
    Operator(Type, Type),
    Function {
        args: Vec<(Option<String>, Type)>,
        ret: Type,
    },
    Struct {
        dims: Vec<Type>,
        names: Option<Vec<String>>,
    },
    Tuple(Vec<Type>),
    Sum(Vec<Type>),
    Ref(Type),
    Maybe(Type),
    Pointer(Type),
    Integer {
        bits: u16,
        signed: bool,
    },
    Extern(Type),
}

struct TypeNode {
    kind: TypeKind,
    signature: String,
}

#[derive(Clone)]
pub struct Type(Rc<TypeNode>);

impl Type {
    fn new(kind: TypeKind) -> Self {
        let signature = signature_of(&kind);
        Type(Rc::new(TypeNode { kind, signature }))
    }

    pub fn var(name: &str) -> Self {
        Self::new(TypeKind::Variable(name.to_string()))
    }

    pub fn id(name: &str) -> Self {
        Self::new(TypeKind::Id(name.to_string()))
    }

    pub fn unit() -> Self {
        Self::id("Unit")
    }

    pub fn operator(left: Type, right: Type) -> Self {
        Self::new(TypeKind::Operator(left, right))
    }

    /// `base<args...>` as a chain of operators.
    pub fn apply(base: Type, args: impl IntoIterator<Item = Type>) -> Self {
        args.into_iter().fold(base, Type::operator)
    }

    pub fn function(args: Vec<Type>, ret: Type) -> Self {
        Self::function_named(args.into_iter().map(|ty| (None, ty)).collect(), ret)
    }

    pub fn function_named(args: Vec<(Option<String>, Type)>, ret: Type) -> Self {
        Self::new(TypeKind::Function { args, ret })
    }

    pub fn structure(dims: Vec<Type>, names: Option<Vec<String>>) -> Self {
        Self::new(TypeKind::Struct { dims, names })
    }

    pub fn tuple(dims: Vec<Type>) -> Self {
        Self::new(TypeKind::Tuple(dims))
    }

    pub fn sum(options: Vec<Type>) -> Self {
        Self::new(TypeKind::Sum(options))
    }

    pub fn reference(element: Type) -> Self {
        Self::new(TypeKind::Ref(element))
    }

    pub fn maybe(element: Type) -> Self {
        Self::new(TypeKind::Maybe(element))
    }

    pub fn pointer(element: Type) -> Self {
        Self::new(TypeKind::Pointer(element))
    }

    pub fn integer(bits: u16, signed: bool) -> Self {
        Self::new(TypeKind::Integer { bits, signed })
    }

    pub fn extern_(inner: Type) -> Self {
        Self::new(TypeKind::Extern(inner))
    }

    pub fn kind(&self) -> &TypeKind {
        &self.0.kind
    }

    pub fn signature(&self) -> &str {
        &self.0.signature
    }

    pub fn ftvs(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_ftvs(&mut out);
        out
    }

    pub fn ftv_count(&self) -> usize {
        self.ftvs().len()
    }

    pub fn is_concrete(&self) -> bool {
        self.ftvs().is_empty()
    }

    fn collect_ftvs(&self, out: &mut BTreeSet<String>) {
        match self.kind() {
            TypeKind::Variable(name) => {
                out.insert(name.clone());
            }
            TypeKind::Id(_) | TypeKind::Integer { .. } => {}
            TypeKind::Operator(left, right) => {
                left.collect_ftvs(out);
                right.collect_ftvs(out);
            }
            TypeKind::Function { args, ret } => {
                for (_, arg) in args {
                    arg.collect_ftvs(out);
                }
                ret.collect_ftvs(out);
            }
            TypeKind::Struct { dims, .. } | TypeKind::Tuple(dims) | TypeKind::Sum(dims) => {
                for dim in dims {
                    dim.collect_ftvs(out);
                }
            }
            TypeKind::Ref(inner)
            | TypeKind::Maybe(inner)
            | TypeKind::Pointer(inner)
            | TypeKind::Extern(inner) => inner.collect_ftvs(out),
        }
    }

    /// Substitutes bound variables, following chains of bindings.
    pub fn rebind(&self, bindings: &BindingMap) -> Type {
        if bindings.is_empty() {
            return self.clone();
        }
        match self.kind() {
            TypeKind::Variable(name) => match bindings.get(name) {
                Some(bound) => bound.rebind(bindings),
                None => self.clone(),
            },
            _ => self.map_children(|child| child.rebind(bindings)),
        }
    }

    /// Rebuilds this node with `f` applied to each direct child type.
    fn map_children(&self, f: impl Fn(&Type) -> Type) -> Type {
        let all = |items: &[Type]| -> Vec<Type> { items.iter().map(&f).collect() };
        match self.kind() {
            TypeKind::Variable(_) | TypeKind::Id(_) | TypeKind::Integer { .. } => self.clone(),
            TypeKind::Operator(left, right) => Type::operator(f(left), f(right)),
            TypeKind::Function { args, ret } => Self::new(TypeKind::Function {
                args: args.iter().map(|(name, ty)| (name.clone(), f(ty))).collect(),
                ret: f(ret),
            }),
            TypeKind::Struct { dims, names } => Type::structure(all(dims), names.clone()),
            TypeKind::Tuple(dims) => Type::tuple(all(dims)),
            TypeKind::Sum(options) => Type::sum(all(options)),
            TypeKind::Ref(inner) => Type::reference(f(inner)),
            TypeKind::Maybe(inner) => Type::maybe(f(inner)),
            TypeKind::Pointer(inner) => Type::pointer(f(inner)),
            TypeKind::Extern(inner) => Type::extern_(f(inner)),
        }
    }

    /// Parameter types and return type, if this is a function type.
    pub fn as_function(&self) -> Option<(Vec<Type>, &Type)> {
        match self.kind() {
            TypeKind::Function { args, ret, .. } => {
                Some((args.iter().map(|(_, ty)| ty.clone()).collect(), ret))
            }
            _ => None,
        }
    }

    /// Splits an application chain into its head and arguments.
    pub fn split_application(&self) -> (Type, Vec<Type>) {
        let mut args = Vec::new();
        let mut head = self.clone();
        while let TypeKind::Operator(left, right) = head.kind() {
            args.push(right.clone());
            let next = left.clone();
            head = next;
        }
        args.reverse();
        (head, args)
    }
}

fn join(items: &[Type]) -> String {
    items
        .iter()
        .map(Type::signature)
        .collect::<Vec<_>>()
        .join(", ")
}

fn signature_of(kind: &TypeKind) -> String {
    match kind {
        TypeKind::Variable(name) => format!("'{name}"),
        TypeKind::Id(name) => name.clone(),
        TypeKind::Operator(left, right) => {
            let (head, mut args) = left.split_application();
            args.push(right.clone());
            format!("{}<{}>", head.signature(), join(&args))
        }
        TypeKind::Function { args, ret } => {
            // Parameter names are documentation only; they never affect identity.
            let params: Vec<&str> = args.iter().map(|(_, ty)| ty.signature()).collect();
            format!("fn({}) -> {}", params.join(", "), ret.signature())
        }
        TypeKind::Struct { dims, names } => match names {
            Some(names) => {
                let fields: Vec<String> = names
                    .iter()
                    .zip(dims)
                    .map(|(name, dim)| format!("{name}: {}", dim.signature()))
                    .collect();
                format!("struct{{{}}}", fields.join(", "))
            }
            None => format!("struct{{{}}}", join(dims)),
        },
        TypeKind::Tuple(dims) => format!("({})", join(dims)),
        TypeKind::Sum(options) => {
            let parts: Vec<&str> = options.iter().map(Type::signature).collect();
            format!("({})", parts.join(" | "))
        }
        TypeKind::Ref(inner) => format!("&{}", inner.signature()),
        TypeKind::Maybe(inner) => format!("{}?", inner.signature()),
        TypeKind::Pointer(inner) => format!("*{}", inner.signature()),
        TypeKind::Integer { bits, signed } => {
            format!("{}int{bits}", if *signed { "" } else { "u" })
        }
        TypeKind::Extern(inner) => format!("extern({})", inner.signature()),
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0) || self.signature() == other.signature()
    }
}

impl Eq for Type {}

impl Hash for Type {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.signature().hash(state);
    }
}

impl PartialOrd for Type {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Type {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.signature().cmp(other.signature())
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type({})", self.signature())
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.signature())
    }
}

#[derive(Debug, Clone)]
pub struct AliasInfo {
    pub params: Vec<String>,
    pub body: Type,
}

#[derive(Debug, Clone)]
pub struct StructInfo {
    pub params: Vec<String>,
    pub fields: Vec<(String, Type)>,
}

#[derive(Debug, Clone)]
pub enum TypeDecl {
    /// Built-in nominal type with no structure visible to the checker.
    Builtin,
    /// Declared but not yet lowered (only during scope setup).
    Pending,
    Alias(AliasInfo),
    Struct(StructInfo),
}

/// Type-name environment: what every nominal name in scope stands for.
#[derive(Debug, Clone, Default)]
pub struct TypeEnv {
    decls: im::OrdMap<String, TypeDecl>,
}

const MAX_ALIAS_EXPANSION: usize = 32;

impl TypeEnv {
    pub fn get(&self, name: &str) -> Option<&TypeDecl> {
        self.decls.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.decls.contains_key(name)
    }

    pub fn insert(&mut self, name: &str, decl: TypeDecl) {
        self.decls.insert(name.to_string(), decl);
    }

    /// Entries of `inner` win over entries of `self`.
    pub fn overlay(&self, inner: &TypeEnv) -> TypeEnv {
        TypeEnv {
            decls: inner.decls.clone().union(self.decls.clone()),
        }
    }

    /// Rewrites an alias at the head of `ty` until the head is no longer an
    /// alias. `None` when there is nothing to expand or the aliases loop.
    pub fn expand(&self, ty: &Type) -> Option<Type> {
        let mut current = ty.clone();
        let mut expanded = false;
        for _ in 0..MAX_ALIAS_EXPANSION {
            let (head, args) = current.split_application();
            let TypeKind::Id(name) = head.kind() else {
                return expanded.then_some(current);
            };
            let Some(TypeDecl::Alias(alias)) = self.decls.get(name) else {
                return expanded.then_some(current);
            };
            if alias.params.len() != args.len() {
                return expanded.then_some(current);
            }
            let mapping: BindingMap = alias.params.iter().cloned().zip(args).collect();
            current = alias.body.rebind(&mapping);
            expanded = true;
        }
        None
    }

    /// `ty` with aliases expanded at every depth. All spellings of one type
    /// share a canonical form, so its signature is the identity key used by
    /// symbol tables and memos; display keeps the written spelling.
    pub fn canonical(&self, ty: &Type) -> Type {
        self.canonical_within(ty, MAX_ALIAS_EXPANSION)
    }

    fn canonical_within(&self, ty: &Type, budget: usize) -> Type {
        if budget == 0 {
            return ty.clone();
        }
        let ty = self.expand(ty).unwrap_or_else(|| ty.clone());
        ty.map_children(|child| self.canonical_within(child, budget - 1))
    }

    /// Signature of the canonical form of `ty`.
    pub fn key(&self, ty: &Type) -> String {
        self.canonical(ty).signature().to_string()
    }

    /// Field names and types of a nominal struct type, with its type
    /// parameters substituted.
    pub fn struct_fields(&self, ty: &Type) -> Option<Vec<(String, Type)>> {
        let ty = self.expand(ty).unwrap_or_else(|| ty.clone());
        match ty.kind() {
            TypeKind::Struct {
                dims,
                names: Some(names),
            } => Some(names.iter().cloned().zip(dims.iter().cloned()).collect()),
            _ => {
                let (head, args) = ty.split_application();
                let TypeKind::Id(name) = head.kind() else {
                    return None;
                };
                let Some(TypeDecl::Struct(info)) = self.decls.get(name) else {
                    return None;
                };
                if info.params.len() != args.len() {
                    return None;
                }
                let mapping: BindingMap = info.params.iter().cloned().zip(args).collect();
                Some(
                    info.fields
                        .iter()
                        .map(|(field, field_ty)| (field.clone(), field_ty.rebind(&mapping)))
                        .collect(),
                )
            }
        }
    }
}
