//! Typed builtin symbols and types available to every module.

use std::collections::BTreeMap;

use crate::types::{AliasInfo, Type, TypeDecl};

#[derive(Debug, Clone)]
pub struct BuiltinSymbol {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone, Default)]
pub struct Builtins {
    pub symbols: Vec<BuiltinSymbol>,
    pub types: Vec<(String, TypeDecl)>,
}

const INTEGER_NAMES: &[(&str, u16, bool)] = &[
    ("Int", 64, true),
    ("Int8", 8, true),
    ("Int16", 16, true),
    ("Int32", 32, true),
    ("Int64", 64, true),
    ("UInt", 64, false),
    ("UInt8", 8, false),
    ("UInt16", 16, false),
    ("UInt32", 32, false),
    ("UInt64", 64, false),
    ("Byte", 8, false),
];

impl Builtins {
    /// No symbols and no types; callers add what they need with [`Builtins::with`].
    pub fn empty() -> Self {
        Self::default()
    }

    /// Arithmetic and comparison operators, `print`, `str`, and the
    /// primitive types.
    pub fn standard() -> Self {
        let mut builtins = Self::empty();
        for (name, bits, signed) in INTEGER_NAMES {
            builtins.types.push((
                name.to_string(),
                TypeDecl::Alias(AliasInfo {
                    params: Vec::new(),
                    body: Type::integer(*bits, *signed),
                }),
            ));
        }
        for name in ["Float", "Str", "Bool", "Unit"] {
            builtins.types.push((name.to_string(), TypeDecl::Builtin));
        }

        let int = Type::id("Int");
        let float = Type::id("Float");
        let str_ = Type::id("Str");
        let bool_ = Type::id("Bool");
        for op in ["__plus__", "__minus__", "__times__", "__divide__"] {
            builtins = builtins
                .with(op, Type::function(vec![int.clone(), int.clone()], int.clone()))
                .with(op, Type::function(vec![float.clone(), float.clone()], float.clone()));
        }
        builtins = builtins.with(
            "__plus__",
            Type::function(vec![str_.clone(), str_.clone()], str_.clone()),
        );
        for op in ["__eq__", "__lt__", "__gt__"] {
            builtins = builtins
                .with(op, Type::function(vec![int.clone(), int.clone()], bool_.clone()))
                .with(op, Type::function(vec![float.clone(), float.clone()], bool_.clone()));
        }
        builtins
            .with("__eq__", Type::function(vec![str_.clone(), str_.clone()], bool_.clone()))
            .with("__eq__", Type::function(vec![bool_.clone(), bool_.clone()], bool_))
            .with("print", Type::function(vec![str_.clone()], Type::unit()))
            .with("str", Type::function(vec![int], str_.clone()))
            .with("str", Type::function(vec![float], str_))
    }

    pub fn with(mut self, name: &str, ty: Type) -> Self {
        self.symbols.push(BuiltinSymbol {
            name: name.to_string(),
            ty,
        });
        self
    }

    pub fn with_type(mut self, name: &str, decl: TypeDecl) -> Self {
        self.types.push((name.to_string(), decl));
        self
    }

    /// Parameter counts each builtin name is callable with.
    pub fn arities(&self) -> BTreeMap<String, Vec<usize>> {
        let mut out: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for symbol in &self.symbols {
            let arity = symbol.ty.as_function().map(|(params, _)| params.len()).unwrap_or(0);
            let entry = out.entry(symbol.name.clone()).or_default();
            if !entry.contains(&arity) {
                entry.push(arity);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_set_has_overloaded_operators_and_integer_aliases() {
        let builtins = Builtins::standard();
        let plus = builtins.symbols.iter().filter(|s| s.name == "__plus__").count();
        assert_eq!(plus, 3);
        assert_eq!(builtins.arities().get("print"), Some(&vec![1]));
        assert!(builtins
            .types
            .iter()
            .any(|(name, decl)| name == "Byte" && matches!(decl, TypeDecl::Alias(_))));
    }

    #[test]
    fn custom_sets_start_empty() {
        let builtins = Builtins::empty()
            .with_type("Handle", TypeDecl::Builtin)
            .with("open", Type::function(vec![Type::id("Str")], Type::id("Handle")))
            .with(
                "open",
                Type::function(vec![Type::id("Str"), Type::id("Str")], Type::id("Handle")),
            );
        assert_eq!(builtins.types.len(), 1);
        assert_eq!(builtins.arities().get("open"), Some(&vec![1, 2]));
    }
}
