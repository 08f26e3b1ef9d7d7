#![no_main]

use libfuzzer_sys::fuzz_target;
use quill_sema::types::{unify, AliasInfo, TypeDecl, TypeEnv};
use quill_sema::Type;

const NAMES: &[&str] = &["Int", "Str", "Bool", "Pair", "Loop"];

/// Reads one type out of the byte stream; deep or exhausted input bottoms out in a leaf.
fn decode(bytes: &mut impl Iterator<Item = u8>, depth: usize) -> Type {
    let Some(tag) = bytes.next() else {
        return Type::id("Unit");
    };
    let index = bytes.next().unwrap_or(0) as usize;
    if depth > 6 {
        return Type::var(&format!("T{}", index % 3));
    }
    match tag % 12 {
        0 => Type::var(&format!("T{}", index % 3)),
        1 => Type::id(NAMES[index % NAMES.len()]),
        2 => Type::integer([8, 16, 32, 64][index % 4], index % 2 == 0),
        3 => Type::function(
            (0..index % 3).map(|_| decode(bytes, depth + 1)).collect(),
            decode(bytes, depth + 1),
        ),
        4 => Type::tuple((0..index % 4).map(|_| decode(bytes, depth + 1)).collect()),
        5 => Type::sum((0..1 + index % 3).map(|_| decode(bytes, depth + 1)).collect()),
        6 => Type::reference(decode(bytes, depth + 1)),
        7 => Type::maybe(decode(bytes, depth + 1)),
        8 => Type::pointer(decode(bytes, depth + 1)),
        9 => Type::apply(Type::id("Pair"), [decode(bytes, depth + 1)]),
        10 => Type::structure(vec![decode(bytes, depth + 1)], Some(vec!["f".to_string()])),
        _ => Type::extern_(decode(bytes, depth + 1)),
    }
}

fuzz_target!(|data: &[u8]| {
    if data.len() > 4 * 1024 {
        return;
    }
    let mut env = TypeEnv::default();
    env.insert(
        "Int",
        TypeDecl::Alias(AliasInfo {
            params: Vec::new(),
            body: Type::integer(64, true),
        }),
    );
    env.insert(
        "Pair",
        TypeDecl::Alias(AliasInfo {
            params: vec!["A".to_string()],
            body: Type::tuple(vec![Type::var("A"), Type::var("A")]),
        }),
    );
    env.insert(
        "Loop",
        TypeDecl::Alias(AliasInfo {
            params: Vec::new(),
            body: Type::id("Loop"),
        }),
    );

    let mut bytes = data.iter().copied();
    let expected = decode(&mut bytes, 0);
    let actual = decode(&mut bytes, 0);

    let same = unify(&expected, &expected, &env);
    assert!(same.success, "unify is not reflexive for {expected}");
    assert_eq!(same.coercions, 0);

    let result = unify(&expected, &actual, &env);
    if result.success {
        // Bindings never leave a variable pointing at itself.
        for (name, ty) in result.bindings.iter() {
            assert!(!ty.rebind(&result.bindings).ftvs().contains(name));
        }
    }
});
