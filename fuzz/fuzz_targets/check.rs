#![no_main]

use libfuzzer_sys::fuzz_target;
use quill_sema::ast::build::*;
use quill_sema::ast::{BinaryOp, Expr, ModuleItem, Stmt};
use quill_sema::{check_program, Builtins, RecordingBackend, SemaConfig};

const CALLEES: &[&str] = &["id", "pair", "print", "str", "main::id", "missing"];

fn expression(bytes: &mut impl Iterator<Item = u8>, depth: usize) -> Expr {
    let tag = bytes.next().unwrap_or(0);
    if depth > 4 {
        return int(i64::from(tag));
    }
    match tag % 8 {
        0 => int(i64::from(tag)),
        1 => string("s"),
        2 => boolean(tag % 2 == 0),
        3 => ident(["x", "y", "id"][usize::from(tag) % 3]),
        4 => call(
            CALLEES[usize::from(tag) % CALLEES.len()],
            (0..tag % 3).map(|_| expression(bytes, depth + 1)).collect(),
        ),
        5 => binary(BinaryOp::Add, expression(bytes, depth + 1), expression(bytes, depth + 1)),
        6 => tuple(vec![expression(bytes, depth + 1), expression(bytes, depth + 1)]),
        _ => lambda(vec![], None, vec![expr(expression(bytes, depth + 1))]),
    }
}

fn statement(bytes: &mut impl Iterator<Item = u8>) -> Stmt {
    match bytes.next().unwrap_or(0) % 4 {
        0 => let_("x", expression(bytes, 0)),
        1 => let_("y", expression(bytes, 0)),
        2 => if_(expression(bytes, 0), vec![expr(expression(bytes, 0))], None),
        _ => expr(expression(bytes, 0)),
    }
}

fuzz_target!(|data: &[u8]| {
    if data.len() > 2 * 1024 {
        return;
    }
    let mut bytes = data.iter().copied();
    let mut body = Vec::new();
    while body.len() < 16 {
        if bytes.len() == 0 {
            break;
        }
        body.push(statement(&mut bytes));
    }
    let items: Vec<ModuleItem> = vec![
        function("id")
            .type_param("T")
            .param("x", ty("T"))
            .returns(ty("T"))
            .body(vec![ret(ident("x"))])
            .build(),
        function("pair")
            .untyped("a")
            .untyped("b")
            .body(vec![expr(tuple(vec![ident("a"), ident("b")]))])
            .build(),
        function("main").body(body).build(),
    ];
    let config = SemaConfig {
        max_instantiation_depth: 8,
        ..SemaConfig::default()
    };
    let mut backend = RecordingBackend::new();
    // Only termination and the absence of panics matter here.
    let _ = check_program(
        &program(vec![module("main", items)]),
        &Builtins::standard(),
        &config,
        &mut backend,
    );
});
