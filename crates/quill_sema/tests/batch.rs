use quill_sema::ast::build::*;
use quill_sema::ast::{BinaryOp, Program};
use quill_sema::{
    check_program, render_diagnostics_json, Builtins, CheckFailure, ErrorKind, RecordingBackend,
    SemaConfig, Span,
};

fn check(program: &Program) -> Result<RecordingBackend, CheckFailure> {
    let mut backend = RecordingBackend::new();
    check_program(program, &Builtins::standard(), &SemaConfig::default(), &mut backend)
        .map(|_| backend)
}

fn check_err(program: &Program) -> CheckFailure {
    match check(program) {
        Ok(_) => panic!("expected errors"),
        Err(failure) => failure,
    }
}

#[test]
fn every_failing_definition_is_reported() {
    let program = program(vec![
        module(
            "a",
            vec![
                function("bad_call")
                    .at(2, 1)
                    .body(vec![expr(call("missing", vec![]))])
                    .build(),
                function("fine")
                    .returns(ty("Int"))
                    .body(vec![ret(int(1))])
                    .build(),
            ],
        ),
        module(
            "b",
            vec![function("bad_return")
                .at(9, 1)
                .returns(ty("Str"))
                .body(vec![ret(boolean(true))])
                .build()],
        ),
    ]);
    let failure = check_err(&program);
    assert_eq!(
        failure.kinds(),
        vec![ErrorKind::UnboundSymbol, ErrorKind::UnificationMismatch]
    );
    assert_eq!(failure.to_string(), "semantic analysis failed with 2 error(s)");
}

#[test]
fn failed_definition_leaves_no_checked_values_behind() {
    let program = program(vec![module(
        "main",
        vec![
            function("helper")
                .type_param("T")
                .param("x", ty("T"))
                .returns(ty("T"))
                .body(vec![ret(ident("x"))])
                .build(),
            function("broken")
                .body(vec![
                    expr(call("helper", vec![int(1)])),
                    expr(call("missing", vec![])),
                ])
                .build(),
            function("ok")
                .body(vec![expr(call("helper", vec![int(2)]))])
                .build(),
        ],
    )]);
    let mut backend = RecordingBackend::new();
    let failure = check_program(
        &program,
        &Builtins::standard(),
        &SemaConfig::default(),
        &mut backend,
    )
    .expect_err("broken fails");
    assert_eq!(failure.kinds(), vec![ErrorKind::UnboundSymbol]);
    // The instantiation made for `broken` was discarded, so `ok` emits its own.
    assert_eq!(
        backend.functions_named("main::helper"),
        vec!["fn(Int) -> Int", "fn(Int) -> Int"]
    );
}

#[test]
fn report_lists_context_frames_innermost_first() {
    let program = program(vec![module(
        "main",
        vec![function("main")
            .at(1, 1)
            .body(vec![expr(call_at("nope", vec![], Span::point(2, 5)))])
            .build()],
    )]);
    let failure = check_err(&program);
    let report = failure.render_report("main.ql");
    let lines: Vec<&str> = report.lines().collect();
    assert_eq!(
        lines,
        vec![
            "error[E3001] main.ql:2:5 unbound symbol: `nope` is not defined in any visible scope",
            "  note: while checking statement `nope(...)` at main.ql:2:5",
            "  note: while instantiating `main::main` as `fn() -> Unit` at main.ql:1:1",
            "  note: while checking definition `main::main` at main.ql:1:1",
        ]
    );

    let json = render_diagnostics_json("main.ql", &failure.diagnostics());
    assert_eq!(json["diagnostics"][0]["code"], "E3001");
    assert_eq!(json["diagnostics"][0]["labels"].as_array().map(Vec::len), Some(3));
}

#[test]
fn let_shadows_only_for_the_rest_of_the_block() {
    let shadowed = program(vec![module(
        "main",
        vec![function("main")
            .body(vec![
                let_("v", int(1)),
                let_("v", string("now a string")),
                expr(call("print", vec![ident("v")])),
            ])
            .build()],
    )]);
    assert!(check(&shadowed).is_ok());

    let leaked = program(vec![module(
        "main",
        vec![function("main")
            .body(vec![
                if_(boolean(true), vec![let_("inner", int(1))], None),
                expr(call("str", vec![ident("inner")])),
            ])
            .build()],
    )]);
    assert_eq!(check_err(&leaked).kinds(), vec![ErrorKind::UnboundSymbol]);
}

#[test]
fn conditions_must_be_bool() {
    let ok = program(vec![module(
        "main",
        vec![function("main")
            .body(vec![if_(
                binary(BinaryOp::Lt, int(1), int(2)),
                vec![expr(call("print", vec![string("less")]))],
                Some(vec![expr(call("print", vec![string("more")]))]),
            )])
            .build()],
    )]);
    assert!(check(&ok).is_ok());

    let bad = program(vec![module(
        "main",
        vec![function("main")
            .body(vec![if_(int(1), vec![], None)])
            .build()],
    )]);
    assert_eq!(check_err(&bad).kinds(), vec![ErrorKind::UnificationMismatch]);
}

#[test]
fn returns_accept_implicit_conversions() {
    let program = program(vec![module(
        "main",
        vec![
            function("maybe_name")
                .returns(quill_sema::ast::TypeExpr::Maybe(Box::new(ty("Str"))))
                .body(vec![ret(string("quill"))])
                .build(),
            function("small")
                .returns(ty("Int8"))
                .body(vec![ret(int(3))])
                .build(),
        ],
    )]);
    assert!(check(&program).is_ok());
}

#[test]
fn unknown_type_names_are_unbound() {
    let program = program(vec![module(
        "main",
        vec![function("f")
            .param("x", ty("Missing"))
            .body(vec![])
            .build()],
    )]);
    let failure = check_err(&program);
    assert_eq!(failure.kinds(), vec![ErrorKind::UnboundSymbol]);
    assert!(failure.errors[0].message.contains("unknown type `Missing`"));
}

#[test]
fn global_modules_share_the_program_scope() {
    let mut prelude = module(
        "prelude",
        vec![function("shout")
            .param("s", ty("Str"))
            .body(vec![expr(call("print", vec![ident("s")]))])
            .build()],
    );
    prelude.global = true;
    let program = program(vec![
        prelude,
        module(
            "main",
            vec![function("main")
                .body(vec![expr(call("shout", vec![string("hey")]))])
                .build()],
        ),
    ]);
    let backend =
        check(&program).unwrap_or_else(|failure| panic!("{}", failure.render_report("t.ql")));
    assert_eq!(backend.functions_named("shout"), vec!["fn(Str) -> Unit"]);
}

#[test]
fn a_failing_callee_is_reported_once_whatever_the_order() {
    let broken = || {
        function("broken")
            .body(vec![expr(call_at("nope", vec![], Span::point(7, 5)))])
            .build()
    };
    let caller = || {
        function("main")
            .body(vec![expr(call("broken", vec![]))])
            .build()
    };

    let caller_first = check_err(&program(vec![module("main", vec![caller(), broken()])]));
    assert_eq!(caller_first.kinds(), vec![ErrorKind::UnboundSymbol]);
    assert_eq!(caller_first.errors[0].span, Span::point(7, 5));
    assert!(caller_first.errors[0]
        .frames
        .iter()
        .any(|frame| frame.message == "while checking definition `main::main`"));

    let callee_first = check_err(&program(vec![module("main", vec![broken(), caller()])]));
    assert_eq!(callee_first.kinds(), vec![ErrorKind::UnboundSymbol]);
    assert!(callee_first.errors[0]
        .frames
        .iter()
        .any(|frame| frame.message == "while checking definition `main::broken`"));
}
