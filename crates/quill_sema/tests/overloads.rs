use quill_sema::ast::build::*;
use quill_sema::ast::{BinaryOp, Program};
use quill_sema::{
    check_program, Builtins, CheckFailure, Compilation, ErrorKind, RecordingBackend, SemaConfig,
};

fn check_ok(program: Program) -> (Compilation, RecordingBackend) {
    check_ok_with(program, &SemaConfig::default())
}

fn check_ok_with(program: Program, config: &SemaConfig) -> (Compilation, RecordingBackend) {
    let mut backend = RecordingBackend::new();
    match check_program(&program, &Builtins::standard(), config, &mut backend) {
        Ok(compilation) => (compilation, backend),
        Err(failure) => panic!("unexpected errors:\n{}", failure.render_report("test.ql")),
    }
}

fn check_err(program: Program) -> CheckFailure {
    check_err_with(program, &SemaConfig::default())
}

fn check_err_with(program: Program, config: &SemaConfig) -> CheckFailure {
    let mut backend = RecordingBackend::new();
    match check_program(&program, &Builtins::standard(), config, &mut backend) {
        Ok(_) => panic!("expected errors"),
        Err(failure) => failure,
    }
}

#[test]
fn builtin_addition_resolves_to_the_int_overload() {
    let program = program(vec![module(
        "main",
        vec![function("main")
            .body(vec![let_typed(
                "sum",
                ty("Int"),
                binary(BinaryOp::Add, int(1), int(2)),
            )])
            .build()],
    )]);
    let (_, backend) = check_ok(program);
    assert!(backend
        .functions_named("__plus__")
        .contains(&"fn(Int, Int) -> Int".to_string()));
}

#[test]
fn user_add_is_checked_once_with_its_declared_type() {
    let program = program(vec![module(
        "main",
        vec![
            function("add")
                .param("a", ty("Int"))
                .param("b", ty("Int"))
                .returns(ty("Int"))
                .body(vec![ret(binary(BinaryOp::Add, ident("a"), ident("b")))])
                .build(),
            function("main")
                .body(vec![let_typed("three", ty("Int"), call("add", vec![int(1), int(2)]))])
                .build(),
        ],
    )]);
    let (compilation, backend) = check_ok(program);
    let adds = compilation.module_values("main", "add");
    assert_eq!(adds.len(), 1);
    assert_eq!(adds[0].ty.signature(), "fn(Int, Int) -> Int");
    assert_eq!(backend.functions_named("main::add").len(), 1);
}

#[test]
fn concrete_overload_beats_a_generic_one_with_the_same_shape() {
    let program = program(vec![module(
        "main",
        vec![
            function("f")
                .type_param("T")
                .param("x", ty("T"))
                .returns(ty("T"))
                .body(vec![ret(ident("x"))])
                .build(),
            function("f")
                .param("x", ty("Int"))
                .returns(ty("Int"))
                .body(vec![ret(int(0))])
                .build(),
            function("main")
                .body(vec![expr(call("f", vec![int(1)])), expr(call("f", vec![string("s")]))])
                .build(),
        ],
    )]);
    let (compilation, backend) = check_ok(program);
    let values = compilation.module_values("main", "f");
    assert_eq!(values.len(), 2);
    // fn(Int) -> Int comes from the non-generic definition only.
    let mut signatures = backend.functions_named("main::f");
    signatures.sort();
    assert_eq!(signatures, vec!["fn(Int) -> Int", "fn(Str) -> Str"]);
}

#[test]
fn calling_an_undefined_name_is_unbound_at_the_call_site() {
    let program = program(vec![module(
        "main",
        vec![function("main")
            .at(3, 1)
            .body(vec![expr(call_at(
                "g",
                vec![int(1)],
                quill_sema::Span::point(4, 5),
            ))])
            .build()],
    )]);
    let failure = check_err(program);
    assert_eq!(failure.kinds(), vec![ErrorKind::UnboundSymbol]);
    let err = &failure.errors[0];
    assert_eq!(err.span, quill_sema::Span::point(4, 5));
    assert!(err.message.contains("`g`"));
    let frames: Vec<&str> = err.frames.iter().map(|f| f.message.as_str()).collect();
    assert_eq!(frames[0], "while checking statement `g(...)`");
    assert_eq!(frames.last().copied(), Some("while checking definition `main::main`"));
}

#[test]
fn two_overloads_differing_only_in_return_type_are_ambiguous_without_context() {
    let items = || {
        vec![
            function("f")
                .param("a", ty("Int"))
                .returns(ty("Int"))
                .body(vec![ret(ident("a"))])
                .build(),
            function("f")
                .param("a", ty("Int"))
                .returns(ty("Str"))
                .body(vec![ret(string("a"))])
                .build(),
        ]
    };

    let mut ambiguous = items();
    ambiguous.push(function("main").body(vec![expr(call("f", vec![int(1)]))]).build());
    let failure = check_err(program(vec![module("main", ambiguous)]));
    assert_eq!(failure.kinds(), vec![ErrorKind::AmbiguousOverload]);
    assert!(failure.errors[0].message.contains("fn(Int) -> Str"));
    assert!(failure.errors[0].message.contains("fn(Int) -> Int"));

    let mut annotated = items();
    annotated.push(
        function("main")
            .body(vec![let_typed("s", ty("Str"), call("f", vec![int(1)]))])
            .build(),
    );
    check_ok(program(vec![module("main", annotated)]));
}

#[test]
fn identical_non_generic_overloads_are_duplicates() {
    let program = program(vec![module(
        "main",
        vec![
            function("f")
                .param("a", ty("Int"))
                .returns(ty("Int"))
                .body(vec![ret(ident("a"))])
                .build(),
            function("f")
                .param("b", ty("Int"))
                .returns(ty("Int"))
                .body(vec![ret(int(2))])
                .build(),
        ],
    )]);
    let failure = check_err(program);
    assert_eq!(failure.kinds(), vec![ErrorKind::DuplicateDefinition]);
}

#[test]
fn narrower_integer_parameter_needs_a_coercion() {
    let items = || {
        vec![
            function("narrow")
                .param("x", ty("Int32"))
                .returns(ty("Int32"))
                .body(vec![ret(ident("x"))])
                .build(),
            function("main")
                .body(vec![expr(call("narrow", vec![int(7)]))])
                .build(),
        ]
    };
    check_ok(program(vec![module("main", items())]));

    let strict = SemaConfig {
        allow_coercions: false,
        ..SemaConfig::default()
    };
    let failure = check_err_with(program(vec![module("main", items())]), &strict);
    assert_eq!(failure.kinds(), vec![ErrorKind::UnificationMismatch]);
}

#[test]
fn equally_general_coercing_fits_are_ambiguous() {
    let program = program(vec![module(
        "main",
        vec![
            function("f")
                .param("x", ty("Int32"))
                .body(vec![])
                .build(),
            function("f")
                .param("x", ty("Int16"))
                .body(vec![])
                .build(),
            function("main")
                .body(vec![expr(call("f", vec![int(7)]))])
                .build(),
        ],
    )]);
    let failure = check_err(program);
    assert_eq!(failure.kinds(), vec![ErrorKind::AmbiguousOverload]);
}

#[test]
fn argument_of_the_wrong_type_lists_the_candidates() {
    let program = program(vec![module(
        "main",
        vec![function("main")
            .body(vec![expr(call("print", vec![int(1)]))])
            .build()],
    )]);
    let failure = check_err(program);
    assert_eq!(failure.kinds(), vec![ErrorKind::UnificationMismatch]);
    assert!(failure.errors[0].message.contains("fn(Str) -> Unit"));
}

#[test]
fn qualified_names_reach_other_modules() {
    let program = program(vec![
        module(
            "math",
            vec![function("square")
                .param("x", ty("Int"))
                .returns(ty("Int"))
                .body(vec![ret(binary(BinaryOp::Mul, ident("x"), ident("x")))])
                .build()],
        ),
        module(
            "main",
            vec![function("main")
                .body(vec![
                    let_("n", call("math::square", vec![int(3)])),
                    expr(call("print", vec![call("str", vec![ident("n")])])),
                ])
                .build()],
        ),
    ]);
    let (compilation, _) = check_ok(program);
    assert_eq!(compilation.module_values("math", "square").len(), 1);
    assert!(compilation.module_values("main", "square").is_empty());
}

#[test]
fn unqualified_names_from_another_module_are_unbound() {
    let program = program(vec![
        module(
            "math",
            vec![function("square")
                .param("x", ty("Int"))
                .returns(ty("Int"))
                .body(vec![ret(ident("x"))])
                .build()],
        ),
        module(
            "main",
            vec![function("main")
                .body(vec![expr(call("square", vec![int(3)]))])
                .build()],
        ),
    ]);
    assert_eq!(check_err(program).kinds(), vec![ErrorKind::UnboundSymbol]);
}

#[test]
fn function_names_resolve_as_values_through_the_expected_type() {
    let program = program(vec![module(
        "main",
        vec![
            function("inc")
                .param("x", ty("Int"))
                .returns(ty("Int"))
                .body(vec![ret(binary(BinaryOp::Add, ident("x"), int(1)))])
                .build(),
            function("inc")
                .param("x", ty("Float"))
                .returns(ty("Float"))
                .body(vec![ret(ident("x"))])
                .build(),
            function("main")
                .body(vec![
                    let_typed("f", ty_func(vec![ty("Int")], ty("Int")), ident("inc")),
                    let_typed("two", ty("Int"), call("f", vec![int(1)])),
                ])
                .build(),
        ],
    )]);
    check_ok(program);
}

fn mixed_width_overloads() -> Vec<quill_sema::ast::ModuleItem> {
    vec![
        function("f")
            .type_param("T")
            .param("x", ty("T"))
            .param("y", ty("Int32"))
            .body(vec![])
            .build(),
        function("f")
            .param("x", ty("Int"))
            .param("y", ty("Int16"))
            .body(vec![])
            .build(),
        function("main")
            .body(vec![
                expr(call("f", vec![int(1), int(2)])),
                expr(call("f", vec![int(3), int(4)])),
            ])
            .build(),
    ]
}

#[test]
fn most_general_coercing_fit_wins() {
    let (_, backend) = check_ok(program(vec![module("main", mixed_width_overloads())]));
    let mut emitted = backend.functions_named("main::f");
    emitted.sort();
    // The non-generic one is only checked as a definition of its own.
    assert_eq!(emitted, vec!["fn(Int, Int16) -> Unit", "fn(Int, Int32) -> Unit"]);
}

#[test]
fn resolution_is_deterministic_across_runs() {
    let (_, first) = check_ok(program(vec![module("main", mixed_width_overloads())]));
    let (_, second) = check_ok(program(vec![module("main", mixed_width_overloads())]));
    assert_eq!(first.events, second.events);
    assert_eq!(first.to_json(), second.to_json());
}

#[test]
fn alias_spellings_of_one_signature_are_duplicates() {
    let program = program(vec![module(
        "main",
        vec![
            function("f")
                .param("a", ty("Int"))
                .body(vec![])
                .build(),
            function("f")
                .param("a", ty("Int64"))
                .body(vec![])
                .build(),
        ],
    )]);
    let failure = check_err(program);
    assert_eq!(failure.kinds(), vec![ErrorKind::DuplicateDefinition]);
    assert!(failure.errors[0].message.contains("`main::f` with signature `fn(Int64) -> Unit`"));
}

#[test]
fn builtin_arity_table_rejects_wrong_argument_counts() {
    let program = program(vec![module(
        "main",
        vec![function("main")
            .body(vec![expr(call("print", vec![string("a"), string("b")]))])
            .build()],
    )]);
    let failure = check_err(program);
    assert_eq!(failure.kinds(), vec![ErrorKind::UnificationMismatch]);
    assert!(failure.errors[0]
        .message
        .contains("builtin `print` takes 1 argument(s)"));

    let mut prelude = module(
        "prelude",
        vec![function("print")
            .param("label", ty("Str"))
            .param("text", ty("Str"))
            .body(vec![
                expr(call("print", vec![ident("label")])),
                expr(call("print", vec![ident("text")])),
            ])
            .build()],
    );
    prelude.global = true;
    let extended = quill_sema::ast::build::program(vec![
        prelude,
        module(
            "main",
            vec![function("main")
                .body(vec![expr(call("print", vec![string("a"), string("b")]))])
                .build()],
        ),
    ]);
    let (_, backend) = check_ok(extended);
    assert_eq!(backend.functions_named("print"), vec!["fn(Str) -> Unit", "fn(Str, Str) -> Unit"]);
}
