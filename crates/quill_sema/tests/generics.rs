use quill_sema::ast::build::*;
use quill_sema::ast::{BinaryOp, Program};
use quill_sema::{
    check_program, Builtins, CheckFailure, Compilation, ErrorKind, RecordingBackend, SemaConfig,
};

fn check_ok(program: Program) -> (Compilation, RecordingBackend) {
    let mut backend = RecordingBackend::new();
    match check_program(&program, &Builtins::standard(), &SemaConfig::default(), &mut backend) {
        Ok(compilation) => (compilation, backend),
        Err(failure) => panic!("unexpected errors:\n{}", failure.render_report("test.ql")),
    }
}

fn check_err_with(program: Program, config: &SemaConfig) -> CheckFailure {
    let mut backend = RecordingBackend::new();
    match check_program(&program, &Builtins::standard(), config, &mut backend) {
        Ok(_) => panic!("expected errors"),
        Err(failure) => failure,
    }
}

fn check_err(program: Program) -> CheckFailure {
    check_err_with(program, &SemaConfig::default())
}

fn identity() -> quill_sema::ast::ModuleItem {
    function("id")
        .type_param("T")
        .param("x", ty("T"))
        .returns(ty("T"))
        .body(vec![ret(ident("x"))])
        .build()
}

#[test]
fn recursive_generic_terminates_through_the_memo() {
    let program = program(vec![module(
        "main",
        vec![
            function("id")
                .type_param("T")
                .param("x", ty("T"))
                .returns(ty("T"))
                .body(vec![ret(call("id", vec![ident("x")]))])
                .build(),
            function("main")
                .body(vec![expr(call("id", vec![int(1)]))])
                .build(),
        ],
    )]);
    let (compilation, backend) = check_ok(program);
    let ids = compilation.checked_values("id");
    assert_eq!(ids.len(), 1);
    assert_eq!(ids[0].ty.signature(), "fn(Int) -> Int");
    assert_eq!(backend.functions_named("main::id"), vec!["fn(Int) -> Int"]);
}

#[test]
fn generic_is_instantiated_once_per_concrete_signature() {
    let program = program(vec![module(
        "main",
        vec![
            identity(),
            function("main")
                .body(vec![
                    expr(call("id", vec![int(1)])),
                    expr(call("id", vec![int(2)])),
                    let_("s", call("id", vec![string("a")])),
                    expr(call("id", vec![int(3)])),
                    expr(call("print", vec![call("id", vec![ident("s")])])),
                ])
                .build(),
        ],
    )]);
    let (compilation, backend) = check_ok(program);
    let mut emitted = backend.functions_named("main::id");
    emitted.sort();
    assert_eq!(emitted, vec!["fn(Int) -> Int", "fn(Str) -> Str"]);
    assert_eq!(compilation.module_values("main", "id").len(), 2);
}

#[test]
fn uncalled_generics_are_never_instantiated() {
    let program = program(vec![module("main", vec![identity()])]);
    let (compilation, backend) = check_ok(program);
    assert!(compilation.checked_values("id").is_empty());
    assert!(backend.functions_named("main::id").is_empty());
}

#[test]
fn unannotated_parameters_are_implicitly_generic() {
    let program = program(vec![module(
        "main",
        vec![
            function("show")
                .untyped("x")
                .returns(ty("Str"))
                .body(vec![ret(call("str", vec![ident("x")]))])
                .build(),
            function("main")
                .body(vec![
                    expr(call("print", vec![call("show", vec![int(1)])])),
                    expr(call("print", vec![call("show", vec![float(1.5)])])),
                ])
                .build(),
        ],
    )]);
    let (_, backend) = check_ok(program);
    let mut emitted = backend.functions_named("main::show");
    emitted.sort();
    assert_eq!(emitted, vec!["fn(Float) -> Str", "fn(Int) -> Str"]);
}

#[test]
fn generic_body_errors_surface_at_instantiation() {
    let program = program(vec![module(
        "main",
        vec![
            function("shout")
                .untyped("x")
                .body(vec![expr(call("print", vec![ident("x")]))])
                .build(),
            function("main")
                .body(vec![
                    expr(call("shout", vec![string("ok")])),
                    expr(call("shout", vec![int(1)])),
                ])
                .build(),
        ],
    )]);
    let failure = check_err(program);
    assert_eq!(failure.kinds(), vec![ErrorKind::UnificationMismatch]);
    let frames: Vec<&str> = failure.errors[0]
        .frames
        .iter()
        .map(|frame| frame.message.as_str())
        .collect();
    assert!(frames.contains(&"while instantiating `main::shout` as `fn(Int) -> Unit`"));
}

#[test]
fn unconstrained_return_type_is_an_unbound_type_variable() {
    let make = || {
        function("make")
            .type_param("T")
            .returns(ty("T"))
            .body(vec![])
            .build()
    };
    let failure = check_err(program(vec![module(
        "main",
        vec![make(), function("main").body(vec![expr(call("make", vec![]))]).build()],
    )]));
    assert_eq!(failure.kinds(), vec![ErrorKind::UnboundTypeVariable]);

    let (_, backend) = check_ok(program(vec![module(
        "main",
        vec![
            make(),
            function("main")
                .body(vec![let_typed("n", ty("Int"), call("make", vec![]))])
                .build(),
        ],
    )]));
    assert_eq!(backend.functions_named("main::make"), vec!["fn() -> Int"]);
}

#[test]
fn unbounded_polymorphic_recursion_hits_the_depth_limit() {
    let program = program(vec![module(
        "main",
        vec![
            function("grow")
                .type_param("T")
                .param("x", ty("T"))
                .body(vec![expr(call("grow", vec![tuple(vec![ident("x"), ident("x")])]))])
                .build(),
            function("main")
                .body(vec![expr(call("grow", vec![int(1)]))])
                .build(),
        ],
    )]);
    let config = SemaConfig {
        max_instantiation_depth: 6,
        ..SemaConfig::default()
    };
    let failure = check_err_with(program, &config);
    assert_eq!(failure.kinds(), vec![ErrorKind::RecursionDepthExceeded]);
}

#[test]
fn generic_structs_are_monomorphized_per_field_types() {
    let program = program(vec![module(
        "main",
        vec![
            structure("Box", &["T"], vec![("value", ty("T"))]),
            structure("Point", &[], vec![("x", ty("Int")), ("y", ty("Int"))]),
            function("main")
                .body(vec![
                    let_("b", call("Box", vec![int(1)])),
                    let_typed("n", ty("Int"), field(ident("b"), "value")),
                    let_("s", call("Box", vec![string("hi")])),
                    expr(call("print", vec![field(ident("s"), "value")])),
                    let_("p", call("Point", vec![int(1), int(2)])),
                    let_typed(
                        "sum",
                        ty("Int"),
                        binary(BinaryOp::Add, field(ident("p"), "x"), field(ident("p"), "y")),
                    ),
                ])
                .build(),
        ],
    )]);
    let (_, backend) = check_ok(program);
    let mut boxes = backend.functions_named("main::Box");
    boxes.sort();
    assert_eq!(boxes, vec!["fn(Int) -> Box<Int>", "fn(Str) -> Box<Str>"]);
    assert_eq!(backend.functions_named("main::Point"), vec!["fn(Int, Int) -> Point"]);
    let bound = backend.bound_types();
    assert!(bound.contains(&"Box<Int>".to_string()));
    assert!(bound.contains(&"Point".to_string()));
}

#[test]
fn missing_field_is_reported() {
    let program = program(vec![module(
        "main",
        vec![
            structure("Point", &[], vec![("x", ty("Int"))]),
            function("main")
                .body(vec![
                    let_("p", call("Point", vec![int(1)])),
                    expr(field(ident("p"), "z")),
                ])
                .build(),
        ],
    )]);
    let failure = check_err(program);
    assert_eq!(failure.kinds(), vec![ErrorKind::UnboundSymbol]);
    assert!(failure.errors[0].message.contains("no field `z`"));
}

#[test]
fn aliases_expand_during_unification() {
    let program = program(vec![module(
        "main",
        vec![
            alias("Pair", &["T"], ty_tuple(vec![ty("T"), ty("T")])),
            function("swap")
                .param("p", ty_apply("Pair", vec![ty("Int")]))
                .returns(ty_apply("Pair", vec![ty("Int")]))
                .body(vec![ret(tuple(vec![field(ident("p"), "1"), field(ident("p"), "0")]))])
                .build(),
            function("main")
                .body(vec![expr(call("swap", vec![tuple(vec![int(1), int(2)])]))])
                .build(),
        ],
    )]);
    check_ok(program);
}

#[test]
fn long_chains_of_ordinary_calls_do_not_count_toward_the_depth_limit() {
    let mut items: Vec<quill_sema::ast::ModuleItem> = (0..24)
        .map(|i| {
            function(&format!("f{i}"))
                .body(vec![expr(call(&format!("f{}", i + 1), vec![]))])
                .build()
        })
        .collect();
    items.push(function("f24").body(vec![]).build());
    let config = SemaConfig {
        max_instantiation_depth: 4,
        ..SemaConfig::default()
    };
    let mut backend = RecordingBackend::new();
    let result = check_program(
        &program(vec![module("main", items)]),
        &Builtins::standard(),
        &config,
        &mut backend,
    );
    if let Err(failure) = result {
        panic!("unexpected errors:\n{}", failure.render_report("test.ql"));
    }
    assert_eq!(backend.functions_named("main::f24"), vec!["fn() -> Unit"]);
    assert_eq!(backend.functions_named("main::f0"), vec!["fn() -> Unit"]);
}

#[test]
fn alias_spellings_reuse_one_instantiation() {
    let program = program(vec![module(
        "main",
        vec![
            identity(),
            function("main")
                .body(vec![
                    let_typed("y", ty("Int64"), int(1)),
                    expr(call("id", vec![int(1)])),
                    expr(call("id", vec![ident("y")])),
                ])
                .build(),
        ],
    )]);
    let (compilation, backend) = check_ok(program);
    assert_eq!(backend.functions_named("main::id"), vec!["fn(Int) -> Int"]);
    assert_eq!(compilation.module_values("main", "id").len(), 1);
}
