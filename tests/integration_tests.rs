//! T 编译器核心集成测试
//!
//! 用构造器拼出语法树，经过语义分析与代码生成后检查诊断和汇编文本

use tlc::ast::*;
use tlc::error::{Diagnostic, Severity, TError};
use tlc::types::Type;
use tlc::Compiler;

/// 编译语法树，期望成功，返回汇编文本
fn compile_ok(unit: CompilationUnit) -> String {
    match Compiler::new().compile(unit) {
        Ok(compilation) => compilation.assembly,
        Err(err) => panic!("Expected compilation to succeed, got: {}", err),
    }
}

/// 编译语法树，期望因终止性错误而中止，返回全部诊断
fn compile_expect_abort(unit: CompilationUnit) -> Vec<Diagnostic> {
    match Compiler::new().compile(unit) {
        Ok(_) => panic!("Expected compilation to abort, but it succeeded"),
        Err(TError::Aborted { diagnostics }) => diagnostics,
        Err(other) => panic!("Expected an aborted compilation, got: {}", other),
    }
}

fn assert_has_error(diagnostics: &[Diagnostic], needle: &str) {
    assert!(
        diagnostics
            .iter()
            .any(|d| d.severity == Severity::Terminal && d.message.contains(needle)),
        "no terminal diagnostic containing '{}' in {:?}",
        needle,
        diagnostics
    );
}

fn program(classes: Vec<ClassDecl>, body: Vec<Stmt>) -> CompilationUnit {
    CompilationUnit::new(classes, MainBlock::new(1, body))
}

fn main_only(body: Vec<Stmt>) -> CompilationUnit {
    program(Vec::new(), body)
}

fn int_method(line: usize, name: &str, params: Vec<Param>, body: Vec<Stmt>) -> Member {
    MethodDecl::method(line, name, TypeName::Int, params, body)
}

fn returns(line: usize, value: Expr) -> Vec<Stmt> {
    vec![Stmt::ret(line, Some(value))]
}

fn assign_stmt(line: usize, name: &str, value: Expr) -> Stmt {
    Stmt::expr(Expr::assign(line, Expr::var(line, name), value))
}

/// class A { int f() {...} int g() {...} }  class B extends A { int f() {...} }
fn override_classes() -> Vec<ClassDecl> {
    vec![
        ClassDecl::new(
            1,
            "A",
            None,
            vec![
                int_method(2, "f", Vec::new(), returns(2, Expr::int(2, 1))),
                int_method(3, "g", Vec::new(), returns(3, Expr::int(3, 2))),
            ],
        ),
        ClassDecl::new(
            5,
            "B",
            Some("A"),
            vec![int_method(6, "f", Vec::new(), returns(6, Expr::int(6, 3)))],
        ),
    ]
}

fn count_converts(expr: &Expr) -> usize {
    let own = usize::from(matches!(expr.kind, ExprKind::Convert(_)));
    let children = match &expr.kind {
        ExprKind::Binary { left, right, .. } => count_converts(left) + count_converts(right),
        ExprKind::Assign { target, value } => count_converts(target) + count_converts(value),
        ExprKind::Unary { operand, .. } => count_converts(operand),
        ExprKind::Convert(inner) | ExprKind::Deref(inner) => count_converts(inner),
        _ => 0,
    };
    own + children
}

fn printed_expr(stmt: &Stmt) -> &Expr {
    match &stmt.kind {
        StmtKind::Print(expr) => expr,
        other => panic!("expected a print statement, got {:?}", other),
    }
}

// ==================== 类型检查 ====================

#[test]
fn test_int_arithmetic_is_typed_int() {
    // print -(1 + 2) * 3 < 4;
    let expr = Expr::binary(
        2,
        BinaryOp::Lt,
        Expr::binary(
            2,
            BinaryOp::Mul,
            Expr::unary(2, UnaryOp::Neg, Expr::binary(2, BinaryOp::Add, Expr::int(2, 1), Expr::int(2, 2))),
            Expr::int(2, 3),
        ),
        Expr::int(2, 4),
    );
    let unit = main_only(vec![Stmt::print(2, expr)]);
    let analysis = Compiler::new().analyze(unit.clone());
    assert!(analysis.context.diagnostics.is_empty());
    assert_eq!(printed_expr(&analysis.unit.main.body[0]).ty, Type::Int);

    let asm = compile_ok(unit);
    assert!(asm.contains("\tnegl\t%eax"), "got: {}", asm);
    assert!(asm.contains("\timull\t%edx, %eax"), "got: {}", asm);
    assert!(asm.contains("\tsetl\t%al"), "got: {}", asm);
}

#[test]
fn test_null_equals_null_is_int() {
    let analysis = Compiler::new().analyze(main_only(vec![Stmt::print(
        2,
        Expr::binary(2, BinaryOp::Eq, Expr::null(2), Expr::null(2)),
    )]));
    assert!(analysis.context.diagnostics.is_empty());
    assert_eq!(printed_expr(&analysis.unit.main.body[0]).ty, Type::Int);
}

#[test]
fn test_equality_converts_subclass_operand_once() {
    let unit = program(
        override_classes(),
        vec![
            Stmt::declare(10, TypeName::class("A"), &["a"]),
            Stmt::declare(11, TypeName::class("B"), &["b"]),
            assign_stmt(12, "a", Expr::new_object(12, "A", Vec::new())),
            assign_stmt(13, "b", Expr::new_object(13, "B", Vec::new())),
            Stmt::print(14, Expr::binary(14, BinaryOp::Eq, Expr::var(14, "b"), Expr::var(14, "a"))),
        ],
    );
    let analysis = Compiler::new().analyze(unit);
    assert!(!analysis.context.is_aborted(), "{:?}", analysis.context.diagnostics);

    let expr = printed_expr(&analysis.unit.main.body[4]);
    assert_eq!(expr.ty, Type::Int);
    assert_eq!(count_converts(expr), 1);
    let a = analysis.context.types.lookup_class("A").expect("A registered");
    match &expr.kind {
        ExprKind::Binary { left, right, .. } => {
            assert!(matches!(left.kind, ExprKind::Convert(_)));
            assert_eq!(left.ty, Type::Class(a));
            assert!(matches!(right.kind, ExprKind::Deref(_)));
        }
        other => panic!("expected a comparison, got {:?}", other),
    }
}

#[test]
fn test_equality_of_unrelated_classes_is_terminal() {
    let classes = vec![
        ClassDecl::new(1, "A", None, Vec::new()),
        ClassDecl::new(2, "B", Some("A"), Vec::new()),
        ClassDecl::new(3, "C", Some("A"), Vec::new()),
    ];
    let unit = program(
        classes,
        vec![
            Stmt::declare(5, TypeName::class("B"), &["b"]),
            Stmt::declare(6, TypeName::class("C"), &["c"]),
            Stmt::print(7, Expr::binary(7, BinaryOp::Eq, Expr::var(7, "b"), Expr::var(7, "c"))),
        ],
    );
    let diagnostics = compile_expect_abort(unit);
    assert_has_error(&diagnostics, "types are unrelated");
}

#[test]
fn test_int_compared_with_object_is_terminal() {
    let unit = program(
        vec![ClassDecl::new(1, "A", None, Vec::new())],
        vec![
            Stmt::declare(2, TypeName::class("A"), &["a"]),
            Stmt::print(3, Expr::binary(3, BinaryOp::Eq, Expr::int(3, 1), Expr::var(3, "a"))),
        ],
    );
    assert_has_error(&compile_expect_abort(unit), "cannot compare 'int' with 'A'");
}

#[test]
fn test_assignment_rules() {
    let classes = vec![
        ClassDecl::new(1, "A", None, Vec::new()),
        ClassDecl::new(2, "B", Some("A"), Vec::new()),
    ];

    // 子类赋给祖先：插入 Convert
    let analysis = Compiler::new().analyze(program(
        classes.clone(),
        vec![
            Stmt::declare(3, TypeName::class("A"), &["a"]),
            assign_stmt(4, "a", Expr::new_object(4, "B", Vec::new())),
        ],
    ));
    assert!(!analysis.context.is_aborted());
    match &analysis.unit.main.body[1].kind {
        StmtKind::Expr(Expr { kind: ExprKind::Assign { target, value }, .. }) => {
            assert!(matches!(target.kind, ExprKind::Variable { binding: Some(Binding::MainVar), .. }));
            assert!(matches!(value.kind, ExprKind::Convert(_)));
        }
        other => panic!("expected an assignment, got {:?}", other),
    }

    // 祖先赋给子类需要显式转换
    let diagnostics = compile_expect_abort(program(
        classes.clone(),
        vec![
            Stmt::declare(3, TypeName::class("A"), &["a"]),
            Stmt::declare(4, TypeName::class("B"), &["b"]),
            assign_stmt(5, "b", Expr::var(5, "a")),
        ],
    ));
    assert_has_error(&diagnostics, "an explicit cast is required");

    // int 与对象互不兼容
    let diagnostics = compile_expect_abort(program(
        classes,
        vec![
            Stmt::declare(3, TypeName::Int, &["x"]),
            assign_stmt(4, "x", Expr::null(4)),
        ],
    ));
    assert_has_error(&diagnostics, "cannot assign 'null' to 'int'");
}

// ==================== 类与 VMT ====================

#[test]
fn test_override_occupies_ancestor_slot() {
    let unit = program(override_classes(), Vec::new());
    let analysis = Compiler::new().analyze(unit.clone());
    assert!(!analysis.context.is_aborted());
    let types = &analysis.context.types;
    let a = types.lookup_class("A").expect("A");
    let b = types.lookup_class("B").expect("B");

    assert_eq!(types.vmt_slot(a, "f"), types.vmt_slot(b, "f"));
    // equals, f, g：覆盖不新增槽位
    assert_eq!(types.class(a).vmt.len(), 3);
    assert_eq!(types.class(b).vmt.len(), 3);

    let asm = compile_ok(unit);
    let b_vmt = "B$VMT:\n\t.long\tA$VMT\n\t.long\tB$Destructor\n\t.long\tObject$equals$Object\n\t.long\tB$f\n\t.long\tA$g\n";
    assert!(asm.contains(b_vmt), "got: {}", asm);
    assert!(asm.contains("Object$VMT:\n\t.long\t0\n\t.long\tObject$Destructor\n"), "got: {}", asm);
}

#[test]
fn test_default_constructor_and_destructor_are_synthesized() {
    let unit = program(vec![ClassDecl::new(1, "A", None, Vec::new())], Vec::new());
    let analysis = Compiler::new().analyze(unit.clone());
    let class = &analysis.unit.classes[0];
    let synthetic: Vec<&MethodDecl> = class
        .members
        .iter()
        .filter_map(|m| match m {
            Member::Method(method) if method.synthetic => Some(method),
            _ => None,
        })
        .collect();
    assert_eq!(synthetic.len(), 2);

    let asm = compile_ok(unit);
    assert!(asm.contains("A$A:\n"), "got: {}", asm);
    assert!(asm.contains("\tcall\tObject$Object\n"), "got: {}", asm);
    assert!(asm.contains("A$Destructor:\n"), "got: {}", asm);
    assert!(asm.contains("\tpushl\t8(%ebp)\n\tcall\tObject$Destructor\n"), "got: {}", asm);
}

#[test]
fn test_constructor_gets_implicit_super_call() {
    // class A { int x; }  class B extends A { B(int v) { x = v; } }
    let classes = vec![
        ClassDecl::new(1, "A", None, vec![FieldDecl::new(2, TypeName::Int, &["x"])]),
        ClassDecl::new(
            3,
            "B",
            Some("A"),
            vec![MethodDecl::constructor(
                4,
                "B",
                vec![Param::new(4, TypeName::Int, "v")],
                vec![assign_stmt(5, "x", Expr::var(5, "v"))],
            )],
        ),
    ];
    let unit = program(classes, vec![Stmt::expr(Expr::new_object(8, "B", vec![Expr::int(8, 5)]))]);
    let analysis = Compiler::new().analyze(unit.clone());
    assert!(!analysis.context.is_aborted(), "{:?}", analysis.context.diagnostics);

    let ctor = analysis.unit.classes[1]
        .members
        .iter()
        .find_map(|m| match m {
            Member::Method(method) if method.kind == tlc::types::MethodKind::Constructor => Some(method),
            _ => None,
        })
        .expect("constructor");
    assert!(matches!(
        ctor.body.first().map(|s| &s.kind),
        Some(StmtKind::ConstructorInvoke { target: CtorTarget::Super, resolved: Some(_), .. })
    ));

    let asm = compile_ok(unit);
    assert!(asm.contains("B$B$int:\n"), "got: {}", asm);
    assert!(asm.contains("\tcall\tA$A\n"), "got: {}", asm);
    assert!(asm.contains("\tleal\t12(%ebp), %eax"), "got: {}", asm);
    assert!(asm.contains("\tcall\tB$B$int\n"), "got: {}", asm);
    // 实例：VMT 指针加一个字段
    assert!(asm.contains("\tpushl\t$4\n\tpushl\t$2\n\tcall\tcalloc\n"), "got: {}", asm);
}

#[test]
fn test_constructor_invocation_must_come_first() {
    let classes = vec![ClassDecl::new(
        1,
        "A",
        None,
        vec![MethodDecl::constructor(
            2,
            "A",
            Vec::new(),
            vec![Stmt::empty(3), Stmt::super_call(4, Vec::new())],
        )],
    )];
    assert_has_error(
        &compile_expect_abort(program(classes, Vec::new())),
        "must be the first statement of a constructor",
    );
}

#[test]
fn test_fields_are_inherited_and_redeclaration_is_not_terminal() {
    let classes = vec![
        ClassDecl::new(1, "A", None, vec![FieldDecl::new(2, TypeName::Int, &["x"])]),
        ClassDecl::new(
            3,
            "C",
            Some("A"),
            vec![
                FieldDecl::new(4, TypeName::Int, &["y", "y"]),
                int_method(5, "get", Vec::new(), returns(5, Expr::var(5, "x"))),
            ],
        ),
    ];
    let compilation = Compiler::new()
        .compile(program(classes, Vec::new()))
        .expect("field redeclaration must not abort");
    assert_eq!(compilation.warnings.len(), 1);
    assert_eq!(compilation.warnings[0].severity, Severity::NonTerminal);
    assert!(compilation.warnings[0].message.contains("field 'y' is already declared"));

    let asm = compilation.assembly;
    assert!(asm.contains("C$get:\n"), "got: {}", asm);
    assert!(asm.contains("\tmovl\t8(%ebp), %eax\n\taddl\t$4, %eax\n"), "got: {}", asm);
    assert!(asm.contains("\tjmp\tC$get$exit\n"), "got: {}", asm);
}

#[test]
fn test_class_hierarchy_errors() {
    let unknown_parent = program(vec![ClassDecl::new(1, "A", Some("Missing"), Vec::new())], Vec::new());
    assert_has_error(&compile_expect_abort(unknown_parent), "extends undefined class 'Missing'");

    let cycle = program(
        vec![
            ClassDecl::new(1, "A", Some("B"), Vec::new()),
            ClassDecl::new(2, "B", Some("A"), Vec::new()),
        ],
        Vec::new(),
    );
    assert_has_error(&compile_expect_abort(cycle), "Circular inheritance");

    let duplicate = program(
        vec![ClassDecl::new(1, "A", None, Vec::new()), ClassDecl::new(2, "A", None, Vec::new())],
        Vec::new(),
    );
    assert_has_error(&compile_expect_abort(duplicate), "Class 'A' already defined");
}

#[test]
fn test_three_level_vmt_has_no_duplicate_slots() {
    // class A { f }  class B extends A { g, f }  class C extends B { h, g }
    let classes = vec![
        ClassDecl::new(1, "A", None, vec![int_method(2, "f", Vec::new(), returns(2, Expr::int(2, 1)))]),
        ClassDecl::new(
            3,
            "B",
            Some("A"),
            vec![
                int_method(4, "g", Vec::new(), returns(4, Expr::int(4, 2))),
                int_method(5, "f", Vec::new(), returns(5, Expr::int(5, 3))),
            ],
        ),
        ClassDecl::new(
            6,
            "C",
            Some("B"),
            vec![
                int_method(7, "h", Vec::new(), returns(7, Expr::int(7, 4))),
                int_method(8, "g", Vec::new(), returns(8, Expr::int(8, 5))),
            ],
        ),
    ];
    let unit = program(classes, Vec::new());
    let analysis = Compiler::new().analyze(unit.clone());
    assert!(!analysis.context.is_aborted(), "{:?}", analysis.context.diagnostics);
    let types = &analysis.context.types;
    let a = types.lookup_class("A").expect("A");
    let b = types.lookup_class("B").expect("B");
    let c = types.lookup_class("C").expect("C");

    // equals, f, g, h
    assert_eq!(types.class(c).vmt.len(), 4);
    assert_eq!(types.vmt_slot(c, "f"), types.vmt_slot(a, "f"));
    assert_eq!(types.vmt_slot(c, "g"), types.vmt_slot(b, "g"));

    let asm = compile_ok(unit);
    let c_vmt = "C$VMT:\n\t.long\tB$VMT\n\t.long\tC$Destructor\n\t.long\tObject$equals$Object\n\t.long\tB$f\n\t.long\tC$g\n\t.long\tC$h\n";
    assert!(asm.contains(c_vmt), "got: {}", asm);
}

#[test]
fn test_parameter_takes_priority_over_field() {
    // class A { int x; int m(int x) { return x; } }
    let classes = vec![ClassDecl::new(
        1,
        "A",
        None,
        vec![
            FieldDecl::new(2, TypeName::Int, &["x"]),
            int_method(3, "m", vec![Param::new(3, TypeName::Int, "x")], returns(3, Expr::var(3, "x"))),
        ],
    )];
    let asm = compile_ok(program(classes, Vec::new()));
    assert!(
        asm.contains("A$m$int:\n\tpushl\t%ebp\n\tmovl\t%esp, %ebp\n\tleal\t12(%ebp), %eax\n"),
        "got: {}",
        asm
    );
    assert!(!asm.contains("\taddl\t$4, %eax"), "field must not be read: {}", asm);
}

#[test]
fn test_redeclared_field_resolves_to_own_declaration() {
    // class A { int x; }  class B extends A { A x; A get() { return x; } }
    let classes = vec![
        ClassDecl::new(1, "A", None, vec![FieldDecl::new(2, TypeName::Int, &["x"])]),
        ClassDecl::new(
            3,
            "B",
            Some("A"),
            vec![
                FieldDecl::new(4, TypeName::class("A"), &["x"]),
                MethodDecl::method(5, "get", TypeName::class("A"), Vec::new(), returns(5, Expr::var(5, "x"))),
            ],
        ),
    ];
    let unit = program(classes, Vec::new());
    let analysis = Compiler::new().analyze(unit.clone());
    assert!(analysis.context.diagnostics.is_empty(), "{:?}", analysis.context.diagnostics);
    let types = &analysis.context.types;
    let a = types.lookup_class("A").expect("A");
    let b = types.lookup_class("B").expect("B");
    assert_eq!(types.lookup_field(b, "x"), Some(Type::Class(a)));

    // A.x 占据偏移 4，B.x 在其后
    let asm = compile_ok(unit);
    assert!(asm.contains("B$get:\n"), "got: {}", asm);
    assert!(asm.contains("\tmovl\t8(%ebp), %eax\n\taddl\t$8, %eax\n"), "got: {}", asm);
}

#[test]
fn test_duplicate_parameter_is_terminal() {
    let classes = vec![ClassDecl::new(
        1,
        "A",
        None,
        vec![int_method(
            2,
            "m",
            vec![Param::new(2, TypeName::Int, "a"), Param::new(2, TypeName::Int, "a")],
            returns(3, Expr::int(3, 0)),
        )],
    )];
    assert_has_error(
        &compile_expect_abort(program(classes, Vec::new())),
        "duplicate parameter declaration 'a' in method 'm'",
    );
}

#[test]
fn test_second_destructor_is_terminal() {
    let classes = vec![ClassDecl::new(
        1,
        "A",
        None,
        vec![MethodDecl::destructor(2, "A", Vec::new()), MethodDecl::destructor(3, "A", Vec::new())],
    )];
    let diagnostics = compile_expect_abort(program(classes, Vec::new()));
    assert_has_error(&diagnostics, "class 'A' declares more than one destructor");
    assert_eq!(diagnostics[0].line, 3);
}

// ==================== 语句 ====================

#[test]
fn test_break_and_continue_outside_loop_are_terminal() {
    assert_has_error(&compile_expect_abort(main_only(vec![Stmt::brk(2)])), "break statement out of scope");

    let in_method = program(
        vec![ClassDecl::new(
            1,
            "A",
            None,
            vec![int_method(2, "m", Vec::new(), vec![Stmt::cont(3), Stmt::ret(4, Some(Expr::int(4, 0)))])],
        )],
        Vec::new(),
    );
    assert_has_error(&compile_expect_abort(in_method), "continue statement out of scope");

    let break_in_method = program(
        vec![ClassDecl::new(
            1,
            "A",
            None,
            vec![int_method(2, "m", Vec::new(), vec![Stmt::brk(3), Stmt::ret(4, Some(Expr::int(4, 0)))])],
        )],
        Vec::new(),
    );
    assert_has_error(&compile_expect_abort(break_in_method), "break statement out of scope");
}

#[test]
fn test_nested_loops_use_distinct_label_pairs() {
    // while (1) { while (1) { break; } continue; }
    let inner = Stmt::while_loop(3, Expr::int(3, 1), Stmt::block(3, vec![Stmt::brk(4)]));
    let outer = Stmt::while_loop(2, Expr::int(2, 1), Stmt::block(2, vec![inner, Stmt::cont(6)]));
    let asm = compile_ok(main_only(vec![outer]));

    assert!(asm.contains("W0:\n"), "got: {}", asm);
    assert!(asm.contains("\tje\tW1\n"), "got: {}", asm);
    assert!(asm.contains("W2:\n"), "got: {}", asm);
    assert!(asm.contains("\tje\tW3\n\tjmp\tW3\n\tjmp\tW2\nW3:\n"), "got: {}", asm);
    // continue 回到外层条件
    assert!(asm.contains("W3:\n\tjmp\tW0\n\tjmp\tW0\nW1:\n"), "got: {}", asm);
}

#[test]
fn test_division_checks_for_zero() {
    let asm = compile_ok(main_only(vec![Stmt::print(
        2,
        Expr::binary(2, BinaryOp::Div, Expr::int(2, 10), Expr::int(2, 0)),
    )]));
    assert!(asm.contains("\tcmpl\t$0, %ecx\n\tje\tL0\n"), "got: {}", asm);
    assert!(asm.contains("\tpushl\t$2\n\tcall\tRTS_printDivideByZeroError\n"), "got: {}", asm);
    assert!(asm.contains("\tcltd\n\tidivl\t%ecx\n"), "got: {}", asm);
}

#[test]
fn test_if_else_and_print() {
    let stmt = Stmt::if_then(
        2,
        Expr::binary(2, BinaryOp::Gt, Expr::int(2, 2), Expr::int(2, 1)),
        Stmt::print(3, Expr::int(3, 1)),
        Some(Stmt::print(5, Expr::unary(5, UnaryOp::Not, Expr::int(5, 0)))),
    );
    let asm = compile_ok(main_only(vec![stmt]));
    assert!(asm.contains("\tsetg\t%al"), "got: {}", asm);
    assert!(asm.contains("\tje\tL0\n"), "got: {}", asm);
    assert!(asm.contains("\tjmp\tL1\nL0:\n"), "got: {}", asm);
    assert!(asm.contains("\tsete\t%al"), "got: {}", asm);
    assert!(asm.contains("\tcall\tRTS_outputInteger\n\taddl\t$4, %esp\n"), "got: {}", asm);
}

#[test]
fn test_main_variables_are_static_cells() {
    let asm = compile_ok(main_only(vec![
        Stmt::declare(2, TypeName::Int, &["x"]),
        assign_stmt(3, "x", Expr::int(3, 41)),
        Stmt::print(4, Expr::var(4, "x")),
        Stmt::ret(5, Some(Expr::int(5, 0))),
    ]));
    assert!(asm.contains("mainvar$x:\t.long 0\n"), "got: {}", asm);
    assert!(asm.contains("\tpushl\t$mainvar$x\n"), "got: {}", asm);
    assert!(asm.contains("\tmovl\t%eax, (%edx)\n"), "got: {}", asm);
    assert!(asm.contains("\tjmp\tmain$exit\n"), "got: {}", asm);
    assert!(asm.contains(".globl main\nmain:\n"), "got: {}", asm);
}

#[test]
fn test_method_locals_live_in_the_frame() {
    let body = vec![
        Stmt::declare(3, TypeName::Int, &["t"]),
        assign_stmt(4, "t", Expr::int(4, 3)),
        Stmt::ret(5, Some(Expr::var(5, "t"))),
    ];
    let classes = vec![ClassDecl::new(1, "A", None, vec![int_method(2, "m", Vec::new(), body)])];
    let asm = compile_ok(program(classes, Vec::new()));
    assert!(asm.contains("A$m:\n\tpushl\t%ebp\n\tmovl\t%esp, %ebp\n\tsubl\t$4, %esp\n"), "got: {}", asm);
    assert!(asm.contains("\tleal\t-4(%ebp), %eax"), "got: {}", asm);
}

#[test]
fn test_duplicate_variable_is_not_terminal() {
    let compilation = Compiler::new()
        .compile(main_only(vec![
            Stmt::declare(2, TypeName::Int, &["x"]),
            Stmt::declare(3, TypeName::Int, &["x"]),
        ]))
        .expect("duplicate variable must not abort");
    assert_eq!(compilation.warnings.len(), 1);
    assert!(compilation.warnings[0].message.contains("variable 'x' is already declared"));
    // 被拒绝的重复声明不再分配存储
    assert_eq!(compilation.assembly.matches("mainvar$x:").count(), 1, "got: {}", compilation.assembly);

    let analysis = Compiler::new().analyze(main_only(vec![Stmt::declare(2, TypeName::Int, &["y", "y", "z"])]));
    match &analysis.unit.main.body[0].kind {
        StmtKind::Declaration { names, .. } => assert_eq!(names, &vec!["y".to_string(), "z".to_string()]),
        other => panic!("expected a declaration, got {:?}", other),
    }
}

#[test]
fn test_delete_statement() {
    let unit = program(
        vec![ClassDecl::new(1, "A", None, Vec::new())],
        vec![
            Stmt::declare(2, TypeName::class("A"), &["a"]),
            assign_stmt(3, "a", Expr::new_object(3, "A", Vec::new())),
            Stmt::delete(4, Expr::var(4, "a")),
        ],
    );
    let asm = compile_ok(unit);
    assert!(asm.contains("\tcall\tRTS_checkForNullReference\n"), "got: {}", asm);
    assert!(
        asm.contains("\tmovl\t4(%eax), %eax\n\tcall\t*%eax\n\tcall\tfree\n\taddl\t$4, %esp\n"),
        "got: {}",
        asm
    );

    assert_has_error(
        &compile_expect_abort(main_only(vec![Stmt::delete(2, Expr::int(2, 1))])),
        "Can not delete int values",
    );
    assert_has_error(
        &compile_expect_abort(main_only(vec![Stmt::delete(2, Expr::null(2))])),
        "Can not delete null references",
    );
}

// ==================== 调用、实例化与转换 ====================

#[test]
fn test_virtual_call_goes_through_vmt_slot() {
    let classes = vec![ClassDecl::new(
        1,
        "A",
        None,
        vec![int_method(
            2,
            "f",
            vec![Param::new(2, TypeName::Int, "a")],
            returns(2, Expr::var(2, "a")),
        )],
    )];
    let unit = program(
        classes,
        vec![
            Stmt::declare(4, TypeName::class("A"), &["p"]),
            assign_stmt(5, "p", Expr::new_object(5, "A", Vec::new())),
            Stmt::print(6, Expr::call_on(6, Expr::var(6, "p"), "f", vec![Expr::int(6, 7)])),
        ],
    );
    let asm = compile_ok(unit);
    assert!(asm.contains("\tmovl\t$A$VMT, (%eax)\n"), "got: {}", asm);
    assert!(asm.contains("\tcall\tRTS_outOfMemoryError\n"), "got: {}", asm);
    // 槽位 1（equals 之后）位于 VMT 偏移 12
    assert!(
        asm.contains("\tmovl\t(%esp), %eax\n\tmovl\t(%eax), %eax\n\tmovl\t12(%eax), %eax\n\tcall\t*%eax\n\taddl\t$8, %esp\n"),
        "got: {}",
        asm
    );
}

#[test]
fn test_super_call_is_static() {
    let mut classes = override_classes();
    classes[1].members.push(int_method(7, "h", Vec::new(), returns(7, Expr::call_super(7, "g", Vec::new()))));
    let unit = program(classes, Vec::new());
    let analysis = Compiler::new().analyze(unit.clone());
    assert!(!analysis.context.is_aborted(), "{:?}", analysis.context.diagnostics);
    let asm = compile_ok(unit);
    assert!(asm.contains("\tmovl\t8(%ebp), %eax\n\tpushl\t%eax\n\tcall\tA$g\n"), "got: {}", asm);
}

#[test]
fn test_arguments_widen_to_parameter_types() {
    let classes = vec![
        ClassDecl::new(1, "A", None, Vec::new()),
        ClassDecl::new(2, "B", Some("A"), Vec::new()),
    ];
    let unit = program(
        classes,
        vec![
            Stmt::declare(3, TypeName::class("A"), &["a"]),
            Stmt::print(
                4,
                Expr::call_on(4, Expr::var(4, "a"), "equals", vec![Expr::new_object(4, "B", Vec::new())]),
            ),
        ],
    );
    let analysis = Compiler::new().analyze(unit.clone());
    assert!(!analysis.context.is_aborted(), "{:?}", analysis.context.diagnostics);
    match &printed_expr(&analysis.unit.main.body[1]).kind {
        ExprKind::Call { args, slot, resolved, .. } => {
            assert!(matches!(args[0].kind, ExprKind::Convert(_)));
            assert_eq!(*slot, Some(0));
            assert!(resolved.is_some());
        }
        other => panic!("expected a call, got {:?}", other),
    }
    let asm = compile_ok(unit);
    assert!(asm.contains("\tmovl\t8(%eax), %eax\n\tcall\t*%eax\n"), "got: {}", asm);
}

#[test]
fn test_unknown_method_is_terminal() {
    let unit = program(
        vec![ClassDecl::new(1, "A", None, Vec::new())],
        vec![
            Stmt::declare(2, TypeName::class("A"), &["a"]),
            Stmt::print(3, Expr::call_on(3, Expr::var(3, "a"), "missing", vec![Expr::int(3, 1)])),
        ],
    );
    assert_has_error(&compile_expect_abort(unit), "method 'missing(int)' is not declared in class 'A'");
}

#[test]
fn test_cast_emits_runtime_check() {
    let classes = vec![
        ClassDecl::new(1, "A", None, Vec::new()),
        ClassDecl::new(2, "B", Some("A"), Vec::new()),
    ];
    let unit = program(
        classes,
        vec![
            Stmt::declare(3, TypeName::class("A"), &["a"]),
            Stmt::declare(4, TypeName::class("B"), &["b"]),
            assign_stmt(5, "b", Expr::cast(5, "B", Expr::var(5, "a"))),
        ],
    );
    let asm = compile_ok(unit);
    assert!(
        asm.contains("\tpushl\t$B$VMT\n\tpushl\t$5\n\tcall\tRTS_checkCast\n\taddl\t$8, %esp\n"),
        "got: {}",
        asm
    );

    let bad = main_only(vec![Stmt::print(2, Expr::cast(2, "Nope", Expr::null(2)))]);
    assert_has_error(&compile_expect_abort(bad), "cast to undeclared class 'Nope'");
}

#[test]
fn test_this_outside_method_is_terminal() {
    assert_has_error(
        &compile_expect_abort(main_only(vec![Stmt::expr(Expr::this(2))])),
        "'this' used outside of a method",
    );
}

// ==================== 诊断与拒绝生成 ====================

#[test]
fn test_undeclared_variable_is_not_terminal_but_blocks_codegen() {
    let unit = main_only(vec![Stmt::print(2, Expr::var(2, "y"))]);
    let analysis = Compiler::new().analyze(unit.clone());
    assert!(!analysis.context.is_aborted());
    assert_eq!(analysis.context.diagnostics.len(), 1);
    assert_eq!(printed_expr(&analysis.unit.main.body[0]).ty, Type::Error);

    match Compiler::new().compile(unit) {
        Err(TError::CodeGen(message)) => assert!(message.contains("ill-typed"), "got: {}", message),
        other => panic!("expected code generation to refuse, got {:?}", other.map(|c| c.assembly)),
    }
}

#[test]
fn test_aborted_compilation_reports_all_diagnostics() {
    let unit = main_only(vec![Stmt::brk(2), Stmt::cont(3), Stmt::print(4, Expr::var(4, "z"))]);
    let diagnostics = compile_expect_abort(unit);
    assert_eq!(diagnostics.len(), 3);
    assert_eq!(diagnostics[0].line, 2);
    assert_eq!(diagnostics[2].severity, Severity::NonTerminal);
    let err = Compiler::new()
        .compile(main_only(vec![Stmt::brk(2)]))
        .expect_err("break outside loop aborts");
    assert_eq!(err.to_string(), "Compilation aborted with 1 error(s)");
}
