use orbit_parser::ast::{BinaryOp, Expr, Stmt};
use orbit_parser::parse_program;

#[test]
fn parses_var_with_and_without_initializer() {
    let program = parse_program("var a = 1\nvar b").unwrap();
    assert_eq!(program.stmts.len(), 2);
    match &program.stmts[0] {
        Stmt::Var { name, init, .. } => {
            assert_eq!(name, "a");
            assert!(init.is_some());
        }
        other => panic!("expected var, got {:?}", other),
    }
    match &program.stmts[1] {
        Stmt::Var { init, .. } => assert!(init.is_none()),
        other => panic!("expected var, got {:?}", other),
    }
}

#[test]
fn respects_arithmetic_precedence() {
    let program = parse_program("1 + 2 * 3").unwrap();
    match &program.stmts[0] {
        Stmt::Expr {
            expr: Expr::Binary { op, rhs, .. },
            ..
        } => {
            assert_eq!(*op, BinaryOp::Add);
            assert!(matches!(
                **rhs,
                Expr::Binary {
                    op: BinaryOp::Mul,
                    ..
                }
            ));
        }
        other => panic!("expected binary expr, got {:?}", other),
    }
}

#[test]
fn parses_method_call_as_member_then_call() {
    let program = parse_program("math.pow(2, 10)").unwrap();
    match &program.stmts[0] {
        Stmt::Expr {
            expr: Expr::Call { callee, args, .. },
            ..
        } => {
            assert_eq!(args.len(), 2);
            assert!(matches!(**callee, Expr::Member { .. }));
        }
        other => panic!("expected call, got {:?}", other),
    }
}

#[test]
fn parses_member_assignment() {
    let program = parse_program("obj.field = 5").unwrap();
    assert!(matches!(
        program.stmts[0],
        Stmt::AssignMember { ref member, .. } if member == "field"
    ));
}

#[test]
fn parses_if_else_chain_and_while() {
    let src = "
        var n = 0
        while n < 10 {
            if n == 3 {
                n = n + 2
            } else if n == 7 {
                n = n + 3
            } else {
                n = n + 1
            }
        }
        return n
    ";
    let program = parse_program(src).unwrap();
    assert_eq!(program.stmts.len(), 3);
    assert!(matches!(program.stmts[1], Stmt::While { .. }));
    assert!(matches!(program.stmts[2], Stmt::Return { .. }));
}

#[test]
fn parses_function_declaration_with_params() {
    let program = parse_program("func add(a, b) { return a + b }").unwrap();
    match &program.stmts[0] {
        Stmt::Func { name, params, body, .. } => {
            assert_eq!(name, "add");
            assert_eq!(params, &["a".to_string(), "b".to_string()]);
            assert_eq!(body.len(), 1);
        }
        other => panic!("expected func, got {:?}", other),
    }
}

#[test]
fn top_level_return_is_legal() {
    let program = parse_program("return 42").unwrap();
    match &program.stmts[0] {
        Stmt::Return { value, .. } => assert!(value.is_some()),
        other => panic!("expected return, got {:?}", other),
    }
}

#[test]
fn rejects_class_declarations() {
    let err = parse_program("class Foo {}").unwrap_err();
    assert!(err.message.contains("class declarations"));
    assert_eq!(err.line, 1);
}

#[test]
fn rejects_invalid_assignment_target() {
    let err = parse_program("1 + 2 = 3").unwrap_err();
    assert!(err.message.contains("assignment target"));
}

#[test]
fn rejects_duplicate_parameters() {
    let err = parse_program("func f(a, a) { }").unwrap_err();
    assert!(err.message.contains("duplicate parameter"));
}

#[test]
fn error_positions_are_one_based() {
    let err = parse_program("var").unwrap_err();
    assert_eq!(err.line, 1);
    assert!(err.col >= 1);
}
