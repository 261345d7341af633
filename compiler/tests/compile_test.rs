use compiler::{Compiler, CompileErrorKind};
use diagnostics::ErrorKind;
use memory::FunctionKind;

#[test]
fn compiles_a_minimal_script() {
    let unit = Compiler::new(0).compile("return 1 + 2").unwrap();
    assert_eq!(unit.protos.len(), 1);
    assert_eq!(unit.main, 0);
    assert!(unit.warnings.is_empty());
    match &unit.protos[0].kind {
        FunctionKind::Bytecode { chunk, .. } => assert!(!chunk.is_empty()),
        other => panic!("expected bytecode, got {:?}", other),
    }
}

#[test]
fn function_declarations_become_separate_prototypes() {
    let unit = Compiler::new(0)
        .compile("func add(a, b) { return a + b }\nreturn add(1, 2)")
        .unwrap();
    assert_eq!(unit.protos.len(), 2);
    assert_eq!(unit.protos[0].name.as_deref(), Some("add"));
    // Main is always the last prototype.
    assert_eq!(unit.main, 1);
    match &unit.protos[0].kind {
        FunctionKind::Bytecode { arity, .. } => assert_eq!(*arity, 2),
        other => panic!("expected bytecode, got {:?}", other),
    }
}

#[test]
fn string_constants_index_the_interned_table() {
    let unit = Compiler::new(0)
        .compile("var s = \"hello\"\nreturn s")
        .unwrap();
    assert!(unit.strings.contains(&"hello".to_string()));
    assert!(unit.strings.contains(&"s".to_string()));
}

#[test]
fn syntax_error_from_unbalanced_brace() {
    let err = Compiler::new(0).compile("func f() { return 1").unwrap_err();
    assert_eq!(err.kind, CompileErrorKind::Syntax);
    assert!(err.line >= 1);
}

#[test]
fn nested_functions_are_a_semantic_error() {
    let err = Compiler::new(0)
        .compile("func outer() { func inner() { } }")
        .unwrap_err();
    assert_eq!(err.kind, CompileErrorKind::Semantic);
    assert!(err.message.contains("nested function"));
}

#[test]
fn duplicate_local_is_a_semantic_error() {
    let err = Compiler::new(0)
        .compile("func f() { var x = 1\nvar x = 2 }")
        .unwrap_err();
    assert_eq!(err.kind, CompileErrorKind::Semantic);
    assert!(err.message.contains("duplicate variable"));
}

#[test]
fn global_redefinition_warns_but_compiles() {
    let unit = Compiler::new(3)
        .compile("var x = 1\nvar x = 2\nreturn x")
        .unwrap();
    assert_eq!(unit.warnings.len(), 1);
    let warning = &unit.warnings[0];
    assert_eq!(warning.kind, ErrorKind::Warning);
    assert!(warning.message.contains("redefinition"));
    assert_eq!(warning.desc.map(|d| d.file_id), Some(3));
}

#[test]
fn compile_error_converts_to_positioned_diagnostic() {
    let err = Compiler::new(7).compile("var = 3").unwrap_err();
    let diag = err.into_diagnostic(7);
    assert_eq!(diag.kind, ErrorKind::Syntax);
    let desc = diag.desc.expect("compile diagnostics carry a position");
    assert_eq!(desc.file_id, 7);
    assert_eq!(desc.line, 1);
}
