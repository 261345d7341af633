//! Command handlers exercised directly against files on disk, checking
//! the exit codes the process would report.

use std::fs;
use std::io::Write;

use cli::args::{CompileArgs, DisassembleArgs, RunArgs};
use cli::commands::{compile, disassemble, run};

fn script(dir: &tempfile::TempDir, name: &str, source: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = fs::File::create(&path).unwrap();
    file.write_all(source.as_bytes()).unwrap();
    path
}

#[test]
fn run_reports_success() {
    let dir = tempfile::tempdir().unwrap();
    let path = script(&dir, "answer.orb", "return 6 * 7");
    let code = run::execute(&RunArgs {
        path,
        stress_gc: false,
        json: false,
    })
    .unwrap();
    assert_eq!(code, 0);
}

#[test]
fn run_fails_on_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let code = run::execute(&RunArgs {
        path: dir.path().join("absent.orb"),
        stress_gc: false,
        json: false,
    })
    .unwrap();
    assert_eq!(code, 1);
}

#[test]
fn run_fails_on_syntax_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = script(&dir, "broken.orb", "func f( {");
    let code = run::execute(&RunArgs {
        path,
        stress_gc: false,
        json: true,
    })
    .unwrap();
    assert_eq!(code, 1);
}

#[test]
fn compile_then_run_executable() {
    let dir = tempfile::tempdir().unwrap();
    let source = script(
        &dir,
        "square.orb",
        "func sq(n) { return n * n }\nreturn sq(12)",
    );
    let output = dir.path().join("square.orbc");

    let code = compile::execute(&CompileArgs {
        path: source,
        output: Some(output.clone()),
    })
    .unwrap();
    assert_eq!(code, 0);
    assert!(output.exists());

    let code = run::execute(&RunArgs {
        path: output,
        stress_gc: false,
        json: false,
    })
    .unwrap();
    assert_eq!(code, 0);
}

#[test]
fn compile_defaults_the_output_extension() {
    let dir = tempfile::tempdir().unwrap();
    let source = script(&dir, "plain.orb", "return 1 + 2");
    let code = compile::execute(&CompileArgs {
        path: source.clone(),
        output: None,
    })
    .unwrap();
    assert_eq!(code, 0);
    assert!(source.with_extension("orbc").exists());
}

#[test]
fn run_rejects_a_truncated_executable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.orbc");
    fs::write(&path, b"ORB\x01\x02").unwrap();
    let code = run::execute(&RunArgs {
        path,
        stress_gc: false,
        json: false,
    })
    .unwrap();
    assert_eq!(code, 1);
}

#[test]
fn disassemble_prints_a_script() {
    let dir = tempfile::tempdir().unwrap();
    let path = script(&dir, "loop.orb", "var i = 0 while (i < 3) { i = i + 1 } return i");
    let code = disassemble::execute(&DisassembleArgs { path }).unwrap();
    assert_eq!(code, 0);
}

#[test]
fn disassemble_reads_an_executable() {
    let dir = tempfile::tempdir().unwrap();
    let source = script(&dir, "calc.orb", "return 2 + 3 * 4");
    let output = dir.path().join("calc.orbc");
    assert_eq!(
        compile::execute(&CompileArgs {
            path: source,
            output: Some(output.clone()),
        })
        .unwrap(),
        0
    );
    assert_eq!(
        disassemble::execute(&DisassembleArgs { path: output }).unwrap(),
        0
    );
}
