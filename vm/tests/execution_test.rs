use std::cell::RefCell;
use std::rc::Rc;

use compiler::Compiler;
use diagnostics::{CollectSink, ErrorKind};
use memory::Value;
use vm::Vm;

fn run(source: &str) -> (bool, Value, Rc<RefCell<CollectSink>>, Vm) {
    let sink = Rc::new(RefCell::new(CollectSink::default()));
    let mut vm = Vm::new(sink.clone());
    let unit = Compiler::new(0).compile(source).expect("script compiles");
    let entry = vm.load_unit(unit).expect("unit loads");
    let ok = vm.run_main(entry);
    let result = vm.result();
    (ok, result, sink, vm)
}

#[test]
fn arithmetic_and_precedence() {
    let (ok, result, _, _) = run("return 1 + 2 * 3 - 4");
    assert!(ok);
    assert_eq!(result.as_int(), Some(3));
}

#[test]
fn mixed_int_float_widens() {
    let (ok, result, _, _) = run("return 1 + 2.5");
    assert!(ok);
    assert_eq!(result.as_float(), Some(3.5));
}

#[test]
fn script_without_return_yields_null() {
    let (ok, result, _, _) = run("var x = 1");
    assert!(ok);
    assert!(result.is_nil());
}

#[test]
fn globals_define_read_and_assign() {
    let (ok, result, _, _) = run("var x = 10\nx = x + 5\nreturn x");
    assert!(ok);
    assert_eq!(result.as_int(), Some(15));
}

#[test]
fn while_loop_with_branches() {
    let src = "
        var n = 0
        var sum = 0
        while n < 10 {
            if n % 2 == 0 {
                sum = sum + n
            }
            n = n + 1
        }
        return sum
    ";
    let (ok, result, _, _) = run(src);
    assert!(ok);
    assert_eq!(result.as_int(), Some(20));
}

#[test]
fn function_calls_and_recursion() {
    let src = "
        func fib(n) {
            if n < 2 { return n }
            return fib(n - 1) + fib(n - 2)
        }
        return fib(15)
    ";
    let (ok, result, _, _) = run(src);
    assert!(ok);
    assert_eq!(result.as_int(), Some(610));
}

#[test]
fn local_assignment_reads_its_own_old_value() {
    let src = "
        func f() {
            var a = 1
            var b = 10
            a = b - a
            return a
        }
        return f()
    ";
    let (ok, result, _, _) = run(src);
    assert!(ok);
    assert_eq!(result.as_int(), Some(9));
}

#[test]
fn local_initializer_resolves_the_enclosing_global() {
    let src = "
        var a = 5
        func f() {
            var a = a + 1
            return a
        }
        return f()
    ";
    let (ok, result, _, _) = run(src);
    assert!(ok);
    assert_eq!(result.as_int(), Some(6));
}

#[test]
fn local_initializer_without_a_global_fails_instead_of_reading_garbage() {
    let src = "
        func f() {
            var x = x
            return x
        }
        return f()
    ";
    let (ok, _, sink, _) = run(src);
    assert!(!ok);
    let sink = sink.borrow();
    assert_eq!(sink.count_of(ErrorKind::Runtime), 1);
    assert!(sink.diags[0].message.contains("undefined global"));
}

#[test]
fn string_concat_and_equality() {
    let (ok, result, _, _) = run("return \"foo\" + \"bar\" == \"foobar\"");
    assert!(ok);
    assert_eq!(result.as_bool(), Some(true));
}

#[test]
fn logical_operators_short_circuit() {
    // The right side would raise if evaluated.
    let (ok, result, _, _) = run("return false && missing()");
    assert!(ok);
    assert_eq!(result.as_bool(), Some(false));

    let (ok, result, _, _) = run("return true || missing()");
    assert!(ok);
    assert_eq!(result.as_bool(), Some(true));
}

#[test]
fn division_by_zero_aborts_with_one_runtime_diagnostic() {
    let (ok, result, sink, _) = run("return 1 / 0");
    assert!(!ok);
    assert!(result.is_nil());
    let sink = sink.borrow();
    assert_eq!(sink.diags.len(), 1);
    assert_eq!(sink.diags[0].kind, ErrorKind::Runtime);
    // Runtime diagnostics never carry a source position.
    assert!(sink.diags[0].desc.is_none());
}

#[test]
fn undefined_global_is_a_runtime_error() {
    let (ok, _, sink, _) = run("return missing");
    assert!(!ok);
    assert_eq!(sink.borrow().count_of(ErrorKind::Runtime), 1);
}

#[test]
fn wrong_arity_call_is_rejected_before_the_body_runs() {
    let src = "
        func f(a, b) { return a + b }
        return f(1)
    ";
    let (ok, _, sink, _) = run(src);
    assert!(!ok);
    let sink = sink.borrow();
    assert_eq!(sink.diags.len(), 1);
    assert!(sink.diags[0].message.contains("expected 2 arguments"));
}

#[test]
fn elapsed_is_recorded_even_on_failure() {
    let (_, _, _, vm) = run("return 1 / 0");
    assert!(vm.elapsed_ms() >= 0.0);
}

#[test]
fn stress_gc_does_not_change_the_result() {
    let src = "
        var s = \"a\"
        var n = 0
        while n < 50 {
            s = s + \"b\"
            n = n + 1
        }
        func len51() { return 51 }
        return len51()
    ";
    let sink = Rc::new(RefCell::new(CollectSink::default()));
    let mut vm = Vm::new(sink);
    vm.stress_gc = true;
    let unit = Compiler::new(0).compile(src).unwrap();
    let entry = vm.load_unit(unit).unwrap();
    assert!(vm.run_main(entry));
    assert_eq!(vm.result().as_int(), Some(51));
}

#[test]
fn unit_with_an_out_of_range_main_is_rejected() {
    let mut unit = Compiler::new(0).compile("return 1").unwrap();
    unit.main = 9;
    let sink = Rc::new(RefCell::new(CollectSink::default()));
    let mut vm = Vm::new(sink);
    assert!(vm.load_unit(unit).is_err());
}

#[test]
fn executable_roundtrip_runs_identically() {
    let src = "func sq(x) { return x * x }\nreturn sq(12)";
    let unit = Compiler::new(0).compile(src).unwrap();

    let mut bytes = Vec::new();
    vm::loader::save_executable(&unit, &mut bytes).unwrap();

    let sink = Rc::new(RefCell::new(CollectSink::default()));
    let mut vm = Vm::new(sink);
    let entry = vm.load_executable(&mut bytes.as_slice()).unwrap();
    assert!(vm.run_main(entry));
    assert_eq!(vm.result().as_int(), Some(144));
}
