//! End-to-end embedding runs through the [`Driver`] state machine, with
//! the `CMath` class registered, asserting on the exact diagnostic
//! stream each scenario produces.

use std::cell::RefCell;
use std::rc::Rc;

use cli::host::{Driver, DriverState};
use diagnostics::{CollectSink, ErrorKind, SharedSink};

fn collecting_sink() -> (Rc<RefCell<CollectSink>>, SharedSink) {
    let sink = Rc::new(RefCell::new(CollectSink::default()));
    let shared: SharedSink = sink.clone();
    (sink, shared)
}

fn driver_for(source: &str) -> (Driver, Rc<RefCell<CollectSink>>) {
    let (sink, shared) = collecting_sink();
    (Driver::new(0, source.to_string(), shared), sink)
}

#[test]
fn class_method_call_runs_to_done() {
    let (mut driver, sink) = driver_for("return CMath.pow(2, 10)");
    assert!(driver.compile());
    assert_eq!(driver.state(), DriverState::Compiled);
    assert!(driver.link());
    assert!(driver.run());
    assert_eq!(driver.state(), DriverState::Done);
    assert_eq!(driver.result_text().as_deref(), Some("1024"));
    assert!(sink.borrow().diags.is_empty());
    driver.teardown();
}

#[test]
fn computed_property_read() {
    let (mut driver, sink) = driver_for("return CMath.pi");
    assert!(driver.compile());
    assert!(driver.link());
    assert!(driver.run());
    assert_eq!(driver.result_text().as_deref(), Some("3.141593"));
    assert!(sink.borrow().diags.is_empty());
}

#[test]
fn computed_property_write_is_rejected() {
    let (mut driver, sink) = driver_for("CMath.pi = 4 return null");
    assert!(driver.compile());
    assert!(driver.link());
    assert!(!driver.run());
    assert_eq!(driver.state(), DriverState::Failed);
    let sink = sink.borrow();
    assert_eq!(sink.count_of(ErrorKind::Runtime), 1);
    assert!(sink.diags[0].message.contains("read-only"));
}

#[test]
fn syntax_error_reports_once_and_never_links() {
    let (mut driver, sink) = driver_for("func broken() { return 1");
    assert!(!driver.compile());
    assert_eq!(driver.state(), DriverState::Failed);
    assert!(driver.vm().is_none());
    assert!(!driver.link());
    assert!(!driver.run());
    let sink = sink.borrow();
    assert_eq!(sink.diags.len(), 1);
    assert_eq!(sink.count_of(ErrorKind::Syntax), 1);
}

#[test]
fn clean_run_reports_zero_diagnostics() {
    let (mut driver, sink) = driver_for(
        "var total = 0\n\
         var i = 0\n\
         while (i < 10) { total = total + i i = i + 1 }\n\
         return total",
    );
    assert!(driver.compile());
    assert!(driver.link());
    assert!(driver.run());
    assert_eq!(driver.result_text().as_deref(), Some("45"));
    assert!(sink.borrow().diags.is_empty());
}

#[test]
fn runtime_failure_reports_once_and_yields_null() {
    let (mut driver, sink) = driver_for("return CMath.log(true)");
    assert!(driver.compile());
    assert!(driver.link());
    assert!(!driver.run());
    assert_eq!(driver.state(), DriverState::Failed);
    assert_eq!(driver.result_text().as_deref(), Some("null"));
    let sink = sink.borrow();
    assert_eq!(sink.diags.len(), 1);
    assert_eq!(sink.count_of(ErrorKind::Runtime), 1);
}

#[test]
fn steps_refuse_to_run_out_of_order() {
    let (mut driver, _sink) = driver_for("return 1");
    assert!(!driver.link());
    assert!(!driver.run());
    assert!(driver.compile());
    assert!(!driver.compile());
    assert!(!driver.run());
    assert!(driver.link());
    assert!(!driver.link());
    assert!(driver.run());
    assert!(!driver.run());
}

#[test]
fn teardown_is_idempotent() {
    let (mut driver, _sink) = driver_for("return CMath.pow(3, 2)");
    assert!(driver.compile());
    assert!(driver.link());
    assert!(driver.run());
    driver.teardown();
    assert!(driver.vm().is_none());
    driver.teardown();
}

#[test]
fn stress_gc_does_not_change_the_result() {
    let source = "var s = \"a\"\n\
                  var i = 0\n\
                  while (i < 20) { s = s + \"b\" i = i + 1 }\n\
                  return s";
    let (mut plain, _s1) = driver_for(source);
    assert!(plain.compile());
    assert!(plain.link());
    assert!(plain.run());

    let (mut stressed, _s2) = driver_for(source);
    assert!(stressed.compile());
    stressed.stress_gc = true;
    assert!(stressed.link());
    assert!(stressed.run());

    assert_eq!(plain.result_text(), stressed.result_text());
}

#[test]
fn same_script_is_deterministic_across_drivers() {
    let source = "return CMath.pow(2, 8) + CMath.pi";
    let mut results = Vec::new();
    for _ in 0..3 {
        let (mut driver, sink) = driver_for(source);
        assert!(driver.compile());
        assert!(driver.link());
        assert!(driver.run());
        results.push(driver.result_text());
        assert!(sink.borrow().diags.is_empty());
    }
    assert_eq!(results[0], results[1]);
    assert_eq!(results[1], results[2]);
}

#[test]
fn warning_does_not_fail_the_run() {
    let (mut driver, sink) = driver_for("var x = 1 var x = 2 return x");
    assert!(driver.compile());
    assert!(driver.link());
    assert!(driver.run());
    assert_eq!(driver.result_text().as_deref(), Some("2"));
    let sink = sink.borrow();
    assert_eq!(sink.count_of(ErrorKind::Warning), 1);
    assert_eq!(sink.diags.len(), 1);
}
