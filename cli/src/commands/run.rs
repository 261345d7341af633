use std::fs;
use std::path::Path;

use anyhow::Result;

use diagnostics::{shared, ConsoleSink, Diagnostic, ErrorSink, JsonSink, SharedSink};

use crate::args::RunArgs;
use crate::host::Driver;

pub fn execute(args: &RunArgs) -> Result<i32> {
    let sink: SharedSink = if args.json {
        shared(JsonSink)
    } else {
        shared(ConsoleSink)
    };

    let mut driver = if is_executable(&args.path) {
        let bytes = match fs::read(&args.path) {
            Ok(bytes) => bytes,
            Err(err) => return Ok(report_io(&sink, &args.path, err.to_string())),
        };
        match vm::loader::load_executable(&mut bytes.as_slice()) {
            Ok(unit) => Driver::with_unit(0, unit, sink.clone()),
            Err(err) => return Ok(report_io(&sink, &args.path, err.to_string())),
        }
    } else {
        let source = match fs::read_to_string(&args.path) {
            Ok(source) => source,
            Err(err) => return Ok(report_io(&sink, &args.path, err.to_string())),
        };
        let mut driver = Driver::new(0, source, sink.clone());
        if !driver.compile() {
            return Ok(1);
        }
        driver
    };

    driver.stress_gc = args.stress_gc;
    if !driver.link() {
        return Ok(1);
    }
    if !driver.run() {
        driver.teardown();
        return Ok(1);
    }

    if let Some(text) = driver.result_text() {
        println!("{} (in {:.4} ms)", text, driver.elapsed_ms());
    }
    driver.teardown();
    Ok(0)
}

fn is_executable(path: &Path) -> bool {
    path.extension().map(|ext| ext == "orbc").unwrap_or(false)
}

fn report_io(sink: &SharedSink, path: &Path, message: String) -> i32 {
    sink.borrow_mut()
        .report(&Diagnostic::io(format!("{}: {}", path.display(), message)));
    1
}
