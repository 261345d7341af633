use std::fs::{self, File};
use std::io::{BufWriter, Write};

use anyhow::Result;

use diagnostics::{shared, ConsoleSink, Diagnostic, ErrorSink};

use crate::args::CompileArgs;

pub fn execute(args: &CompileArgs) -> Result<i32> {
    let sink = shared(ConsoleSink);

    let source = match fs::read_to_string(&args.path) {
        Ok(source) => source,
        Err(err) => {
            sink.borrow_mut().report(&Diagnostic::io(format!(
                "{}: {}",
                args.path.display(),
                err
            )));
            return Ok(1);
        }
    };

    let unit = match compiler::Compiler::new(0).compile(&source) {
        Ok(unit) => unit,
        Err(err) => {
            sink.borrow_mut().report(&err.into_diagnostic(0));
            return Ok(1);
        }
    };
    for warning in &unit.warnings {
        sink.borrow_mut().report(warning);
    }

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| args.path.with_extension("orbc"));
    let file = match File::create(&output) {
        Ok(file) => file,
        Err(err) => {
            sink.borrow_mut()
                .report(&Diagnostic::io(format!("{}: {}", output.display(), err)));
            return Ok(1);
        }
    };
    let mut writer = BufWriter::new(file);
    if let Err(err) = vm::loader::save_executable(&unit, &mut writer).and_then(|_| writer.flush()) {
        sink.borrow_mut()
            .report(&Diagnostic::io(format!("{}: {}", output.display(), err)));
        return Ok(1);
    }

    println!("wrote {}", output.display());
    Ok(0)
}
