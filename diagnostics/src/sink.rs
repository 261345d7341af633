use crate::Diagnostic;

/// Host-supplied error callback. Called synchronously, zero or more times,
/// at any point during compilation or execution.
pub trait ErrorSink {
    fn report(&mut self, diag: &Diagnostic);
}

/// Prints one line per diagnostic to stderr.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl ErrorSink for ConsoleSink {
    fn report(&mut self, diag: &Diagnostic) {
        eprintln!("{}", diag);
    }
}

/// Buffers diagnostics for inspection. Used by embedders and tests that
/// need to assert on the exact stream of error events.
#[derive(Debug, Default)]
pub struct CollectSink {
    pub diags: Vec<Diagnostic>,
}

impl ErrorSink for CollectSink {
    fn report(&mut self, diag: &Diagnostic) {
        self.diags.push(diag.clone());
    }
}

impl CollectSink {
    pub fn count_of(&self, kind: crate::ErrorKind) -> usize {
        self.diags.iter().filter(|d| d.kind == kind).count()
    }
}

/// Prints one JSON object per diagnostic to stderr, for tooling that
/// consumes the error stream machine-side.
#[derive(Debug, Default)]
pub struct JsonSink;

impl ErrorSink for JsonSink {
    fn report(&mut self, diag: &Diagnostic) {
        match serde_json::to_string(diag) {
            Ok(line) => eprintln!("{}", line),
            Err(_) => eprintln!("{}", diag),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn collect_sink_counts_by_kind() {
        let mut sink = CollectSink::default();
        sink.report(&Diagnostic::runtime("boom"));
        sink.report(&Diagnostic::warning("shadow", 0, 1, 1));
        sink.report(&Diagnostic::warning("again", 0, 2, 1));
        assert_eq!(sink.count_of(ErrorKind::Runtime), 1);
        assert_eq!(sink.count_of(ErrorKind::Warning), 2);
        assert_eq!(sink.count_of(ErrorKind::Syntax), 0);
    }

    #[test]
    fn diagnostics_serialize_to_json() {
        let diag = Diagnostic::syntax("bad token", 0, 2, 5);
        let json = serde_json::to_string(&diag).unwrap();
        assert!(json.contains("\"SYNTAX\""));
        assert!(json.contains("\"line\":2"));

        let runtime = serde_json::to_string(&Diagnostic::runtime("boom")).unwrap();
        assert!(runtime.contains("\"desc\":null"));
    }
}
