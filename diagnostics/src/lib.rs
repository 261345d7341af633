//! Shared diagnostic infrastructure for Orbit.
//!
//! Every compile-time, runtime, or host-level error event is funneled
//! through a single [`Diagnostic`] value and delivered exactly once to an
//! [`ErrorSink`] supplied by the embedding host.

use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;

mod sink;

pub use sink::{CollectSink, ConsoleSink, ErrorSink, JsonSink};

/// Error category, ordered roughly by when in the pipeline it can occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ErrorKind {
    /// No error. Never reported; exists so callbacks can pattern-match a
    /// complete taxonomy.
    None,
    /// Malformed source detected by the lexer or parser.
    Syntax,
    /// Well-formed source rejected by the compiler.
    Semantic,
    /// Error raised while the VM executes. Carries no source position.
    Runtime,
    /// Non-fatal notice; execution continues and the exit status is
    /// unaffected.
    Warning,
    /// Host-level resource failure (unreadable file, bad binary).
    Io,
}

impl ErrorKind {
    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::None => "NONE",
            ErrorKind::Syntax => "SYNTAX",
            ErrorKind::Semantic => "SEMANTIC",
            ErrorKind::Runtime => "RUNTIME",
            ErrorKind::Warning => "WARNING",
            ErrorKind::Io => "I/O",
        }
    }

    /// Whether a diagnostic of this kind must terminate the host with a
    /// non-zero status.
    pub fn is_fatal(self) -> bool {
        !matches!(self, ErrorKind::None | ErrorKind::Warning)
    }
}

/// Source position of a compile-time diagnostic.
///
/// Runtime errors have no reliable position; they carry no descriptor at
/// all rather than a descriptor full of meaningless zeros.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ErrorDesc {
    pub file_id: u32,
    pub line: u32,
    pub col: u32,
}

/// One error event, produced exactly once per occurrence.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    pub message: String,
    pub desc: Option<ErrorDesc>,
}

impl Diagnostic {
    pub fn syntax(message: impl Into<String>, file_id: u32, line: u32, col: u32) -> Self {
        Self {
            kind: ErrorKind::Syntax,
            message: message.into(),
            desc: Some(ErrorDesc { file_id, line, col }),
        }
    }

    pub fn semantic(message: impl Into<String>, file_id: u32, line: u32, col: u32) -> Self {
        Self {
            kind: ErrorKind::Semantic,
            message: message.into(),
            desc: Some(ErrorDesc { file_id, line, col }),
        }
    }

    pub fn warning(message: impl Into<String>, file_id: u32, line: u32, col: u32) -> Self {
        Self {
            kind: ErrorKind::Warning,
            message: message.into(),
            desc: Some(ErrorDesc { file_id, line, col }),
        }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Runtime,
            message: message.into(),
            desc: None,
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Io,
            message: message.into(),
            desc: None,
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.desc {
            Some(desc) => write!(
                f,
                "{} ERROR on {} ({},{}): {}",
                self.kind.label(),
                desc.file_id,
                desc.line,
                desc.col,
                self.message
            ),
            None => write!(f, "{} ERROR: {}", self.kind.label(), self.message),
        }
    }
}

/// Shared, mutable error callback handed to both the compiler driver and
/// the VM. Execution is single-threaded, so `Rc<RefCell<..>>` is enough.
pub type SharedSink = Rc<RefCell<dyn ErrorSink>>;

pub fn shared<S: ErrorSink + 'static>(sink: S) -> SharedSink {
    Rc::new(RefCell::new(sink))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_time_diagnostic_renders_position() {
        let d = Diagnostic::syntax("unexpected `}`", 0, 3, 7);
        assert_eq!(format!("{}", d), "SYNTAX ERROR on 0 (3,7): unexpected `}`");
    }

    #[test]
    fn runtime_diagnostic_has_no_position() {
        let d = Diagnostic::runtime("division by zero");
        assert!(d.desc.is_none());
        assert_eq!(format!("{}", d), "RUNTIME ERROR: division by zero");
    }

    #[test]
    fn warnings_are_not_fatal() {
        assert!(!ErrorKind::Warning.is_fatal());
        assert!(!ErrorKind::None.is_fatal());
        assert!(ErrorKind::Syntax.is_fatal());
        assert!(ErrorKind::Runtime.is_fatal());
        assert!(ErrorKind::Io.is_fatal());
    }
}
