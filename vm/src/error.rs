use std::fmt;

use diagnostics::Diagnostic;

/// Error raised while the machine executes. Aborts the current run; the
/// driver receives it exactly once through the error sink. Runtime errors
/// carry no source position.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeError {
    pub message: String,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>) -> Self {
        RuntimeError {
            message: message.into(),
        }
    }

    pub fn into_diagnostic(self) -> Diagnostic {
        Diagnostic::runtime(self.message)
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RuntimeError {}

impl From<String> for RuntimeError {
    fn from(message: String) -> Self {
        RuntimeError { message }
    }
}

impl From<&str> for RuntimeError {
    fn from(message: &str) -> Self {
        RuntimeError {
            message: message.to_string(),
        }
    }
}
