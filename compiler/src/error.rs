use std::fmt;

use diagnostics::Diagnostic;
use orbit_parser::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileErrorKind {
    /// Malformed source, straight from the lexer or parser.
    Syntax,
    /// Well-formed source the compiler rejects.
    Semantic,
}

/// The single fatal error a compilation produces. Exactly one reaches
/// the sink per failed compile; zero on success.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileError {
    pub kind: CompileErrorKind,
    pub message: String,
    pub line: u32,
    pub col: u32,
}

impl CompileError {
    pub fn syntax(message: impl Into<String>, line: u32, col: u32) -> Self {
        CompileError {
            kind: CompileErrorKind::Syntax,
            message: message.into(),
            line,
            col,
        }
    }

    pub fn semantic(message: impl Into<String>, line: u32, col: u32) -> Self {
        CompileError {
            kind: CompileErrorKind::Semantic,
            message: message.into(),
            line,
            col,
        }
    }

    pub fn into_diagnostic(self, file_id: u32) -> Diagnostic {
        match self.kind {
            CompileErrorKind::Syntax => {
                Diagnostic::syntax(self.message, file_id, self.line, self.col)
            }
            CompileErrorKind::Semantic => {
                Diagnostic::semantic(self.message, file_id, self.line, self.col)
            }
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}:{}", self.message, self.line, self.col)
    }
}

impl std::error::Error for CompileError {}

impl From<ParseError> for CompileError {
    fn from(err: ParseError) -> Self {
        CompileError::syntax(err.message, err.line, err.col)
    }
}
