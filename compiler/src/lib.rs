//! Source-to-bytecode compiler for Orbit.
//!
//! A [`Compiler`] is single-use: `compile` consumes it, so the one-shot
//! contract of the compiler-to-machine handoff is a compile-time
//! property rather than a runtime check.

mod codegen;
pub mod error;
mod interner;

pub use error::{CompileError, CompileErrorKind};

use vm::CompiledUnit;

pub struct Compiler {
    file_id: u32,
}

impl Compiler {
    pub fn new(file_id: u32) -> Self {
        Compiler { file_id }
    }

    pub fn file_id(&self) -> u32 {
        self.file_id
    }

    /// Compile a source file into a loadable unit. Fails with exactly one
    /// error; warnings accumulate on the unit.
    pub fn compile(self, source: &str) -> Result<CompiledUnit, CompileError> {
        let program = orbit_parser::parse_program(source)?;
        codegen::CodeGen::new(self.file_id).compile_program(&program)
    }
}
