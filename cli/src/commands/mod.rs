pub mod compile;
pub mod disassemble;
pub mod run;

use anyhow::Result;

use crate::args::Command;

/// Route a parsed command to its handler; the returned code becomes the
/// process exit status.
pub fn dispatch(command: Command) -> Result<i32> {
    match command {
        Command::Run(args) => run::execute(&args),
        Command::Compile(args) => compile::execute(&args),
        Command::Disassemble(args) => disassemble::execute(&args),
    }
}
