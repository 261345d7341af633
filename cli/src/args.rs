use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "orbit", version, about = "The Orbit scripting host")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compile and run a script
    Run(RunArgs),
    /// Compile a script to a binary executable
    Compile(CompileArgs),
    /// Print the bytecode of a script or executable
    Disassemble(DisassembleArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Script (.orb) or executable (.orbc) to run
    pub path: PathBuf,

    /// Collect garbage on every instruction
    #[arg(long)]
    pub stress_gc: bool,

    /// Emit diagnostics as JSON, one object per line
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct CompileArgs {
    /// Script to compile
    pub path: PathBuf,

    /// Output path; defaults to the input with an .orbc extension
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct DisassembleArgs {
    /// Script (.orb) or executable (.orbc) to disassemble
    pub path: PathBuf,
}
