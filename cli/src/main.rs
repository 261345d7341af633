use clap::Parser;

use cli::args::Cli;

fn main() {
    let cli = Cli::parse();
    let code = match cli::commands::dispatch(cli.command) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            1
        }
    };
    std::process::exit(code);
}
