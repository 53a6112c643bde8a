mod check;
mod cli;
mod paths;
mod run;
mod session;

use anyhow::Result;
use cli::Command;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    match cli.command {
        Command::List(args) => run::list(&cli.global, args),
        Command::Run(args) => run::run(&cli.global, args),
        Command::Check(args) => check::check(&cli.global, args),
    }
}
