mod cli;
mod commands;
mod config;
mod formatter;

use std::process;

use clap::Parser;
use cli::Cli;

fn main() {
    let cli = Cli::parse();

    loopvol::util::init_logging(cli.global.debug);

    let result = match cli.command {
        cli::Commands::Create(args) => commands::create::execute(args, &cli.global),
        cli::Commands::List(args) => commands::list::execute(args, &cli.global),
        cli::Commands::Rm(args) => commands::rm::execute(args, &cli.global),
        cli::Commands::Attach(args) => commands::attach::execute(args, &cli.global),
        cli::Commands::Detach(args) => commands::detach::execute(args, &cli.global),
        cli::Commands::Run(args) => commands::run::execute(args, &cli.global),
    };

    if let Err(error) = result {
        eprintln!("Error: {}", error);
        process::exit(1);
    }
}
