mod capture;
mod cli;
mod decode;

use clap::Parser;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use crate::cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    // Records go to stdout; keep logs on stderr
    TermLogger::init(
        cli.loglevel,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )
    .expect("Failed to initialize logger");

    let result = match cli.command {
        Commands::Export(args) => capture::run_export(args),
        Commands::Transmit(args) => capture::run_transmit(args),
        Commands::Decode(args) => decode::run_decode(args),
        Commands::Timings(args) => decode::run_timings(args),
    };

    if let Err(e) = result {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
