use anyhow::Result;
use clap::Parser;

use heathazard::cli::{Cli, Commands};
use heathazard::commands;

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    let mut builder = pretty_env_logger::formatted_builder();
    match std::env::var("RUST_LOG") {
        Ok(filters) => {
            builder.parse_filters(&filters);
        }
        Err(_) => {
            builder.filter_level(level);
        }
    }
    builder.init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match &cli.command {
        Commands::Prepare(args) => commands::prepare(&cli, args),
        Commands::Train(args) => commands::train(&cli, args),
        Commands::Serve(args) => commands::serve(&cli, args),
    }
}
