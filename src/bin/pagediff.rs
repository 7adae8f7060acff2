//! Pagediff CLI Binary
//!
//! Command-line interface for reconciling two hierarchical record stores.

use anyhow::Context;
use clap::Parser;
use pagediff::logging::init_logging;
use pagediff::tooling::cli::{Cli, CliContext};
use std::process;

fn run(cli: &Cli) -> anyhow::Result<String> {
    let context = CliContext::new(cli.config.clone()).context("Failed to load configuration")?;

    let logging = cli.logging_config(&context.config().logging)?;
    init_logging(Some(&logging)).context("Failed to initialize logging")?;

    let output = context.execute(&cli.command)?;
    Ok(output)
}

fn main() {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(output) => {
            println!("{}", output);
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}
