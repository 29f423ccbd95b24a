// ABOUTME: Entry point for the cowork command-line tool
// ABOUTME: Parses arguments and dispatches to the inspection commands

use anyhow::Result;
use clap::Parser;
use cowork_cli::Cli;

fn main() -> Result<()> {
    cowork_log::init_for("cowork-cli", tracing::Level::INFO);

    let cli = Cli::parse();
    let output = cowork_cli::run(&cli)?;
    println!("{}", output);
    Ok(())
}
