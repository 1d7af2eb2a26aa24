//! Main application entry point (CLI binary).
//!
//! This is a thin wrapper around the `xml_fetch` library that handles:
//! - Command-line argument parsing
//! - Logger initialization
//! - Printing the resulting markup
//!
//! All core functionality is implemented in the library crate.

use anyhow::{Context, Result};
use clap::Parser;
use std::process;

use xml_fetch::initialization::init_logger_with;
use xml_fetch::{run_import, Config, Opt};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from(Opt::parse());

    let log_level = config.log_level.clone();
    let log_format = config.log_format.clone();
    init_logger_with(log_level.into(), log_format).context("Failed to initialize logger")?;

    match run_import(config).await {
        Ok(report) => {
            println!("{}", report.output);
            Ok(())
        }
        Err(e) => {
            eprintln!("xml_fetch error: {:#}", e);
            process::exit(1);
        }
    }
}
