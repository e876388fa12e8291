//! API Auto Docs - command-line access to generated API documentation.
//!
//! Scans a Rust web project, discovers its routes and prints documentation
//! records or example responses.
//!
//! # Usage
//!
//! ```bash
//! api-auto-docs [OPTIONS] <PROJECT_PATH> <COMMAND>
//! ```
//!
//! # Examples
//!
//! List routes grouped for navigation:
//! ```bash
//! api-auto-docs ./my-api-project routes
//! ```
//!
//! Grouped documentation as YAML, without HEAD routes:
//! ```bash
//! api-auto-docs ./my-api-project -f yaml docs --group-by api_uri --hide head
//! ```
//!
//! Example response for one route, with a config file:
//! ```bash
//! api-auto-docs ./my-api-project -c docs.yaml mock 5f0c...
//! ```

use anyhow::Result;
use api_auto_docs::cli;
use clap::Parser;
use log::info;

fn main() -> Result<()> {
    let args = cli::CliArgs::parse();

    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    info!("API Auto Docs starting...");

    let args = cli::parse_args_from_parsed(args)?;
    cli::run(args)?;

    Ok(())
}
