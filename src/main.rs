//! Application entry point.
//!
//! Parses command-line arguments, loads configuration and delegates
//! execution to [`runner::run`].

use clap::Parser;
use scenarist::{cli::Cli, runner};
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::fmt;

fn main() -> ExitCode {
    let cli = Cli::parse().with_default_command();
    let loaded = runner::load_config(&cli);
    let verbose = loaded.as_ref().map_or(cli.verbose, |config| config.verbose);
    let max_level = if verbose { Level::DEBUG } else { Level::ERROR };
    fmt().with_writer(std::io::stderr).with_max_level(max_level).init();
    match loaded.and_then(|config| runner::run(&cli, &config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let report = miette::Report::new(err);
            tracing::error!("{report:?}");
            ExitCode::FAILURE
        }
    }
}
