//! Command line interface definition using clap.
//!
//! Global flags override the matching configuration layers; see
//! [`crate::config`] for the environment variables they shadow.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::ConfigOverrides;

/// Inspect and check step vocabularies for scenario suites.
#[derive(Debug, Parser, Clone, PartialEq, Eq)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose diagnostic logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Kubeconfig file handed to the platform gateway.
    #[arg(long, value_name = "FILE")]
    pub kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to select.
    #[arg(long, value_name = "NAME")]
    pub context: Option<String>,

    /// Seconds to wait for convergence checks.
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Subcommand to execute; defaults to `steps` when omitted.
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Apply the default command if none was specified.
    #[must_use]
    pub fn with_default_command(mut self) -> Self {
        if self.command.is_none() {
            self.command = Some(Commands::Steps);
        }
        self
    }

    /// Configuration values set by flags.
    #[must_use]
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            kubeconfig_file: self.kubeconfig.clone(),
            kubeconfig_context: self.context.clone(),
            convergence_timeout_secs: self.timeout,
            verbose: self.verbose.then_some(true),
        }
    }
}

/// Available top-level commands.
#[derive(Debug, Subcommand, PartialEq, Eq, Clone)]
pub enum Commands {
    /// List every registered step template with an example.
    Steps,

    /// Parse suites and report steps no template matches.
    Check(CheckArgs),
}

/// Arguments accepted by the `check` command.
#[derive(Debug, Args, PartialEq, Eq, Clone)]
pub struct CheckArgs {
    /// Suite files or directories searched for `.yaml` and `.yml` files.
    #[arg(value_name = "PATH", default_value = ".")]
    pub paths: Vec<PathBuf>,
}
