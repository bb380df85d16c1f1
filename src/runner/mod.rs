//! CLI execution and command dispatch logic.
//!
//! Keeps `main` minimal: [`run`] registers the step vocabulary and executes
//! the selected command against a loaded configuration, writing to stdout.

mod error;

pub use error::RunnerError;

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use itertools::Itertools;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::cli::{Cli, Commands};
use crate::config::EngineConfig;
use crate::platform;
use crate::registry::{RegistrationError, StepRegistry};
use crate::suite::Suite;

const SUITE_EXTENSIONS: [&str; 2] = ["yaml", "yml"];

/// Load the configuration for `cli`, with its flags as the top layer.
///
/// # Errors
///
/// Returns [`RunnerError::Config`] when a layer is unreadable or mistyped.
pub fn load_config(cli: &Cli) -> Result<EngineConfig, RunnerError> {
    Ok(EngineConfig::load(&cli.overrides())?)
}

/// Execute the parsed [`Cli`] commands.
///
/// # Errors
///
/// Returns a [`RunnerError`] when discovery or parsing fails, or when
/// `check` finds undefined steps.
pub fn run(cli: &Cli, config: &EngineConfig) -> Result<(), RunnerError> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    run_with(cli, config, &mut out)
}

/// As [`run`], writing to `out`.
///
/// # Errors
///
/// See [`run`].
pub fn run_with<W: Write>(
    cli: &Cli,
    config: &EngineConfig,
    out: &mut W,
) -> Result<(), RunnerError> {
    debug!(timeout = ?config.convergence_timeout(), "configuration ready");
    let registry = vocabulary()?;
    match cli.command.as_ref().unwrap_or(&Commands::Steps) {
        Commands::Steps => list_steps(&registry, out),
        Commands::Check(args) => check(&registry, &args.paths, out),
    }
}

/// The built-in step vocabulary.
///
/// # Errors
///
/// Returns [`RegistrationError`] if the bundled templates clash.
pub fn vocabulary() -> Result<StepRegistry, RegistrationError> {
    let mut registry = StepRegistry::new();
    platform::steps::register(&mut registry)?;
    Ok(registry)
}

fn list_steps<W: Write>(registry: &StepRegistry, out: &mut W) -> Result<(), RunnerError> {
    for definition in registry.definitions() {
        writeln!(out, "{} {}", definition.phase(), definition.template())?;
        if let Some(example) = definition.example() {
            writeln!(out, "    e.g. {example}")?;
        }
        if !definition.needs().is_empty() {
            writeln!(out, "    needs: {}", definition.needs().iter().join(", "))?;
        }
    }
    Ok(())
}

/// Suite files under `paths`, sorted within each directory.
///
/// Explicit file arguments are kept whatever their extension.
///
/// # Errors
///
/// Returns [`RunnerError::Discover`] when a directory cannot be walked.
pub fn discover(paths: &[PathBuf]) -> Result<Vec<PathBuf>, RunnerError> {
    let mut found = Vec::new();
    for root in paths {
        if root.is_file() {
            found.push(root.clone());
            continue;
        }
        for item in WalkDir::new(root).sort_by_file_name() {
            let entry = item.map_err(|source| RunnerError::Discover {
                path: root.clone(),
                source,
            })?;
            if entry.file_type().is_file() && is_suite(entry.path()) {
                found.push(entry.into_path());
            }
        }
    }
    Ok(found)
}

fn is_suite(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SUITE_EXTENSIONS.contains(&ext))
}

fn check<W: Write>(
    registry: &StepRegistry,
    paths: &[PathBuf],
    out: &mut W,
) -> Result<(), RunnerError> {
    let files = discover(paths)?;
    let mut scenarios = 0usize;
    let mut steps = 0usize;
    let mut undefined = 0usize;
    for file in &files {
        let suite = Suite::from_path(file)?;
        for scenario in suite.scenarios() {
            scenarios += 1;
            for step in scenario.steps() {
                steps += 1;
                if let Err(missing) = registry.find(step.phase(), step.text()) {
                    undefined += 1;
                    writeln!(out, "{}: {}: {missing}", suite.name(), scenario.name())?;
                }
            }
        }
    }
    writeln!(
        out,
        "{} suite(s), {scenarios} scenario(s), {steps} step(s), {undefined} undefined",
        files.len()
    )?;
    info!(suites = files.len(), scenarios, steps, undefined, "check finished");
    if undefined > 0 {
        return Err(RunnerError::UndefinedSteps { count: undefined });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn bundled_vocabulary_registers() {
        let registry = vocabulary().expect("vocabulary");
        assert!(registry.len() > 30, "only {} steps", registry.len());
    }

    #[rstest]
    #[case("suite.yaml", true)]
    #[case("suite.yml", true)]
    #[case("suite.json", false)]
    #[case("README", false)]
    fn suite_extensions(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(is_suite(Path::new(name)), expected);
    }

    #[rstest]
    fn listing_shows_examples_and_needs() {
        let registry = vocabulary().expect("vocabulary");
        let mut out = Vec::new();
        list_steps(&registry, &mut out).expect("listing");
        let text = String::from_utf8(out).expect("utf-8");
        assert!(text.contains("Given Kubernetes cluster is available"));
        assert!(text.contains("    needs: platform"));
        assert!(text.contains(r#"    e.g. I get service "elasticsearch""#));
    }
}
