//! Configuration layering over real files and environment variables.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, ensure};
use rstest::rstest;
use scenarist::config::{ConfigOverrides, EngineConfig};
use tempfile::tempdir;
use test_support::env_lock::{EnvLock, EnvVarGuard};

const SCENARIST_VARS: [&str; 5] = [
    "SCENARIST_CONFIG_PATH",
    "SCENARIST_KUBECONFIG_FILE",
    "SCENARIST_KUBECONFIG_CONTEXT",
    "SCENARIST_CONVERGENCE_TIMEOUT_SECS",
    "SCENARIST_VERBOSE",
];

fn clear_prefixed(lock: &EnvLock) -> Vec<EnvVarGuard> {
    SCENARIST_VARS
        .iter()
        .map(|name| EnvVarGuard::remove(lock, name))
        .collect()
}

#[rstest]
fn kubeconfig_variables_are_read_verbatim() -> Result<()> {
    let lock = EnvLock::acquire();
    let _cleared = clear_prefixed(&lock);
    let _file = EnvVarGuard::set(&lock, "KUBECONFIG_FILE", "/etc/kube/config");
    let _context = EnvVarGuard::set(&lock, "KUBECONFIG_CONTEXT", "staging");
    let config = EngineConfig::load(&ConfigOverrides::default())?;
    ensure!(config.kubeconfig_file == Some(PathBuf::from("/etc/kube/config")));
    ensure!(config.kubeconfig_context.as_deref() == Some("staging"));
    ensure!(config.convergence_timeout_secs == 300);
    Ok(())
}

#[rstest]
fn prefixed_variables_override_and_flags_win() -> Result<()> {
    let lock = EnvLock::acquire();
    let _cleared = clear_prefixed(&lock);
    let _context = EnvVarGuard::set(&lock, "KUBECONFIG_CONTEXT", "staging");
    let _prefixed = EnvVarGuard::set(&lock, "SCENARIST_KUBECONFIG_CONTEXT", "production");
    let _timeout = EnvVarGuard::set(&lock, "SCENARIST_CONVERGENCE_TIMEOUT_SECS", "60");
    let from_env = EngineConfig::load(&ConfigOverrides::default())?;
    ensure!(from_env.kubeconfig_context.as_deref() == Some("production"));
    ensure!(from_env.convergence_timeout_secs == 60);

    let overrides = ConfigOverrides {
        convergence_timeout_secs: Some(5),
        ..ConfigOverrides::default()
    };
    let flagged = EngineConfig::load(&overrides)?;
    ensure!(flagged.convergence_timeout_secs == 5);
    ensure!(flagged.kubeconfig_context.as_deref() == Some("production"));
    Ok(())
}

#[rstest]
fn configuration_file_sits_below_the_environment() -> Result<()> {
    let lock = EnvLock::acquire();
    let _cleared = clear_prefixed(&lock);
    let _file = EnvVarGuard::remove(&lock, "KUBECONFIG_FILE");
    let _context = EnvVarGuard::remove(&lock, "KUBECONFIG_CONTEXT");
    let dir = tempdir().context("create temporary config directory")?;
    let path = dir.path().join("scenarist.toml");
    fs::write(
        &path,
        "kubeconfig_context = \"lab\"\nconvergence_timeout_secs = 120\nverbose = true\n",
    )
    .context("write scenarist.toml")?;
    let path_text = path.to_str().context("utf-8 temp path")?;
    let _config = EnvVarGuard::set(&lock, "SCENARIST_CONFIG_PATH", path_text);
    let _timeout = EnvVarGuard::set(&lock, "SCENARIST_CONVERGENCE_TIMEOUT_SECS", "45");

    let config = EngineConfig::load(&ConfigOverrides::default())?;
    ensure!(
        config.kubeconfig_context.as_deref() == Some("lab"),
        "file should supply the context"
    );
    ensure!(
        config.convergence_timeout_secs == 45,
        "environment should override the file"
    );
    ensure!(config.verbose, "file should enable verbose logging");
    Ok(())
}

#[rstest]
fn verbose_variable_enables_debug_logging() -> Result<()> {
    let lock = EnvLock::acquire();
    let _cleared = clear_prefixed(&lock);
    let _verbose = EnvVarGuard::set(&lock, "SCENARIST_VERBOSE", "true");
    let config = EngineConfig::load(&ConfigOverrides::default())?;
    ensure!(config.verbose, "SCENARIST_VERBOSE should be honoured");
    Ok(())
}
