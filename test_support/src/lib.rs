//! Test utilities shared by the integration suites.
//!
//! [`FakeCluster`] is an in-memory [`PlatformGateway`] with failure
//! injection; [`env_lock`] serialises environment mutations; [`write_suite`]
//! drops YAML suites into a temporary directory.
//!
//! [`PlatformGateway`]: scenarist::platform::PlatformGateway

pub mod cluster;
pub mod env_lock;

pub use cluster::FakeCluster;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tempfile::TempDir;

/// Write `yaml` to `dir/name`, creating parent directories.
///
/// # Errors
///
/// Returns an error when the file cannot be written.
pub fn write_suite(dir: &TempDir, name: &str, yaml: &str) -> Result<PathBuf> {
    let path = dir.path().join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    fs::write(&path, yaml).with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}
