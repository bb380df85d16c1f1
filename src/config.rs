//! Engine configuration.
//!
//! Layers, lowest precedence first: built-in defaults, a discovered
//! `scenarist` configuration file (or the one named by
//! `SCENARIST_CONFIG_PATH`), the `KUBECONFIG_FILE` and `KUBECONFIG_CONTEXT`
//! variables, `SCENARIST_*` variables, then command-line overrides.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use miette::Diagnostic;
use ortho_config::declarative::LayerComposition;
use ortho_config::figment::{Figment, providers::Env};
use ortho_config::uncased::Uncased;
use ortho_config::{
    ConfigDiscovery, MergeComposer, OrthoConfig, OrthoError, OrthoMergeExt, sanitize_value,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const APP_NAME: &str = "scenarist";
const CONFIG_ENV_VAR: &str = "SCENARIST_CONFIG_PATH";
const ENV_PREFIX: &str = "SCENARIST_";
const KUBECONFIG_VARS: [&str; 2] = ["KUBECONFIG_FILE", "KUBECONFIG_CONTEXT"];
const DEFAULT_CONVERGENCE_TIMEOUT_SECS: u64 = 300;

/// Configuration could not be assembled.
#[derive(Debug, Error, Diagnostic)]
#[error("invalid configuration: {source}")]
#[diagnostic(
    code(scenarist::config::invalid),
    help("check the scenarist configuration file and the SCENARIST_* and KUBECONFIG_* variables")
)]
pub struct ConfigError {
    #[source]
    source: Arc<OrthoError>,
}

impl From<Arc<OrthoError>> for ConfigError {
    fn from(source: Arc<OrthoError>) -> Self {
        Self { source }
    }
}

/// Settings shared by every scenario of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "SCENARIST")]
#[serde(default)]
pub struct EngineConfig {
    /// Kubeconfig file; the gateway's default lookup applies when unset.
    pub kubeconfig_file: Option<PathBuf>,
    /// Kubeconfig context to select.
    pub kubeconfig_context: Option<String>,
    /// Longest wait for a convergence check, in seconds.
    #[ortho_config(default = 300)]
    pub convergence_timeout_secs: u64,
    /// Enable debug logging.
    #[ortho_config(default = false)]
    pub verbose: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kubeconfig_file: None,
            kubeconfig_context: None,
            convergence_timeout_secs: DEFAULT_CONVERGENCE_TIMEOUT_SECS,
            verbose: false,
        }
    }
}

/// Values supplied on the command line. Unset fields leave lower layers
/// untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfigOverrides {
    /// Kubeconfig file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubeconfig_file: Option<PathBuf>,
    /// Kubeconfig context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubeconfig_context: Option<String>,
    /// Convergence timeout in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub convergence_timeout_secs: Option<u64>,
    /// Verbose logging.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verbose: Option<bool>,
}

/// The raw `KUBECONFIG_*` variables followed by the prefixed ones, keys
/// upper-cased so both name the same fields.
fn environment() -> Figment {
    let kubeconfig = Env::raw()
        .only(&KUBECONFIG_VARS)
        .map(|key| Uncased::new(key.as_str().to_ascii_uppercase()));
    let prefixed = Env::prefixed(ENV_PREFIX)
        .map(|key| Uncased::new(key.as_str().to_ascii_uppercase()))
        .split("__");
    Figment::from(kubeconfig).merge(prefixed)
}

fn config_discovery() -> ConfigDiscovery {
    ConfigDiscovery::builder(APP_NAME)
        .env_var(CONFIG_ENV_VAR)
        .build()
}

/// An empty object means no flag was given.
fn is_empty_value(value: &serde_json::Value) -> bool {
    matches!(value, serde_json::Value::Object(map) if map.is_empty())
}

impl EngineConfig {
    /// Compose every layer and apply `overrides` last.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a configuration file cannot be read or a
    /// value has the wrong type.
    pub fn load(overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        let mut errors = Vec::new();
        let mut composer = MergeComposer::with_capacity(4);

        match sanitize_value(&Self::default()) {
            Ok(value) => composer.push_defaults(value),
            Err(err) => errors.push(err),
        }

        let mut file_layers = config_discovery().compose_layers();
        errors.append(&mut file_layers.required_errors);
        if file_layers.value.is_empty() {
            errors.append(&mut file_layers.optional_errors);
        }
        for layer in file_layers.value {
            composer.push_layer(layer);
        }

        match environment()
            .extract::<serde_json::Value>()
            .into_ortho_merge()
        {
            Ok(value) => composer.push_environment(value),
            Err(err) => errors.push(err),
        }

        match sanitize_value(overrides) {
            Ok(value) if !is_empty_value(&value) => composer.push_cli(value),
            Ok(_) => {}
            Err(err) => errors.push(err),
        }

        let composition = LayerComposition::new(composer.layers(), errors);
        let config = composition.into_merge_result(Self::merge_from_layers)?;
        tracing::debug!(?config, "configuration loaded");
        Ok(config)
    }

    /// Convergence timeout as a [`Duration`].
    #[must_use]
    pub const fn convergence_timeout(&self) -> Duration {
        Duration::from_secs(self.convergence_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    fn defaults_wait_five_minutes() {
        let config = EngineConfig::default();
        assert_eq!(config.convergence_timeout(), Duration::from_secs(300));
        assert!(config.kubeconfig_file.is_none());
        assert!(!config.verbose);
    }

    #[rstest]
    fn later_layers_replace_only_the_fields_they_set() {
        let mut composer = MergeComposer::new();
        composer.push_defaults(sanitize_value(&EngineConfig::default()).expect("defaults"));
        composer.push_file(
            json!({ "kubeconfig_context": "staging", "convergence_timeout_secs": 120 }),
            None,
        );
        composer.push_environment(json!({ "convergence_timeout_secs": 60 }));
        composer.push_cli(
            sanitize_value(&ConfigOverrides {
                verbose: Some(true),
                ..ConfigOverrides::default()
            })
            .expect("overrides"),
        );
        let config = EngineConfig::merge_from_layers(composer.layers()).expect("merge");
        assert_eq!(config.kubeconfig_context.as_deref(), Some("staging"));
        assert_eq!(config.convergence_timeout_secs, 60);
        assert!(config.verbose);
        assert!(config.kubeconfig_file.is_none());
    }

    #[rstest]
    fn unset_overrides_serialise_to_an_empty_layer() {
        let value = sanitize_value(&ConfigOverrides::default()).expect("overrides");
        assert!(is_empty_value(&value));
    }

    #[rstest]
    fn wrongly_typed_value_is_reported() {
        let mut composer = MergeComposer::new();
        composer.push_defaults(sanitize_value(&EngineConfig::default()).expect("defaults"));
        composer.push_environment(json!({ "convergence_timeout_secs": "soon" }));
        let err = EngineConfig::merge_from_layers(composer.layers()).expect_err("type error");
        assert!(ConfigError::from(err).to_string().starts_with("invalid configuration"));
    }
}
