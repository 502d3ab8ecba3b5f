//! Telemetry configuration loading and backend selection

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Telemetry configuration, read from the `[telemetry]` table
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct TelemetryConfig {
    /// Whether samples are delivered at all (default: true)
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Echo every sample to stderr (default: false)
    #[serde(default)]
    pub debug: bool,

    /// Append samples to this file
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Run this command with each sample as the final argument
    #[serde(default)]
    pub command: Option<Vec<String>>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debug: false,
            log_file: None,
            command: None,
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// Where samples go once committed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    LocalFile(PathBuf),
    External(Vec<String>),
    Discard,
}

impl TelemetryConfig {
    /// Configuration that discards every sample
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Pick the delivery backend. A log file wins over a command.
    pub fn backend(&self) -> Backend {
        if !self.enabled {
            return Backend::Discard;
        }
        if let Some(path) = &self.log_file {
            return Backend::LocalFile(path.clone());
        }
        match &self.command {
            Some(command) if !command.is_empty() => Backend::External(command.clone()),
            _ => Backend::Discard,
        }
    }
}

/// Load telemetry configuration with precedence:
/// 1. Environment variables (highest priority)
/// 2. Local config (.scm/config.local.toml)
/// 3. Project config (.scm/config.toml)
/// 4. User config (~/.scm/config.toml)
/// 5. Default (enabled, no backend)
pub fn load_telemetry_config() -> Result<TelemetryConfig> {
    let mut config = TelemetryConfig::default();

    if let Some(home_dir) = dirs::home_dir() {
        let user_config = home_dir.join(".scm/config.toml");
        if user_config.exists() {
            config = load_config_from_file(&user_config)?;
        }
    }

    for path in [".scm/config.toml", ".scm/config.local.toml"] {
        let path = Path::new(path);
        if path.exists() {
            merge_config(&mut config, load_config_from_file(path)?);
        }
    }

    apply_env_overrides(&mut config);

    Ok(config)
}

/// Load telemetry config from a TOML file
pub fn load_config_from_file(path: &Path) -> Result<TelemetryConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;

    #[derive(Deserialize)]
    struct FullConfig {
        #[serde(default)]
        telemetry: Option<TelemetryConfig>,
    }

    let full_config: FullConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config: {}", path.display()))?;

    Ok(full_config.telemetry.unwrap_or_default())
}

/// Merge a later config file into the accumulated config
fn merge_config(base: &mut TelemetryConfig, new: TelemetryConfig) {
    // Defaults are indistinguishable from explicit values, so a later file
    // can only switch telemetry off and debug on.
    if !new.enabled {
        base.enabled = false;
    }
    if new.debug {
        base.debug = true;
    }
    if new.log_file.is_some() {
        base.log_file = new.log_file;
    }
    if new.command.is_some() {
        base.command = new.command;
    }
}

/// Apply environment variable overrides
fn apply_env_overrides(config: &mut TelemetryConfig) {
    if let Ok(path) = env::var("SCM_TELEMETRY_LOG_FILE") {
        if !path.is_empty() {
            config.log_file = Some(PathBuf::from(path));
        }
    }

    if env::var("SCM_TELEMETRY_DEBUG").is_ok() {
        config.debug = true;
    }

    // SCM_TELEMETRY_DISABLED=1, DO_NOT_TRACK=1, or a test harness opting out
    if env::var("SCM_TELEMETRY_DISABLED").is_ok()
        || env::var("DO_NOT_TRACK").is_ok()
        || env::var("SCM_TEST_NO_TELEMETRY").is_ok()
    {
        config.enabled = false;
    }
}
