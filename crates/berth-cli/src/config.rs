//! Configuration file management for berth.
//!
//! Provides a TOML-based config file at `~/.config/berth/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use berth_core::provider::ProviderSpec;
use berth_core::runtime::DEFAULT_REGISTRATION_TIMEOUT;
use berth_core::settings::keys;

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub containers: ContainersSection,
    pub registry: RegistrySection,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub providers: Vec<ProviderSpec>,
}

/// The `[containers]` table. Keys keep the camelCase names used by the
/// settings they feed.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContainersSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_client: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orchestrator_client: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compose_command: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySection {
    pub registration_timeout_ms: u64,
}

impl Default for RegistrySection {
    fn default() -> Self {
        Self {
            registration_timeout_ms: DEFAULT_REGISTRATION_TIMEOUT.as_millis() as u64,
        }
    }
}

impl ContainersSection {
    /// The section as setting key/value pairs, skipping unset entries.
    pub fn to_settings(&self) -> HashMap<String, String> {
        [
            (keys::CONTAINER_CLIENT, &self.container_client),
            (keys::ORCHESTRATOR_CLIENT, &self.orchestrator_client),
            (keys::CONTAINER_COMMAND, &self.container_command),
            (keys::COMPOSE_COMMAND, &self.compose_command),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.clone().map(|v| (key.to_string(), v)))
        .collect()
    }
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the berth config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/berth` or `~/.config/berth`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("berth");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("berth")
}

/// Return the default path to the berth config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Config file location: `--config` > `BERTH_CONFIG` > default path.
pub fn resolve_config_path(cli_path: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_path {
        return path.to_path_buf();
    }
    match std::env::var("BERTH_CONFIG") {
        Ok(path) if !path.is_empty() => PathBuf::from(path),
        _ => config_path(),
    }
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file at `path`. A missing file yields the
/// defaults; an unreadable or malformed one is an error.
pub fn load_config(path: &Path) -> Result<ConfigFile> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(ConfigFile::default());
        }
        Err(e) => {
            return Err(e)
                .with_context(|| format!("failed to read config file at {}", path.display()));
        }
    };
    toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))
}

/// Serialize and write the config file, creating parent dirs as needed.
pub fn save_config(path: &Path, config: &ConfigFile) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory {}", dir.display()))?;
    }

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(path, contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;
    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Environment variables that override individual settings.
const SETTING_OVERRIDES: [(&str, &str); 4] = [
    ("BERTH_CONTAINER_CLIENT", keys::CONTAINER_CLIENT),
    ("BERTH_ORCHESTRATOR_CLIENT", keys::ORCHESTRATOR_CLIENT),
    ("BERTH_CONTAINER_COMMAND", keys::CONTAINER_COMMAND),
    ("BERTH_COMPOSE_COMMAND", keys::COMPOSE_COMMAND),
];

/// Timeouts above this still work but leave callers hanging for a long time
/// on a misspelled client id.
const LONG_TIMEOUT_MS: u64 = 10_000;

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct BerthConfig {
    /// Where the config file lives (or would be written).
    pub path: PathBuf,
    /// Initial values for the settings store.
    pub settings: HashMap<String, String>,
    pub registration_timeout: Duration,
    pub providers: Vec<ProviderSpec>,
}

impl BerthConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - File: `cli_path` > `BERTH_CONFIG` > `~/.config/berth/config.toml`
    /// - Settings: `BERTH_*` env vars > `[containers]` table > unset
    /// - Timeout: `BERTH_REGISTRATION_TIMEOUT_MS` > `[registry]` > 1000 ms
    pub fn resolve(cli_path: Option<&Path>) -> Result<Self> {
        let path = resolve_config_path(cli_path);
        let file = load_config(&path)?;

        let mut settings = file.containers.to_settings();
        for (var, key) in SETTING_OVERRIDES {
            if let Ok(value) = std::env::var(var) {
                settings.insert(key.to_string(), value);
            }
        }

        let timeout_ms = match std::env::var("BERTH_REGISTRATION_TIMEOUT_MS") {
            Ok(raw) => raw.trim().parse::<u64>().with_context(|| {
                format!("BERTH_REGISTRATION_TIMEOUT_MS is not a number of milliseconds: {raw}")
            })?,
            Err(_) => file.registry.registration_timeout_ms,
        };
        if timeout_ms == 0 {
            bail!("registration timeout must be greater than zero milliseconds");
        }
        if timeout_ms > LONG_TIMEOUT_MS {
            tracing::warn!(
                timeout_ms,
                "registration timeout is unusually long; unknown client ids will block this long"
            );
        }

        Ok(Self {
            path,
            settings,
            registration_timeout: Duration::from_millis(timeout_ms),
            providers: file.providers,
        })
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
