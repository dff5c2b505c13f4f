//! Shared configuration for meshctl.
//!
//! TOML profiles, network key resolution (env var or plaintext), and
//! translation to `meshctl_core::CoordinatorConfig`. The core never
//! reads files; the CLI layers its flag overrides on top of this crate.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use meshctl_core::config::{DEFAULT_EVENT_BUFFER, DEFAULT_REQUEST_TIMEOUT};
use meshctl_core::{CoordinatorConfig, NetworkConfig};

/// Lowest and highest 2.4 GHz channel a radio accepts.
const CHANNELS: std::ops::RangeInclusive<u8> = 11..=26;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found in {}", path.display())]
    ProfileNotFound { name: String, path: PathBuf },

    #[error("network key variable {var} is not set (profile '{profile}')")]
    MissingNetworkKey { profile: String, var: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named radio profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    /// A config with one `default` profile on `port`, as written by
    /// `config init`.
    pub fn starter(port: PathBuf) -> Self {
        let mut profiles = BTreeMap::new();
        profiles.insert("default".to_owned(), Profile::new(port));
        Self {
            profiles,
            ..Self::default()
        }
    }

    /// Pick a profile: `requested`, else `default_profile`, else `default`.
    pub fn profile(&self, requested: Option<&str>) -> Result<(&str, &Profile), ConfigError> {
        let name = requested
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get_key_value(name)
            .map(|(k, p)| (k.as_str(), p))
            .ok_or_else(|| ConfigError::ProfileNotFound {
                name: name.to_owned(),
                path: config_path(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout_ms() -> u64 {
    u64::try_from(DEFAULT_REQUEST_TIMEOUT.as_millis()).unwrap_or(10_000)
}

/// A named radio profile.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Profile {
    /// Radio port. The bundled simulator treats it as its network file.
    pub port: PathBuf,

    #[serde(default = "default_channel")]
    pub channel: u8,

    #[serde(default = "default_pan_id")]
    pub pan_id: u16,

    /// 128-bit network key as 32 hex digits (plaintext; prefer the env var).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_key: Option<String>,

    /// Environment variable holding the network key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_key_env: Option<String>,

    /// Extra capability catalog, shadowing built-in models.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<PathBuf>,

    /// Override the default request timeout (ms).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// Open the pairing window for this many seconds after start.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permit_join: Option<u8>,
}

impl Profile {
    pub fn new(port: PathBuf) -> Self {
        Self {
            port,
            channel: default_channel(),
            pan_id: default_pan_id(),
            network_key: None,
            network_key_env: None,
            catalog: None,
            timeout_ms: None,
            permit_join: None,
        }
    }
}

fn default_channel() -> u8 {
    NetworkConfig::default().channel
}
fn default_pan_id() -> u16 {
    NetworkConfig::default().pan_id
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "meshctl", "meshctl")
}

/// `MESHCTL_CONFIG`, else `config.toml` in the platform config dir.
/// `MESHCTL_CONFIG` overrides it.
pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os("MESHCTL_CONFIG") {
        return PathBuf::from(path);
    }
    project_dirs().map_or_else(
        || dirs_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Where `config init` puts the simulated network file.
pub fn default_network_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("network.json"),
        |dirs| dirs.data_dir().join("network.json"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("meshctl");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` (a missing file is fine) with `MESHCTL_` env
/// overrides; nested keys use `__` (`MESHCTL_DEFAULTS__TIMEOUT_MS`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("MESHCTL_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Write `cfg` to [`config_path()`], creating the directory if needed.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Secret resolution ───────────────────────────────────────────────

/// Resolve the network key: the profile's env var first, then the
/// plaintext value. `None` lets the radio keep its own key.
pub fn resolve_network_key(
    profile: &Profile,
    profile_name: &str,
) -> Result<Option<SecretString>, ConfigError> {
    let key = if let Some(ref var) = profile.network_key_env {
        let value = std::env::var(var).map_err(|_| ConfigError::MissingNetworkKey {
            profile: profile_name.into(),
            var: var.clone(),
        })?;
        SecretString::from(value)
    } else if let Some(ref plain) = profile.network_key {
        SecretString::from(plain.clone())
    } else {
        return Ok(None);
    };

    validate_network_key(&key)?;
    Ok(Some(key))
}

fn validate_network_key(key: &SecretString) -> Result<(), ConfigError> {
    let raw = key.expose_secret();
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    if digits.len() == 32 && digits.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(())
    } else {
        Err(ConfigError::Validation {
            field: "network_key".into(),
            reason: "expected 32 hex digits (128 bits)".into(),
        })
    }
}

// ── Translation ─────────────────────────────────────────────────────

/// Build a `CoordinatorConfig` from a profile, no CLI overrides.
pub fn profile_to_coordinator_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<CoordinatorConfig, ConfigError> {
    if !CHANNELS.contains(&profile.channel) {
        return Err(ConfigError::Validation {
            field: "channel".into(),
            reason: format!(
                "expected {}..={}, got {}",
                CHANNELS.start(),
                CHANNELS.end(),
                profile.channel
            ),
        });
    }

    let timeout_ms = profile.timeout_ms.unwrap_or(defaults.timeout_ms);
    if timeout_ms == 0 {
        return Err(ConfigError::Validation {
            field: "timeout_ms".into(),
            reason: "must be greater than zero".into(),
        });
    }

    Ok(CoordinatorConfig {
        network: NetworkConfig {
            port: profile.port.clone(),
            channel: profile.channel,
            pan_id: profile.pan_id,
            network_key: resolve_network_key(profile, profile_name)?,
        },
        request_timeout: Duration::from_millis(timeout_ms),
        event_buffer: DEFAULT_EVENT_BUFFER,
        permit_join_on_start: profile.permit_join,
    })
}
