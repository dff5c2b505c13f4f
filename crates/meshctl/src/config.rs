//! Flag overrides on top of `meshctl-config` profiles.
//!
//! This is the single boundary where CLI flags and config-file types
//! cross into `meshctl_core::CoordinatorConfig`.

use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;

use meshctl_config::{Config, config_path, profile_to_coordinator_config};
use meshctl_core::{CoordinatorConfig, NetworkConfig};

use crate::cli::{ColorMode, GlobalOpts, OutputFormat};
use crate::error::CliError;

/// Everything a radio-bound command needs to build its coordinator.
#[derive(Debug)]
pub struct Resolved {
    pub coordinator: CoordinatorConfig,
    /// Extra catalog file layered over the built-in definitions.
    pub catalog: Option<PathBuf>,
}

/// Fill unset output/color flags from `[defaults]`.
pub fn apply_defaults(global: &mut GlobalOpts, cfg: &Config) {
    if global.output.is_none() {
        global.output = <OutputFormat as ValueEnum>::from_str(&cfg.defaults.output, true).ok();
    }
    if global.color.is_none() {
        global.color = <ColorMode as ValueEnum>::from_str(&cfg.defaults.color, true).ok();
    }
}

/// Resolve the active profile plus flag overrides.
///
/// An explicitly requested profile must exist. Without one, the default
/// profile is used when present; otherwise `--port` alone is enough.
pub fn resolve(global: &GlobalOpts, cfg: &Config) -> Result<Resolved, CliError> {
    let explicit = global.profile.as_deref();

    let (mut coordinator, profile_catalog) = match cfg.profile(explicit) {
        Ok((name, profile)) => {
            let built = profile_to_coordinator_config(profile, name, &cfg.defaults)?;
            (built, profile.catalog.clone())
        }
        Err(_) if explicit.is_some() => {
            let available: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
            return Err(CliError::ProfileNotFound {
                name: explicit.unwrap_or_default().to_owned(),
                path: config_path().display().to_string(),
                available: if available.is_empty() {
                    "(none)".into()
                } else {
                    available.join(", ")
                },
            });
        }
        Err(_) => {
            let port = global.port.clone().ok_or_else(|| CliError::NoPort {
                path: config_path().display().to_string(),
            })?;
            let config = CoordinatorConfig {
                network: NetworkConfig {
                    port,
                    ..NetworkConfig::default()
                },
                request_timeout: Duration::from_millis(cfg.defaults.timeout_ms),
                ..CoordinatorConfig::default()
            };
            (config, None)
        }
    };

    if let Some(ref port) = global.port {
        coordinator.network.port.clone_from(port);
    }
    if let Some(ms) = global.timeout {
        coordinator.request_timeout = Duration::from_millis(ms);
    }
    if coordinator.request_timeout.is_zero() {
        return Err(CliError::Validation {
            field: "timeout".into(),
            reason: "must be greater than zero".into(),
        });
    }

    Ok(Resolved {
        coordinator,
        catalog: global.catalog.clone().or(profile_catalog),
    })
}
