//! `CliError`: what the operator sees, with a remedy and an exit code.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text and a stable exit code per error class.

use miette::Diagnostic;
use thiserror::Error;

use meshctl_config::ConfigError;
use meshctl_core::{CoreError, Intent, LifecycleState, StartFailureKind};

/// Process exit codes, one per error class.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 3;
    pub const UNSUPPORTED: i32 = 4;
    pub const NOT_RUNNING: i32 = 5;
    pub const TIMEOUT: i32 = 6;
    pub const TRANSPORT: i32 = 7;
    pub const START_FAILURE: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Radio ────────────────────────────────────────────────────────
    #[error("Coordinator failed to start ({kind}): {message}")]
    #[diagnostic(code(meshctl::start_failure), help("{remediation}"))]
    StartFailure {
        kind: StartFailureKind,
        message: String,
        remediation: &'static str,
    },

    #[error("Coordinator is not running (state: {state})")]
    #[diagnostic(
        code(meshctl::not_running),
        help("The adapter may have been disconnected. Check the radio and retry.")
    )]
    NotRunning { state: LifecycleState },

    #[error("Request to {target} timed out after {timeout_ms}ms")]
    #[diagnostic(
        code(meshctl::timeout),
        help(
            "Check that the device is powered and in range.\n\
             Increase the bound with --timeout (milliseconds)."
        )
    )]
    Timeout { target: String, timeout_ms: u64 },

    #[error("Transport failure for {target}: {message}")]
    #[diagnostic(code(meshctl::transport))]
    Transport { target: String, message: String },

    // ── Devices ──────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(meshctl::not_found),
        help("Run: meshctl {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("Device {identifier} does not support {intent}")]
    #[diagnostic(
        code(meshctl::unsupported),
        help("Run: meshctl devices get {identifier} to see what it supports")
    )]
    Unsupported { identifier: String, intent: Intent },

    #[error("Capabilities of {identifier} are not known yet")]
    #[diagnostic(
        code(meshctl::capability_unknown),
        help(
            "The device has not finished its interview. Wait for it with:\n\
             meshctl watch --seconds 60"
        )
    )]
    CapabilityUnknown { identifier: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(meshctl::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in {path}")]
    #[diagnostic(
        code(meshctl::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: meshctl config init --port <PORT>"
        )
    )]
    ProfileNotFound {
        name: String,
        path: String,
        available: String,
    },

    #[error("No radio port configured")]
    #[diagnostic(
        code(meshctl::no_port),
        help(
            "Pass --port, set MESHCTL_PORT, or create a profile with:\n\
             meshctl config init --port <PORT>\n\
             Config expected at: {path}"
        )
    )]
    NoPort { path: String },

    #[error("Network key variable {var} is not set (profile '{profile}')")]
    #[diagnostic(
        code(meshctl::missing_network_key),
        help("Export {var}, or remove network_key_env from the profile.")
    )]
    MissingNetworkKey { profile: String, var: String },

    #[error("Config file already exists at {path}")]
    #[diagnostic(code(meshctl::config_exists), help("Re-run with --force to overwrite it."))]
    ConfigExists { path: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(code(meshctl::config))]
    Config { message: String },

    // ── IO / Serialization ────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render output: {0}")]
    #[diagnostic(code(meshctl::render))]
    Render(String),
}

impl CliError {
    /// Stable process exit status; see [`exit_code`].
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::StartFailure { .. } => exit_code::START_FAILURE,
            Self::NotRunning { .. } => exit_code::NOT_RUNNING,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Transport { .. } => exit_code::TRANSPORT,
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Unsupported { .. } | Self::CapabilityUnknown { .. } => exit_code::UNSUPPORTED,
            Self::Validation { .. }
            | Self::NoPort { .. }
            | Self::MissingNetworkKey { .. }
            | Self::ConfigExists { .. } => exit_code::USAGE,
            Self::Config { .. } | Self::Io(_) | Self::Render(_) => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::DeviceNotFound { identifier } => Self::NotFound {
                resource_type: "device".into(),
                identifier,
                list_command: "devices list".into(),
            },
            CoreError::CapabilityUnknown { identifier } => Self::CapabilityUnknown { identifier },
            CoreError::UnsupportedAction { identifier, intent } => {
                Self::Unsupported { identifier, intent }
            }
            CoreError::NotRunning { state } => Self::NotRunning { state },
            CoreError::TransportTimeout { target, timeout_ms } => {
                Self::Timeout { target, timeout_ms }
            }
            CoreError::TransportFailure { target, message } => Self::Transport { target, message },
            CoreError::StartFailure { kind, message } => Self::StartFailure {
                kind,
                message,
                remediation: kind.remediation(),
            },
            CoreError::InvalidArgument { message } => Self::Validation {
                field: "argument".into(),
                reason: message,
            },
            CoreError::Config { message } => Self::Config { message },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::ProfileNotFound { name, path } => Self::ProfileNotFound {
                name,
                path: path.display().to_string(),
                available: "(none)".into(),
            },
            ConfigError::MissingNetworkKey { profile, var } => {
                Self::MissingNetworkKey { profile, var }
            }
            ConfigError::Io(e) => Self::Io(e),
            other => Self::Config {
                message: other.to_string(),
            },
        }
    }
}
