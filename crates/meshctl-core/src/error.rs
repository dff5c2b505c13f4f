// ── Core error types ──
//
// User-facing errors from meshctl-core. Consumers never see raw
// transport failures: the `From<TransportError>` impl translates them
// into `TransportTimeout` / `TransportFailure`, and start-up failures
// are classified into a `StartFailureKind` with a remediation hint.

use std::io;

use strum::Display;
use thiserror::Error;

use crate::controller::LifecycleState;
use crate::model::Intent;
use crate::transport::TransportError;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Translation preconditions ────────────────────────────────────
    #[error("Device not found: {identifier}")]
    DeviceNotFound { identifier: String },

    #[error("Capabilities of {identifier} are unknown until its interview completes")]
    CapabilityUnknown { identifier: String },

    #[error("Device {identifier} does not support {intent}")]
    UnsupportedAction { identifier: String, intent: Intent },

    #[error("Coordinator is not running (state: {state})")]
    NotRunning { state: LifecycleState },

    // ── Transport ────────────────────────────────────────────────────
    #[error("Request to {target} timed out after {timeout_ms}ms")]
    TransportTimeout { target: String, timeout_ms: u64 },

    #[error("Transport failure for {target}: {message}")]
    TransportFailure { target: String, message: String },

    #[error("Coordinator failed to start ({kind}): {message}")]
    StartFailure {
        kind: StartFailureKind,
        message: String,
    },

    // ── Caller input ─────────────────────────────────────────────────
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Targeted remedy for start failures.
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            Self::StartFailure { kind, .. } => Some(kind.remediation()),
            _ => None,
        }
    }

    /// Wrap a transport failure that happened while talking to `target`.
    pub(crate) fn transport(target: impl ToString, err: TransportError) -> Self {
        let target = target.to_string();
        match err {
            TransportError::Timeout => Self::TransportTimeout {
                target,
                timeout_ms: 0,
            },
            other => Self::TransportFailure {
                target,
                message: other.to_string(),
            },
        }
    }

    /// Classify a failed `start` round-trip.
    pub(crate) fn start_failure(err: &TransportError) -> Self {
        Self::StartFailure {
            kind: StartFailureKind::classify(err),
            message: err.to_string(),
        }
    }
}

// ── Start failure taxonomy ───────────────────────────────────────────

/// Why the radio could not be brought up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum StartFailureKind {
    PortUnavailable,
    PermissionDenied,
    PortBusy,
    RadioUnresponsive,
}

impl StartFailureKind {
    pub fn remediation(self) -> &'static str {
        match self {
            Self::PortUnavailable => {
                "check the adapter is plugged in and the configured port path is correct"
            }
            Self::PermissionDenied => {
                "add your user to the group that owns the port (usually `dialout`) and log in again"
            }
            Self::PortBusy => "check another process is not using this port",
            Self::RadioUnresponsive => {
                "the radio did not answer; unplug and reconnect it, or re-flash its firmware if it is stuck in the bootloader"
            }
        }
    }

    pub fn classify(err: &TransportError) -> Self {
        match err {
            TransportError::Io(io_err) => Self::from_io(io_err),
            TransportError::Timeout => Self::RadioUnresponsive,
            other => Self::from_message(&other.to_string()),
        }
    }

    fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::PortUnavailable,
            io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            io::ErrorKind::ResourceBusy
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::AlreadyExists => Self::PortBusy,
            io::ErrorKind::TimedOut => Self::RadioUnresponsive,
            _ => Self::from_message(&err.to_string()),
        }
    }

    fn from_message(message: &str) -> Self {
        let lower = message.to_ascii_lowercase();
        if lower.contains("permission denied") || lower.contains("access denied") {
            Self::PermissionDenied
        } else if lower.contains("busy") || lower.contains("locked") || lower.contains("in use")
        {
            Self::PortBusy
        } else if lower.contains("no such file") || lower.contains("not found") {
            Self::PortUnavailable
        } else {
            Self::RadioUnresponsive
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<TransportError> for CoreError {
    fn from(err: TransportError) -> Self {
        Self::transport("network", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_classify_by_kind() {
        let cases = [
            (io::ErrorKind::NotFound, StartFailureKind::PortUnavailable),
            (io::ErrorKind::PermissionDenied, StartFailureKind::PermissionDenied),
            (io::ErrorKind::AlreadyExists, StartFailureKind::PortBusy),
            (io::ErrorKind::TimedOut, StartFailureKind::RadioUnresponsive),
        ];
        for (kind, expected) in cases {
            let err = TransportError::Io(io::Error::from(kind));
            assert_eq!(StartFailureKind::classify(&err), expected, "{kind:?}");
        }
    }

    #[test]
    fn free_text_errors_classify_by_keyword() {
        let busy = TransportError::Start {
            message: "serial port is busy".into(),
        };
        assert_eq!(StartFailureKind::classify(&busy), StartFailureKind::PortBusy);

        let reset = TransportError::Start {
            message: "adapter stuck in reset loop".into(),
        };
        assert_eq!(
            StartFailureKind::classify(&reset),
            StartFailureKind::RadioUnresponsive
        );
    }

    #[test]
    fn port_busy_carries_remediation() {
        let err = CoreError::StartFailure {
            kind: StartFailureKind::PortBusy,
            message: "locked".into(),
        };
        assert_eq!(
            err.remediation(),
            Some("check another process is not using this port")
        );
        assert!(err.to_string().contains("port-busy"));
    }

    #[test]
    fn transport_timeout_maps_to_timeout_kind() {
        let err = CoreError::transport("0x0000000000000001", TransportError::Timeout);
        assert!(matches!(err, CoreError::TransportTimeout { .. }));
    }

    #[test]
    fn messages_name_identity_and_intent() {
        let err = CoreError::UnsupportedAction {
            identifier: "0x00158d0001234567".into(),
            intent: Intent::Brightness,
        };
        assert_eq!(
            err.to_string(),
            "Device 0x00158d0001234567 does not support brightness"
        );
    }
}
