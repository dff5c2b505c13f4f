// ── Domain events ──
//
// The fixed set of notifications the event router publishes. Raw
// Network Controller events are normalized into these before any
// subscriber sees them.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use super::address::Ieee;
use super::device::Device;
use super::pairing::PairingWindow;
use super::state::DeviceState;

/// Progress of the post-join handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InterviewStatus {
    Started,
    Successful,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, IntoStaticStr)]
#[serde(tag = "type", rename_all = "snake_case")]
#[strum(serialize_all = "kebab-case")]
pub enum DomainEvent {
    DeviceJoined {
        device: Device,
    },
    DeviceLeft {
        ieee: Ieee,
    },
    DeviceInterview {
        ieee: Ieee,
        status: InterviewStatus,
        /// Directory entry after the interview; present on success.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        device: Option<Device>,
    },
    DeviceAnnounced {
        device: Device,
    },
    MessageReceived {
        ieee: Ieee,
        endpoint: u8,
        cluster: String,
        /// Message kind as named by the network layer (e.g. `attributeReport`).
        kind: String,
        data: serde_json::Value,
    },
    /// Carries the full merged snapshot, not just the delta.
    StateChanged {
        ieee: Ieee,
        state: DeviceState,
    },
    AdapterDisconnected,
    PairingWindowChanged {
        window: PairingWindow,
    },
}

impl DomainEvent {
    /// Kebab-case event name (`device-joined`, `state-changed`, ...).
    pub fn kind(&self) -> &'static str {
        self.into()
    }

    /// The device this event concerns, if any.
    pub fn ieee(&self) -> Option<Ieee> {
        match self {
            Self::DeviceJoined { device } | Self::DeviceAnnounced { device } => Some(device.ieee),
            Self::DeviceLeft { ieee }
            | Self::DeviceInterview { ieee, .. }
            | Self::MessageReceived { ieee, .. }
            | Self::StateChanged { ieee, .. } => Some(*ieee),
            Self::AdapterDisconnected | Self::PairingWindowChanged { .. } => None,
        }
    }
}
