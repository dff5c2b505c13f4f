// ── Network Controller interface ──
//
// The seam between the coordinator and whatever drives the radio. The
// coordinator only ever talks to an `Arc<dyn NetworkController>`; the
// bundled implementation is the in-memory `simulator`.

pub mod simulator;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::config::NetworkConfig;
use crate::model::{Endpoint, Ieee, InterviewStatus};

pub use simulator::{SimDevice, SimulatedNetwork, TransportCall};

/// Attribute name → raw value, as exchanged with the network layer.
pub type AttributeMap = Map<String, Value>;

// ── Errors ───────────────────────────────────────────────────────────

/// Failures reported by a Network Controller implementation.
///
/// The core maps these into `CoreError`; callers never match on them
/// directly.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The device did not answer in time.
    #[error("no response from device")]
    Timeout,

    /// The device does not implement the cluster or attribute.
    #[error("{ieee} does not support {cluster}")]
    Unsupported { ieee: Ieee, cluster: String },

    /// The device or radio refused the request.
    #[error("rejected: {message}")]
    Rejected { message: String },

    /// A response arrived but could not be interpreted.
    #[error("malformed response: {message}")]
    Malformed { message: String },

    /// The radio could not be brought up.
    #[error("radio start failed: {message}")]
    Start { message: String },

    /// The adapter went away mid-session.
    #[error("adapter disconnected")]
    Disconnected,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Capability-absent failures a best-effort read may ignore.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}

// ── Wire-neutral records ─────────────────────────────────────────────

/// Result of a successful `start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    /// The coordinator radio's own address; excluded from device listings.
    pub coordinator: Ieee,
    pub firmware: Option<String>,
    pub channel: u8,
    pub pan_id: u16,
}

/// A device as the Network Controller's backing store knows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDeviceRecord {
    pub ieee: Ieee,
    pub network_address: u16,
    #[serde(default)]
    pub friendly_name: Option<String>,
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub manufacturer: Option<String>,
    /// Free-form, e.g. `"Mains (single phase)"` or `"Battery"`.
    #[serde(default)]
    pub power_source: Option<String>,
    #[serde(default)]
    pub interview_completed: bool,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
}

/// One cluster-addressed instruction for a device endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LowLevelCommand {
    pub ieee: Ieee,
    pub endpoint: u8,
    pub cluster: String,
    pub command: String,
    pub payload: Value,
}

/// Notifications pushed by the Network Controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NetworkEvent {
    Joined {
        ieee: Ieee,
        network_address: u16,
    },
    Left {
        ieee: Ieee,
    },
    Interview {
        ieee: Ieee,
        status: InterviewStatus,
        /// Full record once the interview succeeded.
        #[serde(default)]
        record: Option<RawDeviceRecord>,
    },
    Announced {
        ieee: Ieee,
        network_address: u16,
    },
    Message {
        ieee: Ieee,
        endpoint: u8,
        cluster: String,
        kind: String,
        data: AttributeMap,
    },
    AdapterDisconnected,
}

// ── Trait ────────────────────────────────────────────────────────────

/// Everything the coordinator needs from the radio stack.
///
/// Implementations own pairing, routing and framing. Calls may suspend
/// for a full device round-trip; the coordinator bounds each one with
/// its configured request timeout.
#[async_trait]
pub trait NetworkController: Send + Sync {
    async fn start(&self, config: &NetworkConfig) -> Result<SessionInfo, TransportError>;

    async fn stop(&self) -> Result<(), TransportError>;

    async fn list_known_devices(&self) -> Result<Vec<RawDeviceRecord>, TransportError>;

    /// Issue one command; the returned value is implementation-defined.
    async fn issue_command(&self, command: &LowLevelCommand) -> Result<Value, TransportError>;

    /// Read attributes from one cluster. Attributes the device does not
    /// report are omitted from the result.
    async fn read_attributes(
        &self,
        ieee: Ieee,
        endpoint: u8,
        cluster: &str,
        attributes: &[String],
    ) -> Result<AttributeMap, TransportError>;

    /// Permit joining for `seconds`; zero closes the window.
    async fn set_pairing_window(&self, seconds: u8) -> Result<(), TransportError>;

    fn subscribe(&self) -> broadcast::Receiver<NetworkEvent>;
}
