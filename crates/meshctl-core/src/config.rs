// ── Runtime coordinator configuration ──
//
// These types describe *how* to run a coordinator session. They carry
// radio settings and timing, but never touch disk. The CLI builds a
// `CoordinatorConfig` from its profile and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

/// Default bound for every Network Controller round-trip.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default capacity of the domain event broadcast channel.
pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// Radio and network parameters handed to the Network Controller.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Serial port (or, for the simulator, network file) of the radio.
    pub port: PathBuf,
    /// 2.4 GHz channel, 11..=26.
    pub channel: u8,
    pub pan_id: u16,
    /// 128-bit network key; the radio keeps its own when absent.
    pub network_key: Option<SecretString>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            port: PathBuf::from("/dev/ttyACM0"),
            channel: 11,
            pan_id: 0x1a62,
            network_key: None,
        }
    }
}

/// Configuration for one coordinator session.
///
/// Built by the CLI, passed to `Coordinator` -- core never reads config files.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub network: NetworkConfig,
    /// Bound applied to every command, read, start and stop round-trip.
    pub request_timeout: Duration,
    /// Capacity of the domain event channel. Lagging subscribers lose
    /// the oldest events.
    pub event_buffer: usize,
    /// Open the pairing window for this many seconds right after start.
    pub permit_join_on_start: Option<u8>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            event_buffer: DEFAULT_EVENT_BUFFER,
            permit_join_on_start: None,
        }
    }
}
