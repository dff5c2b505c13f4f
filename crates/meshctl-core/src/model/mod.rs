// ── Domain model ──
//
// Canonical representations of devices, their state and capabilities,
// and the events the coordinator publishes. Raw Network Controller data
// is converted into these types in `crate::convert`.

pub mod address;
pub mod capability;
pub mod cluster;
pub mod device;
pub mod event;
pub mod pairing;
pub mod state;

// ── Re-exports ──────────────────────────────────────────────────────

pub use address::{AddressParseError, Ieee, NetworkAddress};
pub use capability::{Capabilities, CapabilityDescriptor, Intent, ReadBinding, ValueDomain};
pub use device::{ClusterSide, Device, DeviceFingerprint, DeviceKind, Endpoint, PowerSource};
pub use event::{DomainEvent, InterviewStatus};
pub use pairing::PairingWindow;
pub use state::{Attribute, Color, DeviceState, OnOff};
