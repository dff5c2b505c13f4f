// ── Capability types ──
//
// What a device can do, derived from the capability catalog. A
// `Capabilities` value is produced fresh on every resolution and never
// mutated afterwards.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use super::device::DeviceKind;
use super::state::Attribute;

/// Caller-facing semantic command, independent of device model.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Intent {
    OnOff,
    Brightness,
    ColorTemperature,
    Color,
    ReadState,
    ReadPower,
}

/// Inclusive native value range for a settable attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueDomain {
    pub min: u16,
    pub max: u16,
}

/// One attribute read the translator performs for an intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadBinding {
    /// Semantic attribute the raw value is normalized into.
    pub target: Attribute,
    pub cluster: String,
    pub attribute: String,
}

/// How one intent maps onto low-level commands for a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    pub intent: Intent,
    /// Cluster the intent's commands are addressed to. `None` for read
    /// intents that span several clusters.
    pub cluster: Option<String>,
    /// Low-level command names, in the order the translator may use them.
    pub commands: Vec<String>,
    pub reads: Vec<ReadBinding>,
    /// Native value range, as reported to callers. The translator does
    /// not clamp to it: brightness always scales onto 0-254 and color
    /// temperature values pass through the mireds/Kelvin rule.
    pub domain: Option<ValueDomain>,
    /// Intent that must be issued before this one in a compound command.
    /// Descriptive: `turn_on_light` always runs on, brightness, color
    /// temperature, color, which satisfies every `follows` the resolver
    /// produces.
    pub follows: Option<Intent>,
}

/// Result of one capability resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub kind: DeviceKind,
    descriptors: IndexMap<Intent, CapabilityDescriptor>,
}

impl Capabilities {
    /// No catalog entry matched: unknown kind, nothing supported.
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn new(kind: DeviceKind, descriptors: impl IntoIterator<Item = CapabilityDescriptor>) -> Self {
        Self {
            kind,
            descriptors: descriptors.into_iter().map(|d| (d.intent, d)).collect(),
        }
    }

    pub fn supports(&self, intent: Intent) -> bool {
        self.descriptors.contains_key(&intent)
    }

    pub fn descriptor(&self, intent: Intent) -> Option<&CapabilityDescriptor> {
        self.descriptors.get(&intent)
    }

    /// Supported intents, in resolution order.
    pub fn intents(&self) -> impl Iterator<Item = Intent> + '_ {
        self.descriptors.keys().copied()
    }
}
