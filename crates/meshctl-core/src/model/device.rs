// ── Device domain types ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::address::{Ieee, NetworkAddress};

/// Semantic device kind, inferred from the capability catalog.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DeviceKind {
    Light,
    Plug,
    Sensor,
    #[default]
    Unknown,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PowerSource {
    Mains,
    Battery,
    Dc,
    #[default]
    Unknown,
}

/// Which side of an endpoint a cluster was found on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterSide {
    /// The endpoint accepts commands for the cluster.
    Input,
    /// The endpoint only advertises sending the cluster's commands.
    Output,
}

/// A numbered sub-address on a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: u8,
    #[serde(default)]
    pub input_clusters: Vec<String>,
    #[serde(default)]
    pub output_clusters: Vec<String>,
}

impl Endpoint {
    pub fn has_input(&self, cluster: &str) -> bool {
        self.input_clusters.iter().any(|c| c == cluster)
    }

    pub fn has_output(&self, cluster: &str) -> bool {
        self.output_clusters.iter().any(|c| c == cluster)
    }
}

/// Borrowed key the capability catalog matches definitions against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceFingerprint<'a> {
    pub model_id: Option<&'a str>,
    pub manufacturer: Option<&'a str>,
}

/// One paired network node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub ieee: Ieee,
    pub network_address: NetworkAddress,
    pub name: Option<String>,
    pub model_id: Option<String>,
    pub manufacturer: Option<String>,
    pub power_source: PowerSource,
    pub kind: DeviceKind,
    pub endpoints: Vec<Endpoint>,
    pub interview_completed: bool,
    pub last_seen: Option<DateTime<Utc>>,
}

impl Device {
    pub fn fingerprint(&self) -> DeviceFingerprint<'_> {
        DeviceFingerprint {
            model_id: self.model_id.as_deref(),
            manufacturer: self.manufacturer.as_deref(),
        }
    }

    /// Pick the endpoint to address for `cluster`.
    ///
    /// Endpoints that accept the cluster win over endpoints that only
    /// send it; within each group the lowest endpoint id is chosen.
    pub fn endpoint_for(&self, cluster: &str) -> Option<(u8, ClusterSide)> {
        let lowest = |pred: &dyn Fn(&Endpoint) -> bool| {
            self.endpoints
                .iter()
                .filter(|ep| pred(ep))
                .map(|ep| ep.id)
                .min()
        };

        lowest(&|ep| ep.has_input(cluster))
            .map(|id| (id, ClusterSide::Input))
            .or_else(|| lowest(&|ep| ep.has_output(cluster)).map(|id| (id, ClusterSide::Output)))
    }

    /// Display label: friendly name when known, IEEE address otherwise.
    pub fn label(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.ieee.to_string())
    }
}
