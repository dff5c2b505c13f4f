// ── Capability resolver ──
//
// Derives a device's kind and per-intent capability descriptors from
// the catalog. Resolution is deliberately uncached: the catalog can
// change underneath (firmware or catalog updates) and a lookup is cheap
// and side-effect free. Callers capture the result for the duration of
// one dispatch.

use std::sync::Arc;

use tracing::{trace, warn};

use crate::catalog::{CapabilityCatalog, Definition, ExposeType, Feature};
use crate::model::cluster::{self, attribute, command};
use crate::model::{
    Attribute, Capabilities, CapabilityDescriptor, Device, DeviceFingerprint, DeviceKind, Intent,
    ReadBinding, ValueDomain,
};

/// Native brightness range of the level control cluster.
pub const BRIGHTNESS_DOMAIN: ValueDomain = ValueDomain { min: 0, max: 254 };

/// Typical color temperature range in mireds.
pub const COLOR_TEMP_DOMAIN: ValueDomain = ValueDomain { min: 153, max: 500 };

#[derive(Clone)]
pub struct CapabilityResolver {
    catalog: Arc<dyn CapabilityCatalog>,
}

impl CapabilityResolver {
    pub fn new(catalog: Arc<dyn CapabilityCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &Arc<dyn CapabilityCatalog> {
        &self.catalog
    }

    /// Resolve a device. A device without a catalog match resolves to
    /// `unknown` with nothing supported; that is not an error.
    pub fn resolve(&self, device: &Device) -> Capabilities {
        self.resolve_fingerprint(device.fingerprint())
    }

    /// Kind for directory entries. Devices still mid-interview stay
    /// `unknown` whatever their model claims.
    pub fn kind_of(&self, device: &Device) -> DeviceKind {
        if device.interview_completed {
            self.resolve(device).kind
        } else {
            DeviceKind::Unknown
        }
    }

    pub fn resolve_fingerprint(&self, fingerprint: DeviceFingerprint<'_>) -> Capabilities {
        match self.catalog.lookup(fingerprint) {
            Some(def) => {
                let caps = resolve_definition(&def);
                trace!(
                    model = %def.model,
                    kind = %caps.kind,
                    intents = ?caps.intents().collect::<Vec<_>>(),
                    "resolved capabilities"
                );
                caps
            }
            None => Capabilities::unknown(),
        }
    }
}

/// First match wins: a light surface makes a light; a switch surface or
/// a power reading makes a plug; anything else is unknown. Sensors are
/// never inferred.
pub fn infer_kind(def: &Definition) -> DeviceKind {
    if def.has_expose(ExposeType::Light) {
        DeviceKind::Light
    } else if def.has_expose(ExposeType::Switch) || def.feature(Attribute::Power).is_some() {
        DeviceKind::Plug
    } else {
        DeviceKind::Unknown
    }
}

/// Build capabilities from one catalog definition.
pub fn resolve_definition(def: &Definition) -> Capabilities {
    let mut descriptors = Vec::new();

    let on_off = def.feature(Attribute::State).map(on_off_descriptor);
    let follows = on_off.as_ref().map(|_| Intent::OnOff);

    let brightness = def
        .feature(Attribute::Brightness)
        .map(|f| level_descriptor(f, follows));
    let color_temp = def
        .feature(Attribute::ColorTemp)
        .map(|f| color_temp_descriptor(f, follows));
    let color = def
        .feature(Attribute::Color)
        .map(|f| color_descriptor(f, follows));

    let state_reads: Vec<ReadBinding> = [&on_off, &brightness, &color_temp]
        .into_iter()
        .flatten()
        .flat_map(|d| d.reads.iter().cloned())
        .collect();

    descriptors.extend(on_off);
    descriptors.extend(brightness);
    descriptors.extend(color_temp);
    descriptors.extend(color);

    if !state_reads.is_empty() {
        descriptors.push(read_descriptor(Intent::ReadState, state_reads));
    }

    let power_reads: Vec<ReadBinding> = [
        (Attribute::Power, cluster::ELECTRICAL_MEASUREMENT, attribute::ACTIVE_POWER),
        (Attribute::Voltage, cluster::ELECTRICAL_MEASUREMENT, attribute::RMS_VOLTAGE),
        (Attribute::Current, cluster::ELECTRICAL_MEASUREMENT, attribute::RMS_CURRENT),
        (Attribute::Energy, cluster::METERING, attribute::CURRENT_SUMM_DELIVERED),
    ]
    .into_iter()
    .filter_map(|(target, cluster, attr)| {
        def.feature(target).map(|f| read_binding(f, target, cluster, attr))
    })
    .collect();

    if !power_reads.is_empty() {
        descriptors.push(read_descriptor(Intent::ReadPower, power_reads));
    }

    Capabilities::new(infer_kind(def), descriptors)
}

// ── Descriptor builders ──────────────────────────────────────────────

fn read_binding(feature: &Feature, target: Attribute, cluster: &str, attr: &str) -> ReadBinding {
    ReadBinding {
        target,
        cluster: feature.cluster.clone().unwrap_or_else(|| cluster.to_owned()),
        attribute: feature.read.clone().unwrap_or_else(|| attr.to_owned()),
    }
}

fn domain(feature: &Feature, default: ValueDomain) -> ValueDomain {
    ValueDomain {
        min: feature.min.unwrap_or(default.min),
        max: feature.max.unwrap_or(default.max),
    }
}

fn on_off_descriptor(feature: &Feature) -> CapabilityDescriptor {
    let read = read_binding(feature, Attribute::State, cluster::ON_OFF, attribute::ON_OFF);
    CapabilityDescriptor {
        intent: Intent::OnOff,
        cluster: Some(read.cluster.clone()),
        commands: vec![
            command::ON.to_owned(),
            command::OFF.to_owned(),
            command::TOGGLE.to_owned(),
        ],
        reads: vec![read],
        domain: None,
        follows: None,
    }
}

/// Percentages always scale onto the level cluster's 0-254; a catalog
/// range that says otherwise is ignored.
fn level_descriptor(feature: &Feature, follows: Option<Intent>) -> CapabilityDescriptor {
    if domain(feature, BRIGHTNESS_DOMAIN) != BRIGHTNESS_DOMAIN {
        warn!(
            min = ?feature.min,
            max = ?feature.max,
            "brightness range is fixed at 0-254; ignoring catalog range"
        );
    }
    let read = read_binding(
        feature,
        Attribute::Brightness,
        cluster::LEVEL_CONTROL,
        attribute::CURRENT_LEVEL,
    );
    CapabilityDescriptor {
        intent: Intent::Brightness,
        cluster: Some(read.cluster.clone()),
        commands: vec![
            feature
                .command
                .clone()
                .unwrap_or_else(|| command::MOVE_TO_LEVEL.to_owned()),
        ],
        reads: vec![read],
        domain: Some(BRIGHTNESS_DOMAIN),
        follows,
    }
}

fn color_temp_descriptor(feature: &Feature, follows: Option<Intent>) -> CapabilityDescriptor {
    let read = read_binding(
        feature,
        Attribute::ColorTemp,
        cluster::COLOR_CONTROL,
        attribute::COLOR_TEMPERATURE,
    );
    CapabilityDescriptor {
        intent: Intent::ColorTemperature,
        cluster: Some(read.cluster.clone()),
        commands: vec![
            feature
                .command
                .clone()
                .unwrap_or_else(|| command::MOVE_TO_COLOR_TEMP.to_owned()),
        ],
        reads: vec![read],
        domain: Some(domain(feature, COLOR_TEMP_DOMAIN)),
        follows,
    }
}

/// Commands are `[xy, hue/saturation]` in that order.
fn color_descriptor(feature: &Feature, follows: Option<Intent>) -> CapabilityDescriptor {
    CapabilityDescriptor {
        intent: Intent::Color,
        cluster: Some(
            feature
                .cluster
                .clone()
                .unwrap_or_else(|| cluster::COLOR_CONTROL.to_owned()),
        ),
        commands: vec![
            feature
                .command
                .clone()
                .unwrap_or_else(|| command::MOVE_TO_COLOR.to_owned()),
            command::MOVE_TO_HUE_AND_SATURATION.to_owned(),
        ],
        reads: Vec::new(),
        domain: None,
        follows,
    }
}

fn read_descriptor(intent: Intent, reads: Vec<ReadBinding>) -> CapabilityDescriptor {
    CapabilityDescriptor {
        intent,
        cluster: None,
        commands: Vec::new(),
        reads,
        domain: None,
        follows: None,
    }
}
