// ── Raw-to-domain conversions ──
//
// Bridges raw Network Controller data into canonical `meshctl_core::model`
// types. Device records become `Device`s; attribute maps (read results
// and attribute reports alike) become partial `DeviceState`s with
// raw device units normalized.

use serde_json::Value;

use crate::model::cluster::attribute;
use crate::model::{Attribute, Color, Device, DeviceKind, DeviceState, NetworkAddress, OnOff, PowerSource};
use crate::transport::{AttributeMap, RawDeviceRecord};

/// Native color coordinate scale: `0..=65535` maps onto `0.0..=1.0`.
pub const XY_SCALE: f64 = 65535.0;

// ── Numeric helpers ────────────────────────────────────────────────

/// Round and clamp to `0..=max`. Non-finite input yields `None`.
#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation, clippy::as_conversions)]
pub(crate) fn round_clamp_u16(value: f64, max: u16) -> Option<u16> {
    value
        .is_finite()
        .then(|| value.round().clamp(0.0, f64::from(max)) as u16)
}

pub(crate) fn round_clamp_u8(value: f64, max: u8) -> Option<u8> {
    round_clamp_u16(value, u16::from(max)).and_then(|v| u8::try_from(v).ok())
}

// ── Devices ────────────────────────────────────────────────────────

/// Normalize the free-form power source string reported at interview.
pub fn power_source(raw: Option<&str>) -> PowerSource {
    let Some(raw) = raw else {
        return PowerSource::Unknown;
    };
    let lower = raw.to_ascii_lowercase();
    if lower.starts_with("mains") {
        PowerSource::Mains
    } else if lower.contains("battery") {
        PowerSource::Battery
    } else if lower.starts_with("dc") {
        PowerSource::Dc
    } else {
        PowerSource::Unknown
    }
}

/// Build a directory entry from a raw record. `kind` comes from a fresh
/// capability resolution of the same record.
pub fn device_from_record(record: &RawDeviceRecord, kind: DeviceKind) -> Device {
    let mut endpoints = record.endpoints.clone();
    endpoints.sort_by_key(|ep| ep.id);

    Device {
        ieee: record.ieee,
        network_address: NetworkAddress(record.network_address),
        name: record.friendly_name.clone(),
        model_id: record.model_id.clone(),
        manufacturer: record.manufacturer.clone(),
        power_source: power_source(record.power_source.as_deref()),
        kind,
        endpoints,
        interview_completed: record.interview_completed,
        last_seen: record.last_seen,
    }
}

// ── Attribute values ───────────────────────────────────────────────

fn parse_on_off(raw: &Value) -> Option<OnOff> {
    match raw {
        Value::Bool(on) => Some(OnOff::from(*on)),
        Value::Number(n) => n.as_u64().map(|v| OnOff::from(v != 0)),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Normalize one raw attribute value into `state`.
///
/// Power readings arrive in device units: deciwatts, decivolts,
/// milliamperes and hundredths of a kilowatt-hour.
pub fn apply_reading(state: &mut DeviceState, target: Attribute, raw: &Value) {
    let number = raw.as_f64();
    match target {
        Attribute::State => state.state = parse_on_off(raw).or(state.state),
        Attribute::Brightness => {
            if let Some(v) = number.and_then(|n| round_clamp_u8(n, 254)) {
                state.brightness = Some(v);
            }
        }
        Attribute::ColorTemp => {
            if let Some(v) = number.and_then(|n| round_clamp_u16(n, u16::MAX)) {
                state.color_temp = Some(v);
            }
        }
        Attribute::Power => state.power = number.map(|n| n / 10.0).or(state.power),
        Attribute::Voltage => state.voltage = number.map(|n| n / 10.0).or(state.voltage),
        Attribute::Current => state.current = number.map(|n| n / 1000.0).or(state.current),
        Attribute::Energy => state.energy = number.map(|n| n / 100.0).or(state.energy),
        // Color spans two raw attributes; see `state_from_attributes`.
        Attribute::Color => {}
    }
}

/// Map a standard raw attribute name to the attribute it feeds.
pub fn attribute_for(raw_name: &str) -> Option<Attribute> {
    match raw_name {
        attribute::ON_OFF => Some(Attribute::State),
        attribute::CURRENT_LEVEL => Some(Attribute::Brightness),
        attribute::COLOR_TEMPERATURE => Some(Attribute::ColorTemp),
        attribute::ACTIVE_POWER => Some(Attribute::Power),
        attribute::RMS_VOLTAGE => Some(Attribute::Voltage),
        attribute::RMS_CURRENT => Some(Attribute::Current),
        attribute::CURRENT_SUMM_DELIVERED => Some(Attribute::Energy),
        _ => None,
    }
}

/// Convert an attribute map keyed by standard raw names into a partial
/// state. Unknown attributes are ignored.
pub fn state_from_attributes(attrs: &AttributeMap) -> DeviceState {
    let mut state = DeviceState::default();
    for (name, raw) in attrs {
        if let Some(target) = attribute_for(name) {
            apply_reading(&mut state, target, raw);
        }
    }

    let num = |name: &str| attrs.get(name).and_then(Value::as_f64);
    if let (Some(x), Some(y)) = (num(attribute::CURRENT_X), num(attribute::CURRENT_Y)) {
        state.color = Some(Color::Xy {
            x: x / XY_SCALE,
            y: y / XY_SCALE,
        });
    } else if let (Some(hue), Some(saturation)) = (
        num(attribute::CURRENT_HUE).and_then(|h| round_clamp_u8(h, 254)),
        num(attribute::CURRENT_SATURATION).and_then(|s| round_clamp_u8(s, 254)),
    ) {
        state.color = Some(Color::HueSaturation { hue, saturation });
    }
    state
}
