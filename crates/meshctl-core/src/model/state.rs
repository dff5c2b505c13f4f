// ── Device state ──
//
// A partial, typed attribute record. Every field is optional so the
// same type serves as both a full snapshot and a delta to merge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Binary power state as reported by the On/Off cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum OnOff {
    On,
    Off,
}

impl OnOff {
    pub fn toggled(self) -> Self {
        match self {
            Self::On => Self::Off,
            Self::Off => Self::On,
        }
    }
}

impl From<bool> for OnOff {
    fn from(on: bool) -> Self {
        if on { Self::On } else { Self::Off }
    }
}

/// Last known color, in whichever mode the device last reported.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Color {
    /// CIE 1931 chromaticity, each coordinate in `0.0..=1.0`.
    Xy { x: f64, y: f64 },
    /// Native hue and saturation, each in `0..=254`.
    HueSaturation { hue: u8, saturation: u8 },
}

/// Attribute names, as exposed to callers and catalog definitions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Attribute {
    State,
    Brightness,
    ColorTemp,
    Color,
    Power,
    Energy,
    Voltage,
    Current,
}

/// Last-known attribute values of one device.
///
/// Brightness (`0..=254`) and color temperature (mireds) are held in the
/// device's native units. Power readings are normalized: watts, volts,
/// amperes and kilowatt-hours.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<OnOff>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_temp: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voltage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl DeviceState {
    /// Overlay the present fields of `update`; absent fields keep their
    /// prior value.
    pub fn merge(&mut self, update: &DeviceState) {
        macro_rules! overlay {
            ($($field:ident),+ $(,)?) => {
                $(
                    if update.$field.is_some() {
                        self.$field = update.$field;
                    }
                )+
            };
        }
        overlay!(
            state,
            brightness,
            color_temp,
            color,
            power,
            energy,
            voltage,
            current,
            last_updated,
        );
    }

    /// Attributes that carry a value, in declaration order.
    pub fn attributes(&self) -> Vec<Attribute> {
        let present = [
            (Attribute::State, self.state.is_some()),
            (Attribute::Brightness, self.brightness.is_some()),
            (Attribute::ColorTemp, self.color_temp.is_some()),
            (Attribute::Color, self.color.is_some()),
            (Attribute::Power, self.power.is_some()),
            (Attribute::Energy, self.energy.is_some()),
            (Attribute::Voltage, self.voltage.is_some()),
            (Attribute::Current, self.current.is_some()),
        ];
        present
            .into_iter()
            .filter_map(|(attr, set)| set.then_some(attr))
            .collect()
    }

    /// True when no attribute carries a value (the timestamp is ignored).
    pub fn is_empty(&self) -> bool {
        self.attributes().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn on() -> DeviceState {
        DeviceState {
            state: Some(OnOff::On),
            ..DeviceState::default()
        }
    }

    #[test]
    fn merge_retains_unspecified_attributes() {
        let mut state = on();
        state.merge(&DeviceState {
            brightness: Some(80),
            ..DeviceState::default()
        });

        assert_eq!(state.state, Some(OnOff::On));
        assert_eq!(state.brightness, Some(80));
        assert_eq!(state.attributes(), vec![Attribute::State, Attribute::Brightness]);
    }

    #[test]
    fn merge_is_idempotent() {
        let update = DeviceState {
            brightness: Some(80),
            power: Some(12.5),
            ..DeviceState::default()
        };
        let mut once = on();
        once.merge(&update);
        let mut twice = once.clone();
        twice.merge(&update);
        assert_eq!(once, twice);
    }

    #[test]
    fn merge_order_irrelevant_for_disjoint_attributes() {
        let a = on();
        let b = DeviceState {
            color_temp: Some(250),
            ..DeviceState::default()
        };

        let mut ab = DeviceState::default();
        ab.merge(&a);
        ab.merge(&b);
        let mut ba = DeviceState::default();
        ba.merge(&b);
        ba.merge(&a);
        assert_eq!(ab, ba);
    }

    #[test]
    fn later_value_wins_for_same_attribute() {
        let mut state = on();
        state.merge(&DeviceState {
            state: Some(OnOff::Off),
            ..DeviceState::default()
        });
        assert_eq!(state.state, Some(OnOff::Off));
    }

    #[test]
    fn empty_state_serializes_to_empty_object() {
        let json = serde_json::to_value(DeviceState::default()).unwrap_or_default();
        assert_eq!(json, serde_json::json!({}));
        assert!(DeviceState::default().is_empty());
    }

    #[test]
    fn on_off_serializes_uppercase() {
        let json = serde_json::to_value(on()).unwrap_or_default();
        assert_eq!(json, serde_json::json!({ "state": "ON" }));
        assert_eq!(OnOff::On.toggled(), OnOff::Off);
    }
}
