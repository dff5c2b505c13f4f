// ── Command API ──
//
// Every operator intent can be expressed as a `Command`. The
// coordinator routes each variant to the command translator (or the
// lifecycle, for pairing), so front-ends dispatch uniformly through
// `Coordinator::execute`.

use serde::{Deserialize, Serialize};

use crate::model::{DeviceState, Ieee, PairingWindow};

/// An 8-bit-per-channel sRGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Color request. At most one representation is forwarded, with
/// precedence hex > RGB > hue/saturation; hue and saturation only
/// count when both are given.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColorSpec {
    /// `#RRGGBB`, `RRGGBB` or the short `#RGB` form.
    pub hex: Option<String>,
    pub rgb: Option<Rgb>,
    /// Degrees, `0..=360`.
    pub hue: Option<f64>,
    /// Percent, `0..=100`.
    pub saturation: Option<f64>,
}

impl ColorSpec {
    pub fn hex(hex: impl Into<String>) -> Self {
        Self {
            hex: Some(hex.into()),
            ..Self::default()
        }
    }

    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self {
            rgb: Some(Rgb { r, g, b }),
            ..Self::default()
        }
    }

    pub fn hue_saturation(hue: f64, saturation: f64) -> Self {
        Self {
            hue: Some(hue),
            saturation: Some(saturation),
            ..Self::default()
        }
    }
}

/// Optional settings applied after switching a light on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LightOptions {
    /// Percent, `0..=100`.
    pub brightness: Option<f64>,
    /// Mireds when `<= 500`, Kelvin otherwise.
    pub color_temp: Option<u32>,
    pub color: Option<ColorSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OnOffAction {
    On,
    Off,
    Toggle,
}

/// All operator intents.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // ── Device commands ──────────────────────────────────────────────
    OnOff {
        ieee: Ieee,
        action: OnOffAction,
    },
    SetBrightness {
        ieee: Ieee,
        percent: f64,
    },
    SetColorTemperature {
        ieee: Ieee,
        value: u32,
    },
    SetColor {
        ieee: Ieee,
        color: ColorSpec,
    },
    TurnOnLight {
        ieee: Ieee,
        options: LightOptions,
    },

    // ── Device reads ─────────────────────────────────────────────────
    ReadState {
        ieee: Ieee,
    },
    ReadPower {
        ieee: Ieee,
    },

    // ── Network ──────────────────────────────────────────────────────
    SetPairingWindow {
        enabled: bool,
        seconds: u32,
    },
}

/// Result of executing a command.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    Ok,
    /// Attributes a read returned (only those the device answered).
    State(DeviceState),
    PairingWindow(PairingWindow),
}
