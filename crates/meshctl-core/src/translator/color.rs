// ── Color conversion ──
//
// Picks the one representation a `ColorSpec` forwards and converts it
// to native units: CIE 1931 xy scaled to `0..=65535`, or hue and
// saturation scaled to `0..=254`.

use serde_json::{Value, json};

use crate::command::{ColorSpec, Rgb};
use crate::convert::{XY_SCALE, round_clamp_u8, round_clamp_u16};
use crate::error::CoreError;
use crate::model::Color;

/// Native color command payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NativeColor {
    Xy { x: u16, y: u16 },
    HueSaturation { hue: u8, saturation: u8 },
}

impl NativeColor {
    pub fn payload(self) -> Value {
        match self {
            Self::Xy { x, y } => json!({ "colorx": x, "colory": y, "transtime": 0 }),
            Self::HueSaturation { hue, saturation } => {
                json!({ "hue": hue, "saturation": saturation, "transtime": 0 })
            }
        }
    }

    /// The color as the state cache records it.
    pub fn cached(self) -> Color {
        match self {
            Self::Xy { x, y } => Color::Xy {
                x: f64::from(x) / XY_SCALE,
                y: f64::from(y) / XY_SCALE,
            },
            Self::HueSaturation { hue, saturation } => Color::HueSaturation { hue, saturation },
        }
    }
}

/// Select and convert. `Ok(None)` when no complete representation is
/// present; a malformed hex string is an `InvalidArgument`.
pub fn select(spec: &ColorSpec) -> Result<Option<NativeColor>, CoreError> {
    if let Some(hex) = &spec.hex {
        return parse_hex(hex).map(|rgb| Some(rgb_to_xy(rgb)));
    }
    if let Some(rgb) = spec.rgb {
        return Ok(Some(rgb_to_xy(rgb)));
    }
    match (spec.hue, spec.saturation) {
        (Some(hue), Some(saturation)) => {
            let hue = round_clamp_u8(hue / 360.0 * 254.0, 254).ok_or_else(|| invalid("hue"))?;
            let saturation = round_clamp_u8(saturation / 100.0 * 254.0, 254)
                .ok_or_else(|| invalid("saturation"))?;
            Ok(Some(NativeColor::HueSaturation { hue, saturation }))
        }
        _ => Ok(None),
    }
}

fn invalid(what: &str) -> CoreError {
    CoreError::InvalidArgument {
        message: format!("{what} must be a finite number"),
    }
}

/// Parse `#RRGGBB`, `RRGGBB`, `#RGB` or `RGB`.
pub fn parse_hex(raw: &str) -> Result<Rgb, CoreError> {
    let bad = || CoreError::InvalidArgument {
        message: format!("invalid hex color '{raw}': expected #RRGGBB or #RGB"),
    };
    let digits = raw.trim().trim_start_matches('#');
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(bad());
    }

    let expanded: String = match digits.len() {
        6 => digits.to_owned(),
        3 => digits.chars().flat_map(|c| [c, c]).collect(),
        _ => return Err(bad()),
    };
    let channel = |i: usize| {
        expanded
            .get(i..i + 2)
            .and_then(|s| u8::from_str_radix(s, 16).ok())
            .ok_or_else(bad)
    };
    Ok(Rgb {
        r: channel(0)?,
        g: channel(2)?,
        b: channel(4)?,
    })
}

/// sRGB gamma expansion.
fn linear(channel: u8) -> f64 {
    let v = f64::from(channel) / 255.0;
    if v > 0.04045 {
        ((v + 0.055) / 1.055).powf(2.4)
    } else {
        v / 12.92
    }
}

/// sRGB to CIE 1931 xy through the Wide Gamut D65 matrix.
pub fn rgb_to_xy(rgb: Rgb) -> NativeColor {
    let (r, g, b) = (linear(rgb.r), linear(rgb.g), linear(rgb.b));

    let x = r * 0.649_926 + g * 0.103_455 + b * 0.197_109;
    let y = r * 0.234_327 + g * 0.743_075 + b * 0.022_598;
    let z = g * 0.053_077 + b * 1.035_763;
    let sum = x + y + z;

    // Black has no chromaticity; use the D65 white point.
    let (cx, cy) = if sum > 0.0 {
        (x / sum, y / sum)
    } else {
        (0.3127, 0.3290)
    };

    let scale = |v: f64| round_clamp_u16(v * XY_SCALE, u16::MAX).unwrap_or_default();
    NativeColor::Xy {
        x: scale(cx),
        y: scale(cy),
    }
}
