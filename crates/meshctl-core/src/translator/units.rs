// ── Unit conversion ──
//
// Caller-facing values to device-native values.

use crate::convert::{round_clamp_u8, round_clamp_u16};

/// Highest native brightness level.
pub const NATIVE_BRIGHTNESS_MAX: u8 = 254;

/// Inputs at or below this are mireds; above it, Kelvin.
pub const COLOR_TEMP_UNIT_THRESHOLD: u32 = 500;

/// `clamp(round(percent / 100 * 254), 0, 254)`.
///
/// Out-of-range input is clamped, not rejected. `None` only for
/// non-finite input.
pub fn brightness_to_native(percent: f64) -> Option<u8> {
    round_clamp_u8(percent / 100.0 * f64::from(NATIVE_BRIGHTNESS_MAX), NATIVE_BRIGHTNESS_MAX)
}

/// Dual-unit color temperature: values up to 500 pass through as
/// mireds, larger values are Kelvin and become `round(1e6 / kelvin)`.
///
/// The two units collide: 4000 K and 250 mireds both map to 250.
/// That ambiguity is inherent to the unit rule and kept on purpose.
pub fn color_temp_to_mireds(value: u32) -> u16 {
    if value <= COLOR_TEMP_UNIT_THRESHOLD {
        // At most 500, always fits.
        u16::try_from(value).unwrap_or(u16::MAX)
    } else {
        round_clamp_u16(1_000_000.0 / f64::from(value), u16::MAX).unwrap_or_default()
    }
}
