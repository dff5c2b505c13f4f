// ── Pairing window ──

use serde::{Deserialize, Serialize};

/// Shortest window the radio accepts, in seconds.
pub const MIN_PAIRING_SECS: u8 = 1;
/// Longest window the radio accepts, in seconds.
pub const MAX_PAIRING_SECS: u8 = 254;

/// Time-bounded permission for new devices to join. Never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingWindow {
    pub enabled: bool,
    /// Seconds left before the window closes; zero when disabled.
    pub remaining_secs: u8,
}

impl PairingWindow {
    pub const fn closed() -> Self {
        Self {
            enabled: false,
            remaining_secs: 0,
        }
    }

    pub const fn open(remaining_secs: u8) -> Self {
        Self {
            enabled: true,
            remaining_secs,
        }
    }
}

/// Clamp a requested window length to the `[1, 254]` range.
pub fn clamp_duration(requested_secs: u32) -> u8 {
    let clamped = requested_secs.clamp(u32::from(MIN_PAIRING_SECS), u32::from(MAX_PAIRING_SECS));
    u8::try_from(clamped).unwrap_or(MAX_PAIRING_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_is_clamped_to_radio_limits() {
        assert_eq!(clamp_duration(0), 1);
        assert_eq!(clamp_duration(60), 60);
        assert_eq!(clamp_duration(254), 254);
        assert_eq!(clamp_duration(10_000), 254);
    }

    #[test]
    fn closed_window_has_no_remaining_time() {
        assert_eq!(PairingWindow::default(), PairingWindow::closed());
        assert!(PairingWindow::open(30).enabled);
    }
}
