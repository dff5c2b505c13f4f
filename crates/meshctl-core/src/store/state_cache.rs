// ── State cache ──
//
// Last-known attribute values per device. Merges run under the
// per-key entry lock, so a command write-back and an attribute report
// racing on the same device never lose each other's attributes.

use dashmap::DashMap;

use crate::model::{DeviceState, Ieee};

pub(crate) struct StateCache {
    by_ieee: DashMap<Ieee, DeviceState>,
}

impl StateCache {
    pub(crate) fn new() -> Self {
        Self {
            by_ieee: DashMap::new(),
        }
    }

    /// Create an empty entry if none exists yet.
    pub(crate) fn ensure(&self, ieee: Ieee) {
        self.by_ieee.entry(ieee).or_default();
    }

    /// Overlay `update` onto the device's entry and hand the merged
    /// snapshot to `on_merged` while the entry is still locked.
    ///
    /// Returns `None` without calling `on_merged` when the device has no
    /// entry (it was never registered or has been removed).
    pub(crate) fn merge(
        &self,
        ieee: Ieee,
        update: &DeviceState,
        on_merged: impl FnOnce(&DeviceState),
    ) -> Option<DeviceState> {
        let mut entry = self.by_ieee.get_mut(&ieee)?;
        entry.merge(update);
        on_merged(&entry);
        Some(entry.clone())
    }

    /// Last merged snapshot, or an empty state if nothing was reported.
    pub(crate) fn get(&self, ieee: Ieee) -> DeviceState {
        self.by_ieee
            .get(&ieee)
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    pub(crate) fn remove(&self, ieee: Ieee) {
        self.by_ieee.remove(&ieee);
    }

    pub(crate) fn clear(&self) {
        self.by_ieee.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::OnOff;

    #[test]
    fn merge_into_unregistered_device_is_refused() {
        let cache = StateCache::new();
        let mut called = false;
        let merged = cache.merge(Ieee::new(1), &DeviceState::default(), |_| called = true);
        assert!(merged.is_none());
        assert!(!called);
    }

    #[test]
    fn merge_returns_full_snapshot() {
        let cache = StateCache::new();
        let ieee = Ieee::new(1);
        cache.ensure(ieee);

        cache.merge(
            ieee,
            &DeviceState {
                state: Some(OnOff::On),
                ..DeviceState::default()
            },
            |_| {},
        );
        let merged = cache
            .merge(
                ieee,
                &DeviceState {
                    brightness: Some(80),
                    ..DeviceState::default()
                },
                |_| {},
            )
            .unwrap();

        assert_eq!(merged.state, Some(OnOff::On));
        assert_eq!(merged.brightness, Some(80));
        assert_eq!(cache.get(ieee), merged);
    }

    #[test]
    fn ensure_does_not_reset_existing_state() {
        let cache = StateCache::new();
        let ieee = Ieee::new(2);
        cache.ensure(ieee);
        cache.merge(
            ieee,
            &DeviceState {
                power: Some(5.0),
                ..DeviceState::default()
            },
            |_| {},
        );
        cache.ensure(ieee);
        assert_eq!(cache.get(ieee).power, Some(5.0));
    }

    #[test]
    fn get_unknown_is_empty_and_remove_clears() {
        let cache = StateCache::new();
        assert!(cache.get(Ieee::new(3)).is_empty());

        cache.ensure(Ieee::new(3));
        cache.remove(Ieee::new(3));
        assert!(cache.merge(Ieee::new(3), &DeviceState::default(), |_| {}).is_none());
    }
}
