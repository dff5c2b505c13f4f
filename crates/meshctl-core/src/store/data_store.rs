// ── Central device store ──
//
// Directory and state cache behind one handle. Keeps the two in step:
// registering a device creates its (empty) state entry, removing it
// drops both. State merges publish `StateChanged` with the full
// merged snapshot.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::trace;

use super::directory::DeviceDirectory;
use super::state_cache::StateCache;
use crate::error::CoreError;
use crate::model::{Device, DeviceState, DomainEvent, Ieee};
use crate::stream::DeviceStream;

pub struct DataStore {
    directory: DeviceDirectory,
    states: StateCache,
    events: broadcast::Sender<Arc<DomainEvent>>,
}

impl DataStore {
    pub fn new(events: broadcast::Sender<Arc<DomainEvent>>) -> Self {
        Self {
            directory: DeviceDirectory::new(),
            states: StateCache::new(),
            events,
        }
    }

    // ── Directory ────────────────────────────────────────────────────

    /// Insert or replace a device's metadata. Existing cached state is
    /// kept. Returns `true` if the device was new.
    pub fn upsert_device(&self, device: Device) -> bool {
        let ieee = device.ieee;
        self.states.ensure(ieee);
        self.directory.upsert(device)
    }

    /// Remove a device and its cached state.
    pub fn remove_device(&self, ieee: Ieee) -> Option<Arc<Device>> {
        let removed = self.directory.remove(ieee);
        self.states.remove(ieee);
        removed
    }

    pub fn device(&self, ieee: Ieee) -> Result<Arc<Device>, CoreError> {
        self.directory
            .get(ieee)
            .ok_or_else(|| CoreError::DeviceNotFound {
                identifier: ieee.to_string(),
            })
    }

    pub fn contains(&self, ieee: Ieee) -> bool {
        self.directory.contains(ieee)
    }

    /// Every known device except the coordinator radio, in insertion order.
    pub fn devices(&self) -> Arc<Vec<Arc<Device>>> {
        self.directory.snapshot()
    }

    pub fn device_count(&self) -> usize {
        self.devices().len()
    }

    pub fn subscribe_devices(&self) -> DeviceStream {
        DeviceStream::new(self.directory.subscribe())
    }

    pub(crate) fn set_coordinator(&self, ieee: Option<Ieee>) {
        self.directory.set_coordinator(ieee);
    }

    // ── State ────────────────────────────────────────────────────────

    /// Last merged state, or an empty state if the device never reported.
    pub fn state(&self, ieee: Ieee) -> DeviceState {
        self.states.get(ieee)
    }

    /// Overlay `update` onto the device's cached state, stamp it, and
    /// publish `StateChanged` with the merged snapshot.
    ///
    /// Returns `None` if the device is not (or no longer) registered.
    pub fn merge_state(&self, ieee: Ieee, update: &DeviceState) -> Option<DeviceState> {
        let now = Utc::now();
        let mut stamped = update.clone();
        stamped.last_updated = Some(now);

        let merged = self.states.merge(ieee, &stamped, |snapshot| {
            trace!(%ieee, attributes = ?snapshot.attributes(), "state merged");
            // Zero subscribers is not an error.
            let _ = self.events.send(Arc::new(DomainEvent::StateChanged {
                ieee,
                state: snapshot.clone(),
            }));
        })?;

        self.directory.update(ieee, |d| d.last_seen = Some(now));
        Some(merged)
    }

    /// Drop every device and cached state.
    pub fn clear(&self) {
        self.directory.clear();
        self.states.clear();
        self.directory.set_coordinator(None);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{DeviceKind, NetworkAddress, OnOff, PowerSource};

    fn store() -> (DataStore, broadcast::Receiver<Arc<DomainEvent>>) {
        let (tx, rx) = broadcast::channel(16);
        (DataStore::new(tx), rx)
    }

    fn device(raw: u64) -> Device {
        Device {
            ieee: Ieee::new(raw),
            network_address: NetworkAddress(0x0001),
            name: None,
            model_id: Some("E1603".into()),
            manufacturer: None,
            power_source: PowerSource::Mains,
            kind: DeviceKind::Plug,
            endpoints: Vec::new(),
            interview_completed: true,
            last_seen: None,
        }
    }

    fn on() -> DeviceState {
        DeviceState {
            state: Some(OnOff::On),
            ..DeviceState::default()
        }
    }

    #[test]
    fn get_missing_device_is_not_found() {
        let (store, _rx) = store();
        let err = store.device(Ieee::new(1)).unwrap_err();
        assert!(matches!(err, CoreError::DeviceNotFound { .. }));
    }

    #[test]
    fn upsert_preserves_cached_state() {
        let (store, _rx) = store();
        store.upsert_device(device(1));
        store.merge_state(Ieee::new(1), &on());

        let mut renamed = device(1);
        renamed.name = Some("kettle".into());
        store.upsert_device(renamed);

        assert_eq!(store.state(Ieee::new(1)).state, Some(OnOff::On));
    }

    #[test]
    fn remove_drops_state_too() {
        let (store, _rx) = store();
        store.upsert_device(device(1));
        store.merge_state(Ieee::new(1), &on());
        store.remove_device(Ieee::new(1));

        assert!(store.state(Ieee::new(1)).is_empty());
        assert!(store.merge_state(Ieee::new(1), &on()).is_none());
    }

    #[test]
    fn merge_emits_full_snapshot() {
        let (store, mut rx) = store();
        store.upsert_device(device(1));
        store.merge_state(Ieee::new(1), &on());
        store.merge_state(
            Ieee::new(1),
            &DeviceState {
                power: Some(3.5),
                ..DeviceState::default()
            },
        );

        let _first = rx.try_recv().unwrap();
        match rx.try_recv().unwrap().as_ref() {
            DomainEvent::StateChanged { state, .. } => {
                assert_eq!(state.state, Some(OnOff::On));
                assert_eq!(state.power, Some(3.5));
                assert!(state.last_updated.is_some());
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(store.device(Ieee::new(1)).unwrap().last_seen.is_some());
    }

    #[test]
    fn merge_for_unknown_device_is_silent() {
        let (store, mut rx) = store();
        assert!(store.merge_state(Ieee::new(9), &on()).is_none());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn clear_empties_directory_and_cache() {
        let (store, _rx) = store();
        store.upsert_device(device(1));
        store.upsert_device(device(2));
        store.merge_state(Ieee::new(2), &on());
        store.clear();

        assert_eq!(store.device_count(), 0);
        assert!(store.state(Ieee::new(2)).is_empty());
    }
}
