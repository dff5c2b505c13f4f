// ── Device directory ──
//
// Concurrent storage keyed by IEEE address, with a `watch` snapshot
// rebuilt on every mutation. Listing order is first-insertion order.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::watch;

use crate::model::{Device, Ieee};

struct Entry {
    /// Insertion sequence; kept across replacements of the same key.
    seq: u64,
    device: Arc<Device>,
}

pub(crate) struct DeviceDirectory {
    by_ieee: DashMap<Ieee, Entry>,
    next_seq: AtomicU64,
    /// The coordinator radio's own address, hidden from listings.
    coordinator: watch::Sender<Option<Ieee>>,
    snapshot: watch::Sender<Arc<Vec<Arc<Device>>>>,
}

impl DeviceDirectory {
    pub(crate) fn new() -> Self {
        let (coordinator, _) = watch::channel(None);
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            by_ieee: DashMap::new(),
            next_seq: AtomicU64::new(0),
            coordinator,
            snapshot,
        }
    }

    /// Insert or replace a device. Returns `true` if the address was new.
    pub(crate) fn upsert(&self, device: Device) -> bool {
        let ieee = device.ieee;
        let device = Arc::new(device);
        let is_new = match self.by_ieee.entry(ieee) {
            dashmap::mapref::entry::Entry::Occupied(mut occupied) => {
                occupied.get_mut().device = device;
                false
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                vacant.insert(Entry { seq, device });
                true
            }
        };
        self.rebuild_snapshot();
        is_new
    }

    /// Apply `f` to the stored device, if present.
    pub(crate) fn update(&self, ieee: Ieee, f: impl FnOnce(&mut Device)) -> Option<Arc<Device>> {
        let updated = {
            let mut entry = self.by_ieee.get_mut(&ieee)?;
            let mut device = (*entry.device).clone();
            f(&mut device);
            entry.device = Arc::new(device);
            Arc::clone(&entry.device)
        };
        self.rebuild_snapshot();
        Some(updated)
    }

    pub(crate) fn remove(&self, ieee: Ieee) -> Option<Arc<Device>> {
        let removed = self.by_ieee.remove(&ieee).map(|(_, e)| e.device);
        if removed.is_some() {
            self.rebuild_snapshot();
        }
        removed
    }

    pub(crate) fn get(&self, ieee: Ieee) -> Option<Arc<Device>> {
        self.by_ieee.get(&ieee).map(|e| Arc::clone(&e.device))
    }

    pub(crate) fn contains(&self, ieee: Ieee) -> bool {
        self.by_ieee.contains_key(&ieee)
    }

    /// Current listing (cheap `Arc` clone).
    pub(crate) fn snapshot(&self) -> Arc<Vec<Arc<Device>>> {
        self.snapshot.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<Device>>>> {
        self.snapshot.subscribe()
    }

    pub(crate) fn set_coordinator(&self, ieee: Option<Ieee>) {
        self.coordinator.send_replace(ieee);
        self.rebuild_snapshot();
    }

    pub(crate) fn clear(&self) {
        self.by_ieee.clear();
        self.rebuild_snapshot();
    }

    pub(crate) fn len(&self) -> usize {
        self.by_ieee.len()
    }

    // ── Private helpers ──────────────────────────────────────────────

    /// Collects and publishes under the watch channel's write lock, so
    /// concurrent writers publish in the order they collected and the
    /// last listing out always reflects the last mutation.
    fn rebuild_snapshot(&self) {
        let coordinator = *self.coordinator.borrow();
        self.snapshot.send_modify(|snap| {
            let mut entries: Vec<(u64, Arc<Device>)> = self
                .by_ieee
                .iter()
                .filter(|e| Some(*e.key()) != coordinator)
                .map(|e| (e.seq, Arc::clone(&e.device)))
                .collect();
            entries.sort_by_key(|(seq, _)| *seq);
            *snap = Arc::new(entries.into_iter().map(|(_, d)| d).collect());
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{DeviceKind, NetworkAddress, PowerSource};

    fn device(raw: u64) -> Device {
        Device {
            ieee: Ieee::new(raw),
            network_address: NetworkAddress(0),
            name: None,
            model_id: None,
            manufacturer: None,
            power_source: PowerSource::Unknown,
            kind: DeviceKind::Unknown,
            endpoints: Vec::new(),
            interview_completed: false,
            last_seen: None,
        }
    }

    fn listed(dir: &DeviceDirectory) -> Vec<u64> {
        dir.snapshot().iter().map(|d| d.ieee.as_u64()).collect()
    }

    #[test]
    fn upsert_reports_new_keys() {
        let dir = DeviceDirectory::new();
        assert!(dir.upsert(device(1)));
        assert!(!dir.upsert(device(1)));
        assert_eq!(dir.len(), 1);
    }

    #[test]
    fn listing_keeps_first_insertion_order() {
        let dir = DeviceDirectory::new();
        for raw in [30, 10, 20] {
            dir.upsert(device(raw));
        }
        // Replacing an existing device does not move it.
        let mut renamed = device(30);
        renamed.name = Some("lamp".into());
        dir.upsert(renamed);

        assert_eq!(listed(&dir), vec![30, 10, 20]);
        assert_eq!(dir.get(Ieee::new(30)).unwrap().name.as_deref(), Some("lamp"));
    }

    #[test]
    fn coordinator_is_hidden_from_listing() {
        let dir = DeviceDirectory::new();
        dir.upsert(device(1));
        dir.upsert(device(2));
        dir.set_coordinator(Some(Ieee::new(1)));

        assert_eq!(listed(&dir), vec![2]);
        assert!(dir.get(Ieee::new(1)).is_some());
    }

    #[test]
    fn remove_and_clear() {
        let dir = DeviceDirectory::new();
        dir.upsert(device(1));
        dir.upsert(device(2));

        assert!(dir.remove(Ieee::new(1)).is_some());
        assert!(dir.remove(Ieee::new(1)).is_none());
        assert_eq!(listed(&dir), vec![2]);

        dir.clear();
        assert!(dir.snapshot().is_empty());
    }

    #[test]
    fn update_rewrites_in_place() {
        let dir = DeviceDirectory::new();
        dir.upsert(device(5));
        let updated = dir
            .update(Ieee::new(5), |d| d.interview_completed = true)
            .unwrap();
        assert!(updated.interview_completed);
        assert!(dir.update(Ieee::new(6), |_| {}).is_none());
    }

    #[tokio::test]
    async fn subscribers_see_mutations() {
        let dir = DeviceDirectory::new();
        let mut rx = dir.subscribe();
        dir.upsert(device(9));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().len(), 1);
    }

    #[test]
    fn concurrent_writers_leave_the_latest_listing() {
        let dir = DeviceDirectory::new();
        dir.upsert(device(1));
        dir.upsert(device(2));

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for round in 0..500 {
                    let mut d = device(1);
                    d.name = Some(format!("upsert-{round}"));
                    dir.upsert(d);
                }
            });
            scope.spawn(|| {
                for round in 0..500 {
                    dir.update(Ieee::new(2), |d| d.name = Some(format!("update-{round}")));
                }
            });
        });

        let listing = dir.snapshot();
        assert_eq!(listing.len(), 2);
        for listed in listing.iter() {
            assert_eq!(listed, &dir.get(listed.ieee).unwrap());
        }
        assert_eq!(listing[0].name.as_deref(), Some("upsert-499"));
        assert_eq!(listing[1].name.as_deref(), Some("update-499"));
    }
}
