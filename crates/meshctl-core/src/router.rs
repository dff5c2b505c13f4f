// ── Event router ──
//
// Normalizes raw Network Controller notifications into domain events.
// The directory and state cache are updated *before* the matching
// domain event is published, so subscribers always observe a store
// that is consistent with the payload they receive.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::controller::LifecycleState;
use crate::convert;
use crate::model::{Device, DeviceKind, DomainEvent, Ieee, InterviewStatus, NetworkAddress, PowerSource};
use crate::resolver::CapabilityResolver;
use crate::store::DataStore;
use crate::transport::{NetworkEvent, RawDeviceRecord};

pub(crate) struct EventRouter {
    store: Arc<DataStore>,
    resolver: CapabilityResolver,
    lifecycle: Arc<watch::Sender<LifecycleState>>,
    events: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventRouter {
    pub(crate) fn new(
        store: Arc<DataStore>,
        resolver: CapabilityResolver,
        lifecycle: Arc<watch::Sender<LifecycleState>>,
        events: broadcast::Sender<Arc<DomainEvent>>,
    ) -> Self {
        Self {
            store,
            resolver,
            lifecycle,
            events,
        }
    }

    /// Single consumer loop over the raw feed, until cancelled or the
    /// Network Controller drops its sender.
    pub(crate) async fn run(
        self,
        mut rx: broadcast::Receiver<NetworkEvent>,
        cancel: CancellationToken,
    ) {
        debug!("event router started");
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                recv = rx.recv() => match recv {
                    Ok(event) => self.handle(event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "event router lagged; raw network events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
        debug!("event router stopped");
    }

    pub(crate) fn handle(&self, event: NetworkEvent) {
        match event {
            NetworkEvent::Joined {
                ieee,
                network_address,
            } => {
                let device = self.rejoin_or_new(ieee, network_address);
                self.store.upsert_device(device.clone());
                info!(%ieee, "device joined");
                self.publish(DomainEvent::DeviceJoined { device });
            }

            NetworkEvent::Left { ieee } => {
                self.store.remove_device(ieee);
                info!(%ieee, "device left");
                self.publish(DomainEvent::DeviceLeft { ieee });
            }

            NetworkEvent::Interview {
                ieee,
                status: InterviewStatus::Successful,
                record,
            } => {
                let device = match record {
                    Some(record) => self.from_record(&record),
                    None => {
                        let mut device = self.existing_or_blank(ieee, None);
                        device.interview_completed = true;
                        self.resolved(device)
                    }
                };
                self.store.upsert_device(device.clone());
                info!(%ieee, kind = %device.kind, "device interview successful");
                self.publish(DomainEvent::DeviceInterview {
                    ieee,
                    status: InterviewStatus::Successful,
                    device: Some(device),
                });
            }

            NetworkEvent::Interview { ieee, status, .. } => {
                if status == InterviewStatus::Failed {
                    warn!(%ieee, "device interview failed");
                }
                self.publish(DomainEvent::DeviceInterview {
                    ieee,
                    status,
                    device: None,
                });
            }

            NetworkEvent::Announced {
                ieee,
                network_address,
            } => {
                let mut device = self.existing_or_blank(ieee, Some(network_address));
                device.last_seen = Some(Utc::now());
                let device = self.resolved(device);
                self.store.upsert_device(device.clone());
                debug!(%ieee, "device announced");
                self.publish(DomainEvent::DeviceAnnounced { device });
            }

            NetworkEvent::Message {
                ieee,
                endpoint,
                cluster,
                kind,
                data,
            } => {
                // Messages can beat the interview; drop until the
                // device is known.
                if !self.store.contains(ieee) {
                    trace!(%ieee, %cluster, "message from unknown device dropped");
                    return;
                }
                let partial = convert::state_from_attributes(&data);
                if !partial.is_empty() {
                    self.store.merge_state(ieee, &partial);
                }
                self.publish(DomainEvent::MessageReceived {
                    ieee,
                    endpoint,
                    cluster,
                    kind,
                    data: Value::Object(data),
                });
            }

            NetworkEvent::AdapterDisconnected => {
                let faulted = self.lifecycle.send_if_modified(|state| {
                    if matches!(state, LifecycleState::Starting | LifecycleState::Running) {
                        *state = LifecycleState::Faulted;
                        true
                    } else {
                        false
                    }
                });
                if faulted {
                    warn!("adapter disconnected; coordinator faulted");
                }
                self.publish(DomainEvent::AdapterDisconnected);
            }
        }
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn publish(&self, event: DomainEvent) {
        // Zero subscribers is not an error.
        let _ = self.events.send(Arc::new(event));
    }

    /// Fresh capability pass.
    fn resolved(&self, mut device: Device) -> Device {
        device.kind = self.resolver.kind_of(&device);
        device
    }

    fn from_record(&self, record: &RawDeviceRecord) -> Device {
        let mut device = convert::device_from_record(record, DeviceKind::Unknown);
        device.interview_completed = true;
        if device.name.is_none() {
            device.name = self.store.device(record.ieee).ok().and_then(|d| d.name.clone());
        }
        device.last_seen = Some(Utc::now());
        self.resolved(device)
    }

    /// A rejoining device keeps its metadata; a new one starts blank
    /// with its interview pending.
    fn rejoin_or_new(&self, ieee: Ieee, network_address: u16) -> Device {
        let mut device = self.existing_or_blank(ieee, Some(network_address));
        device.last_seen = Some(Utc::now());
        device
    }

    fn existing_or_blank(&self, ieee: Ieee, network_address: Option<u16>) -> Device {
        let mut device = self.store.device(ieee).map_or_else(
            |_| Device {
                ieee,
                network_address: NetworkAddress(0),
                name: None,
                model_id: None,
                manufacturer: None,
                power_source: PowerSource::Unknown,
                kind: DeviceKind::Unknown,
                endpoints: Vec::new(),
                interview_completed: false,
                last_seen: None,
            },
            |existing| (*existing).clone(),
        );
        if let Some(nwk) = network_address {
            device.network_address = NetworkAddress(nwk);
        }
        device
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::catalog::StaticCatalog;
    use crate::model::{Endpoint, OnOff};
    use serde_json::json;

    const PLUG: Ieee = Ieee::new(0x0015_8d00_0123_4567);

    struct Harness {
        router: EventRouter,
        store: Arc<DataStore>,
        lifecycle: Arc<watch::Sender<LifecycleState>>,
        rx: broadcast::Receiver<Arc<DomainEvent>>,
    }

    fn harness() -> Harness {
        let (events, rx) = broadcast::channel(64);
        let store = Arc::new(DataStore::new(events.clone()));
        let (lifecycle, _) = watch::channel(LifecycleState::Running);
        let lifecycle = Arc::new(lifecycle);
        let resolver = CapabilityResolver::new(Arc::new(StaticCatalog::builtin().unwrap()));
        Harness {
            router: EventRouter::new(Arc::clone(&store), resolver, Arc::clone(&lifecycle), events),
            store,
            lifecycle,
            rx,
        }
    }

    fn plug_record() -> RawDeviceRecord {
        RawDeviceRecord {
            ieee: PLUG,
            network_address: 0x4567,
            friendly_name: Some("kettle".into()),
            model_id: Some("E1603".into()),
            manufacturer: Some("IKEA of Sweden".into()),
            power_source: Some("Mains (single phase)".into()),
            interview_completed: true,
            endpoints: vec![Endpoint {
                id: 1,
                input_clusters: vec!["genOnOff".into()],
                output_clusters: vec![],
            }],
            last_seen: None,
        }
    }

    fn kinds(rx: &mut broadcast::Receiver<Arc<DomainEvent>>) -> Vec<&'static str> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev.kind());
        }
        out
    }

    #[test]
    fn join_registers_pending_device() {
        let mut h = harness();
        h.router.handle(NetworkEvent::Joined {
            ieee: PLUG,
            network_address: 0x4567,
        });

        let device = h.store.device(PLUG).unwrap();
        assert!(!device.interview_completed);
        assert_eq!(device.kind, DeviceKind::Unknown);
        assert_eq!(kinds(&mut h.rx), vec!["device-joined"]);
    }

    #[test]
    fn successful_interview_resolves_before_publishing() {
        let mut h = harness();
        h.router.handle(NetworkEvent::Joined {
            ieee: PLUG,
            network_address: 0x4567,
        });
        h.router.handle(NetworkEvent::Interview {
            ieee: PLUG,
            status: InterviewStatus::Successful,
            record: Some(plug_record()),
        });

        let _joined = h.rx.try_recv().unwrap();
        let event = h.rx.try_recv().unwrap();
        let DomainEvent::DeviceInterview {
            device: Some(device),
            ..
        } = event.as_ref()
        else {
            panic!("unexpected {event:?}");
        };
        assert_eq!(device.kind, DeviceKind::Plug);
        assert_eq!(*h.store.device(PLUG).unwrap(), *device);
    }

    #[test]
    fn messages_from_unknown_devices_are_dropped() {
        let mut h = harness();
        h.router.handle(NetworkEvent::Message {
            ieee: PLUG,
            endpoint: 1,
            cluster: "genOnOff".into(),
            kind: "attributeReport".into(),
            data: json!({ "onOff": true }).as_object().cloned().unwrap(),
        });
        assert!(kinds(&mut h.rx).is_empty());
        assert!(h.store.state(PLUG).is_empty());
    }

    #[test]
    fn attribute_reports_merge_into_state() {
        let mut h = harness();
        h.router.handle(NetworkEvent::Interview {
            ieee: PLUG,
            status: InterviewStatus::Successful,
            record: Some(plug_record()),
        });
        kinds(&mut h.rx);

        h.router.handle(NetworkEvent::Message {
            ieee: PLUG,
            endpoint: 1,
            cluster: "genOnOff".into(),
            kind: "attributeReport".into(),
            data: json!({ "onOff": true }).as_object().cloned().unwrap(),
        });

        assert_eq!(h.store.state(PLUG).state, Some(OnOff::On));
        assert_eq!(kinds(&mut h.rx), vec!["state-changed", "message-received"]);
    }

    #[test]
    fn leave_removes_device_and_state() {
        let mut h = harness();
        h.router.handle(NetworkEvent::Interview {
            ieee: PLUG,
            status: InterviewStatus::Successful,
            record: Some(plug_record()),
        });
        h.router.handle(NetworkEvent::Left { ieee: PLUG });

        assert!(h.store.device(PLUG).is_err());
        assert_eq!(
            kinds(&mut h.rx),
            vec!["device-interview", "device-left"]
        );
    }

    #[test]
    fn announce_updates_network_address() {
        let mut h = harness();
        h.router.handle(NetworkEvent::Interview {
            ieee: PLUG,
            status: InterviewStatus::Successful,
            record: Some(plug_record()),
        });
        h.router.handle(NetworkEvent::Announced {
            ieee: PLUG,
            network_address: 0x9999,
        });

        let device = h.store.device(PLUG).unwrap();
        assert_eq!(device.network_address, NetworkAddress(0x9999));
        assert_eq!(device.kind, DeviceKind::Plug);
        assert_eq!(device.name.as_deref(), Some("kettle"));
    }

    #[test]
    fn adapter_disconnect_faults_lifecycle() {
        let mut h = harness();
        h.router.handle(NetworkEvent::AdapterDisconnected);
        assert_eq!(*h.lifecycle.borrow(), LifecycleState::Faulted);
        assert_eq!(kinds(&mut h.rx), vec!["adapter-disconnected"]);
    }

    #[test]
    fn interview_progress_is_forwarded() {
        let mut h = harness();
        h.router.handle(NetworkEvent::Interview {
            ieee: PLUG,
            status: InterviewStatus::Started,
            record: None,
        });
        h.router.handle(NetworkEvent::Interview {
            ieee: PLUG,
            status: InterviewStatus::Failed,
            record: None,
        });
        assert_eq!(
            kinds(&mut h.rx),
            vec!["device-interview", "device-interview"]
        );
        assert!(!h.store.contains(PLUG));
    }
}
