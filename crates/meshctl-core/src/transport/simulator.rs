// ── Simulated Network Controller ──
//
// An in-memory mesh: devices hold per-cluster attribute tables, commands
// mutate them, reads answer from them. Optionally backed by a JSON
// network file that is loaded on start and written back on stop, with a
// sibling `.lock` file enforcing one session per file.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, warn};

use super::{
    AttributeMap, LowLevelCommand, NetworkController, NetworkEvent, RawDeviceRecord, SessionInfo,
    TransportError,
};
use crate::config::NetworkConfig;
use crate::model::cluster::{self, attribute, command};
use crate::model::{Endpoint, Ieee, InterviewStatus};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// How long an unresponsive cluster stalls before giving up.
const UNRESPONSIVE_STALL: Duration = Duration::from_secs(3600);

/// Default address of the simulated coordinator radio.
pub const SIMULATED_COORDINATOR: Ieee = Ieee::new(0x0012_4b00_0000_0001);

// ── Simulated devices ────────────────────────────────────────────────

/// One simulated node: its directory record plus live attribute tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimDevice {
    pub record: RawDeviceRecord,
    /// cluster → attribute → value
    #[serde(default)]
    pub attributes: IndexMap<String, AttributeMap>,
}

impl SimDevice {
    /// A bare device with one endpoint accepting `clusters`.
    pub fn new(ieee: Ieee, model_id: &str, manufacturer: &str, clusters: &[&str]) -> Self {
        let nwk = u16::try_from(ieee.as_u64() & 0xffff).unwrap_or_default();
        Self {
            record: RawDeviceRecord {
                ieee,
                network_address: nwk,
                friendly_name: None,
                model_id: Some(model_id.to_owned()),
                manufacturer: Some(manufacturer.to_owned()),
                power_source: Some("Mains (single phase)".to_owned()),
                interview_completed: true,
                endpoints: vec![Endpoint {
                    id: 1,
                    input_clusters: clusters.iter().map(|c| (*c).to_owned()).collect(),
                    output_clusters: Vec::new(),
                }],
                last_seen: None,
            },
            attributes: IndexMap::new(),
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.record.friendly_name = Some(name.to_owned());
        self
    }

    pub fn with_attribute(mut self, cluster: &str, name: &str, value: Value) -> Self {
        self.attributes
            .entry(cluster.to_owned())
            .or_default()
            .insert(name.to_owned(), value);
        self
    }

    pub fn with_endpoints(mut self, endpoints: Vec<Endpoint>) -> Self {
        self.record.endpoints = endpoints;
        self
    }

    pub fn interview_pending(mut self) -> Self {
        self.record.interview_completed = false;
        self
    }

    /// Philips Hue white and color ambiance bulb.
    pub fn color_light(ieee: Ieee) -> Self {
        Self::new(
            ieee,
            "LCT015",
            "Philips",
            &[cluster::ON_OFF, cluster::LEVEL_CONTROL, cluster::COLOR_CONTROL],
        )
        .with_attribute(cluster::ON_OFF, attribute::ON_OFF, json!(false))
        .with_attribute(cluster::LEVEL_CONTROL, attribute::CURRENT_LEVEL, json!(254))
        .with_attribute(cluster::COLOR_CONTROL, attribute::COLOR_TEMPERATURE, json!(370))
    }

    /// Philips Hue white bulb (dimmable only).
    pub fn dimmable_light(ieee: Ieee) -> Self {
        Self::new(
            ieee,
            "LWB010",
            "Philips",
            &[cluster::ON_OFF, cluster::LEVEL_CONTROL],
        )
        .with_attribute(cluster::ON_OFF, attribute::ON_OFF, json!(false))
        .with_attribute(cluster::LEVEL_CONTROL, attribute::CURRENT_LEVEL, json!(254))
    }

    /// IKEA control outlet: on/off only.
    pub fn plug(ieee: Ieee) -> Self {
        Self::new(ieee, "E1603", "IKEA of Sweden", &[cluster::ON_OFF])
            .with_attribute(cluster::ON_OFF, attribute::ON_OFF, json!(false))
    }

    /// Tuya metering plug.
    pub fn metering_plug(ieee: Ieee) -> Self {
        Self::new(
            ieee,
            "TS011F",
            "_TZ3000_okaz9tjs",
            &[cluster::ON_OFF, cluster::ELECTRICAL_MEASUREMENT, cluster::METERING],
        )
        .with_attribute(cluster::ON_OFF, attribute::ON_OFF, json!(true))
        .with_attribute(cluster::ELECTRICAL_MEASUREMENT, attribute::ACTIVE_POWER, json!(1234))
        .with_attribute(cluster::ELECTRICAL_MEASUREMENT, attribute::RMS_VOLTAGE, json!(2301))
        .with_attribute(cluster::ELECTRICAL_MEASUREMENT, attribute::RMS_CURRENT, json!(540))
        .with_attribute(cluster::METERING, attribute::CURRENT_SUMM_DELIVERED, json!(4250))
    }

    fn supports_cluster(&self, cluster: &str) -> bool {
        self.record
            .endpoints
            .iter()
            .any(|ep| ep.has_input(cluster) || ep.has_output(cluster))
    }
}

/// Per-cluster misbehaviour injected into a simulated device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Fails every request with `TransportError::Unsupported`.
    Unsupported,
    /// Never answers; the caller's timeout fires.
    Unresponsive,
    /// Refuses every request.
    Reject,
}

/// A request observed by the simulator, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportCall {
    Command(LowLevelCommand),
    Read {
        ieee: Ieee,
        endpoint: u8,
        cluster: String,
        attributes: Vec<String>,
    },
}

/// On-disk form of a simulated network.
#[derive(Debug, Default, Serialize, Deserialize)]
struct NetworkFile {
    #[serde(default)]
    devices: Vec<SimDevice>,
}

#[derive(Debug, Default)]
struct SimState {
    devices: IndexMap<Ieee, SimDevice>,
    faults: HashMap<(Ieee, String), Fault>,
    calls: Vec<TransportCall>,
    running: bool,
    lock_path: Option<PathBuf>,
    backing: Option<PathBuf>,
    pairing_secs: u8,
}

// ── SimulatedNetwork ─────────────────────────────────────────────────

pub struct SimulatedNetwork {
    coordinator: Ieee,
    state: Mutex<SimState>,
    events: broadcast::Sender<NetworkEvent>,
    fail_start: Mutex<Option<TransportError>>,
    report_changes: bool,
}

impl Default for SimulatedNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedNetwork {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            coordinator: SIMULATED_COORDINATOR,
            state: Mutex::new(SimState::default()),
            events,
            fail_start: Mutex::new(None),
            report_changes: true,
        }
    }

    /// A small demo network: a color light, a dimmable light, an on/off
    /// plug and a metering plug.
    pub fn demo() -> Self {
        Self::new()
            .with_device(SimDevice::color_light(Ieee::new(0x0017_8801_0a1b_2c3d)).with_name("living_room"))
            .with_device(SimDevice::dimmable_light(Ieee::new(0x0017_8801_0a1b_2c3e)).with_name("hallway"))
            .with_device(SimDevice::plug(Ieee::new(0x000d_6ffe_ff12_3456)).with_name("coffee_maker"))
            .with_device(SimDevice::metering_plug(Ieee::new(0xa4c1_3800_1122_3344)).with_name("washer"))
    }

    /// Persist the network to `path`. On start the file is loaded if it
    /// exists (replacing seeded devices) or written with the seed.
    pub fn backed_by(mut self, path: impl Into<PathBuf>) -> Self {
        self.state.get_mut().backing = Some(path.into());
        self
    }

    pub fn with_device(mut self, device: SimDevice) -> Self {
        self.state
            .get_mut()
            .devices
            .insert(device.record.ieee, device);
        self
    }

    pub fn with_fault(mut self, ieee: Ieee, cluster: &str, fault: Fault) -> Self {
        self.state
            .get_mut()
            .faults
            .insert((ieee, cluster.to_owned()), fault);
        self
    }

    /// Disable attribute reports after commands.
    pub fn without_reports(mut self) -> Self {
        self.report_changes = false;
        self
    }

    pub fn coordinator(&self) -> Ieee {
        self.coordinator
    }

    /// Make the next `start` fail with `err`.
    pub async fn fail_next_start(&self, err: TransportError) {
        *self.fail_start.lock().await = Some(err);
    }

    pub async fn set_fault(&self, ieee: Ieee, cluster: &str, fault: Option<Fault>) {
        let mut state = self.state.lock().await;
        let key = (ieee, cluster.to_owned());
        match fault {
            Some(f) => {
                state.faults.insert(key, f);
            }
            None => {
                state.faults.remove(&key);
            }
        }
    }

    // ── Observation ──────────────────────────────────────────────────

    pub async fn calls(&self) -> Vec<TransportCall> {
        self.state.lock().await.calls.clone()
    }

    pub async fn commands(&self) -> Vec<LowLevelCommand> {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter_map(|c| match c {
                TransportCall::Command(cmd) => Some(cmd.clone()),
                TransportCall::Read { .. } => None,
            })
            .collect()
    }

    pub async fn command_count(&self) -> usize {
        self.commands().await.len()
    }

    pub async fn clear_calls(&self) {
        self.state.lock().await.calls.clear();
    }

    pub async fn attribute(&self, ieee: Ieee, cluster: &str, name: &str) -> Option<Value> {
        let state = self.state.lock().await;
        state
            .devices
            .get(&ieee)?
            .attributes
            .get(cluster)?
            .get(name)
            .cloned()
    }

    pub async fn pairing_secs(&self) -> u8 {
        self.state.lock().await.pairing_secs
    }

    // ── Event injection ──────────────────────────────────────────────

    /// Push a raw event to subscribers as if the radio had sent it.
    pub fn emit(&self, event: NetworkEvent) {
        // No receivers is fine: nobody is listening yet.
        let _ = self.events.send(event);
    }

    /// Simulate a full join: joined, interview started, interview
    /// successful with the device's record.
    pub async fn join(&self, device: SimDevice) {
        let ieee = device.record.ieee;
        let nwk = device.record.network_address;
        let record = device.record.clone();
        self.state.lock().await.devices.insert(ieee, device);

        self.emit(NetworkEvent::Joined {
            ieee,
            network_address: nwk,
        });
        self.emit(NetworkEvent::Interview {
            ieee,
            status: InterviewStatus::Started,
            record: None,
        });
        self.emit(NetworkEvent::Interview {
            ieee,
            status: InterviewStatus::Successful,
            record: Some(record),
        });
    }

    pub async fn leave(&self, ieee: Ieee) {
        self.state.lock().await.devices.shift_remove(&ieee);
        self.emit(NetworkEvent::Left { ieee });
    }

    pub fn disconnect_adapter(&self) {
        self.emit(NetworkEvent::AdapterDisconnected);
    }

    // ── Internals ────────────────────────────────────────────────────

    fn report(&self, ieee: Ieee, endpoint: u8, cluster: &str, data: AttributeMap) {
        if self.report_changes && !data.is_empty() {
            self.emit(NetworkEvent::Message {
                ieee,
                endpoint,
                cluster: cluster.to_owned(),
                kind: "attributeReport".to_owned(),
                data,
            });
        }
    }

    /// Check running state, device presence, cluster support and faults.
    async fn admit(&self, ieee: Ieee, cluster: &str) -> Result<(), TransportError> {
        let fault = {
            let state = self.state.lock().await;
            if !state.running {
                return Err(TransportError::Disconnected);
            }
            let device = state.devices.get(&ieee).ok_or_else(|| TransportError::Rejected {
                message: format!("unknown device {ieee}"),
            })?;
            if !device.supports_cluster(cluster) {
                return Err(TransportError::Unsupported {
                    ieee,
                    cluster: cluster.to_owned(),
                });
            }
            state.faults.get(&(ieee, cluster.to_owned())).copied()
        };

        match fault {
            None => Ok(()),
            Some(Fault::Unsupported) => Err(TransportError::Unsupported {
                ieee,
                cluster: cluster.to_owned(),
            }),
            Some(Fault::Reject) => Err(TransportError::Rejected {
                message: format!("{cluster} request refused by {ieee}"),
            }),
            Some(Fault::Unresponsive) => {
                tokio::time::sleep(UNRESPONSIVE_STALL).await;
                Err(TransportError::Timeout)
            }
        }
    }

    async fn load_backing(&self, path: &Path) -> Result<(), TransportError> {
        let lock_path = lock_path_for(path);
        // create_new fails with AlreadyExists while another session holds it.
        std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)?;

        let mut state = self.state.lock().await;
        let loaded = if path.exists() {
            read_network(path)
        } else {
            write_network(path, &state.devices).map(|()| None)
        };

        match loaded {
            Ok(devices) => {
                if let Some(devices) = devices {
                    state.devices = devices;
                    info!(path = %path.display(), devices = state.devices.len(), "loaded simulated network");
                }
                state.lock_path = Some(lock_path);
                Ok(())
            }
            Err(err) => {
                let _ = std::fs::remove_file(&lock_path);
                Err(err)
            }
        }
    }
}

#[async_trait]
impl NetworkController for SimulatedNetwork {
    async fn start(&self, config: &NetworkConfig) -> Result<SessionInfo, TransportError> {
        if let Some(err) = self.fail_start.lock().await.take() {
            return Err(err);
        }

        let backing = self.state.lock().await.backing.clone();
        if let Some(path) = backing {
            self.load_backing(&path).await?;
        }

        self.state.lock().await.running = true;
        Ok(SessionInfo {
            coordinator: self.coordinator,
            firmware: Some(concat!("meshctl-sim ", env!("CARGO_PKG_VERSION")).to_owned()),
            channel: config.channel,
            pan_id: config.pan_id,
        })
    }

    async fn stop(&self) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        state.running = false;
        state.pairing_secs = 0;
        let written = match state.backing.clone() {
            Some(path) => write_network(&path, &state.devices),
            None => Ok(()),
        };
        // The session ends here even if the file could not be saved.
        if let Some(lock) = state.lock_path.take() {
            if let Err(e) = std::fs::remove_file(&lock) {
                warn!(path = %lock.display(), error = %e, "could not release network lock");
            }
        }
        written
    }

    async fn list_known_devices(&self) -> Result<Vec<RawDeviceRecord>, TransportError> {
        let state = self.state.lock().await;
        Ok(state.devices.values().map(|d| d.record.clone()).collect())
    }

    async fn issue_command(&self, cmd: &LowLevelCommand) -> Result<Value, TransportError> {
        self.state
            .lock()
            .await
            .calls
            .push(TransportCall::Command(cmd.clone()));
        debug!(ieee = %cmd.ieee, cluster = %cmd.cluster, command = %cmd.command, "sim: command");
        self.admit(cmd.ieee, &cmd.cluster).await?;

        let changed = {
            let mut state = self.state.lock().await;
            let device = state
                .devices
                .get_mut(&cmd.ieee)
                .ok_or(TransportError::Disconnected)?;
            device.record.last_seen = Some(Utc::now());
            let table = device.attributes.entry(cmd.cluster.clone()).or_default();
            apply_command(table, &cmd.command, &cmd.payload)?
        };

        self.report(cmd.ieee, cmd.endpoint, &cmd.cluster, changed);
        Ok(json!({ "status": "SUCCESS" }))
    }

    async fn read_attributes(
        &self,
        ieee: Ieee,
        endpoint: u8,
        cluster: &str,
        attributes: &[String],
    ) -> Result<AttributeMap, TransportError> {
        self.state.lock().await.calls.push(TransportCall::Read {
            ieee,
            endpoint,
            cluster: cluster.to_owned(),
            attributes: attributes.to_vec(),
        });
        debug!(%ieee, cluster, ?attributes, "sim: read");
        self.admit(ieee, cluster).await?;

        let state = self.state.lock().await;
        let wanted: HashSet<&str> = attributes.iter().map(String::as_str).collect();
        let table = state
            .devices
            .get(&ieee)
            .and_then(|d| d.attributes.get(cluster));
        Ok(table
            .map(|t| {
                t.iter()
                    .filter(|(k, _)| wanted.contains(k.as_str()))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn set_pairing_window(&self, seconds: u8) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        if !state.running {
            return Err(TransportError::Disconnected);
        }
        state.pairing_secs = seconds;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<NetworkEvent> {
        self.events.subscribe()
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

fn lock_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

fn read_network(path: &Path) -> Result<Option<IndexMap<Ieee, SimDevice>>, TransportError> {
    let raw = std::fs::read_to_string(path)?;
    let file: NetworkFile = serde_json::from_str(&raw).map_err(|e| TransportError::Malformed {
        message: format!("{}: {e}", path.display()),
    })?;
    Ok(Some(
        file.devices
            .into_iter()
            .map(|d| (d.record.ieee, d))
            .collect(),
    ))
}

fn write_network(path: &Path, devices: &IndexMap<Ieee, SimDevice>) -> Result<(), TransportError> {
    let file = NetworkFile {
        devices: devices.values().cloned().collect(),
    };
    let raw = serde_json::to_string_pretty(&file).map_err(|e| TransportError::Malformed {
        message: e.to_string(),
    })?;
    std::fs::write(path, raw)?;
    Ok(())
}

fn payload_u64(payload: &Value, key: &str) -> Result<Value, TransportError> {
    payload
        .get(key)
        .and_then(Value::as_u64)
        .map(Value::from)
        .ok_or_else(|| TransportError::Rejected {
            message: format!("missing numeric `{key}` in payload"),
        })
}

/// Apply one command to a cluster's attribute table; returns the
/// attributes that changed.
fn apply_command(
    table: &mut AttributeMap,
    name: &str,
    payload: &Value,
) -> Result<AttributeMap, TransportError> {
    let mut changed = AttributeMap::new();
    match name {
        command::ON => {
            changed.insert(attribute::ON_OFF.into(), json!(true));
        }
        command::OFF => {
            changed.insert(attribute::ON_OFF.into(), json!(false));
        }
        command::TOGGLE => {
            let on = table
                .get(attribute::ON_OFF)
                .and_then(Value::as_bool)
                .unwrap_or(false);
            changed.insert(attribute::ON_OFF.into(), json!(!on));
        }
        command::MOVE_TO_LEVEL => {
            changed.insert(attribute::CURRENT_LEVEL.into(), payload_u64(payload, "level")?);
        }
        command::MOVE_TO_COLOR_TEMP => {
            changed.insert(
                attribute::COLOR_TEMPERATURE.into(),
                payload_u64(payload, "colortemp")?,
            );
        }
        command::MOVE_TO_COLOR => {
            changed.insert(attribute::CURRENT_X.into(), payload_u64(payload, "colorx")?);
            changed.insert(attribute::CURRENT_Y.into(), payload_u64(payload, "colory")?);
        }
        command::MOVE_TO_HUE_AND_SATURATION => {
            changed.insert(attribute::CURRENT_HUE.into(), payload_u64(payload, "hue")?);
            changed.insert(
                attribute::CURRENT_SATURATION.into(),
                payload_u64(payload, "saturation")?,
            );
        }
        other => {
            return Err(TransportError::Rejected {
                message: format!("unknown command `{other}`"),
            });
        }
    }

    table.extend(changed.clone());
    Ok(changed)
}
