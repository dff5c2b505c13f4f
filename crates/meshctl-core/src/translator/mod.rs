// ── Command translator ──
//
// Turns semantic intents into low-level commands for one specific
// device. Every operation checks its preconditions locally, in order:
// coordinator running, device known, interview complete, intent
// supported, an endpoint carrying the cluster. Any failure returns
// before a single byte reaches the Network Controller.

pub mod color;
pub mod units;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::command::{ColorSpec, LightOptions, OnOffAction};
use crate::controller::LifecycleState;
use crate::convert;
use crate::error::CoreError;
use crate::model::cluster::command;
use crate::model::{
    CapabilityDescriptor, ClusterSide, Device, DeviceState, Ieee, Intent, OnOff, ReadBinding,
};
use crate::resolver::CapabilityResolver;
use crate::store::DataStore;
use crate::transport::{LowLevelCommand, NetworkController, TransportError};

use self::color::NativeColor;

/// A device and the descriptor of the intent being dispatched to it,
/// captured once per dispatch.
struct Dispatch {
    device: Arc<Device>,
    descriptor: CapabilityDescriptor,
}

impl Dispatch {
    fn identifier(&self) -> String {
        self.device.ieee.to_string()
    }

    fn unsupported(&self) -> CoreError {
        CoreError::UnsupportedAction {
            identifier: self.identifier(),
            intent: self.descriptor.intent,
        }
    }

    /// Command name at `index` in the descriptor's command list.
    fn command(&self, index: usize) -> Result<&str, CoreError> {
        self.descriptor
            .commands
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| self.unsupported())
    }

    /// The cluster the intent targets and the endpoint to address it on.
    fn target(&self) -> Result<(&str, u8), CoreError> {
        let cluster = self
            .descriptor
            .cluster
            .as_deref()
            .ok_or_else(|| self.unsupported())?;
        match self.device.endpoint_for(cluster) {
            Some((endpoint, ClusterSide::Input)) => Ok((cluster, endpoint)),
            Some((endpoint, ClusterSide::Output)) => {
                debug!(ieee = %self.device.ieee, cluster, endpoint, "cluster only advertised as output; using it");
                Ok((cluster, endpoint))
            }
            None => Err(self.unsupported()),
        }
    }
}

#[derive(Clone)]
pub struct CommandTranslator {
    network: Arc<dyn NetworkController>,
    resolver: CapabilityResolver,
    store: Arc<DataStore>,
    lifecycle: watch::Receiver<LifecycleState>,
    timeout: Duration,
}

impl CommandTranslator {
    pub fn new(
        network: Arc<dyn NetworkController>,
        resolver: CapabilityResolver,
        store: Arc<DataStore>,
        lifecycle: watch::Receiver<LifecycleState>,
        timeout: Duration,
    ) -> Self {
        Self {
            network,
            resolver,
            store,
            lifecycle,
            timeout,
        }
    }

    // ── On/Off family ────────────────────────────────────────────────

    pub async fn on_off(&self, ieee: Ieee, action: OnOffAction) -> Result<(), CoreError> {
        let dispatch = self.prepare(ieee, Intent::OnOff)?;
        let (cluster, endpoint) = dispatch.target()?;
        let name = match action {
            OnOffAction::On => command::ON,
            OnOffAction::Off => command::OFF,
            OnOffAction::Toggle => command::TOGGLE,
        };

        self.send(&dispatch, cluster, endpoint, name, Value::Null)
            .await?;

        let next = match action {
            OnOffAction::On => Some(OnOff::On),
            OnOffAction::Off => Some(OnOff::Off),
            // Only flip what we know; an unknown state stays unknown
            // until the device reports.
            OnOffAction::Toggle => self.store.state(ieee).state.map(OnOff::toggled),
        };
        if let Some(next) = next {
            self.write_back(
                ieee,
                DeviceState {
                    state: Some(next),
                    ..DeviceState::default()
                },
            );
        }
        Ok(())
    }

    // ── Level and color ──────────────────────────────────────────────

    /// Set brightness in percent. Out-of-range input is clamped.
    pub async fn set_brightness(&self, ieee: Ieee, percent: f64) -> Result<(), CoreError> {
        let dispatch = self.prepare(ieee, Intent::Brightness)?;
        let native = units::brightness_to_native(percent).ok_or_else(|| {
            CoreError::InvalidArgument {
                message: format!("brightness must be a finite percentage, got {percent}"),
            }
        })?;
        let (cluster, endpoint) = dispatch.target()?;
        let name = dispatch.command(0)?;

        self.send(
            &dispatch,
            cluster,
            endpoint,
            name,
            json!({ "level": native, "transtime": 0 }),
        )
        .await?;

        self.write_back(
            ieee,
            DeviceState {
                brightness: Some(native),
                ..DeviceState::default()
            },
        );
        Ok(())
    }

    /// Set color temperature. Values up to 500 are mireds, larger
    /// values Kelvin.
    pub async fn set_color_temperature(&self, ieee: Ieee, value: u32) -> Result<(), CoreError> {
        let dispatch = self.prepare(ieee, Intent::ColorTemperature)?;
        let mireds = units::color_temp_to_mireds(value);
        let (cluster, endpoint) = dispatch.target()?;
        let name = dispatch.command(0)?;

        self.send(
            &dispatch,
            cluster,
            endpoint,
            name,
            json!({ "colortemp": mireds, "transtime": 0 }),
        )
        .await?;

        self.write_back(
            ieee,
            DeviceState {
                color_temp: Some(mireds),
                ..DeviceState::default()
            },
        );
        Ok(())
    }

    /// Forward exactly one color representation. No representation
    /// present is a successful no-op.
    pub async fn set_color(&self, ieee: Ieee, spec: &ColorSpec) -> Result<(), CoreError> {
        let dispatch = self.prepare(ieee, Intent::Color)?;
        let Some(native) = color::select(spec)? else {
            debug!(%ieee, "no color representation given; nothing to send");
            return Ok(());
        };
        let (cluster, endpoint) = dispatch.target()?;
        let name = match native {
            NativeColor::Xy { .. } => dispatch.command(0)?,
            NativeColor::HueSaturation { .. } => dispatch.command(1)?,
        };

        self.send(&dispatch, cluster, endpoint, name, native.payload())
            .await?;

        self.write_back(
            ieee,
            DeviceState {
                color: Some(native.cached()),
                ..DeviceState::default()
            },
        );
        Ok(())
    }

    /// Switch a light on, then apply brightness, color temperature and
    /// color in that order, each awaited before the next.
    ///
    /// Not transactional: there is no rollback. If a later step fails,
    /// earlier steps stay applied on the device and in the state cache,
    /// and the error names only the failing step.
    pub async fn turn_on_light(&self, ieee: Ieee, options: &LightOptions) -> Result<(), CoreError> {
        self.on_off(ieee, OnOffAction::On).await?;

        let partial = |err: CoreError, step: Intent| {
            warn!(%ieee, %step, error = %err, "turn-on-light stopped part way; earlier steps remain applied");
            err
        };

        if let Some(percent) = options.brightness {
            self.set_brightness(ieee, percent)
                .await
                .map_err(|e| partial(e, Intent::Brightness))?;
        }
        if let Some(value) = options.color_temp {
            self.set_color_temperature(ieee, value)
                .await
                .map_err(|e| partial(e, Intent::ColorTemperature))?;
        }
        if let Some(spec) = &options.color {
            self.set_color(ieee, spec)
                .await
                .map_err(|e| partial(e, Intent::Color))?;
        }
        Ok(())
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Query on/off, level and color temperature. Attributes the device
    /// cannot answer are left out; the read only fails on timeouts and
    /// transport failures.
    pub async fn read_state(&self, ieee: Ieee) -> Result<DeviceState, CoreError> {
        let dispatch = self.prepare(ieee, Intent::ReadState)?;
        self.read_into_cache(&dispatch).await
    }

    /// Query power, voltage, current and energy, normalized to W, V, A
    /// and kWh.
    pub async fn read_power(&self, ieee: Ieee) -> Result<DeviceState, CoreError> {
        let dispatch = self.prepare(ieee, Intent::ReadPower)?;
        self.read_into_cache(&dispatch).await
    }

    async fn read_into_cache(&self, dispatch: &Dispatch) -> Result<DeviceState, CoreError> {
        let partial = self
            .read_best_effort(&dispatch.device, &dispatch.descriptor.reads)
            .await?;

        // Only merge once every exchange finished: a timeout above
        // leaves the cache untouched.
        if !partial.is_empty() {
            self.write_back(dispatch.device.ieee, partial.clone());
        }
        Ok(partial)
    }

    /// Best-effort read combinator: one read per cluster, accumulating
    /// whatever answers. Unsupported clusters (or clusters on no
    /// endpoint) are skipped; timeouts and other failures propagate.
    async fn read_best_effort(
        &self,
        device: &Device,
        reads: &[ReadBinding],
    ) -> Result<DeviceState, CoreError> {
        let mut partial = DeviceState::default();

        for (cluster, bindings) in group_by_cluster(reads) {
            let Some((endpoint, _)) = device.endpoint_for(cluster) else {
                debug!(ieee = %device.ieee, cluster, "no endpoint carries cluster; skipping read");
                continue;
            };
            let names: Vec<String> = bindings.iter().map(|b| b.attribute.clone()).collect();
            debug!(ieee = %device.ieee, endpoint, cluster, attributes = ?names, "read attributes");

            let result = self
                .bounded(
                    self.network
                        .read_attributes(device.ieee, endpoint, cluster, &names),
                )
                .await;

            match result {
                Ok(values) => {
                    for binding in bindings {
                        if let Some(raw) = values.get(&binding.attribute) {
                            convert::apply_reading(&mut partial, binding.target, raw);
                        }
                    }
                }
                Err(err) if err.is_unsupported() => {
                    debug!(ieee = %device.ieee, cluster, "cluster unsupported; attribute omitted");
                }
                Err(err) => return Err(self.lift(device.ieee, err)),
            }
        }
        Ok(partial)
    }

    // ── Preconditions ────────────────────────────────────────────────

    fn ensure_running(&self) -> Result<(), CoreError> {
        let state = *self.lifecycle.borrow();
        if state == LifecycleState::Running {
            Ok(())
        } else {
            Err(CoreError::NotRunning { state })
        }
    }

    fn prepare(&self, ieee: Ieee, intent: Intent) -> Result<Dispatch, CoreError> {
        self.ensure_running()?;
        let device = self.store.device(ieee)?;
        if !device.interview_completed {
            return Err(CoreError::CapabilityUnknown {
                identifier: ieee.to_string(),
            });
        }

        let capabilities = self.resolver.resolve(&device);
        let descriptor = capabilities
            .descriptor(intent)
            .cloned()
            .ok_or_else(|| CoreError::UnsupportedAction {
                identifier: ieee.to_string(),
                intent,
            })?;
        Ok(Dispatch { device, descriptor })
    }

    // ── Transport ────────────────────────────────────────────────────

    async fn send(
        &self,
        dispatch: &Dispatch,
        cluster: &str,
        endpoint: u8,
        name: &str,
        payload: Value,
    ) -> Result<(), CoreError> {
        let cmd = LowLevelCommand {
            ieee: dispatch.device.ieee,
            endpoint,
            cluster: cluster.to_owned(),
            command: name.to_owned(),
            payload,
        };
        debug!(
            ieee = %cmd.ieee,
            endpoint,
            cluster,
            command = name,
            payload = %cmd.payload,
            "issue command"
        );
        self.bounded(self.network.issue_command(&cmd))
            .await
            .map(|_| ())
            .map_err(|e| self.lift(cmd.ieee, e))
    }

    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, TransportError>>,
    ) -> Result<T, TransportError> {
        within(self.timeout, fut).await
    }

    fn lift(&self, ieee: Ieee, err: TransportError) -> CoreError {
        lift_transport(ieee.to_string(), self.timeout, err)
    }

    fn write_back(&self, ieee: Ieee, update: DeviceState) {
        if self.store.merge_state(ieee, &update).is_none() {
            debug!(%ieee, "device left before its result could be cached");
        }
    }
}

/// Bound one Network Controller round-trip. An elapsed bound drops the
/// in-flight future, so nothing it would have produced is recorded.
pub(crate) async fn within<T>(
    timeout: Duration,
    fut: impl Future<Output = Result<T, TransportError>>,
) -> Result<T, TransportError> {
    tokio::time::timeout(timeout, fut)
        .await
        .unwrap_or(Err(TransportError::Timeout))
}

/// Map a transport error, filling in the configured bound for timeouts.
pub(crate) fn lift_transport(target: String, timeout: Duration, err: TransportError) -> CoreError {
    match err {
        TransportError::Timeout => CoreError::TransportTimeout {
            target,
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        },
        other => CoreError::transport(target, other),
    }
}

/// Group read bindings by cluster, preserving first-seen order.
fn group_by_cluster(reads: &[ReadBinding]) -> Vec<(&str, Vec<&ReadBinding>)> {
    let mut groups: Vec<(&str, Vec<&ReadBinding>)> = Vec::new();
    for binding in reads {
        match groups.iter_mut().find(|(c, _)| *c == binding.cluster) {
            Some((_, members)) => members.push(binding),
            None => groups.push((binding.cluster.as_str(), vec![binding])),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Attribute;

    fn binding(target: Attribute, cluster: &str, attribute: &str) -> ReadBinding {
        ReadBinding {
            target,
            cluster: cluster.into(),
            attribute: attribute.into(),
        }
    }

    #[test]
    fn reads_grouped_by_cluster_in_order() {
        let reads = vec![
            binding(Attribute::Power, "haElectricalMeasurement", "activePower"),
            binding(Attribute::Energy, "seMetering", "currentSummDelivered"),
            binding(Attribute::Voltage, "haElectricalMeasurement", "rmsVoltage"),
        ];
        let groups = group_by_cluster(&reads);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "haElectricalMeasurement");
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[1].0, "seMetering");
    }

    #[test]
    fn timeout_lifted_with_configured_bound() {
        let err = lift_transport("x".into(), Duration::from_millis(1500), TransportError::Timeout);
        assert!(matches!(
            err,
            CoreError::TransportTimeout {
                timeout_ms: 1500,
                ..
            }
        ));
    }

    #[test]
    fn rejection_lifted_to_transport_failure() {
        let err = lift_transport(
            "x".into(),
            Duration::from_secs(1),
            TransportError::Rejected {
                message: "nope".into(),
            },
        );
        assert!(matches!(err, CoreError::TransportFailure { .. }));
    }
}
