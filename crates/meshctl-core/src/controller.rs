// ── Coordinator lifecycle ──
//
// Owns one radio session: start/stop, the pairing window, command
// routing, and observation of devices, state and domain events. Every
// other component is handed what it needs from here; nothing is
// process-global, so independent coordinators can run side by side.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use strum::Display;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::catalog::{CapabilityCatalog, Definition};
use crate::command::{ColorSpec, Command, CommandResult, LightOptions, OnOffAction};
use crate::config::CoordinatorConfig;
use crate::convert;
use crate::error::CoreError;
use crate::model::pairing::clamp_duration;
use crate::model::{
    Capabilities, Device, DeviceKind, DeviceState, DomainEvent, Ieee, PairingWindow,
};
use crate::resolver::CapabilityResolver;
use crate::router::EventRouter;
use crate::store::DataStore;
use crate::stream::{DeviceStream, EventStream};
use crate::transport::{NetworkController, SessionInfo, TransportError};
use crate::translator::{self, CommandTranslator};

// ── LifecycleState ───────────────────────────────────────────────────

/// Coordinator lifecycle, observable by consumers.
///
/// `Stopped → Starting → Running → Stopping → Stopped`; `Faulted` is
/// entered from `Starting` or `Running` when the adapter goes away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LifecycleState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Faulted,
}

/// What `start()` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Started(SessionInfo),
    /// Not in `Stopped`; nothing happened. Carries the current state.
    Unchanged(LifecycleState),
}

/// What `stop()` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    Unchanged(LifecycleState),
}

// ── Coordinator ──────────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<CoordinatorInner>`. Does not touch the
/// radio until [`start()`](Self::start).
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    config: CoordinatorConfig,
    network: Arc<dyn NetworkController>,
    resolver: CapabilityResolver,
    store: Arc<DataStore>,
    translator: CommandTranslator,
    lifecycle: Arc<watch::Sender<LifecycleState>>,
    event_tx: broadcast::Sender<Arc<DomainEvent>>,
    session: Mutex<Option<Session>>,
    pairing: Arc<Mutex<PairingState>>,
}

/// Background work tied to one running session.
struct Session {
    info: SessionInfo,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

#[derive(Default)]
struct PairingState {
    open: Option<OpenWindow>,
    /// Bumped on every change so a stale expiry timer never closes a
    /// newer window.
    generation: u64,
}

struct OpenWindow {
    opened_at: Instant,
    duration: u8,
    cancel: CancellationToken,
    expiry: JoinHandle<()>,
}

impl OpenWindow {
    fn snapshot(&self) -> PairingWindow {
        let elapsed = self.opened_at.elapsed().as_secs();
        let remaining = u64::from(self.duration).saturating_sub(elapsed);
        match u8::try_from(remaining) {
            Ok(0) | Err(_) => PairingWindow::closed(),
            Ok(secs) => PairingWindow::open(secs),
        }
    }
}

impl Coordinator {
    pub fn new(
        config: CoordinatorConfig,
        network: Arc<dyn NetworkController>,
        catalog: Arc<dyn CapabilityCatalog>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_buffer.max(1));
        let (lifecycle, _) = watch::channel(LifecycleState::Stopped);
        let lifecycle = Arc::new(lifecycle);
        let store = Arc::new(DataStore::new(event_tx.clone()));
        let resolver = CapabilityResolver::new(catalog);
        let translator = CommandTranslator::new(
            Arc::clone(&network),
            resolver.clone(),
            Arc::clone(&store),
            lifecycle.subscribe(),
            config.request_timeout,
        );

        Self {
            inner: Arc::new(CoordinatorInner {
                config,
                network,
                resolver,
                store,
                translator,
                lifecycle,
                event_tx,
                session: Mutex::new(None),
                pairing: Arc::new(Mutex::new(PairingState::default())),
            }),
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<DataStore> {
        &self.inner.store
    }

    pub fn translator(&self) -> &CommandTranslator {
        &self.inner.translator
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Bring the radio up, load the persisted device list and start
    /// routing network events.
    ///
    /// Only valid from `Stopped`; from any other state this is a no-op
    /// reporting the current state. On failure the coordinator returns
    /// to `Stopped` and the error is a classified `StartFailure`.
    pub async fn start(&self) -> Result<StartOutcome, CoreError> {
        let claimed = self.inner.lifecycle.send_if_modified(|state| {
            if *state == LifecycleState::Stopped {
                *state = LifecycleState::Starting;
                true
            } else {
                false
            }
        });
        if !claimed {
            let current = self.state();
            debug!(state = %current, "start ignored");
            return Ok(StartOutcome::Unchanged(current));
        }

        info!(port = %self.inner.config.network.port.display(), "starting coordinator");
        let info = match self.bring_up().await {
            Ok(info) => info,
            Err(err) => {
                self.inner.store.clear();
                self.inner.lifecycle.send_replace(LifecycleState::Stopped);
                warn!(error = %err, "coordinator failed to start");
                return Err(err);
            }
        };

        let running = self.inner.lifecycle.send_if_modified(|state| {
            if *state == LifecycleState::Starting {
                *state = LifecycleState::Running;
                true
            } else {
                false
            }
        });
        if !running {
            warn!(state = %self.state(), "coordinator left Starting before it was up");
            return Ok(StartOutcome::Started(info));
        }

        info!(
            coordinator = %info.coordinator,
            devices = self.inner.store.device_count(),
            "coordinator running"
        );

        if let Some(seconds) = self.inner.config.permit_join_on_start {
            if let Err(e) = self.set_pairing_window(true, u32::from(seconds)).await {
                warn!(error = %e, "could not open pairing window on start");
            }
        }

        Ok(StartOutcome::Started(info))
    }

    /// Stop the session: cancel background tasks, close the pairing
    /// window, stop the radio and drop every in-memory device and state.
    ///
    /// Valid from `Running` or `Faulted`; otherwise a no-op.
    pub async fn stop(&self) -> StopOutcome {
        let claimed = self.inner.lifecycle.send_if_modified(|state| {
            if matches!(state, LifecycleState::Running | LifecycleState::Faulted) {
                *state = LifecycleState::Stopping;
                true
            } else {
                false
            }
        });
        if !claimed {
            let current = self.state();
            debug!(state = %current, "stop ignored");
            return StopOutcome::Unchanged(current);
        }

        info!("stopping coordinator");
        if let Some(session) = self.inner.session.lock().await.take() {
            session.cancel.cancel();
            for handle in session.tasks {
                let _ = handle.await;
            }
        }

        self.close_pairing().await;

        if let Err(e) = self.bounded(self.inner.network.stop()).await {
            warn!(error = %e, "network stop failed (non-fatal)");
        }

        self.inner.store.clear();
        self.inner.lifecycle.send_replace(LifecycleState::Stopped);
        info!("coordinator stopped");
        StopOutcome::Stopped
    }

    /// Start the radio, load devices and spawn the event router.
    async fn bring_up(&self) -> Result<SessionInfo, CoreError> {
        let inner = &self.inner;

        // Subscribe before starting so nothing emitted during load is lost.
        let raw_events = inner.network.subscribe();

        let info = self
            .bounded(inner.network.start(&inner.config.network))
            .await
            .map_err(|e| CoreError::start_failure(&e))?;

        let records = match self.bounded(inner.network.list_known_devices()).await {
            Ok(records) => records,
            Err(e) => {
                if let Err(stop_err) = self.bounded(inner.network.stop()).await {
                    warn!(error = %stop_err, "network stop after failed load");
                }
                return Err(CoreError::start_failure(&e));
            }
        };

        inner.store.set_coordinator(Some(info.coordinator));
        for record in records.iter().filter(|r| r.ieee != info.coordinator) {
            let mut device = convert::device_from_record(record, DeviceKind::Unknown);
            device.kind = inner.resolver.kind_of(&device);
            inner.store.upsert_device(device);
        }
        debug!(devices = inner.store.device_count(), "device directory loaded");

        let cancel = CancellationToken::new();
        let router = EventRouter::new(
            Arc::clone(&inner.store),
            inner.resolver.clone(),
            Arc::clone(&inner.lifecycle),
            inner.event_tx.clone(),
        );
        let router_task = tokio::spawn(router.run(raw_events, cancel.clone()));

        *inner.session.lock().await = Some(Session {
            info: info.clone(),
            cancel,
            tasks: vec![router_task],
        });
        Ok(info)
    }

    // ── Pairing window ───────────────────────────────────────────────

    /// Open (duration clamped to 1..=254 s) or close the pairing window.
    /// Re-opening replaces the previous timer.
    pub async fn set_pairing_window(
        &self,
        enabled: bool,
        seconds: u32,
    ) -> Result<PairingWindow, CoreError> {
        self.ensure_running()?;
        let inner = &self.inner;
        let mut pairing = inner.pairing.lock().await;

        let duration = if enabled { clamp_duration(seconds) } else { 0 };
        self.bounded(inner.network.set_pairing_window(duration))
            .await
            .map_err(|e| self.lift("pairing window", e))?;

        if let Some(previous) = pairing.open.take() {
            previous.cancel.cancel();
        }
        pairing.generation += 1;

        let window = if enabled {
            let cancel = CancellationToken::new();
            let expiry = tokio::spawn(expire_pairing(
                Arc::clone(&inner.pairing),
                inner.event_tx.clone(),
                pairing.generation,
                duration,
                cancel.clone(),
            ));
            pairing.open = Some(OpenWindow {
                opened_at: Instant::now(),
                duration,
                cancel,
                expiry,
            });
            PairingWindow::open(duration)
        } else {
            PairingWindow::closed()
        };
        drop(pairing);

        info!(enabled = window.enabled, seconds = window.remaining_secs, "pairing window changed");
        self.publish(DomainEvent::PairingWindowChanged { window });
        Ok(window)
    }

    pub async fn pairing_window(&self) -> Result<PairingWindow, CoreError> {
        self.ensure_running()?;
        let pairing = self.inner.pairing.lock().await;
        Ok(pairing
            .open
            .as_ref()
            .map_or_else(PairingWindow::closed, OpenWindow::snapshot))
    }

    /// Reset the window on stop, announcing it if it was open.
    async fn close_pairing(&self) {
        let open = {
            let mut pairing = self.inner.pairing.lock().await;
            pairing.generation += 1;
            pairing.open.take()
        };
        if let Some(open) = open {
            open.cancel.cancel();
            let _ = open.expiry.await;
            self.publish(DomainEvent::PairingWindowChanged {
                window: PairingWindow::closed(),
            });
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Every known device except the coordinator radio.
    pub fn devices(&self) -> Result<Arc<Vec<Arc<Device>>>, CoreError> {
        self.ensure_running()?;
        Ok(self.inner.store.devices())
    }

    pub fn device(&self, ieee: Ieee) -> Result<Arc<Device>, CoreError> {
        self.ensure_running()?;
        self.inner.store.device(ieee)
    }

    /// Cached state; no radio round-trip.
    pub fn device_state(&self, ieee: Ieee) -> Result<DeviceState, CoreError> {
        self.ensure_running()?;
        self.inner.store.device(ieee)?;
        Ok(self.inner.store.state(ieee))
    }

    pub fn capabilities(&self, ieee: Ieee) -> Result<Capabilities, CoreError> {
        self.ensure_running()?;
        let device = self.inner.store.device(ieee)?;
        if !device.interview_completed {
            return Err(CoreError::CapabilityUnknown {
                identifier: ieee.to_string(),
            });
        }
        Ok(self.inner.resolver.resolve(&device))
    }

    /// Definitions the resolver consults. Available in any state.
    pub fn catalog_definitions(&self) -> Vec<Arc<Definition>> {
        self.inner.resolver.catalog().definitions()
    }

    /// Radio details of the running session.
    pub async fn session(&self) -> Option<SessionInfo> {
        self.inner
            .session
            .lock()
            .await
            .as_ref()
            .map(|s| s.info.clone())
    }

    // ── Device commands ──────────────────────────────────────────────

    pub async fn turn_on(&self, ieee: Ieee) -> Result<(), CoreError> {
        self.inner.translator.on_off(ieee, OnOffAction::On).await
    }

    pub async fn turn_off(&self, ieee: Ieee) -> Result<(), CoreError> {
        self.inner.translator.on_off(ieee, OnOffAction::Off).await
    }

    pub async fn toggle(&self, ieee: Ieee) -> Result<(), CoreError> {
        self.inner.translator.on_off(ieee, OnOffAction::Toggle).await
    }

    pub async fn set_brightness(&self, ieee: Ieee, percent: f64) -> Result<(), CoreError> {
        self.inner.translator.set_brightness(ieee, percent).await
    }

    pub async fn set_color_temperature(&self, ieee: Ieee, value: u32) -> Result<(), CoreError> {
        self.inner.translator.set_color_temperature(ieee, value).await
    }

    pub async fn set_color(&self, ieee: Ieee, color: &ColorSpec) -> Result<(), CoreError> {
        self.inner.translator.set_color(ieee, color).await
    }

    pub async fn turn_on_light(&self, ieee: Ieee, options: &LightOptions) -> Result<(), CoreError> {
        self.inner.translator.turn_on_light(ieee, options).await
    }

    pub async fn read_state(&self, ieee: Ieee) -> Result<DeviceState, CoreError> {
        self.inner.translator.read_state(ieee).await
    }

    pub async fn read_power(&self, ieee: Ieee) -> Result<DeviceState, CoreError> {
        self.inner.translator.read_power(ieee).await
    }

    /// Execute any [`Command`] uniformly.
    pub async fn execute(&self, cmd: Command) -> Result<CommandResult, CoreError> {
        route_command(self, cmd).await
    }

    // ── One-shot convenience ─────────────────────────────────────────

    /// One-shot: start, run closure, stop. The coordinator is stopped
    /// whether or not the closure succeeds.
    pub async fn oneshot<F, Fut, T>(
        config: CoordinatorConfig,
        network: Arc<dyn NetworkController>,
        catalog: Arc<dyn CapabilityCatalog>,
        f: F,
    ) -> Result<T, CoreError>
    where
        F: FnOnce(Coordinator) -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let coordinator = Coordinator::new(config, network, catalog);
        coordinator.start().await?;
        let result = f(coordinator.clone()).await;
        coordinator.stop().await;
        result
    }

    // ── State observation ────────────────────────────────────────────

    pub fn state(&self) -> LifecycleState {
        *self.inner.lifecycle.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<LifecycleState> {
        self.inner.lifecycle.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.inner.event_tx.subscribe()
    }

    pub fn event_stream(&self) -> EventStream {
        EventStream::new(self.events())
    }

    pub fn devices_stream(&self) -> DeviceStream {
        self.inner.store.subscribe_devices()
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn ensure_running(&self) -> Result<(), CoreError> {
        match self.state() {
            LifecycleState::Running => Ok(()),
            state => Err(CoreError::NotRunning { state }),
        }
    }

    fn publish(&self, event: DomainEvent) {
        let _ = self.inner.event_tx.send(Arc::new(event));
    }

    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, TransportError>>,
    ) -> Result<T, TransportError> {
        translator::within(self.inner.config.request_timeout, fut).await
    }

    fn lift(&self, target: &str, err: TransportError) -> CoreError {
        translator::lift_transport(target.to_owned(), self.inner.config.request_timeout, err)
    }
}

// ── Background tasks ─────────────────────────────────────────────────

/// Close the window once its duration elapses, unless cancelled or
/// superseded first.
async fn expire_pairing(
    pairing: Arc<Mutex<PairingState>>,
    events: broadcast::Sender<Arc<DomainEvent>>,
    generation: u64,
    duration: u8,
    cancel: CancellationToken,
) {
    tokio::select! {
        biased;
        () = cancel.cancelled() => return,
        () = tokio::time::sleep(Duration::from_secs(u64::from(duration))) => {}
    }

    let mut state = pairing.lock().await;
    if state.generation != generation || state.open.is_none() {
        return;
    }
    state.open = None;
    drop(state);

    debug!("pairing window expired");
    let _ = events.send(Arc::new(DomainEvent::PairingWindowChanged {
        window: PairingWindow::closed(),
    }));
}

// ── Command routing ──────────────────────────────────────────────────

async fn route_command(
    coordinator: &Coordinator,
    cmd: Command,
) -> Result<CommandResult, CoreError> {
    let translator = coordinator.translator();

    match cmd {
        Command::OnOff { ieee, action } => {
            translator.on_off(ieee, action).await?;
            Ok(CommandResult::Ok)
        }
        Command::SetBrightness { ieee, percent } => {
            translator.set_brightness(ieee, percent).await?;
            Ok(CommandResult::Ok)
        }
        Command::SetColorTemperature { ieee, value } => {
            translator.set_color_temperature(ieee, value).await?;
            Ok(CommandResult::Ok)
        }
        Command::SetColor { ieee, color } => {
            translator.set_color(ieee, &color).await?;
            Ok(CommandResult::Ok)
        }
        Command::TurnOnLight { ieee, options } => {
            translator.turn_on_light(ieee, &options).await?;
            Ok(CommandResult::Ok)
        }
        Command::ReadState { ieee } => translator.read_state(ieee).await.map(CommandResult::State),
        Command::ReadPower { ieee } => translator.read_power(ieee).await.map(CommandResult::State),
        Command::SetPairingWindow { enabled, seconds } => coordinator
            .set_pairing_window(enabled, seconds)
            .await
            .map(CommandResult::PairingWindow),
    }
}
