#![allow(clippy::unwrap_used)]

// Integration tests: a Coordinator driven against the simulated
// Network Controller, observed through its transport-call log.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::sync::broadcast;

use meshctl_core::model::cluster::{self, command};
use meshctl_core::transport::simulator::{Fault, SIMULATED_COORDINATOR};
use meshctl_core::transport::TransportCall;
use meshctl_core::translator::color;
use meshctl_core::{
    Attribute, ColorSpec, Command, CommandResult, Coordinator, CoordinatorConfig, CoreError,
    DeviceKind, DomainEvent, Ieee, InterviewStatus, Intent, LifecycleState, LightOptions,
    NetworkController, OnOff, PairingWindow, SimDevice, SimulatedNetwork, StartFailureKind,
    StartOutcome, StaticCatalog, StopOutcome,
};

const PLUG: Ieee = Ieee::new(0x0015_8d00_0123_4567);
const COLOR_LIGHT: Ieee = Ieee::new(0x0017_8801_0a1b_2c3d);
const DIMMABLE: Ieee = Ieee::new(0x0017_8801_0a1b_2c3e);
const METER: Ieee = Ieee::new(0xa4c1_3800_1122_3344);

// ── Harness ──────────────────────────────────────────────────────────

fn build(network: SimulatedNetwork) -> (Coordinator, Arc<SimulatedNetwork>) {
    let network = Arc::new(network);
    let coordinator = Coordinator::new(
        CoordinatorConfig::default(),
        Arc::clone(&network) as Arc<dyn NetworkController>,
        Arc::new(StaticCatalog::builtin().unwrap()),
    );
    (coordinator, network)
}

async fn running(network: SimulatedNetwork) -> (Coordinator, Arc<SimulatedNetwork>) {
    let (coordinator, network) = build(network);
    coordinator.start().await.unwrap();
    (coordinator, network)
}

fn home() -> SimulatedNetwork {
    SimulatedNetwork::new()
        .with_device(SimDevice::plug(PLUG))
        .with_device(SimDevice::color_light(COLOR_LIGHT))
        .with_device(SimDevice::dimmable_light(DIMMABLE))
        .with_device(SimDevice::metering_plug(METER))
}

/// Wait for the first event matching `pred`.
async fn wait_for<F>(rx: &mut broadcast::Receiver<Arc<DomainEvent>>, mut pred: F) -> Arc<DomainEvent>
where
    F: FnMut(&DomainEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = rx.recv().await.unwrap();
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .unwrap()
}

// ── Capability gating ────────────────────────────────────────────────

#[tokio::test]
async fn unsupported_intents_issue_no_commands() {
    let (c, net) = running(home()).await;

    let attempts = [
        (c.set_brightness(PLUG, 50.0).await, Intent::Brightness),
        (c.set_color_temperature(PLUG, 300).await, Intent::ColorTemperature),
        (c.set_color(PLUG, &ColorSpec::hex("#ff0000")).await, Intent::Color),
        (c.read_power(PLUG).await.map(|_| ()), Intent::ReadPower),
    ];
    for (result, expected) in attempts {
        match result {
            Err(CoreError::UnsupportedAction { identifier, intent }) => {
                assert_eq!(identifier, PLUG.to_string());
                assert_eq!(intent, expected);
            }
            other => panic!("expected UnsupportedAction for {expected}, got {other:?}"),
        }
    }
    assert!(net.calls().await.is_empty());
}

#[tokio::test]
async fn on_off_without_an_endpoint_for_the_cluster_is_unsupported() {
    // The catalog says E1603 switches, but this unit only carries level control.
    let odd = SimDevice::new(PLUG, "E1603", "IKEA of Sweden", &[cluster::LEVEL_CONTROL]);
    let (c, net) = running(SimulatedNetwork::new().with_device(odd)).await;

    for result in [c.turn_on(PLUG).await, c.toggle(PLUG).await] {
        match result {
            Err(CoreError::UnsupportedAction { intent, .. }) => assert_eq!(intent, Intent::OnOff),
            other => panic!("expected UnsupportedAction, got {other:?}"),
        }
    }
    assert!(net.calls().await.is_empty());
}

#[tokio::test]
async fn pending_interview_means_unknown_capabilities() {
    let (c, net) = running(SimulatedNetwork::new().with_device(SimDevice::plug(PLUG).interview_pending())).await;

    assert_eq!(c.device(PLUG).unwrap().kind, DeviceKind::Unknown);
    assert!(matches!(
        c.turn_on(PLUG).await,
        Err(CoreError::CapabilityUnknown { .. })
    ));
    assert!(matches!(
        c.capabilities(PLUG),
        Err(CoreError::CapabilityUnknown { .. })
    ));
    assert!(net.calls().await.is_empty());
}

#[tokio::test]
async fn unknown_device_is_not_found() {
    let (c, net) = running(home()).await;
    let stranger = Ieee::new(0xdead_beef_0000_0001);
    assert!(matches!(
        c.turn_off(stranger).await,
        Err(CoreError::DeviceNotFound { .. })
    ));
    assert!(net.calls().await.is_empty());
}

#[tokio::test]
async fn commands_before_start_are_not_running() {
    let (c, net) = build(home());
    let err = c.turn_on(PLUG).await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::NotRunning {
            state: LifecycleState::Stopped
        }
    ));
    assert!(net.calls().await.is_empty());
}

// ── Translation ──────────────────────────────────────────────────────

#[tokio::test]
async fn brightness_is_rescaled_and_clamped() {
    let (c, net) = running(home().without_reports()).await;

    let cases = [
        (0.0, 0),
        (25.0, 64),
        (50.0, 127),
        (80.0, 203),
        (100.0, 254),
        (-10.0, 0),
        (150.0, 254),
    ];
    for (percent, native) in cases {
        net.clear_calls().await;
        c.set_brightness(DIMMABLE, percent).await.unwrap();

        let commands = net.commands().await;
        assert_eq!(commands.len(), 1, "{percent}");
        assert_eq!(commands[0].cluster, cluster::LEVEL_CONTROL);
        assert_eq!(commands[0].command, command::MOVE_TO_LEVEL);
        assert_eq!(commands[0].payload["level"], json!(native), "{percent}");
        assert_eq!(c.device_state(DIMMABLE).unwrap().brightness, Some(native));
    }
}

#[tokio::test]
async fn color_temperature_accepts_mireds_or_kelvin() {
    let (c, net) = running(home().without_reports()).await;

    for (input, mireds) in [(4000, 250), (250, 250), (2700, 370), (500, 500)] {
        net.clear_calls().await;
        c.set_color_temperature(COLOR_LIGHT, input).await.unwrap();
        let commands = net.commands().await;
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].command, command::MOVE_TO_COLOR_TEMP);
        assert_eq!(commands[0].payload["colortemp"], json!(mireds), "{input}");
    }
}

#[tokio::test]
async fn hex_takes_precedence_over_rgb() {
    let (c, net) = running(home().without_reports()).await;

    let spec = ColorSpec {
        hex: Some("#FF5500".into()),
        ..ColorSpec::rgb(1, 2, 3)
    };
    c.set_color(COLOR_LIGHT, &spec).await.unwrap();

    let commands = net.commands().await;
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].command, command::MOVE_TO_COLOR);

    let from_hex = color::select(&ColorSpec::hex("#FF5500")).unwrap().unwrap();
    let from_rgb = color::select(&ColorSpec::rgb(1, 2, 3)).unwrap().unwrap();
    assert_eq!(commands[0].payload, from_hex.payload());
    assert_ne!(commands[0].payload, from_rgb.payload());
}

#[tokio::test]
async fn hue_saturation_uses_its_own_command() {
    let (c, net) = running(home().without_reports()).await;

    c.set_color(COLOR_LIGHT, &ColorSpec::hue_saturation(180.0, 50.0))
        .await
        .unwrap();

    let commands = net.commands().await;
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].command, command::MOVE_TO_HUE_AND_SATURATION);
    assert_eq!(commands[0].payload["hue"], json!(127));
    assert_eq!(commands[0].payload["saturation"], json!(127));
}

#[tokio::test]
async fn empty_color_is_a_no_op() {
    let (c, net) = running(home()).await;
    c.set_color(COLOR_LIGHT, &ColorSpec::default()).await.unwrap();
    c.set_color(
        COLOR_LIGHT,
        &ColorSpec {
            hue: Some(90.0),
            ..ColorSpec::default()
        },
    )
    .await
    .unwrap();
    assert!(net.calls().await.is_empty());
}

#[tokio::test]
async fn malformed_hex_fails_before_transport() {
    let (c, net) = running(home()).await;
    let err = c
        .set_color(COLOR_LIGHT, &ColorSpec::hex("#12"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidArgument { .. }));
    assert!(net.calls().await.is_empty());
}

#[tokio::test]
async fn turn_on_light_runs_steps_in_order() {
    let (c, net) = running(home().without_reports()).await;

    c.turn_on_light(
        COLOR_LIGHT,
        &LightOptions {
            brightness: Some(50.0),
            color_temp: Some(4000),
            color: Some(ColorSpec::hex("#00ff00")),
        },
    )
    .await
    .unwrap();

    let names: Vec<String> = net.commands().await.into_iter().map(|c| c.command).collect();
    assert_eq!(
        names,
        vec![
            command::ON,
            command::MOVE_TO_LEVEL,
            command::MOVE_TO_COLOR_TEMP,
            command::MOVE_TO_COLOR
        ]
    );

    let state = c.device_state(COLOR_LIGHT).unwrap();
    assert_eq!(state.state, Some(OnOff::On));
    assert_eq!(state.brightness, Some(127));
    assert_eq!(state.color_temp, Some(250));
    assert!(state.color.is_some());
}

#[tokio::test]
async fn turn_on_light_on_plug_keeps_the_on_step() {
    let (c, net) = running(home().without_reports()).await;

    let err = c
        .turn_on_light(
            PLUG,
            &LightOptions {
                brightness: Some(80.0),
                ..LightOptions::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::UnsupportedAction {
            intent: Intent::Brightness,
            ..
        }
    ));

    let commands = net.commands().await;
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].command, command::ON);

    let state = c.device_state(PLUG).unwrap();
    assert_eq!(state.attributes(), vec![Attribute::State]);
    assert_eq!(state.state, Some(OnOff::On));
}

// ── Reads ────────────────────────────────────────────────────────────

#[tokio::test]
async fn read_state_omits_unsupported_clusters() {
    let (c, _net) = running(
        home()
            .with_fault(COLOR_LIGHT, cluster::LEVEL_CONTROL, Fault::Unsupported)
            .with_fault(COLOR_LIGHT, cluster::COLOR_CONTROL, Fault::Unsupported),
    )
    .await;

    let state = c.read_state(COLOR_LIGHT).await.unwrap();
    assert_eq!(state.state, Some(OnOff::Off));
    assert_eq!(state.brightness, None);
    assert_eq!(state.color_temp, None);

    let keys: Vec<String> = serde_json::to_value(&state)
        .unwrap()
        .as_object()
        .unwrap()
        .keys()
        .cloned()
        .collect();
    assert_eq!(keys, vec!["state".to_owned()]);

    assert_eq!(c.device_state(COLOR_LIGHT).unwrap().state, Some(OnOff::Off));
}

#[tokio::test]
async fn read_state_issues_one_read_per_cluster() {
    let (c, net) = running(home()).await;

    let state = c.read_state(COLOR_LIGHT).await.unwrap();
    assert_eq!(state.brightness, Some(254));
    assert_eq!(state.color_temp, Some(370));

    let clusters: Vec<String> = net
        .calls()
        .await
        .into_iter()
        .filter_map(|call| match call {
            TransportCall::Read { cluster, .. } => Some(cluster),
            TransportCall::Command(_) => None,
        })
        .collect();
    assert_eq!(
        clusters,
        vec![cluster::ON_OFF, cluster::LEVEL_CONTROL, cluster::COLOR_CONTROL]
    );
}

#[tokio::test]
async fn read_power_normalizes_units() {
    let (c, _net) = running(home()).await;
    let mut rx = c.events();

    let state = c.read_power(METER).await.unwrap();
    assert_eq!(state.power, Some(123.4));
    assert_eq!(state.voltage, Some(230.1));
    assert_eq!(state.current, Some(0.54));
    assert_eq!(state.energy, Some(42.5));

    let event = wait_for(&mut rx, |e| matches!(e, DomainEvent::StateChanged { .. })).await;
    let DomainEvent::StateChanged { ieee, state: cached } = event.as_ref() else {
        unreachable!()
    };
    assert_eq!(*ieee, METER);
    assert_eq!(cached.power, Some(123.4));
    assert!(cached.last_updated.is_some());
}

#[tokio::test]
async fn rejected_command_is_transport_failure() {
    let (c, _net) = running(home().with_fault(PLUG, cluster::ON_OFF, Fault::Reject)).await;
    let err = c.turn_on(PLUG).await.unwrap_err();
    assert!(matches!(err, CoreError::TransportFailure { .. }));
    assert!(c.device_state(PLUG).unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn timeout_leaves_cache_untouched() {
    let (c, net) = running(
        home()
            .without_reports()
            .with_fault(DIMMABLE, cluster::LEVEL_CONTROL, Fault::Unresponsive),
    )
    .await;

    let err = c.set_brightness(DIMMABLE, 50.0).await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::TransportTimeout {
            timeout_ms: 10_000,
            ..
        }
    ));
    assert_eq!(net.command_count().await, 1);

    // The on/off read answers, the level read stalls: nothing is merged.
    let err = c.read_state(DIMMABLE).await.unwrap_err();
    assert!(matches!(err, CoreError::TransportTimeout { .. }));
    assert!(c.device_state(DIMMABLE).unwrap().is_empty());
}

// ── Lifecycle ────────────────────────────────────────────────────────

#[tokio::test]
async fn second_start_changes_nothing() {
    let (c, _net) = running(home()).await;
    let before = c.devices().unwrap();

    let outcome = c.start().await.unwrap();
    assert_eq!(outcome, StartOutcome::Unchanged(LifecycleState::Running));

    let after = c.devices().unwrap();
    assert!(Arc::ptr_eq(&before, &after));
    assert_eq!(after.len(), 4);
}

#[tokio::test]
async fn directory_excludes_the_coordinator_radio() {
    let (c, _net) = running(
        home().with_device(SimDevice::new(SIMULATED_COORDINATOR, "CC2652", "Texas Instruments", &[])),
    )
    .await;
    let devices = c.devices().unwrap();
    assert_eq!(devices.len(), 4);
    assert!(devices.iter().all(|d| d.ieee != SIMULATED_COORDINATOR));
    assert_eq!(
        devices.iter().map(|d| d.ieee).collect::<Vec<_>>(),
        vec![PLUG, COLOR_LIGHT, DIMMABLE, METER]
    );
}

#[tokio::test]
async fn locked_port_is_classified_busy() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("network.json");
    std::fs::write(dir.path().join("network.json.lock"), b"").unwrap();

    let (c, _net) = build(home().backed_by(&path));
    let err = c.start().await.unwrap_err();

    assert!(matches!(
        err,
        CoreError::StartFailure {
            kind: StartFailureKind::PortBusy,
            ..
        }
    ));
    assert_eq!(
        err.remediation(),
        Some("check another process is not using this port")
    );
    assert_eq!(c.state(), LifecycleState::Stopped);
    assert!(matches!(c.devices(), Err(CoreError::NotRunning { .. })));
}

#[tokio::test]
async fn adapter_loss_faults_the_coordinator() {
    let (c, net) = running(home()).await;
    let mut state = c.subscribe_state();

    net.disconnect_adapter();
    state
        .wait_for(|s| *s == LifecycleState::Faulted)
        .await
        .unwrap();

    assert!(matches!(
        c.turn_on(PLUG).await,
        Err(CoreError::NotRunning {
            state: LifecycleState::Faulted
        })
    ));
    assert_eq!(c.stop().await, StopOutcome::Stopped);
    assert_eq!(c.state(), LifecycleState::Stopped);
}

#[tokio::test]
async fn oneshot_releases_the_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("network.json");

    for _ in 0..2 {
        let network: Arc<dyn NetworkController> = Arc::new(home().backed_by(&path));
        let power = Coordinator::oneshot(
            CoordinatorConfig::default(),
            network,
            Arc::new(StaticCatalog::builtin().unwrap()),
            |c| async move { c.read_power(METER).await },
        )
        .await
        .unwrap();
        assert_eq!(power.power, Some(123.4));
    }
    assert!(!dir.path().join("network.json.lock").exists());
}

#[tokio::test]
async fn execute_dispatches_every_command() {
    let (c, _net) = running(home().without_reports()).await;

    assert_eq!(
        c.execute(Command::OnOff {
            ieee: PLUG,
            action: meshctl_core::OnOffAction::On
        })
        .await
        .unwrap(),
        CommandResult::Ok
    );
    match c.execute(Command::ReadState { ieee: PLUG }).await.unwrap() {
        CommandResult::State(state) => assert_eq!(state.state, Some(OnOff::On)),
        other => panic!("unexpected {other:?}"),
    }
}

// ── Pairing window ───────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn pairing_window_clamps_and_expires() {
    let (c, net) = running(home()).await;
    let mut rx = c.events();

    let window = c.set_pairing_window(true, 1000).await.unwrap();
    assert_eq!(window, PairingWindow::open(254));
    assert_eq!(net.pairing_secs().await, 254);

    tokio::time::advance(Duration::from_secs(100)).await;
    assert_eq!(c.pairing_window().await.unwrap(), PairingWindow::open(154));

    let _opened = rx.recv().await.unwrap();
    let closed = rx.recv().await.unwrap();
    assert_eq!(
        *closed,
        DomainEvent::PairingWindowChanged {
            window: PairingWindow::closed()
        }
    );
    assert_eq!(c.pairing_window().await.unwrap(), PairingWindow::closed());
}

#[tokio::test(start_paused = true)]
async fn reopening_replaces_the_timer() {
    let (c, _net) = running(home()).await;

    c.set_pairing_window(true, 10).await.unwrap();
    tokio::time::advance(Duration::from_secs(5)).await;
    c.set_pairing_window(true, 20).await.unwrap();
    tokio::time::advance(Duration::from_secs(7)).await;

    assert_eq!(c.pairing_window().await.unwrap(), PairingWindow::open(13));

    let closed = c.set_pairing_window(false, 0).await.unwrap();
    assert_eq!(closed, PairingWindow::closed());
    assert_eq!(c.pairing_window().await.unwrap(), PairingWindow::closed());
}

// ── Event routing ────────────────────────────────────────────────────

#[tokio::test]
async fn join_resolves_before_the_interview_event() {
    let (c, net) = running(SimulatedNetwork::new()).await;
    let mut rx = c.events();

    net.join(SimDevice::dimmable_light(DIMMABLE)).await;

    let joined = rx.recv().await.unwrap();
    assert_eq!(joined.kind(), "device-joined");
    let event = wait_for(&mut rx, |e| {
        matches!(
            e,
            DomainEvent::DeviceInterview {
                status: InterviewStatus::Successful,
                ..
            }
        )
    })
    .await;

    let DomainEvent::DeviceInterview {
        device: Some(device),
        ..
    } = event.as_ref()
    else {
        panic!("unexpected {event:?}");
    };
    assert_eq!(device.kind, DeviceKind::Light);
    assert_eq!(*c.device(DIMMABLE).unwrap(), *device);

    c.set_brightness(DIMMABLE, 100.0).await.unwrap();
}

#[tokio::test]
async fn reports_for_unknown_devices_are_dropped() {
    let (c, net) = running(home()).await;
    let mut rx = c.events();

    let stranger = Ieee::new(0x0000_0000_0000_0bad);
    for ieee in [stranger, PLUG] {
        net.emit(meshctl_core::transport::NetworkEvent::Message {
            ieee,
            endpoint: 1,
            cluster: cluster::ON_OFF.into(),
            kind: "attributeReport".into(),
            data: json!({ "onOff": true }).as_object().cloned().unwrap(),
        });
    }

    let first = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.ieee(), Some(PLUG));
    assert_eq!(c.device_state(PLUG).unwrap().state, Some(OnOff::On));
}

#[tokio::test]
async fn leave_removes_device_and_state() {
    let (c, net) = running(home()).await;
    let mut rx = c.events();
    c.turn_on(PLUG).await.unwrap();

    net.leave(PLUG).await;
    wait_for(&mut rx, |e| matches!(e, DomainEvent::DeviceLeft { .. })).await;

    assert!(matches!(
        c.device(PLUG),
        Err(CoreError::DeviceNotFound { .. })
    ));
    assert!(c.store().state(PLUG).is_empty());
}

#[tokio::test]
async fn devices_stream_sees_joins() {
    let (c, net) = running(SimulatedNetwork::new()).await;
    let mut devices = c.devices_stream();
    assert!(devices.current().is_empty());

    net.join(SimDevice::plug(PLUG)).await;
    let snapshot = tokio::time::timeout(Duration::from_secs(5), devices.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].ieee, PLUG);
}

#[tokio::test]
async fn event_stream_carries_full_state_snapshots() {
    use futures_util::StreamExt;

    let (c, _net) = running(home()).await;
    let mut events = c.event_stream();

    tokio_test::assert_ok!(c.set_brightness(DIMMABLE, 50.0).await);
    tokio_test::assert_ok!(c.turn_on(DIMMABLE).await);

    // Snapshots are full: the one that reports ON still carries the
    // brightness merged before it.
    let snapshot = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = events.next().await.unwrap();
            if let DomainEvent::StateChanged { ieee, state } = &*event {
                if *ieee == DIMMABLE && state.state == Some(OnOff::On) {
                    return state.clone();
                }
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(snapshot.brightness, Some(127));
    tokio_test::assert_err!(c.set_brightness(PLUG, 10.0).await);
}

#[tokio::test]
async fn toggle_flips_only_a_known_state() {
    let quiet = SimulatedNetwork::new()
        .with_device(SimDevice::plug(PLUG))
        .without_reports();
    let (c, net) = running(quiet).await;

    // Nothing cached yet: the device flips, the cache stays unset.
    c.toggle(PLUG).await.unwrap();
    assert_eq!(c.device_state(PLUG).unwrap().state, None);
    assert_eq!(
        net.attribute(PLUG, cluster::ON_OFF, cluster::attribute::ON_OFF).await,
        Some(json!(true))
    );

    c.turn_on(PLUG).await.unwrap();
    c.toggle(PLUG).await.unwrap();
    assert_eq!(c.device_state(PLUG).unwrap().state, Some(OnOff::Off));
    assert_eq!(
        net.attribute(PLUG, cluster::ON_OFF, cluster::attribute::ON_OFF).await,
        Some(json!(false))
    );

    let toggles = net
        .commands()
        .await
        .iter()
        .filter(|cmd| cmd.command == command::TOGGLE)
        .count();
    assert_eq!(toggles, 2);
}
