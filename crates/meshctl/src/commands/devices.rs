//! `devices list` and `devices get`.

use std::sync::Arc;

use serde::Serialize;
use tabled::Tabled;

use meshctl_core::{Coordinator, CoreError, Device, DeviceState, Intent};

use crate::cli::{DevicesArgs, DevicesCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "IEEE")]
    ieee: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Vendor")]
    vendor: String,
    #[tabled(rename = "Power")]
    power: String,
    #[tabled(rename = "Interview")]
    interview: String,
    #[tabled(rename = "Last seen")]
    last_seen: String,
}

impl From<&Arc<Device>> for DeviceRow {
    fn from(d: &Arc<Device>) -> Self {
        Self {
            ieee: d.ieee.to_string(),
            name: d.name.clone().unwrap_or_default(),
            kind: d.kind.to_string(),
            model: d.model_id.clone().unwrap_or_default(),
            vendor: d.manufacturer.clone().unwrap_or_default(),
            power: d.power_source.to_string(),
            interview: if d.interview_completed { "done" } else { "pending" }.into(),
            last_seen: d
                .last_seen
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default(),
        }
    }
}

/// `devices get` payload: the directory entry plus what it can do and
/// what we last heard from it.
#[derive(Serialize)]
struct DeviceDetail {
    #[serde(flatten)]
    device: Device,
    /// `None` until the interview completes.
    capabilities: Option<Vec<Intent>>,
    state: DeviceState,
}

fn detail(d: &DeviceDetail) -> String {
    let dev = &d.device;
    let mut lines = vec![
        format!("IEEE:        {}", dev.ieee),
        format!("Address:     {}", dev.network_address),
        format!("Name:        {}", dev.name.as_deref().unwrap_or("-")),
        format!("Kind:        {}", dev.kind),
        format!("Model:       {}", dev.model_id.as_deref().unwrap_or("-")),
        format!("Vendor:      {}", dev.manufacturer.as_deref().unwrap_or("-")),
        format!("Power:       {}", dev.power_source),
        format!(
            "Endpoints:   {}",
            dev.endpoints
                .iter()
                .map(|ep| ep.id.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ),
    ];
    match d.capabilities {
        Some(ref intents) if intents.is_empty() => lines.push("Supports:    -".into()),
        Some(ref intents) => lines.push(format!(
            "Supports:    {}",
            intents
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        )),
        None => lines.push("Supports:    (interview pending)".into()),
    }
    lines.extend(util::state_lines(&d.state));
    lines.join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    coordinator: &Coordinator,
    args: DevicesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        DevicesCommand::List => {
            let devices = coordinator.devices()?;
            let out = output::render_list(
                global.format(),
                devices.as_slice(),
                |d| DeviceRow::from(d),
                |d| d.ieee.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        DevicesCommand::Get(arg) => {
            let ieee = util::resolve_device(coordinator, &arg.device)?;
            let device = coordinator.device(ieee)?;
            let capabilities = match coordinator.capabilities(ieee) {
                Ok(caps) => Some(caps.intents().collect()),
                Err(CoreError::CapabilityUnknown { .. }) => None,
                Err(e) => return Err(e.into()),
            };
            let payload = DeviceDetail {
                device: Device::clone(&device),
                capabilities,
                state: coordinator.device_state(ieee)?,
            };
            let out = output::render_single(global.format(), &payload, detail, |d| {
                d.device.ieee.to_string()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
