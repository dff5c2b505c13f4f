//! Shared helpers for command handlers.

use meshctl_core::{Color, Coordinator, DeviceState, Ieee};

use crate::error::CliError;

/// Resolve a device identifier (IEEE address or friendly name).
pub fn resolve_device(coordinator: &Coordinator, identifier: &str) -> Result<Ieee, CliError> {
    if let Ok(ieee) = identifier.parse::<Ieee>() {
        return Ok(ieee);
    }
    let devices = coordinator.devices()?;
    devices
        .iter()
        .find(|d| d.name.as_deref() == Some(identifier))
        .map(|d| d.ieee)
        .ok_or_else(|| CliError::NotFound {
            resource_type: "device".into(),
            identifier: identifier.into(),
            list_command: "devices list".into(),
        })
}

/// `name: value` lines for the attributes a state carries.
pub fn state_lines(state: &DeviceState) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(on) = state.state {
        lines.push(format!("State:       {on}"));
    }
    if let Some(level) = state.brightness {
        lines.push(format!("Brightness:  {level}/254"));
    }
    if let Some(mireds) = state.color_temp {
        lines.push(format!("Color temp:  {mireds} mired"));
    }
    if let Some(color) = state.color {
        lines.push(format!("Color:       {}", color_label(color)));
    }
    if let Some(w) = state.power {
        lines.push(format!("Power:       {w} W"));
    }
    if let Some(kwh) = state.energy {
        lines.push(format!("Energy:      {kwh} kWh"));
    }
    if let Some(v) = state.voltage {
        lines.push(format!("Voltage:     {v} V"));
    }
    if let Some(a) = state.current {
        lines.push(format!("Current:     {a} A"));
    }
    if let Some(at) = state.last_updated {
        lines.push(format!("Updated:     {}", at.format("%Y-%m-%d %H:%M:%S UTC")));
    }
    lines
}

/// `attr=value` pairs for plain output, in attribute order.
pub fn state_pairs(state: &DeviceState) -> String {
    let mut pairs = Vec::new();
    if let Some(on) = state.state {
        pairs.push(format!("state={on}"));
    }
    if let Some(level) = state.brightness {
        pairs.push(format!("brightness={level}"));
    }
    if let Some(mireds) = state.color_temp {
        pairs.push(format!("color_temp={mireds}"));
    }
    if let Some(color) = state.color {
        pairs.push(format!("color={}", color_label(color)));
    }
    let readings = [
        ("power", state.power),
        ("energy", state.energy),
        ("voltage", state.voltage),
        ("current", state.current),
    ];
    for (name, value) in readings {
        if let Some(v) = value {
            pairs.push(format!("{name}={v}"));
        }
    }
    pairs.join("\n")
}

pub fn color_label(color: Color) -> String {
    match color {
        Color::Xy { x, y } => format!("xy({x:.4}, {y:.4})"),
        Color::HueSaturation { hue, saturation } => {
            format!("hs({hue}, {saturation})")
        }
    }
}
