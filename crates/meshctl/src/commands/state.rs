//! State and power read handlers.

use meshctl_core::{Coordinator, DeviceState, Ieee};

use crate::cli::{GlobalOpts, StateArgs, StateCommand};
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn handle(
    coordinator: &Coordinator,
    args: StateArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        StateCommand::Get(arg) => {
            let ieee = util::resolve_device(coordinator, &arg.device)?;
            let state = coordinator.device_state(ieee)?;
            print_state(ieee, &state, global)
        }
        StateCommand::Read(arg) => {
            let ieee = util::resolve_device(coordinator, &arg.device)?;
            let state = coordinator.read_state(ieee).await?;
            print_state(ieee, &state, global)
        }
    }
}

/// Read power consumption; prints only the readings the device answered.
pub async fn power(
    coordinator: &Coordinator,
    device: &str,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let ieee = util::resolve_device(coordinator, device)?;
    let readings = coordinator.read_power(ieee).await?;
    print_state(ieee, &readings, global)
}

pub(super) fn print_state(
    ieee: Ieee,
    state: &DeviceState,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let out = output::render_single(
        global.format(),
        state,
        |s| {
            let lines = util::state_lines(s);
            if lines.is_empty() {
                format!("{ieee}: no state reported")
            } else {
                lines.join("\n")
            }
        },
        util::state_pairs,
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
