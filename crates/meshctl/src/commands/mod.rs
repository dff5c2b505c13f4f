//! Command dispatch: bridges CLI args -> coordinator calls -> output formatting.

pub mod catalog;
pub mod config_cmd;
pub mod control;
pub mod devices;
pub mod pairing;
pub mod state;
pub mod util;
pub mod watch;

use meshctl_core::Coordinator;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a radio-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    coordinator: &Coordinator,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Devices(args) => devices::handle(coordinator, args, global).await,
        Command::State(args) => state::handle(coordinator, args, global).await,
        Command::Power(args) => state::power(coordinator, &args.device, global).await,
        Command::On(_)
        | Command::Off(_)
        | Command::Toggle(_)
        | Command::Brightness(_)
        | Command::ColorTemp(_)
        | Command::Color(_)
        | Command::LightOn(_) => control::handle(coordinator, cmd, global).await,
        Command::Pairing(args) => pairing::handle(coordinator, args, global).await,
        Command::Watch(args) => watch::handle(coordinator, args, global).await,
        // Config, Catalog and Completions are handled before dispatch
        Command::Config(_) | Command::Catalog(_) | Command::Completions(_) => Ok(()),
    }
}
