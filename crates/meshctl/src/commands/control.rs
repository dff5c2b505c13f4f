//! Device control handlers: on/off, brightness, color temperature, color.
//!
//! Each maps onto one core [`Command`](CoreCommand) executed through the
//! coordinator; the cached state afterwards is printed.

use meshctl_core::{ColorSpec, Command as CoreCommand, Coordinator, LightOptions, OnOffAction};
use tracing::debug;

use crate::cli::{ColorOpts, Command, GlobalOpts};
use crate::error::CliError;

use super::{state, util};

impl ColorOpts {
    /// `None` when no representation was given.
    pub fn spec(&self) -> Option<ColorSpec> {
        let spec = ColorSpec {
            hex: self.hex.clone(),
            rgb: self.rgb,
            hue: self.hue,
            saturation: self.saturation,
        };
        (spec != ColorSpec::default()).then_some(spec)
    }
}

pub async fn handle(
    coordinator: &Coordinator,
    cmd: Command,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let resolve = |device: &str| util::resolve_device(coordinator, device);
    let on_off = |device: &str, action| {
        resolve(device).map(|ieee| (ieee, CoreCommand::OnOff { ieee, action }))
    };

    let (ieee, command) = match cmd {
        Command::On(arg) => on_off(&arg.device, OnOffAction::On)?,
        Command::Off(arg) => on_off(&arg.device, OnOffAction::Off)?,
        Command::Toggle(arg) => on_off(&arg.device, OnOffAction::Toggle)?,
        Command::Brightness(args) => {
            let ieee = resolve(&args.device)?;
            let percent = args.percent;
            (ieee, CoreCommand::SetBrightness { ieee, percent })
        }
        Command::ColorTemp(args) => {
            let ieee = resolve(&args.device)?;
            let value = args.value;
            (ieee, CoreCommand::SetColorTemperature { ieee, value })
        }
        Command::Color(args) => {
            let ieee = resolve(&args.device)?;
            // No color given is a successful no-op.
            let color = args.color.spec().unwrap_or_default();
            (ieee, CoreCommand::SetColor { ieee, color })
        }
        Command::LightOn(args) => {
            let ieee = resolve(&args.device)?;
            let options = LightOptions {
                brightness: args.brightness,
                color_temp: args.color_temp,
                color: args.color.spec(),
            };
            (ieee, CoreCommand::TurnOnLight { ieee, options })
        }
        other => {
            return Err(CliError::Validation {
                field: "command".into(),
                reason: format!("{other:?} is not a control command"),
            });
        }
    };

    debug!(?command, "executing");
    coordinator.execute(command).await?;

    state::print_state(ieee, &coordinator.device_state(ieee)?, global)
}
