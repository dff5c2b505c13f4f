//! Pairing window handlers.

use meshctl_core::{Coordinator, PairingWindow};

use crate::cli::{GlobalOpts, PairingArgs, PairingCommand};
use crate::error::CliError;
use crate::output;

fn detail(w: &PairingWindow) -> String {
    if w.enabled {
        format!("Pairing:     open ({}s remaining)", w.remaining_secs)
    } else {
        "Pairing:     closed".into()
    }
}

fn plain(w: &PairingWindow) -> String {
    if w.enabled {
        w.remaining_secs.to_string()
    } else {
        "closed".into()
    }
}

pub async fn handle(
    coordinator: &Coordinator,
    args: PairingArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let window = match args.command {
        PairingCommand::Status => coordinator.pairing_window().await?,
        PairingCommand::Open { duration } => coordinator.set_pairing_window(true, duration).await?,
        PairingCommand::Close => coordinator.set_pairing_window(false, 0).await?,
    };
    let out = output::render_single(global.format(), &window, detail, plain)?;
    output::print_output(&out, global.quiet);
    Ok(())
}
