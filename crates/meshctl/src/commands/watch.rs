//! Live event stream.

use std::time::Duration;

use owo_colors::Style;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use meshctl_core::{Coordinator, DomainEvent};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::util;

/// One line per event for table output.
fn summarize(event: &DomainEvent) -> String {
    match event {
        DomainEvent::DeviceJoined { device } | DomainEvent::DeviceAnnounced { device } => {
            format!("{} {}", device.ieee, device.label())
        }
        DomainEvent::DeviceLeft { ieee } => ieee.to_string(),
        DomainEvent::DeviceInterview { ieee, status, device } => match device {
            Some(d) => format!("{ieee} {status} ({})", d.kind),
            None => format!("{ieee} {status}"),
        },
        DomainEvent::MessageReceived {
            ieee,
            endpoint,
            cluster,
            kind,
            data,
        } => format!("{ieee} ep{endpoint} {cluster} {kind} {data}"),
        DomainEvent::StateChanged { ieee, state } => {
            format!("{ieee} {}", util::state_pairs(state).replace('\n', " "))
        }
        DomainEvent::AdapterDisconnected => "adapter lost".into(),
        DomainEvent::PairingWindowChanged { window } if window.enabled => {
            format!("open {}s", window.remaining_secs)
        }
        DomainEvent::PairingWindowChanged { .. } => "closed".into(),
    }
}

fn kind_style(event: &DomainEvent) -> Style {
    match event {
        DomainEvent::DeviceJoined { .. } | DomainEvent::DeviceAnnounced { .. } => {
            Style::new().green().bold()
        }
        DomainEvent::DeviceLeft { .. } | DomainEvent::AdapterDisconnected => {
            Style::new().red().bold()
        }
        DomainEvent::StateChanged { .. } => Style::new().cyan(),
        DomainEvent::PairingWindowChanged { .. } => Style::new().yellow(),
        DomainEvent::DeviceInterview { .. } | DomainEvent::MessageReceived { .. } => {
            Style::new().dimmed()
        }
    }
}

fn render(event: &DomainEvent, format: OutputFormat, color: bool) -> Result<String, CliError> {
    match format {
        OutputFormat::Table => {
            let at = chrono::Local::now().format("%H:%M:%S");
            let kind = output::paint(&format!("{:<22}", event.kind()), kind_style(event), color);
            Ok(format!("{at} {kind} {}", summarize(event)))
        }
        // One document per event so the stream stays line-oriented.
        OutputFormat::Json | OutputFormat::JsonCompact => output::render_json(event, true),
        OutputFormat::Yaml => output::render_single(format, event, summarize, summarize)
            .map(|doc| format!("---\n{}", doc.trim_end())),
        OutputFormat::Plain => Ok(format!("{} {}", event.kind(), summarize(event))),
    }
}

pub async fn handle(
    coordinator: &Coordinator,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let mut events = coordinator.events();
    let format = global.format();
    let color = output::should_color(global.color_mode());

    if let Some(seconds) = args.permit_join {
        coordinator.set_pairing_window(true, seconds).await?;
    }

    let deadline = async {
        match args.seconds {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending::<()>().await,
        }
    };
    // Created once so a signal arriving mid-render is not lost.
    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(deadline, interrupted);

    loop {
        tokio::select! {
            biased;
            _ = &mut interrupted => break,
            () = &mut deadline => break,
            received = events.recv() => match received {
                Ok(event) => {
                    let line = render(&event, format, color)?;
                    output::print_output(&line, global.quiet);
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "event stream lagged");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshctl_core::{Ieee, PairingWindow};

    #[test]
    fn plain_lines_lead_with_the_event_kind() {
        let event = DomainEvent::DeviceLeft {
            ieee: Ieee::new(0x0017_8801_0a1b_2c3d),
        };
        let line = render(&event, OutputFormat::Plain, false).unwrap_or_default();
        assert_eq!(line, "device-left 0x001788010a1b2c3d");
    }

    #[test]
    fn json_events_are_single_line_and_tagged() {
        let event = DomainEvent::PairingWindowChanged {
            window: PairingWindow::open(60),
        };
        let line = render(&event, OutputFormat::Json, false).unwrap_or_default();
        assert!(!line.contains('\n'));
        assert!(line.contains(r#""type":"pairing_window_changed""#), "{line}");
    }

    #[test]
    fn closed_window_summary() {
        let event = DomainEvent::PairingWindowChanged {
            window: PairingWindow::closed(),
        };
        assert_eq!(summarize(&event), "closed");
    }
}
