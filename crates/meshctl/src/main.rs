mod cli;
mod commands;
mod config;
mod error;
mod output;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use meshctl_core::{Coordinator, NetworkController, SimulatedNetwork, StaticCatalog};

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

/// `RUST_LOG` wins over `-v`. Logs go to stderr; stdout is for output.
fn init_tracing(verbosity: u8) {
    let level = ["warn", "info", "debug"]
        .get(usize::from(verbosity))
        .copied()
        .unwrap_or("trace");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let Cli {
        mut global,
        command,
    } = cli;
    // A broken config file only matters to commands that read it.
    let loaded = meshctl_config::load_config();
    if let Ok(ref cfg) = loaded {
        config::apply_defaults(&mut global, cfg);
    }

    match command {
        // Local files only
        Command::Config(args) => commands::config_cmd::handle(args, &global),

        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "meshctl", &mut std::io::stdout());
            Ok(())
        }

        // The catalog is consulted without starting the radio
        Command::Catalog(args) => {
            let catalog = load_catalog(&global, &loaded?)?;
            commands::catalog::handle(&catalog, args, &global)
        }

        // Everything else is one-shot: start, act, stop
        cmd => {
            let resolved = config::resolve(&global, &loaded?)?;
            let catalog = StaticCatalog::load(resolved.catalog.as_deref())?;
            let network: Arc<dyn NetworkController> = Arc::new(
                SimulatedNetwork::demo().backed_by(resolved.coordinator.network.port.clone()),
            );
            let coordinator = Coordinator::new(resolved.coordinator, network, Arc::new(catalog));

            coordinator.start().await?;
            tracing::debug!(command = ?cmd, "dispatching command");
            let result = commands::dispatch(cmd, &coordinator, &global).await;
            coordinator.stop().await;
            result
        }
    }
}

/// Built-in catalog plus the `--catalog` file or the active profile's.
fn load_catalog(
    global: &cli::GlobalOpts,
    cfg: &meshctl_config::Config,
) -> Result<StaticCatalog, CliError> {
    let extra = global.catalog.clone().or_else(|| {
        cfg.profile(global.profile.as_deref())
            .ok()
            .and_then(|(_, p)| p.catalog.clone())
    });
    Ok(StaticCatalog::load(extra.as_deref())?)
}
