//! Config subcommand handlers.

use meshctl_config::{self as config, Config};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

const REDACTED: &str = "<redacted>";

/// The loaded config with plaintext network keys masked.
fn redacted(mut cfg: Config) -> Config {
    for profile in cfg.profiles.values_mut() {
        if profile.network_key.is_some() {
            profile.network_key = Some(REDACTED.into());
        }
    }
    cfg
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let cfg = redacted(config::load_config()?);
            let out = match global.format() {
                // TOML is the file's own format; nothing to tabulate.
                OutputFormat::Table => toml::to_string_pretty(&cfg)
                    .map_err(|e| CliError::Render(e.to_string()))?,
                format => output::render_single(format, &cfg, |_| String::new(), |c| {
                    c.profiles.keys().cloned().collect::<Vec<_>>().join("\n")
                })?,
            };
            output::print_output(out.trim_end(), global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Init { force } => {
            let path = config::config_path();
            if path.exists() && !force {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }
            let port = global
                .port
                .clone()
                .unwrap_or_else(config::default_network_path);
            let written = config::save_config(&Config::starter(port.clone()))?;
            if !global.quiet {
                eprintln!("Wrote {}", written.display());
                eprintln!("Profile 'default' uses port {}", port.display());
            }
            Ok(())
        }
    }
}
