//! Capability catalog handlers.

use std::sync::Arc;

use tabled::Tabled;

use meshctl_core::catalog::{CapabilityCatalog, Definition};

use crate::cli::{CatalogArgs, CatalogCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct DefinitionRow {
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Vendor")]
    vendor: String,
    #[tabled(rename = "Exposes")]
    exposes: String,
    #[tabled(rename = "Description")]
    description: String,
}

impl From<&Arc<Definition>> for DefinitionRow {
    fn from(d: &Arc<Definition>) -> Self {
        let exposes = d
            .exposes
            .iter()
            .map(|e| {
                let features: Vec<String> =
                    e.features.iter().map(|f| f.name.to_string()).collect();
                if features.is_empty() {
                    e.kind.to_string()
                } else {
                    format!("{}({})", e.kind, features.join(","))
                }
            })
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            model: d.model.clone(),
            vendor: d.vendor.clone().unwrap_or_else(|| "*".into()),
            exposes,
            description: d.description.clone().unwrap_or_default(),
        }
    }
}

pub fn handle(
    catalog: &dyn CapabilityCatalog,
    args: CatalogArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        CatalogCommand::List => {
            let definitions = catalog.definitions();
            let out = output::render_list(
                global.format(),
                &definitions,
                |d| DefinitionRow::from(d),
                |d| d.model.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
