// ── Capability catalog ──
//
// Per-model definitions of what a device exposes and how each semantic
// attribute binds to low-level clusters, commands and attributes. The
// resolver consults a catalog through the `CapabilityCatalog` trait;
// `StaticCatalog` is the TOML-backed implementation with a built-in
// definition set that user files can shadow by model.

use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::debug;

use crate::error::CoreError;
use crate::model::{Attribute, DeviceFingerprint};

const BUILTIN_CATALOG: &str = include_str!("builtin.toml");

// ── Definition types ─────────────────────────────────────────────────

/// Semantic type of a control surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ExposeType {
    Light,
    Switch,
    Numeric,
}

/// One attribute a control surface offers, with optional overrides of
/// its standard low-level binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub name: Attribute,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
    /// Command used to set the attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Attribute read to query the current value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expose {
    #[serde(rename = "type")]
    pub kind: ExposeType,
    #[serde(default)]
    pub features: Vec<Feature>,
}

/// Catalog entry for one device model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Definition {
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub exposes: Vec<Expose>,
}

impl Definition {
    pub fn has_expose(&self, kind: ExposeType) -> bool {
        self.exposes.iter().any(|e| e.kind == kind)
    }

    /// First feature named `name`, across all exposes.
    pub fn feature(&self, name: Attribute) -> Option<&Feature> {
        self.exposes
            .iter()
            .flat_map(|e| e.features.iter())
            .find(|f| f.name == name)
    }

    fn matches_vendor(&self, manufacturer: Option<&str>) -> bool {
        match (&self.vendor, manufacturer) {
            (None, _) => true,
            (Some(vendor), Some(m)) => vendor.eq_ignore_ascii_case(m),
            (Some(_), None) => false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    definitions: Vec<Definition>,
}

// ── Trait ────────────────────────────────────────────────────────────

/// Lookup of device definitions. Read-only at call time, so safe to
/// consult from concurrent translations.
pub trait CapabilityCatalog: Send + Sync {
    fn lookup(&self, fingerprint: DeviceFingerprint<'_>) -> Option<Arc<Definition>>;

    /// Every definition, for listing.
    fn definitions(&self) -> Vec<Arc<Definition>>;
}

// ── StaticCatalog ────────────────────────────────────────────────────

/// Definitions keyed by model id.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    by_model: IndexMap<String, Vec<Arc<Definition>>>,
}

impl StaticCatalog {
    /// The definitions compiled into the crate.
    pub fn builtin() -> Result<Self, CoreError> {
        Self::from_toml_str(BUILTIN_CATALOG)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, CoreError> {
        let file: CatalogFile = toml::from_str(raw).map_err(|e| CoreError::Config {
            message: format!("invalid catalog: {e}"),
        })?;
        Ok(Self::from_definitions(file.definitions))
    }

    pub fn from_path(path: &Path) -> Result<Self, CoreError> {
        let raw = std::fs::read_to_string(path).map_err(|e| CoreError::Config {
            message: format!("cannot read catalog {}: {e}", path.display()),
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_definitions(definitions: impl IntoIterator<Item = Definition>) -> Self {
        let mut by_model: IndexMap<String, Vec<Arc<Definition>>> = IndexMap::new();
        for def in definitions {
            by_model
                .entry(def.model.clone())
                .or_default()
                .push(Arc::new(def));
        }
        Self { by_model }
    }

    /// Built-in definitions, shadowed model-by-model by the file at
    /// `user_path` when one is given.
    pub fn load(user_path: Option<&Path>) -> Result<Self, CoreError> {
        let builtin = Self::builtin()?;
        match user_path {
            Some(path) => Ok(builtin.overlay(Self::from_path(path)?)),
            None => Ok(builtin),
        }
    }

    /// Replace every model `other` defines with `other`'s entries.
    pub fn overlay(mut self, other: Self) -> Self {
        for (model, defs) in other.by_model {
            debug!(%model, "catalog entry shadowed");
            self.by_model.insert(model, defs);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.by_model.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_model.is_empty()
    }
}

impl CapabilityCatalog for StaticCatalog {
    fn lookup(&self, fingerprint: DeviceFingerprint<'_>) -> Option<Arc<Definition>> {
        let candidates = self.by_model.get(fingerprint.model_id?)?;
        // Vendor-specific entries win over vendor-agnostic ones.
        candidates
            .iter()
            .filter(|d| d.vendor.is_some())
            .chain(candidates.iter().filter(|d| d.vendor.is_none()))
            .find(|d| d.matches_vendor(fingerprint.manufacturer))
            .cloned()
    }

    fn definitions(&self) -> Vec<Arc<Definition>> {
        self.by_model.values().flatten().cloned().collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn fp<'a>(model: &'a str, vendor: Option<&'a str>) -> DeviceFingerprint<'a> {
        DeviceFingerprint {
            model_id: Some(model),
            manufacturer: vendor,
        }
    }

    #[test]
    fn builtin_catalog_parses() {
        let catalog = StaticCatalog::builtin().unwrap();
        assert!(catalog.len() >= 8);
        let hue = catalog.lookup(fp("LCT015", Some("Philips"))).unwrap();
        assert!(hue.has_expose(ExposeType::Light));
        assert_eq!(hue.feature(Attribute::ColorTemp).and_then(|f| f.max), Some(500));
    }

    #[test]
    fn vendor_match_is_case_insensitive() {
        let catalog = StaticCatalog::builtin().unwrap();
        assert!(catalog.lookup(fp("LWB010", Some("philips"))).is_some());
        assert!(catalog.lookup(fp("LWB010", Some("Acme"))).is_none());
    }

    #[test]
    fn vendor_agnostic_entry_matches_any_manufacturer() {
        let catalog = StaticCatalog::builtin().unwrap();
        assert!(catalog.lookup(fp("TS011F", Some("_TZ3000_abc"))).is_some());
        assert!(catalog.lookup(fp("TS011F", None)).is_some());
    }

    #[test]
    fn missing_model_never_matches() {
        let catalog = StaticCatalog::builtin().unwrap();
        let anonymous = DeviceFingerprint {
            model_id: None,
            manufacturer: Some("Philips"),
        };
        assert!(catalog.lookup(anonymous).is_none());
    }

    #[test]
    fn user_file_shadows_builtin_model() {
        let user = StaticCatalog::from_toml_str(
            r#"
            [[definitions]]
            model = "E1603"
            vendor = "IKEA of Sweden"
            description = "outlet wired to a lamp"

            [[definitions.exposes]]
            type = "light"
            features = [{ name = "state" }]
            "#,
        )
        .unwrap();

        let catalog = StaticCatalog::builtin().unwrap().overlay(user);
        let def = catalog.lookup(fp("E1603", Some("IKEA of Sweden"))).unwrap();
        assert!(def.has_expose(ExposeType::Light));
        assert!(!def.has_expose(ExposeType::Switch));
    }

    #[test]
    fn load_reads_user_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.toml");
        std::fs::write(
            &path,
            "[[definitions]]\nmodel = \"custom\"\n[[definitions.exposes]]\ntype = \"switch\"\nfeatures = [{ name = \"state\", cluster = \"manuSpecificOnOff\" }]\n",
        )
        .unwrap();

        let catalog = StaticCatalog::load(Some(&path)).unwrap();
        let def = catalog.lookup(fp("custom", None)).unwrap();
        assert_eq!(
            def.feature(Attribute::State).and_then(|f| f.cluster.as_deref()),
            Some("manuSpecificOnOff")
        );
        assert!(catalog.lookup(fp("LCT015", Some("Philips"))).is_some());
    }

    #[test]
    fn invalid_catalog_is_config_error() {
        let err = StaticCatalog::from_toml_str("[[definitions]]\nvendor = 3").unwrap_err();
        assert!(matches!(err, CoreError::Config { .. }));
    }
}
