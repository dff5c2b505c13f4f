//! Device abstraction and command translation for low-power mesh networks.
//!
//! This crate owns the domain model and the translation layer between
//! operator intents and model-specific low-level commands:
//!
//! - **[`Coordinator`]**: Central facade over one radio session.
//!   [`start()`](Coordinator::start) brings the radio up, loads the persisted
//!   device list and spawns the event router; [`stop()`](Coordinator::stop)
//!   tears it all down. [`Coordinator::oneshot()`](Coordinator::oneshot) wraps
//!   a single action for CLI invocations.
//!
//! - **[`CommandTranslator`]**: Maps an intent plus a device to the right
//!   low-level command(s): capability gating, unit conversion, clamping and
//!   best-effort attribute reads.
//!
//! - **[`CapabilityResolver`]**: Derives a device's kind and per-intent
//!   [`CapabilityDescriptor`]s from a [`CapabilityCatalog`] (the TOML-backed
//!   [`StaticCatalog`] ships with a built-in definition set).
//!
//! - **[`DataStore`]**: Device directory and state cache (`DashMap` +
//!   `tokio::sync::watch`). State updates are merges and publish
//!   `StateChanged` with the full snapshot.
//!
//! - **Network Controller** ([`transport`]): The radio seam. Real drivers
//!   implement [`NetworkController`]; [`SimulatedNetwork`] is an in-memory
//!   one for tests and demos.

pub mod catalog;
pub mod command;
pub mod config;
pub mod controller;
pub mod convert;
pub mod error;
pub mod model;
pub mod resolver;
mod router;
pub mod store;
pub mod stream;
pub mod translator;
pub mod transport;

// ── Primary re-exports ──────────────────────────────────────────────
pub use catalog::{CapabilityCatalog, Definition, StaticCatalog};
pub use command::{ColorSpec, Command, CommandResult, LightOptions, OnOffAction, Rgb};
pub use config::{CoordinatorConfig, NetworkConfig};
pub use controller::{Coordinator, LifecycleState, StartOutcome, StopOutcome};
pub use error::{CoreError, StartFailureKind};
pub use resolver::CapabilityResolver;
pub use store::DataStore;
pub use stream::{DeviceStream, EventStream};
pub use translator::CommandTranslator;
pub use transport::{NetworkController, SessionInfo, SimDevice, SimulatedNetwork, TransportError};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    Attribute, Capabilities, CapabilityDescriptor, Color, Device, DeviceKind, DeviceState,
    DomainEvent, Endpoint, Ieee, Intent, InterviewStatus, NetworkAddress, OnOff, PairingWindow,
    PowerSource,
};
