//! Clap derive structures for the `meshctl` CLI.
//!
//! Every radio command is one-shot: start the coordinator, act, stop.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use meshctl_core::Rgb;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// meshctl -- drive a mesh-network coordinator from the command line
#[derive(Debug, Parser)]
#[command(
    name = "meshctl",
    version,
    about = "Control mesh-network lights, plugs and sensors from the command line",
    long_about = "Control mesh-network lights, plugs and sensors from the command line.\n\n\
        Every command brings the coordinator up, performs one action and shuts it\n\
        down again. The bundled network controller is a simulator whose devices\n\
        live in the file named by --port.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Radio profile to use
    #[arg(long, short = 'p', env = "MESHCTL_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Radio port (overrides profile)
    #[arg(long, env = "MESHCTL_PORT", global = true)]
    pub port: Option<PathBuf>,

    /// Extra capability catalog (TOML), shadowing built-in models
    #[arg(long, env = "MESHCTL_CATALOG", global = true)]
    pub catalog: Option<PathBuf>,

    /// Request timeout in milliseconds
    #[arg(long, env = "MESHCTL_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// Output format [default: from config, else table]
    #[arg(long, short = 'o', env = "MESHCTL_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// Colorize tables and the event stream
    #[arg(long, env = "MESHCTL_COLOR", global = true)]
    pub color: Option<ColorMode>,

    /// Log more to stderr (-v info, -vv debug, -vvv trace)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Print nothing but errors
    #[arg(long, short = 'q', env = "MESHCTL_QUIET", global = true)]
    pub quiet: bool,
}

impl GlobalOpts {
    pub fn format(&self) -> OutputFormat {
        self.output.unwrap_or(OutputFormat::Table)
    }

    pub fn color_mode(&self) -> ColorMode {
        self.color.unwrap_or(ColorMode::Auto)
    }
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Rounded table or detail view
    Table,
    /// Pretty-printed JSON
    Json,
    /// JSON on one line
    JsonCompact,
    /// YAML
    Yaml,
    /// Bare identifiers or values, one per line
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Color when stdout is a terminal and NO_COLOR is unset
    Auto,
    /// Always color
    Always,
    /// Never color
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List and inspect paired devices
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// Show cached state or read it from a device
    State(StateArgs),

    /// Read power consumption from a metering device
    Power(DeviceArg),

    /// Switch a device on
    On(DeviceArg),

    /// Switch a device off
    Off(DeviceArg),

    /// Toggle a device's on/off state
    Toggle(DeviceArg),

    /// Set brightness in percent (0-100)
    #[command(alias = "bri")]
    Brightness(BrightnessArgs),

    /// Set color temperature (mireds when <= 500, Kelvin otherwise)
    #[command(name = "color-temp", alias = "ct")]
    ColorTemp(ColorTempArgs),

    /// Set a light's color
    Color(ColorArgs),

    /// Switch a light on, then apply brightness, temperature and color
    #[command(name = "light-on")]
    LightOn(LightOnArgs),

    /// Inspect or change the pairing window
    #[command(alias = "permit-join")]
    Pairing(PairingArgs),

    /// Print network events as they happen
    Watch(WatchArgs),

    /// Inspect the capability catalog
    Catalog(CatalogArgs),

    /// Manage CLI configuration
    Config(ConfigArgs),

    /// Print a shell completion script
    Completions(CompletionsArgs),
}

// ── Shared device arguments ──────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DeviceArg {
    /// IEEE address (0x + 16 hex digits) or friendly name
    pub device: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  DEVICES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct DevicesArgs {
    #[command(subcommand)]
    pub command: DevicesCommand,
}

#[derive(Debug, Subcommand)]
pub enum DevicesCommand {
    /// List paired devices
    #[command(alias = "ls")]
    List,

    /// Show one device with its capabilities and cached state
    Get(DeviceArg),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  STATE
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct StateArgs {
    #[command(subcommand)]
    pub command: StateCommand,
}

#[derive(Debug, Subcommand)]
pub enum StateCommand {
    /// Last known state, without contacting the device
    Get(DeviceArg),

    /// Query the device for its current state
    Read(DeviceArg),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONTROL
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct BrightnessArgs {
    /// IEEE address or friendly name
    pub device: String,

    /// Percent; values outside 0-100 are clamped
    #[arg(allow_negative_numbers = true)]
    pub percent: f64,
}

#[derive(Debug, Args)]
pub struct ColorTempArgs {
    /// IEEE address or friendly name
    pub device: String,

    /// Mireds (<= 500) or Kelvin (> 500)
    pub value: u32,
}

/// Color representations; precedence hex > rgb > hue/saturation.
#[derive(Debug, Clone, Default, Args)]
pub struct ColorOpts {
    /// Hex color (#RRGGBB, RRGGBB or #RGB)
    #[arg(long)]
    pub hex: Option<String>,

    /// RGB triple, e.g. 255,128,0
    #[arg(long, value_parser = parse_rgb)]
    pub rgb: Option<Rgb>,

    /// Hue in degrees (0-360)
    #[arg(long, requires = "saturation")]
    pub hue: Option<f64>,

    /// Saturation in percent (0-100)
    #[arg(long, requires = "hue")]
    pub saturation: Option<f64>,
}

#[derive(Debug, Args)]
pub struct ColorArgs {
    /// IEEE address or friendly name
    pub device: String,

    #[command(flatten)]
    pub color: ColorOpts,
}

#[derive(Debug, Args)]
pub struct LightOnArgs {
    /// IEEE address or friendly name
    pub device: String,

    /// Brightness in percent
    #[arg(long)]
    pub brightness: Option<f64>,

    /// Color temperature (mireds when <= 500, Kelvin otherwise)
    #[arg(long)]
    pub color_temp: Option<u32>,

    #[command(flatten)]
    pub color: ColorOpts,
}

fn parse_rgb(raw: &str) -> Result<Rgb, String> {
    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    let [r, g, b] = parts.as_slice() else {
        return Err(format!("expected R,G,B, got '{raw}'"));
    };
    let channel = |s: &str| {
        s.parse::<u8>()
            .map_err(|_| format!("'{s}' is not a channel value (0-255)"))
    };
    Ok(Rgb {
        r: channel(r)?,
        g: channel(g)?,
        b: channel(b)?,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  PAIRING
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct PairingArgs {
    #[command(subcommand)]
    pub command: PairingCommand,
}

#[derive(Debug, Subcommand)]
pub enum PairingCommand {
    /// Show whether new devices may join
    Status,

    /// Let new devices join for a while (clamped to 1-254 s)
    Open {
        /// Window length in seconds
        #[arg(long, short = 'd', default_value = "254")]
        duration: u32,
    },

    /// Stop accepting new devices
    Close,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  WATCH
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Stop after this many seconds (default: until Ctrl-C)
    #[arg(long)]
    pub seconds: Option<u64>,

    /// Open the pairing window for this many seconds first
    #[arg(long)]
    pub permit_join: Option<u32>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CATALOG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CatalogArgs {
    #[command(subcommand)]
    pub command: CatalogCommand,
}

#[derive(Debug, Subcommand)]
pub enum CatalogCommand {
    /// List the device definitions the resolver knows
    #[command(alias = "ls")]
    List,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the loaded configuration (secrets redacted)
    Show,

    /// Print the config file location
    Path,

    /// Write a starter config whose `default` profile uses --port
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: clap_complete::Shell,
}
