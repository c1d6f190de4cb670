//! Clap derive structures for the `acm200` CLI.
//!
//! Defines the command tree, global flags, and shared value enums.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// acm200 -- control a Blustream ACM200 HDMI matrix
#[derive(Debug, Parser)]
#[command(
    name = "acm200",
    version,
    about = "Switch and monitor Blustream ACM200 HDMI matrices",
    long_about = "Talks to the ACM200 over its telnet command port.\n\n\
        Routes are switched with one command per connection and read back\n\
        with STATUS queries, falling back to per-output queries as needed.",
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
    /// Matrix profile to use
    #[arg(long, short = 'p', env = "ACM200_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Matrix hostname or IP (overrides profile)
    #[arg(long, short = 'H', env = "ACM200_HOST", global = true)]
    pub host: Option<String>,

    /// Telnet port (overrides profile)
    #[arg(long, short = 'P', env = "ACM200_PORT", global = true)]
    pub port: Option<u16>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "ACM200_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Per-command response deadline in seconds (overrides profile)
    #[arg(long, env = "ACM200_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Route an output to an input (by number or source label)
    #[command(alias = "sw")]
    Switch(SwitchArgs),

    /// Show which input feeds one output
    Route(RouteArgs),

    /// Poll the matrix once and show every route
    #[command(alias = "status")]
    Routes,

    /// Poll continuously and print each routing snapshot
    Watch(WatchArgs),

    /// List source labels for the configured inputs
    Inputs,

    /// Show the identity of the configured matrix
    Info,

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Routing ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SwitchArgs {
    /// Output number (1-based)
    #[arg(id = "output_number", value_name = "OUTPUT")]
    pub output: u16,

    /// Input number, or a source label such as "Apple TV (2)"
    pub source: String,
}

#[derive(Debug, Args)]
pub struct RouteArgs {
    /// Output number (1-based)
    #[arg(id = "output_number", value_name = "OUTPUT")]
    pub output: u16,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Seconds between polls (minimum 2; overrides profile)
    #[arg(long, short = 'i')]
    pub interval: Option<u64>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Interactive setup wizard
    Init,

    /// Show the current configuration
    Show,

    /// Print the config file path
    Path,

    /// Add a matrix profile
    Add(AddProfileArgs),

    /// Name (or with an empty name, un-name) an input or output
    SetName {
        /// Which side of the matrix
        kind: PortKind,
        /// Port number (1-based)
        id: u16,
        /// Friendly name
        name: String,
    },

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name
        name: String,
    },
}

#[derive(Debug, Args)]
pub struct AddProfileArgs {
    /// Profile name
    pub name: String,

    /// Matrix hostname or IP
    #[arg(long = "address", short = 'a')]
    pub address: String,

    /// Telnet port
    #[arg(long = "telnet-port", default_value_t = acm200_core::config::DEFAULT_PORT)]
    pub telnet_port: u16,

    /// Number of inputs
    #[arg(long, default_value_t = acm200_core::config::DEFAULT_NUM_INPUTS)]
    pub inputs: u16,

    /// Number of outputs
    #[arg(long, default_value_t = acm200_core::config::DEFAULT_NUM_OUTPUTS)]
    pub outputs: u16,

    /// Seconds between polls
    #[arg(long, default_value_t = 5)]
    pub poll_interval: u64,

    /// Make this the default profile
    #[arg(long)]
    pub default: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PortKind {
    Input,
    Output,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
