//! CLI argument definitions
//!
//! All Clap derive structs for `breathwork` command-line parsing.

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

// ============================================================================
// Root CLI
// ============================================================================

/// Guided breathing exercises in the terminal.
#[derive(Parser, Debug)]
#[command(name = "breathwork", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-error output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output control.
    #[arg(long, default_value = "auto", global = true, env = "BREATHWORK_COLOR")]
    pub color: ColorChoice,
}

impl Cli {
    /// Output format of the selected command; `show` always prints YAML.
    #[must_use]
    pub const fn output_format(&self) -> OutputFormat {
        match &self.command {
            Commands::Run(args) => args.format,
            Commands::List(args) => args.format,
            Commands::Validate(args) => args.format,
            Commands::Version(args) => args.format,
            Commands::Show(_) => OutputFormat::Human,
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a guided breathing exercise.
    Run(RunArgs),

    /// List built-in protocols.
    List(ListArgs),

    /// Print the YAML of a built-in protocol.
    Show(ShowArgs),

    /// Validate protocol files without running them.
    Validate(ValidateArgs),

    /// Display version information.
    Version(VersionArgs),
}

/// Arguments for `run`.
#[derive(Args, Debug)]
#[command(group = clap::ArgGroup::new("source").multiple(false))]
pub struct RunArgs {
    /// Built-in protocol to run (default: box).
    #[arg(short, long, group = "source", env = "BREATHWORK_PROTOCOL")]
    pub protocol: Option<String>,

    /// Path to a YAML protocol file.
    #[arg(long, group = "source")]
    pub file: Option<PathBuf>,

    /// Number of cycles, overriding the protocol's own count.
    #[arg(
        short,
        long,
        env = "BREATHWORK_CYCLES",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub cycles: Option<u32>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,

    /// Wall-clock length of one tick (e.g. "1s", "250ms").
    #[arg(
        long,
        default_value = "1s",
        env = "BREATHWORK_TICK_INTERVAL",
        value_parser = parse_tick_interval
    )]
    pub tick_interval: Duration,

    /// Write lifecycle events as JSONL to this file.
    #[arg(long)]
    pub events: Option<PathBuf>,

    /// Serve Prometheus metrics on this port.
    #[arg(long)]
    pub metrics_port: Option<u16>,
}

/// Arguments for `list`.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

/// Arguments for `show`.
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Built-in protocol name.
    pub name: String,
}

/// Arguments for `validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Protocol files to validate.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,

    /// Treat warnings as errors.
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for version display.
#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

// ============================================================================
// CLI-Local Enums
// ============================================================================

/// Color output choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorChoice {
    /// Auto-detect terminal support.
    #[default]
    Auto,
    /// Always use color.
    Always,
    /// Never use color.
    Never,
}

/// Output format for command output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output.
    #[default]
    Human,
    /// JSON output.
    Json,
}

fn parse_tick_interval(raw: &str) -> Result<Duration, String> {
    let interval = humantime::parse_duration(raw).map_err(|e| e.to_string())?;
    if interval.is_zero() {
        return Err("tick interval must be greater than zero".to_string());
    }
    Ok(interval)
}

// ============================================================================
// Tests
// ============================================================================
