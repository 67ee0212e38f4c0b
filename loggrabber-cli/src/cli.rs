//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's derive macros.
//! It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// loggrabber -- LEA log collector tooling.
///
/// Use `loggrabber <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "loggrabber", version, about, long_about = None)]
pub struct Cli {
    /// Path to the loggrabber.toml configuration file.
    #[arg(short, long, global = true, default_value = "loggrabber.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table / text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage configuration.
    Config(ConfigArgs),

    /// Compile filter rules and print the resulting rulebase.
    Filter(FilterArgs),

    /// List the field catalog of a record kind.
    Fields(FieldsArgs),

    /// Query checkpoints stored in the status service.
    Status(StatusArgs),
}

// ---- config ----

/// Manage loggrabber configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, lea, output, filter, status, metrics).
        section: Option<String>,
    },
}

// ---- filter ----

/// Compile filter rules.
#[derive(Args, Debug)]
pub struct FilterArgs {
    #[command(subcommand)]
    pub action: FilterAction,
}

#[derive(Subcommand, Debug)]
pub enum FilterAction {
    /// Compile one or more rule strings and print the canonical rulebase.
    Check {
        /// Rule strings, e.g. `action=drop;dst=10.0.0.1`.
        #[arg(required = true)]
        rules: Vec<String>,

        /// Compile against the audit vocabulary.
        #[arg(long)]
        audit: bool,

        /// Add the rules the configured connection mode attaches to a session.
        #[arg(long)]
        session: bool,
    },
}

// ---- fields ----

/// List catalog fields.
#[derive(Args, Debug)]
pub struct FieldsArgs {
    /// List the audit catalog instead of the traffic catalog.
    #[arg(long)]
    pub audit: bool,
}

// ---- status ----

/// Query the status service.
#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(subcommand)]
    pub action: StatusAction,
}

#[derive(Subcommand, Debug)]
pub enum StatusAction {
    /// Show the last committed position of one log file.
    Get {
        /// Entity name (defaults to `[status].entity`).
        #[arg(long)]
        entity: Option<String>,

        /// Log file id (`-1` for the audit log).
        #[arg(long, allow_hyphen_values = true)]
        file_id: i32,
    },
}
