//! CLI argument definitions for loggrabber-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// LEA log collection daemon.
///
/// Reads firewall and audit records session by session, writes one line per
/// record to the configured sink and checkpoints read positions.
#[derive(Parser, Debug)]
#[command(name = "loggrabber-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to loggrabber.toml configuration file.
    #[arg(short, long, default_value = "/etc/loggrabber/loggrabber.toml")]
    pub config: PathBuf,

    /// JSON-lines session script driving the collector offline.
    ///
    /// Each line is one session event (`logfile`, `established`, `record`,
    /// `log_switch`, `end`).
    #[arg(long)]
    pub replay: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Override the logfile to read (`ALL` reads every enumerated file).
    #[arg(long)]
    pub logfile: Option<String>,

    /// Start at the end of the log and follow new records.
    #[arg(long)]
    pub online: bool,

    /// List the available log files with their file ids instead of reading records.
    ///
    /// Not supported in online mode or legacy 2000 mode.
    #[arg(long)]
    pub show_files: bool,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,
}

impl DaemonCli {
    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut loggrabber_core::LoggrabberConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.general.log_format = format.clone();
        }
        if let Some(logfile) = &self.logfile {
            config.lea.logfile = logfile.clone();
        }
        if self.online {
            config.lea.online_mode = true;
        }
    }
}
