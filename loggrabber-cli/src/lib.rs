//! loggrabber CLI library.
//!
//! Exposes argument parsing, command handlers and output rendering so that
//! integration tests can drive them without spawning the binary.

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;
