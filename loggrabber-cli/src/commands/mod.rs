//! Command handlers -- one module per subcommand

pub mod config;
pub mod fields;
pub mod filter;
pub mod status;
