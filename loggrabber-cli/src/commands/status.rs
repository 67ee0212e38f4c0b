//! `loggrabber status` command handler

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use loggrabber_core::config::LoggrabberConfig;
use loggrabber_core::pipeline::StatusService;
use loggrabber_log_pipeline::{CheckpointStore, CommandStatusService, StatusEndpoints};

use crate::cli::{StatusAction, StatusArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `status` command.
pub async fn execute(
    args: StatusArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        StatusAction::Get { entity, file_id } => {
            let config = LoggrabberConfig::load(config_path).await?;
            let entity = entity.unwrap_or_else(|| config.status.entity.clone());
            if entity.is_empty() {
                return Err(CliError::Config(
                    "no entity given and [status].entity is empty".to_owned(),
                ));
            }

            let service: Arc<dyn StatusService> =
                Arc::new(CommandStatusService::from_env(&config.status.status_server)?);
            let report = fetch_position(service, &config.status.app_name, &entity, file_id)?;
            writer.render(&report)
        }
    }
}

/// Look up the stored position of one log file.
pub fn fetch_position(
    service: Arc<dyn StatusService>,
    app_name: &str,
    entity: &str,
    file_id: i32,
) -> Result<PositionReport, CliError> {
    debug!(app_name, entity, file_id, "querying stored position");

    let store = CheckpointStore::new(service, StatusEndpoints::for_app(app_name), entity);
    let position = store.get_last_position(file_id)?;

    Ok(PositionReport {
        key: format!("{file_id}@{entity}"),
        entity: entity.to_owned(),
        file_id,
        last_record_position: position,
    })
}

/// Stored checkpoint of one log file.
#[derive(Debug, Serialize)]
pub struct PositionReport {
    /// Status key (`<file_id>@<entity>`)
    pub key: String,
    pub entity: String,
    pub file_id: i32,
    /// Last committed record position (`None` = nothing stored)
    pub last_record_position: Option<i64>,
}

impl Render for PositionReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Checkpoint {}", self.key.bold())?;
        match self.last_record_position {
            Some(position) => writeln!(w, "  Last record position: {position}")?,
            None => writeln!(
                w,
                "  Last record position: {} (reading starts at the beginning)",
                "none".yellow()
            )?,
        }
        Ok(())
    }
}
