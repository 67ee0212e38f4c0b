//! Pipeline assembly and execution.
//!
//! Builds a [`LogPipeline`] from `LoggrabberConfig` and runs it on a blocking
//! thread. The session loop blocks on its collaborator, so the async side only
//! waits for ctrl-c and flips the shutdown flag, which the pipeline checks
//! between sessions and during reconnect waits.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};

use loggrabber_core::config::{LoggrabberConfig, SinkKind};
use loggrabber_core::pipeline::{LogSink, StatusService};
use loggrabber_core::types::LogFileEntry;
use loggrabber_log_pipeline::{
    CommandStatusService, LogPipeline, LogPipelineBuilder, PipelineConfig, PipelineReport,
    ReplayConnector, ReplayScript, RotatingFileSink, ScreenSink,
};

/// Build the output sink selected by `[output].sink`.
pub fn build_sink(config: &LoggrabberConfig) -> Result<Box<dyn LogSink>> {
    Ok(match config.output.sink {
        SinkKind::Screen => Box::new(ScreenSink::new()),
        SinkKind::File => Box::new(
            RotatingFileSink::open(&config.output.file_prefix, config.output.rotate_size_bytes)
                .context("failed to open output file")?,
        ),
    })
}

/// Assemble the pipeline.
///
/// Status and config services are only created when an entity is tracked.
pub fn build_pipeline(
    config: &LoggrabberConfig,
    replay: &Path,
    sink: Box<dyn LogSink>,
    shutdown: Arc<AtomicBool>,
) -> Result<LogPipeline> {
    let script = ReplayScript::from_path(replay)
        .with_context(|| format!("failed to load replay script {}", replay.display()))?;
    tracing::info!(
        path = %replay.display(),
        sessions = script.remaining_sessions(),
        logfiles = script.logfiles().len(),
        "replay script loaded"
    );

    let mut builder = LogPipelineBuilder::new()
        .config(PipelineConfig::from_core(config))
        .connector(Box::new(ReplayConnector::new(script)))
        .sink(sink)
        .shutdown_flag(shutdown);

    if config.status.tracking_enabled() {
        let status: Arc<dyn StatusService> =
            Arc::new(CommandStatusService::from_env(&config.status.status_server)?);
        builder = builder.status_service(status);

        if config.status.config_server != config.status.status_server {
            let remote: Arc<dyn StatusService> =
                Arc::new(CommandStatusService::from_env(&config.status.config_server)?);
            builder = builder.config_service(remote);
        }
    }

    builder.build().context("failed to build log pipeline")
}

/// Run the pipeline until it finishes or ctrl-c is received.
pub async fn run(mut pipeline: LogPipeline) -> Result<PipelineReport> {
    let shutdown = pipeline.shutdown_handle();
    let mut task = tokio::task::spawn_blocking(move || pipeline.run());

    let joined = tokio::select! {
        joined = &mut task => joined,
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for shutdown signal")?;
            tracing::info!("shutdown signal received, stopping after the current session");
            shutdown.store(true, Ordering::SeqCst);
            task.await
        }
    };

    let report = joined.context("pipeline task panicked")??;
    Ok(report)
}

/// Enumerate the available log files without opening any session.
pub async fn list_files(mut pipeline: LogPipeline) -> Result<Vec<LogFileEntry>> {
    let files = tokio::task::spawn_blocking(move || pipeline.list_logfiles())
        .await
        .context("log file listing task panicked")??;
    Ok(files)
}

/// Write the listing shown by `--show-files`.
pub fn write_file_list(files: &[LogFileEntry], w: &mut dyn std::io::Write) -> std::io::Result<()> {
    writeln!(w, "Available log files")?;
    for file in files {
        writeln!(w, "- {} (file id {})", file.name, file.file_id)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_screen_sink_by_default() {
        let sink = build_sink(&LoggrabberConfig::default()).unwrap();
        assert_eq!(sink.name(), "screen");
    }

    #[test]
    fn builds_file_sink() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = LoggrabberConfig::default();
        config.output.sink = SinkKind::File;
        config.output.file_prefix = dir.path().join("out").display().to_string();

        let sink = build_sink(&config).unwrap();
        assert_eq!(sink.name(), "file");
        assert!(dir.path().join("out.log").exists());
    }

    #[test]
    fn missing_replay_script_is_error() {
        let result = build_pipeline(
            &LoggrabberConfig::default(),
            Path::new("/nonexistent/session.jsonl"),
            Box::new(ScreenSink::new()),
            Arc::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn file_list_names_each_file_id() {
        let files = vec![
            LogFileEntry {
                name: "fw.log".to_owned(),
                file_id: 0,
            },
            LogFileEntry {
                name: "2024-01-01_000000.log".to_owned(),
                file_id: 7,
            },
        ];
        let mut out = Vec::new();
        write_file_list(&files, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Available log files\n- fw.log (file id 0)\n- 2024-01-01_000000.log (file id 7)\n"
        );
    }
}
