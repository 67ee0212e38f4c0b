use anyhow::{Context, Result};
use clap::Parser;

use loggrabber_daemon::cli::DaemonCli;
use loggrabber_daemon::{logging, metrics_server, runner};
use loggrabber_core::LoggrabberConfig;
use loggrabber_log_pipeline::ScreenSink;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    let mut config = LoggrabberConfig::load(&cli.config)
        .await
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;
    cli.apply_overrides(&mut config);
    config
        .validate()
        .context("invalid configuration after command-line overrides")?;

    if cli.validate {
        println!("configuration is valid: {}", cli.config.display());
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(
        config = %cli.config.display(),
        record_kind = ?config.lea.record_kind,
        logfile = %config.lea.logfile,
        online = config.lea.online_mode,
        "loggrabber-daemon starting"
    );

    if config.metrics.enabled {
        metrics_server::install_metrics_recorder(&config.metrics)?;
    }

    let Some(replay) = cli.replay.as_deref() else {
        anyhow::bail!(
            "no LEA collaborator available; pass --replay <script> to drive the collector from a session script"
        );
    };

    if cli.show_files {
        let pipeline = runner::build_pipeline(
            &config,
            replay,
            Box::new(ScreenSink::new()),
            Default::default(),
        )?;
        let files = runner::list_files(pipeline).await?;
        runner::write_file_list(&files, &mut std::io::stdout().lock())
            .context("failed to write log file list")?;
        return Ok(());
    }

    let sink = runner::build_sink(&config)?;
    let pipeline = runner::build_pipeline(&config, replay, sink, Default::default())?;
    let report = runner::run(pipeline).await?;

    for target in &report.targets {
        tracing::info!(
            logfile = %target.target.name,
            file_id = target.target.file_id,
            sessions = target.sessions,
            reason = ?target.reason,
            "target finished"
        );
    }
    tracing::info!(interrupted = report.interrupted, "loggrabber-daemon shut down");
    Ok(())
}
