//! 파이프라인 오케스트레이션 -- 대상 결정과 대상별 세션 반복을 관리합니다.
//!
//! [`LogPipeline`]은 대상 로그 파일을 순서대로 처리합니다. 대상 하나는
//! [`SessionController`]가 담당하고, 재접속 사유로 끝나면 복구 대기 후 같은 대상의
//! 세션을 다시 엽니다. 종료 플래그는 세션 사이와 복구 대기 중에만 확인합니다.
//!
//! # 내부 아키텍처
//! ```text
//! ParamsSource -> resolve_targets -> [target] -> SessionController <-> LeaConnector
//!                                                       |
//!                                         RecordFormatter -> LogSink
//!                                         CheckpointStore -> StatusService
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{info, warn};

use loggrabber_core::error::SessionError;
use loggrabber_core::metrics as m;
use loggrabber_core::pipeline::{LogSink, StatusService};
use loggrabber_core::types::LogFileEntry;

use crate::checkpoint::{CheckpointStore, Sleeper, StatusEndpoints, ThreadSleeper};
use crate::config::PipelineConfig;
use crate::error::LogPipelineError;
use crate::session::{
    EndReason, LeaConnector, ParamsSource, SessionController, SessionOutcome, SessionSettings,
};
use crate::targets::resolve_targets;

/// 복구 대기 중 종료 플래그 확인 간격
const SHUTDOWN_POLL: Duration = Duration::from_millis(250);

/// 파이프라인 실행 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// 대상 하나의 처리 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetReport {
    /// 대상 로그 파일
    pub target: LogFileEntry,
    /// 열린 세션 수
    pub sessions: u32,
    /// 마지막 종료 사유 (종료 요청으로 멈췄으면 `None`)
    pub reason: Option<EndReason>,
}

/// 파이프라인 실행 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    /// 처리한 대상 (처리 순서)
    pub targets: Vec<TargetReport>,
    /// 종료 요청으로 중단되었는지 여부
    pub interrupted: bool,
}

/// 로그 수집 파이프라인
///
/// # 사용 예시
/// ```ignore
/// use loggrabber_log_pipeline::{LogPipelineBuilder, ScreenSink};
///
/// let mut pipeline = LogPipelineBuilder::new()
///     .config(config)
///     .connector(Box::new(connector))
///     .sink(Box::new(ScreenSink::new()))
///     .build()?;
///
/// let report = pipeline.run()?;
/// ```
pub struct LogPipeline {
    config: Arc<PipelineConfig>,
    connector: Box<dyn LeaConnector>,
    sink: Box<dyn LogSink>,
    store: CheckpointStore,
    params_source: ParamsSource,
    sleeper: Arc<dyn Sleeper>,
    shutdown: Arc<AtomicBool>,
    state: PipelineState,
}

impl LogPipeline {
    /// 현재 상태 이름
    pub fn state_name(&self) -> &str {
        match self.state {
            PipelineState::Initialized => "initialized",
            PipelineState::Running => "running",
            PipelineState::Stopped => "stopped",
        }
    }

    /// 종료 플래그. `true`로 바꾸면 다음 세션 경계에서 멈춥니다.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// 파이프라인 설정
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// 모든 대상을 처리합니다.
    ///
    /// 대상이 하나뿐이고 그 대상이 오류 사유로 끝나면 에러를 반환합니다.
    pub fn run(&mut self) -> Result<PipelineReport, LogPipelineError> {
        if self.state == PipelineState::Running {
            return Err(LogPipelineError::Config {
                field: "state".to_owned(),
                reason: "pipeline is already running".to_owned(),
            });
        }
        self.state = PipelineState::Running;

        let result = self.run_targets();
        let flushed = self.sink.flush();
        self.state = PipelineState::Stopped;

        let report = result?;
        flushed?;

        if let [only] = report.targets.as_slice()
            && let Some(reason) = only.reason
            && reason.is_error()
        {
            return Err(SessionError::Terminated {
                reason: reason.to_string(),
            }
            .into());
        }
        Ok(report)
    }

    /// 읽을 수 있는 로그 파일 목록을 조회합니다. 세션은 열지 않습니다.
    ///
    /// 온라인 모드와 legacy 2000 모드에서는 지원하지 않습니다.
    pub fn list_logfiles(&mut self) -> Result<Vec<LogFileEntry>, LogPipelineError> {
        if self.config.legacy_2000 {
            return Err(LogPipelineError::Config {
                field: "legacy_2000".to_owned(),
                reason: "listing log files is not supported in legacy 2000 mode".to_owned(),
            });
        }

        let params = self.params_source.acquire()?;
        let settings = SessionSettings::derive(&self.config, params)?;
        if settings.online_mode {
            return Err(LogPipelineError::Config {
                field: "online_mode".to_owned(),
                reason: "listing log files is not supported in online mode".to_owned(),
            });
        }

        let files = self.connector.list_logfiles(&settings.params)?;
        info!(count = files.len(), connector = self.connector.name(), "log files listed");
        Ok(files)
    }

    fn run_targets(&mut self) -> Result<PipelineReport, LogPipelineError> {
        let params = self.params_source.acquire()?;
        let settings = SessionSettings::derive(&self.config, params)?;
        if self.config.legacy_2000 {
            warn!("legacy 2000 mode, filter rules are not applied");
        }

        let targets = resolve_targets(
            &self.config,
            settings.record_kind,
            settings.online_mode,
            self.connector.as_mut(),
            &settings.params,
        )?;

        info!(
            connector = self.connector.name(),
            sink = self.sink.name(),
            targets = targets.len(),
            tracking = self.store.is_enabled(),
            "log pipeline started"
        );

        let mut report = PipelineReport::default();
        for target in targets {
            if self.shutdown_requested() {
                report.interrupted = true;
                break;
            }
            let target_report = self.run_target(target)?;
            if target_report.reason.is_none() {
                report.interrupted = true;
            }
            report.targets.push(target_report);
        }

        info!(
            targets = report.targets.len(),
            interrupted = report.interrupted,
            "log pipeline stopped"
        );
        Ok(report)
    }

    fn run_target(&mut self, target: LogFileEntry) -> Result<TargetReport, LogPipelineError> {
        let mut controller = SessionController::new(
            Arc::clone(&self.config),
            self.store.clone(),
            self.params_source.clone(),
            Arc::clone(&self.sleeper),
            target.clone(),
        );

        let mut sessions = 0;
        loop {
            sessions += 1;
            let outcome = controller.run_session(self.connector.as_mut(), self.sink.as_mut())?;
            self.sink.flush()?;

            match outcome {
                SessionOutcome::Terminated { reason } => {
                    return Ok(TargetReport {
                        target,
                        sessions,
                        reason: Some(reason),
                    });
                }
                SessionOutcome::Reconnect { reason } => {
                    metrics::counter!(m::SESSION_RECONNECTS_TOTAL).increment(1);
                    info!(
                        file = %target.name,
                        %reason,
                        wait_secs = self.config.recovery_interval.as_secs(),
                        "waiting before reconnect"
                    );
                    if !self.recovery_wait() {
                        return Ok(TargetReport {
                            target,
                            sessions,
                            reason: None,
                        });
                    }
                }
            }
        }
    }

    /// 복구 대기. 종료 요청이 오면 `false`입니다.
    fn recovery_wait(&self) -> bool {
        let mut remaining = self.config.recovery_interval;
        while !remaining.is_zero() {
            if self.shutdown_requested() {
                return false;
            }
            let step = remaining.min(SHUTDOWN_POLL);
            self.sleeper.sleep(step);
            remaining -= step;
        }
        !self.shutdown_requested()
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

/// 파이프라인 빌더
///
/// 추적 설정이 있으면 상태 서비스가 필요합니다. 설정 서비스를 따로 주지 않으면
/// 상태 서비스가 연결 설정 문서도 제공합니다.
pub struct LogPipelineBuilder {
    config: PipelineConfig,
    connector: Option<Box<dyn LeaConnector>>,
    sink: Option<Box<dyn LogSink>>,
    status_service: Option<Arc<dyn StatusService>>,
    config_service: Option<Arc<dyn StatusService>>,
    sleeper: Arc<dyn Sleeper>,
    shutdown: Option<Arc<AtomicBool>>,
}

impl LogPipelineBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            connector: None,
            sink: None,
            status_service: None,
            config_service: None,
            sleeper: Arc::new(ThreadSleeper),
            shutdown: None,
        }
    }

    /// 파이프라인 설정을 지정합니다.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// 세션 협력자를 지정합니다.
    pub fn connector(mut self, connector: Box<dyn LeaConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// 출력 싱크를 지정합니다.
    pub fn sink(mut self, sink: Box<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// 체크포인트와 연결 상태를 기록할 상태 서비스
    pub fn status_service(mut self, service: Arc<dyn StatusService>) -> Self {
        self.status_service = Some(service);
        self
    }

    /// 연결 설정 문서를 제공하는 서비스
    pub fn config_service(mut self, service: Arc<dyn StatusService>) -> Self {
        self.config_service = Some(service);
        self
    }

    /// 재시도와 복구 대기에 사용할 sleeper
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// 외부에서 공유할 종료 플래그
    pub fn shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = Some(flag);
        self
    }

    /// 파이프라인을 빌드합니다.
    pub fn build(self) -> Result<LogPipeline, LogPipelineError> {
        self.config.validate()?;

        let connector = self.connector.ok_or_else(|| LogPipelineError::Config {
            field: "connector".to_owned(),
            reason: "a session connector is required".to_owned(),
        })?;
        let sink = self.sink.ok_or_else(|| LogPipelineError::Config {
            field: "sink".to_owned(),
            reason: "an output sink is required".to_owned(),
        })?;

        let (store, params_source) = match &self.config.tracking {
            Some(tracking) => {
                let status = self.status_service.ok_or_else(|| LogPipelineError::Config {
                    field: "status_service".to_owned(),
                    reason: "checkpoint tracking requires a status service".to_owned(),
                })?;
                let endpoints = StatusEndpoints::for_app(&tracking.app_name);
                let config_service = self.config_service.unwrap_or_else(|| Arc::clone(&status));
                (
                    CheckpointStore::new(status, endpoints.clone(), tracking.entity.clone()),
                    ParamsSource::Remote {
                        service: config_service,
                        endpoints,
                        entity: tracking.entity.clone(),
                    },
                )
            }
            None => (CheckpointStore::disabled(), ParamsSource::Local),
        };

        Ok(LogPipeline {
            config: Arc::new(self.config),
            connector,
            sink,
            store,
            params_source,
            sleeper: self.sleeper,
            shutdown: self.shutdown.unwrap_or_default(),
            state: PipelineState::Initialized,
        })
    }
}

impl Default for LogPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::config::PipelineConfigBuilder;
    use crate::session::{ReplayConnector, ReplayScript};
    use crate::sink::MemorySink;

    #[derive(Default)]
    struct CountingSleeper {
        total: Mutex<Duration>,
    }

    impl Sleeper for CountingSleeper {
        fn sleep(&self, duration: Duration) {
            *self.total.lock().unwrap() += duration;
        }
    }

    fn record(position: i64) -> String {
        format!(
            r#"{{"event":"record","position":{position},"fields":[{{"name":"action","value":{{"type":"action_code","value":4}},"resolved":"accept"}}]}}"#
        )
    }

    fn pipeline(script: &str, sink: MemorySink, sleeper: Arc<CountingSleeper>) -> LogPipeline {
        let config = PipelineConfigBuilder::new()
            .mode(loggrabber_core::types::ConnectionMode::NonAudit)
            .recovery_interval(Duration::from_secs(2))
            .build()
            .unwrap();
        LogPipelineBuilder::new()
            .config(config)
            .connector(Box::new(ReplayConnector::new(ReplayScript::parse(script).unwrap())))
            .sink(Box::new(sink))
            .sleeper(sleeper)
            .build()
            .unwrap()
    }

    #[test]
    fn builder_requires_connector() {
        let result = LogPipelineBuilder::new().sink(Box::new(MemorySink::new())).build();
        assert!(matches!(result, Err(LogPipelineError::Config { field, .. }) if field == "connector"));
    }

    #[test]
    fn tracking_requires_status_service() {
        let config = PipelineConfigBuilder::new().tracking("fw1", "opsec_app").build().unwrap();
        let script = ReplayScript::parse("").unwrap();
        let result = LogPipelineBuilder::new()
            .config(config)
            .connector(Box::new(ReplayConnector::new(script)))
            .sink(Box::new(MemorySink::new()))
            .build();
        assert!(matches!(result, Err(LogPipelineError::Config { field, .. }) if field == "status_service"));
    }

    #[test]
    fn reconnects_after_transient_end() {
        let script = [
            r#"{"event":"established"}"#.to_owned(),
            record(0),
            r#"{"event":"end","reason":"comm_failure"}"#.to_owned(),
            r#"{"event":"established"}"#.to_owned(),
            record(1),
            r#"{"event":"end","reason":"end_by_application"}"#.to_owned(),
        ]
        .join("\n");
        let sink = MemorySink::new();
        let sleeper = Arc::new(CountingSleeper::default());
        let mut pipeline = pipeline(&script, sink.clone(), Arc::clone(&sleeper));

        let report = pipeline.run().unwrap();
        assert_eq!(report.targets.len(), 1);
        assert_eq!(report.targets[0].sessions, 2);
        assert_eq!(report.targets[0].reason, Some(EndReason::EndByApplication));
        assert_eq!(sink.lines().len(), 2);
        assert_eq!(*sleeper.total.lock().unwrap(), Duration::from_secs(2));
        assert_eq!(pipeline.state_name(), "stopped");
    }

    #[test]
    fn single_target_error_fails_run() {
        let script = r#"{"event":"end","reason":"sic_failure"}"#;
        let mut pipeline = pipeline(script, MemorySink::new(), Arc::default());
        let err = pipeline.run().unwrap_err();
        assert!(matches!(err, LogPipelineError::Session(SessionError::Terminated { .. })));
    }

    #[test]
    fn transient_end_before_establish_terminates() {
        let script = r#"{"event":"end","reason":"comm_failure"}"#;
        let sleeper = Arc::new(CountingSleeper::default());
        let mut pipeline = pipeline(script, MemorySink::new(), Arc::clone(&sleeper));
        assert!(pipeline.run().is_err());
        assert_eq!(*sleeper.total.lock().unwrap(), Duration::ZERO);
    }

    #[test]
    fn shutdown_before_start_processes_nothing() {
        let script = format!("{{\"event\":\"established\"}}\n{}", record(0));
        let sink = MemorySink::new();
        let mut pipeline = pipeline(&script, sink.clone(), Arc::default());
        pipeline.shutdown_handle().store(true, Ordering::SeqCst);

        let report = pipeline.run().unwrap();
        assert!(report.interrupted);
        assert!(report.targets.is_empty());
        assert!(sink.lines().is_empty());
    }

    fn listing_config() -> PipelineConfigBuilder {
        PipelineConfigBuilder::new().mode(loggrabber_core::types::ConnectionMode::NonAudit)
    }

    fn listing_pipeline(config: PipelineConfig, script: &str) -> LogPipeline {
        LogPipelineBuilder::new()
            .config(config)
            .connector(Box::new(ReplayConnector::new(ReplayScript::parse(script).unwrap())))
            .sink(Box::new(MemorySink::new()))
            .build()
            .unwrap()
    }

    #[test]
    fn lists_logfiles_without_opening_sessions() {
        let script = [
            r#"{"event":"logfile","name":"fw.log","file_id":0}"#.to_owned(),
            r#"{"event":"logfile","name":"2024-01-01_000000.log","file_id":7}"#.to_owned(),
            r#"{"event":"established"}"#.to_owned(),
            record(0),
        ]
        .join("\n");
        let sink = MemorySink::new();
        let mut pipeline = LogPipelineBuilder::new()
            .config(listing_config().build().unwrap())
            .connector(Box::new(ReplayConnector::new(ReplayScript::parse(&script).unwrap())))
            .sink(Box::new(sink.clone()))
            .build()
            .unwrap();

        let files = pipeline.list_logfiles().unwrap();
        assert_eq!(
            files,
            vec![
                LogFileEntry {
                    name: "fw.log".to_owned(),
                    file_id: 0
                },
                LogFileEntry {
                    name: "2024-01-01_000000.log".to_owned(),
                    file_id: 7
                },
            ]
        );
        assert!(sink.lines().is_empty());
    }

    #[test]
    fn listing_logfiles_is_rejected_online() {
        let mut config = listing_config().build().unwrap();
        config.online_mode = true;
        let mut pipeline = listing_pipeline(config, "");
        let err = pipeline.list_logfiles().unwrap_err();
        assert!(matches!(err, LogPipelineError::Config { field, .. } if field == "online_mode"));
    }

    #[test]
    fn listing_logfiles_is_rejected_in_legacy_mode() {
        let mut config = listing_config().build().unwrap();
        config.legacy_2000 = true;
        let mut pipeline = listing_pipeline(config, "");
        let err = pipeline.list_logfiles().unwrap_err();
        assert!(matches!(err, LogPipelineError::Config { field, .. } if field == "legacy_2000"));
    }
}
