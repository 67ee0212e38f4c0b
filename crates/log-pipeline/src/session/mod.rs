//! 세션 컨트롤러
//!
//! 로그 파일 대상 하나에 대한 세션 수명 주기를 상태 머신으로 관리합니다.
//!
//! ```text
//! INIT -> RESUMING -> FILTER_REGISTERED -> STREAMING -> ENDING -> RECONNECT | TERMINATED
//!   \___________________^
//! ```
//!
//! - INIT: 연결 파라미터를 얻고 세션 설정을 결정합니다. 추적이 꺼져 있으면 RESUMING을 건너뜁니다.
//! - RESUMING: 저장된 위치를 조회합니다. not found 이외의 실패는 치명적입니다.
//! - FILTER_REGISTERED: 규칙베이스를 등록하고 협력자의 확인을 기다린 뒤 재개합니다.
//! - STREAMING: 레코드를 포맷해 싱크에 쓰고, `commit_interval`마다 위치를 커밋합니다.
//! - ENDING: 마지막 위치를 커밋하고 연결 끊김 상태를 보고한 뒤 종료 사유를 분류합니다.
//!
//! 컨트롤러는 협력자가 소유한 이벤트 루프에서 이벤트를 하나씩 받아 상태를 전이합니다.
//! 레코드 전달, 종료, 필터 확인은 모두 같은 스레드에서 동기적으로 처리됩니다.

pub mod collaborator;
pub mod end_reason;
pub mod replay;

pub use collaborator::{LeaConnector, LeaSession, SessionEvent, SessionRequest, StartPosition};
pub use end_reason::{EndClass, EndReason};
pub use replay::{ReplayConnector, ReplayEvent, ReplayScript};

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use loggrabber_core::error::SessionError;
use loggrabber_core::metrics as m;
use loggrabber_core::pipeline::{LogSink, StatusService};
use loggrabber_core::types::{Checkpoint, ConnectionMode, LogFileEntry, RecordKind};

use crate::checkpoint::{CheckpointStore, RetryPolicy, Sleeper, StatusEndpoints};
use crate::config::PipelineConfig;
use crate::connection::ConnectionParams;
use crate::error::LogPipelineError;
use crate::filter::{FilterCompiler, PredicateTree};
use crate::format::{FormatOptions, RecordFormatter};

/// 세션 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// 초기화
    Init,
    /// 저장된 위치 조회
    Resuming,
    /// 필터 등록 (확인 대기)
    FilterRegistered,
    /// 레코드 수신
    Streaming,
    /// 종료 처리
    Ending,
    /// 재접속 대기
    Reconnect,
    /// 종료
    Terminated,
}

impl SessionState {
    /// 상태 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::Resuming => "RESUMING",
            Self::FilterRegistered => "FILTER_REGISTERED",
            Self::Streaming => "STREAMING",
            Self::Ending => "ENDING",
            Self::Reconnect => "RECONNECT",
            Self::Terminated => "TERMINATED",
        }
    }

    /// 허용된 전이인지 확인합니다.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Init, Resuming)
                | (Init, FilterRegistered)
                | (Resuming, FilterRegistered)
                | (FilterRegistered, Streaming)
                | (FilterRegistered, Ending)
                | (Streaming, Ending)
                | (Ending, Reconnect)
                | (Ending, Terminated)
                | (Reconnect, Init)
                | (Init, Terminated)
                | (Resuming, Terminated)
                | (FilterRegistered, Terminated)
                | (Streaming, Terminated)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 연결 파라미터 출처
#[derive(Clone)]
pub enum ParamsSource {
    /// 원격 설정 없음
    Local,
    /// 상태 서비스의 엔티티 설정 문서
    Remote {
        /// 설정 서버의 상태 서비스
        service: Arc<dyn StatusService>,
        /// 엔드포인트
        endpoints: StatusEndpoints,
        /// 엔티티
        entity: String,
    },
}

impl fmt::Debug for ParamsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("Local"),
            Self::Remote { endpoints, entity, .. } => f
                .debug_struct("Remote")
                .field("config", &endpoints.config)
                .field("entity", entity)
                .finish(),
        }
    }
}

impl ParamsSource {
    /// 연결 파라미터를 얻습니다.
    pub fn acquire(&self) -> Result<ConnectionParams, LogPipelineError> {
        match self {
            Self::Local => Ok(ConnectionParams::local()),
            Self::Remote {
                service,
                endpoints,
                entity,
            } => ConnectionParams::fetch(service.as_ref(), endpoints, entity),
        }
    }
}

/// 세션 하나에 적용되는 설정
///
/// 파이프라인 기본값에 원격 설정 문서의 값을 덮어써 결정합니다.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// 레코드 종류
    pub record_kind: RecordKind,
    /// 수집 모드
    pub mode: ConnectionMode,
    /// 이름 해석 여부
    pub resolve_mode: bool,
    /// 온라인 모드
    pub online_mode: bool,
    /// 등록할 규칙베이스
    pub rulebase: Option<PredicateTree>,
    /// 연결 파라미터
    pub params: ConnectionParams,
}

impl SessionSettings {
    /// 파이프라인 설정과 연결 파라미터로 세션 설정을 결정합니다.
    pub fn derive(config: &PipelineConfig, params: ConnectionParams) -> Result<Self, LogPipelineError> {
        params.validate(config.legacy_2000)?;

        let (record_kind, mode) = match params.mode {
            Some(mode) => (mode.record_kind(), mode),
            None if config.record_kind == RecordKind::Audit => (RecordKind::Audit, ConnectionMode::Audit),
            None => (config.record_kind, config.mode),
        };

        let rulebase = if config.legacy_2000 {
            None
        } else {
            FilterCompiler::compile_session_rulebase(config.rules_for(record_kind), mode, record_kind)?
        };

        Ok(Self {
            record_kind,
            mode,
            resolve_mode: params.resolve_mode.unwrap_or(config.resolve_mode),
            online_mode: config.online_mode || params.online_mode,
            rulebase,
            params,
        })
    }
}

/// 세션 종료 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// 대기 후 다시 INIT
    Reconnect {
        /// 종료 사유
        reason: EndReason,
    },
    /// 대상 처리 종료
    Terminated {
        /// 종료 사유
        reason: EndReason,
    },
}

impl SessionOutcome {
    /// 종료 사유
    pub fn reason(&self) -> EndReason {
        match self {
            Self::Reconnect { reason } | Self::Terminated { reason } => *reason,
        }
    }
}

/// 이벤트 처리 후 협력자에게 필요한 동작
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// 다음 이벤트를 기다림
    Continue,
    /// 중단된 세션을 재개
    Resume,
    /// 세션 종료
    Finish(SessionOutcome),
}

struct ActiveSession {
    formatter: RecordFormatter,
    file: LogFileEntry,
    last_position: i64,
}

/// 로그 파일 대상 하나의 세션 컨트롤러
pub struct SessionController {
    config: Arc<PipelineConfig>,
    store: CheckpointStore,
    params_source: ParamsSource,
    sleeper: Arc<dyn Sleeper>,
    retry: RetryPolicy,
    target: LogFileEntry,
    state: SessionState,
    established: bool,
    active: Option<ActiveSession>,
    pending_rulebase: Option<PredicateTree>,
}

impl SessionController {
    /// 컨트롤러를 생성합니다.
    pub fn new(
        config: Arc<PipelineConfig>,
        store: CheckpointStore,
        params_source: ParamsSource,
        sleeper: Arc<dyn Sleeper>,
        target: LogFileEntry,
    ) -> Self {
        let retry = RetryPolicy::new(config.max_retries, config.retry_factor);
        Self {
            config,
            store,
            params_source,
            sleeper,
            retry,
            target,
            state: SessionState::Init,
            established: false,
            active: None,
            pending_rulebase: None,
        }
    }

    /// 현재 상태
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// 세션이 한 번이라도 수립되었는지 여부
    pub fn was_established(&self) -> bool {
        self.established
    }

    /// 대상 로그 파일
    pub fn target(&self) -> &LogFileEntry {
        &self.target
    }

    fn transition(&mut self, next: SessionState) -> Result<(), SessionError> {
        if !self.state.can_transition_to(next) {
            return Err(SessionError::InvalidTransition {
                from: self.state.to_string(),
                event: next.to_string(),
            });
        }
        debug!(from = %self.state, to = %next, file = %self.target.name, "session state transition");
        self.state = next;
        Ok(())
    }

    fn abort(&mut self) {
        if self.state.can_transition_to(SessionState::Terminated) {
            self.state = SessionState::Terminated;
        }
        self.active = None;
        self.pending_rulebase = None;
    }

    /// 세션 하나를 열고 종료될 때까지 이벤트를 처리합니다.
    pub fn run_session(
        &mut self,
        connector: &mut dyn LeaConnector,
        sink: &mut dyn LogSink,
    ) -> Result<SessionOutcome, LogPipelineError> {
        let request = self.start()?;

        let mut session = match connector.open(&request) {
            Ok(session) => session,
            Err(e) => {
                warn!(file = %self.target.name, error = %e, "unable to open session");
                return Ok(self.finish(EndReason::UnableToAttachComm, 0)?);
            }
        };

        if let Err(e) = self.attach(session.as_mut()) {
            self.abort();
            return Err(e);
        }

        loop {
            let event = match session.next_event() {
                Ok(event) => event,
                Err(e) => {
                    warn!(file = %self.target.name, error = %e, "session event loop failed");
                    SessionEvent::End {
                        reason: EndReason::CommFailure,
                        position: self.active.as_ref().map_or(0, |a| a.last_position),
                    }
                }
            };

            let directive = match self.handle_event(event, sink) {
                Ok(directive) => directive,
                Err(e) => {
                    self.abort();
                    return Err(e);
                }
            };

            match directive {
                Directive::Continue => {}
                Directive::Resume => {
                    if let Err(e) = session.resume() {
                        self.abort();
                        return Err(e.into());
                    }
                }
                Directive::Finish(outcome) => return Ok(outcome),
            }
        }
    }

    /// INIT부터 FILTER_REGISTERED까지 진행하고 세션 요청을 만듭니다.
    pub fn start(&mut self) -> Result<SessionRequest, LogPipelineError> {
        if self.state != SessionState::Init {
            self.transition(SessionState::Init)?;
        }
        self.active = None;

        let settings = match self
            .params_source
            .acquire()
            .and_then(|params| SessionSettings::derive(&self.config, params))
        {
            Ok(settings) => settings,
            Err(e) => {
                self.abort();
                return Err(e);
            }
        };

        let start = if self.store.is_enabled() {
            self.transition(SessionState::Resuming)?;
            match self.resume_point(settings.online_mode) {
                Ok(start) => start,
                Err(e) => {
                    self.abort();
                    return Err(e);
                }
            }
        } else if settings.online_mode {
            StartPosition::End
        } else {
            StartPosition::Start
        };

        self.transition(SessionState::FilterRegistered)?;

        let formatter = RecordFormatter::new(FormatOptions {
            record_kind: settings.record_kind,
            resolve_mode: settings.resolve_mode,
            date_format: self.config.date_format,
            separator: self.config.separator,
            selected_fields: self.config.fields.clone(),
        });

        info!(
            file = %self.target.name,
            file_id = self.target.file_id,
            record_kind = %settings.record_kind,
            mode = %settings.mode,
            start = ?start,
            filtered = settings.rulebase.is_some(),
            "starting log session"
        );

        let request = SessionRequest {
            target: self.target.clone(),
            start,
            record_kind: settings.record_kind,
            online: settings.online_mode,
            resolve: settings.resolve_mode,
            suspended: settings.rulebase.is_some(),
            params: settings.params.clone(),
        };

        self.active = Some(ActiveSession {
            formatter,
            file: self.target.clone(),
            last_position: 0,
        });
        self.pending_rulebase = settings.rulebase;
        Ok(request)
    }

    fn resume_point(&self, online: bool) -> Result<StartPosition, LogPipelineError> {
        let stored = self
            .store
            .get_last_position(self.target.file_id)
            .map_err(|e| SessionError::ResumeFailed {
                target: self.target.name.clone(),
                reason: e.to_string(),
            })?;

        Ok(match stored {
            _ if online => StartPosition::End,
            Some(position) if position > 0 => StartPosition::Position(position),
            _ => StartPosition::Start,
        })
    }

    /// 열린 세션에 규칙베이스를 등록합니다. 규칙이 없으면 바로 STREAMING입니다.
    pub fn attach(&mut self, session: &mut dyn LeaSession) -> Result<(), LogPipelineError> {
        match self.pending_rulebase.take() {
            Some(rulebase) => {
                debug!(rules = rulebase.len(), "registering filter rulebase");
                session.register_filter(&rulebase)?;
            }
            None => self.transition(SessionState::Streaming)?,
        }
        Ok(())
    }

    /// 이벤트 하나를 처리합니다.
    pub fn handle_event(
        &mut self,
        event: SessionEvent,
        sink: &mut dyn LogSink,
    ) -> Result<Directive, LogPipelineError> {
        match event {
            SessionEvent::Established => {
                self.established = true;
                metrics::gauge!(m::SESSION_CONNECTED).set(1.0);
                info!(file = %self.target.name, "session established");
                Ok(Directive::Continue)
            }
            SessionEvent::FilterAck => {
                if self.state == SessionState::FilterRegistered {
                    self.transition(SessionState::Streaming)?;
                    debug!("filter rulebase acknowledged, resuming session");
                    Ok(Directive::Resume)
                } else {
                    debug!(state = %self.state, "ignoring duplicate filter acknowledgement");
                    Ok(Directive::Continue)
                }
            }
            SessionEvent::Record(record) => {
                if self.state != SessionState::Streaming {
                    return Err(SessionError::InvalidTransition {
                        from: self.state.to_string(),
                        event: "record".to_owned(),
                    }
                    .into());
                }
                self.on_record(record, sink)?;
                Ok(Directive::Continue)
            }
            SessionEvent::LogSwitch(file) => {
                info!(from = %self.current_file().name, to = %file.name, "log file switched");
                if let Some(active) = self.active.as_mut() {
                    active.file = file;
                }
                Ok(Directive::Continue)
            }
            SessionEvent::End { reason, position } => {
                Ok(Directive::Finish(self.finish(reason, position)?))
            }
        }
    }

    fn on_record(
        &mut self,
        record: crate::format::RawRecord,
        sink: &mut dyn LogSink,
    ) -> Result<(), LogPipelineError> {
        let Some(active) = self.active.as_mut() else {
            return Err(SessionError::InvalidTransition {
                from: self.state.to_string(),
                event: "record".to_owned(),
            }
            .into());
        };

        let kind = active.formatter.record_kind().as_str();
        metrics::counter!(m::RECORDS_RECEIVED_TOTAL, m::LABEL_RECORD_KIND => kind).increment(1);

        let line = active.formatter.format(&record);
        if line.is_empty() {
            metrics::counter!(m::RECORDS_SUPPRESSED_TOTAL).increment(1);
        } else if let Err(e) = sink.write_line(&line) {
            metrics::counter!(m::SINK_WRITE_ERRORS_TOTAL).increment(1);
            error!(sink = sink.name(), error = %e, "failed to write record");
            return Err(e.into());
        } else {
            metrics::counter!(m::RECORDS_EMITTED_TOTAL, m::LABEL_RECORD_KIND => kind).increment(1);
        }

        active.last_position = record.position;

        let interval = self.config.commit_interval;
        let due = self.store.is_enabled()
            && interval > 0
            && record.position > 0
            && record.position.unsigned_abs() % interval == 0;
        if due {
            self.commit(record.position);
            if let Err(e) = self.store.report_health(true) {
                warn!(error = %e, "failed to report health");
            }
        }
        Ok(())
    }

    fn current_file(&self) -> &LogFileEntry {
        self.active.as_ref().map_or(&self.target, |a| &a.file)
    }

    fn commit(&self, position: i64) {
        let Some(entity) = self.store.entity() else {
            return;
        };
        let file = self.current_file();
        let checkpoint = Checkpoint {
            entity: entity.to_owned(),
            file_id: file.file_id,
            last_record_position: position,
            file_name: file.name.clone(),
        };
        self.store
            .commit_with_retry(&checkpoint, &self.retry, self.sleeper.as_ref());
    }

    fn finish(&mut self, reason: EndReason, position: i64) -> Result<SessionOutcome, SessionError> {
        self.transition(SessionState::Ending)?;
        metrics::gauge!(m::SESSION_CONNECTED).set(0.0);

        if self.store.is_enabled() {
            if position <= 0 {
                error!(file = %self.current_file().name, "unable to obtain last record position, skipping final checkpoint");
            } else {
                self.commit(position);
            }
            if let Err(e) = self.store.report_health(false) {
                warn!(error = %e, "failed to report health");
            }
        }

        let class = reason.class();
        metrics::counter!(m::SESSIONS_ENDED_TOTAL, m::LABEL_END_CLASS => class.as_str()).increment(1);

        let outcome = if reason.should_reconnect(self.established) {
            self.transition(SessionState::Reconnect)?;
            warn!(file = %self.target.name, %reason, "session ended, will reconnect");
            SessionOutcome::Reconnect { reason }
        } else {
            self.transition(SessionState::Terminated)?;
            if reason.is_error() {
                error!(file = %self.target.name, %reason, established = self.established, "session terminated");
            } else {
                info!(file = %self.target.name, %reason, "session ended");
            }
            SessionOutcome::Terminated { reason }
        };

        self.active = None;
        Ok(outcome)
    }
}
