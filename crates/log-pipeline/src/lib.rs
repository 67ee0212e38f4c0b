//! loggrabber 수집 파이프라인
//!
//! LEA 세션 협력자로부터 방화벽/감사 로그 레코드를 받아 한 줄 텍스트로 포맷하고,
//! 외부 상태 서비스에 읽기 위치를 체크포인트로 남깁니다.
//!
//! # 모듈 구성
//!
//! - [`catalog`]: 레코드 종류별 필드 어휘와 필터 인자 목록
//! - [`filter`]: 필터 규칙 문자열을 술어 트리로 컴파일
//! - [`format`]: 레코드를 `name=value` 한 줄로 변환
//! - [`checkpoint`]: 읽기 위치와 연결 상태 기록, 재시도 정책
//! - [`connection`]: 원격 연결 설정 문서 해석
//! - [`session`]: 세션 상태 머신과 협력자 trait, 재생 협력자
//! - [`targets`]: 수집 대상 로그 파일 결정
//! - [`sink`]: 화면/로테이션 파일/메모리 싱크
//! - [`status_command`]: Splunk CLI 기반 상태 서비스
//! - [`pipeline`]: 대상별 세션 반복 (재접속 포함)
//! - [`config`]: 파이프라인 설정 (core 설정 확장)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! LeaConnector -> SessionController -> RecordFormatter -> LogSink
//!      ^                 |
//!  PredicateTree    CheckpointStore -> StatusService
//! ```

pub mod catalog;
pub mod checkpoint;
pub mod config;
pub mod connection;
pub mod error;
pub mod filter;
pub mod format;
pub mod pipeline;
pub mod session;
pub mod sink;
pub mod status_command;
pub mod targets;

// --- 주요 타입 re-export ---

// 파이프라인
pub use pipeline::{LogPipeline, LogPipelineBuilder, PipelineReport, TargetReport};

// 설정
pub use config::{PipelineConfig, PipelineConfigBuilder, TrackingConfig};

// 에러
pub use error::LogPipelineError;

// 필드 어휘와 필터
pub use catalog::{FieldCatalog, FieldDescriptor};
pub use filter::{FilterCompiler, Predicate, PredicateOp, PredicateTree, Rule, RuleAction};

// 포맷
pub use format::{FormatOptions, RawField, RawRecord, RecordFormatter};

// 체크포인트
pub use checkpoint::{CheckpointStore, RetryOutcome, RetryPolicy, Sleeper, StatusEndpoints};

// 세션
pub use connection::ConnectionParams;
pub use session::{
    EndReason, LeaConnector, LeaSession, ParamsSource, ReplayConnector, ReplayScript,
    SessionController, SessionEvent, SessionOutcome, SessionState, StartPosition,
};

// 싱크
pub use sink::{MemorySink, RotatingFileSink, ScreenSink};

// 상태 서비스
pub use status_command::CommandStatusService;
