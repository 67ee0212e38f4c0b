//! loggrabber 공통 크레이트
//!
//! 에러 타입, 설정, 도메인 값 모델, 외부 협력자 trait, 메트릭 이름을
//! 정의합니다. 수집 로직은 `loggrabber-log-pipeline`에 있습니다.

pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, FilterError, LoggrabberError, SessionError, SinkError, StatusError};

// 설정
pub use config::LoggrabberConfig;

// 협력자 trait
pub use pipeline::{LogSink, StatusResponse, StatusService};

// 도메인 타입
pub use types::{
    Checkpoint, ConnectionMode, DateFormat, HealthStatus, LogFileEntry, RecordKind, TypedValue,
    ValueTag,
};
