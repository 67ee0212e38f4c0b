//! 로그 파이프라인 에러 타입
//!
//! [`LogPipelineError`]는 파이프라인 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<LogPipelineError> for LoggrabberError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use loggrabber_core::error::{
    ConfigError, FilterError, LoggrabberError, SessionError, SinkError, StatusError,
};

/// 로그 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum LogPipelineError {
    /// 필터 규칙 컴파일 실패 (시작 시 치명적)
    #[error(transparent)]
    Filter(#[from] FilterError),

    /// 상태 서비스 호출 실패
    #[error(transparent)]
    Status(#[from] StatusError),

    /// 세션 처리 실패
    #[error(transparent)]
    Session(#[from] SessionError),

    /// 출력 싱크 실패
    #[error(transparent)]
    Sink(#[from] SinkError),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// core 설정 에러 (필수 연결 파라미터 누락 등)
    #[error(transparent)]
    CoreConfig(#[from] ConfigError),

    /// 재생 스크립트 해석 실패
    #[error("replay error at line {line}: {reason}")]
    Replay {
        /// 스크립트 줄 번호 (1부터)
        line: usize,
        /// 실패 사유
        reason: String,
    },

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LogPipelineError> for LoggrabberError {
    fn from(err: LogPipelineError) -> Self {
        match err {
            LogPipelineError::Filter(e) => LoggrabberError::Filter(e),
            LogPipelineError::Status(e) => LoggrabberError::Status(e),
            LogPipelineError::Session(e) => LoggrabberError::Session(e),
            LogPipelineError::Sink(e) => LoggrabberError::Sink(e),
            LogPipelineError::CoreConfig(e) => LoggrabberError::Config(e),
            LogPipelineError::Config { field, reason } => {
                LoggrabberError::Config(ConfigError::InvalidValue { field, reason })
            }
            LogPipelineError::Replay { line, reason } => {
                LoggrabberError::Session(SessionError::OpenFailed {
                    target: format!("replay line {line}"),
                    reason,
                })
            }
            LogPipelineError::Io(e) => LoggrabberError::Io(e),
        }
    }
}
