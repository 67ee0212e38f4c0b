//! 에러 타입: 도메인별 에러 정의

/// loggrabber 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum LoggrabberError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 필터 규칙 컴파일 에러
    #[error("filter error: {0}")]
    Filter(#[from] FilterError),

    /// 상태 서비스 호출 에러
    #[error("status service error: {0}")]
    Status(#[from] StatusError),

    /// 세션 처리 에러
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// 출력 싱크 에러
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// 필수 연결 파라미터 누락
    #[error("missing connection parameter: {name}")]
    MissingParameter { name: String },
}

/// 필터 규칙 컴파일 에러
///
/// 두 변형 모두 문제가 된 규칙 조각을 메시지에 포함합니다.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    /// 문법 오류 또는 지원하지 않는 값
    #[error("syntax error in rule argument '{fragment}': {reason}")]
    Syntax { fragment: String, reason: String },

    /// 레코드 종류의 어휘에 없는 인자 이름
    #[error("unknown filter argument '{name}' for {kind} records")]
    UnknownField { name: String, kind: String },
}

/// 상태 서비스 호출 에러
#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    /// 호출 자체가 실패 (프로세스 실행, 전송 실패 등)
    #[error("call to {endpoint} failed: {reason}")]
    CallFailed { endpoint: String, reason: String },

    /// 성공이 아닌 HTTP 상태 코드
    #[error("{endpoint} returned http status {status}")]
    HttpStatus { endpoint: String, status: u16 },

    /// 응답 문서에서 필요한 키를 찾지 못함
    #[error("response from {endpoint} is missing key '{key}'")]
    MissingKey { endpoint: String, key: String },

    /// 응답 문서의 값을 해석할 수 없음
    #[error("invalid value for '{key}': {value}")]
    InvalidValue { key: String, value: String },
}

/// 세션 처리 에러
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// 세션 생성 실패
    #[error("failed to open session for {target}: {reason}")]
    OpenFailed { target: String, reason: String },

    /// 필터 등록 실패
    #[error("failed to register filter rulebase: {0}")]
    FilterRegistration(String),

    /// 재개 지점 조회 실패 (NotFound 이외)
    #[error("unable to get progress for {target}: {reason}")]
    ResumeFailed { target: String, reason: String },

    /// 재접속 대상이 아닌 종료 사유
    #[error("session terminated: {reason}")]
    Terminated { reason: String },

    /// 잘못된 상태 전이
    #[error("invalid transition from {from} on {event}")]
    InvalidTransition { from: String, event: String },
}

/// 출력 싱크 에러
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// 출력 파일 열기 실패
    #[error("failed to open output file {path}: {reason}")]
    Open { path: String, reason: String },

    /// 파일 로테이션 실패
    #[error("failed to rotate {path}: {reason}")]
    Rotate { path: String, reason: String },

    /// 쓰기 실패
    #[error("write failed: {0}")]
    Write(String),
}
