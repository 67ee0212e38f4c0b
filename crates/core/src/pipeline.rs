//! 외부 협력자 trait: 상태 서비스와 출력 싱크의 확장 포인트 정의

use crate::error::{SinkError, StatusError};

/// HTTP 스타일 상태 코드: 이 값 미만이면 성공
pub const HTTP_SUCCESS_CEILING: u16 = 300;

/// HTTP 스타일 상태 코드: 대상 없음
pub const HTTP_NOT_FOUND: u16 = 404;

/// 상태 서비스 응답
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusResponse {
    /// 응답 본문 (키/값 문서)
    pub body: String,
    /// HTTP 스타일 상태 코드
    pub status: u16,
}

impl StatusResponse {
    pub fn new(body: impl Into<String>, status: u16) -> Self {
        Self {
            body: body.into(),
            status,
        }
    }

    /// 상태 코드가 300 미만이면 성공입니다.
    pub fn is_success(&self) -> bool {
        self.status < HTTP_SUCCESS_CEILING
    }

    pub fn is_not_found(&self) -> bool {
        self.status == HTTP_NOT_FOUND
    }
}

/// 원격 설정/상태 서비스 호출 trait
///
/// `params`가 비어 있으면 조회, 비어 있지 않으면 게시로 취급합니다.
/// 프로세스 실행이나 전송 자체가 실패하면 `Err`, 서비스가 응답했다면
/// 상태 코드와 무관하게 `Ok`를 반환합니다.
pub trait StatusService: Send + Sync {
    fn call(&self, endpoint: &str, params: &[(String, String)])
    -> Result<StatusResponse, StatusError>;
}

/// 포맷된 레코드 한 줄을 받는 출력 싱크
pub trait LogSink: Send {
    /// 싱크 이름
    fn name(&self) -> &str;

    /// 한 줄을 기록합니다. 줄바꿈은 싱크가 붙입니다.
    fn write_line(&mut self, line: &str) -> Result<(), SinkError>;

    /// 버퍼를 비웁니다.
    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

impl<T: LogSink + ?Sized> LogSink for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn write_line(&mut self, line: &str) -> Result<(), SinkError> {
        (**self).write_line(line)
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        (**self).flush()
    }
}
