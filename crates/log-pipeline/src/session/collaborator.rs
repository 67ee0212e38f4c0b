//! 세션 협력자 인터페이스
//!
//! 전송 계층의 세션 협상, 인증, 로그 파일 열거는 외부 SDK가 담당합니다. 컨트롤러는
//! 이 모듈의 trait을 통해서만 협력자와 대화하며, 협력자가 소유한 이벤트 루프를
//! [`LeaSession::next_event`]로 한 단계씩 끌어옵니다.

use serde::{Deserialize, Serialize};

use loggrabber_core::error::SessionError;
use loggrabber_core::types::{LogFileEntry, RecordKind};

use super::end_reason::EndReason;
use crate::connection::ConnectionParams;
use crate::filter::PredicateTree;
use crate::format::RawRecord;

/// 세션 시작 위치
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "at", content = "position")]
pub enum StartPosition {
    /// 파일 처음부터
    Start,
    /// 파일 끝부터 (온라인 모드)
    End,
    /// 저장된 위치부터
    Position(i64),
}

/// 세션 생성 요청
#[derive(Debug, Clone)]
pub struct SessionRequest {
    /// 읽을 로그 파일
    pub target: LogFileEntry,
    /// 시작 위치
    pub start: StartPosition,
    /// 레코드 종류
    pub record_kind: RecordKind,
    /// 온라인 모드
    pub online: bool,
    /// 이름 해석 여부
    pub resolve: bool,
    /// 필터 등록 전까지 중단 상태로 열지 여부
    pub suspended: bool,
    /// 연결 파라미터
    pub params: ConnectionParams,
}

/// 협력자가 전달하는 세션 이벤트
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// 세션 수립
    Established,
    /// 필터 규칙베이스 등록 확인
    FilterAck,
    /// 레코드 도착
    Record(RawRecord),
    /// 로그 파일 전환 (온라인 모드의 로그 스위치)
    LogSwitch(LogFileEntry),
    /// 세션 종료
    End {
        /// 종료 사유
        reason: EndReason,
        /// 협력자가 보고한 마지막 레코드 위치
        position: i64,
    },
}

/// 열린 세션 하나
pub trait LeaSession: Send {
    /// 필터 규칙베이스를 등록합니다. 확인은 [`SessionEvent::FilterAck`]로 도착합니다.
    fn register_filter(&mut self, rulebase: &PredicateTree) -> Result<(), SessionError>;

    /// 중단된 세션의 레코드 전달을 재개합니다.
    fn resume(&mut self) -> Result<(), SessionError>;

    /// 다음 이벤트를 기다립니다.
    fn next_event(&mut self) -> Result<SessionEvent, SessionError>;
}

/// 세션을 여는 협력자
pub trait LeaConnector: Send {
    /// 협력자 이름
    fn name(&self) -> &str;

    /// 서버가 보유한 로그 파일 목록을 열거합니다.
    fn list_logfiles(&mut self, params: &ConnectionParams) -> Result<Vec<LogFileEntry>, SessionError>;

    /// 세션을 엽니다.
    fn open(&mut self, request: &SessionRequest) -> Result<Box<dyn LeaSession>, SessionError>;
}
