//! 세션 종료 사유
//!
//! 종료 사유는 재접속 대상인 일시적 사유와 처리를 끝내는 최종 사유로 나뉩니다.
//! 일시적 사유도 세션이 한 번이라도 수립된 적이 없으면 최종 사유로 취급합니다.

use std::fmt;

use serde::{Deserialize, Serialize};

/// 종료 사유 분류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndClass {
    /// 처리 종료
    Terminal,
    /// 수립 이력이 있으면 재접속
    Transient,
}

impl EndClass {
    /// 메트릭 레이블 값
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Terminal => "terminal",
            Self::Transient => "transient",
        }
    }
}

/// 협력자가 보고하는 세션 종료 사유
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// 애플리케이션이 세션을 끝냄 (오프라인 읽기 완료)
    EndByApplication,
    /// 세션 시간 초과
    SessionTimeout,
    /// 세션이 종료되지 않음
    SessionNotEnded,
    /// 연결 수립 실패
    UnableToAttachComm,
    /// 상대편 라이브러리 초기화 실패
    EntityTypeSessionInitFail,
    /// 상대편 시작 핸들러 실패
    EntitySessionInitFail,
    /// 통신 실패
    CommFailure,
    /// 상대편 버전 불일치
    BadVersion,
    /// 상대편이 연결을 끊음
    PeerSendDrop,
    /// 상대편 종료
    PeerEnded,
    /// 상대편이 연결을 재설정
    PeerSendReset,
    /// 통신 불가
    CommIsDead,
    /// SIC 인증 실패
    SicFailure,
    /// 알 수 없는 사유
    #[serde(other)]
    Unknown,
}

impl EndReason {
    /// 사유 분류
    pub fn class(&self) -> EndClass {
        match self {
            Self::UnableToAttachComm
            | Self::CommFailure
            | Self::PeerSendDrop
            | Self::PeerSendReset
            | Self::CommIsDead => EndClass::Transient,
            _ => EndClass::Terminal,
        }
    }

    /// 수립 이력을 고려해 재접속해야 하는지 판단합니다.
    pub fn should_reconnect(&self, was_established: bool) -> bool {
        self.class() == EndClass::Transient && was_established
    }

    /// 정상 종료가 아닌 사유인지 여부
    pub fn is_error(&self) -> bool {
        !matches!(
            self,
            Self::EndByApplication | Self::SessionTimeout | Self::SessionNotEnded
        )
    }

    /// 사유 설명
    pub fn description(&self) -> &'static str {
        match self {
            Self::EndByApplication => "the session has been ended",
            Self::SessionTimeout => "the session timed out",
            Self::SessionNotEnded => "the session has not been terminated",
            Self::UnableToAttachComm => "failed to establish connection",
            Self::EntityTypeSessionInitFail => {
                "peer library failed to initialize the session"
            }
            Self::EntitySessionInitFail => "peer start handler failed",
            Self::CommFailure => "communication failure",
            Self::BadVersion => "incorrect version at other side",
            Self::PeerSendDrop => "the peer dropped the connection",
            Self::PeerEnded => "the peer ended the session",
            Self::PeerSendReset => "the peer reset the connection",
            Self::CommIsDead => "no communication",
            Self::SicFailure => "SIC authentication failure",
            Self::Unknown => "unknown reason of session end",
        }
    }
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [EndReason; 14] = [
        EndReason::EndByApplication,
        EndReason::SessionTimeout,
        EndReason::SessionNotEnded,
        EndReason::UnableToAttachComm,
        EndReason::EntityTypeSessionInitFail,
        EndReason::EntitySessionInitFail,
        EndReason::CommFailure,
        EndReason::BadVersion,
        EndReason::PeerSendDrop,
        EndReason::PeerEnded,
        EndReason::PeerSendReset,
        EndReason::CommIsDead,
        EndReason::SicFailure,
        EndReason::Unknown,
    ];

    #[test]
    fn transient_reasons() {
        let transient: Vec<_> = ALL
            .iter()
            .filter(|r| r.class() == EndClass::Transient)
            .collect();
        assert_eq!(
            transient,
            vec![
                &EndReason::UnableToAttachComm,
                &EndReason::CommFailure,
                &EndReason::PeerSendDrop,
                &EndReason::PeerSendReset,
                &EndReason::CommIsDead,
            ]
        );
    }

    #[test]
    fn transient_requires_prior_establishment() {
        assert!(EndReason::CommFailure.should_reconnect(true));
        assert!(!EndReason::CommFailure.should_reconnect(false));
        assert!(!EndReason::PeerEnded.should_reconnect(true));
    }

    #[test]
    fn clean_endings_are_not_errors() {
        assert!(!EndReason::EndByApplication.is_error());
        assert!(!EndReason::SessionTimeout.is_error());
        assert!(EndReason::SicFailure.is_error());
        assert!(EndReason::Unknown.is_error());
    }

    #[test]
    fn unknown_names_deserialize_to_unknown() {
        let reason: EndReason = serde_json::from_str("\"comm_failure\"").unwrap();
        assert_eq!(reason, EndReason::CommFailure);
        let reason: EndReason = serde_json::from_str("\"martian\"").unwrap();
        assert_eq!(reason, EndReason::Unknown);
    }
}
