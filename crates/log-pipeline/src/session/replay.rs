//! JSON Lines 재생 협력자
//!
//! 실제 전송 SDK 없이 수집 흐름을 돌려볼 수 있도록, 미리 기록된 이벤트 스크립트를
//! 세션 이벤트로 재생합니다. 한 줄에 이벤트 하나이며 `end` 이벤트가 세션 경계입니다.
//!
//! ```text
//! {"event":"logfile","name":"fw.log","file_id":0}
//! {"event":"established"}
//! {"event":"record","position":0,"fields":[{"name":"action","value":{"type":"action_code","value":4},"resolved":"accept"}]}
//! {"event":"end","reason":"comm_failure"}
//! ```
//!
//! 빈 줄과 `#`으로 시작하는 줄은 무시합니다.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::debug;

use loggrabber_core::error::SessionError;
use loggrabber_core::types::LogFileEntry;

use super::collaborator::{LeaConnector, LeaSession, SessionEvent, SessionRequest, StartPosition};
use super::end_reason::EndReason;
use crate::connection::ConnectionParams;
use crate::error::LogPipelineError;
use crate::filter::PredicateTree;
use crate::format::{RawField, RawRecord};

/// 스크립트 한 줄
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReplayEvent {
    /// 열거 대상 로그 파일 선언
    Logfile {
        /// 파일 이름
        name: String,
        /// 파일 ID
        file_id: i32,
    },
    /// 세션 수립
    Established,
    /// 레코드
    Record {
        /// 스트림 위치 (0부터)
        position: i64,
        /// 속성
        fields: Vec<RawField>,
    },
    /// 로그 파일 전환
    LogSwitch {
        /// 새 파일 이름
        name: String,
        /// 새 파일 ID
        file_id: i32,
    },
    /// 세션 종료
    End {
        /// 종료 사유
        reason: EndReason,
        /// 마지막 위치 (없으면 마지막 레코드 위치)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        position: Option<i64>,
    },
}

/// 파싱된 재생 스크립트
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayScript {
    logfiles: Vec<LogFileEntry>,
    sessions: VecDeque<Vec<ReplayEvent>>,
}

impl ReplayScript {
    /// 스크립트 텍스트를 파싱합니다.
    pub fn parse(text: &str) -> Result<Self, LogPipelineError> {
        let mut script = Self::default();
        let mut current = Vec::new();

        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let event: ReplayEvent =
                serde_json::from_str(line).map_err(|e| LogPipelineError::Replay {
                    line: index + 1,
                    reason: e.to_string(),
                })?;

            match event {
                ReplayEvent::Logfile { name, file_id } => {
                    script.logfiles.push(LogFileEntry { name, file_id });
                }
                end @ ReplayEvent::End { .. } => {
                    current.push(end);
                    script.sessions.push_back(std::mem::take(&mut current));
                }
                other => current.push(other),
            }
        }

        if !current.is_empty() {
            script.sessions.push_back(current);
        }
        Ok(script)
    }

    /// 파일에서 스크립트를 읽습니다.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LogPipelineError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// 선언된 로그 파일
    pub fn logfiles(&self) -> &[LogFileEntry] {
        &self.logfiles
    }

    /// 남은 세션 수
    pub fn remaining_sessions(&self) -> usize {
        self.sessions.len()
    }
}

/// 재생 협력자
pub struct ReplayConnector {
    script: ReplayScript,
    requests: Arc<Mutex<Vec<SessionRequest>>>,
    rulebases: Arc<Mutex<Vec<PredicateTree>>>,
}

impl ReplayConnector {
    /// 스크립트로 협력자를 생성합니다.
    pub fn new(script: ReplayScript) -> Self {
        Self {
            script,
            requests: Arc::default(),
            rulebases: Arc::default(),
        }
    }

    /// 받은 세션 요청 기록
    pub fn request_log(&self) -> Arc<Mutex<Vec<SessionRequest>>> {
        Arc::clone(&self.requests)
    }

    /// 등록된 필터 규칙베이스 기록
    pub fn rulebase_log(&self) -> Arc<Mutex<Vec<PredicateTree>>> {
        Arc::clone(&self.rulebases)
    }
}

impl LeaConnector for ReplayConnector {
    fn name(&self) -> &str {
        "replay"
    }

    fn list_logfiles(
        &mut self,
        _params: &ConnectionParams,
    ) -> Result<Vec<LogFileEntry>, SessionError> {
        Ok(self.script.logfiles.clone())
    }

    fn open(&mut self, request: &SessionRequest) -> Result<Box<dyn LeaSession>, SessionError> {
        let events = self
            .script
            .sessions
            .pop_front()
            .ok_or_else(|| SessionError::OpenFailed {
                target: request.target.name.clone(),
                reason: "replay script has no more sessions".to_owned(),
            })?;

        if let Ok(mut log) = self.requests.lock() {
            log.push(request.clone());
        }
        debug!(
            target_file = %request.target.name,
            start = ?request.start,
            events = events.len(),
            "opening replay session"
        );

        Ok(Box::new(ReplaySession {
            events: events.into(),
            suspended: request.suspended,
            pending_ack: false,
            start: request.start,
            last_position: 0,
            rulebases: Arc::clone(&self.rulebases),
        }))
    }
}

struct ReplaySession {
    events: VecDeque<ReplayEvent>,
    suspended: bool,
    pending_ack: bool,
    start: StartPosition,
    last_position: i64,
    rulebases: Arc<Mutex<Vec<PredicateTree>>>,
}

impl LeaSession for ReplaySession {
    fn register_filter(&mut self, rulebase: &PredicateTree) -> Result<(), SessionError> {
        if !self.suspended {
            return Err(SessionError::FilterRegistration(
                "filters can only be registered on a suspended session".to_owned(),
            ));
        }
        if let Ok(mut log) = self.rulebases.lock() {
            log.push(rulebase.clone());
        }
        self.pending_ack = true;
        Ok(())
    }

    fn resume(&mut self) -> Result<(), SessionError> {
        self.suspended = false;
        Ok(())
    }

    fn next_event(&mut self) -> Result<SessionEvent, SessionError> {
        if self.pending_ack {
            self.pending_ack = false;
            return Ok(SessionEvent::FilterAck);
        }

        loop {
            let Some(event) = self.events.pop_front() else {
                return Ok(SessionEvent::End {
                    reason: EndReason::EndByApplication,
                    position: self.last_position,
                });
            };

            match event {
                ReplayEvent::Established => return Ok(SessionEvent::Established),
                ReplayEvent::Record { position, fields } if self.suspended => {
                    self.events
                        .push_front(ReplayEvent::Record { position, fields });
                    return Err(SessionError::InvalidTransition {
                        from: "suspended".to_owned(),
                        event: "record".to_owned(),
                    });
                }
                ReplayEvent::Record { position, fields } => {
                    if let StartPosition::Position(from) = self.start
                        && position < from
                    {
                        continue;
                    }
                    self.last_position = position;
                    return Ok(SessionEvent::Record(RawRecord::new(position, fields)));
                }
                ReplayEvent::LogSwitch { name, file_id } => {
                    return Ok(SessionEvent::LogSwitch(LogFileEntry { name, file_id }));
                }
                ReplayEvent::End { reason, position } => {
                    return Ok(SessionEvent::End {
                        reason,
                        position: position.unwrap_or(self.last_position),
                    });
                }
                ReplayEvent::Logfile { .. } => continue,
            }
        }
    }
}
