//! 체크포인트 저장소
//!
//! 외부 상태 서비스에 (엔티티, 파일) 단위 읽기 위치와 엔티티 연결 상태를 기록합니다.
//! 엔티티가 설정되지 않으면 모든 연산은 호출 없이 성공합니다.
//!
//! # 엔드포인트
//! - 설정: `/servicesNS/nobody/<app>/opsec/opsec_conf/<entity>`
//! - 로그 위치: `/servicesNS/nobody/<app>/opsec/log_status/<fileid>@<entity>`
//! - 연결 상태: `/servicesNS/nobody/<app>/opsec/entity_health/<entity>`

pub mod document;
pub mod retry;

pub use document::StatusDocument;
pub use retry::{RetryOutcome, RetryPolicy, Sleeper, ThreadSleeper};

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use loggrabber_core::error::StatusError;
use loggrabber_core::metrics as m;
use loggrabber_core::pipeline::{StatusResponse, StatusService};
use loggrabber_core::types::{Checkpoint, HealthStatus, status_key};

/// 연결 시각 형식 (UTC)
pub const CONNECTION_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// 체크포인트 위치 키
pub const LAST_POSITION_KEY: &str = "last_rec_pos";

/// 마지막 연결 시각 키
pub const LAST_CONNECTION_KEY: &str = "last_connection_timestamp";

/// 앱별 상태 엔드포인트
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEndpoints {
    /// 연결 설정 문서
    pub config: String,
    /// 로그 위치
    pub log_status: String,
    /// 엔티티 연결 상태
    pub entity_health: String,
}

impl StatusEndpoints {
    /// 앱 이름으로 엔드포인트를 만듭니다.
    pub fn for_app(app_name: &str) -> Self {
        let base = format!("/servicesNS/nobody/{app_name}/opsec");
        Self {
            config: format!("{base}/opsec_conf/"),
            log_status: format!("{base}/log_status/"),
            entity_health: format!("{base}/entity_health/"),
        }
    }
}

/// 상태 서비스를 호출하고 지연 시간을 기록합니다.
pub(crate) fn timed_call(
    service: &dyn StatusService,
    endpoint: &str,
    params: &[(String, String)],
) -> Result<StatusResponse, StatusError> {
    let started = Instant::now();
    let result = service.call(endpoint, params);
    metrics::histogram!(m::STATUS_CALL_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
    result
}

#[derive(Clone)]
struct Tracking {
    service: Arc<dyn StatusService>,
    endpoints: StatusEndpoints,
    entity: String,
}

/// 체크포인트 저장소
#[derive(Clone)]
pub struct CheckpointStore {
    tracking: Option<Tracking>,
    clock: fn() -> DateTime<Utc>,
}

impl std::fmt::Debug for CheckpointStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckpointStore")
            .field("entity", &self.entity())
            .field("endpoints", &self.tracking.as_ref().map(|t| &t.endpoints))
            .finish()
    }
}

impl CheckpointStore {
    /// 엔티티 추적이 켜진 저장소를 생성합니다.
    pub fn new(
        service: Arc<dyn StatusService>,
        endpoints: StatusEndpoints,
        entity: impl Into<String>,
    ) -> Self {
        Self {
            tracking: Some(Tracking {
                service,
                endpoints,
                entity: entity.into(),
            }),
            clock: Utc::now,
        }
    }

    /// 추적이 꺼진 저장소를 생성합니다.
    pub fn disabled() -> Self {
        Self {
            tracking: None,
            clock: Utc::now,
        }
    }

    /// 연결 시각에 사용할 시계를 바꿉니다.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    /// 추적 활성 여부
    pub fn is_enabled(&self) -> bool {
        self.tracking.is_some()
    }

    /// 추적 중인 엔티티
    pub fn entity(&self) -> Option<&str> {
        self.tracking.as_ref().map(|t| t.entity.as_str())
    }

    /// 마지막으로 커밋된 위치를 조회합니다.
    ///
    /// 상태가 없으면(not found) `Ok(None)`이며 처음부터 읽어야 함을 뜻합니다.
    pub fn get_last_position(&self, file_id: i32) -> Result<Option<i64>, StatusError> {
        let Some(t) = &self.tracking else {
            return Ok(None);
        };

        let endpoint = format!("{}{}", t.endpoints.log_status, status_key(file_id, &t.entity));
        let response = timed_call(t.service.as_ref(), &endpoint, &[])?;

        if response.is_not_found() {
            debug!(file_id, entity = %t.entity, "no stored position, starting from the beginning");
            return Ok(None);
        }
        if !response.is_success() {
            return Err(StatusError::HttpStatus {
                endpoint,
                status: response.status,
            });
        }

        let doc = StatusDocument::parse(&response.body);
        let raw = doc
            .get_non_empty(LAST_POSITION_KEY)
            .ok_or_else(|| StatusError::MissingKey {
                endpoint: endpoint.clone(),
                key: LAST_POSITION_KEY.to_owned(),
            })?;
        let position = parse_position(raw)?;

        info!(file_id, entity = %t.entity, position, "stored position retrieved");
        Ok(Some(position))
    }

    /// 위치를 기록합니다.
    pub fn commit_position(&self, checkpoint: &Checkpoint) -> Result<(), StatusError> {
        let Some(t) = &self.tracking else {
            return Ok(());
        };

        let params = vec![
            ("name".to_owned(), checkpoint.key()),
            ("fileid".to_owned(), checkpoint.file_id.to_string()),
            ("filename".to_owned(), checkpoint.file_name.clone()),
            (
                LAST_POSITION_KEY.to_owned(),
                checkpoint.last_record_position.to_string(),
            ),
        ];
        post(t, &t.endpoints.log_status, &params)?;

        metrics::gauge!(m::CHECKPOINT_LAST_POSITION).set(checkpoint.last_record_position as f64);
        debug!(
            key = %checkpoint.key(),
            file = %checkpoint.file_name,
            position = checkpoint.last_record_position,
            "position committed"
        );
        Ok(())
    }

    /// 재시도 정책에 따라 위치를 기록합니다.
    ///
    /// 최종 실패는 로그로만 남기고 수집을 계속합니다.
    pub fn commit_with_retry(
        &self,
        checkpoint: &Checkpoint,
        policy: &RetryPolicy,
        sleeper: &dyn Sleeper,
    ) -> RetryOutcome {
        if !self.is_enabled() {
            return RetryOutcome::Succeeded { attempts: 0 };
        }

        let outcome = policy.run("checkpoint commit", sleeper, |attempt| {
            if attempt > 1 {
                metrics::counter!(m::CHECKPOINT_RETRIES_TOTAL).increment(1);
            }
            self.commit_position(checkpoint)
        });

        let result = if outcome.is_success() { "success" } else { "failure" };
        metrics::counter!(m::CHECKPOINT_COMMITS_TOTAL, m::LABEL_RESULT => result).increment(1);
        if !outcome.is_success() {
            error!(
                key = %checkpoint.key(),
                position = checkpoint.last_record_position,
                "giving up on checkpoint commit, records may be duplicated on restart"
            );
        }
        outcome
    }

    /// 엔티티 연결 상태를 기록합니다.
    ///
    /// 연결 중이면 현재 시각을, 아니면 기존 값을 먼저 읽어 마지막 연결 시각을 유지합니다.
    /// 기존 값을 읽지 못하면 아무것도 기록하지 않고 에러를 돌려줍니다.
    /// 추적이 꺼져 있으면 `Ok(None)`입니다.
    pub fn report_health(&self, connected: bool) -> Result<Option<HealthStatus>, StatusError> {
        let Some(t) = &self.tracking else {
            return Ok(None);
        };

        let timestamp = if connected {
            (self.clock)().format(CONNECTION_TIMESTAMP_FORMAT).to_string()
        } else {
            self.stored_connection_timestamp(t)?
        };

        let status = HealthStatus {
            entity: t.entity.clone(),
            connected,
            last_connection_timestamp: timestamp,
        };

        let params = vec![
            ("name".to_owned(), status.entity.clone()),
            ("is_connected".to_owned(), u8::from(connected).to_string()),
            (
                LAST_CONNECTION_KEY.to_owned(),
                status.last_connection_timestamp.clone(),
            ),
        ];
        post(t, &t.endpoints.entity_health, &params)?;

        debug!(entity = %status.entity, connected, "health reported");
        Ok(Some(status))
    }

    /// 저장된 마지막 연결 시각. 저장된 상태가 없으면(not found) 빈 문자열입니다.
    fn stored_connection_timestamp(&self, t: &Tracking) -> Result<String, StatusError> {
        let endpoint = format!("{}{}", t.endpoints.entity_health, t.entity);
        let response = timed_call(t.service.as_ref(), &endpoint, &[])?;

        if response.is_not_found() {
            debug!(entity = %t.entity, "no stored health status");
            return Ok(String::new());
        }
        if !response.is_success() {
            return Err(StatusError::HttpStatus {
                endpoint,
                status: response.status,
            });
        }

        Ok(StatusDocument::parse(&response.body)
            .get(LAST_CONNECTION_KEY)
            .unwrap_or_default()
            .to_owned())
    }
}

fn post(t: &Tracking, endpoint: &str, params: &[(String, String)]) -> Result<(), StatusError> {
    let response = timed_call(t.service.as_ref(), endpoint, params)?;
    if response.is_success() {
        Ok(())
    } else {
        Err(StatusError::HttpStatus {
            endpoint: endpoint.to_owned(),
            status: response.status,
        })
    }
}

/// 저장된 위치 문자열을 엄격하게 파싱합니다 (10진수, 32비트 범위).
fn parse_position(raw: &str) -> Result<i64, StatusError> {
    raw.trim()
        .parse::<i32>()
        .map(i64::from)
        .map_err(|_| StatusError::InvalidValue {
            key: LAST_POSITION_KEY.to_owned(),
            value: raw.to_owned(),
        })
}
