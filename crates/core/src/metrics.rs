//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `loggrabber_`
//! - 모듈명: `records_`, `checkpoint_`, `session_`
//! - 접미어: `_total` (counter), `_seconds` (histogram), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(loggrabber_core::metrics::RECORDS_EMITTED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 레코드 종류 레이블 키 (traffic, audit)
pub const LABEL_RECORD_KIND: &str = "record_kind";

/// 종료 사유 분류 레이블 키 (terminal, transient)
pub const LABEL_END_CLASS: &str = "class";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

// ─── 레코드 처리 메트릭 ────────────────────────────────────────────

/// 수집기로부터 전달받은 레코드 수 (counter)
pub const RECORDS_RECEIVED_TOTAL: &str = "loggrabber_records_received_total";

/// 싱크에 기록된 레코드 수 (counter)
pub const RECORDS_EMITTED_TOTAL: &str = "loggrabber_records_emitted_total";

/// 필드 선택 후 빈 메시지여서 생략된 레코드 수 (counter)
pub const RECORDS_SUPPRESSED_TOTAL: &str = "loggrabber_records_suppressed_total";

/// 싱크 쓰기 실패 수 (counter)
pub const SINK_WRITE_ERRORS_TOTAL: &str = "loggrabber_sink_write_errors_total";

// ─── 체크포인트 메트릭 ─────────────────────────────────────────────

/// 커밋 시도 결과 (counter, label: result)
pub const CHECKPOINT_COMMITS_TOTAL: &str = "loggrabber_checkpoint_commits_total";

/// 커밋 재시도 수 (counter)
pub const CHECKPOINT_RETRIES_TOTAL: &str = "loggrabber_checkpoint_retries_total";

/// 마지막으로 커밋된 레코드 위치 (gauge)
pub const CHECKPOINT_LAST_POSITION: &str = "loggrabber_checkpoint_last_position";

/// 상태 서비스 호출 지연 시간 (histogram, 초)
pub const STATUS_CALL_DURATION_SECONDS: &str = "loggrabber_status_call_duration_seconds";

// ─── 세션 메트릭 ───────────────────────────────────────────────────

/// 종료된 세션 수 (counter, label: class)
pub const SESSIONS_ENDED_TOTAL: &str = "loggrabber_sessions_ended_total";

/// 재접속 횟수 (counter)
pub const SESSION_RECONNECTS_TOTAL: &str = "loggrabber_session_reconnects_total";

/// 현재 연결 상태 (gauge, 1=connected)
pub const SESSION_CONNECTED: &str = "loggrabber_session_connected";

/// 상태 서비스 호출 지연 버킷 (초)
pub const STATUS_CALL_DURATION_BUCKETS: [f64; 8] = [0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0];

/// 모든 메트릭 설명을 등록합니다.
///
/// 레코더가 설치되기 전에 호출해도 패닉하지 않습니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_counter!(
        RECORDS_RECEIVED_TOTAL,
        "Total number of records delivered by the log session"
    );
    describe_counter!(
        RECORDS_EMITTED_TOTAL,
        "Total number of formatted records written to the sink"
    );
    describe_counter!(
        RECORDS_SUPPRESSED_TOTAL,
        "Records dropped because no field survived selection"
    );
    describe_counter!(SINK_WRITE_ERRORS_TOTAL, "Total number of sink write failures");

    describe_counter!(
        CHECKPOINT_COMMITS_TOTAL,
        "Checkpoint commit outcomes by result"
    );
    describe_counter!(
        CHECKPOINT_RETRIES_TOTAL,
        "Number of checkpoint commit retries after a failure"
    );
    describe_gauge!(
        CHECKPOINT_LAST_POSITION,
        "Last record position committed to the status service"
    );
    describe_histogram!(
        STATUS_CALL_DURATION_SECONDS,
        "Latency of status service calls in seconds"
    );

    describe_counter!(SESSIONS_ENDED_TOTAL, "Ended sessions by end reason class");
    describe_counter!(SESSION_RECONNECTS_TOTAL, "Number of reconnects after transient failures");
    describe_gauge!(SESSION_CONNECTED, "Whether a log session is currently established");
}
