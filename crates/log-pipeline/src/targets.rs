//! 수집 대상 로그 파일 결정
//!
//! 감사 로그와 온라인 모드는 열거 없이 대상 하나를 만듭니다. 그 외에는 협력자가
//! 열거한 파일 중 설정된 이름을 포함하는 파일을 모두 읽습니다.

use tracing::{debug, info, warn};

use loggrabber_core::config::AUDIT_LOGFILE;
use loggrabber_core::types::{LogFileEntry, RecordKind};

use crate::config::PipelineConfig;
use crate::connection::ConnectionParams;
use crate::error::LogPipelineError;
use crate::session::LeaConnector;

/// 감사 로그의 파일 ID
pub const AUDIT_FILE_ID: i32 = -1;

/// 열거 결과가 없을 때 사용할 파일 ID
pub const DEFAULT_FILE_ID: i32 = 0;

/// 파이프라인 설정과 협력자의 열거 결과로 대상 목록을 만듭니다.
pub fn resolve_targets(
    config: &PipelineConfig,
    record_kind: RecordKind,
    online: bool,
    connector: &mut dyn LeaConnector,
    params: &ConnectionParams,
) -> Result<Vec<LogFileEntry>, LogPipelineError> {
    if record_kind == RecordKind::Audit {
        return Ok(vec![LogFileEntry {
            name: AUDIT_LOGFILE.to_owned(),
            file_id: AUDIT_FILE_ID,
        }]);
    }

    if online {
        return Ok(vec![LogFileEntry {
            name: config.logfile.clone(),
            file_id: DEFAULT_FILE_ID,
        }]);
    }

    let available = connector.list_logfiles(params)?;
    debug!(count = available.len(), connector = connector.name(), "log files enumerated");

    let targets = if config.reads_all_logfiles() {
        available
    } else {
        select_matching(&config.logfile, &available)
    };

    let targets = if targets.is_empty() {
        if config.reads_all_logfiles() {
            warn!("no log files enumerated");
        }
        vec![LogFileEntry {
            name: config.logfile.clone(),
            file_id: DEFAULT_FILE_ID,
        }]
    } else {
        targets
    };

    info!(
        targets = ?targets.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
        "log file targets resolved"
    );
    Ok(targets)
}

/// 이름에 `pattern`을 포함하는 파일을 열거 순서대로 고릅니다.
pub fn select_matching(pattern: &str, available: &[LogFileEntry]) -> Vec<LogFileEntry> {
    available
        .iter()
        .filter(|entry| entry.name.contains(pattern))
        .cloned()
        .collect()
}
