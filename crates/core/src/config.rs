//! 설정 관리: loggrabber.toml 파싱 및 런타임 설정
//!
//! [`LoggrabberConfig`]는 수집기 전체의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`LOGGRABBER_OUTPUT_DATE_FORMAT=unix` 형식)
//! 3. 설정 파일 (`loggrabber.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), loggrabber_core::error::LoggrabberError> {
//! use loggrabber_core::config::LoggrabberConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = LoggrabberConfig::load("loggrabber.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = LoggrabberConfig::parse("[output]\ndate_format = \"unix\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, LoggrabberError};
use crate::types::{ConnectionMode, DateFormat, RecordKind};

/// 기본 로그 파일 이름
pub const DEFAULT_LOGFILE: &str = "fw.log";

/// 감사 로그 파일 이름
pub const AUDIT_LOGFILE: &str = "fw.adtlog";

/// 열거된 모든 로그 파일을 선택하는 특수 이름
pub const ALL_LOGFILES: &str = "ALL";

/// loggrabber 통합 설정
///
/// `loggrabber.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggrabberConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// LEA 세션 설정
    #[serde(default)]
    pub lea: LeaConfig,
    /// 레코드 출력 설정
    #[serde(default)]
    pub output: OutputConfig,
    /// 필터 규칙
    #[serde(default)]
    pub filter: FilterConfig,
    /// 체크포인트/상태 서비스 설정
    #[serde(default)]
    pub status: StatusConfig,
    /// Prometheus 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl LoggrabberConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LoggrabberError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, LoggrabberError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LoggrabberError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                LoggrabberError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    ///
    /// 지원하지 않는 열거형 값(예: `date_format = "iso"`)은 여기서 실패합니다.
    pub fn parse(toml_str: &str) -> Result<Self, LoggrabberError> {
        toml::from_str(toml_str).map_err(|e| {
            LoggrabberError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `LOGGRABBER_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "LOGGRABBER_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "LOGGRABBER_GENERAL_LOG_FORMAT");

        // LEA
        override_parsed(&mut self.lea.record_kind, "LOGGRABBER_LEA_RECORD_KIND");
        override_bool(&mut self.lea.online_mode, "LOGGRABBER_LEA_ONLINE_MODE");
        override_bool(&mut self.lea.resolve_mode, "LOGGRABBER_LEA_RESOLVE_MODE");
        override_bool(&mut self.lea.legacy_2000, "LOGGRABBER_LEA_LEGACY_2000");
        override_string(&mut self.lea.logfile, "LOGGRABBER_LEA_LOGFILE");
        override_parsed(
            &mut self.lea.recovery_interval_secs,
            "LOGGRABBER_LEA_RECOVERY_INTERVAL_SECS",
        );

        // Output
        override_parsed(&mut self.output.date_format, "LOGGRABBER_OUTPUT_DATE_FORMAT");
        override_string(
            &mut self.output.record_separator,
            "LOGGRABBER_OUTPUT_RECORD_SEPARATOR",
        );
        override_list(&mut self.output.fields, "LOGGRABBER_OUTPUT_FIELDS", ';');
        override_parsed(&mut self.output.sink, "LOGGRABBER_OUTPUT_SINK");
        override_string(&mut self.output.file_prefix, "LOGGRABBER_OUTPUT_FILE_PREFIX");
        override_parsed(
            &mut self.output.rotate_size_bytes,
            "LOGGRABBER_OUTPUT_ROTATE_SIZE_BYTES",
        );

        // Status
        override_string(&mut self.status.entity, "LOGGRABBER_STATUS_ENTITY");
        override_string(&mut self.status.app_name, "LOGGRABBER_STATUS_APP_NAME");
        override_string(
            &mut self.status.status_server,
            "LOGGRABBER_STATUS_STATUS_SERVER",
        );
        override_string(
            &mut self.status.config_server,
            "LOGGRABBER_STATUS_CONFIG_SERVER",
        );
        override_parsed(
            &mut self.status.commit_interval,
            "LOGGRABBER_STATUS_COMMIT_INTERVAL",
        );
        override_parsed(&mut self.status.max_retries, "LOGGRABBER_STATUS_MAX_RETRIES");
        override_parsed(&mut self.status.retry_factor, "LOGGRABBER_STATUS_RETRY_FACTOR");

        // Metrics
        override_bool(&mut self.metrics.enabled, "LOGGRABBER_METRICS_ENABLED");
        override_string(
            &mut self.metrics.listen_addr,
            "LOGGRABBER_METRICS_LISTEN_ADDR",
        );
        override_parsed(&mut self.metrics.port, "LOGGRABBER_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LoggrabberError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        let mut separator = self.output.record_separator.chars();
        match (separator.next(), separator.next()) {
            (Some(c), None) if c != '\n' && c != '\\' && c != '=' => {}
            _ => {
                return Err(invalid(
                    "output.record_separator",
                    "must be a single character other than newline, '\\' or '='",
                ));
            }
        }

        if self.output.sink == SinkKind::File {
            if self.output.file_prefix.is_empty() {
                return Err(invalid(
                    "output.file_prefix",
                    "must not be empty when sink is 'file'",
                ));
            }
            if self.output.rotate_size_bytes == 0 {
                return Err(invalid(
                    "output.rotate_size_bytes",
                    "must be greater than 0",
                ));
            }
        }

        if self.lea.logfile.is_empty() {
            return Err(invalid("lea.logfile", "must not be empty"));
        }

        if self.lea.online_mode
            && self.lea.record_kind == RecordKind::Traffic
            && self.lea.logfile != DEFAULT_LOGFILE
        {
            return Err(invalid(
                "lea.logfile",
                "a custom logfile is not available in online mode; use record_kind = \"audit\" for the audit log",
            ));
        }

        if self.lea.record_kind == RecordKind::Traffic && self.lea.logfile == AUDIT_LOGFILE {
            return Err(invalid(
                "lea.logfile",
                "fw.adtlog requires record_kind = \"audit\"",
            ));
        }

        if self.lea.legacy_2000 && self.lea.record_kind == RecordKind::Audit {
            return Err(invalid(
                "lea.record_kind",
                "audit records are not available on legacy 2000 servers",
            ));
        }

        if self.status.tracking_enabled() && self.status.app_name.is_empty() {
            return Err(invalid(
                "status.app_name",
                "must be set when status.entity is configured",
            ));
        }

        if self.status.max_retries == 0 {
            return Err(invalid("status.max_retries", "must be at least 1"));
        }

        if self.status.retry_factor == 0 {
            return Err(invalid("status.retry_factor", "must be at least 1"));
        }

        Ok(())
    }

    /// 필터 규칙을 레코드 종류에 맞게 선택합니다.
    ///
    /// 레거시 2000 서버는 필터를 지원하지 않으므로 경고 후 빈 목록을 돌려줍니다.
    pub fn active_filter_rules(&self, kind: RecordKind) -> &[String] {
        let rules = match kind {
            RecordKind::Traffic => &self.filter.traffic_rules,
            RecordKind::Audit => &self.filter.audit_rules,
        };
        if self.lea.legacy_2000 && !rules.is_empty() {
            warn!("filter rules are only available for NG servers, disabling configured rules");
            return &[];
        }
        rules
    }

    /// 레코드 종류를 고려한 실제 로그 파일 이름
    pub fn effective_logfile(&self) -> &str {
        match self.lea.record_kind {
            RecordKind::Audit => AUDIT_LOGFILE,
            RecordKind::Traffic => &self.lea.logfile,
        }
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> LoggrabberError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// LEA 세션 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaConfig {
    /// 레코드 종류 (traffic, audit)
    pub record_kind: RecordKind,
    /// 원격 설정이 없을 때 사용할 수집 모드
    pub mode: ConnectionMode,
    /// 온라인 모드 (파일 끝에서부터 실시간 수신)
    pub online_mode: bool,
    /// 주소/포트 이름 해석 여부
    pub resolve_mode: bool,
    /// 읽을 로그 파일 (`ALL`이면 열거된 전체)
    pub logfile: String,
    /// FW-1 4.1 (2000) 서버 호환 모드
    pub legacy_2000: bool,
    /// 재접속 전 대기 시간 (초)
    pub recovery_interval_secs: u64,
}

impl Default for LeaConfig {
    fn default() -> Self {
        Self {
            record_kind: RecordKind::Traffic,
            mode: ConnectionMode::Firewall,
            online_mode: false,
            resolve_mode: false,
            logfile: DEFAULT_LOGFILE.to_owned(),
            legacy_2000: false,
            recovery_interval_secs: 10,
        }
    }
}

/// 출력 싱크 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// 표준 출력
    #[default]
    Screen,
    /// 로테이션 파일
    File,
}

impl FromStr for SinkKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "screen" => Ok(Self::Screen),
            "file" => Ok(Self::File),
            other => Err(format!("unknown sink: {other}")),
        }
    }
}

/// 레코드 출력 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// 시간 필드 형식 (cp, unix, std)
    pub date_format: DateFormat,
    /// 필드 구분 문자 (한 글자)
    pub record_separator: String,
    /// 출력할 필드 이름 (비어 있으면 전체)
    pub fields: Vec<String>,
    /// 출력 싱크
    pub sink: SinkKind,
    /// 파일 싱크 경로 접두어 (`<prefix>.log`)
    pub file_prefix: String,
    /// 파일 로테이션 기준 크기 (바이트)
    pub rotate_size_bytes: u64,
}

impl OutputConfig {
    /// 구분 문자를 반환합니다. 검증을 통과한 설정에서는 항상 존재합니다.
    pub fn separator(&self) -> char {
        self.record_separator.chars().next().unwrap_or('|')
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            date_format: DateFormat::LocalString,
            record_separator: "|".to_owned(),
            fields: Vec::new(),
            sink: SinkKind::Screen,
            file_prefix: "fw1-loggrabber".to_owned(),
            rotate_size_bytes: 1_048_576,
        }
    }
}

/// 필터 규칙 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// 트래픽 로그 필터 규칙
    pub traffic_rules: Vec<String>,
    /// 감사 로그 필터 규칙
    pub audit_rules: Vec<String>,
}

/// 체크포인트/상태 서비스 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    /// 추적 대상 엔티티 (비어 있으면 체크포인트 비활성)
    pub entity: String,
    /// 상태 엔드포인트를 제공하는 앱 이름
    pub app_name: String,
    /// 상태 서버 URI (비어 있으면 로컬)
    pub status_server: String,
    /// 설정 서버 URI (비어 있으면 로컬)
    pub config_server: String,
    /// N 레코드마다 체크포인트 커밋 (0이면 주기 커밋 없음)
    pub commit_interval: u64,
    /// 커밋 최대 시도 횟수
    pub max_retries: u32,
    /// 재시도 대기 배수
    pub retry_factor: u32,
}

impl StatusConfig {
    /// 엔티티가 설정되어 있으면 체크포인트 추적이 활성화됩니다.
    pub fn tracking_enabled(&self) -> bool {
        !self.entity.is_empty()
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            entity: String::new(),
            app_name: String::new(),
            status_server: String::new(),
            config_server: String::new(),
            commit_interval: 1000,
            max_retries: 3,
            retry_factor: 2,
        }
    }
}

/// Prometheus 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 수신 주소
    pub listen_addr: String,
    /// 수신 포트
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9464,
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_parsed<T: FromStr>(target: &mut T, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse value from env var, ignoring"
            ),
        }
    }
}

fn override_list(target: &mut Vec<String>, env_key: &str, separator: char) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(separator)
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn default_config_is_valid() {
        let config = LoggrabberConfig::default();
        config.validate().unwrap();
        assert_eq!(config.output.separator(), '|');
        assert_eq!(config.effective_logfile(), "fw.log");
        assert!(!config.status.tracking_enabled());
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let config = LoggrabberConfig::parse("").unwrap();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.output.date_format, DateFormat::LocalString);
        assert_eq!(config.status.max_retries, 3);
    }

    #[test]
    fn partial_toml_merges_with_defaults() {
        let toml = r#"
[output]
date_format = "unix"
fields = ["time", "src", "dst"]

[status]
entity = "fw-east"
app_name = "opsec_app"
commit_interval = 50
"#;
        let config = LoggrabberConfig::parse(toml).unwrap();
        assert_eq!(config.output.date_format, DateFormat::UnixEpoch);
        assert_eq!(config.output.fields.len(), 3);
        assert_eq!(config.output.record_separator, "|");
        assert!(config.status.tracking_enabled());
        assert_eq!(config.status.commit_interval, 50);
        config.validate().unwrap();
    }

    #[test]
    fn unsupported_date_format_is_parse_error() {
        let err = LoggrabberConfig::parse("[output]\ndate_format = \"iso\"").unwrap_err();
        assert!(matches!(
            err,
            LoggrabberError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn invalid_toml_returns_error() {
        let result = LoggrabberConfig::parse("invalid = [[[toml");
        assert!(matches!(
            result,
            Err(LoggrabberError::Config(ConfigError::ParseFailed { .. }))
        ));
    }

    #[test]
    fn validate_rejects_multi_char_separator() {
        let mut config = LoggrabberConfig::default();
        config.output.record_separator = "||".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("record_separator"));

        config.output.record_separator = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_invalid_log_level() {
        let mut config = LoggrabberConfig::default();
        config.general.log_level = "verbose".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_level"));
    }

    #[test]
    fn validate_rejects_custom_logfile_in_online_mode() {
        let mut config = LoggrabberConfig::default();
        config.lea.online_mode = true;
        config.lea.logfile = "2024-01-01_000000.log".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("online mode"));
    }

    #[test]
    fn validate_rejects_audit_logfile_for_traffic() {
        let mut config = LoggrabberConfig::default();
        config.lea.logfile = AUDIT_LOGFILE.to_owned();
        assert!(config.validate().is_err());

        config.lea.record_kind = RecordKind::Audit;
        config.validate().unwrap();
        assert_eq!(config.effective_logfile(), AUDIT_LOGFILE);
    }

    #[test]
    fn validate_requires_app_name_for_tracking() {
        let mut config = LoggrabberConfig::default();
        config.status.entity = "fw-east".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("app_name"));
    }

    #[test]
    fn validate_rejects_zero_retry_factor() {
        let mut config = LoggrabberConfig::default();
        config.status.retry_factor = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_file_sink_requires_prefix() {
        let mut config = LoggrabberConfig::default();
        config.output.sink = SinkKind::File;
        config.output.file_prefix = String::new();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("file_prefix"));
    }

    #[test]
    fn legacy_2000_disables_filters() {
        let mut config = LoggrabberConfig::default();
        config.filter.traffic_rules = vec!["proto=tcp".to_owned()];
        assert_eq!(config.active_filter_rules(RecordKind::Traffic).len(), 1);
        config.lea.legacy_2000 = true;
        assert!(config.active_filter_rules(RecordKind::Traffic).is_empty());
    }

    #[test]
    #[serial]
    fn env_override_parsed_and_list() {
        let mut config = LoggrabberConfig::default();
        // SAFETY: serial 테스트이므로 환경변수 조작이 다른 테스트와 겹치지 않습니다.
        unsafe {
            std::env::set_var("LOGGRABBER_OUTPUT_DATE_FORMAT", "cp");
            std::env::set_var("LOGGRABBER_OUTPUT_FIELDS", "time; src ;dst");
            std::env::set_var("LOGGRABBER_STATUS_MAX_RETRIES", "7");
        }
        config.apply_env_overrides();
        unsafe {
            std::env::remove_var("LOGGRABBER_OUTPUT_DATE_FORMAT");
            std::env::remove_var("LOGGRABBER_OUTPUT_FIELDS");
            std::env::remove_var("LOGGRABBER_STATUS_MAX_RETRIES");
        }
        assert_eq!(config.output.date_format, DateFormat::VendorNative);
        assert_eq!(config.output.fields, vec!["time", "src", "dst"]);
        assert_eq!(config.status.max_retries, 7);
    }

    #[test]
    #[serial]
    fn env_override_invalid_value_keeps_original() {
        let mut val = 3u32;
        // SAFETY: serial 테스트이므로 환경변수 조작이 안전합니다.
        unsafe { std::env::set_var("TEST_LOGGRABBER_U32_BAD", "many") };
        override_parsed(&mut val, "TEST_LOGGRABBER_U32_BAD");
        assert_eq!(val, 3);
        unsafe { std::env::remove_var("TEST_LOGGRABBER_U32_BAD") };
    }

    #[test]
    #[serial]
    fn env_override_bool_valid() {
        let mut val = false;
        // SAFETY: serial 테스트이므로 환경변수 조작이 안전합니다.
        unsafe { std::env::set_var("TEST_LOGGRABBER_BOOL", "true") };
        override_bool(&mut val, "TEST_LOGGRABBER_BOOL");
        assert!(val);
        unsafe { std::env::remove_var("TEST_LOGGRABBER_BOOL") };
    }

    #[tokio::test]
    async fn from_file_missing_path_is_file_not_found() {
        let err = LoggrabberConfig::from_file("/nonexistent/loggrabber.toml")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LoggrabberError::Config(ConfigError::FileNotFound { .. })
        ));
    }
}
