//! 수집 파이프라인 설정
//!
//! [`PipelineConfig`]는 core의 [`LoggrabberConfig`]에서 세션 처리에 필요한
//! 값만 뽑아낸 불변 설정입니다. 세션마다 원격 설정 문서로 모드가 바뀔 수 있으므로
//! 여기 담긴 값은 "기본값"이고, 실제 세션 값은 [`SessionSettings`](crate::session::SessionSettings)가
//! 결정합니다.
//!
//! # 사용 예시
//! ```ignore
//! use loggrabber_core::config::LoggrabberConfig;
//! use loggrabber_log_pipeline::config::PipelineConfig;
//!
//! let core_config = LoggrabberConfig::default();
//! let config = PipelineConfig::from_core(&core_config);
//! ```

use std::time::Duration;

use loggrabber_core::config::{ALL_LOGFILES, LoggrabberConfig};
use loggrabber_core::types::{ConnectionMode, DateFormat, RecordKind};

use crate::error::LogPipelineError;

/// 체크포인트 추적 설정
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingConfig {
    /// 엔티티 이름
    pub entity: String,
    /// 상태 엔드포인트를 노출하는 앱 이름
    pub app_name: String,
}

/// 수집 파이프라인 설정
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// 기본 레코드 종류
    pub record_kind: RecordKind,
    /// 원격 설정이 없을 때의 수집 모드
    pub mode: ConnectionMode,
    /// 온라인 모드
    pub online_mode: bool,
    /// 이름 해석 여부
    pub resolve_mode: bool,
    /// 대상 로그 파일 (`ALL` 가능)
    pub logfile: String,
    /// 레거시 2000 서버 호환
    pub legacy_2000: bool,
    /// 시간 필드 출력 형식
    pub date_format: DateFormat,
    /// 레코드 구분자
    pub separator: char,
    /// 출력할 필드 (비어 있으면 전체)
    pub fields: Vec<String>,
    /// 트래픽 필터 규칙
    pub traffic_rules: Vec<String>,
    /// 감사 필터 규칙
    pub audit_rules: Vec<String>,
    /// 체크포인트 추적 (엔티티가 없으면 `None`)
    pub tracking: Option<TrackingConfig>,
    /// N번째 레코드마다 체크포인트 커밋
    pub commit_interval: u64,
    /// 커밋 최대 시도 횟수
    pub max_retries: u32,
    /// 재시도 대기 배수
    pub retry_factor: u32,
    /// 재접속 전 대기 시간
    pub recovery_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_core(&LoggrabberConfig::default())
    }
}

impl PipelineConfig {
    /// core 설정에서 파이프라인 설정을 생성합니다.
    ///
    /// 레거시 2000 모드에서는 필터 규칙이 비워집니다.
    pub fn from_core(core: &LoggrabberConfig) -> Self {
        let tracking = if core.status.tracking_enabled() {
            Some(TrackingConfig {
                entity: core.status.entity.clone(),
                app_name: core.status.app_name.clone(),
            })
        } else {
            None
        };

        Self {
            record_kind: core.lea.record_kind,
            mode: core.lea.mode,
            online_mode: core.lea.online_mode,
            resolve_mode: core.lea.resolve_mode,
            logfile: core.effective_logfile().to_owned(),
            legacy_2000: core.lea.legacy_2000,
            date_format: core.output.date_format,
            separator: core.output.separator(),
            fields: core.output.fields.clone(),
            traffic_rules: core.active_filter_rules(RecordKind::Traffic).to_vec(),
            audit_rules: core.active_filter_rules(RecordKind::Audit).to_vec(),
            tracking,
            commit_interval: core.status.commit_interval,
            max_retries: core.status.max_retries,
            retry_factor: core.status.retry_factor,
            recovery_interval: Duration::from_secs(core.lea.recovery_interval_secs),
        }
    }

    /// 레코드 종류에 해당하는 사용자 필터 규칙
    pub fn rules_for(&self, kind: RecordKind) -> &[String] {
        match kind {
            RecordKind::Traffic => &self.traffic_rules,
            RecordKind::Audit => &self.audit_rules,
        }
    }

    /// 열거된 전체 로그 파일을 읽는지 여부
    pub fn reads_all_logfiles(&self) -> bool {
        self.logfile == ALL_LOGFILES
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogPipelineError> {
        if matches!(self.separator, '\n' | '\\' | '=') {
            return Err(LogPipelineError::Config {
                field: "separator".to_owned(),
                reason: format!("'{}' cannot be used as record separator", self.separator.escape_default()),
            });
        }

        if self.logfile.is_empty() {
            return Err(LogPipelineError::Config {
                field: "logfile".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        if self.max_retries == 0 {
            return Err(LogPipelineError::Config {
                field: "max_retries".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.retry_factor == 0 {
            return Err(LogPipelineError::Config {
                field: "retry_factor".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if let Some(tracking) = &self.tracking
            && tracking.app_name.is_empty()
        {
            return Err(LogPipelineError::Config {
                field: "app_name".to_owned(),
                reason: "checkpoint tracking requires an app name".to_owned(),
            });
        }

        Ok(())
    }
}

/// 파이프라인 설정 빌더
///
/// 테스트와 CLI에서 core 설정 파일 없이 설정을 조립할 때 사용합니다.
#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 레코드 종류를 설정합니다.
    pub fn record_kind(mut self, kind: RecordKind) -> Self {
        self.config.record_kind = kind;
        self
    }

    /// 수집 모드를 설정합니다.
    pub fn mode(mut self, mode: ConnectionMode) -> Self {
        self.config.mode = mode;
        self
    }

    /// 온라인 모드를 설정합니다.
    pub fn online_mode(mut self, online: bool) -> Self {
        self.config.online_mode = online;
        self
    }

    /// 이름 해석 여부를 설정합니다.
    pub fn resolve_mode(mut self, resolve: bool) -> Self {
        self.config.resolve_mode = resolve;
        self
    }

    /// 대상 로그 파일을 설정합니다.
    pub fn logfile(mut self, logfile: impl Into<String>) -> Self {
        self.config.logfile = logfile.into();
        self
    }

    /// 시간 필드 형식을 설정합니다.
    pub fn date_format(mut self, format: DateFormat) -> Self {
        self.config.date_format = format;
        self
    }

    /// 레코드 구분자를 설정합니다.
    pub fn separator(mut self, separator: char) -> Self {
        self.config.separator = separator;
        self
    }

    /// 출력 필드를 설정합니다.
    pub fn fields(mut self, fields: Vec<String>) -> Self {
        self.config.fields = fields;
        self
    }

    /// 트래픽 필터 규칙을 설정합니다.
    pub fn traffic_rules(mut self, rules: Vec<String>) -> Self {
        self.config.traffic_rules = rules;
        self
    }

    /// 감사 필터 규칙을 설정합니다.
    pub fn audit_rules(mut self, rules: Vec<String>) -> Self {
        self.config.audit_rules = rules;
        self
    }

    /// 체크포인트 추적을 켭니다.
    pub fn tracking(mut self, entity: impl Into<String>, app_name: impl Into<String>) -> Self {
        self.config.tracking = Some(TrackingConfig {
            entity: entity.into(),
            app_name: app_name.into(),
        });
        self
    }

    /// 커밋 간격을 설정합니다.
    pub fn commit_interval(mut self, interval: u64) -> Self {
        self.config.commit_interval = interval;
        self
    }

    /// 재시도 정책을 설정합니다.
    pub fn retry(mut self, max_retries: u32, factor: u32) -> Self {
        self.config.max_retries = max_retries;
        self.config.retry_factor = factor;
        self
    }

    /// 재접속 대기 시간을 설정합니다.
    pub fn recovery_interval(mut self, interval: Duration) -> Self {
        self.config.recovery_interval = interval;
        self
    }

    /// 설정을 검증하고 `PipelineConfig`를 생성합니다.
    pub fn build(self) -> Result<PipelineConfig, LogPipelineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.separator, '|');
        assert_eq!(config.commit_interval, 1000);
        assert!(config.tracking.is_none());
    }

    #[test]
    fn from_core_preserves_values() {
        let mut core = LoggrabberConfig::default();
        core.lea.record_kind = RecordKind::Audit;
        core.output.record_separator = ";".to_owned();
        core.status.entity = "fw1".to_owned();
        core.status.app_name = "opsec_app".to_owned();
        core.filter.audit_rules = vec!["action=accept".to_owned()];

        let config = PipelineConfig::from_core(&core);
        assert_eq!(config.logfile, "fw.adtlog");
        assert_eq!(config.separator, ';');
        assert_eq!(config.rules_for(RecordKind::Audit).len(), 1);
        assert_eq!(
            config.tracking,
            Some(TrackingConfig {
                entity: "fw1".to_owned(),
                app_name: "opsec_app".to_owned(),
            })
        );
    }

    #[test]
    fn legacy_mode_drops_rules() {
        let mut core = LoggrabberConfig::default();
        core.lea.legacy_2000 = true;
        core.filter.traffic_rules = vec!["proto=tcp".to_owned()];
        let config = PipelineConfig::from_core(&core);
        assert!(config.traffic_rules.is_empty());
    }

    #[test]
    fn all_logfiles_detected() {
        let config = PipelineConfigBuilder::new().logfile("ALL").build().unwrap();
        assert!(config.reads_all_logfiles());
    }

    #[test]
    fn builder_rejects_invalid_separator() {
        let result = PipelineConfigBuilder::new().separator('=').build();
        assert!(matches!(result, Err(LogPipelineError::Config { .. })));
    }

    #[test]
    fn builder_rejects_zero_retries() {
        assert!(PipelineConfigBuilder::new().retry(0, 2).build().is_err());
        assert!(PipelineConfigBuilder::new().retry(3, 0).build().is_err());
    }

    #[test]
    fn builder_rejects_tracking_without_app() {
        let result = PipelineConfigBuilder::new().tracking("fw1", "").build();
        assert!(result.is_err());
    }
}
