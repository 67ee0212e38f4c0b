//! 연결 파라미터
//!
//! 엔티티별 연결 설정은 상태 서비스의 `opsec_conf` 문서에서 가져옵니다. 문서의
//! `mode` 값은 레코드 종류와 모드별 필터를, `no_resolve`/`online_mode`는 세션 동작을
//! 바꿉니다. 앱 이름이 없으면 원격 설정 없이 로컬 값만 사용합니다.

use tracing::{debug, info};

use loggrabber_core::error::{ConfigError, StatusError};
use loggrabber_core::pipeline::StatusService;
use loggrabber_core::types::ConnectionMode;

use crate::checkpoint::{StatusDocument, StatusEndpoints, timed_call};
use crate::error::LogPipelineError;

/// 세션 협력자에 넘길 연결 파라미터
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionParams {
    /// 원격 설정 문서에서 왔는지 여부
    pub remote: bool,
    /// 원격 설정의 수집 모드
    pub mode: Option<ConnectionMode>,
    /// 원격 설정의 이름 해석 여부 (`no_resolve`의 반대)
    pub resolve_mode: Option<bool>,
    /// 원격 설정이 온라인 모드를 켰는지 여부
    pub online_mode: bool,
    /// Nagle 알고리즘 비활성화
    pub no_nagle: bool,
    /// 연결 버퍼 크기
    pub conn_buf_size: Option<u32>,
    /// 로그 서버 주소
    pub server_ip: Option<String>,
    /// 평문 연결 포트
    pub server_port: Option<u16>,
    /// 인증 연결 포트
    pub auth_port: Option<u16>,
    /// 인증 방식 (`sslca` 등)
    pub auth_type: Option<String>,
    /// 클라이언트 SIC 이름
    pub sic_name: Option<String>,
    /// 인증서 파일 경로
    pub sslca_file: Option<String>,
    /// 서버 SIC 이름
    pub entity_sic_name: Option<String>,
}

impl ConnectionParams {
    /// 원격 설정 없이 사용할 빈 파라미터
    pub fn local() -> Self {
        Self::default()
    }

    /// 상태 서비스에서 엔티티 설정을 가져옵니다.
    pub fn fetch(
        service: &dyn StatusService,
        endpoints: &StatusEndpoints,
        entity: &str,
    ) -> Result<Self, LogPipelineError> {
        let endpoint = format!("{}{entity}", endpoints.config);
        let response = timed_call(service, &endpoint, &[])?;
        if !response.is_success() {
            return Err(StatusError::HttpStatus {
                endpoint,
                status: response.status,
            }
            .into());
        }

        let params = Self::from_document(&StatusDocument::parse(&response.body))?;
        info!(
            entity,
            mode = ?params.mode,
            server = params.server_ip.as_deref().unwrap_or(""),
            "connection parameters loaded"
        );
        Ok(params)
    }

    /// 설정 문서를 해석합니다.
    pub fn from_document(doc: &StatusDocument) -> Result<Self, ConfigError> {
        let mode = Some(ConnectionMode::from_remote(doc.get("mode").unwrap_or_default()));

        let resolve_mode = match doc.get_non_empty("no_resolve").map(str::trim) {
            Some("1") => Some(false),
            Some("0") => Some(true),
            _ => None,
        };

        let conn_buf_size = doc
            .get_non_empty("conn_buf_size")
            .map(|v| parse_number::<i64>("conn_buf_size", v))
            .transpose()?
            .filter(|size| *size > 0)
            .and_then(|size| u32::try_from(size).ok());

        let params = Self {
            remote: true,
            mode,
            resolve_mode,
            online_mode: doc.get("online_mode").map(str::trim) == Some("1"),
            no_nagle: doc.get("no_nagle").map(str::trim) == Some("1"),
            conn_buf_size,
            server_ip: owned(doc, "lea_server_ip"),
            server_port: doc
                .get_non_empty("lea_server_port")
                .map(|v| parse_number("lea_server_port", v))
                .transpose()?,
            auth_port: doc
                .get_non_empty("lea_server_auth_port")
                .map(|v| parse_number("lea_server_auth_port", v))
                .transpose()?,
            auth_type: owned(doc, "lea_server_auth_type"),
            sic_name: owned(doc, "opsec_sic_name"),
            sslca_file: owned(doc, "opsec_sslca_file"),
            entity_sic_name: owned(doc, "opsec_entity_sic_name"),
        };
        debug!(?params, "parsed connection document");
        Ok(params)
    }

    /// 인증 연결 여부
    pub fn is_authenticated(&self) -> bool {
        self.auth_type.is_some()
    }

    /// 필수 파라미터를 검증합니다. 로컬 파라미터는 검사하지 않습니다.
    ///
    /// 레거시 2000 서버의 인증 연결은 포트만 요구합니다.
    pub fn validate(&self, legacy_2000: bool) -> Result<(), ConfigError> {
        if !self.remote {
            return Ok(());
        }

        require(self.server_ip.is_some(), "lea_server_ip")?;

        if self.is_authenticated() {
            require(self.auth_port.is_some(), "lea_server_auth_port")?;
            if !legacy_2000 {
                require(self.sslca_file.is_some(), "opsec_sslca_file")?;
                require(self.sic_name.is_some(), "opsec_sic_name")?;
                require(self.entity_sic_name.is_some(), "opsec_entity_sic_name")?;
            }
        } else {
            require(self.server_port.is_some(), "lea_server_port")?;
        }
        Ok(())
    }

    /// 협력자에 넘길 `-v <scope> <name> <value>` 형식의 인자 목록
    pub fn opsec_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        let mut push = |scope: Option<&str>, name: &str, value: Option<String>| {
            args.push("-v".to_owned());
            if let Some(scope) = scope {
                args.push(scope.to_owned());
            }
            args.push(name.to_owned());
            if let Some(value) = value {
                args.push(value);
            }
        };

        if let Some(v) = &self.sic_name {
            push(None, "opsec_sic_name", Some(v.clone()));
        }
        if let Some(v) = &self.sslca_file {
            push(None, "opsec_sslca_file", Some(v.clone()));
        }
        if let Some(v) = &self.server_ip {
            push(Some("lea_server"), "ip", Some(v.clone()));
        }
        if let Some(v) = self.auth_port {
            push(Some("lea_server"), "auth_port", Some(v.to_string()));
        }
        if let Some(v) = &self.auth_type {
            push(Some("lea_server"), "auth_type", Some(v.clone()));
        }
        if let Some(v) = &self.entity_sic_name {
            push(Some("lea_server"), "opsec_entity_sic_name", Some(v.clone()));
        }
        if let Some(v) = self.conn_buf_size {
            push(Some("lea_server"), "conn_buf_size", Some(v.to_string()));
        }
        if self.no_nagle {
            push(Some("lea_server"), "no_nagle", None);
        }
        if let Some(v) = self.server_port {
            push(Some("lea_server"), "port", Some(v.to_string()));
        }
        args
    }
}

fn owned(doc: &StatusDocument, key: &str) -> Option<String> {
    doc.get_non_empty(key).map(|v| v.trim().to_owned())
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        field: key.to_owned(),
        reason: format!("'{value}' is not a valid number"),
    })
}

fn require(present: bool, name: &str) -> Result<(), ConfigError> {
    if present {
        Ok(())
    } else {
        Err(ConfigError::MissingParameter {
            name: name.to_owned(),
        })
    }
}
