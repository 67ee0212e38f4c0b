//! `splunk _internal call` 명령 기반 상태 서비스
//!
//! 호출마다
//! `$SPLUNK_HOME/bin/splunk _internal call <endpoint> [-uri <server>] [-post:<k> <v>]...`
//! 를 실행하고 출력에서 HTTP 상태를 읽습니다. 명령은 `HTTP Status: NNN` 뒤에
//! 응답 본문을 출력하거나, 실패 시 `FAILED: 'HTTP/1.1 NNN ...`를 출력합니다.

use std::path::{Path, PathBuf};
use std::process::Command;

use loggrabber_core::error::StatusError;
use loggrabber_core::pipeline::{HTTP_SUCCESS_CEILING, StatusResponse, StatusService};

/// 완료된 호출의 상태 앞 표식
pub const HTTP_STATUS_PREFIX: &str = "HTTP Status: ";

/// 실패한 호출의 상태 앞 표식
pub const HTTP_FAILED_PREFIX: &str = "FAILED: 'HTTP/1.1 ";

/// HTTP 상태 코드 자릿수
const HTTP_CODE_LEN: usize = 3;

/// Splunk CLI를 실행하는 상태 서비스
#[derive(Debug, Clone)]
pub struct CommandStatusService {
    program: PathBuf,
    server_uri: Option<String>,
}

impl CommandStatusService {
    /// CLI 경로를 지정해 생성합니다.
    ///
    /// `server_uri`가 비어 있으면 로컬 인스턴스를 대상으로 합니다.
    pub fn new(program: impl Into<PathBuf>, server_uri: &str) -> Self {
        Self {
            program: program.into(),
            server_uri: (!server_uri.is_empty()).then(|| server_uri.to_owned()),
        }
    }

    /// `$SPLUNK_HOME/bin/splunk`에서 CLI를 찾습니다.
    pub fn from_env(server_uri: &str) -> Result<Self, StatusError> {
        let home = std::env::var_os("SPLUNK_HOME").ok_or_else(|| StatusError::CallFailed {
            endpoint: String::new(),
            reason: "SPLUNK_HOME is not set".to_owned(),
        })?;
        Ok(Self::new(Path::new(&home).join("bin").join("splunk"), server_uri))
    }

    /// 사용 중인 CLI 경로
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// 호출 하나의 인자 목록
    pub fn arguments(&self, endpoint: &str, params: &[(String, String)]) -> Vec<String> {
        let mut args = vec!["_internal".to_owned(), "call".to_owned(), endpoint.to_owned()];
        if let Some(uri) = &self.server_uri {
            args.push("-uri".to_owned());
            args.push(uri.clone());
        }
        for (key, value) in params {
            args.push(format!("-post:{key}"));
            args.push(value.clone());
        }
        args
    }
}

impl StatusService for CommandStatusService {
    fn call(&self, endpoint: &str, params: &[(String, String)]) -> Result<StatusResponse, StatusError> {
        let args = self.arguments(endpoint, params);
        tracing::debug!(program = %self.program.display(), ?args, "status command");

        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|e| StatusError::CallFailed {
                endpoint: endpoint.to_owned(),
                reason: e.to_string(),
            })?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        let status = parse_http_status(&text).ok_or_else(|| StatusError::CallFailed {
            endpoint: endpoint.to_owned(),
            reason: format!("no http status in command output ({})", output.status),
        })?;
        tracing::debug!(endpoint, status, "status command finished");
        Ok(StatusResponse::new(text, status))
    }
}

/// 명령 출력에서 HTTP 상태 코드를 추출합니다.
///
/// 성공 범위의 `HTTP Status:` 값이 우선입니다. 그 외에는 `FAILED:` 표식을 쓰고,
/// 둘 다 없으면 실패 범위의 `HTTP Status:` 값을 씁니다.
pub fn parse_http_status(output: &str) -> Option<u16> {
    let reported = code_after(output, HTTP_STATUS_PREFIX);
    if let Some(code) = reported
        && code < HTTP_SUCCESS_CEILING
    {
        return Some(code);
    }
    code_after(output, HTTP_FAILED_PREFIX).or(reported)
}

fn code_after(output: &str, marker: &str) -> Option<u16> {
    let start = output.find(marker)? + marker.len();
    output
        .get(start..start + HTTP_CODE_LEN)
        .and_then(|digits| digits.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn parses_success_status() {
        let output = "HTTP Status: 200.\nContent:\n<feed><s:key name=\"last_rec_pos\">5</s:key></feed>";
        assert_eq!(parse_http_status(output), Some(200));
    }

    #[test]
    fn parses_failed_status() {
        let output = "FAILED: 'HTTP/1.1 404 Not Found'";
        assert_eq!(parse_http_status(output), Some(404));
    }

    #[test]
    fn failed_marker_wins_over_error_status() {
        let output = "HTTP Status: 500\nFAILED: 'HTTP/1.1 409 Conflict'";
        assert_eq!(parse_http_status(output), Some(409));
        assert_eq!(parse_http_status("HTTP Status: 503"), Some(503));
    }

    #[test]
    fn missing_marker_is_none() {
        assert_eq!(parse_http_status("command not found"), None);
        assert_eq!(parse_http_status("HTTP Status: 2"), None);
    }

    #[test]
    fn builds_get_arguments() {
        let service = CommandStatusService::new("/opt/splunk/bin/splunk", "");
        assert_eq!(
            service.arguments("/servicesNS/nobody/app/opsec/log_status/0@fw1", &[]),
            vec!["_internal", "call", "/servicesNS/nobody/app/opsec/log_status/0@fw1"]
        );
    }

    #[test]
    fn builds_post_arguments_with_server() {
        let service = CommandStatusService::new("splunk", "https://127.0.0.1:8089");
        let args = service.arguments(
            "/servicesNS/nobody/app/opsec/entity_health/",
            &params(&[("name", "fw1"), ("is_connected", "1")]),
        );
        assert_eq!(
            args,
            vec![
                "_internal",
                "call",
                "/servicesNS/nobody/app/opsec/entity_health/",
                "-uri",
                "https://127.0.0.1:8089",
                "-post:name",
                "fw1",
                "-post:is_connected",
                "1",
            ]
        );
    }

    #[test]
    fn missing_program_is_call_failure() {
        let service = CommandStatusService::new("/nonexistent/bin/splunk", "");
        let err = service.call("/x", &[]).unwrap_err();
        assert!(matches!(err, StatusError::CallFailed { .. }));
    }
}
