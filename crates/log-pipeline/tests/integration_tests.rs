//! 통합 테스트 -- 재생 협력자로 파이프라인 전체 흐름 검증
//!
//! 재생 스크립트로 세션을 구동하고, 메모리 상태 서비스로 체크포인트와 연결 상태
//! 기록을 확인합니다.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use proptest::prelude::*;

use loggrabber_core::error::StatusError;
use loggrabber_core::pipeline::{StatusResponse, StatusService};
use loggrabber_core::types::{ConnectionMode, RecordKind, TypedValue};
use loggrabber_log_pipeline::checkpoint::Sleeper;
use loggrabber_log_pipeline::format::escape;
use loggrabber_log_pipeline::{
    EndReason, FilterCompiler, FormatOptions, LogPipelineBuilder, MemorySink, PipelineConfig,
    PipelineConfigBuilder, RawField, RawRecord, RecordFormatter, ReplayConnector, ReplayScript,
    StartPosition,
};

const APP: &str = "opsec_app";

/// 게시 내용을 조회 엔드포인트에 반영하는 상태 서비스
#[derive(Default)]
struct MemoryStatusService {
    documents: Mutex<HashMap<String, String>>,
    posts: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl MemoryStatusService {
    fn insert(&self, endpoint: &str, pairs: &[(&str, &str)]) {
        let body = pairs
            .iter()
            .map(|(k, v)| format!(r#"<s:key name="{k}"><![CDATA[{v}]]></s:key>"#))
            .collect();
        self.documents
            .lock()
            .unwrap()
            .insert(endpoint.to_owned(), body);
    }

    fn posted_positions(&self) -> Vec<String> {
        self.posts
            .lock()
            .unwrap()
            .iter()
            .filter(|(endpoint, _)| endpoint.contains("/log_status/"))
            .filter_map(|(_, params)| {
                params
                    .iter()
                    .find(|(k, _)| k == "last_rec_pos")
                    .map(|(_, v)| v.clone())
            })
            .collect()
    }
}

impl StatusService for MemoryStatusService {
    fn call(&self, endpoint: &str, params: &[(String, String)]) -> Result<StatusResponse, StatusError> {
        if params.is_empty() {
            let documents = self.documents.lock().unwrap();
            return Ok(match documents.get(endpoint) {
                Some(body) => StatusResponse::new(body.clone(), 200),
                None => StatusResponse::new("", 404),
            });
        }

        self.posts
            .lock()
            .unwrap()
            .push((endpoint.to_owned(), params.to_vec()));

        // 게시한 값을 다음 조회에서 돌려줍니다.
        let name = params
            .iter()
            .find(|(k, _)| k == "name")
            .map(|(_, v)| v.clone())
            .unwrap_or_default();
        let body: String = params
            .iter()
            .map(|(k, v)| format!(r#"<s:key name="{k}">{v}</s:key>"#))
            .collect();
        self.documents
            .lock()
            .unwrap()
            .insert(format!("{endpoint}{name}"), body);
        Ok(StatusResponse::new("", 201))
    }
}

struct NoSleep;

impl Sleeper for NoSleep {
    fn sleep(&self, _duration: Duration) {}
}

fn log_status(key: &str) -> String {
    format!("/servicesNS/nobody/{APP}/opsec/log_status/{key}")
}

fn record_line(position: i64, action: &str, src: &str) -> String {
    let ip = u32::from_ne_bytes(src.parse::<Ipv4Addr>().unwrap().octets());
    format!(
        r#"{{"event":"record","position":{position},"fields":[{{"name":"action","value":{{"type":"action_code","value":4}},"resolved":"{action}"}},{{"name":"src","value":{{"type":"ip_address","value":{ip}}}}}]}}"#
    )
}

fn tracked_config() -> PipelineConfig {
    PipelineConfigBuilder::new()
        .mode(ConnectionMode::NonAudit)
        .logfile("ALL")
        .tracking("fw1", APP)
        .commit_interval(2)
        .recovery_interval(Duration::from_millis(10))
        .build()
        .unwrap()
}

fn opsec_conf(service: &MemoryStatusService, mode: &str) {
    service.insert(
        &format!("/servicesNS/nobody/{APP}/opsec/opsec_conf/fw1"),
        &[
            ("mode", mode),
            ("lea_server_ip", "10.0.0.5"),
            ("lea_server_port", "18184"),
        ],
    );
}

/// 두 파일을 순서대로 읽고 파일별 위치를 커밋합니다.
#[test]
fn test_multiple_targets_with_checkpoints() {
    let script = [
        r#"{"event":"logfile","name":"2024-01-01_000000.log","file_id":3}"#.to_owned(),
        r#"{"event":"logfile","name":"fw.log","file_id":0}"#.to_owned(),
        r#"{"event":"established"}"#.to_owned(),
        record_line(0, "accept", "10.0.0.1"),
        record_line(1, "drop", "10.0.0.2"),
        record_line(2, "accept", "10.0.0.3"),
        r#"{"event":"end","reason":"end_by_application"}"#.to_owned(),
        r#"{"event":"established"}"#.to_owned(),
        record_line(0, "accept", "192.168.1.1"),
        r#"{"event":"end","reason":"end_by_application"}"#.to_owned(),
    ]
    .join("\n");

    let service = Arc::new(MemoryStatusService::default());
    opsec_conf(&service, "non_audit");
    let sink = MemorySink::new();

    let mut pipeline = LogPipelineBuilder::new()
        .config(tracked_config())
        .connector(Box::new(ReplayConnector::new(ReplayScript::parse(&script).unwrap())))
        .sink(Box::new(sink.clone()))
        .status_service(service.clone())
        .sleeper(Arc::new(NoSleep))
        .build()
        .unwrap();

    let report = pipeline.run().unwrap();

    assert_eq!(report.targets.len(), 2);
    assert_eq!(report.targets[0].target.file_id, 3);
    assert_eq!(sink.lines().len(), 4);
    assert_eq!(sink.lines()[1], "loc=2|action=drop|src=10.0.0.2");

    // 첫 파일: 주기 커밋(2)과 종료 커밋(2), 두 번째 파일: 위치 0은 커밋하지 않음
    assert_eq!(service.posted_positions(), vec!["2", "2"]);
    let stored = service.documents.lock().unwrap();
    assert!(stored.contains_key(&log_status("3@fw1")));
    assert!(!stored.contains_key(&log_status("0@fw1")));
}

/// 재시작하면 저장된 위치부터 이어서 읽습니다.
#[test]
fn test_resume_from_checkpoint() {
    let script = [
        r#"{"event":"established"}"#.to_owned(),
        record_line(4, "accept", "10.0.0.4"),
        record_line(5, "accept", "10.0.0.5"),
        record_line(6, "accept", "10.0.0.6"),
        r#"{"event":"end","reason":"end_by_application"}"#.to_owned(),
    ]
    .join("\n");

    let service = Arc::new(MemoryStatusService::default());
    opsec_conf(&service, "non_audit");
    service.insert(&log_status("0@fw1"), &[("last_rec_pos", "5")]);

    let connector = ReplayConnector::new(ReplayScript::parse(&script).unwrap());
    let requests = connector.request_log();
    let sink = MemorySink::new();

    let config = PipelineConfigBuilder::new()
        .tracking("fw1", APP)
        .build()
        .unwrap();
    let mut pipeline = LogPipelineBuilder::new()
        .config(config)
        .connector(Box::new(connector))
        .sink(Box::new(sink.clone()))
        .status_service(service.clone())
        .sleeper(Arc::new(NoSleep))
        .build()
        .unwrap();

    pipeline.run().unwrap();

    assert_eq!(requests.lock().unwrap()[0].start, StartPosition::Position(5));
    assert_eq!(
        sink.lines(),
        vec!["loc=6|action=accept|src=10.0.0.5", "loc=7|action=accept|src=10.0.0.6"]
    );
    assert_eq!(service.posted_positions(), vec!["6"]);
}

/// 원격 설정의 ips 모드는 SmartDefense 필터를 등록합니다.
#[test]
fn test_remote_mode_registers_filter() {
    let script = [
        r#"{"event":"established"}"#,
        r#"{"event":"end","reason":"end_by_application","position":0}"#,
    ]
    .join("\n");

    let service = Arc::new(MemoryStatusService::default());
    opsec_conf(&service, "ips");

    let connector = ReplayConnector::new(ReplayScript::parse(&script).unwrap());
    let rulebases = connector.rulebase_log();
    let requests = connector.request_log();

    let mut pipeline = LogPipelineBuilder::new()
        .config(tracked_config())
        .connector(Box::new(connector))
        .sink(Box::new(MemorySink::new()))
        .status_service(service)
        .sleeper(Arc::new(NoSleep))
        .build()
        .unwrap();

    pipeline.run().unwrap();

    let rulebases = rulebases.lock().unwrap();
    assert_eq!(rulebases.len(), 1);
    assert_eq!(rulebases[0].to_filter_strings(), vec!["product=SmartDefense"]);
    assert!(requests.lock().unwrap()[0].suspended);
}

/// 원격 설정에 서버 주소가 없으면 시작 단계에서 실패합니다.
#[test]
fn test_missing_server_ip_is_fatal() {
    let service = Arc::new(MemoryStatusService::default());
    service.insert(
        &format!("/servicesNS/nobody/{APP}/opsec/opsec_conf/fw1"),
        &[("lea_server_port", "18184")],
    );

    let mut pipeline = LogPipelineBuilder::new()
        .config(tracked_config())
        .connector(Box::new(ReplayConnector::new(ReplayScript::default())))
        .sink(Box::new(MemorySink::new()))
        .status_service(service)
        .build()
        .unwrap();

    let err = pipeline.run().unwrap_err();
    assert!(err.to_string().contains("lea_server_ip"));
}

/// 잘못된 필터 규칙은 세션을 열기 전에 실패합니다.
#[test]
fn test_invalid_filter_fails_before_session() {
    let connector = ReplayConnector::new(
        ReplayScript::parse(r#"{"event":"established"}"#).unwrap(),
    );
    let requests = connector.request_log();
    let config = PipelineConfigBuilder::new()
        .traffic_rules(vec!["proto=gre".to_owned()])
        .build()
        .unwrap();

    let mut pipeline = LogPipelineBuilder::new()
        .config(config)
        .connector(Box::new(connector))
        .sink(Box::new(MemorySink::new()))
        .build()
        .unwrap();

    assert!(pipeline.run().is_err());
    assert!(requests.lock().unwrap().is_empty());
}

/// 대상이 여럿이면 한 대상의 오류 종료는 전체 실패가 아닙니다.
#[test]
fn test_error_end_with_multiple_targets_succeeds() {
    let script = [
        r#"{"event":"logfile","name":"a.log","file_id":1}"#,
        r#"{"event":"logfile","name":"b.log","file_id":2}"#,
        r#"{"event":"end","reason":"sic_failure"}"#,
        r#"{"event":"established"}"#,
        r#"{"event":"end","reason":"end_by_application"}"#,
    ]
    .join("\n");
    let config = PipelineConfigBuilder::new()
        .mode(ConnectionMode::NonAudit)
        .logfile("ALL")
        .build()
        .unwrap();

    let mut pipeline = LogPipelineBuilder::new()
        .config(config)
        .connector(Box::new(ReplayConnector::new(ReplayScript::parse(&script).unwrap())))
        .sink(Box::new(MemorySink::new()))
        .build()
        .unwrap();

    let report = pipeline.run().unwrap();
    assert_eq!(report.targets[0].reason, Some(EndReason::SicFailure));
    assert_eq!(report.targets[1].reason, Some(EndReason::EndByApplication));
}

/// 필드 선택은 레코드 순서를 유지합니다.
#[test]
fn test_field_selection_keeps_record_order() {
    let formatter = RecordFormatter::new(FormatOptions {
        selected_fields: vec!["time".to_owned(), "src".to_owned(), "dst".to_owned()],
        date_format: loggrabber_core::types::DateFormat::UnixEpoch,
        ..FormatOptions::default()
    });
    let record = RawRecord::new(
        0,
        vec![
            RawField::new("time", TypedValue::UnixTime(1_700_000_000)),
            RawField::new("action", TypedValue::ActionCode(4)).with_resolved("accept"),
            RawField::new("src", TypedValue::ip(Ipv4Addr::new(10, 0, 0, 1))),
            RawField::new("dst", TypedValue::ip(Ipv4Addr::new(10, 0, 0, 2))),
        ],
    );
    assert_eq!(
        formatter.format(&record),
        "time=1700000000|src=10.0.0.1|dst=10.0.0.2"
    );
}

proptest! {
    #[test]
    fn prop_unresolved_ip_is_dotted_quad(raw in any::<u32>()) {
        let addr = Ipv4Addr::from(raw);
        let formatter = RecordFormatter::new(FormatOptions {
            selected_fields: vec!["src".to_owned()],
            ..FormatOptions::default()
        });
        let record = RawRecord::new(0, vec![
            RawField::new("src", TypedValue::ip(addr)).with_resolved("host.example"),
        ]);
        prop_assert_eq!(formatter.format(&record), format!("src={addr}"));
    }

    #[test]
    fn prop_output_is_single_line(text in "[a-z\n|=\\\\ ]{0,40}") {
        let formatter = RecordFormatter::new(FormatOptions::default());
        let record = RawRecord::new(0, vec![
            RawField::new("i/f_name", TypedValue::String(text.clone())).with_resolved(text),
        ]);
        let line = formatter.format(&record);
        prop_assert!(!line.contains('\n'));
    }

    #[test]
    fn prop_escape_protects_every_separator(text in "[a-z|\\\\]{0,40}") {
        let escaped = escape(&text, '|');
        let mut chars = escaped.chars();
        while let Some(c) = chars.next() {
            prop_assert!(c != '|', "unescaped separator in {}", escaped);
            if c == '\\' {
                let next = chars.next();
                prop_assert!(matches!(next, Some('|') | Some('\\')));
            }
        }
    }

    #[test]
    fn prop_canonical_form_recompiles_identically(
        protos in proptest::sample::subsequence(vec!["icmp", "tcp", "udp"], 1..=3),
        lo in 0u32..50,
        span in 0u32..5,
        negate_src in any::<bool>(),
        octet in 1u8..255,
    ) {
        let rule = format!(
            "proto={};rule={}-{};src{}=10.0.{octet}.1",
            protos.join(","),
            lo,
            lo + span,
            if negate_src { "!" } else { "" },
        );
        let first = FilterCompiler::compile(&[rule], RecordKind::Traffic).unwrap();
        let canonical = first.to_filter_strings();
        let second = FilterCompiler::compile(&canonical, RecordKind::Traffic).unwrap();
        prop_assert_eq!(first, second);
    }
}
