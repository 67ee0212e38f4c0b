//! 도메인 타입: 시스템 전역에서 사용되는 공통 타입
//!
//! 필터 컴파일러, 레코드 포매터, 체크포인트 저장소가 공유하는
//! 값 모델을 정의합니다.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 레코드 종류
///
/// 필드 어휘와 필터 문법이 종류마다 다릅니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// 방화벽 트래픽 로그 (fw.log)
    #[default]
    Traffic,
    /// 관리 감사 로그 (fw.adtlog)
    Audit,
}

impl RecordKind {
    /// 종류 이름을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Traffic => "traffic",
            Self::Audit => "audit",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "traffic" | "normal" => Ok(Self::Traffic),
            "audit" => Ok(Self::Audit),
            other => Err(format!("unknown record kind: {other}")),
        }
    }
}

/// 시간 필드 출력 형식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DateFormat {
    /// 수집기가 해석한 문자열을 그대로 사용 (`cp`)
    #[serde(rename = "cp")]
    VendorNative,
    /// 정수 초 (`unix`)
    #[serde(rename = "unix")]
    UnixEpoch,
    /// 로컬 시간 `YYYY-MM-DD HH:MM:SS` (`std`)
    #[default]
    #[serde(rename = "std")]
    LocalString,
}

impl fmt::Display for DateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::VendorNative => "cp",
            Self::UnixEpoch => "unix",
            Self::LocalString => "std",
        };
        f.write_str(s)
    }
}

impl FromStr for DateFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cp" => Ok(Self::VendorNative),
            "unix" => Ok(Self::UnixEpoch),
            "std" => Ok(Self::LocalString),
            other => Err(format!("unsupported date format: {other}")),
        }
    }
}

/// 엔티티의 수집 모드
///
/// 원격 설정 문서의 `mode` 값에서 결정되며, 모드별 기본 필터를 함께 정합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionMode {
    /// 기본 방화벽 모드
    #[default]
    Firewall,
    /// SmartDefense (IPS) 로그만
    Ips,
    /// VPN 로그만
    Vpn,
    /// 감사 로그를 제외한 전체
    NonAudit,
    /// 감사 로그
    Audit,
}

impl ConnectionMode {
    /// 원격 설정 문서의 `mode` 값을 해석합니다. 알 수 없는 값은 방화벽 모드입니다.
    pub fn from_remote(value: &str) -> Self {
        match value {
            "audit" => Self::Audit,
            "ips" => Self::Ips,
            "vpn" => Self::Vpn,
            "non_audit" => Self::NonAudit,
            _ => Self::Firewall,
        }
    }

    /// 모드가 강제하는 필터 규칙 문자열
    pub fn implied_filter(&self) -> Option<&'static str> {
        match self {
            Self::Ips => Some("product=SmartDefense"),
            Self::Vpn => Some("fw_subproduct=VPN-1"),
            Self::Firewall => Some("product=VPN-1 & FireWall-1"),
            Self::NonAudit | Self::Audit => None,
        }
    }

    /// 이 모드에서 읽을 레코드 종류
    pub fn record_kind(&self) -> RecordKind {
        match self {
            Self::Audit => RecordKind::Audit,
            _ => RecordKind::Traffic,
        }
    }
}

impl fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Firewall => "firewall",
            Self::Ips => "ips",
            Self::Vpn => "vpn",
            Self::NonAudit => "non_audit",
            Self::Audit => "audit",
        };
        f.write_str(s)
    }
}

/// 값 태그
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueTag {
    String,
    IpAddress,
    Port,
    ProtocolNumber,
    ActionCode,
    RuleNumber,
    UnixTime,
}

impl fmt::Display for ValueTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::String => "STRING",
            Self::IpAddress => "IP_ADDRESS",
            Self::Port => "PORT",
            Self::ProtocolNumber => "PROTOCOL_NUMBER",
            Self::ActionCode => "ACTION_CODE",
            Self::RuleNumber => "RULE_NUMBER",
            Self::UnixTime => "UNIX_TIME",
        };
        f.write_str(s)
    }
}

/// 태그가 붙은 값
///
/// `IpAddress`와 `Port`는 전송 형식(네트워크 바이트 순서)의 비트 패턴을 그대로
/// 담습니다. 호스트 순서로 해석하려면 [`TypedValue::ipv4`], [`TypedValue::port`]를
/// 사용합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum TypedValue {
    String(String),
    IpAddress(u32),
    Port(u16),
    ProtocolNumber(u8),
    ActionCode(u8),
    RuleNumber(u32),
    UnixTime(i64),
}

impl TypedValue {
    /// 값의 태그를 반환합니다.
    pub fn tag(&self) -> ValueTag {
        match self {
            Self::String(_) => ValueTag::String,
            Self::IpAddress(_) => ValueTag::IpAddress,
            Self::Port(_) => ValueTag::Port,
            Self::ProtocolNumber(_) => ValueTag::ProtocolNumber,
            Self::ActionCode(_) => ValueTag::ActionCode,
            Self::RuleNumber(_) => ValueTag::RuleNumber,
            Self::UnixTime(_) => ValueTag::UnixTime,
        }
    }

    /// 주소에서 전송 형식 IP 값을 만듭니다.
    pub fn ip(addr: Ipv4Addr) -> Self {
        Self::IpAddress(u32::from_ne_bytes(addr.octets()))
    }

    /// 호스트 순서 포트 번호에서 전송 형식 포트 값을 만듭니다.
    pub fn port_from_host(port: u16) -> Self {
        Self::Port(port.to_be())
    }

    /// IP 값의 옥텟을 메모리 순서대로 해석합니다.
    pub fn ipv4(&self) -> Option<Ipv4Addr> {
        match self {
            Self::IpAddress(raw) => Some(Ipv4Addr::from(raw.to_ne_bytes())),
            _ => None,
        }
    }

    /// 포트 값을 호스트 순서로 반환합니다.
    pub fn port(&self) -> Option<u16> {
        match self {
            Self::Port(raw) => Some(u16::from_be(*raw)),
            _ => None,
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::IpAddress(raw) => write!(f, "{}", Ipv4Addr::from(raw.to_ne_bytes())),
            Self::Port(raw) => write!(f, "{}", u16::from_be(*raw)),
            Self::ProtocolNumber(n) | Self::ActionCode(n) => write!(f, "{n}"),
            Self::RuleNumber(n) => write!(f, "{n}"),
            Self::UnixTime(t) => write!(f, "{t}"),
        }
    }
}

/// 수집기가 열거한 로그 파일
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFileEntry {
    /// 로그 파일 이름 (예: `fw.log`, `2024-01-01_000000.log`)
    pub name: String,
    /// 통합 파일 ID
    pub file_id: i32,
}

/// (엔티티, 파일) 단위 읽기 진행 위치
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub entity: String,
    pub file_id: i32,
    pub last_record_position: i64,
    pub file_name: String,
}

impl Checkpoint {
    /// 상태 서비스에서 사용하는 키 (`fileid@entity`)
    pub fn key(&self) -> String {
        status_key(self.file_id, &self.entity)
    }
}

/// 상태 서비스 키를 만듭니다.
pub fn status_key(file_id: i32, entity: &str) -> String {
    format!("{file_id}@{entity}")
}

/// 엔티티 연결 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub entity: String,
    pub connected: bool,
    pub last_connection_timestamp: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ip_roundtrips_through_wire_form() {
        let value = TypedValue::ip(Ipv4Addr::new(10, 1, 2, 3));
        assert_eq!(value.ipv4(), Some(Ipv4Addr::new(10, 1, 2, 3)));
        assert_eq!(value.to_string(), "10.1.2.3");
        assert_eq!(value.tag(), ValueTag::IpAddress);
    }

    #[test]
    fn port_stored_in_network_order() {
        let value = TypedValue::port_from_host(443);
        assert_eq!(value, TypedValue::Port(443u16.to_be()));
        assert_eq!(value.port(), Some(443));
        assert_eq!(value.to_string(), "443");
    }

    #[test]
    fn date_format_parses_legacy_names() {
        assert_eq!("cp".parse::<DateFormat>(), Ok(DateFormat::VendorNative));
        assert_eq!("UNIX".parse::<DateFormat>(), Ok(DateFormat::UnixEpoch));
        assert_eq!("std".parse::<DateFormat>(), Ok(DateFormat::LocalString));
        assert!("iso".parse::<DateFormat>().is_err());
    }

    #[test]
    fn connection_mode_from_remote_defaults_to_firewall() {
        assert_eq!(ConnectionMode::from_remote("ips"), ConnectionMode::Ips);
        assert_eq!(ConnectionMode::from_remote(""), ConnectionMode::Firewall);
        assert_eq!(ConnectionMode::from_remote("weird"), ConnectionMode::Firewall);
        assert_eq!(ConnectionMode::Audit.record_kind(), RecordKind::Audit);
        assert_eq!(ConnectionMode::NonAudit.implied_filter(), None);
    }

    #[test]
    fn typed_value_json_shape() {
        let json = serde_json::to_string(&TypedValue::RuleNumber(7)).unwrap();
        assert_eq!(json, r#"{"type":"rule_number","value":7}"#);
        let back: TypedValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, TypedValue::RuleNumber(7));
    }

    #[test]
    fn checkpoint_key_format() {
        let cp = Checkpoint {
            entity: "fw-a".to_owned(),
            file_id: 3,
            last_record_position: 10,
            file_name: "fw.log".to_owned(),
        };
        assert_eq!(cp.key(), "3@fw-a");
    }
}
