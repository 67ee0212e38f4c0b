//! 규칙 문자열 토큰화와 값 변환
//!
//! 규칙 문자열은 `;`로 구분된 `name[!]=value[,value...]` 조각의 나열입니다.
//! 이 모듈은 조각 하나를 이름/부정/값으로 나누고, 인자별 값 문법(IP, 범위, 시각,
//! 심볼 코드)을 [`TypedValue`]로 변환합니다.

use std::net::Ipv4Addr;
use std::str::FromStr;

use chrono::{Local, NaiveDate, TimeZone};

use loggrabber_core::error::FilterError;

/// `action` 값과 코드
pub const ACTION_CODES: &[(&str, u8)] = &[
    ("ctl", 0),
    ("drop", 2),
    ("reject", 3),
    ("accept", 4),
    ("encrypt", 5),
    ("decrypt", 6),
    ("keyinst", 7),
];

/// `proto` 값과 IP 프로토콜 번호
pub const PROTOCOL_NUMBERS: &[(&str, u8)] = &[("icmp", 1), ("tcp", 6), ("udp", 17)];

/// 트래픽 레코드의 `product` 허용 값
pub const TRAFFIC_PRODUCTS: &[&str] = &["VPN-1 & FireWall-1", "SmartDefense"];

/// 감사 레코드의 `product` 허용 값 (관리 콘솔 이름)
pub const AUDIT_PRODUCTS: &[&str] = &[
    "SmartDashboard",
    "Policy Editor",
    "SmartView Tracker",
    "SmartView Status",
    "SmartView Monitor",
    "System Monitor",
    "cpstat_monitor",
    "SmartUpdate",
    "CPMI Client",
];

/// `starttime`/`endtime` 값 형식
pub const TIME_ARGUMENT_FORMAT: &str = "%Y%m%d%H%M%S";

/// 범위 하나가 펼칠 수 있는 최대 피연산자 수
pub const MAX_RANGE_OPERANDS: u64 = 65_536;

/// 이름과 값으로 나뉜 규칙 조각
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument<'a> {
    /// 소문자로 변환된 인자 이름
    pub name: String,
    /// 이름 끝의 `!` 여부
    pub negated: bool,
    /// 앞뒤 공백이 제거된 값
    pub value: &'a str,
}

pub(crate) fn syntax(fragment: &str, reason: impl Into<String>) -> FilterError {
    FilterError::Syntax {
        fragment: fragment.to_owned(),
        reason: reason.into(),
    }
}

/// 규칙 문자열을 비어 있지 않은 조각으로 나눕니다.
pub fn split_fragments(rule: &str) -> impl Iterator<Item = &str> {
    rule.split(';').filter(|f| !f.trim().is_empty())
}

/// 조각을 `name[!]=value`로 나눕니다.
pub fn split_argument(fragment: &str) -> Result<Argument<'_>, FilterError> {
    let (raw_name, value) = fragment
        .split_once('=')
        .ok_or_else(|| syntax(fragment, "required syntax is 'argument=value'"))?;

    let mut name = raw_name.trim();
    let negated = name.ends_with('!');
    if negated {
        name = name.trim_end_matches('!').trim_end();
    }
    if name.is_empty() {
        return Err(syntax(fragment, "missing argument name"));
    }

    Ok(Argument {
        name: name.to_lowercase(),
        negated,
        value: value.trim(),
    })
}

/// `,`로 구분된 값 목록을 나눕니다. 빈 항목은 허용하지 않습니다.
pub fn split_values<'a>(value: &'a str, fragment: &str) -> Result<Vec<&'a str>, FilterError> {
    value
        .split(',')
        .map(str::trim)
        .map(|item| {
            if item.is_empty() {
                Err(syntax(fragment, "empty value in list"))
            } else {
                Ok(item)
            }
        })
        .collect()
}

/// 허용 목록에 있는 문자열 값을 검사합니다.
pub fn checked_choice(value: &str, allowed: &[&str], what: &str, fragment: &str) -> Result<String, FilterError> {
    if allowed.contains(&value) {
        Ok(value.to_owned())
    } else {
        Err(syntax(fragment, format!("invalid value for {what}: '{value}'")))
    }
}

/// 심볼 이름을 코드로 변환합니다.
pub fn symbolic_code(value: &str, table: &[(&str, u8)], what: &str, fragment: &str) -> Result<u8, FilterError> {
    table
        .iter()
        .find(|(name, _)| *name == value)
        .map(|(_, code)| *code)
        .ok_or_else(|| syntax(fragment, format!("invalid value for {what}: '{value}'")))
}

/// 점 표기 IPv4 주소를 파싱합니다.
pub fn parse_ip(value: &str, fragment: &str) -> Result<Ipv4Addr, FilterError> {
    Ipv4Addr::from_str(value)
        .map_err(|_| syntax(fragment, format!("invalid IP address: '{value}'")))
}

/// 네트워크 마스크를 파싱합니다. 점 표기 또는 접두사 길이(0-32)를 받습니다.
pub fn parse_mask(value: &str, fragment: &str) -> Result<Ipv4Addr, FilterError> {
    if !value.contains('.') {
        let bits: u32 = value
            .parse()
            .ok()
            .filter(|b| *b <= 32)
            .ok_or_else(|| syntax(fragment, format!("invalid netmask: '{value}'")))?;
        let mask = u32::MAX.checked_shl(32 - bits).unwrap_or(0);
        return Ok(Ipv4Addr::from(mask));
    }
    parse_ip(value, fragment)
}

/// `src`/`dst` 값 형태
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressSpec {
    /// 주소 목록
    List(Vec<Ipv4Addr>),
    /// 네트워크와 마스크
    Network {
        /// 네트워크 주소
        network: Ipv4Addr,
        /// 마스크
        mask: Ipv4Addr,
    },
}

/// `src`/`dst` 값을 주소 목록 또는 단일 네트워크로 파싱합니다.
///
/// 목록(`,`)과 네트워크(`/`)를 섞으면 문법 오류입니다.
pub fn parse_address_spec(value: &str, fragment: &str) -> Result<AddressSpec, FilterError> {
    let has_list = value.contains(',');
    let has_mask = value.contains('/');

    match (has_list, has_mask) {
        (true, true) => Err(syntax(
            fragment,
            "an address list and a network cannot be combined",
        )),
        (false, true) => {
            let (network, mask) = value
                .split_once('/')
                .ok_or_else(|| syntax(fragment, "invalid network"))?;
            let (network, mask) = (network.trim(), mask.trim());
            if network.is_empty() || mask.is_empty() || mask.contains('/') {
                return Err(syntax(fragment, "required syntax is 'network/mask'"));
            }
            Ok(AddressSpec::Network {
                network: parse_ip(network, fragment)?,
                mask: parse_mask(mask, fragment)?,
            })
        }
        _ => split_values(value, fragment)?
            .into_iter()
            .map(|item| parse_ip(item, fragment))
            .collect::<Result<Vec<_>, _>>()
            .map(AddressSpec::List),
    }
}

/// `a` 또는 `a-b` 형태의 정수 범위를 펼칩니다.
///
/// 시작이 끝보다 크면 빈 목록을 돌려줍니다.
pub fn expand_range<T>(item: &str, what: &str, fragment: &str) -> Result<Vec<T>, FilterError>
where
    T: FromStr + Copy + Into<u64> + TryFrom<u64>,
{
    let parse = |s: &str| -> Result<T, FilterError> {
        s.trim()
            .parse::<T>()
            .map_err(|_| syntax(fragment, format!("invalid {what} value: '{}'", s.trim())))
    };

    let (start, end) = match item.split_once('-') {
        Some((start, end)) => (parse(start)?, parse(end)?),
        None => {
            let single = parse(item)?;
            (single, single)
        }
    };

    let (start, end): (u64, u64) = (start.into(), end.into());
    if start > end {
        return Ok(Vec::new());
    }
    if end - start + 1 > MAX_RANGE_OPERANDS {
        return Err(syntax(fragment, format!("{what} range '{item}' is too large")));
    }
    Ok((start..=end).filter_map(|n| T::try_from(n).ok()).collect())
}

/// `YYYYMMDDhhmmss` 값을 로컬 시간 기준 Unix 초로 변환합니다.
pub fn parse_local_time(value: &str, fragment: &str) -> Result<i64, FilterError> {
    if value.len() != 14 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(syntax(fragment, "required syntax is 'YYYYMMDDhhmmss'"));
    }

    let field = |range: std::ops::Range<usize>| -> u32 {
        value[range].parse().unwrap_or_default()
    };
    let year = field(0..4) as i32;
    let (month, day) = (field(4..6), field(6..8));
    let (hour, minute, second) = (field(8..10), field(10..12), field(12..14));

    if !(1..=12).contains(&month) {
        return Err(syntax(fragment, format!("illegal month: {month:02}")));
    }
    if !(1..=31).contains(&day) {
        return Err(syntax(fragment, format!("illegal day: {day:02}")));
    }
    if hour > 23 {
        return Err(syntax(fragment, format!("illegal hour: {hour:02}")));
    }
    if minute > 59 {
        return Err(syntax(fragment, format!("illegal minute: {minute:02}")));
    }
    if second > 59 {
        return Err(syntax(fragment, format!("illegal second: {second:02}")));
    }

    let naive = NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, second))
        .ok_or_else(|| syntax(fragment, format!("illegal date: '{value}'")))?;

    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|t| t.timestamp())
        .ok_or_else(|| syntax(fragment, format!("nonexistent local time: '{value}'")))
}
