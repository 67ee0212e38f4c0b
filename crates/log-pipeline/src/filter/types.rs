//! 필터 규칙 타입 정의
//!
//! 컴파일된 필터는 [`PredicateTree`]로 표현되며, 세션 협력자에 그대로 등록됩니다.

use std::fmt;
use std::net::Ipv4Addr;

use chrono::{Local, TimeZone};
use serde::{Deserialize, Serialize};

use loggrabber_core::types::{RecordKind, TypedValue};

use super::parser::{ACTION_CODES, PROTOCOL_NUMBERS, TIME_ARGUMENT_FORMAT};

/// 규칙 동작
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RuleAction {
    /// 일치하는 레코드를 전달
    Pass,
    /// 일치하는 레코드를 버림
    Drop,
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "PASS"),
            Self::Drop => write!(f, "DROP"),
        }
    }
}

/// 조건 연산자
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PredicateOp {
    /// 피연산자 집합에 포함
    BelongsTo,
    /// (네트워크, 마스크) 범위에 포함
    BelongsToMask,
    /// 피연산자 이상
    GreaterEqual,
    /// 피연산자 이하
    SmallerEqual,
}

impl fmt::Display for PredicateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::BelongsTo => "BELONGS_TO",
            Self::BelongsToMask => "BELONGS_TO_MASK",
            Self::GreaterEqual => "GREATER_EQUAL",
            Self::SmallerEqual => "SMALLER_EQUAL",
        };
        f.write_str(s)
    }
}

/// 단일 조건
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Predicate {
    /// 대상 필드 이름 (세션 협력자가 인식하는 이름)
    pub field: String,
    /// 부정 여부
    pub negated: bool,
    /// 연산자
    pub op: PredicateOp,
    /// 피연산자
    pub operands: Vec<TypedValue>,
}

impl Predicate {
    /// `BELONGS_TO` 조건을 생성합니다.
    pub fn belongs_to(field: impl Into<String>, negated: bool, operands: Vec<TypedValue>) -> Self {
        Self {
            field: field.into(),
            negated,
            op: PredicateOp::BelongsTo,
            operands,
        }
    }

    /// 다시 컴파일하면 같은 조건이 되는 규칙 문자열 조각을 만듭니다.
    ///
    /// 규칙 언어로 표현할 수 없는 조건이면 `None`입니다.
    pub fn to_filter_fragment(&self) -> Option<String> {
        let bang = if self.negated { "!" } else { "" };

        let (name, values) = match (self.field.as_str(), self.op) {
            ("time", PredicateOp::GreaterEqual) => ("starttime", vec![local_time_argument(self.operands.first()?)?]),
            ("time", PredicateOp::SmallerEqual) => ("endtime", vec![local_time_argument(self.operands.first()?)?]),
            (field, PredicateOp::BelongsToMask) => {
                let [network, mask] = self.operands.as_slice() else {
                    return None;
                };
                (field, vec![format!("{}/{}", network.ipv4()?, mask.ipv4()?)])
            }
            ("rule", PredicateOp::BelongsTo) | ("service", PredicateOp::BelongsTo)
                if self.operands.is_empty() =>
            {
                // 역순 범위는 빈 피연산자로 컴파일됩니다.
                (self.field.as_str(), vec!["1-0".to_owned()])
            }
            (field, PredicateOp::BelongsTo) => {
                let values = self
                    .operands
                    .iter()
                    .map(operand_argument)
                    .collect::<Option<Vec<_>>>()?;
                if values.is_empty() {
                    return None;
                }
                (field, values)
            }
            _ => return None,
        };

        let name = if name == "Administrator" {
            "administrator"
        } else {
            name
        };
        Some(format!("{name}{bang}={}", values.join(",")))
    }
}

fn operand_argument(value: &TypedValue) -> Option<String> {
    match value {
        TypedValue::String(s) => Some(s.clone()),
        TypedValue::IpAddress(_) => value.ipv4().map(|ip: Ipv4Addr| ip.to_string()),
        TypedValue::Port(_) => value.port().map(|p| p.to_string()),
        TypedValue::ActionCode(code) => ACTION_CODES
            .iter()
            .find(|(_, c)| c == code)
            .map(|(name, _)| (*name).to_owned()),
        TypedValue::ProtocolNumber(number) => PROTOCOL_NUMBERS
            .iter()
            .find(|(_, n)| n == number)
            .map(|(name, _)| (*name).to_owned()),
        TypedValue::RuleNumber(n) => Some(n.to_string()),
        TypedValue::UnixTime(_) => None,
    }
}

fn local_time_argument(value: &TypedValue) -> Option<String> {
    let TypedValue::UnixTime(secs) = value else {
        return None;
    };
    Local
        .timestamp_opt(*secs, 0)
        .single()
        .map(|t| t.format(TIME_ARGUMENT_FORMAT).to_string())
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bang = if self.negated { "NOT " } else { "" };
        write!(f, "{bang}{} {}[", self.field, self.op)?;
        for (i, operand) in self.operands.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}:{}", operand.tag(), operand)?;
        }
        f.write_str("]")
    }
}

/// 규칙: 조건 전체가 일치하면 동작을 적용합니다.
///
/// 조건이 없는 규칙은 모든 레코드와 일치합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// 동작
    pub action: RuleAction,
    /// 조건 목록 (AND)
    pub predicates: Vec<Predicate>,
}

impl Rule {
    /// 빈 PASS 규칙을 생성합니다.
    pub fn pass() -> Self {
        Self {
            action: RuleAction::Pass,
            predicates: Vec::new(),
        }
    }

    /// 규칙이 특정 필드를 제약하는지 확인합니다.
    pub fn constrains(&self, field: &str) -> bool {
        self.predicates.iter().any(|p| p.field == field)
    }

    /// 다시 컴파일하면 같은 규칙이 되는 규칙 문자열을 만듭니다.
    ///
    /// DROP 규칙은 규칙 언어로 표현할 수 없으므로 `None`입니다.
    pub fn to_filter_string(&self) -> Option<String> {
        if self.action != RuleAction::Pass {
            return None;
        }
        let fragments = self
            .predicates
            .iter()
            .map(Predicate::to_filter_fragment)
            .collect::<Option<Vec<_>>>()?;
        Some(fragments.join(";"))
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.action)?;
        if self.predicates.is_empty() {
            return f.write_str(" *");
        }
        for (i, predicate) in self.predicates.iter().enumerate() {
            let sep = if i == 0 { " " } else { " AND " };
            write!(f, "{sep}{predicate}")?;
        }
        Ok(())
    }
}

/// 컴파일된 필터 규칙베이스
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicateTree {
    /// 규칙 대상 레코드 종류
    pub record_kind: RecordKind,
    /// 순서가 있는 규칙 목록 (첫 일치 규칙 적용)
    pub rules: Vec<Rule>,
}

impl PredicateTree {
    /// 빈 규칙베이스를 생성합니다.
    pub fn new(record_kind: RecordKind) -> Self {
        Self {
            record_kind,
            rules: Vec::new(),
        }
    }

    /// 규칙이 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 규칙 개수
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// PASS 규칙을 규칙 문자열로 되돌립니다.
    pub fn to_filter_strings(&self) -> Vec<String> {
        self.rules
            .iter()
            .filter_map(Rule::to_filter_string)
            .collect()
    }
}

impl fmt::Display for PredicateTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, rule) in self.rules.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}: {rule}", i + 1)?;
        }
        Ok(())
    }
}
