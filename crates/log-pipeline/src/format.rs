//! 레코드 포매터
//!
//! 세션 협력자가 넘겨준 [`RawRecord`]를 구분자로 이어진 한 줄 텍스트로 변환합니다.
//!
//! # 변환 순서
//! 1. 레코드 번호 필드(`loc`)를 1부터 시작하는 위치로 맨 앞에 둡니다.
//! 2. 이름 해석이 꺼져 있으면 IP/포트 값은 숫자 표기로 출력합니다.
//! 3. 시간 필드는 [`DateFormat`]에 따라 출력합니다.
//! 4. 선택 필드가 있으면 나머지를 버립니다 (레코드 번호 필드 포함).
//! 5. 이름과 값의 구분자와 `\`를 이스케이프한 뒤 `name=value`를 구분자로 잇습니다.
//! 6. 결과의 줄바꿈은 `(+)`로 바꿉니다.

use std::collections::HashSet;

use chrono::{Local, TimeZone};
use serde::{Deserialize, Serialize};

use loggrabber_core::types::{DateFormat, RecordKind, TypedValue, ValueTag};

use crate::catalog::FieldCatalog;

/// 줄바꿈 대체 문자열
pub const NEWLINE_MARKER: &str = "(+)";

/// `std` 날짜 형식
pub const LOCAL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 레코드 속성 하나
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawField {
    /// 속성 이름
    pub name: String,
    /// 원본 값
    pub value: TypedValue,
    /// 협력자가 해석한 문자열 (서비스 이름, 호스트 이름, 벤더 시각 형식 등)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved: Option<String>,
}

impl RawField {
    /// 해석 문자열 없는 속성을 생성합니다.
    pub fn new(name: impl Into<String>, value: TypedValue) -> Self {
        Self {
            name: name.into(),
            value,
            resolved: None,
        }
    }

    /// 해석 문자열을 붙입니다.
    pub fn with_resolved(mut self, resolved: impl Into<String>) -> Self {
        self.resolved = Some(resolved.into());
        self
    }

    fn resolved_text(&self) -> String {
        match &self.resolved {
            Some(text) => text.clone(),
            None => self.value.to_string(),
        }
    }
}

/// 세션 협력자가 전달한 레코드
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    /// 스트림 내 위치 (0부터)
    pub position: i64,
    /// 속성 목록 (전달된 순서)
    pub fields: Vec<RawField>,
}

impl RawRecord {
    /// 레코드를 생성합니다.
    pub fn new(position: i64, fields: Vec<RawField>) -> Self {
        Self { position, fields }
    }

    /// 외부에 보고하는 위치 (1부터)
    pub fn reported_position(&self) -> i64 {
        self.position + 1
    }
}

/// 포매터 옵션
#[derive(Debug, Clone)]
pub struct FormatOptions {
    /// 레코드 종류
    pub record_kind: RecordKind,
    /// 이름 해석 여부
    pub resolve_mode: bool,
    /// 시간 필드 형식
    pub date_format: DateFormat,
    /// 구분 문자
    pub separator: char,
    /// 선택 필드 (비어 있으면 전체)
    pub selected_fields: Vec<String>,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            record_kind: RecordKind::Traffic,
            resolve_mode: false,
            date_format: DateFormat::LocalString,
            separator: '|',
            selected_fields: Vec::new(),
        }
    }
}

/// 레코드 포매터
///
/// 옵션은 세션마다 고정이므로 선택 필드 집합을 미리 만들어 둡니다.
#[derive(Debug, Clone)]
pub struct RecordFormatter {
    catalog: &'static FieldCatalog,
    resolve_mode: bool,
    date_format: DateFormat,
    separator: char,
    selection: HashSet<String>,
}

impl RecordFormatter {
    /// 옵션으로 포매터를 생성합니다.
    pub fn new(options: FormatOptions) -> Self {
        Self {
            catalog: FieldCatalog::for_kind(options.record_kind),
            resolve_mode: options.resolve_mode,
            date_format: options.date_format,
            separator: options.separator,
            selection: options.selected_fields.into_iter().collect(),
        }
    }

    /// 대상 레코드 종류
    pub fn record_kind(&self) -> RecordKind {
        self.catalog.kind()
    }

    /// 레코드를 한 줄로 변환합니다.
    ///
    /// 선택 후 남은 필드가 없으면 빈 문자열이며, 호출자는 출력하지 않아야 합니다.
    pub fn format(&self, record: &RawRecord) -> String {
        let record_number = self.catalog.record_number_field();
        let mut pairs: Vec<(&str, String)> = Vec::with_capacity(record.fields.len() + 1);

        if self.is_selected(record_number) {
            pairs.push((record_number, record.reported_position().to_string()));
        }

        for field in &record.fields {
            if !self.is_selected(&field.name) {
                continue;
            }
            pairs.push((&field.name, self.render_value(field)));
        }

        let mut line = String::new();
        for (i, (name, value)) in pairs.iter().enumerate() {
            if i > 0 {
                line.push(self.separator);
            }
            line.push_str(&escape(name, self.separator));
            line.push('=');
            line.push_str(&escape(value, self.separator));
        }

        mask_newlines(&line)
    }

    fn is_selected(&self, name: &str) -> bool {
        self.selection.is_empty() || self.selection.contains(name)
    }

    fn render_value(&self, field: &RawField) -> String {
        if field.name == self.catalog.time_field() {
            return self.render_time(field);
        }

        match field.value.tag() {
            ValueTag::IpAddress | ValueTag::Port if !self.resolve_mode => field.value.to_string(),
            _ => field.resolved_text(),
        }
    }

    fn render_time(&self, field: &RawField) -> String {
        match (self.date_format, &field.value) {
            (DateFormat::VendorNative, _) => field.resolved_text(),
            (DateFormat::UnixEpoch, TypedValue::UnixTime(secs)) => secs.to_string(),
            (DateFormat::LocalString, TypedValue::UnixTime(secs)) => Local
                .timestamp_opt(*secs, 0)
                .single()
                .map(|t| t.format(LOCAL_TIME_FORMAT).to_string())
                .unwrap_or_else(|| secs.to_string()),
            _ => field.resolved_text(),
        }
    }
}

/// 구분자와 `\` 앞에 `\`를 붙입니다.
pub fn escape(text: &str, separator: char) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c == separator || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// 줄바꿈을 `(+)`로 바꿉니다.
pub fn mask_newlines(text: &str) -> String {
    text.replace('\n', NEWLINE_MARKER)
}
