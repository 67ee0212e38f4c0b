#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use loggrabber_core::types::{DateFormat, TypedValue};
use loggrabber_log_pipeline::{FormatOptions, RawField, RawRecord, RecordFormatter};

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    position: i64,
    date_format: FuzzDateFormat,
    separator: char,
    /// 속성 목록 (최대 16개로 제한)
    fields: Vec<FuzzField>,
}

#[derive(Arbitrary, Debug)]
enum FuzzDateFormat {
    Cp,
    Unix,
    Std,
}

#[derive(Arbitrary, Debug)]
struct FuzzField {
    name: String,
    value: FuzzValue,
    resolved: Option<String>,
}

#[derive(Arbitrary, Debug)]
enum FuzzValue {
    String(String),
    IpAddress(u32),
    Port(u16),
    ProtocolNumber(u8),
    ActionCode(u8),
    RuleNumber(u32),
    UnixTime(i64),
}

impl FuzzValue {
    fn into_typed(self) -> TypedValue {
        match self {
            Self::String(s) => TypedValue::String(s),
            Self::IpAddress(v) => TypedValue::IpAddress(v),
            Self::Port(v) => TypedValue::Port(v),
            Self::ProtocolNumber(v) => TypedValue::ProtocolNumber(v),
            Self::ActionCode(v) => TypedValue::ActionCode(v),
            Self::RuleNumber(v) => TypedValue::RuleNumber(v),
            Self::UnixTime(v) => TypedValue::UnixTime(v),
        }
    }
}

fuzz_target!(|input: FuzzInput| {
    if matches!(input.separator, '\n' | '\\' | '=') {
        return;
    }

    let date_format = match input.date_format {
        FuzzDateFormat::Cp => DateFormat::VendorNative,
        FuzzDateFormat::Unix => DateFormat::UnixEpoch,
        FuzzDateFormat::Std => DateFormat::LocalString,
    };
    let formatter = RecordFormatter::new(FormatOptions {
        date_format,
        separator: input.separator,
        ..FormatOptions::default()
    });

    let fields = input
        .fields
        .into_iter()
        .take(16)
        .map(|f| RawField {
            name: f.name,
            value: f.value.into_typed(),
            resolved: f.resolved,
        })
        .collect();

    // 출력은 항상 한 줄
    let line = formatter.format(&RawRecord::new(input.position, fields));
    assert!(!line.contains('\n'));
});
