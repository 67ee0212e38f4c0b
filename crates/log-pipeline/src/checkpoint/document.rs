//! 상태 서비스 응답 문서 파서
//!
//! 응답은 `<s:key name="KEY">VALUE</s:key>` 형태의 키 선언을 담은 텍스트입니다.
//! 값은 `<![CDATA[...]]>`로 감싸져 있을 수 있습니다. 같은 키가 여러 번 나오면
//! 첫 번째 선언이 우선합니다.

use std::collections::HashMap;

const KEY_OPEN: &str = "<s:key name=\"";
const KEY_CLOSE: &str = "</s:key>";
const CDATA_OPEN: &str = "<![CDATA[";
const CDATA_CLOSE: &str = "]]>";

/// 파싱된 키/값 문서
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusDocument {
    values: HashMap<String, String>,
}

impl StatusDocument {
    /// 응답 본문을 파싱합니다. 형식이 맞지 않는 선언은 건너뜁니다.
    pub fn parse(body: &str) -> Self {
        let mut values = HashMap::new();
        let mut rest = body;

        while let Some(start) = rest.find(KEY_OPEN) {
            rest = &rest[start + KEY_OPEN.len()..];

            let Some(name_end) = rest.find('"') else {
                break;
            };
            let name = &rest[..name_end];
            let after_name = &rest[name_end + 1..];

            let Some(tag_end) = after_name.find('>') else {
                break;
            };
            let content = &after_name[tag_end + 1..];

            if let Some(value_end) = content.find(KEY_CLOSE) {
                values
                    .entry(name.to_owned())
                    .or_insert_with(|| unwrap_cdata(&content[..value_end]).to_owned());
            }

            // 중첩 선언도 찾을 수 있도록 여는 태그 직후부터 계속 탐색
            rest = content;
        }

        Self { values }
    }

    /// 키의 값을 반환합니다.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// 키가 있고 값이 비어 있지 않으면 반환합니다.
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.is_empty())
    }

    /// 키 개수
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// 키가 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn unwrap_cdata(value: &str) -> &str {
    value
        .strip_prefix(CDATA_OPEN)
        .and_then(|v| v.strip_suffix(CDATA_CLOSE))
        .unwrap_or(value)
}
