//! 필드 카탈로그
//!
//! 레코드 종류별로 알려진 속성 이름과 그 순서를 정의합니다. 인덱스 0은 레코드 번호
//! (`loc`), 인덱스 1은 시간(`time`)으로 예약되어 있으며, 포매터는 이 두 인덱스로
//! 합성 필드를 찾습니다.
//!
//! 필터 컴파일러가 사용하는 인자 어휘도 여기 정의됩니다.

use loggrabber_core::types::RecordKind;

/// 레코드 번호 필드의 예약 인덱스
pub const RECORD_NUMBER_INDEX: usize = 0;

/// 시간 필드의 예약 인덱스
pub const TIME_INDEX: usize = 1;

const TRAFFIC_FIELDS: &[&str] = &[
    "loc",
    "time",
    "action",
    "orig",
    "alert",
    "i/f_dir",
    "i/f_name",
    "has_accounting",
    "uuid",
    "product",
    "__policy_id_tag",
    "src",
    "s_port",
    "dst",
    "service",
    "tcp_flags",
    "proto",
    "rule",
    "xlatesrc",
    "xlatedst",
    "xlatesport",
    "xlatedport",
    "NAT_rulenum",
    "NAT_addtnl_rulenum",
    "resource",
    "elapsed",
    "packets",
    "bytes",
    "reason",
    "service_name",
    "agent",
    "from",
    "to",
    "sys_msgs",
    "fw_message",
    "Internal_CA:",
    "serial_num:",
    "dn:",
    "ICMP",
    "icmp-type",
    "ICMP Type",
    "icmp-code",
    "ICMP Code",
    "msgid",
    "message_info",
    "log_sys_message",
    "session_id:",
    "dns_query",
    "dns_type",
    "scheme:",
    "srckeyid",
    "dstkeyid",
    "methods:",
    "peer gateway",
    "IKE:",
    "IKE IDs:",
    "encryption failure:",
    "encryption fail reason:",
    "CookieI",
    "CookieR",
    "start_time",
    "segment_time",
    "client_inbound_packets",
    "client_outbound_packets",
    "client_inbound_bytes",
    "client_outbound_bytes",
    "client_inbound_interface",
    "client_outbound_interface",
    "server_inbound_packets",
    "server_outbound_packets",
    "server_inbound_bytes",
    "server_outbound_bytes",
    "server_inbound_interface",
    "server_outbound_interface",
    "message",
    "user",
    "srcname",
    "OM:",
    "om_method:",
    "assigned_IP:",
    "vpn_user",
    "MAC:",
    "attack",
    "Attack Info",
    "Cluster_Info",
    "DCE-RPC Interface UUID",
    "DCE-RPC Interface UUID-1",
    "DCE-RPC Interface UUID-2",
    "DCE-RPC Interface UUID-3",
    "during_sec",
    "fragments_dropped",
    "ip_id",
    "ip_len",
    "ip_offset",
    "TCP flags",
    "sync_info:",
    "log",
    "cpmad",
    "auth_method",
    "TCP packet out of state",
    "rpc_prog",
    "th_flags",
    "cp_message:",
    "reject_category",
    "IKE Log:",
    "Negotiation Id:",
    "decryption failure:",
    "len",
];

const AUDIT_FIELDS: &[&str] = &[
    "loc",
    "time",
    "action",
    "orig",
    "i/f_dir",
    "i/f_name",
    "has_accounting",
    "uuid",
    "product",
    "ObjectName",
    "ObjectType",
    "ObjectTable",
    "Operation",
    "Uid",
    "Administrator",
    "Machine",
    "Subject",
    "Audit Status",
    "Additional Info",
    "Operation Number",
    "FieldsChanges",
];

const TRAFFIC_FILTER_ARGUMENTS: &[&str] = &[
    "product",
    "fw_subproduct",
    "action",
    "orig",
    "src",
    "dst",
    "proto",
    "rule",
    "service",
    "starttime",
    "endtime",
];

const AUDIT_FILTER_ARGUMENTS: &[&str] = &[
    "product",
    "administrator",
    "orig",
    "action",
    "starttime",
    "endtime",
];

/// 카탈로그 항목
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// 정식 필드 이름
    pub canonical_name: &'static str,
    /// 소속 레코드 종류
    pub record_kind: RecordKind,
    /// 카탈로그 내 순서
    pub index: usize,
}

/// 레코드 종류 하나의 필드 카탈로그
#[derive(Debug, Clone, Copy)]
pub struct FieldCatalog {
    kind: RecordKind,
    names: &'static [&'static str],
    filter_arguments: &'static [&'static str],
}

static TRAFFIC: FieldCatalog = FieldCatalog {
    kind: RecordKind::Traffic,
    names: TRAFFIC_FIELDS,
    filter_arguments: TRAFFIC_FILTER_ARGUMENTS,
};

static AUDIT: FieldCatalog = FieldCatalog {
    kind: RecordKind::Audit,
    names: AUDIT_FIELDS,
    filter_arguments: AUDIT_FILTER_ARGUMENTS,
};

impl FieldCatalog {
    /// 레코드 종류의 카탈로그를 반환합니다.
    pub fn for_kind(kind: RecordKind) -> &'static FieldCatalog {
        match kind {
            RecordKind::Traffic => &TRAFFIC,
            RecordKind::Audit => &AUDIT,
        }
    }

    /// 카탈로그의 레코드 종류
    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    /// 필드 개수
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// 비어 있는지 여부 (정적 테이블이므로 항상 `false`)
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// 필드 이름을 카탈로그 순서대로 반환합니다.
    pub fn names(&self) -> &'static [&'static str] {
        self.names
    }

    /// 항목을 카탈로그 순서대로 순회합니다.
    pub fn descriptors(&self) -> impl Iterator<Item = FieldDescriptor> + '_ {
        self.names
            .iter()
            .enumerate()
            .map(|(index, name)| FieldDescriptor {
                canonical_name: name,
                record_kind: self.kind,
                index,
            })
    }

    /// 인덱스로 항목을 찾습니다.
    pub fn get(&self, index: usize) -> Option<FieldDescriptor> {
        self.names.get(index).map(|name| FieldDescriptor {
            canonical_name: name,
            record_kind: self.kind,
            index,
        })
    }

    /// 정식 이름으로 항목을 찾습니다 (대소문자 구분).
    pub fn lookup(&self, name: &str) -> Option<FieldDescriptor> {
        self.names
            .iter()
            .position(|n| *n == name)
            .and_then(|index| self.get(index))
    }

    /// 레코드 번호 필드 이름 (`loc`)
    pub fn record_number_field(&self) -> &'static str {
        self.names[RECORD_NUMBER_INDEX]
    }

    /// 시간 필드 이름 (`time`)
    pub fn time_field(&self) -> &'static str {
        self.names[TIME_INDEX]
    }

    /// 필터 규칙에서 허용되는 인자 이름 (소문자)
    pub fn filter_arguments(&self) -> &'static [&'static str] {
        self.filter_arguments
    }

    /// 필터 인자 이름이 이 종류에서 유효한지 확인합니다.
    pub fn accepts_filter_argument(&self, name: &str) -> bool {
        self.filter_arguments.contains(&name)
    }
}
