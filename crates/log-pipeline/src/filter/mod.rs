//! 필터 컴파일러
//!
//! 운영자가 작성한 규칙 문자열을 세션 협력자에 등록할 [`PredicateTree`]로 컴파일합니다.
//!
//! # 규칙 문법
//! - 조건은 `;`로 구분하며, 각 조건은 `name[!]=value[,value...]` 형태입니다.
//! - 이름 끝의 `!`는 조건을 부정합니다.
//! - 이름은 소문자로 변환한 뒤 레코드 종류별 어휘와 비교합니다.
//! - 규칙 문자열 하나는 PASS 규칙 하나가 됩니다.
//!
//! # 사용 예시
//! ```ignore
//! use loggrabber_core::types::RecordKind;
//! use loggrabber_log_pipeline::filter::FilterCompiler;
//!
//! let tree = FilterCompiler::compile(&["proto=tcp,udp;action=accept"], RecordKind::Traffic)?;
//! assert_eq!(tree.rules.len(), 1);
//! ```

pub mod parser;
pub mod types;

pub use types::{Predicate, PredicateOp, PredicateTree, Rule, RuleAction};

use loggrabber_core::error::FilterError;
use loggrabber_core::types::{ConnectionMode, RecordKind, TypedValue};
use tracing::debug;

use crate::catalog::FieldCatalog;
use parser::{
    AddressSpec, Argument, ACTION_CODES, AUDIT_PRODUCTS, PROTOCOL_NUMBERS, TRAFFIC_PRODUCTS,
    checked_choice, expand_range, parse_address_spec, parse_ip, parse_local_time,
    split_argument, split_fragments, split_values, symbolic_code,
};

/// VPN 하위 제품 이름
const VPN_SUBPRODUCT: &str = "VPN-1";

/// 규칙 문자열 컴파일러
///
/// 레코드 종류마다 허용되는 인자 어휘가 다르며, 어휘는 [`FieldCatalog`]에서 가져옵니다.
#[derive(Debug, Clone, Copy)]
pub struct FilterCompiler {
    catalog: &'static FieldCatalog,
}

impl FilterCompiler {
    /// 레코드 종류에 대한 컴파일러를 생성합니다.
    pub fn new(kind: RecordKind) -> Self {
        Self {
            catalog: FieldCatalog::for_kind(kind),
        }
    }

    /// 대상 레코드 종류
    pub fn record_kind(&self) -> RecordKind {
        self.catalog.kind()
    }

    /// 규칙 문자열 목록을 규칙베이스로 컴파일합니다.
    ///
    /// 문자열 순서가 규칙 순서입니다. 하나라도 실패하면 전체가 실패합니다.
    pub fn compile<S: AsRef<str>>(
        rules: &[S],
        kind: RecordKind,
    ) -> Result<PredicateTree, FilterError> {
        let compiler = Self::new(kind);
        let rules = rules
            .iter()
            .map(|rule| compiler.compile_rule(rule.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PredicateTree {
            record_kind: kind,
            rules,
        })
    }

    /// 세션에 등록할 규칙베이스를 만듭니다.
    ///
    /// 사용자 규칙 뒤에 모드가 강제하는 규칙을 붙이고, 방화벽 모드에서 사용자 규칙이
    /// 제품을 제약하지 않으면 VPN 트래픽을 버리는 규칙을 맨 앞에 둡니다.
    /// 등록할 규칙이 없으면 `None`입니다.
    pub fn compile_session_rulebase<S: AsRef<str>>(
        user_rules: &[S],
        mode: ConnectionMode,
        kind: RecordKind,
    ) -> Result<Option<PredicateTree>, FilterError> {
        let mut tree = Self::compile(user_rules, kind)?;

        if kind == RecordKind::Traffic {
            let constrains_product = tree
                .rules
                .iter()
                .any(|r| r.constrains("fw_subproduct") || r.constrains("product"));

            if let Some(implied) = mode.implied_filter() {
                let compiler = Self::new(kind);
                tree.rules.push(compiler.compile_rule(implied)?);
            }

            if mode == ConnectionMode::Firewall && !constrains_product {
                debug!("prepending drop rule for VPN traffic");
                tree.rules.insert(0, drop_vpn_rule());
            }
        }

        if tree.is_empty() {
            Ok(None)
        } else {
            Ok(Some(tree))
        }
    }

    /// 규칙 문자열 하나를 PASS 규칙으로 컴파일합니다.
    pub fn compile_rule(&self, rule: &str) -> Result<Rule, FilterError> {
        let predicates = split_fragments(rule)
            .map(|fragment| self.compile_fragment(fragment))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Rule {
            action: RuleAction::Pass,
            predicates,
        })
    }

    fn compile_fragment(&self, fragment: &str) -> Result<Predicate, FilterError> {
        let argument = split_argument(fragment)?;
        if !self.catalog.accepts_filter_argument(&argument.name) {
            return Err(FilterError::UnknownField {
                name: argument.name,
                kind: self.catalog.kind().to_string(),
            });
        }

        let Argument {
            name,
            negated,
            value,
        } = argument;

        let predicate = match name.as_str() {
            "product" => {
                let allowed = match self.catalog.kind() {
                    RecordKind::Traffic => TRAFFIC_PRODUCTS,
                    RecordKind::Audit => AUDIT_PRODUCTS,
                };
                let operands = split_values(value, fragment)?
                    .into_iter()
                    .map(|v| checked_choice(v, allowed, "product", fragment).map(TypedValue::String))
                    .collect::<Result<_, _>>()?;
                Predicate::belongs_to("product", negated, operands)
            }
            "fw_subproduct" | "administrator" => {
                let field = if name == "administrator" {
                    "Administrator"
                } else {
                    "fw_subproduct"
                };
                let operands = split_values(value, fragment)?
                    .into_iter()
                    .map(|v| TypedValue::String(v.to_owned()))
                    .collect();
                Predicate::belongs_to(field, negated, operands)
            }
            "action" => {
                let operands = split_values(value, fragment)?
                    .into_iter()
                    .map(|v| symbolic_code(v, ACTION_CODES, "action", fragment).map(TypedValue::ActionCode))
                    .collect::<Result<_, _>>()?;
                Predicate::belongs_to("action", negated, operands)
            }
            "proto" => {
                let operands = split_values(value, fragment)?
                    .into_iter()
                    .map(|v| symbolic_code(v, PROTOCOL_NUMBERS, "proto", fragment).map(TypedValue::ProtocolNumber))
                    .collect::<Result<_, _>>()?;
                Predicate::belongs_to("proto", negated, operands)
            }
            "orig" => {
                let operands = split_values(value, fragment)?
                    .into_iter()
                    .map(|v| parse_ip(v, fragment).map(TypedValue::ip))
                    .collect::<Result<_, _>>()?;
                Predicate::belongs_to("orig", negated, operands)
            }
            "src" | "dst" => match parse_address_spec(value, fragment)? {
                AddressSpec::List(addrs) => Predicate::belongs_to(
                    name.as_str(),
                    negated,
                    addrs.into_iter().map(TypedValue::ip).collect(),
                ),
                AddressSpec::Network { network, mask } => Predicate {
                    field: name.clone(),
                    negated,
                    op: PredicateOp::BelongsToMask,
                    operands: vec![TypedValue::ip(network), TypedValue::ip(mask)],
                },
            },
            "rule" => {
                let mut operands = Vec::new();
                for item in split_values(value, fragment)? {
                    let numbers: Vec<u32> = expand_range(item, "rule", fragment)?;
                    operands.extend(numbers.into_iter().map(TypedValue::RuleNumber));
                }
                Predicate::belongs_to("rule", negated, operands)
            }
            "service" => {
                let mut operands = Vec::new();
                for item in split_values(value, fragment)? {
                    let ports: Vec<u16> = expand_range(item, "service", fragment)?;
                    operands.extend(ports.into_iter().map(TypedValue::port_from_host));
                }
                Predicate::belongs_to("service", negated, operands)
            }
            "starttime" | "endtime" => {
                let secs = parse_local_time(value, fragment)?;
                let op = if name == "starttime" {
                    PredicateOp::GreaterEqual
                } else {
                    PredicateOp::SmallerEqual
                };
                Predicate {
                    field: "time".to_owned(),
                    negated,
                    op,
                    operands: vec![TypedValue::UnixTime(secs)],
                }
            }
            other => {
                return Err(FilterError::UnknownField {
                    name: other.to_owned(),
                    kind: self.catalog.kind().to_string(),
                });
            }
        };

        Ok(predicate)
    }
}

/// VPN 하위 제품 트래픽을 버리는 고정 규칙
pub fn drop_vpn_rule() -> Rule {
    Rule {
        action: RuleAction::Drop,
        predicates: vec![Predicate::belongs_to(
            "fw_subproduct",
            false,
            vec![TypedValue::String(VPN_SUBPRODUCT.to_owned())],
        )],
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    fn compile_one(rule: &str) -> Result<Rule, FilterError> {
        FilterCompiler::new(RecordKind::Traffic).compile_rule(rule)
    }

    #[test]
    fn end_to_end_traffic_rule() {
        let tree = FilterCompiler::compile(&["proto=tcp,udp;action=accept;rule=1-2"], RecordKind::Traffic)
            .unwrap();
        assert_eq!(tree.rules.len(), 1);
        let rule = &tree.rules[0];
        assert_eq!(rule.action, RuleAction::Pass);
        assert_eq!(
            rule.predicates,
            vec![
                Predicate::belongs_to(
                    "proto",
                    false,
                    vec![TypedValue::ProtocolNumber(6), TypedValue::ProtocolNumber(17)]
                ),
                Predicate::belongs_to("action", false, vec![TypedValue::ActionCode(4)]),
                Predicate::belongs_to(
                    "rule",
                    false,
                    vec![TypedValue::RuleNumber(1), TypedValue::RuleNumber(2)]
                ),
            ]
        );
    }

    #[test]
    fn each_string_is_one_rule() {
        let tree = FilterCompiler::compile(&["proto=tcp", "proto=udp"], RecordKind::Traffic).unwrap();
        assert_eq!(tree.rules.len(), 2);
    }

    #[test]
    fn negated_service_range() {
        let rule = compile_one("service!=80-82").unwrap();
        let p = &rule.predicates[0];
        assert!(p.negated);
        assert_eq!(p.field, "service");
        let ports: Vec<u16> = p.operands.iter().filter_map(TypedValue::port).collect();
        assert_eq!(ports, vec![80, 81, 82]);
    }

    #[test]
    fn reversed_rule_range_has_no_operands() {
        let rule = compile_one("rule=5-3").unwrap();
        assert_eq!(rule.predicates.len(), 1);
        assert!(rule.predicates[0].operands.is_empty());
    }

    #[test]
    fn uppercase_names_are_folded() {
        let rule = compile_one("PROTO=tcp").unwrap();
        assert_eq!(rule.predicates[0].field, "proto");
    }

    #[test]
    fn unknown_field_is_rejected() {
        let err = compile_one("color=red").unwrap_err();
        assert_eq!(
            err,
            FilterError::UnknownField {
                name: "color".to_owned(),
                kind: "traffic".to_owned(),
            }
        );
    }

    #[test]
    fn traffic_only_argument_rejected_for_audit() {
        let err = FilterCompiler::compile(&["service=80"], RecordKind::Audit).unwrap_err();
        assert!(matches!(err, FilterError::UnknownField { .. }));
    }

    #[test]
    fn invalid_values_are_syntax_errors() {
        for rule in [
            "action=allow",
            "proto=sctp",
            "product=Other",
            "orig=1.2.3",
            "src=10.0.0.1,10.0.0.0/8",
            "starttime=2024",
            "rule=x",
            "proto=",
        ] {
            let err = compile_one(rule).unwrap_err();
            assert!(
                matches!(err, FilterError::Syntax { .. }),
                "{rule} should be a syntax error"
            );
        }
    }

    #[test]
    fn syntax_error_names_fragment() {
        let err = compile_one("proto=tcp;action=allow").unwrap_err();
        assert!(err.to_string().contains("action=allow"));
    }

    #[test]
    fn src_network_uses_mask_operator() {
        let rule = compile_one("src=10.0.0.0/255.0.0.0").unwrap();
        let p = &rule.predicates[0];
        assert_eq!(p.op, PredicateOp::BelongsToMask);
        assert_eq!(p.operands[0].ipv4(), Some(Ipv4Addr::new(10, 0, 0, 0)));
        assert_eq!(p.operands[1].ipv4(), Some(Ipv4Addr::new(255, 0, 0, 0)));
    }

    #[test]
    fn time_arguments_compile_to_time_field() {
        let rule = compile_one("starttime=20240101000000;endtime=20240102000000").unwrap();
        assert_eq!(rule.predicates[0].field, "time");
        assert_eq!(rule.predicates[0].op, PredicateOp::GreaterEqual);
        assert_eq!(rule.predicates[1].op, PredicateOp::SmallerEqual);
        let (TypedValue::UnixTime(start), TypedValue::UnixTime(end)) =
            (&rule.predicates[0].operands[0], &rule.predicates[1].operands[0])
        else {
            panic!("time operands must be unix time");
        };
        assert_eq!(end - start, 86_400);
    }

    #[test]
    fn audit_administrator_maps_to_catalog_name() {
        let tree = FilterCompiler::compile(&["administrator=admin,root;product=SmartDashboard"], RecordKind::Audit)
            .unwrap();
        let p = &tree.rules[0].predicates[0];
        assert_eq!(p.field, "Administrator");
        assert_eq!(p.operands.len(), 2);
    }

    #[test]
    fn session_rulebase_in_firewall_mode() {
        let tree = FilterCompiler::compile_session_rulebase(&["proto=tcp"], ConnectionMode::Firewall, RecordKind::Traffic)
            .unwrap()
            .unwrap();
        assert_eq!(tree.rules.len(), 3);
        assert_eq!(tree.rules[0], drop_vpn_rule());
        assert!(tree.rules[2].constrains("product"));
    }

    #[test]
    fn session_rulebase_skips_drop_rule_when_product_constrained() {
        let tree = FilterCompiler::compile_session_rulebase(
            &["fw_subproduct=VPN-1"],
            ConnectionMode::Firewall,
            RecordKind::Traffic,
        )
        .unwrap()
        .unwrap();
        assert_ne!(tree.rules[0].action, RuleAction::Drop);

        let tree = FilterCompiler::compile_session_rulebase(
            &["product=SmartDefense"],
            ConnectionMode::Firewall,
            RecordKind::Traffic,
        )
        .unwrap()
        .unwrap();
        assert_eq!(tree.rules.len(), 2);
        assert!(tree.rules.iter().all(|r| r.action != RuleAction::Drop));
    }

    #[test]
    fn session_rulebase_for_vpn_and_audit() {
        let tree = FilterCompiler::compile_session_rulebase::<&str>(&[], ConnectionMode::Vpn, RecordKind::Traffic)
            .unwrap()
            .unwrap();
        assert_eq!(tree.rules.len(), 1);
        assert!(tree.rules[0].constrains("fw_subproduct"));

        let none = FilterCompiler::compile_session_rulebase::<&str>(&[], ConnectionMode::Audit, RecordKind::Audit)
            .unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn canonical_strings_recompile_to_same_tree() {
        let tree = FilterCompiler::compile(
            &[
                "proto=tcp,udp;action!=drop;rule=1-3,7",
                "src=192.168.0.0/255.255.0.0;service=443",
                "orig=10.1.1.1;starttime=20240301120000",
                "rule=9-2",
            ],
            RecordKind::Traffic,
        )
        .unwrap();
        let again = FilterCompiler::compile(&tree.to_filter_strings(), RecordKind::Traffic).unwrap();
        assert_eq!(again, tree);
    }
}
