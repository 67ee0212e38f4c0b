//! `loggrabber filter` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use loggrabber_core::config::LoggrabberConfig;
use loggrabber_core::types::{ConnectionMode, RecordKind};
use loggrabber_log_pipeline::{FilterCompiler, PredicateTree};

use crate::cli::{FilterAction, FilterArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `filter` command.
pub async fn execute(
    args: FilterArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        FilterAction::Check {
            rules,
            audit,
            session,
        } => {
            let kind = if audit {
                RecordKind::Audit
            } else {
                RecordKind::Traffic
            };
            let mode = if session {
                Some(LoggrabberConfig::load(config_path).await?.lea.mode)
            } else {
                None
            };
            let report = check_rules(&rules, kind, mode)?;
            writer.render(&report)
        }
    }
}

/// Compile the rules, optionally with the rules a session in `mode` adds.
pub fn check_rules(
    rules: &[String],
    kind: RecordKind,
    mode: Option<ConnectionMode>,
) -> Result<FilterReport, CliError> {
    info!(rules = rules.len(), %kind, ?mode, "compiling filter rules");

    let tree = match mode {
        Some(mode) => FilterCompiler::compile_session_rulebase(rules, mode, kind)?
            .unwrap_or_else(|| PredicateTree::new(kind)),
        None => FilterCompiler::compile(rules, kind)?,
    };

    Ok(FilterReport {
        record_kind: kind.to_string(),
        mode: mode.map(|m| m.to_string()),
        canonical: tree.to_filter_strings(),
        rules: tree.rules.iter().map(ToString::to_string).collect(),
    })
}

/// Compiled rulebase report.
#[derive(Debug, Serialize)]
pub struct FilterReport {
    /// Record kind the rules were compiled for
    pub record_kind: String,
    /// Connection mode whose session rules were added
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    /// Rules in evaluation order, rendered as `ACTION predicate AND ...`
    pub rules: Vec<String>,
    /// Rule strings that recompile to the same PASS rules
    pub canonical: Vec<String>,
}

impl Render for FilterReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        match &self.mode {
            Some(mode) => writeln!(
                w,
                "Rulebase ({} records, {} session):",
                self.record_kind.bold(),
                mode
            )?,
            None => writeln!(w, "Rulebase ({} records):", self.record_kind.bold())?,
        }

        if self.rules.is_empty() {
            writeln!(w, "  (no rules; every record passes)")?;
        }
        for (i, rule) in self.rules.iter().enumerate() {
            writeln!(w, "  {}: {}", i + 1, rule)?;
        }

        if !self.canonical.is_empty() {
            writeln!(w)?;
            writeln!(w, "Canonical form:")?;
            for rule in &self.canonical {
                writeln!(w, "  {}", rule.green())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn test_check_rules_reports_each_rule() {
        let report = check_rules(
            &rules(&["action=drop", "proto=tcp;service=22"]),
            RecordKind::Traffic,
            None,
        )
        .unwrap();

        assert_eq!(report.record_kind, "traffic");
        assert_eq!(report.rules.len(), 2);
        assert_eq!(report.canonical.len(), 2);
        assert!(report.rules[0].starts_with("PASS"));
    }

    #[test]
    fn test_check_rules_unknown_argument_fails() {
        let err = check_rules(&rules(&["colour=red"]), RecordKind::Traffic, None).unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn test_audit_vocabulary_differs() {
        // audit records have no service argument
        assert!(check_rules(&rules(&["service=22"]), RecordKind::Audit, None).is_err());
    }

    #[test]
    fn test_firewall_session_prepends_vpn_drop() {
        let report = check_rules(
            &rules(&["action=accept"]),
            RecordKind::Traffic,
            Some(ConnectionMode::Firewall),
        )
        .unwrap();

        assert_eq!(report.mode.as_deref(), Some("firewall"));
        assert!(report.rules[0].starts_with("DROP"));
        assert_eq!(report.rules.len(), 3);
    }

    #[test]
    fn test_render_text_lists_rules() {
        let report = check_rules(&rules(&["action=drop"]), RecordKind::Traffic, None).unwrap();
        let mut buffer = Vec::new();
        report.render_text(&mut buffer).unwrap();
        let output = String::from_utf8(buffer).unwrap();
        assert!(output.contains("1: PASS"));
        assert!(output.contains("Canonical form:"));
    }
}
