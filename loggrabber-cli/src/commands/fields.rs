//! `loggrabber fields` command handler

use std::io::Write;

use serde::Serialize;

use loggrabber_core::types::RecordKind;
use loggrabber_log_pipeline::FieldCatalog;

use crate::cli::FieldsArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `fields` command.
pub fn execute(args: FieldsArgs, writer: &OutputWriter) -> Result<(), CliError> {
    let kind = if args.audit {
        RecordKind::Audit
    } else {
        RecordKind::Traffic
    };
    writer.render(&catalog_report(kind))
}

/// Describe the catalog of one record kind.
pub fn catalog_report(kind: RecordKind) -> FieldsReport {
    let catalog = FieldCatalog::for_kind(kind);
    FieldsReport {
        record_kind: kind.to_string(),
        fields: catalog
            .descriptors()
            .map(|d| FieldEntry {
                index: d.index,
                name: d.canonical_name,
            })
            .collect(),
        filter_arguments: catalog.filter_arguments().to_vec(),
    }
}

/// One catalog entry.
#[derive(Debug, Serialize)]
pub struct FieldEntry {
    pub index: usize,
    pub name: &'static str,
}

/// Field catalog listing.
#[derive(Debug, Serialize)]
pub struct FieldsReport {
    /// Record kind
    pub record_kind: String,
    /// Fields in catalog order
    pub fields: Vec<FieldEntry>,
    /// Argument names accepted by filter rules
    pub filter_arguments: Vec<&'static str>,
}

impl Render for FieldsReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(
            w,
            "{} fields ({}):",
            self.record_kind.bold(),
            self.fields.len()
        )?;
        writeln!(w, "{:>5}  {}", "INDEX", "NAME")?;
        writeln!(w, "{}", "-".repeat(40))?;
        for field in &self.fields {
            writeln!(w, "{:>5}  {}", field.index, field.name)?;
        }
        writeln!(w)?;
        writeln!(w, "Filter arguments: {}", self.filter_arguments.join(", "))?;
        Ok(())
    }
}
