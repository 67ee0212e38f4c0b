//! Output formatting for text vs JSON rendering
//!
//! Every subcommand payload goes through [`OutputWriter`], so handlers never
//! branch on the output format themselves.

use std::io::Write;

use serde::Serialize;

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Writes command payloads in the selected format.
pub struct OutputWriter {
    format: OutputFormat,
}

impl OutputWriter {
    /// # Examples
    ///
    /// ```no_run
    /// use loggrabber_cli::cli::OutputFormat;
    /// use loggrabber_cli::output::OutputWriter;
    ///
    /// let writer = OutputWriter::new(OutputFormat::Json);
    /// ```
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Render a payload to stdout.
    pub fn render<T: Render + Serialize>(&self, payload: &T) -> Result<(), CliError> {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        self.render_to(payload, &mut handle)
    }

    /// Render a payload to an arbitrary writer.
    ///
    /// JSON output is pretty-printed and newline-terminated.
    pub fn render_to<T: Render + Serialize>(
        &self,
        payload: &T,
        w: &mut dyn Write,
    ) -> Result<(), CliError> {
        match self.format {
            OutputFormat::Text => payload.render_text(w)?,
            OutputFormat::Json => {
                serde_json::to_writer_pretty(&mut *w, payload)?;
                writeln!(w)?;
            }
        }
        Ok(())
    }
}

/// Human-readable text rendering, implemented alongside `serde::Serialize`.
pub trait Render {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Position {
        key: String,
        last_record_position: Option<i64>,
    }

    impl Render for Position {
        fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
            match self.last_record_position {
                Some(p) => writeln!(w, "{}: {}", self.key, p),
                None => writeln!(w, "{}: none", self.key),
            }
        }
    }

    fn render(format: OutputFormat, payload: &Position) -> String {
        let mut buffer = Vec::new();
        OutputWriter::new(format)
            .render_to(payload, &mut buffer)
            .expect("rendering should succeed");
        String::from_utf8(buffer).expect("valid UTF-8")
    }

    #[test]
    fn test_text_format_uses_render() {
        let payload = Position {
            key: "0@fw1".to_owned(),
            last_record_position: Some(12),
        };
        assert_eq!(render(OutputFormat::Text, &payload), "0@fw1: 12\n");
    }

    #[test]
    fn test_json_format_is_pretty_and_terminated() {
        let payload = Position {
            key: "-1@fw1".to_owned(),
            last_record_position: None,
        };
        let output = render(OutputFormat::Json, &payload);

        assert!(output.ends_with("}\n"));
        assert!(output.contains("\n  \"key\""), "pretty JSON should be indented");
        let parsed: serde_json::Value = serde_json::from_str(&output).expect("valid JSON");
        assert_eq!(parsed["key"].as_str(), Some("-1@fw1"));
        assert!(parsed["last_record_position"].is_null());
    }
}
