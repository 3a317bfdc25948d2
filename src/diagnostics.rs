//! # Diagnostics Module
//!
//! Compiler diagnostics and the structured failure raised when a compilation
//! reports any error.
//!
//! Diagnostic codes are stable and grouped by phase:
//!
//! - `E00xx` - syntax (lexing and parsing)
//! - `E01xx` - type and module resolution
//! - `E02xx` - item structure (attributes, parameters, declarations)
//! - `E03xx` - operation bodies
//! - `W0xxx` - warnings, which never fail a compilation
//!
//! [`CompilationError`] carries every diagnostic together with the full text of
//! every source unit that took part in the compilation, so the failure can be
//! reproduced from the error alone. Its `Display` output renders each diagnostic
//! with `ariadne` against the unit it points into and then lists the units.

use std::fmt;
use std::ops::Range;

use ariadne::{Config, Label, Report, ReportKind, Source};
use serde::Serialize;

use crate::compiler::SourceUnit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
        }
    }
}

/// One message reported by the compiler toolchain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: &'static str,
    pub message: String,
    /// Name of the source unit the span points into
    pub unit: String,
    /// Byte range within the unit text
    pub span: Range<usize>,
    /// 1-based
    pub line: usize,
    /// 1-based, in characters
    pub column: usize,
    /// Short note attached to the span when rendered
    pub label: Option<String>,
}

impl Diagnostic {
    /// Build a diagnostic, computing line and column from `text`.
    pub fn new(
        severity: Severity,
        code: &'static str,
        message: impl Into<String>,
        unit: &str,
        text: &str,
        span: Range<usize>,
    ) -> Self {
        let (line, column) = line_col(text, span.start);
        Self {
            severity,
            code,
            message: message.into(),
            unit: unit.to_string(),
            span,
            line,
            column,
            label: None,
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Render with `ariadne` (no colour) against the unit's text.
    pub fn render(&self, text: &str) -> String {
        let len = text.len();
        let start = self.span.start.min(len);
        let end = self.span.end.min(len).max(start);
        // ariadne needs a non-empty span to draw a label
        let span = if start == end {
            start.saturating_sub(usize::from(start == len && start > 0))..(end + 1).min(len)
        } else {
            start..end
        };
        let kind = match self.severity {
            Severity::Error => ReportKind::Error,
            Severity::Warning => ReportKind::Warning,
        };
        let report = Report::build(kind, span.clone())
            .with_code(self.code)
            .with_message(&self.message)
            .with_config(Config::default().with_color(false))
            .with_label(
                Label::new(span).with_message(self.label.as_deref().unwrap_or(&self.message)),
            )
            .finish();

        let mut buf = Vec::new();
        match report.write(Source::from(text), &mut buf) {
            Ok(()) => String::from_utf8_lossy(&buf).into_owned(),
            Err(_) => self.to_string(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}]: {} ({}:{}:{})",
            self.severity, self.code, self.message, self.unit, self.line, self.column
        )
    }
}

/// 1-based line and character column of a byte offset.
#[must_use]
pub fn line_col(text: &str, offset: usize) -> (usize, usize) {
    let mut offset = offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    let before = &text[..offset];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    let column = before[line_start..].chars().count() + 1;
    (line, column)
}

/// The synthesized source failed to compile.
#[derive(Debug, Clone)]
pub struct CompilationError {
    /// Every diagnostic reported, errors and warnings, in report order
    pub diagnostics: Vec<Diagnostic>,
    /// Every unit of the failed compilation, in compilation order
    pub units: Vec<SourceUnit>,
}

impl CompilationError {
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    /// Text of the named unit.
    #[must_use]
    pub fn unit_text(&self, name: &str) -> Option<&str> {
        self.units
            .iter()
            .find(|u| u.name == name)
            .map(|u| u.text.as_str())
    }

    /// All units concatenated, each preceded by a `// unit: <name>` line.
    #[must_use]
    pub fn source_text(&self) -> String {
        let mut out = String::new();
        for unit in &self.units {
            out.push_str("// unit: ");
            out.push_str(&unit.name);
            if let Some(path) = &unit.path {
                out.push_str(" (");
                out.push_str(&path.display().to_string());
                out.push(')');
            }
            out.push('\n');
            out.push_str(&unit.text);
            if !unit.text.ends_with('\n') {
                out.push('\n');
            }
        }
        out
    }
}

impl fmt::Display for CompilationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let errors = self.errors().count();
        writeln!(
            f,
            "compilation of {} generated unit(s) failed with {} error(s)",
            self.units.len(),
            errors
        )?;
        for diagnostic in &self.diagnostics {
            match self.unit_text(&diagnostic.unit) {
                Some(text) => f.write_str(&diagnostic.render(text))?,
                None => writeln!(f, "{diagnostic}")?,
            }
        }
        writeln!(f)?;
        writeln!(f, "generated source:")?;
        f.write_str(&self.source_text())
    }
}

impl std::error::Error for CompilationError {}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = "shape A {\n    Name: core::Strin,\n}\n";

    fn diagnostic() -> Diagnostic {
        let start = TEXT.find("core::Strin").unwrap_or_default();
        Diagnostic::new(
            Severity::Error,
            "E0102",
            "type `Strin` not found in module `core`",
            "A",
            TEXT,
            start..start + "core::Strin".len(),
        )
        .with_label("unknown type")
    }

    #[test]
    fn test_line_col() {
        assert_eq!(line_col(TEXT, 0), (1, 1));
        assert_eq!(line_col(TEXT, 14), (2, 5));
        assert_eq!(line_col("é\nx", 3), (2, 1));
        assert_eq!(line_col("abc", 99), (1, 4));
    }

    #[test]
    fn test_render_contains_code_and_label() {
        let rendered = diagnostic().render(TEXT);
        assert!(rendered.contains("E0102"));
        assert!(rendered.contains("unknown type"));
        assert!(rendered.contains("core::Strin"));
    }

    #[test]
    fn test_compilation_error_display_carries_source() {
        let err = CompilationError {
            diagnostics: vec![diagnostic()],
            units: vec![SourceUnit::new("A", TEXT)],
        };
        let text = err.to_string();
        assert!(text.contains("1 error(s)"));
        assert!(text.contains("// unit: A"));
        assert!(text.contains("Name: core::Strin,"));
        assert_eq!(err.unit_text("A"), Some(TEXT));
    }

    #[test]
    fn test_render_empty_span_at_end() {
        let d = Diagnostic::new(Severity::Error, "E0001", "unexpected end", "A", "op", 2..2);
        assert!(d.render("op").contains("E0001"));
    }
}
