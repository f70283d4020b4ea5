//! Error adapter for converting FlowError to miette diagnostics.
//!
//! This module provides the bridge between the library's standard error types
//! and miette's rich diagnostic formatting used in the CLI. JSON syntax errors
//! keep the file text, so they render with the offending line highlighted.

use std::fmt;

use miette::{Diagnostic as MietteDiagnostic, LabeledSpan, SourceSpan};
use serde_json::error::Category;

use threatflow::{FlowError, PublishError};

/// Adapter rendering any [`FlowError`] as a miette diagnostic.
pub struct ErrorAdapter<'a>(pub &'a FlowError);

impl fmt::Debug for ErrorAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for ErrorAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for ErrorAdapter<'_> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl MietteDiagnostic for ErrorAdapter<'_> {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let code = match &self.0 {
            FlowError::Io(_) => "threatflow::io",
            FlowError::Json { .. } => "threatflow::json",
            FlowError::Model(_) | FlowError::Graph(_) => "threatflow::model",
            FlowError::Publish(_) => "threatflow::publish",
            FlowError::Config(_) => "threatflow::config",
        };
        Some(Box::new(code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let help = match &self.0 {
            FlowError::Json { .. } => "the input must be a threatflow/1 diagram file",
            FlowError::Publish(PublishError::NoStartRefs) => {
                "break the cycle so that at least one action or condition has no predecessor"
            }
            FlowError::Publish(PublishError::MissingField { .. } | PublishError::ShapeMismatch { .. }) => {
                "the template catalog does not match the layout the publisher expects"
            }
            FlowError::Config(_) => "check the [publish] and [catalog] sections of the configuration",
            _ => return None,
        };
        Some(Box::new(help))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        match &self.0 {
            FlowError::Json { src, .. } => Some(src as &dyn miette::SourceCode),
            _ => None,
        }
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let FlowError::Json { err, src } = &self.0 else {
            return None;
        };
        let offset = line_column_offset(src, err.line(), err.column());
        let label = LabeledSpan::new_primary_with_span(
            Some(json_label(err).to_string()),
            SourceSpan::new(offset.into(), 0),
        );
        Some(Box::new(std::iter::once(label)))
    }
}

fn json_label(err: &serde_json::Error) -> &'static str {
    match err.classify() {
        Category::Io => "read failed here",
        Category::Syntax => "invalid syntax",
        Category::Data => "unexpected value",
        Category::Eof => "unexpected end of file",
    }
}

/// Byte offset of a 1-based line and column, clamped to the text.
///
/// JSON error columns count bytes. The offset is moved back to the start of
/// the character it falls in, so the span never splits a character.
fn line_column_offset(src: &str, line: usize, column: usize) -> usize {
    let line_start: usize = src
        .split_inclusive('\n')
        .take(line.saturating_sub(1))
        .map(str::len)
        .sum();
    let mut offset = (line_start + column.saturating_sub(1)).min(src.len());
    while !src.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json_error(src: &str) -> FlowError {
        let err = serde_json::from_str::<serde_json::Value>(src).unwrap_err();
        FlowError::new_json_error(err, src)
    }

    #[test]
    fn test_json_error_has_label() {
        let err = json_error("{\n  \"schema\": ,\n}");
        let adapter = ErrorAdapter(&err);

        assert_eq!(adapter.code().unwrap().to_string(), "threatflow::json");
        assert!(adapter.source_code().is_some());
        let labels: Vec<_> = adapter.labels().unwrap().collect();
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].label(), Some("invalid syntax"));
        assert!(labels[0].primary());
    }

    #[test]
    fn test_publish_error_code_and_help() {
        let err = FlowError::Publish(PublishError::NoStartRefs);
        let adapter = ErrorAdapter(&err);

        assert_eq!(adapter.code().unwrap().to_string(), "threatflow::publish");
        assert!(adapter.help().is_some());
        assert!(adapter.labels().is_none());
    }

    #[test]
    fn test_graph_error_display() {
        let err = FlowError::Graph("graph error".to_string());
        let adapter = ErrorAdapter(&err);

        assert_eq!(adapter.to_string(), "Graph error: graph error");
        assert_eq!(adapter.code().unwrap().to_string(), "threatflow::model");
    }

    #[test]
    fn test_line_column_offset() {
        let src = "ab\ncd\nef";
        assert_eq!(line_column_offset(src, 1, 1), 0);
        assert_eq!(line_column_offset(src, 2, 2), 4);
        assert_eq!(line_column_offset(src, 9, 9), src.len());
    }

    #[test]
    fn test_line_column_offset_multibyte() {
        let src = "{\n  \"name\": \"Überfall ✓\" x\n}";
        // Byte column of `x` on line 2
        let column = "  \"name\": \"Überfall ✓\" ".len() + 1;
        let offset = line_column_offset(src, 2, column);
        assert_eq!(&src[offset..offset + 1], "x");

        // A column inside `✓` snaps to its first byte
        let inside = "  \"name\": \"Überfall ".len() + 2;
        let offset = line_column_offset(src, 2, inside);
        assert!(src.is_char_boundary(offset));
        assert!(src[offset..].starts_with('✓'));
    }

    #[test]
    fn test_json_error_span_on_multibyte_line() {
        let err = json_error("{\"name\": \"Überfall ✓\" x}");
        let adapter = ErrorAdapter(&err);
        let FlowError::Json { src, .. } = &err else {
            panic!("Expected a JSON error");
        };

        let labels: Vec<_> = adapter.labels().unwrap().collect();
        assert!(src.is_char_boundary(labels[0].offset()));
    }
}
