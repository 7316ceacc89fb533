//! The validator collaborator contract.
//!
//! The language-specific analyzer that actually produces diagnostics from
//! text is explicitly out of scope: "the core only depends on
//! its contract." [`Validator`] is that contract; [`NullValidator`] is the
//! trivial stand-in used by tests and by the demonstration per-language
//! server in [`crate::demo_server`].

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Severity levels, matching `lsp_types::DiagnosticSeverity`'s four values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
    Information,
    Hint,
}

/// A single diagnostic, using 1-based positions (the core subtracts 1
/// before emitting an LSP `Diagnostic`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub first_line: u32,
    pub first_column: u32,
    pub last_line: u32,
    pub last_column: u32,
    pub severity: Severity,
    pub message: String,
}

impl Diagnostic {
    /// Convert to an `lsp_types::Diagnostic`, translating the validator's
    /// 1-based positions to LSP's 0-based ones.
    #[must_use]
    pub fn to_lsp(&self) -> lsp_types::Diagnostic {
        let severity = match self.severity {
            Severity::Error => lsp_types::DiagnosticSeverity::ERROR,
            Severity::Warning => lsp_types::DiagnosticSeverity::WARNING,
            Severity::Information => lsp_types::DiagnosticSeverity::INFORMATION,
            Severity::Hint => lsp_types::DiagnosticSeverity::HINT,
        };
        lsp_types::Diagnostic {
            range: lsp_types::Range {
                start: lsp_types::Position::new(
                    self.first_line.saturating_sub(1),
                    self.first_column.saturating_sub(1),
                ),
                end: lsp_types::Position::new(
                    self.last_line.saturating_sub(1),
                    self.last_column.saturating_sub(1),
                ),
            },
            severity: Some(severity),
            message: self.message.clone(),
            ..lsp_types::Diagnostic::default()
        }
    }
}

/// Produces diagnostics for a document's text. Implementations are the
/// language-specific analysis backend this crate hosts; they are expected
/// to be pure functions of `(path, text, options)` with no side effects on
/// the document model.
pub trait Validator: Send + Sync {
    fn validate(&self, path: &Path, text: &str, options: &Value) -> Vec<Diagnostic>;
}

/// A validator that never reports any diagnostics. Used where no real
/// analysis backend is wired in (tests, or a language for which one has
/// not been configured).
#[derive(Debug, Default, Clone, Copy)]
pub struct NullValidator;

impl Validator for NullValidator {
    fn validate(&self, _path: &Path, _text: &str, _options: &Value) -> Vec<Diagnostic> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_validator_reports_nothing() {
        let v = NullValidator;
        assert!(v
            .validate(Path::new("/a.txt"), "anything", &Value::Null)
            .is_empty());
    }

    #[test]
    fn diagnostic_to_lsp_subtracts_one_from_positions() {
        let d = Diagnostic {
            first_line: 1,
            first_column: 1,
            last_line: 1,
            last_column: 5,
            severity: Severity::Error,
            message: "boom".into(),
        };
        let lsp = d.to_lsp();
        assert_eq!(lsp.range.start.line, 0);
        assert_eq!(lsp.range.start.character, 0);
        assert_eq!(lsp.range.end.character, 4);
    }
}
