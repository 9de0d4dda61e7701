//! Conversion from analysis issues to LSP diagnostics.

use lsp_types::{Diagnostic, DiagnosticSeverity, Position, Range};

use crate::taint::{Issue, Severity};

/// Diagnostic source tag shown next to each finding in the editor.
pub const DIAGNOSTIC_SOURCE: &str = "xsslint";

/// Map one issue onto an LSP diagnostic. Issue positions are already
/// zero-based with an exclusive end column, matching LSP ranges directly.
#[must_use]
pub fn to_diagnostic(issue: &Issue) -> Diagnostic {
    let severity = match issue.severity {
        Severity::Error => DiagnosticSeverity::ERROR,
        Severity::Warning => DiagnosticSeverity::WARNING,
    };
    Diagnostic {
        range: Range {
            start: Position {
                line: issue.line,
                character: issue.col_start,
            },
            end: Position {
                line: issue.line,
                character: issue.col_end,
            },
        },
        severity: Some(severity),
        source: Some(DIAGNOSTIC_SOURCE.to_string()),
        message: issue.message.clone(),
        ..Default::default()
    }
}

/// Map a full issue list, preserving order.
#[must_use]
pub fn to_diagnostics(issues: &[Issue]) -> Vec<Diagnostic> {
    issues.iter().map(to_diagnostic).collect()
}
