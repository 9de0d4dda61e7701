//! Static XSS taint analysis for Python source.
//!
//! Best-effort, single-file, flow-insensitive-per-statement analysis:
//! externally-controlled data (request attributes, request-accessor calls,
//! routing-handler parameters) is tracked through assignments and expression
//! shapes until it reaches a `return` or an HTML-rendering sink call without
//! passing through a recognized sanitizer. False negatives are acceptable;
//! unknown constructs default to clean and analysis never fails on valid
//! trees.

pub mod analyzer;
pub mod discovery;
pub mod patterns;
pub mod resolve;
pub mod types;

pub use types::{Issue, Severity};

use analyzer::TaintAnalyzer;
use discovery::discover_sanitizers;
use patterns::PatternTables;

use crate::parser::parse_python;

/// Analyze one Python document and return all flow violations found, in
/// traversal order.
///
/// Total: source that does not parse cleanly yields an empty list rather
/// than an error, matching the "never break the editor session" contract.
#[must_use]
pub fn analyze(text: &str) -> Vec<Issue> {
    let Some(tree) = parse_python(text) else {
        return Vec::new();
    };
    let root = tree.root_node();
    if root.has_error() {
        return Vec::new();
    }

    let source = text.as_bytes();
    let tables = PatternTables::builtin();
    let sanitizers = discover_sanitizers(root, source, tables);
    TaintAnalyzer::new(source, tables, sanitizers).run(root)
}
