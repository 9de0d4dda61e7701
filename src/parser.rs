//! tree-sitter parsing for Python documents.

use tree_sitter::{Parser, Tree};

/// Parse Python source into a concrete syntax tree.
///
/// Returns `None` when the parser cannot be configured or gives up on the
/// input; callers treat that the same as a tree containing syntax errors.
#[must_use]
pub fn parse_python(text: &str) -> Option<Tree> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .ok()?;
    parser.parse(text, None)
}
