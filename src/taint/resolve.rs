//! Dotted-name resolution for attribute chains and literal subscript keys.

use tree_sitter::Node;

/// Resolve an identifier or attribute-access chain to a dotted path string,
/// e.g. `request.args.get` for the callee of `request.args.get("q")`.
///
/// Walks from the outermost attribute inward to the root; chains not rooted
/// in a plain identifier (a call result, a subscript, ...) resolve to the
/// empty string and never match any pattern table.
#[must_use]
pub fn dotted_name(node: Node, source: &[u8]) -> String {
    match node.kind() {
        "identifier" => node.utf8_text(source).unwrap_or("").to_string(),
        "attribute" => {
            let mut parts: Vec<&str> = Vec::new();
            let mut current = node;
            while current.kind() == "attribute" {
                let Some(attr) = current.child_by_field_name("attribute") else {
                    return String::new();
                };
                parts.push(attr.utf8_text(source).unwrap_or(""));
                let Some(object) = current.child_by_field_name("object") else {
                    return String::new();
                };
                current = object;
            }
            if current.kind() != "identifier" {
                return String::new();
            }
            parts.push(current.utf8_text(source).unwrap_or(""));
            parts.reverse();
            parts.join(".")
        }
        _ => String::new(),
    }
}

/// Extract a literal subscript key as a string: `d["k"]` -> `k`,
/// `d[0]` -> `0`. Non-literal keys return `None` and are never tracked at
/// element granularity.
#[must_use]
pub fn literal_key(node: Node, source: &[u8]) -> Option<String> {
    match node.kind() {
        "string" => {
            // Join content parts so plain and raw strings both yield the
            // unquoted text; a string containing interpolations is not a
            // literal key.
            let mut cursor = node.walk();
            let mut content = String::new();
            for child in node.named_children(&mut cursor) {
                match child.kind() {
                    "string_content" | "escape_sequence" => {
                        content.push_str(child.utf8_text(source).ok()?);
                    }
                    "interpolation" => return None,
                    _ => {}
                }
            }
            Some(content)
        }
        "integer" => Some(node.utf8_text(source).ok()?.to_string()),
        _ => None,
    }
}
