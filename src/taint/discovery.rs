//! User-defined sanitizer discovery.
//!
//! One shallow forward pass over every function and coroutine definition: a
//! function counts as a sanitizer when any `return` in its immediate body
//! returns a call to a known sanitizer, a call to a cast-clean coercion, or
//! a bare reference to a previously discovered sanitizer. No fixpoint is
//! computed, so a sanitizer that forward-references one defined later is not
//! discovered.

use std::collections::HashSet;
use tree_sitter::Node;

use super::patterns::PatternTables;
use super::resolve::dotted_name;

/// Scan the tree for user-defined wrappers around known sanitizers.
#[must_use]
pub fn discover_sanitizers(
    root: Node,
    source: &[u8],
    tables: &PatternTables,
) -> HashSet<String> {
    let mut discovered = HashSet::new();
    walk(root, source, tables, &mut discovered);
    discovered
}

fn walk(node: Node, source: &[u8], tables: &PatternTables, discovered: &mut HashSet<String>) {
    if node.kind() == "function_definition" {
        if let Some(name) = node
            .child_by_field_name("name")
            .and_then(|n| n.utf8_text(source).ok())
        {
            if let Some(body) = node.child_by_field_name("body") {
                let mut cursor = body.walk();
                for stmt in body.named_children(&mut cursor) {
                    if stmt.kind() == "return_statement" {
                        if let Some(expr) = stmt.named_child(0) {
                            if is_sanitizing_expr(expr, source, tables, discovered) {
                                discovered.insert(name.to_string());
                                break;
                            }
                        }
                    }
                }
            }
        }
    }

    let mut cursor = node.walk();
    let children: Vec<Node> = node.named_children(&mut cursor).collect();
    for child in children {
        walk(child, source, tables, discovered);
    }
}

fn is_sanitizing_expr(
    expr: Node,
    source: &[u8],
    tables: &PatternTables,
    discovered: &HashSet<String>,
) -> bool {
    match expr.kind() {
        "call" => {
            let Some(func) = expr.child_by_field_name("function") else {
                return false;
            };
            let name = dotted_name(func, source);
            if tables.sanitizers.contains(name.as_str()) {
                return true;
            }
            func.kind() == "identifier" && tables.cast_clean.contains(name.as_str())
        }
        "identifier" => {
            let name = expr.utf8_text(source).unwrap_or("");
            discovered.contains(name)
        }
        _ => false,
    }
}
