//! Shared tree-sitter helpers for walking Go syntax trees.
//!
//! Provides text, position and child lookups used by both the checker and the
//! syntax-only extractor.

use tree_sitter::Node;

/// Get the text of a tree-sitter node.
///
/// Returns `None` if the node's byte range contains invalid UTF-8.
pub fn node_text<'a>(node: &Node<'_>, content: &'a [u8]) -> Option<&'a str> {
    match std::str::from_utf8(&content[node.byte_range()]) {
        Ok(s) => Some(s),
        Err(e) => {
            tracing::trace!(
                byte_range = ?node.byte_range(),
                error = %e,
                node_kind = %node.kind(),
                "Failed to decode node text as UTF-8"
            );
            None
        }
    }
}

/// Zero-indexed (line, column) of a node's start.
///
/// Tree-sitter columns count bytes, as Go's own column numbers do.
#[must_use]
pub fn node_position(node: &Node<'_>) -> (usize, usize) {
    let point = node.start_position();
    (point.row, point.column)
}

/// Named children of `node`, collected so callers can keep iterating while
/// borrowing other nodes.
#[must_use]
pub fn named_children<'t>(node: &Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

/// Every child stored under `field`.
///
/// Go declarations list several names under one field (`var a, b int`).
#[must_use]
pub fn field_children<'t>(node: &Node<'t>, field: &str) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children_by_field_name(field, &mut cursor).collect()
}

/// First node in `node`'s subtree that is an error or missing node.
#[must_use]
pub fn first_error<'t>(node: &Node<'t>) -> Option<Node<'t>> {
    if node.is_error() || node.is_missing() {
        return Some(*node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<Node<'t>> = node.children(&mut cursor).collect();
    children.iter().find_map(first_error)
}
