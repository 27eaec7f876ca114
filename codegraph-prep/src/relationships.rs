//! Relationship extraction: walks a parsed tree for call expressions,
//! imports, and `extends`-style inheritance, resolving each to the
//! enclosing symbol so edges land on the right graph node.

use tree_sitter::{Node, Tree};

use crate::graph::node_id;
use crate::relationship::{CodeRelationship, RelationshipType};
use crate::span::Span;

/// Walks up from `node` to the nearest function/method/arrow-function
/// declarator, returning its symbol name, or `"anonymous"` if the node sits
/// at module scope (e.g. a top-level call).
fn enclosing_symbol_name<'a>(node: Node<'a>, source: &str) -> String {
    let mut current = node.parent();
    while let Some(n) = current {
        match n.kind() {
            "function_declaration" | "method_definition" | "method_declaration" => {
                if let Some(name) = n
                    .child_by_field_name("name")
                    .and_then(|c| c.utf8_text(source.as_bytes()).ok())
                {
                    return name.to_string();
                }
            }
            "variable_declarator" => {
                if let Some(name) = n
                    .child_by_field_name("name")
                    .and_then(|c| c.utf8_text(source.as_bytes()).ok())
                {
                    return name.to_string();
                }
            }
            _ => {}
        }
        current = n.parent();
    }
    "anonymous".to_string()
}

fn span_of(node: Node<'_>) -> Span {
    Span::new(
        node.start_position().row + 1,
        node.end_position().row + 1,
        node.start_byte(),
        node.end_byte(),
    )
}

/// Extracts function-call, import, and inheritance relationships from an
/// already-parsed tree. `source`/`file_path` identify the owning file;
/// targets for calls and inheritance are left as bare symbol names (not
/// graph node ids) since resolving the target's *file* requires whole-repo
/// symbol-table knowledge the caller assembles after all files are chunked.
pub fn extract_relationships(tree: &Tree, source: &str, file_path: &str) -> Vec<CodeRelationship> {
    let mut out = Vec::new();
    walk(tree.root_node(), source, file_path, &mut out);
    out
}

fn walk(node: Node<'_>, source: &str, file_path: &str, out: &mut Vec<CodeRelationship>) {
    match node.kind() {
        "call_expression" => {
            if let Some(callee) = node.child_by_field_name("function") {
                if let Some(name) = callee_name(callee, source) {
                    let caller = enclosing_symbol_name(node, source);
                    out.push(CodeRelationship {
                        relationship_type: RelationshipType::FunctionCall,
                        source: node_id(file_path, Some(&caller)),
                        target: name,
                        location: span_of(node),
                    });
                }
            }
        }
        "import_statement" | "import_declaration" => {
            if let Some(module) = import_source(node, source) {
                out.push(CodeRelationship {
                    relationship_type: RelationshipType::Import,
                    source: node_id(file_path, None),
                    target: module,
                    location: span_of(node),
                });
            }
        }
        "class_declaration" => {
            if let (Some(name_node), Some(heritage)) = (
                node.child_by_field_name("name"),
                node.child_by_field_name("superclass")
                    .or_else(|| find_child_by_kind(node, "class_heritage")),
            ) {
                if let (Ok(class_name), Some(parent_name)) = (
                    name_node.utf8_text(source.as_bytes()),
                    first_identifier_text(heritage, source),
                ) {
                    out.push(CodeRelationship {
                        relationship_type: RelationshipType::Inheritance,
                        source: node_id(file_path, Some(class_name)),
                        target: parent_name,
                        location: span_of(node),
                    });
                }
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(child, source, file_path, out);
    }
}

fn callee_name(node: Node<'_>, source: &str) -> Option<String> {
    match node.kind() {
        "identifier" => node.utf8_text(source.as_bytes()).ok().map(|s| s.to_string()),
        "member_expression" => node
            .child_by_field_name("property")
            .and_then(|p| p.utf8_text(source.as_bytes()).ok())
            .map(|s| s.to_string()),
        _ => None,
    }
}

fn import_source(node: Node<'_>, source: &str) -> Option<String> {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "string" || child.kind() == "string_literal" {
            let text = child.utf8_text(source.as_bytes()).ok()?;
            return Some(text.trim_matches(|c| c == '"' || c == '\'').to_string());
        }
    }
    None
}

fn find_child_by_kind<'a>(node: Node<'a>, kind: &str) -> Option<Node<'a>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).find(|c| c.kind() == kind)
}

fn first_identifier_text(node: Node<'_>, source: &str) -> Option<String> {
    if node.kind() == "identifier" {
        return node.utf8_text(source.as_bytes()).ok().map(|s| s.to_string());
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(found) = first_identifier_text(child, source) {
            return Some(found);
        }
    }
    None
}
