//! Transient in-process dependency graph built from stored relationship
//! rows, used to walk one hop of dependencies/dependents for a symbol.

use codegraph_prep::graph::DependencyGraph;
use codegraph_prep::relationship::RelationshipType;
use rag_store::CodeRelationshipRecord;

fn parse_relationship_type(s: &str) -> RelationshipType {
    match s {
        "function_call" => RelationshipType::FunctionCall,
        "import" => RelationshipType::Import,
        "inheritance" => RelationshipType::Inheritance,
        "implementation" => RelationshipType::Implementation,
        "composition" => RelationshipType::Composition,
        _ => RelationshipType::Usage,
    }
}

/// Builds a graph over one repository's stored relationships. Node ids are
/// the `filePath:symbolName` strings the relationships were recorded with.
pub fn build_graph(relationships: &[CodeRelationshipRecord]) -> DependencyGraph {
    let mut graph = DependencyGraph::new();
    for rel in relationships {
        graph.add_edge(
            &rel.source,
            &rel.target,
            parse_relationship_type(&rel.relationship_type),
            1,
        );
    }
    graph
}

/// Splits a `filePath:symbolName` node id back into its parts. Symbol-less
/// nodes use the literal `file` placeholder (see `codegraph_prep::graph::node_id`).
pub fn split_node_id(id: &str) -> Option<(&str, Option<&str>)> {
    let (path, symbol) = id.rsplit_once(':')?;
    if symbol == "file" {
        Some((path, None))
    } else {
        Some((path, Some(symbol)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_node_id_separates_path_and_symbol() {
        assert_eq!(
            split_node_id("src/lib.rs:run"),
            Some(("src/lib.rs", Some("run")))
        );
        assert_eq!(split_node_id("src/lib.rs:file"), Some(("src/lib.rs", None)));
    }

    #[test]
    fn build_graph_finds_one_hop_neighbors() {
        let rels = vec![CodeRelationshipRecord {
            repository_id: "r".into(),
            relationship_type: "function_call".into(),
            source: "a.rs:foo".into(),
            target: "b.rs:bar".into(),
            file_path: "a.rs".into(),
            start_line: 1,
            end_line: 2,
        }];
        let graph = build_graph(&rels);
        assert_eq!(graph.find_dependencies("a.rs:foo", 1), vec!["b.rs:bar".to_string()]);
        assert_eq!(graph.find_dependents("b.rs:bar", 1), vec!["a.rs:foo".to_string()]);
    }
}
