//! In-memory dependency graph over chunk-level symbols.
//!
//! Node ids follow `filePath:symbolName`, falling back to `filePath:file`
//! for file-level chunks (imports, modules) with no symbol name. Edge
//! weights accumulate: re-observing the same `(source, target, type)` edge
//! merges into the existing edge rather than creating a duplicate, which is
//! what gives repeated calls across a file their higher weight.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::relationship::RelationshipType;

pub fn node_id(file_path: &str, symbol_name: Option<&str>) -> String {
    format!("{file_path}:{}", symbol_name.unwrap_or("file"))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyNode {
    pub id: String,
    pub file_path: String,
    pub symbol_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub source: String,
    pub target: String,
    pub relationship_type: RelationshipType,
    pub weight: u32,
}

#[derive(Debug, Default)]
pub struct DependencyGraph {
    nodes: HashMap<String, DependencyNode>,
    /// Keyed by source node id; value is (target, type) -> edge.
    outgoing: HashMap<String, HashMap<(String, &'static str), DependencyEdge>>,
    incoming: HashMap<String, HashSet<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, file_path: &str, symbol_name: Option<&str>) -> String {
        let id = node_id(file_path, symbol_name);
        self.nodes.entry(id.clone()).or_insert_with(|| DependencyNode {
            id: id.clone(),
            file_path: file_path.to_string(),
            symbol_name: symbol_name.map(|s| s.to_string()),
        });
        id
    }

    /// Add or strengthen an edge. Commutative in the sense that calling this
    /// twice with the same `(source, target, type)` in any order yields the
    /// same total weight (associativity/commutativity of the weight sum).
    pub fn add_edge(&mut self, source: &str, target: &str, relationship_type: RelationshipType, weight: u32) {
        self.incoming
            .entry(target.to_string())
            .or_default()
            .insert(source.to_string());

        let key = (target.to_string(), relationship_type.as_str());
        let bucket = self.outgoing.entry(source.to_string()).or_default();
        match bucket.get_mut(&key) {
            Some(edge) => edge.weight += weight,
            None => {
                bucket.insert(
                    key,
                    DependencyEdge {
                        source: source.to_string(),
                        target: target.to_string(),
                        relationship_type,
                        weight,
                    },
                );
            }
        }
    }

    pub fn node(&self, id: &str) -> Option<&DependencyNode> {
        self.nodes.get(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edges_from(&self, id: &str) -> impl Iterator<Item = &DependencyEdge> {
        self.outgoing.get(id).into_iter().flat_map(|m| m.values())
    }

    fn dependents_of(&self, id: &str) -> impl Iterator<Item = &String> {
        self.incoming.get(id).into_iter().flatten()
    }

    /// Depth-bounded DFS over outgoing edges. The starting node itself is
    /// never included in the result.
    pub fn find_dependencies(&self, start: &str, max_depth: usize) -> Vec<String> {
        let mut visited = HashSet::new();
        visited.insert(start.to_string());
        let mut result = Vec::new();
        self.walk_outgoing(start, max_depth, &mut visited, &mut result);
        result
    }

    fn walk_outgoing(&self, id: &str, depth_left: usize, visited: &mut HashSet<String>, out: &mut Vec<String>) {
        if depth_left == 0 {
            return;
        }
        for edge in self.edges_from(id) {
            if visited.insert(edge.target.clone()) {
                out.push(edge.target.clone());
                self.walk_outgoing(&edge.target, depth_left - 1, visited, out);
            }
        }
    }

    /// Depth-bounded DFS over incoming edges (who depends on `start`).
    pub fn find_dependents(&self, start: &str, max_depth: usize) -> Vec<String> {
        let mut visited = HashSet::new();
        visited.insert(start.to_string());
        let mut result = Vec::new();
        self.walk_incoming(start, max_depth, &mut visited, &mut result);
        result
    }

    fn walk_incoming(&self, id: &str, depth_left: usize, visited: &mut HashSet<String>, out: &mut Vec<String>) {
        if depth_left == 0 {
            return;
        }
        let parents: Vec<String> = self.dependents_of(id).cloned().collect();
        for parent in parents {
            if visited.insert(parent.clone()) {
                out.push(parent.clone());
                self.walk_incoming(&parent, depth_left - 1, visited, out);
            }
        }
    }

    /// All transitive dependents with no depth bound (bounded only by graph
    /// size via the visited set), used to compute "highly depended-on".
    pub fn transitive_closure_dependents(&self, start: &str) -> Vec<String> {
        self.find_dependents(start, usize::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_edge_accumulates_weight_regardless_of_order() {
        let mut a = DependencyGraph::new();
        a.add_edge("x", "y", RelationshipType::FunctionCall, 1);
        a.add_edge("x", "y", RelationshipType::FunctionCall, 2);

        let mut b = DependencyGraph::new();
        b.add_edge("x", "y", RelationshipType::FunctionCall, 2);
        b.add_edge("x", "y", RelationshipType::FunctionCall, 1);

        let wa: u32 = a.edges_from("x").map(|e| e.weight).sum();
        let wb: u32 = b.edges_from("x").map(|e| e.weight).sum();
        assert_eq!(wa, wb);
        assert_eq!(wa, 3);
    }

    #[test]
    fn find_dependencies_excludes_start_and_respects_depth() {
        let mut g = DependencyGraph::new();
        g.add_edge("a", "b", RelationshipType::FunctionCall, 1);
        g.add_edge("b", "c", RelationshipType::FunctionCall, 1);

        let one_hop = g.find_dependencies("a", 1);
        assert_eq!(one_hop, vec!["b".to_string()]);
        assert!(!one_hop.contains(&"a".to_string()));

        let two_hop = g.find_dependencies("a", 2);
        assert!(two_hop.contains(&"c".to_string()));
    }

    #[test]
    fn cyclic_graph_terminates() {
        let mut g = DependencyGraph::new();
        g.add_edge("a", "b", RelationshipType::FunctionCall, 1);
        g.add_edge("b", "a", RelationshipType::FunctionCall, 1);
        let deps = g.find_dependencies("a", 10);
        assert_eq!(deps, vec!["b".to_string()]);
    }
}
