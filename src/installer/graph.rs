//! Requirement edges seen during an install, and cycle detection over them.

use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

/// Color states for the DFS cycle walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    /// On the current DFS path
    Gray,
    Black,
}

/// Directed graph of component names; an edge `a -> b` means `a` requires `b`.
#[derive(Debug, Default)]
pub(crate) struct RequirementGraph {
    graph: DiGraph<String, ()>,
    node_map: HashMap<String, NodeIndex>,
}

impl RequirementGraph {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn ensure_node(&mut self, name: &str) -> NodeIndex {
        if let Some(&index) = self.node_map.get(name) {
            return index;
        }
        let index = self.graph.add_node(name.to_string());
        self.node_map.insert(name.to_string(), index);
        index
    }

    /// Record that `from` requires `to`, whether or not `to` was already claimed.
    pub(crate) fn add_requirement(&mut self, from: &str, to: &str) {
        let from_idx = self.ensure_node(from);
        let to_idx = self.ensure_node(to);
        if !self.graph.contains_edge(from_idx, to_idx) {
            self.graph.add_edge(from_idx, to_idx, ());
        }
    }

    /// Every cycle closed by a back edge, as a chain that starts and ends with
    /// the same name.
    pub(crate) fn cycles(&self) -> Vec<Vec<String>> {
        let mut colors: HashMap<NodeIndex, Color> =
            self.graph.node_indices().map(|node| (node, Color::White)).collect();
        let mut path = Vec::new();
        let mut cycles = Vec::new();

        for node in self.graph.node_indices() {
            if colors.get(&node) == Some(&Color::White) {
                self.dfs_visit(node, &mut colors, &mut path, &mut cycles);
            }
        }
        cycles
    }

    fn dfs_visit(
        &self,
        node: NodeIndex,
        colors: &mut HashMap<NodeIndex, Color>,
        path: &mut Vec<NodeIndex>,
        cycles: &mut Vec<Vec<String>>,
    ) {
        colors.insert(node, Color::Gray);
        path.push(node);

        for neighbor in self.graph.neighbors(node) {
            match colors.get(&neighbor) {
                Some(Color::Gray) => {
                    if let Some(start) = path.iter().position(|n| *n == neighbor) {
                        let mut chain: Vec<String> =
                            path[start..].iter().map(|n| self.graph[*n].clone()).collect();
                        chain.push(self.graph[neighbor].clone());
                        cycles.push(chain);
                    }
                }
                Some(Color::White) => self.dfs_visit(neighbor, colors, path, cycles),
                _ => {}
            }
        }

        path.pop();
        colors.insert(node, Color::Black);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acyclic_diamond() {
        let mut graph = RequirementGraph::new();
        graph.add_requirement("app", "a");
        graph.add_requirement("app", "b");
        graph.add_requirement("a", "c");
        graph.add_requirement("b", "c");
        assert!(graph.cycles().is_empty());
    }

    #[test]
    fn test_cycle_between_siblings() {
        let mut graph = RequirementGraph::new();
        graph.add_requirement("root", "b");
        graph.add_requirement("root", "c");
        graph.add_requirement("b", "c");
        graph.add_requirement("c", "b");

        let cycles = graph.cycles();
        assert_eq!(cycles.len(), 1);
        let chain = &cycles[0];
        assert_eq!(chain.len(), 3);
        assert_eq!(chain.first(), chain.last());
        assert!(chain.contains(&"b".to_string()) && chain.contains(&"c".to_string()));
    }

    #[test]
    fn test_duplicate_edges_collapse() {
        let mut graph = RequirementGraph::new();
        graph.add_requirement("a", "b");
        graph.add_requirement("a", "b");
        graph.add_requirement("b", "a");
        assert_eq!(graph.cycles(), vec![vec!["a".to_string(), "b".to_string(), "a".to_string()]]);
    }
}
