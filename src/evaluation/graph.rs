//! Undirected join graph over declared objects.
//!
//! Parallel relationships between the same two objects stay distinct edges,
//! so two relationships joining `A` and `B` count as two paths. Self-joins
//! never contribute to connectivity or paths.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::ir::OdlIr;

pub const MAX_PATH_DEPTH: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AmbiguousPair {
    pub from: String,
    pub to: String,
    pub path_count: usize,
}

#[derive(Debug, Clone)]
pub struct JoinGraph<'a> {
    nodes: BTreeSet<&'a str>,
    adjacency: BTreeMap<&'a str, Vec<(&'a str, &'a str)>>,
    edge_count: usize,
}

impl<'a> JoinGraph<'a> {
    pub fn from_ir(ir: &'a OdlIr) -> Self {
        let nodes: BTreeSet<&str> = ir.objects.iter().map(|o| o.name.as_str()).collect();
        let mut adjacency: BTreeMap<&str, Vec<(&str, &str)>> =
            nodes.iter().map(|n| (*n, Vec::new())).collect();
        let mut edge_count = 0;

        for rel in &ir.relationships {
            let (from, to) = (rel.from.as_str(), rel.to.as_str());
            if from == to || !nodes.contains(from) || !nodes.contains(to) {
                continue;
            }
            adjacency.entry(from).or_default().push((to, rel.name.as_str()));
            adjacency.entry(to).or_default().push((from, rel.name.as_str()));
            edge_count += 1;
        }

        Self {
            nodes,
            adjacency,
            edge_count,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn connected_components(&self) -> Vec<Vec<String>> {
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        let mut components = Vec::new();

        for start in self.nodes.iter().copied() {
            if !seen.insert(start) {
                continue;
            }
            let mut component = vec![start.to_string()];
            let mut queue = VecDeque::from([start]);
            while let Some(node) = queue.pop_front() {
                for (neighbour, _) in self.neighbours(node) {
                    if seen.insert(neighbour) {
                        component.push(neighbour.to_string());
                        queue.push_back(neighbour);
                    }
                }
            }
            component.sort();
            components.push(component);
        }
        components
    }

    fn neighbours(&self, node: &str) -> impl Iterator<Item = (&'a str, &'a str)> + '_ {
        self.adjacency
            .get(node)
            .into_iter()
            .flat_map(|edges| edges.iter().copied())
    }

    pub fn count_paths(&self, from: &str, to: &str, max_depth: usize) -> usize {
        if from == to || !self.nodes.contains(from) || !self.nodes.contains(to) {
            return 0;
        }
        let mut visited: BTreeSet<&str> = BTreeSet::new();
        let mut count = 0;
        if let Some(&start) = self.nodes.get(from) {
            visited.insert(start);
            self.walk(start, to, max_depth, &mut visited, &mut count);
        }
        count
    }

    fn walk(
        &self,
        node: &'a str,
        target: &str,
        remaining: usize,
        visited: &mut BTreeSet<&'a str>,
        count: &mut usize,
    ) {
        if remaining == 0 {
            return;
        }
        for (neighbour, _) in self.neighbours(node) {
            if neighbour == target {
                *count += 1;
                continue;
            }
            if visited.insert(neighbour) {
                self.walk(neighbour, target, remaining - 1, visited, count);
                visited.remove(neighbour);
            }
        }
    }

    pub fn ambiguous_pairs(&self, max_depth: usize) -> Vec<AmbiguousPair> {
        let nodes: Vec<&str> = self.nodes.iter().copied().collect();
        let mut pairs = Vec::new();
        for (i, from) in nodes.iter().enumerate() {
            for to in &nodes[i + 1..] {
                let path_count = self.count_paths(from, to, max_depth);
                if path_count > 1 {
                    pairs.push(AmbiguousPair {
                        from: from.to_string(),
                        to: to.to_string(),
                        path_count,
                    });
                }
            }
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::normalizer::normalize;

    fn ir(objects: &[&str], edges: &[(&str, &str)]) -> OdlIr {
        let objects: Vec<_> = objects
            .iter()
            .map(|name| json!({"name": name, "identifiers": ["id"], "properties": [{"name": "id"}]}))
            .collect();
        let relationships: Vec<_> = edges
            .iter()
            .enumerate()
            .map(|(i, (from, to))| {
                json!({"name": format!("r{i}"), "from": from, "to": to, "joinKeys": [["id", "id"]]})
            })
            .collect();
        normalize(&json!({"version": "1", "objects": objects, "relationships": relationships}))
    }

    #[test]
    fn isolated_objects_are_separate_components() {
        let ir = ir(&["A", "B", "C"], &[]);
        let graph = JoinGraph::from_ir(&ir);
        assert_eq!(graph.connected_components().len(), 3);

        let ir = self::ir(&["A", "B", "C"], &[("A", "B")]);
        let components = JoinGraph::from_ir(&ir).connected_components();
        assert_eq!(components, vec![vec!["A".to_string(), "B".to_string()], vec!["C".to_string()]]);
    }

    #[test]
    fn diamond_has_two_paths_between_opposite_corners() {
        let ir = ir(&["A", "B", "C", "D"], &[("A", "B"), ("A", "C"), ("B", "D"), ("C", "D")]);
        let graph = JoinGraph::from_ir(&ir);
        assert_eq!(graph.count_paths("A", "D", MAX_PATH_DEPTH), 2);
        assert_eq!(graph.count_paths("D", "A", MAX_PATH_DEPTH), 2);
        // Every pair in a 4-cycle is joined both ways round.
        assert_eq!(graph.ambiguous_pairs(MAX_PATH_DEPTH).len(), 6);
    }

    #[test]
    fn tree_has_no_ambiguity() {
        let ir = ir(&["A", "B", "C", "D"], &[("A", "B"), ("B", "C"), ("B", "D")]);
        let graph = JoinGraph::from_ir(&ir);
        assert!(graph.ambiguous_pairs(MAX_PATH_DEPTH).is_empty());
        assert_eq!(graph.count_paths("A", "D", MAX_PATH_DEPTH), 1);
    }

    #[test]
    fn parallel_edges_count_separately_and_self_loops_are_ignored() {
        let ir = ir(&["A", "B"], &[("A", "B"), ("B", "A"), ("A", "A")]);
        let graph = JoinGraph::from_ir(&ir);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.count_paths("A", "B", MAX_PATH_DEPTH), 2);
    }

    #[test]
    fn depth_bound_limits_search() {
        let ir = ir(
            &["A", "B", "C", "D", "E", "F", "G"],
            &[("A", "B"), ("B", "C"), ("C", "D"), ("D", "E"), ("E", "F"), ("F", "G"), ("A", "G")],
        );
        let graph = JoinGraph::from_ir(&ir);
        // The long way round from A to G takes six edges.
        assert_eq!(graph.count_paths("A", "G", MAX_PATH_DEPTH), 1);
        assert_eq!(graph.count_paths("A", "G", 6), 2);
    }
}
