//! The set of live ownership graphs of one analysis run.

use std::collections::BTreeMap;

use log::debug;

use crate::graph::OwnershipGraph;

/// Ownership graphs keyed by root name.
#[derive(Debug, Clone, Default)]
pub struct GraphRegistry {
    graphs: BTreeMap<String, OwnershipGraph>,
}

impl GraphRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `graph` under its name, replacing any graph of the same name.
    pub fn insert(&mut self, graph: OwnershipGraph) -> Option<OwnershipGraph> {
        debug!("registry: insert graph {}", graph.name());
        self.graphs.insert(graph.name().to_string(), graph)
    }

    pub fn get(&self, name: &str) -> Option<&OwnershipGraph> {
        self.graphs.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut OwnershipGraph> {
        self.graphs.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.graphs.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<OwnershipGraph> {
        let removed = self.graphs.remove(name);
        if removed.is_some() {
            debug!("registry: removed graph {}", name);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.graphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }

    /// Iterates over the graphs in name order.
    pub fn iter(&self) -> impl Iterator<Item = &OwnershipGraph> {
        self.graphs.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut OwnershipGraph> {
        self.graphs.values_mut()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.graphs.keys().map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.graphs.clear();
    }

    /// Returns the name of the graph holding a node called `node`.
    ///
    /// A graph named `node` takes precedence over any other graph that happens
    /// to contain a node of that name.
    pub fn owner_of(&self, node: &str) -> Option<&str> {
        if let Some((name, _)) = self.graphs.get_key_value(node) {
            return Some(name.as_str());
        }
        self.graphs.values().find(|g| g.has_node(node)).map(|g| g.name())
    }

    /// Returns true if any graph has a node called `name`.
    pub fn has_node(&self, name: &str) -> bool {
        self.graphs.values().any(|g| g.has_node(name))
    }

    /// Renames a graph together with its root node.
    pub fn rename(&mut self, old: &str, new: &str) -> bool {
        if self.graphs.contains_key(new) {
            return false;
        }
        let Some(mut graph) = self.graphs.remove(old) else {
            return false;
        };
        let Some(root) = graph.root_name().map(str::to_string) else {
            self.graphs.insert(old.to_string(), graph);
            return false;
        };
        if !graph.rename_node(&root, new) {
            self.graphs.insert(old.to_string(), graph);
            return false;
        }
        self.graphs.insert(new.to_string(), graph);
        true
    }

    /// Merges the graph `source` into the graph `target`, then drops `source`.
    ///
    /// New anchor edges are `bits` wide. Does nothing if either graph is missing
    /// or both names are the same; returns whether a merge happened.
    pub fn merge(&mut self, target: &str, source: &str, bits: usize) -> bool {
        if target == source || !self.graphs.contains_key(target) {
            return false;
        }
        let Some(source_graph) = self.graphs.remove(source) else {
            return false;
        };
        let Some(target_graph) = self.graphs.get_mut(target) else {
            return false;
        };
        let anchors = target_graph.absorb(source_graph, bits);
        debug!("registry: merged {} into {} ({} anchor(s))", source, target, anchors);
        true
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::edge::Edge;
    use crate::node::{NodeKind, OwnershipNode};
    use crate::types::Position;

    fn rooted(name: &str, position: usize) -> OwnershipGraph {
        OwnershipGraph::with_root(OwnershipNode::new(name, NodeKind::Root, Position::new(position)))
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut registry = GraphRegistry::new();
        assert!(registry.is_empty());
        registry.insert(rooted("b", 1));
        registry.insert(rooted("a", 0));
        assert_eq!(registry.len(), 2);
        assert!(registry.contains("a"));
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(registry.remove("a").is_some());
        assert!(registry.remove("a").is_none());
        assert!(registry.get("a").is_none());
    }

    #[test]
    fn test_owner_of() {
        let mut registry = GraphRegistry::new();
        let mut g = rooted("p", 0);
        g.add_node(OwnershipNode::new("N0", NodeKind::Memory, Position::new(1)));
        registry.insert(g);
        registry.insert(rooted("q", 2));
        assert_eq!(registry.owner_of("N0"), Some("p"));
        assert_eq!(registry.owner_of("q"), Some("q"));
        assert_eq!(registry.owner_of("z"), None);
        assert!(registry.has_node("N0"));

        // The returned name borrows from the registry, not from the query.
        let owner = {
            let query = String::from("q");
            registry.owner_of(&query)
        };
        assert_eq!(owner, Some("q"));
    }

    #[test]
    fn test_merge_removes_source() {
        let mut registry = GraphRegistry::new();
        registry.insert(rooted("a", 0));
        let mut b = rooted("b", 1);
        b.add_node(OwnershipNode::new("N0", NodeKind::Memory, Position::new(2)));
        let e = Edge::from_positions("b", Position::new(1), "N0", Position::new(2), 8, Some(1));
        b.add_edge(e);
        registry.insert(b);

        assert!(registry.merge("a", "b", 8));
        assert_eq!(registry.len(), 1);
        assert!(!registry.contains("b"));
        let a = registry.get("a").unwrap();
        assert!(a.has_edge("b", "N0"));
        assert!(a.has_edge("N0", "a"));
        assert!(a.reaches("b", "a"));
    }

    #[test]
    fn test_merge_noop_cases() {
        let mut registry = GraphRegistry::new();
        registry.insert(rooted("a", 0));
        assert!(!registry.merge("a", "a", 8));
        assert!(!registry.merge("a", "missing", 8));
        assert!(!registry.merge("missing", "a", 8));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_rename() {
        let mut registry = GraphRegistry::new();
        registry.insert(rooted("a", 0));
        registry.insert(rooted("b", 1));
        assert!(!registry.rename("a", "b"));
        assert!(registry.rename("a", "c"));
        let c = registry.get("c").unwrap();
        assert_eq!(c.root_name(), Some("c"));
        assert!(!registry.contains("a"));
    }
}
