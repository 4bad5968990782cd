//! Ownership graphs.
//!
//! An [`OwnershipGraph`] tracks everything reachable from one declared variable:
//! the variable itself (the root), the blocks it owns, their slots, and the null
//! sentinels its pointers were set to. Nodes are kept in a name-ordered map and
//! edges in insertion order, so every traversal and dump is deterministic.
//!
//! # Invariants
//!
//! - Every edge references nodes that exist in the graph.
//! - There is at most one edge per ordered pair of nodes.
//! - The graph's name is the name of its root node.

use std::collections::{BTreeMap, HashSet, VecDeque};

use log::{debug, warn};

use crate::edge::Edge;
use crate::node::{NodeKind, OwnershipNode};
use crate::types::Position;

#[derive(Debug, Clone, Default)]
pub struct OwnershipGraph {
    name: String,
    nodes: BTreeMap<String, OwnershipNode>,
    root: Option<String>,
    edges: Vec<Edge>,
}

impl OwnershipGraph {
    /// Creates an empty, rootless graph.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Creates a graph whose root is `root`, named after it.
    pub fn with_root(root: OwnershipNode) -> Self {
        let mut graph = Self::new(root.name());
        graph.add_node(root);
        graph
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> Option<&OwnershipNode> {
        self.root.as_deref().and_then(|name| self.nodes.get(name))
    }

    pub fn root_name(&self) -> Option<&str> {
        self.root.as_deref()
    }

    pub fn is_root(&self, name: &str) -> bool {
        self.root.as_deref() == Some(name)
    }

    /// Makes an existing node the root. Returns false if there is no such node.
    pub fn set_root(&mut self, name: &str) -> bool {
        if !self.nodes.contains_key(name) {
            return false;
        }
        self.root = Some(name.to_string());
        true
    }

    /// Returns true if the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Removes every node and edge, leaving the graph rootless.
    pub fn clear(&mut self) {
        self.edges.clear();
        self.nodes.clear();
        self.root = None;
    }

    // ─── Nodes ───

    /// Adds a node. Fails without mutation if the name is empty or taken.
    ///
    /// The first node added to a rootless, empty graph becomes its root.
    pub fn add_node(&mut self, node: OwnershipNode) -> bool {
        if !node.is_valid() || self.nodes.contains_key(node.name()) {
            return false;
        }
        let name = node.name().to_string();
        if self.nodes.is_empty() && self.root.is_none() {
            self.root = Some(name.clone());
        }
        debug!("graph {}: add node {}", self.name, node);
        self.nodes.insert(name, node);
        true
    }

    /// Removes a node together with every edge touching it.
    ///
    /// Removing the root leaves the graph rootless.
    pub fn remove_node(&mut self, name: &str) -> bool {
        if self.nodes.remove(name).is_none() {
            return false;
        }
        self.edges.retain(|e| !e.touches(name));
        if self.is_root(name) {
            warn!("graph {}: root {} removed", self.name, name);
            self.root = None;
        }
        debug!("graph {}: removed node {}", self.name, name);
        true
    }

    pub fn find_node(&self, name: &str) -> Option<&OwnershipNode> {
        self.nodes.get(name)
    }

    pub fn has_node(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Iterates over nodes in name order.
    pub fn nodes(&self) -> impl Iterator<Item = &OwnershipNode> {
        self.nodes.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes_by_kind(&self, kind: NodeKind) -> Vec<&OwnershipNode> {
        self.nodes.values().filter(|n| n.kind() == kind).collect()
    }

    /// Returns the node holding `position`, if any.
    pub fn node_at(&self, position: Position) -> Option<&OwnershipNode> {
        self.nodes.values().find(|n| n.position() == position)
    }

    /// Returns the largest position among the nodes.
    pub fn max_position(&self) -> Option<Position> {
        self.nodes.values().map(|n| n.position()).max()
    }

    /// Renames a node, rewriting every edge that mentions it.
    ///
    /// Renaming the root also renames the graph. Fails if `old` is missing or
    /// `new` is empty or taken.
    pub fn rename_node(&mut self, old: &str, new: &str) -> bool {
        if new.is_empty() || self.nodes.contains_key(new) {
            return false;
        }
        let Some(mut node) = self.nodes.remove(old) else {
            return false;
        };
        node.rename(new);
        self.nodes.insert(new.to_string(), node);
        for edge in self.edges.iter_mut() {
            edge.rename_endpoint(old, new);
        }
        if self.is_root(old) {
            self.root = Some(new.to_string());
            self.name = new.to_string();
        }
        true
    }

    // ─── Edges ───

    /// Adds an edge. Does nothing if an endpoint is missing or the ordered pair
    /// already has an edge; returns whether the edge was added.
    pub fn add_edge(&mut self, edge: Edge) -> bool {
        if !self.has_node(edge.from()) || !self.has_node(edge.to()) {
            debug!("graph {}: skip edge {} (missing endpoint)", self.name, edge);
            return false;
        }
        if self.has_edge(edge.from(), edge.to()) {
            return false;
        }
        debug!("graph {}: add edge {}", self.name, edge);
        self.edges.push(edge);
        true
    }

    pub fn remove_edge(&mut self, from: &str, to: &str) -> bool {
        match self.edges.iter().position(|e| e.from() == from && e.to() == to) {
            Some(index) => {
                let edge = self.edges.remove(index);
                debug!("graph {}: removed edge {}", self.name, edge);
                true
            }
            None => false,
        }
    }

    pub fn find_edge(&self, from: &str, to: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.from() == from && e.to() == to)
    }

    pub fn has_edge(&self, from: &str, to: &str) -> bool {
        self.find_edge(from, to).is_some()
    }

    /// Iterates over edges in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn edges_from<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.from() == name)
    }

    pub fn edges_to<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.to() == name)
    }

    pub fn edges_involving<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.touches(name))
    }

    /// Removes every outgoing edge of `name`, returning the removed edges.
    pub fn remove_edges_from(&mut self, name: &str) -> Vec<Edge> {
        let (removed, kept) = std::mem::take(&mut self.edges).into_iter().partition(|e| e.from() == name);
        self.edges = kept;
        removed
    }

    /// Removes every edge whose target is `name`, returning the removed edges.
    pub fn remove_edges_to(&mut self, name: &str) -> Vec<Edge> {
        let (removed, kept) = std::mem::take(&mut self.edges).into_iter().partition(|e| e.to() == name);
        self.edges = kept;
        removed
    }

    /// Returns true if `name` has an edge to or from the root.
    pub fn has_edge_to_root(&self, name: &str) -> bool {
        match self.root.as_deref() {
            Some(root) => self.edges.iter().any(|e| e.links(root, name)),
            None => false,
        }
    }

    /// Removes the edges between the root and `name`, in both directions.
    pub fn remove_root_links(&mut self, name: &str) -> usize {
        let Some(root) = self.root.clone() else {
            return 0;
        };
        if root == name {
            return 0;
        }
        let before = self.edges.len();
        self.edges.retain(|e| !e.links(&root, name));
        let removed = before - self.edges.len();
        if removed > 0 {
            debug!("graph {}: removed {} root link(s) of {}", self.name, removed, name);
        }
        removed
    }

    /// Widens the literal vectors of every edge to at least `bytes` bytes.
    pub fn widen_edges(&mut self, bytes: usize) {
        for edge in self.edges.iter_mut() {
            edge.widen(bytes);
        }
    }

    // ─── Queries ───

    /// Nodes without outgoing edges.
    pub fn find_leaves(&self) -> Vec<&OwnershipNode> {
        let sources: HashSet<&str> = self.edges.iter().map(|e| e.from()).collect();
        self.nodes.values().filter(|n| !sources.contains(n.name())).collect()
    }

    /// Nodes with an edge to or from the root, in edge order, without repeats.
    pub fn nodes_adjacent_to_root(&self) -> Vec<&str> {
        let Some(root) = self.root.as_deref() else {
            return Vec::new();
        };
        let mut result: Vec<&str> = Vec::new();
        for edge in &self.edges {
            let other = if edge.from() == root {
                edge.to()
            } else if edge.to() == root {
                edge.from()
            } else {
                continue;
            };
            if !result.contains(&other) {
                result.push(other);
            }
        }
        result
    }

    /// Returns true if a directed path leads from `from` to `to`.
    pub fn reaches(&self, from: &str, to: &str) -> bool {
        if !self.has_node(from) || !self.has_node(to) {
            return false;
        }
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::from([from]);
        while let Some(current) = queue.pop_front() {
            if current == to {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            for edge in self.edges_from(current) {
                queue.push_back(edge.to());
            }
        }
        false
    }

    /// A graph is valid when it is named, rooted, and every edge endpoint exists.
    pub fn is_valid(&self) -> bool {
        if self.name.is_empty() || self.root().is_none() {
            return false;
        }
        self.edges.iter().all(|e| self.has_node(e.from()) && self.has_node(e.to()))
    }

    // ─── Merging ───

    /// Folds `source` into this graph.
    ///
    /// Edges anchoring into the source root are dropped, then the source's nodes
    /// (first writer wins on name clashes) and remaining edges are copied, and
    /// every source leaf is anchored to this graph's root with an edge `bits`
    /// wide. Returns the number of anchors added.
    pub fn absorb(&mut self, mut source: OwnershipGraph, bits: usize) -> usize {
        if let Some(source_root) = source.root.clone() {
            let dropped = source.remove_edges_to(&source_root);
            debug!("merge {} <- {}: dropped {} anchor(s) into {}", self.name, source.name, dropped.len(), source_root);
        }

        let leaves: Vec<String> = source.find_leaves().iter().map(|n| n.name().to_string()).collect();

        for node in source.nodes.values() {
            if !self.add_node(node.clone()) {
                debug!("merge {} <- {}: keeping existing node {}", self.name, source.name, node.name());
            }
        }
        for edge in source.edges {
            self.add_edge(edge);
        }

        let Some(root) = self.root().cloned() else {
            warn!("merge {} <- {}: target has no root, leaves left unanchored", self.name, source.name);
            return 0;
        };
        let mut anchors = 0;
        for leaf in leaves {
            if leaf == root.name() {
                continue;
            }
            let Some(node) = self.find_node(&leaf) else {
                continue;
            };
            let edge = Edge::between(node, &root, bits, None);
            if self.add_edge(edge) {
                anchors += 1;
            }
        }
        anchors
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn node(name: &str, kind: NodeKind, position: usize) -> OwnershipNode {
        OwnershipNode::new(name, kind, Position::new(position))
    }

    fn edge(graph: &OwnershipGraph, from: &str, to: &str) -> Edge {
        let from = graph.find_node(from).unwrap();
        let to = graph.find_node(to).unwrap();
        Edge::between(from, to, 8, Some(1))
    }

    /// `p -> M`, `M -> L`, `M -> R`, `L -> p`, `R -> p`.
    fn allocated(root: &str, offset: usize) -> OwnershipGraph {
        let mut g = OwnershipGraph::with_root(node(root, NodeKind::Root, offset));
        let m = format!("{}_m", root);
        let l = format!("{}_l", root);
        let r = format!("{}_r", root);
        g.add_node(node(&m, NodeKind::Memory, offset + 1));
        g.add_node(node(&l, NodeKind::LeftSlot, offset + 2));
        g.add_node(node(&r, NodeKind::RightSlot, offset + 3));
        for (from, to) in [(root, m.as_str()), (m.as_str(), l.as_str()), (m.as_str(), r.as_str()), (l.as_str(), root), (r.as_str(), root)] {
            let e = edge(&g, from, to);
            g.add_edge(e);
        }
        g
    }

    #[test]
    fn test_first_node_becomes_root() {
        let mut g = OwnershipGraph::new("p");
        assert!(g.root().is_none());
        assert!(g.add_node(node("p", NodeKind::Root, 0)));
        assert_eq!(g.root_name(), Some("p"));
        assert!(g.add_node(node("q", NodeKind::Memory, 1)));
        assert_eq!(g.root_name(), Some("p"));
        assert!(g.is_valid());
    }

    #[test]
    fn test_add_node_rejects_duplicates_and_empty() {
        let mut g = OwnershipGraph::with_root(node("p", NodeKind::Root, 0));
        assert!(!g.add_node(node("p", NodeKind::Memory, 1)));
        assert!(!g.add_node(node("", NodeKind::Memory, 2)));
        assert_eq!(g.node_count(), 1);
        assert_eq!(g.find_node("p").unwrap().kind(), NodeKind::Root);
    }

    #[test]
    fn test_add_edge_requires_endpoints_and_is_unique() {
        let mut g = OwnershipGraph::with_root(node("p", NodeKind::Root, 0));
        g.add_node(node("m", NodeKind::Memory, 1));
        let e = edge(&g, "p", "m");
        assert!(g.add_edge(e.clone()));
        assert!(!g.add_edge(e));
        let dangling = Edge::from_positions("p", Position::new(0), "x", Position::new(5), 8, None);
        assert!(!g.add_edge(dangling));
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn test_remove_node_cascades() {
        let mut g = allocated("p", 0);
        assert_eq!(g.edge_count(), 5);
        assert!(g.remove_node("p_m"));
        assert_eq!(g.edge_count(), 2);
        assert!(g.edges().all(|e| !e.touches("p_m")));
        assert!(!g.remove_node("p_m"));
    }

    #[test]
    fn test_remove_root_leaves_rootless() {
        let mut g = allocated("p", 0);
        assert!(g.remove_node("p"));
        assert!(g.root().is_none());
        assert!(!g.is_empty());
        assert!(!g.is_valid());
    }

    #[test]
    fn test_edge_queries() {
        let mut g = allocated("p", 0);
        assert_eq!(g.edges_from("p_m").count(), 2);
        assert_eq!(g.edges_to("p").count(), 2);
        assert_eq!(g.edges_involving("p").count(), 3);
        assert!(g.has_edge("p", "p_m"));
        assert!(!g.has_edge("p_m", "p"));
        assert!(g.remove_edge("p", "p_m"));
        assert!(!g.remove_edge("p", "p_m"));
    }

    #[test]
    fn test_nodes_by_kind() {
        let g = allocated("p", 0);
        assert_eq!(g.nodes_by_kind(NodeKind::Memory).len(), 1);
        assert_eq!(g.nodes_by_kind(NodeKind::LeftSlot)[0].name(), "p_l");
        assert!(g.nodes_by_kind(NodeKind::Null).is_empty());
        assert_eq!(g.max_position(), Some(Position::new(3)));
        assert_eq!(g.node_at(Position::new(1)).unwrap().name(), "p_m");
    }

    #[test]
    fn test_find_leaves() {
        let mut g = allocated("p", 0);
        assert!(g.find_leaves().is_empty());
        g.remove_edge("p_l", "p");
        let leaves: Vec<&str> = g.find_leaves().iter().map(|n| n.name()).collect();
        assert_eq!(leaves, vec!["p_l"]);
    }

    #[test]
    fn test_nodes_adjacent_to_root() {
        let g = allocated("p", 0);
        assert_eq!(g.nodes_adjacent_to_root(), vec!["p_m", "p_l", "p_r"]);
        assert!(g.has_edge_to_root("p_l"));
        assert!(!g.has_edge_to_root("p"));
    }

    #[test]
    fn test_remove_root_links() {
        let mut g = allocated("p", 0);
        assert_eq!(g.remove_root_links("p_l"), 1);
        assert_eq!(g.remove_root_links("p_l"), 0);
        assert_eq!(g.remove_root_links("p"), 0);
        assert!(!g.has_edge_to_root("p_l"));
        assert_eq!(g.edge_count(), 4);
    }

    #[test]
    fn test_reaches() {
        let g = allocated("p", 0);
        assert!(g.reaches("p", "p_r"));
        assert!(g.reaches("p_l", "p_m"));
        assert!(!g.reaches("p", "missing"));
    }

    #[test]
    fn test_rename_node() {
        let mut g = allocated("p", 0);
        assert!(g.rename_node("p_m", "block"));
        assert!(g.has_edge("p", "block"));
        assert!(g.has_edge("block", "p_l"));
        assert!(!g.rename_node("block", "p_l"));
        assert!(g.rename_node("p", "q"));
        assert_eq!(g.name(), "q");
        assert_eq!(g.root_name(), Some("q"));
        assert!(g.is_valid());
    }

    #[test]
    fn test_absorb_anchors_source_leaves() {
        let mut target = allocated("a", 0);
        let source = allocated("b", 4);

        let anchors = target.absorb(source, 8);

        // b_l and b_r lost their anchors into `b`; `b` still points at its block.
        assert_eq!(anchors, 2);
        assert_eq!(target.node_count(), 8);
        assert!(target.has_edge("b", "b_m"));
        assert!(target.has_edge("b_l", "a"));
        assert!(target.has_edge("b_r", "a"));
        assert!(!target.has_edge("b_l", "b"));
        assert!(target.reaches("b_l", "a"));
        assert!(target.reaches("b_r", "a"));
        assert_eq!(target.root_name(), Some("a"));
        assert!(target.is_valid());
    }

    #[test]
    fn test_absorb_bare_root() {
        let mut target = OwnershipGraph::with_root(node("a", NodeKind::Root, 0));
        let source = OwnershipGraph::with_root(node("b", NodeKind::Root, 1));
        assert_eq!(target.absorb(source, 8), 1);
        assert!(target.has_edge("b", "a"));
    }

    #[test]
    fn test_absorb_first_writer_wins() {
        let mut target = OwnershipGraph::with_root(node("a", NodeKind::Root, 0));
        target.add_node(node("shared", NodeKind::Memory, 1));
        let mut source = OwnershipGraph::with_root(node("b", NodeKind::Root, 2));
        source.add_node(node("shared", NodeKind::Null, 3));
        target.absorb(source, 8);
        assert_eq!(target.find_node("shared").unwrap().kind(), NodeKind::Memory);
        assert_eq!(target.find_node("shared").unwrap().position(), Position::new(1));
    }
}
