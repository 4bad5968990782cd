//! Debug utilities for inspecting ownership graphs and analysis results.
//!
//! The `Display` impls here produce the human-readable dumps printed by the
//! command-line tool. Their output is deterministic: nodes are listed in name
//! order and edges in insertion order.

use std::fmt;
use std::fmt::Write;

use crate::cnf::GraphVerdict;
use crate::edge::Edge;
use crate::graph::OwnershipGraph;
use crate::node::NodeKind;
use crate::processor::{RunSummary, StatementReport};
use crate::registry::GraphRegistry;

/// Per-graph statistics.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct GraphStats {
    pub nodes: usize,
    pub edges: usize,
    pub memory: usize,
    pub slots: usize,
    pub nulls: usize,
    pub leaves: usize,
}

impl fmt::Display for GraphStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} nodes ({} memory, {} slots, {} null), {} edges, {} leaves",
            self.nodes, self.memory, self.slots, self.nulls, self.edges, self.leaves
        )
    }
}

impl OwnershipGraph {
    pub fn stats(&self) -> GraphStats {
        let count = |kind: NodeKind| self.nodes().filter(|n| n.kind() == kind).count();
        GraphStats {
            nodes: self.node_count(),
            edges: self.edge_count(),
            memory: count(NodeKind::Memory),
            slots: count(NodeKind::LeftSlot) + count(NodeKind::RightSlot),
            nulls: count(NodeKind::Null),
            leaves: self.find_leaves().len(),
        }
    }

    /// Formats the graph together with the literal vectors of every edge.
    pub fn debug_string(&self) -> String {
        let mut result = String::new();
        // Writing into a String cannot fail.
        let _ = writeln!(&mut result, "{}", self);
        let _ = writeln!(&mut result, "  vectors:");
        for edge in self.edges() {
            let _ = writeln!(&mut result, "    {}", EdgeVectors(edge));
        }
        result
    }

    /// Returns the edges violated by an assignment of node values.
    ///
    /// Nodes missing from `model` count as false. Useful for checking a leak
    /// witness: a model reported for a leaking graph violates no edge.
    pub fn violated_edges(&self, model: &[(String, bool)]) -> Vec<&Edge> {
        let value = |name: &str| model.iter().any(|(n, v)| n == name && *v);
        self.edges().filter(|e| value(e.from()) && !value(e.to())).collect()
    }
}

struct EdgeVectors<'a>(&'a Edge);

impl fmt::Display for EdgeVectors<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let edge = self.0;
        write!(f, "{} -> {}: to [{}] from [{}]", edge.from(), edge.to(), edge.to_set(), edge.from_set())
    }
}

impl fmt::Display for OwnershipGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "graph {} (root {}, {} nodes, {} edges)",
            self.name(),
            self.root_name().unwrap_or("<none>"),
            self.node_count(),
            self.edge_count()
        )?;
        writeln!(f, "  nodes:")?;
        for node in self.nodes() {
            writeln!(f, "    {}", node)?;
        }
        write!(f, "  edges:")?;
        for edge in self.edges() {
            write!(f, "\n    {}", edge)?;
        }
        Ok(())
    }
}

impl fmt::Display for GraphRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} graph(s)", self.len())?;
        for graph in self.iter() {
            write!(f, "\n{}", graph)?;
        }
        Ok(())
    }
}

impl fmt::Display for GraphVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.graph, self.verdict)?;
        if !self.model.is_empty() {
            write!(f, " [")?;
            for (i, (name, value)) in self.model.iter().enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{}={}", name, u8::from(*value))?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}

impl fmt::Display for StatementReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "statement {}: {}", self.id, if self.leak { "LEAK" } else { "ok" })?;
        for verdict in &self.verdicts {
            write!(f, "\n  {}", verdict)?;
        }
        for error in &self.errors {
            write!(f, "\n  error: {}", error)?;
        }
        Ok(())
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for report in &self.reports {
            writeln!(f, "{}", report)?;
        }
        if !self.final_verdicts.is_empty() {
            writeln!(f, "final:")?;
            for verdict in &self.final_verdicts {
                writeln!(f, "  {}", verdict)?;
            }
        }
        let result = match (self.has_error, self.has_leak) {
            (true, _) => "analysis failed",
            (false, true) => "memory leaks detected",
            (false, false) => "no memory leaks detected",
        };
        write!(f, "result: {}", result)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::cnf::{check_graph, Verdict};
    use crate::node::OwnershipNode;
    use crate::types::Position;

    fn sample() -> OwnershipGraph {
        let mut g = OwnershipGraph::with_root(OwnershipNode::new("p", NodeKind::Root, Position::new(0)));
        g.add_node(OwnershipNode::new("N0", NodeKind::Memory, Position::new(1)));
        g.add_node(OwnershipNode::new("N1", NodeKind::LeftSlot, Position::new(2)));
        g.add_edge(Edge::from_positions("p", Position::new(0), "N0", Position::new(1), 8, Some(1)));
        g.add_edge(Edge::from_positions("N0", Position::new(1), "N1", Position::new(2), 8, Some(1)));
        g
    }

    #[test]
    fn test_graph_display() {
        let dump = sample().to_string();
        assert_eq!(
            dump,
            "graph p (root p, 3 nodes, 2 edges)\n  \
             nodes:\n    \
             N0 [MEMORY, pos 1]\n    \
             N1 [LEFT_SLOT, pos 2]\n    \
             p [ROOT, pos 0]\n  \
             edges:\n    \
             p -> N0 [stmt 1]\n    \
             N0 -> N1 [stmt 1]"
        );
    }

    #[test]
    fn test_debug_string_has_vectors() {
        let dump = sample().debug_string();
        assert!(dump.contains("p -> N0: to [01000000] from [10000000]"));
    }

    #[test]
    fn test_stats() {
        let stats = sample().stats();
        assert_eq!(stats.nodes, 3);
        assert_eq!(stats.memory, 1);
        assert_eq!(stats.slots, 1);
        assert_eq!(stats.leaves, 1);
        assert_eq!(stats.to_string(), "3 nodes (1 memory, 1 slots, 0 null), 2 edges, 1 leaves");
    }

    #[test]
    fn test_leak_model_violates_nothing() {
        let g = sample();
        let verdict = check_graph(&g).unwrap();
        assert_eq!(verdict.verdict, Verdict::Leak);
        assert!(g.violated_edges(&verdict.model).is_empty());
        let all_true: Vec<(String, bool)> = vec![("p".into(), true), ("N0".into(), true)];
        assert_eq!(g.violated_edges(&all_true).len(), 1);
    }

    #[test]
    fn test_verdict_display() {
        let v = GraphVerdict {
            graph: "p".into(),
            verdict: Verdict::Leak,
            model: vec![("p".into(), true), ("N0".into(), false)],
        };
        assert_eq!(v.to_string(), "p: leak [p=1 N0=0]");
    }
}
