//! Ownership graph to DOT (Graphviz) conversion.
//!
//! # DOT Format
//!
//! - **Root** nodes are drawn as double octagons at the top (source rank)
//! - **Memory** nodes are boxes, **slots** are ellipses, **null** sentinels are points
//! - Edges created by a statement are solid and labeled with the statement id;
//!   edges created by a merge are dashed
//!
//! # Examples
//!
//! ```
//! use leak_sat::dot::to_dot;
//! use leak_sat::graph::OwnershipGraph;
//! use leak_sat::node::{NodeKind, OwnershipNode};
//! use leak_sat::types::Position;
//!
//! let graph = OwnershipGraph::with_root(OwnershipNode::new("p", NodeKind::Root, Position::new(0)));
//! let dot = to_dot(&graph).unwrap();
//! assert!(dot.starts_with("digraph \"p\" {"));
//! // Write to file and render with: dot -Tpng p.dot -o p.png
//! ```

use std::fmt::Write as _;

use crate::graph::OwnershipGraph;
use crate::node::NodeKind;

/// Configuration options for DOT output generation.
#[derive(Debug, Clone)]
pub struct DotConfig {
    /// Shape for root nodes (default: "doubleoctagon")
    pub root_shape: &'static str,
    /// Shape for memory nodes (default: "box")
    pub memory_shape: &'static str,
    /// Shape for slot nodes (default: "ellipse")
    pub slot_shape: &'static str,
    /// Shape for null sentinels (default: "point")
    pub null_shape: &'static str,
    /// Style for edges created by statements (default: "solid")
    pub edge_style: &'static str,
    /// Style for edges created by merges (default: "dashed")
    pub merge_edge_style: &'static str,
    /// Whether node labels include positions (default: true)
    pub show_positions: bool,
    /// Whether edge labels include statement ids (default: true)
    pub show_statements: bool,
}

impl Default for DotConfig {
    fn default() -> Self {
        Self {
            root_shape: "doubleoctagon",
            memory_shape: "box",
            slot_shape: "ellipse",
            null_shape: "point",
            edge_style: "solid",
            merge_edge_style: "dashed",
            show_positions: true,
            show_statements: true,
        }
    }
}

impl DotConfig {
    fn shape(&self, kind: NodeKind) -> &'static str {
        match kind {
            NodeKind::Root => self.root_shape,
            NodeKind::Memory => self.memory_shape,
            NodeKind::LeftSlot | NodeKind::RightSlot => self.slot_shape,
            NodeKind::Null => self.null_shape,
        }
    }
}

/// Converts an ownership graph to DOT format with the default configuration.
pub fn to_dot(graph: &OwnershipGraph) -> Result<String, std::fmt::Error> {
    to_dot_with_config(graph, &DotConfig::default())
}

/// Converts an ownership graph to DOT format.
pub fn to_dot_with_config(graph: &OwnershipGraph, config: &DotConfig) -> Result<String, std::fmt::Error> {
    let mut dot = String::new();
    writeln!(dot, "digraph {} {{", quote(graph.name()))?;

    if let Some(root) = graph.root() {
        writeln!(dot, "{{ rank=source; {}; }}", quote(root.name()))?;
    }

    for node in graph.nodes() {
        let label = if config.show_positions {
            format!("{}\\n#{}", node.name(), node.position().index())
        } else {
            node.name().to_string()
        };
        let label = if node.kind() == NodeKind::Null { String::new() } else { label };
        writeln!(
            dot,
            "{} [shape={}, label={}, tooltip=\"{}\"];",
            quote(node.name()),
            config.shape(node.kind()),
            quote(&label),
            node.kind()
        )?;
    }

    for edge in graph.edges() {
        let style = match edge.statement() {
            Some(_) => config.edge_style,
            None => config.merge_edge_style,
        };
        write!(dot, "{} -> {} [style={}", quote(edge.from()), quote(edge.to()), style)?;
        if config.show_statements {
            if let Some(id) = edge.statement() {
                write!(dot, ", label=\"{}\"", id)?;
            }
        }
        writeln!(dot, "];")?;
    }

    writeln!(dot, "}}")?;
    Ok(dot)
}

/// Wraps `s` in double quotes. Backslashes are kept, so `\n` escapes still work in labels.
fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\\\""))
}
