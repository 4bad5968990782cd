//! CNF encoding of ownership graphs and the leak verdict.
//!
//! Every node position `i` becomes the solver variable `i + 1`. An edge
//! `from -> to` becomes the clause `to ∨ ¬from`, read off the edge's bit
//! vectors. Two forcing clauses are added over all positions the edges use:
//! one with every literal positive, one with every literal negative.
//!
//! In a healthy graph every node sits on a cycle through the root, so all
//! used variables are forced equal and the forcing clauses make the formula
//! unsatisfiable. A satisfying assignment splits the nodes into a true part
//! and a false part with no edge leading from the first to the second, which
//! is exactly a piece of memory that no longer reaches its owner.
//!
//! ```
//! use leak_sat::cnf::{check_graph, Verdict};
//! use leak_sat::edge::Edge;
//! use leak_sat::graph::OwnershipGraph;
//! use leak_sat::node::{NodeKind, OwnershipNode};
//! use leak_sat::types::Position;
//!
//! let mut graph = OwnershipGraph::with_root(OwnershipNode::new("p", NodeKind::Root, Position::new(0)));
//! graph.add_node(OwnershipNode::new("N0", NodeKind::Memory, Position::new(1)));
//! graph.add_edge(Edge::from_positions("p", Position::new(0), "N0", Position::new(1), 8, Some(1)));
//! assert_eq!(check_graph(&graph).unwrap().verdict, Verdict::Leak);
//!
//! graph.add_edge(Edge::from_positions("N0", Position::new(1), "p", Position::new(0), 8, Some(2)));
//! assert_eq!(check_graph(&graph).unwrap().verdict, Verdict::NoLeak);
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::fmt::Write as _;

use log::{debug, info};

use crate::error::SolverError;
use crate::graph::OwnershipGraph;
use crate::solver::{SatSolver, Varisat};
use crate::types::{Lit, Position};

/// A formula in conjunctive normal form.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Cnf {
    num_vars: usize,
    clauses: Vec<Vec<Lit>>,
    used: Vec<Position>,
}

impl Cnf {
    /// Encodes the edges of `graph`, followed by the two forcing clauses.
    pub fn from_graph(graph: &OwnershipGraph) -> Self {
        let num_vars = graph.max_position().map_or(0, |p| p.index() + 1);
        let mut clauses = Vec::with_capacity(graph.edge_count() + 2);
        let mut used = BTreeSet::new();

        for edge in graph.edges() {
            let positives = edge.positive_positions().filter(|p| p.index() < num_vars);
            let negatives = edge.negative_positions().filter(|p| p.index() < num_vars);
            let mut clause = Vec::new();
            for p in positives {
                used.insert(p);
                clause.push(p.var().pos());
            }
            for p in negatives {
                used.insert(p);
                clause.push(p.var().neg());
            }
            if !clause.is_empty() {
                clauses.push(clause);
            }
        }

        let used: Vec<Position> = used.into_iter().collect();
        if !used.is_empty() {
            clauses.push(used.iter().map(|p| p.var().pos()).collect());
            clauses.push(used.iter().map(|p| p.var().neg()).collect());
        }

        Cnf { num_vars, clauses, used }
    }

    pub fn num_vars(&self) -> usize {
        self.num_vars
    }

    pub fn num_clauses(&self) -> usize {
        self.clauses.len()
    }

    pub fn clauses(&self) -> &[Vec<Lit>] {
        &self.clauses
    }

    /// Positions mentioned by at least one edge, in ascending order.
    pub fn used_positions(&self) -> &[Position] {
        &self.used
    }

    /// Allocates the formula's variables in `solver` and adds its clauses.
    pub fn load_into<S: SatSolver>(&self, solver: &mut S) {
        while solver.num_vars() < self.num_vars {
            solver.new_var();
        }
        for clause in &self.clauses {
            solver.add_clause(clause);
        }
    }

    /// Renders the formula in DIMACS CNF.
    pub fn to_dimacs(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = writeln!(out, "p cnf {} {}", self.num_vars, self.clauses.len());
        for clause in &self.clauses {
            for lit in clause {
                let _ = write!(out, "{} ", lit.to_dimacs());
            }
            out.push_str("0\n");
        }
        out
    }
}

/// Outcome of a leak check.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Verdict {
    NoLeak,
    Leak,
}

impl Verdict {
    pub fn is_leak(self) -> bool {
        self == Verdict::Leak
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::NoLeak => write!(f, "no leak"),
            Verdict::Leak => write!(f, "leak"),
        }
    }
}

/// The verdict for one graph, with the witness assignment when it leaks.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct GraphVerdict {
    pub graph: String,
    pub verdict: Verdict,
    /// Node name and value for every used position, in position order.
    /// Empty unless the graph leaks and models were requested.
    pub model: Vec<(String, bool)>,
}

impl GraphVerdict {
    fn without_model(graph: &OwnershipGraph, verdict: Verdict) -> Self {
        GraphVerdict {
            graph: graph.name().to_string(),
            verdict,
            model: Vec::new(),
        }
    }

    pub fn is_leak(&self) -> bool {
        self.verdict.is_leak()
    }
}

/// Checks `graph` for a leak with the bundled solver, recording the model.
pub fn check_graph(graph: &OwnershipGraph) -> Result<GraphVerdict, SolverError> {
    check_graph_with::<Varisat>(graph, true)
}

/// Checks `graph` for a leak with a fresh solver of type `S`.
pub fn check_graph_with<S: SatSolver + Default>(
    graph: &OwnershipGraph,
    record_model: bool,
) -> Result<GraphVerdict, SolverError> {
    if graph.is_empty() {
        debug!("graph {}: empty, no leak", graph.name());
        return Ok(GraphVerdict::without_model(graph, Verdict::NoLeak));
    }
    if graph.edge_count() == 0 {
        let only_root = graph.node_count() == 1 && graph.root().is_some();
        let verdict = if only_root { Verdict::NoLeak } else { Verdict::Leak };
        debug!("graph {}: {} node(s) without edges, {}", graph.name(), graph.node_count(), verdict);
        return Ok(GraphVerdict::without_model(graph, verdict));
    }

    let cnf = Cnf::from_graph(graph);
    debug!("graph {}: {} vars, {} clauses", graph.name(), cnf.num_vars(), cnf.num_clauses());
    let mut solver = S::default();
    cnf.load_into(&mut solver);

    if !solver.solve()? {
        return Ok(GraphVerdict::without_model(graph, Verdict::NoLeak));
    }

    let mut result = GraphVerdict::without_model(graph, Verdict::Leak);
    if record_model {
        for &position in cnf.used_positions() {
            let Some(node) = graph.node_at(position) else {
                continue;
            };
            if let Some(value) = solver.value(position.var()) {
                result.model.push((node.name().to_string(), value));
            }
        }
    }
    info!("graph {}: leak", graph.name());
    Ok(result)
}
