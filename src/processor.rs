//! The incremental leak analysis.
//!
//! A [`StatementProcessor`] applies statements one at a time to a
//! [`GraphRegistry`], and after each statement checks every live graph for
//! leaks. Positions, synthesized names and the encoding width are per-run
//! counters kept in a [`Context`].
//!
//! Assigning to a pointer first *detaches* it: the edges between the pointer
//! and its graph's root, and the pointer's own outgoing edges, are dropped.
//! Whatever the pointer held and nothing else reaches is then a leak.

use std::marker::PhantomData;

use log::{debug, error, info, warn};

use crate::bitvec::BitVector;
use crate::cnf::{check_graph_with, GraphVerdict};
use crate::edge::Edge;
use crate::error::AnalysisError;
use crate::graph::OwnershipGraph;
use crate::node::{NodeKind, OwnershipNode};
use crate::registry::GraphRegistry;
use crate::solver::{SatSolver, Varisat};
use crate::source::{Program, Row};
use crate::statement::{Field, OperationKind, Parsed, PointerValue, Statement};
use crate::types::{Position, StatementId};

/// Per-run counters.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Context {
    /// Position handed to the next node.
    pub next_position: usize,
    /// Suffix of the next synthesized node name.
    pub next_memory_index: usize,
    /// Byte width that fits every position handed out so far.
    pub max_encoding_bytes: usize,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            next_position: 0,
            next_memory_index: 0,
            max_encoding_bytes: 1,
        }
    }
}

impl Context {
    /// Hands out the next position. Returns it, and whether the encoding width grew.
    pub fn allocate_position(&mut self) -> (Position, bool) {
        let position = Position::new(self.next_position);
        self.next_position += 1;
        let needed = BitVector::calculate_bytes(self.next_position);
        let grew = needed > self.max_encoding_bytes;
        if grew {
            self.max_encoding_bytes = needed;
        }
        (position, grew)
    }

    /// Width in bits of newly created edge vectors.
    pub fn encoding_bits(&self) -> usize {
        self.max_encoding_bytes * 8
    }
}

/// Analysis settings.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct AnalysisOptions {
    /// Keep the solver's witness assignment for leaking graphs.
    pub record_models: bool,
    /// Check every graph once more after the last statement.
    pub final_check: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            record_models: true,
            final_check: true,
        }
    }
}

/// What happened when one top-level statement was processed.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct StatementReport {
    pub id: StatementId,
    /// One verdict per live graph, in graph name order.
    pub verdicts: Vec<GraphVerdict>,
    pub leak: bool,
    /// Errors raised by the statement, including those of nested branch items.
    pub errors: Vec<AnalysisError>,
}

impl StatementReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// The outcome of a whole run.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct RunSummary {
    pub reports: Vec<StatementReport>,
    /// Verdicts of the check after the last statement; empty when the run
    /// stopped on an error or the final check is disabled.
    pub final_verdicts: Vec<GraphVerdict>,
    pub has_leak: bool,
    pub has_error: bool,
}

impl RunSummary {
    pub fn first_error(&self) -> Option<&AnalysisError> {
        self.reports.iter().flat_map(|r| r.errors.iter()).next()
    }

    /// Statements after which some graph leaked.
    pub fn leaking_statements(&self) -> Vec<StatementId> {
        self.reports.iter().filter(|r| r.leak).map(|r| r.id).collect()
    }
}

/// A right-hand side with its pointer source looked up.
#[derive(Debug, Clone, Eq, PartialEq)]
enum Resolved {
    Null,
    Alloc,
    Free,
    Node { owner: String, node: String },
}

/// Applies statements to ownership graphs and checks them for leaks.
///
/// Each graph check uses a fresh solver of type `S`.
#[derive(Debug)]
pub struct StatementProcessor<S = Varisat> {
    registry: GraphRegistry,
    ctx: Context,
    options: AnalysisOptions,
    has_error: bool,
    has_leak: bool,
    _solver: PhantomData<S>,
}

impl StatementProcessor<Varisat> {
    pub fn new() -> Self {
        Self::with_solver(AnalysisOptions::default())
    }

    pub fn with_options(options: AnalysisOptions) -> Self {
        Self::with_solver(options)
    }
}

impl Default for StatementProcessor<Varisat> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: SatSolver + Default> StatementProcessor<S> {
    pub fn with_solver(options: AnalysisOptions) -> Self {
        Self {
            registry: GraphRegistry::new(),
            ctx: Context::default(),
            options,
            has_error: false,
            has_leak: false,
            _solver: PhantomData,
        }
    }

    pub fn registry(&self) -> &GraphRegistry {
        &self.registry
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }

    /// Sticky: set once any statement fails.
    pub fn has_error(&self) -> bool {
        self.has_error
    }

    /// Sticky: set once any check finds a leak.
    pub fn has_leak(&self) -> bool {
        self.has_leak
    }

    /// Processes statements until the end of the program or the first failing statement.
    pub fn run(&mut self, program: &Program) -> RunSummary {
        let mut summary = RunSummary::default();
        for row in &program.rows {
            let report = self.process(row);
            summary.reports.push(report);
            if self.has_error {
                error!("stopping after statement {}", row.id);
                break;
            }
        }
        if self.options.final_check && !self.has_error {
            match self.check_all() {
                Ok(verdicts) => summary.final_verdicts = verdicts,
                Err(e) => {
                    error!("final check: {}", e);
                    self.has_error = true;
                }
            }
            if summary.final_verdicts.iter().any(GraphVerdict::is_leak) {
                self.has_leak = true;
            }
        }
        summary.has_leak = self.has_leak;
        summary.has_error = self.has_error;
        info!(
            "analysis finished: {} statement(s), {}, {}",
            summary.reports.len(),
            if summary.has_leak { "leak" } else { "no leak" },
            if summary.has_error { "failed" } else { "completed" }
        );
        summary
    }

    /// Applies one top-level statement and checks every graph.
    pub fn process(&mut self, row: &Row) -> StatementReport {
        debug!("statement {}", row.id);
        let mut errors = Vec::new();
        self.execute(&row.statement, row.id, &mut errors);

        let verdicts = match self.check_all() {
            Ok(verdicts) => verdicts,
            Err(e) => {
                errors.push(e);
                Vec::new()
            }
        };
        for e in &errors {
            error!("{}", e);
        }
        if !errors.is_empty() {
            self.has_error = true;
        }

        let leak = verdicts.iter().any(GraphVerdict::is_leak);
        if leak {
            self.has_leak = true;
        }
        info!("statement {}: {}", row.id, if leak { "leak" } else { "no leak" });
        StatementReport {
            id: row.id,
            verdicts,
            leak,
            errors,
        }
    }

    /// Checks every live graph.
    pub fn check_all(&self) -> Result<Vec<GraphVerdict>, AnalysisError> {
        let verdicts = self
            .registry
            .iter()
            .map(|graph| check_graph_with::<S>(graph, self.options.record_models))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(verdicts)
    }

    fn execute(&mut self, statement: &Parsed, id: StatementId, errors: &mut Vec<AnalysisError>) {
        match statement {
            Err(e) => errors.push(AnalysisError::Shape { id, error: e.clone() }),
            Ok(Statement::Operation(op)) => {
                if op.kind == OperationKind::Loop {
                    warn!("statement {}: loop `{}` approximated by a single iteration", id, op.op);
                }
                for branch in &op.branches {
                    debug!("statement {}: {}", id, branch.label);
                    for item in &branch.body {
                        self.execute(item, id, errors);
                    }
                }
            }
            Ok(statement) => {
                if let Err(e) = self.apply(statement, id) {
                    errors.push(e);
                }
            }
        }
    }

    /// Applies one statement. Everything the statement refers to is resolved
    /// before the first mutation, so a failing statement leaves the graphs as
    /// they were.
    fn apply(&mut self, statement: &Statement, id: StatementId) -> Result<(), AnalysisError> {
        debug!("statement {}: {}", id, statement);
        match statement {
            Statement::Declare { variable } => {
                self.ensure_declared(variable);
                Ok(())
            }
            Statement::Assign { variable, value } => {
                let value = self.resolve_value(value)?;
                let graph = self.ensure_declared(variable);
                self.assign(&graph, variable, value, id)
            }
            Statement::Field { variable, path, value } => {
                let (graph, slot) = self.resolve(variable, path)?;
                match value {
                    Some(value) => {
                        let value = self.resolve_value(value)?;
                        self.assign(&graph, &slot, value, id)
                    }
                    None => {
                        debug!("statement {}: navigated to {}", id, slot);
                        Ok(())
                    }
                }
            }
            Statement::Operation(_) => Ok(()),
        }
    }

    /// Finds the graph holding `variable` and follows `path` from it.
    ///
    /// Returns the graph name and the node reached.
    fn resolve(&self, variable: &str, path: &[Field]) -> Result<(String, String), AnalysisError> {
        let owner = self
            .registry
            .owner_of(variable)
            .ok_or_else(|| AnalysisError::UndeclaredVariable(variable.to_string()))?;
        let node = navigate(self.graph(owner)?, variable, path)?;
        Ok((owner.to_string(), node))
    }

    fn resolve_value(&self, value: &PointerValue) -> Result<Resolved, AnalysisError> {
        Ok(match value {
            PointerValue::Null => Resolved::Null,
            PointerValue::Alloc(_) => Resolved::Alloc,
            PointerValue::Free(_) => Resolved::Free,
            PointerValue::Pointer { variable, path } => {
                let (owner, node) = self.resolve(variable, path)?;
                Resolved::Node { owner, node }
            }
        })
    }

    fn assign(&mut self, graph: &str, target: &str, value: Resolved, id: StatementId) -> Result<(), AnalysisError> {
        match value {
            Resolved::Null => self.assign_null(graph, target, id),
            Resolved::Alloc => self.allocate(graph, target, id),
            Resolved::Free => self.free(graph, target),
            Resolved::Node { owner, node } => self.assign_pointer(graph, target, &owner, &node, id),
        }
    }

    /// Returns the name of the graph that `variable` lives in, creating a new
    /// graph rooted at `variable` if it is not known yet.
    pub fn ensure_declared(&mut self, variable: &str) -> String {
        if let Some(owner) = self.registry.owner_of(variable) {
            return owner.to_string();
        }
        let position = self.new_position();
        let root = OwnershipNode::new(variable, NodeKind::Root, position);
        info!("declared {}", root);
        self.registry.insert(OwnershipGraph::with_root(root));
        variable.to_string()
    }

    fn graph(&self, name: &str) -> Result<&OwnershipGraph, AnalysisError> {
        self.registry
            .get(name)
            .ok_or_else(|| AnalysisError::MissingNode(name.to_string()))
    }

    fn graph_mut(&mut self, name: &str) -> Result<&mut OwnershipGraph, AnalysisError> {
        self.registry
            .get_mut(name)
            .ok_or_else(|| AnalysisError::MissingNode(name.to_string()))
    }

    fn new_position(&mut self) -> Position {
        let (position, grew) = self.ctx.allocate_position();
        if grew {
            let bytes = self.ctx.max_encoding_bytes;
            debug!("encoding width grows to {} byte(s)", bytes);
            for graph in self.registry.iter_mut() {
                graph.widen_edges(bytes);
            }
        }
        position
    }

    /// Picks an unused `N{i}` name.
    fn fresh_name(&mut self) -> String {
        loop {
            let name = format!("N{}", self.ctx.next_memory_index);
            self.ctx.next_memory_index += 1;
            if !self.registry.contains(&name) && !self.registry.has_node(&name) {
                return name;
            }
        }
    }

    fn new_node(&mut self, kind: NodeKind) -> OwnershipNode {
        let name = self.fresh_name();
        let position = self.new_position();
        OwnershipNode::new(name, kind, position)
    }

    fn assign_null(&mut self, graph: &str, variable: &str, id: StatementId) -> Result<(), AnalysisError> {
        let null = self.new_node(NodeKind::Null);
        let bits = self.ctx.encoding_bits();
        let g = self.graph_mut(graph)?;
        let from = g.find_node(variable).cloned().ok_or_else(|| AnalysisError::MissingNode(variable.to_string()))?;
        let root = g.root().cloned().ok_or_else(|| AnalysisError::MissingNode(graph.to_string()))?;

        detach(g, variable);
        debug!("{} = NULL ({})", variable, null.name());
        g.add_node(null.clone());
        g.add_edge(Edge::between(&from, &null, bits, Some(id)));
        g.add_edge(Edge::between(&null, &root, bits, Some(id)));
        Ok(())
    }

    fn allocate(&mut self, graph: &str, variable: &str, id: StatementId) -> Result<(), AnalysisError> {
        if !self.graph(graph)?.has_node(variable) {
            return Err(AnalysisError::MissingNode(variable.to_string()));
        }
        let memory = self.new_node(NodeKind::Memory);
        let left = self.new_node(NodeKind::LeftSlot);
        let right = self.new_node(NodeKind::RightSlot);
        let bits = self.ctx.encoding_bits();

        let g = self.graph_mut(graph)?;
        let from = g.find_node(variable).cloned().ok_or_else(|| AnalysisError::MissingNode(variable.to_string()))?;
        let root = g.root().cloned().ok_or_else(|| AnalysisError::MissingNode(graph.to_string()))?;

        detach(g, variable);
        debug!("{} = alloc ({}, left {}, right {})", variable, memory.name(), left.name(), right.name());
        g.add_node(memory.clone());
        g.add_node(left.clone());
        g.add_node(right.clone());
        g.add_edge(Edge::between(&from, &memory, bits, Some(id)));
        g.add_edge(Edge::between(&memory, &left, bits, Some(id)));
        g.add_edge(Edge::between(&memory, &right, bits, Some(id)));
        g.add_edge(Edge::between(&left, &root, bits, Some(id)));
        g.add_edge(Edge::between(&right, &root, bits, Some(id)));
        Ok(())
    }

    fn free(&mut self, graph: &str, variable: &str) -> Result<(), AnalysisError> {
        let g = self.graph_mut(graph)?;
        let node = g.find_node(variable).cloned().ok_or_else(|| AnalysisError::MissingNode(variable.to_string()))?;

        if node.is_memory() {
            free_block(g, variable);
        } else {
            let blocks: Vec<String> = g
                .edges_from(variable)
                .filter(|e| g.find_node(e.to()).is_some_and(OwnershipNode::is_memory))
                .map(|e| e.to().to_string())
                .collect();
            for block in &blocks {
                free_block(g, block);
            }
            if g.is_root(variable) {
                g.remove_edges_from(variable);
            } else {
                g.remove_node(variable);
            }
        }
        prune_null_sentinels(g);
        debug!("free {}", variable);
        Ok(())
    }

    /// Points `variable` at `node`, which lives in the graph `owner`.
    fn assign_pointer(
        &mut self,
        graph: &str,
        variable: &str,
        owner: &str,
        node: &str,
        id: StatementId,
    ) -> Result<(), AnalysisError> {
        if node == variable {
            debug!("{} = {}: self assignment", variable, node);
            return Ok(());
        }
        let bits = self.ctx.encoding_bits();
        if owner != graph {
            info!("merging graph {} into {}", owner, graph);
            self.registry.merge(graph, owner, bits);
        }

        let g = self.graph_mut(graph)?;
        detach(g, variable);
        let from = g.find_node(variable).cloned().ok_or_else(|| AnalysisError::MissingNode(variable.to_string()))?;
        let to = g.find_node(node).cloned().ok_or_else(|| AnalysisError::MissingNode(node.to_string()))?;
        debug!("{} = {}", variable, node);
        g.add_edge(Edge::between(&from, &to, bits, Some(id)));
        Ok(())
    }
}

/// Drops the root links and outgoing edges of `name`.
fn detach(graph: &mut OwnershipGraph, name: &str) {
    graph.remove_root_links(name);
    let removed = graph.remove_edges_from(name);
    if !removed.is_empty() {
        debug!("detached {} from {} target(s)", name, removed.len());
    }
    prune_null_sentinels(graph);
}

/// Removes null sentinels that no pointer refers to anymore.
fn prune_null_sentinels(graph: &mut OwnershipGraph) {
    let orphans: Vec<String> = graph
        .nodes_by_kind(NodeKind::Null)
        .into_iter()
        .filter(|n| graph.edges_to(n.name()).next().is_none())
        .map(|n| n.name().to_string())
        .collect();
    for name in orphans {
        graph.remove_node(&name);
    }
}

/// Removes a block and its slots.
fn free_block(graph: &mut OwnershipGraph, memory: &str) {
    let slots: Vec<String> = graph
        .edges_from(memory)
        .filter(|e| graph.find_node(e.to()).is_some_and(|n| n.kind().is_slot()))
        .map(|e| e.to().to_string())
        .collect();
    for slot in &slots {
        graph.remove_node(slot);
    }
    graph.remove_node(memory);
    debug!("freed block {} ({} slot(s))", memory, slots.len());
}

/// Follows `path` from `start`, one slot per field.
///
/// Each hop takes an outgoing edge to a slot of the requested side, either
/// directly or through the block the current node points at.
fn navigate(graph: &OwnershipGraph, start: &str, path: &[Field]) -> Result<String, AnalysisError> {
    if !graph.has_node(start) {
        return Err(AnalysisError::MissingNode(start.to_string()));
    }
    let mut current = start.to_string();
    for &field in path {
        let kind = NodeKind::slot(field);
        let is_kind = |name: &str| graph.find_node(name).is_some_and(|n| n.kind() == kind);

        let direct = graph.edges_from(&current).map(|e| e.to()).find(|to| is_kind(to));
        let next = direct.or_else(|| {
            graph
                .edges_from(&current)
                .filter(|e| graph.find_node(e.to()).is_some_and(OwnershipNode::is_memory))
                .flat_map(|e| graph.edges_from(e.to()))
                .map(|e| e.to())
                .find(|to| is_kind(to))
        });

        let Some(next) = next.map(str::to_string) else {
            return Err(AnalysisError::UnresolvedField {
                node: current,
                field: field.name().to_string(),
            });
        };
        current = next;
    }
    Ok(current)
}
