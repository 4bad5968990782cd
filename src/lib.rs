//! # leak-sat: static memory-leak detection with ownership graphs and SAT
//!
//! **`leak-sat`** walks a program statement by statement and decides, after every
//! statement, whether some allocated block has become unreachable from the
//! variable that owns it.
//!
//! ## How it works
//!
//! Every declared variable owns an **ownership graph**. Allocating into a pointer
//! adds a block node with two slot nodes, and the slots point back to the graph's
//! root, so a freshly allocated block sits on a cycle through its owner.
//! Overwriting a pointer cuts the edge into whatever it held before.
//!
//! Each edge `from -> to` is the clause `to ∨ ¬from`. Together with two clauses
//! saying "not everything is false" and "not everything is true", the formula is
//! satisfiable exactly when the graph can be split into a part that is reachable
//! and a part that is not. A satisfiable formula therefore means a **leak**.
//!
//! - **Per-run context**: positions, synthesized names and the encoding width are
//!   counters of one [`StatementProcessor`][crate::processor::StatementProcessor], never globals.
//! - **Pluggable solver**: formulas go through the [`SatSolver`][crate::solver::SatSolver]
//!   trait; [`Varisat`][crate::solver::Varisat] is bundled.
//! - **Deterministic output**: nodes are kept in name order and edges in insertion
//!   order, so dumps can be compared verbatim.
//!
//! ## Quick Start
//!
//! ```rust
//! use leak_sat::processor::StatementProcessor;
//! use leak_sat::source::Program;
//!
//! let program = Program::from_json_str(
//!     r#"{"code": {"rows": [
//!         {"id": 1, "variable": "p", "value": "malloc"},
//!         {"id": 2, "variable": "p", "value": "malloc"}
//!     ]}}"#,
//! )
//! .unwrap();
//!
//! let mut processor = StatementProcessor::new();
//! let summary = processor.run(&program);
//!
//! // The first block is lost when `p` is overwritten.
//! assert!(!summary.reports[0].leak);
//! assert!(summary.reports[1].leak);
//! assert!(summary.has_leak);
//! ```
//!
//! ## Core Components
//!
//! - **[`graph`]**: ownership graphs, and [`registry`] for the graphs of a run.
//! - **[`processor`]**: the statement-by-statement analysis.
//! - **[`cnf`]**: the encoding of a graph and the leak verdict.
//! - **[`source`]** and **[`statement`]**: reading programs from JSON.
//! - **[`debug`]** and **[`dot`]**: dumps and Graphviz output.

pub mod bitvec;
pub mod cnf;
pub mod debug;
pub mod dot;
pub mod edge;
pub mod error;
pub mod graph;
pub mod node;
pub mod processor;
pub mod registry;
pub mod solver;
pub mod source;
pub mod statement;
pub mod types;
