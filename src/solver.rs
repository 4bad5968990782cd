//! SAT solving.
//!
//! The leak check talks to a solver only through [`SatSolver`]: allocate
//! variables, add clauses, solve, read the model. [`Varisat`] is the bundled
//! backend, a thin adapter over the CDCL solver of the `varisat` crate.

use std::fmt;

use log::trace;
use varisat::ExtendFormula;

use crate::error::SolverError;
use crate::types::{Lit, Var};

/// Incremental clause-level interface to a SAT solver.
pub trait SatSolver {
    /// Allocates a fresh variable.
    fn new_var(&mut self) -> Var;

    /// Adds a clause (a disjunction of literals).
    ///
    /// Variables mentioned by the clause but not yet allocated are allocated
    /// implicitly. An empty clause makes the formula unsatisfiable.
    fn add_clause(&mut self, lits: &[Lit]);

    /// Decides satisfiability of the clauses added so far.
    fn solve(&mut self) -> Result<bool, SolverError>;

    /// Value of `var` in the model found by the last successful [`solve`](Self::solve).
    fn value(&self, var: Var) -> Option<bool>;

    fn num_vars(&self) -> usize;
}

/// [`SatSolver`] backed by [`varisat::Solver`].
pub struct Varisat {
    solver: varisat::Solver<'static>,
    num_vars: usize,
    num_clauses: usize,
    model: Option<Vec<bool>>,
}

impl Varisat {
    pub fn new() -> Self {
        Self {
            solver: varisat::Solver::new(),
            num_vars: 0,
            num_clauses: 0,
            model: None,
        }
    }

    /// Creates a solver with `num_vars` variables already allocated.
    pub fn with_vars(num_vars: usize) -> Self {
        let mut solver = Self::new();
        solver.ensure_num_vars(num_vars);
        solver
    }

    pub fn ensure_num_vars(&mut self, num_vars: usize) {
        while self.num_vars < num_vars {
            self.new_var();
        }
    }

    pub fn num_clauses(&self) -> usize {
        self.num_clauses
    }

    fn to_backend(lit: Lit) -> varisat::Lit {
        varisat::Lit::from_dimacs(lit.to_dimacs() as isize)
    }
}

impl Default for Varisat {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Varisat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Varisat")
            .field("num_vars", &self.num_vars)
            .field("num_clauses", &self.num_clauses)
            .field("has_model", &self.model.is_some())
            .finish()
    }
}

impl SatSolver for Varisat {
    fn new_var(&mut self) -> Var {
        self.solver.new_var();
        self.num_vars += 1;
        Var::new(self.num_vars as u32)
    }

    fn add_clause(&mut self, lits: &[Lit]) {
        if let Some(max) = lits.iter().map(|lit| lit.var().id() as usize).max() {
            self.ensure_num_vars(max);
        }
        let clause: Vec<varisat::Lit> = lits.iter().copied().map(Self::to_backend).collect();
        self.solver.add_clause(&clause);
        self.num_clauses += 1;
    }

    fn solve(&mut self) -> Result<bool, SolverError> {
        self.model = None;
        let sat = self.solver.solve().map_err(|e| SolverError(e.to_string()))?;
        if sat {
            let mut model = vec![false; self.num_vars];
            for lit in self.solver.model().unwrap_or_default() {
                if let Some(value) = model.get_mut(lit.var().index()) {
                    *value = lit.is_positive();
                }
            }
            self.model = Some(model);
        }
        trace!(
            "varisat: {} ({} vars, {} clauses)",
            if sat { "SAT" } else { "UNSAT" },
            self.num_vars,
            self.num_clauses
        );
        Ok(sat)
    }

    fn value(&self, var: Var) -> Option<bool> {
        self.model.as_ref().and_then(|model| model.get(var.index()).copied())
    }

    fn num_vars(&self) -> usize {
        self.num_vars
    }
}
