//! Type-safe wrappers for node positions and solver literals.
//!
//! A [`Position`] is the identity of an ownership node inside every formula that
//! mentions it. The solver side works with 1-indexed [`Var`]s (reserving 0, like
//! DIMACS) and [`Lit`]s, a variable paired with a polarity.

use std::fmt;
use std::ops::Neg;

/// Identifier of the statement that produced an edge.
pub type StatementId = i64;

/// A node position (0-indexed), assigned monotonically per analysis run.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Position(usize);

impl Position {
    pub const fn new(index: usize) -> Self {
        Position(index)
    }

    /// Returns the raw index as a `usize`.
    pub const fn index(self) -> usize {
        self.0
    }

    /// Returns the solver variable standing for this position.
    pub fn var(self) -> Var {
        Var::new(self.0 as u32 + 1)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<usize> for Position {
    fn from(index: usize) -> Self {
        Position(index)
    }
}

/// A solver variable (1-indexed).
///
/// # Invariants
///
/// - Variable IDs must be >= 1 (0 is reserved, as in DIMACS)
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Var(u32);

impl Var {
    /// Creates a new variable with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if `id == 0`. Variables must be 1-indexed.
    pub fn new(id: u32) -> Self {
        assert_ne!(id, 0, "Variable IDs must be >= 1");
        Var(id)
    }

    /// Returns the raw variable ID as a `u32`.
    pub fn id(self) -> u32 {
        self.0
    }

    /// Returns the 0-based index of this variable.
    pub fn index(self) -> usize {
        self.0 as usize - 1
    }

    /// Returns the positive literal of this variable.
    pub fn pos(self) -> Lit {
        Lit::new(self, false)
    }

    /// Returns the negative literal of this variable.
    pub fn neg(self) -> Lit {
        Lit::new(self, true)
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

impl From<Var> for u32 {
    fn from(var: Var) -> Self {
        var.0
    }
}

/// A literal: a variable with a polarity, packed as `(var << 1) | negated`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Lit(u32);

impl Lit {
    pub fn new(var: Var, negated: bool) -> Self {
        Lit((var.0 << 1) | negated as u32)
    }

    pub fn var(self) -> Var {
        Var(self.0 >> 1)
    }

    pub fn is_negated(self) -> bool {
        self.0 & 1 == 1
    }

    pub fn is_positive(self) -> bool {
        !self.is_negated()
    }

    /// Converts from a signed DIMACS literal.
    ///
    /// # Panics
    ///
    /// Panics if `value == 0`.
    pub fn from_dimacs(value: i32) -> Self {
        Lit::new(Var::new(value.unsigned_abs()), value < 0)
    }

    /// Converts to a signed DIMACS literal.
    pub fn to_dimacs(self) -> i32 {
        let id = self.var().id() as i32;
        if self.is_negated() {
            -id
        } else {
            id
        }
    }

    /// Evaluates the literal under a value of its variable.
    pub fn eval(self, value: bool) -> bool {
        value != self.is_negated()
    }
}

impl Neg for Lit {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Lit(self.0 ^ 1)
    }
}

impl fmt::Display for Lit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", if self.is_negated() { "~" } else { "" }, self.var())
    }
}
