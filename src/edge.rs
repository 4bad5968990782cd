//! Directed edges between ownership nodes.
//!
//! An [`Edge`] `from -> to` reads as the clause `to ∨ ¬from`: whenever `from` is
//! reachable, so is `to`. The two endpoints are recorded twice, once by name
//! (for graph bookkeeping) and once as set bits of [`BitVector`]s (for encoding),
//! so an edge can be turned into solver literals without looking anything up.

use std::fmt;

use crate::bitvec::BitVector;
use crate::node::OwnershipNode;
use crate::types::{Position, StatementId};

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Edge {
    from: String,
    to: String,
    /// Positive literals: the position of `to`.
    to_set: BitVector,
    /// Negative literals: the position of `from`.
    from_set: BitVector,
    /// Statement that created the edge; `None` for edges synthesized by a merge.
    statement: Option<StatementId>,
}

impl Edge {
    /// Creates an edge from explicit literal vectors.
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        to_set: BitVector,
        from_set: BitVector,
        statement: Option<StatementId>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            to_set,
            from_set,
            statement,
        }
    }

    /// Creates the implication `from -> to` with vectors `bits` wide.
    ///
    /// Positions that do not fit into `bits` are silently left unset, so `bits`
    /// should cover the largest position handed out so far.
    pub fn between(
        from: &OwnershipNode,
        to: &OwnershipNode,
        bits: usize,
        statement: Option<StatementId>,
    ) -> Self {
        Self::from_positions(from.name(), from.position(), to.name(), to.position(), bits, statement)
    }

    pub fn from_positions(
        from: impl Into<String>,
        from_position: Position,
        to: impl Into<String>,
        to_position: Position,
        bits: usize,
        statement: Option<StatementId>,
    ) -> Self {
        let mut to_set = BitVector::new(bits);
        let mut from_set = BitVector::new(bits);
        to_set.set(to_position.index());
        from_set.set(from_position.index());
        Self::new(from, to, to_set, from_set, statement)
    }

    pub fn from(&self) -> &str {
        &self.from
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    pub fn to_set(&self) -> &BitVector {
        &self.to_set
    }

    pub fn from_set(&self) -> &BitVector {
        &self.from_set
    }

    pub fn statement(&self) -> Option<StatementId> {
        self.statement
    }

    /// Returns true if the edge starts or ends at `name`.
    pub fn touches(&self, name: &str) -> bool {
        self.from == name || self.to == name
    }

    /// Returns true if the edge connects `a` and `b`, in either direction.
    pub fn links(&self, a: &str, b: &str) -> bool {
        (self.from == a && self.to == b) || (self.from == b && self.to == a)
    }

    /// Positions contributing a positive literal.
    pub fn positive_positions(&self) -> impl Iterator<Item = Position> + '_ {
        self.to_set.iter_ones().map(Position::new)
    }

    /// Positions contributing a negative literal.
    pub fn negative_positions(&self) -> impl Iterator<Item = Position> + '_ {
        self.from_set.iter_ones().map(Position::new)
    }

    /// Widens the storage of both vectors to at least `bytes` bytes.
    pub fn widen(&mut self, bytes: usize) {
        if self.to_set.byte_len() < bytes {
            self.to_set.resize_bytes(bytes);
        }
        if self.from_set.byte_len() < bytes {
            self.from_set.resize_bytes(bytes);
        }
    }

    /// An edge is well-formed when both endpoints are named, distinct, and the
    /// literal vectors have the same length.
    pub fn is_valid(&self) -> bool {
        !self.from.is_empty() && !self.to.is_empty() && self.from != self.to && self.to_set.len() == self.from_set.len()
    }

    pub(crate) fn rename_endpoint(&mut self, old: &str, new: &str) {
        if self.from == old {
            self.from = new.to_string();
        }
        if self.to == old {
            self.to = new.to_string();
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)?;
        match self.statement {
            Some(id) => write!(f, " [stmt {}]", id),
            None => write!(f, " [merge]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::node::NodeKind;

    #[test]
    fn test_between_marks_positions() {
        let p = OwnershipNode::new("p", NodeKind::Root, Position::new(0));
        let m = OwnershipNode::new("N0", NodeKind::Memory, Position::new(1));
        let edge = Edge::between(&p, &m, 8, Some(1));

        assert_eq!(edge.from(), "p");
        assert_eq!(edge.to(), "N0");
        assert_eq!(edge.to_set().to_bit_string(), "01000000");
        assert_eq!(edge.from_set().to_bit_string(), "10000000");
        assert_eq!(edge.positive_positions().collect::<Vec<_>>(), vec![Position::new(1)]);
        assert_eq!(edge.negative_positions().collect::<Vec<_>>(), vec![Position::new(0)]);
        assert_eq!(edge.statement(), Some(1));
        assert!(edge.is_valid());
    }

    #[test]
    fn test_position_beyond_width_is_dropped() {
        let edge = Edge::from_positions("a", Position::new(2), "b", Position::new(9), 8, None);
        assert!(edge.to_set().is_zero());
        assert_eq!(edge.from_set().count_ones(), 1);
    }

    #[test]
    fn test_touches_and_links() {
        let edge = Edge::from_positions("a", Position::new(0), "b", Position::new(1), 8, None);
        assert!(edge.touches("a"));
        assert!(edge.touches("b"));
        assert!(!edge.touches("c"));
        assert!(edge.links("b", "a"));
        assert!(!edge.links("a", "c"));
        assert_eq!(edge.to_string(), "a -> b [merge]");
    }

    #[test]
    fn test_widen() {
        let mut edge = Edge::from_positions("a", Position::new(0), "b", Position::new(1), 8, Some(3));
        edge.widen(2);
        assert_eq!(edge.to_set().byte_len(), 2);
        assert_eq!(edge.from_set().byte_len(), 2);
        assert_eq!(edge.to_set().len(), 8);
        assert!(edge.to_set().get(1));
        edge.widen(1);
        assert_eq!(edge.to_set().byte_len(), 2);
    }

    #[test]
    fn test_self_edge_is_invalid() {
        let edge = Edge::from_positions("a", Position::new(0), "a", Position::new(0), 8, None);
        assert!(!edge.is_valid());
    }
}
