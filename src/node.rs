use std::fmt;

use crate::statement::Field;
use crate::types::Position;

/// The role a node plays in an ownership graph.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum NodeKind {
    /// A declared variable; anchor for reachability.
    Root,
    /// One allocated block.
    Memory,
    /// The `left` structural child of a block.
    LeftSlot,
    /// The `right` structural child of a block.
    RightSlot,
    /// Sentinel a pointer refers to after a null assignment.
    Null,
}

impl NodeKind {
    /// Returns the slot kind reached through `field`.
    pub fn slot(field: Field) -> Self {
        match field {
            Field::Left => NodeKind::LeftSlot,
            Field::Right => NodeKind::RightSlot,
        }
    }

    pub fn is_slot(self) -> bool {
        matches!(self, NodeKind::LeftSlot | NodeKind::RightSlot)
    }

    pub fn name(self) -> &'static str {
        match self {
            NodeKind::Root => "ROOT",
            NodeKind::Memory => "MEMORY",
            NodeKind::LeftSlot => "LEFT_SLOT",
            NodeKind::RightSlot => "RIGHT_SLOT",
            NodeKind::Null => "NULL",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A named, typed, positioned vertex of an ownership graph.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct OwnershipNode {
    name: String,
    kind: NodeKind,
    position: Position,
}

impl OwnershipNode {
    pub fn new(name: impl Into<String>, kind: NodeKind, position: Position) -> Self {
        Self {
            name: name.into(),
            kind,
            position,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn is_root(&self) -> bool {
        self.kind == NodeKind::Root
    }

    pub fn is_memory(&self) -> bool {
        self.kind == NodeKind::Memory
    }

    /// A node is well-formed when it has a name.
    pub fn is_valid(&self) -> bool {
        !self.name.is_empty()
    }

    pub(crate) fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }
}

impl fmt::Display for OwnershipNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}, pos {}]", self.name, self.kind, self.position.index())
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_slot_kinds() {
        assert_eq!(NodeKind::slot(Field::Left), NodeKind::LeftSlot);
        assert_eq!(NodeKind::slot(Field::Right), NodeKind::RightSlot);
        assert!(NodeKind::LeftSlot.is_slot());
        assert!(!NodeKind::Memory.is_slot());
    }

    #[test]
    fn test_node_display() {
        let node = OwnershipNode::new("p", NodeKind::Root, Position::new(3));
        assert_eq!(node.to_string(), "p [ROOT, pos 3]");
        assert!(node.is_root());
        assert!(node.is_valid());
        assert!(!OwnershipNode::new("", NodeKind::Memory, Position::new(0)).is_valid());
    }
}
