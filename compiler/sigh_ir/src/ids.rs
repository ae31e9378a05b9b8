//! Node and scope identities.
//!
//! Nodes live in a flat arena and are addressed by `NodeId(u32)` instead of
//! `Box<Node>`: 4 bytes per edge, O(1) equality, and a stable identity that
//! runtime state (protect-block locks) can be keyed on.

use std::fmt;

/// Index into the AST arena.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NodeId(u32);

impl NodeId {
    /// Invalid node ID (sentinel value).
    pub const INVALID: NodeId = NodeId(u32::MAX);

    #[inline]
    pub const fn new(index: u32) -> Self {
        NodeId(index)
    }

    /// Get the index into the arena.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "NodeId({})", self.0)
        } else {
            write!(f, "NodeId::INVALID")
        }
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::INVALID
    }
}

/// Opaque lexical scope identity.
///
/// Scopes form a tree rooted at the program's root scope; the parent
/// relation is recorded by the attribute table, not here.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ScopeId(u32);

impl ScopeId {
    /// Invalid scope ID (sentinel value).
    pub const INVALID: ScopeId = ScopeId(u32::MAX);

    #[inline]
    pub const fn new(index: u32) -> Self {
        ScopeId(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }
}

impl fmt::Debug for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "ScopeId({})", self.0)
        } else {
            write!(f, "ScopeId::INVALID")
        }
    }
}

impl Default for ScopeId {
    fn default() -> Self {
        Self::INVALID
    }
}
