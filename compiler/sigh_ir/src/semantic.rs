//! Read-only semantic attributes consumed by the evaluator.
//!
//! Name resolution and typing happen before evaluation. The evaluator never
//! resolves a name itself: it asks [`SemanticInfo`] which scope a node lives
//! in, what type it has, and which declaration a reference denotes.

use rustc_hash::FxHashMap;

use crate::{DeclRef, NodeId, ScopeId, Type};

/// Attribute store produced by semantic analysis, queried by node identity.
///
/// Implementations must be shareable across the worker threads of a run.
pub trait SemanticInfo: Send + Sync {
    /// The scope of the program root.
    fn root_scope(&self) -> ScopeId;

    /// For declarations, the scope their name is bound in. For references,
    /// the scope of the resolved declaration. For roots and blocks, the
    /// scope they introduce.
    fn scope(&self, node: NodeId) -> Option<ScopeId>;

    /// The scope a function's parameters are bound in.
    fn body_scope(&self, function: NodeId) -> Option<ScopeId>;

    /// Enclosing scope; `None` for the root scope.
    fn parent_scope(&self, scope: ScopeId) -> Option<ScopeId>;

    /// Resolved type of an expression or declaration.
    fn type_of(&self, node: NodeId) -> Option<&Type>;

    /// Declaration a reference resolves to.
    fn decl(&self, node: NodeId) -> Option<DeclRef>;
}

/// Dense attribute table filled in by [`ProgramBuilder`](crate::ProgramBuilder).
#[derive(Clone, Debug, Default)]
pub struct AttributeTable {
    root_scope: ScopeId,
    scopes: FxHashMap<NodeId, ScopeId>,
    body_scopes: FxHashMap<NodeId, ScopeId>,
    scope_parents: Vec<Option<ScopeId>>,
    types: FxHashMap<NodeId, Type>,
    decls: FxHashMap<NodeId, DeclRef>,
}

impl AttributeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh scope under `parent`; the first scope without a
    /// parent becomes the root scope.
    ///
    /// # Panics
    /// Panics if more than `u32::MAX` scopes are created.
    pub fn new_scope(&mut self, parent: Option<ScopeId>) -> ScopeId {
        let index = u32::try_from(self.scope_parents.len())
            .unwrap_or_else(|_| panic!("scope table exceeded {} scopes", u32::MAX));
        let scope = ScopeId::new(index);
        if parent.is_none() && !self.root_scope.is_valid() {
            self.root_scope = scope;
        }
        self.scope_parents.push(parent);
        scope
    }

    pub fn set_scope(&mut self, node: NodeId, scope: ScopeId) {
        self.scopes.insert(node, scope);
    }

    pub fn set_body_scope(&mut self, function: NodeId, scope: ScopeId) {
        self.body_scopes.insert(function, scope);
    }

    pub fn set_type(&mut self, node: NodeId, ty: Type) {
        self.types.insert(node, ty);
    }

    pub fn set_decl(&mut self, node: NodeId, decl: DeclRef) {
        self.decls.insert(node, decl);
    }

    /// Number of scopes allocated so far.
    pub fn scope_count(&self) -> usize {
        self.scope_parents.len()
    }
}

impl SemanticInfo for AttributeTable {
    fn root_scope(&self) -> ScopeId {
        self.root_scope
    }

    fn scope(&self, node: NodeId) -> Option<ScopeId> {
        self.scopes.get(&node).copied()
    }

    fn body_scope(&self, function: NodeId) -> Option<ScopeId> {
        self.body_scopes.get(&function).copied()
    }

    fn parent_scope(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scope_parents.get(scope.index()).copied().flatten()
    }

    fn type_of(&self, node: NodeId) -> Option<&Type> {
        self.types.get(&node)
    }

    fn decl(&self, node: NodeId) -> Option<DeclRef> {
        self.decls.get(&node).copied()
    }
}
