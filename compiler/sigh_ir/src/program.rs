//! An analysed program ready for evaluation.

use std::sync::Arc;

use crate::{Ast, DeclRef, Name, NodeId, NodeKind, SemanticInfo, StringInterner};

/// AST, semantic attributes and interner of one program.
///
/// Immutable after construction; every task of a run shares it through
/// [`SharedProgram`].
pub struct Program {
    ast: Ast,
    semantics: Box<dyn SemanticInfo>,
    interner: StringInterner,
    root: NodeId,
}

/// Program shared across the worker threads of a run.
pub type SharedProgram = Arc<Program>;

impl Program {
    /// Assemble a program from an externally produced AST and attribute
    /// store. `root` must be a `Root` node of `ast`.
    pub fn new(
        ast: Ast,
        semantics: Box<dyn SemanticInfo>,
        interner: StringInterner,
        root: NodeId,
    ) -> Self {
        Program {
            ast,
            semantics,
            interner,
            root,
        }
    }

    #[inline]
    pub fn ast(&self) -> &Ast {
        &self.ast
    }

    #[inline]
    pub fn semantics(&self) -> &dyn SemanticInfo {
        self.semantics.as_ref()
    }

    #[inline]
    pub fn interner(&self) -> &StringInterner {
        &self.interner
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Resolve a name to its text.
    #[inline]
    pub fn name(&self, name: Name) -> &'static str {
        self.interner.lookup(name)
    }

    /// The source name of a declaration, e.g. a function or struct name.
    pub fn decl_name(&self, decl: DeclRef) -> &'static str {
        match decl {
            DeclRef::Synthetic(synthetic) => self.name(synthetic.name),
            DeclRef::Node(node) => self
                .ast
                .kind(node)
                .declared_name()
                .map_or("", |name| self.name(name)),
        }
    }

    /// Check whether `node` is a `Root` node.
    pub fn is_root(&self, node: NodeId) -> bool {
        matches!(self.ast.kind(node), NodeKind::Root { .. })
    }
}

impl std::fmt::Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("nodes", &self.ast.len())
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}
