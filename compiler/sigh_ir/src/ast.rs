//! Flat AST arena.
//!
//! Nodes are stored contiguously and refer to their children by [`NodeId`].
//! The arena is immutable once built and is shared by every task of a run,
//! so node identity doubles as program-point identity (e.g. one protect
//! block node is one lock site).

use std::sync::Arc;

use crate::{BinaryOp, Name, NodeId, Span, UnaryOp};

/// One AST node: its kind plus the source span it covers.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
}

/// Every node shape the evaluator dispatches on.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    // Literals
    IntLiteral(i64),
    FloatLiteral(f64),
    StringLiteral(Arc<str>),

    // Expressions
    /// A name use; what it denotes comes from `SemanticInfo::decl`.
    Reference(Name),
    /// `$Point`: the constructor of the struct named by `reference`.
    Constructor {
        reference: NodeId,
    },
    Parenthesized(NodeId),
    ArrayLiteral(Vec<NodeId>),
    ArrayAccess {
        array: NodeId,
        index: NodeId,
    },
    FieldAccess {
        stem: NodeId,
        field: Name,
    },
    FunCall {
        function: NodeId,
        arguments: Vec<NodeId>,
    },
    Unary {
        op: UnaryOp,
        operand: NodeId,
    },
    Binary {
        op: BinaryOp,
        left: NodeId,
        right: NodeId,
    },
    Assignment {
        target: NodeId,
        value: NodeId,
    },

    // Statements
    Root {
        statements: Vec<NodeId>,
    },
    Block {
        statements: Vec<NodeId>,
    },
    ExpressionStatement(NodeId),
    If {
        condition: NodeId,
        then_branch: NodeId,
        else_branch: Option<NodeId>,
    },
    While {
        condition: NodeId,
        body: NodeId,
    },
    Return {
        value: Option<NodeId>,
    },

    // Concurrency
    /// `launch f(...)`: run a call as a detached task.
    Launch {
        call: NodeId,
    },
    /// `launch var x: T = f(...)`: run a declaration as a detached task.
    LaunchDecl {
        declaration: NodeId,
    },
    /// `protect : { ... }`: run a block under this site's lock.
    ProtectBlock {
        block: NodeId,
    },

    // Declarations
    VarDecl {
        name: Name,
        initializer: NodeId,
    },
    FunDecl {
        name: Name,
        parameters: Vec<NodeId>,
        body: NodeId,
    },
    Parameter {
        name: Name,
    },
    StructDecl {
        name: Name,
        fields: Vec<NodeId>,
    },
    FieldDecl {
        name: Name,
    },
}

impl NodeKind {
    /// The declared name, for declaration nodes.
    pub fn declared_name(&self) -> Option<Name> {
        match self {
            NodeKind::VarDecl { name, .. }
            | NodeKind::FunDecl { name, .. }
            | NodeKind::Parameter { name }
            | NodeKind::StructDecl { name, .. }
            | NodeKind::FieldDecl { name } => Some(*name),
            _ => None,
        }
    }
}

/// What a resolved name denotes.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum DeclRef {
    /// A declaration written in the program.
    Node(NodeId),
    /// A declaration provided by the host (builtins, `true`, `Int`, ...).
    Synthetic(Synthetic),
}

/// Host-provided declaration living in the root scope.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Synthetic {
    pub name: Name,
    pub kind: SyntheticKind,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum SyntheticKind {
    /// A root-scope variable seeded before the program runs.
    Variable,
    /// A builtin function, dispatched by name.
    Function,
    /// A builtin type name.
    Type,
}

/// Arena of all nodes of one program.
#[derive(Clone, Debug, Default)]
pub struct Ast {
    nodes: Vec<Node>,
}

impl Ast {
    pub fn new() -> Self {
        Ast { nodes: Vec::new() }
    }

    /// Append a node, returning its id.
    ///
    /// # Panics
    /// Panics if the arena exceeds `u32::MAX` nodes.
    pub fn alloc(&mut self, kind: NodeKind, span: Span) -> NodeId {
        let index = u32::try_from(self.nodes.len())
            .unwrap_or_else(|_| panic!("AST arena exceeded {} nodes", u32::MAX));
        self.nodes.push(Node { kind, span });
        NodeId::new(index)
    }

    /// Get a node by id.
    ///
    /// Ids are only ever produced by `alloc` on this arena.
    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    #[inline]
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    #[inline]
    pub fn span(&self, id: NodeId) -> Span {
        self.node(id).span
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Ast {
    /// Overwrite a node's kind. Used to close back-edges (a function body
    /// referring to the function itself) while building.
    pub(crate) fn set_kind(&mut self, id: NodeId, kind: NodeKind) {
        self.nodes[id.index()].kind = kind;
    }
}
