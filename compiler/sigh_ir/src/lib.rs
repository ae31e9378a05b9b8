//! Sigh IR - input representation for the Sigh interpreter.
//!
//! The evaluator consumes an already-analysed program:
//! - [`Ast`]: flat node arena addressed by [`NodeId`]
//! - [`SemanticInfo`]: per-node scope, type and declaration attributes
//! - [`StringInterner`]: identifiers as [`Name`]s
//!
//! [`ProgramBuilder`] assembles all three in memory, standing in for the
//! parser and the analysis pass.

mod ast;
mod builder;
mod ids;
mod interner;
mod operators;
mod program;
mod semantic;
mod span;
mod types;

pub use ast::{Ast, DeclRef, Node, NodeKind, Synthetic, SyntheticKind};
pub use builder::{BuildError, ProgramBuilder};
pub use ids::{NodeId, ScopeId};
pub use interner::{InternError, Name, StringInterner};
pub use operators::{BinaryOp, UnaryOp};
pub use program::{Program, SharedProgram};
pub use semantic::{AttributeTable, SemanticInfo};
pub use span::Span;
pub use types::Type;
