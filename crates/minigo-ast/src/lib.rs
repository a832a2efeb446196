// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Abstract syntax tree and shared front-end data for minigo.
//!
//! This crate defines the AST nodes, objects, scopes and semantic types
//! shared between the lexer, parser, type system, analyzer and code generator.

pub mod span;
pub mod token;
pub mod expr;
pub mod stmt;
pub mod decl;
pub mod object;
pub mod scope;
pub mod ty;
pub mod program;

pub use span::{FileId, LineMap, Span};
pub use object::{ObjId, Object, ObjKind, Storage, Variable};
pub use program::Program;
pub use ty::Type;

/// Unique identifier for AST nodes.
///
/// Used by semantic analysis passes to track resolution results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    pub const DUMMY: NodeId = NodeId(u32::MAX);
}
