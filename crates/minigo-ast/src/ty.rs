// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Semantic types and struct layouts.
//!
//! A `Type` is derived from a type expression; queries over it live in
//! `minigo-types`.

use crate::object::ObjId;
use crate::NodeId;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// A predeclared basic type or a declared type name.
    Named(ObjId),
    Pointer(Box<Type>),
    Slice(Box<Type>),
    Array { len: u64, elem: Box<Type> },
    /// Structural struct type, identified by its `struct{...}` expression.
    Struct(NodeId),
    /// The empty interface.
    Interface,
    /// Result list of a multi-value call.
    Tuple(Vec<Type>),
    /// The untyped `nil`.
    Nil,
}

impl Type {
    pub fn pointer_to(elem: Type) -> Type {
        Type::Pointer(Box::new(elem))
    }

    pub fn slice_of(elem: Type) -> Type {
        Type::Slice(Box::new(elem))
    }
}

/// Byte layout of a struct type. No padding between fields.
#[derive(Debug, Clone)]
pub struct StructLayout {
    pub fields: Vec<FieldLayout>,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct FieldLayout {
    pub name: String,
    pub ty: Type,
    pub offset: u64,
    pub size: u64,
}

impl StructLayout {
    pub fn field(&self, name: &str) -> Option<&FieldLayout> {
        self.fields.iter().find(|f| f.name == name)
    }
}
