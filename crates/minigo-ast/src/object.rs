// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Symbols (objects) and their resolved storage.

use crate::decl::{Param, Signature};
use crate::expr::Expr;
use crate::ty::Type;
use crate::Span;

/// Index of an object in `Program`'s arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjKind {
    Var,
    Const,
    Type,
    Func,
    Package,
}

/// A declared symbol.
#[derive(Debug, Clone)]
pub struct Object {
    pub kind: ObjKind,
    pub name: String,
    /// Declaring package; `None` for predeclared objects.
    pub pkg: Option<String>,
    pub decl: ObjDecl,
    pub span: Span,
    /// Storage, assigned once by semantic analysis.
    pub var: Option<Variable>,
    /// Set for types declared in a function body: the enclosing function and
    /// a per-run ordinal, e.g. `main.f#12`. Serialized type names use it in
    /// place of the package.
    pub qualifier: Option<String>,
}

/// What declared an object.
#[derive(Debug, Clone)]
pub enum ObjDecl {
    /// Predeclared basic type.
    Basic(BasicType),
    /// Predeclared builtin function.
    Builtin(Builtin),
    /// `true` / `false`
    Bool(bool),
    Nil,
    Iota,
    /// Variables, parameters and results. `ty` is absent when inferred.
    Var { ty: Option<Expr> },
    /// `value` is the explicit or inherited initializer of a grouped constant.
    Const { ty: Option<Expr>, value: Expr, iota: i64 },
    TypeName { ty: Expr },
    Func { recv: Option<Param>, sig: Signature },
    Package { path: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasicType {
    Int,
    Uint8,
    Uint16,
    Uintptr,
    Bool,
    String,
}

impl BasicType {
    pub fn name(self) -> &'static str {
        match self {
            BasicType::Int => "int",
            BasicType::Uint8 => "uint8",
            BasicType::Uint16 => "uint16",
            BasicType::Uintptr => "uintptr",
            BasicType::Bool => "bool",
            BasicType::String => "string",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Len,
    Cap,
    New,
    Make,
    Append,
    Panic,
    Print,
}

impl Builtin {
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Len => "len",
            Builtin::Cap => "cap",
            Builtin::New => "new",
            Builtin::Make => "make",
            Builtin::Append => "append",
            Builtin::Panic => "panic",
            Builtin::Print => "print",
        }
    }
}

/// A resolved storage location.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub storage: Storage,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Storage {
    /// Link-time symbol, e.g. `main.counter`.
    Global(String),
    /// Byte offset from the frame base: positive for parameters and results, negative for locals.
    Local(i64),
}

impl Variable {
    pub fn global(symbol: String, ty: Type) -> Self {
        Self { storage: Storage::Global(symbol), ty }
    }

    pub fn local(offset: i64, ty: Type) -> Self {
        Self { storage: Storage::Local(offset), ty }
    }
}
