// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Declaration AST nodes.

use crate::expr::{Expr, Name};
use crate::span::FileId;
use crate::stmt::Block;
use crate::{NodeId, Span};

/// One parsed source file.
#[derive(Debug, Clone)]
pub struct File {
    pub id: FileId,
    pub package: Name,
    pub imports: Vec<ImportSpec>,
    pub decls: Vec<Decl>,
}

/// `import alias "path"`
#[derive(Debug, Clone)]
pub struct ImportSpec {
    /// Name the package is bound to in this file.
    pub name: Name,
    pub path: String,
    pub span: Span,
}

/// A declaration in the AST. Grouped `var (...)` forms are flattened.
#[derive(Debug, Clone)]
pub struct Decl {
    pub id: NodeId,
    pub kind: DeclKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum DeclKind {
    Var(ValueSpec),
    Const(ValueSpec),
    Type(TypeSpec),
    Func(FuncDecl),
}

/// `names [ty] [= values]`
#[derive(Debug, Clone)]
pub struct ValueSpec {
    pub names: Vec<Name>,
    pub ty: Option<Expr>,
    pub values: Vec<Expr>,
}

/// `type Name ty`
#[derive(Debug, Clone)]
pub struct TypeSpec {
    pub name: Name,
    pub ty: Expr,
}

#[derive(Debug, Clone)]
pub struct FuncDecl {
    pub recv: Option<Param>,
    pub name: Name,
    pub sig: Signature,
    /// `None` for body-less declarations implemented elsewhere.
    pub body: Option<Block>,
}

/// Parameters and results of a function, one entry per declared name.
#[derive(Debug, Clone, Default)]
pub struct Signature {
    pub params: Vec<Param>,
    pub results: Vec<Param>,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: Option<Name>,
    pub ty: Expr,
}

impl DeclKind {
    pub fn describe(&self) -> &'static str {
        match self {
            DeclKind::Var(_) => "var declaration",
            DeclKind::Const(_) => "const declaration",
            DeclKind::Type(_) => "type declaration",
            DeclKind::Func(_) => "func declaration",
        }
    }
}
