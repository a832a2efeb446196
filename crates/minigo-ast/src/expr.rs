// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Expression AST nodes.
//!
//! Type expressions share this tree: `[]T`, `*T`, `struct{...}` and
//! `interface{}` are ordinary expressions until the type system reads them.

use crate::{NodeId, Span};

/// An expression in the AST.
#[derive(Debug, Clone)]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
    pub span: Span,
}

/// The kind of expression.
#[derive(Debug, Clone)]
pub enum ExprKind {
    /// Identifier; its binding lives in `Program::resolutions` under this node's id.
    Ident(String),
    /// Integer, character or string literal, raw text preserved.
    BasicLit { kind: LitKind, raw: String },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    /// Function call, method call, conversion or builtin call.
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
    },
    /// `x.name`
    Selector {
        object: Box<Expr>,
        field: String,
    },
    /// `x[i]`
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    /// `x[low:high:max]`
    Slice {
        object: Box<Expr>,
        low: Option<Box<Expr>>,
        high: Option<Box<Expr>>,
        max: Option<Box<Expr>>,
    },
    /// `*x`: dereference, or pointer type in type position.
    Star(Box<Expr>),
    /// `T{...}`; `ty` is `None` for elided element literals.
    CompositeLit {
        ty: Option<Box<Expr>>,
        elts: Vec<Expr>,
    },
    /// `key: value` inside a composite literal.
    KeyValue {
        key: Box<Expr>,
        value: Box<Expr>,
    },
    Paren(Box<Expr>),
    /// `x.(T)`, or `x.(type)` in a type switch header when `ty` is `None`.
    TypeAssert {
        object: Box<Expr>,
        ty: Option<Box<Expr>>,
    },
    /// `[N]T`, or `[]T` when `len` is `None`.
    ArrayType {
        len: Option<Box<Expr>>,
        elem: Box<Expr>,
    },
    StructType(Vec<Field>),
    /// Only the empty interface is representable.
    InterfaceType,
}

/// A field group in a struct type: `X, Y int`, or an embedded `T` when `names` is empty.
#[derive(Debug, Clone)]
pub struct Field {
    pub names: Vec<Name>,
    pub ty: Expr,
}

/// A declared name (defining occurrence of an identifier).
#[derive(Debug, Clone)]
pub struct Name {
    pub id: NodeId,
    pub name: String,
    pub span: Span,
}

impl Name {
    pub fn is_blank(&self) -> bool {
        self.name == "_"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LitKind {
    Int,
    Char,
    String,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitAnd,
    BitOr,
    BitXor,
    AndNot,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
}

impl BinOp {
    pub fn is_comparison(self) -> bool {
        matches!(self, BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge)
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinOp::And | BinOp::Or)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::AndNot => "&^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }
}

/// Unary operators. Dereference is `ExprKind::Star`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `+x`
    Plus,
    /// `-x`
    Neg,
    /// `!x`
    Not,
    /// `^x`
    BitNot,
    /// `&x`
    Addr,
}

impl Expr {
    /// Strip any number of enclosing parentheses.
    pub fn unparen(&self) -> &Expr {
        let mut e = self;
        while let ExprKind::Paren(inner) = &e.kind {
            e = inner;
        }
        e
    }

    /// Short description of the node shape for error messages.
    pub fn describe(&self) -> &'static str {
        match &self.kind {
            ExprKind::Ident(_) => "identifier",
            ExprKind::BasicLit { .. } => "literal",
            ExprKind::Binary { .. } => "binary expression",
            ExprKind::Unary { .. } => "unary expression",
            ExprKind::Call { .. } => "call expression",
            ExprKind::Selector { .. } => "selector expression",
            ExprKind::Index { .. } => "index expression",
            ExprKind::Slice { .. } => "slice expression",
            ExprKind::Star(_) => "star expression",
            ExprKind::CompositeLit { .. } => "composite literal",
            ExprKind::KeyValue { .. } => "key-value expression",
            ExprKind::Paren(_) => "parenthesized expression",
            ExprKind::TypeAssert { .. } => "type assertion",
            ExprKind::ArrayType { .. } => "array type",
            ExprKind::StructType(_) => "struct type",
            ExprKind::InterfaceType => "interface type",
        }
    }
}
