// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Type system error types.

use minigo_ast::Span;
use thiserror::Error;

/// A type error: a type expression or operation with no defined meaning.
#[derive(Debug, Clone, Error)]
#[error("{kind}")]
pub struct TypeError {
    pub kind: TypeErrorKind,
    pub span: Span,
}

impl TypeError {
    pub fn new(kind: TypeErrorKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn not_a_type(what: impl Into<String>, span: Span) -> Self {
        Self::new(TypeErrorKind::NotAType { what: what.into() }, span)
    }

    pub fn unsupported(what: impl Into<String>, span: Span) -> Self {
        Self::new(TypeErrorKind::Unsupported { what: what.into() }, span)
    }

    /// Attach a location to an error raised on a span-less `Type`.
    pub fn at(mut self, span: Span) -> Self {
        if self.span == Span::default() {
            self.span = span;
        }
        self
    }
}

/// The kind of type error.
#[derive(Debug, Clone, Error)]
pub enum TypeErrorKind {
    #[error("{what} is not a type")]
    NotAType { what: String },

    #[error("undefined: {package}.{name}")]
    UndefinedQualified { package: String, name: String },

    #[error("invalid recursive type {name}")]
    RecursiveType { name: String },

    #[error("array length {found} must be a non-negative integer constant")]
    InvalidArrayLength { found: String },

    #[error("{ty} has no field or method {field}")]
    NoField { ty: String, field: String },

    #[error("cannot index {ty}")]
    NotIndexable { ty: String },

    #[error("{what} is not a constant")]
    NotConstant { what: String },

    #[error("initialization cycle for constant {name}")]
    ConstCycle { name: String },

    #[error("division by zero in constant expression")]
    DivisionByZero,

    #[error("invalid literal {raw}: {reason}")]
    InvalidLiteral { raw: String, reason: String },

    #[error("operator {op} not defined on {operand}")]
    InvalidOperation { op: String, operand: String },

    #[error("type {ty} is too large")]
    TooLarge { ty: String },

    #[error("unsupported type: {what}")]
    Unsupported { what: String },
}
