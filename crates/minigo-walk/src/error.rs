// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Semantic analysis error types.

use minigo_ast::Span;
use minigo_types::TypeError;
use thiserror::Error;

/// A semantic error: a well-formed program the analyzer can't give meaning to.
#[derive(Debug, Clone, Error)]
#[error("{kind}")]
pub struct WalkError {
    pub kind: WalkErrorKind,
    pub span: Span,
}

pub type WalkResult<T> = Result<T, WalkError>;

impl WalkError {
    pub fn new(kind: WalkErrorKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn mismatch(expected: String, found: String, span: Span) -> Self {
        Self::new(WalkErrorKind::Mismatch { expected, found }, span)
    }

    pub fn invalid_op(op: &str, operand: String, span: Span) -> Self {
        Self::new(WalkErrorKind::InvalidOperation { op: op.to_string(), operand }, span)
    }

    pub fn unsupported(what: impl Into<String>, span: Span) -> Self {
        Self::new(WalkErrorKind::Unsupported { what: what.into() }, span)
    }

    pub fn cannot_infer(what: impl Into<String>, span: Span) -> Self {
        Self::new(WalkErrorKind::CannotInfer { what: what.into() }, span)
    }

    /// Whether this error reports a construct outside the supported language.
    pub fn is_unsupported(&self) -> bool {
        match &self.kind {
            WalkErrorKind::Unsupported { .. } => true,
            WalkErrorKind::Type(e) => matches!(e.kind, minigo_types::TypeErrorKind::Unsupported { .. }),
            _ => false,
        }
    }
}

impl From<TypeError> for WalkError {
    fn from(e: TypeError) -> Self {
        let span = e.span;
        Self::new(WalkErrorKind::Type(e), span)
    }
}

/// The kind of semantic error.
#[derive(Debug, Clone, Error)]
pub enum WalkErrorKind {
    #[error(transparent)]
    Type(TypeError),

    #[error("cannot use {found} as {expected} value")]
    Mismatch { expected: String, found: String },

    #[error("invalid operation: mismatched types {left} and {right} for {op}")]
    MismatchedTypes { op: String, left: String, right: String },

    #[error("invalid operation: operator {op} not defined on {operand}")]
    InvalidOperation { op: String, operand: String },

    #[error("cannot infer type of {what}")]
    CannotInfer { what: String },

    #[error("use of untyped nil")]
    UntypedNil,

    #[error("{what} used as value")]
    NoValue { what: String },

    #[error("cannot take the address of {what}")]
    NotAddressable { what: String },

    #[error("cannot assign to {what}")]
    NotAssignable { what: String },

    #[error("index {found} out of bounds for array of length {len}")]
    TooManyElements { len: u64, found: usize },

    #[error("invalid argument: index {index} out of bounds [0:{len}]")]
    IndexOutOfRange { index: i64, len: u64 },

    #[error("invalid argument: index {index} must not be negative")]
    NegativeIndex { index: i64 },

    #[error("{what} is not callable")]
    NotCallable { what: String },

    #[error("wrong number of arguments in call to {name}: have {found}, want {expected}")]
    ArgumentCount { name: String, expected: usize, found: usize },

    #[error("assignment mismatch: {lhs} variables but {rhs} values")]
    AssignmentCount { lhs: usize, rhs: usize },

    #[error("wrong number of return values: have {found}, want {expected}")]
    ReturnCount { expected: usize, found: usize },

    #[error("{what} is not an interface")]
    NotInterface { what: String },

    #[error("cannot range over {ty}")]
    NotRangeable { ty: String },

    #[error("cannot convert {from} to {to}")]
    InvalidConversion { from: String, to: String },

    #[error("method {ty}.{name} already declared")]
    DuplicateMethod { ty: String, name: String },

    #[error("invalid receiver type {ty}")]
    InvalidReceiver { ty: String },

    #[error("undefined: {package}.{name}")]
    UndefinedQualified { package: String, name: String },

    #[error("initialization cycle involving {name}")]
    InitCycle { name: String },

    #[error("{stmt} is not in a loop{}", if *or_switch { " or switch" } else { "" })]
    BranchOutside { stmt: String, or_switch: bool },

    #[error("unsupported: {what}")]
    Unsupported { what: String },
}
