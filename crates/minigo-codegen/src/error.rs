// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Code generation errors.
//!
//! Every variant names the function being emitted. Analysis has already
//! accepted the program, so these report constructs the emitter has no
//! lowering for or side tables that are missing an entry.

use minigo_ast::Span;
use minigo_types::TypeError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum CodegenError {
    #[error("{func}: no type recorded for {what}")]
    MissingType { func: String, what: String, span: Span },

    #[error("{func}: {what} is not bound to storage")]
    Unbound { func: String, what: String, span: Span },

    #[error("{func}: cannot emit {what}")]
    Unsupported { func: String, what: String, span: Span },

    #[error("{func}: operand stack holds {found} words, expected {expected}")]
    StackImbalance { func: String, expected: i64, found: i64 },

    #[error("{func}: {source}")]
    Type {
        func: String,
        #[source]
        source: TypeError,
    },
}

impl CodegenError {
    /// Source location of the offending construct, when known.
    pub fn span(&self) -> Option<Span> {
        match self {
            CodegenError::MissingType { span, .. }
            | CodegenError::Unbound { span, .. }
            | CodegenError::Unsupported { span, .. } => Some(*span),
            CodegenError::Type { source, .. } => Some(source.span),
            CodegenError::StackImbalance { .. } => None,
        }
    }

    pub fn func(&self) -> &str {
        match self {
            CodegenError::MissingType { func, .. }
            | CodegenError::Unbound { func, .. }
            | CodegenError::Unsupported { func, .. }
            | CodegenError::StackImbalance { func, .. }
            | CodegenError::Type { func, .. } => func,
        }
    }
}

pub type CodegenResult<T> = Result<T, CodegenError>;
