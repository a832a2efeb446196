// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! The error of a whole compilation run.

use minigo_ast::Span;
use minigo_codegen::CodegenError;
use minigo_diagnostics::codes::SYNTAX;
use minigo_diagnostics::{Diagnostic, ToDiagnostic};
use minigo_lexer::LexError;
use minigo_parser::{ParseError, ParseErrorKind};
use minigo_walk::WalkError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Walk(#[from] WalkError),

    #[error(transparent)]
    Codegen(#[from] CodegenError),

    #[error("{file} declares package {found}, expected {expected}")]
    PackageMismatch { file: String, expected: String, found: String, span: Span },

    #[error("package {name} has no source files")]
    EmptyPackage { name: String },
}

impl CompileError {
    /// Name of the stage that rejected the program.
    pub fn stage(&self) -> &'static str {
        match self {
            CompileError::Lex(_) => "lex",
            CompileError::Parse(e) => match e.kind {
                ParseErrorKind::Syntax => "parse",
                ParseErrorKind::Unresolved => "scope",
                ParseErrorKind::Unsupported => "unsupported",
            },
            CompileError::Walk(e) if e.is_unsupported() => "unsupported",
            CompileError::Walk(_) => "type",
            CompileError::Codegen(_) => "codegen",
            CompileError::PackageMismatch { .. } | CompileError::EmptyPackage { .. } => "parse",
        }
    }
}

impl ToDiagnostic for CompileError {
    fn to_diagnostic(&self) -> Diagnostic {
        match self {
            CompileError::Lex(e) => e.to_diagnostic(),
            CompileError::Parse(e) => e.to_diagnostic(),
            CompileError::Walk(e) => e.to_diagnostic(),
            CompileError::Codegen(e) => e.to_diagnostic(),
            CompileError::PackageMismatch { expected, span, .. } => Diagnostic::error(self.to_string())
                .with_code(SYNTAX)
                .with_primary(*span, format!("expected package {}", expected))
                .with_note("all files of a package must share its package clause"),
            CompileError::EmptyPackage { .. } => Diagnostic::error(self.to_string()).with_code(SYNTAX),
        }
    }
}
