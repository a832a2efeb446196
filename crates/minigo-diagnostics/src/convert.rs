// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Conversions from compiler error types to `Diagnostic`.

use minigo_parser::ParseErrorKind;
use minigo_types::TypeErrorKind;
use minigo_walk::WalkErrorKind;

use crate::codes::{CODEGEN, LEXICAL, SCOPE, SYNTAX, TYPE, UNSUPPORTED};
use crate::{Diagnostic, ToDiagnostic};

// ============================================================================
// Lex Errors
// ============================================================================

impl ToDiagnostic for minigo_lexer::LexError {
    fn to_diagnostic(&self) -> Diagnostic {
        let mut diag = Diagnostic::error(&self.message)
            .with_code(LEXICAL)
            .with_primary(self.span, "unexpected character");

        if let Some(ref hint) = self.hint {
            diag = diag.with_help(hint.as_str());
        }

        diag
    }
}

// ============================================================================
// Parse Errors
// ============================================================================

impl ToDiagnostic for minigo_parser::ParseError {
    fn to_diagnostic(&self) -> Diagnostic {
        let (code, label) = match self.kind {
            ParseErrorKind::Syntax => (SYNTAX, "here"),
            ParseErrorKind::Unresolved => (SCOPE, "not found in any enclosing scope"),
            ParseErrorKind::Unsupported => (UNSUPPORTED, "not supported"),
        };
        let mut diag = Diagnostic::error(&self.message)
            .with_code(code)
            .with_primary(self.span, label)
            .with_note(format!("while parsing {}", self.rule));

        if let Some(ref hint) = self.hint {
            diag = diag.with_help(hint.as_str());
        }

        diag
    }
}

// ============================================================================
// Type Errors
// ============================================================================

impl ToDiagnostic for minigo_types::TypeError {
    fn to_diagnostic(&self) -> Diagnostic {
        let code = match self.kind {
            TypeErrorKind::Unsupported { .. } => UNSUPPORTED,
            _ => TYPE,
        };
        let diag = Diagnostic::error(self.kind.to_string()).with_code(code).with_primary(self.span, "here");

        match &self.kind {
            TypeErrorKind::RecursiveType { .. } => {
                diag.with_help("break the cycle with a pointer, slice or interface field")
            }
            TypeErrorKind::ConstCycle { .. } => diag.with_note("constants may not depend on themselves"),
            _ => diag,
        }
    }
}

// ============================================================================
// Semantic Errors
// ============================================================================

impl ToDiagnostic for minigo_walk::WalkError {
    fn to_diagnostic(&self) -> Diagnostic {
        if let WalkErrorKind::Type(inner) = &self.kind {
            return inner.to_diagnostic();
        }
        let code = if self.is_unsupported() { UNSUPPORTED } else { TYPE };
        let label = match &self.kind {
            WalkErrorKind::Mismatch { expected, .. } => format!("expected {}", expected),
            WalkErrorKind::ArgumentCount { expected, .. } => format!("takes {} arguments", expected),
            WalkErrorKind::NotAddressable { .. } => "not addressable".to_string(),
            WalkErrorKind::NotAssignable { .. } => "not assignable".to_string(),
            WalkErrorKind::IndexOutOfRange { len, .. } => format!("array has {} elements", len),
            _ => "here".to_string(),
        };
        let diag = Diagnostic::error(self.kind.to_string()).with_code(code).with_primary(self.span, label);

        match &self.kind {
            WalkErrorKind::UntypedNil => diag.with_help("give the value an explicit type"),
            WalkErrorKind::InitCycle { .. } => diag.with_note("package variables are initialized in dependency order"),
            WalkErrorKind::BranchOutside { .. } => diag.with_note("labels are not supported"),
            _ => diag,
        }
    }
}

// ============================================================================
// Codegen Errors
// ============================================================================

impl ToDiagnostic for minigo_codegen::CodegenError {
    fn to_diagnostic(&self) -> Diagnostic {
        let mut diag = Diagnostic::error(self.to_string()).with_code(CODEGEN);
        if let Some(span) = self.span() {
            diag = diag.with_primary(span, format!("in {}", self.func()));
        }
        diag.with_note("the program passed analysis; this is a compiler limitation")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minigo_ast::{FileId, Span};
    use minigo_codegen::CodegenError;
    use minigo_parser::ParseError;
    use minigo_types::TypeError;
    use minigo_walk::WalkError;

    fn span(start: usize, end: usize) -> Span {
        Span::new(FileId(0), start, end)
    }

    fn code(diag: &Diagnostic) -> &str {
        diag.code.as_ref().map(|c| c.0.as_str()).unwrap_or("")
    }

    #[test]
    fn parse_error_kinds_map_to_stage_codes() {
        let make = |kind| ParseError {
            kind,
            span: span(3, 5),
            rule: "statement",
            message: "boom".to_string(),
            hint: Some("try this".to_string()),
        };
        let syntax = make(ParseErrorKind::Syntax).to_diagnostic();
        assert_eq!(code(&syntax), SYNTAX);
        assert_eq!(syntax.help.as_deref(), Some("try this"));
        assert_eq!(syntax.notes, vec!["while parsing statement".to_string()]);
        assert_eq!(code(&make(ParseErrorKind::Unresolved).to_diagnostic()), SCOPE);
        assert_eq!(code(&make(ParseErrorKind::Unsupported).to_diagnostic()), UNSUPPORTED);
        assert_eq!(syntax.primary_span(), Some(span(3, 5)));
    }

    #[test]
    fn walk_errors_unwrap_type_errors() {
        let inner = TypeError::new(TypeErrorKind::RecursiveType { name: "T".to_string() }, span(0, 1));
        let diag = WalkError::from(inner).to_diagnostic();
        assert_eq!(code(&diag), TYPE);
        assert_eq!(diag.message, "invalid recursive type T");
        assert!(diag.help.is_some());

        let unsupported = WalkError::unsupported("maps", span(2, 4)).to_diagnostic();
        assert_eq!(code(&unsupported), UNSUPPORTED);

        let mismatch = WalkError::mismatch("int".to_string(), "string".to_string(), span(1, 2)).to_diagnostic();
        assert_eq!(mismatch.labels[0].message.as_deref(), Some("expected int"));

        let bounds = WalkError::new(WalkErrorKind::IndexOutOfRange { index: 5, len: 3 }, span(4, 5)).to_diagnostic();
        assert_eq!(code(&bounds), TYPE);
        assert_eq!(bounds.message, "invalid argument: index 5 out of bounds [0:3]");
        assert_eq!(bounds.labels[0].message.as_deref(), Some("array has 3 elements"));
    }

    #[test]
    fn codegen_errors_without_span_have_no_label() {
        let err = CodegenError::StackImbalance { func: "main.f".to_string(), expected: 0, found: 1 };
        let diag = err.to_diagnostic();
        assert_eq!(code(&diag), CODEGEN);
        assert!(diag.labels.is_empty());
        assert!(diag.message.starts_with("main.f:"));
    }
}
