// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! JSON diagnostic output for machine consumption.
//!
//! Each diagnostic is enriched with its file name, 1-based line and column
//! positions and the text of the lines it points at.

use serde::Serialize;

use minigo_ast::{Program, Span};

use crate::codes::ErrorCodeRegistry;
use crate::{Diagnostic, LabelStyle, Severity};

/// A complete JSON diagnostic report for a compilation run.
#[derive(Debug, Serialize)]
pub struct DiagnosticReport {
    /// Schema version.
    pub version: u32,
    pub success: bool,
    /// Stage that produced the diagnostics (`lex`, `parse`, `type`, ...).
    pub phase: String,
    pub diagnostics: Vec<JsonDiagnostic>,
    pub error_count: usize,
    pub warning_count: usize,
}

#[derive(Debug, Serialize)]
pub struct JsonDiagnostic {
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
    pub labels: Vec<JsonLabel>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub byte_offset: usize,
    pub source_line: String,
}

#[derive(Debug, Serialize)]
pub struct JsonLabel {
    pub role: LabelStyle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub start: SourceLocation,
    pub end: LineCol,
}

#[derive(Debug, Serialize)]
pub struct LineCol {
    pub line: usize,
    pub column: usize,
    pub byte_offset: usize,
}

/// Convert diagnostics to a structured JSON report.
pub fn to_json_report(diagnostics: &[Diagnostic], program: &Program, phase: &str) -> DiagnosticReport {
    let registry = ErrorCodeRegistry::default();
    let mut error_count = 0;
    let mut warning_count = 0;

    let diagnostics = diagnostics
        .iter()
        .map(|d| {
            match d.severity {
                Severity::Error => error_count += 1,
                Severity::Warning => warning_count += 1,
                Severity::Note => {}
            }
            to_json_diagnostic(d, program, &registry)
        })
        .collect();

    DiagnosticReport {
        version: 1,
        success: error_count == 0,
        phase: phase.to_string(),
        diagnostics,
        error_count,
        warning_count,
    }
}

fn to_json_diagnostic(diag: &Diagnostic, program: &Program, registry: &ErrorCodeRegistry) -> JsonDiagnostic {
    let code = diag.code.as_ref().map(|c| c.0.clone());
    let category = code.as_ref().and_then(|c| registry.get(c)).map(|info| info.category.to_string());

    let labels = diag
        .labels
        .iter()
        .filter_map(|l| {
            let start = locate(program, l.span, l.span.start)?;
            let end = locate(program, l.span, l.span.end)?;
            Some(JsonLabel {
                role: l.style,
                message: l.message.clone(),
                start,
                end: LineCol { line: end.line, column: end.column, byte_offset: end.byte_offset },
            })
        })
        .collect();

    JsonDiagnostic {
        severity: diag.severity,
        code,
        category,
        message: diag.message.clone(),
        location: diag.primary_span().and_then(|span| locate(program, span, span.start)),
        labels,
        notes: diag.notes.clone(),
        help: diag.help.clone(),
    }
}

fn locate(program: &Program, span: Span, offset: usize) -> Option<SourceLocation> {
    let file = program.source(span.file)?;
    let (line, column) = file.line_map.offset_to_line_col(offset);
    Some(SourceLocation {
        file: file.name.clone(),
        line: line as usize,
        column: column as usize,
        byte_offset: offset,
        source_line: file.line_map.line_text(&file.text, line).unwrap_or("").to_string(),
    })
}

/// Serialize a diagnostic report to pretty JSON.
pub fn to_json_string(report: &DiagnosticReport) -> String {
    serde_json::to_string_pretty(report).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
}
