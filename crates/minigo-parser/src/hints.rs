// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Error hints - suggestions for fixing common mistakes.
//!
//! Kept separate from the main parser to avoid clutter.

use minigo_ast::token::TokenKind;

/// Get a hint for an "expected X" error based on context.
pub fn for_expected(expected: &str, found: &TokenKind) -> Option<&'static str> {
    match (expected, found) {
        // Block hints
        ("'{'", TokenKind::Semi { inserted: true }) => {
            Some("the opening '{' must be on the same line as the statement")
        }
        ("'{'", _) => Some("blocks start with '{'"),
        ("'}'", _) => Some("every '{' needs a matching '}'"),

        // Parentheses hints
        ("')'", TokenKind::Eof) => Some("add ')' to close the parenthesis"),
        ("')'", TokenKind::Semi { inserted: true }) => {
            Some("a line break here ends the statement; add a trailing ','")
        }

        // Bracket hints
        ("']'", TokenKind::Eof) => Some("add ']' to close the bracket"),

        // Expression hints
        ("expression", TokenKind::Eq) => Some("put the value after '='"),
        ("expression", TokenKind::Semi { .. }) => Some("statement is incomplete"),
        ("expression", _) => Some("try a value, variable, or function call"),

        // Name hints
        ("a name", TokenKind::Int(_)) => Some("names can't start with a number"),
        ("a name", _) => Some("names start with a letter or '_'"),

        ("import path", _) => Some("import paths are quoted strings like \"os\""),

        ("type", _) => Some("try a type like 'int', 'string', '[]byte' or a type name"),

        ("declaration", _) => Some("top-level code starts with 'var', 'const', 'type' or 'func'"),

        // Statement terminator
        ("';' or newline", _) => Some("end statements with a newline or ';'"),

        _ => None,
    }
}

/// Suggestion shown next to an unsupported construct.
pub fn for_unsupported(construct: &str) -> Option<&'static str> {
    match construct {
        "map types" => Some("use a slice of key/value structs"),
        "goroutines" | "channel types" | "channel operations" | "select statements" => {
            Some("programs are single-threaded")
        }
        "defer statements" => Some("call the cleanup function explicitly before each return"),
        "labels" | "goto statements" => Some("restructure the loop with a flag variable"),
        "fallthrough statements" => Some("list every matching value in one 'case'"),
        "function literals" | "function types" => Some("declare a named top-level function"),
        "variadic parameters" | "variadic arguments" => Some("pass a slice instead"),
        "embedded struct fields" => Some("give the field an explicit name"),
        _ => None,
    }
}
