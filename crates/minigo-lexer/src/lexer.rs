// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! The lexer implementation using logos.

use logos::Logos;
use minigo_ast::token::{Token, TokenKind};
use minigo_ast::{FileId, Span};

/// Raw token type for logos. Keywords are split from identifiers afterwards.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r]+")]
enum RawToken {
    // === Operators (longest match wins) ===
    #[token("<<=")]
    LtLtEq,
    #[token(">>=")]
    GtGtEq,
    #[token("&^=")]
    AmpCaretEq,
    #[token("...")]
    Ellipsis,

    #[token("&^")]
    AmpCaret,
    #[token("<<")]
    LtLt,
    #[token(">>")]
    GtGt,
    #[token("+=")]
    PlusEq,
    #[token("-=")]
    MinusEq,
    #[token("*=")]
    StarEq,
    #[token("/=")]
    SlashEq,
    #[token("%=")]
    PercentEq,
    #[token("&=")]
    AmpEq,
    #[token("|=")]
    PipeEq,
    #[token("^=")]
    CaretEq,
    #[token("&&")]
    AmpAmp,
    #[token("||")]
    PipePipe,
    #[token("<-")]
    Arrow,
    #[token("++")]
    PlusPlus,
    #[token("--")]
    MinusMinus,
    #[token("==")]
    EqEq,
    #[token("!=")]
    BangEq,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token(":=")]
    ColonEq,

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("=")]
    Eq,
    #[token("!")]
    Bang,
    #[token("~")]
    Tilde,

    // === Delimiters ===
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token(":")]
    Colon,
    #[token(";")]
    Semi,

    // === Newline (may become a terminator) ===
    #[token("\n")]
    Newline,

    // === Comments ===
    #[regex(r"//[^\n]*", logos::skip)]
    LineComment,

    /// Carries whether the comment spans a line break.
    #[token("/*", block_comment)]
    BlockComment(bool),

    // === Literals ===
    #[regex(r"0[xX][0-9a-fA-F_]+")]
    #[regex(r"0[bB][01_]+")]
    #[regex(r"0[oO][0-7_]+")]
    #[regex(r"[0-9][0-9_]*")]
    Int,

    #[regex(r"'([^'\\\n]|\\[^\n])+'")]
    Char,

    #[regex(r#""([^"\\\n]|\\[^\n])*""#)]
    String,

    #[regex(r"`[^`]*`")]
    RawString,

    // === Identifier or keyword ===
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Ident,
}

/// Skip a block comment; `None` when unterminated.
fn block_comment(lexer: &mut logos::Lexer<RawToken>) -> Option<bool> {
    let remainder = lexer.remainder();
    let end = remainder.find("*/")?;
    let has_newline = remainder[..end].contains('\n');
    lexer.bump(end + 2);
    Some(has_newline)
}

/// The lexer for minigo source code.
///
/// `next_token` yields one token at a time. A newline becomes a
/// `Semi { inserted: true }` token only when the previous token can end a
/// statement; otherwise it is skipped like other whitespace.
pub struct Lexer<'a> {
    source: &'a str,
    file: FileId,
    raw: logos::Lexer<'a, RawToken>,
    insert_semi: bool,
    at_eof: bool,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given source code.
    pub fn new(source: &'a str, file: FileId) -> Self {
        Self {
            source,
            file,
            raw: RawToken::lexer(source),
            insert_semi: false,
            at_eof: false,
        }
    }

    /// Tokenize the entire source. The first lexical error aborts.
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        log::trace!("lexed {} tokens from file {}", tokens.len(), self.file.0);
        Ok(tokens)
    }

    /// Produce the next token.
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        loop {
            if self.at_eof {
                let end = self.source.len();
                return Ok(self.token(TokenKind::Eof, end, end));
            }

            let Some(result) = self.raw.next() else {
                self.at_eof = true;
                if self.insert_semi {
                    self.insert_semi = false;
                    let end = self.source.len();
                    return Ok(self.token(TokenKind::Semi { inserted: true }, end, end));
                }
                continue;
            };

            let span = self.raw.span();
            let raw = match result {
                Ok(raw) => raw,
                Err(()) => {
                    let byte = self.source.as_bytes().get(span.start).copied().unwrap_or(0);
                    return Err(LexError::unexpected_byte(byte, self.file, span.start));
                }
            };

            match raw {
                RawToken::Newline | RawToken::BlockComment(true) => {
                    if self.insert_semi {
                        self.insert_semi = false;
                        return Ok(self.token(TokenKind::Semi { inserted: true }, span.start, span.start));
                    }
                }
                RawToken::BlockComment(false) | RawToken::LineComment => {}
                other => {
                    let kind = self.convert_token(other, self.raw.slice());
                    self.insert_semi = kind.ends_statement();
                    return Ok(self.token(kind, span.start, span.end));
                }
            }
        }
    }

    fn token(&self, kind: TokenKind, start: usize, end: usize) -> Token {
        Token { kind, span: Span::new(self.file, start, end) }
    }

    /// Convert a raw logos token to our TokenKind.
    fn convert_token(&self, raw: RawToken, slice: &str) -> TokenKind {
        match raw {
            RawToken::LtLtEq => TokenKind::LtLtEq,
            RawToken::GtGtEq => TokenKind::GtGtEq,
            RawToken::AmpCaretEq => TokenKind::AmpCaretEq,
            RawToken::Ellipsis => TokenKind::Ellipsis,
            RawToken::AmpCaret => TokenKind::AmpCaret,
            RawToken::LtLt => TokenKind::LtLt,
            RawToken::GtGt => TokenKind::GtGt,
            RawToken::PlusEq => TokenKind::PlusEq,
            RawToken::MinusEq => TokenKind::MinusEq,
            RawToken::StarEq => TokenKind::StarEq,
            RawToken::SlashEq => TokenKind::SlashEq,
            RawToken::PercentEq => TokenKind::PercentEq,
            RawToken::AmpEq => TokenKind::AmpEq,
            RawToken::PipeEq => TokenKind::PipeEq,
            RawToken::CaretEq => TokenKind::CaretEq,
            RawToken::AmpAmp => TokenKind::AmpAmp,
            RawToken::PipePipe => TokenKind::PipePipe,
            RawToken::Arrow => TokenKind::Arrow,
            RawToken::PlusPlus => TokenKind::PlusPlus,
            RawToken::MinusMinus => TokenKind::MinusMinus,
            RawToken::EqEq => TokenKind::EqEq,
            RawToken::BangEq => TokenKind::BangEq,
            RawToken::LtEq => TokenKind::LtEq,
            RawToken::GtEq => TokenKind::GtEq,
            RawToken::ColonEq => TokenKind::ColonEq,
            RawToken::Plus => TokenKind::Plus,
            RawToken::Minus => TokenKind::Minus,
            RawToken::Star => TokenKind::Star,
            RawToken::Slash => TokenKind::Slash,
            RawToken::Percent => TokenKind::Percent,
            RawToken::Amp => TokenKind::Amp,
            RawToken::Pipe => TokenKind::Pipe,
            RawToken::Caret => TokenKind::Caret,
            RawToken::Lt => TokenKind::Lt,
            RawToken::Gt => TokenKind::Gt,
            RawToken::Eq => TokenKind::Eq,
            RawToken::Bang => TokenKind::Bang,
            RawToken::Tilde => TokenKind::Tilde,
            RawToken::LParen => TokenKind::LParen,
            RawToken::RParen => TokenKind::RParen,
            RawToken::LBracket => TokenKind::LBracket,
            RawToken::RBracket => TokenKind::RBracket,
            RawToken::LBrace => TokenKind::LBrace,
            RawToken::RBrace => TokenKind::RBrace,
            RawToken::Comma => TokenKind::Comma,
            RawToken::Dot => TokenKind::Dot,
            RawToken::Colon => TokenKind::Colon,
            RawToken::Semi => TokenKind::Semi { inserted: false },
            RawToken::Int => TokenKind::Int(slice.to_string()),
            RawToken::Char => TokenKind::Char(slice.to_string()),
            RawToken::String | RawToken::RawString => TokenKind::String(slice.to_string()),
            RawToken::Ident => TokenKind::keyword(slice).unwrap_or_else(|| TokenKind::Ident(slice.to_string())),
            // Handled in next_token before conversion
            RawToken::Newline | RawToken::LineComment | RawToken::BlockComment(_) => TokenKind::Semi { inserted: true },
        }
    }
}

/// A lexer error with location and friendly message.
#[derive(Debug, Clone)]
pub struct LexError {
    pub span: Span,
    pub message: String,
    pub hint: Option<String>,
}

impl std::fmt::Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for LexError {}

impl LexError {
    fn unexpected_byte(byte: u8, file: FileId, pos: usize) -> Self {
        let shown = if byte.is_ascii_graphic() {
            format!("'{}'", byte as char)
        } else {
            format!("0x{:02x}", byte)
        };
        let hint = match byte {
            b'"' | b'\'' => Some("literal is not terminated on this line".to_string()),
            b'/' => Some("block comment is not terminated".to_string()),
            _ => None,
        };
        Self {
            span: Span::new(file, pos, pos + 1),
            message: format!("unexpected byte {} at offset {}", shown, pos),
            hint,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src, FileId(0))
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    const SEMI: TokenKind = TokenKind::Semi { inserted: true };

    #[test]
    fn newline_after_ident_becomes_terminator() {
        assert_eq!(
            kinds("x\ny"),
            vec![
                TokenKind::Ident("x".into()),
                SEMI,
                TokenKind::Ident("y".into()),
                SEMI,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn newline_after_operator_is_whitespace() {
        assert_eq!(
            kinds("a +\nb"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Plus,
                TokenKind::Ident("b".into()),
                SEMI,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn terminators_after_keywords_and_closers() {
        let toks = kinds("return\nbreak\n}\n)\nx++\n");
        let semis = toks.iter().filter(|k| **k == SEMI).count();
        assert_eq!(semis, 5);
        // `func` does not end a statement
        assert_eq!(kinds("func\n"), vec![TokenKind::Func, TokenKind::Eof]);
    }

    #[test]
    fn maximal_munch_operators() {
        assert_eq!(
            kinds("a &^= b <<= c := d ..."),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::AmpCaretEq,
                TokenKind::Ident("b".into()),
                TokenKind::LtLtEq,
                TokenKind::Ident("c".into()),
                TokenKind::ColonEq,
                TokenKind::Ident("d".into()),
                TokenKind::Ellipsis,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn literals_keep_raw_text() {
        assert_eq!(
            kinds(r#""a\nb" 'x' '\n' 0x1F"#),
            vec![
                TokenKind::String(r#""a\nb""#.into()),
                TokenKind::Char("'x'".into()),
                TokenKind::Char(r"'\n'".into()),
                TokenKind::Int("0x1F".into()),
                SEMI,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn block_comment_with_newline_terminates() {
        assert_eq!(
            kinds("x /* a\nb */ y"),
            vec![
                TokenKind::Ident("x".into()),
                SEMI,
                TokenKind::Ident("y".into()),
                SEMI,
                TokenKind::Eof,
            ]
        );
        assert_eq!(
            kinds("x /* a */ + y"),
            vec![
                TokenKind::Ident("x".into()),
                TokenKind::Plus,
                TokenKind::Ident("y".into()),
                SEMI,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn line_comment_keeps_newline() {
        assert_eq!(
            kinds("x // trailing\ny"),
            vec![
                TokenKind::Ident("x".into()),
                SEMI,
                TokenKind::Ident("y".into()),
                SEMI,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn keywords_are_recognized() {
        assert_eq!(
            kinds("package main"),
            vec![TokenKind::Package, TokenKind::Ident("main".into()), SEMI, TokenKind::Eof]
        );
    }

    #[test]
    fn unknown_byte_is_fatal() {
        let err = Lexer::new("x := 1 @ 2", FileId(0)).tokenize().unwrap_err();
        assert_eq!(err.span.start, 7);
        assert!(err.message.contains("'@'"), "{}", err.message);
    }
}
