// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Decoding of literal text kept raw by the lexer.

use minigo_ast::Span;

use crate::error::{TypeError, TypeErrorKind};

fn invalid(raw: &str, reason: &str, span: Span) -> TypeError {
    TypeError::new(
        TypeErrorKind::InvalidLiteral { raw: raw.to_string(), reason: reason.to_string() },
        span,
    )
}

/// Value of an integer literal. Values above `i64::MAX` wrap.
pub fn decode_int(raw: &str, span: Span) -> Result<i64, TypeError> {
    let digits: String = raw.chars().filter(|&c| c != '_').collect();
    let (radix, body) = match digits.get(..2) {
        Some("0x") | Some("0X") => (16, &digits[2..]),
        Some("0b") | Some("0B") => (2, &digits[2..]),
        Some("0o") | Some("0O") => (8, &digits[2..]),
        _ if digits.len() > 1 && digits.starts_with('0') => (8, &digits[1..]),
        _ => (10, digits.as_str()),
    };
    u64::from_str_radix(body, radix)
        .map(|v| v as i64)
        .map_err(|e| invalid(raw, &e.to_string(), span))
}

/// Code point of a character literal such as `'a'` or `'\n'`.
pub fn decode_char(raw: &str, span: Span) -> Result<i64, TypeError> {
    let inner = strip_quotes(raw, '\'').ok_or_else(|| invalid(raw, "malformed character literal", span))?;
    let mut chars = inner.chars().peekable();
    let mut value = None;
    while let Some(c) = chars.next() {
        if value.is_some() {
            return Err(invalid(raw, "more than one character", span));
        }
        value = Some(if c == '\\' {
            match decode_escape(&mut chars, '\'') {
                Some(Escape::Byte(b)) => b as i64,
                Some(Escape::Char(ch)) => ch as i64,
                None => return Err(invalid(raw, "unknown escape sequence", span)),
            }
        } else {
            c as i64
        });
    }
    value.ok_or_else(|| invalid(raw, "empty character literal", span))
}

/// Bytes of a string literal, interpreted (`"..."`) or raw (`` `...` ``).
pub fn decode_string(raw: &str, span: Span) -> Result<Vec<u8>, TypeError> {
    if let Some(inner) = strip_quotes(raw, '`') {
        return Ok(inner.bytes().filter(|&b| b != b'\r').collect());
    }
    let inner = strip_quotes(raw, '"').ok_or_else(|| invalid(raw, "malformed string literal", span))?;
    let mut out = Vec::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        match decode_escape(&mut chars, '"') {
            Some(Escape::Byte(b)) => out.push(b),
            Some(Escape::Char(ch)) => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            }
            None => return Err(invalid(raw, "unknown escape sequence", span)),
        }
    }
    Ok(out)
}

fn strip_quotes(raw: &str, quote: char) -> Option<&str> {
    raw.strip_prefix(quote)?.strip_suffix(quote)
}

enum Escape {
    Byte(u8),
    Char(char),
}

/// Decode the escape following a backslash.
fn decode_escape(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, quote: char) -> Option<Escape> {
    let c = chars.next()?;
    let byte = match c {
        'a' => 0x07,
        'b' => 0x08,
        'f' => 0x0c,
        'n' => b'\n',
        'r' => b'\r',
        't' => b'\t',
        'v' => 0x0b,
        '\\' => b'\\',
        c if c == quote => c as u8,
        'x' => return hex_digits(chars, 2).and_then(|v| u8::try_from(v).ok()).map(Escape::Byte),
        'u' => return hex_digits(chars, 4).and_then(char::from_u32).map(Escape::Char),
        'U' => return hex_digits(chars, 8).and_then(char::from_u32).map(Escape::Char),
        '0'..='7' => {
            let mut value = c.to_digit(8)?;
            for _ in 0..2 {
                value = value * 8 + chars.next()?.to_digit(8)?;
            }
            return u8::try_from(value).ok().map(Escape::Byte);
        }
        _ => return None,
    };
    Some(Escape::Byte(byte))
}

fn hex_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, n: usize) -> Option<u32> {
    let mut value = 0u32;
    for _ in 0..n {
        value = value * 16 + chars.next()?.to_digit(16)?;
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_bases_and_separators() {
        let s = Span::default();
        assert_eq!(decode_int("42", s).unwrap(), 42);
        assert_eq!(decode_int("0x1F", s).unwrap(), 31);
        assert_eq!(decode_int("0b1010", s).unwrap(), 10);
        assert_eq!(decode_int("0o17", s).unwrap(), 15);
        assert_eq!(decode_int("017", s).unwrap(), 15);
        assert_eq!(decode_int("1_000_000", s).unwrap(), 1_000_000);
        assert!(decode_int("0x", s).is_err());
    }

    #[test]
    fn char_escapes() {
        let s = Span::default();
        assert_eq!(decode_char("'a'", s).unwrap(), 97);
        assert_eq!(decode_char(r"'\n'", s).unwrap(), 10);
        assert_eq!(decode_char(r"'\''", s).unwrap(), 39);
        assert_eq!(decode_char(r"'\x41'", s).unwrap(), 65);
        assert_eq!(decode_char(r"'\101'", s).unwrap(), 65);
        assert!(decode_char("'ab'", s).is_err());
    }

    #[test]
    fn string_escapes_and_raw() {
        let s = Span::default();
        assert_eq!(decode_string(r#""ab\ncd""#, s).unwrap(), b"ab\ncd".to_vec());
        assert_eq!(decode_string(r#""\x00\"""#, s).unwrap(), vec![0, b'"']);
        assert_eq!(decode_string("`a\\nb`", s).unwrap(), b"a\\nb".to_vec());
        assert_eq!(decode_string(r#""é""#, s).unwrap().len(), 2);
    }
}
