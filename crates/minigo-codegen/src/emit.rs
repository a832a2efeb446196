// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Assembly text buffer with operand-stack bookkeeping.
//!
//! Values live on the machine stack in 8-byte words. The emitter counts the
//! words pushed since the current function's frame was set up so producers
//! and consumers that disagree on a value's width are caught at emission
//! time.

use std::fmt::{self, Write as _};

use minigo_types::Kind;

/// Append one instruction line to an [`Emitter`].
macro_rules! emit {
    ($out:expr, $($arg:tt)*) => {
        $out.ins(format_args!($($arg)*))
    };
}
pub(crate) use emit;

/// How a value of some type occupies the operand stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape {
    pub kind: Kind,
    pub size: u64,
}

impl Shape {
    /// Words the value takes on the stack. Structs and arrays travel as their address.
    pub fn words(self) -> i64 {
        match self.kind {
            Kind::String | Kind::Interface => 2,
            Kind::Slice => 3,
            _ => 1,
        }
    }

    /// Held in memory and referenced by address.
    pub fn is_aggregate(self) -> bool {
        matches!(self.kind, Kind::Struct | Kind::Array)
    }
}

#[derive(Debug, Default)]
pub struct Emitter {
    text: String,
    depth: i64,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ins(&mut self, args: fmt::Arguments<'_>) {
        let _ = writeln!(self.text, "\t{}", args);
    }

    pub fn label(&mut self, label: &str) {
        let _ = writeln!(self.text, "{}:", label);
    }

    pub fn comment(&mut self, text: &str) {
        let _ = writeln!(self.text, "\t# {}", text);
    }

    /// A directive or line emitted verbatim.
    pub fn raw(&mut self, line: &str) {
        self.text.push_str(line);
        self.text.push('\n');
    }

    pub fn push(&mut self, operand: &str) {
        emit!(self, "pushq {}", operand);
        self.depth += 1;
    }

    pub fn push_imm(&mut self, value: i64) {
        if i32::try_from(value).is_ok() {
            emit!(self, "pushq ${}", value);
        } else {
            emit!(self, "movabsq ${}, %rax", value);
            emit!(self, "pushq %rax");
        }
        self.depth += 1;
    }

    pub fn pop(&mut self, reg: &str) {
        emit!(self, "popq {}", reg);
        self.depth -= 1;
    }

    /// Discard `words` words from the top of the stack.
    pub fn drop_words(&mut self, words: i64) {
        if words > 0 {
            emit!(self, "addq ${}, %rsp", words * 8);
            self.depth -= words;
        }
    }

    /// Reserve an uninitialized area of `bytes` (a multiple of 8).
    pub fn reserve(&mut self, bytes: u64) {
        if bytes > 0 {
            emit!(self, "subq ${}, %rsp", bytes);
            self.depth += (bytes / 8) as i64;
        }
    }

    pub fn release(&mut self, bytes: u64) {
        self.drop_words((bytes / 8) as i64);
    }

    pub fn depth(&self) -> i64 {
        self.depth
    }

    /// Reset the count at a label reached by a jump from a known depth.
    pub fn set_depth(&mut self, depth: i64) {
        self.depth = depth;
    }

    pub fn finish(self) -> String {
        self.text
    }
}

/// `.ascii` operand for arbitrary bytes.
pub fn ascii_literal(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() + 2);
    out.push('"');
    for &b in bytes {
        match b {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            0x20..=0x7e => out.push(b as char),
            _ => {
                let _ = write!(out, "\\{:03o}", b);
            }
        }
    }
    out.push('"');
    out
}
