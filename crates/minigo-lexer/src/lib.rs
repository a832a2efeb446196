// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Lexer for minigo.
//!
//! Tokenizes source code into a stream of tokens for the parser, inserting
//! statement terminators at line ends.

mod lexer;

pub use lexer::{LexError, Lexer};
