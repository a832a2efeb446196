// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! minigo code generator: analysed packages → x86-64 AT&T assembly.
//!
//! Every expression is evaluated onto the machine stack. Scalars take one
//! word, strings and interfaces two, slices three; structs and arrays are
//! represented by their address and copied on store.

mod call;
mod dtype;
mod emit;
mod error;
mod expr;
mod func;
mod module;
mod stmt;
mod tests;

pub use dtype::DtypeRegistry;
pub use emit::{ascii_literal, Shape};
pub use error::{CodegenError, CodegenResult};
pub use module::{CodeGenerator, INIT_ALL, INIT_VARS};

/// Output switches for a compilation run.
#[derive(Debug, Clone)]
pub struct CodegenOptions {
    /// Emit a comment with the source form of each statement.
    pub annotate: bool,
    /// Symbol prefix of the runtime routines (`<prefix>.heapalloc`, ...).
    pub runtime_prefix: String,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self { annotate: true, runtime_prefix: "runtime".to_string() }
    }
}
