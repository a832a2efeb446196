// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Per-run compiler settings.

use minigo_codegen::CodegenOptions;

#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// Emit `#` comments naming each statement and each function's frame sizes.
    pub annotate: bool,
    /// Package prefix of the runtime routines generated code calls.
    pub runtime_prefix: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self { annotate: true, runtime_prefix: "runtime".to_string() }
    }
}

impl CompilerConfig {
    pub fn codegen_options(&self) -> CodegenOptions {
        CodegenOptions { annotate: self.annotate, runtime_prefix: self.runtime_prefix.clone() }
    }
}
