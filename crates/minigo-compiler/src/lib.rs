// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! minigo compiler context.
//!
//! A `Compiler` owns everything that lives for one run: the object arena and
//! exported-identifier table, the method table, the dynamic-type registry and
//! the label counter. Packages are compiled one at a time in dependency
//! order; each yields its own assembly text, and `finish` emits the
//! once-per-run trailer.
//!
//! ```text
//! sources ─▶ lex ─▶ parse ─▶ merge scopes ─▶ analyse ─▶ emit ─▶ assembly
//! ```

mod config;
mod error;

pub use config::CompilerConfig;
pub use error::CompileError;

use minigo_ast::decl::File;
use minigo_ast::Program;
use minigo_codegen::CodeGenerator;
use minigo_diagnostics::json::{to_json_report, to_json_string};
use minigo_diagnostics::ToDiagnostic;
use minigo_lexer::Lexer;
use minigo_parser::{merge_package, ParsedFile, Parser};
use minigo_walk::{analyze_package, Analysis};

/// One source file of a package.
#[derive(Debug, Clone)]
pub struct SourceText {
    pub name: String,
    pub text: String,
}

/// The source files of one package, as handed over by the driver.
#[derive(Debug, Clone)]
pub struct PackageSource {
    pub name: String,
    pub files: Vec<SourceText>,
}

impl PackageSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), files: Vec::new() }
    }

    pub fn with_file(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.files.push(SourceText { name: name.into(), text: text.into() });
        self
    }
}

pub struct Compiler {
    pub config: CompilerConfig,
    program: Program,
    analysis: Analysis,
    codegen: CodeGenerator,
}

impl Compiler {
    pub fn new(config: CompilerConfig) -> Self {
        let codegen = CodeGenerator::new(config.codegen_options());
        Self { config, program: Program::new(), analysis: Analysis::new(), codegen }
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn analysis(&self) -> &Analysis {
        &self.analysis
    }

    /// Compile one package whose imports have all been compiled already.
    pub fn compile_package(&mut self, package: &PackageSource) -> Result<String, CompileError> {
        if package.files.is_empty() {
            return Err(CompileError::EmptyPackage { name: package.name.clone() });
        }

        let mut parsed = Vec::with_capacity(package.files.len());
        for source in &package.files {
            parsed.push(self.parse_file(package, source)?);
        }
        merge_package(&mut self.program, &mut parsed)?;
        let files: Vec<File> = parsed.into_iter().map(|p| p.file).collect();

        let analysed = analyze_package(&mut self.program, &mut self.analysis, &files, &package.name)?;
        let asm = self.codegen.emit_package(&self.program, &self.analysis, &files, &analysed)?;
        log::debug!("compiled package {} ({} bytes of assembly)", package.name, asm.len());
        Ok(asm)
    }

    fn parse_file(&mut self, package: &PackageSource, source: &SourceText) -> Result<ParsedFile, CompileError> {
        let file = self.program.add_source(source.name.clone(), source.text.clone());
        let tokens = Lexer::new(&source.text, file).tokenize()?;
        let parsed = Parser::new(&mut self.program, tokens, file).parse_file()?;

        let clause = &parsed.file.package;
        if clause.name != package.name {
            return Err(CompileError::PackageMismatch {
                file: source.name.clone(),
                expected: package.name.clone(),
                found: clause.name.clone(),
                span: clause.span,
            });
        }
        log::debug!("parsed {}: {} declarations", source.name, parsed.file.decls.len());
        Ok(parsed)
    }

    /// Emit `__initAllPackages` and the dynamic-type table.
    pub fn finish(&mut self) -> String {
        log::debug!("finishing run: {} dynamic types", self.codegen.dtypes.len());
        self.codegen.finish()
    }

    /// Compile packages in the given order, then the run trailer, into one
    /// assembly text.
    pub fn compile_all(&mut self, packages: &[PackageSource]) -> Result<String, CompileError> {
        let mut out = String::new();
        for package in packages {
            out.push_str(&self.compile_package(package)?);
        }
        out.push_str(&self.finish());
        Ok(out)
    }

    /// Render an error against the sources of this run for a terminal.
    pub fn render_error(&self, err: &CompileError) -> String {
        minigo_diagnostics::render(&self.program, &err.to_diagnostic())
    }

    /// Render an error as a JSON diagnostic report.
    pub fn error_json(&self, err: &CompileError) -> String {
        let report = to_json_report(&[err.to_diagnostic()], &self.program, err.stage());
        to_json_string(&report)
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new(CompilerConfig::default())
    }
}
