// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Package-level emission: data section, functions, global initializers and
//! the once-per-run trailer.

use std::collections::HashMap;

use minigo_ast::decl::{DeclKind, File, FuncDecl, ValueSpec};
use minigo_ast::{NodeId, Program, Storage};
use minigo_types::{ConstValue, Kind};
use minigo_walk::{Analysis, Package};

use crate::dtype::DtypeRegistry;
use crate::emit::{ascii_literal, emit, Emitter};
use crate::error::{CodegenError, CodegenResult};
use crate::func::FuncGen;
use crate::CodegenOptions;

/// Name of the per-package function running non-constant global initializers.
pub const INIT_VARS: &str = "__initVars";
/// Entry point calling every package's initializer in compile order.
pub const INIT_ALL: &str = "__initAllPackages";

/// Run-wide code generation state: label counter, dynamic-type registry and
/// the packages emitted so far.
pub struct CodeGenerator {
    pub options: CodegenOptions,
    pub dtypes: DtypeRegistry,
    next_label: u32,
    packages: Vec<String>,
}

impl CodeGenerator {
    pub fn new(options: CodegenOptions) -> Self {
        Self { options, dtypes: DtypeRegistry::new(), next_label: 0, packages: Vec::new() }
    }

    pub(crate) fn new_label(&mut self, kind: &str) -> String {
        let label = format!(".L.{}.{}", kind, self.next_label);
        self.next_label += 1;
        label
    }

    /// Emit the assembly of one analysed package.
    pub fn emit_package(
        &mut self,
        program: &Program,
        analysis: &Analysis,
        files: &[File],
        package: &Package,
    ) -> CodegenResult<String> {
        let mut out = Emitter::new();
        out.raw(&format!("# package {}", package.name));

        let specs = global_specs(files);
        self.emit_data(program, analysis, package, &specs, &mut out)?;

        out.raw("\t.text");
        let decls = func_decls(program, files);
        for &obj in &package.funcs {
            let Some(info) = analysis.func(obj) else { continue };
            let Some(decl) = decls.get(&obj) else { continue };
            let text = self.emit_func(program, analysis, info, decl)?;
            out.raw(&text);
        }

        let init = self.emit_init_vars(program, analysis, package, &specs)?;
        out.raw(&init);

        self.packages.push(package.name.clone());
        log::debug!("emitted package {}: {} functions", package.name, package.funcs.len());
        Ok(out.finish())
    }

    /// Emit the package-initialization entry point and the dynamic-type table.
    pub fn finish(&mut self) -> String {
        let mut out = Emitter::new();
        out.raw("\t.text");
        out.raw(&format!("\t.global {}", INIT_ALL));
        out.label(INIT_ALL);
        for package in &self.packages {
            emit!(out, "callq {}.{}", package, INIT_VARS);
        }
        emit!(out, "ret");
        self.dtypes.emit_table(&mut out);
        out.finish()
    }

    // =========================================================================
    // Data
    // =========================================================================

    fn emit_data(
        &mut self,
        program: &Program,
        analysis: &Analysis,
        package: &Package,
        specs: &[&ValueSpec],
        out: &mut Emitter,
    ) -> CodegenResult<()> {
        out.raw("\t.data");
        for lit in &package.strings {
            out.label(&lit.label);
            out.raw(&format!("\t.ascii {}", ascii_literal(&lit.bytes)));
        }

        for spec in specs {
            let lines = data_lines(program, analysis, spec);
            for (i, name) in spec.names.iter().enumerate() {
                if name.is_blank() {
                    continue;
                }
                let Some(obj) = program.resolution(name.id) else { continue };
                let Some(var) = &program.object(obj).var else { continue };
                let Storage::Global(symbol) = &var.storage else { continue };
                let size = minigo_types::size_of(program, &var.ty).map_err(|source| type_error(symbol, source))?;

                out.raw("\t.balign 8");
                out.raw(&format!("\t.global {}", symbol));
                out.label(symbol);
                match lines.as_ref().and_then(|lines| lines.get(i)) {
                    Some(lines) => {
                        for line in lines {
                            out.raw(line);
                        }
                    }
                    None => out.raw(&format!("\t.zero {}", size.max(1))),
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // Functions
    // =========================================================================

    fn emit_func(
        &mut self,
        program: &Program,
        analysis: &Analysis,
        info: &minigo_walk::Func,
        decl: &FuncDecl,
    ) -> CodegenResult<String> {
        let Some(body) = &decl.body else { return Ok(String::new()) };
        log::trace!("emitting {} ({} bytes of locals)", info.symbol, info.local_size);
        let annotate = self.options.annotate;

        let mut gen = FuncGen::new(program, analysis, self, info.symbol.clone(), Some(info));
        gen.prologue(info.local_size, annotate);
        gen.block(body)?;
        gen.epilogue();
        Ok(gen.out.finish())
    }

    fn emit_init_vars(
        &mut self,
        program: &Program,
        analysis: &Analysis,
        package: &Package,
        specs: &[&ValueSpec],
    ) -> CodegenResult<String> {
        let symbol = format!("{}.{}", package.name, INIT_VARS);
        let annotate = self.options.annotate;
        let by_first: HashMap<NodeId, &ValueSpec> =
            specs.iter().filter_map(|s| s.names.first().map(|n| (n.id, *s))).collect();

        let mut gen = FuncGen::new(program, analysis, self, symbol, None);
        gen.prologue(0, annotate);
        for id in &package.var_order {
            let Some(spec) = by_first.get(id) else { continue };
            if spec.values.is_empty() || data_lines(program, analysis, spec).is_some() {
                continue;
            }
            gen.value_spec(spec)?;
        }
        gen.epilogue();
        Ok(gen.out.finish())
    }
}

impl<'g> FuncGen<'g> {
    pub(crate) fn prologue(&mut self, local_size: u64, annotate: bool) {
        self.out.raw(&format!("\t.global {}", self.name));
        self.out.label(&self.name.clone());
        if annotate {
            if let Some(func) = self.func {
                self.out.comment(&format!(
                    "params {} bytes, results {} bytes, locals {} bytes",
                    func.param_size, func.result_size, func.local_size
                ));
            }
        }
        emit!(self.out, "pushq %rbp");
        emit!(self.out, "movq %rsp, %rbp");
        if local_size > 0 {
            emit!(self.out, "subq ${}, %rsp", local_size);
            self.zero_frame(-(local_size as i64), local_size);
        }
    }

    pub(crate) fn epilogue(&mut self) {
        let label = self.return_label.clone();
        self.out.label(&label);
        emit!(self.out, "leave");
        emit!(self.out, "ret");
    }
}

fn type_error(symbol: &str, source: minigo_types::TypeError) -> CodegenError {
    CodegenError::Type { func: symbol.to_string(), source }
}

fn global_specs(files: &[File]) -> Vec<&ValueSpec> {
    files
        .iter()
        .flat_map(|f| &f.decls)
        .filter_map(|d| match &d.kind {
            DeclKind::Var(spec) => Some(spec),
            _ => None,
        })
        .collect()
}

fn func_decls<'f>(program: &Program, files: &'f [File]) -> HashMap<minigo_ast::ObjId, &'f FuncDecl> {
    files
        .iter()
        .flat_map(|f| &f.decls)
        .filter_map(|d| match &d.kind {
            DeclKind::Func(func) => program.resolution(func.name.id).map(|obj| (obj, func)),
            _ => None,
        })
        .collect()
}

/// Data directives for every name of a spec whose initializers are all
/// integer, boolean or string constants; `None` when any needs code.
fn data_lines(program: &Program, analysis: &Analysis, spec: &ValueSpec) -> Option<Vec<Vec<String>>> {
    if spec.values.len() != spec.names.len() {
        return None;
    }
    spec.names
        .iter()
        .zip(&spec.values)
        .map(|(name, value)| {
            if name.is_blank() {
                return Some(Vec::new());
            }
            let obj = program.resolution(name.id)?;
            let ty = &program.object(obj).var.as_ref()?.ty;
            let kind = minigo_types::kind(program, ty).ok()?;
            Some(match (analysis.consts.get(&value.id)?, kind) {
                (ConstValue::Int(n), Kind::Uint8) => vec![format!("\t.byte {}", n)],
                (ConstValue::Int(n), Kind::Uint16) => vec![format!("\t.word {}", n)],
                (ConstValue::Int(n), Kind::Int | Kind::Uintptr) => vec![format!("\t.quad {}", n)],
                (ConstValue::Bool(b), Kind::Bool) => vec![format!("\t.quad {}", u8::from(*b))],
                (ConstValue::Str(bytes), Kind::String) => {
                    let label = analysis.string_labels.get(&value.id)?;
                    vec![format!("\t.quad {}", label), format!("\t.quad {}", bytes.len())]
                }
                _ => return None,
            })
        })
        .collect()
}
