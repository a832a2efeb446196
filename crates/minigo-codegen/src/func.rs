// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Per-function emission state and the value-movement primitives every
//! expression and statement is built from.

use std::collections::HashMap;

use minigo_ast::expr::Expr;
use minigo_ast::{NodeId, ObjId, Program, Span, Storage, Type};
use minigo_types::{self as types, Kind, TypeError};
use minigo_walk::{Analysis, Func};

use crate::emit::{emit, Emitter, Shape};
use crate::error::{CodegenError, CodegenResult};
use crate::module::CodeGenerator;

/// Scratch registers, in the order runtime-call arguments are collected.
const SCRATCH: [&str; 9] = ["%rax", "%rcx", "%rdx", "%rsi", "%rdi", "%r8", "%r9", "%r10", "%r11"];

/// Where `break` and `continue` jump for one loop or switch.
#[derive(Debug, Clone)]
pub(crate) struct BranchLabels {
    pub brk: String,
    pub cont: Option<String>,
}

pub(crate) struct FuncGen<'g> {
    pub program: &'g Program,
    pub analysis: &'g Analysis,
    pub gen: &'g mut CodeGenerator,
    pub out: Emitter,
    /// Symbol of the function being emitted.
    pub name: String,
    pub func: Option<&'g Func>,
    pub return_label: String,
    pub labels: HashMap<NodeId, BranchLabels>,
}

impl<'g> FuncGen<'g> {
    pub fn new(
        program: &'g Program,
        analysis: &'g Analysis,
        gen: &'g mut CodeGenerator,
        name: String,
        func: Option<&'g Func>,
    ) -> Self {
        let return_label = gen.new_label("return");
        Self { program, analysis, gen, out: Emitter::new(), name, func, return_label, labels: HashMap::new() }
    }

    // =========================================================================
    // Errors and type queries
    // =========================================================================

    pub fn unsupported(&self, what: impl Into<String>, span: Span) -> CodegenError {
        CodegenError::Unsupported { func: self.name.clone(), what: what.into(), span }
    }

    pub fn type_error(&self, source: TypeError) -> CodegenError {
        CodegenError::Type { func: self.name.clone(), source }
    }

    pub fn type_of(&self, expr: &Expr) -> CodegenResult<Type> {
        self.analysis.type_of(expr.id).cloned().ok_or_else(|| CodegenError::MissingType {
            func: self.name.clone(),
            what: expr.describe().to_string(),
            span: expr.span,
        })
    }

    pub fn kind(&self, ty: &Type) -> CodegenResult<Kind> {
        types::kind(self.program, ty).map_err(|e| self.type_error(e))
    }

    pub fn shape(&self, ty: &Type) -> CodegenResult<Shape> {
        let kind = self.kind(ty)?;
        let size = types::size_of(self.program, ty).map_err(|e| self.type_error(e))?;
        Ok(Shape { kind, size })
    }

    /// Stack words of a value, or of every result of a multi-value call.
    pub fn value_words(&self, ty: &Type) -> CodegenResult<i64> {
        match ty {
            Type::Tuple(items) => items.iter().map(|t| self.shape(t).map(Shape::words)).sum(),
            _ => Ok(self.shape(ty)?.words()),
        }
    }

    /// Dynamic-type tag of a static type.
    pub fn tag_of(&mut self, ty: &Type) -> CodegenResult<u32> {
        let name = types::serialize(self.program, ty).map_err(|e| self.type_error(e))?;
        Ok(self.gen.dtypes.tag(&name))
    }

    pub fn new_label(&mut self, kind: &str) -> String {
        self.gen.new_label(kind)
    }

    pub fn runtime(&self, name: &str) -> String {
        format!("{}.{}", self.gen.options.runtime_prefix, name)
    }

    pub fn check_depth(&self, expected: i64) -> CodegenResult<()> {
        if self.out.depth() == expected {
            Ok(())
        } else {
            Err(CodegenError::StackImbalance { func: self.name.clone(), expected, found: self.out.depth() })
        }
    }

    // =========================================================================
    // Addresses
    // =========================================================================

    pub fn frame_addr(&mut self, offset: i64) {
        emit!(self.out, "leaq {}(%rbp), %rax", offset);
        self.out.push("%rax");
    }

    /// Push the address of a variable's storage.
    pub fn var_addr(&mut self, obj: ObjId, span: Span) -> CodegenResult<()> {
        let object = self.program.object(obj);
        let var = object.var.as_ref().ok_or_else(|| CodegenError::Unbound {
            func: self.name.clone(),
            what: object.name.clone(),
            span,
        })?;
        match &var.storage {
            Storage::Local(offset) => self.frame_addr(*offset),
            Storage::Global(symbol) => {
                emit!(self.out, "leaq {}(%rip), %rax", symbol);
                self.out.push("%rax");
            }
        }
        Ok(())
    }

    // =========================================================================
    // Loads and stores
    // =========================================================================

    /// `[addr]` → `[value]`
    pub fn load(&mut self, shape: Shape) {
        if shape.is_aggregate() {
            return;
        }
        self.out.pop("%rax");
        match shape.kind {
            Kind::String | Kind::Interface => {
                self.out.push("8(%rax)");
                self.out.push("(%rax)");
            }
            Kind::Slice => {
                self.out.push("16(%rax)");
                self.out.push("8(%rax)");
                self.out.push("(%rax)");
            }
            Kind::Uint8 => {
                emit!(self.out, "movzbq (%rax), %rax");
                self.out.push("%rax");
            }
            Kind::Uint16 => {
                emit!(self.out, "movzwq (%rax), %rax");
                self.out.push("%rax");
            }
            _ => {
                emit!(self.out, "movq (%rax), %rax");
                self.out.push("%rax");
            }
        }
    }

    /// `[addr, value]` → `[]`
    pub fn store(&mut self, shape: Shape) {
        if shape.is_aggregate() {
            self.out.pop("%rsi");
            self.out.pop("%rdi");
            self.memcopy(shape.size);
            return;
        }
        self.pop_value(shape);
        self.out.pop("%rdi");
        self.write_value(shape);
    }

    /// `[value, addr]` → `[]`
    pub fn store_swapped(&mut self, shape: Shape) {
        if shape.is_aggregate() {
            self.out.pop("%rdi");
            self.out.pop("%rsi");
            self.memcopy(shape.size);
            return;
        }
        self.out.pop("%rdi");
        self.pop_value(shape);
        self.write_value(shape);
    }

    /// Pop a non-aggregate value into `%rax`, `%rcx` and `%rdx`, lowest word first.
    pub(crate) fn pop_value(&mut self, shape: Shape) {
        for reg in &SCRATCH[..shape.words() as usize] {
            self.out.pop(reg);
        }
    }

    pub(crate) fn write_value(&mut self, shape: Shape) {
        match shape.kind {
            Kind::Uint8 => emit!(self.out, "movb %al, (%rdi)"),
            Kind::Uint16 => emit!(self.out, "movw %ax, (%rdi)"),
            _ => {
                for (i, reg) in SCRATCH[..shape.words() as usize].iter().enumerate() {
                    emit!(self.out, "movq {}, {}(%rdi)", reg, i * 8);
                }
            }
        }
    }

    /// Copy `size` bytes from `%rsi` to `%rdi` through the runtime.
    pub fn memcopy(&mut self, size: u64) {
        if size == 0 {
            return;
        }
        emit!(self.out, "subq $24, %rsp");
        emit!(self.out, "movq %rdi, (%rsp)");
        emit!(self.out, "movq %rsi, 8(%rsp)");
        emit!(self.out, "movq ${}, 16(%rsp)", size);
        let symbol = self.runtime("memcopy");
        emit!(self.out, "callq {}", symbol);
        emit!(self.out, "addq $24, %rsp");
    }

    /// Duplicate the top word.
    pub fn dup(&mut self) {
        self.out.push("(%rsp)");
    }

    /// Drop a value of type `ty`, including every result of a multi-value call.
    pub fn discard(&mut self, ty: &Type) -> CodegenResult<()> {
        let words = self.value_words(ty)?;
        self.out.drop_words(words);
        Ok(())
    }

    /// Push the zero value of a type.
    pub fn zero_value(&mut self, shape: Shape) -> CodegenResult<()> {
        if shape.is_aggregate() {
            return self.heapalloc(shape.size);
        }
        for _ in 0..shape.words() {
            self.out.push("$0");
        }
        Ok(())
    }

    /// Zero `size` bytes of the frame at `offset`.
    pub fn zero_frame(&mut self, offset: i64, size: u64) {
        if size == 0 {
            return;
        }
        emit!(self.out, "leaq {}(%rbp), %rdi", offset);
        emit!(self.out, "movq ${}, %rcx", size);
        emit!(self.out, "xorl %eax, %eax");
        emit!(self.out, "rep stosb");
    }

    /// Replace an aggregate's address on top with a copy of its bytes, as a
    /// by-value argument is laid out.
    pub fn spill(&mut self, shape: Shape) {
        if !shape.is_aggregate() {
            return;
        }
        let bytes = minigo_walk::word_align(shape.size);
        self.out.pop("%rsi");
        self.out.reserve(bytes);
        emit!(self.out, "movq %rsp, %rdi");
        self.memcopy(shape.size);
    }

    /// Words a spilled value takes.
    pub fn spilled_words(shape: Shape) -> i64 {
        if shape.is_aggregate() {
            (minigo_walk::word_align(shape.size) / 8) as i64
        } else {
            shape.words()
        }
    }

    /// Truncate `%rax` to the width of a narrow integer kind.
    pub fn mask(&mut self, kind: Kind) {
        match kind {
            Kind::Uint8 => emit!(self.out, "movzbq %al, %rax"),
            Kind::Uint16 => emit!(self.out, "movzwq %ax, %rax"),
            _ => {}
        }
    }

    // =========================================================================
    // Runtime calls
    // =========================================================================

    /// Call a runtime routine whose arguments were pushed left to right, each
    /// taking `args[i]` words. Leaves `results` words on the stack.
    pub fn runtime_call(&mut self, name: &str, args: &[i64], results: i64) -> CodegenResult<()> {
        let total: i64 = args.iter().sum();
        if total as usize > SCRATCH.len() {
            return Err(self.unsupported(format!("runtime call {} with {} argument words", name, total), Span::default()));
        }
        for reg in &SCRATCH[..total as usize] {
            self.out.pop(reg);
        }
        for _ in 0..results {
            self.out.push("$0");
        }
        // The last argument's words were popped first; push it first so the
        // first argument ends up at the lowest address.
        let mut start = 0usize;
        let mut starts = vec![0usize; args.len()];
        for i in (0..args.len()).rev() {
            starts[i] = start;
            start += args[i] as usize;
        }
        for i in (0..args.len()).rev() {
            for w in (0..args[i] as usize).rev() {
                self.out.push(SCRATCH[starts[i] + w]);
            }
        }
        let symbol = self.runtime(name);
        emit!(self.out, "callq {}", symbol);
        self.out.drop_words(total);
        Ok(())
    }

    /// Push the address of `size` fresh zeroed bytes.
    pub fn heapalloc(&mut self, size: u64) -> CodegenResult<()> {
        self.out.push_imm(size as i64);
        self.runtime_call("heapalloc", &[1], 1)
    }
}
