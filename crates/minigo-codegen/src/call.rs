// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Calls: user functions and methods, builtins and conversions.
//!
//! The caller reserves the result area, then the parameter area below it,
//! and stores each argument into its slot before `callq`:
//!
//! ```text
//! higher addresses
//!   result N-1 .. result 0     reserved with zeros
//!   param  N-1 .. param  0     16(%rbp) in the callee is param 0
//!   return address
//! ```

use minigo_ast::expr::{Expr, ExprKind};
use minigo_ast::object::Builtin;
use minigo_ast::{Span, Type};
use minigo_types::{self as types, Kind};
use minigo_walk::{Callee, Func, FRAME_BASE};

use crate::emit::{emit, Shape};
use crate::error::{CodegenError, CodegenResult};
use crate::func::FuncGen;

impl<'g> FuncGen<'g> {
    pub(crate) fn call(&mut self, expr: &Expr, func: &Expr, args: &[Expr]) -> CodegenResult<()> {
        let callee = self.analysis.calls.get(&expr.id).cloned().ok_or_else(|| CodegenError::Unbound {
            func: self.name.clone(),
            what: "call target".to_string(),
            span: expr.span,
        })?;
        match callee {
            Callee::Builtin(builtin) => self.builtin(expr, builtin, args),
            Callee::Conversion(target) => match args {
                [arg] => self.conversion(arg, &target),
                _ => Err(self.unsupported("conversion arity", expr.span)),
            },
            Callee::Func(obj) => {
                let info = self.callee_info(obj, func.span)?;
                self.user_call(info, None, args)
            }
            Callee::Method { func: obj, ptr_recv } => {
                let ExprKind::Selector { object, .. } = &func.unparen().kind else {
                    return Err(self.unsupported("method call without selector", func.span));
                };
                let info = self.callee_info(obj, func.span)?;
                self.user_call(info, Some((object, ptr_recv)), args)
            }
        }
    }

    fn callee_info(&self, obj: minigo_ast::ObjId, span: Span) -> CodegenResult<&'g Func> {
        let analysis = self.analysis;
        analysis.func(obj).ok_or_else(|| CodegenError::Unbound {
            func: self.name.clone(),
            what: self.program.object(obj).name.clone(),
            span,
        })
    }

    fn user_call(&mut self, info: &Func, recv: Option<(&Expr, bool)>, args: &[Expr]) -> CodegenResult<()> {
        let mut result_words = 0;
        for slot in &info.results {
            result_words += Self::spilled_words(self.shape(&slot.ty)?);
        }
        for _ in 0..result_words {
            self.out.push("$0");
        }
        self.out.reserve(info.param_size);

        let mut slots = info.params.iter();
        if let Some((object, ptr_recv)) = recv {
            let slot = slots.next().ok_or_else(|| self.unsupported("method without receiver slot", object.span))?;
            self.receiver(object, ptr_recv)?;
            let shape = self.shape(&slot.ty)?;
            self.store_param(shape, slot.offset - FRAME_BASE);
        }
        for (arg, slot) in args.iter().zip(slots) {
            self.expr_as(arg, &slot.ty)?;
            let shape = self.shape(&slot.ty)?;
            self.store_param(shape, slot.offset - FRAME_BASE);
        }

        emit!(self.out, "callq {}", info.symbol);
        self.out.release(info.param_size);

        if let [result] = info.results.as_slice() {
            let shape = self.shape(&result.ty)?;
            if shape.is_aggregate() {
                self.result_to_heap(shape)?;
            }
        }
        Ok(())
    }

    /// Push the receiver the way the method's receiver slot expects it.
    fn receiver(&mut self, object: &Expr, ptr_recv: bool) -> CodegenResult<()> {
        let ty = self.type_of(object)?;
        let is_ptr = self.kind(&ty)? == Kind::Pointer;
        match (ptr_recv, is_ptr) {
            (true, false) => self.addr(object),
            (false, true) => {
                self.expr(object)?;
                let elem = match types::underlying(self.program, &ty).map_err(|e| self.type_error(e))? {
                    Type::Pointer(elem) => *elem,
                    _ => return Err(self.unsupported("receiver dereference", object.span)),
                };
                let shape = self.shape(&elem)?;
                self.load(shape);
                Ok(())
            }
            _ => self.expr(object),
        }
    }

    /// Move the value on top into the parameter slot `offset` bytes above the
    /// start of the reserved parameter area.
    fn store_param(&mut self, shape: Shape, offset: i64) {
        if shape.is_aggregate() {
            self.out.pop("%rsi");
            emit!(self.out, "leaq {}(%rsp), %rdi", offset);
            self.memcopy(shape.size);
            return;
        }
        let words = shape.words();
        for i in 0..words {
            emit!(self.out, "movq {}(%rsp), %rax", 8 * i);
            emit!(self.out, "movq %rax, {}(%rsp)", 8 * words + offset + 8 * i);
        }
        self.out.drop_words(words);
    }

    /// Replace a struct or array result left in the result area with a heap
    /// copy referenced by address.
    fn result_to_heap(&mut self, shape: Shape) -> CodegenResult<()> {
        let words = Self::spilled_words(shape);
        self.heapalloc(shape.size)?;
        emit!(self.out, "movq (%rsp), %rdi");
        emit!(self.out, "leaq 8(%rsp), %rsi");
        self.memcopy(shape.size);
        self.out.pop("%rax");
        self.out.drop_words(words);
        self.out.push("%rax");
        Ok(())
    }

    // =========================================================================
    // Builtins
    // =========================================================================

    fn builtin(&mut self, expr: &Expr, builtin: Builtin, args: &[Expr]) -> CodegenResult<()> {
        let span = expr.span;
        let arity = |gen: &Self, n: usize| {
            if args.len() < n {
                Err(gen.unsupported(format!("{} with {} arguments", builtin.name(), args.len()), span))
            } else {
                Ok(())
            }
        };
        match builtin {
            Builtin::Len | Builtin::Cap => {
                arity(self, 1)?;
                let arg = &args[0];
                let ty = self.type_of(arg)?;
                match types::underlying(self.program, &ty).map_err(|e| self.type_error(e))? {
                    Type::Array { len, .. } => self.out.push_imm(len as i64),
                    _ => {
                        let kind = self.kind(&ty)?;
                        self.expr(arg)?;
                        match (kind, builtin) {
                            (Kind::String, _) | (Kind::Slice, Builtin::Cap) => {
                                // Drop the pointer, or pointer and length.
                                let drop = if kind == Kind::String { 1 } else { 2 };
                                self.out.drop_words(drop);
                            }
                            (Kind::Slice, _) => {
                                self.out.drop_words(1);
                                self.out.pop("%rax");
                                self.out.drop_words(1);
                                self.out.push("%rax");
                            }
                            _ => return Err(self.unsupported(format!("{} of {}", builtin.name(), kind), span)),
                        }
                    }
                }
                Ok(())
            }
            Builtin::New => {
                let ty = self.type_of(expr)?;
                let Type::Pointer(elem) = ty else {
                    return Err(self.unsupported("new without pointer type", span));
                };
                let size = self.shape(&elem)?.size;
                self.heapalloc(size)
            }
            Builtin::Make => {
                arity(self, 2)?;
                let ty = self.type_of(expr)?;
                let elem = types::elem_type(self.program, &ty).map_err(|e| self.type_error(e))?;
                let size = self.shape(&elem)?.size;
                self.out.push_imm(size as i64);
                self.expr(&args[1])?;
                match args.get(2) {
                    Some(cap) => self.expr(cap)?,
                    None => self.dup(),
                }
                self.runtime_call("makeSlice", &[1, 1, 1], 3)
            }
            Builtin::Append => {
                arity(self, 2)?;
                let ty = self.type_of(expr)?;
                let elem = types::elem_type(self.program, &ty).map_err(|e| self.type_error(e))?;
                let shape = self.shape(&elem)?;
                let routine = format!("append{}", shape.size);
                self.expr(&args[0])?;
                for arg in &args[1..] {
                    self.expr_as(arg, &elem)?;
                    self.spill(shape);
                    self.runtime_call(&routine, &[3, Self::spilled_words(shape)], 3)?;
                }
                Ok(())
            }
            Builtin::Panic => {
                arity(self, 1)?;
                self.expr_as(&args[0], &Type::Interface)?;
                self.runtime_call("panic", &[2], 0)
            }
            Builtin::Print => {
                for arg in args {
                    let ty = self.type_of(arg)?;
                    self.expr(arg)?;
                    if self.kind(&ty)? == Kind::String {
                        self.runtime_call("printstring", &[2], 0)?;
                    } else {
                        self.runtime_call("printint", &[1], 0)?;
                    }
                }
                Ok(())
            }
        }
    }

    // =========================================================================
    // Conversions
    // =========================================================================

    fn conversion(&mut self, arg: &Expr, target: &Type) -> CodegenResult<()> {
        let from = self.kind(&self.type_of(arg)?)?;
        let to = self.kind(target)?;
        if to == Kind::Interface {
            return self.expr_as(arg, target);
        }
        self.expr(arg)?;
        match (from, to) {
            (f, t) if f.is_integer() && t.is_integer() => {
                if matches!(t, Kind::Uint8 | Kind::Uint16) && f != t {
                    self.out.pop("%rax");
                    self.mask(t);
                    self.out.push("%rax");
                }
            }
            // The bytes are shared, not copied.
            (Kind::String, Kind::Slice) => {
                self.out.pop("%rax");
                self.out.pop("%rcx");
                self.out.push("%rcx");
                self.out.push("%rcx");
                self.out.push("%rax");
            }
            (Kind::Slice, Kind::String) => {
                self.out.pop("%rax");
                self.out.pop("%rcx");
                self.out.drop_words(1);
                self.out.push("%rcx");
                self.out.push("%rax");
            }
            _ => {}
        }
        Ok(())
    }
}
