// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Expression emission.
//!
//! Each expression leaves its value on top of the stack and nothing else.
//! Addressable expressions can also be emitted as an address with
//! [`FuncGen::addr`].

use minigo_ast::expr::{BinOp, Expr, ExprKind, UnaryOp};
use minigo_ast::object::ObjDecl;
use minigo_ast::{ObjKind, Span, Type};
use minigo_types::{self as types, ConstValue, Kind};

use crate::emit::emit;
use crate::error::{CodegenError, CodegenResult};
use crate::func::FuncGen;

impl<'g> FuncGen<'g> {
    /// Push the value of an expression.
    pub fn expr(&mut self, expr: &Expr) -> CodegenResult<()> {
        let start = self.out.depth();
        let ty = self.type_of(expr)?;
        match self.analysis.consts.get(&expr.id) {
            Some(value) => self.constant(expr, value)?,
            None => self.value(expr, &ty)?,
        }
        self.check_depth(start + self.value_words(&ty)?)
    }

    /// Push the value of an expression converted for storage in a `target`
    /// location, boxing it when the target is an interface.
    pub fn expr_as(&mut self, expr: &Expr, target: &Type) -> CodegenResult<()> {
        let ty = self.type_of(expr)?;
        if ty == Type::Nil && self.kind(target)? == Kind::Interface {
            self.out.push("$0");
            self.out.push("$0");
            return Ok(());
        }
        self.expr(expr)?;
        self.convert_top(&ty, target)
    }

    /// Box the value on top when it moves from a concrete type to an interface.
    pub(crate) fn convert_top(&mut self, from: &Type, to: &Type) -> CodegenResult<()> {
        if self.kind(to)? == Kind::Interface && !matches!(self.kind(from)?, Kind::Interface | Kind::Nil) {
            self.box_top(from)?;
        }
        Ok(())
    }

    /// `[value]` → `[tag, data]`, copying the value to a fresh heap cell.
    pub(crate) fn box_top(&mut self, ty: &Type) -> CodegenResult<()> {
        let shape = self.shape(ty)?;
        let tag = self.tag_of(ty)?;
        self.heapalloc(shape.size)?;
        if shape.is_aggregate() {
            emit!(self.out, "movq (%rsp), %rdi");
            emit!(self.out, "movq 8(%rsp), %rsi");
            self.memcopy(shape.size);
            self.out.pop("%rax");
            self.out.drop_words(1);
            self.out.push("%rax");
        } else {
            self.out.pop("%r8");
            self.pop_value(shape);
            emit!(self.out, "movq %r8, %rdi");
            self.write_value(shape);
            self.out.push("%r8");
        }
        self.out.push_imm(i64::from(tag));
        Ok(())
    }

    fn constant(&mut self, expr: &Expr, value: &ConstValue) -> CodegenResult<()> {
        match value {
            ConstValue::Int(n) => self.out.push_imm(*n),
            ConstValue::Bool(b) => self.out.push_imm(i64::from(*b)),
            ConstValue::Str(bytes) => {
                let label = self.analysis.string_labels.get(&expr.id).cloned().ok_or_else(|| {
                    CodegenError::Unbound { func: self.name.clone(), what: "string constant".to_string(), span: expr.span }
                })?;
                self.out.push_imm(bytes.len() as i64);
                emit!(self.out, "leaq {}(%rip), %rax", label);
                self.out.push("%rax");
            }
        }
        Ok(())
    }

    fn value(&mut self, expr: &Expr, ty: &Type) -> CodegenResult<()> {
        let span = expr.span;
        match &expr.kind {
            ExprKind::Ident(_) => {
                let obj = self.program.resolution(expr.id).ok_or_else(|| CodegenError::Unbound {
                    func: self.name.clone(),
                    what: expr.describe().to_string(),
                    span,
                })?;
                if matches!(self.program.object(obj).decl, ObjDecl::Nil) {
                    let shape = self.shape(ty)?;
                    return self.zero_value(shape);
                }
                self.var_addr(obj, span)?;
                let shape = self.shape(ty)?;
                self.load(shape);
                Ok(())
            }
            ExprKind::Paren(inner) => self.expr(inner),
            ExprKind::Binary { op, left, right } => self.binary(expr, *op, left, right, ty),
            ExprKind::Unary { op: UnaryOp::Addr, operand } => self.addr(operand),
            ExprKind::Unary { op, operand } => self.unary(*op, operand, ty),
            ExprKind::Call { func, args } => self.call(expr, func, args),
            ExprKind::Selector { .. } | ExprKind::Index { .. } | ExprKind::Star(_) => {
                self.addr(expr)?;
                let shape = self.shape(ty)?;
                self.load(shape);
                Ok(())
            }
            ExprKind::Slice { object, low, high, max } => {
                self.slice_expr(object, [low.as_deref(), high.as_deref(), max.as_deref()], ty)
            }
            ExprKind::CompositeLit { elts, .. } => self.composite(expr, elts, ty),
            ExprKind::TypeAssert { object, .. } => self.type_assert(object, ty, false),
            _ => Err(self.unsupported(expr.describe(), span)),
        }
    }

    // =========================================================================
    // Addresses
    // =========================================================================

    /// Push the address of an addressable expression, or of a composite literal.
    pub fn addr(&mut self, expr: &Expr) -> CodegenResult<()> {
        let span = expr.span;
        match &expr.kind {
            ExprKind::Paren(inner) => self.addr(inner),
            ExprKind::Ident(_) => {
                let obj = self.program.resolution(expr.id).ok_or_else(|| CodegenError::Unbound {
                    func: self.name.clone(),
                    what: expr.describe().to_string(),
                    span,
                })?;
                self.var_addr(obj, span)
            }
            ExprKind::Selector { object, field } => {
                if let Some(obj) = self.program.resolution(expr.id) {
                    if self.program.object(obj).kind == ObjKind::Var {
                        return self.var_addr(obj, span);
                    }
                }
                // A struct value is already the address of its storage.
                let base = self.type_of(object)?;
                let target = match types::underlying(self.program, &base).map_err(|e| self.type_error(e))? {
                    Type::Pointer(elem) => *elem,
                    _ => base,
                };
                let layout = types::field(self.program, &target, field).map_err(|e| self.type_error(e.at(span)))?;
                self.expr(object)?;
                if layout.offset > 0 {
                    emit!(self.out, "addq ${}, (%rsp)", layout.offset);
                }
                Ok(())
            }
            ExprKind::Index { object, index } => self.element_addr(object, index),
            ExprKind::Star(inner) => self.expr(inner),
            ExprKind::CompositeLit { .. } => self.expr(expr),
            _ => Err(self.unsupported(format!("address of {}", expr.describe()), span)),
        }
    }

    /// `[]` → `[base pointer]` of a string, slice, array or pointer to array.
    pub(crate) fn base_pointer(&mut self, object: &Expr) -> CodegenResult<Type> {
        let ty = self.type_of(object)?;
        self.expr(object)?;
        let elem = match self.kind(&ty)? {
            Kind::String => {
                self.out.pop("%rax");
                self.out.drop_words(1);
                self.out.push("%rax");
                Type::Named(self.program.basic.uint8)
            }
            Kind::Slice => {
                self.out.pop("%rax");
                self.out.drop_words(2);
                self.out.push("%rax");
                types::elem_type(self.program, &ty).map_err(|e| self.type_error(e))?
            }
            Kind::Pointer => {
                let Type::Pointer(inner) = types::underlying(self.program, &ty).map_err(|e| self.type_error(e))? else {
                    return Err(self.unsupported("index of non-array pointer", object.span));
                };
                types::elem_type(self.program, &inner).map_err(|e| self.type_error(e))?
            }
            _ => types::elem_type(self.program, &ty).map_err(|e| self.type_error(e))?,
        };
        Ok(elem)
    }

    fn element_addr(&mut self, object: &Expr, index: &Expr) -> CodegenResult<()> {
        let elem = self.base_pointer(object)?;
        let size = self.shape(&elem)?.size;
        self.expr(index)?;
        self.out.pop("%rcx");
        self.out.pop("%rax");
        if size != 1 {
            emit!(self.out, "imulq ${}, %rcx", size);
        }
        emit!(self.out, "addq %rcx, %rax");
        self.out.push("%rax");
        Ok(())
    }

    // =========================================================================
    // Operators
    // =========================================================================

    fn unary(&mut self, op: UnaryOp, operand: &Expr, ty: &Type) -> CodegenResult<()> {
        self.expr(operand)?;
        if op == UnaryOp::Plus {
            return Ok(());
        }
        let kind = self.kind(ty)?;
        self.out.pop("%rax");
        match op {
            UnaryOp::Neg => emit!(self.out, "negq %rax"),
            UnaryOp::Not => emit!(self.out, "xorq $1, %rax"),
            _ => emit!(self.out, "notq %rax"),
        }
        self.mask(kind);
        self.out.push("%rax");
        Ok(())
    }

    fn binary(&mut self, expr: &Expr, op: BinOp, left: &Expr, right: &Expr, ty: &Type) -> CodegenResult<()> {
        if op.is_logical() {
            return self.logical(op, left, right);
        }
        if op.is_comparison() {
            return self.compare(expr, op, left, right);
        }

        let kind = self.kind(ty)?;
        if !kind.is_integer() && kind != Kind::String {
            return Err(self.unsupported(format!("{} on {}", op.symbol(), kind), expr.span));
        }
        self.expr(left)?;
        self.expr(right)?;
        self.arith(op, kind, expr.span)
    }

    /// `[a, b]` → `[a op b]` for integer operands, or `+` on strings.
    pub(crate) fn arith(&mut self, op: BinOp, kind: Kind, span: Span) -> CodegenResult<()> {
        if kind == Kind::String {
            if op != BinOp::Add {
                return Err(self.unsupported(format!("{} on strings", op.symbol()), span));
            }
            return self.runtime_call("catstrings", &[2, 2], 2);
        }
        self.out.pop("%rcx");
        self.out.pop("%rax");
        match op {
            BinOp::Add => emit!(self.out, "addq %rcx, %rax"),
            BinOp::Sub => emit!(self.out, "subq %rcx, %rax"),
            BinOp::Mul => emit!(self.out, "imulq %rcx, %rax"),
            BinOp::Div | BinOp::Rem => {
                if kind.is_unsigned() {
                    emit!(self.out, "xorl %edx, %edx");
                    emit!(self.out, "divq %rcx");
                } else {
                    emit!(self.out, "cqto");
                    emit!(self.out, "idivq %rcx");
                }
                if op == BinOp::Rem {
                    emit!(self.out, "movq %rdx, %rax");
                }
            }
            BinOp::BitAnd => emit!(self.out, "andq %rcx, %rax"),
            BinOp::BitOr => emit!(self.out, "orq %rcx, %rax"),
            BinOp::BitXor => emit!(self.out, "xorq %rcx, %rax"),
            BinOp::AndNot => {
                emit!(self.out, "notq %rcx");
                emit!(self.out, "andq %rcx, %rax");
            }
            // Counts of 64 or more shift every bit out.
            BinOp::Shl => {
                emit!(self.out, "xorl %edx, %edx");
                emit!(self.out, "shlq %cl, %rax");
                emit!(self.out, "cmpq $64, %rcx");
                emit!(self.out, "cmovaeq %rdx, %rax");
            }
            BinOp::Shr if kind.is_unsigned() => {
                emit!(self.out, "xorl %edx, %edx");
                emit!(self.out, "shrq %cl, %rax");
                emit!(self.out, "cmpq $64, %rcx");
                emit!(self.out, "cmovaeq %rdx, %rax");
            }
            BinOp::Shr => {
                emit!(self.out, "movq $63, %rdx");
                emit!(self.out, "cmpq %rdx, %rcx");
                emit!(self.out, "cmovaq %rdx, %rcx");
                emit!(self.out, "sarq %cl, %rax");
            }
            _ => return Err(self.unsupported(format!("operator {}", op.symbol()), span)),
        }
        self.mask(kind);
        self.out.push("%rax");
        Ok(())
    }

    fn logical(&mut self, op: BinOp, left: &Expr, right: &Expr) -> CodegenResult<()> {
        let short = self.new_label(if op == BinOp::And { "false" } else { "true" });
        let end = self.new_label("end");
        self.expr(left)?;
        self.out.pop("%rax");
        let depth = self.out.depth();
        emit!(self.out, "testq %rax, %rax");
        if op == BinOp::And {
            emit!(self.out, "je {}", short);
        } else {
            emit!(self.out, "jne {}", short);
        }
        self.expr(right)?;
        emit!(self.out, "jmp {}", end);
        self.out.label(&short);
        self.out.set_depth(depth);
        self.out.push_imm(i64::from(op == BinOp::Or));
        self.out.label(&end);
        Ok(())
    }

    fn compare(&mut self, expr: &Expr, op: BinOp, left: &Expr, right: &Expr) -> CodegenResult<()> {
        let operand = self.operand_type(&self.type_of(left)?, &self.type_of(right)?)?;
        let kind = self.kind(&operand)?;
        match kind {
            Kind::Interface | Kind::String | Kind::Slice => {
                if !matches!(op, BinOp::Eq | BinOp::Ne) {
                    return Err(self.unsupported(format!("{} on {}", op.symbol(), kind), expr.span));
                }
                self.expr_as(left, &operand)?;
                self.expr_as(right, &operand)?;
                self.equality(kind)?;
                if op == BinOp::Ne {
                    emit!(self.out, "xorq $1, (%rsp)");
                }
                Ok(())
            }
            Kind::Struct | Kind::Array => Err(self.unsupported(format!("comparison of {}", kind), expr.span)),
            _ => {
                self.expr(left)?;
                self.expr(right)?;
                self.compare_words(op, kind == Kind::Int)
            }
        }
    }

    /// Type both sides of a comparison are brought to.
    pub(crate) fn operand_type(&self, left: &Type, right: &Type) -> CodegenResult<Type> {
        if self.kind(left)? == Kind::Interface || self.kind(right)? == Kind::Interface {
            Ok(Type::Interface)
        } else {
            Ok(left.clone())
        }
    }

    /// `[a, b]` → `[a == b]` for two values of the same kind.
    pub(crate) fn equality(&mut self, kind: Kind) -> CodegenResult<()> {
        match kind {
            Kind::String => self.runtime_call("cmpstrings", &[2, 2], 1),
            Kind::Interface => self.runtime_call("cmpinterface", &[2, 2], 1),
            // Only comparisons against nil get here; the pointers decide.
            Kind::Slice => {
                self.out.pop("%rcx");
                self.out.drop_words(2);
                self.out.pop("%rax");
                self.out.drop_words(2);
                self.out.push("%rax");
                self.out.push("%rcx");
                self.compare_words(BinOp::Eq, false)
            }
            _ => self.compare_words(BinOp::Eq, false),
        }
    }

    /// `[a, b]` → `[a op b]` for one-word operands.
    pub(crate) fn compare_words(&mut self, op: BinOp, signed: bool) -> CodegenResult<()> {
        let cc = match (op, signed) {
            (BinOp::Eq, _) => "e",
            (BinOp::Ne, _) => "ne",
            (BinOp::Lt, true) => "l",
            (BinOp::Gt, true) => "g",
            (BinOp::Le, true) => "le",
            (BinOp::Ge, true) => "ge",
            (BinOp::Lt, false) => "b",
            (BinOp::Gt, false) => "a",
            (BinOp::Le, false) => "be",
            (BinOp::Ge, false) => "ae",
            _ => return Err(self.unsupported(format!("comparison {}", op.symbol()), Span::default())),
        };
        self.out.pop("%rcx");
        self.out.pop("%rax");
        emit!(self.out, "cmpq %rcx, %rax");
        emit!(self.out, "set{} %al", cc);
        emit!(self.out, "movzbq %al, %rax");
        self.out.push("%rax");
        Ok(())
    }

    // =========================================================================
    // Slices, literals and assertions
    // =========================================================================

    fn slice_expr(&mut self, object: &Expr, parts: [Option<&Expr>; 3], ty: &Type) -> CodegenResult<()> {
        let base = self.type_of(object)?;
        let base_kind = self.kind(&base)?;
        self.expr(object)?;

        // Normalize to [cap, len, ptr].
        let elem = match base_kind {
            Kind::Slice => types::elem_type(self.program, &base).map_err(|e| self.type_error(e))?,
            Kind::String => {
                self.out.pop("%rax");
                self.out.pop("%rcx");
                self.out.push("%rcx");
                self.out.push("%rcx");
                self.out.push("%rax");
                Type::Named(self.program.basic.uint8)
            }
            _ => {
                let array = match types::underlying(self.program, &base).map_err(|e| self.type_error(e))? {
                    Type::Pointer(inner) => types::underlying(self.program, &inner).map_err(|e| self.type_error(e))?,
                    other => other,
                };
                let Type::Array { len, elem } = array else {
                    return Err(self.unsupported("slice of non-array value", object.span));
                };
                self.out.pop("%rax");
                self.out.push_imm(len as i64);
                self.out.push_imm(len as i64);
                self.out.push("%rax");
                *elem
            }
        };
        let size = self.shape(&elem)?.size;

        for part in parts.iter().flatten() {
            self.expr(part)?;
        }
        let [low, high, max] = parts;
        if max.is_some() {
            self.out.pop("%r8");
        }
        if high.is_some() {
            self.out.pop("%rdi");
        }
        if low.is_some() {
            self.out.pop("%rsi");
        }
        self.out.pop("%rax");
        self.out.pop("%rcx");
        self.out.pop("%rdx");
        if low.is_none() {
            emit!(self.out, "xorl %esi, %esi");
        }
        if high.is_none() {
            emit!(self.out, "movq %rcx, %rdi");
        }
        if max.is_none() {
            emit!(self.out, "movq %rdx, %r8");
        }
        emit!(self.out, "movq %rdi, %rcx");
        emit!(self.out, "subq %rsi, %rcx");
        emit!(self.out, "movq %r8, %rdx");
        emit!(self.out, "subq %rsi, %rdx");
        if size != 1 {
            emit!(self.out, "imulq ${}, %rsi", size);
        }
        emit!(self.out, "addq %rsi, %rax");
        if self.kind(ty)? == Kind::Slice {
            self.out.push("%rdx");
        }
        self.out.push("%rcx");
        self.out.push("%rax");
        Ok(())
    }

    fn composite(&mut self, expr: &Expr, elts: &[Expr], ty: &Type) -> CodegenResult<()> {
        let span = expr.span;
        match types::underlying(self.program, ty).map_err(|e| self.type_error(e))? {
            Type::Struct(_) => {
                let layout = types::struct_layout(self.program, ty).map_err(|e| self.type_error(e.at(span)))?;
                self.heapalloc(layout.size)?;
                for (i, elt) in elts.iter().enumerate() {
                    let (field, value) = match &elt.kind {
                        ExprKind::KeyValue { key, value } => {
                            let ExprKind::Ident(name) = &key.kind else {
                                return Err(self.unsupported("struct literal key", key.span));
                            };
                            (layout.field(name), value.as_ref())
                        }
                        _ => (layout.fields.get(i), elt),
                    };
                    let field = field.ok_or_else(|| self.unsupported("struct literal element", elt.span))?;
                    let (offset, field_ty) = (field.offset, field.ty.clone());
                    self.element(offset, value, &field_ty)?;
                }
            }
            Type::Array { elem, len } => {
                let size = self.shape(&elem)?.size;
                let total = self.literal_size(size, len.max(elts.len() as u64) as usize, span)?;
                self.heapalloc(total)?;
                for (i, elt) in elts.iter().enumerate() {
                    self.element(size * i as u64, elt, &elem)?;
                }
            }
            Type::Slice(elem) => {
                let size = self.shape(&elem)?.size;
                let total = self.literal_size(size, elts.len(), span)?;
                self.heapalloc(total)?;
                for (i, elt) in elts.iter().enumerate() {
                    self.element(size * i as u64, elt, &elem)?;
                }
                self.out.pop("%rax");
                self.out.push_imm(elts.len() as i64);
                self.out.push_imm(elts.len() as i64);
                self.out.push("%rax");
            }
            _ => return Err(self.unsupported("composite literal", span)),
        }
        Ok(())
    }

    /// Bytes of a heap block holding `count` elements of `size` bytes.
    fn literal_size(&self, size: u64, count: usize, span: Span) -> CodegenResult<u64> {
        size.checked_mul(count as u64)
            .filter(|&n| n <= types::MAX_SIZE)
            .ok_or_else(|| self.unsupported(format!("composite literal of {} elements of {} bytes", count, size), span))
    }

    /// `[block]` → `[block]`, storing one element at `offset`.
    fn element(&mut self, offset: u64, value: &Expr, ty: &Type) -> CodegenResult<()> {
        self.dup();
        if offset > 0 {
            emit!(self.out, "addq ${}, (%rsp)", offset);
        }
        self.expr_as(value, ty)?;
        let shape = self.shape(ty)?;
        self.store(shape);
        Ok(())
    }

    /// `x.(T)`. The two-result form leaves `[ok, value]` with the value on top.
    pub(crate) fn type_assert(&mut self, object: &Expr, ty: &Type, comma_ok: bool) -> CodegenResult<()> {
        let shape = self.shape(ty)?;
        let tag = self.tag_of(ty)?;
        let fail = self.new_label("assert_fail");
        let end = self.new_label("assert_end");

        self.expr(object)?;
        self.out.pop("%rax");
        self.out.pop("%rcx");
        let depth = self.out.depth();
        emit!(self.out, "cmpq ${}, %rax", tag);
        emit!(self.out, "jne {}", fail);
        if comma_ok {
            self.out.push("$1");
        }
        self.out.push("%rcx");
        self.load(shape);
        emit!(self.out, "jmp {}", end);

        self.out.label(&fail);
        self.out.set_depth(depth);
        if comma_ok {
            self.out.push("$0");
        }
        self.zero_value(shape)?;
        self.out.label(&end);
        Ok(())
    }
}
