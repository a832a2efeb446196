// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Expression typing.
//!
//! Every value expression gets its static type recorded in
//! [`Analysis::types`](crate::Analysis). Untyped constants take the type the
//! context asks for (`hint`) when their value fits its kind, and their
//! default type otherwise.

use minigo_ast::expr::{BinOp, Expr, ExprKind, UnaryOp};
use minigo_ast::object::{Builtin, ObjDecl};
use minigo_ast::{ObjId, ObjKind, Span, Type};
use minigo_types::{self as types, eval_const, truncate, ConstValue, Kind};

use crate::analysis::{Callee, Method, StringLit};
use crate::error::{WalkError, WalkErrorKind, WalkResult};
use crate::walker::Walker;

/// Element sizes the runtime has an append routine for.
const APPEND_SIZES: [u64; 4] = [1, 8, 16, 24];

impl<'a> Walker<'a> {
    /// Type an expression, recording its type and, when constant, its value.
    pub(crate) fn expr(&mut self, expr: &Expr, hint: Option<&Type>) -> WalkResult<Type> {
        let ty = match eval_const(self.program, expr, 0)? {
            Some(value) => self.constant(expr, value, hint)?,
            None => self.value(expr, hint)?,
        };
        self.analysis.types.insert(expr.id, ty.clone());
        Ok(ty)
    }

    fn constant(&mut self, expr: &Expr, value: ConstValue, hint: Option<&Type>) -> WalkResult<Type> {
        let ty = if self.is_untyped(expr) {
            let default = match &value {
                ConstValue::Int(_) => self.int_type(),
                ConstValue::Bool(_) => self.bool_type(),
                ConstValue::Str(_) => self.string_type(),
            };
            match hint {
                Some(hint) if self.fits(&value, hint) => hint.clone(),
                _ => default,
            }
        } else {
            self.typed_constant(expr)?
        };

        let value = match value {
            ConstValue::Int(n) => ConstValue::Int(truncate(self.kind(&ty, expr.span)?, n)),
            other => other,
        };
        if let ConstValue::Str(bytes) = &value {
            if !self.analysis.string_labels.contains_key(&expr.id) {
                let label = self.analysis.string_label();
                self.analysis.string_labels.insert(expr.id, label.clone());
                self.package.strings.push(StringLit { label, bytes: bytes.clone() });
            }
        }
        self.analysis.consts.insert(expr.id, value);
        Ok(ty)
    }

    fn fits(&self, value: &ConstValue, ty: &Type) -> bool {
        match (value, types::kind(self.program, ty)) {
            (ConstValue::Int(_), Ok(k)) => k.is_integer(),
            (ConstValue::Bool(_), Ok(k)) => k == Kind::Bool,
            (ConstValue::Str(_), Ok(k)) => k == Kind::String,
            _ => false,
        }
    }

    /// Type of a constant expression built from typed constants or conversions.
    fn typed_constant(&self, expr: &Expr) -> WalkResult<Type> {
        match &expr.kind {
            ExprKind::Paren(inner) | ExprKind::Unary { operand: inner, .. } => self.typed_constant(inner),
            ExprKind::Ident(_) | ExprKind::Selector { .. } => {
                match self.object_of(expr).map(|obj| &self.program.object(obj).decl) {
                    Some(ObjDecl::Const { ty: Some(ty), .. }) => self.type_expr(ty),
                    _ => Err(WalkError::cannot_infer(expr.describe(), expr.span)),
                }
            }
            ExprKind::Call { func, .. } if self.program.builtin(func.id) == Some(Builtin::Len) => Ok(self.int_type()),
            ExprKind::Call { func, .. } => self.type_expr(func),
            ExprKind::Binary { op, .. } if op.is_comparison() => Ok(self.bool_type()),
            ExprKind::Binary { op: BinOp::Shl | BinOp::Shr, left, .. } => self.typed_constant(left),
            ExprKind::Binary { left, right, .. } => {
                if self.is_untyped(left) {
                    self.typed_constant(right)
                } else {
                    self.typed_constant(left)
                }
            }
            _ => Err(WalkError::cannot_infer(expr.describe(), expr.span)),
        }
    }

    fn value(&mut self, expr: &Expr, hint: Option<&Type>) -> WalkResult<Type> {
        let span = expr.span;
        match &expr.kind {
            ExprKind::Ident(name) => {
                if name == "_" {
                    return Err(WalkError::new(WalkErrorKind::NoValue { what: "_".to_string() }, span));
                }
                let obj = self
                    .program
                    .resolution(expr.id)
                    .ok_or_else(|| WalkError::cannot_infer(name.clone(), span))?;
                self.object_type(obj, expr, hint)
            }
            ExprKind::Paren(inner) => self.expr(inner, hint),
            ExprKind::Binary { op, left, right } => self.binary(expr, *op, left, right, hint),
            ExprKind::Unary { op, operand } => self.unary(expr, *op, operand, hint),
            ExprKind::Call { func, args } => self.call(expr, func, args, hint),
            ExprKind::Selector { object, field } => self.selector(expr, object, field),
            ExprKind::Index { object, index } => self.index(expr, object, index),
            ExprKind::Slice { object, low, high, max } => self.slice_expr(expr, object, [low, high, max]),
            ExprKind::Star(inner) => {
                if self.is_type_expr(inner) {
                    return Err(WalkError::new(WalkErrorKind::NoValue { what: "pointer type".to_string() }, span));
                }
                let ty = self.expr(inner, None)?;
                match types::underlying(self.program, &ty)? {
                    Type::Pointer(elem) => Ok(*elem),
                    _ => Err(WalkError::invalid_op("*", self.display(&ty), span)),
                }
            }
            ExprKind::CompositeLit { ty, elts } => self.composite(expr, ty.as_deref(), elts, hint),
            ExprKind::TypeAssert { object, ty } => self.type_assert(expr, object, ty.as_deref()),
            ExprKind::KeyValue { .. } => Err(WalkError::unsupported("key-value expression outside a composite literal", span)),
            ExprKind::ArrayType { .. } | ExprKind::StructType(_) | ExprKind::InterfaceType => {
                Err(WalkError::new(WalkErrorKind::NoValue { what: expr.describe().to_string() }, span))
            }
            ExprKind::BasicLit { .. } => Err(WalkError::cannot_infer("literal", span)),
        }
    }

    /// Type of a use of a declared object.
    fn object_type(&mut self, obj: ObjId, expr: &Expr, hint: Option<&Type>) -> WalkResult<Type> {
        let span = expr.span;
        let object = self.program.object(obj);
        let name = object.name.clone();
        let kind = object.kind;
        let is_nil = matches!(object.decl, ObjDecl::Nil);
        let is_builtin = matches!(object.decl, ObjDecl::Builtin(_));
        if let Some(var) = &object.var {
            return Ok(var.ty.clone());
        }

        if is_nil {
            return Ok(match hint {
                Some(hint) if matches!(self.kind(hint, span)?, Kind::Pointer | Kind::Slice | Kind::Interface) => {
                    hint.clone()
                }
                _ => Type::Nil,
            });
        }
        let no_value = |what: String| Err(WalkError::new(WalkErrorKind::NoValue { what }, span));
        match kind {
            ObjKind::Var => {
                if let Some(&index) = self.global_owner.get(&obj) {
                    self.global_spec(index)?;
                    if let Some(var) = &self.program.object(obj).var {
                        return Ok(var.ty.clone());
                    }
                }
                Err(WalkError::cannot_infer(name, span))
            }
            ObjKind::Func if is_builtin => no_value(format!("builtin {}", name)),
            ObjKind::Func => Err(WalkError::unsupported(format!("function value {}", name), span)),
            ObjKind::Type => no_value(format!("type {}", name)),
            ObjKind::Package => no_value(format!("package {}", name)),
            ObjKind::Const => Err(WalkError::cannot_infer(name, span)),
        }
    }

    pub(crate) fn is_nil(&self, expr: &Expr) -> bool {
        matches!(
            self.object_of(expr.unparen()).map(|obj| &self.program.object(obj).decl),
            Some(ObjDecl::Nil)
        )
    }

    // =========================================================================
    // Operators
    // =========================================================================

    fn binary(&mut self, expr: &Expr, op: BinOp, left: &Expr, right: &Expr, hint: Option<&Type>) -> WalkResult<Type> {
        let span = expr.span;
        if op.is_logical() {
            let boolean = self.bool_type();
            let l = self.expr(left, Some(&boolean))?;
            let r = self.expr(right, Some(&l))?;
            if self.kind(&l, left.span)? != Kind::Bool {
                return Err(WalkError::invalid_op(op.symbol(), self.display(&l), span));
            }
            self.check_same(op, &l, &r, span)?;
            return Ok(l);
        }

        if matches!(op, BinOp::Shl | BinOp::Shr) {
            let l = self.expr(left, hint)?;
            let r = self.expr(right, None)?;
            for (ty, side) in [(&l, left), (&r, right)] {
                if !self.kind(ty, side.span)?.is_integer() {
                    return Err(WalkError::invalid_op(op.symbol(), self.display(ty), span));
                }
            }
            return Ok(l);
        }

        let (l, r) = if self.is_untyped(left) && !self.is_untyped(right) {
            let r = self.expr(right, None)?;
            (self.expr(left, Some(&r))?, r)
        } else {
            let l = self.expr(left, if op.is_comparison() { None } else { hint })?;
            let r = self.expr(right, Some(&l))?;
            (l, r)
        };

        if op.is_comparison() {
            let with_nil = self.is_nil(left) || self.is_nil(right);
            self.check_comparable(op, &l, &r, with_nil, span)?;
            return Ok(match hint {
                Some(hint) if types::kind(self.program, hint).ok() == Some(Kind::Bool) => hint.clone(),
                _ => self.bool_type(),
            });
        }

        self.check_same(op, &l, &r, span)?;
        self.check_arithmetic(op, &l, span)?;
        Ok(l)
    }

    pub(crate) fn check_same(&self, op: BinOp, l: &Type, r: &Type, span: Span) -> WalkResult<()> {
        if types::identical(self.program, l, r) {
            Ok(())
        } else {
            Err(WalkError::new(
                WalkErrorKind::MismatchedTypes {
                    op: op.symbol().to_string(),
                    left: self.display(l),
                    right: self.display(r),
                },
                span,
            ))
        }
    }

    /// Operators other than comparisons and shifts: integers, and `+` on strings.
    pub(crate) fn check_arithmetic(&self, op: BinOp, ty: &Type, span: Span) -> WalkResult<()> {
        let kind = self.kind(ty, span)?;
        if kind.is_integer() || (op == BinOp::Add && kind == Kind::String) {
            Ok(())
        } else {
            Err(WalkError::invalid_op(op.symbol(), self.display(ty), span))
        }
    }

    pub(crate) fn check_comparable(
        &self,
        op: BinOp,
        l: &Type,
        r: &Type,
        with_nil: bool,
        span: Span,
    ) -> WalkResult<()> {
        if *l == Type::Nil || *r == Type::Nil {
            return Err(WalkError::invalid_op(op.symbol(), "nil".to_string(), span));
        }
        let (lk, rk) = (self.kind(l, span)?, self.kind(r, span)?);
        let equality = matches!(op, BinOp::Eq | BinOp::Ne);
        if lk == Kind::Interface || rk == Kind::Interface {
            return if equality && (self.assignable(l, r) || self.assignable(r, l)) {
                Ok(())
            } else {
                Err(WalkError::invalid_op(op.symbol(), self.display(l), span))
            };
        }
        self.check_same(op, l, r, span)?;
        let ok = match lk {
            k if k.is_integer() => true,
            Kind::Bool | Kind::Pointer => equality,
            Kind::String if equality => true,
            Kind::String => return Err(WalkError::unsupported("ordering comparison of strings", span)),
            Kind::Slice => equality && with_nil,
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            Err(WalkError::invalid_op(op.symbol(), self.display(l), span))
        }
    }

    fn unary(&mut self, expr: &Expr, op: UnaryOp, operand: &Expr, hint: Option<&Type>) -> WalkResult<Type> {
        let span = expr.span;
        match op {
            UnaryOp::Addr => {
                if let ExprKind::CompositeLit { .. } = operand.unparen().kind {
                    let elem = match hint.map(|h| types::underlying(self.program, h)) {
                        Some(Ok(Type::Pointer(elem))) => Some(*elem),
                        _ => None,
                    };
                    return Ok(Type::pointer_to(self.expr(operand, elem.as_ref())?));
                }
                let ty = self.expr(operand, None)?;
                if !self.is_addressable(operand) {
                    return Err(WalkError::new(
                        WalkErrorKind::NotAddressable { what: operand.describe().to_string() },
                        operand.span,
                    ));
                }
                Ok(Type::pointer_to(ty))
            }
            UnaryOp::Not => {
                let ty = self.expr(operand, hint)?;
                if self.kind(&ty, span)? != Kind::Bool {
                    return Err(WalkError::invalid_op("!", self.display(&ty), span));
                }
                Ok(ty)
            }
            UnaryOp::Neg | UnaryOp::Plus | UnaryOp::BitNot => {
                let ty = self.expr(operand, hint)?;
                if !self.kind(&ty, span)?.is_integer() {
                    let symbol = match op {
                        UnaryOp::Neg => "-",
                        UnaryOp::Plus => "+",
                        _ => "^",
                    };
                    return Err(WalkError::invalid_op(symbol, self.display(&ty), span));
                }
                Ok(ty)
            }
        }
    }

    // =========================================================================
    // Selectors, indexing and literals
    // =========================================================================

    fn selector(&mut self, expr: &Expr, object: &Expr, field: &str) -> WalkResult<Type> {
        if let Some(package) = types::imported_package(self.program, object) {
            let obj = self.program.exported(&package, field).ok_or_else(|| {
                WalkError::new(
                    WalkErrorKind::UndefinedQualified { package: package.clone(), name: field.to_string() },
                    expr.span,
                )
            })?;
            self.program.resolve(expr.id, obj);
            return self.object_type(obj, expr, None);
        }

        let base = self.expr(object, None)?;
        let target = match types::underlying(self.program, &base)? {
            Type::Pointer(elem) => *elem,
            _ => base.clone(),
        };
        match types::field(self.program, &target, field) {
            Ok(layout) => Ok(layout.ty),
            Err(_) if self.method_named(&base, field).is_some() => {
                Err(WalkError::unsupported(format!("method value {}", field), expr.span))
            }
            Err(e) => Err(e.at(expr.span).into()),
        }
    }

    /// Method `name` of a receiver of static type `recv`, and whether `recv` is a pointer.
    pub(crate) fn method_named(&self, recv: &Type, name: &str) -> Option<(Method, bool)> {
        let (named, is_ptr) = match recv {
            Type::Named(obj) => (*obj, false),
            Type::Pointer(inner) => match inner.as_ref() {
                Type::Named(obj) => (*obj, true),
                _ => return None,
            },
            _ => return None,
        };
        self.analysis.methods.lookup(named, name).cloned().map(|m| (m, is_ptr))
    }

    fn index(&mut self, expr: &Expr, object: &Expr, index: &Expr) -> WalkResult<Type> {
        let base = self.expr(object, None)?;
        let int = self.int_type();
        let ty = self.expr(index, Some(&int))?;
        if !self.kind(&ty, index.span)?.is_integer() {
            return Err(WalkError::mismatch("int".to_string(), self.display(&ty), index.span));
        }
        let constant = match self.analysis.consts.get(&index.id) {
            Some(ConstValue::Int(n)) => Some(*n),
            _ => None,
        };
        if let Some(n) = constant.filter(|n| *n < 0) {
            return Err(WalkError::new(WalkErrorKind::NegativeIndex { index: n }, index.span));
        }

        let array = match types::underlying(self.program, &base)? {
            Type::Pointer(inner) => types::underlying(self.program, &inner)?,
            other => other,
        };
        if let Type::Array { len, elem } = array {
            if let Some(n) = constant.filter(|&n| n as u64 >= len) {
                return Err(WalkError::new(WalkErrorKind::IndexOutOfRange { index: n, len }, index.span));
            }
            return Ok(*elem);
        }
        types::elem_type(self.program, &base).map_err(|e| e.at(expr.span).into())
    }

    fn slice_expr(&mut self, expr: &Expr, object: &Expr, parts: [&Option<Box<Expr>>; 3]) -> WalkResult<Type> {
        let base = self.expr(object, None)?;
        let int = self.int_type();
        for part in parts.iter().copied().flatten() {
            let ty = self.expr(part, Some(&int))?;
            if !self.kind(&ty, part.span)?.is_integer() {
                return Err(WalkError::mismatch("int".to_string(), self.display(&ty), part.span));
            }
        }
        match types::underlying(self.program, &base)? {
            Type::Slice(_) => Ok(base),
            Type::Array { elem, .. } => {
                if !self.is_addressable(object) {
                    return Err(WalkError::new(
                        WalkErrorKind::NotAddressable { what: object.describe().to_string() },
                        object.span,
                    ));
                }
                Ok(Type::Slice(elem))
            }
            Type::Pointer(inner) => match types::underlying(self.program, &inner)? {
                Type::Array { elem, .. } => Ok(Type::Slice(elem)),
                _ => Err(WalkError::invalid_op("slice", self.display(&base), expr.span)),
            },
            _ if self.kind(&base, expr.span)? == Kind::String => {
                if parts[2].is_some() {
                    return Err(WalkError::unsupported("3-index slice of string", expr.span));
                }
                Ok(base)
            }
            _ => Err(WalkError::invalid_op("slice", self.display(&base), expr.span)),
        }
    }

    fn composite(&mut self, expr: &Expr, ty: Option<&Expr>, elts: &[Expr], hint: Option<&Type>) -> WalkResult<Type> {
        let span = expr.span;
        let ty = match ty {
            Some(ty) => self.type_expr(ty)?,
            None => hint.cloned().ok_or_else(|| WalkError::cannot_infer("composite literal", span))?,
        };
        match types::underlying(self.program, &ty)? {
            Type::Struct(_) => {
                let layout = types::struct_layout(self.program, &ty)?;
                let keyed = elts.iter().filter(|e| matches!(e.kind, ExprKind::KeyValue { .. })).count();
                if keyed == elts.len() {
                    for elt in elts {
                        let ExprKind::KeyValue { key, value } = &elt.kind else { continue };
                        let ExprKind::Ident(name) = &key.kind else {
                            return Err(WalkError::unsupported("struct literal key that is not a field name", key.span));
                        };
                        let field = layout.field(name).ok_or_else(|| {
                            WalkError::from(minigo_types::TypeError::new(
                                minigo_types::TypeErrorKind::NoField { ty: self.display(&ty), field: name.clone() },
                                key.span,
                            ))
                        })?;
                        let field_ty = field.ty.clone();
                        let found = self.expr(value, Some(&field_ty))?;
                        self.check_assignable(&found, &field_ty, value.span)?;
                    }
                } else if keyed == 0 {
                    if elts.len() != layout.fields.len() {
                        return Err(WalkError::new(
                            WalkErrorKind::AssignmentCount { lhs: layout.fields.len(), rhs: elts.len() },
                            span,
                        ));
                    }
                    for (elt, field) in elts.iter().zip(&layout.fields) {
                        let found = self.expr(elt, Some(&field.ty))?;
                        self.check_assignable(&found, &field.ty, elt.span)?;
                    }
                } else {
                    return Err(WalkError::unsupported("mixture of field:value and value elements", span));
                }
            }
            Type::Array { len, elem } => {
                if elts.len() as u64 > len {
                    return Err(WalkError::new(WalkErrorKind::TooManyElements { len, found: elts.len() }, span));
                }
                self.elements(&elem, elts)?;
            }
            Type::Slice(elem) => self.elements(&elem, elts)?,
            _ => {
                return Err(WalkError::unsupported(format!("composite literal of type {}", self.display(&ty)), span));
            }
        }
        Ok(ty)
    }

    fn elements(&mut self, elem: &Type, elts: &[Expr]) -> WalkResult<()> {
        for elt in elts {
            if let ExprKind::KeyValue { .. } = elt.kind {
                return Err(WalkError::unsupported("keyed array or slice element", elt.span));
            }
            let found = self.expr(elt, Some(elem))?;
            self.check_assignable(&found, elem, elt.span)?;
        }
        Ok(())
    }

    fn type_assert(&mut self, expr: &Expr, object: &Expr, ty: Option<&Expr>) -> WalkResult<Type> {
        let ty = ty.ok_or_else(|| WalkError::unsupported("use of .(type) outside type switch", expr.span))?;
        let subject = self.expr(object, None)?;
        if self.kind(&subject, object.span)? != Kind::Interface {
            return Err(WalkError::new(WalkErrorKind::NotInterface { what: self.display(&subject) }, object.span));
        }
        let target = self.type_expr(ty)?;
        if self.kind(&target, ty.span)? == Kind::Interface {
            return Err(WalkError::unsupported("type assertion to an interface type", ty.span));
        }
        Ok(target)
    }

    /// Types produced by the single right-hand side of an `n`-to-1 assignment.
    pub(crate) fn multi_value(&mut self, value: &Expr, count: usize) -> WalkResult<Vec<Type>> {
        let mismatch = |rhs| WalkError::new(WalkErrorKind::AssignmentCount { lhs: count, rhs }, value.span);
        match &value.kind {
            ExprKind::TypeAssert { .. } if count == 2 => {
                self.analysis.comma_ok.insert(value.id);
                let ty = self.expr(value, None)?;
                Ok(vec![ty, self.bool_type()])
            }
            ExprKind::Call { .. } => match self.expr(value, None)? {
                Type::Tuple(items) if items.len() == count => Ok(items),
                Type::Tuple(items) => Err(mismatch(items.len())),
                _ => Err(mismatch(1)),
            },
            _ => Err(mismatch(1)),
        }
    }

    // =========================================================================
    // Calls
    // =========================================================================

    fn call(&mut self, expr: &Expr, func: &Expr, args: &[Expr], hint: Option<&Type>) -> WalkResult<Type> {
        let callee = func.unparen();
        if let Some(builtin) = self.program.builtin(callee.id) {
            self.analysis.calls.insert(expr.id, Callee::Builtin(builtin));
            return self.builtin(expr, builtin, args, hint);
        }
        if self.is_type_expr(callee) {
            return self.conversion(expr, callee, args);
        }

        if let ExprKind::Selector { object, field } = &callee.kind {
            if types::imported_package(self.program, object).is_none() {
                let recv = self.expr(object, None)?;
                let Some((method, recv_is_ptr)) = self.method_named(&recv, field) else {
                    return Err(WalkError::new(
                        WalkErrorKind::NotCallable { what: format!("{}.{}", self.display(&recv), field) },
                        callee.span,
                    ));
                };
                if method.ptr_recv && !recv_is_ptr && !self.is_addressable(object) {
                    return Err(WalkError::new(
                        WalkErrorKind::NotAddressable { what: format!("{} to call pointer method {}", object.describe(), field) },
                        object.span,
                    ));
                }
                let func = self
                    .analysis
                    .func(method.func)
                    .cloned()
                    .ok_or_else(|| WalkError::cannot_infer(format!("method {}", field), callee.span))?;
                let params: Vec<Type> = func.params.iter().skip(1).map(|s| s.ty.clone()).collect();
                self.arguments(&func.name, &params, args, expr)?;
                self.analysis
                    .calls
                    .insert(expr.id, Callee::Method { func: method.func, ptr_recv: method.ptr_recv });
                return Ok(func.call_type());
            }
        }

        let not_callable = || WalkError::new(WalkErrorKind::NotCallable { what: callee.describe().to_string() }, callee.span);
        let obj = self.object_of(callee).ok_or_else(not_callable)?;
        if self.program.object(obj).kind != ObjKind::Func {
            return Err(not_callable());
        }
        let func = self.analysis.func(obj).cloned().ok_or_else(not_callable)?;
        if let ExprKind::Selector { .. } = callee.kind {
            self.program.resolve(callee.id, obj);
        }
        let params: Vec<Type> = func.params.iter().map(|s| s.ty.clone()).collect();
        self.arguments(&func.name, &params, args, expr)?;
        self.analysis.calls.insert(expr.id, Callee::Func(obj));
        Ok(func.call_type())
    }

    fn arguments(&mut self, name: &str, params: &[Type], args: &[Expr], call: &Expr) -> WalkResult<()> {
        if args.len() != params.len() {
            return Err(WalkError::new(
                WalkErrorKind::ArgumentCount { name: name.to_string(), expected: params.len(), found: args.len() },
                call.span,
            ));
        }
        for (arg, param) in args.iter().zip(params) {
            let found = self.expr(arg, Some(param))?;
            self.check_assignable(&found, param, arg.span)?;
        }
        Ok(())
    }

    fn arity(&self, builtin: Builtin, args: &[Expr], min: usize, max: usize, call: &Expr) -> WalkResult<()> {
        if args.len() < min || args.len() > max {
            let expected = if args.len() < min { min } else { max };
            return Err(WalkError::new(
                WalkErrorKind::ArgumentCount { name: builtin.name().to_string(), expected, found: args.len() },
                call.span,
            ));
        }
        Ok(())
    }

    fn builtin(&mut self, call: &Expr, builtin: Builtin, args: &[Expr], hint: Option<&Type>) -> WalkResult<Type> {
        let span = call.span;
        let int = self.int_type();
        match builtin {
            Builtin::Len | Builtin::Cap => {
                self.arity(builtin, args, 1, 1, call)?;
                let ty = self.expr(&args[0], None)?;
                let kind = self.kind(&ty, args[0].span)?;
                let ok = matches!(kind, Kind::Slice | Kind::Array) || (builtin == Builtin::Len && kind == Kind::String);
                if !ok {
                    return Err(WalkError::invalid_op(builtin.name(), self.display(&ty), span));
                }
                Ok(int)
            }
            Builtin::New => {
                self.arity(builtin, args, 1, 1, call)?;
                let ty = self.type_expr(&args[0])?;
                self.size(&ty, args[0].span)?;
                Ok(Type::pointer_to(ty))
            }
            Builtin::Make => {
                self.arity(builtin, args, 2, 3, call)?;
                let ty = self.type_expr(&args[0])?;
                if self.kind(&ty, args[0].span)? != Kind::Slice {
                    return Err(WalkError::unsupported(format!("make of {}", self.display(&ty)), args[0].span));
                }
                for arg in &args[1..] {
                    let found = self.expr(arg, Some(&int))?;
                    if !self.kind(&found, arg.span)?.is_integer() {
                        return Err(WalkError::mismatch("int".to_string(), self.display(&found), arg.span));
                    }
                }
                Ok(ty)
            }
            Builtin::Append => {
                self.arity(builtin, args, 2, usize::MAX, call)?;
                let slice = self.expr(&args[0], hint)?;
                let Type::Slice(elem) = types::underlying(self.program, &slice)? else {
                    return Err(WalkError::invalid_op("append", self.display(&slice), args[0].span));
                };
                let size = self.size(&elem, span)?;
                if !APPEND_SIZES.contains(&size) {
                    return Err(WalkError::unsupported(format!("append of {}-byte elements", size), span));
                }
                for arg in &args[1..] {
                    let found = self.expr(arg, Some(&elem))?;
                    self.check_assignable(&found, &elem, arg.span)?;
                }
                Ok(slice)
            }
            Builtin::Panic => {
                self.arity(builtin, args, 1, 1, call)?;
                let found = self.expr(&args[0], Some(&Type::Interface))?;
                self.check_assignable(&found, &Type::Interface, args[0].span)?;
                Ok(Type::Tuple(Vec::new()))
            }
            Builtin::Print => {
                for arg in args {
                    let found = self.expr(arg, None)?;
                    let kind = self.kind(&found, arg.span)?;
                    if !(kind.is_integer() || kind == Kind::Bool || kind == Kind::String) {
                        return Err(WalkError::invalid_op("print", self.display(&found), arg.span));
                    }
                }
                Ok(Type::Tuple(Vec::new()))
            }
        }
    }

    fn conversion(&mut self, call: &Expr, func: &Expr, args: &[Expr]) -> WalkResult<Type> {
        let target = self.type_expr(func)?;
        if args.len() != 1 {
            return Err(WalkError::new(
                WalkErrorKind::ArgumentCount { name: self.display(&target), expected: 1, found: args.len() },
                call.span,
            ));
        }
        let found = self.expr(&args[0], Some(&target))?;
        if !self.convertible(&found, &target) {
            return Err(WalkError::new(
                WalkErrorKind::InvalidConversion { from: self.display(&found), to: self.display(&target) },
                call.span,
            ));
        }
        self.analysis.calls.insert(call.id, Callee::Conversion(target.clone()));
        Ok(target)
    }

    fn convertible(&self, src: &Type, dst: &Type) -> bool {
        if self.assignable(src, dst) {
            return true;
        }
        let (Ok(sk), Ok(dk)) = (types::kind(self.program, src), types::kind(self.program, dst)) else {
            return false;
        };
        if sk.is_integer() && dk.is_integer() {
            return true;
        }
        let bytes = |ty: &Type| match types::underlying(self.program, ty) {
            Ok(Type::Slice(elem)) => types::kind(self.program, &elem).ok() == Some(Kind::Uint8),
            _ => false,
        };
        if (sk == Kind::String && bytes(dst)) || (bytes(src) && dk == Kind::String) {
            return true;
        }
        match (types::underlying(self.program, src), types::underlying(self.program, dst)) {
            (Ok(a), Ok(b)) => types::identical(self.program, &a, &b),
            _ => false,
        }
    }
}
