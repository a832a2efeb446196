// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Analyzer state and the type helpers shared by both passes.

use std::collections::HashMap;

use minigo_ast::decl::{File, ValueSpec};
use minigo_ast::expr::{BinOp, Expr, ExprKind, UnaryOp};
use minigo_ast::object::ObjDecl;
use minigo_ast::{NodeId, ObjId, ObjKind, Program, Span, Type, Variable};
use minigo_types::{self as types, Kind};

use crate::analysis::{word_align, Analysis, Package};
use crate::error::{WalkError, WalkErrorKind, WalkResult};

/// Progress of a package-level `var` spec whose types may be inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SpecState {
    Pending,
    Active,
    Done,
}

/// Frame of the function whose body is being walked.
#[derive(Debug)]
pub(crate) struct Frame {
    /// Symbol of the function, e.g. `main.$T.Get`.
    pub symbol: String,
    pub local_size: u64,
    pub results: Vec<Type>,
}

/// An enclosing statement `break` or `continue` may target.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Target {
    pub stmt: NodeId,
    pub is_loop: bool,
}

pub(crate) struct Walker<'a> {
    pub program: &'a mut Program,
    pub analysis: &'a mut Analysis,
    pub files: &'a [File],
    pub package: Package,
    pub globals: Vec<&'a ValueSpec>,
    pub global_state: Vec<SpecState>,
    /// Package-level variable → index of its spec in `globals`.
    pub global_owner: HashMap<ObjId, usize>,
    pub frame: Option<Frame>,
    pub targets: Vec<Target>,
}

impl<'a> Walker<'a> {
    pub fn new(program: &'a mut Program, analysis: &'a mut Analysis, files: &'a [File], name: &str) -> Self {
        Self {
            program,
            analysis,
            files,
            package: Package { name: name.to_string(), ..Package::default() },
            globals: Vec::new(),
            global_state: Vec::new(),
            global_owner: HashMap::new(),
            frame: None,
            targets: Vec::new(),
        }
    }

    // =========================================================================
    // Types
    // =========================================================================

    pub fn int_type(&self) -> Type {
        Type::Named(self.program.basic.int)
    }

    pub fn bool_type(&self) -> Type {
        Type::Named(self.program.basic.bool)
    }

    pub fn string_type(&self) -> Type {
        Type::Named(self.program.basic.string)
    }

    pub fn type_expr(&self, expr: &Expr) -> WalkResult<Type> {
        Ok(types::from_expr(self.program, expr)?)
    }

    pub fn kind(&self, ty: &Type, span: Span) -> WalkResult<Kind> {
        types::kind(self.program, ty).map_err(|e| WalkError::from(e.at(span)))
    }

    pub fn size(&self, ty: &Type, span: Span) -> WalkResult<u64> {
        types::size_of(self.program, ty).map_err(|e| WalkError::from(e.at(span)))
    }

    pub fn display(&self, ty: &Type) -> String {
        match ty {
            Type::Tuple(items) if items.is_empty() => "no value".to_string(),
            _ => types::display(self.program, ty),
        }
    }

    /// Whether a value of type `src` may be stored where `dst` is expected.
    pub fn assignable(&self, src: &Type, dst: &Type) -> bool {
        if types::identical(self.program, src, dst) {
            return true;
        }
        let dst_kind = types::kind(self.program, dst).ok();
        if *src == Type::Nil {
            return matches!(dst_kind, Some(Kind::Pointer | Kind::Slice | Kind::Interface));
        }
        if matches!(src, Type::Tuple(_)) {
            return false;
        }
        if dst_kind == Some(Kind::Interface) {
            return true;
        }
        // A named and an unnamed type with the same underlying type.
        let named = |t: &Type| matches!(t, Type::Named(_));
        if named(src) && named(dst) {
            return false;
        }
        match (types::underlying(self.program, src), types::underlying(self.program, dst)) {
            (Ok(a), Ok(b)) => types::identical(self.program, &a, &b),
            _ => false,
        }
    }

    pub fn check_assignable(&self, src: &Type, dst: &Type, span: Span) -> WalkResult<()> {
        if self.assignable(src, dst) {
            Ok(())
        } else {
            Err(WalkError::mismatch(self.display(dst), self.display(src), span))
        }
    }

    /// The type a variable gets when declared from a value of type `ty`.
    pub fn declared_type(&self, ty: Type, span: Span) -> WalkResult<Type> {
        match ty {
            Type::Nil => Err(WalkError::new(WalkErrorKind::UntypedNil, span)),
            Type::Tuple(items) if items.is_empty() => {
                Err(WalkError::new(WalkErrorKind::NoValue { what: "call with no result".to_string() }, span))
            }
            Type::Tuple(_) => Err(WalkError::unsupported("multiple-value expression in single-value context", span)),
            ty => Ok(ty),
        }
    }

    // =========================================================================
    // Storage
    // =========================================================================

    /// Reserve a word-aligned local slot below the frame base.
    pub fn alloc_local(&mut self, ty: &Type, span: Span) -> WalkResult<i64> {
        let size = word_align(self.size(ty, span)?);
        let frame = self
            .frame
            .as_mut()
            .ok_or_else(|| WalkError::unsupported("local variable outside a function", span))?;
        frame.local_size = frame
            .local_size
            .checked_add(size)
            .filter(|&n| n <= types::MAX_SIZE)
            .ok_or_else(|| WalkError::unsupported("locals larger than 2 GiB", span))?;
        Ok(-(frame.local_size as i64))
    }

    /// Give a declared local variable its slot and type.
    pub fn bind_local(&mut self, obj: ObjId, ty: Type, span: Span) -> WalkResult<()> {
        let offset = self.alloc_local(&ty, span)?;
        log::trace!("local {} at {}(%rbp)", self.program.object(obj).name, offset);
        self.program.object_mut(obj).var = Some(Variable::local(offset, ty));
        Ok(())
    }

    pub fn global_symbol(&self, name: &str) -> String {
        format!("{}.{}", self.package.name, name)
    }

    /// Object bound to an identifier or a package-qualified selector.
    pub fn object_of(&self, expr: &Expr) -> Option<ObjId> {
        match &expr.kind {
            ExprKind::Ident(_) => self.program.resolution(expr.id),
            ExprKind::Selector { object, field } => {
                let package = types::imported_package(self.program, object)?;
                self.program.exported(&package, field)
            }
            ExprKind::Paren(inner) => self.object_of(inner),
            _ => None,
        }
    }

    pub fn is_blank(expr: &Expr) -> bool {
        matches!(&expr.kind, ExprKind::Ident(name) if name == "_")
    }

    /// Whether an expression denotes a type rather than a value.
    pub fn is_type_expr(&self, expr: &Expr) -> bool {
        match &expr.kind {
            ExprKind::Paren(inner) | ExprKind::Star(inner) => self.is_type_expr(inner),
            ExprKind::Ident(_) | ExprKind::Selector { .. } => {
                matches!(self.object_of(expr), Some(obj) if self.program.object(obj).kind == ObjKind::Type)
            }
            ExprKind::ArrayType { .. } | ExprKind::StructType(_) | ExprKind::InterfaceType => true,
            _ => false,
        }
    }

    /// Whether an expression is an untyped constant or `nil`.
    pub fn is_untyped(&self, expr: &Expr) -> bool {
        match &expr.kind {
            ExprKind::BasicLit { .. } => true,
            ExprKind::Ident(_) | ExprKind::Selector { .. } => match self.object_of(expr) {
                Some(obj) => matches!(
                    self.program.object(obj).decl,
                    ObjDecl::Const { ty: None, .. } | ObjDecl::Bool(_) | ObjDecl::Iota | ObjDecl::Nil
                ),
                None => false,
            },
            ExprKind::Paren(inner) => self.is_untyped(inner),
            ExprKind::Unary { op, operand } => *op != UnaryOp::Addr && self.is_untyped(operand),
            ExprKind::Binary { op, left, right } => match op {
                BinOp::Shl | BinOp::Shr => self.is_untyped(left),
                _ => self.is_untyped(left) && self.is_untyped(right),
            },
            _ => false,
        }
    }

    /// Whether an expression denotes a storage location.
    pub fn is_addressable(&self, expr: &Expr) -> bool {
        match &expr.kind {
            ExprKind::Paren(inner) => self.is_addressable(inner),
            ExprKind::Ident(_) => matches!(
                self.program.resolution(expr.id).map(|obj| self.program.object(obj)),
                Some(obj) if obj.kind == ObjKind::Var && !matches!(obj.decl, ObjDecl::Nil)
            ),
            ExprKind::Selector { object, .. } => {
                if types::imported_package(self.program, object).is_some() {
                    return matches!(self.object_of(expr), Some(obj) if self.program.object(obj).kind == ObjKind::Var);
                }
                let through_pointer = matches!(
                    self.analysis.type_of(object.id).map(|t| types::kind(self.program, t)),
                    Some(Ok(Kind::Pointer))
                );
                through_pointer || self.is_addressable(object)
            }
            ExprKind::Index { object, .. } => match self.analysis.type_of(object.id).map(|t| types::kind(self.program, t)) {
                Some(Ok(Kind::Slice | Kind::Pointer)) => true,
                Some(Ok(Kind::Array)) => self.is_addressable(object),
                _ => false,
            },
            ExprKind::Star(_) => true,
            _ => false,
        }
    }
}
