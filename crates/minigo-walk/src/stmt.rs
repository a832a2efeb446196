// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Function bodies: statement checking, local slots and branch targets.

use minigo_ast::decl::{Decl, DeclKind, FuncDecl};
use minigo_ast::expr::{BinOp, Expr, ExprKind};
use minigo_ast::stmt::{AssignOp, Block, BranchKind, CaseClause, Stmt, StmtKind, TypeCaseClause};
use minigo_ast::{NodeId, Span, Type};
use minigo_types::{self as types, Kind};

use crate::analysis::RangeLocals;
use crate::error::{WalkError, WalkErrorKind, WalkResult};
use crate::walker::{Frame, Target, Walker};

impl<'a> Walker<'a> {
    pub(crate) fn walk_func(&mut self, func: &FuncDecl) -> WalkResult<()> {
        let Some(body) = &func.body else { return Ok(()) };
        let obj = self
            .program
            .resolution(func.name.id)
            .ok_or_else(|| WalkError::cannot_infer(format!("function {}", func.name.name), func.name.span))?;
        let info = self.analysis.func(obj);
        let results = info.map(|f| f.result_types()).unwrap_or_default();
        let symbol = info.map(|f| f.symbol.clone()).unwrap_or_else(|| func.name.name.clone());

        self.frame = Some(Frame { symbol, local_size: 0, results });
        let walked = self.block(body);
        let frame = self.frame.take();
        walked?;

        let local_size = frame.map(|f| f.local_size).unwrap_or(0);
        if let Some(info) = self.analysis.funcs.get_mut(&obj) {
            log::trace!("func {}: {} bytes of locals", info.symbol, local_size);
            info.local_size = local_size;
        }
        Ok(())
    }

    fn block(&mut self, block: &Block) -> WalkResult<()> {
        self.stmts(&block.stmts)
    }

    fn stmts(&mut self, stmts: &[Stmt]) -> WalkResult<()> {
        for stmt in stmts {
            self.stmt(stmt)?;
        }
        Ok(())
    }

    fn stmt(&mut self, stmt: &Stmt) -> WalkResult<()> {
        match &stmt.kind {
            StmtKind::Decl(decl) => self.local_decl(decl),
            StmtKind::Expr(expr) => {
                if !matches!(expr.unparen().kind, ExprKind::Call { .. }) {
                    return Err(WalkError::unsupported(format!("{} used as statement", expr.describe()), expr.span));
                }
                self.expr(expr, None)?;
                Ok(())
            }
            StmtKind::Assign { lhs, op, rhs } => match op {
                AssignOp::Assign => self.assign(lhs, rhs, stmt.span),
                AssignOp::Define => self.define(lhs, rhs, stmt.span),
                AssignOp::Compound(op) => self.compound(*op, lhs, rhs, stmt.span),
            },
            StmtKind::IncDec { target, inc } => {
                let ty = self.lvalue(target)?.ok_or_else(|| WalkError::new(WalkErrorKind::NoValue { what: "_".to_string() }, target.span))?;
                if !self.kind(&ty, target.span)?.is_integer() {
                    return Err(WalkError::invalid_op(if *inc { "++" } else { "--" }, self.display(&ty), stmt.span));
                }
                Ok(())
            }
            StmtKind::Return(values) => self.return_stmt(values, stmt.span),
            StmtKind::If { init, cond, then_block, else_branch } => {
                if let Some(init) = init {
                    self.stmt(init)?;
                }
                self.condition(cond)?;
                self.block(then_block)?;
                if let Some(else_branch) = else_branch {
                    self.stmt(else_branch)?;
                }
                Ok(())
            }
            StmtKind::For { init, cond, post, body } => {
                if let Some(init) = init {
                    self.stmt(init)?;
                }
                if let Some(cond) = cond {
                    self.condition(cond)?;
                }
                if let Some(post) = post {
                    if let StmtKind::Assign { op: AssignOp::Define, .. } = post.kind {
                        return Err(WalkError::unsupported("short variable declaration in for post statement", post.span));
                    }
                    self.stmt(post)?;
                }
                self.with_target(stmt.id, true, |w| w.block(body))
            }
            StmtKind::Range { key, value, define, collection, body } => {
                self.range(stmt, key.as_ref(), value.as_ref(), *define, collection)?;
                self.with_target(stmt.id, true, |w| w.block(body))
            }
            StmtKind::Switch { init, tag, clauses } => {
                if let Some(init) = init {
                    self.stmt(init)?;
                }
                self.switch(stmt.id, tag.as_ref(), clauses)
            }
            StmtKind::TypeSwitch { init, subject, clauses, .. } => {
                if let Some(init) = init {
                    self.stmt(init)?;
                }
                self.type_switch(stmt.id, subject, clauses)
            }
            StmtKind::Branch(kind) => self.branch(stmt, *kind),
            StmtKind::Block(block) => self.block(block),
            StmtKind::Empty => Ok(()),
        }
    }

    fn with_target<T>(
        &mut self,
        stmt: NodeId,
        is_loop: bool,
        f: impl FnOnce(&mut Self) -> WalkResult<T>,
    ) -> WalkResult<T> {
        self.targets.push(Target { stmt, is_loop });
        let result = f(self);
        self.targets.pop();
        result
    }

    fn branch(&mut self, stmt: &Stmt, kind: BranchKind) -> WalkResult<()> {
        let target = match kind {
            BranchKind::Break => self.targets.last(),
            BranchKind::Continue => self.targets.iter().rev().find(|t| t.is_loop),
        };
        let Some(target) = target else {
            let (name, or_switch) = match kind {
                BranchKind::Break => ("break", true),
                BranchKind::Continue => ("continue", false),
            };
            return Err(WalkError::new(
                WalkErrorKind::BranchOutside { stmt: name.to_string(), or_switch },
                stmt.span,
            ));
        };
        self.analysis.branch_targets.insert(stmt.id, target.stmt);
        Ok(())
    }

    fn local_decl(&mut self, decl: &Decl) -> WalkResult<()> {
        match &decl.kind {
            DeclKind::Var(spec) => {
                let tys = self.value_spec_types(spec)?;
                for (name, ty) in spec.names.iter().zip(tys) {
                    if name.is_blank() {
                        continue;
                    }
                    if let Some(obj) = self.program.resolution(name.id) {
                        self.bind_local(obj, ty, name.span)?;
                    }
                }
                Ok(())
            }
            DeclKind::Const(_) => Ok(()),
            DeclKind::Type(spec) => {
                if let (Some(obj), Some(frame)) = (self.program.resolution(spec.name.id), &self.frame) {
                    let qualifier = format!("{}#{}", frame.symbol, obj.0);
                    self.program.object_mut(obj).qualifier = Some(qualifier);
                }
                self.local_type(spec)
            }
            DeclKind::Func(func) => Err(WalkError::unsupported("nested function declaration", func.name.span)),
        }
    }

    fn condition(&mut self, cond: &Expr) -> WalkResult<()> {
        let boolean = self.bool_type();
        let ty = self.expr(cond, Some(&boolean))?;
        if self.kind(&ty, cond.span)? != Kind::Bool {
            return Err(WalkError::mismatch("bool".to_string(), self.display(&ty), cond.span));
        }
        Ok(())
    }

    // =========================================================================
    // Assignment
    // =========================================================================

    /// Type of an assignment target; `None` for the blank identifier.
    fn lvalue(&mut self, target: &Expr) -> WalkResult<Option<Type>> {
        if Self::is_blank(target) {
            return Ok(None);
        }
        let ty = self.expr(target, None)?;
        if !self.is_addressable(target) {
            return Err(WalkError::new(
                WalkErrorKind::NotAssignable { what: target.describe().to_string() },
                target.span,
            ));
        }
        Ok(Some(ty))
    }

    /// Check right-hand sides against targets of the given types.
    fn values_for(&mut self, targets: &[Option<Type>], rhs: &[Expr], span: Span) -> WalkResult<Vec<Type>> {
        if rhs.len() == targets.len() {
            let mut found = Vec::with_capacity(rhs.len());
            for (target, value) in targets.iter().zip(rhs) {
                let ty = self.expr(value, target.as_ref())?;
                match target {
                    Some(target) => self.check_assignable(&ty, target, value.span)?,
                    None => {
                        self.declared_type(ty.clone(), value.span)?;
                    }
                }
                found.push(ty);
            }
            return Ok(found);
        }
        match rhs {
            [value] => {
                let found = self.multi_value(value, targets.len())?;
                for (ty, target) in found.iter().zip(targets) {
                    if let Some(target) = target {
                        self.check_assignable(ty, target, value.span)?;
                    }
                }
                Ok(found)
            }
            _ => Err(WalkError::new(
                WalkErrorKind::AssignmentCount { lhs: targets.len(), rhs: rhs.len() },
                span,
            )),
        }
    }

    fn assign(&mut self, lhs: &[Expr], rhs: &[Expr], span: Span) -> WalkResult<()> {
        let mut targets = Vec::with_capacity(lhs.len());
        for target in lhs {
            targets.push(self.lvalue(target)?);
        }
        self.values_for(&targets, rhs, span)?;
        Ok(())
    }

    /// `a, b := ...`: names already declared in the scope are assigned,
    /// the others get a fresh local of the value's type.
    fn define(&mut self, lhs: &[Expr], rhs: &[Expr], span: Span) -> WalkResult<()> {
        let mut targets = Vec::with_capacity(lhs.len());
        for target in lhs {
            let existing = self
                .program
                .resolution(target.id)
                .and_then(|obj| self.program.object(obj).var.as_ref())
                .map(|var| var.ty.clone());
            if let Some(ty) = &existing {
                self.analysis.types.insert(target.id, ty.clone());
            }
            targets.push(existing);
        }

        let found = self.values_for(&targets, rhs, span)?;

        for ((target, existing), ty) in lhs.iter().zip(&targets).zip(found) {
            if existing.is_some() || Self::is_blank(target) {
                continue;
            }
            let Some(obj) = self.program.resolution(target.id) else { continue };
            let ty = self.declared_type(ty, target.span)?;
            self.analysis.types.insert(target.id, ty.clone());
            self.bind_local(obj, ty, target.span)?;
        }
        Ok(())
    }

    fn compound(&mut self, op: BinOp, lhs: &[Expr], rhs: &[Expr], span: Span) -> WalkResult<()> {
        let ([target], [value]) = (lhs, rhs) else {
            return Err(WalkError::new(
                WalkErrorKind::AssignmentCount { lhs: lhs.len(), rhs: rhs.len() },
                span,
            ));
        };
        let ty = self
            .lvalue(target)?
            .ok_or_else(|| WalkError::new(WalkErrorKind::NoValue { what: "_".to_string() }, target.span))?;
        if matches!(op, BinOp::Shl | BinOp::Shr) {
            let count = self.expr(value, None)?;
            for (ty, side) in [(&ty, target), (&count, value)] {
                if !self.kind(ty, side.span)?.is_integer() {
                    return Err(WalkError::invalid_op(op.symbol(), self.display(ty), span));
                }
            }
            return Ok(());
        }
        let found = self.expr(value, Some(&ty))?;
        self.check_same(op, &ty, &found, span)?;
        self.check_arithmetic(op, &ty, span)
    }

    fn return_stmt(&mut self, values: &[Expr], span: Span) -> WalkResult<()> {
        let results = self.frame.as_ref().map(|f| f.results.clone()).unwrap_or_default();
        if values.is_empty() {
            // Bare return: results are whatever their slots hold.
            return Ok(());
        }
        if let ([value], true) = (values, results.len() > 1) {
            let found = self.expr(value, None)?;
            return match &found {
                Type::Tuple(items)
                    if items.len() == results.len()
                        && items.iter().zip(&results).all(|(a, b)| types::identical(self.program, a, b)) =>
                {
                    Ok(())
                }
                Type::Tuple(items) if items.len() == results.len() => {
                    Err(WalkError::unsupported("returning a call whose result types differ", value.span))
                }
                Type::Tuple(items) => Err(WalkError::new(
                    WalkErrorKind::ReturnCount { expected: results.len(), found: items.len() },
                    span,
                )),
                _ => Err(WalkError::new(WalkErrorKind::ReturnCount { expected: results.len(), found: 1 }, span)),
            };
        }
        if values.len() != results.len() {
            return Err(WalkError::new(
                WalkErrorKind::ReturnCount { expected: results.len(), found: values.len() },
                span,
            ));
        }
        for (value, result) in values.iter().zip(&results) {
            let found = self.expr(value, Some(result))?;
            self.check_assignable(&found, result, value.span)?;
        }
        Ok(())
    }

    // =========================================================================
    // Loops and switches
    // =========================================================================

    fn range(
        &mut self,
        stmt: &Stmt,
        key: Option<&Expr>,
        value: Option<&Expr>,
        define: bool,
        collection: &Expr,
    ) -> WalkResult<()> {
        let coll = self.expr(collection, None)?;
        let elem = match self.kind(&coll, collection.span)? {
            Kind::Slice | Kind::Array => types::elem_type(self.program, &coll)?,
            Kind::String => Type::Named(self.program.basic.uint8),
            _ => {
                return Err(WalkError::new(WalkErrorKind::NotRangeable { ty: self.display(&coll) }, collection.span));
            }
        };

        let int = self.int_type();
        let locals = RangeLocals {
            collection: self.alloc_local(&coll, collection.span)?,
            index: self.alloc_local(&int, stmt.span)?,
            len: self.alloc_local(&int, stmt.span)?,
        };
        self.analysis.range_locals.insert(stmt.id, locals);

        for (var, ty) in [(key, int), (value, elem)] {
            let Some(var) = var else { continue };
            if Self::is_blank(var) {
                continue;
            }
            if define {
                let Some(obj) = self.program.resolution(var.id) else { continue };
                self.analysis.types.insert(var.id, ty.clone());
                self.bind_local(obj, ty, var.span)?;
            } else if let Some(target) = self.lvalue(var)? {
                self.check_assignable(&ty, &target, var.span)?;
            }
        }
        Ok(())
    }

    fn switch(&mut self, stmt: NodeId, tag: Option<&Expr>, clauses: &[CaseClause]) -> WalkResult<()> {
        let tag_ty = match tag {
            Some(tag) => {
                let ty = self.expr(tag, None)?;
                let ty = self.declared_type(ty, tag.span)?;
                let offset = self.alloc_local(&ty, tag.span)?;
                self.analysis.switch_tags.insert(stmt, offset);
                Some(ty)
            }
            None => None,
        };

        self.with_target(stmt, false, |w| {
            for clause in clauses {
                for case in &clause.exprs {
                    match (&tag_ty, tag) {
                        (Some(tag_ty), Some(tag)) => {
                            let found = w.expr(case, Some(tag_ty))?;
                            let with_nil = w.is_nil(case) || w.is_nil(tag);
                            w.check_comparable(BinOp::Eq, tag_ty, &found, with_nil, case.span)?;
                        }
                        _ => w.condition(case)?,
                    }
                }
                w.stmts(&clause.body)?;
            }
            Ok(())
        })
    }

    fn type_switch(&mut self, stmt: NodeId, subject: &Expr, clauses: &[TypeCaseClause]) -> WalkResult<()> {
        let subject_ty = self.expr(subject, None)?;
        if self.kind(&subject_ty, subject.span)? != Kind::Interface {
            return Err(WalkError::new(WalkErrorKind::NotInterface { what: self.display(&subject_ty) }, subject.span));
        }
        let offset = self.alloc_local(&subject_ty, subject.span)?;
        self.analysis.type_switch_subjects.insert(stmt, offset);

        self.with_target(stmt, false, |w| {
            for clause in clauses {
                let mut case_types = Vec::with_capacity(clause.types.len());
                for case in &clause.types {
                    let ty = if w.is_nil(case) {
                        None
                    } else {
                        let ty = w.type_expr(case)?;
                        if w.kind(&ty, case.span)? == Kind::Interface {
                            return Err(WalkError::unsupported("interface type in type switch case", case.span));
                        }
                        Some(ty)
                    };
                    w.analysis.case_types.insert(case.id, ty.clone());
                    case_types.push(ty);
                }

                if let Some(binding) = &clause.binding {
                    let ty = match case_types.as_slice() {
                        [Some(ty)] => ty.clone(),
                        _ => subject_ty.clone(),
                    };
                    if let Some(obj) = w.program.resolution(binding.id) {
                        w.bind_local(obj, ty, binding.span)?;
                    }
                }
                w.stmts(&clause.body)?;
            }
            Ok(())
        })
    }
}
