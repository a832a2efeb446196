// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Statement emission. Every statement leaves the operand stack as it found it.

use minigo_ast::decl::{DeclKind, ValueSpec};
use minigo_ast::expr::{BinOp, Expr, ExprKind};
use minigo_ast::stmt::{AssignOp, Block, BranchKind, CaseClause, Stmt, StmtKind, TypeCaseClause};
use minigo_ast::{NodeId, ObjId, Span, Storage, Type};
use minigo_types::Kind;
use minigo_walk::word_align;

use crate::emit::{emit, Shape};
use crate::error::{CodegenError, CodegenResult};
use crate::func::{BranchLabels, FuncGen};

/// Destination of one assigned value.
enum Place<'e> {
    Blank,
    Var(ObjId, Span),
    Expr(&'e Expr),
}

impl<'e> Place<'e> {
    fn of(expr: &'e Expr) -> Self {
        match &expr.kind {
            ExprKind::Ident(name) if name == "_" => Place::Blank,
            _ => Place::Expr(expr),
        }
    }
}

impl<'g> FuncGen<'g> {
    pub(crate) fn block(&mut self, block: &Block) -> CodegenResult<()> {
        self.stmts(&block.stmts)
    }

    fn stmts(&mut self, stmts: &[Stmt]) -> CodegenResult<()> {
        for stmt in stmts {
            self.stmt(stmt)?;
        }
        Ok(())
    }

    fn stmt(&mut self, stmt: &Stmt) -> CodegenResult<()> {
        if self.gen.options.annotate && !matches!(stmt.kind, StmtKind::Empty | StmtKind::Block(_)) {
            let at = match self.program.source(stmt.span.file) {
                Some(file) => format!("{}:{}", file.name, file.line_map.offset_to_line_col(stmt.span.start).0),
                None => String::new(),
            };
            self.out.comment(&format!("{} {}", stmt.kind.describe(), at));
        }
        let start = self.out.depth();
        match &stmt.kind {
            StmtKind::Decl(decl) => {
                if let DeclKind::Var(spec) = &decl.kind {
                    self.value_spec(spec)?;
                }
            }
            StmtKind::Expr(expr) => {
                self.expr(expr)?;
                let ty = self.type_of(expr)?;
                self.discard(&ty)?;
            }
            StmtKind::Assign { lhs, op, rhs } => match op {
                AssignOp::Assign | AssignOp::Define => {
                    let places: Vec<Place> = lhs.iter().map(Place::of).collect();
                    self.assign(&places, rhs, stmt.span)?;
                }
                AssignOp::Compound(op) => match (lhs.as_slice(), rhs.as_slice()) {
                    ([target], [value]) => self.compound(*op, target, Some(value))?,
                    _ => return Err(self.unsupported("compound assignment of several values", stmt.span)),
                },
            },
            StmtKind::IncDec { target, inc } => {
                self.compound(if *inc { BinOp::Add } else { BinOp::Sub }, target, None)?;
            }
            StmtKind::Return(values) => self.return_stmt(values, stmt.span)?,
            StmtKind::If { init, cond, then_block, else_branch } => {
                if let Some(init) = init {
                    self.stmt(init)?;
                }
                let otherwise = self.new_label("else");
                let end = self.new_label("endif");
                self.branch_if_false(cond, &otherwise)?;
                self.block(then_block)?;
                emit!(self.out, "jmp {}", end);
                self.out.label(&otherwise);
                if let Some(else_branch) = else_branch {
                    self.stmt(else_branch)?;
                }
                self.out.label(&end);
            }
            StmtKind::For { init, cond, post, body } => {
                if let Some(init) = init {
                    self.stmt(init)?;
                }
                let top = self.new_label("for");
                let cont = self.new_label("continue");
                let brk = self.new_label("break");
                self.labels.insert(stmt.id, BranchLabels { brk: brk.clone(), cont: Some(cont.clone()) });
                self.out.label(&top);
                if let Some(cond) = cond {
                    self.branch_if_false(cond, &brk)?;
                }
                self.block(body)?;
                self.out.label(&cont);
                if let Some(post) = post {
                    self.stmt(post)?;
                }
                emit!(self.out, "jmp {}", top);
                self.out.label(&brk);
            }
            StmtKind::Range { key, value, collection, body, .. } => {
                self.range(stmt, key.as_ref(), value.as_ref(), collection, body)?;
            }
            StmtKind::Switch { init, tag, clauses } => {
                if let Some(init) = init {
                    self.stmt(init)?;
                }
                self.switch(stmt.id, tag.as_ref(), clauses)?;
            }
            StmtKind::TypeSwitch { init, subject, clauses, .. } => {
                if let Some(init) = init {
                    self.stmt(init)?;
                }
                self.type_switch(stmt.id, subject, clauses)?;
            }
            StmtKind::Branch(kind) => {
                let labels = self
                    .analysis
                    .branch_targets
                    .get(&stmt.id)
                    .and_then(|target| self.labels.get(target))
                    .ok_or_else(|| self.unsupported("branch without enclosing statement", stmt.span))?;
                let label = match kind {
                    BranchKind::Break => Some(labels.brk.clone()),
                    BranchKind::Continue => labels.cont.clone(),
                };
                let label = label.ok_or_else(|| self.unsupported("continue outside a loop", stmt.span))?;
                emit!(self.out, "jmp {}", label);
            }
            StmtKind::Block(block) => self.block(block)?,
            StmtKind::Empty => {}
        }
        self.check_depth(start)
    }

    fn branch_if_false(&mut self, cond: &Expr, label: &str) -> CodegenResult<()> {
        self.expr(cond)?;
        self.out.pop("%rax");
        emit!(self.out, "testq %rax, %rax");
        emit!(self.out, "je {}", label);
        Ok(())
    }

    // =========================================================================
    // Assignment
    // =========================================================================

    /// `var` spec, local or package-level. Names without values are zeroed.
    pub(crate) fn value_spec(&mut self, spec: &ValueSpec) -> CodegenResult<()> {
        let places: Vec<Place> = spec
            .names
            .iter()
            .map(|name| match self.program.resolution(name.id) {
                Some(obj) if !name.is_blank() => Place::Var(obj, name.span),
                _ => Place::Blank,
            })
            .collect();
        if spec.values.is_empty() {
            for place in &places {
                if let Place::Var(obj, span) = place {
                    self.zero_var(*obj, *span)?;
                }
            }
            return Ok(());
        }
        let span = spec.names.first().map(|n| n.span).unwrap_or_default();
        self.assign(&places, &spec.values, span)
    }

    fn zero_var(&mut self, obj: ObjId, span: Span) -> CodegenResult<()> {
        let object = self.program.object(obj);
        let var = object.var.as_ref().ok_or_else(|| CodegenError::Unbound {
            func: self.name.clone(),
            what: object.name.clone(),
            span,
        })?;
        let size = word_align(self.shape(&var.ty)?.size);
        match var.storage {
            Storage::Local(offset) => self.zero_frame(offset, size),
            Storage::Global(_) => {
                self.var_addr(obj, span)?;
                self.out.pop("%rdi");
                emit!(self.out, "movq ${}, %rcx", size);
                emit!(self.out, "xorl %eax, %eax");
                emit!(self.out, "rep stosb");
            }
        }
        Ok(())
    }

    fn place_type(&self, place: &Place) -> CodegenResult<Option<Type>> {
        match place {
            Place::Blank => Ok(None),
            Place::Var(obj, span) => {
                let object = self.program.object(*obj);
                object.var.as_ref().map(|v| Some(v.ty.clone())).ok_or_else(|| CodegenError::Unbound {
                    func: self.name.clone(),
                    what: object.name.clone(),
                    span: *span,
                })
            }
            Place::Expr(expr) => self.type_of(expr).map(Some),
        }
    }

    fn place_addr(&mut self, place: &Place) -> CodegenResult<()> {
        match place {
            Place::Blank => Ok(()),
            Place::Var(obj, span) => self.var_addr(*obj, *span),
            Place::Expr(expr) => self.addr(expr),
        }
    }

    /// `[value]` → `[]`, storing into `place` (or dropping for `_`).
    fn store_into(&mut self, place: &Place, value_ty: &Type) -> CodegenResult<()> {
        match self.place_type(place)? {
            None => self.discard(value_ty),
            Some(target) => {
                self.convert_top(value_ty, &target)?;
                self.place_addr(place)?;
                let shape = self.shape(&target)?;
                self.store_swapped(shape);
                Ok(())
            }
        }
    }

    /// `[bytes of an aggregate]` → `[]`, copying them into `place`.
    fn store_spilled(&mut self, place: &Place, shape: Shape) -> CodegenResult<()> {
        if !matches!(place, Place::Blank) {
            self.place_addr(place)?;
            self.out.pop("%rdi");
            emit!(self.out, "movq %rsp, %rsi");
            self.memcopy(shape.size);
        }
        self.out.release(word_align(shape.size));
        Ok(())
    }

    fn assign(&mut self, places: &[Place], values: &[Expr], span: Span) -> CodegenResult<()> {
        if places.len() == values.len() {
            // Every value is evaluated before any store. With several targets,
            // structs and arrays are copied out first so a store cannot clobber
            // a value still to be stored.
            let parallel = places.len() > 1;
            let mut types = Vec::with_capacity(values.len());
            for (place, value) in places.iter().zip(values) {
                let ty = match self.place_type(place)? {
                    Some(target) => {
                        self.expr_as(value, &target)?;
                        target
                    }
                    None => {
                        self.expr(value)?;
                        self.type_of(value)?
                    }
                };
                if parallel {
                    let shape = self.shape(&ty)?;
                    self.spill(shape);
                }
                types.push(ty);
            }
            for (place, ty) in places.iter().zip(&types).rev() {
                let shape = self.shape(ty)?;
                if parallel && shape.is_aggregate() {
                    self.store_spilled(place, shape)?;
                } else {
                    self.store_into(place, ty)?;
                }
            }
            return Ok(());
        }

        let [value] = values else {
            return Err(self.unsupported(format!("assignment of {} values to {} targets", values.len(), places.len()), span));
        };
        let types = match &value.kind {
            ExprKind::TypeAssert { object, .. } if self.analysis.comma_ok.contains(&value.id) => {
                let ty = self.type_of(value)?;
                self.type_assert(object, &ty, true)?;
                vec![ty, Type::Named(self.program.basic.bool)]
            }
            _ => {
                self.expr(value)?;
                match self.type_of(value)? {
                    Type::Tuple(items) => items,
                    other => vec![other],
                }
            }
        };
        // The first value is on top.
        for (place, ty) in places.iter().zip(&types) {
            self.store_into(place, ty)?;
        }
        Ok(())
    }

    /// `target op= value`, or `target++` / `target--` when `value` is `None`.
    fn compound(&mut self, op: BinOp, target: &Expr, value: Option<&Expr>) -> CodegenResult<()> {
        let ty = self.type_of(target)?;
        let shape = self.shape(&ty)?;
        self.addr(target)?;
        self.dup();
        self.load(shape);
        match value {
            Some(value) => self.expr(value)?,
            None => self.out.push("$1"),
        }
        self.arith(op, shape.kind, target.span)?;
        self.store(shape);
        Ok(())
    }

    fn return_stmt(&mut self, values: &[Expr], span: Span) -> CodegenResult<()> {
        let func = self.func.ok_or_else(|| self.unsupported("return outside a function", span))?;
        match (values, func.results.len()) {
            ([], _) => {}
            ([value], n) if n > 1 => {
                // Results of a call, first one on top, moved slot by slot.
                self.expr(value)?;
                for slot in &func.results {
                    let words = self.shape(&slot.ty)?.words();
                    for w in 0..words {
                        self.out.pop("%rax");
                        emit!(self.out, "movq %rax, {}(%rbp)", slot.offset + 8 * w);
                    }
                }
            }
            _ => {
                for (value, slot) in values.iter().zip(&func.results) {
                    self.expr_as(value, &slot.ty)?;
                }
                for slot in func.results.iter().take(values.len()).rev() {
                    self.frame_addr(slot.offset);
                    let shape = self.shape(&slot.ty)?;
                    self.store_swapped(shape);
                }
            }
        }
        let label = self.return_label.clone();
        emit!(self.out, "jmp {}", label);
        Ok(())
    }

    // =========================================================================
    // Loops and switches
    // =========================================================================

    /// `for key, value := range collection`. The collection is evaluated once
    /// into its hidden slot; elements are read from that copy.
    fn range(
        &mut self,
        stmt: &Stmt,
        key: Option<&Expr>,
        value: Option<&Expr>,
        collection: &Expr,
        body: &Block,
    ) -> CodegenResult<()> {
        let locals = self
            .analysis
            .range_locals
            .get(&stmt.id)
            .copied()
            .ok_or_else(|| self.unsupported("range without loop slots", stmt.span))?;
        let coll = self.type_of(collection)?;
        let int = Type::Named(self.program.basic.int);

        let coll_shape = self.shape(&coll)?;
        self.expr(collection)?;
        self.frame_addr(locals.collection);
        self.store_swapped(coll_shape);

        let elem = match coll_shape.kind {
            Kind::Array => {
                let Type::Array { len, .. } = minigo_types::underlying(self.program, &coll).map_err(|e| self.type_error(e))?
                else {
                    return Err(self.unsupported("range over array", collection.span));
                };
                emit!(self.out, "movq ${}, {}(%rbp)", len, locals.len);
                minigo_types::elem_type(self.program, &coll).map_err(|e| self.type_error(e))?
            }
            Kind::String | Kind::Slice => {
                emit!(self.out, "movq {}(%rbp), %rax", locals.collection + 8);
                emit!(self.out, "movq %rax, {}(%rbp)", locals.len);
                match coll_shape.kind {
                    Kind::String => Type::Named(self.program.basic.uint8),
                    _ => minigo_types::elem_type(self.program, &coll).map_err(|e| self.type_error(e))?,
                }
            }
            kind => return Err(self.unsupported(format!("range over {}", kind), collection.span)),
        };
        emit!(self.out, "movq $0, {}(%rbp)", locals.index);

        let top = self.new_label("range");
        let cont = self.new_label("continue");
        let brk = self.new_label("break");
        self.labels.insert(stmt.id, BranchLabels { brk: brk.clone(), cont: Some(cont.clone()) });

        self.out.label(&top);
        emit!(self.out, "movq {}(%rbp), %rax", locals.index);
        emit!(self.out, "cmpq {}(%rbp), %rax", locals.len);
        emit!(self.out, "jge {}", brk);

        if let Some(key) = key.map(Place::of) {
            if !matches!(key, Place::Blank) {
                emit!(self.out, "movq {}(%rbp), %rax", locals.index);
                self.out.push("%rax");
                self.store_into(&key, &int)?;
            }
        }
        if let Some(value) = value.map(Place::of) {
            if !matches!(value, Place::Blank) {
                let shape = self.shape(&elem)?;
                if coll_shape.is_aggregate() {
                    emit!(self.out, "leaq {}(%rbp), %rax", locals.collection);
                } else {
                    emit!(self.out, "movq {}(%rbp), %rax", locals.collection);
                }
                emit!(self.out, "movq {}(%rbp), %rcx", locals.index);
                if shape.size != 1 {
                    emit!(self.out, "imulq ${}, %rcx", shape.size);
                }
                emit!(self.out, "addq %rcx, %rax");
                self.out.push("%rax");
                self.load(shape);
                self.store_into(&value, &elem)?;
            }
        }

        self.block(body)?;
        self.out.label(&cont);
        emit!(self.out, "addq $1, {}(%rbp)", locals.index);
        emit!(self.out, "jmp {}", top);
        self.out.label(&brk);
        Ok(())
    }

    fn switch(&mut self, stmt: NodeId, tag: Option<&Expr>, clauses: &[CaseClause]) -> CodegenResult<()> {
        let brk = self.new_label("break");
        self.labels.insert(stmt, BranchLabels { brk: brk.clone(), cont: None });

        let tag = match tag {
            Some(tag) => {
                let offset = self.analysis.switch_tags.get(&stmt).copied().ok_or_else(|| {
                    self.unsupported("switch without tag slot", tag.span)
                })?;
                let ty = self.type_of(tag)?;
                self.expr(tag)?;
                self.frame_addr(offset);
                let shape = self.shape(&ty)?;
                self.store_swapped(shape);
                Some((offset, ty))
            }
            None => None,
        };

        let bodies: Vec<String> = clauses.iter().map(|_| self.new_label("case")).collect();
        let mut default = None;
        for (clause, body) in clauses.iter().zip(&bodies) {
            if clause.exprs.is_empty() {
                default = Some(body.clone());
            }
            for case in &clause.exprs {
                match &tag {
                    Some((offset, tag_ty)) => {
                        let case_ty = self.type_of(case)?;
                        let operand = self.operand_type(tag_ty, &case_ty)?;
                        self.frame_addr(*offset);
                        let shape = self.shape(tag_ty)?;
                        self.load(shape);
                        self.convert_top(tag_ty, &operand)?;
                        self.expr_as(case, &operand)?;
                        let kind = self.kind(&operand)?;
                        self.equality(kind)?;
                    }
                    None => self.expr(case)?,
                }
                self.out.pop("%rax");
                emit!(self.out, "testq %rax, %rax");
                emit!(self.out, "jne {}", body);
            }
        }
        emit!(self.out, "jmp {}", default.as_ref().unwrap_or(&brk));

        for (clause, body) in clauses.iter().zip(&bodies) {
            self.out.label(body);
            self.stmts(&clause.body)?;
            emit!(self.out, "jmp {}", brk);
        }
        self.out.label(&brk);
        Ok(())
    }

    fn type_switch(&mut self, stmt: NodeId, subject: &Expr, clauses: &[TypeCaseClause]) -> CodegenResult<()> {
        let slot = self
            .analysis
            .type_switch_subjects
            .get(&stmt)
            .copied()
            .ok_or_else(|| self.unsupported("type switch without subject slot", subject.span))?;
        let brk = self.new_label("break");
        self.labels.insert(stmt, BranchLabels { brk: brk.clone(), cont: None });

        self.expr(subject)?;
        self.frame_addr(slot);
        let boxed = self.shape(&Type::Interface)?;
        self.store_swapped(boxed);

        let bodies: Vec<String> = clauses.iter().map(|_| self.new_label("case")).collect();
        let mut default = None;
        let mut clause_types = Vec::with_capacity(clauses.len());
        for (clause, body) in clauses.iter().zip(&bodies) {
            if clause.types.is_empty() {
                default = Some(body.clone());
            }
            let mut types = Vec::with_capacity(clause.types.len());
            for case in &clause.types {
                let ty = self.analysis.case_types.get(&case.id).cloned().ok_or_else(|| CodegenError::MissingType {
                    func: self.name.clone(),
                    what: "type switch case".to_string(),
                    span: case.span,
                })?;
                let tag = match &ty {
                    Some(ty) => self.tag_of(ty)?,
                    None => 0,
                };
                emit!(self.out, "cmpq ${}, {}(%rbp)", tag, slot);
                emit!(self.out, "je {}", body);
                types.push(ty);
            }
            clause_types.push(types);
        }
        emit!(self.out, "jmp {}", default.as_ref().unwrap_or(&brk));

        for ((clause, body), types) in clauses.iter().zip(&bodies).zip(&clause_types) {
            self.out.label(body);
            if let Some(binding) = &clause.binding {
                if let Some(obj) = self.program.resolution(binding.id) {
                    match types.as_slice() {
                        [Some(ty)] => {
                            emit!(self.out, "movq {}(%rbp), %rax", slot + 8);
                            self.out.push("%rax");
                            let shape = self.shape(ty)?;
                            self.load(shape);
                            self.store_into(&Place::Var(obj, binding.span), ty)?;
                        }
                        _ => {
                            self.frame_addr(slot);
                            self.load(boxed);
                            self.store_into(&Place::Var(obj, binding.span), &Type::Interface)?;
                        }
                    }
                }
            }
            self.stmts(&clause.body)?;
            emit!(self.out, "jmp {}", brk);
        }
        self.out.label(&brk);
        Ok(())
    }
}
