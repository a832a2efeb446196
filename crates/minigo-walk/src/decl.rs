// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Declaration pass: layouts, exports, method table, function frames and
//! package-level variables.

use minigo_ast::decl::{DeclKind, FuncDecl, Param, TypeSpec, ValueSpec};
use minigo_ast::expr::{ExprKind, Name};
use minigo_ast::object::ObjDecl;
use minigo_ast::{ObjId, Type, Variable};
use minigo_types::{self as types, Kind};

use crate::analysis::{word_align, Func, Method, Slot};
use crate::error::{WalkError, WalkErrorKind, WalkResult};
use crate::walker::{SpecState, Walker};

/// Parameters start above the saved frame pointer and return address.
pub const FRAME_BASE: i64 = 16;

impl<'a> Walker<'a> {
    pub(crate) fn declare_package(&mut self) -> WalkResult<()> {
        types::compute_layouts(self.program)?;

        let files = self.files;
        for file in files {
            for decl in &file.decls {
                match &decl.kind {
                    DeclKind::Type(spec) => self.declare_type(spec)?,
                    DeclKind::Const(spec) => {
                        for name in &spec.names {
                            self.export(name);
                        }
                    }
                    DeclKind::Var(spec) => self.declare_global(spec),
                    DeclKind::Func(func) => self.declare_func(func)?,
                }
            }
        }

        for index in 0..self.globals.len() {
            self.global_spec(index)?;
        }
        Ok(())
    }

    fn export(&mut self, name: &Name) {
        if name.is_blank() {
            return;
        }
        if let Some(obj) = self.program.resolution(name.id) {
            let key = self.global_symbol(&name.name);
            self.program.exports.insert(key, obj);
        }
    }

    fn declare_type(&mut self, spec: &TypeSpec) -> WalkResult<()> {
        self.export(&spec.name);
        self.local_type(spec)
    }

    /// Check a type declaration names a sized, non-recursive type.
    pub(crate) fn local_type(&mut self, spec: &TypeSpec) -> WalkResult<()> {
        let ty = self.type_expr(&spec.ty)?;
        if self.kind(&ty, spec.ty.span)? != Kind::Interface {
            self.size(&ty, spec.ty.span)?;
        }
        Ok(())
    }

    fn declare_global(&mut self, spec: &'a ValueSpec) {
        let index = self.globals.len();
        self.globals.push(spec);
        self.global_state.push(SpecState::Pending);
        for name in &spec.names {
            self.export(name);
            if let Some(obj) = self.program.resolution(name.id) {
                self.global_owner.insert(obj, index);
            }
        }
    }

    /// Type the variables of one package-level `var` spec, first typing any
    /// package-level variable its initializers depend on.
    pub(crate) fn global_spec(&mut self, index: usize) -> WalkResult<()> {
        let spec = self.globals[index];
        match self.global_state[index] {
            SpecState::Done => return Ok(()),
            SpecState::Active => {
                let name = spec.names.first().map(|n| n.name.clone()).unwrap_or_default();
                let span = spec.names.first().map(|n| n.span).unwrap_or_default();
                return Err(WalkError::new(WalkErrorKind::InitCycle { name }, span));
            }
            SpecState::Pending => {}
        }
        self.global_state[index] = SpecState::Active;

        let tys = self.value_spec_types(spec)?;
        for (name, ty) in spec.names.iter().zip(tys) {
            if name.is_blank() {
                continue;
            }
            let Some(obj) = self.program.resolution(name.id) else { continue };
            let symbol = self.global_symbol(&name.name);
            log::trace!("global {}: {}", symbol, self.display(&ty));
            self.program.object_mut(obj).var = Some(Variable::global(symbol, ty));
        }

        self.global_state[index] = SpecState::Done;
        if let Some(first) = spec.names.first() {
            self.package.var_order.push(first.id);
        }
        Ok(())
    }

    /// Types of the names of a `var` spec, walking its initializers.
    pub(crate) fn value_spec_types(&mut self, spec: &ValueSpec) -> WalkResult<Vec<Type>> {
        let span = spec.names.first().map(|n| n.span).unwrap_or_default();
        let declared = spec.ty.as_ref().map(|t| self.type_expr(t)).transpose()?;
        let count = spec.names.len();

        if spec.values.is_empty() {
            return declared
                .map(|ty| vec![ty; count])
                .ok_or_else(|| WalkError::cannot_infer("variable without type or value", span));
        }

        if spec.values.len() == count {
            let mut tys = Vec::with_capacity(count);
            for value in &spec.values {
                let found = self.expr(value, declared.as_ref())?;
                let ty = match &declared {
                    Some(ty) => {
                        self.check_assignable(&found, ty, value.span)?;
                        ty.clone()
                    }
                    None => self.declared_type(found, value.span)?,
                };
                tys.push(ty);
            }
            return Ok(tys);
        }

        match spec.values.as_slice() {
            [value] => {
                let found = self.multi_value(value, count)?;
                match declared {
                    Some(ty) => {
                        for item in &found {
                            self.check_assignable(item, &ty, value.span)?;
                        }
                        Ok(vec![ty; count])
                    }
                    None => Ok(found),
                }
            }
            _ => Err(WalkError::new(
                WalkErrorKind::AssignmentCount { lhs: count, rhs: spec.values.len() },
                span,
            )),
        }
    }

    fn declare_func(&mut self, func: &FuncDecl) -> WalkResult<()> {
        let obj = self
            .program
            .resolution(func.name.id)
            .ok_or_else(|| WalkError::cannot_infer(format!("function {}", func.name.name), func.name.span))?;

        let symbol = match &func.recv {
            Some(recv) => self.declare_method(func, recv, obj)?,
            None => {
                self.export(&func.name);
                self.global_symbol(&func.name.name)
            }
        };

        let mut offset = FRAME_BASE;
        let mut params = Vec::new();
        for param in func.recv.iter().chain(&func.sig.params) {
            params.push(self.slot(param, &mut offset)?);
        }
        let param_size = (offset - FRAME_BASE) as u64;
        let mut results = Vec::new();
        for result in &func.sig.results {
            let slot = self.slot(result, &mut offset)?;
            if func.sig.results.len() > 1 && matches!(self.kind(&slot.ty, result.ty.span)?, Kind::Struct | Kind::Array) {
                return Err(WalkError::unsupported("struct or array result in a multi-value return", result.ty.span));
            }
            results.push(slot);
        }
        let result_size = (offset - FRAME_BASE) as u64 - param_size;

        log::trace!("func {}: params {} bytes, results {} bytes", symbol, param_size, result_size);
        self.analysis.funcs.insert(
            obj,
            Func {
                obj,
                name: func.name.name.clone(),
                symbol,
                params,
                results,
                param_size,
                result_size,
                local_size: 0,
                has_body: func.body.is_some(),
            },
        );
        if func.body.is_some() {
            self.package.funcs.push(obj);
        }
        Ok(())
    }

    /// Allocate a parameter or result slot at `offset`, binding its variable.
    fn slot(&mut self, param: &Param, offset: &mut i64) -> WalkResult<Slot> {
        let ty = self.type_expr(&param.ty)?;
        let size = word_align(self.size(&ty, param.ty.span)?);
        let obj = param
            .name
            .as_ref()
            .filter(|name| !name.is_blank())
            .and_then(|name| self.program.resolution(name.id));
        if let Some(obj) = obj {
            self.program.object_mut(obj).var = Some(Variable::local(*offset, ty.clone()));
        }
        let slot = Slot { obj, offset: *offset, ty };
        *offset += size as i64;
        Ok(slot)
    }

    fn declare_method(&mut self, func: &FuncDecl, recv: &Param, obj: ObjId) -> WalkResult<String> {
        let (base, ptr_recv) = match &recv.ty.unparen().kind {
            ExprKind::Star(inner) => (self.type_expr(inner)?, true),
            _ => (self.type_expr(&recv.ty)?, false),
        };
        let invalid = WalkError::new(WalkErrorKind::InvalidReceiver { ty: self.display(&base) }, recv.ty.span);
        let Type::Named(ty_obj) = base else { return Err(invalid) };
        let owner = self.program.object(ty_obj);
        let declared_here = owner.pkg.as_deref() == Some(self.package.name.as_str());
        if !matches!(owner.decl, ObjDecl::TypeName { .. }) || !declared_here {
            return Err(invalid);
        }
        if matches!(self.kind(&base, recv.ty.span)?, Kind::Pointer | Kind::Interface) {
            return Err(invalid);
        }

        let type_name = owner.name.clone();
        let symbol = if ptr_recv {
            format!("{}.${}.{}", self.package.name, type_name, func.name.name)
        } else {
            format!("{}.{}.{}", self.package.name, type_name, func.name.name)
        };
        let method = Method { name: func.name.name.clone(), ptr_recv, func: obj, symbol: symbol.clone() };
        if !self.analysis.methods.insert(ty_obj, method) {
            return Err(WalkError::new(
                WalkErrorKind::DuplicateMethod { ty: type_name, name: func.name.name.clone() },
                func.name.span,
            ));
        }
        Ok(symbol)
    }
}
