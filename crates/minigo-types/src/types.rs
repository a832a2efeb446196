// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Type queries: conversion from type expressions, kinds, sizes, layouts and
//! canonical serialization.

use minigo_ast::expr::{Expr, ExprKind};
use minigo_ast::object::{BasicType, ObjDecl};
use minigo_ast::ty::{FieldLayout, StructLayout};
use minigo_ast::{NodeId, ObjId, ObjKind, Program, Span, Type};

use crate::consts::{eval_const, ConstValue};
use crate::error::{TypeError, TypeErrorKind};
use crate::kind::Kind;

/// Named types nested deeper than this are treated as cyclic.
const MAX_NAMED_DEPTH: usize = 64;

/// Local package name of an identifier bound to an import.
pub fn imported_package(program: &Program, expr: &Expr) -> Option<String> {
    let ExprKind::Ident(_) = &expr.kind else { return None };
    let obj = program.object(program.resolution(expr.id)?);
    match &obj.decl {
        ObjDecl::Package { path } if obj.kind == ObjKind::Package => {
            Some(path.rsplit('/').next().unwrap_or(path).to_string())
        }
        _ => None,
    }
}

/// The semantic type denoted by a type expression.
pub fn from_expr(program: &Program, expr: &Expr) -> Result<Type, TypeError> {
    match &expr.kind {
        ExprKind::Paren(inner) => from_expr(program, inner),
        ExprKind::Ident(name) => match program.resolution(expr.id) {
            Some(obj) if program.object(obj).kind == ObjKind::Type => Ok(Type::Named(obj)),
            _ => Err(TypeError::not_a_type(name.clone(), expr.span)),
        },
        ExprKind::Selector { object, field } => {
            let Some(package) = imported_package(program, object) else {
                return Err(TypeError::not_a_type(expr.describe(), expr.span));
            };
            let obj = program.exported(&package, field).ok_or_else(|| {
                TypeError::new(
                    TypeErrorKind::UndefinedQualified { package: package.clone(), name: field.clone() },
                    expr.span,
                )
            })?;
            if program.object(obj).kind != ObjKind::Type {
                return Err(TypeError::not_a_type(format!("{}.{}", package, field), expr.span));
            }
            Ok(Type::Named(obj))
        }
        ExprKind::Star(inner) => Ok(Type::pointer_to(from_expr(program, inner)?)),
        ExprKind::ArrayType { len: None, elem } => Ok(Type::slice_of(from_expr(program, elem)?)),
        ExprKind::ArrayType { len: Some(len), elem } => {
            let len = array_len(program, len)?;
            Ok(Type::Array { len, elem: Box::new(from_expr(program, elem)?) })
        }
        ExprKind::StructType(_) => Ok(Type::Struct(expr.id)),
        ExprKind::InterfaceType => Ok(Type::Interface),
        _ => Err(TypeError::not_a_type(expr.describe(), expr.span)),
    }
}

fn array_len(program: &Program, len: &Expr) -> Result<u64, TypeError> {
    match eval_const(program, len, 0)? {
        Some(ConstValue::Int(n)) if n >= 0 => Ok(n as u64),
        other => Err(TypeError::new(
            TypeErrorKind::InvalidArrayLength {
                found: other.map(|v| v.to_string()).unwrap_or_else(|| len.describe().to_string()),
            },
            len.span,
        )),
    }
}

/// Resolve declared type names down to a predeclared type or a type literal.
pub fn underlying(program: &Program, ty: &Type) -> Result<Type, TypeError> {
    let mut current = ty.clone();
    for _ in 0..MAX_NAMED_DEPTH {
        let Type::Named(obj) = &current else { return Ok(current) };
        match &program.object(*obj).decl {
            ObjDecl::TypeName { ty } => current = from_expr(program, ty)?,
            _ => return Ok(current),
        }
    }
    Err(recursive(program, ty))
}

fn recursive(program: &Program, ty: &Type) -> TypeError {
    TypeError::new(TypeErrorKind::RecursiveType { name: display(program, ty) }, Span::default())
}

/// The predeclared basic type underlying `ty`, if any.
pub fn basic(program: &Program, ty: &Type) -> Option<BasicType> {
    match underlying(program, ty).ok()? {
        Type::Named(obj) => match program.object(obj).decl {
            ObjDecl::Basic(b) => Some(b),
            _ => None,
        },
        _ => None,
    }
}

/// Canonical kind of a type.
pub fn kind(program: &Program, ty: &Type) -> Result<Kind, TypeError> {
    Ok(match underlying(program, ty)? {
        Type::Named(obj) => match program.object(obj).decl {
            ObjDecl::Basic(b) => Kind::from(b),
            _ => return Err(recursive(program, ty)),
        },
        Type::Pointer(_) => Kind::Pointer,
        Type::Slice(_) => Kind::Slice,
        Type::Array { .. } => Kind::Array,
        Type::Struct(_) => Kind::Struct,
        Type::Interface => Kind::Interface,
        Type::Nil => Kind::Nil,
        Type::Tuple(_) => {
            return Err(TypeError::unsupported("multiple values in single-value context", Span::default()))
        }
    })
}

/// Types being sized or laid out, for cycle detection.
#[derive(Default)]
struct Visiting {
    names: Vec<ObjId>,
    structs: Vec<NodeId>,
}

/// Largest size of any type in bytes. Frame offsets and allocation sizes are
/// emitted as signed 32-bit immediates.
pub const MAX_SIZE: u64 = i32::MAX as u64;

fn within_limit(program: &Program, ty: &Type, size: Option<u64>) -> Result<u64, TypeError> {
    size.filter(|&n| n <= MAX_SIZE)
        .ok_or_else(|| TypeError::new(TypeErrorKind::TooLarge { ty: display(program, ty) }, Span::default()))
}

/// Size of a value of type `ty` in bytes.
pub fn size_of(program: &Program, ty: &Type) -> Result<u64, TypeError> {
    size_with(program, ty, &mut Visiting::default())
}

fn size_with(program: &Program, ty: &Type, visiting: &mut Visiting) -> Result<u64, TypeError> {
    if let Type::Named(obj) = ty {
        if let ObjDecl::TypeName { ty: expr } = &program.object(*obj).decl {
            if visiting.names.contains(obj) {
                return Err(recursive(program, ty));
            }
            visiting.names.push(*obj);
            let size = from_expr(program, expr).and_then(|t| size_with(program, &t, visiting));
            visiting.names.pop();
            return size;
        }
    }
    let k = kind(program, ty)?;
    if let Some(size) = k.fixed_size() {
        return Ok(size);
    }
    match underlying(program, ty)? {
        Type::Array { len, elem } => {
            let elem_size = size_with(program, &elem, visiting)?;
            within_limit(program, ty, len.checked_mul(elem_size))
        }
        Type::Struct(node) => Ok(layout_with(program, node, visiting)?.size),
        _ => Err(TypeError::unsupported(display(program, ty), Span::default())),
    }
}

/// Layout of the struct type underlying `ty`.
pub fn struct_layout(program: &Program, ty: &Type) -> Result<StructLayout, TypeError> {
    match underlying(program, ty)? {
        Type::Struct(node) => layout_with(program, node, &mut Visiting::default()),
        _ => Err(TypeError::new(
            TypeErrorKind::NoField { ty: display(program, ty), field: "(struct layout)".to_string() },
            Span::default(),
        )),
    }
}

/// Layout of one struct field, by name.
pub fn field(program: &Program, ty: &Type, name: &str) -> Result<FieldLayout, TypeError> {
    let missing = || {
        TypeError::new(
            TypeErrorKind::NoField { ty: display(program, ty), field: name.to_string() },
            Span::default(),
        )
    };
    match underlying(program, ty)? {
        Type::Struct(_) => struct_layout(program, ty)?.field(name).cloned().ok_or_else(missing),
        _ => Err(missing()),
    }
}

/// Fields laid out in declaration order with no padding.
fn layout_with(program: &Program, node: NodeId, visiting: &mut Visiting) -> Result<StructLayout, TypeError> {
    if let Some(layout) = program.layouts.get(&node) {
        return Ok(layout.clone());
    }
    let fields = program
        .struct_specs
        .get(&node)
        .ok_or_else(|| TypeError::unsupported("struct type without field list", Span::default()))?;
    if visiting.structs.contains(&node) {
        return Err(recursive(program, &Type::Struct(node)));
    }
    visiting.structs.push(node);

    let mut layout = StructLayout { fields: Vec::new(), size: 0 };
    for field in fields {
        let ty = from_expr(program, &field.ty)?;
        let size = size_with(program, &ty, visiting).map_err(|e| e.at(field.ty.span))?;
        for name in &field.names {
            layout.fields.push(FieldLayout { name: name.name.clone(), ty: ty.clone(), offset: layout.size, size });
            layout.size = within_limit(program, &Type::Struct(node), layout.size.checked_add(size))?;
        }
    }

    visiting.structs.pop();
    Ok(layout)
}

/// Compute and cache the layout of every struct type seen so far.
pub fn compute_layouts(program: &mut Program) -> Result<(), TypeError> {
    let mut pending: Vec<NodeId> = program
        .struct_specs
        .keys()
        .filter(|node| !program.layouts.contains_key(node))
        .copied()
        .collect();
    pending.sort();
    for node in pending {
        let layout = layout_with(program, node, &mut Visiting::default())?;
        log::trace!("struct layout {:?}: {} fields, {} bytes", node, layout.fields.len(), layout.size);
        program.layouts.insert(node, layout);
    }
    Ok(())
}

/// Element type of an array, slice or string.
pub fn elem_type(program: &Program, ty: &Type) -> Result<Type, TypeError> {
    match underlying(program, ty)? {
        Type::Slice(elem) | Type::Array { elem, .. } => Ok(*elem),
        Type::Named(obj) if matches!(program.object(obj).decl, ObjDecl::Basic(BasicType::String)) => {
            Ok(Type::Named(program.basic.uint8))
        }
        _ => Err(TypeError::new(TypeErrorKind::NotIndexable { ty: display(program, ty) }, Span::default())),
    }
}

/// Canonical string for a type: unique per distinct static type and stable
/// across packages of one run.
pub fn serialize(program: &Program, ty: &Type) -> Result<String, TypeError> {
    Ok(match ty {
        Type::Named(obj) => {
            let object = program.object(*obj);
            match (&object.qualifier, &object.pkg) {
                (Some(qualifier), _) => format!("{}.{}", qualifier, object.name),
                (None, Some(pkg)) => format!("{}.{}", pkg, object.name),
                (None, None) => object.name.clone(),
            }
        }
        Type::Pointer(elem) => format!("*{}", serialize(program, elem)?),
        Type::Slice(elem) => format!("[]{}", serialize(program, elem)?),
        Type::Array { len, elem } => format!("[{}]{}", len, serialize(program, elem)?),
        Type::Struct(node) => {
            let fields = program
                .struct_specs
                .get(node)
                .ok_or_else(|| TypeError::unsupported("struct type without field list", Span::default()))?;
            let mut parts = Vec::new();
            for field in fields {
                let ty = serialize(program, &from_expr(program, &field.ty)?)?;
                for name in &field.names {
                    parts.push(format!("{} {}", name.name, ty));
                }
            }
            format!("struct{{{}}}", parts.join("; "))
        }
        Type::Interface => "interface{}".to_string(),
        Type::Nil => "nil".to_string(),
        Type::Tuple(items) => {
            let items: Result<Vec<_>, _> = items.iter().map(|t| serialize(program, t)).collect();
            format!("({})", items?.join(", "))
        }
    })
}

/// Serialized form for messages; never fails.
pub fn display(program: &Program, ty: &Type) -> String {
    serialize(program, ty).unwrap_or_else(|_| format!("{:?}", ty))
}

/// Whether two types are the same static type.
pub fn identical(program: &Program, a: &Type, b: &Type) -> bool {
    if a == b {
        return true;
    }
    match (a, b) {
        (Type::Named(_), _) | (_, Type::Named(_)) => false,
        _ => match (serialize(program, a), serialize(program, b)) {
            (Ok(x), Ok(y)) => x == y,
            _ => false,
        },
    }
}
