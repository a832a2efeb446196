// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Constant expression evaluation.

use minigo_ast::expr::{BinOp, Expr, ExprKind, LitKind, UnaryOp};
use minigo_ast::object::{Builtin, ObjDecl};
use minigo_ast::{ObjKind, Program};

use crate::error::{TypeError, TypeErrorKind};
use crate::kind::Kind;
use crate::literal;
use crate::types;

/// Constants referring to constants deeper than this are treated as cyclic.
const MAX_CONST_DEPTH: usize = 64;

/// A compile-time constant value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstValue {
    Int(i64),
    Bool(bool),
    /// Decoded bytes of a string constant.
    Str(Vec<u8>),
}

impl std::fmt::Display for ConstValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstValue::Int(n) => write!(f, "{}", n),
            ConstValue::Bool(b) => write!(f, "{}", b),
            ConstValue::Str(bytes) => write!(f, "{:?}", String::from_utf8_lossy(bytes)),
        }
    }
}

/// Evaluate `expr` as a constant. `iota` is the value of `iota` for the
/// enclosing constant spec. `Ok(None)` means the expression isn't constant.
pub fn eval_const(program: &Program, expr: &Expr, iota: i64) -> Result<Option<ConstValue>, TypeError> {
    eval(program, expr, iota, 0)
}

fn eval(program: &Program, expr: &Expr, iota: i64, depth: usize) -> Result<Option<ConstValue>, TypeError> {
    Ok(match &expr.kind {
        ExprKind::Paren(inner) => return eval(program, inner, iota, depth),
        ExprKind::BasicLit { kind: LitKind::Int, raw } => Some(ConstValue::Int(literal::decode_int(raw, expr.span)?)),
        ExprKind::BasicLit { kind: LitKind::Char, raw } => Some(ConstValue::Int(literal::decode_char(raw, expr.span)?)),
        ExprKind::BasicLit { kind: LitKind::String, raw } => {
            Some(ConstValue::Str(literal::decode_string(raw, expr.span)?))
        }
        ExprKind::Ident(name) => match program.resolution(expr.id) {
            Some(obj) => object_value(program, obj, iota, depth, name, expr)?,
            None => None,
        },
        ExprKind::Selector { object, field } => {
            let Some(package) = types::imported_package(program, object) else { return Ok(None) };
            match program.exported(&package, field) {
                Some(obj) => object_value(program, obj, iota, depth, field, expr)?,
                None => None,
            }
        }
        ExprKind::Unary { op, operand } => {
            let Some(value) = eval(program, operand, iota, depth)? else { return Ok(None) };
            Some(match (op, value) {
                (UnaryOp::Plus, ConstValue::Int(n)) => ConstValue::Int(n),
                (UnaryOp::Neg, ConstValue::Int(n)) => ConstValue::Int(n.wrapping_neg()),
                (UnaryOp::BitNot, ConstValue::Int(n)) => ConstValue::Int(!n),
                (UnaryOp::Not, ConstValue::Bool(b)) => ConstValue::Bool(!b),
                (UnaryOp::Addr, _) => return Ok(None),
                (op, value) => return Err(invalid(unary_symbol(*op), &value, expr)),
            })
        }
        ExprKind::Binary { op, left, right } => {
            let (Some(l), Some(r)) = (eval(program, left, iota, depth)?, eval(program, right, iota, depth)?) else {
                return Ok(None);
            };
            Some(fold_binary(*op, l, r, expr)?)
        }
        ExprKind::Call { func, args } if args.len() == 1 => {
            if program.builtin(func.id) == Some(Builtin::Len) {
                return Ok(match eval(program, &args[0], iota, depth)? {
                    Some(ConstValue::Str(bytes)) => Some(ConstValue::Int(bytes.len() as i64)),
                    _ => None,
                });
            }
            let Ok(target) = types::from_expr(program, func) else { return Ok(None) };
            let Some(value) = eval(program, &args[0], iota, depth)? else { return Ok(None) };
            match (types::kind(program, &target)?, value) {
                (k, ConstValue::Int(n)) if k.is_integer() => Some(ConstValue::Int(truncate(k, n))),
                (Kind::Bool, v @ ConstValue::Bool(_)) | (Kind::String, v @ ConstValue::Str(_)) => Some(v),
                _ => None,
            }
        }
        _ => None,
    })
}

fn object_value(
    program: &Program,
    obj: minigo_ast::ObjId,
    iota: i64,
    depth: usize,
    name: &str,
    expr: &Expr,
) -> Result<Option<ConstValue>, TypeError> {
    let object = program.object(obj);
    if object.kind != ObjKind::Const {
        return Ok(None);
    }
    Ok(match &object.decl {
        ObjDecl::Bool(b) => Some(ConstValue::Bool(*b)),
        ObjDecl::Iota => Some(ConstValue::Int(iota)),
        ObjDecl::Const { value, iota: own, .. } => {
            if depth >= MAX_CONST_DEPTH {
                return Err(TypeError::new(TypeErrorKind::ConstCycle { name: name.to_string() }, expr.span));
            }
            eval(program, value, *own, depth + 1)?
        }
        _ => None,
    })
}

/// Wrap an integer to the width of an integer kind.
pub fn truncate(kind: Kind, n: i64) -> i64 {
    match kind {
        Kind::Uint8 => n & 0xff,
        Kind::Uint16 => n & 0xffff,
        _ => n,
    }
}

fn fold_binary(op: BinOp, l: ConstValue, r: ConstValue, expr: &Expr) -> Result<ConstValue, TypeError> {
    use ConstValue::{Bool, Int, Str};
    Ok(match (l, r) {
        (Int(a), Int(b)) => match op {
            BinOp::Add => Int(a.wrapping_add(b)),
            BinOp::Sub => Int(a.wrapping_sub(b)),
            BinOp::Mul => Int(a.wrapping_mul(b)),
            BinOp::Div | BinOp::Rem if b == 0 => {
                return Err(TypeError::new(TypeErrorKind::DivisionByZero, expr.span))
            }
            BinOp::Div => Int(a.wrapping_div(b)),
            BinOp::Rem => Int(a.wrapping_rem(b)),
            BinOp::BitAnd => Int(a & b),
            BinOp::BitOr => Int(a | b),
            BinOp::BitXor => Int(a ^ b),
            BinOp::AndNot => Int(a & !b),
            BinOp::Shl | BinOp::Shr if !(0..64).contains(&b) => {
                return Err(invalid(op.symbol(), &Int(b), expr))
            }
            BinOp::Shl => Int(a << b),
            BinOp::Shr => Int(a >> b),
            BinOp::Eq => Bool(a == b),
            BinOp::Ne => Bool(a != b),
            BinOp::Lt => Bool(a < b),
            BinOp::Gt => Bool(a > b),
            BinOp::Le => Bool(a <= b),
            BinOp::Ge => Bool(a >= b),
            BinOp::And | BinOp::Or => return Err(invalid(op.symbol(), &Int(a), expr)),
        },
        (Bool(a), Bool(b)) => match op {
            BinOp::And => Bool(a && b),
            BinOp::Or => Bool(a || b),
            BinOp::Eq => Bool(a == b),
            BinOp::Ne => Bool(a != b),
            _ => return Err(invalid(op.symbol(), &Bool(a), expr)),
        },
        (Str(a), Str(b)) => match op {
            BinOp::Add => Str([a, b].concat()),
            BinOp::Eq => Bool(a == b),
            BinOp::Ne => Bool(a != b),
            BinOp::Lt => Bool(a < b),
            BinOp::Gt => Bool(a > b),
            BinOp::Le => Bool(a <= b),
            BinOp::Ge => Bool(a >= b),
            _ => return Err(invalid(op.symbol(), &Str(a), expr)),
        },
        (l, _) => return Err(invalid(op.symbol(), &l, expr)),
    })
}

fn invalid(op: &str, value: &ConstValue, expr: &Expr) -> TypeError {
    let operand = match value {
        ConstValue::Int(_) => "untyped int constant",
        ConstValue::Bool(_) => "untyped bool constant",
        ConstValue::Str(_) => "untyped string constant",
    };
    TypeError::new(
        TypeErrorKind::InvalidOperation { op: op.to_string(), operand: operand.to_string() },
        expr.span,
    )
}

fn unary_symbol(op: UnaryOp) -> &'static str {
    match op {
        UnaryOp::Plus => "+",
        UnaryOp::Neg => "-",
        UnaryOp::Not => "!",
        UnaryOp::BitNot => "^",
        UnaryOp::Addr => "&",
    }
}
