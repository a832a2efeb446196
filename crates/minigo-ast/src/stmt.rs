// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Statement AST nodes.

use crate::decl::Decl;
use crate::expr::{Expr, Name};
use crate::{NodeId, Span};

/// A statement in the AST.
#[derive(Debug, Clone)]
pub struct Stmt {
    pub id: NodeId,
    pub kind: StmtKind,
    pub span: Span,
}

/// The kind of statement.
#[derive(Debug, Clone)]
pub enum StmtKind {
    /// Local `var`, `const` or `type` declaration.
    Decl(Decl),
    Expr(Expr),
    /// `lhs op rhs` for `=`, `:=` and the compound operators.
    Assign {
        lhs: Vec<Expr>,
        op: AssignOp,
        rhs: Vec<Expr>,
    },
    /// `x++` / `x--`
    IncDec { target: Expr, inc: bool },
    Return(Vec<Expr>),
    If {
        init: Option<Box<Stmt>>,
        cond: Expr,
        then_block: Block,
        /// Either another `If` or a `Block`.
        else_branch: Option<Box<Stmt>>,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        post: Option<Box<Stmt>>,
        body: Block,
    },
    Range {
        key: Option<Expr>,
        value: Option<Expr>,
        /// `:=` form declares `key`/`value` as new variables.
        define: bool,
        collection: Expr,
        body: Block,
    },
    Switch {
        init: Option<Box<Stmt>>,
        tag: Option<Expr>,
        clauses: Vec<CaseClause>,
    },
    TypeSwitch {
        init: Option<Box<Stmt>>,
        /// `v` in `switch v := x.(type)`.
        binding: Option<Name>,
        subject: Expr,
        clauses: Vec<TypeCaseClause>,
    },
    /// `break` / `continue`; the enclosing construct is looked up by this statement's id.
    Branch(BranchKind),
    Block(Block),
    Empty,
}

/// A `case e1, e2:` or `default:` clause of an expression switch.
#[derive(Debug, Clone)]
pub struct CaseClause {
    pub id: NodeId,
    /// Empty for `default`.
    pub exprs: Vec<Expr>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

/// A `case T1, T2:` or `default:` clause of a type switch.
#[derive(Debug, Clone)]
pub struct TypeCaseClause {
    pub id: NodeId,
    /// Empty for `default`. `nil` appears as an identifier.
    pub types: Vec<Expr>,
    /// Per-clause object for the switch binding, if the switch has one.
    pub binding: Option<Name>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchKind {
    Break,
    Continue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    /// `=`
    Assign,
    /// `:=`
    Define,
    /// `op=`, carrying the arithmetic operator.
    Compound(crate::expr::BinOp),
}

impl StmtKind {
    pub fn describe(&self) -> &'static str {
        match self {
            StmtKind::Decl(_) => "declaration statement",
            StmtKind::Expr(_) => "expression statement",
            StmtKind::Assign { .. } => "assignment",
            StmtKind::IncDec { .. } => "inc/dec statement",
            StmtKind::Return(_) => "return statement",
            StmtKind::If { .. } => "if statement",
            StmtKind::For { .. } => "for statement",
            StmtKind::Range { .. } => "range statement",
            StmtKind::Switch { .. } => "switch statement",
            StmtKind::TypeSwitch { .. } => "type switch statement",
            StmtKind::Branch(_) => "branch statement",
            StmtKind::Block(_) => "block",
            StmtKind::Empty => "empty statement",
        }
    }
}
