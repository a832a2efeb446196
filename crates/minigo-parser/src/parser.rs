// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! The parser implementation: recursive descent, precedence climbing for
//! binary operators, and identifier resolution against a live scope chain.

use minigo_ast::decl::{Decl, DeclKind, File, FuncDecl, ImportSpec, Param, Signature, TypeSpec, ValueSpec};
use minigo_ast::expr::{BinOp, Expr, ExprKind, Field, LitKind, Name, UnaryOp};
use minigo_ast::object::{ObjDecl, ObjKind, Object};
use minigo_ast::scope::{Scope, ScopeKind, ScopeStack};
use minigo_ast::stmt::{AssignOp, Block, BranchKind, CaseClause, Stmt, StmtKind, TypeCaseClause};
use minigo_ast::token::{Token, TokenKind};
use minigo_ast::{FileId, NodeId, ObjId, Program, Span};

/// An identifier use that could not be bound when it was parsed.
#[derive(Debug, Clone)]
pub struct Unresolved {
    pub node: NodeId,
    pub name: String,
    pub span: Span,
}

/// Output of parsing one file.
#[derive(Debug)]
pub struct ParsedFile {
    pub file: File,
    /// Top-level declarations and imports of the file.
    pub scope: Scope,
    /// Identifiers still unbound after the whole file was visible.
    pub unresolved: Vec<Unresolved>,
}

/// The parser for one minigo source file.
///
/// Objects, resolutions and struct specs are recorded directly into the
/// shared `Program`.
pub struct Parser<'p> {
    program: &'p mut Program,
    tokens: Vec<Token>,
    pos: usize,
    file: FileId,
    package: String,
    scopes: ScopeStack,
    unresolved: Vec<Unresolved>,
    /// Paren/bracket nesting; negative inside control clause headers so that
    /// `{` after a type name starts a block instead of a composite literal.
    expr_lev: i32,
    /// Set while parsing a parameter list, where names and types are only
    /// told apart once the list is complete.
    defer_resolution: bool,
}

const SEMI: TokenKind = TokenKind::Semi { inserted: false };

/// Result of a simple statement parse in a `for` header.
enum Simple {
    Stmt(Stmt),
    Range {
        key: Option<Expr>,
        value: Option<Expr>,
        define: bool,
        collection: Expr,
    },
}

enum ForHeader {
    Loop {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        post: Option<Box<Stmt>>,
    },
    Range {
        key: Option<Expr>,
        value: Option<Expr>,
        define: bool,
        collection: Expr,
    },
}

/// One entry of a parameter list before names and types are told apart.
enum ParamEntry {
    /// A lone identifier: a name or a type.
    Ident(Name),
    Named(Name, Expr),
    Type(Expr),
}

impl<'p> Parser<'p> {
    pub fn new(program: &'p mut Program, mut tokens: Vec<Token>, file: FileId) -> Self {
        if !matches!(tokens.last(), Some(Token { kind: TokenKind::Eof, .. })) {
            let end = tokens.last().map(|t| t.span.end).unwrap_or(0);
            tokens.push(Token { kind: TokenKind::Eof, span: Span::new(file, end, end) });
        }
        Self {
            program,
            tokens,
            pos: 0,
            file,
            package: String::new(),
            scopes: ScopeStack::new(),
            unresolved: Vec::new(),
            expr_lev: 0,
            defer_resolution: false,
        }
    }

    fn next_id(&mut self) -> NodeId {
        self.program.next_node_id()
    }

    // =========================================================================
    // Token Navigation
    // =========================================================================

    fn current(&self) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[self.pos.min(last)]
    }

    fn current_kind(&self) -> &TokenKind {
        &self.current().kind
    }

    fn peek(&self, n: usize) -> &TokenKind {
        self.tokens.get(self.pos + n).map(|t| &t.kind).unwrap_or(&TokenKind::Eof)
    }

    fn at_end(&self) -> bool {
        matches!(self.current_kind(), TokenKind::Eof)
    }

    fn advance(&mut self) -> &Token {
        let at = self.pos.min(self.tokens.len() - 1);
        if !self.at_end() {
            self.pos += 1;
        }
        &self.tokens[at]
    }

    /// End offset of the last consumed token.
    fn prev_end(&self) -> usize {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|t| t.span.end)
            .unwrap_or(0)
    }

    fn span_from(&self, start: Span) -> Span {
        Span::new(self.file, start.start, self.prev_end().max(start.start))
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.current_kind()) == std::mem::discriminant(kind)
    }

    fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, rule: &'static str) -> Result<Span, ParseError> {
        if self.check(kind) {
            Ok(self.advance().span)
        } else {
            Err(ParseError::expected(
                rule,
                &format!("'{}'", kind.symbol()),
                self.current_kind(),
                self.current().span,
            ))
        }
    }

    /// Statement terminator; may be omitted before a closing `)` or `}`.
    fn expect_semi(&mut self, rule: &'static str) -> Result<(), ParseError> {
        match self.current_kind() {
            TokenKind::Semi { .. } => {
                self.advance();
                Ok(())
            }
            TokenKind::RParen | TokenKind::RBrace => Ok(()),
            found => Err(ParseError::expected(rule, "';' or newline", found, self.current().span)),
        }
    }

    fn expect_ident(&mut self, rule: &'static str) -> Result<Name, ParseError> {
        match self.current_kind().clone() {
            TokenKind::Ident(name) => {
                let span = self.advance().span;
                Ok(Name { id: self.next_id(), name, span })
            }
            found => Err(ParseError::expected(rule, "a name", &found, self.current().span)),
        }
    }

    fn unsupported(&self, rule: &'static str, construct: &str) -> ParseError {
        ParseError::unsupported(rule, construct, self.current().span)
    }

    // =========================================================================
    // Scopes and Resolution
    // =========================================================================

    /// Create an object for `name` and bind it in the innermost scope.
    fn declare(&mut self, name: &Name, kind: ObjKind, decl: ObjDecl) -> Result<ObjId, ParseError> {
        if !name.is_blank() && self.scopes.lookup_local(&name.name).is_some() {
            return Err(ParseError::syntax(
                "declaration",
                format!("{} redeclared in this block", name.name),
                name.span,
            ));
        }
        let id = self.new_object(name, kind, decl);
        self.scopes.define(&name.name, id);
        Ok(id)
    }

    /// Create an object for `name` without binding it in any scope.
    fn new_object(&mut self, name: &Name, kind: ObjKind, decl: ObjDecl) -> ObjId {
        let id = self.program.add_object(Object {
            kind,
            name: name.name.clone(),
            pkg: Some(self.package.clone()),
            decl,
            span: name.span,
            var: None,
            qualifier: None,
        });
        self.program.resolve(name.id, id);
        id
    }

    /// Bind an identifier use, or defer it if nothing visible matches.
    fn resolve_ident(&mut self, expr: &Expr) {
        if self.defer_resolution {
            return;
        }
        let ExprKind::Ident(name) = &expr.kind else { return };
        if name == "_" {
            return;
        }
        match self.scopes.lookup(name) {
            Some(obj) => self.program.resolve(expr.id, obj),
            None => self.unresolved.push(Unresolved { node: expr.id, name: name.clone(), span: expr.span }),
        }
    }

    /// Resolve an expression left unresolved by lhs-mode parsing.
    fn resolve_top(&mut self, expr: &Expr) {
        if matches!(expr.kind, ExprKind::Ident(_)) {
            self.resolve_ident(expr);
        }
    }

    /// Resolve every identifier use in a subtree (parameter types).
    fn resolve_tree(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Ident(_) => self.resolve_ident(expr),
            ExprKind::BasicLit { .. } | ExprKind::InterfaceType => {}
            ExprKind::Binary { left, right, .. } => {
                self.resolve_tree(left);
                self.resolve_tree(right);
            }
            ExprKind::Unary { operand, .. } => self.resolve_tree(operand),
            ExprKind::Star(inner) | ExprKind::Paren(inner) => self.resolve_tree(inner),
            ExprKind::Call { func, args } => {
                self.resolve_tree(func);
                for arg in args {
                    self.resolve_tree(arg);
                }
            }
            ExprKind::Selector { object, .. } => self.resolve_tree(object),
            ExprKind::Index { object, index } => {
                self.resolve_tree(object);
                self.resolve_tree(index);
            }
            ExprKind::Slice { object, low, high, max } => {
                self.resolve_tree(object);
                for part in [low, high, max].into_iter().flatten() {
                    self.resolve_tree(part);
                }
            }
            ExprKind::CompositeLit { ty, elts } => {
                if let Some(ty) = ty {
                    self.resolve_tree(ty);
                }
                for elt in elts {
                    self.resolve_tree(elt);
                }
            }
            ExprKind::KeyValue { key, value } => {
                if !matches!(key.kind, ExprKind::Ident(_)) {
                    self.resolve_tree(key);
                }
                self.resolve_tree(value);
            }
            ExprKind::TypeAssert { object, ty } => {
                self.resolve_tree(object);
                if let Some(ty) = ty {
                    self.resolve_tree(ty);
                }
            }
            ExprKind::ArrayType { len, elem } => {
                if let Some(len) = len {
                    self.resolve_tree(len);
                }
                self.resolve_tree(elem);
            }
            ExprKind::StructType(fields) => {
                for field in fields {
                    self.resolve_tree(&field.ty);
                }
            }
        }
    }

    // =========================================================================
    // File
    // =========================================================================

    /// Parse a whole file. Identifiers not visible at their use site are
    /// retried against the completed file scope; the rest are returned for
    /// package-level resolution.
    pub fn parse_file(mut self) -> Result<ParsedFile, ParseError> {
        self.scopes.push(ScopeKind::File);

        self.expect(&TokenKind::Package, "package clause")?;
        let package = self.expect_ident("package clause")?;
        self.package = package.name.clone();
        self.expect_semi("package clause")?;

        let mut imports = Vec::new();
        while self.check(&TokenKind::Import) {
            self.parse_import_decl(&mut imports)?;
        }

        let mut decls = Vec::new();
        while !self.at_end() {
            match self.current_kind() {
                TokenKind::Var | TokenKind::Const | TokenKind::Type => decls.extend(self.parse_gen_decl()?),
                TokenKind::Func => decls.push(self.parse_func_decl()?),
                TokenKind::Import => {
                    return Err(ParseError::syntax(
                        "source file",
                        "imports must appear before other declarations",
                        self.current().span,
                    ))
                }
                found => {
                    return Err(ParseError::expected("source file", "declaration", found, self.current().span))
                }
            }
            self.expect_semi("top-level declaration")?;
        }

        let scope = self.scopes.pop().unwrap_or_else(|| Scope::new(ScopeKind::File));
        let mut unresolved = Vec::new();
        for u in std::mem::take(&mut self.unresolved) {
            match scope.lookup(&u.name) {
                Some(obj) => self.program.resolve(u.node, obj),
                None => unresolved.push(u),
            }
        }

        log::debug!(
            "parsed file {} of package {}: {} declarations, {} identifiers deferred",
            self.file.0,
            self.package,
            decls.len(),
            unresolved.len()
        );

        Ok(ParsedFile {
            file: File { id: self.file, package, imports, decls },
            scope,
            unresolved,
        })
    }

    fn parse_import_decl(&mut self, imports: &mut Vec<ImportSpec>) -> Result<(), ParseError> {
        self.expect(&TokenKind::Import, "import declaration")?;
        if self.match_token(&TokenKind::LParen) {
            while !self.check(&TokenKind::RParen) && !self.at_end() {
                imports.push(self.parse_import_spec()?);
                self.expect_semi("import declaration")?;
            }
            self.expect(&TokenKind::RParen, "import declaration")?;
        } else {
            imports.push(self.parse_import_spec()?);
        }
        self.expect_semi("import declaration")
    }

    fn parse_import_spec(&mut self) -> Result<ImportSpec, ParseError> {
        let start = self.current().span;
        let alias = match self.current_kind() {
            TokenKind::Ident(_) => Some(self.expect_ident("import declaration")?),
            TokenKind::Dot => return Err(self.unsupported("import declaration", "dot imports")),
            _ => None,
        };
        let path = match self.current_kind().clone() {
            TokenKind::String(raw) => {
                self.advance();
                unquote(&raw)
            }
            found => {
                return Err(ParseError::expected("import declaration", "import path", &found, self.current().span))
            }
        };
        let span = self.span_from(start);
        let name = match alias {
            Some(alias) => alias,
            None => {
                let last = path.rsplit('/').next().unwrap_or(&path).to_string();
                Name { id: self.next_id(), name: last, span }
            }
        };
        if !name.is_blank() {
            self.declare(&name, ObjKind::Package, ObjDecl::Package { path: path.clone() })?;
        }
        Ok(ImportSpec { name, path, span })
    }

    // =========================================================================
    // Declarations
    // =========================================================================

    /// `var`, `const` or `type`, single or grouped. Groups are flattened.
    fn parse_gen_decl(&mut self) -> Result<Vec<Decl>, ParseError> {
        let keyword = self.current_kind().clone();
        let rule = match keyword {
            TokenKind::Var => "var declaration",
            TokenKind::Const => "const declaration",
            _ => "type declaration",
        };
        self.advance();

        let mut decls = Vec::new();
        let mut prev = None;
        if self.match_token(&TokenKind::LParen) {
            let mut iota = 0;
            while !self.check(&TokenKind::RParen) && !self.at_end() {
                decls.push(self.parse_spec(&keyword, iota, &mut prev)?);
                iota += 1;
                self.expect_semi(rule)?;
            }
            self.expect(&TokenKind::RParen, rule)?;
        } else {
            decls.push(self.parse_spec(&keyword, 0, &mut prev)?);
        }
        Ok(decls)
    }

    fn parse_spec(
        &mut self,
        keyword: &TokenKind,
        iota: i64,
        prev: &mut Option<(Option<Expr>, Vec<Expr>)>,
    ) -> Result<Decl, ParseError> {
        let start = self.current().span;
        let kind = match keyword {
            TokenKind::Var => DeclKind::Var(self.parse_var_spec()?),
            TokenKind::Const => DeclKind::Const(self.parse_const_spec(iota, prev)?),
            _ => DeclKind::Type(self.parse_type_spec()?),
        };
        Ok(Decl { id: self.next_id(), kind, span: self.span_from(start) })
    }

    fn parse_name_list(&mut self, rule: &'static str) -> Result<Vec<Name>, ParseError> {
        let mut names = vec![self.expect_ident(rule)?];
        while self.match_token(&TokenKind::Comma) {
            names.push(self.expect_ident(rule)?);
        }
        Ok(names)
    }

    fn parse_var_spec(&mut self) -> Result<ValueSpec, ParseError> {
        let names = self.parse_name_list("var declaration")?;
        let ty = if self.check(&TokenKind::Eq) { None } else { Some(self.parse_type()?) };
        let values = if self.match_token(&TokenKind::Eq) {
            self.parse_expr_list(false)?
        } else {
            Vec::new()
        };
        // Names come into scope after their initializers.
        for name in &names {
            self.declare(name, ObjKind::Var, ObjDecl::Var { ty: ty.clone() })?;
        }
        Ok(ValueSpec { names, ty, values })
    }

    fn parse_const_spec(
        &mut self,
        iota: i64,
        prev: &mut Option<(Option<Expr>, Vec<Expr>)>,
    ) -> Result<ValueSpec, ParseError> {
        let start = self.current().span;
        let names = self.parse_name_list("const declaration")?;
        let explicit_ty = match self.current_kind() {
            TokenKind::Eq | TokenKind::Semi { .. } | TokenKind::RParen => None,
            _ => Some(self.parse_type()?),
        };

        let (ty, values) = if self.match_token(&TokenKind::Eq) {
            let values = self.parse_expr_list(false)?;
            *prev = Some((explicit_ty.clone(), values.clone()));
            (explicit_ty, values)
        } else if explicit_ty.is_none() {
            match prev {
                // Implicit repetition of the previous expression list
                Some((ty, values)) => (ty.clone(), values.clone()),
                None => {
                    return Err(ParseError::syntax(
                        "const declaration",
                        "missing init expr for const declaration",
                        self.span_from(start),
                    ))
                }
            }
        } else {
            return Err(ParseError::syntax(
                "const declaration",
                "missing init expr for const declaration",
                self.span_from(start),
            ));
        };

        if values.len() != names.len() {
            return Err(ParseError::syntax(
                "const declaration",
                format!("{} names but {} values in const declaration", names.len(), values.len()),
                self.span_from(start),
            ));
        }
        for (name, value) in names.iter().zip(&values) {
            self.declare(
                name,
                ObjKind::Const,
                ObjDecl::Const { ty: ty.clone(), value: value.clone(), iota },
            )?;
        }
        Ok(ValueSpec { names, ty, values })
    }

    fn parse_type_spec(&mut self) -> Result<TypeSpec, ParseError> {
        let name = self.expect_ident("type declaration")?;
        if self.check(&TokenKind::Eq) {
            return Err(self.unsupported("type declaration", "type aliases"));
        }
        // Declared first so the type may refer to itself through a pointer.
        let placeholder = Expr { id: NodeId::DUMMY, kind: ExprKind::InterfaceType, span: name.span };
        let obj = self.declare(&name, ObjKind::Type, ObjDecl::TypeName { ty: placeholder })?;
        let ty = self.parse_type()?;
        self.program.object_mut(obj).decl = ObjDecl::TypeName { ty: ty.clone() };
        Ok(TypeSpec { name, ty })
    }

    fn parse_func_decl(&mut self) -> Result<Decl, ParseError> {
        let start = self.expect(&TokenKind::Func, "function declaration")?;

        let recv = if self.check(&TokenKind::LParen) {
            let recv_start = self.current().span;
            let mut list = self.parse_parameters("method receiver")?;
            if list.len() != 1 {
                return Err(ParseError::syntax(
                    "method receiver",
                    "method must have exactly one receiver",
                    self.span_from(recv_start),
                ));
            }
            list.pop()
        } else {
            None
        };

        let name = self.expect_ident("function declaration")?;
        let sig = self.parse_signature()?;

        let decl = ObjDecl::Func { recv: recv.clone(), sig: sig.clone() };
        if recv.is_some() {
            // Methods are reached through the method table, never by scope lookup.
            self.new_object(&name, ObjKind::Func, decl);
        } else {
            self.declare(&name, ObjKind::Func, decl)?;
        }

        let body = if self.check(&TokenKind::LBrace) {
            self.scopes.push(ScopeKind::Function);
            for param in recv.iter().chain(&sig.params).chain(&sig.results) {
                if let Some(pname) = &param.name {
                    self.declare(pname, ObjKind::Var, ObjDecl::Var { ty: Some(param.ty.clone()) })?;
                }
            }
            let body = self.parse_body();
            self.scopes.pop();
            Some(body?)
        } else {
            None
        };

        Ok(Decl {
            id: self.next_id(),
            kind: DeclKind::Func(FuncDecl { recv, name, sig, body }),
            span: self.span_from(start),
        })
    }

    fn parse_signature(&mut self) -> Result<Signature, ParseError> {
        let params = self.parse_parameters("parameter list")?;
        let results = match self.current_kind() {
            TokenKind::LParen => self.parse_parameters("result list")?,
            TokenKind::Ident(_)
            | TokenKind::Star
            | TokenKind::LBracket
            | TokenKind::Struct
            | TokenKind::Interface
            | TokenKind::Map
            | TokenKind::Chan
            | TokenKind::Func => {
                let ty = self.parse_type()?;
                vec![Param { name: None, ty }]
            }
            _ => Vec::new(),
        };
        Ok(Signature { params, results })
    }

    /// `(a, b int, c string)` or `(int, string)`. The list is read without
    /// resolving anything, then split into names and types once its shape is
    /// known.
    fn parse_parameters(&mut self, rule: &'static str) -> Result<Vec<Param>, ParseError> {
        self.expect(&TokenKind::LParen, rule)?;
        let saved = std::mem::replace(&mut self.defer_resolution, true);
        let entries = self.parse_param_entries(rule);
        self.defer_resolution = saved;
        let entries = entries?;
        self.expect(&TokenKind::RParen, rule)?;

        let named = entries.iter().any(|e| matches!(e, ParamEntry::Named(..)));
        let mut params = Vec::new();
        if !named {
            for entry in entries {
                let ty = match entry {
                    ParamEntry::Ident(name) => Expr { id: name.id, kind: ExprKind::Ident(name.name), span: name.span },
                    ParamEntry::Type(ty) | ParamEntry::Named(_, ty) => ty,
                };
                self.resolve_tree(&ty);
                params.push(Param { name: None, ty });
            }
            return Ok(params);
        }

        let mut pending = Vec::new();
        for entry in entries {
            match entry {
                ParamEntry::Ident(name) => pending.push(name),
                ParamEntry::Named(name, ty) => {
                    self.resolve_tree(&ty);
                    pending.push(name);
                    for name in pending.drain(..) {
                        params.push(Param { name: Some(name), ty: ty.clone() });
                    }
                }
                ParamEntry::Type(ty) => {
                    return Err(ParseError::syntax(rule, "mixed named and unnamed parameters", ty.span))
                }
            }
        }
        if let Some(name) = pending.first() {
            return Err(ParseError::syntax(rule, "mixed named and unnamed parameters", name.span));
        }
        Ok(params)
    }

    fn parse_param_entries(&mut self, rule: &'static str) -> Result<Vec<ParamEntry>, ParseError> {
        let mut entries = Vec::new();
        while !self.check(&TokenKind::RParen) && !self.at_end() {
            let is_name = matches!(self.current_kind(), TokenKind::Ident(_)) && !matches!(self.peek(1), TokenKind::Dot);
            let entry = if is_name {
                let name = self.expect_ident(rule)?;
                match self.current_kind() {
                    TokenKind::Comma | TokenKind::RParen => ParamEntry::Ident(name),
                    TokenKind::Ellipsis => return Err(self.unsupported(rule, "variadic parameters")),
                    _ => ParamEntry::Named(name, self.parse_type()?),
                }
            } else {
                if self.check(&TokenKind::Ellipsis) {
                    return Err(self.unsupported(rule, "variadic parameters"));
                }
                ParamEntry::Type(self.parse_type()?)
            };
            entries.push(entry);
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        Ok(entries)
    }

    // =========================================================================
    // Types
    // =========================================================================

    fn parse_type(&mut self) -> Result<Expr, ParseError> {
        let start = self.current().span;
        let kind = match self.current_kind().clone() {
            TokenKind::Ident(_) => {
                let name = self.expect_ident("type")?;
                let ident = Expr { id: name.id, kind: ExprKind::Ident(name.name), span: name.span };
                self.resolve_ident(&ident);
                if !self.match_token(&TokenKind::Dot) {
                    return Ok(ident);
                }
                let field = self.expect_ident("qualified type name")?;
                ExprKind::Selector { object: Box::new(ident), field: field.name }
            }
            TokenKind::Star => {
                self.advance();
                ExprKind::Star(Box::new(self.parse_type()?))
            }
            TokenKind::LBracket => return self.parse_array_type(),
            TokenKind::Struct => return self.parse_struct_type(),
            TokenKind::Interface => {
                self.advance();
                self.expect(&TokenKind::LBrace, "interface type")?;
                if !self.check(&TokenKind::RBrace) {
                    return Err(self.unsupported("interface type", "interfaces with methods"));
                }
                self.advance();
                ExprKind::InterfaceType
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_type()?;
                self.expect(&TokenKind::RParen, "parenthesized type")?;
                ExprKind::Paren(Box::new(inner))
            }
            TokenKind::Map => return Err(self.unsupported("type", "map types")),
            TokenKind::Chan | TokenKind::Arrow => return Err(self.unsupported("type", "channel types")),
            TokenKind::Func => return Err(self.unsupported("type", "function types")),
            found => return Err(ParseError::expected("type", "type", &found, self.current().span)),
        };
        Ok(Expr { id: self.next_id(), kind, span: self.span_from(start) })
    }

    /// `[]T` or `[N]T`.
    fn parse_array_type(&mut self) -> Result<Expr, ParseError> {
        let start = self.expect(&TokenKind::LBracket, "array type")?;
        let len = if self.match_token(&TokenKind::RBracket) {
            None
        } else {
            if self.check(&TokenKind::Ellipsis) {
                return Err(self.unsupported("array type", "implicit array lengths"));
            }
            self.expr_lev += 1;
            let len = self.parse_expr();
            self.expr_lev -= 1;
            let len = len?;
            self.expect(&TokenKind::RBracket, "array type")?;
            Some(Box::new(len))
        };
        let elem = self.parse_type()?;
        Ok(Expr {
            id: self.next_id(),
            kind: ExprKind::ArrayType { len, elem: Box::new(elem) },
            span: self.span_from(start),
        })
    }

    fn parse_struct_type(&mut self) -> Result<Expr, ParseError> {
        let start = self.expect(&TokenKind::Struct, "struct type")?;
        self.expect(&TokenKind::LBrace, "struct type")?;
        let mut fields = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.at_end() {
            if matches!(self.current_kind(), TokenKind::Star)
                || matches!(self.peek(1), TokenKind::Semi { .. } | TokenKind::RBrace | TokenKind::Dot)
            {
                return Err(self.unsupported("struct type", "embedded struct fields"));
            }
            let names = self.parse_name_list("struct field")?;
            let ty = self.parse_type()?;
            // Field tags carry no meaning here.
            if let TokenKind::String(_) = self.current_kind() {
                self.advance();
            }
            fields.push(Field { names, ty });
            self.expect_semi("struct type")?;
        }
        self.expect(&TokenKind::RBrace, "struct type")?;

        let id = self.next_id();
        self.program.struct_specs.insert(id, fields.clone());
        Ok(Expr { id, kind: ExprKind::StructType(fields), span: self.span_from(start) })
    }

    // =========================================================================
    // Statements
    // =========================================================================

    /// Function body: shares the function scope holding the parameters.
    fn parse_body(&mut self) -> Result<Block, ParseError> {
        let start = self.expect(&TokenKind::LBrace, "function body")?;
        let stmts = self.parse_stmt_list()?;
        self.expect(&TokenKind::RBrace, "function body")?;
        Ok(Block { stmts, span: self.span_from(start) })
    }

    fn parse_block(&mut self, rule: &'static str) -> Result<Block, ParseError> {
        let start = self.expect(&TokenKind::LBrace, rule)?;
        self.scopes.push(ScopeKind::Block);
        let stmts = self.parse_stmt_list();
        self.scopes.pop();
        let stmts = stmts?;
        self.expect(&TokenKind::RBrace, rule)?;
        Ok(Block { stmts, span: self.span_from(start) })
    }

    fn parse_stmt_list(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut stmts = Vec::new();
        while !matches!(
            self.current_kind(),
            TokenKind::RBrace | TokenKind::Case | TokenKind::Default | TokenKind::Eof
        ) {
            match self.current_kind() {
                TokenKind::Var | TokenKind::Const | TokenKind::Type => {
                    for decl in self.parse_gen_decl()? {
                        let span = decl.span;
                        stmts.push(Stmt { id: self.next_id(), kind: StmtKind::Decl(decl), span });
                    }
                }
                _ => stmts.push(self.parse_stmt()?),
            }
            if !matches!(self.current_kind(), TokenKind::RBrace | TokenKind::Case | TokenKind::Default) {
                self.expect_semi("statement list")?;
            }
        }
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        let start = self.current().span;
        let kind = match self.current_kind() {
            TokenKind::LBrace => StmtKind::Block(self.parse_block("block")?),
            TokenKind::If => return self.parse_if_stmt(),
            TokenKind::For => return self.parse_for_stmt(),
            TokenKind::Switch => return self.parse_switch_stmt(),
            TokenKind::Return => {
                self.advance();
                let values = match self.current_kind() {
                    TokenKind::Semi { .. } | TokenKind::RBrace => Vec::new(),
                    _ => self.parse_expr_list(false)?,
                };
                StmtKind::Return(values)
            }
            TokenKind::Break | TokenKind::Continue => {
                let kind = if self.check(&TokenKind::Break) { BranchKind::Break } else { BranchKind::Continue };
                self.advance();
                if let TokenKind::Ident(_) = self.current_kind() {
                    return Err(self.unsupported("branch statement", "labels"));
                }
                StmtKind::Branch(kind)
            }
            TokenKind::Semi { .. } => StmtKind::Empty,
            TokenKind::Go => return Err(self.unsupported("statement", "goroutines")),
            TokenKind::Defer => return Err(self.unsupported("statement", "defer statements")),
            TokenKind::Select => return Err(self.unsupported("statement", "select statements")),
            TokenKind::Goto => return Err(self.unsupported("statement", "goto statements")),
            TokenKind::Fallthrough => return Err(self.unsupported("statement", "fallthrough statements")),
            _ => return self.parse_simple_stmt(false).and_then(|s| self.into_stmt(s)),
        };
        Ok(Stmt { id: self.next_id(), kind, span: self.span_from(start) })
    }

    fn into_stmt(&self, simple: Simple) -> Result<Stmt, ParseError> {
        match simple {
            Simple::Stmt(stmt) => Ok(stmt),
            Simple::Range { collection, .. } => Err(ParseError::syntax(
                "statement",
                "range clause outside of a for statement",
                collection.span,
            )),
        }
    }

    /// Expression, assignment, `:=`, inc/dec; or a range clause when allowed.
    fn parse_simple_stmt(&mut self, range_ok: bool) -> Result<Simple, ParseError> {
        let start = self.current().span;

        if range_ok && self.check(&TokenKind::Range) {
            self.advance();
            let collection = self.parse_expr()?;
            return Ok(Simple::Range { key: None, value: None, define: false, collection });
        }

        let lhs = self.parse_expr_list(true)?;

        let op = match self.current_kind() {
            TokenKind::ColonEq => Some(AssignOp::Define),
            TokenKind::Eq => Some(AssignOp::Assign),
            other => compound_op(other).map(AssignOp::Compound),
        };

        let kind = if let Some(op) = op {
            self.advance();

            if range_ok && self.check(&TokenKind::Range) {
                return self.finish_range_clause(lhs, op);
            }

            let rhs = self.parse_expr_list(false)?;
            match op {
                AssignOp::Define => self.define_lhs(&lhs)?,
                AssignOp::Compound(_) if lhs.len() != 1 || rhs.len() != 1 => {
                    return Err(ParseError::syntax(
                        "assignment",
                        "assignment operation requires single-valued expressions",
                        self.span_from(start),
                    ))
                }
                _ => {
                    for target in &lhs {
                        self.resolve_top(target);
                    }
                }
            }
            StmtKind::Assign { lhs, op, rhs }
        } else {
            match self.current_kind() {
                TokenKind::PlusPlus | TokenKind::MinusMinus => {
                    let inc = self.check(&TokenKind::PlusPlus);
                    self.advance();
                    let target = self.single(lhs, "inc/dec statement")?;
                    self.resolve_top(&target);
                    StmtKind::IncDec { target, inc }
                }
                TokenKind::Colon if lhs.len() == 1 && matches!(lhs[0].kind, ExprKind::Ident(_)) => {
                    return Err(self.unsupported("statement", "labels"));
                }
                TokenKind::Arrow => return Err(self.unsupported("statement", "channel operations")),
                _ => {
                    let expr = self.single(lhs, "expression statement")?;
                    self.resolve_top(&expr);
                    StmtKind::Expr(expr)
                }
            }
        };

        Ok(Simple::Stmt(Stmt { id: self.next_id(), kind, span: self.span_from(start) }))
    }

    fn finish_range_clause(&mut self, lhs: Vec<Expr>, op: AssignOp) -> Result<Simple, ParseError> {
        let range_span = self.current().span;
        self.advance();
        let collection = self.parse_expr()?;
        if lhs.len() > 2 {
            return Err(ParseError::syntax("range clause", "range clause permits at most two iteration variables", range_span));
        }
        let define = op == AssignOp::Define;
        if define {
            self.define_lhs(&lhs)?;
        } else if op != AssignOp::Assign {
            return Err(ParseError::syntax("range clause", "range clause requires '=' or ':='", range_span));
        } else {
            for target in &lhs {
                self.resolve_top(target);
            }
        }
        let mut vars = lhs.into_iter();
        Ok(Simple::Range { key: vars.next(), value: vars.next(), define, collection })
    }

    fn single(&self, mut list: Vec<Expr>, rule: &'static str) -> Result<Expr, ParseError> {
        if list.len() != 1 {
            return Err(ParseError::expected(rule, "':=' or '='", self.current_kind(), self.current().span));
        }
        Ok(list.remove(0))
    }

    /// Bind the left side of `:=`: new names get fresh objects, names already
    /// declared in the same scope are reused.
    fn define_lhs(&mut self, lhs: &[Expr]) -> Result<(), ParseError> {
        let mut fresh = false;
        for target in lhs {
            let ExprKind::Ident(name) = &target.kind else {
                return Err(ParseError::syntax("short variable declaration", "non-name on left side of :=", target.span));
            };
            if name == "_" {
                continue;
            }
            match self.scopes.lookup_local(name) {
                Some(existing) => self.program.resolve(target.id, existing),
                None => {
                    let name = Name { id: target.id, name: name.clone(), span: target.span };
                    self.declare(&name, ObjKind::Var, ObjDecl::Var { ty: None })?;
                    fresh = true;
                }
            }
        }
        if !fresh {
            let span = lhs.first().map(|e| e.span).unwrap_or(self.current().span);
            return Err(ParseError::syntax("short variable declaration", "no new variables on left side of :=", span)
                .with_hint("use '=' to assign to existing variables"));
        }
        Ok(())
    }

    /// Parse a clause header with composite literals at the top level disabled.
    fn with_header_level<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, ParseError>) -> Result<T, ParseError> {
        let saved = std::mem::replace(&mut self.expr_lev, -1);
        let result = f(self);
        self.expr_lev = saved;
        result
    }

    fn parse_if_stmt(&mut self) -> Result<Stmt, ParseError> {
        let start = self.expect(&TokenKind::If, "if statement")?;
        self.scopes.push(ScopeKind::Block);
        let result = self.parse_if_rest(start);
        self.scopes.pop();
        result
    }

    fn parse_if_rest(&mut self, start: Span) -> Result<Stmt, ParseError> {
        let (init, cond) = self.with_header_level(Self::parse_if_header)?;
        let then_block = self.parse_block("if statement")?;
        let else_branch = if self.match_token(&TokenKind::Else) {
            match self.current_kind() {
                TokenKind::If => Some(Box::new(self.parse_if_stmt()?)),
                TokenKind::LBrace => {
                    let block_start = self.current().span;
                    let block = self.parse_block("else branch")?;
                    Some(Box::new(Stmt {
                        id: self.next_id(),
                        kind: StmtKind::Block(block),
                        span: self.span_from(block_start),
                    }))
                }
                found => {
                    return Err(ParseError::expected("else branch", "if statement or block", found, self.current().span))
                }
            }
        } else {
            None
        };
        Ok(Stmt {
            id: self.next_id(),
            kind: StmtKind::If { init, cond, then_block, else_branch },
            span: self.span_from(start),
        })
    }

    fn parse_if_header(&mut self) -> Result<(Option<Box<Stmt>>, Expr), ParseError> {
        if self.check(&TokenKind::LBrace) {
            return Err(ParseError::syntax("if statement", "missing condition in if statement", self.current().span));
        }
        let mut init = None;
        let mut cond = None;
        if !self.check(&SEMI) {
            let simple = self.parse_simple_stmt(false)?;
            cond = Some(self.into_stmt(simple)?);
        }
        if self.match_token(&SEMI) {
            init = cond.take().map(Box::new);
            if self.check(&TokenKind::LBrace) {
                return Err(ParseError::syntax("if statement", "missing condition in if statement", self.current().span));
            }
            let simple = self.parse_simple_stmt(false)?;
            cond = Some(self.into_stmt(simple)?);
        }
        let cond = self.condition(cond, "if statement")?;
        Ok((init, cond))
    }

    /// A header statement that must be a plain expression.
    fn condition(&self, stmt: Option<Stmt>, rule: &'static str) -> Result<Expr, ParseError> {
        match stmt {
            Some(Stmt { kind: StmtKind::Expr(expr), .. }) => Ok(expr),
            Some(other) => Err(ParseError::syntax(
                rule,
                format!("cannot use {} as value", other.kind.describe()),
                other.span,
            )),
            None => Err(ParseError::syntax(rule, "missing condition", self.current().span)),
        }
    }

    fn parse_for_stmt(&mut self) -> Result<Stmt, ParseError> {
        let start = self.expect(&TokenKind::For, "for statement")?;
        self.scopes.push(ScopeKind::Block);
        let result = self.parse_for_rest(start);
        self.scopes.pop();
        result
    }

    fn parse_for_rest(&mut self, start: Span) -> Result<Stmt, ParseError> {
        let header = self.with_header_level(Self::parse_for_header)?;
        let body = self.parse_block("for statement")?;
        let kind = match header {
            ForHeader::Loop { init, cond, post } => StmtKind::For { init, cond, post, body },
            ForHeader::Range { key, value, define, collection } => {
                StmtKind::Range { key, value, define, collection, body }
            }
        };
        Ok(Stmt { id: self.next_id(), kind, span: self.span_from(start) })
    }

    fn parse_for_header(&mut self) -> Result<ForHeader, ParseError> {
        if self.check(&TokenKind::LBrace) {
            return Ok(ForHeader::Loop { init: None, cond: None, post: None });
        }

        let mut first = None;
        if !self.check(&SEMI) {
            match self.parse_simple_stmt(true)? {
                Simple::Range { key, value, define, collection } => {
                    return Ok(ForHeader::Range { key, value, define, collection })
                }
                Simple::Stmt(stmt) => first = Some(stmt),
            }
        }

        if !self.match_token(&SEMI) {
            let cond = self.condition(first, "for statement")?;
            return Ok(ForHeader::Loop { init: None, cond: Some(cond), post: None });
        }

        let init = first.map(Box::new);
        let cond = if self.check(&SEMI) {
            None
        } else {
            let simple = self.parse_simple_stmt(false)?;
            let stmt = self.into_stmt(simple)?;
            Some(self.condition(Some(stmt), "for statement")?)
        };
        self.expect_semi("for clause")?;
        let post = if self.check(&TokenKind::LBrace) {
            None
        } else {
            let simple = self.parse_simple_stmt(false)?;
            let stmt = self.into_stmt(simple)?;
            if let StmtKind::Assign { op: AssignOp::Define, .. } = stmt.kind {
                return Err(ParseError::syntax("for clause", "cannot declare in post statement of for loop", stmt.span));
            }
            Some(Box::new(stmt))
        };
        Ok(ForHeader::Loop { init, cond, post })
    }

    fn parse_switch_stmt(&mut self) -> Result<Stmt, ParseError> {
        let start = self.expect(&TokenKind::Switch, "switch statement")?;
        self.scopes.push(ScopeKind::Block);
        let result = self.parse_switch_rest(start);
        self.scopes.pop();
        result
    }

    fn parse_switch_rest(&mut self, start: Span) -> Result<Stmt, ParseError> {
        let (init, tag) = self.with_header_level(Self::parse_switch_header)?;
        let init = init.map(Box::new);

        let kind = match type_switch_parts(tag) {
            Ok((binding, subject)) => {
                let clauses = self.parse_type_clauses(binding.as_ref())?;
                StmtKind::TypeSwitch { init, binding, subject, clauses }
            }
            Err(tag) => {
                let tag = match tag {
                    None => None,
                    stmt => Some(self.condition(stmt, "switch statement")?),
                };
                let clauses = self.parse_case_clauses()?;
                StmtKind::Switch { init, tag, clauses }
            }
        };
        Ok(Stmt { id: self.next_id(), kind, span: self.span_from(start) })
    }

    fn parse_switch_header(&mut self) -> Result<(Option<Stmt>, Option<Stmt>), ParseError> {
        if self.check(&TokenKind::LBrace) {
            return Ok((None, None));
        }
        let mut tag = None;
        let mut init = None;
        if !self.check(&SEMI) {
            let simple = self.parse_simple_stmt(false)?;
            tag = Some(self.into_stmt(simple)?);
        }
        if self.match_token(&SEMI) {
            init = tag.take();
            if !self.check(&TokenKind::LBrace) {
                let simple = self.parse_simple_stmt(false)?;
                tag = Some(self.into_stmt(simple)?);
            }
        }
        Ok((init, tag))
    }

    fn parse_case_clauses(&mut self) -> Result<Vec<CaseClause>, ParseError> {
        self.expect(&TokenKind::LBrace, "switch statement")?;
        let mut clauses = Vec::new();
        while matches!(self.current_kind(), TokenKind::Case | TokenKind::Default) {
            let start = self.current().span;
            let exprs = if self.match_token(&TokenKind::Case) {
                self.parse_expr_list(false)?
            } else {
                self.advance();
                Vec::new()
            };
            self.expect(&TokenKind::Colon, "case clause")?;
            self.scopes.push(ScopeKind::Block);
            let body = self.parse_stmt_list();
            self.scopes.pop();
            clauses.push(CaseClause { id: self.next_id(), exprs, body: body?, span: self.span_from(start) });
        }
        self.expect(&TokenKind::RBrace, "switch statement")?;
        Ok(clauses)
    }

    /// Clauses of a type switch. With a binding, every clause gets its own
    /// object for it.
    fn parse_type_clauses(&mut self, binding: Option<&Name>) -> Result<Vec<TypeCaseClause>, ParseError> {
        self.expect(&TokenKind::LBrace, "type switch")?;
        let mut clauses = Vec::new();
        while matches!(self.current_kind(), TokenKind::Case | TokenKind::Default) {
            let start = self.current().span;
            let mut types = Vec::new();
            if self.match_token(&TokenKind::Case) {
                types.push(self.parse_type()?);
                while self.match_token(&TokenKind::Comma) {
                    types.push(self.parse_type()?);
                }
            } else {
                self.advance();
            }
            self.expect(&TokenKind::Colon, "type switch clause")?;

            self.scopes.push(ScopeKind::Block);
            let clause_binding = match binding {
                Some(outer) => {
                    let name = Name { id: self.next_id(), name: outer.name.clone(), span: outer.span };
                    self.declare(&name, ObjKind::Var, ObjDecl::Var { ty: None })?;
                    Some(name)
                }
                None => None,
            };
            let body = self.parse_stmt_list();
            self.scopes.pop();

            clauses.push(TypeCaseClause {
                id: self.next_id(),
                types,
                binding: clause_binding,
                body: body?,
                span: self.span_from(start),
            });
        }
        self.expect(&TokenKind::RBrace, "type switch")?;
        Ok(clauses)
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    pub fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_expr_bp(false, 0)
    }

    /// Comma-separated expressions. In lhs mode bare identifiers are left
    /// unresolved for the caller.
    fn parse_expr_list(&mut self, lhs: bool) -> Result<Vec<Expr>, ParseError> {
        let mut list = vec![self.parse_expr_bp(lhs, 0)?];
        while self.match_token(&TokenKind::Comma) {
            list.push(self.parse_expr_bp(lhs, 0)?);
        }
        Ok(list)
    }

    fn parse_expr_bp(&mut self, mut lhs: bool, min_bp: u8) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary_expr(lhs)?;
        while let Some((l_bp, r_bp)) = self.infix_bp() {
            if l_bp < min_bp {
                break;
            }
            if lhs {
                self.resolve_top(&left);
                lhs = false;
            }
            let op = self.parse_binop()?;
            let right = self.parse_expr_bp(false, r_bp)?;
            let span = left.span.to(right.span);
            left = Expr {
                id: self.next_id(),
                kind: ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) },
                span,
            };
        }
        Ok(left)
    }

    fn parse_unary_expr(&mut self, lhs: bool) -> Result<Expr, ParseError> {
        let start = self.current().span;
        let op = match self.current_kind() {
            TokenKind::Plus => UnaryOp::Plus,
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Caret => UnaryOp::BitNot,
            TokenKind::Amp => UnaryOp::Addr,
            TokenKind::Star => {
                self.advance();
                let operand = self.parse_unary_expr(false)?;
                return Ok(Expr {
                    id: self.next_id(),
                    kind: ExprKind::Star(Box::new(operand)),
                    span: self.span_from(start),
                });
            }
            TokenKind::Arrow => return Err(self.unsupported("unary expression", "channel operations")),
            _ => return self.parse_primary_expr(lhs),
        };
        self.advance();
        let operand = self.parse_unary_expr(false)?;
        Ok(Expr {
            id: self.next_id(),
            kind: ExprKind::Unary { op, operand: Box::new(operand) },
            span: self.span_from(start),
        })
    }

    fn parse_operand(&mut self, lhs: bool) -> Result<Expr, ParseError> {
        let start = self.current().span;
        let kind = match self.current_kind().clone() {
            TokenKind::Int(raw) => {
                self.advance();
                ExprKind::BasicLit { kind: LitKind::Int, raw }
            }
            TokenKind::Char(raw) => {
                self.advance();
                ExprKind::BasicLit { kind: LitKind::Char, raw }
            }
            TokenKind::String(raw) => {
                self.advance();
                ExprKind::BasicLit { kind: LitKind::String, raw }
            }
            TokenKind::Ident(name) => {
                self.advance();
                let ident = Expr { id: self.next_id(), kind: ExprKind::Ident(name), span: start };
                if !lhs {
                    self.resolve_ident(&ident);
                }
                return Ok(ident);
            }
            TokenKind::LParen => {
                self.advance();
                self.expr_lev += 1;
                let inner = self.parse_expr();
                self.expr_lev -= 1;
                let inner = inner?;
                self.expect(&TokenKind::RParen, "parenthesized expression")?;
                ExprKind::Paren(Box::new(inner))
            }
            TokenKind::LBracket | TokenKind::Struct | TokenKind::Interface => return self.parse_type(),
            TokenKind::Map => return Err(self.unsupported("expression", "map types")),
            TokenKind::Chan => return Err(self.unsupported("expression", "channel types")),
            TokenKind::Func => return Err(self.unsupported("expression", "function literals")),
            found => return Err(ParseError::expected("operand", "expression", &found, start)),
        };
        Ok(Expr { id: self.next_id(), kind, span: self.span_from(start) })
    }

    fn parse_primary_expr(&mut self, mut lhs: bool) -> Result<Expr, ParseError> {
        let mut x = self.parse_operand(lhs)?;
        loop {
            let has_suffix = match self.current_kind() {
                TokenKind::Dot | TokenKind::LBracket | TokenKind::LParen => true,
                TokenKind::LBrace => is_literal_type(&x) && (self.expr_lev >= 0 || !is_type_name(&x)),
                _ => false,
            };
            if !has_suffix {
                break;
            }
            if lhs {
                self.resolve_top(&x);
                lhs = false;
            }
            x = match self.current_kind() {
                TokenKind::Dot => self.parse_selector_or_assert(x)?,
                TokenKind::LBracket => self.parse_index_or_slice(x)?,
                TokenKind::LParen => self.parse_call(x)?,
                _ => self.parse_composite_lit(Some(x))?,
            };
        }
        Ok(x)
    }

    fn parse_selector_or_assert(&mut self, object: Expr) -> Result<Expr, ParseError> {
        let start = object.span;
        self.expect(&TokenKind::Dot, "selector")?;
        let kind = match self.current_kind() {
            TokenKind::Ident(_) => {
                let field = self.expect_ident("selector")?;
                ExprKind::Selector { object: Box::new(object), field: field.name }
            }
            TokenKind::LParen => {
                self.advance();
                let ty = if self.match_token(&TokenKind::Type) { None } else { Some(Box::new(self.parse_type()?)) };
                self.expect(&TokenKind::RParen, "type assertion")?;
                ExprKind::TypeAssert { object: Box::new(object), ty }
            }
            found => {
                return Err(ParseError::expected("selector", "a name or '('", found, self.current().span))
            }
        };
        Ok(Expr { id: self.next_id(), kind, span: self.span_from(start) })
    }

    fn parse_index_or_slice(&mut self, object: Expr) -> Result<Expr, ParseError> {
        let start = object.span;
        self.expect(&TokenKind::LBracket, "index expression")?;
        self.expr_lev += 1;
        let parts = self.parse_index_parts();
        self.expr_lev -= 1;
        let (parts, colons) = parts?;
        self.expect(&TokenKind::RBracket, "index expression")?;

        let [low, high, max] = parts;
        let kind = if colons == 0 {
            let Some(index) = low else {
                return Err(ParseError::syntax("index expression", "expected operand", self.span_from(start)));
            };
            ExprKind::Index { object: Box::new(object), index: Box::new(index) }
        } else {
            if colons == 2 && (high.is_none() || max.is_none()) {
                return Err(ParseError::syntax(
                    "slice expression",
                    "middle and final index required in 3-index slice",
                    self.span_from(start),
                ));
            }
            ExprKind::Slice {
                object: Box::new(object),
                low: low.map(Box::new),
                high: high.map(Box::new),
                max: max.map(Box::new),
            }
        };
        Ok(Expr { id: self.next_id(), kind, span: self.span_from(start) })
    }

    fn parse_index_parts(&mut self) -> Result<([Option<Expr>; 3], usize), ParseError> {
        let mut parts: [Option<Expr>; 3] = [None, None, None];
        let mut colons = 0;
        if !self.check(&TokenKind::Colon) {
            parts[0] = Some(self.parse_expr()?);
        }
        while colons < 2 && self.match_token(&TokenKind::Colon) {
            colons += 1;
            if !self.check(&TokenKind::Colon) && !self.check(&TokenKind::RBracket) {
                parts[colons] = Some(self.parse_expr()?);
            }
        }
        Ok((parts, colons))
    }

    fn parse_call(&mut self, func: Expr) -> Result<Expr, ParseError> {
        let start = func.span;
        self.expect(&TokenKind::LParen, "call expression")?;
        self.expr_lev += 1;
        let args = self.parse_args();
        self.expr_lev -= 1;
        let args = args?;
        self.expect(&TokenKind::RParen, "call expression")?;
        Ok(Expr {
            id: self.next_id(),
            kind: ExprKind::Call { func: Box::new(func), args },
            span: self.span_from(start),
        })
    }

    /// Call arguments; types are accepted for conversions and `make`/`new`.
    fn parse_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        while !self.check(&TokenKind::RParen) && !self.at_end() {
            args.push(self.parse_expr()?);
            if self.check(&TokenKind::Ellipsis) {
                return Err(self.unsupported("call expression", "variadic arguments"));
            }
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        Ok(args)
    }

    /// `T{...}`, or an element literal with its type elided when `ty` is `None`.
    fn parse_composite_lit(&mut self, ty: Option<Expr>) -> Result<Expr, ParseError> {
        let start = ty.as_ref().map(|t| t.span).unwrap_or(self.current().span);
        self.expect(&TokenKind::LBrace, "composite literal")?;
        self.expr_lev += 1;
        let elts = self.parse_elements();
        self.expr_lev -= 1;
        let elts = elts?;
        self.expect(&TokenKind::RBrace, "composite literal")?;
        Ok(Expr {
            id: self.next_id(),
            kind: ExprKind::CompositeLit { ty: ty.map(Box::new), elts },
            span: self.span_from(start),
        })
    }

    fn parse_elements(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut elts = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.at_end() {
            elts.push(self.parse_element()?);
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        Ok(elts)
    }

    /// An element, possibly keyed. A bare identifier key names a struct
    /// field and is not resolved.
    fn parse_element(&mut self) -> Result<Expr, ParseError> {
        let x = self.parse_element_value(true)?;
        if !self.match_token(&TokenKind::Colon) {
            self.resolve_top(&x);
            return Ok(x);
        }
        let value = self.parse_element_value(false)?;
        let span = x.span.to(value.span);
        Ok(Expr {
            id: self.next_id(),
            kind: ExprKind::KeyValue { key: Box::new(x), value: Box::new(value) },
            span,
        })
    }

    fn parse_element_value(&mut self, key_ok: bool) -> Result<Expr, ParseError> {
        if self.check(&TokenKind::LBrace) {
            return self.parse_composite_lit(None);
        }
        self.parse_expr_bp(key_ok, 0)
    }

    // =========================================================================
    // Operator Precedence
    // =========================================================================

    /// Five binary precedence levels, all left-associative.
    fn infix_bp(&self) -> Option<(u8, u8)> {
        match self.current_kind() {
            TokenKind::PipePipe => Some((1, 2)),
            TokenKind::AmpAmp => Some((3, 4)),
            TokenKind::EqEq
            | TokenKind::BangEq
            | TokenKind::Lt
            | TokenKind::LtEq
            | TokenKind::Gt
            | TokenKind::GtEq => Some((5, 6)),
            TokenKind::Plus | TokenKind::Minus | TokenKind::Pipe | TokenKind::Caret => Some((7, 8)),
            TokenKind::Star
            | TokenKind::Slash
            | TokenKind::Percent
            | TokenKind::LtLt
            | TokenKind::GtGt
            | TokenKind::Amp
            | TokenKind::AmpCaret => Some((9, 10)),
            _ => None,
        }
    }

    fn parse_binop(&mut self) -> Result<BinOp, ParseError> {
        let op = match self.current_kind() {
            TokenKind::Plus => BinOp::Add,
            TokenKind::Minus => BinOp::Sub,
            TokenKind::Star => BinOp::Mul,
            TokenKind::Slash => BinOp::Div,
            TokenKind::Percent => BinOp::Rem,
            TokenKind::Amp => BinOp::BitAnd,
            TokenKind::Pipe => BinOp::BitOr,
            TokenKind::Caret => BinOp::BitXor,
            TokenKind::AmpCaret => BinOp::AndNot,
            TokenKind::LtLt => BinOp::Shl,
            TokenKind::GtGt => BinOp::Shr,
            TokenKind::EqEq => BinOp::Eq,
            TokenKind::BangEq => BinOp::Ne,
            TokenKind::Lt => BinOp::Lt,
            TokenKind::Gt => BinOp::Gt,
            TokenKind::LtEq => BinOp::Le,
            TokenKind::GtEq => BinOp::Ge,
            TokenKind::AmpAmp => BinOp::And,
            TokenKind::PipePipe => BinOp::Or,
            found => {
                return Err(ParseError::expected(
                    "binary expression",
                    "binary operator",
                    found,
                    self.current().span,
                ))
            }
        };
        self.advance();
        Ok(op)
    }
}

fn compound_op(kind: &TokenKind) -> Option<BinOp> {
    Some(match kind {
        TokenKind::PlusEq => BinOp::Add,
        TokenKind::MinusEq => BinOp::Sub,
        TokenKind::StarEq => BinOp::Mul,
        TokenKind::SlashEq => BinOp::Div,
        TokenKind::PercentEq => BinOp::Rem,
        TokenKind::AmpEq => BinOp::BitAnd,
        TokenKind::PipeEq => BinOp::BitOr,
        TokenKind::CaretEq => BinOp::BitXor,
        TokenKind::AmpCaretEq => BinOp::AndNot,
        TokenKind::LtLtEq => BinOp::Shl,
        TokenKind::GtGtEq => BinOp::Shr,
        _ => return None,
    })
}

fn is_type_name(x: &Expr) -> bool {
    match &x.kind {
        ExprKind::Ident(_) => true,
        ExprKind::Selector { object, .. } => matches!(object.kind, ExprKind::Ident(_)),
        _ => false,
    }
}

fn is_literal_type(x: &Expr) -> bool {
    is_type_name(x) || matches!(x.kind, ExprKind::ArrayType { .. } | ExprKind::StructType(_))
}

/// Split a switch header into a type switch `(binding, subject)`, or hand the
/// statement back for an expression switch.
fn type_switch_parts(tag: Option<Stmt>) -> Result<(Option<Name>, Expr), Option<Stmt>> {
    let Some(stmt) = tag else { return Err(None) };
    match stmt.kind {
        StmtKind::Expr(Expr { kind: ExprKind::TypeAssert { object, ty: None }, .. }) => Ok((None, *object)),
        StmtKind::Assign { mut lhs, op: AssignOp::Define, mut rhs } if lhs.len() == 1 && rhs.len() == 1 => {
            match (lhs.remove(0), rhs.remove(0)) {
                (
                    Expr { id, kind: ExprKind::Ident(name), span },
                    Expr { kind: ExprKind::TypeAssert { object, ty: None }, .. },
                ) => Ok((Some(Name { id, name, span }), *object)),
                (target, value) => {
                    let kind = StmtKind::Assign { lhs: vec![target], op: AssignOp::Define, rhs: vec![value] };
                    Err(Some(Stmt { kind, ..stmt }))
                }
            }
        }
        kind => Err(Some(Stmt { kind, ..stmt })),
    }
}

/// Strip the quotes of an import path literal.
fn unquote(raw: &str) -> String {
    let inner = raw.get(1..raw.len().saturating_sub(1)).unwrap_or("");
    inner.to_string()
}

/// Category of a parser error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Unexpected token against a grammar rule.
    Syntax,
    /// Identifier unbound after package-wide resolution.
    Unresolved,
    /// Valid source form outside the supported subset.
    Unsupported,
}

/// A parser error with location and friendly message.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub span: Span,
    /// Grammar rule that detected the error.
    pub rule: &'static str,
    pub message: String,
    pub hint: Option<String>,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (in {})", self.message, self.rule)
    }
}

impl std::error::Error for ParseError {}

impl ParseError {
    fn expected(rule: &'static str, expected: &str, found: &TokenKind, span: Span) -> Self {
        let message = format_expected_message(expected, found);
        let hint = crate::hints::for_expected(expected, found).map(String::from);
        Self { kind: ParseErrorKind::Syntax, span, rule, message, hint }
    }

    fn syntax(rule: &'static str, message: impl Into<String>, span: Span) -> Self {
        Self { kind: ParseErrorKind::Syntax, span, rule, message: message.into(), hint: None }
    }

    fn unsupported(rule: &'static str, construct: &str, span: Span) -> Self {
        Self {
            kind: ParseErrorKind::Unsupported,
            span,
            rule,
            message: format!("{} are not supported", construct),
            hint: crate::hints::for_unsupported(construct).map(String::from),
        }
    }

    pub(crate) fn unresolved(name: &str, span: Span) -> Self {
        Self {
            kind: ParseErrorKind::Unresolved,
            span,
            rule: "package resolution",
            message: format!("undefined: {}", name),
            hint: None,
        }
    }

    pub(crate) fn redeclared(name: &str, span: Span) -> Self {
        Self {
            kind: ParseErrorKind::Syntax,
            span,
            rule: "package resolution",
            message: format!("{} redeclared in this package", name),
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Format a user-friendly "expected X, found Y" message.
fn format_expected_message(expected: &str, found: &TokenKind) -> String {
    match expected {
        "';' or newline" => format!("Expected ';' or newline, found {}", found.display_name()),
        "'{'" => format!("Expected '{{' to start block, found {}", found.display_name()),
        "'}'" => format!("Expected '}}' to close block, found {}", found.display_name()),
        "')'" if matches!(found, TokenKind::Eof) => "Unclosed '(' - missing ')'".to_string(),
        "']'" if matches!(found, TokenKind::Eof) => "Unclosed '[' - missing ']'".to_string(),
        "a name" => format!("Expected name, found {}", found.display_name()),
        _ => format!("Expected {}, found {}", expected, found.display_name()),
    }
}
