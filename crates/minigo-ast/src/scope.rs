// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Lexical scopes used during parsing.

use std::collections::HashMap;

use crate::object::ObjId;

/// The kind of scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// Predeclared identifiers.
    Universe,
    /// Top-level declarations of a package, all files merged.
    Package,
    /// Top-level declarations and imports of one file.
    File,
    Function,
    Block,
}

/// One symbol table in the scope chain.
#[derive(Debug, Clone)]
pub struct Scope {
    pub kind: ScopeKind,
    bindings: HashMap<String, ObjId>,
}

impl Scope {
    pub fn new(kind: ScopeKind) -> Self {
        Self { kind, bindings: HashMap::new() }
    }

    pub fn lookup(&self, name: &str) -> Option<ObjId> {
        self.bindings.get(name).copied()
    }

    /// Bind `name`, returning the binding it replaced.
    pub fn insert(&mut self, name: impl Into<String>, obj: ObjId) -> Option<ObjId> {
        self.bindings.insert(name.into(), obj)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ObjId)> {
        self.bindings.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Chain of live scopes, innermost last. Scopes are discarded when popped.
#[derive(Debug, Default)]
pub struct ScopeStack {
    scopes: Vec<Scope>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self { scopes: Vec::new() }
    }

    pub fn push(&mut self, kind: ScopeKind) {
        self.scopes.push(Scope::new(kind));
    }

    pub fn pop(&mut self) -> Option<Scope> {
        self.scopes.pop()
    }

    /// Look up a name through the whole chain, innermost first.
    pub fn lookup(&self, name: &str) -> Option<ObjId> {
        self.scopes.iter().rev().find_map(|s| s.lookup(name))
    }

    /// Look up a name in the innermost scope only.
    pub fn lookup_local(&self, name: &str) -> Option<ObjId> {
        self.scopes.last().and_then(|s| s.lookup(name))
    }

    /// Define a name in the innermost scope. Shadowing outer scopes is allowed.
    pub fn define(&mut self, name: &str, obj: ObjId) {
        if name == "_" {
            return;
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name, obj);
        }
    }

    /// The outermost scope (the file scope while parsing a file).
    pub fn outermost(&self) -> Option<&Scope> {
        self.scopes.first()
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }
}
