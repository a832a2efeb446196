// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Side tables produced by semantic analysis.
//!
//! Every table is keyed by `NodeId` or `ObjId`, both unique across a run, so
//! one [`Analysis`] serves every package the run compiles.

use std::collections::{HashMap, HashSet};

use minigo_ast::object::Builtin;
use minigo_ast::{NodeId, ObjId, Type};
use minigo_types::ConstValue;

/// Round a size up to a whole number of 8-byte words.
pub fn word_align(size: u64) -> u64 {
    (size + 7) & !7
}

/// A parameter, receiver or result slot in a function's frame.
#[derive(Debug, Clone)]
pub struct Slot {
    /// Named slots carry their variable; anonymous and blank ones don't.
    pub obj: Option<ObjId>,
    /// Offset from the frame base (`%rbp`).
    pub offset: i64,
    pub ty: Type,
}

/// Frame layout and symbol of one function or method.
#[derive(Debug, Clone)]
pub struct Func {
    pub obj: ObjId,
    pub name: String,
    pub symbol: String,
    /// Receiver first, when present.
    pub params: Vec<Slot>,
    pub results: Vec<Slot>,
    pub param_size: u64,
    pub result_size: u64,
    pub local_size: u64,
    pub has_body: bool,
}

impl Func {
    pub fn result_types(&self) -> Vec<Type> {
        self.results.iter().map(|s| s.ty.clone()).collect()
    }

    /// Static type of a call: nothing, one value or a tuple.
    pub fn call_type(&self) -> Type {
        match self.results.as_slice() {
            [single] => single.ty.clone(),
            _ => Type::Tuple(self.result_types()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Method {
    pub name: String,
    /// Declared with a `*T` receiver.
    pub ptr_recv: bool,
    pub func: ObjId,
    pub symbol: String,
}

/// Methods by receiver base type.
#[derive(Debug, Default)]
pub struct MethodTable {
    by_type: HashMap<ObjId, Vec<Method>>,
}

impl MethodTable {
    /// Register a method. Returns `false` if the type already has one with this name.
    pub fn insert(&mut self, ty: ObjId, method: Method) -> bool {
        let methods = self.by_type.entry(ty).or_default();
        if methods.iter().any(|m| m.name == method.name) {
            return false;
        }
        methods.push(method);
        true
    }

    pub fn lookup(&self, ty: ObjId, name: &str) -> Option<&Method> {
        self.by_type.get(&ty)?.iter().find(|m| m.name == name)
    }

    pub fn methods(&self, ty: ObjId) -> &[Method] {
        self.by_type.get(&ty).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// What a call expression invokes.
#[derive(Debug, Clone, PartialEq)]
pub enum Callee {
    Builtin(Builtin),
    /// `T(x)`
    Conversion(Type),
    Func(ObjId),
    Method { func: ObjId, ptr_recv: bool },
}

/// Hidden locals of a `for range` loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeLocals {
    /// The collection, evaluated once before the first iteration.
    pub collection: i64,
    pub index: i64,
    pub len: i64,
}

/// A string constant placed in the data section.
#[derive(Debug, Clone)]
pub struct StringLit {
    pub label: String,
    pub bytes: Vec<u8>,
}

/// The analysed form of one package.
#[derive(Debug, Default)]
pub struct Package {
    pub name: String,
    /// Functions and methods with bodies, in declaration order.
    pub funcs: Vec<ObjId>,
    /// String constants referenced by the package, in first-use order.
    pub strings: Vec<StringLit>,
    /// Package-level `var` specs in initialization order, each identified by
    /// the node id of its first name.
    pub var_order: Vec<NodeId>,
}

/// Run-wide analysis results.
#[derive(Debug, Default)]
pub struct Analysis {
    pub methods: MethodTable,
    pub funcs: HashMap<ObjId, Func>,
    /// Static type of every value expression analysed.
    pub types: HashMap<NodeId, Type>,
    /// Value of every constant expression analysed.
    pub consts: HashMap<NodeId, ConstValue>,
    /// Data label of every string-valued constant expression.
    pub string_labels: HashMap<NodeId, String>,
    pub calls: HashMap<NodeId, Callee>,
    /// `break`/`continue` → enclosing loop or switch statement.
    pub branch_targets: HashMap<NodeId, NodeId>,
    pub range_locals: HashMap<NodeId, RangeLocals>,
    /// Expression switch → hidden local holding its tag.
    pub switch_tags: HashMap<NodeId, i64>,
    /// Type switch → hidden local holding the boxed subject.
    pub type_switch_subjects: HashMap<NodeId, i64>,
    /// Type switch case expression → asserted type; `None` for `nil`.
    pub case_types: HashMap<NodeId, Option<Type>>,
    /// Type assertions used in the two-result form.
    pub comma_ok: HashSet<NodeId>,
    next_string: u32,
}

impl Analysis {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn type_of(&self, node: NodeId) -> Option<&Type> {
        self.types.get(&node)
    }

    pub fn func(&self, obj: ObjId) -> Option<&Func> {
        self.funcs.get(&obj)
    }

    /// Allocate a run-wide unique data label for a string constant.
    pub(crate) fn string_label(&mut self) -> String {
        let label = format!(".S{}", self.next_string);
        self.next_string += 1;
        label
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_alignment() {
        assert_eq!(word_align(0), 0);
        assert_eq!(word_align(1), 8);
        assert_eq!(word_align(8), 8);
        assert_eq!(word_align(41), 48);
    }

    #[test]
    fn duplicate_methods_are_refused() {
        let mut table = MethodTable::default();
        let method = |name: &str| Method {
            name: name.to_string(),
            ptr_recv: false,
            func: ObjId(9),
            symbol: format!("p.T.{}", name),
        };
        assert!(table.insert(ObjId(1), method("M")));
        assert!(!table.insert(ObjId(1), method("M")));
        assert!(table.insert(ObjId(2), method("M")));
        assert_eq!(table.methods(ObjId(1)).len(), 1);
        assert!(table.lookup(ObjId(1), "N").is_none());
    }
}
