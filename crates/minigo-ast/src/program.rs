// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Front-end state shared by every stage of one compiler run.

use std::collections::HashMap;

use crate::expr::Field;
use crate::object::{BasicType, Builtin, ObjDecl, ObjId, ObjKind, Object};
use crate::scope::{Scope, ScopeKind};
use crate::span::{FileId, LineMap};
use crate::ty::StructLayout;
use crate::{NodeId, Span};

/// A source file registered with the run.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub text: String,
    pub line_map: LineMap,
}

/// Object ids of the predeclared basic types.
#[derive(Debug, Clone, Copy)]
pub struct BasicTypes {
    pub int: ObjId,
    pub uint8: ObjId,
    pub uint16: ObjId,
    pub uintptr: ObjId,
    pub bool: ObjId,
    pub string: ObjId,
}

/// Objects, identifier resolutions, struct specs and exported names for one run.
///
/// Node ids and object ids are unique across every package compiled in the run.
#[derive(Debug)]
pub struct Program {
    objects: Vec<Object>,
    /// Identifier node (use or definition) → object.
    pub resolutions: HashMap<NodeId, ObjId>,
    /// `struct{...}` expression → its field list, recorded by the parser.
    pub struct_specs: HashMap<NodeId, Vec<Field>>,
    /// Struct layouts, filled in by the type system.
    pub layouts: HashMap<NodeId, StructLayout>,
    /// Qualified identifier `pkg.Name` → object, for packages already analysed.
    pub exports: HashMap<String, ObjId>,
    pub universe: Scope,
    pub basic: BasicTypes,
    sources: Vec<SourceFile>,
    next_node_id: u32,
}

impl Program {
    pub fn new() -> Self {
        let mut program = Program {
            objects: Vec::new(),
            resolutions: HashMap::new(),
            struct_specs: HashMap::new(),
            layouts: HashMap::new(),
            exports: HashMap::new(),
            universe: Scope::new(ScopeKind::Universe),
            basic: BasicTypes {
                int: ObjId(0),
                uint8: ObjId(0),
                uint16: ObjId(0),
                uintptr: ObjId(0),
                bool: ObjId(0),
                string: ObjId(0),
            },
            sources: Vec::new(),
            next_node_id: 0,
        };
        program.basic = BasicTypes {
            int: program.predeclare("int", ObjKind::Type, ObjDecl::Basic(BasicType::Int)),
            uint8: program.predeclare("uint8", ObjKind::Type, ObjDecl::Basic(BasicType::Uint8)),
            uint16: program.predeclare("uint16", ObjKind::Type, ObjDecl::Basic(BasicType::Uint16)),
            uintptr: program.predeclare("uintptr", ObjKind::Type, ObjDecl::Basic(BasicType::Uintptr)),
            bool: program.predeclare("bool", ObjKind::Type, ObjDecl::Basic(BasicType::Bool)),
            string: program.predeclare("string", ObjKind::Type, ObjDecl::Basic(BasicType::String)),
        };
        let byte = program.basic.uint8;
        program.universe.insert("byte", byte);

        program.predeclare("true", ObjKind::Const, ObjDecl::Bool(true));
        program.predeclare("false", ObjKind::Const, ObjDecl::Bool(false));
        program.predeclare("iota", ObjKind::Const, ObjDecl::Iota);
        program.predeclare("nil", ObjKind::Var, ObjDecl::Nil);

        for builtin in [
            Builtin::Len,
            Builtin::Cap,
            Builtin::New,
            Builtin::Make,
            Builtin::Append,
            Builtin::Panic,
            Builtin::Print,
        ] {
            program.predeclare(builtin.name(), ObjKind::Func, ObjDecl::Builtin(builtin));
        }
        program
    }

    fn predeclare(&mut self, name: &str, kind: ObjKind, decl: ObjDecl) -> ObjId {
        let id = self.add_object(Object {
            kind,
            name: name.to_string(),
            pkg: None,
            decl,
            span: Span::default(),
            var: None,
            qualifier: None,
        });
        self.universe.insert(name, id);
        id
    }

    // =========================================================================
    // Objects
    // =========================================================================

    pub fn add_object(&mut self, object: Object) -> ObjId {
        let id = ObjId(self.objects.len() as u32);
        self.objects.push(object);
        id
    }

    pub fn object(&self, id: ObjId) -> &Object {
        &self.objects[id.0 as usize]
    }

    pub fn object_mut(&mut self, id: ObjId) -> &mut Object {
        &mut self.objects[id.0 as usize]
    }

    /// Object an identifier node resolved to, if any.
    pub fn resolution(&self, node: NodeId) -> Option<ObjId> {
        self.resolutions.get(&node).copied()
    }

    pub fn resolve(&mut self, node: NodeId, obj: ObjId) {
        self.resolutions.insert(node, obj);
    }

    /// Builtin function an identifier resolved to, if any.
    pub fn builtin(&self, node: NodeId) -> Option<Builtin> {
        match self.resolution(node).map(|id| &self.object(id).decl) {
            Some(ObjDecl::Builtin(b)) => Some(*b),
            _ => None,
        }
    }

    /// Look up an exported `pkg.Name`.
    pub fn exported(&self, pkg: &str, name: &str) -> Option<ObjId> {
        self.exports.get(&format!("{}.{}", pkg, name)).copied()
    }

    // =========================================================================
    // Node ids and sources
    // =========================================================================

    pub fn next_node_id(&mut self) -> NodeId {
        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;
        id
    }

    pub fn add_source(&mut self, name: impl Into<String>, text: impl Into<String>) -> FileId {
        let text = text.into();
        let id = FileId(self.sources.len() as u32);
        self.sources.push(SourceFile {
            name: name.into(),
            line_map: LineMap::new(&text),
            text,
        });
        id
    }

    pub fn source(&self, file: FileId) -> Option<&SourceFile> {
        self.sources.get(file.0 as usize)
    }
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}
