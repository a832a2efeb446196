// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Registry of dynamic types stored in interface values.
//!
//! A boxed value carries a tag identifying its static type. Tags are handed
//! out per distinct serialized type name, starting at 1; tag 0 marks the nil
//! interface. Each registered type gets a descriptor symbol:
//!
//! ```text
//! dtype.N:
//!     .quad N             # tag
//!     .quad dtype.N.name  # name bytes
//!     .quad LEN           # name length
//! ```

use std::collections::HashMap;

use crate::emit::{ascii_literal, Emitter};

#[derive(Debug, Default)]
pub struct DtypeRegistry {
    ids: HashMap<String, u32>,
    names: Vec<String>,
}

impl DtypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag of a serialized type, registering it on first use.
    pub fn tag(&mut self, name: &str) -> u32 {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        self.names.push(name.to_string());
        let id = self.names.len() as u32;
        self.ids.insert(name.to_string(), id);
        log::debug!("dtype {} = {}", id, name);
        id
    }

    pub fn get(&self, name: &str) -> Option<u32> {
        self.ids.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Registered names in tag order.
    pub fn names(&self) -> impl Iterator<Item = (u32, &str)> {
        self.names.iter().enumerate().map(|(i, n)| (i as u32 + 1, n.as_str()))
    }

    pub(crate) fn emit_table(&self, out: &mut Emitter) {
        out.raw("\t.data");
        for (id, name) in self.names() {
            out.raw(&format!("\t.global dtype.{}", id));
            out.label(&format!("dtype.{}", id));
            out.raw(&format!("\t.quad {}", id));
            out.raw(&format!("\t.quad dtype.{}.name", id));
            out.raw(&format!("\t.quad {}", name.len()));
            out.label(&format!("dtype.{}.name", id));
            out.raw(&format!("\t.ascii {}", ascii_literal(name.as_bytes())));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_stable_per_name() {
        let mut registry = DtypeRegistry::new();
        let int = registry.tag("int");
        let ptr = registry.tag("*main.T");
        assert_eq!((int, ptr), (1, 2));
        assert_eq!(registry.tag("int"), 1);
        assert_eq!(registry.get("*main.T"), Some(2));
        assert_eq!(registry.get("string"), None);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn table_lists_every_tag() {
        let mut registry = DtypeRegistry::new();
        registry.tag("[]uint8");
        let mut out = Emitter::new();
        registry.emit_table(&mut out);
        let text = out.finish();
        assert!(text.contains("dtype.1:\n\t.quad 1\n\t.quad dtype.1.name\n\t.quad 7\n"));
        assert!(text.contains("\t.ascii \"[]uint8\""));
    }
}
