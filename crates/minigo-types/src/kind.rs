// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Canonical classification of types.

use minigo_ast::object::BasicType;

/// The closed set of type kinds that layout and code generation dispatch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Int,
    Uint8,
    Uint16,
    Uintptr,
    Bool,
    String,
    Slice,
    Array,
    Struct,
    Pointer,
    Interface,
    /// The untyped `nil`.
    Nil,
}

impl Kind {
    pub fn is_integer(self) -> bool {
        matches!(self, Kind::Int | Kind::Uint8 | Kind::Uint16 | Kind::Uintptr)
    }

    pub fn is_unsigned(self) -> bool {
        matches!(self, Kind::Uint8 | Kind::Uint16 | Kind::Uintptr)
    }

    /// Kinds whose values live in one 8-byte word or less.
    pub fn is_scalar(self) -> bool {
        self.is_integer() || matches!(self, Kind::Bool | Kind::Pointer | Kind::Nil)
    }

    /// Size of every type of this kind, when it doesn't depend on the type.
    pub fn fixed_size(self) -> Option<u64> {
        match self {
            Kind::Int | Kind::Uintptr | Kind::Pointer | Kind::Bool | Kind::Nil => Some(8),
            Kind::Uint8 => Some(1),
            Kind::Uint16 => Some(2),
            Kind::String | Kind::Interface => Some(16),
            Kind::Slice => Some(24),
            Kind::Array | Kind::Struct => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Kind::Int => "int",
            Kind::Uint8 => "uint8",
            Kind::Uint16 => "uint16",
            Kind::Uintptr => "uintptr",
            Kind::Bool => "bool",
            Kind::String => "string",
            Kind::Slice => "slice",
            Kind::Array => "array",
            Kind::Struct => "struct",
            Kind::Pointer => "pointer",
            Kind::Interface => "interface",
            Kind::Nil => "nil",
        }
    }
}

impl From<BasicType> for Kind {
    fn from(basic: BasicType) -> Self {
        match basic {
            BasicType::Int => Kind::Int,
            BasicType::Uint8 => Kind::Uint8,
            BasicType::Uint16 => Kind::Uint16,
            BasicType::Uintptr => Kind::Uintptr,
            BasicType::Bool => Kind::Bool,
            BasicType::String => Kind::String,
        }
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
