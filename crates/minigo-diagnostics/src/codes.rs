// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Error code registry.
//!
//! One code per compiler stage. The code names the stage that rejected the
//! program; the message says what it rejected.

use std::collections::HashMap;

pub const LEXICAL: &str = "E0001";
pub const SYNTAX: &str = "E0100";
pub const SCOPE: &str = "E0200";
pub const TYPE: &str = "E0300";
pub const UNSUPPORTED: &str = "E0400";
pub const CODEGEN: &str = "E0500";

/// Registry of all known error codes.
pub struct ErrorCodeRegistry {
    codes: HashMap<&'static str, ErrorCodeInfo>,
}

pub struct ErrorCodeInfo {
    pub code: &'static str,
    pub title: &'static str,
    pub category: ErrorCategory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Syntax,
    Resolution,
    Type,
    Unsupported,
    Internal,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Syntax => write!(f, "Syntax"),
            ErrorCategory::Resolution => write!(f, "Resolution"),
            ErrorCategory::Type => write!(f, "Type"),
            ErrorCategory::Unsupported => write!(f, "Unsupported"),
            ErrorCategory::Internal => write!(f, "Internal"),
        }
    }
}

macro_rules! register_codes {
    ($($code:expr => ($title:literal, $cat:expr)),* $(,)?) => {{
        let mut map = HashMap::new();
        $(
            map.insert($code, ErrorCodeInfo {
                code: $code,
                title: $title,
                category: $cat,
            });
        )*
        map
    }};
}

impl Default for ErrorCodeRegistry {
    fn default() -> Self {
        use ErrorCategory::*;

        Self {
            codes: register_codes! {
                LEXICAL => ("invalid token", Syntax),
                SYNTAX => ("syntax error", Syntax),
                SCOPE => ("undefined identifier", Resolution),
                TYPE => ("type error", Type),
                UNSUPPORTED => ("unsupported construct", Unsupported),
                CODEGEN => ("code generation failed", Internal),
            },
        }
    }
}

impl ErrorCodeRegistry {
    pub fn get(&self, code: &str) -> Option<&ErrorCodeInfo> {
        self.codes.get(code)
    }

    pub fn all(&self) -> impl Iterator<Item = &ErrorCodeInfo> {
        self.codes.values()
    }
}
