// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Package-wide identifier resolution across the files of one package.

use minigo_ast::scope::{Scope, ScopeKind};
use minigo_ast::{ObjKind, Program};

use crate::parser::{ParseError, ParsedFile};

/// Merge the top-level declarations of all files into one package scope and
/// bind every identifier the files left unresolved.
///
/// Lookup order per identifier: the declaring file's scope (its imports),
/// the package scope, then the universe.
pub fn merge_package(program: &mut Program, files: &mut [ParsedFile]) -> Result<Scope, ParseError> {
    let mut package = Scope::new(ScopeKind::Package);
    for parsed in files.iter() {
        for (name, obj) in parsed.scope.iter() {
            let object = program.object(obj);
            // Imports are visible only in the file that names them.
            if object.kind == ObjKind::Package {
                continue;
            }
            if package.insert(name, obj).is_some() {
                return Err(ParseError::redeclared(name, object.span));
            }
        }
    }

    let mut deferred = 0;
    for parsed in files.iter_mut() {
        for u in parsed.unresolved.drain(..) {
            let obj = parsed
                .scope
                .lookup(&u.name)
                .or_else(|| package.lookup(&u.name))
                .or_else(|| program.universe.lookup(&u.name))
                .ok_or_else(|| ParseError::unresolved(&u.name, u.span))?;
            program.resolve(u.node, obj);
            deferred += 1;
        }
    }

    log::debug!(
        "merged package scope: {} top-level names, {} deferred identifiers bound",
        package.len(),
        deferred
    );
    Ok(package)
}
