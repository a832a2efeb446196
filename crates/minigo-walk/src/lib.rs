// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Semantic analysis for minigo.
//!
//! Checks a resolved package and computes everything the code generator
//! needs: the static type of every expression, constant values, frame
//! layouts, storage of every variable, method tables, call targets and the
//! hidden locals some statements use.

mod analysis;
mod decl;
mod error;
mod expr;
mod stmt;
mod walker;

pub use analysis::{word_align, Analysis, Callee, Func, Method, MethodTable, Package, RangeLocals, Slot, StringLit};
pub use decl::FRAME_BASE;
pub use error::{WalkError, WalkErrorKind, WalkResult};

use minigo_ast::decl::{DeclKind, File};
use minigo_ast::Program;

use walker::Walker;

/// Analyse one package whose files have been parsed and merged.
///
/// Packages must be analysed in dependency order: qualified references are
/// looked up in `program.exports`, which this fills in for `name`.
pub fn analyze_package(
    program: &mut Program,
    analysis: &mut Analysis,
    files: &[File],
    name: &str,
) -> WalkResult<Package> {
    let mut walker = Walker::new(program, analysis, files, name);
    walker.declare_package()?;

    for file in files {
        for decl in &file.decls {
            if let DeclKind::Func(func) = &decl.kind {
                walker.walk_func(func)?;
            }
        }
    }

    log::debug!(
        "analysed package {}: {} functions, {} strings",
        name,
        walker.package.funcs.len(),
        walker.package.strings.len()
    );
    Ok(walker.package)
}

#[cfg(test)]
mod tests {
    use super::*;
    use minigo_ast::decl::FuncDecl;
    use minigo_ast::stmt::{Stmt, StmtKind};
    use minigo_ast::{ObjId, Storage, Type};
    use minigo_lexer::Lexer;
    use minigo_parser::{merge_package, Parser};
    use minigo_types::ConstValue;

    fn load(program: &mut Program, name: &str, src: &str) -> Vec<File> {
        let file = program.add_source(format!("{}.go", name), src);
        let tokens = Lexer::new(src, file).tokenize().expect("lex errors");
        let parsed = Parser::new(program, tokens, file).parse_file().expect("parse errors");
        let mut files = vec![parsed];
        merge_package(program, &mut files).expect("resolve errors");
        files.into_iter().map(|p| p.file).collect()
    }

    fn analyze(src: &str) -> (Program, Analysis, Package, Vec<File>) {
        let mut program = Program::new();
        let mut analysis = Analysis::new();
        let files = load(&mut program, "main", src);
        let package = analyze_package(&mut program, &mut analysis, &files, "main")
            .unwrap_or_else(|e| panic!("analysis error: {}", e));
        (program, analysis, package, files)
    }

    fn analyze_err(src: &str) -> WalkError {
        let mut program = Program::new();
        let mut analysis = Analysis::new();
        let files = load(&mut program, "main", src);
        analyze_package(&mut program, &mut analysis, &files, "main").expect_err("expected an analysis error")
    }

    fn obj(program: &Program, name: &str) -> ObjId {
        program.exported("main", name).unwrap_or_else(|| panic!("main.{} not exported", name))
    }

    fn func_decl<'a>(files: &'a [File], name: &str) -> &'a FuncDecl {
        files
            .iter()
            .flat_map(|f| &f.decls)
            .find_map(|d| match &d.kind {
                DeclKind::Func(f) if f.name.name == name && f.recv.is_none() => Some(f),
                _ => None,
            })
            .unwrap_or_else(|| panic!("no func {}", name))
    }

    fn body<'a>(files: &'a [File], name: &str) -> &'a [Stmt] {
        &func_decl(files, name).body.as_ref().expect("body").stmts
    }

    // =========================================================================
    // Frames and storage
    // =========================================================================

    #[test]
    fn parameter_and_result_offsets() {
        let (program, analysis, _, _) = analyze(
            "package main\n\
             func f(a int, b uint8, s string) (int, bool) { return a + int(b), len(s) > 0 }\n",
        );
        let f = analysis.func(obj(&program, "f")).expect("func info");
        let offsets: Vec<i64> = f.params.iter().map(|s| s.offset).collect();
        assert_eq!(offsets, vec![16, 24, 32]);
        assert_eq!(f.param_size, 32);
        let offsets: Vec<i64> = f.results.iter().map(|s| s.offset).collect();
        assert_eq!(offsets, vec![48, 56]);
        assert_eq!(f.result_size, 16);
        assert_eq!(f.symbol, "main.f");

        let a = f.params[0].obj.expect("named param");
        assert_eq!(program.object(a).var.as_ref().map(|v| v.storage.clone()), Some(Storage::Local(16)));
    }

    #[test]
    fn locals_and_range_slots() {
        let (program, analysis, _, files) = analyze(
            "package main\n\
             func sum(xs []int) int {\n\
             \ttotal := 0\n\
             \tfor _, x := range xs {\n\
             \t\ttotal += x\n\
             \t}\n\
             \treturn total\n\
             }\n",
        );
        let f = analysis.func(obj(&program, "sum")).expect("func info");
        assert_eq!(f.local_size, 56);

        let stmts = body(&files, "sum");
        let locals = analysis.range_locals.get(&stmts[1].id).expect("range locals");
        assert_eq!(*locals, RangeLocals { collection: -32, index: -40, len: -48 });

        let StmtKind::Range { value: Some(x), .. } = &stmts[1].kind else { panic!("expected range") };
        let x = program.resolution(x.id).expect("x resolved");
        let var = program.object(x).var.as_ref().expect("x bound");
        assert_eq!(var.storage, Storage::Local(-56));
        assert_eq!(var.ty, Type::Named(program.basic.int));
    }

    #[test]
    fn local_types_serialize_apart_from_package_types() {
        let (program, _, _, files) = analyze(
            "package main\n\
             type T struct { a, b int }\n\
             func f() interface{} { type T int; return T(5) }\n\
             func g() interface{} { type T int; return T(6) }\n",
        );
        let local = |func: &str| {
            let StmtKind::Decl(decl) = &body(&files, func)[0].kind else { panic!("expected decl") };
            let DeclKind::Type(spec) = &decl.kind else { panic!("expected type decl") };
            program.resolution(spec.name.id).expect("local T resolved")
        };
        let (f_t, g_t) = (local("f"), local("g"));
        let key = |obj: ObjId| minigo_types::serialize(&program, &Type::Named(obj)).expect("serializable");

        assert_eq!(key(obj(&program, "T")), "main.T");
        assert_eq!(key(f_t), format!("main.f#{}.T", f_t.0));
        assert_ne!(key(f_t), key(g_t));
    }

    #[test]
    fn methods_get_symbols_and_receiver_flags() {
        let (program, analysis, package, _) = analyze(
            "package main\n\
             type T struct { n int }\n\
             func (t *T) Inc() { t.n++ }\n\
             func (t T) Get() int { return t.n }\n\
             func use() int { var t T; t.Inc(); return t.Get() }\n",
        );
        let t = obj(&program, "T");
        let inc = analysis.methods.lookup(t, "Inc").expect("Inc");
        let get = analysis.methods.lookup(t, "Get").expect("Get");
        assert_eq!(inc.symbol, "main.$T.Inc");
        assert_eq!(get.symbol, "main.T.Get");
        assert_eq!(package.funcs.len(), 3);

        let callees: Vec<&Callee> = analysis.calls.values().collect();
        assert!(callees.contains(&&Callee::Method { func: inc.func, ptr_recv: true }));
        assert!(callees.contains(&&Callee::Method { func: get.func, ptr_recv: false }));

        let get = analysis.func(get.func).expect("Get info");
        assert_eq!(get.params.len(), 1);
        assert_eq!(get.results[0].offset, 24);
    }

    #[test]
    fn all_top_level_names_are_exported() {
        let (program, _, _, _) = analyze(
            "package main\n\
             const limit = 3\n\
             type point struct { x int }\n\
             var origin point\n\
             func helper() {}\n",
        );
        for name in ["limit", "point", "origin", "helper"] {
            assert!(program.exported("main", name).is_some(), "{} not exported", name);
        }
        let origin = program.object(obj(&program, "origin")).var.clone().expect("global bound");
        assert_eq!(origin.storage, Storage::Global("main.origin".to_string()));
    }

    #[test]
    fn globals_infer_types_out_of_order() {
        let (program, _, package, _) = analyze(
            "package main\n\
             var a = b + 1\n\
             var b = len(c)\n\
             var c = \"hey\"\n",
        );
        let ty = |name| program.object(obj(&program, name)).var.as_ref().map(|v| v.ty.clone());
        assert_eq!(ty("a"), Some(Type::Named(program.basic.int)));
        assert_eq!(ty("b"), Some(Type::Named(program.basic.int)));
        assert_eq!(ty("c"), Some(Type::Named(program.basic.string)));
        assert_eq!(package.strings.len(), 1);
        assert_eq!(package.strings[0].bytes, b"hey".to_vec());

        let order: Vec<&str> = package
            .var_order
            .iter()
            .map(|id| program.object(program.resolution(*id).expect("name bound")).name.as_str())
            .collect();
        assert_eq!(order, vec!["c", "b", "a"]);
    }

    // =========================================================================
    // Constants
    // =========================================================================

    #[test]
    fn constant_expressions_fold_to_one_label() {
        let (_, analysis, package, _) = analyze(
            "package main\n\
             const greeting = \"hi\"\n\
             func f() string { return greeting + \"!\" }\n",
        );
        assert_eq!(package.strings.len(), 1);
        assert_eq!(package.strings[0].bytes, b"hi!".to_vec());
        assert_eq!(package.strings[0].label, ".S0");
        assert!(analysis.consts.values().any(|v| *v == ConstValue::Str(b"hi!".to_vec())));
    }

    #[test]
    fn untyped_constants_take_the_context_type() {
        let (program, analysis, _, files) = analyze(
            "package main\n\
             func f() uint8 {\n\
             \tvar x uint8 = 300\n\
             \treturn x + 1\n\
             }\n",
        );
        assert!(analysis.consts.values().any(|v| *v == ConstValue::Int(44)));
        let StmtKind::Return(values) = &body(&files, "f")[1].kind else { panic!("expected return") };
        assert_eq!(analysis.type_of(values[0].id), Some(&Type::Named(program.basic.uint8)));
    }

    // =========================================================================
    // Statements
    // =========================================================================

    #[test]
    fn type_switch_bindings_take_case_types() {
        let (program, analysis, _, files) = analyze(
            "package main\n\
             func kind(v interface{}) int {\n\
             \tswitch x := v.(type) {\n\
             \tcase int:\n\
             \t\treturn x\n\
             \tcase string:\n\
             \t\treturn len(x)\n\
             \tcase nil:\n\
             \t\treturn -1\n\
             \tdefault:\n\
             \t\t_ = x\n\
             \t\treturn 0\n\
             \t}\n\
             }\n",
        );
        let stmts = body(&files, "kind");
        assert_eq!(analysis.type_switch_subjects.get(&stmts[0].id), Some(&-16));
        assert_eq!(analysis.case_types.len(), 3);
        assert_eq!(analysis.case_types.values().filter(|t| t.is_none()).count(), 1);

        let StmtKind::TypeSwitch { clauses, .. } = &stmts[0].kind else { panic!("expected type switch") };
        let binding_ty = |i: usize| {
            let name = clauses[i].binding.as_ref().expect("binding");
            let obj = program.resolution(name.id).expect("binding object");
            program.object(obj).var.as_ref().map(|v| v.ty.clone())
        };
        assert_eq!(binding_ty(0), Some(Type::Named(program.basic.int)));
        assert_eq!(binding_ty(1), Some(Type::Named(program.basic.string)));
        assert_eq!(binding_ty(2), Some(Type::Interface));
        assert_eq!(binding_ty(3), Some(Type::Interface));
        assert_eq!(analysis.func(obj(&program, "kind")).map(|f| f.local_size), Some(72));
    }

    #[test]
    fn branches_find_their_targets() {
        let (_, analysis, _, files) = analyze(
            "package main\n\
             func f(n int) int {\n\
             \tfor i := 0; i < n; i++ {\n\
             \t\tswitch i {\n\
             \t\tcase 3:\n\
             \t\t\tbreak\n\
             \t\tcase 5:\n\
             \t\t\tcontinue\n\
             \t\t}\n\
             \t}\n\
             \treturn n\n\
             }\n",
        );
        let stmts = body(&files, "f");
        let StmtKind::For { body: loop_body, .. } = &stmts[0].kind else { panic!("expected for") };
        let switch = &loop_body.stmts[0];
        let StmtKind::Switch { clauses, .. } = &switch.kind else { panic!("expected switch") };
        assert_eq!(analysis.branch_targets.get(&clauses[0].body[0].id), Some(&switch.id));
        assert_eq!(analysis.branch_targets.get(&clauses[1].body[0].id), Some(&stmts[0].id));
        assert!(analysis.switch_tags.contains_key(&switch.id));
    }

    #[test]
    fn comma_ok_assertions_are_marked() {
        let (program, analysis, _, files) = analyze(
            "package main\n\
             func f(v interface{}) int {\n\
             \tn, ok := v.(int)\n\
             \tif ok {\n\
             \t\treturn n\n\
             \t}\n\
             \treturn 0\n\
             }\n",
        );
        assert_eq!(analysis.comma_ok.len(), 1);
        let StmtKind::Assign { lhs, .. } = &body(&files, "f")[0].kind else { panic!("expected define") };
        assert_eq!(analysis.type_of(lhs[1].id), Some(&Type::Named(program.basic.bool)));
    }

    // =========================================================================
    // Packages
    // =========================================================================

    #[test]
    fn qualified_calls_resolve_to_the_imported_function() {
        let mut program = Program::new();
        let mut analysis = Analysis::new();
        let lib = load(&mut program, "lib", "package lib\nvar Count int\nfunc Add1(x int) int { return x + 1 }\n");
        analyze_package(&mut program, &mut analysis, &lib, "lib").expect("lib analyses");

        let main = load(
            &mut program,
            "main",
            "package main\nimport \"lib\"\nfunc main() int { lib.Count = 2; return lib.Add1(lib.Count) }\n",
        );
        analyze_package(&mut program, &mut analysis, &main, "main").expect("main analyses");

        let add1 = program.exported("lib", "Add1").expect("lib.Add1");
        assert!(analysis.calls.values().any(|c| *c == Callee::Func(add1)));
        assert_eq!(analysis.func(add1).map(|f| f.symbol.as_str()), Some("lib.Add1"));
    }

    // =========================================================================
    // Errors
    // =========================================================================

    #[test]
    fn break_outside_loop() {
        let err = analyze_err("package main\nfunc f() { break }\n");
        assert!(matches!(err.kind, WalkErrorKind::BranchOutside { or_switch: true, .. }));
        let err = analyze_err("package main\nfunc f(n int) { switch n { case 1: continue } }\n");
        assert!(matches!(err.kind, WalkErrorKind::BranchOutside { or_switch: false, .. }));
    }

    #[test]
    fn type_mismatches() {
        let err = analyze_err("package main\nfunc f() int { return \"s\" }\n");
        assert!(matches!(err.kind, WalkErrorKind::Mismatch { .. }));
        let err = analyze_err("package main\nfunc f(a int, s string) bool { return a == s }\n");
        assert!(matches!(err.kind, WalkErrorKind::MismatchedTypes { .. }));
        let err = analyze_err("package main\nfunc f() { x := nil; _ = x }\n");
        assert!(matches!(err.kind, WalkErrorKind::UntypedNil));
    }

    #[test]
    fn constant_indexes_are_bounds_checked() {
        let err = analyze_err("package main\nfunc f() int { var x [3]int; return x[5] }\n");
        assert!(matches!(err.kind, WalkErrorKind::IndexOutOfRange { index: 5, len: 3 }), "{:?}", err);
        let err = analyze_err("package main\nfunc f(p *[3]int) { p[3] = 1 }\n");
        assert!(matches!(err.kind, WalkErrorKind::IndexOutOfRange { index: 3, len: 3 }), "{:?}", err);
        let err = analyze_err("package main\nfunc f(s []int) int { return s[-1] }\n");
        assert!(matches!(err.kind, WalkErrorKind::NegativeIndex { index: -1 }), "{:?}", err);

        analyze("package main\nfunc f(s []int, i int) int { var x [3]int; return x[2] + s[7] + x[i] }\n");
    }

    #[test]
    fn counts_are_checked() {
        let err = analyze_err(
            "package main\nfunc g() (int, int) { return 1, 2 }\nfunc f() int { return g() }\n",
        );
        assert!(matches!(err.kind, WalkErrorKind::Mismatch { .. } | WalkErrorKind::Unsupported { .. }));
        let err = analyze_err("package main\nfunc g(a int) int { return a }\nfunc f() int { return g(1, 2) }\n");
        assert!(matches!(err.kind, WalkErrorKind::ArgumentCount { expected: 1, found: 2, .. }));
        let err = analyze_err("package main\nfunc f() (int, bool) { return 1 }\n");
        assert!(matches!(err.kind, WalkErrorKind::ReturnCount { expected: 2, found: 1 }));
    }

    #[test]
    fn unsupported_constructs_are_reported() {
        let err = analyze_err("package main\nfunc f() { 1 + 2 }\n");
        assert!(err.is_unsupported());
        let err = analyze_err("package main\nfunc g() {}\nfunc f() { h := g; _ = h }\n");
        assert!(err.is_unsupported());
        let err = analyze_err("package main\nfunc f(a, b string) bool { return a < b }\n");
        assert!(err.is_unsupported());
        let err = analyze_err("package main\ntype P struct { x int }\nfunc f() (P, int) { var p P; return p, 1 }\n");
        assert!(err.is_unsupported());
    }

    #[test]
    fn method_errors() {
        let err = analyze_err("package main\ntype T int\nfunc (T) M() {}\nfunc (t *T) M() {}\n");
        assert!(matches!(err.kind, WalkErrorKind::DuplicateMethod { .. }));
        let err = analyze_err("package main\ntype P *int\nfunc (p P) M() {}\n");
        assert!(matches!(err.kind, WalkErrorKind::InvalidReceiver { .. }));
        let err = analyze_err(
            "package main\ntype T int\nfunc (t *T) M() {}\nfunc get() T { return 1 }\nfunc f() { get().M() }\n",
        );
        assert!(matches!(err.kind, WalkErrorKind::NotAddressable { .. }));
    }

    #[test]
    fn initialization_cycles() {
        let err = analyze_err("package main\nvar a = b\nvar b = a\n");
        assert!(matches!(err.kind, WalkErrorKind::InitCycle { .. }));
    }
}
