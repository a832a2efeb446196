// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Parser for minigo.
//!
//! Transforms a token stream into an abstract syntax tree, binding
//! identifiers to objects as it goes. Names not yet visible are deferred and
//! bound by [`merge_package`] once every file of the package is parsed.

mod hints;
mod package;
mod parser;

pub use package::merge_package;
pub use parser::{ParseError, ParseErrorKind, ParsedFile, Parser, Unresolved};

#[cfg(test)]
mod tests {
    use super::*;
    use minigo_ast::decl::{DeclKind, FuncDecl};
    use minigo_ast::expr::{Expr, ExprKind};
    use minigo_ast::object::ObjDecl;
    use minigo_ast::stmt::{AssignOp, StmtKind};
    use minigo_ast::{ObjId, Program};

    fn parse_into(program: &mut Program, src: &str) -> Result<ParsedFile, ParseError> {
        let file = program.add_source("test.go", src);
        let tokens = minigo_lexer::Lexer::new(src, file).tokenize().expect("lex errors");
        Parser::new(program, tokens, file).parse_file()
    }

    fn parse(src: &str) -> (Program, ParsedFile) {
        let mut program = Program::new();
        let parsed = parse_into(&mut program, src).unwrap_or_else(|e| panic!("parse error: {}", e));
        (program, parsed)
    }

    fn parse_err(src: &str) -> ParseError {
        let mut program = Program::new();
        parse_into(&mut program, src).expect_err("expected a parse error")
    }

    fn func<'a>(parsed: &'a ParsedFile, name: &str) -> &'a FuncDecl {
        parsed
            .file
            .decls
            .iter()
            .find_map(|d| match &d.kind {
                DeclKind::Func(f) if f.name.name == name => Some(f),
                _ => None,
            })
            .unwrap_or_else(|| panic!("no func {}", name))
    }

    fn res(program: &Program, expr: &Expr) -> Option<ObjId> {
        program.resolution(expr.id)
    }

    #[test]
    fn parameter_lists_split_names_and_types() {
        let (_, parsed) = parse(
            "package main\nfunc f(a, b int, s string) (int, bool) { return a, true }\n",
        );
        let f = func(&parsed, "f");
        let names: Vec<_> = f.sig.params.iter().map(|p| p.name.as_ref().unwrap().name.clone()).collect();
        assert_eq!(names, vec!["a", "b", "s"]);
        assert!(matches!(&f.sig.params[1].ty.kind, ExprKind::Ident(t) if t == "int"));
        assert_eq!(f.sig.results.len(), 2);
        assert!(f.sig.results.iter().all(|r| r.name.is_none()));
    }

    #[test]
    fn anonymous_parameters_are_types() {
        let (_, parsed) = parse("package main\nfunc g(int, []byte) int\n");
        let g = func(&parsed, "g");
        assert_eq!(g.sig.params.len(), 2);
        assert!(g.sig.params.iter().all(|p| p.name.is_none()));
        assert!(g.body.is_none());
    }

    #[test]
    fn mixed_parameters_are_rejected() {
        let err = parse_err("package main\nfunc f(a int, string) {}\n");
        assert_eq!(err.kind, ParseErrorKind::Syntax);
        assert!(err.message.contains("mixed named and unnamed"), "{}", err.message);
    }

    #[test]
    fn inner_shadowing_does_not_alter_outer_binding() {
        let (program, parsed) = parse(
            "package main
func f() int {
    x := 1
    {
        x := 2
        _ = x
    }
    return x
}
",
        );
        let body = &func(&parsed, "f").body.as_ref().unwrap().stmts;
        let StmtKind::Assign { lhs, .. } = &body[0].kind else { panic!("expected :=") };
        let outer = res(&program, &lhs[0]).unwrap();

        let StmtKind::Block(inner) = &body[1].kind else { panic!("expected block") };
        let StmtKind::Assign { lhs: inner_lhs, .. } = &inner.stmts[0].kind else { panic!("expected :=") };
        let shadow = res(&program, &inner_lhs[0]).unwrap();
        assert_ne!(outer, shadow);
        let StmtKind::Assign { rhs, .. } = &inner.stmts[1].kind else { panic!("expected =") };
        assert_eq!(res(&program, &rhs[0]), Some(shadow));

        let StmtKind::Return(values) = &body[2].kind else { panic!("expected return") };
        assert_eq!(res(&program, &values[0]), Some(outer));
    }

    #[test]
    fn define_reuses_names_from_same_scope() {
        let (program, parsed) = parse(
            "package main
func f() {
    a, b := 1, 2
    a, c := 3, 4
    _, _ = b, c
}
",
        );
        let body = &func(&parsed, "f").body.as_ref().unwrap().stmts;
        let StmtKind::Assign { lhs: first, .. } = &body[0].kind else { panic!() };
        let StmtKind::Assign { lhs: second, op, .. } = &body[1].kind else { panic!() };
        assert_eq!(*op, AssignOp::Define);
        assert_eq!(res(&program, &first[0]), res(&program, &second[0]));
        assert_ne!(res(&program, &first[1]), res(&program, &second[1]));
    }

    #[test]
    fn no_new_variables_is_an_error() {
        let err = parse_err("package main\nfunc f() {\n    a := 1\n    a := 2\n}\n");
        assert!(err.message.contains("no new variables"), "{}", err.message);
    }

    #[test]
    fn forward_reference_resolves_within_file() {
        let (program, parsed) = parse(
            "package main\nfunc a() int { return b() }\nfunc b() int { return 1 }\n",
        );
        assert!(parsed.unresolved.iter().all(|u| u.name != "b"));
        let StmtKind::Return(values) = &func(&parsed, "a").body.as_ref().unwrap().stmts[0].kind else {
            panic!()
        };
        let ExprKind::Call { func: callee, .. } = &values[0].kind else { panic!() };
        assert_eq!(res(&program, callee), program.resolution(func(&parsed, "b").name.id));
    }

    #[test]
    fn predeclared_names_wait_for_package_merge() {
        let mut program = Program::new();
        let parsed = parse_into(&mut program, "package main\nvar x int\n").unwrap();
        assert!(parsed.unresolved.iter().any(|u| u.name == "int"));
        let mut files = vec![parsed];
        merge_package(&mut program, &mut files).unwrap();
        let DeclKind::Var(spec) = &files[0].file.decls[0].kind else { panic!() };
        assert_eq!(program.resolution(spec.ty.as_ref().unwrap().id), Some(program.basic.int));
    }

    #[test]
    fn merge_resolves_across_files() {
        let mut program = Program::new();
        let a = parse_into(&mut program, "package lib\nfunc Use() int { return helper(limit) }\n").unwrap();
        let b = parse_into(&mut program, "package lib\nconst limit = 3\nfunc helper(n int) int { return n }\n")
            .unwrap();
        assert!(a.unresolved.iter().any(|u| u.name == "helper"));
        let mut files = vec![a, b];
        let scope = merge_package(&mut program, &mut files).unwrap();
        assert!(scope.lookup("helper").is_some());
        assert!(files.iter().all(|f| f.unresolved.is_empty()));
    }

    #[test]
    fn undefined_name_fails_merge() {
        let mut program = Program::new();
        let parsed = parse_into(&mut program, "package main\nfunc f() int { return nope }\n").unwrap();
        let err = merge_package(&mut program, &mut [parsed]).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::Unresolved);
        assert_eq!(err.message, "undefined: nope");
    }

    #[test]
    fn imports_stay_local_to_their_file() {
        let mut program = Program::new();
        let a = parse_into(&mut program, "package main\nimport \"os\"\nfunc f() int { return os.Code }\n").unwrap();
        let b = parse_into(&mut program, "package main\nfunc g() int { return os.Code }\n").unwrap();
        let err = merge_package(&mut program, &mut [a, b]).unwrap_err();
        assert_eq!(err.message, "undefined: os");
    }

    #[test]
    fn composite_literals_in_control_headers() {
        let (_, parsed) = parse(
            "package main
type T struct { a int }
func f(t T) bool {
    if t == (T{}) {
        return true
    }
    for _, v := range []int{1, 2} {
        _ = v
    }
    return false
}
",
        );
        let body = &func(&parsed, "f").body.as_ref().unwrap().stmts;
        assert!(matches!(body[0].kind, StmtKind::If { .. }));
        let StmtKind::Range { collection, define, .. } = &body[1].kind else { panic!("expected range") };
        assert!(*define);
        assert!(matches!(collection.kind, ExprKind::CompositeLit { .. }));
    }

    #[test]
    fn struct_literal_keys_are_not_resolved() {
        let (program, parsed) = parse(
            "package main\ntype P struct { x, y int }\nvar p = P{x: 1, y: 2}\n",
        );
        let DeclKind::Var(spec) = &parsed.file.decls[1].kind else { panic!() };
        let ExprKind::CompositeLit { elts, .. } = &spec.values[0].kind else { panic!() };
        let ExprKind::KeyValue { key, .. } = &elts[0].kind else { panic!() };
        assert_eq!(program.resolution(key.id), None);
        assert!(parsed.unresolved.iter().all(|u| u.name != "x"));
    }

    #[test]
    fn struct_specs_are_recorded() {
        let (program, parsed) = parse("package main\ntype P struct {\n    x, y int\n    name string\n}\n");
        let DeclKind::Type(spec) = &parsed.file.decls[0].kind else { panic!() };
        let fields = program.struct_specs.get(&spec.ty.id).expect("struct spec");
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].names.len(), 2);
    }

    #[test]
    fn grouped_consts_repeat_previous_expression() {
        let (program, parsed) = parse("package main\nconst (\n    A = iota\n    B\n    C\n)\n");
        assert_eq!(parsed.file.decls.len(), 3);
        let DeclKind::Const(spec) = &parsed.file.decls[2].kind else { panic!() };
        let obj = program.resolution(spec.names[0].id).unwrap();
        match &program.object(obj).decl {
            ObjDecl::Const { value, iota, .. } => {
                assert_eq!(*iota, 2);
                assert!(matches!(&value.kind, ExprKind::Ident(n) if n == "iota"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn type_switch_clauses_get_their_own_binding() {
        let (program, parsed) = parse(
            "package main
func f(x interface{}) int {
    switch v := x.(type) {
    case int:
        return v
    case string:
        return len(v)
    }
    return 0
}
",
        );
        let body = &func(&parsed, "f").body.as_ref().unwrap().stmts;
        let StmtKind::TypeSwitch { binding, clauses, .. } = &body[0].kind else { panic!("expected type switch") };
        assert_eq!(binding.as_ref().unwrap().name, "v");
        let first = program.resolution(clauses[0].binding.as_ref().unwrap().id).unwrap();
        let second = program.resolution(clauses[1].binding.as_ref().unwrap().id).unwrap();
        assert_ne!(first, second);

        let StmtKind::Return(values) = &clauses[0].body[0].kind else { panic!() };
        assert_eq!(res(&program, &values[0]), Some(first));
    }

    #[test]
    fn methods_are_not_in_scope() {
        let (program, parsed) = parse("package main\ntype T int\nfunc (t T) Get() int { return int(t) }\n");
        assert!(parsed.scope.lookup("Get").is_none());
        let get = func(&parsed, "Get");
        assert!(get.recv.is_some());
        assert!(program.resolution(get.name.id).is_some());
    }

    #[test]
    fn precedence_levels() {
        let (_, parsed) = parse("package main\nvar x = 1 + 2*3 == 7 || false && true\n");
        let DeclKind::Var(spec) = &parsed.file.decls[0].kind else { panic!() };
        let ExprKind::Binary { op, right, .. } = &spec.values[0].kind else { panic!() };
        assert_eq!(op.symbol(), "||");
        assert!(matches!(&right.kind, ExprKind::Binary { op, .. } if op.symbol() == "&&"));
    }

    #[test]
    fn unsupported_constructs_abort() {
        let err = parse_err("package main\nvar m map[string]int\n");
        assert_eq!(err.kind, ParseErrorKind::Unsupported);
        assert!(err.message.contains("map types"));

        let err = parse_err("package main\nfunc f() {\n    go f()\n}\n");
        assert_eq!(err.kind, ParseErrorKind::Unsupported);

        let err = parse_err("package main\ntype I interface { M() }\n");
        assert!(err.message.contains("interfaces with methods"));
    }

    #[test]
    fn syntax_error_names_rule_and_tokens() {
        let err = parse_err("package main\nfunc f() {\n    x := \n}\n");
        assert_eq!(err.kind, ParseErrorKind::Syntax);
        assert!(err.message.contains("Expected expression"), "{}", err.message);
        assert_eq!(err.rule, "operand");
    }
}
