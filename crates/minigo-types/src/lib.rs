// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Type system for minigo.
//!
//! Turns type expressions into semantic [`Type`](minigo_ast::Type)s and
//! answers the questions later stages ask of them: kind, size, struct
//! layout, element type, identity and the canonical serialized name used by
//! the dynamic-type registry.

mod consts;
mod error;
mod kind;
mod literal;
mod types;

pub use consts::{eval_const, truncate, ConstValue};
pub use error::{TypeError, TypeErrorKind};
pub use kind::Kind;
pub use literal::{decode_char, decode_int, decode_string};
pub use types::{
    basic, compute_layouts, display, elem_type, field, from_expr, identical, imported_package, kind, serialize,
    size_of, struct_layout, underlying, MAX_SIZE,
};

#[cfg(test)]
mod tests {
    use super::*;
    use minigo_ast::object::ObjDecl;
    use minigo_ast::scope::Scope;
    use minigo_ast::{ObjKind, Program, Type};
    use minigo_lexer::Lexer;
    use minigo_parser::{merge_package, Parser};

    fn load(src: &str) -> (Program, Scope) {
        let mut program = Program::new();
        let file = program.add_source("types.go", src);
        let tokens = Lexer::new(src, file).tokenize().expect("lex errors");
        let parsed = Parser::new(&mut program, tokens, file).parse_file().expect("parse errors");
        let scope = merge_package(&mut program, &mut [parsed]).expect("resolve errors");
        (program, scope)
    }

    fn named(program: &Program, scope: &Scope, name: &str) -> Type {
        let obj = scope.lookup(name).unwrap_or_else(|| panic!("no {}", name));
        assert_eq!(program.object(obj).kind, ObjKind::Type);
        Type::Named(obj)
    }

    fn declared(program: &Program, scope: &Scope, name: &str) -> Type {
        let obj = scope.lookup(name).unwrap_or_else(|| panic!("no {}", name));
        match &program.object(obj).decl {
            ObjDecl::TypeName { ty } => from_expr(program, ty).expect("type expression"),
            other => panic!("{} is {:?}", name, other),
        }
    }

    #[test]
    fn sizes_by_kind() {
        let (program, scope) = load(
            "package p\n\
             type I int\n\
             type B uint8\n\
             type H uint16\n\
             type U uintptr\n\
             type T bool\n\
             type S string\n\
             type L []int\n\
             type P *int\n\
             type E interface{}\n\
             type A [3]uint16\n",
        );
        let expect = [
            ("I", 8),
            ("B", 1),
            ("H", 2),
            ("U", 8),
            ("T", 8),
            ("S", 16),
            ("L", 24),
            ("P", 8),
            ("E", 16),
            ("A", 6),
        ];
        for (name, size) in expect {
            assert_eq!(size_of(&program, &named(&program, &scope, name)).unwrap(), size, "size of {}", name);
        }
    }

    #[test]
    fn struct_fields_are_packed_in_order() {
        let (mut program, scope) = load("package p\ntype T struct { a uint8; b int; c, d string }\n");
        compute_layouts(&mut program).unwrap();
        let t = named(&program, &scope, "T");
        let layout = struct_layout(&program, &t).unwrap();
        let offsets: Vec<_> = layout.fields.iter().map(|f| (f.name.as_str(), f.offset)).collect();
        assert_eq!(offsets, vec![("a", 0), ("b", 1), ("c", 9), ("d", 25)]);
        assert_eq!(layout.size, 41);
        assert_eq!(field(&program, &t, "c").unwrap().size, 16);
        assert!(field(&program, &t, "e").is_err());
    }

    #[test]
    fn kinds_see_through_names() {
        let (program, scope) = load("package p\ntype A int\ntype B A\ntype C []B\n");
        assert_eq!(kind(&program, &named(&program, &scope, "B")).unwrap(), Kind::Int);
        let c = named(&program, &scope, "C");
        assert_eq!(kind(&program, &c).unwrap(), Kind::Slice);
        assert_eq!(elem_type(&program, &c).unwrap(), named(&program, &scope, "B"));
    }

    #[test]
    fn string_elements_are_bytes() {
        let program = Program::new();
        let string = Type::Named(program.basic.string);
        assert_eq!(elem_type(&program, &string).unwrap(), Type::Named(program.basic.uint8));
    }

    #[test]
    fn serialized_names() {
        let (program, scope) = load(
            "package p\n\
             type T int\n\
             type X *[]T\n\
             type Y [4]string\n\
             type Z struct { a int; b, c T }\n\
             type E interface{}\n",
        );
        assert_eq!(serialize(&program, &named(&program, &scope, "T")).unwrap(), "p.T");
        assert_eq!(serialize(&program, &declared(&program, &scope, "X")).unwrap(), "*[]p.T");
        assert_eq!(serialize(&program, &declared(&program, &scope, "Y")).unwrap(), "[4]string");
        assert_eq!(
            serialize(&program, &declared(&program, &scope, "Z")).unwrap(),
            "struct{a int; b p.T; c p.T}"
        );
        assert_eq!(serialize(&program, &declared(&program, &scope, "E")).unwrap(), "interface{}");
        assert_eq!(serialize(&program, &Type::Named(program.basic.uint8)).unwrap(), "uint8");
    }

    #[test]
    fn identical_structural_types() {
        let (program, scope) = load(
            "package p\n\
             type T int\n\
             type A []T\n\
             type B []T\n\
             type S1 struct { x int }\n\
             type S2 struct { x int }\n",
        );
        let a = declared(&program, &scope, "A");
        let b = declared(&program, &scope, "B");
        assert!(identical(&program, &a, &b));
        assert!(!identical(&program, &named(&program, &scope, "A"), &named(&program, &scope, "B")));
        assert!(identical(&program, &declared(&program, &scope, "S1"), &declared(&program, &scope, "S2")));
    }

    #[test]
    fn recursion_through_pointer_is_sized() {
        let (mut program, scope) = load("package p\ntype Node struct { next *Node; val int }\n");
        compute_layouts(&mut program).unwrap();
        assert_eq!(size_of(&program, &named(&program, &scope, "Node")).unwrap(), 16);
    }

    #[test]
    fn direct_recursion_is_an_error() {
        let (mut program, _) = load("package p\ntype Node struct { next Node }\n");
        let err = compute_layouts(&mut program).unwrap_err();
        assert!(matches!(err.kind, TypeErrorKind::RecursiveType { .. }), "{:?}", err);
    }

    #[test]
    fn array_length_from_constants() {
        let (program, scope) = load(
            "package p\n\
             const n = 2\n\
             const (\n\
                 a = iota * 4\n\
                 b\n\
             )\n\
             type A [n + b]int\n\
             type B [len(\"abc\")]uint8\n",
        );
        assert_eq!(size_of(&program, &named(&program, &scope, "A")).unwrap(), 6 * 8);
        assert_eq!(size_of(&program, &named(&program, &scope, "B")).unwrap(), 3);
    }

    #[test]
    fn oversized_types_are_rejected() {
        let (mut program, scope) = load(
            "package p\n\
             type Huge [1 << 62]int\n\
             type Big [1 << 27]int\n\
             type Pair struct { a, b Big }\n",
        );
        let err = size_of(&program, &named(&program, &scope, "Huge")).unwrap_err();
        assert!(matches!(err.kind, TypeErrorKind::TooLarge { .. }), "{:?}", err);
        assert_eq!(size_of(&program, &named(&program, &scope, "Big")).unwrap(), 1 << 30);
        let err = compute_layouts(&mut program).unwrap_err();
        assert!(matches!(err.kind, TypeErrorKind::TooLarge { .. }), "{:?}", err);
    }

    #[test]
    fn negative_array_length_is_rejected() {
        let (program, scope) = load("package p\ntype A [-1]int\n");
        let obj = scope.lookup("A").unwrap();
        let ObjDecl::TypeName { ty } = &program.object(obj).decl else { panic!() };
        let err = from_expr(&program, ty).unwrap_err();
        assert!(matches!(err.kind, TypeErrorKind::InvalidArrayLength { .. }));
    }

    #[test]
    fn constant_folding() {
        let (program, scope) = load(
            "package p\n\
             const a = 7 / 2\n\
             const b = uint8(300)\n\
             const c = \"ab\" + \"c\"\n\
             const d = a > 2 && !false\n\
             const e = 1 << 10 &^ 0x0f\n",
        );
        let value = |name: &str| {
            let obj = scope.lookup(name).unwrap();
            let ObjDecl::Const { value, iota, .. } = &program.object(obj).decl else { panic!() };
            eval_const(&program, value, *iota).unwrap().unwrap()
        };
        assert_eq!(value("a"), ConstValue::Int(3));
        assert_eq!(value("b"), ConstValue::Int(44));
        assert_eq!(value("c"), ConstValue::Str(b"abc".to_vec()));
        assert_eq!(value("d"), ConstValue::Bool(true));
        assert_eq!(value("e"), ConstValue::Int(1024));
    }

    #[test]
    fn constant_division_by_zero() {
        let (program, scope) = load("package p\nconst z = 0\nconst q = 1 / z\n");
        let obj = scope.lookup("q").unwrap();
        let ObjDecl::Const { value, .. } = &program.object(obj).decl else { panic!() };
        let err = eval_const(&program, value, 0).unwrap_err();
        assert!(matches!(err.kind, TypeErrorKind::DivisionByZero));
    }
}
