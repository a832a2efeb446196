// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! End-to-end tests through the public `Compiler` API.
//! Each test compiles one or more packages and checks the emitted assembly
//! or the reported error.

use minigo_compiler::{CompileError, Compiler, CompilerConfig, PackageSource};

fn compile_main(src: &str) -> String {
    let mut compiler = Compiler::default();
    let package = PackageSource::new("main").with_file("main.go", src);
    compiler
        .compile_all(&[package])
        .unwrap_or_else(|e| panic!("{} error: {}", e.stage(), e))
}

fn compile_err(src: &str) -> (Compiler, CompileError) {
    let mut compiler = Compiler::default();
    let package = PackageSource::new("main").with_file("main.go", src);
    let err = compiler.compile_package(&package).expect_err("expected a compile error");
    (compiler, err)
}

fn assert_has(asm: &str, needle: &str) {
    assert!(asm.contains(needle), "missing `{}` in:\n{}", needle, asm);
}

// ── scenarios ───────────────────────────────────────────────────────────

#[test]
fn add1() {
    let asm = compile_main(
        "package main\n\
         var result int\n\
         func add1(x int) int { return x + 1 }\n\
         func main() { result = add1(41) }\n",
    );
    assert_has(&asm, "main.add1:\n");
    assert_has(&asm, "\tpushq $41\n");
    assert_has(&asm, "\tcallq main.add1\n");
    assert_has(&asm, "main.result:\n\t.zero 8\n");
    assert_has(&asm, "__initAllPackages:\n\tcallq main.__initVars\n\tret\n");
}

#[test]
fn string_concatenation_goes_through_the_runtime() {
    let asm = compile_main(
        "package main\n\
         func main() {\n\
         \ta := \"ab\"\n\
         \tb := \"cd\"\n\
         \ts := a + b\n\
         \tprint(s, len(s))\n\
         }\n",
    );
    assert_has(&asm, "\t.ascii \"ab\"\n");
    assert_has(&asm, "\t.ascii \"cd\"\n");
    assert_has(&asm, "\tcallq runtime.catstrings\n");
    assert_has(&asm, "\tcallq runtime.printstring\n");
    assert_has(&asm, "\tcallq runtime.printint\n");
}

#[test]
fn byte_slice_append() {
    let asm = compile_main(
        "package main\n\
         func main() {\n\
         \ts := []uint8{1, 2, 3, 4, 5, 6, 7, 8}\n\
         \ts = append(s, 9)\n\
         \tprint(len(s))\n\
         }\n",
    );
    assert_has(&asm, "\tcallq runtime.heapalloc\n");
    assert_has(&asm, "\tmovb %al, (%rdi)\n");
    assert_has(&asm, "\tcallq runtime.append1\n");
}

#[test]
fn type_switch_on_boxed_int() {
    let mut compiler = Compiler::default();
    let package = PackageSource::new("main").with_file(
        "main.go",
        "package main\n\
         func classify(v interface{}) int {\n\
         \tswitch x := v.(type) {\n\
         \tcase int:\n\
         \t\treturn x\n\
         \tcase string:\n\
         \t\treturn -len(x)\n\
         \tdefault:\n\
         \t\treturn 0\n\
         \t}\n\
         }\n\
         func main() { print(classify(5)) }\n",
    );
    let asm = compiler.compile_package(&package).expect("compiles");
    let trailer = compiler.finish();

    // classify is emitted first: its cases register int as 1 and string as 2.
    assert_has(&asm, "\tpushq $1\n");
    assert_has(&asm, "\tcmpq $1, ");
    assert_has(&asm, "\tcmpq $2, ");
    assert_has(&trailer, "dtype.1:\n\t.quad 1\n");
    assert_has(&trailer, "dtype.1.name:\n\t.ascii \"int\"\n");
    assert_has(&trailer, "dtype.2.name:\n\t.ascii \"string\"\n");
}

#[test]
fn methods_resolve_by_static_receiver_type() {
    let asm = compile_main(
        "package main\n\
         type A struct { n int }\n\
         type B struct { n int }\n\
         func (a *A) Name() int { return 1 }\n\
         func (b B) Name() int { return 2 }\n\
         func main() {\n\
         \tvar a A\n\
         \tvar b B\n\
         \tprint(a.Name() + b.Name())\n\
         }\n",
    );
    assert_has(&asm, "\t.global main.$A.Name\n");
    assert_has(&asm, "\t.global main.B.Name\n");
    assert_has(&asm, "\tcallq main.$A.Name\n");
    assert_has(&asm, "\tcallq main.B.Name\n");
}

// ── packages ────────────────────────────────────────────────────────────

#[test]
fn files_of_a_package_see_each_other() {
    let mut compiler = Compiler::default();
    let package = PackageSource::new("main")
        .with_file("a.go", "package main\nfunc main() { print(helper()) }\n")
        .with_file("b.go", "package main\nfunc helper() int { return limit * 2 }\nconst limit = 21\n");
    let asm = compiler.compile_package(&package).expect("compiles");
    assert_has(&asm, "\tcallq main.helper\n");
    assert_has(&asm, "\tpushq $42\n");
}

#[test]
fn packages_compile_in_dependency_order() {
    let mut compiler = Compiler::new(CompilerConfig { annotate: false, ..CompilerConfig::default() });
    let lib = PackageSource::new("lib").with_file(
        "lib/lib.go",
        "package lib\n\
         var Count = start()\n\
         func start() int { return 3 }\n\
         func Add1(x int) int { return x + 1 }\n",
    );
    let main = PackageSource::new("main").with_file(
        "main.go",
        "package main\n\
         import \"lib\"\n\
         func main() { print(lib.Add1(lib.Count)) }\n",
    );
    let asm = compiler.compile_all(&[lib, main]).expect("compiles");
    assert_has(&asm, "\tcallq lib.Add1\n");
    assert_has(&asm, "\tleaq lib.Count(%rip), %rax\n");
    assert_has(&asm, "\tcallq lib.__initVars\n\tcallq main.__initVars\n");
    assert!(!asm.contains("\t# "), "annotations emitted:\n{}", asm);
}

// ── errors ──────────────────────────────────────────────────────────────

#[test]
fn each_stage_reports_its_errors() {
    let cases = [
        ("package main\nvar x = 1 @ 2\n", "lex"),
        ("package main\nfunc f( {\n", "parse"),
        ("package main\nfunc f() int { return y }\n", "scope"),
        ("package main\nvar m map[string]int\n", "unsupported"),
        ("package main\nfunc f() int { return \"s\" }\n", "type"),
    ];
    for (src, stage) in cases {
        let (_, err) = compile_err(src);
        assert_eq!(err.stage(), stage, "{}", err);
    }
}

#[test]
fn oversized_locals_are_reported_not_panicked() {
    let (_, err) = compile_err("package main\nfunc main() { var x [1 << 62]int; _ = x }\n");
    assert_eq!(err.stage(), "type", "{}", err);
    assert!(err.to_string().contains("too large"), "{}", err);
}

#[test]
fn package_clause_must_match() {
    let (_, err) = compile_err("package other\nfunc f() {}\n");
    assert!(matches!(err, CompileError::PackageMismatch { .. }), "{}", err);
    assert_eq!(err.to_string(), "main.go declares package other, expected main");
}

#[test]
fn errors_render_against_their_file() {
    colored::control::set_override(false);
    let (compiler, err) = compile_err("package main\nfunc f() int {\n\treturn y\n}\n");
    let text = compiler.render_error(&err);
    assert!(text.starts_with("error[E0200]: undefined: y\n"), "{}", text);
    assert!(text.contains("--> main.go:3:9\n"), "{}", text);

    let json = compiler.error_json(&err);
    assert!(json.contains("\"phase\": \"scope\""), "{}", json);
    assert!(json.contains("\"file\": \"main.go\""), "{}", json);
}

#[test]
fn empty_package_is_rejected() {
    let mut compiler = Compiler::default();
    let err = compiler.compile_package(&PackageSource::new("main")).expect_err("no files");
    assert!(matches!(err, CompileError::EmptyPackage { .. }));
}
