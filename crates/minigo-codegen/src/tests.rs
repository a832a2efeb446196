// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Emission tests: parse and analyse small packages, then check the shape of
//! the generated assembly.

#[cfg(test)]
mod tests {
    use minigo_ast::decl::File;
    use minigo_ast::Program;
    use minigo_lexer::Lexer;
    use minigo_parser::{merge_package, Parser};
    use minigo_walk::{analyze_package, Analysis};

    use crate::{CodeGenerator, CodegenOptions, INIT_ALL};

    // ── helpers ──────────────────────────────────────────────────────────

    fn load(program: &mut Program, name: &str, src: &str) -> Vec<File> {
        let file = program.add_source(format!("{}.go", name), src);
        let tokens = Lexer::new(src, file).tokenize().expect("lex errors");
        let parsed = Parser::new(program, tokens, file).parse_file().expect("parse errors");
        let mut files = vec![parsed];
        merge_package(program, &mut files).expect("resolve errors");
        files.into_iter().map(|p| p.file).collect()
    }

    fn compile_with(src: &str, options: CodegenOptions) -> (String, CodeGenerator) {
        let mut program = Program::new();
        let mut analysis = Analysis::new();
        let files = load(&mut program, "main", src);
        let package = analyze_package(&mut program, &mut analysis, &files, "main")
            .unwrap_or_else(|e| panic!("analysis error: {}", e));
        let mut gen = CodeGenerator::new(options);
        let asm = gen
            .emit_package(&program, &analysis, &files, &package)
            .unwrap_or_else(|e| panic!("codegen error: {}", e));
        (asm, gen)
    }

    fn compile(src: &str) -> String {
        compile_with(src, CodegenOptions::default()).0
    }

    fn assert_has(asm: &str, needle: &str) {
        assert!(asm.contains(needle), "missing `{}` in:\n{}", needle, asm);
    }

    // ── functions and calls ──────────────────────────────────────────────

    #[test]
    fn function_symbol_and_frame() {
        let asm = compile(
            "package main\n\
             func add1(x int) int { return x + 1 }\n\
             func main() { print(add1(2)) }\n",
        );
        assert_has(&asm, "\t.global main.add1\nmain.add1:\n");
        assert_has(&asm, "\tpushq %rbp\n\tmovq %rsp, %rbp\n");
        assert_has(&asm, "\tcallq main.add1\n");
        assert_has(&asm, "\tcallq runtime.printint\n");
        assert_has(&asm, "\tleave\n\tret\n");
        assert_has(&asm, "# params 8 bytes, results 8 bytes, locals 0 bytes");
        assert_has(&asm, "\t# return statement main.go:2\n");
    }

    #[test]
    fn caller_reserves_results_then_params() {
        let asm = compile(
            "package main\n\
             func pair(a, b int) (int, int) { return b, a }\n\
             func main() { x, y := pair(1, 2); print(x - y) }\n",
        );
        let call = asm.find("\tcallq main.pair\n").expect("call emitted");
        let before = &asm[..call];
        let reserve = before.rfind("\tsubq $16, %rsp\n").expect("param area reserved");
        let zeros = before[..reserve].matches("\tpushq $0\n").count();
        assert!(zeros >= 2, "result area not reserved:\n{}", before);
        assert_has(&asm[call..], "\taddq $16, %rsp\n");
    }

    #[test]
    fn methods_use_receiver_symbols() {
        let asm = compile(
            "package main\n\
             type T struct { n int }\n\
             func (t *T) Inc() { t.n++ }\n\
             func (t T) Get() int { return t.n }\n\
             func main() { var t T; t.Inc(); print(t.Get()) }\n",
        );
        assert_has(&asm, "main.$T.Inc:\n");
        assert_has(&asm, "main.T.Get:\n");
        assert_has(&asm, "\tcallq main.$T.Inc\n");
        assert_has(&asm, "\tcallq main.T.Get\n");
    }

    // ── runtime helpers ──────────────────────────────────────────────────

    #[test]
    fn string_operations_call_the_runtime() {
        let asm = compile(
            "package main\n\
             func f(a, b string) bool { return a+b == \"xy\" }\n",
        );
        assert_has(&asm, "\tcallq runtime.catstrings\n");
        assert_has(&asm, "\tcallq runtime.cmpstrings\n");
        assert_has(&asm, ".S0:\n\t.ascii \"xy\"\n");
    }

    #[test]
    fn append_picks_the_routine_by_element_size() {
        let asm = compile(
            "package main\n\
             func f(xs []int, bs []uint8, ss []string) {\n\
             \txs = append(xs, 1)\n\
             \tbs = append(bs, 2)\n\
             \tss = append(ss, \"s\")\n\
             }\n",
        );
        assert_has(&asm, "\tcallq runtime.append8\n");
        assert_has(&asm, "\tcallq runtime.append1\n");
        assert_has(&asm, "\tcallq runtime.append16\n");
    }

    #[test]
    fn make_and_new_allocate() {
        let asm = compile(
            "package main\n\
             type P struct { x, y int }\n\
             func f() int { s := make([]int, 3); p := new(P); return len(s) + p.y }\n",
        );
        assert_has(&asm, "\tcallq runtime.makeSlice\n");
        assert_has(&asm, "\tpushq $16\n");
        assert_has(&asm, "\tcallq runtime.heapalloc\n");
    }

    #[test]
    fn runtime_prefix_is_configurable() {
        let options = CodegenOptions { annotate: false, runtime_prefix: "rt".to_string() };
        let (asm, _) = compile_with("package main\nfunc main() { print(\"hi\") }\n", options);
        assert_has(&asm, "\tcallq rt.printstring\n");
        assert!(!asm.contains("runtime."), "default prefix leaked:\n{}", asm);
        assert!(!asm.contains("\t# "), "annotations emitted:\n{}", asm);
    }

    // ── interfaces ───────────────────────────────────────────────────────

    #[test]
    fn boxing_and_type_switch_share_tags() {
        let (asm, mut gen) = compile_with(
            "package main\n\
             func kind(v interface{}) int {\n\
             \tswitch x := v.(type) {\n\
             \tcase int:\n\
             \t\treturn x\n\
             \tcase string:\n\
             \t\treturn len(x)\n\
             \tcase nil:\n\
             \t\treturn -1\n\
             \t}\n\
             \treturn 0\n\
             }\n\
             func main() { print(kind(7)) }\n",
            CodegenOptions::default(),
        );
        let int = gen.dtypes.get("int").expect("int registered");
        let string = gen.dtypes.get("string").expect("string registered");
        assert_ne!(int, 0);
        assert_ne!(int, string);
        assert_has(&asm, &format!("\tcmpq ${}, ", int));
        assert_has(&asm, &format!("\tcmpq ${}, ", string));
        assert_has(&asm, "\tcmpq $0, ");

        let trailer = gen.finish();
        assert_has(&trailer, &format!("dtype.{}:\n\t.quad {}\n", int, int));
        assert_has(&trailer, "\t.ascii \"int\"\n");
    }

    #[test]
    fn comma_ok_assertion() {
        let asm = compile(
            "package main\n\
             func f(v interface{}) int {\n\
             \tn, ok := v.(int)\n\
             \tif ok {\n\
             \t\treturn n\n\
             \t}\n\
             \treturn 0\n\
             }\n",
        );
        assert_has(&asm, "\tpushq $1\n");
        assert_has(&asm, "\tpushq $0\n");
        assert_has(&asm, ".L.assert");
    }

    // ── globals and package init ─────────────────────────────────────────

    #[test]
    fn constant_globals_live_in_data() {
        let asm = compile(
            "package main\n\
             var n = 7\n\
             var small uint8 = 200\n\
             var flag = true\n\
             var name = \"go\"\n\
             func main() {}\n",
        );
        assert_has(&asm, "\t.global main.n\nmain.n:\n\t.quad 7\n");
        assert_has(&asm, "main.small:\n\t.byte 200\n");
        assert_has(&asm, "main.flag:\n\t.quad 1\n");
        assert_has(&asm, "main.name:\n\t.quad .S0\n\t.quad 2\n");
    }

    #[test]
    fn computed_globals_are_initialized_in_order() {
        let asm = compile(
            "package main\n\
             var a = b + 1\n\
             var b = f()\n\
             func f() int { return 2 }\n",
        );
        assert_has(&asm, "main.a:\n\t.zero 8\n");
        assert_has(&asm, "main.b:\n\t.zero 8\n");
        let init = asm.find("main.__initVars:\n").expect("init function");
        let body = &asm[init..];
        let b = body.find("leaq main.b(%rip)").expect("b stored");
        let a = body.find("leaq main.a(%rip)").expect("a stored");
        assert!(b < a, "b must be initialized before a:\n{}", body);
    }

    #[test]
    fn finish_calls_every_package_initializer() {
        let (_, mut gen) = compile_with("package main\nfunc main() {}\n", CodegenOptions::default());
        let trailer = gen.finish();
        assert_has(&trailer, &format!("\t.global {}\n{}:\n", INIT_ALL, INIT_ALL));
        assert_has(&trailer, "\tcallq main.__initVars\n\tret\n");
    }

    // ── statements ───────────────────────────────────────────────────────

    #[test]
    fn loops_and_labels_are_unique() {
        let asm = compile(
            "package main\n\
             func sum(xs []int) int {\n\
             \ttotal := 0\n\
             \tfor _, x := range xs {\n\
             \t\ttotal += x\n\
             \t}\n\
             \tfor i := 0; i < 3; i++ {\n\
             \t\tif i == 1 {\n\
             \t\t\tcontinue\n\
             \t\t}\n\
             \t\ttotal -= i\n\
             \t}\n\
             \treturn total\n\
             }\n",
        );
        let labels: Vec<&str> = asm.lines().filter(|l| l.starts_with(".L.") && l.ends_with(':')).collect();
        let mut unique = labels.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(labels.len(), unique.len(), "duplicate labels in:\n{}", asm);
        assert_has(&asm, "\tjge .L.");
        assert!(asm.contains("\taddq $1, "));
    }

    #[test]
    fn range_stores_its_collection_once() {
        let asm = compile(
            "package main\n\
             var calls int\n\
             func items() []int { calls++; return []int{1, 2, 3} }\n\
             func sum() int {\n\
             \tt := 0\n\
             \tfor _, x := range items() {\n\
             \t\tt += x\n\
             \t}\n\
             \treturn t\n\
             }\n",
        );
        assert_eq!(asm.matches("\tcallq main.items\n").count(), 1, "{}", asm);
        // Slice header in the hidden slot below `t`; elements read through its pointer.
        assert_has(&asm, "\tmovq -24(%rbp), %rax\n\tmovq %rax, -48(%rbp)\n");
        assert_has(&asm, "\tmovq -32(%rbp), %rax\n\tmovq -40(%rbp), %rcx\n\timulq $8, %rcx\n");
    }

    #[test]
    fn parallel_struct_assignment_copies_values_first() {
        let asm = compile(
            "package main\n\
             type P struct { v int }\n\
             func swap() int { a := P{1}; b := P{2}; a, b = b, a; return a.v }\n",
        );
        let swap = asm.find("main.swap:\n").expect("swap emitted");
        let body = &asm[swap..];
        // Two copies onto the stack, then two copies out of it.
        assert_eq!(body.matches("\tmovq %rsp, %rdi\n").count(), 2, "{}", body);
        assert_eq!(body.matches("\tmovq %rsp, %rsi\n").count(), 2, "{}", body);
    }

    #[test]
    fn switch_with_default_and_fallout() {
        let asm = compile(
            "package main\n\
             func f(s string) int {\n\
             \tswitch s {\n\
             \tcase \"a\", \"b\":\n\
             \t\treturn 1\n\
             \tdefault:\n\
             \t\treturn 2\n\
             \t}\n\
             \treturn 3\n\
             }\n",
        );
        assert_eq!(asm.matches("\tcallq runtime.cmpstrings\n").count(), 2);
    }

    #[test]
    fn struct_assignment_copies_bytes() {
        let asm = compile(
            "package main\n\
             type P struct { x, y int }\n\
             func f(p P) P { q := p; q.x = 3; return q }\n",
        );
        assert_has(&asm, "\tcallq runtime.memcopy\n");
        assert_has(&asm, "\tmovq $16, 16(%rsp)\n");
    }

    #[test]
    fn narrow_integers_are_masked() {
        let asm = compile(
            "package main\n\
             func f(b uint8) uint8 { return b * 3 }\n",
        );
        assert_has(&asm, "\tmovzbq %al, %rax\n");
    }
}
