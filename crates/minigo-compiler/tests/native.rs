// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Assembles and links compiled programs with the system toolchain and runs
//! them. A small runtime written in assembly stands in for the real one: a
//! bump allocator over a zeroed buffer, the string and slice helpers, and
//! printing through `write(2)`. Programs report through the exit status
//! (`main.result`) and standard output.
//!
//! Skipped when `as` or `ld` is not installed.

#![cfg(all(target_arch = "x86_64", target_os = "linux"))]

use std::path::Path;
use std::process::Command;

use minigo_compiler::{Compiler, PackageSource};

/// Entry point: initialize packages, run main.main, exit with main.result.
const START: &str = "\t.text
\t.global _start
_start:
\tcallq __initAllPackages
\tcallq main.main
\tmovq main.result(%rip), %rdi
\tmovq $60, %rax
\tsyscall
";

/// Arguments start at 8(%rsp) on entry, first argument lowest; results
/// follow the arguments.
const RUNTIME: &str = "\t.bss
\t.align 16
runtime.heap:
\t.zero 1048576
\t.data
runtime.heapnext:
\t.quad runtime.heap
\t.text

# heapalloc(size int) uintptr
runtime.heapalloc:
\tmovq runtime.heapnext(%rip), %rax
\tmovq 8(%rsp), %rcx
\tleaq 15(%rax,%rcx), %rcx
\tandq $-16, %rcx
\tmovq %rcx, runtime.heapnext(%rip)
\tmovq %rax, 16(%rsp)
\tret

# memcopy(dst, src uintptr, size int)
runtime.memcopy:
\tmovq 8(%rsp), %rdi
\tmovq 16(%rsp), %rsi
\tmovq 24(%rsp), %rcx
\trep movsb
\tret

# catstrings(a, b string) string
runtime.catstrings:
\tmovq 16(%rsp), %rcx
\taddq 32(%rsp), %rcx
\tmovq %rcx, 48(%rsp)
\tmovq runtime.heapnext(%rip), %rdi
\tmovq %rdi, 40(%rsp)
\tleaq 15(%rdi,%rcx), %rax
\tandq $-16, %rax
\tmovq %rax, runtime.heapnext(%rip)
\tmovq 8(%rsp), %rsi
\tmovq 16(%rsp), %rcx
\trep movsb
\tmovq 24(%rsp), %rsi
\tmovq 32(%rsp), %rcx
\trep movsb
\tret

# cmpstrings(a, b string) bool
runtime.cmpstrings:
\tmovq $0, 40(%rsp)
\tmovq 16(%rsp), %rcx
\tcmpq 32(%rsp), %rcx
\tjne 1f
\tmovq 8(%rsp), %rsi
\tmovq 24(%rsp), %rdi
\trepe cmpsb
\tjne 1f
\tmovq $1, 40(%rsp)
1:
\tret

# makeSlice(elemSize, len, cap int) []T
runtime.makeSlice:
\tmovq 8(%rsp), %rax
\timulq 24(%rsp), %rax
\tmovq runtime.heapnext(%rip), %rdi
\tleaq 15(%rdi,%rax), %rcx
\tandq $-16, %rcx
\tmovq %rcx, runtime.heapnext(%rip)
\tmovq %rdi, 32(%rsp)
\tmovq 16(%rsp), %rax
\tmovq %rax, 40(%rsp)
\tmovq 24(%rsp), %rax
\tmovq %rax, 48(%rsp)
\tret

# append1(s []uint8, x uint8) []uint8
runtime.append1:
\tmovq 8(%rsp), %rax
\tmovq 16(%rsp), %rcx
\tmovq 24(%rsp), %rdx
\tcmpq %rdx, %rcx
\tjl 2f
\tleaq 1(%rdx,%rdx), %rdx
\tmovq runtime.heapnext(%rip), %rdi
\tleaq 15(%rdi,%rdx), %r8
\tandq $-16, %r8
\tmovq %r8, runtime.heapnext(%rip)
\tmovq %rax, %rsi
\tmovq %rdi, %rax
\tmovq %rcx, %r9
\trep movsb
\tmovq %r9, %rcx
2:
\tmovq 32(%rsp), %r8
\tmovb %r8b, (%rax,%rcx)
\tincq %rcx
\tmovq %rax, 40(%rsp)
\tmovq %rcx, 48(%rsp)
\tmovq %rdx, 56(%rsp)
\tret

# append8(s []T, x T) []T
runtime.append8:
\tmovq 8(%rsp), %rax
\tmovq 16(%rsp), %rcx
\tmovq 24(%rsp), %rdx
\tcmpq %rdx, %rcx
\tjl 2f
\tleaq 1(%rdx,%rdx), %rdx
\tmovq runtime.heapnext(%rip), %rdi
\tleaq 15(%rdi,%rdx,8), %r8
\tandq $-16, %r8
\tmovq %r8, runtime.heapnext(%rip)
\tmovq %rax, %rsi
\tmovq %rdi, %rax
\tmovq %rcx, %r9
\tshlq $3, %rcx
\trep movsb
\tmovq %r9, %rcx
2:
\tmovq 32(%rsp), %r8
\tmovq %r8, (%rax,%rcx,8)
\tincq %rcx
\tmovq %rax, 40(%rsp)
\tmovq %rcx, 48(%rsp)
\tmovq %rdx, 56(%rsp)
\tret

# printstring(s string)
runtime.printstring:
\tmovq $1, %rax
\tmovq $1, %rdi
\tmovq 8(%rsp), %rsi
\tmovq 16(%rsp), %rdx
\tsyscall
\tret

# printint(x int)
runtime.printint:
\tmovq 8(%rsp), %rax
\tsubq $32, %rsp
\tleaq 32(%rsp), %rsi
\tmovq %rax, %r8
\ttestq %rax, %rax
\tjns 1f
\tnegq %rax
1:
\tmovq $10, %rcx
2:
\txorl %edx, %edx
\tdivq %rcx
\taddb $48, %dl
\tdecq %rsi
\tmovb %dl, (%rsi)
\ttestq %rax, %rax
\tjnz 2b
\ttestq %r8, %r8
\tjns 3f
\tdecq %rsi
\tmovb $45, (%rsi)
3:
\tleaq 32(%rsp), %rdx
\tsubq %rsi, %rdx
\tmovq $1, %rax
\tmovq $1, %rdi
\tsyscall
\taddq $32, %rsp
\tret

# panic(x interface{})
runtime.panic:
\tmovq $60, %rax
\tmovq $2, %rdi
\tsyscall
";

struct Run {
    status: i32,
    stdout: String,
}

fn have_tool(name: &str) -> bool {
    Command::new(name).arg("--version").output().map(|o| o.status.success()).unwrap_or(false)
}

fn assemble_and_run(asm: &str, dir: &Path) -> Run {
    let source = dir.join("prog.s");
    let object = dir.join("prog.o");
    let binary = dir.join("prog");
    std::fs::write(&source, format!("{}{}{}", asm, RUNTIME, START)).expect("write assembly");

    let status = Command::new("as").arg(&source).arg("-o").arg(&object).status().expect("run as");
    assert!(status.success(), "as failed on:\n{}", asm);
    let status = Command::new("ld").arg(&object).arg("-o").arg(&binary).status().expect("run ld");
    assert!(status.success(), "ld failed");

    let out = Command::new(&binary).output().expect("run program");
    Run { status: out.status.code().unwrap_or(-1), stdout: String::from_utf8_lossy(&out.stdout).into_owned() }
}

/// Compile a single-file `main` package and run it; `None` when the system
/// toolchain is missing.
fn run_main(src: &str) -> Option<Run> {
    if !have_tool("as") || !have_tool("ld") {
        eprintln!("skipping: as/ld not available");
        return None;
    }
    let mut compiler = Compiler::default();
    let package = PackageSource::new("main").with_file("main.go", src);
    let asm = compiler.compile_all(&[package]).unwrap_or_else(|e| panic!("{} error: {}", e.stage(), e));

    let dir = tempfile::tempdir().expect("temp dir");
    Some(assemble_and_run(&asm, dir.path()))
}

// ── scenarios ───────────────────────────────────────────────────────────

#[test]
fn add1_exits_with_42() {
    let Some(run) = run_main(
        "package main\n\
         var result int\n\
         func add1(x int) int { return x + 1 }\n\
         func main() { result = add1(41) }\n",
    ) else {
        return;
    };
    assert_eq!(run.status, 42);
}

#[test]
fn string_concatenation_builds_a_fresh_string() {
    let Some(run) = run_main(
        "package main\n\
         var result int\n\
         func main() {\n\
         \ta := \"ab\"\n\
         \tb := \"cd\"\n\
         \ts := a + b\n\
         \tprint(s, len(s))\n\
         \tif s == \"abcd\" && a == \"ab\" && b == \"cd\" {\n\
         \t\tresult = len(s)\n\
         \t}\n\
         }\n",
    ) else {
        return;
    };
    assert_eq!(run.stdout, "abcd4");
    assert_eq!(run.status, 4);
}

#[test]
fn appending_a_ninth_byte_keeps_the_first_eight() {
    let Some(run) = run_main(
        "package main\n\
         var result int\n\
         func main() {\n\
         \ts := []uint8{1, 2, 3, 4, 5, 6, 7, 8}\n\
         \ts = append(s, 9)\n\
         \ttotal := 0\n\
         \tfor _, b := range s {\n\
         \t\ttotal += int(b)\n\
         \t}\n\
         \tif total == 45 && s[0] == 1 && s[7] == 8 && s[8] == 9 {\n\
         \t\tresult = len(s)\n\
         \t}\n\
         }\n",
    ) else {
        return;
    };
    assert_eq!(run.status, 9);
}

#[test]
fn type_switch_binds_the_unboxed_value() {
    let Some(run) = run_main(
        "package main\n\
         var result int\n\
         func classify(v interface{}) int {\n\
         \tswitch x := v.(type) {\n\
         \tcase string:\n\
         \t\treturn 100 + len(x)\n\
         \tcase int:\n\
         \t\treturn x\n\
         \tdefault:\n\
         \t\treturn 7\n\
         \t}\n\
         }\n\
         func main() { result = classify(30) + classify(true) + classify(\"abcde\") - 100 }\n",
    ) else {
        return;
    };
    // 30 + 7 + 105 - 100
    assert_eq!(run.status, 42);
}

#[test]
fn methods_dispatch_on_the_static_receiver() {
    let Some(run) = run_main(
        "package main\n\
         var result int\n\
         type A struct { n int }\n\
         type B struct { n int }\n\
         func (a *A) Name() int { return 10 + a.n }\n\
         func (b B) Name() int { return 20 + b.n }\n\
         func main() {\n\
         \ta := A{1}\n\
         \tb := B{2}\n\
         \tresult = a.Name()*10 + b.Name() - 100\n\
         }\n",
    ) else {
        return;
    };
    // 11*10 + 22 - 100
    assert_eq!(run.status, 32);
}

// ── stores, loops and assignment ────────────────────────────────────────

#[test]
fn fields_of_every_width_survive_a_copy() {
    let Some(run) = run_main(
        "package main\n\
         var result int\n\
         type R struct { b uint8; h uint16; n int; s string; ok bool }\n\
         func main() {\n\
         \tvar r R\n\
         \tr.b = 200\n\
         \tr.h = 60000\n\
         \tr.n = -5\n\
         \tr.s = \"xy\"\n\
         \tr.ok = true\n\
         \tvar g R\n\
         \tg = r\n\
         \tr.b = 1\n\
         \tif g.b == 200 && g.h == 60000 && g.n == -5 && g.s == \"xy\" && g.ok {\n\
         \t\tresult = 42\n\
         \t}\n\
         }\n",
    ) else {
        return;
    };
    assert_eq!(run.status, 42);
}

#[test]
fn loops_and_globals_run_natively() {
    let Some(run) = run_main(
        "package main\n\
         var result int\n\
         var base = seed() * 2\n\
         func seed() int { return 3 }\n\
         type counter struct { n int }\n\
         func (c *counter) bump(by int) { c.n += by }\n\
         func main() {\n\
         \tvar c counter\n\
         \tfor i := 0; i < 5; i++ {\n\
         \t\tif i == 2 {\n\
         \t\t\tcontinue\n\
         \t\t}\n\
         \t\tc.bump(i)\n\
         \t}\n\
         \tvar xs [4]int\n\
         \txs[1] = 10\n\
         \ttotal := 0\n\
         \tfor _, x := range xs {\n\
         \t\ttotal += x\n\
         \t}\n\
         \tresult = c.n + total + base\n\
         }\n",
    ) else {
        return;
    };
    // 0+1+3+4 = 8, plus 10, plus 6.
    assert_eq!(run.status, 24);
}

#[test]
fn range_evaluates_its_collection_once() {
    let Some(run) = run_main(
        "package main\n\
         var result int\n\
         var calls int\n\
         func items() []int { calls++; return []int{1, 2, 3} }\n\
         func main() {\n\
         \tt := 0\n\
         \tfor _, x := range items() {\n\
         \t\tt += x\n\
         \t}\n\
         \ts := []int{1, 2, 3}\n\
         \tu := 0\n\
         \tfor _, x := range s {\n\
         \t\tu += x\n\
         \t\ts = []int{10, 20, 30}\n\
         \t}\n\
         \tresult = calls*100 + t*10 + u\n\
         }\n",
    ) else {
        return;
    };
    assert_eq!(run.status, 166);
}

#[test]
fn parallel_assignment_swaps_structs() {
    let Some(run) = run_main(
        "package main\n\
         var result int\n\
         type P struct { v int }\n\
         func main() {\n\
         \ta := P{1}\n\
         \tb := P{2}\n\
         \ta, b = b, a\n\
         \tresult = a.v*10 + b.v\n\
         }\n",
    ) else {
        return;
    };
    assert_eq!(run.status, 21);
}

#[test]
fn local_types_do_not_match_package_types() {
    let Some(run) = run_main(
        "package main\n\
         var result int\n\
         type T struct { a, b int }\n\
         func local() interface{} { type T int; return T(5) }\n\
         func main() {\n\
         \t_, ok := local().(T)\n\
         \tif !ok {\n\
         \t\tresult = 42\n\
         \t}\n\
         }\n",
    ) else {
        return;
    };
    assert_eq!(run.status, 42);
}
