mod common;

use assert_cmd::Command;
use common::*;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use typesh::ast::{BinaryOp, Program, Stmt};
use typesh::optimizer::{OptimizerOptions, optimize};

fn write_program(dir: &Path, name: &str, items: Vec<Stmt>) -> PathBuf {
    let path = dir.join(name);
    let json = serde_json::to_string_pretty(&program(items)).expect("serialize program");
    fs::write(&path, json).expect("write program");
    path
}

fn hello() -> Vec<Stmt> {
    vec![
        int_stage("inc", BinaryOp::Add, 1),
        println(call("inc", vec![int(41)])),
    ]
}

fn typeshc() -> Command {
    Command::cargo_bin("typeshc").expect("Failed to get binary")
}

#[test]
fn emits_script_on_stdout() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_program(dir.path(), "hello.json", hello());
    typeshc()
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("#!/bin/sh\n"))
        .stdout(predicate::str::contains("inc() {"));
}

#[test]
fn bash_target_changes_the_shebang() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_program(dir.path(), "hello.json", hello());
    typeshc()
        .arg("--target")
        .arg("bash")
        .arg("--emit-sh")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("#!/usr/bin/env bash\n"))
        .stdout(predicate::str::contains("local x"));
}

#[test]
fn check_prints_ok() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_program(dir.path(), "hello.json", hello());
    typeshc().arg("--check").arg(&input).assert().success().stdout("OK\n");
}

#[test]
fn emit_ast_prints_the_optimized_tree() {
    let dir = tempfile::tempdir().unwrap();
    let items = vec![println(bin(BinaryOp::Mul, int(6), int(7)))];
    let expected = optimize(&program(items.clone()), OptimizerOptions::default());
    let input = write_program(dir.path(), "fold.json", items);
    let assert = typeshc().arg("--emit-ast").arg(&input).assert().success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let tree: Program = serde_json::from_str(&stdout).expect("stdout is a program");
    assert_eq!(tree, expected);
    assert!(stdout.contains("42"));
}

#[test]
fn semantic_errors_exit_with_two() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_program(
        dir.path(),
        "bad.json",
        vec![let_("x", int(1)), on_line(assign(expr_on_line(ident("x"), 2), int(2)), 2)],
    );
    typeshc()
        .arg(&input)
        .assert()
        .failure()
        .code(2)
        .stdout("")
        .stderr(predicate::str::contains("bad.json:2:1: error[MUT001]"));
}

#[test]
fn warnings_do_not_fail_the_build() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_program(
        dir.path(),
        "warn.json",
        vec![let_("name", text("a")), println(coalesce(ident("name"), text("b")))],
    );
    typeshc()
        .arg("--check")
        .arg(&input)
        .assert()
        .success()
        .stdout("OK\n")
        .stderr(predicate::str::contains("warning[NUL003]"));
}

#[test]
fn unsupported_constructs_exit_with_two() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_program(
        dir.path(),
        "fnval.json",
        vec![int_stage("inc", BinaryOp::Add, 1), let_("f", ident("inc"))],
    );
    typeshc()
        .arg(&input)
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("unsupported: function value"));
}

#[test]
fn missing_input_exits_with_one() {
    typeshc()
        .arg("definitely/not/here.json")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("unable to read"));
}

#[test]
fn malformed_input_exits_with_two() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("broken.json");
    fs::write(&input, "{ not json").unwrap();
    typeshc()
        .arg(&input)
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("malformed syntax tree"));
}

#[test]
fn out_writes_an_executable_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_program(dir.path(), "hello.json", hello());
    let out_path = dir.path().join("hello.sh");
    typeshc()
        .arg("-o")
        .arg(&out_path)
        .arg(&input)
        .assert()
        .success()
        .stdout("");

    let content = fs::read_to_string(&out_path).unwrap();
    assert!(content.starts_with("#!/bin/sh"));
    let run = run_script(&content, "sh", "");
    assert_eq!(run.stdout, "42\n");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(&out_path).unwrap().permissions().mode();
        assert_ne!(mode & 0o111, 0, "File should be executable");
    }
}

#[test]
fn no_chmod_x_leaves_permissions() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_program(dir.path(), "hello.json", hello());
    let out_path = dir.path().join("plain.sh");
    typeshc()
        .arg("--out")
        .arg(&out_path)
        .arg("--no-chmod-x")
        .arg(&input)
        .assert()
        .success();

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(&out_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0);
    }
}

#[test]
fn check_conflicts_with_out() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_program(dir.path(), "hello.json", hello());
    typeshc()
        .arg("--check")
        .arg("--out")
        .arg(dir.path().join("x.sh"))
        .arg(&input)
        .assert()
        .failure()
        .code(2);
}

#[test]
fn unknown_target_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_program(dir.path(), "hello.json", hello());
    typeshc()
        .arg("--target")
        .arg("zsh")
        .arg(&input)
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("zsh"));
}
