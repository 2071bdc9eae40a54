mod common;

use common::*;
use typesh::ast::{AssignOp, BinaryOp};
use typesh::optimizer::OptimizerOptions;
use typesh::target::TargetShell;

#[test]
fn exec_prints_function_result() {
    let result = run(vec![
        int_stage("inc", BinaryOp::Add, 1),
        let_("value", call("inc", vec![int(41)])),
        expr(exec(vec![text("printf"), text("%s\n"), ident("value")])),
    ]);
    assert_eq!(result.stdout, "42\n", "stderr: {}", result.stderr);
    assert_eq!(result.status, 0);
}

#[test]
fn nullable_field_reassignment_survives_coalesce() {
    let result = run(vec![
        struct_decl("User", vec![("name", ty("string")), ("nickname", nullable(ty("string")))]),
        let_mut("u", struct_lit("User", vec![("name", text("Ada")), ("nickname", null())])),
        println(coalesce(member(ident("u"), "nickname"), text("unknown"))),
        assign(member(ident("u"), "nickname"), text("Bob")),
        println(coalesce(member(ident("u"), "nickname"), text("unknown"))),
    ]);
    assert_eq!(result.stdout, "unknown\nBob\n", "stderr: {}", result.stderr);
}

#[test]
fn value_pipe_threads_through_stages() {
    let items = vec![
        int_stage("add_two", BinaryOp::Add, 2),
        int_stage("double", BinaryOp::Mul, 2),
        let_mut("a", int(5)),
        assign(ident("a"), pipe(pipe(ident("a"), call("add_two", vec![])), call("double", vec![]))),
        println(ident("a")),
    ];
    assert!(!diagnostics(items.clone()).has_errors());
    let result = run(items);
    assert_eq!(result.stdout, "14\n", "stderr: {}", result.stderr);
}

#[test]
fn spawned_process_output_is_awaited() {
    let result = run(vec![
        let_("p", spawn(vec![text("printf"), text("hello")])),
        let_("out", await_(ident("p"))),
        println(ident("out")),
    ]);
    assert_eq!(result.stdout, "hello\n", "stderr: {}", result.stderr);
    assert_eq!(result.status, 0);
}

#[test]
fn awaiting_twice_is_a_runtime_error() {
    let result = run(vec![
        let_("p", spawn(vec![text("true")])),
        let_("first", await_(ident("p"))),
        println(text("first done")),
        let_("second", await_(ident("p"))),
        println(text("unreachable")),
    ]);
    assert_eq!(result.stdout, "first done\n");
    assert_eq!(result.status, 1);
    assert!(result.stderr.contains("process handle already awaited"), "{}", result.stderr);
}

#[test]
fn second_await_can_be_caught() {
    let result = run(vec![
        let_("p", spawn(vec![text("true")])),
        expr(await_(ident("p"))),
        try_catch(
            vec![expr(await_(ident("p")))],
            Some("e"),
            vec![println(bin(BinaryOp::Add, text("caught: "), ident("e")))],
        ),
    ]);
    assert_eq!(result.stdout, "caught: process handle already awaited\n", "stderr: {}", result.stderr);
    assert_eq!(result.status, 0);
}

#[test]
fn thrown_message_reaches_catch() {
    let result = run(vec![
        try_catch(
            vec![throw(text("boom")), println(text("not reached"))],
            Some("e"),
            vec![println(bin(BinaryOp::Add, text("caught: "), ident("e")))],
        ),
        println(text("after")),
    ]);
    assert_eq!(result.stdout, "caught: boom\nafter\n", "stderr: {}", result.stderr);
    assert_eq!(result.status, 0);
}

#[test]
fn failing_exec_inside_try_is_caught() {
    let result = run(vec![try_catch(
        vec![expr(exec(vec![text("false")])), println(text("not reached"))],
        None,
        vec![println(text("recovered"))],
    )]);
    assert_eq!(result.stdout, "recovered\n");
}

#[test]
fn failing_exec_outside_try_stops_the_script() {
    let result = run(vec![
        expr(exec(vec![text("sh"), text("-c"), text("exit 3")])),
        println(text("not reached")),
    ]);
    assert_eq!(result.stdout, "");
    assert_eq!(result.status, 3);
}

#[test]
fn command_pipe_runs_as_a_shell_pipeline() {
    let result = run(vec![
        let_("c", pipe(cmd(vec![text("printf"), text("b\na\n")]), cmd(vec![text("sort")]))),
        let_("out", exec(vec![ident("c")])),
        println(ident("out")),
    ]);
    assert_eq!(result.stdout, "a\nb\n", "stderr: {}", result.stderr);
}

#[test]
fn range_loop_counts_up() {
    let result = run(vec![for_("i", range(int(0), int(3), false, None), vec![println(ident("i"))])]);
    assert_eq!(result.stdout, "0\n1\n2\n");
}

#[test]
fn inclusive_range_with_negative_step_counts_down() {
    let result = run(vec![for_(
        "i",
        range(int(3), int(1), true, Some(bin(BinaryOp::Sub, int(0), int(1)))),
        vec![println(ident("i"))],
    )]);
    assert_eq!(result.stdout, "3\n2\n1\n");
}

#[test]
fn array_loop_visits_each_element() {
    let result = run(vec![
        let_("xs", array(vec![text("a"), text("b c"), text("d")])),
        for_("x", ident("xs"), vec![println(ident("x"))]),
        println(method(ident("xs"), "len", vec![])),
        println(method(ident("xs"), "join", vec![text("-")])),
    ]);
    assert_eq!(result.stdout, "a\nb c\nd\n3\na-b c-d\n", "stderr: {}", result.stderr);
}

#[test]
fn while_loop_with_break() {
    let result = run(vec![
        let_mut("n", int(0)),
        while_(
            boolean(true),
            vec![
                compound(ident("n"), AssignOp::Add, int(1)),
                if_(bin(BinaryOp::Ge, ident("n"), int(3)), vec![at(typesh::ast::StmtKind::Break)], None),
            ],
        ),
        println(ident("n")),
    ]);
    assert_eq!(result.stdout, "3\n", "stderr: {}", result.stderr);
}

#[test]
fn methods_mutate_their_receiver() {
    let result = run(vec![
        struct_decl("Counter", vec![("n", ty("int"))]),
        impl_block(
            "Counter",
            vec![
                method_decl(
                    "bump",
                    true,
                    vec![],
                    None,
                    vec![assign(member(ident("self"), "n"), bin(BinaryOp::Add, member(ident("self"), "n"), int(1)))],
                ),
                method_decl("get", false, vec![], Some(ty("int")), vec![ret(Some(member(ident("self"), "n")))]),
            ],
        ),
        let_mut("c", struct_lit("Counter", vec![("n", int(1))])),
        expr(method(ident("c"), "bump", vec![])),
        expr(method(ident("c"), "bump", vec![])),
        println(method(ident("c"), "get", vec![])),
    ]);
    assert_eq!(result.stdout, "3\n", "stderr: {}", result.stderr);
}

#[test]
fn string_builtins_work_at_run_time() {
    let result = run(vec![
        let_("s", text("  Hello World  ")),
        let_("t", method(ident("s"), "trim", vec![])),
        println(method(ident("t"), "upper", vec![])),
        println(method(ident("t"), "len", vec![])),
        println(method(ident("t"), "replace", vec![text("World"), text("there")])),
        if_(
            method(ident("t"), "starts_with", vec![text("Hell")]),
            vec![println(text("yes"))],
            Some(vec![println(text("no"))]),
        ),
    ]);
    assert_eq!(result.stdout, "HELLO WORLD\n11\nHello there\nyes\n", "stderr: {}", result.stderr);
}

#[test]
fn main_return_value_becomes_exit_status() {
    let result = run(vec![func(
        "main",
        vec![],
        Some(ty("int")),
        vec![println(text("in main")), ret(Some(int(3)))],
    )]);
    assert_eq!(result.stdout, "in main\n");
    assert_eq!(result.status, 3);
}

fn factorial() -> Vec<typesh::ast::Stmt> {
    vec![
        func(
            "fact",
            vec![param("n", ty("int"))],
            Some(ty("int")),
            vec![
                if_(bin(BinaryOp::Le, ident("n"), int(1)), vec![ret(Some(int(1)))], None),
                ret(Some(bin(
                    BinaryOp::Mul,
                    ident("n"),
                    call("fact", vec![bin(BinaryOp::Sub, ident("n"), int(1))]),
                ))),
            ],
        ),
        println(call("fact", vec![int(5)])),
    ]
}

#[test]
fn bash_target_runs_recursive_functions() {
    let result = run_bash(factorial());
    assert_eq!(result.stdout, "120\n", "stderr: {}", result.stderr);
}

#[test]
fn posix_target_runs_recursive_functions() {
    let result = run(factorial());
    assert_eq!(result.stdout, "120\n", "stderr: {}", result.stderr);
}

#[test]
fn mutually_recursive_functions_keep_their_frames() {
    let result = run(vec![
        func(
            "is_even",
            vec![param("n", ty("int"))],
            Some(ty("bool")),
            vec![
                if_(bin(BinaryOp::Eq, ident("n"), int(0)), vec![ret(Some(boolean(true)))], None),
                ret(Some(call("is_odd", vec![bin(BinaryOp::Sub, ident("n"), int(1))]))),
            ],
        ),
        func(
            "is_odd",
            vec![param("n", ty("int"))],
            Some(ty("bool")),
            vec![
                if_(bin(BinaryOp::Eq, ident("n"), int(0)), vec![ret(Some(boolean(false)))], None),
                ret(Some(call("is_even", vec![bin(BinaryOp::Sub, ident("n"), int(1))]))),
            ],
        ),
        println(call("is_even", vec![int(4)])),
        println(call("is_odd", vec![int(4)])),
    ]);
    assert_eq!(result.stdout, "true\nfalse\n", "stderr: {}", result.stderr);
}

#[test]
fn float_arithmetic_goes_through_awk() {
    let result = run(vec![
        let_mut("x", float(1.5)),
        compound(ident("x"), AssignOp::Mul, float(3.0)),
        println(ident("x")),
    ]);
    assert_eq!(result.stdout, "4.5\n", "stderr: {}", result.stderr);
}

#[test]
fn folding_does_not_change_float_output() {
    let items = vec![
        println(bin(BinaryOp::Add, float(0.1), float(0.2))),
        if_(
            bin(BinaryOp::Eq, bin(BinaryOp::Add, float(0.1), float(0.2)), float(0.3)),
            vec![println(text("equal"))],
            Some(vec![println(text("different"))]),
        ),
    ];
    let off = OptimizerOptions { constant_propagation: false, constant_folding: false };
    let plain = run_script(&compile_with(items.clone(), TargetShell::Posix, off), "sh", "");
    let folded = run_script(&compile_with(items, TargetShell::Posix, OptimizerOptions::default()), "sh", "");
    assert_eq!(plain.stdout, "0.3\nequal\n", "stderr: {}", plain.stderr);
    assert_eq!(folded.stdout, plain.stdout);
}

#[test]
fn await_inside_try_waits_for_the_job() {
    let result = run(vec![
        let_("p", spawn(vec![text("sh"), text("-c"), text("sleep 1; echo done")])),
        try_catch(
            vec![println(await_(ident("p")))],
            Some("e"),
            vec![println(bin(BinaryOp::Add, text("caught: "), ident("e")))],
        ),
    ]);
    assert_eq!(result.stdout, "done\n", "stderr: {}", result.stderr);
    assert_eq!(result.status, 0);
}

#[test]
fn plain_spawn_is_awaited_like_async_spawn() {
    let result = run(vec![
        let_("p", spawn_sync(vec![text("printf"), text("sync")])),
        println(await_(ident("p"))),
    ]);
    assert_eq!(result.stdout, "sync\n", "stderr: {}", result.stderr);
}

#[test]
fn async_exec_does_not_block_or_fail_the_script() {
    let result = run(vec![
        expr(async_exec(vec![text("sh"), text("-c"), text("sleep 1; : > flag; exit 7")])),
        expr(exec(vec![text("sh"), text("-c"), text("if [ -f flag ]; then echo present; else echo absent; fi")])),
        println(text("next")),
    ]);
    assert_eq!(result.stdout, "absent\nnext\n", "stderr: {}", result.stderr);
    assert_eq!(result.status, 0);
}

#[test]
fn capture_files_are_removed() {
    let result = run(vec![
        let_("p", spawn(vec![text("printf"), text("one")])),
        println(await_(ident("p"))),
        try_catch(
            vec![
                let_("q", spawn(vec![text("printf"), text("two")])),
                println(await_(ident("q"))),
                throw(text("boom")),
            ],
            Some("e"),
            vec![println(ident("e"))],
        ),
        try_catch(vec![println(text("quiet"))], None, vec![]),
    ]);
    assert_eq!(result.stdout, "one\ntwo\nboom\nquiet\n", "stderr: {}", result.stderr);
    assert!(result.leftover_temp_files.is_empty(), "{:?}", result.leftover_temp_files);
}

#[test]
fn arrays_keep_empty_and_multiline_elements() {
    let result = run(vec![
        let_("xs", array(vec![text("a"), text("")])),
        println(method(ident("xs"), "len", vec![])),
        println(method(ident("xs"), "join", vec![text("-")])),
        let_("one", array(vec![text("")])),
        println(method(ident("one"), "len", vec![])),
        let_("lines", array(vec![text("x\ny"), text("z")])),
        println(method(ident("lines"), "len", vec![])),
        println(index(ident("lines"), int(0))),
        let_("parts", method(text("a,,b,"), "split", vec![text(",")])),
        println(method(ident("parts"), "len", vec![])),
    ]);
    assert_eq!(result.stdout, "2\na-\n1\n2\nx\ny\n4\n", "stderr: {}", result.stderr);
}

#[test]
fn call_stage_returning_a_command_receives_the_piped_value() {
    let items = vec![
        func(
            "grep_for",
            vec![param("pattern", ty("string"))],
            Some(ty("Command")),
            vec![ret(Some(cmd(vec![text("grep"), ident("pattern")])))],
        ),
        let_("search", pipe(text("needle"), call("grep_for", vec![]))),
        let_("out", exec(vec![pipe(cmd(vec![text("printf"), text("hay\nneedle")]), ident("search"))])),
        println(ident("out")),
    ];
    assert!(!diagnostics(items.clone()).has_errors());
    let result = run(items);
    assert_eq!(result.stdout, "needle\n", "stderr: {}", result.stderr);
}
