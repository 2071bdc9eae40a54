mod common;

use common::*;
use typesh::ast::{ExprKind, StmtKind};
use typesh::diagnostics::DiagnosticCode;

fn unsupported_messages(items: Vec<typesh::ast::Stmt>) -> Vec<String> {
    diagnostics(items)
        .with_code(DiagnosticCode::UnsupportedFeature)
        .map(|d| d.message.clone())
        .collect()
}

#[test]
fn async_functions_are_flagged() {
    let mut decl = func_decl("work", vec![], None, vec![]);
    decl.is_async = true;
    let messages = unsupported_messages(vec![at(StmtKind::Function(decl))]);
    assert_eq!(messages, vec!["Feature 'async function' is not supported".to_string()]);
}

#[test]
fn ranges_outside_for_loops_are_flagged() {
    let messages = unsupported_messages(vec![let_("r", range(int(0), int(3), false, None))]);
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("range expression"));

    let looped = unsupported_messages(vec![for_("i", range(int(0), int(3), false, None), vec![])]);
    assert!(looped.is_empty());
}

#[test]
fn raw_shell_is_only_allowed_as_a_statement() {
    let raw = || at(ExprKind::RawShell("echo hi".into()));
    assert!(unsupported_messages(vec![expr(raw())]).is_empty());
    let messages = unsupported_messages(vec![println(raw())]);
    assert_eq!(messages, vec!["Feature 'raw shell expression' is not supported".to_string()]);
}

#[test]
fn map_literals_are_flagged_with_their_entries() {
    let map = at(ExprKind::MapLiteral(vec![(text("k"), at(ExprKind::MapLiteral(vec![])))]));
    let messages = unsupported_messages(vec![expr(map)]);
    assert_eq!(messages.len(), 2);
}

#[test]
fn structures_inside_functions_are_flagged() {
    let messages = unsupported_messages(vec![func(
        "outer",
        vec![],
        None,
        vec![struct_decl("Inner", vec![("x", ty("int"))])],
    )]);
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("nested declaration"));
}

#[test]
fn clean_programs_pass_the_gate() {
    let messages = unsupported_messages(vec![
        struct_decl("Point", vec![("x", ty("int"))]),
        let_("p", struct_lit("Point", vec![("x", int(1))])),
        println(member(ident("p"), "x")),
    ]);
    assert!(messages.is_empty());
}
