//! Semantic driver tests: opcode shapes produced by Forth control structures.

use bumpalo::Bump;
use forthc::core::CompilationSession;
use forthc::forth;
use forthc::ir::{Label, OpKind, Register, Stack};
use forthc::{demangle, mangle, Definitions, Severity};

fn parse_with<'a>(
    arena: &'a Bump,
    source: &str,
    definitions: &Definitions,
) -> (bool, CompilationSession<'a>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut session = CompilationSession::new(arena, "test.fs");
    let ok = forth::parse(&mut session, source, definitions);
    (ok, session)
}

fn parse<'a>(arena: &'a Bump, source: &str) -> CompilationSession<'a> {
    let (ok, session) = parse_with(arena, source, &Definitions::new());
    assert!(ok, "parse failed: {:?}", session.diagnostics().rendered());
    session
}

fn kinds<'a>(session: &CompilationSession<'a>) -> Vec<OpKind<'a>> {
    session.opcodes().iter().map(|opcode| opcode.kind).collect()
}

fn count_labels(kinds: &[OpKind<'_>], label: Label) -> usize {
    kinds.iter().filter(|kind| kind.label() == Some(label)).count()
}

#[test]
fn test_if_then_has_one_branch_and_one_label() {
    let arena = Bump::new();
    let session = parse(&arena, ": f 1 if 2 then 3 ;");
    let kinds = kinds(&session);

    let branches: Vec<Label> = kinds.iter().filter_map(|kind| kind.branch_target()).collect();
    assert_eq!(branches.len(), 1);
    assert!(matches!(
        kinds.iter().find(|kind| kind.is_branching()),
        Some(OpKind::JumpZero(Register::R0, _))
    ));
    assert_eq!(count_labels(&kinds, branches[0]), 1);
}

#[test]
fn test_if_else_then() {
    let arena = Bump::new();
    let session = parse(&arena, ": f if 1 else 2 then ;");
    let kinds = kinds(&session);

    let conditional = kinds
        .iter()
        .find_map(|kind| match kind {
            OpKind::JumpZero(_, label) => Some(*label),
            _ => None,
        })
        .expect("conditional branch");
    let skip = kinds
        .iter()
        .find_map(|kind| match kind {
            OpKind::Jump(label) => Some(*label),
            _ => None,
        })
        .expect("jump over the else part");
    assert_ne!(conditional, skip);
    assert_eq!(count_labels(&kinds, conditional), 1);
    assert_eq!(count_labels(&kinds, skip), 1);
}

#[test]
fn test_do_loop_counts_with_return_stack() {
    let arena = Bump::new();
    let session = parse(&arena, ": f 3 0 do i . loop ;");
    let kinds = kinds(&session);

    let pushes = kinds
        .iter()
        .filter(|kind| matches!(kind, OpKind::Push(_, Stack::Return)))
        .count();
    let pops = kinds
        .iter()
        .filter(|kind| matches!(kind, OpKind::Pop(_, Stack::Return)))
        .count();
    assert_eq!(pushes, 4);
    assert_eq!(pops, 4);
    assert!(kinds.contains(&OpKind::AddValue(Register::R1, 1)));

    let back = kinds
        .iter()
        .find_map(|kind| match kind {
            OpKind::JumpNonZero(Register::R1, label) => Some(*label),
            _ => None,
        })
        .expect("loop back branch");
    let top = kinds.iter().position(|kind| kind.label() == Some(back)).unwrap();
    let jump = kinds.iter().position(|kind| kind.branch_target() == Some(back)).unwrap();
    assert!(top < jump);
}

#[test]
fn test_query_do_skips_equal_bounds() {
    let arena = Bump::new();
    let session = parse(&arena, ": f 0 0 ?do i . loop ;");
    assert!(kinds(&session)
        .iter()
        .any(|kind| matches!(kind, OpKind::JumpEqual(Register::R0, Register::R1, _))));
}

#[test]
fn test_leave_targets_loop_end() {
    let arena = Bump::new();
    let session = parse(&arena, ": f 10 0 do i 5 = if leave then loop ;");
    let kinds = kinds(&session);
    let leave = kinds
        .iter()
        .find_map(|kind| match kind {
            OpKind::Jump(label) => Some(*label),
            _ => None,
        })
        .expect("leave jump");
    assert_eq!(count_labels(&kinds, leave), 1);
}

#[test]
fn test_leave_outside_loop_is_an_error() {
    let arena = Bump::new();
    let (ok, session) = parse_with(&arena, ": f leave ;", &Definitions::new());
    assert!(!ok);
    let errors: Vec<&str> = session
        .diagnostics()
        .with_severity(Severity::Error)
        .map(|d| d.message.as_str())
        .collect();
    assert_eq!(errors, vec!["'LEAVE' invalid outside a loop"]);
}

#[test]
fn test_ifdef_selects_one_branch() {
    let source = "[IFDEF] foo 1 [ELSE] 2 [THEN]";

    let arena = Bump::new();
    let (ok, session) = parse_with(&arena, source, &Definitions::new());
    assert!(ok);
    let undefined = kinds(&session);
    assert!(undefined.contains(&OpKind::LoadValue(Register::R0, 2)));
    assert!(!undefined.contains(&OpKind::LoadValue(Register::R0, 1)));

    let arena = Bump::new();
    let definitions: Definitions = ["FOO"].into_iter().collect();
    let (ok, session) = parse_with(&arena, source, &definitions);
    assert!(ok);
    let defined = kinds(&session);
    assert!(defined.contains(&OpKind::LoadValue(Register::R0, 1)));
    assert!(!defined.contains(&OpKind::LoadValue(Register::R0, 2)));
}

#[test]
fn test_ifundef_and_nesting() {
    let source = "[IFUNDEF] foo [IFDEF] bar 1 [ELSE] 2 [THEN] [ELSE] 3 [ENDIF]";
    let arena = Bump::new();
    let definitions: Definitions = ["bar"].into_iter().collect();
    let (ok, session) = parse_with(&arena, source, &definitions);
    assert!(ok);
    let values: Vec<i32> = kinds(&session)
        .iter()
        .filter_map(|kind| match kind {
            OpKind::LoadValue(_, value) => Some(*value),
            _ => None,
        })
        .collect();
    assert_eq!(values, vec![1]);
}

#[test]
fn test_stray_cond_else_is_an_error() {
    let arena = Bump::new();
    let (ok, session) = parse_with(&arena, "1 [ELSE] 2", &Definitions::new());
    assert!(!ok);
    assert!(session
        .diagnostics()
        .iter()
        .any(|d| d.message == "parse error, unexpected [ELSE]"));
}

#[test]
fn test_constants_store_from_their_stack() {
    let arena = Bump::new();
    let session = parse(&arena, "1 constant one\n2.5e0 fconstant half\n");
    let kinds = kinds(&session);
    let one = session.symbols().lookup("one").unwrap().id;
    let half = session.symbols().lookup("half").unwrap().id;
    assert!(kinds.contains(&OpKind::Pop(Register::R0, Stack::Data)));
    assert!(kinds.contains(&OpKind::StoreSymbolIndirect(Register::R0, one)));
    assert!(kinds.contains(&OpKind::Pop(Register::R0, Stack::Float)));
    assert!(kinds.contains(&OpKind::StoreSymbolIndirect(Register::R0, half)));
}

#[test]
fn test_counted_string_limit() {
    let arena = Bump::new();
    let long = "x".repeat(300);
    let source = format!("c\" {long}\"");
    let (ok, session) = parse_with(&arena, &source, &Definitions::new());
    assert!(!ok);
    assert!(session.diagnostics().has_errors());
}

#[test]
fn test_char_literal_warning() {
    let arena = Bump::new();
    let session = parse(&arena, "char abc emit");
    assert!(kinds(&session).contains(&OpKind::LoadValue(Register::R0, b'a' as i32)));
    let warnings: Vec<&str> = session
        .diagnostics()
        .with_severity(Severity::Warning)
        .map(|d| d.message.as_str())
        .collect();
    assert_eq!(warnings, vec!["char literal 'abc' >1 character"]);
}

#[test]
fn test_mangled_names_are_prefixed() {
    for name in ["dup", "SWAP", "2drop", "c@", "+!", "?do", "a-b", "x"] {
        assert!(mangle(name).starts_with("v4_"), "{name}");
    }
    assert_eq!(mangle("__exit"), "exit");
    assert_eq!(mangle("main"), "main");
    assert_eq!(mangle("_start"), "_start");
}

#[test]
fn test_demangle_accepts_any_input() {
    let inputs = ["", "v4_", "v4__", "v4_x", "v4_xZZ", "v4_z", "___", "v4_\u{fffd}"];
    for input in inputs {
        let _ = demangle(input);
    }
    for byte in 0u8..=255 {
        let text = String::from_utf8_lossy(&[b'v', b'4', b'_', byte]).into_owned();
        let _ = demangle(&text);
    }
}
