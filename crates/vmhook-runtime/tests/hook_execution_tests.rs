//! hook_execution_tests.rs: location tracking and stepping on a running VM

mod common;

use common::*;
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::cell::RefCell;
use std::rc::Rc;
use vmhook_config::{DebugConfig, NextStrategy};
use vmhook_runtime::debugger::{self, DebugSession, TrapContext};
use vmhook_runtime::{FileName, IrepBuilder, Op, Proc, Value, Vm};

fn run_with(session: DebugSession, build: impl FnOnce(&mut Vm) -> vmhook_runtime::Irep) -> Value {
    let mut vm = Vm::new();
    define_add(&mut vm);
    define_relay(&mut vm);
    debugger::install_session(&mut vm, session);
    let irep = build(&mut vm);
    vm.run(irep).unwrap()
}

/// Session that arms at the first visit of `arm_line` and records the lines
/// at which `check` fires
fn stepping_session(
    config: &DebugConfig,
    arm_line: u32,
    check: fn(&mut TrapContext<'_>) -> bool,
) -> (DebugSession, Rc<RefCell<Vec<u32>>>) {
    let stops = Rc::new(RefCell::new(Vec::new()));
    let sink = stops.clone();
    let mut armed_once = false;
    let session = DebugSession::new(config).with_trap(move |cx| {
        if !armed_once && cx.location().line == arm_line {
            armed_once = true;
            cx.arm();
            return;
        }
        if check(cx) {
            sink.borrow_mut().push(cx.location().line);
        }
    });
    (session, stops)
}

// ══════════════════════════════════════════════════════════════════════════════
// Location tracking
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_trap_sequence_through_call() {
    let (session, log) = recording_session(&DebugConfig::default());
    let result = run_with(session, add_program);
    assert_eq!(result, Value::Integer(4));
    assert_eq!(
        *log.borrow(),
        vec![
            Stop { line: 10, depth: 1 },
            Stop { line: 11, depth: 1 },
            Stop { line: 2, depth: 2 },
            Stop { line: 3, depth: 2 },
            Stop { line: 11, depth: 1 },
            Stop { line: 12, depth: 1 },
            Stop { line: 13, depth: 1 },
        ]
    );
}

#[test]
fn test_loop_back_edge_on_one_line_reports_once() {
    // 1: i = 0
    // 2: i = i + 1 while i < 5
    // 3: i
    let (session, log) = recording_session(&DebugConfig::default());
    let result = run_with(session, |_| {
        IrepBuilder::new(&script_file())
            .at(1, Op::LoadInt(1, 0))
            .at(2, Op::LoadInt(2, 1))
            .ops([
                Op::LoadInt(3, 5),
                Op::Lt(4, 1, 3),
                Op::JumpIfNot(4, 7),
                Op::Add(1, 1, 2),
                Op::Jump(3),
            ])
            .at(3, Op::Return(1))
            .build()
    });
    assert_eq!(result, Value::Integer(5));
    assert_eq!(lines(&log), vec![1, 2, 3]);
}

#[test]
fn test_lines_without_info_are_skipped() {
    let (session, log) = recording_session(&DebugConfig::default());
    run_with(session, |_| {
        IrepBuilder::new(&script_file())
            .at(1, Op::LoadInt(1, 1))
            .at(0, Op::LoadInt(1, 2))
            .at(1, Op::LoadInt(1, 3))
            .at(2, Op::Return(1))
            .build()
    });
    // an instruction without line info leaves line 1 tracked
    assert_eq!(lines(&log), vec![1, 2]);
}

#[test]
fn test_same_line_in_another_file_is_a_transition() {
    let (session, log) = recording_session(&DebugConfig::default());
    run_with(session, |_| {
        IrepBuilder::new(&FileName::new("a.rb"))
            .at(7, Op::LoadInt(1, 1))
            .file(&FileName::new("b.rb"))
            .at(7, Op::Return(1))
            .build()
    });
    assert_eq!(lines(&log), vec![7, 7]);
}

#[test]
fn test_native_frames_do_not_add_depth() {
    // Callback#callback runs at line 30 underneath the native `relay`
    let (session, log) = recording_session(&DebugConfig::default());
    run_with(session, |vm| {
        let callback = vm.define_class("Callback", None);
        let body = IrepBuilder::new(&script_file())
            .at(30, Op::LoadInt(1, 9))
            .op(Op::Return(1))
            .build();
        vm.define_method(&callback, "callback", Proc::interpreted(body));
        let callback_const = vm.intern("Callback");
        let new = vm.intern("new");
        let relay = self_send(vm, 1, "relay", 1);
        IrepBuilder::new(&script_file())
            .at(20, Op::GetConst(2, callback_const))
            .op(Op::Send {
                dst: 2,
                recv: 2,
                method: new,
                argc: 0,
            })
            .at(21, Op::LoadSelf(1))
            .op(relay)
            .at(22, Op::Return(1))
            .build()
    });
    assert_eq!(
        *log.borrow(),
        vec![
            Stop { line: 20, depth: 1 },
            Stop { line: 21, depth: 1 },
            Stop { line: 30, depth: 2 },
            Stop { line: 22, depth: 1 },
        ]
    );
}

#[test]
fn test_trap_reads_locals_of_executing_frame() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    let session = DebugSession::new(&DebugConfig::default()).with_trap(move |cx| {
        let line = cx.location().line;
        if line == 3 || line == 12 {
            let locals: Vec<(String, Value)> = cx
                .local_variables()
                .into_iter()
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect();
            sink.borrow_mut().push((line, locals));
        }
    });
    run_with(session, add_program);

    let named = |pairs: &[(&str, Value)]| -> Vec<(String, Value)> {
        pairs.iter().map(|(n, v)| (n.to_string(), v.clone())).collect()
    };
    assert_eq!(
        *seen.borrow(),
        vec![
            // inside add, before `c` is returned
            (
                3,
                named(&[
                    ("a", Value::Integer(1)),
                    ("b", Value::Integer(2)),
                    ("c", Value::Integer(3)),
                ])
            ),
            // back at top level, before `z` is computed
            (
                12,
                named(&[
                    ("x", Value::Integer(1)),
                    ("y", Value::Integer(3)),
                    ("z", Value::Nil),
                ])
            ),
        ]
    );
}

#[test]
fn test_session_state_after_run() {
    let mut vm = Vm::new();
    define_add(&mut vm);
    debugger::install(&mut vm, &DebugConfig::default());
    let irep = add_program(&mut vm);
    vm.run(irep).unwrap();

    let session = debugger::session(&vm).unwrap();
    assert_eq!(session.traps(), 7);
    let current = session.current().unwrap();
    assert_eq!(current.location.to_string(), "script.rb:13");
    assert_eq!(current.depth, 1);
    assert_eq!(session.previous().map(|p| p.location.line), Some(12));
}

// ══════════════════════════════════════════════════════════════════════════════
// Stepping
// ══════════════════════════════════════════════════════════════════════════════

#[rstest]
#[case(NextStrategy::DepthRecount)]
#[case(NextStrategy::FrameIndex)]
fn test_next_steps_over_call(#[case] strategy: NextStrategy) {
    let config = DebugConfig::default().with_next_strategy(strategy);
    let (session, stops) = stepping_session(&config, 11, |cx| cx.check_next());
    run_with(session, add_program);
    // returning to line 11 is the armed location, so the first stop is 12
    assert_eq!(*stops.borrow(), vec![12]);
}

#[test]
fn test_next_inside_callee_stops_on_following_line() {
    let (session, stops) =
        stepping_session(&DebugConfig::default(), 2, |cx| cx.check_next());
    run_with(session, add_program);
    assert_eq!(*stops.borrow(), vec![3]);
}

#[test]
fn test_stepout_returns_to_caller() {
    let (session, stops) =
        stepping_session(&DebugConfig::default(), 2, |cx| cx.check_stepout());
    run_with(session, add_program);
    assert_eq!(*stops.borrow(), vec![11]);
}

#[test]
fn test_stepout_at_top_level_never_fires() {
    let (session, stops) =
        stepping_session(&DebugConfig::default(), 10, |cx| cx.check_stepout());
    run_with(session, add_program);
    assert!(stops.borrow().is_empty());
}

#[rstest]
#[case(NextStrategy::DepthRecount)]
#[case(NextStrategy::FrameIndex)]
fn test_next_over_native_relay(#[case] strategy: NextStrategy) {
    let config = DebugConfig::default().with_next_strategy(strategy);
    let (session, stops) = stepping_session(&config, 21, |cx| cx.check_next());
    run_with(session, |vm| {
        let callback = vm.define_class("Callback", None);
        let body = IrepBuilder::new(&script_file())
            .at(30, Op::LoadNil(1))
            .at(31, Op::Return(1))
            .build();
        vm.define_method(&callback, "callback", Proc::interpreted(body));
        let callback_const = vm.intern("Callback");
        let new = vm.intern("new");
        let relay = self_send(vm, 1, "relay", 1);
        IrepBuilder::new(&script_file())
            .at(21, Op::GetConst(2, callback_const))
            .op(Op::Send {
                dst: 2,
                recv: 2,
                method: new,
                argc: 0,
            })
            .op(Op::LoadSelf(1))
            .op(relay)
            .at(22, Op::Return(1))
            .build()
    });
    assert_eq!(*stops.borrow(), vec![22]);
}

#[test]
fn test_predicates_from_host_side() {
    let mut vm = Vm::new();
    define_add(&mut vm);
    debugger::install(&mut vm, &DebugConfig::default());
    let irep = add_program(&mut vm);
    vm.run(irep).unwrap();

    // after the run the tracked location is line 13 and the stack is empty
    let stack = vm.call_stack().clone();
    let session = debugger::session_mut(&mut vm).unwrap();
    assert!(session.arm(&stack));
    assert_eq!(session.armed().map(|a| a.depth), Some(0));
    assert!(!session.check_next(&stack));
    assert!(!session.check_stepout(&stack));
    assert!(session.is_armed());
}
