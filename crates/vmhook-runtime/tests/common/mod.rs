//! Shared helpers for vmhook integration tests

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;
use vmhook_config::DebugConfig;
use vmhook_runtime::bytecode::Reg;
use vmhook_runtime::debugger::{DebugSession, TrapContext};
use vmhook_runtime::{FileName, Irep, IrepBuilder, Op, Proc, Value, Vm};

/// A trap invocation as seen by the front-end
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stop {
    pub line: u32,
    pub depth: usize,
}

pub type StopLog = Rc<RefCell<Vec<Stop>>>;

pub fn script_file() -> FileName {
    FileName::new("script.rb")
}

/// `R(dst) = Debug.<method>(R(dst+1), ..)`; arguments must already be loaded
pub fn debug_send(vm: &mut Vm, dst: Reg, method: &str, argc: u16) -> [Op; 2] {
    let debug = vm.intern("Debug");
    let method = vm.intern(method);
    [
        Op::GetConst(dst, debug),
        Op::Send {
            dst,
            recv: dst,
            method,
            argc,
        },
    ]
}

/// `R(dst) = self.<method>(R(dst+1), ..)`
pub fn self_send(vm: &mut Vm, dst: Reg, method: &str, argc: u16) -> Op {
    let method = vm.intern(method);
    Op::Send {
        dst,
        recv: dst,
        method,
        argc,
    }
}

/// Session whose trap records every location transition
pub fn recording_session(config: &DebugConfig) -> (DebugSession, StopLog) {
    let log: StopLog = Rc::new(RefCell::new(Vec::new()));
    let sink = log.clone();
    let session = DebugSession::new(config).with_trap(move |cx: &mut TrapContext<'_>| {
        sink.borrow_mut().push(Stop {
            line: cx.location().line,
            depth: cx.depth(),
        });
    });
    (session, log)
}

pub fn lines(log: &StopLog) -> Vec<u32> {
    log.borrow().iter().map(|s| s.line).collect()
}

pub fn text(value: &Value) -> String {
    match value {
        Value::Str(s) => s.to_string(),
        other => panic!("expected a string, got {:?}", other),
    }
}

/// Defines `Object#add(a, b)`:
///
/// ```text
/// 2    c = a + b
/// 3    c
/// ```
pub fn define_add(vm: &mut Vm) {
    let names = ["a", "b", "c"].map(|n| vm.intern(n));
    let body = IrepBuilder::new(&script_file())
        .local(Some(names[0]))
        .local(Some(names[1]))
        .local(Some(names[2]))
        .params(2)
        .at(2, Op::Add(3, 1, 2))
        .at(3, Op::Return(3))
        .build();
    let object = vm.object_class().clone();
    vm.define_method(&object, "add", Proc::interpreted(body));
}

/// Top-level program calling `add`:
///
/// ```text
/// 10   x = 1
/// 11   y = add(x, 2)
/// 12   z = y + 1
/// 13   z
/// ```
pub fn add_program(vm: &mut Vm) -> Irep {
    let names = ["x", "y", "z"].map(|n| vm.intern(n));
    let add = self_send(vm, 4, "add", 2);
    IrepBuilder::new(&script_file())
        .local(Some(names[0]))
        .local(Some(names[1]))
        .local(Some(names[2]))
        .at(10, Op::LoadInt(1, 1))
        .at(11, Op::LoadSelf(4))
        .ops([Op::Move(5, 1), Op::LoadInt(6, 2), add, Op::Move(2, 4)])
        .at(12, Op::LoadInt(4, 1))
        .op(Op::Add(3, 2, 4))
        .at(13, Op::Return(3))
        .build()
}

/// Defines `Object#relay(obj)`, a native method that calls `obj.callback`
pub fn define_relay(vm: &mut Vm) {
    let object = vm.object_class().clone();
    vm.define_method(
        &object,
        "relay",
        Proc::native("relay", |vm, _recv, args| match args {
            [target] => vm.funcall(target, "callback", &[]),
            _ => Ok(Value::Nil),
        }),
    );
}
