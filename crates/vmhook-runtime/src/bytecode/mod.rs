//! Compiled procedures
//!
//! An [`Irep`] is the compiled body of one method or top-level script: its
//! instruction sequence, local-variable name table, register count and line
//! program. A [`Proc`] is either an interpreted body or a native function.

mod debug_info;
mod opcode;

pub use debug_info::{DebugInfo, FileName, LineEntry, SourceLocation};
pub use opcode::{Op, Reg};

use crate::symbol::Symbol;
use crate::value::{RuntimeError, Value};
use crate::vm::Vm;
use std::fmt;
use std::rc::Rc;

/// Native function body: `(vm, self, args) -> result`
pub type NativeFn = Rc<dyn Fn(&mut Vm, &Value, &[Value]) -> Result<Value, RuntimeError>>;

/// Compiled procedure body
#[derive(Debug, Clone)]
pub struct Irep {
    /// Instruction sequence
    pub iseq: Vec<Op>,
    /// Local variable names; slot `i` lives in register `i + 1`.
    /// `None` marks an unnamed slot.
    pub lv: Vec<Option<Symbol>>,
    /// Register window size, including `self` in register 0
    pub nregs: usize,
    /// Number of required arguments
    pub params: usize,
    /// Offset-to-line table
    pub debug_info: DebugInfo,
}

impl Irep {
    /// Source location of the instruction at `pc`
    ///
    /// Offsets outside the instruction sequence are unknown.
    pub fn resolve(&self, pc: usize) -> Option<SourceLocation> {
        if pc >= self.iseq.len() {
            return None;
        }
        self.debug_info.resolve(pc)
    }

    /// Register holding local slot `slot`
    pub fn local_register(slot: usize) -> usize {
        slot + 1
    }

    /// Registers a frame running this body occupies.
    ///
    /// Always covers `self` and every argument, even when `nregs` was set
    /// lower by hand.
    pub fn window_size(&self) -> usize {
        self.nregs.max(Self::local_register(self.params))
    }
}

/// Builder for [`Irep`]
///
/// Line information is attached to the next instruction pushed after
/// [`IrepBuilder::line`] changes it:
///
/// ```
/// use vmhook_runtime::{FileName, IrepBuilder, Op};
///
/// let irep = IrepBuilder::new(&FileName::new("main.rb"))
///     .line(1)
///     .op(Op::LoadInt(1, 40))
///     .line(2)
///     .op(Op::Return(1))
///     .build();
/// assert_eq!(irep.resolve(1).map(|l| l.line), Some(2));
/// ```
#[derive(Debug, Clone, Default)]
pub struct IrepBuilder {
    iseq: Vec<Op>,
    lv: Vec<Option<Symbol>>,
    nregs: usize,
    params: usize,
    debug_info: DebugInfo,
    file: Option<FileName>,
    line: u32,
    pending_row: bool,
}

impl IrepBuilder {
    /// Start a body compiled from `file`
    pub fn new(file: &FileName) -> Self {
        Self {
            file: Some(file.clone()),
            ..Self::default()
        }
    }

    /// Start a body with no filename in its line program
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Switch the filename for following instructions
    pub fn file(mut self, file: &FileName) -> Self {
        self.file = Some(file.clone());
        self.pending_row = true;
        self
    }

    /// Set the line for following instructions (0 = no line info)
    pub fn line(mut self, line: u32) -> Self {
        self.line = line;
        self.pending_row = true;
        self
    }

    /// Declare the next local slot
    pub fn local(mut self, name: Option<Symbol>) -> Self {
        self.lv.push(name);
        self
    }

    /// Number of required arguments (bound to the first locals)
    pub fn params(mut self, params: usize) -> Self {
        self.params = params;
        self
    }

    /// Minimum register window size
    pub fn nregs(mut self, nregs: usize) -> Self {
        self.nregs = nregs;
        self
    }

    /// Append an instruction
    pub fn op(mut self, op: Op) -> Self {
        if self.pending_row || self.iseq.is_empty() {
            self.debug_info
                .add(self.iseq.len(), self.file.clone(), self.line);
            self.pending_row = false;
        }
        self.iseq.push(op);
        self
    }

    /// Append an instruction at `line`
    pub fn at(self, line: u32, op: Op) -> Self {
        self.line(line).op(op)
    }

    /// Append several instructions on the current line
    pub fn ops(self, ops: impl IntoIterator<Item = Op>) -> Self {
        ops.into_iter().fold(self, IrepBuilder::op)
    }

    /// Offset the next instruction will occupy
    pub fn offset(&self) -> usize {
        self.iseq.len()
    }

    pub fn build(self) -> Irep {
        let used = self
            .iseq
            .iter()
            .filter_map(highest_register)
            .max()
            .map_or(0, |r| r as usize + 1);
        let nregs = self
            .nregs
            .max(used)
            .max(self.lv.len() + 1)
            .max(self.params + 1);
        Irep {
            iseq: self.iseq,
            lv: self.lv,
            nregs,
            params: self.params,
            debug_info: self.debug_info,
        }
    }
}

fn highest_register(op: &Op) -> Option<Reg> {
    match *op {
        Op::Nop | Op::Jump(_) => None,
        Op::LoadNil(a)
        | Op::LoadSelf(a)
        | Op::LoadTrue(a)
        | Op::LoadFalse(a)
        | Op::LoadInt(a, _)
        | Op::LoadStr(a, _)
        | Op::LoadSym(a, _)
        | Op::GetGlobal(a, _)
        | Op::SetGlobal(_, a)
        | Op::GetIvar(a, _)
        | Op::SetIvar(_, a)
        | Op::GetConst(a, _)
        | Op::JumpIfNot(a, _)
        | Op::Return(a)
        | Op::Raise(a) => Some(a),
        Op::Move(a, b) => Some(a.max(b)),
        Op::Add(a, b, c) | Op::Sub(a, b, c) | Op::Lt(a, b, c) => Some(a.max(b).max(c)),
        Op::Send {
            dst, recv, argc, ..
        } => Some(dst.max(recv.saturating_add(argc))),
        Op::Array(a, start, len) => Some(a.max(start.saturating_add(len.saturating_sub(1)))),
    }
}

/// Callable procedure
#[derive(Clone)]
pub enum Proc {
    /// Compiled script code
    Interpreted(Rc<Irep>),
    /// Host function
    Native { name: Rc<str>, func: NativeFn },
}

impl Proc {
    pub fn interpreted(irep: Irep) -> Self {
        Proc::Interpreted(Rc::new(irep))
    }

    pub fn native<F>(name: &str, func: F) -> Self
    where
        F: Fn(&mut Vm, &Value, &[Value]) -> Result<Value, RuntimeError> + 'static,
    {
        Proc::Native {
            name: name.into(),
            func: Rc::new(func),
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Proc::Native { .. })
    }

    /// Compiled body, if interpreted
    pub fn irep(&self) -> Option<&Rc<Irep>> {
        match self {
            Proc::Interpreted(irep) => Some(irep),
            Proc::Native { .. } => None,
        }
    }

    /// Identity comparison
    pub fn same(&self, other: &Proc) -> bool {
        match (self, other) {
            (Proc::Interpreted(a), Proc::Interpreted(b)) => Rc::ptr_eq(a, b),
            (Proc::Native { func: a, .. }, Proc::Native { func: b, .. }) => {
                std::ptr::eq(Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ())
            }
            _ => false,
        }
    }
}

impl fmt::Debug for Proc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Proc::Interpreted(irep) => write!(f, "Proc(<{} ops>)", irep.iseq.len()),
            Proc::Native { name, .. } => write!(f, "Proc(native {})", name),
        }
    }
}
