//! Call frames and the call stack

use crate::bytecode::{Irep, Proc};
use std::rc::Rc;

/// One activation record
///
/// Native calls get a frame too, so the stack interleaves interpreted and
/// native frames:
///
/// ```text
/// index:   0            1              2                3
///        [<main>] -> [Foo#bar] -> [Debug.locals] -> [Foo#to_s]
///         interp      interp        native            interp
/// ```
///
/// Register `r` of a frame lives at `stack[stack_base + r]`; register 0 is
/// the receiver.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Executing procedure; `None` for a frame with no body attached
    pub proc: Option<Proc>,
    /// Offset of the instruction being executed, if the frame is live
    pub pc: Option<usize>,
    /// Offset one past the call site in the caller
    pub return_pc: Option<usize>,
    /// Offset execution started at
    pub entry_pc: usize,
    /// Start of this frame's register window
    pub stack_base: usize,
}

impl Frame {
    /// Frame for a compiled body
    pub fn interpreted(irep: Rc<Irep>, stack_base: usize) -> Self {
        Self::with_proc(Proc::Interpreted(irep), stack_base)
    }

    /// Frame for any procedure
    pub fn with_proc(proc: Proc, stack_base: usize) -> Self {
        Self {
            proc: Some(proc),
            pc: None,
            return_pc: None,
            entry_pc: 0,
            stack_base,
        }
    }

    /// Frame with no procedure
    pub fn empty(stack_base: usize) -> Self {
        Self {
            proc: None,
            pc: None,
            return_pc: None,
            entry_pc: 0,
            stack_base,
        }
    }

    pub fn pc(mut self, pc: usize) -> Self {
        self.pc = Some(pc);
        self
    }

    pub fn return_pc(mut self, return_pc: usize) -> Self {
        self.return_pc = Some(return_pc);
        self
    }

    pub fn entry_pc(mut self, entry_pc: usize) -> Self {
        self.entry_pc = entry_pc;
        self
    }

    /// Compiled body, if this frame runs interpreted code
    pub fn irep(&self) -> Option<&Rc<Irep>> {
        self.proc.as_ref().and_then(Proc::irep)
    }

    pub fn is_native(&self) -> bool {
        self.proc.as_ref().is_some_and(Proc::is_native)
    }
}

/// Call stack; index 0 is the outermost frame
#[derive(Debug, Clone, Default)]
pub struct CallStack {
    frames: Vec<Frame>,
}

impl CallStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    /// Innermost frame
    pub fn current(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub fn current_mut(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }

    /// Index of the innermost frame
    pub fn current_index(&self) -> Option<usize> {
        self.frames.len().checked_sub(1)
    }

    /// Number of frames
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn get(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Innermost frame running compiled code, with its index
    pub fn innermost_interpreted(&self) -> Option<(usize, &Frame)> {
        self.frames
            .iter()
            .enumerate()
            .rev()
            .find(|(_, f)| f.irep().is_some())
    }
}

impl FromIterator<Frame> for CallStack {
    fn from_iter<I: IntoIterator<Item = Frame>>(iter: I) -> Self {
        Self {
            frames: iter.into_iter().collect(),
        }
    }
}
