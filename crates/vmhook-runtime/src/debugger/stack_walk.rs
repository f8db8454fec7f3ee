//! Call-depth measurement that ignores native frames.
//!
//! The raw frame count moves whenever native code is entered, so it cannot
//! tell a step over a native call from a step into script code. The
//! meaningful depth counts only frames that run compiled code *and* resolve
//! to a source line.

use crate::bytecode::SourceLocation;
use crate::vm::CallStack;

/// Instruction offset to attribute to frame `index`.
///
/// Uses, in order: the frame's own cursor; the next-deeper frame's return
/// address minus one (the call site); the frame's entry offset.
pub fn resolve_frame_pc(stack: &CallStack, index: usize) -> Option<usize> {
    let frame = stack.get(index)?;
    if let Some(pc) = frame.pc {
        return Some(pc);
    }
    let call_site = stack
        .get(index + 1)
        .and_then(|callee| callee.return_pc)
        .and_then(|ret| ret.checked_sub(1));
    Some(call_site.unwrap_or(frame.entry_pc))
}

/// Source location of frame `index`, if it runs compiled code with a
/// resolvable line.
pub fn frame_location(stack: &CallStack, index: usize) -> Option<SourceLocation> {
    let irep = stack.get(index)?.irep()?;
    let pc = resolve_frame_pc(stack, index)?;
    irep.resolve(pc)
}

/// Number of frames, innermost to outermost, that run compiled code with a
/// resolvable source line.
pub fn meaningful_depth(stack: &CallStack) -> usize {
    (0..stack.depth())
        .rev()
        .filter(|&i| frame_location(stack, i).is_some())
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{FileName, Irep, IrepBuilder, Op, Proc};
    use crate::value::Value;
    use crate::vm::Frame;
    use rstest::rstest;
    use std::rc::Rc;

    fn body() -> Rc<Irep> {
        Rc::new(
            IrepBuilder::new(&FileName::new("walk.rb"))
                .at(1, Op::Nop)
                .at(2, Op::Nop)
                .at(3, Op::Nop)
                .build(),
        )
    }

    fn lineless() -> Rc<Irep> {
        Rc::new(IrepBuilder::new(&FileName::new("gen.rb")).op(Op::Nop).build())
    }

    fn native() -> Proc {
        Proc::native("puts", |_, _, _| Ok(Value::Nil))
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(5)]
    fn test_counts_interpreted_frames(#[case] n: usize) {
        let stack: CallStack = (0..n).map(|i| Frame::interpreted(body(), i).pc(0)).collect();
        assert_eq!(meaningful_depth(&stack), n);
    }

    #[test]
    fn test_native_and_empty_frames_ignored() {
        let stack: CallStack = vec![
            Frame::interpreted(body(), 0).pc(1),
            Frame::with_proc(native(), 1),
            Frame::empty(2),
            Frame::interpreted(body(), 3).pc(2),
            Frame::with_proc(native(), 4),
        ]
        .into_iter()
        .collect();
        assert_eq!(meaningful_depth(&stack), 2);
    }

    #[test]
    fn test_unresolvable_frames_excluded() {
        let stack: CallStack = vec![
            Frame::interpreted(body(), 0).pc(0),
            Frame::interpreted(lineless(), 1).pc(0),
            Frame::interpreted(body(), 2).pc(99),
        ]
        .into_iter()
        .collect();
        assert_eq!(meaningful_depth(&stack), 1);
    }

    #[test]
    fn test_cursor_from_callee_return_address() {
        let stack: CallStack = vec![
            Frame::interpreted(body(), 0),
            Frame::with_proc(native(), 1).return_pc(2),
        ]
        .into_iter()
        .collect();
        assert_eq!(resolve_frame_pc(&stack, 0), Some(1));
        assert_eq!(frame_location(&stack, 0).map(|l| l.line), Some(2));
    }

    #[test]
    fn test_cursor_falls_back_to_entry() {
        let stack: CallStack = vec![Frame::interpreted(body(), 0).entry_pc(2)]
            .into_iter()
            .collect();
        assert_eq!(resolve_frame_pc(&stack, 0), Some(2));
        assert_eq!(meaningful_depth(&stack), 1);
    }

    #[test]
    fn test_own_cursor_wins() {
        let stack: CallStack = vec![
            Frame::interpreted(body(), 0).pc(0).entry_pc(2),
            Frame::interpreted(body(), 1).return_pc(3),
        ]
        .into_iter()
        .collect();
        assert_eq!(resolve_frame_pc(&stack, 0), Some(0));
    }

    #[test]
    fn test_zero_return_address_uses_entry() {
        let stack: CallStack = vec![
            Frame::interpreted(body(), 0).entry_pc(1),
            Frame::with_proc(native(), 1).return_pc(0),
        ]
        .into_iter()
        .collect();
        assert_eq!(resolve_frame_pc(&stack, 0), Some(1));
    }
}
