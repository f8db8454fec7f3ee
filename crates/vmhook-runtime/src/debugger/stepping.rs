//! Step and step-out predicates.
//!
//! A [`Stepper`] is either idle or armed at a location. While armed, a
//! front-end polls [`Stepper::check_next`] or [`Stepper::check_stepout`] as
//! execution reaches new locations; the first positive answer disarms it.

use super::stack_walk::meaningful_depth;
use crate::bytecode::SourceLocation;
use crate::vm::CallStack;
use tracing::debug;
use vmhook_config::{FilenameMatch, NextStrategy};

// ── ArmedBreakpoint ──────────────────────────────────────────────────────────

/// Where and how deep the stepper was armed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmedBreakpoint {
    /// Location the breakpoint was armed at.
    pub location: SourceLocation,
    /// Raw call-stack index of the innermost frame at arm time.
    pub frame_index: usize,
    /// Meaningful depth at arm time.
    pub depth: usize,
}

// ── Stepper ──────────────────────────────────────────────────────────────────

/// Step state machine.
///
/// Holds at most one armed breakpoint; both predicates compare against it.
#[derive(Debug, Clone, Default)]
pub struct Stepper {
    armed: Option<ArmedBreakpoint>,
    next_strategy: NextStrategy,
    filename_match: FilenameMatch,
}

impl Stepper {
    /// Creates an idle stepper.
    pub fn new(next_strategy: NextStrategy, filename_match: FilenameMatch) -> Self {
        Self {
            armed: None,
            next_strategy,
            filename_match,
        }
    }

    /// Returns the depth test used by [`Stepper::check_next`].
    pub fn next_strategy(&self) -> NextStrategy {
        self.next_strategy
    }

    /// Returns true while a breakpoint is armed.
    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Returns the armed breakpoint, if any.
    pub fn armed(&self) -> Option<&ArmedBreakpoint> {
        self.armed.as_ref()
    }

    /// Arms at `location`, capturing the current frame index and depth.
    ///
    /// Re-arming replaces the previous breakpoint.
    pub fn arm(&mut self, location: &SourceLocation, stack: &CallStack) {
        let armed = ArmedBreakpoint {
            location: location.clone(),
            frame_index: stack.current_index().unwrap_or(0),
            depth: meaningful_depth(stack),
        };
        debug!(
            location = %armed.location,
            frame = armed.frame_index,
            depth = armed.depth,
            "breakpoint armed"
        );
        self.armed = Some(armed);
    }

    /// Clears the armed breakpoint. Does nothing when idle.
    pub fn disarm(&mut self) {
        self.armed = None;
    }

    /// Returns true once execution is at a different location without having
    /// descended below the armed frame, and disarms.
    ///
    /// An unknown `current` location never fires.
    pub fn check_next(&mut self, current: Option<&SourceLocation>, stack: &CallStack) -> bool {
        let Some(armed) = self.moved_from_armed(current) else {
            return false;
        };
        let not_deeper = match self.next_strategy {
            NextStrategy::FrameIndex => {
                armed.frame_index >= stack.current_index().unwrap_or(0)
            }
            NextStrategy::DepthRecount => armed.depth >= meaningful_depth(stack),
        };
        if not_deeper {
            self.fire("next");
        }
        not_deeper
    }

    /// Returns true once execution is at a different location and the
    /// meaningful depth is strictly below the armed depth, and disarms.
    pub fn check_stepout(&mut self, current: Option<&SourceLocation>, stack: &CallStack) -> bool {
        let Some(armed) = self.moved_from_armed(current) else {
            return false;
        };
        let shallower = meaningful_depth(stack) < armed.depth;
        if shallower {
            self.fire("stepout");
        }
        shallower
    }

    /// Armed breakpoint, if `current` is known and differs from it.
    fn moved_from_armed(&self, current: Option<&SourceLocation>) -> Option<&ArmedBreakpoint> {
        let armed = self.armed.as_ref()?;
        let current = current?;
        if current.matches(&armed.location, self.filename_match) {
            return None;
        }
        Some(armed)
    }

    fn fire(&mut self, kind: &str) {
        if let Some(armed) = self.armed.take() {
            debug!(kind, location = %armed.location, "step predicate fired");
        }
    }
}
