//! Debug session: the code-fetch hook a front-end attaches to the VM.
//!
//! Owns the location tracker, the step state machine and an optional trap.
//! The trap runs on every location transition, before the new location is
//! committed, and is where a front-end decides whether to stop:
//!
//! ```
//! use vmhook_runtime::debugger::DebugSession;
//! use vmhook_config::DebugConfig;
//!
//! let session = DebugSession::new(&DebugConfig::default()).with_trap(|cx| {
//!     if cx.check_next() {
//!         println!("stopped at {}", cx.location());
//!     }
//! });
//! # let _ = session;
//! ```

use super::inspection::visible_locals;
use super::stack_walk::meaningful_depth;
use super::stepping::{ArmedBreakpoint, Stepper};
use super::tracker::{LocationTracker, TrackedLocation, TrackedState};
use crate::bytecode::{Irep, SourceLocation};
use crate::symbol::SymbolTable;
use crate::value::Value;
use crate::vm::{CallStack, CodeFetchHook, Fetch};
use vmhook_config::DebugConfig;

/// Callback invoked on each location transition.
pub type Trap = Box<dyn FnMut(&mut TrapContext<'_>)>;

/// Stand-in for a local whose register lies outside the window.
const NIL: &Value = &Value::Nil;

// ── TrapContext ──────────────────────────────────────────────────────────────

/// View handed to the trap. Predicates evaluated here compare against the
/// incoming location.
///
/// The executing frame's registers are readable directly, so a front-end
/// stopped in the trap can look at locals without re-entering the VM.
pub struct TrapContext<'a> {
    location: &'a SourceLocation,
    state: &'a TrackedState,
    call_stack: &'a CallStack,
    irep: &'a Irep,
    regs: &'a [Value],
    symbols: &'a SymbolTable,
    stepper: &'a mut Stepper,
}

impl<'a> TrapContext<'a> {
    /// Returns the location execution is entering.
    pub fn location(&self) -> &SourceLocation {
        self.location
    }

    /// Returns the location execution is leaving, if one was tracked.
    pub fn leaving(&self) -> Option<&TrackedLocation> {
        self.state.current.as_ref()
    }

    /// Returns the tracked state as it was before this transition.
    pub fn state(&self) -> &TrackedState {
        self.state
    }

    /// Returns the full call stack, innermost frame last.
    pub fn call_stack(&self) -> &CallStack {
        self.call_stack
    }

    /// Returns the meaningful call depth at the incoming location.
    pub fn depth(&self) -> usize {
        meaningful_depth(self.call_stack)
    }

    /// Returns the body containing the incoming instruction.
    pub fn irep(&self) -> &Irep {
        self.irep
    }

    /// Returns the register window of the executing frame.
    pub fn registers(&self) -> &[Value] {
        self.regs
    }

    /// Lists the named locals of the executing frame in slot order.
    ///
    /// Unnamed slots and the synthetic `*`/`&` slots are skipped, as in
    /// `Debug.local_variables`. Values are read straight from the registers,
    /// so no user code runs; describe them with [`Value::kind`] and
    /// [`Value::class_name`].
    pub fn local_variables(&self) -> Vec<(&str, &Value)> {
        visible_locals(self.irep, self.symbols)
            .map(|(slot, _, name)| (name, self.local_value(slot)))
            .collect()
    }

    /// Looks up one local of the executing frame by name.
    pub fn local_variable(&self, name: &str) -> Option<&Value> {
        visible_locals(self.irep, self.symbols)
            .find(|(_, _, local)| *local == name)
            .map(|(slot, _, _)| self.local_value(slot))
    }

    fn local_value(&self, slot: usize) -> &Value {
        self.regs.get(Irep::local_register(slot)).unwrap_or(NIL)
    }

    /// Arms a step breakpoint at the incoming location.
    pub fn arm(&mut self) {
        self.stepper.arm(self.location, self.call_stack);
    }

    /// Clears any armed breakpoint.
    pub fn disarm(&mut self) {
        self.stepper.disarm();
    }

    /// Returns true while a breakpoint is armed.
    pub fn is_armed(&self) -> bool {
        self.stepper.is_armed()
    }

    /// Evaluates the step-over predicate at the incoming location.
    ///
    /// Disarms when it fires.
    pub fn check_next(&mut self) -> bool {
        self.stepper.check_next(Some(self.location), self.call_stack)
    }

    /// Evaluates the step-out predicate at the incoming location.
    ///
    /// Disarms when it fires.
    pub fn check_stepout(&mut self) -> bool {
        self.stepper.check_stepout(Some(self.location), self.call_stack)
    }
}

// ── DebugSession ─────────────────────────────────────────────────────────────

/// Tracked state, stepping and trap for one VM.
pub struct DebugSession {
    tracker: LocationTracker,
    stepper: Stepper,
    trap: Option<Trap>,
    config: DebugConfig,
}

impl DebugSession {
    /// Creates a session with no trap, configured from `config`.
    pub fn new(config: &DebugConfig) -> Self {
        Self {
            tracker: LocationTracker::new(config.filename_match()),
            stepper: Stepper::new(config.next_strategy(), config.filename_match()),
            trap: None,
            config: config.clone(),
        }
    }

    /// Installs `trap` and returns the session, builder style.
    pub fn with_trap<F>(mut self, trap: F) -> Self
    where
        F: FnMut(&mut TrapContext<'_>) + 'static,
    {
        self.set_trap(trap);
        self
    }

    /// Replaces the trap.
    pub fn set_trap<F>(&mut self, trap: F)
    where
        F: FnMut(&mut TrapContext<'_>) + 'static,
    {
        self.trap = Some(Box::new(trap));
    }

    /// Removes the trap. Locations are still tracked.
    pub fn clear_trap(&mut self) {
        self.trap = None;
    }

    pub fn config(&self) -> &DebugConfig {
        &self.config
    }

    pub fn state(&self) -> &TrackedState {
        self.tracker.state()
    }

    /// Returns the most recently committed location.
    pub fn current(&self) -> Option<&TrackedLocation> {
        self.tracker.current()
    }

    /// Returns the location committed before [`DebugSession::current`].
    pub fn previous(&self) -> Option<&TrackedLocation> {
        self.tracker.previous()
    }

    /// Returns the number of location transitions seen.
    pub fn traps(&self) -> u64 {
        self.tracker.traps()
    }

    /// Arms at the tracked location. Returns false if nothing has been
    /// tracked yet.
    pub fn arm(&mut self, stack: &CallStack) -> bool {
        match self.tracker.current() {
            Some(current) => {
                self.stepper.arm(&current.location, stack);
                true
            }
            None => false,
        }
    }

    /// Clears any armed breakpoint.
    pub fn disarm(&mut self) {
        self.stepper.disarm();
    }

    pub fn is_armed(&self) -> bool {
        self.stepper.is_armed()
    }

    /// Returns the armed breakpoint, if any.
    pub fn armed(&self) -> Option<&ArmedBreakpoint> {
        self.stepper.armed()
    }

    /// Evaluates the step-over predicate against the tracked location.
    pub fn check_next(&mut self, stack: &CallStack) -> bool {
        let current = self.tracker.current().map(|c| &c.location);
        self.stepper.check_next(current, stack)
    }

    /// Evaluates the step-out predicate against the tracked location.
    pub fn check_stepout(&mut self, stack: &CallStack) -> bool {
        let current = self.tracker.current().map(|c| &c.location);
        self.stepper.check_stepout(current, stack)
    }

    /// Forgets tracked locations and any armed breakpoint.
    pub fn reset(&mut self) {
        self.tracker.reset();
        self.stepper.disarm();
    }
}

impl Default for DebugSession {
    fn default() -> Self {
        Self::new(&DebugConfig::default())
    }
}

impl CodeFetchHook for DebugSession {
    fn on_fetch(&mut self, fetch: &Fetch<'_>) {
        let stepper = &mut self.stepper;
        let trap = &mut self.trap;
        self.tracker.on_fetch(fetch, |location, state| {
            if let Some(trap) = trap.as_mut() {
                let mut cx = TrapContext {
                    location,
                    state,
                    call_stack: fetch.call_stack,
                    irep: fetch.irep,
                    regs: fetch.regs,
                    symbols: fetch.symbols,
                    stepper,
                };
                trap(&mut cx);
            }
        });
    }
}
