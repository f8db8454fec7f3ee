//! Code-fetch hook
//!
//! The VM calls the attached [`CodeFetchHook`] before dispatching every
//! instruction. A hook only sees a read-only [`Fetch`] snapshot, so it cannot
//! re-enter the VM itself. Re-entry happens when host code that holds
//! `&mut Vm` (a native function) formats values through user methods; such
//! code detaches the hook with [`HookSuspension`] first.

use super::{CallStack, Vm};
use crate::bytecode::Irep;
use crate::symbol::SymbolTable;
use crate::value::Value;
use std::any::Any;
use std::ops::{Deref, DerefMut};
use tracing::{debug, warn};

/// Snapshot passed to the hook on every instruction fetch
#[derive(Debug, Clone, Copy)]
pub struct Fetch<'a> {
    /// Full call stack; the innermost frame is the one executing
    pub call_stack: &'a CallStack,
    /// Body being executed
    pub irep: &'a Irep,
    /// Offset of the instruction about to run
    pub pc: usize,
    /// Register window of the executing frame
    pub regs: &'a [Value],
    /// Interned names, for resolving `irep.lv`
    pub symbols: &'a SymbolTable,
}

/// Downcasting support for boxed hooks
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Per-instruction callback
pub trait CodeFetchHook: AsAny {
    fn on_fetch(&mut self, fetch: &Fetch<'_>);
}

/// Scoped hook detach
///
/// Takes the hook out of the VM on construction and puts it back on drop,
/// including when the guarded code returns an error or unwinds. Derefs to
/// the VM so guarded code keeps full access to it.
pub struct HookSuspension<'vm> {
    vm: &'vm mut Vm,
    hook: Option<Box<dyn CodeFetchHook>>,
}

impl<'vm> HookSuspension<'vm> {
    pub fn new(vm: &'vm mut Vm) -> Self {
        let hook = vm.take_code_fetch_hook();
        if hook.is_some() {
            debug!("code fetch hook suspended");
        }
        Self { vm, hook }
    }

    /// True if a hook was attached when the suspension began
    pub fn had_hook(&self) -> bool {
        self.hook.is_some()
    }
}

impl Deref for HookSuspension<'_> {
    type Target = Vm;

    fn deref(&self) -> &Vm {
        self.vm
    }
}

impl DerefMut for HookSuspension<'_> {
    fn deref_mut(&mut self) -> &mut Vm {
        self.vm
    }
}

impl Drop for HookSuspension<'_> {
    fn drop(&mut self) {
        if let Some(hook) = self.hook.take() {
            if self.vm.has_code_fetch_hook() {
                warn!("hook attached during suspension replaced by the suspended hook");
            }
            self.vm.set_code_fetch_hook(hook);
            debug!("code fetch hook restored");
        }
    }
}
