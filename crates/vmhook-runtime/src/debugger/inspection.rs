//! Variable inspection for the running VM.
//!
//! Reads local variables of the innermost script frame, the global table,
//! or the instance variables of the innermost frame's receiver, and renders
//! them with [`super::render`]. Missing context is never an error: a VM that
//! is not running, a receiver without an instance-variable table or an
//! unknown name all produce an empty result.
//!
//! Value text comes from `inspect` for nil, booleans, strings and integers
//! and from `to_s` for everything else, so user `inspect` overrides with
//! side effects are not triggered. `to_s` may still run user code; the
//! code-fetch hook is suspended while it does.

use super::render::{
    render_list, render_names, render_record, Descriptor, EMPTY_LIST, EMPTY_RECORD,
};
use crate::bytecode::Irep;
use crate::symbol::{Symbol, SymbolTable};
use crate::value::{RuntimeError, Value};
use crate::vm::{HookSuspension, Vm};
use vmhook_config::DebugConfig;

// ── VariableScope ────────────────────────────────────────────────────────────

/// Which table a query reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableScope {
    /// Named register slots of the innermost script frame
    Local,
    /// `$name` variables
    Global,
    /// `@name` variables of the innermost frame's receiver
    Instance,
}

/// Slot names the compiler emits for anonymous splat and block parameters
const SYNTHETIC_LOCALS: [&str; 2] = ["*", "&"];

// ── Inspector ────────────────────────────────────────────────────────────────

/// Renders variable tables as text
#[derive(Debug, Clone, Copy, Default)]
pub struct Inspector {
    /// "All" queries render full descriptors instead of names
    enrich_listings: bool,
}

impl Inspector {
    pub fn new(enrich_listings: bool) -> Self {
        Self { enrich_listings }
    }

    pub fn from_config(config: &DebugConfig) -> Self {
        Self::new(config.enrich_listings())
    }

    pub fn enrich_listings(&self) -> bool {
        self.enrich_listings
    }

    pub fn local_variables(&self, vm: &mut Vm) -> Result<String, RuntimeError> {
        self.list(vm, VariableScope::Local)
    }

    pub fn local_variable(&self, vm: &mut Vm, name: &str) -> Result<String, RuntimeError> {
        self.single(vm, VariableScope::Local, name)
    }

    pub fn global_variables(&self, vm: &mut Vm) -> Result<String, RuntimeError> {
        self.list(vm, VariableScope::Global)
    }

    pub fn global_variable(&self, vm: &mut Vm, name: &str) -> Result<String, RuntimeError> {
        self.single(vm, VariableScope::Global, name)
    }

    pub fn instance_variables(&self, vm: &mut Vm) -> Result<String, RuntimeError> {
        self.list(vm, VariableScope::Instance)
    }

    pub fn instance_variable(&self, vm: &mut Vm, name: &str) -> Result<String, RuntimeError> {
        self.single(vm, VariableScope::Instance, name)
    }

    /// Descriptors for every live entry of `scope`
    pub fn collect(&self, vm: &mut Vm, scope: VariableScope) -> Result<Vec<Descriptor>, RuntimeError> {
        let entries = entries(vm, scope);
        describe(vm, &entries)
    }

    fn list(&self, vm: &mut Vm, scope: VariableScope) -> Result<String, RuntimeError> {
        let entries = entries(vm, scope);
        if entries.is_empty() {
            return Ok(EMPTY_LIST.to_string());
        }
        if !self.enrich_listings {
            let names: Vec<&str> = entries.iter().map(|(sym, _)| vm.symbol_name(*sym)).collect();
            return Ok(render_names(&names));
        }
        Ok(render_list(&describe(vm, &entries)?))
    }

    fn single(&self, vm: &mut Vm, scope: VariableScope, name: &str) -> Result<String, RuntimeError> {
        let Some(sym) = vm.symbols().lookup(name) else {
            return Ok(EMPTY_RECORD.to_string());
        };
        let found: Vec<(Symbol, Value)> = entries(vm, scope)
            .into_iter()
            .filter(|(key, _)| *key == sym)
            .take(1)
            .collect();
        match describe(vm, &found)?.first() {
            Some(descriptor) => Ok(render_record(descriptor)),
            None => Ok(EMPTY_RECORD.to_string()),
        }
    }
}

/// Live `(name, value)` pairs of `scope`, cloned out of the VM
pub fn entries(vm: &Vm, scope: VariableScope) -> Vec<(Symbol, Value)> {
    match scope {
        VariableScope::Local => local_entries(vm),
        VariableScope::Global => vm.globals().iter().map(|(k, v)| (k, v.clone())).collect(),
        VariableScope::Instance => instance_entries(vm),
    }
}

fn local_entries(vm: &Vm) -> Vec<(Symbol, Value)> {
    let Some((_, frame)) = vm.call_stack().innermost_interpreted() else {
        return Vec::new();
    };
    let Some(irep) = frame.irep() else {
        return Vec::new();
    };
    visible_locals(irep, vm.symbols())
        .map(|(slot, sym, _)| {
            let value = vm
                .register(frame, Irep::local_register(slot))
                .cloned()
                .unwrap_or(Value::Nil);
            (sym, value)
        })
        .collect()
}

/// Named local slots of `irep` as `(slot, symbol, name)`, skipping unnamed
/// and synthetic slots
pub(crate) fn visible_locals<'a>(
    irep: &'a Irep,
    symbols: &'a SymbolTable,
) -> impl Iterator<Item = (usize, Symbol, &'a str)> + 'a {
    irep.lv.iter().enumerate().filter_map(move |(slot, name)| {
        let sym = (*name)?;
        let text = symbols.name(sym).unwrap_or("");
        if text.is_empty() || SYNTHETIC_LOCALS.contains(&text) {
            return None;
        }
        Some((slot, sym, text))
    })
}

fn instance_entries(vm: &Vm) -> Vec<(Symbol, Value)> {
    let Some(receiver) = vm.current_receiver() else {
        return Vec::new();
    };
    if !receiver.kind().has_ivar_table() {
        return Vec::new();
    }
    match receiver {
        Value::Object(obj) => obj
            .borrow()
            .ivars
            .iter()
            .map(|(k, v)| (k, v.clone()))
            .collect(),
        Value::Class(cls) => cls
            .ivars
            .borrow()
            .iter()
            .map(|(k, v)| (k, v.clone()))
            .collect(),
        _ => Vec::new(),
    }
}

/// Format entries with the hook detached
fn describe(vm: &mut Vm, entries: &[(Symbol, Value)]) -> Result<Vec<Descriptor>, RuntimeError> {
    if entries.is_empty() {
        return Ok(Vec::new());
    }
    let mut vm = HookSuspension::new(vm);
    entries
        .iter()
        .map(|(sym, value)| -> Result<Descriptor, RuntimeError> {
            let text = if value.kind().is_scalar() {
                vm.inspect(value)?
            } else {
                vm.to_s(value)?
            };
            Ok(Descriptor::new(
                vm.symbol_name(*sym),
                text,
                vm.class_name(value),
            ))
        })
        .collect()
}
