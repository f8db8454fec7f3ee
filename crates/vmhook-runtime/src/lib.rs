//! vmhook runtime - instruction-fetch debugging for an embedded VM
//!
//! This library provides:
//! - A small register VM with a per-instruction code-fetch hook
//! - Location tracking and call-depth measurement on top of that hook
//! - Step / step-out predicates for breakpoint-style stepping
//! - Local, global and instance variable inspection exposed as a `Debug`
//!   module callable from script code

/// vmhook runtime version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod bytecode;
pub mod debugger;
pub mod symbol;
pub mod value;
pub mod var_table;
pub mod vm;

// Re-export commonly used types
pub use bytecode::{DebugInfo, FileName, Irep, IrepBuilder, Op, Proc, SourceLocation};
pub use debugger::{
    install, DebugSession, Descriptor, Inspector, LocationTracker, Stepper, TrackedLocation,
    TrackedState,
};
pub use symbol::{Symbol, SymbolTable};
pub use value::{RuntimeError, Value, ValueKind};
pub use var_table::VarTable;
pub use vm::{CallStack, CodeFetchHook, Fetch, Frame, HookSuspension, Vm};
