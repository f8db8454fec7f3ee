//! Instruction-fetch debugging.
//!
//! A [`DebugSession`] attached as the VM's code-fetch hook tracks source
//! location transitions ([`tracker`]), measures call depth without native
//! frames ([`stack_walk`]) and evaluates step predicates ([`stepping`]).
//! [`Inspector`] renders variable tables ([`render`]), and [`install`]
//! exposes it to script code as the `Debug` module.
//!
//! ```
//! use vmhook_config::DebugConfig;
//! use vmhook_runtime::{debugger, FileName, IrepBuilder, Op, Value, Vm};
//!
//! let mut vm = Vm::new();
//! debugger::install(&mut vm, &DebugConfig::default().with_enriched_listings(true));
//!
//! let x = vm.intern("x");
//! let debug = vm.intern("Debug");
//! let locals = vm.intern("local_variables");
//! let irep = IrepBuilder::new(&FileName::new("main.rb"))
//!     .local(Some(x))
//!     .at(1, Op::LoadInt(1, 42))
//!     .at(2, Op::GetConst(2, debug))
//!     .op(Op::Send { dst: 2, recv: 2, method: locals, argc: 0 })
//!     .op(Op::Return(2))
//!     .build();
//!
//! let text = vm.run(irep).unwrap();
//! assert_eq!(
//!     text,
//!     Value::string(r#"[{"name"=>"x", "value"=>"42", "type"=>"Integer"}]"#)
//! );
//! ```

pub mod inspection;
pub mod module;
pub mod render;
pub mod session;
pub mod stack_walk;
pub mod stepping;
pub mod tracker;

pub use inspection::{Inspector, VariableScope};
pub use module::{install, install_session, session, session_mut, uninstall, MODULE_NAME};
pub use render::{
    parse_descriptors, parse_names, parse_record, render_list, render_names, render_record,
    Descriptor, ParseError,
};
pub use session::{DebugSession, Trap, TrapContext};
pub use stack_walk::meaningful_depth;
pub use stepping::{ArmedBreakpoint, Stepper};
pub use tracker::{LocationTracker, TrackedLocation, TrackedState};
