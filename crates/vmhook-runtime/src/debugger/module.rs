//! `Debug` module registration.
//!
//! [`install`] attaches a [`DebugSession`] as the VM's code-fetch hook and
//! defines a `Debug` module whose functions return inspection text:
//!
//! | Function | Arguments |
//! |---|---|
//! | `Debug.local_variables` | none |
//! | `Debug.local_variable(name)` | String or Symbol |
//! | `Debug.global_variables` | none |
//! | `Debug.global_variable(name)` | String or Symbol |
//! | `Debug.instance_variables` | none |
//! | `Debug.instance_variable(name)` | String or Symbol |

use super::inspection::Inspector;
use super::session::DebugSession;
use crate::value::{ClassRef, RuntimeError, Value};
use crate::vm::Vm;
use tracing::{debug, warn};
use vmhook_config::DebugConfig;

/// Name of the module defined by [`install`]
pub const MODULE_NAME: &str = "Debug";

type ListQuery = fn(&Inspector, &mut Vm) -> Result<String, RuntimeError>;
type NamedQuery = fn(&Inspector, &mut Vm, &str) -> Result<String, RuntimeError>;

const LIST_QUERIES: [(&str, ListQuery); 3] = [
    ("local_variables", Inspector::local_variables),
    ("global_variables", Inspector::global_variables),
    ("instance_variables", Inspector::instance_variables),
];

const NAMED_QUERIES: [(&str, NamedQuery); 3] = [
    ("local_variable", Inspector::local_variable),
    ("global_variable", Inspector::global_variable),
    ("instance_variable", Inspector::instance_variable),
];

/// Attach a session built from `config` and define the `Debug` module
pub fn install(vm: &mut Vm, config: &DebugConfig) -> ClassRef {
    install_session(vm, DebugSession::new(config))
}

/// Attach `session` (for example one carrying a front-end trap) and define
/// the `Debug` module
pub fn install_session(vm: &mut Vm, session: DebugSession) -> ClassRef {
    let inspector = Inspector::from_config(session.config());
    if vm.set_code_fetch_hook(Box::new(session)).is_some() {
        warn!("replaced an existing code fetch hook");
    }

    let module = vm.define_module(MODULE_NAME);
    for (name, query) in LIST_QUERIES {
        vm.define_module_function(&module, name, move |vm, _recv, args| {
            expect_no_args(args)?;
            query(&inspector, vm).map(Value::string)
        });
    }
    for (name, query) in NAMED_QUERIES {
        vm.define_module_function(&module, name, move |vm, _recv, args| {
            let var = name_arg(vm, args)?;
            query(&inspector, vm, &var).map(Value::string)
        });
    }

    debug!(
        enrich_listings = inspector.enrich_listings(),
        "debug module installed"
    );
    module
}

/// Detach the session, if the attached hook is one
pub fn uninstall(vm: &mut Vm) -> Option<DebugSession> {
    vm.hook_ref::<DebugSession>()?;
    let hook = vm.take_code_fetch_hook()?;
    hook.into_any().downcast::<DebugSession>().ok().map(|s| *s)
}

/// Attached session
pub fn session(vm: &Vm) -> Option<&DebugSession> {
    vm.hook_ref::<DebugSession>()
}

pub fn session_mut(vm: &mut Vm) -> Option<&mut DebugSession> {
    vm.hook_mut::<DebugSession>()
}

fn expect_no_args(args: &[Value]) -> Result<(), RuntimeError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(RuntimeError::ArgumentError {
            msg: format!("wrong number of arguments (given {}, expected 0)", args.len()),
        })
    }
}

fn name_arg(vm: &Vm, args: &[Value]) -> Result<String, RuntimeError> {
    match args {
        [Value::Str(s)] => Ok(s.to_string()),
        [Value::Symbol(sym)] => Ok(vm.symbol_name(*sym).to_string()),
        [other] => Err(RuntimeError::ArgumentError {
            msg: format!(
                "variable name must be a String or Symbol, not {}",
                other.class_name()
            ),
        }),
        _ => Err(RuntimeError::ArgumentError {
            msg: format!("wrong number of arguments (given {}, expected 1)", args.len()),
        }),
    }
}
