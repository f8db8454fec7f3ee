//! Register-based virtual machine
//!
//! Executes [`Irep`] bodies. Every method call, interpreted or native, pushes
//! a [`Frame`]; interpreted frames own a window of [`Irep::window_size`]
//! registers on the shared value stack. Before each instruction is dispatched
//! the attached [`CodeFetchHook`] (if any) sees the call stack, body, offset
//! and register window.

mod frame;
mod hook;

pub use frame::{CallStack, Frame};
pub use hook::{AsAny, CodeFetchHook, Fetch, HookSuspension};

use crate::bytecode::{Irep, Op, Proc, Reg};
use crate::symbol::{Symbol, SymbolTable};
use crate::value::{
    format_float, inspect_str, ClassKind, ClassRef, ObjectBody, RClass, RObject, RuntimeError,
    Value,
};
use crate::var_table::VarTable;
use std::collections::HashMap;
use std::rc::Rc;

/// Default maximum call depth
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Virtual machine state
pub struct Vm {
    /// Interned names
    symbols: SymbolTable,
    /// Register windows of all live frames
    stack: Vec<Value>,
    /// Activation records
    call_stack: CallStack,
    /// `$name` variables
    globals: VarTable,
    /// Top-level constants (classes and modules)
    constants: HashMap<Symbol, Value>,
    object_class: ClassRef,
    hash_class: ClassRef,
    exception_class: ClassRef,
    /// Receiver of top-level code
    main: Value,
    /// Optional per-instruction callback
    hook: Option<Box<dyn CodeFetchHook>>,
    max_depth: usize,
}

impl Vm {
    /// Create a VM with the core classes defined
    pub fn new() -> Self {
        let object_class = Rc::new(RClass::new("Object", ClassKind::Class, None));
        let hash_class = Rc::new(RClass::new(
            "Hash",
            ClassKind::Class,
            Some(object_class.clone()),
        ));
        let exception_class = Rc::new(RClass::new(
            "StandardError",
            ClassKind::Class,
            Some(object_class.clone()),
        ));
        let main = Value::object(RObject::new(object_class.clone(), ObjectBody::Plain));

        let mut vm = Self {
            symbols: SymbolTable::new(),
            stack: Vec::with_capacity(256),
            call_stack: CallStack::new(),
            globals: VarTable::new(),
            constants: HashMap::new(),
            object_class: object_class.clone(),
            hash_class: hash_class.clone(),
            exception_class: exception_class.clone(),
            main,
            hook: None,
            max_depth: DEFAULT_MAX_DEPTH,
        };
        for cls in [object_class, hash_class, exception_class] {
            let name = vm.intern(&cls.name);
            vm.constants.insert(name, Value::Class(cls));
        }
        vm
    }

    /// Limit nested calls to `max_depth` frames
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    // ── Symbols ─────────────────────────────────────────────────────────

    pub fn intern(&mut self, name: &str) -> Symbol {
        self.symbols.intern(name)
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Name of `sym`, or an empty string for a foreign symbol
    pub fn symbol_name(&self, sym: Symbol) -> &str {
        self.symbols.name(sym).unwrap_or("")
    }

    // ── Code-fetch hook ─────────────────────────────────────────────────

    /// Attach a hook, returning the one it replaces
    pub fn set_code_fetch_hook(
        &mut self,
        hook: Box<dyn CodeFetchHook>,
    ) -> Option<Box<dyn CodeFetchHook>> {
        self.hook.replace(hook)
    }

    /// Detach the hook
    pub fn take_code_fetch_hook(&mut self) -> Option<Box<dyn CodeFetchHook>> {
        self.hook.take()
    }

    pub fn has_code_fetch_hook(&self) -> bool {
        self.hook.is_some()
    }

    /// Attached hook, if it is a `T`
    pub fn hook_ref<T: CodeFetchHook>(&self) -> Option<&T> {
        self.hook.as_deref()?.as_any().downcast_ref::<T>()
    }

    /// Attached hook, if it is a `T`
    pub fn hook_mut<T: CodeFetchHook>(&mut self) -> Option<&mut T> {
        self.hook.as_deref_mut()?.as_any_mut().downcast_mut::<T>()
    }

    // ── State access ────────────────────────────────────────────────────

    pub fn call_stack(&self) -> &CallStack {
        &self.call_stack
    }

    /// Value stack holding every frame's registers
    pub fn stack(&self) -> &[Value] {
        &self.stack
    }

    /// Register `reg` of `frame`
    pub fn register(&self, frame: &Frame, reg: usize) -> Option<&Value> {
        self.stack.get(frame.stack_base + reg)
    }

    pub fn globals(&self) -> &VarTable {
        &self.globals
    }

    pub fn set_global(&mut self, name: &str, value: Value) {
        let sym = self.intern(name);
        self.globals.insert(sym, value);
    }

    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(self.symbols.lookup(name)?)
    }

    pub fn remove_global(&mut self, name: &str) -> Option<Value> {
        let sym = self.symbols.lookup(name)?;
        self.globals.remove(sym)
    }

    pub fn constant(&self, name: &str) -> Option<&Value> {
        self.constants.get(&self.symbols.lookup(name)?)
    }

    /// Receiver of top-level code
    pub fn main_object(&self) -> &Value {
        &self.main
    }

    pub fn object_class(&self) -> &ClassRef {
        &self.object_class
    }

    /// True while script code is executing
    pub fn is_running(&self) -> bool {
        !self.call_stack.is_empty()
    }

    /// `self` of the innermost interpreted frame
    pub fn current_receiver(&self) -> Option<&Value> {
        let (_, frame) = self.call_stack.innermost_interpreted()?;
        self.register(frame, 0)
    }

    // ── Registration ────────────────────────────────────────────────────

    /// Define a class under a top-level constant (superclass defaults to Object)
    pub fn define_class(&mut self, name: &str, superclass: Option<&ClassRef>) -> ClassRef {
        let superclass = superclass.cloned().unwrap_or_else(|| self.object_class.clone());
        let cls = Rc::new(RClass::new(name, ClassKind::Class, Some(superclass)));
        let sym = self.intern(name);
        self.constants.insert(sym, Value::Class(cls.clone()));
        cls
    }

    /// Define a module under a top-level constant
    pub fn define_module(&mut self, name: &str) -> ClassRef {
        let module = Rc::new(RClass::new(name, ClassKind::Module, None));
        let sym = self.intern(name);
        self.constants.insert(sym, Value::Class(module.clone()));
        module
    }

    /// Define an instance method
    pub fn define_method(&mut self, cls: &ClassRef, name: &str, proc: Proc) {
        let sym = self.intern(name);
        cls.methods.borrow_mut().insert(sym, proc);
    }

    /// Define a class-level method
    pub fn define_singleton_method(&mut self, cls: &ClassRef, name: &str, proc: Proc) {
        let sym = self.intern(name);
        cls.singleton_methods.borrow_mut().insert(sym, proc);
    }

    /// Define a native function callable as `Module.name`
    pub fn define_module_function<F>(&mut self, module: &ClassRef, name: &str, func: F)
    where
        F: Fn(&mut Vm, &Value, &[Value]) -> Result<Value, RuntimeError> + 'static,
    {
        self.define_singleton_method(module, name, Proc::native(name, func));
    }

    // ── Object construction ─────────────────────────────────────────────

    pub fn new_object(&self, cls: &ClassRef) -> Value {
        Value::object(RObject::new(cls.clone(), ObjectBody::Plain))
    }

    pub fn new_hash(&self, pairs: Vec<(Value, Value)>) -> Value {
        Value::object(RObject::new(self.hash_class.clone(), ObjectBody::Hash(pairs)))
    }

    /// Wrap foreign data of type `type_name` in an instance of `cls`
    pub fn new_data(&self, cls: &ClassRef, type_name: &str) -> Value {
        Value::object(RObject::new(cls.clone(), ObjectBody::Data(type_name.into())))
    }

    /// Exception instance (class defaults to StandardError)
    pub fn new_exception(&self, cls: Option<&ClassRef>, message: &str) -> Value {
        let cls = cls.unwrap_or(&self.exception_class).clone();
        Value::object(RObject::new(cls, ObjectBody::Exception(message.to_string())))
    }

    /// Set `@name` on an object or class
    pub fn set_ivar(&mut self, recv: &Value, name: &str, value: Value) -> Result<(), RuntimeError> {
        let sym = self.intern(name);
        self.ivar_set(recv, sym, value)
    }

    pub fn ivar(&self, recv: &Value, name: &str) -> Option<Value> {
        let sym = self.symbols.lookup(name)?;
        match self.ivar_get(recv, sym) {
            Value::Nil => None,
            v => Some(v),
        }
    }

    // ── Execution ───────────────────────────────────────────────────────

    /// Run a top-level body with `main` as the receiver
    pub fn run(&mut self, irep: impl Into<Rc<Irep>>) -> Result<Value, RuntimeError> {
        let main = self.main.clone();
        self.invoke(Proc::Interpreted(irep.into()), main, &[])
    }

    /// Call `recv.name(*args)`
    pub fn funcall(
        &mut self,
        recv: &Value,
        name: &str,
        args: &[Value],
    ) -> Result<Value, RuntimeError> {
        let sym = self.intern(name);
        self.call_method(recv, sym, args)
    }

    /// Call a method by symbol
    pub fn call_method(
        &mut self,
        recv: &Value,
        method: Symbol,
        args: &[Value],
    ) -> Result<Value, RuntimeError> {
        match self.find_method(recv, method) {
            Some(proc) => self.invoke(proc, recv.clone(), args),
            None => self.builtin_method(recv, method, args),
        }
    }

    /// Invoke `proc` with `recv` as self
    pub fn invoke(
        &mut self,
        proc: Proc,
        recv: Value,
        args: &[Value],
    ) -> Result<Value, RuntimeError> {
        if self.call_stack.depth() >= self.max_depth {
            return Err(RuntimeError::StackOverflow);
        }
        let return_pc = self.call_stack.current().and_then(|f| f.pc).map(|pc| pc + 1);
        let base = self.stack.len();

        let result = match &proc {
            Proc::Native { func, .. } => {
                let func = func.clone();
                let mut frame = Frame::with_proc(proc.clone(), base);
                frame.return_pc = return_pc;
                self.call_stack.push(frame);
                self.stack.push(recv.clone());
                func(self, &recv, args)
            }
            Proc::Interpreted(irep) => {
                if args.len() != irep.params {
                    return Err(RuntimeError::ArgumentError {
                        msg: format!(
                            "wrong number of arguments (given {}, expected {})",
                            args.len(),
                            irep.params
                        ),
                    });
                }
                let irep = irep.clone();
                self.stack.resize(base + irep.window_size(), Value::Nil);
                self.stack[base] = recv;
                for (i, arg) in args.iter().enumerate() {
                    self.stack[base + Irep::local_register(i)] = arg.clone();
                }
                let mut frame = Frame::interpreted(irep.clone(), base);
                frame.return_pc = return_pc;
                self.call_stack.push(frame);
                self.execute(irep, base)
            }
        };

        self.call_stack.pop();
        self.stack.truncate(base);
        result
    }

    /// Main dispatch loop for one frame
    fn execute(&mut self, irep: Rc<Irep>, base: usize) -> Result<Value, RuntimeError> {
        let mut pc = 0;
        loop {
            let Some(op) = irep.iseq.get(pc) else {
                return Ok(Value::Nil);
            };
            if let Some(frame) = self.call_stack.current_mut() {
                frame.pc = Some(pc);
            }

            // Code-fetch hook (zero overhead when detached)
            if let Some(ref mut hook) = self.hook {
                let fetch = Fetch {
                    call_stack: &self.call_stack,
                    irep: &irep,
                    pc,
                    regs: self
                        .stack
                        .get(base..base + irep.window_size())
                        .unwrap_or(&[]),
                    symbols: &self.symbols,
                };
                hook.on_fetch(&fetch);
            }

            pc += 1;

            match op {
                Op::Nop => {}

                // ===== Loads =====
                Op::LoadNil(a) => self.set_reg(base, *a, Value::Nil)?,
                Op::LoadSelf(a) => {
                    let recv = self.reg(base, 0)?.clone();
                    self.set_reg(base, *a, recv)?;
                }
                Op::LoadTrue(a) => self.set_reg(base, *a, Value::Bool(true))?,
                Op::LoadFalse(a) => self.set_reg(base, *a, Value::Bool(false))?,
                Op::LoadInt(a, n) => self.set_reg(base, *a, Value::Integer(*n))?,
                Op::LoadStr(a, s) => self.set_reg(base, *a, Value::Str(s.clone()))?,
                Op::LoadSym(a, sym) => self.set_reg(base, *a, Value::Symbol(*sym))?,
                Op::Move(a, b) => {
                    let value = self.reg(base, *b)?.clone();
                    self.set_reg(base, *a, value)?;
                }

                // ===== Variables =====
                Op::GetGlobal(a, name) => {
                    let value = self.globals.get(*name).cloned().unwrap_or(Value::Nil);
                    self.set_reg(base, *a, value)?;
                }
                Op::SetGlobal(name, a) => {
                    let value = self.reg(base, *a)?.clone();
                    self.globals.insert(*name, value);
                }
                Op::GetIvar(a, name) => {
                    let recv = self.reg(base, 0)?.clone();
                    let value = self.ivar_get(&recv, *name);
                    self.set_reg(base, *a, value)?;
                }
                Op::SetIvar(name, a) => {
                    let recv = self.reg(base, 0)?.clone();
                    let value = self.reg(base, *a)?.clone();
                    self.ivar_set(&recv, *name, value)?;
                }
                Op::GetConst(a, name) => {
                    let value = self.constants.get(name).cloned().ok_or_else(|| {
                        RuntimeError::UninitializedConstant {
                            name: self.symbol_name(*name).to_string(),
                        }
                    })?;
                    self.set_reg(base, *a, value)?;
                }

                // ===== Arithmetic and comparison =====
                Op::Add(a, b, c) => {
                    let value = binary_op(BinOp::Add, self.reg(base, *b)?, self.reg(base, *c)?)?;
                    self.set_reg(base, *a, value)?;
                }
                Op::Sub(a, b, c) => {
                    let value = binary_op(BinOp::Sub, self.reg(base, *b)?, self.reg(base, *c)?)?;
                    self.set_reg(base, *a, value)?;
                }
                Op::Lt(a, b, c) => {
                    let value = binary_op(BinOp::Lt, self.reg(base, *b)?, self.reg(base, *c)?)?;
                    self.set_reg(base, *a, value)?;
                }

                // ===== Control flow =====
                Op::Jump(target) => pc = *target,
                Op::JumpIfNot(a, target) => {
                    if !self.reg(base, *a)?.is_truthy() {
                        pc = *target;
                    }
                }

                // ===== Calls =====
                Op::Send {
                    dst,
                    recv,
                    method,
                    argc,
                } => {
                    let receiver = self.reg(base, *recv)?.clone();
                    let args = (1..=*argc)
                        .map(|i| self.reg(base, recv.saturating_add(i)).cloned())
                        .collect::<Result<Vec<_>, _>>()?;
                    let value = self.call_method(&receiver, *method, &args)?;
                    self.set_reg(base, *dst, value)?;
                }
                Op::Array(a, start, len) => {
                    let items = (0..*len)
                        .map(|i| self.reg(base, start.saturating_add(i)).cloned())
                        .collect::<Result<Vec<_>, _>>()?;
                    self.set_reg(base, *a, Value::array(items))?;
                }
                Op::Return(a) => return Ok(self.reg(base, *a)?.clone()),
                Op::Raise(a) => {
                    let value = self.reg(base, *a)?.clone();
                    return Err(self.exception_from(&value));
                }
            }
        }
    }

    fn reg(&self, base: usize, reg: Reg) -> Result<&Value, RuntimeError> {
        self.stack
            .get(base + reg as usize)
            .ok_or(RuntimeError::InvalidRegister { reg })
    }

    fn set_reg(&mut self, base: usize, reg: Reg, value: Value) -> Result<(), RuntimeError> {
        let slot = self
            .stack
            .get_mut(base + reg as usize)
            .ok_or(RuntimeError::InvalidRegister { reg })?;
        *slot = value;
        Ok(())
    }

    fn ivar_get(&self, recv: &Value, name: Symbol) -> Value {
        let value = match recv {
            Value::Object(obj) => obj.borrow().ivars.get(name).cloned(),
            Value::Class(cls) => cls.ivars.borrow().get(name).cloned(),
            _ => None,
        };
        value.unwrap_or(Value::Nil)
    }

    fn ivar_set(&self, recv: &Value, name: Symbol, value: Value) -> Result<(), RuntimeError> {
        match recv {
            Value::Object(obj) => {
                obj.borrow_mut().ivars.insert(name, value);
            }
            Value::Class(cls) => {
                cls.ivars.borrow_mut().insert(name, value);
            }
            other => {
                return Err(RuntimeError::TypeError {
                    msg: format!(
                        "can't modify instance variables of {}",
                        other.class_name()
                    ),
                })
            }
        }
        Ok(())
    }

    fn exception_from(&self, value: &Value) -> RuntimeError {
        match value {
            Value::Str(message) => RuntimeError::Raised {
                class: "RuntimeError".to_string(),
                message: message.to_string(),
            },
            Value::Object(obj) => {
                let obj = obj.borrow();
                match &obj.body {
                    ObjectBody::Exception(message) => RuntimeError::Raised {
                        class: obj.class.name.to_string(),
                        message: message.clone(),
                    },
                    _ => RuntimeError::TypeError {
                        msg: "exception class/object expected".to_string(),
                    },
                }
            }
            Value::Class(cls) => RuntimeError::Raised {
                class: cls.name.to_string(),
                message: cls.name.to_string(),
            },
            _ => RuntimeError::TypeError {
                msg: "exception class/object expected".to_string(),
            },
        }
    }

    // ── Method lookup ───────────────────────────────────────────────────

    fn find_method(&self, recv: &Value, method: Symbol) -> Option<Proc> {
        match recv {
            Value::Class(cls) => cls.find_singleton_method(method),
            Value::Object(obj) => {
                let cls = obj.borrow().class.clone();
                cls.find_method(method)
            }
            _ => self.object_class.find_method(method),
        }
    }

    /// User-defined method on a heap receiver; immediates never consult
    /// user classes for conversions
    fn user_method(&self, recv: &Value, method: Symbol) -> Option<Proc> {
        match recv {
            Value::Object(_) | Value::Class(_) => self.find_method(recv, method),
            _ => None,
        }
    }

    fn builtin_method(
        &mut self,
        recv: &Value,
        method: Symbol,
        args: &[Value],
    ) -> Result<Value, RuntimeError> {
        let name = self.symbol_name(method).to_string();
        match (name.as_str(), recv) {
            ("inspect", _) if args.is_empty() => Ok(Value::string(self.builtin_inspect(recv)?)),
            ("to_s", _) if args.is_empty() => Ok(Value::string(self.builtin_to_s(recv)?)),
            ("new", Value::Class(cls)) if cls.kind == ClassKind::Class => {
                let obj = self.new_object(cls);
                let initialize = self.intern("initialize");
                if let Some(init) = cls.find_method(initialize) {
                    self.invoke(init, obj.clone(), args)?;
                }
                Ok(obj)
            }
            _ => Err(RuntimeError::NoMethod {
                method: name,
                receiver: recv.class_name(),
            }),
        }
    }

    // ── Conversions ─────────────────────────────────────────────────────

    /// `value.inspect`, honouring user overrides
    pub fn inspect(&mut self, value: &Value) -> Result<String, RuntimeError> {
        self.convert(value, "inspect")
    }

    /// `value.to_s`, honouring user overrides
    pub fn to_s(&mut self, value: &Value) -> Result<String, RuntimeError> {
        self.convert(value, "to_s")
    }

    /// Name of the value's class
    pub fn class_name(&self, value: &Value) -> String {
        value.class_name()
    }

    fn convert(&mut self, value: &Value, method: &str) -> Result<String, RuntimeError> {
        let sym = self.intern(method);
        if let Some(proc) = self.user_method(value, sym) {
            let result = self.invoke(proc, value.clone(), &[])?;
            return match result {
                Value::Str(s) => Ok(s.to_string()),
                other => self.builtin_to_s(&other),
            };
        }
        if method == "inspect" {
            self.builtin_inspect(value)
        } else {
            self.builtin_to_s(value)
        }
    }

    fn builtin_inspect(&mut self, value: &Value) -> Result<String, RuntimeError> {
        Ok(match value {
            Value::Nil => "nil".to_string(),
            Value::Str(s) => inspect_str(s),
            Value::Symbol(sym) => format!(":{}", self.symbol_name(*sym)),
            Value::Array(items) => {
                let items = items.borrow().clone();
                let parts = items
                    .iter()
                    .map(|item| self.inspect(item))
                    .collect::<Result<Vec<_>, _>>()?;
                format!("[{}]", parts.join(", "))
            }
            Value::Object(obj) => {
                let (class, body) = {
                    let obj = obj.borrow();
                    (obj.class.name.clone(), obj.body.clone())
                };
                match body {
                    ObjectBody::Hash(pairs) => {
                        let mut parts = Vec::with_capacity(pairs.len());
                        for (k, v) in &pairs {
                            parts.push(format!("{}=>{}", self.inspect(k)?, self.inspect(v)?));
                        }
                        format!("{{{}}}", parts.join(", "))
                    }
                    ObjectBody::Exception(message) => format!("#<{}: {}>", class, message),
                    ObjectBody::Plain | ObjectBody::Data(_) => format!("#<{}>", class),
                }
            }
            other => self.builtin_to_s(other)?,
        })
    }

    fn builtin_to_s(&mut self, value: &Value) -> Result<String, RuntimeError> {
        Ok(match value {
            Value::Nil => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Integer(n) => n.to_string(),
            Value::Float(n) => format_float(*n),
            Value::Symbol(sym) => self.symbol_name(*sym).to_string(),
            Value::Str(s) => s.to_string(),
            Value::Range(start, end) => format!("{}..{}", start, end),
            Value::Class(cls) => cls.name.to_string(),
            Value::Proc(_) => "#<Proc>".to_string(),
            Value::Object(obj) => {
                let message = match &obj.borrow().body {
                    ObjectBody::Exception(message) => Some(message.clone()),
                    _ => None,
                };
                match message {
                    Some(message) => message,
                    None => self.builtin_inspect(value)?,
                }
            }
            Value::Array(_) => self.builtin_inspect(value)?,
        })
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy)]
enum BinOp {
    Add,
    Sub,
    Lt,
}

fn binary_op(op: BinOp, lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    let type_error = || RuntimeError::TypeError {
        msg: format!(
            "{} can't be coerced into {}",
            rhs.class_name(),
            lhs.class_name()
        ),
    };
    match (op, lhs, rhs) {
        (BinOp::Add, Value::Integer(a), Value::Integer(b)) => {
            Ok(Value::Integer(a.checked_add(*b).ok_or_else(type_error)?))
        }
        (BinOp::Sub, Value::Integer(a), Value::Integer(b)) => {
            Ok(Value::Integer(a.checked_sub(*b).ok_or_else(type_error)?))
        }
        (BinOp::Lt, Value::Integer(a), Value::Integer(b)) => Ok(Value::Bool(a < b)),
        (BinOp::Add, Value::Str(a), Value::Str(b)) => Ok(Value::string(format!("{}{}", a, b))),
        (op, a, b) => match (as_float(a), as_float(b)) {
            (Some(x), Some(y)) => Ok(match op {
                BinOp::Add => Value::Float(x + y),
                BinOp::Sub => Value::Float(x - y),
                BinOp::Lt => Value::Bool(x < y),
            }),
            _ => Err(type_error()),
        },
    }
}

fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Integer(n) => Some(*n as f64),
        Value::Float(n) => Some(*n),
        _ => None,
    }
}
