//! Runtime values
//!
//! Immediate values (nil, booleans, integers, floats, symbols) are stored
//! inline. Everything else is reference counted; the VM is single-threaded so
//! `Rc<RefCell<_>>` is used for mutable heap objects.

use crate::bytecode::Proc;
use crate::symbol::Symbol;
use crate::var_table::VarTable;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

/// Shared heap object
pub type ObjRef = Rc<RefCell<RObject>>;

/// Shared class or module
pub type ClassRef = Rc<RClass>;

/// Runtime value
#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Symbol(Symbol),
    Str(Rc<str>),
    Array(Rc<RefCell<Vec<Value>>>),
    Range(i64, i64),
    /// Plain objects, hashes, foreign data and exceptions
    Object(ObjRef),
    /// Classes, modules and singleton classes
    Class(ClassRef),
    Proc(Proc),
}

/// Runtime kind of a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Nil,
    False,
    True,
    Integer,
    Float,
    Symbol,
    String,
    Array,
    Range,
    Hash,
    Object,
    Class,
    Module,
    SClass,
    Data,
    Exception,
    Proc,
}

impl ValueKind {
    /// Kinds that carry an instance-variable table
    pub fn has_ivar_table(self) -> bool {
        matches!(
            self,
            ValueKind::Object
                | ValueKind::Class
                | ValueKind::Module
                | ValueKind::SClass
                | ValueKind::Hash
                | ValueKind::Data
                | ValueKind::Exception
        )
    }

    /// Kinds whose text is produced by the built-in `inspect`
    pub fn is_scalar(self) -> bool {
        matches!(
            self,
            ValueKind::Nil
                | ValueKind::False
                | ValueKind::True
                | ValueKind::String
                | ValueKind::Integer
        )
    }
}

/// Heap object body
#[derive(Debug, Clone)]
pub enum ObjectBody {
    Plain,
    Hash(Vec<(Value, Value)>),
    /// Foreign data wrapped for the script, identified by a type name
    Data(Rc<str>),
    Exception(String),
}

/// Heap object
#[derive(Debug, Clone)]
pub struct RObject {
    pub class: ClassRef,
    pub ivars: VarTable,
    pub body: ObjectBody,
}

impl RObject {
    pub fn new(class: ClassRef, body: ObjectBody) -> Self {
        Self {
            class,
            ivars: VarTable::new(),
            body,
        }
    }
}

/// Class flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    Class,
    Module,
    Singleton,
}

/// Class or module
pub struct RClass {
    pub name: Rc<str>,
    pub kind: ClassKind,
    pub superclass: Option<ClassRef>,
    /// Instance methods
    pub methods: RefCell<HashMap<Symbol, Proc>>,
    /// Class methods and module functions
    pub singleton_methods: RefCell<HashMap<Symbol, Proc>>,
    /// Class-level instance variables
    pub ivars: RefCell<VarTable>,
}

impl RClass {
    pub fn new(name: &str, kind: ClassKind, superclass: Option<ClassRef>) -> Self {
        Self {
            name: name.into(),
            kind,
            superclass,
            methods: RefCell::new(HashMap::new()),
            singleton_methods: RefCell::new(HashMap::new()),
            ivars: RefCell::new(VarTable::new()),
        }
    }

    /// Find an instance method, walking the superclass chain
    pub fn find_method(&self, name: Symbol) -> Option<Proc> {
        if let Some(p) = self.methods.borrow().get(&name) {
            return Some(p.clone());
        }
        self.superclass.as_ref().and_then(|s| s.find_method(name))
    }

    /// Find a class method, walking the superclass chain
    pub fn find_singleton_method(&self, name: Symbol) -> Option<Proc> {
        if let Some(p) = self.singleton_methods.borrow().get(&name) {
            return Some(p.clone());
        }
        self.superclass
            .as_ref()
            .and_then(|s| s.find_singleton_method(name))
    }
}

impl fmt::Debug for RClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RClass({}, {:?})", self.name, self.kind)
    }
}

impl Value {
    /// Create a string value
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::Str(Rc::from(s.as_ref()))
    }

    /// Create an array value
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    /// Wrap a heap object
    pub fn object(obj: RObject) -> Self {
        Value::Object(Rc::new(RefCell::new(obj)))
    }

    /// Runtime kind
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Nil => ValueKind::Nil,
            Value::Bool(false) => ValueKind::False,
            Value::Bool(true) => ValueKind::True,
            Value::Integer(_) => ValueKind::Integer,
            Value::Float(_) => ValueKind::Float,
            Value::Symbol(_) => ValueKind::Symbol,
            Value::Str(_) => ValueKind::String,
            Value::Array(_) => ValueKind::Array,
            Value::Range(..) => ValueKind::Range,
            Value::Object(obj) => match obj.borrow().body {
                ObjectBody::Plain => ValueKind::Object,
                ObjectBody::Hash(_) => ValueKind::Hash,
                ObjectBody::Data(_) => ValueKind::Data,
                ObjectBody::Exception(_) => ValueKind::Exception,
            },
            Value::Class(cls) => match cls.kind {
                ClassKind::Class => ValueKind::Class,
                ClassKind::Module => ValueKind::Module,
                ClassKind::Singleton => ValueKind::SClass,
            },
            Value::Proc(_) => ValueKind::Proc,
        }
    }

    /// Ruby-style truthiness: only `nil` and `false` are falsy
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    /// Name of the value's class
    pub fn class_name(&self) -> String {
        match self {
            Value::Nil => "NilClass".to_string(),
            Value::Bool(false) => "FalseClass".to_string(),
            Value::Bool(true) => "TrueClass".to_string(),
            Value::Integer(_) => "Integer".to_string(),
            Value::Float(_) => "Float".to_string(),
            Value::Symbol(_) => "Symbol".to_string(),
            Value::Str(_) => "String".to_string(),
            Value::Array(_) => "Array".to_string(),
            Value::Range(..) => "Range".to_string(),
            Value::Object(obj) => obj.borrow().class.name.to_string(),
            Value::Class(cls) => match cls.kind {
                ClassKind::Module => "Module".to_string(),
                ClassKind::Class | ClassKind::Singleton => "Class".to_string(),
            },
            Value::Proc(_) => "Proc".to_string(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Integer(a), Value::Float(b)) | (Value::Float(b), Value::Integer(a)) => {
                (*a as f64) == *b
            }
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Range(a0, a1), Value::Range(b0, b1)) => a0 == b0 && a1 == b1,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Proc(a), Value::Proc(b)) => a.same(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "Nil"),
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::Integer(n) => write!(f, "Integer({})", n),
            Value::Float(n) => write!(f, "Float({})", n),
            Value::Symbol(s) => write!(f, "Symbol({})", s),
            Value::Str(s) => write!(f, "Str({:?})", s.as_ref()),
            Value::Array(items) => write!(f, "Array({:?})", items.borrow()),
            Value::Range(a, b) => write!(f, "Range({}..{})", a, b),
            Value::Object(obj) => write!(f, "Object({})", obj.borrow().class.name),
            Value::Class(cls) => write!(f, "Class({})", cls.name),
            Value::Proc(p) => write!(f, "{:?}", p),
        }
    }
}

/// Quote a string the way the scripting language's `String#inspect` does
pub fn inspect_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\u{1b}' => out.push_str("\\e"),
            '\0' => out.push_str("\\0"),
            c if c.is_control() => out.push_str(&format!("\\x{:02X}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Format a float the way the scripting language prints it (`1.0`, `2.5`)
pub fn format_float(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e16 {
        format!("{:.1}", n)
    } else {
        format!("{}", n)
    }
}

/// Runtime error raised while executing script code
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RuntimeError {
    /// Exception raised by script code
    #[error("{message} ({class})")]
    Raised { class: String, message: String },
    /// Wrong number or type of arguments
    #[error("wrong argument: {msg} (ArgumentError)")]
    ArgumentError { msg: String },
    /// Method lookup failed
    #[error("undefined method '{method}' for {receiver} (NoMethodError)")]
    NoMethod { method: String, receiver: String },
    /// Constant lookup failed
    #[error("uninitialized constant {name} (NameError)")]
    UninitializedConstant { name: String },
    /// Operand type mismatch
    #[error("{msg} (TypeError)")]
    TypeError { msg: String },
    /// Call depth limit exceeded
    #[error("stack level too deep (SystemStackError)")]
    StackOverflow,
    /// Register operand outside the frame's window
    #[error("register r{reg} out of range")]
    InvalidRegister { reg: u16 },
}

impl RuntimeError {
    /// Class name of the exception as seen by script code
    pub fn class_name(&self) -> &str {
        match self {
            RuntimeError::Raised { class, .. } => class,
            RuntimeError::ArgumentError { .. } => "ArgumentError",
            RuntimeError::NoMethod { .. } => "NoMethodError",
            RuntimeError::UninitializedConstant { .. } => "NameError",
            RuntimeError::TypeError { .. } => "TypeError",
            RuntimeError::StackOverflow => "SystemStackError",
            RuntimeError::InvalidRegister { .. } => "ScriptError",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object_class() -> ClassRef {
        Rc::new(RClass::new("Object", ClassKind::Class, None))
    }

    #[test]
    fn test_scalar_kinds() {
        assert_eq!(Value::Nil.kind(), ValueKind::Nil);
        assert_eq!(Value::Bool(true).kind(), ValueKind::True);
        assert_eq!(Value::Bool(false).kind(), ValueKind::False);
        assert_eq!(Value::Integer(3).kind(), ValueKind::Integer);
        assert_eq!(Value::string("x").kind(), ValueKind::String);
    }

    #[test]
    fn test_object_kinds_follow_body() {
        let cls = object_class();
        let hash = Value::object(RObject::new(cls.clone(), ObjectBody::Hash(Vec::new())));
        let data = Value::object(RObject::new(cls.clone(), ObjectBody::Data("Socket".into())));
        let exc = Value::object(RObject::new(cls, ObjectBody::Exception("boom".into())));
        assert_eq!(hash.kind(), ValueKind::Hash);
        assert_eq!(data.kind(), ValueKind::Data);
        assert_eq!(exc.kind(), ValueKind::Exception);
    }

    #[test]
    fn test_ivar_allow_list() {
        assert!(ValueKind::Object.has_ivar_table());
        assert!(ValueKind::SClass.has_ivar_table());
        assert!(ValueKind::Exception.has_ivar_table());
        assert!(!ValueKind::Integer.has_ivar_table());
        assert!(!ValueKind::Symbol.has_ivar_table());
        assert!(!ValueKind::Array.has_ivar_table());
        assert!(!ValueKind::Proc.has_ivar_table());
    }

    #[test]
    fn test_class_names() {
        assert_eq!(Value::Nil.class_name(), "NilClass");
        assert_eq!(Value::Float(1.5).class_name(), "Float");
        let module = Value::Class(Rc::new(RClass::new("Debug", ClassKind::Module, None)));
        assert_eq!(module.class_name(), "Module");
    }

    #[test]
    fn test_inspect_str_escapes() {
        assert_eq!(inspect_str("plain"), "\"plain\"");
        assert_eq!(inspect_str("a\"b"), "\"a\\\"b\"");
        assert_eq!(inspect_str("line\n"), "\"line\\n\"");
        assert_eq!(inspect_str("back\\slash"), "\"back\\\\slash\"");
        assert_eq!(inspect_str("\u{1}"), "\"\\x01\"");
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_float(2.5), "2.5");
        assert_eq!(format_float(f64::INFINITY), "Infinity");
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Integer(0).is_truthy());
    }
}
