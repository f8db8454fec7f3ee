//! Interned identifiers
//!
//! Every variable, method and constant name is interned once and referred to
//! by a [`Symbol`] afterwards. Symbol ids start at 1; zero is never handed
//! out, so a zero key can never be mistaken for a live table entry.

use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroU32;

/// Interned name handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(NonZeroU32);

impl Symbol {
    /// Raw id (always non-zero)
    pub fn id(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Symbol interner
#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    /// Names indexed by `id - 1`
    names: Vec<Box<str>>,
    /// Reverse lookup
    index: HashMap<Box<str>, Symbol>,
}

impl SymbolTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `name`, returning the existing symbol if already known
    pub fn intern(&mut self, name: &str) -> Symbol {
        if let Some(&sym) = self.index.get(name) {
            return sym;
        }
        let offset = u32::try_from(self.names.len()).unwrap_or(u32::MAX);
        let sym = Symbol(NonZeroU32::MIN.saturating_add(offset));
        self.names.push(name.into());
        self.index.insert(name.into(), sym);
        sym
    }

    /// Look up an already interned name without interning it
    pub fn lookup(&self, name: &str) -> Option<Symbol> {
        self.index.get(name).copied()
    }

    /// Name of an interned symbol
    pub fn name(&self, sym: Symbol) -> Option<&str> {
        self.names.get(sym.id() as usize - 1).map(|s| s.as_ref())
    }

    /// Number of interned symbols
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns true if nothing has been interned
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
