//! Named-value table for globals and instance variables
//!
//! Open addressing with linear probing. Each slot is explicitly `Empty`,
//! `Live` or `Tombstone`; removing an entry leaves a tombstone so probe
//! chains that ran through it stay intact. Only `Live` slots are ever
//! reported by [`VarTable::iter`].

use crate::symbol::Symbol;
use crate::value::Value;

const MIN_CAPACITY: usize = 8;

#[derive(Debug, Clone)]
enum Slot {
    Empty,
    Live(Symbol, Value),
    Tombstone,
}

/// Open-addressed `Symbol -> Value` map
#[derive(Debug, Clone, Default)]
pub struct VarTable {
    slots: Vec<Slot>,
    live: usize,
    tombstones: usize,
}

impl VarTable {
    /// Create a table with no allocation
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.live
    }

    /// Returns true if there are no live entries
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Number of allocated slots (live, deleted and empty)
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of deleted slots still occupying the table
    pub fn tombstones(&self) -> usize {
        self.tombstones
    }

    /// Look up a live entry
    pub fn get(&self, key: Symbol) -> Option<&Value> {
        let idx = self.find(key)?;
        match &self.slots[idx] {
            Slot::Live(_, value) => Some(value),
            _ => None,
        }
    }

    /// Returns true if `key` has a live entry
    pub fn contains(&self, key: Symbol) -> bool {
        self.find(key).is_some()
    }

    /// Insert or replace an entry, returning the previous value
    pub fn insert(&mut self, key: Symbol, value: Value) -> Option<Value> {
        if let Some(idx) = self.find(key) {
            if let Slot::Live(_, old) = &mut self.slots[idx] {
                return Some(std::mem::replace(old, value));
            }
        }

        if (self.live + self.tombstones + 1) * 4 > self.slots.len() * 3 {
            self.grow();
        }

        let mask = self.slots.len() - 1;
        let mut idx = hash(key) & mask;
        loop {
            match self.slots[idx] {
                Slot::Empty => break,
                Slot::Tombstone => {
                    self.tombstones -= 1;
                    break;
                }
                Slot::Live(..) => idx = (idx + 1) & mask,
            }
        }
        self.slots[idx] = Slot::Live(key, value);
        self.live += 1;
        None
    }

    /// Remove an entry, leaving a tombstone
    pub fn remove(&mut self, key: Symbol) -> Option<Value> {
        let idx = self.find(key)?;
        match std::mem::replace(&mut self.slots[idx], Slot::Tombstone) {
            Slot::Live(_, value) => {
                self.live -= 1;
                self.tombstones += 1;
                Some(value)
            }
            other => {
                self.slots[idx] = other;
                None
            }
        }
    }

    /// Iterate over live entries in slot order
    pub fn iter(&self) -> impl Iterator<Item = (Symbol, &Value)> + '_ {
        self.slots.iter().filter_map(|slot| match slot {
            Slot::Live(key, value) => Some((*key, value)),
            _ => None,
        })
    }

    /// Slot index of a live entry
    fn find(&self, key: Symbol) -> Option<usize> {
        if self.slots.is_empty() {
            return None;
        }
        let mask = self.slots.len() - 1;
        let mut idx = hash(key) & mask;
        for _ in 0..self.slots.len() {
            match &self.slots[idx] {
                Slot::Empty => return None,
                Slot::Live(k, _) if *k == key => return Some(idx),
                _ => idx = (idx + 1) & mask,
            }
        }
        None
    }

    /// Rehash into a larger allocation, dropping tombstones
    fn grow(&mut self) {
        let wanted = ((self.live + 1) * 2).max(MIN_CAPACITY).next_power_of_two();
        let capacity = wanted.max(self.slots.len());
        let old = std::mem::replace(&mut self.slots, vec![Slot::Empty; capacity]);
        self.tombstones = 0;
        let mask = capacity - 1;
        for slot in old {
            if let Slot::Live(key, value) = slot {
                let mut idx = hash(key) & mask;
                while matches!(self.slots[idx], Slot::Live(..)) {
                    idx = (idx + 1) & mask;
                }
                self.slots[idx] = Slot::Live(key, value);
            }
        }
    }
}

fn hash(key: Symbol) -> usize {
    (key.id().wrapping_mul(0x9E37_79B1) >> 7) as usize
}
