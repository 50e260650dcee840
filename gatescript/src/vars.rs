//! Bounded named-variable store.
//!
//! A fixed number of slots, looked up by linear scan.  A name binds to the
//! first free slot on first write; there is no separate declaration.

use std::fmt;

use crate::script::value::Value;

/// Why a variable write was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarError {
    /// The name exceeds the configured length limit.
    NameTooLong(usize),
    /// Every slot is occupied by a different name.
    Exhausted,
}

impl fmt::Display for VarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VarError::NameTooLong(max) => write!(f, "variable name longer than {max} bytes"),
            VarError::Exhausted => write!(f, "no free variable slot"),
        }
    }
}

impl std::error::Error for VarError {}

#[derive(Debug)]
struct Slot {
    name: String,
    value: Value,
}

/// Fixed-capacity variable table.
#[derive(Debug)]
pub struct VarStore {
    slots: Vec<Option<Slot>>,
    name_max: usize,
}

impl VarStore {
    pub fn new(capacity: usize, name_max: usize) -> VarStore {
        VarStore {
            slots: (0..capacity).map(|_| None).collect(),
            name_max,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.slots
            .iter()
            .flatten()
            .find(|s| s.name == name)
            .map(|s| &s.value)
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Write `value` to `name`, binding the first free slot on first use.
    pub fn set(&mut self, name: &str, value: Value) -> Result<(), VarError> {
        if name.len() > self.name_max {
            return Err(VarError::NameTooLong(self.name_max));
        }
        if let Some(slot) = self.slots.iter_mut().flatten().find(|s| s.name == name) {
            slot.value = value;
            return Ok(());
        }
        match self.slots.iter_mut().find(|s| s.is_none()) {
            Some(free) => {
                *free = Some(Slot { name: name.to_owned(), value });
                Ok(())
            }
            None => Err(VarError::Exhausted),
        }
    }

    /// Ensure `name` is bound, without overwriting an existing value.  Used
    /// by the syntax-check pass so slot exhaustion rejects the script at
    /// load time.
    pub fn bind(&mut self, name: &str) -> Result<(), VarError> {
        if self.is_bound(name) {
            return Ok(());
        }
        self.set(name, Value::default())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
