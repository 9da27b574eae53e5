// Copyright 2026 the Render Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Content-addressed constant pool.
//!
//! Bytecode operands refer to strings, numbers, arrays and opaque values by pool index.
//! Requesting the same content twice returns the same index, and indices stay stable for the
//! lifetime of the owning [`Program`](crate::heap::Program).

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::fmt;

use hashbrown::HashMap;

use crate::component::{ComponentDefinition, Helper};
use crate::heap::{CompiledBlock, CompiledLayout};
use crate::value::Value;

/// A numeric constant.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Number {
    /// An integer that does not fit an immediate primitive.
    Int(i64),
    /// A floating point number.
    Float(f64),
}

impl Number {
    fn key(self) -> (u8, u64) {
        match self {
            Self::Int(i) => (0, i as u64),
            Self::Float(x) => (1, x.to_bits()),
        }
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        match n {
            Number::Int(i) => Self::Int(i),
            Number::Float(x) => Self::Float(x),
        }
    }
}

/// A non-serializable constant: compiled blocks, layouts, definitions and helpers.
///
/// These are interned by identity rather than content.
#[derive(Clone)]
pub enum OtherConst {
    /// A compiled block with its parameter symbols.
    Block(Rc<CompiledBlock>),
    /// A compiled component layout.
    Layout(Rc<CompiledLayout>),
    /// A resolved component definition.
    Component(Rc<ComponentDefinition>),
    /// A resolved helper.
    Helper {
        /// Name the helper was resolved under.
        name: Box<str>,
        /// The helper itself.
        helper: Rc<dyn Helper>,
    },
}

impl OtherConst {
    fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Block(a), Self::Block(b)) => Rc::ptr_eq(a, b),
            (Self::Layout(a), Self::Layout(b)) => Rc::ptr_eq(a, b),
            (Self::Component(a), Self::Component(b)) => Rc::ptr_eq(a, b),
            (Self::Helper { helper: a, .. }, Self::Helper { helper: b, .. }) => {
                core::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
            }
            _ => false,
        }
    }
}

impl fmt::Debug for OtherConst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Block(b) => write!(f, "block@{}", b.handle.0),
            Self::Layout(l) => write!(f, "layout@{}", l.handle.0),
            Self::Component(d) => write!(f, "component {}", d.name()),
            Self::Helper { name, .. } => write!(f, "helper {name}"),
        }
    }
}

/// The constant pool.
#[derive(Default)]
pub struct Constants {
    strings: Vec<Rc<str>>,
    string_ids: HashMap<Rc<str>, u32>,
    numbers: Vec<Number>,
    number_ids: HashMap<(u8, u64), u32>,
    arrays: Vec<Rc<[u32]>>,
    array_ids: HashMap<Rc<[u32]>, u32>,
    serializables: Vec<Value>,
    others: Vec<OtherConst>,
}

fn next_id(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

impl Constants {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns a string.
    pub fn string(&mut self, s: &str) -> u32 {
        if let Some(&id) = self.string_ids.get(s) {
            return id;
        }
        let id = next_id(self.strings.len());
        let s: Rc<str> = Rc::from(s);
        self.strings.push(s.clone());
        self.string_ids.insert(s, id);
        id
    }

    /// Interns a number. Floats are compared bitwise.
    pub fn number(&mut self, n: Number) -> u32 {
        let key = n.key();
        if let Some(&id) = self.number_ids.get(&key) {
            return id;
        }
        let id = next_id(self.numbers.len());
        self.numbers.push(n);
        self.number_ids.insert(key, id);
        id
    }

    /// Interns an array of `u32` (typically string or symbol indices).
    pub fn array(&mut self, items: &[u32]) -> u32 {
        if let Some(&id) = self.array_ids.get(items) {
            return id;
        }
        let id = next_id(self.arrays.len());
        let items: Rc<[u32]> = Rc::from(items);
        self.arrays.push(items.clone());
        self.array_ids.insert(items, id);
        id
    }

    /// Interns a list of strings, returning the index of the array of their string indices.
    pub fn string_array<S: AsRef<str>>(&mut self, items: &[S]) -> u32 {
        let ids: Vec<u32> = items.iter().map(|s| self.string(s.as_ref())).collect();
        self.array(&ids)
    }

    /// Interns an opaque serializable value (lists and records), compared structurally.
    pub fn serializable(&mut self, value: Value) -> u32 {
        if let Some(i) = self.serializables.iter().position(|v| *v == value) {
            return next_id(i);
        }
        self.serializables.push(value);
        next_id(self.serializables.len() - 1)
    }

    /// Interns a non-serializable constant by identity.
    pub fn other(&mut self, value: OtherConst) -> u32 {
        if let Some(i) = self.others.iter().position(|v| v.same(&value)) {
            return next_id(i);
        }
        self.others.push(value);
        next_id(self.others.len() - 1)
    }

    /// Looks up an interned string.
    #[must_use]
    pub fn get_string(&self, id: u32) -> Option<&Rc<str>> {
        self.strings.get(id as usize)
    }

    /// Looks up an interned number.
    #[must_use]
    pub fn get_number(&self, id: u32) -> Option<Number> {
        self.numbers.get(id as usize).copied()
    }

    /// Looks up an interned array.
    #[must_use]
    pub fn get_array(&self, id: u32) -> Option<&[u32]> {
        self.arrays.get(id as usize).map(|a| &**a)
    }

    /// Looks up an interned serializable value.
    #[must_use]
    pub fn get_serializable(&self, id: u32) -> Option<&Value> {
        self.serializables.get(id as usize)
    }

    /// Looks up an interned non-serializable constant.
    #[must_use]
    pub fn get_other(&self, id: u32) -> Option<&OtherConst> {
        self.others.get(id as usize)
    }

    /// Resolves an array of string indices.
    #[must_use]
    pub fn get_string_array(&self, id: u32) -> Option<Vec<Rc<str>>> {
        self.get_array(id)?
            .iter()
            .map(|&s| self.get_string(s).cloned())
            .collect()
    }
}

impl fmt::Debug for Constants {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constants")
            .field("strings", &self.strings)
            .field("numbers", &self.numbers)
            .field("arrays", &self.arrays)
            .field("serializables", &self.serializables)
            .field("others", &self.others)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_are_deduplicated() {
        let mut c = Constants::new();
        let a = c.string("hello");
        let b = c.string("world");
        assert_ne!(a, b);
        assert_eq!(c.string("hello"), a);
        assert_eq!(c.get_string(b).map(|s| &**s), Some("world"));
    }

    #[test]
    fn arrays_are_deduplicated_by_content() {
        let mut c = Constants::new();
        let a = c.array(&[1, 2, 3]);
        assert_eq!(c.array(&[1, 2, 3]), a);
        assert_ne!(c.array(&[3, 2, 1]), a);
        let names = c.string_array(&["x", "y"]);
        assert_eq!(c.string_array(&["x", "y"]), names);
        let resolved = c.get_string_array(names).unwrap();
        assert_eq!(resolved.iter().map(|s| &**s).collect::<Vec<_>>(), ["x", "y"]);
    }

    #[test]
    fn numbers_distinguish_ints_and_floats() {
        let mut c = Constants::new();
        let i = c.number(Number::Int(1 << 40));
        let f = c.number(Number::Float(1.5));
        assert_ne!(i, f);
        assert_eq!(c.number(Number::Float(1.5)), f);
        assert_eq!(c.number(Number::Int(1 << 40)), i);
        assert_eq!(c.get_number(f), Some(Number::Float(1.5)));
    }

    #[test]
    fn serializables_compare_structurally() {
        let mut c = Constants::new();
        let a = c.serializable(Value::list([Value::Int(1)]));
        assert_eq!(c.serializable(Value::list([Value::Int(1)])), a);
        assert_ne!(c.serializable(Value::list([Value::Int(2)])), a);
    }
}
