// Copyright 2026 the Render Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Keyed iteration.
//!
//! `{{#each}}` walks the items of a list (or the entries of an object) and derives a key per item.
//! Keys decide whether an item's output is kept across rerenders. Supported key policies:
//!
//! - `@index`: the item's position.
//! - `@primitive`: the item's own value, which must be a primitive.
//! - `@identity` (default): the item's value for primitives, its allocation for lists and records.
//! - any other string: a dotted property path read from the item.
//!
//! Repeated keys are made unique by counting occurrences.

use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;

use hashbrown::HashMap;

use crate::reference::{ExprError, Ref, Reference, property_of};
use crate::tag::Tag;
use crate::value::Value;

/// The key policy used when `{{#each}}` names none.
pub const DEFAULT_KEY: &str = "@identity";

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum KeyBase {
    Index(usize),
    Primitive(String),
    Identity(usize),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct ItemKey {
    base: KeyBase,
    occurrence: u32,
}

#[derive(Clone, Debug)]
pub(crate) struct Item {
    pub(crate) key: ItemKey,
    pub(crate) value: Value,
    pub(crate) memo: Value,
}

fn primitive_key(value: &Value) -> KeyBase {
    KeyBase::Primitive(alloc::format!("{}:{}", value.type_name(), value))
}

fn identity_key(value: &Value) -> KeyBase {
    match value {
        Value::List(items) => KeyBase::Identity(Rc::as_ptr(items).cast::<Value>() as usize),
        Value::Object(map) => KeyBase::Identity(Rc::as_ptr(map) as usize),
        Value::Component(def) => KeyBase::Identity(Rc::as_ptr(def) as usize),
        other => primitive_key(other),
    }
}

fn key_for(policy: &str, index: usize, value: &Value) -> KeyBase {
    match policy {
        "@index" => KeyBase::Index(index),
        "@primitive" => primitive_key(value),
        "@identity" => identity_key(value),
        path => {
            let mut v = value.clone();
            for segment in path.split('.') {
                v = v.get(segment);
            }
            identity_key(&v)
        }
    }
}

/// Returns `true` if `iterable` has at least one item.
pub(crate) fn has_items(iterable: &Value) -> bool {
    match iterable {
        Value::List(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        _ => false,
    }
}

/// The keyed items of `iterable`. Lists memoize their index, records their entry key.
pub(crate) fn items(iterable: &Value, policy: &str) -> Vec<Item> {
    let raw: Vec<(Value, Value)> = match iterable {
        Value::List(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (v.clone(), Value::Int(i64::try_from(i).unwrap_or(i64::MAX))))
            .collect(),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| (v.clone(), Value::str(k)))
            .collect(),
        _ => Vec::new(),
    };
    let mut seen: HashMap<KeyBase, u32> = HashMap::new();
    raw.into_iter()
        .enumerate()
        .map(|(i, (value, memo))| {
            let base = key_for(policy, i, &value);
            let count = seen.entry(base.clone()).or_insert(0);
            let key = ItemKey {
                base,
                occurrence: *count,
            };
            *count += 1;
            Item { key, value, memo }
        })
        .collect()
}

/// How the new item order relates to the old one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct KeyDiff {
    /// Old positions whose key disappeared, ascending.
    pub(crate) removed: Vec<usize>,
    /// For each new item, the old position carrying the same key.
    pub(crate) sources: Vec<Option<usize>>,
}

pub(crate) fn diff_keys(old: &[ItemKey], new: &[ItemKey]) -> KeyDiff {
    let by_key: HashMap<&ItemKey, usize> = old.iter().enumerate().map(|(i, k)| (k, i)).collect();
    let sources: Vec<Option<usize>> = new.iter().map(|k| by_key.get(k).copied()).collect();
    let mut kept = alloc::vec![false; old.len()];
    for &s in sources.iter().flatten() {
        kept[s] = true;
    }
    let removed = kept
        .iter()
        .enumerate()
        .filter(|(_, k)| !**k)
        .map(|(i, _)| i)
        .collect();
    KeyDiff { removed, sources }
}

/// Whether a list reference currently has items; drives the `{{else}}` branch of `{{#each}}`.
#[derive(Debug)]
pub(crate) struct IterablePresenceReference {
    iterable: Ref,
}

impl IterablePresenceReference {
    pub(crate) fn new(iterable: Ref) -> Ref {
        Rc::new(Self { iterable })
    }
}

impl Reference for IterablePresenceReference {
    fn value(&self) -> Result<Value, ExprError> {
        Ok(Value::Bool(has_items(&self.iterable.value()?)))
    }

    fn tag(&self) -> Tag {
        self.iterable.tag()
    }

    fn property(self: Rc<Self>, key: &str) -> Ref {
        property_of(self, key)
    }
}
