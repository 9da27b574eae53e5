// Copyright 2026 the Render Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! References: readable values paired with revision tags.
//!
//! A [`RootReference`] wraps mutable model data and memoizes one [`PathReference`] per property
//! name, so the same path always yields the same reference (and therefore the same tag) for as
//! long as the root is alive. Replacing the root's value never clears that cache.
//!
//! Parents own their cached children; children point back at their parent weakly.

use alloc::boxed::Box;
use alloc::rc::{Rc, Weak};
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;

use hashbrown::HashMap;

use crate::component::{CapturedArgs, Helper};
use crate::tag::{DirtyableTag, Tag};
use crate::value::Value;

/// A failure raised while evaluating user code (helpers, component hooks, resolution).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExprError {
    message: Box<str>,
}

impl ExprError {
    /// Creates an error with a message.
    #[must_use]
    pub fn new(message: impl Into<Box<str>>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ExprError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl core::error::Error for ExprError {}

/// A shared, dynamically typed reference.
pub type Ref = Rc<dyn Reference>;

/// A readable node that exposes a revision tag.
pub trait Reference: fmt::Debug {
    /// Reads the current value.
    fn value(&self) -> Result<Value, ExprError>;

    /// The tag covering every input of [`Reference::value`].
    fn tag(&self) -> Tag;

    /// Returns the child reference for `key`.
    fn property(self: Rc<Self>, key: &str) -> Ref;
}

/// Builds an unmemoized child reference over `parent`.
#[must_use]
pub fn property_of(parent: Ref, key: &str) -> Ref {
    Rc::new(PropertyReference {
        parent,
        key: key.into(),
    })
}

/// A reference whose value never changes.
#[derive(Debug)]
pub struct ConstReference {
    value: Value,
}

impl ConstReference {
    /// Wraps a value.
    #[must_use]
    pub fn new(value: Value) -> Ref {
        Rc::new(Self { value })
    }
}

impl Reference for ConstReference {
    fn value(&self) -> Result<Value, ExprError> {
        Ok(self.value.clone())
    }

    fn tag(&self) -> Tag {
        Tag::Constant
    }

    fn property(self: Rc<Self>, key: &str) -> Ref {
        ConstReference::new(self.value.get(key))
    }
}

/// A mutable root over external model data.
pub struct RootReference {
    inner: RefCell<Value>,
    tag: Rc<DirtyableTag>,
    chains: RefCell<HashMap<Box<str>, Rc<PathReference>>>,
    this: Weak<RootReference>,
}

impl fmt::Debug for RootReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootReference")
            .field("value", &self.inner.borrow())
            .finish_non_exhaustive()
    }
}

impl RootReference {
    /// Creates a root over `value`.
    #[must_use]
    pub fn new(value: Value) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            inner: RefCell::new(value),
            tag: DirtyableTag::new(),
            chains: RefCell::new(HashMap::new()),
            this: this.clone(),
        })
    }

    /// Returns the memoized reference for property `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Rc<PathReference> {
        let parent: Weak<dyn Reference> = self.this.clone();
        memoized(&self.chains, parent, key)
    }

    /// Returns the memoized reference for a dotted path such as `a.b.c`.
    #[must_use]
    pub fn path(&self, path: &str) -> Ref {
        let mut segments = path.split('.');
        let Some(first) = segments.next() else {
            return self.as_ref();
        };
        let mut current = self.get(first);
        for segment in segments {
            current = current.get(segment);
        }
        current
    }

    /// Replaces the underlying value, dirtying the tag if it changed.
    ///
    /// Cached path references are kept; only the values they report change.
    pub fn update(&self, value: Value) {
        let changed = *self.inner.borrow() != value;
        if changed {
            *self.inner.borrow_mut() = value;
            self.tag.dirty();
        }
    }

    /// The current underlying value.
    #[must_use]
    pub fn current(&self) -> Value {
        self.inner.borrow().clone()
    }

    fn as_ref(&self) -> Ref {
        match self.this.upgrade() {
            Some(this) => this,
            None => ConstReference::new(Value::Undefined),
        }
    }
}

impl Reference for RootReference {
    fn value(&self) -> Result<Value, ExprError> {
        Ok(self.current())
    }

    fn tag(&self) -> Tag {
        Tag::Dirtyable(self.tag.clone())
    }

    fn property(self: Rc<Self>, key: &str) -> Ref {
        self.get(key)
    }
}

fn memoized(
    chains: &RefCell<HashMap<Box<str>, Rc<PathReference>>>,
    parent: Weak<dyn Reference>,
    key: &str,
) -> Rc<PathReference> {
    if let Some(existing) = chains.borrow().get(key) {
        return existing.clone();
    }
    let child = Rc::new_cyclic(|this| PathReference {
        parent,
        key: key.into(),
        chains: RefCell::new(HashMap::new()),
        this: this.clone(),
    });
    chains.borrow_mut().insert(key.into(), child.clone());
    child
}

/// A memoized property of a root or of another path reference.
pub struct PathReference {
    parent: Weak<dyn Reference>,
    key: Box<str>,
    chains: RefCell<HashMap<Box<str>, Rc<PathReference>>>,
    this: Weak<PathReference>,
}

impl fmt::Debug for PathReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathReference")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl PathReference {
    /// Returns the memoized reference for property `key` of this path.
    #[must_use]
    pub fn get(&self, key: &str) -> Rc<PathReference> {
        let parent: Weak<dyn Reference> = self.this.clone();
        memoized(&self.chains, parent, key)
    }
}

impl Reference for PathReference {
    fn value(&self) -> Result<Value, ExprError> {
        match self.parent.upgrade() {
            Some(parent) => Ok(parent.value()?.get(&self.key)),
            None => Ok(Value::Undefined),
        }
    }

    fn tag(&self) -> Tag {
        self.parent.upgrade().map(|p| p.tag()).unwrap_or_default()
    }

    fn property(self: Rc<Self>, key: &str) -> Ref {
        self.get(key)
    }
}

/// A mutable reference owned by the VM (list items and their memos).
#[derive(Debug)]
pub struct UpdatableReference {
    inner: RefCell<Value>,
    tag: Rc<DirtyableTag>,
}

impl UpdatableReference {
    /// Creates a reference over `value`.
    #[must_use]
    pub fn new(value: Value) -> Rc<Self> {
        Rc::new(Self {
            inner: RefCell::new(value),
            tag: DirtyableTag::new(),
        })
    }

    /// Replaces the value, dirtying the tag if it changed.
    pub fn update(&self, value: Value) {
        let changed = *self.inner.borrow() != value;
        if changed {
            *self.inner.borrow_mut() = value;
            self.tag.dirty();
        }
    }
}

impl Reference for UpdatableReference {
    fn value(&self) -> Result<Value, ExprError> {
        Ok(self.inner.borrow().clone())
    }

    fn tag(&self) -> Tag {
        Tag::Dirtyable(self.tag.clone())
    }

    fn property(self: Rc<Self>, key: &str) -> Ref {
        property_of(self, key)
    }
}

#[derive(Debug)]
struct PropertyReference {
    parent: Ref,
    key: Box<str>,
}

impl Reference for PropertyReference {
    fn value(&self) -> Result<Value, ExprError> {
        Ok(self.parent.value()?.get(&self.key))
    }

    fn tag(&self) -> Tag {
        self.parent.tag()
    }

    fn property(self: Rc<Self>, key: &str) -> Ref {
        property_of(self, key)
    }
}

/// The truthiness of another reference.
#[derive(Debug)]
pub struct ConditionalReference {
    inner: Ref,
}

impl ConditionalReference {
    /// Wraps `inner`; constant inputs produce a constant result.
    #[must_use]
    pub fn new(inner: Ref) -> Ref {
        if inner.tag().is_const() {
            if let Ok(v) = inner.value() {
                return ConstReference::new(Value::Bool(v.is_truthy()));
            }
        }
        Rc::new(Self { inner })
    }
}

impl Reference for ConditionalReference {
    fn value(&self) -> Result<Value, ExprError> {
        Ok(Value::Bool(self.inner.value()?.is_truthy()))
    }

    fn tag(&self) -> Tag {
        self.inner.tag()
    }

    fn property(self: Rc<Self>, key: &str) -> Ref {
        property_of(self, key)
    }
}

/// Whether another reference currently holds a component definition.
#[derive(Debug)]
pub struct IsComponentReference {
    inner: Ref,
}

impl IsComponentReference {
    /// Wraps `inner`.
    #[must_use]
    pub fn new(inner: Ref) -> Ref {
        Rc::new(Self { inner })
    }
}

impl Reference for IsComponentReference {
    fn value(&self) -> Result<Value, ExprError> {
        Ok(Value::Bool(self.inner.value()?.as_component().is_some()))
    }

    fn tag(&self) -> Tag {
        self.inner.tag()
    }

    fn property(self: Rc<Self>, key: &str) -> Ref {
        property_of(self, key)
    }
}

/// String concatenation of several references.
#[derive(Debug)]
pub struct ConcatReference {
    parts: Vec<Ref>,
}

impl ConcatReference {
    /// Concatenates `parts` in order.
    #[must_use]
    pub fn new(parts: Vec<Ref>) -> Ref {
        Rc::new(Self { parts })
    }
}

impl Reference for ConcatReference {
    fn value(&self) -> Result<Value, ExprError> {
        let mut out = String::new();
        for part in &self.parts {
            let v = part.value()?;
            if !v.is_nullish() {
                out.push_str(&v.to_content());
            }
        }
        Ok(Value::from(out))
    }

    fn tag(&self) -> Tag {
        Tag::combine(self.parts.iter().map(|p| p.tag()))
    }

    fn property(self: Rc<Self>, key: &str) -> Ref {
        property_of(self, key)
    }
}

/// The result of calling a helper over captured arguments.
pub struct HelperReference {
    name: Box<str>,
    helper: Rc<dyn Helper>,
    args: CapturedArgs,
}

impl fmt::Debug for HelperReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HelperReference")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl HelperReference {
    /// Creates a helper reference.
    #[must_use]
    pub fn new(name: &str, helper: Rc<dyn Helper>, args: CapturedArgs) -> Ref {
        Rc::new(Self {
            name: name.into(),
            helper,
            args,
        })
    }
}

impl Reference for HelperReference {
    fn value(&self) -> Result<Value, ExprError> {
        let args = self.args.evaluate()?;
        self.helper
            .compute(&args)
            .map_err(|e| ExprError::new(alloc::format!("helper '{}': {e}", self.name)))
    }

    fn tag(&self) -> Tag {
        if self.helper.is_volatile() {
            return Tag::Volatile;
        }
        self.args.tag()
    }

    fn property(self: Rc<Self>, key: &str) -> Ref {
        property_of(self, key)
    }
}
