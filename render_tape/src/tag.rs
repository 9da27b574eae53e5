// Copyright 2026 the Render Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Revision tags.
//!
//! A global counter advances every time a dirtyable tag is marked dirty. A tag's value is the
//! revision at which it last changed; a snapshot taken with [`Tag::value`] stays valid for as long
//! as the tag's value does not exceed it.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::sync::atomic::{AtomicU64, Ordering};

/// A revision number.
pub type Revision = u64;

/// Revision reported by constant tags.
pub const CONSTANT: Revision = 0;
/// Revision every counter starts at.
pub const INITIAL: Revision = 1;

static CURRENT: AtomicU64 = AtomicU64::new(INITIAL);

/// The current global revision.
#[must_use]
pub fn current() -> Revision {
    CURRENT.load(Ordering::Relaxed)
}

fn bump() -> Revision {
    CURRENT.fetch_add(1, Ordering::Relaxed) + 1
}

/// A tag that can be marked dirty.
#[derive(Debug)]
pub struct DirtyableTag {
    revision: Cell<Revision>,
}

impl DirtyableTag {
    /// Creates a tag at the current revision.
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            revision: Cell::new(current()),
        })
    }

    /// Advances the global revision and records it on this tag.
    pub fn dirty(&self) {
        self.revision.set(bump());
    }

    /// Revision at which the tag last changed.
    #[must_use]
    pub fn revision(&self) -> Revision {
        self.revision.get()
    }
}

/// A tag whose member set can grow while the region it covers is being rendered.
///
/// Component cache groups collect the tag of every reference read inside them.
#[derive(Debug, Default)]
pub struct GroupTag {
    members: RefCell<Vec<Tag>>,
}

impl GroupTag {
    /// Creates an empty group.
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Adds a member. Constant tags are dropped.
    pub fn add(&self, tag: &Tag) {
        if !matches!(tag, Tag::Constant) {
            self.members.borrow_mut().push(tag.clone());
        }
    }

    /// Replaces the members with `tags`. Constant tags are dropped.
    pub fn reset(&self, tags: impl IntoIterator<Item = Tag>) {
        let mut members = self.members.borrow_mut();
        members.clear();
        members.extend(tags.into_iter().filter(|t| !t.is_const()));
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.borrow().len()
    }

    /// Returns `true` if the group has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.borrow().is_empty()
    }

    fn value(&self) -> Revision {
        self.members
            .borrow()
            .iter()
            .map(Tag::value)
            .max()
            .unwrap_or(CONSTANT)
    }

    fn is_volatile(&self) -> bool {
        self.members.borrow().iter().any(Tag::is_volatile)
    }
}

/// A revision marker attached to a readable value.
#[derive(Clone, Debug, Default)]
pub enum Tag {
    /// Never changes.
    #[default]
    Constant,
    /// Always compares as changed.
    Volatile,
    /// Changes when explicitly dirtied.
    Dirtyable(Rc<DirtyableTag>),
    /// The union of a fixed set of tags.
    Combined(Rc<[Tag]>),
    /// The union of a growable set of tags.
    Group(Rc<GroupTag>),
}

impl Tag {
    /// Combines tags, dropping constants and collapsing trivial cases.
    #[must_use]
    pub fn combine(tags: impl IntoIterator<Item = Self>) -> Self {
        let mut out: Vec<Self> = Vec::new();
        for tag in tags {
            match tag {
                Self::Constant => {}
                Self::Volatile => return Self::Volatile,
                other => out.push(other),
            }
        }
        match out.len() {
            0 => Self::Constant,
            1 => out.pop().unwrap_or_default(),
            _ => Self::Combined(out.into()),
        }
    }

    /// The revision at which this tag last changed.
    #[must_use]
    pub fn value(&self) -> Revision {
        match self {
            Self::Constant => CONSTANT,
            Self::Volatile => Revision::MAX,
            Self::Dirtyable(t) => t.revision(),
            Self::Combined(tags) => tags.iter().map(Self::value).max().unwrap_or(CONSTANT),
            Self::Group(g) => g.value(),
        }
    }

    /// Returns `true` if nothing covered by this tag changed since `snapshot` was taken.
    #[must_use]
    pub fn validate(&self, snapshot: Revision) -> bool {
        !self.is_volatile() && snapshot >= self.value()
    }

    /// Returns `true` if this tag can never change.
    #[must_use]
    pub fn is_const(&self) -> bool {
        matches!(self, Self::Constant)
    }

    /// Returns `true` if this tag always compares as changed.
    #[must_use]
    pub fn is_volatile(&self) -> bool {
        match self {
            Self::Volatile => true,
            Self::Combined(tags) => tags.iter().any(Self::is_volatile),
            Self::Group(g) => g.is_volatile(),
            Self::Constant | Self::Dirtyable(_) => false,
        }
    }
}
