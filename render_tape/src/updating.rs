// Copyright 2026 the Render Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The update program: updating opcodes recorded during render, in document order.
//!
//! Opcodes live in a generational arena and are linked into doubly-linked lists. `Try` and
//! `List` opcodes own a nested list of their own; everything else is a leaf.

use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;

use crate::bounds::RegionId;
use crate::component::{CapturedArgs, ComponentInstance, EvaluatedArgs};
use crate::env::NodeHandle;
use crate::iterate::ItemKey;
use crate::reference::{Ref, UpdatableReference};
use crate::scope::{DynamicScope, Scope};
use crate::tag::{GroupTag, Revision, Tag};
use crate::value::Value;
use crate::vm::Slot;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct OpId {
    index: u32,
    generation: u32,
}

/// Everything needed to run bytecode again from a recorded point.
pub(crate) struct ResumeState {
    pub(crate) pc: usize,
    pub(crate) scope: Rc<Scope>,
    pub(crate) dynamic_scope: DynamicScope,
    pub(crate) stack: Vec<Slot>,
    /// Cache groups open at the recorded point; opcodes created on resume join them.
    pub(crate) groups: Vec<Rc<GroupTag>>,
}

/// The references a list item's block reads its value and memo through.
pub(crate) struct ItemRefs {
    pub(crate) key: ItemKey,
    pub(crate) value: Rc<UpdatableReference>,
    pub(crate) memo: Rc<UpdatableReference>,
}

pub(crate) enum OpKind {
    /// A value a branch decision depended on.
    Assert {
        reference: Ref,
        last: Value,
        snapshot: Revision,
    },
    Text {
        node: NodeHandle,
        reference: Ref,
        last: Value,
        snapshot: Revision,
    },
    Attr {
        element: NodeHandle,
        name: Rc<str>,
        reference: Ref,
        last: Option<String>,
        snapshot: Revision,
    },
    Modifier {
        element: NodeHandle,
        name: Rc<str>,
        args: CapturedArgs,
        last: EvaluatedArgs,
        snapshot: Revision,
    },
    /// A re-executable span.
    Try {
        region: RegionId,
        state: Rc<ResumeState>,
        item: Option<ItemRefs>,
    },
    /// A keyed list; its children are one `Try` per item, in document order.
    List {
        region: RegionId,
        state: Rc<ResumeState>,
        iterable: Ref,
        key: Rc<str>,
        snapshot: Revision,
    },
    Component {
        instance: Rc<dyn ComponentInstance>,
        args: CapturedArgs,
        snapshot: Revision,
    },
    DidUpdateLayout {
        instance: Rc<dyn ComponentInstance>,
        region: RegionId,
    },
    /// Skips to `end` while nothing in the cache group changed.
    Guard {
        group: Rc<GroupTag>,
        snapshot: Revision,
        end: Option<OpId>,
    },
    /// Closes a guard, refreshing its snapshot.
    DidModify { guard: OpId },
}

impl OpKind {
    /// The tag this opcode contributes to enclosing cache groups.
    pub(crate) fn tag(&self) -> Tag {
        match self {
            Self::Assert { reference, .. }
            | Self::Text { reference, .. }
            | Self::Attr { reference, .. } => reference.tag(),
            Self::Modifier { args, .. } | Self::Component { args, .. } => args.tag(),
            Self::List { iterable, .. } => iterable.tag(),
            Self::Try { .. }
            | Self::DidUpdateLayout { .. }
            | Self::Guard { .. }
            | Self::DidModify { .. } => Tag::Constant,
        }
    }
}

pub(crate) struct Op {
    pub(crate) kind: OpKind,
    owner: Option<OpId>,
    prev: Option<OpId>,
    next: Option<OpId>,
    children: OpList,
}

#[derive(Copy, Clone, Debug, Default)]
struct OpList {
    head: Option<OpId>,
    tail: Option<OpId>,
}

struct Entry {
    generation: u32,
    op: Option<Op>,
}

/// The arena of updating opcodes. `None` as an owner names the root list.
#[derive(Default)]
pub(crate) struct UpdateProgram {
    entries: Vec<Entry>,
    free: Vec<u32>,
    root: OpList,
}

impl UpdateProgram {
    pub(crate) fn get(&self, id: OpId) -> Option<&Op> {
        let e = self.entries.get(id.index as usize)?;
        if e.generation != id.generation {
            return None;
        }
        e.op.as_ref()
    }

    pub(crate) fn get_mut(&mut self, id: OpId) -> Option<&mut Op> {
        let e = self.entries.get_mut(id.index as usize)?;
        if e.generation != id.generation {
            return None;
        }
        e.op.as_mut()
    }

    /// Number of live opcodes.
    pub(crate) fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.op.is_some()).count()
    }

    #[cfg(test)]
    pub(crate) fn group_sizes(&self) -> Vec<usize> {
        self.entries
            .iter()
            .filter_map(|e| match e.op.as_ref().map(|op| &op.kind) {
                Some(OpKind::Guard { group, .. }) => Some(group.len()),
                _ => None,
            })
            .collect()
    }

    fn list(&self, owner: Option<OpId>) -> OpList {
        match owner {
            None => self.root,
            Some(o) => self.get(o).map(|op| op.children).unwrap_or_default(),
        }
    }

    fn set_list(&mut self, owner: Option<OpId>, list: OpList) {
        match owner {
            None => self.root = list,
            Some(o) => {
                if let Some(op) = self.get_mut(o) {
                    op.children = list;
                }
            }
        }
    }

    pub(crate) fn head(&self, owner: Option<OpId>) -> Option<OpId> {
        self.list(owner).head
    }

    pub(crate) fn next(&self, id: OpId) -> Option<OpId> {
        self.get(id)?.next
    }

    pub(crate) fn children(&self, owner: Option<OpId>) -> Vec<OpId> {
        let mut out = Vec::new();
        let mut cursor = self.head(owner);
        while let Some(id) = cursor {
            out.push(id);
            cursor = self.next(id);
        }
        out
    }

    fn alloc(&mut self, op: Op) -> OpId {
        if let Some(index) = self.free.pop() {
            let e = &mut self.entries[index as usize];
            e.generation += 1;
            e.op = Some(op);
            return OpId {
                index,
                generation: e.generation,
            };
        }
        let index = u32::try_from(self.entries.len()).unwrap_or(u32::MAX);
        self.entries.push(Entry {
            generation: 0,
            op: Some(op),
        });
        OpId {
            index,
            generation: 0,
        }
    }

    /// Appends an opcode to `owner`'s list.
    pub(crate) fn push(&mut self, owner: Option<OpId>, kind: OpKind) -> OpId {
        let id = self.alloc(Op {
            kind,
            owner,
            prev: None,
            next: None,
            children: OpList::default(),
        });
        self.link_before(owner, id, None);
        id
    }

    /// Links a detached opcode into `owner`'s list before `before` (or at the end).
    fn link_before(&mut self, owner: Option<OpId>, id: OpId, before: Option<OpId>) {
        let mut list = self.list(owner);
        let prev = match before {
            Some(b) => self.get(b).and_then(|op| op.prev),
            None => list.tail,
        };
        if let Some(op) = self.get_mut(id) {
            op.owner = owner;
            op.prev = prev;
            op.next = before;
        }
        match prev {
            Some(p) => {
                if let Some(op) = self.get_mut(p) {
                    op.next = Some(id);
                }
            }
            None => list.head = Some(id),
        }
        match before {
            Some(b) => {
                if let Some(op) = self.get_mut(b) {
                    op.prev = Some(id);
                }
            }
            None => list.tail = Some(id),
        }
        self.set_list(owner, list);
    }

    fn unlink(&mut self, id: OpId) {
        let Some((owner, prev, next)) = self.get(id).map(|op| (op.owner, op.prev, op.next)) else {
            return;
        };
        let mut list = self.list(owner);
        match prev {
            Some(p) => {
                if let Some(op) = self.get_mut(p) {
                    op.next = next;
                }
            }
            None => list.head = next,
        }
        match next {
            Some(n) => {
                if let Some(op) = self.get_mut(n) {
                    op.prev = prev;
                }
            }
            None => list.tail = prev,
        }
        self.set_list(owner, list);
        if let Some(op) = self.get_mut(id) {
            op.prev = None;
            op.next = None;
        }
    }

    /// Moves `id` within its owner's list so that it precedes `before` (or is last).
    pub(crate) fn move_before(&mut self, id: OpId, before: Option<OpId>) {
        let Some(owner) = self.get(id).map(|op| op.owner) else {
            return;
        };
        self.unlink(id);
        self.link_before(owner, id, before);
    }

    /// Frees every opcode nested under `id`, keeping `id` itself.
    pub(crate) fn clear_children(&mut self, id: OpId) {
        for child in self.children(Some(id)) {
            self.free_tree(child);
        }
        if let Some(op) = self.get_mut(id) {
            op.children = OpList::default();
        }
    }

    /// Tags of the live opcodes strictly between `from` and `to` in one list, nested lists included.
    pub(crate) fn span_tags(&self, from: OpId, to: OpId) -> Vec<Tag> {
        let mut out = Vec::new();
        let mut cursor = self.next(from);
        while let Some(id) = cursor {
            if id == to {
                break;
            }
            self.collect_tags(id, &mut out);
            cursor = self.next(id);
        }
        out
    }

    fn collect_tags(&self, id: OpId, out: &mut Vec<Tag>) {
        let Some(op) = self.get(id) else {
            return;
        };
        let tag = op.kind.tag();
        if !tag.is_const() {
            out.push(tag);
        }
        for child in self.children(Some(id)) {
            self.collect_tags(child, out);
        }
    }

    /// Unlinks and frees `id` and everything nested under it.
    pub(crate) fn remove(&mut self, id: OpId) {
        self.unlink(id);
        self.free_tree(id);
    }

    fn free_tree(&mut self, id: OpId) {
        for child in self.children(Some(id)) {
            self.free_tree(child);
        }
        if let Some(e) = self.entries.get_mut(id.index as usize) {
            if e.generation == id.generation && e.op.take().is_some() {
                self.free.push(id.index);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::ConstReference;

    fn assert_op(n: i64) -> OpKind {
        OpKind::Assert {
            reference: ConstReference::new(Value::Int(n)),
            last: Value::Int(n),
            snapshot: 0,
        }
    }

    fn labels(p: &UpdateProgram, owner: Option<OpId>) -> Vec<i64> {
        p.children(owner)
            .into_iter()
            .map(|id| match &p.get(id).unwrap().kind {
                OpKind::Assert {
                    last: Value::Int(n),
                    ..
                } => *n,
                _ => -1,
            })
            .collect()
    }

    #[test]
    fn lists_keep_document_order() {
        let mut p = UpdateProgram::default();
        let a = p.push(None, assert_op(1));
        let b = p.push(None, assert_op(2));
        let c = p.push(None, assert_op(3));
        assert_eq!(labels(&p, None), [1, 2, 3]);
        p.move_before(c, Some(a));
        assert_eq!(labels(&p, None), [3, 1, 2]);
        p.move_before(c, None);
        assert_eq!(labels(&p, None), [1, 2, 3]);
        p.remove(b);
        assert_eq!(labels(&p, None), [1, 3]);
        assert!(p.get(b).is_none());
    }

    #[test]
    fn nested_lists_are_freed_with_their_owner() {
        let mut p = UpdateProgram::default();
        let owner = p.push(None, assert_op(0));
        p.push(Some(owner), assert_op(1));
        let inner = p.push(Some(owner), assert_op(2));
        p.push(Some(inner), assert_op(3));
        assert_eq!(p.len(), 4);
        p.clear_children(owner);
        assert_eq!(p.len(), 1);
        assert!(p.head(Some(owner)).is_none());
        p.push(Some(owner), assert_op(4));
        assert_eq!(labels(&p, Some(owner)), [4]);
        p.remove(owner);
        assert_eq!(p.len(), 0);
        let reused = p.push(None, assert_op(5));
        assert!(p.get(owner).is_none());
        assert!(p.get(reused).is_some());
    }

    #[test]
    fn span_tags_cover_live_nested_opcodes() {
        use crate::reference::RootReference;

        let model = RootReference::new(Value::Int(0));
        let read = |n: i64| OpKind::Assert {
            reference: model.clone(),
            last: Value::Int(n),
            snapshot: 0,
        };
        let mut p = UpdateProgram::default();
        let start = p.push(None, assert_op(0));
        let outer = p.push(None, read(1));
        let inner = p.push(Some(outer), read(2));
        p.push(Some(outer), assert_op(3));
        let end = p.push(None, read(4));
        p.push(None, read(5));
        assert_eq!(p.span_tags(start, end).len(), 2);
        p.remove(inner);
        assert_eq!(p.span_tags(start, end).len(), 1);
    }
}
