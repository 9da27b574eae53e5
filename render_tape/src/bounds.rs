// Copyright 2026 the Render Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Regions: bounded output spans and the destructors they own.
//!
//! Every dynamically entered span (a conditional branch, a list item, a component) is a region
//! in a generational arena. A region knows its parent element, its first and last bound (a node or
//! a nested region) and the destroyables registered while it rendered, in order.
//!
//! Destroying a region is a post-order walk: nested regions first, in document order, then the
//! region's own destructors, then its output is removed. Slots are generational, so destroying a
//! stale id is a no-op.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::mem;

use crate::component::{ComponentDefinition, ComponentInstance};
use crate::env::{NodeHandle, TreeAdapter};
use crate::trace::{DestroyEvent, Tracer};

/// The contiguous output span of a region.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Bounds {
    /// The element the span lives in.
    pub parent: NodeHandle,
    /// First node of the span, if it is non-empty.
    pub first: Option<NodeHandle>,
    /// Last node of the span, if it is non-empty.
    pub last: Option<NodeHandle>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct RegionId {
    index: u32,
    generation: u32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Bound {
    Node(NodeHandle),
    Region(RegionId),
}

pub(crate) enum Destroyable {
    Region(RegionId),
    Component {
        definition: Rc<ComponentDefinition>,
        instance: Rc<dyn ComponentInstance>,
    },
    Modifier {
        element: NodeHandle,
        name: Rc<str>,
    },
}

struct Region {
    parent: NodeHandle,
    first: Option<Bound>,
    last: Option<Bound>,
    nesting: u32,
    owned: Vec<Destroyable>,
}

enum Entry {
    Live { generation: u32, region: Region },
    Vacant { generation: u32 },
}

#[derive(Default)]
pub(crate) struct Regions {
    entries: Vec<Entry>,
    free: Vec<u32>,
}

impl Regions {
    pub(crate) fn alloc(&mut self, parent: NodeHandle) -> RegionId {
        let region = Region {
            parent,
            first: None,
            last: None,
            nesting: 0,
            owned: Vec::new(),
        };
        if let Some(index) = self.free.pop() {
            let generation = match self.entries[index as usize] {
                Entry::Vacant { generation } | Entry::Live { generation, .. } => generation + 1,
            };
            self.entries[index as usize] = Entry::Live { generation, region };
            return RegionId { index, generation };
        }
        let index = u32::try_from(self.entries.len()).unwrap_or(u32::MAX);
        self.entries.push(Entry::Live {
            generation: 0,
            region,
        });
        RegionId {
            index,
            generation: 0,
        }
    }

    fn get(&self, id: RegionId) -> Option<&Region> {
        match self.entries.get(id.index as usize)? {
            Entry::Live { generation, region } if *generation == id.generation => Some(region),
            _ => None,
        }
    }

    fn get_mut(&mut self, id: RegionId) -> Option<&mut Region> {
        match self.entries.get_mut(id.index as usize)? {
            Entry::Live { generation, region } if *generation == id.generation => Some(region),
            _ => None,
        }
    }

    pub(crate) fn is_live(&self, id: RegionId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live regions.
    pub(crate) fn live(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, Entry::Live { .. }))
            .count()
    }

    pub(crate) fn parent(&self, id: RegionId) -> Option<NodeHandle> {
        self.get(id).map(|r| r.parent)
    }

    pub(crate) fn first_node(&self, id: RegionId) -> Option<NodeHandle> {
        match self.get(id)?.first? {
            Bound::Node(n) => Some(n),
            Bound::Region(r) => self.first_node(r),
        }
    }

    pub(crate) fn last_node(&self, id: RegionId) -> Option<NodeHandle> {
        match self.get(id)?.last? {
            Bound::Node(n) => Some(n),
            Bound::Region(r) => self.last_node(r),
        }
    }

    pub(crate) fn bounds(&self, id: RegionId) -> Option<Bounds> {
        Some(Bounds {
            parent: self.parent(id)?,
            first: self.first_node(id),
            last: self.last_node(id),
        })
    }

    fn did_append(&mut self, id: RegionId, bound: Bound) {
        if let Some(r) = self.get_mut(id) {
            if r.nesting != 0 {
                return;
            }
            if r.first.is_none() {
                r.first = Some(bound);
            }
            r.last = Some(bound);
        }
    }

    pub(crate) fn did_append_node(&mut self, id: RegionId, node: NodeHandle) {
        self.did_append(id, Bound::Node(node));
    }

    /// Records `child` as nested in `id`, both as output and as an owned destroyable.
    pub(crate) fn did_append_region(&mut self, id: RegionId, child: RegionId) {
        self.did_append(id, Bound::Region(child));
        self.register(id, Destroyable::Region(child));
    }

    pub(crate) fn open_element(&mut self, id: RegionId, element: NodeHandle) {
        self.did_append_node(id, element);
        if let Some(r) = self.get_mut(id) {
            r.nesting += 1;
        }
    }

    pub(crate) fn close_element(&mut self, id: RegionId) {
        if let Some(r) = self.get_mut(id) {
            r.nesting = r.nesting.saturating_sub(1);
        }
    }

    pub(crate) fn register(&mut self, id: RegionId, d: Destroyable) {
        if let Some(r) = self.get_mut(id) {
            r.owned.push(d);
        }
    }

    pub(crate) fn is_empty(&self, id: RegionId) -> bool {
        self.get(id).is_none_or(|r| r.first.is_none())
    }

    /// Replaces a list region's children with `items`, in document order.
    pub(crate) fn set_items(&mut self, id: RegionId, items: &[RegionId]) {
        if let Some(r) = self.get_mut(id) {
            r.first = items.first().map(|&i| Bound::Region(i));
            r.last = items.last().map(|&i| Bound::Region(i));
            r.owned = items.iter().map(|&i| Destroyable::Region(i)).collect();
        }
    }

    /// The region's nodes, first to last.
    pub(crate) fn nodes(&self, id: RegionId, tree: &dyn TreeAdapter) -> Vec<NodeHandle> {
        let mut out = Vec::new();
        let (Some(first), Some(last)) = (self.first_node(id), self.last_node(id)) else {
            return out;
        };
        let mut cursor = Some(first);
        while let Some(node) = cursor {
            out.push(node);
            if node == last {
                break;
            }
            cursor = tree.next_sibling(node);
        }
        out
    }

    /// Moves the region's nodes before `reference` inside its parent.
    pub(crate) fn move_before(
        &self,
        id: RegionId,
        tree: &mut dyn TreeAdapter,
        reference: Option<NodeHandle>,
    ) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        for node in self.nodes(id, tree) {
            tree.insert_before(parent, node, reference);
        }
    }

    /// Destroys `id`: nested regions, destructors, then output. A no-op for stale ids.
    pub(crate) fn destroy(&mut self, id: RegionId, tree: &mut dyn TreeAdapter, trace: &mut Tracer<'_>) {
        if !self.is_live(id) {
            return;
        }
        let nodes = self.nodes(id, tree);
        self.run_destructors(id, tree, trace);
        for node in nodes {
            tree.remove_node(node);
        }
        self.free(id);
        trace.destroy(DestroyEvent::Region);
    }

    /// Empties `id` in place so it can be rendered into again.
    ///
    /// Returns the node that followed the region's output, for re-insertion.
    pub(crate) fn reset(
        &mut self,
        id: RegionId,
        tree: &mut dyn TreeAdapter,
        trace: &mut Tracer<'_>,
    ) -> Option<NodeHandle> {
        let nodes = self.nodes(id, tree);
        let next = nodes.last().and_then(|&n| tree.next_sibling(n));
        self.run_destructors(id, tree, trace);
        for node in nodes {
            tree.remove_node(node);
        }
        if let Some(r) = self.get_mut(id) {
            r.first = None;
            r.last = None;
            r.nesting = 0;
        }
        next
    }

    fn run_destructors(&mut self, id: RegionId, tree: &mut dyn TreeAdapter, trace: &mut Tracer<'_>) {
        let Some(owned) = self.get_mut(id).map(|r| mem::take(&mut r.owned)) else {
            return;
        };
        let (regions, own): (Vec<_>, Vec<_>) = owned
            .into_iter()
            .partition(|d| matches!(d, Destroyable::Region(_)));
        for d in regions {
            if let Destroyable::Region(child) = d {
                if self.is_live(child) {
                    self.run_destructors(child, tree, trace);
                    self.free(child);
                    trace.destroy(DestroyEvent::Region);
                }
            }
        }
        for d in own {
            match d {
                Destroyable::Region(_) => {}
                Destroyable::Component {
                    definition,
                    instance,
                } => {
                    instance.destroy();
                    trace.destroy(DestroyEvent::Component {
                        name: definition.name(),
                    });
                }
                Destroyable::Modifier { element, name } => {
                    tree.remove_modifier(element, &name);
                    trace.destroy(DestroyEvent::Modifier { name: &name });
                }
            }
        }
    }

    fn free(&mut self, id: RegionId) {
        if let Some(entry) = self.entries.get_mut(id.index as usize) {
            if matches!(entry, Entry::Live { generation, .. } if *generation == id.generation) {
                *entry = Entry::Vacant {
                    generation: id.generation,
                };
                self.free.push(id.index);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::{ConstReference, Ref};
    use crate::tree::MemoryTree;
    use crate::value::Value;
    use alloc::string::String;
    use core::cell::RefCell;
    use crate::trace::TraceMask;

    struct Probe {
        name: &'static str,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl ComponentInstance for Probe {
        fn self_ref(&self) -> Ref {
            ConstReference::new(Value::Null)
        }

        fn destroy(&self) {
            self.log.borrow_mut().push(self.name.into());
        }
    }

    fn probe(
        name: &'static str,
        log: &Rc<RefCell<Vec<String>>>,
        def: &Rc<ComponentDefinition>,
    ) -> Destroyable {
        Destroyable::Component {
            definition: def.clone(),
            instance: Rc::new(Probe {
                name,
                log: log.clone(),
            }),
        }
    }

    fn definition() -> Rc<ComponentDefinition> {
        use crate::component::{Capabilities, CapturedArgs, ComponentManager};
        use crate::heap::{CompiledLayout, Handle};
        use crate::reference::ExprError;
        use crate::scope::DynamicScope;
        struct M;
        impl ComponentManager for M {
            fn create(
                &self,
                _: &ComponentDefinition,
                _: Option<&CapturedArgs>,
                _: &DynamicScope,
                _: bool,
            ) -> Result<Rc<dyn ComponentInstance>, ExprError> {
                Err(ExprError::new("unused"))
            }
        }
        ComponentDefinition::new(
            "probe",
            Rc::new(M),
            Capabilities::default(),
            Rc::new(CompiledLayout {
                handle: Handle(0),
                symbols: alloc::boxed::Box::new([]),
                has_eval: false,
            }),
        )
    }

    #[test]
    fn bounds_follow_nested_regions() {
        let mut tree = MemoryTree::new();
        let root = tree.root();
        let mut regions = Regions::default();
        let outer = regions.alloc(root);
        let a = tree.create_text("a");
        tree.insert_before(root, a, None);
        regions.did_append_node(outer, a);
        let inner = regions.alloc(root);
        regions.did_append_region(outer, inner);
        let b = tree.create_text("b");
        tree.insert_before(root, b, None);
        regions.did_append_node(inner, b);

        let bounds = regions.bounds(outer).unwrap();
        assert_eq!(bounds.first, Some(a));
        assert_eq!(bounds.last, Some(b));
        assert_eq!(regions.nodes(outer, &tree), [a, b]);
    }

    #[test]
    fn elements_nest_without_moving_bounds() {
        let mut tree = MemoryTree::new();
        let root = tree.root();
        let mut regions = Regions::default();
        let r = regions.alloc(root);
        let div = tree.create_element("div");
        regions.open_element(r, div);
        let t = tree.create_text("x");
        regions.did_append_node(r, t);
        regions.close_element(r);
        assert_eq!(regions.first_node(r), Some(div));
        assert_eq!(regions.last_node(r), Some(div));
    }

    #[test]
    fn destroy_is_post_order_and_idempotent() {
        let mut tree = MemoryTree::new();
        let root = tree.root();
        let log = Rc::new(RefCell::new(Vec::new()));
        let def = definition();
        let mut regions = Regions::default();
        let outer = regions.alloc(root);
        regions.register(outer, probe("outer", &log, &def));
        let a = regions.alloc(root);
        regions.did_append_region(outer, a);
        regions.register(a, probe("a", &log, &def));
        let s = tree.create_text("s");
        tree.insert_before(root, s, None);
        regions.did_append_node(a, s);
        let b = regions.alloc(root);
        regions.did_append_region(outer, b);
        regions.register(b, probe("b", &log, &def));
        let t = tree.create_text("t");
        tree.insert_before(root, t, None);
        regions.did_append_node(b, t);

        let mut trace = Tracer::new(TraceMask::NONE, None);
        regions.destroy(outer, &mut tree, &mut trace);
        regions.destroy(outer, &mut tree, &mut trace);
        regions.destroy(a, &mut tree, &mut trace);
        assert_eq!(*log.borrow(), ["a", "b", "outer"]);
        assert_eq!(tree.inner_html(root), "");
        assert_eq!(regions.live(), 0);
    }

    #[test]
    fn stale_ids_do_not_alias_reused_slots() {
        let mut tree = MemoryTree::new();
        let root = tree.root();
        let mut regions = Regions::default();
        let first = regions.alloc(root);
        regions.destroy(first, &mut tree, &mut Tracer::new(TraceMask::NONE, None));
        let second = regions.alloc(root);
        assert_ne!(first, second);
        assert!(!regions.is_live(first));
        assert!(regions.is_live(second));
    }

    #[test]
    fn reset_keeps_the_region_and_reports_the_anchor() {
        let mut tree = MemoryTree::new();
        let root = tree.root();
        let mut regions = Regions::default();
        let r = regions.alloc(root);
        let x = tree.create_text("x");
        tree.insert_before(root, x, None);
        regions.did_append_node(r, x);
        let after = tree.create_text("!");
        tree.insert_before(root, after, None);
        let next = regions.reset(r, &mut tree, &mut Tracer::new(TraceMask::NONE, None));
        assert_eq!(next, Some(after));
        assert!(regions.is_live(r));
        assert!(regions.is_empty(r));
        assert_eq!(tree.inner_html(root), "!");
    }
}
