// Copyright 2026 the Render Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The element builder: insertion cursors, the element under construction and the block stack.

use alloc::vec::Vec;

use crate::bounds::{RegionId, Regions};
use crate::env::{NodeHandle, TreeAdapter};

#[derive(Copy, Clone, Debug)]
struct Cursor {
    element: NodeHandle,
    next_sibling: Option<NodeHandle>,
}

#[derive(Debug)]
pub(crate) struct ElementStack {
    cursors: Vec<Cursor>,
    constructing: Option<NodeHandle>,
    blocks: Vec<RegionId>,
}

impl ElementStack {
    pub(crate) fn new(parent: NodeHandle, next_sibling: Option<NodeHandle>) -> Self {
        Self {
            cursors: alloc::vec![Cursor {
                element: parent,
                next_sibling,
            }],
            constructing: None,
            blocks: Vec::new(),
        }
    }

    pub(crate) fn element(&self) -> NodeHandle {
        self.cursors.last().map_or(NodeHandle(0), |c| c.element)
    }

    fn next_sibling(&self) -> Option<NodeHandle> {
        self.cursors.last().and_then(|c| c.next_sibling)
    }

    pub(crate) fn block(&self) -> Option<RegionId> {
        self.blocks.last().copied()
    }

    /// Number of open blocks.
    pub(crate) fn depth(&self) -> usize {
        self.blocks.len()
    }

    pub(crate) fn open_elements(&self) -> usize {
        self.cursors.len() - 1
    }

    /// Opens a fresh region nested in the current block.
    pub(crate) fn push_block(&mut self, regions: &mut Regions) -> RegionId {
        let id = regions.alloc(self.element());
        if let Some(current) = self.block() {
            regions.did_append_region(current, id);
        }
        self.blocks.push(id);
        id
    }

    /// Re-enters an existing region, for re-execution and list inserts.
    pub(crate) fn resume_block(&mut self, id: RegionId) {
        self.blocks.push(id);
    }

    /// Closes the current block. Empty blocks get a comment placeholder when `placeholder` is
    /// set, so that they keep a position in the output.
    pub(crate) fn pop_block(
        &mut self,
        regions: &mut Regions,
        tree: &mut dyn TreeAdapter,
        placeholder: bool,
    ) -> Option<RegionId> {
        let id = self.block()?;
        if placeholder && regions.is_empty(id) {
            self.append_comment(regions, tree, "");
        }
        self.blocks.pop()
    }

    fn insert(&mut self, regions: &mut Regions, tree: &mut dyn TreeAdapter, node: NodeHandle) {
        tree.insert_before(self.element(), node, self.next_sibling());
        if let Some(block) = self.block() {
            regions.did_append_node(block, node);
        }
    }

    pub(crate) fn append_text(
        &mut self,
        regions: &mut Regions,
        tree: &mut dyn TreeAdapter,
        text: &str,
    ) -> NodeHandle {
        let node = tree.create_text(text);
        self.insert(regions, tree, node);
        node
    }

    pub(crate) fn append_trusted(
        &mut self,
        regions: &mut Regions,
        tree: &mut dyn TreeAdapter,
        html: &str,
    ) -> NodeHandle {
        let node = tree.create_trusted(html);
        self.insert(regions, tree, node);
        node
    }

    pub(crate) fn append_comment(
        &mut self,
        regions: &mut Regions,
        tree: &mut dyn TreeAdapter,
        text: &str,
    ) -> NodeHandle {
        let node = tree.create_comment(text);
        self.insert(regions, tree, node);
        node
    }

    pub(crate) fn open_element(&mut self, tree: &mut dyn TreeAdapter, tag: &str) -> NodeHandle {
        let element = tree.create_element(tag);
        self.constructing = Some(element);
        element
    }

    pub(crate) fn constructing(&self) -> Option<NodeHandle> {
        self.constructing
    }

    /// Inserts the element under construction and makes it the insertion parent.
    pub(crate) fn flush_element(
        &mut self,
        regions: &mut Regions,
        tree: &mut dyn TreeAdapter,
    ) -> Option<NodeHandle> {
        let element = self.constructing.take()?;
        tree.insert_before(self.element(), element, self.next_sibling());
        if let Some(block) = self.block() {
            regions.open_element(block, element);
        }
        self.cursors.push(Cursor {
            element,
            next_sibling: None,
        });
        Some(element)
    }

    pub(crate) fn close_element(&mut self, regions: &mut Regions) -> Option<NodeHandle> {
        if self.cursors.len() <= 1 {
            return None;
        }
        let cursor = self.cursors.pop()?;
        if let Some(block) = self.block() {
            regions.close_element(block);
        }
        Some(cursor.element)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::MemoryTree;

    #[test]
    fn builds_into_the_current_cursor() {
        let mut tree = MemoryTree::new();
        let root = tree.root();
        let mut regions = Regions::default();
        let mut stack = ElementStack::new(root, None);
        let block = stack.push_block(&mut regions);
        stack.open_element(&mut tree, "p");
        let p = stack.flush_element(&mut regions, &mut tree).unwrap();
        stack.append_text(&mut regions, &mut tree, "hi");
        assert_eq!(stack.open_elements(), 1);
        assert_eq!(stack.close_element(&mut regions), Some(p));
        assert_eq!(stack.close_element(&mut regions), None);
        stack.append_text(&mut regions, &mut tree, "!");
        assert_eq!(stack.pop_block(&mut regions, &mut tree, true), Some(block));
        assert_eq!(tree.inner_html(root), "<p>hi</p>!");
        assert_eq!(regions.first_node(block), Some(p));
    }

    #[test]
    fn empty_blocks_get_a_placeholder() {
        let mut tree = MemoryTree::new();
        let root = tree.root();
        let anchor = tree.create_text("end");
        tree.insert_before(root, anchor, None);
        let mut regions = Regions::default();
        let mut stack = ElementStack::new(root, Some(anchor));
        let outer = stack.push_block(&mut regions);
        let inner = stack.push_block(&mut regions);
        stack.pop_block(&mut regions, &mut tree, true);
        stack.pop_block(&mut regions, &mut tree, true);
        assert_eq!(tree.inner_html(root), "<!---->end");
        assert!(!regions.is_empty(inner));
        assert_eq!(regions.first_node(outer), regions.first_node(inner));
    }
}
