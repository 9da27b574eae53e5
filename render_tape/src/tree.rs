// Copyright 2026 the Render Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! An in-memory output tree.
//!
//! [`MemoryTree`] implements [`TreeAdapter`] over a node arena, serializes to HTML and counts
//! every mutation, which makes it the reference adapter for tests and benchmarks. It also
//! implements [`Environment`] with no component resolution, so a bare tree can host a render.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;

use crate::component::EvaluatedArgs;
use crate::env::{Environment, NodeHandle, TreeAdapter};

#[derive(Clone, Debug)]
enum Kind {
    Fragment,
    Element {
        tag: Box<str>,
        attrs: Vec<(Box<str>, String)>,
    },
    Text(String),
    Trusted(String),
    Comment(String),
}

#[derive(Clone, Debug)]
struct Node {
    kind: Kind,
    parent: Option<NodeHandle>,
    children: Vec<NodeHandle>,
}

/// A modifier lifecycle event recorded by [`MemoryTree`].
#[derive(Clone, Debug, PartialEq)]
pub enum ModifierEvent {
    /// A modifier was installed.
    Install {
        /// The element.
        element: NodeHandle,
        /// The modifier name.
        name: Box<str>,
        /// Arguments at install time.
        args: EvaluatedArgs,
    },
    /// A modifier's arguments changed.
    Update {
        /// The element.
        element: NodeHandle,
        /// The modifier name.
        name: Box<str>,
        /// The new arguments.
        args: EvaluatedArgs,
    },
    /// A modifier was torn down.
    Remove {
        /// The element.
        element: NodeHandle,
        /// The modifier name.
        name: Box<str>,
    },
}

/// An arena-backed output tree.
#[derive(Clone, Debug)]
pub struct MemoryTree {
    nodes: Vec<Node>,
    mutations: u64,
    modifiers: Vec<ModifierEvent>,
    transactions: u64,
}

impl Default for MemoryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTree {
    /// Creates a tree holding a single empty root fragment.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: alloc::vec![Node {
                kind: Kind::Fragment,
                parent: None,
                children: Vec::new(),
            }],
            mutations: 0,
            modifiers: Vec::new(),
            transactions: 0,
        }
    }

    /// The root fragment; renders usually target it.
    #[must_use]
    pub fn root(&self) -> NodeHandle {
        NodeHandle(0)
    }

    /// Number of mutating calls (inserts, removals, attribute and text writes) so far.
    #[must_use]
    pub fn mutations(&self) -> u64 {
        self.mutations
    }

    /// Resets the mutation counter.
    pub fn reset_mutations(&mut self) {
        self.mutations = 0;
    }

    /// Modifier events in the order they happened.
    #[must_use]
    pub fn modifier_events(&self) -> &[ModifierEvent] {
        &self.modifiers
    }

    /// Number of completed `begin`/`commit` brackets.
    #[must_use]
    pub fn transactions(&self) -> u64 {
        self.transactions
    }

    /// Children of `node`, in order.
    #[must_use]
    pub fn children(&self, node: NodeHandle) -> &[NodeHandle] {
        self.node(node).map_or(&[], |n| &n.children)
    }

    /// Parent of `node`, if attached.
    #[must_use]
    pub fn parent(&self, node: NodeHandle) -> Option<NodeHandle> {
        self.node(node)?.parent
    }

    /// Attribute `name` of element `node`.
    #[must_use]
    pub fn attribute(&self, node: NodeHandle, name: &str) -> Option<&str> {
        match &self.node(node)?.kind {
            Kind::Element { attrs, .. } => attrs
                .iter()
                .find(|(n, _)| &**n == name)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    /// Serializes the children of `node`.
    #[must_use]
    pub fn inner_html(&self, node: NodeHandle) -> String {
        let mut out = String::new();
        for &child in self.children(node) {
            self.write_html(child, &mut out);
        }
        out
    }

    /// Serializes `node` itself (fragments serialize their children).
    #[must_use]
    pub fn outer_html(&self, node: NodeHandle) -> String {
        let mut out = String::new();
        self.write_html(node, &mut out);
        out
    }

    fn node(&self, node: NodeHandle) -> Option<&Node> {
        self.nodes.get(node.0 as usize)
    }

    fn alloc(&mut self, kind: Kind) -> NodeHandle {
        let handle = NodeHandle(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
        });
        handle
    }

    fn detach(&mut self, node: NodeHandle) {
        let Some(parent) = self.node(node).and_then(|n| n.parent) else {
            return;
        };
        if let Some(p) = self.nodes.get_mut(parent.0 as usize) {
            p.children.retain(|&c| c != node);
        }
        if let Some(n) = self.nodes.get_mut(node.0 as usize) {
            n.parent = None;
        }
    }

    fn write_html(&self, node: NodeHandle, out: &mut String) {
        let Some(n) = self.node(node) else {
            return;
        };
        match &n.kind {
            Kind::Fragment => {
                for &c in &n.children {
                    self.write_html(c, out);
                }
            }
            Kind::Element { tag, attrs } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    escape_into(value, true, out);
                    out.push('"');
                }
                out.push('>');
                for &c in &n.children {
                    self.write_html(c, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
            Kind::Text(t) => escape_into(t, false, out),
            Kind::Trusted(t) => out.push_str(t),
            Kind::Comment(t) => {
                out.push_str("<!--");
                out.push_str(t);
                out.push_str("-->");
            }
        }
    }
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
}

impl TreeAdapter for MemoryTree {
    fn create_element(&mut self, tag: &str) -> NodeHandle {
        self.alloc(Kind::Element {
            tag: tag.into(),
            attrs: Vec::new(),
        })
    }

    fn create_text(&mut self, text: &str) -> NodeHandle {
        self.alloc(Kind::Text(text.into()))
    }

    fn create_comment(&mut self, text: &str) -> NodeHandle {
        self.alloc(Kind::Comment(text.into()))
    }

    fn create_trusted(&mut self, html: &str) -> NodeHandle {
        self.alloc(Kind::Trusted(html.into()))
    }

    fn insert_before(&mut self, parent: NodeHandle, node: NodeHandle, reference: Option<NodeHandle>) {
        self.mutations += 1;
        self.detach(node);
        let Some(p) = self.nodes.get_mut(parent.0 as usize) else {
            return;
        };
        let at = reference
            .and_then(|r| p.children.iter().position(|&c| c == r))
            .unwrap_or(p.children.len());
        p.children.insert(at, node);
        if let Some(n) = self.nodes.get_mut(node.0 as usize) {
            n.parent = Some(parent);
        }
    }

    fn remove_node(&mut self, node: NodeHandle) {
        self.mutations += 1;
        self.detach(node);
    }

    fn set_attribute(&mut self, element: NodeHandle, name: &str, value: Option<&str>) {
        self.mutations += 1;
        let Some(Node {
            kind: Kind::Element { attrs, .. },
            ..
        }) = self.nodes.get_mut(element.0 as usize)
        else {
            return;
        };
        let existing = attrs.iter().position(|(n, _)| &**n == name);
        match (existing, value) {
            (Some(i), Some(v)) => attrs[i].1 = v.into(),
            (None, Some(v)) => attrs.push((name.into(), v.into())),
            (Some(i), None) => {
                attrs.remove(i);
            }
            (None, None) => {}
        }
    }

    fn set_text(&mut self, node: NodeHandle, text: &str) {
        self.mutations += 1;
        if let Some(n) = self.nodes.get_mut(node.0 as usize) {
            match &mut n.kind {
                Kind::Text(t) | Kind::Trusted(t) | Kind::Comment(t) => {
                    t.clear();
                    t.push_str(text);
                }
                Kind::Fragment | Kind::Element { .. } => {}
            }
        }
    }

    fn next_sibling(&self, node: NodeHandle) -> Option<NodeHandle> {
        let parent = self.node(node)?.parent?;
        let siblings = &self.node(parent)?.children;
        let i = siblings.iter().position(|&c| c == node)?;
        siblings.get(i + 1).copied()
    }

    fn add_modifier(&mut self, element: NodeHandle, name: &str, args: &EvaluatedArgs) {
        self.modifiers.push(ModifierEvent::Install {
            element,
            name: name.into(),
            args: args.clone(),
        });
    }

    fn update_modifier(&mut self, element: NodeHandle, name: &str, args: &EvaluatedArgs) {
        self.modifiers.push(ModifierEvent::Update {
            element,
            name: name.into(),
            args: args.clone(),
        });
    }

    fn remove_modifier(&mut self, element: NodeHandle, name: &str) {
        self.modifiers.push(ModifierEvent::Remove {
            element,
            name: name.into(),
        });
    }
}

impl Environment for MemoryTree {
    fn tree(&mut self) -> &mut dyn TreeAdapter {
        self
    }

    fn commit(&mut self) {
        self.transactions += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_and_serializes() {
        let mut t = MemoryTree::new();
        let root = t.root();
        let div = t.create_element("div");
        t.set_attribute(div, "class", Some("a\"b"));
        t.insert_before(root, div, None);
        let text = t.create_text("1 < 2");
        t.insert_before(div, text, None);
        let c = t.create_comment("");
        t.insert_before(root, c, Some(div));
        assert_eq!(
            t.inner_html(root),
            "<!----><div class=\"a&quot;b\">1 &lt; 2</div>"
        );
        assert_eq!(t.next_sibling(c), Some(div));
        assert_eq!(t.next_sibling(div), None);
        assert_eq!(t.mutations(), 4);
    }

    #[test]
    fn insert_moves_attached_nodes() {
        let mut t = MemoryTree::new();
        let root = t.root();
        let a = t.create_text("a");
        let b = t.create_text("b");
        t.insert_before(root, a, None);
        t.insert_before(root, b, None);
        t.insert_before(root, b, Some(a));
        assert_eq!(t.inner_html(root), "ba");
        t.remove_node(a);
        assert_eq!(t.inner_html(root), "b");
        assert_eq!(t.parent(a), None);
    }

    #[test]
    fn attributes_can_be_removed() {
        let mut t = MemoryTree::new();
        let div = t.create_element("p");
        t.set_attribute(div, "title", Some("x"));
        t.set_attribute(div, "title", None);
        assert_eq!(t.attribute(div, "title"), None);
        assert_eq!(t.outer_html(div), "<p></p>");
    }
}
