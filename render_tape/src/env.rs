// Copyright 2026 the Render Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host interfaces: the output-tree adapter and the rendering environment.

use alloc::rc::Rc;

use crate::component::{ComponentDefinition, EvaluatedArgs};
use crate::value::Value;

/// An opaque output node issued by a [`TreeAdapter`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(pub u32);

/// The DOM-like capability set the VM renders through.
///
/// The VM never touches output except through this trait.
pub trait TreeAdapter {
    /// Creates a detached element.
    fn create_element(&mut self, tag: &str) -> NodeHandle;
    /// Creates a detached text node.
    fn create_text(&mut self, text: &str) -> NodeHandle;
    /// Creates a detached comment.
    fn create_comment(&mut self, text: &str) -> NodeHandle;
    /// Creates a detached node for trusted (unescaped) content.
    fn create_trusted(&mut self, html: &str) -> NodeHandle {
        self.create_text(html)
    }
    /// Inserts (or moves) `node` into `parent` before `reference`, or at the end.
    fn insert_before(&mut self, parent: NodeHandle, node: NodeHandle, reference: Option<NodeHandle>);
    /// Detaches `node` from its parent.
    fn remove_node(&mut self, node: NodeHandle);
    /// Sets (`Some`) or removes (`None`) an attribute.
    fn set_attribute(&mut self, element: NodeHandle, name: &str, value: Option<&str>);
    /// Replaces a text or trusted node's content.
    fn set_text(&mut self, node: NodeHandle, text: &str);
    /// The node following `node` under the same parent.
    fn next_sibling(&self, node: NodeHandle) -> Option<NodeHandle>;
    /// Installs an element modifier.
    fn add_modifier(&mut self, element: NodeHandle, name: &str, args: &EvaluatedArgs);
    /// Notifies a modifier that its arguments changed.
    fn update_modifier(&mut self, _element: NodeHandle, _name: &str, _args: &EvaluatedArgs) {}
    /// Tears a modifier down.
    fn remove_modifier(&mut self, _element: NodeHandle, _name: &str) {}
}

/// The host environment a render pass runs against.
pub trait Environment {
    /// The output tree.
    fn tree(&mut self) -> &mut dyn TreeAdapter;

    /// Opens a batch of mutations (a render or rerender pass).
    fn begin(&mut self) {}

    /// Closes the batch opened by [`Environment::begin`].
    fn commit(&mut self) {}

    /// Resolves a component by name for `{{component "name"}}`.
    fn resolve_component(&mut self, _name: &str) -> Option<Rc<ComponentDefinition>> {
        None
    }

    /// Called by `{{debugger}}` with every named local visible at that point.
    fn debugger(&mut self, _locals: &[(Rc<str>, Value)]) {}
}
