// Copyright 2026 the Render Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Lexical and dynamic scopes.

use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::vec;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;

use crate::heap::CompiledBlock;
use crate::reference::Ref;

/// One lexical slot.
#[derive(Clone, Debug, Default)]
pub(crate) enum Binding {
    #[default]
    Empty,
    Ref(Ref),
    /// A yieldable block; `None` records that the caller passed no block.
    Block(Option<Rc<CompiledBlock>>),
}

/// A lexical scope: symbol-indexed slots (slot 0 is `self`) and the caller scope blocks yield into.
#[derive(Debug)]
pub(crate) struct Scope {
    slots: RefCell<Vec<Binding>>,
    caller: Option<Rc<Scope>>,
}

impl Scope {
    pub(crate) fn root(size: u32, caller: Option<Rc<Scope>>) -> Rc<Self> {
        Rc::new(Self {
            slots: RefCell::new(vec![Binding::Empty; size as usize]),
            caller,
        })
    }

    /// A copy of this scope sharing its caller. Later writes to either side are not shared.
    pub(crate) fn child(&self) -> Rc<Self> {
        Rc::new(Self {
            slots: RefCell::new(self.slots.borrow().clone()),
            caller: self.caller.clone(),
        })
    }

    pub(crate) fn caller(&self) -> Option<&Rc<Scope>> {
        self.caller.as_ref()
    }

    pub(crate) fn bind(&self, symbol: u32, binding: Binding) {
        let mut slots = self.slots.borrow_mut();
        let index = symbol as usize;
        if index >= slots.len() {
            slots.resize(index + 1, Binding::Empty);
        }
        slots[index] = binding;
    }

    pub(crate) fn get(&self, symbol: u32) -> Binding {
        self.slots
            .borrow()
            .get(symbol as usize)
            .cloned()
            .unwrap_or_default()
    }

    /// Named reference bindings visible in this scope, for the `debugger` statement.
    pub(crate) fn refs(&self, symbols: &[u32]) -> Vec<Option<Ref>> {
        let slots = self.slots.borrow();
        symbols
            .iter()
            .map(|&s| match slots.get(s as usize) {
                Some(Binding::Ref(r)) => Some(r.clone()),
                _ => None,
            })
            .collect()
    }
}

/// Non-lexical bindings (a theme, a locale) that flow down through component invocations.
///
/// Cloning shares the map; [`DynamicScope::child`] forks it.
#[derive(Clone, Default)]
pub struct DynamicScope {
    vars: Rc<RefCell<BTreeMap<Rc<str>, Ref>>>,
}

impl DynamicScope {
    /// Creates an empty dynamic scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Forks this scope: the child sees current bindings, later writes stay local to each side.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            vars: Rc::new(RefCell::new(self.vars.borrow().clone())),
        }
    }

    /// Looks up a dynamic variable.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Ref> {
        self.vars.borrow().get(name).cloned()
    }

    /// Binds a dynamic variable.
    pub fn set(&self, name: &str, value: Ref) {
        self.vars.borrow_mut().insert(Rc::from(name), value);
    }
}

impl fmt::Debug for DynamicScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.vars.borrow().keys()).finish()
    }
}
