// Copyright 2026 the Render Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Component runtime interfaces: definitions, managers, instances and helpers.
//!
//! The core never defines what a component *is*. It calls a [`ComponentManager`] to create an
//! instance, asks the instance for its `self` reference, and invokes its lifecycle hooks at fixed
//! points while rendering, updating and tearing down.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::fmt;

use crate::bounds::Bounds;
use crate::env::NodeHandle;
use crate::heap::CompiledLayout;
use crate::reference::{ExprError, Ref};
use crate::scope::DynamicScope;
use crate::tag::Tag;
use crate::value::Value;

/// Static capability flags of a component definition.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// The manager rewrites arguments before creation ([`ComponentManager::prepare_args`]).
    pub prepare_args: bool,
    /// The manager receives captured arguments at creation and on every change.
    pub create_args: bool,
}

/// Arguments captured at an invocation site.
#[derive(Clone, Debug, Default)]
pub struct CapturedArgs {
    /// Positional argument references, in order.
    pub positional: Vec<Ref>,
    /// Named argument references, in source order.
    pub named: Vec<(Rc<str>, Ref)>,
}

impl CapturedArgs {
    /// Returns the named argument `name`.
    #[must_use]
    pub fn named(&self, name: &str) -> Option<&Ref> {
        self.named
            .iter()
            .find(|(n, _)| &**n == name)
            .map(|(_, r)| r)
    }

    /// The union of every argument's tag.
    #[must_use]
    pub fn tag(&self) -> Tag {
        Tag::combine(
            self.positional
                .iter()
                .chain(self.named.iter().map(|(_, r)| r))
                .map(|r| r.tag()),
        )
    }

    /// Reads every argument.
    pub fn evaluate(&self) -> Result<EvaluatedArgs, ExprError> {
        let positional = self
            .positional
            .iter()
            .map(|r| r.value())
            .collect::<Result<Vec<_>, _>>()?;
        let named = self
            .named
            .iter()
            .map(|(n, r)| Ok((n.clone(), r.value()?)))
            .collect::<Result<Vec<_>, ExprError>>()?;
        Ok(EvaluatedArgs { positional, named })
    }
}

/// Argument values read at one point in time.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EvaluatedArgs {
    /// Positional values.
    pub positional: Vec<Value>,
    /// Named values.
    pub named: Vec<(Rc<str>, Value)>,
}

impl EvaluatedArgs {
    /// Positional value `index`, or `undefined`.
    #[must_use]
    pub fn at(&self, index: usize) -> Value {
        self.positional.get(index).cloned().unwrap_or_default()
    }

    /// Named value `name`, or `undefined`.
    #[must_use]
    pub fn get(&self, name: &str) -> Value {
        self.named
            .iter()
            .find(|(n, _)| &**n == name)
            .map(|(_, v)| v.clone())
            .unwrap_or_default()
    }
}

/// A live component created by a [`ComponentManager`].
///
/// Every hook except [`ComponentInstance::self_ref`] has a no-op default.
pub trait ComponentInstance {
    /// The reference bound to `this` inside the layout.
    fn self_ref(&self) -> Ref;

    /// Tag name of the wrapping element, for wrapped layouts. `None` renders a `div`.
    fn tag_name(&self) -> Option<Rc<str>> {
        None
    }

    /// Called once the wrapping element exists, before its attributes are flushed.
    fn did_create_element(&self, _element: NodeHandle) {}

    /// Called after the first render of the layout.
    fn did_render_layout(&self, _bounds: Bounds) {}

    /// Called during rerender when captured arguments changed (`create_args` only).
    fn update(&self, _args: &CapturedArgs) -> Result<(), ExprError> {
        Ok(())
    }

    /// Called after a rerender pass that revisited the component.
    fn did_update_layout(&self, _bounds: Bounds) {}

    /// The registered destructor. Runs at most once.
    fn destroy(&self) {}
}

/// Creates component instances for a family of definitions.
pub trait ComponentManager {
    /// Rewrites captured arguments before creation. Only called when
    /// [`Capabilities::prepare_args`] is set; `None` keeps the arguments as they are.
    fn prepare_args(
        &self,
        _definition: &ComponentDefinition,
        _args: &CapturedArgs,
    ) -> Result<Option<CapturedArgs>, ExprError> {
        Ok(None)
    }

    /// Creates an instance.
    ///
    /// `args` is `Some` only when [`Capabilities::create_args`] is set.
    fn create(
        &self,
        definition: &ComponentDefinition,
        args: Option<&CapturedArgs>,
        dynamic_scope: &DynamicScope,
        has_default_block: bool,
    ) -> Result<Rc<dyn ComponentInstance>, ExprError>;
}

/// A resolved component: name, manager, capabilities and compiled layout.
///
/// Definitions compare by identity.
pub struct ComponentDefinition {
    name: Box<str>,
    manager: Rc<dyn ComponentManager>,
    capabilities: Capabilities,
    layout: Rc<CompiledLayout>,
}

impl ComponentDefinition {
    /// Creates a definition.
    #[must_use]
    pub fn new(
        name: &str,
        manager: Rc<dyn ComponentManager>,
        capabilities: Capabilities,
        layout: Rc<CompiledLayout>,
    ) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            manager,
            capabilities,
            layout,
        })
    }

    /// The name this definition was registered under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The manager that creates instances.
    #[must_use]
    pub fn manager(&self) -> &Rc<dyn ComponentManager> {
        &self.manager
    }

    /// Static capability flags.
    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// The compiled layout.
    #[must_use]
    pub fn layout(&self) -> &Rc<CompiledLayout> {
        &self.layout
    }

    /// Returns `true` if static invocations may bind arguments directly into the layout scope.
    ///
    /// Requires no argument preparation, no argument capture for the manager, and a layout that
    /// does not inspect its scope at runtime.
    #[must_use]
    pub fn allows_fast_path(&self) -> bool {
        !self.capabilities.prepare_args && !self.capabilities.create_args && !self.layout.has_eval
    }
}

impl fmt::Debug for ComponentDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDefinition")
            .field("name", &self.name)
            .field("capabilities", &self.capabilities)
            .field("layout", &self.layout.handle)
            .finish_non_exhaustive()
    }
}

/// A named function over evaluated arguments.
pub trait Helper {
    /// Computes the helper's value.
    fn compute(&self, args: &EvaluatedArgs) -> Result<Value, ExprError>;

    /// Volatile helpers are recomputed on every rerender.
    fn is_volatile(&self) -> bool {
        false
    }
}

impl<F> Helper for F
where
    F: Fn(&EvaluatedArgs) -> Result<Value, ExprError>,
{
    fn compute(&self, args: &EvaluatedArgs) -> Result<Value, ExprError> {
        self(args)
    }
}

/// Wraps a helper so it is recomputed on every rerender.
pub struct Volatile<H>(pub H);

impl<H: Helper> Helper for Volatile<H> {
    fn compute(&self, args: &EvaluatedArgs) -> Result<Value, ExprError> {
        self.0.compute(args)
    }

    fn is_volatile(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::Handle;
    use crate::reference::{ConstReference, RootReference};

    struct Nothing;

    impl ComponentManager for Nothing {
        fn create(
            &self,
            _definition: &ComponentDefinition,
            _args: Option<&CapturedArgs>,
            _dynamic_scope: &DynamicScope,
            _has_default_block: bool,
        ) -> Result<Rc<dyn ComponentInstance>, ExprError> {
            Err(ExprError::new("not creatable"))
        }
    }

    fn layout(has_eval: bool) -> Rc<CompiledLayout> {
        Rc::new(CompiledLayout {
            handle: Handle(0),
            symbols: Box::new([]),
            has_eval,
        })
    }

    #[test]
    fn fast_path_depends_only_on_static_flags() {
        let m: Rc<dyn ComponentManager> = Rc::new(Nothing);
        let plain = ComponentDefinition::new("a", m.clone(), Capabilities::default(), layout(false));
        assert!(plain.allows_fast_path());
        let eval = ComponentDefinition::new("b", m.clone(), Capabilities::default(), layout(true));
        assert!(!eval.allows_fast_path());
        let prep = ComponentDefinition::new(
            "c",
            m,
            Capabilities {
                prepare_args: true,
                create_args: false,
            },
            layout(false),
        );
        assert!(!prep.allows_fast_path());
    }

    #[test]
    fn captured_args_evaluate_and_tag() {
        let root = RootReference::new(Value::object([("n", Value::Int(2))]));
        let args = CapturedArgs {
            positional: alloc::vec![ConstReference::new(Value::Int(1))],
            named: alloc::vec![(Rc::from("n"), root.get("n") as Ref)],
        };
        let v = args.evaluate().unwrap();
        assert_eq!(v.at(0), Value::Int(1));
        assert_eq!(v.at(5), Value::Undefined);
        assert_eq!(v.get("n"), Value::Int(2));
        let snap = args.tag().value();
        root.update(Value::Null);
        assert!(!args.tag().validate(snap));
    }

    #[test]
    fn closures_are_helpers() {
        let add = |a: &EvaluatedArgs| -> Result<Value, ExprError> {
            match (a.at(0), a.at(1)) {
                (Value::Int(x), Value::Int(y)) => Ok(Value::Int(x + y)),
                _ => Err(ExprError::new("add expects numbers")),
            }
        };
        let args = EvaluatedArgs {
            positional: alloc::vec![Value::Int(2), Value::Int(3)],
            named: Vec::new(),
        };
        assert_eq!(add.compute(&args), Ok(Value::Int(5)));
        assert!(!add.is_volatile());
        assert!(Volatile(add).is_volatile());
    }
}
