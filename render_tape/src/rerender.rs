// Copyright 2026 the Render Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The updating VM.
//!
//! A rerender walks the update program once, in document order. Leaf opcodes revalidate in
//! place; a stale branch decision throws to the nearest enclosing `Try`, which tears its span
//! down and runs the recorded bytecode again. Keyed lists reconcile their items by key before
//! their items are visited.

use alloc::vec::Vec;

use crate::bounds::RegionId;
use crate::env::NodeHandle;
use crate::iterate::{self, Item, ItemKey, diff_keys};
use crate::tag::Tag;
use crate::trace::{RunKind, TraceOutcome, UpdateEvent, UpdateKind};
use crate::updating::{OpId, OpKind, ResumeState};
use crate::vm::{Ctx, InternalError, Interp, RenderError, fault};

/// Rerender options.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RerenderOptions {
    /// Treat every updating opcode as stale regardless of its tag.
    pub always_revalidate: bool,
}

/// Receives update exceptions that no re-executable span caught.
pub trait ExceptionHandler {
    /// Handles a stale branch decision at the top level of the update program.
    fn handle(&mut self) -> Result<(), RenderError>;
}

/// The default handler: an exception reaching the top level is an error.
#[derive(Copy, Clone, Debug, Default)]
pub struct TopLevelHandler;

impl ExceptionHandler for TopLevelHandler {
    fn handle(&mut self) -> Result<(), RenderError> {
        Err(RenderError::UnhandledUpdate)
    }
}

enum Flow {
    Continue,
    Throw,
}

enum Step {
    Next,
    SkipTo(Option<OpId>),
    Throw,
}

pub(crate) struct Updater<'u, 'a, 't> {
    cx: &'u mut Ctx<'a, 't>,
    always: bool,
}

fn stale() -> RenderError {
    fault(0, InternalError::StaleState)
}

impl<'u, 'a, 't> Updater<'u, 'a, 't> {
    pub(crate) fn new(cx: &'u mut Ctx<'a, 't>, options: RerenderOptions) -> Self {
        Self {
            cx,
            always: options.always_revalidate,
        }
    }

    /// Walks the whole update program.
    pub(crate) fn run(&mut self, handler: &mut dyn ExceptionHandler) -> Result<(), RenderError> {
        match self.visit(None)? {
            Flow::Continue => Ok(()),
            Flow::Throw => handler.handle(),
        }
    }

    fn visit(&mut self, owner: Option<OpId>) -> Result<Flow, RenderError> {
        let mut cursor = self.cx.state.ops.head(owner);
        while let Some(id) = cursor {
            let mut next = self.cx.state.ops.next(id);
            match self.visit_op(id)? {
                Step::Next => {}
                Step::SkipTo(to) => next = to,
                Step::Throw => return Ok(Flow::Throw),
            }
            cursor = next;
        }
        Ok(Flow::Continue)
    }

    fn visit_op(&mut self, id: OpId) -> Result<Step, RenderError> {
        match self.cx.state.ops.get(id).map(|op| &op.kind) {
            Some(OpKind::Try { .. }) => {
                self.visit_try(id)?;
                Ok(Step::Next)
            }
            Some(OpKind::List { .. }) => {
                let fresh = self.sync_list(id)?;
                for item in self.cx.state.ops.children(Some(id)) {
                    if !fresh.contains(&item) {
                        self.visit_try(item)?;
                    }
                }
                Ok(Step::Next)
            }
            Some(_) => self.visit_leaf(id),
            None => Err(stale()),
        }
    }

    fn visit_try(&mut self, id: OpId) -> Result<(), RenderError> {
        match self.visit(Some(id))? {
            Flow::Continue => Ok(()),
            Flow::Throw => self.reexecute(id),
        }
    }

    fn visit_leaf(&mut self, id: OpId) -> Result<Step, RenderError> {
        let always = self.always;
        let cx = &mut *self.cx;
        let Some(op) = cx.state.ops.get_mut(id) else {
            return Err(stale());
        };
        let (kind, changed) = match &mut op.kind {
            OpKind::Assert {
                reference,
                last,
                snapshot,
            } => {
                if !always && reference.tag().validate(*snapshot) {
                    cx.trace.update(UpdateEvent::Skipped(UpdateKind::Assert));
                    return Ok(Step::Next);
                }
                let value = reference.value()?;
                if value != *last {
                    return Ok(Step::Throw);
                }
                *snapshot = reference.tag().value();
                (UpdateKind::Assert, false)
            }
            OpKind::Text {
                node,
                reference,
                last,
                snapshot,
            } => {
                if !always && reference.tag().validate(*snapshot) {
                    cx.trace.update(UpdateEvent::Skipped(UpdateKind::Text));
                    return Ok(Step::Next);
                }
                let value = reference.value()?;
                *snapshot = reference.tag().value();
                let changed = value != *last;
                if changed {
                    cx.env.tree().set_text(*node, &value.to_content());
                    *last = value;
                }
                (UpdateKind::Text, changed)
            }
            OpKind::Attr {
                element,
                name,
                reference,
                last,
                snapshot,
            } => {
                if !always && reference.tag().validate(*snapshot) {
                    cx.trace.update(UpdateEvent::Skipped(UpdateKind::Attribute));
                    return Ok(Step::Next);
                }
                let attr = reference.value()?.to_attribute();
                *snapshot = reference.tag().value();
                let changed = attr != *last;
                if changed {
                    cx.env
                        .tree()
                        .set_attribute(*element, name, attr.as_deref());
                    *last = attr;
                }
                (UpdateKind::Attribute, changed)
            }
            OpKind::Modifier {
                element,
                name,
                args,
                last,
                snapshot,
            } => {
                let tag = args.tag();
                if !always && tag.validate(*snapshot) {
                    cx.trace.update(UpdateEvent::Skipped(UpdateKind::Modifier));
                    return Ok(Step::Next);
                }
                let evaluated = args.evaluate()?;
                *snapshot = tag.value();
                let changed = evaluated != *last;
                if changed {
                    cx.env.tree().update_modifier(*element, name, &evaluated);
                    *last = evaluated;
                }
                (UpdateKind::Modifier, changed)
            }
            OpKind::Component {
                instance,
                args,
                snapshot,
            } => {
                let tag = args.tag();
                if !always && tag.validate(*snapshot) {
                    cx.trace.update(UpdateEvent::Skipped(UpdateKind::Component));
                    return Ok(Step::Next);
                }
                instance.update(args)?;
                *snapshot = tag.value();
                (UpdateKind::Component, true)
            }
            OpKind::DidUpdateLayout { instance, region } => {
                if let Some(bounds) = cx.state.regions.bounds(*region) {
                    instance.did_update_layout(bounds);
                }
                return Ok(Step::Next);
            }
            OpKind::Guard {
                group,
                snapshot,
                end,
            } => {
                if always || !Tag::Group(group.clone()).validate(*snapshot) {
                    return Ok(Step::Next);
                }
                let Some(end) = *end else {
                    return Ok(Step::Next);
                };
                cx.trace.update(UpdateEvent::Skipped(UpdateKind::Guard));
                return Ok(Step::SkipTo(cx.state.ops.next(end)));
            }
            OpKind::DidModify { guard } => {
                let guard = *guard;
                let members = cx.state.ops.span_tags(guard, id);
                if let Some(OpKind::Guard {
                    group, snapshot, ..
                }) = cx.state.ops.get_mut(guard).map(|op| &mut op.kind)
                {
                    group.reset(members);
                    *snapshot = Tag::Group(group.clone()).value();
                }
                return Ok(Step::Next);
            }
            OpKind::Try { .. } | OpKind::List { .. } => return Ok(Step::Next),
        };
        cx.trace
            .update(UpdateEvent::Revalidated { kind, changed });
        Ok(Step::Next)
    }

    /// Tears the span of a `Try` down and renders it again from its recorded state.
    fn reexecute(&mut self, id: OpId) -> Result<(), RenderError> {
        let (region, state) = match self.cx.state.ops.get(id).map(|op| &op.kind) {
            Some(OpKind::Try { region, state, .. }) => (*region, state.clone()),
            _ => return Err(stale()),
        };
        let cx = &mut *self.cx;
        let parent = cx.state.regions.parent(region).ok_or_else(stale)?;
        let next = cx.state.regions.reset(region, cx.env.tree(), cx.trace);
        cx.state.ops.clear_children(id);

        cx.trace.run_start(RunKind::Reexecute);
        let result = run_span(cx, &state, parent, next, region, id);
        match &result {
            Ok(()) => {
                cx.trace.run_end(RunKind::Reexecute, TraceOutcome::Ok);
                cx.trace.update(UpdateEvent::Reexecuted);
            }
            Err(e) => {
                cx.trace.run_end(RunKind::Reexecute, TraceOutcome::Error(e));
                cx.state.regions.reset(region, cx.env.tree(), cx.trace);
                cx.state.ops.clear_children(id);
            }
        }
        result
    }

    /// Reconciles a keyed list. Returns the items rendered fresh, which need no visit.
    fn sync_list(&mut self, id: OpId) -> Result<Vec<OpId>, RenderError> {
        let always = self.always;
        let cx = &mut *self.cx;
        let (region, state, iterable, key, snapshot) =
            match cx.state.ops.get(id).map(|op| &op.kind) {
                Some(OpKind::List {
                    region,
                    state,
                    iterable,
                    key,
                    snapshot,
                }) => (
                    *region,
                    state.clone(),
                    iterable.clone(),
                    key.clone(),
                    *snapshot,
                ),
                _ => return Err(stale()),
            };
        if !always && iterable.tag().validate(snapshot) {
            cx.trace.update(UpdateEvent::Skipped(UpdateKind::List));
            return Ok(Vec::new());
        }

        let items = iterate::items(&iterable.value()?, &key);
        let old = cx.state.ops.children(Some(id));
        let mut old_keys: Vec<ItemKey> = Vec::with_capacity(old.len());
        let mut old_regions: Vec<RegionId> = Vec::with_capacity(old.len());
        for &item in &old {
            match cx.state.ops.get(item).map(|op| &op.kind) {
                Some(OpKind::Try {
                    region,
                    item: Some(refs),
                    ..
                }) => {
                    old_keys.push(refs.key.clone());
                    old_regions.push(*region);
                }
                _ => return Err(stale()),
            }
        }
        let new_keys: Vec<ItemKey> = items.iter().map(|i| i.key.clone()).collect();
        let diff = diff_keys(&old_keys, &new_keys);

        let parent = cx.state.regions.parent(region).ok_or_else(stale)?;
        let anchor = {
            let tree = cx.env.tree();
            cx.state
                .regions
                .last_node(region)
                .and_then(|n| tree.next_sibling(n))
        };
        for &i in &diff.removed {
            cx.state
                .regions
                .destroy(old_regions[i], cx.env.tree(), cx.trace);
            cx.state.ops.remove(old[i]);
        }

        let (mut retained, mut moved, mut inserted) = (0, 0, 0);
        let mut next_anchor = anchor;
        let mut next_op: Option<OpId> = None;
        let mut placed: Vec<RegionId> = Vec::with_capacity(items.len());
        let mut fresh = Vec::new();
        for (pos, item) in items.into_iter().enumerate().rev() {
            let (item_region, item_op) = match diff.sources[pos] {
                Some(src) => {
                    let (op, r) = (old[src], old_regions[src]);
                    if let Some(OpKind::Try {
                        item: Some(refs), ..
                    }) = cx.state.ops.get(op).map(|op| &op.kind)
                    {
                        refs.value.update(item.value);
                        refs.memo.update(item.memo);
                    }
                    let tree = cx.env.tree();
                    let after = cx
                        .state
                        .regions
                        .last_node(r)
                        .and_then(|n| tree.next_sibling(n));
                    if after != next_anchor {
                        cx.state.regions.move_before(r, tree, next_anchor);
                        moved += 1;
                    }
                    retained += 1;
                    (r, op)
                }
                None => {
                    let (r, op) = insert_item(cx, &state, id, region, parent, next_anchor, item)?;
                    inserted += 1;
                    fresh.push(op);
                    (r, op)
                }
            };
            cx.state.ops.move_before(item_op, next_op);
            next_op = Some(item_op);
            next_anchor = cx.state.regions.first_node(item_region).or(next_anchor);
            placed.push(item_region);
        }
        placed.reverse();
        cx.state.regions.set_items(region, &placed);

        let revision = iterable.tag().value();
        if let Some(OpKind::List { snapshot, .. }) =
            cx.state.ops.get_mut(id).map(|op| &mut op.kind)
        {
            *snapshot = revision;
        }
        cx.trace.update(UpdateEvent::ListSynced {
            retained,
            moved,
            inserted,
            removed: diff.removed.len(),
        });
        Ok(fresh)
    }
}

fn run_span(
    cx: &mut Ctx<'_, '_>,
    state: &ResumeState,
    parent: NodeHandle,
    next: Option<NodeHandle>,
    region: RegionId,
    owner: OpId,
) -> Result<(), RenderError> {
    let mut interp = Interp::resume(cx, state, parent, next);
    interp.elements.resume_block(region);
    interp.push_owner(Some(owner));
    interp.run(cx)?;
    interp.check_balanced(0, 0)
}

/// Renders one new list item before `next`, inside the list's region.
fn insert_item(
    cx: &mut Ctx<'_, '_>,
    state: &ResumeState,
    list: OpId,
    list_region: RegionId,
    parent: NodeHandle,
    next: Option<NodeHandle>,
    item: Item,
) -> Result<(RegionId, OpId), RenderError> {
    cx.trace.run_start(RunKind::ListInsert);
    let mut interp = Interp::resume(cx, state, parent, next);
    interp.elements.resume_block(list_region);
    interp.push_owner(Some(list));
    let entered = interp.enter_item(cx, item);
    let result = entered.and_then(|(region, op)| {
        let ran = interp.run(cx).and_then(|()| interp.check_balanced(1, 1));
        if ran.is_err() {
            cx.state.regions.destroy(region, cx.env.tree(), cx.trace);
            cx.state.ops.remove(op);
        }
        ran.map(|()| (region, op))
    });
    match &result {
        Ok(_) => cx.trace.run_end(RunKind::ListInsert, TraceOutcome::Ok),
        Err(e) => cx.trace.run_end(RunKind::ListInsert, TraceOutcome::Error(e)),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::boxed::Box;
    use alloc::rc::Rc;
    use alloc::string::String;
    use alloc::vec;
    use alloc::vec::Vec;

    use crate::asm::Asm;
    use crate::compile::{Registry, compile_layout, compile_template};
    use crate::component::{
        Capabilities, CapturedArgs, ComponentDefinition, ComponentInstance, ComponentManager,
    };
    use crate::reference::{ConstReference, ExprError, Ref};
    use crate::scope::DynamicScope;
    use crate::heap::{CompiledTemplate, Program};
    use crate::reference::RootReference;
    use crate::render::RenderResult;
    use crate::syntax::{Args, Element, Expr, Layout, Statement, Template};
    use crate::trace::{TraceMask, TraceSink};
    use crate::tree::MemoryTree;
    use crate::value::Value;
    use crate::vm::{Limits, RenderRoot, Vm};

    #[derive(Default)]
    struct Updates(Vec<UpdateEvent>);

    impl TraceSink for Updates {
        fn mask(&self) -> TraceMask {
            TraceMask::UPDATE
        }

        fn update(&mut self, event: UpdateEvent) {
            self.0.push(event);
        }
    }

    fn title(text: &str) -> Value {
        Value::object([("title", Value::str(text))])
    }

    fn render(
        program: &Program,
        compiled: &CompiledTemplate,
        model: &Rc<RootReference>,
    ) -> (Vm<MemoryTree>, RenderResult) {
        let mut vm = Vm::new(MemoryTree::new(), Limits::default());
        let root = RenderRoot::new(vm.env().root(), model.clone());
        let result = vm
            .render(program, compiled, &root, TraceMask::NONE, None)
            .unwrap();
        (vm, result)
    }

    fn html(vm: &Vm<MemoryTree>) -> String {
        vm.env().inner_html(vm.env().root())
    }

    fn heading() -> (Program, CompiledTemplate) {
        let mut program = Program::new();
        let compiled = compile_template(
            &mut program,
            &Registry::new(),
            &Template::new(vec![
                Element::new("h1")
                    .bind("title", Expr::path("this.title"))
                    .child(Statement::append(Expr::path("this.title")))
                    .build(),
            ]),
        )
        .unwrap();
        (program, compiled)
    }

    #[test]
    fn unchanged_inputs_are_skipped() {
        let (program, compiled) = heading();
        let model = RootReference::new(title("a"));
        let (mut vm, mut result) = render(&program, &compiled, &model);
        vm.env_mut().reset_mutations();

        let mut sink = Updates::default();
        result
            .rerender(
                &mut vm,
                &program,
                RerenderOptions::default(),
                TraceMask::UPDATE,
                Some(&mut sink),
            )
            .unwrap();
        assert!(!sink.0.is_empty());
        assert!(
            sink.0
                .iter()
                .all(|e| matches!(e, UpdateEvent::Skipped(_)))
        );
        assert_eq!(vm.env().mutations(), 0);
    }

    #[test]
    fn always_revalidate_recomputes_without_touching_output() {
        let (program, compiled) = heading();
        let model = RootReference::new(title("a"));
        let (mut vm, mut result) = render(&program, &compiled, &model);
        vm.env_mut().reset_mutations();

        let mut sink = Updates::default();
        result
            .rerender(
                &mut vm,
                &program,
                RerenderOptions {
                    always_revalidate: true,
                },
                TraceMask::UPDATE,
                Some(&mut sink),
            )
            .unwrap();
        assert!(
            sink.0
                .iter()
                .all(|e| !matches!(e, UpdateEvent::Skipped(_)))
        );
        assert!(sink.0.contains(&UpdateEvent::Revalidated {
            kind: UpdateKind::Text,
            changed: false,
        }));
        assert!(sink.0.contains(&UpdateEvent::Revalidated {
            kind: UpdateKind::Attribute,
            changed: false,
        }));
        assert_eq!(vm.env().mutations(), 0);
        assert_eq!(html(&vm), "<h1 title=\"a\">a</h1>");
    }

    #[test]
    fn changed_text_and_attribute_are_patched_in_place() {
        let (program, compiled) = heading();
        let model = RootReference::new(title("a"));
        let (mut vm, mut result) = render(&program, &compiled, &model);
        vm.env_mut().reset_mutations();

        model.update(title("b"));
        result
            .rerender(
                &mut vm,
                &program,
                RerenderOptions::default(),
                TraceMask::NONE,
                None,
            )
            .unwrap();
        assert_eq!(html(&vm), "<h1 title=\"b\">b</h1>");
        assert_eq!(vm.env().mutations(), 2);
    }

    /// A branch emitted without a surrounding re-executable span.
    fn bare_branch() -> (Program, CompiledTemplate) {
        let mut program = Program::new();
        let (heap, constants) = program.parts_mut();
        let mut asm = Asm::new(constants);
        asm.start_labels()
            .get_variable(0)
            .get_property("flag")
            .to_boolean()
            .jump_unless("ELSE")
            .text("on")
            .label("ELSE");
        asm.stop_labels().unwrap();
        let handle = asm.commit(heap).unwrap();
        (
            program,
            CompiledTemplate {
                handle,
                symbols: Box::new([]),
            },
        )
    }

    struct Accept(usize);

    impl ExceptionHandler for Accept {
        fn handle(&mut self) -> Result<(), RenderError> {
            self.0 += 1;
            Ok(())
        }
    }

    #[test]
    fn exceptions_reaching_the_top_go_to_the_handler() {
        let (program, compiled) = bare_branch();
        let model = RootReference::new(Value::object([("flag", Value::Bool(true))]));
        let (mut vm, mut result) = render(&program, &compiled, &model);
        assert_eq!(html(&vm), "on");

        model.update(Value::object([("flag", Value::Bool(false))]));
        let err = result
            .rerender(
                &mut vm,
                &program,
                RerenderOptions::default(),
                TraceMask::NONE,
                None,
            )
            .unwrap_err();
        assert_eq!(err, RenderError::UnhandledUpdate);

        let mut handler = Accept(0);
        result
            .rerender_with(
                &mut vm,
                &program,
                RerenderOptions::default(),
                &mut handler,
                TraceMask::NONE,
                None,
            )
            .unwrap();
        assert_eq!(handler.0, 1);
        assert_eq!(html(&vm), "on");
    }

    struct Toggle;

    impl ComponentManager for Toggle {
        fn create(
            &self,
            _definition: &ComponentDefinition,
            _args: Option<&CapturedArgs>,
            _dynamic_scope: &DynamicScope,
            _has_default_block: bool,
        ) -> Result<Rc<dyn ComponentInstance>, ExprError> {
            Ok(Rc::new(ToggleInstance))
        }
    }

    struct ToggleInstance;

    impl ComponentInstance for ToggleInstance {
        fn self_ref(&self) -> Ref {
            ConstReference::new(Value::Null)
        }
    }

    fn shown(show: bool) -> Value {
        Value::object([("show", Value::Bool(show))])
    }

    #[test]
    fn cache_groups_track_only_live_opcodes() {
        let mut program = Program::new();
        let mut registry = Registry::new();
        let layout = compile_layout(
            &mut program,
            &registry,
            &Layout::tagless(vec![Statement::if_(
                Expr::path("@show"),
                vec![Statement::append(Expr::path("@show"))],
            )]),
        )
        .unwrap();
        registry.register_component(ComponentDefinition::new(
            "Toggle",
            Rc::new(Toggle),
            Capabilities::default(),
            layout,
        ));
        let compiled = compile_template(
            &mut program,
            &registry,
            &Template::new(vec![Statement::component(
                "Toggle",
                Args::default().with("show", Expr::path("this.show")),
            )]),
        )
        .unwrap();
        let model = RootReference::new(shown(true));
        let (mut vm, mut result) = render(&program, &compiled, &model);
        let before = result.cache_group_sizes();
        assert_eq!(before.len(), 1);

        for i in 0..200 {
            model.update(shown(i % 2 == 1));
            result
                .rerender(
                    &mut vm,
                    &program,
                    RerenderOptions::default(),
                    TraceMask::NONE,
                    None,
                )
                .unwrap();
        }
        assert_eq!(result.cache_group_sizes(), before);

        let mut sink = Updates::default();
        result
            .rerender(
                &mut vm,
                &program,
                RerenderOptions::default(),
                TraceMask::UPDATE,
                Some(&mut sink),
            )
            .unwrap();
        assert!(sink.0.contains(&UpdateEvent::Skipped(UpdateKind::Guard)));
        assert!(
            sink.0
                .iter()
                .all(|e| matches!(e, UpdateEvent::Skipped(_)))
        );
    }
}
