// Copyright 2026 the Render Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render entry points: first render, the step-wise render iterator, rerender and destroy.

use core::fmt;

use crate::bounds::{Bounds, RegionId};
use crate::env::Environment;
use crate::heap::{CompiledTemplate, Program};
use crate::rerender::{ExceptionHandler, RerenderOptions, TopLevelHandler, Updater};
use crate::trace::{RunKind, TraceMask, TraceOutcome, TraceSink, Tracer};
use crate::vm::{Ctx, Interp, RenderError, RenderRoot, RenderState, Vm};

/// The output of a render pass: its bounds, update program and destructors.
pub struct RenderResult {
    state: RenderState,
    root: Option<RegionId>,
}

impl fmt::Debug for RenderResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderResult")
            .field("bounds", &self.bounds())
            .field("ops", &self.state.ops.len())
            .finish_non_exhaustive()
    }
}

/// One step of a [`TemplateIterator`].
#[derive(Debug)]
pub enum IteratorResult {
    /// More instructions remain.
    Pending,
    /// The template finished rendering.
    Done(RenderResult),
}

/// A render pass that executes one instruction per [`TemplateIterator::next`].
pub struct TemplateIterator<'v, E> {
    vm: &'v mut Vm<E>,
    program: &'v Program,
    tracer: Tracer<'v>,
    interp: Interp,
    root: RegionId,
    state: Option<RenderState>,
}

impl<E> fmt::Debug for TemplateIterator<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateIterator")
            .field("done", &self.state.is_none())
            .finish_non_exhaustive()
    }
}

impl<E: Environment> Vm<E> {
    /// Renders `template` into `root`.
    ///
    /// On failure, everything the pass created is torn down before the error is returned.
    pub fn render<'v>(
        &'v mut self,
        program: &'v Program,
        template: &CompiledTemplate,
        root: &RenderRoot,
        trace_mask: TraceMask,
        trace: Option<&'v mut dyn TraceSink>,
    ) -> Result<RenderResult, RenderError> {
        self.render_iter(program, template, root, trace_mask, trace)?
            .sync()
    }

    /// Starts a render pass that the caller drives step by step.
    pub fn render_iter<'v>(
        &'v mut self,
        program: &'v Program,
        template: &CompiledTemplate,
        root: &RenderRoot,
        trace_mask: TraceMask,
        trace: Option<&'v mut dyn TraceSink>,
    ) -> Result<TemplateIterator<'v, E>, RenderError> {
        let mut tracer = Tracer::new(trace_mask, trace);
        let mut state = RenderState::default();
        tracer.run_start(RunKind::Render);
        self.env.begin();
        let mut cx = Ctx {
            env: &mut self.env,
            program,
            state: &mut state,
            limits: &self.limits,
            trace: &mut tracer,
        };
        let started = Interp::for_template(&mut cx, template.handle, template.scope_size(), root);
        let (interp, root) = match started {
            Ok(v) => v,
            Err(e) => {
                self.env.commit();
                tracer.run_end(RunKind::Render, TraceOutcome::Error(&e));
                return Err(e);
            }
        };
        Ok(TemplateIterator {
            vm: self,
            program,
            tracer,
            interp,
            root,
            state: Some(state),
        })
    }
}

impl<E: Environment> TemplateIterator<'_, E> {
    /// Executes one instruction.
    ///
    /// Returns [`RenderError::Destroyed`] once the result has been handed out.
    #[allow(
        clippy::should_implement_trait,
        reason = "steps are fallible and hand out the result once"
    )]
    pub fn next(&mut self) -> Result<IteratorResult, RenderError> {
        let Some(state) = self.state.as_mut() else {
            return Err(RenderError::Destroyed);
        };
        let vm = &mut *self.vm;
        let mut cx = Ctx {
            env: &mut vm.env,
            program: self.program,
            state,
            limits: &vm.limits,
            trace: &mut self.tracer,
        };
        let stepped = if self.interp.is_halted() {
            self.interp.finish_render(&mut cx).map(Some)
        } else {
            self.interp.step(&mut cx).map(|()| None)
        };
        match stepped {
            Ok(None) => Ok(IteratorResult::Pending),
            Ok(Some(root)) => {
                debug_assert_eq!(root, self.root);
                let state = self.state.take().unwrap_or_default();
                self.vm.env.commit();
                self.tracer.run_end(RunKind::Render, TraceOutcome::Ok);
                Ok(IteratorResult::Done(RenderResult {
                    state,
                    root: Some(root),
                }))
            }
            Err(e) => {
                if let Some(mut state) = self.state.take() {
                    state
                        .regions
                        .destroy(self.root, self.vm.env.tree(), &mut self.tracer);
                }
                self.vm.env.commit();
                self.tracer.run_end(RunKind::Render, TraceOutcome::Error(&e));
                Err(e)
            }
        }
    }

    /// Runs the pass to completion.
    pub fn sync(mut self) -> Result<RenderResult, RenderError> {
        loop {
            if let IteratorResult::Done(result) = self.next()? {
                return Ok(result);
            }
        }
    }
}

impl RenderResult {
    /// The output span of the whole template, or `None` once destroyed.
    #[must_use]
    pub fn bounds(&self) -> Option<Bounds> {
        self.state.regions.bounds(self.root?)
    }

    /// Returns `true` once [`RenderResult::destroy`] ran.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.root.is_none()
    }

    /// Number of live updating opcodes.
    #[must_use]
    pub fn update_ops(&self) -> usize {
        self.state.ops.len()
    }

    /// Number of live regions.
    #[must_use]
    pub fn live_regions(&self) -> usize {
        self.state.regions.live()
    }

    #[cfg(test)]
    pub(crate) fn cache_group_sizes(&self) -> alloc::vec::Vec<usize> {
        self.state.ops.group_sizes()
    }

    /// Brings the output up to date with the references it read.
    pub fn rerender<E: Environment>(
        &mut self,
        vm: &mut Vm<E>,
        program: &Program,
        options: RerenderOptions,
        trace_mask: TraceMask,
        trace: Option<&mut dyn TraceSink>,
    ) -> Result<(), RenderError> {
        self.rerender_with(vm, program, options, &mut TopLevelHandler, trace_mask, trace)
    }

    /// Like [`RenderResult::rerender`], with a caller-supplied top-level exception handler.
    pub fn rerender_with<E: Environment>(
        &mut self,
        vm: &mut Vm<E>,
        program: &Program,
        options: RerenderOptions,
        handler: &mut dyn ExceptionHandler,
        trace_mask: TraceMask,
        trace: Option<&mut dyn TraceSink>,
    ) -> Result<(), RenderError> {
        if self.root.is_none() {
            return Err(RenderError::Destroyed);
        }
        let mut tracer = Tracer::new(trace_mask, trace);
        tracer.run_start(RunKind::Rerender);
        vm.env.begin();
        let result = {
            let mut cx = Ctx {
                env: &mut vm.env,
                program,
                state: &mut self.state,
                limits: &vm.limits,
                trace: &mut tracer,
            };
            Updater::new(&mut cx, options).run(handler)
        };
        vm.env.commit();
        match &result {
            Ok(()) => tracer.run_end(RunKind::Rerender, TraceOutcome::Ok),
            Err(e) => tracer.run_end(RunKind::Rerender, TraceOutcome::Error(e)),
        }
        result
    }

    /// Tears the output down: destructors run innermost first, then the output is removed.
    ///
    /// Calling this again is a no-op.
    pub fn destroy<E: Environment>(&mut self, vm: &mut Vm<E>) {
        self.destroy_traced(vm, TraceMask::NONE, None);
    }

    /// Like [`RenderResult::destroy`], reporting teardown to `trace`.
    pub fn destroy_traced<E: Environment>(
        &mut self,
        vm: &mut Vm<E>,
        trace_mask: TraceMask,
        trace: Option<&mut dyn TraceSink>,
    ) {
        let Some(root) = self.root.take() else {
            return;
        };
        let mut tracer = Tracer::new(trace_mask, trace);
        vm.env.begin();
        self.state.regions.destroy(root, vm.env.tree(), &mut tracer);
        self.state.ops = Default::default();
        vm.env.commit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use alloc::vec::Vec;

    use crate::compile::{Registry, compile_template};
    use crate::reference::RootReference;
    use crate::syntax::{Element, Expr, Statement, Template};
    use crate::tree::MemoryTree;
    use crate::value::Value;
    use crate::vm::Limits;

    fn setup(statements: Vec<Statement>) -> (Program, CompiledTemplate) {
        let mut program = Program::new();
        let compiled =
            compile_template(&mut program, &Registry::new(), &Template::new(statements)).unwrap();
        (program, compiled)
    }

    #[test]
    fn each_pass_is_one_transaction() {
        let (program, compiled) = setup(vec![Statement::append(Expr::path("this.n"))]);
        let model = RootReference::new(Value::object([("n", Value::Int(1))]));
        let mut vm = Vm::new(MemoryTree::new(), Limits::default());
        let root = RenderRoot::new(vm.env().root(), model.clone());
        let mut result = vm
            .render(&program, &compiled, &root, TraceMask::NONE, None)
            .unwrap();
        assert_eq!(vm.env().transactions(), 1);

        model.update(Value::object([("n", Value::Int(2))]));
        result
            .rerender(
                &mut vm,
                &program,
                RerenderOptions::default(),
                TraceMask::NONE,
                None,
            )
            .unwrap();
        assert_eq!(vm.env().transactions(), 2);

        result.destroy(&mut vm);
        assert_eq!(vm.env().transactions(), 3);
        result.destroy(&mut vm);
        assert_eq!(vm.env().transactions(), 3);
    }

    #[test]
    fn destroy_releases_bounds_regions_and_ops() {
        let (program, compiled) = setup(vec![
            Element::new("p")
                .child(Statement::if_(
                    Expr::path("this.on"),
                    vec![Statement::append(Expr::path("this.label"))],
                ))
                .build(),
        ]);
        let model = RootReference::new(Value::object([
            ("on", Value::Bool(true)),
            ("label", Value::str("x")),
        ]));
        let mut vm = Vm::new(MemoryTree::new(), Limits::default());
        let root = RenderRoot::new(vm.env().root(), model);
        let mut result = vm
            .render(&program, &compiled, &root, TraceMask::NONE, None)
            .unwrap();
        assert!(result.bounds().is_some());
        assert!(result.update_ops() > 0);
        assert!(result.live_regions() > 1);
        assert!(!result.is_destroyed());

        result.destroy(&mut vm);
        assert!(result.is_destroyed());
        assert_eq!(result.bounds(), None);
        assert_eq!(result.live_regions(), 0);
        assert_eq!(result.update_ops(), 0);
        assert_eq!(vm.env().inner_html(vm.env().root()), "");
        assert_eq!(
            result.rerender(
                &mut vm,
                &program,
                RerenderOptions::default(),
                TraceMask::NONE,
                None,
            ),
            Err(RenderError::Destroyed)
        );
    }

    #[derive(Default)]
    struct Runs(Vec<(RunKind, bool)>);

    impl TraceSink for Runs {
        fn mask(&self) -> TraceMask {
            TraceMask::RUN
        }

        fn run_end(&mut self, kind: RunKind, outcome: TraceOutcome<'_>) {
            self.0.push((kind, matches!(outcome, TraceOutcome::Ok)));
        }
    }

    #[test]
    fn render_reports_to_a_borrowed_sink() {
        let (program, compiled) = setup(vec![Statement::append(Expr::path("this.n"))]);
        let model = RootReference::new(Value::object([("n", Value::Int(4))]));
        let mut vm = Vm::new(MemoryTree::new(), Limits::default());
        let root = RenderRoot::new(vm.env().root(), model);
        let mut runs = Runs::default();
        let mask = runs.mask();
        let result = vm
            .render(&program, &compiled, &root, mask, Some(&mut runs))
            .unwrap();
        assert_eq!(runs.0, [(RunKind::Render, true)]);
        assert!(!result.is_destroyed());
        assert_eq!(vm.env().inner_html(vm.env().root()), "4");
    }

    #[test]
    fn static_templates_record_no_updates() {
        let (program, compiled) = setup(vec![
            Element::new("p")
                .attr("class", "x")
                .child(Statement::text("hi"))
                .build(),
        ]);
        let mut vm = Vm::new(MemoryTree::new(), Limits::default());
        let root = RenderRoot::new(vm.env().root(), RootReference::new(Value::Null));
        let result = vm
            .render(&program, &compiled, &root, TraceMask::NONE, None)
            .unwrap();
        assert_eq!(result.update_ops(), 0);
        assert_eq!(
            vm.env().inner_html(vm.env().root()),
            "<p class=\"x\">hi</p>"
        );
    }

    #[test]
    fn iterator_steps_one_instruction_at_a_time() {
        let (program, compiled) = setup(vec![Statement::text("a"), Statement::text("b")]);
        let mut vm = Vm::new(MemoryTree::new(), Limits::default());
        let root = RenderRoot::new(vm.env().root(), RootReference::new(Value::Null));
        let mut iter = vm
            .render_iter(&program, &compiled, &root, TraceMask::NONE, None)
            .unwrap();
        let mut pending = 0;
        let result = loop {
            match iter.next().unwrap() {
                IteratorResult::Pending => pending += 1,
                IteratorResult::Done(result) => break result,
            }
        };
        // text, text, return
        assert_eq!(pending, 3);
        assert!(!result.is_destroyed());
        assert!(matches!(iter.next(), Err(RenderError::Destroyed)));
    }
}
