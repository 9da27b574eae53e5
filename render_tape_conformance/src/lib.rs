// Copyright 2026 the Render Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared fixtures for the `render_tape` conformance scenarios.
//!
//! [`Harness`] owns a program, a VM over a [`HostEnv`] and a model root. Components defined
//! through it are created by a [`RecordingManager`], whose instances append every lifecycle hook
//! to a shared [`Log`].

use std::cell::RefCell;
use std::rc::Rc;

use render_tape::bounds::Bounds;
use render_tape::compile::{CompileError, Registry, Resolver, compile_layout, compile_template};
use render_tape::component::{
    Capabilities, CapturedArgs, ComponentDefinition, ComponentInstance, ComponentManager, Helper,
};
use render_tape::env::{Environment, NodeHandle, TreeAdapter};
use render_tape::heap::{CompiledTemplate, Program};
use render_tape::reference::{ExprError, Ref, RootReference};
use render_tape::render::RenderResult;
use render_tape::rerender::RerenderOptions;
use render_tape::scope::DynamicScope;
use render_tape::syntax::{Layout, Template};
use render_tape::trace::{
    DestroyEvent, RunKind, ScopeKind, TraceMask, TraceOutcome, TraceSink, UpdateEvent,
};
use render_tape::tree::MemoryTree;
use render_tape::value::Value;
use render_tape::vm::{Limits, RenderError, RenderRoot, Vm};

/// Lifecycle log shared by every recording instance.
pub type Log = Rc<RefCell<Vec<String>>>;

/// Creates [`RecordingInstance`]s and logs argument preparation.
#[derive(Debug)]
pub struct RecordingManager {
    log: Log,
}

impl RecordingManager {
    /// Creates a manager writing to `log`.
    pub fn new(log: Log) -> Self {
        Self { log }
    }
}

impl ComponentManager for RecordingManager {
    fn prepare_args(
        &self,
        definition: &ComponentDefinition,
        _args: &CapturedArgs,
    ) -> Result<Option<CapturedArgs>, ExprError> {
        self.log
            .borrow_mut()
            .push(format!("prepare:{}", definition.name()));
        Ok(None)
    }

    fn create(
        &self,
        definition: &ComponentDefinition,
        args: Option<&CapturedArgs>,
        _dynamic_scope: &DynamicScope,
        _has_default_block: bool,
    ) -> Result<Rc<dyn ComponentInstance>, ExprError> {
        let mut label = definition.name().to_owned();
        if let Some(args) = args {
            let id = args.evaluate()?.get("id");
            if !id.is_nullish() {
                label = format!("{label}:{id}");
            }
        }
        self.log.borrow_mut().push(format!("create:{label}"));
        Ok(Rc::new(RecordingInstance {
            label,
            this: RootReference::new(Value::object([("name", Value::str(definition.name()))])),
            log: self.log.clone(),
        }))
    }
}

/// A component instance that logs its hooks.
///
/// `this.name` reads the definition's name. Wrapped layouts render as `<section>`.
#[derive(Debug)]
pub struct RecordingInstance {
    label: String,
    this: Rc<RootReference>,
    log: Log,
}

impl RecordingInstance {
    fn record(&self, hook: &str) {
        self.log.borrow_mut().push(format!("{hook}:{}", self.label));
    }
}

impl ComponentInstance for RecordingInstance {
    fn self_ref(&self) -> Ref {
        self.this.clone()
    }

    fn tag_name(&self) -> Option<Rc<str>> {
        Some(Rc::from("section"))
    }

    fn did_create_element(&self, _element: NodeHandle) {
        self.record("element");
    }

    fn did_render_layout(&self, _bounds: Bounds) {
        self.record("did_render");
    }

    fn update(&self, _args: &CapturedArgs) -> Result<(), ExprError> {
        self.record("update");
        Ok(())
    }

    fn did_update_layout(&self, _bounds: Bounds) {
        self.record("did_update");
    }

    fn destroy(&self) {
        self.record("destroy");
    }
}

/// A host environment: a [`MemoryTree`], a component registry for `{{component "name"}}`, and
/// the locals captured by every `{{debugger}}`.
#[derive(Debug, Default)]
pub struct HostEnv {
    /// The output tree.
    pub tree: MemoryTree,
    /// Components and helpers.
    pub registry: Registry,
    /// Locals seen by each `{{debugger}}`, in order.
    pub debugged: Vec<Vec<(Rc<str>, Value)>>,
}

impl Environment for HostEnv {
    fn tree(&mut self) -> &mut dyn TreeAdapter {
        &mut self.tree
    }

    fn begin(&mut self) {
        Environment::begin(&mut self.tree);
    }

    fn commit(&mut self) {
        Environment::commit(&mut self.tree);
    }

    fn resolve_component(&mut self, name: &str) -> Option<Rc<ComponentDefinition>> {
        self.registry.component(name)
    }

    fn debugger(&mut self, locals: &[(Rc<str>, Value)]) {
        self.debugged.push(locals.to_vec());
    }
}

/// One program, one VM and one model, plus the log of every recording instance.
#[derive(Debug)]
pub struct Harness {
    /// Compiled code.
    pub program: Program,
    /// The VM.
    pub vm: Vm<HostEnv>,
    /// The model bound to `this` at the top level.
    pub model: Rc<RootReference>,
    log: Log,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new(Value::object([]))
    }
}

impl Harness {
    /// Creates a harness whose model starts as `model`.
    pub fn new(model: Value) -> Self {
        Self {
            program: Program::new(),
            vm: Vm::new(HostEnv::default(), Limits::default()),
            model: RootReference::new(model),
            log: Log::default(),
        }
    }

    /// Compiles `layout` and registers a recording component named `name`.
    pub fn define(
        &mut self,
        name: &str,
        capabilities: Capabilities,
        layout: &Layout,
    ) -> Result<Rc<ComponentDefinition>, CompileError> {
        let compiled = compile_layout(&mut self.program, &self.vm.env().registry, layout)?;
        let definition = ComponentDefinition::new(
            name,
            Rc::new(RecordingManager::new(self.log.clone())),
            capabilities,
            compiled,
        );
        self.vm
            .env_mut()
            .registry
            .register_component(definition.clone());
        Ok(definition)
    }

    /// Registers a helper.
    pub fn helper(&mut self, name: &str, helper: Rc<dyn Helper>) {
        self.vm.env_mut().registry.register_helper(name, helper);
    }

    /// Compiles a top-level template against the registry.
    pub fn compile(&mut self, template: &Template) -> Result<CompiledTemplate, CompileError> {
        compile_template(&mut self.program, &self.vm.env().registry, template)
    }

    /// Renders `template` into the tree root with the model as `this`.
    pub fn render(&mut self, template: &CompiledTemplate) -> Result<RenderResult, RenderError> {
        let root = RenderRoot::new(self.vm.env().tree.root(), self.model.clone());
        self.vm
            .render(&self.program, template, &root, TraceMask::NONE, None)
    }

    /// Like [`Harness::render`], reporting to `sink`.
    pub fn render_traced(
        &mut self,
        template: &CompiledTemplate,
        sink: &mut Recorder,
    ) -> Result<RenderResult, RenderError> {
        let root = RenderRoot::new(self.vm.env().tree.root(), self.model.clone());
        let mask = sink.mask();
        self.vm
            .render(&self.program, template, &root, mask, Some(sink))
    }

    /// Rerenders `result` with default options.
    pub fn rerender(&mut self, result: &mut RenderResult) -> Result<(), RenderError> {
        result.rerender(
            &mut self.vm,
            &self.program,
            RerenderOptions::default(),
            TraceMask::NONE,
            None,
        )
    }

    /// Like [`Harness::rerender`], reporting to `sink`.
    pub fn rerender_traced(
        &mut self,
        result: &mut RenderResult,
        sink: &mut Recorder,
    ) -> Result<(), RenderError> {
        let mask = sink.mask();
        result.rerender(
            &mut self.vm,
            &self.program,
            RerenderOptions::default(),
            mask,
            Some(sink),
        )
    }

    /// Replaces the model.
    pub fn set(&self, model: Value) {
        self.model.update(model);
    }

    /// The serialized output.
    pub fn html(&self) -> String {
        let tree = &self.vm.env().tree;
        tree.inner_html(tree.root())
    }

    /// Top-level output nodes, in order.
    pub fn nodes(&self) -> Vec<NodeHandle> {
        let tree = &self.vm.env().tree;
        tree.children(tree.root()).to_vec()
    }

    /// Mutations since the last [`Harness::reset_mutations`].
    pub fn mutations(&self) -> u64 {
        self.vm.env().tree.mutations()
    }

    /// Resets the mutation counter.
    pub fn reset_mutations(&mut self) {
        self.vm.env_mut().tree.reset_mutations();
    }

    /// Drains the lifecycle log.
    pub fn take_log(&self) -> Vec<String> {
        self.log.take()
    }
}

/// Captures trace events as strings, e.g. `run_start:Render`, `destroy:component:Card`.
#[derive(Debug)]
pub struct Recorder {
    mask: TraceMask,
    /// Events in arrival order.
    pub events: Vec<String>,
}

impl Recorder {
    /// Records the events in `mask`.
    pub fn new(mask: TraceMask) -> Self {
        Self {
            mask,
            events: Vec::new(),
        }
    }

    /// Events starting with `prefix`.
    pub fn matching(&self, prefix: &str) -> Vec<&str> {
        self.events
            .iter()
            .map(String::as_str)
            .filter(|e| e.starts_with(prefix))
            .collect()
    }
}

impl TraceSink for Recorder {
    fn mask(&self) -> TraceMask {
        self.mask
    }

    fn run_start(&mut self, kind: RunKind) {
        self.events.push(format!("run_start:{kind:?}"));
    }

    fn scope_enter(&mut self, kind: ScopeKind<'_>, _depth: usize) {
        if let ScopeKind::Component { name } = kind {
            self.events.push(format!("enter:{name}"));
        }
    }

    fn scope_exit(&mut self, kind: ScopeKind<'_>, _depth: usize) {
        if let ScopeKind::Component { name } = kind {
            self.events.push(format!("exit:{name}"));
        }
    }

    fn update(&mut self, event: UpdateEvent) {
        self.events.push(format!("update:{event:?}"));
    }

    fn destroy(&mut self, event: DestroyEvent<'_>) {
        self.events.push(match event {
            DestroyEvent::Region => "destroy:region".to_owned(),
            DestroyEvent::Component { name } => format!("destroy:component:{name}"),
            DestroyEvent::Modifier { name } => format!("destroy:modifier:{name}"),
        });
    }

    fn run_end(&mut self, kind: RunKind, outcome: TraceOutcome<'_>) {
        let outcome = match outcome {
            TraceOutcome::Ok => "ok",
            TraceOutcome::Error(_) => "error",
        };
        self.events.push(format!("run_end:{kind:?}:{outcome}"));
    }
}
