// Copyright 2026 the Render Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::rc::Rc;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use render_tape::compile::{Registry, compile_layout, compile_template};
use render_tape::component::{
    Capabilities, CapturedArgs, ComponentDefinition, ComponentInstance, ComponentManager,
};
use render_tape::heap::{CompiledTemplate, Program};
use render_tape::reference::{ConstReference, ExprError, Ref, RootReference};
use render_tape::rerender::RerenderOptions;
use render_tape::scope::DynamicScope;
use render_tape::syntax::{Args, Block, Element, Expr, Layout, Statement, Template};
use render_tape::trace::{TraceMask, TraceSink, UpdateEvent};
use render_tape::tree::MemoryTree;
use render_tape::value::Value;
use render_tape::vm::{Limits, RenderRoot, Vm};

fn bench_vm(c: &mut Criterion) {
    bench_compile_table(c);
    bench_initial_render(c);
    bench_noop_rerender(c);
    bench_text_update(c);
    bench_text_update_traced(c);
    bench_keyed_swap(c);
    bench_keyed_append_remove(c);
    bench_component_rows(c);
}

fn bench_compile_table(c: &mut Criterion) {
    let template = table();
    c.bench_function("compile_table", |b| {
        b.iter(|| {
            let mut program = Program::new();
            let compiled = compile_template(&mut program, &Registry::new(), &template).unwrap();
            black_box((program, compiled));
        });
    });
}

fn bench_initial_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("initial_render");
    for &n in &[10_usize, 100, 1000] {
        let (program, compiled) = compiled_table();
        let model = RootReference::new(rows(n, 0));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                let mut vm = Vm::new(MemoryTree::new(), wide_open_limits());
                let root = RenderRoot::new(vm.env().root(), model.clone());
                let result = vm
                    .render(&program, &compiled, &root, TraceMask::NONE, None)
                    .unwrap();
                black_box(result);
            });
        });
    }
    group.finish();
}

fn bench_noop_rerender(c: &mut Criterion) {
    let mut group = c.benchmark_group("noop_rerender");
    for &n in &[10_usize, 100, 1000] {
        let (program, compiled) = compiled_table();
        let model = RootReference::new(rows(n, 0));
        let mut vm = Vm::new(MemoryTree::new(), wide_open_limits());
        let root = RenderRoot::new(vm.env().root(), model.clone());
        let mut result = vm
            .render(&program, &compiled, &root, TraceMask::NONE, None)
            .unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                result
                    .rerender(
                        &mut vm,
                        &program,
                        RerenderOptions::default(),
                        TraceMask::NONE,
                        None,
                    )
                    .unwrap();
            });
        });
    }
    group.finish();
}

fn bench_text_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("text_update");
    for &n in &[10_usize, 100, 1000] {
        let (program, compiled) = compiled_table();
        let versions = [rows(n, 0), rows(n, 1)];
        let model = RootReference::new(versions[0].clone());
        let mut vm = Vm::new(MemoryTree::new(), wide_open_limits());
        let root = RenderRoot::new(vm.env().root(), model.clone());
        let mut result = vm
            .render(&program, &compiled, &root, TraceMask::NONE, None)
            .unwrap();
        let mut flip = 0;
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                flip ^= 1;
                model.update(versions[flip].clone());
                result
                    .rerender(
                        &mut vm,
                        &program,
                        RerenderOptions::default(),
                        TraceMask::NONE,
                        None,
                    )
                    .unwrap();
            });
        });
    }
    group.finish();
}

fn bench_text_update_traced(c: &mut Criterion) {
    let mut group = c.benchmark_group("text_update_traced");
    for &n in &[10_usize, 100] {
        let (program, compiled) = compiled_table();
        let versions = [rows(n, 0), rows(n, 1)];
        let model = RootReference::new(versions[0].clone());
        let mut vm = Vm::new(MemoryTree::new(), wide_open_limits());
        let root = RenderRoot::new(vm.env().root(), model.clone());
        let mut result = vm
            .render(&program, &compiled, &root, TraceMask::NONE, None)
            .unwrap();
        let mut sink = CountingUpdates::default();
        let mask = sink.mask();
        let mut flip = 0;
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                flip ^= 1;
                model.update(versions[flip].clone());
                result
                    .rerender(
                        &mut vm,
                        &program,
                        RerenderOptions::default(),
                        mask,
                        Some(&mut sink),
                    )
                    .unwrap();
            });
        });
    }
    group.finish();
}

fn bench_keyed_swap(c: &mut Criterion) {
    let mut group = c.benchmark_group("keyed_swap");
    for &n in &[10_usize, 100, 1000] {
        let (program, compiled) = compiled_table();
        let straight = rows(n, 0);
        let swapped = swap_ends(&straight);
        let model = RootReference::new(straight.clone());
        let mut vm = Vm::new(MemoryTree::new(), wide_open_limits());
        let root = RenderRoot::new(vm.env().root(), model.clone());
        let mut result = vm
            .render(&program, &compiled, &root, TraceMask::NONE, None)
            .unwrap();
        let versions = [straight, swapped];
        let mut flip = 0;
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                flip ^= 1;
                model.update(versions[flip].clone());
                result
                    .rerender(
                        &mut vm,
                        &program,
                        RerenderOptions::default(),
                        TraceMask::NONE,
                        None,
                    )
                    .unwrap();
            });
        });
    }
    group.finish();
}

fn bench_keyed_append_remove(c: &mut Criterion) {
    let mut group = c.benchmark_group("keyed_append_remove");
    for &n in &[10_usize, 100, 1000] {
        let (program, compiled) = compiled_table();
        let short = rows(n, 0);
        let long = rows(n + 1, 0);
        let model = RootReference::new(short.clone());
        let mut vm = Vm::new(MemoryTree::new(), wide_open_limits());
        let root = RenderRoot::new(vm.env().root(), model.clone());
        let mut result = vm
            .render(&program, &compiled, &root, TraceMask::NONE, None)
            .unwrap();
        let versions = [short, long];
        let mut flip = 0;
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                flip ^= 1;
                model.update(versions[flip].clone());
                result
                    .rerender(
                        &mut vm,
                        &program,
                        RerenderOptions::default(),
                        TraceMask::NONE,
                        None,
                    )
                    .unwrap();
            });
        });
    }
    group.finish();
}

fn bench_component_rows(c: &mut Criterion) {
    let mut group = c.benchmark_group("component_rows");
    for (label, caps) in [
        ("fast", Capabilities::default()),
        (
            "general",
            Capabilities {
                prepare_args: false,
                create_args: true,
            },
        ),
    ] {
        let (program, compiled) = compiled_component_table(caps);
        let model = RootReference::new(rows(100, 0));
        group.bench_function(label, |b| {
            b.iter(|| {
                let mut vm = Vm::new(MemoryTree::new(), wide_open_limits());
                let root = RenderRoot::new(vm.env().root(), model.clone());
                let result = vm
                    .render(&program, &compiled, &root, TraceMask::NONE, None)
                    .unwrap();
                black_box(result);
            });
        });
    }
    group.finish();
}

fn wide_open_limits() -> Limits {
    Limits {
        fuel: u64::MAX,
        max_call_depth: 4096,
        max_stack_depth: 1 << 20,
    }
}

fn rows(n: usize, generation: i64) -> Value {
    Value::list((0..n).map(|i| {
        let id = i64::try_from(i).unwrap();
        Value::object([
            ("id", Value::Int(id)),
            ("label", Value::from(format!("row {id} v{generation}"))),
        ])
    }))
}

fn swap_ends(rows: &Value) -> Value {
    let Value::List(items) = rows else {
        return rows.clone();
    };
    let mut items = items.to_vec();
    if items.len() > 2 {
        let last = items.len() - 2;
        items.swap(1, last);
    }
    Value::list(items)
}

fn table() -> Template {
    let cell = Element::new("tr")
        .bind("data-id", Expr::local_path("row", "id"))
        .child(
            Element::new("td")
                .child(Statement::append(Expr::local_path("row", "label")))
                .build(),
        )
        .build();
    Template::new(vec![
        Element::new("table")
            .child(Statement::each(
                Expr::path("this"),
                Some("id"),
                Block::with_params(&["row"], vec![cell]),
            ))
            .build(),
    ])
}

fn compiled_table() -> (Program, CompiledTemplate) {
    let mut program = Program::new();
    let compiled = compile_template(&mut program, &Registry::new(), &table()).unwrap();
    (program, compiled)
}

fn compiled_component_table(capabilities: Capabilities) -> (Program, CompiledTemplate) {
    let mut program = Program::new();
    let mut registry = Registry::new();
    let layout = compile_layout(
        &mut program,
        &registry,
        &Layout::tagless(vec![
            Element::new("tr")
                .child(Statement::append(Expr::path("@label")))
                .build(),
        ]),
    )
    .unwrap();
    registry.register_component(ComponentDefinition::new(
        "Row",
        Rc::new(StaticManager),
        capabilities,
        layout,
    ));
    let template = Template::new(vec![Statement::each(
        Expr::path("this"),
        Some("id"),
        Block::with_params(
            &["row"],
            vec![Statement::component(
                "Row",
                Args::default().with("label", Expr::local_path("row", "label")),
            )],
        ),
    )]);
    let compiled = compile_template(&mut program, &registry, &template).unwrap();
    (program, compiled)
}

struct StaticManager;

impl ComponentManager for StaticManager {
    fn create(
        &self,
        _definition: &ComponentDefinition,
        _args: Option<&CapturedArgs>,
        _dynamic_scope: &DynamicScope,
        _has_default_block: bool,
    ) -> Result<Rc<dyn ComponentInstance>, ExprError> {
        Ok(Rc::new(StaticInstance))
    }
}

struct StaticInstance;

impl ComponentInstance for StaticInstance {
    fn self_ref(&self) -> Ref {
        ConstReference::new(Value::Null)
    }
}

#[derive(Default)]
struct CountingUpdates {
    _count: u64,
}

impl TraceSink for CountingUpdates {
    fn mask(&self) -> TraceMask {
        TraceMask::UPDATE
    }

    fn update(&mut self, _event: UpdateEvent) {
        self._count = self._count.wrapping_add(1);
    }
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .warm_up_time(std::time::Duration::from_millis(300))
        .measurement_time(std::time::Duration::from_millis(1200))
        .sample_size(60);
    targets = bench_vm
}
criterion_main!(benches);
