// Copyright 2026 the Render Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A small runnable `render_tape` example: a keyed to-do list.
//!
//! Shows:
//! - Compiling a template and a component layout
//! - Incremental rerenders after the model changes
//! - Which updating opcodes ran, were skipped, or re-executed their span
//!
//! Pass `--disasm` to print the compiled template instead.

use std::error::Error;
use std::rc::Rc;

use render_tape::compile::{Registry, compile_layout, compile_template};
use render_tape::component::{
    Capabilities, CapturedArgs, ComponentDefinition, ComponentInstance, ComponentManager,
};
use render_tape::disasm::disassemble;
use render_tape::heap::Program;
use render_tape::reference::{ConstReference, ExprError, Ref, RootReference};
use render_tape::rerender::RerenderOptions;
use render_tape::scope::DynamicScope;
use render_tape::syntax::{Args, Block, Element, Expr, Layout, Statement, Template};
use render_tape::trace::{DestroyEvent, TraceMask, TraceSink, UpdateEvent};
use render_tape::tree::MemoryTree;
use render_tape::value::Value;
use render_tape::vm::{Limits, RenderRoot, Vm};

#[derive(Debug)]
struct ItemManager;

impl ComponentManager for ItemManager {
    fn create(
        &self,
        _definition: &ComponentDefinition,
        _args: Option<&CapturedArgs>,
        _dynamic_scope: &DynamicScope,
        _has_default_block: bool,
    ) -> Result<Rc<dyn ComponentInstance>, ExprError> {
        Ok(Rc::new(Item))
    }
}

#[derive(Debug)]
struct Item;

impl ComponentInstance for Item {
    fn self_ref(&self) -> Ref {
        ConstReference::new(Value::Null)
    }

    fn tag_name(&self) -> Option<Rc<str>> {
        Some(Rc::from("li"))
    }
}

/// Tallies what a rerender did.
#[derive(Debug, Default)]
struct Tally {
    skipped: usize,
    revalidated: usize,
    changed: usize,
    reexecuted: usize,
    lists: Vec<String>,
    destroyed: usize,
}

impl TraceSink for Tally {
    fn mask(&self) -> TraceMask {
        TraceMask::UPDATE | TraceMask::DESTROY
    }

    fn update(&mut self, event: UpdateEvent) {
        match event {
            UpdateEvent::Skipped(_) => self.skipped += 1,
            UpdateEvent::Revalidated { changed, .. } => {
                self.revalidated += 1;
                if changed {
                    self.changed += 1;
                }
            }
            UpdateEvent::Reexecuted => self.reexecuted += 1,
            UpdateEvent::ListSynced {
                retained,
                moved,
                inserted,
                removed,
            } => self.lists.push(format!(
                "retained={retained} moved={moved} inserted={inserted} removed={removed}"
            )),
        }
    }

    fn destroy(&mut self, event: DestroyEvent<'_>) {
        if let DestroyEvent::Component { .. } = event {
            self.destroyed += 1;
        }
    }
}

fn todo(id: i64, label: &str, done: bool) -> Value {
    Value::object([
        ("id", Value::Int(id)),
        ("label", Value::str(label)),
        ("done", Value::Bool(done)),
    ])
}

fn model(title: &str, todos: Vec<Value>) -> Value {
    Value::object([("title", Value::str(title)), ("todos", Value::list(todos))])
}

fn item_layout() -> Layout {
    Layout::wrapped(vec![
        Element::new("span")
            .child(Statement::append(Expr::path("@label")))
            .build(),
        Statement::if_(Expr::path("@done"), vec![Statement::text(" ✓")]),
    ])
}

fn page() -> Template {
    let row = Statement::component(
        "TodoItem",
        Args::default()
            .with("label", Expr::local_path("todo", "label"))
            .with("done", Expr::local_path("todo", "done")),
    );
    Template::new(vec![
        Element::new("h1")
            .child(Statement::append(Expr::path("this.title")))
            .build(),
        Element::new("ul")
            .child(Statement::Each {
                iterable: Expr::path("this.todos"),
                key: Some(Rc::from("id")),
                body: Block::with_params(&["todo"], vec![row]),
                otherwise: Some(Block::new(vec![Statement::text("nothing to do")])),
            })
            .build(),
    ])
}

fn main() -> Result<(), Box<dyn Error>> {
    let show_disasm = std::env::args().skip(1).any(|arg| arg == "--disasm");

    let mut program = Program::new();
    let mut registry = Registry::new();
    let layout = compile_layout(&mut program, &registry, &item_layout())?;
    registry.register_component(ComponentDefinition::new(
        "TodoItem",
        Rc::new(ItemManager),
        Capabilities::default(),
        layout,
    ));
    let compiled = compile_template(&mut program, &registry, &page())?;

    if show_disasm {
        print!("{}", disassemble(&program, compiled.handle)?);
        return Ok(());
    }

    let state = RootReference::new(model(
        "Today",
        vec![
            todo(1, "write tests", false),
            todo(2, "review", false),
            todo(3, "ship", false),
        ],
    ));
    let mut vm = Vm::new(MemoryTree::new(), Limits::default());
    let root = RenderRoot::new(vm.env().root(), state.clone());
    let mut result = vm.render(&program, &compiled, &root, TraceMask::NONE, None)?;
    println!("🟩 first render:");
    println!("  {}", vm.env().inner_html(vm.env().root()));

    let steps = [
        (
            "finish the first item",
            model(
                "Today",
                vec![
                    todo(1, "write tests", true),
                    todo(2, "review", false),
                    todo(3, "ship", false),
                ],
            ),
        ),
        (
            "reorder and drop one",
            model(
                "Today",
                vec![todo(3, "ship", false), todo(1, "write tests", true)],
            ),
        ),
        ("rename the list", model("Tomorrow", vec![])),
    ];
    for (what, next) in steps {
        println!();
        println!("🟦 change: {what}");
        state.update(next);
        vm.env_mut().reset_mutations();
        let mut tally = Tally::default();
        let mask = tally.mask();
        result.rerender(
            &mut vm,
            &program,
            RerenderOptions::default(),
            mask,
            Some(&mut tally),
        )?;
        println!("  {}", vm.env().inner_html(vm.env().root()));
        println!(
            "  🟧 skipped={} revalidated={} changed={} reexecuted={} destroyed={} mutations={}",
            tally.skipped,
            tally.revalidated,
            tally.changed,
            tally.reexecuted,
            tally.destroyed,
            vm.env().mutations()
        );
        for list in &tally.lists {
            println!("  🟫 list: {list}");
        }
    }

    result.destroy(&mut vm);
    println!();
    println!(
        "🟩 destroyed: {:?}",
        vm.env().inner_html(vm.env().root())
    );
    Ok(())
}
