// Copyright 2026 the Render Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

#![allow(missing_docs, reason = "integration test crate")]

use std::cell::Cell;
use std::rc::Rc;

use render_tape::component::{Capabilities, EvaluatedArgs, Helper, Volatile};
use render_tape::disasm::disassemble;
use render_tape::opcode::Opcode;
use render_tape::reference::ExprError;
use render_tape::render::IteratorResult;
use render_tape::syntax::{Args, Block, Element, Expr, Invocation, Layout, Statement, Template};
use render_tape::trace::{TraceMask, TraceSink};
use render_tape::tree::ModifierEvent;
use render_tape::value::Value;
use render_tape::vm::{RenderError, RenderRoot};
use render_tape_conformance::{Harness, Recorder};

fn ints(xs: &[i64]) -> Value {
    Value::list(xs.iter().map(|&x| Value::Int(x)))
}

fn items(xs: &[i64]) -> Value {
    Value::object([("items", ints(xs))])
}

fn title(t: &str) -> Value {
    Value::object([("title", Value::str(t))])
}

fn heading() -> Template {
    Template::new(vec![
        Element::new("h1")
            .attr("class", "t")
            .child(Statement::append(Expr::path("this.title")))
            .build(),
    ])
}

fn row_list(key: Option<&str>) -> Template {
    Template::new(vec![Statement::each(
        Expr::path("this.items"),
        key,
        Block::with_params(
            &["item"],
            vec![Statement::component(
                "Row",
                Args::default().with("id", Expr::local("item")),
            )],
        ),
    )])
}

fn define_row(h: &mut Harness) {
    let caps = Capabilities {
        prepare_args: false,
        create_args: true,
    };
    h.define("Row", caps, &Layout::tagless(vec![Statement::append(Expr::path("@id"))]))
        .unwrap();
}

fn only(log: &[String], prefix: &str) -> Vec<String> {
    log.iter().filter(|e| e.starts_with(prefix)).cloned().collect()
}

#[test]
fn jump_targets_land_on_instructions() {
    let mut h = Harness::default();
    let t = h
        .compile(&Template::new(vec![Statement::If {
            cond: Expr::path("this.a"),
            then: Block::new(vec![Statement::text("yes")]),
            otherwise: Some(Block::new(vec![Statement::text("no")])),
        }]))
        .unwrap();
    let listing = disassemble(&h.program, t.handle).unwrap();
    let starts: Vec<usize> = listing.instrs().iter().map(|i| i.at).collect();
    let mut jumps = 0;
    for instr in listing.instrs() {
        if let Some(target) = instr.target() {
            jumps += 1;
            assert!(starts.contains(&target), "{instr:?} targets {target}");
        }
    }
    assert!(jumps >= 2);
    assert!(!listing.labels().is_empty());
    assert_eq!(
        listing.instrs().last().map(|i| i.opcode),
        Some(Opcode::Return)
    );
}

#[test]
fn equal_strings_share_one_constant() {
    let mut h = Harness::default();
    let a = h
        .compile(&Template::new(vec![Statement::text("shared")]))
        .unwrap();
    let b = h
        .compile(&Template::new(vec![
            Statement::text("other"),
            Statement::text("shared"),
        ]))
        .unwrap();
    let text_operands = |handle| -> Vec<u32> {
        disassemble(&h.program, handle)
            .unwrap()
            .instrs()
            .iter()
            .filter(|i| i.opcode == Opcode::Text)
            .map(|i| i.operands[0])
            .collect()
    };
    let a = text_operands(a.handle);
    let b = text_operands(b.handle);
    assert_eq!(a.len(), 1);
    assert_eq!(b.len(), 2);
    assert_eq!(a[0], b[1]);
    assert_ne!(b[0], b[1]);
}

#[test]
fn path_references_survive_model_updates() {
    let h = Harness::new(Value::object([(
        "user",
        Value::object([("name", Value::str("ada"))]),
    )]));
    let before = h.model.path("user.name");
    h.set(Value::object([(
        "user",
        Value::object([("name", Value::str("grace"))]),
    )]));
    let after = h.model.path("user.name");
    assert!(Rc::ptr_eq(&before, &after));
    assert_eq!(after.value(), Ok(Value::str("grace")));
}

#[test]
fn rerender_without_changes_touches_nothing() {
    let mut h = Harness::new(title("Hello"));
    let t = h.compile(&heading()).unwrap();
    let mut r = h.render(&t).unwrap();
    assert_eq!(h.html(), r#"<h1 class="t">Hello</h1>"#);

    h.reset_mutations();
    h.rerender(&mut r).unwrap();
    assert_eq!(h.mutations(), 0);

    h.set(title("Hello"));
    h.rerender(&mut r).unwrap();
    assert_eq!(h.mutations(), 0);

    h.set(title("Bye"));
    h.rerender(&mut r).unwrap();
    assert_eq!(h.html(), r#"<h1 class="t">Bye</h1>"#);
    assert_eq!(h.mutations(), 1);
}

#[test]
fn rerender_trace_reports_revalidated_text() {
    let mut h = Harness::new(title("a"));
    let t = h.compile(&heading()).unwrap();
    let mut r = h.render(&t).unwrap();
    h.set(title("b"));
    let mut sink = Recorder::new(TraceMask::RUN | TraceMask::UPDATE);
    h.rerender_traced(&mut r, &mut sink).unwrap();
    assert_eq!(sink.events.first().map(String::as_str), Some("run_start:Rerender"));
    assert_eq!(sink.events.last().map(String::as_str), Some("run_end:Rerender:ok"));
    assert_eq!(
        sink.matching("update:Revalidated { kind: Text, changed: true }")
            .len(),
        1
    );
    assert!(sink.matching("update:Reexecuted").is_empty());
}

#[test]
fn shrinking_a_list_destroys_the_tail_in_order() {
    let mut h = Harness::new(items(&[1, 2, 3, 4, 5]));
    define_row(&mut h);
    let t = h.compile(&row_list(None)).unwrap();
    let mut r = h.render(&t).unwrap();
    assert_eq!(h.html(), "12345");
    assert_eq!(
        only(&h.take_log(), "create:"),
        ["create:Row:1", "create:Row:2", "create:Row:3", "create:Row:4", "create:Row:5"]
    );

    h.set(items(&[1, 2, 3]));
    h.rerender(&mut r).unwrap();
    assert_eq!(h.html(), "123");
    assert_eq!(only(&h.take_log(), "destroy:"), ["destroy:Row:4", "destroy:Row:5"]);
}

#[test]
fn reordering_a_list_moves_output_without_recreating_it() {
    let mut h = Harness::new(items(&[1, 2, 3]));
    define_row(&mut h);
    let t = h.compile(&row_list(None)).unwrap();
    let mut r = h.render(&t).unwrap();
    let before = h.nodes();
    h.take_log();

    h.set(items(&[3, 2, 1]));
    let mut sink = Recorder::new(TraceMask::UPDATE);
    h.rerender_traced(&mut r, &mut sink).unwrap();
    assert_eq!(h.html(), "321");
    let log = h.take_log();
    assert!(only(&log, "destroy:").is_empty());
    assert!(only(&log, "create:").is_empty());

    let mut reversed = before;
    reversed.reverse();
    assert_eq!(h.nodes(), reversed);
    assert_eq!(
        sink.matching("update:ListSynced"),
        ["update:ListSynced { retained: 3, moved: 2, inserted: 0, removed: 0 }"]
    );
}

#[test]
fn list_inserts_render_only_new_items() {
    let mut h = Harness::new(items(&[1, 3]));
    define_row(&mut h);
    let t = h.compile(&row_list(None)).unwrap();
    let mut r = h.render(&t).unwrap();
    h.take_log();

    h.set(items(&[1, 2, 3]));
    h.rerender(&mut r).unwrap();
    assert_eq!(h.html(), "123");
    assert_eq!(only(&h.take_log(), "create:"), ["create:Row:2"]);
}

#[test]
fn index_keyed_items_update_in_place() {
    let mut h = Harness::new(items(&[1, 2]));
    define_row(&mut h);
    let t = h.compile(&row_list(Some("@index"))).unwrap();
    let mut r = h.render(&t).unwrap();
    h.take_log();

    h.set(items(&[1, 9]));
    h.rerender(&mut r).unwrap();
    assert_eq!(h.html(), "19");
    let log = h.take_log();
    assert_eq!(only(&log, "update:"), ["update:Row:2"]);
    assert_eq!(only(&log, "did_update:"), ["did_update:Row:2"]);
    assert!(only(&log, "destroy:").is_empty());
}

#[test]
fn each_else_toggles_with_presence() {
    let mut h = Harness::new(items(&[]));
    let t = h
        .compile(&Template::new(vec![Statement::Each {
            iterable: Expr::path("this.items"),
            key: None,
            body: Block::with_params(&["item"], vec![Statement::append(Expr::local("item"))]),
            otherwise: Some(Block::new(vec![Statement::text("empty")])),
        }]))
        .unwrap();
    let mut r = h.render(&t).unwrap();
    assert_eq!(h.html(), "empty");

    h.set(items(&[1, 2]));
    h.rerender(&mut r).unwrap();
    assert_eq!(h.html(), "12");

    h.set(items(&[]));
    h.rerender(&mut r).unwrap();
    assert_eq!(h.html(), "empty");
}

#[test]
fn if_toggle_leaves_a_placeholder_and_recreates() {
    let show = |b: bool| Value::object([("show", Value::Bool(b))]);
    let mut h = Harness::new(show(true));
    let t = h
        .compile(&Template::new(vec![Statement::if_(
            Expr::path("this.show"),
            vec![Element::new("p").child(Statement::text("hi")).build()],
        )]))
        .unwrap();
    let mut r = h.render(&t).unwrap();
    assert_eq!(h.html(), "<p>hi</p>");
    let first = h.nodes();

    h.set(show(false));
    h.rerender(&mut r).unwrap();
    assert_eq!(h.html(), "<!---->");

    h.set(show(true));
    h.rerender(&mut r).unwrap();
    assert_eq!(h.html(), "<p>hi</p>");
    assert_ne!(h.nodes(), first);
}

#[test]
fn fast_and_general_invocations_render_alike() {
    let layout = Layout::wrapped(vec![
        Element::new("p")
            .child(Statement::append(Expr::path("@title")))
            .build(),
    ]);
    let page = |name: &str| {
        Template::new(vec![Statement::component(
            name,
            Args::default().with("title", Expr::path("this.title")),
        )])
    };

    let mut fast = Harness::new(title("Hi"));
    let def = fast
        .define("Fast", Capabilities::default(), &layout)
        .unwrap();
    assert!(def.allows_fast_path());
    let ft = fast.compile(&page("Fast")).unwrap();
    let mut fr = fast.render(&ft).unwrap();

    let mut slow = Harness::new(title("Hi"));
    let caps = Capabilities {
        prepare_args: true,
        create_args: false,
    };
    let def = slow.define("Slow", caps, &layout).unwrap();
    assert!(!def.allows_fast_path());
    let st = slow.compile(&page("Slow")).unwrap();
    let mut sr = slow.render(&st).unwrap();

    assert_eq!(fast.html(), "<section><p>Hi</p></section>");
    assert_eq!(fast.html(), slow.html());
    assert_eq!(
        fast.take_log(),
        ["create:Fast", "element:Fast", "did_render:Fast"]
    );
    assert_eq!(
        slow.take_log(),
        ["prepare:Slow", "create:Slow", "element:Slow", "did_render:Slow"]
    );

    fast.set(title("Yo"));
    slow.set(title("Yo"));
    fast.rerender(&mut fr).unwrap();
    slow.rerender(&mut sr).unwrap();
    assert_eq!(fast.html(), "<section><p>Yo</p></section>");
    assert_eq!(fast.html(), slow.html());
}

#[test]
fn nested_components_are_destroyed_inside_out() {
    let mut h = Harness::default();
    h.define(
        "Inner",
        Capabilities::default(),
        &Layout::tagless(vec![Statement::text("in")]),
    )
    .unwrap();
    h.define(
        "Outer",
        Capabilities::default(),
        &Layout::tagless(vec![
            Statement::text("out("),
            Statement::component("Inner", Args::default()),
            Statement::text(")"),
        ]),
    )
    .unwrap();
    let t = h
        .compile(&Template::new(vec![Statement::component(
            "Outer",
            Args::default(),
        )]))
        .unwrap();

    let mut sink = Recorder::new(TraceMask::RUN | TraceMask::COMPONENT);
    let mut r = h.render_traced(&t, &mut sink).unwrap();
    assert_eq!(h.html(), "out(in)");
    assert_eq!(
        sink.events,
        [
            "run_start:Render",
            "enter:Outer",
            "enter:Inner",
            "exit:Inner",
            "exit:Outer",
            "run_end:Render:ok",
        ]
    );
    h.take_log();

    let mut sink = Recorder::new(TraceMask::DESTROY);
    r.destroy_traced(&mut h.vm, sink.mask(), Some(&mut sink));
    assert_eq!(h.html(), "");
    assert_eq!(h.take_log(), ["destroy:Inner", "destroy:Outer"]);
    assert_eq!(
        sink.matching("destroy:component"),
        ["destroy:component:Inner", "destroy:component:Outer"]
    );

    r.destroy(&mut h.vm);
    assert!(r.is_destroyed());
    assert!(h.take_log().is_empty());
    assert_eq!(h.rerender(&mut r), Err(RenderError::Destroyed));
}

#[test]
fn guarded_append_switches_between_text_and_component() {
    let mut h = Harness::new(Value::object([("thing", Value::str("text"))]));
    let card = h
        .define(
            "Card",
            Capabilities::default(),
            &Layout::tagless(vec![
                Statement::text("card:"),
                Statement::append(Expr::path("this.name")),
            ]),
        )
        .unwrap();
    let t = h
        .compile(&Template::new(vec![Statement::append(Expr::path(
            "this.thing",
        ))]))
        .unwrap();
    let mut r = h.render(&t).unwrap();
    assert_eq!(h.html(), "text");

    h.set(Value::object([("thing", Value::Component(card))]));
    h.rerender(&mut r).unwrap();
    assert_eq!(h.html(), "card:Card");
    assert_eq!(only(&h.take_log(), "create:"), ["create:Card"]);

    h.set(Value::object([("thing", Value::str("again"))]));
    h.rerender(&mut r).unwrap();
    assert_eq!(h.html(), "again");
    assert_eq!(only(&h.take_log(), "destroy:"), ["destroy:Card"]);
}

#[test]
fn dynamic_components_resolve_names_through_the_environment() {
    let mut h = Harness::new(Value::object([("which", Value::str("A"))]));
    for name in ["A", "B"] {
        h.define(
            name,
            Capabilities::default(),
            &Layout::tagless(vec![Statement::append(Expr::path("this.name"))]),
        )
        .unwrap();
    }
    let t = h
        .compile(&Template::new(vec![Statement::DynamicComponent {
            definition: Expr::path("this.which"),
            args: Args::default(),
            default: None,
            inverse: None,
        }]))
        .unwrap();
    let mut r = h.render(&t).unwrap();
    assert_eq!(h.html(), "A");

    h.set(Value::object([("which", Value::str("B"))]));
    h.rerender(&mut r).unwrap();
    assert_eq!(h.html(), "B");
    let log = h.take_log();
    assert_eq!(only(&log, "destroy:"), ["destroy:A"]);
    assert_eq!(only(&log, "create:"), ["create:A", "create:B"]);

    h.set(Value::object([("which", Value::str("C"))]));
    let err = h.rerender(&mut r).unwrap_err();
    assert!(matches!(err, RenderError::Expression(_)), "{err}");
}

#[test]
fn attributes_are_omitted_only_for_false_and_nullish() {
    let d = |v: Value| Value::object([("d", v)]);
    let mut h = Harness::new(d(Value::Bool(true)));
    let t = h
        .compile(&Template::new(vec![
            Element::new("input")
                .bind("disabled", Expr::path("this.d"))
                .build(),
        ]))
        .unwrap();
    let mut r = h.render(&t).unwrap();
    assert_eq!(h.html(), r#"<input disabled="true"></input>"#);

    let cases = [
        (Value::Bool(false), "<input></input>"),
        (Value::Int(0), r#"<input disabled="0"></input>"#),
        (Value::Null, "<input></input>"),
        (Value::str(""), r#"<input disabled=""></input>"#),
        (Value::Undefined, "<input></input>"),
    ];
    for (value, html) in cases {
        h.set(d(value));
        h.rerender(&mut r).unwrap();
        assert_eq!(h.html(), html);
    }
}

#[test]
fn yielded_blocks_see_the_caller_scope() {
    let mut h = Harness::new(Value::object([("who", Value::str("me"))]));
    h.define(
        "Panel",
        Capabilities::default(),
        &Layout::tagless(vec![
            Statement::text("["),
            Statement::yield_(vec![Expr::path("@title")]),
            Statement::text("]"),
        ]),
    )
    .unwrap();
    let t = h
        .compile(&Template::new(vec![Statement::Component(Invocation {
            name: Rc::from("Panel"),
            args: Args::default().with("title", Expr::lit("T")),
            default: Some(Block::with_params(
                &["t"],
                vec![
                    Statement::append(Expr::local("t")),
                    Statement::append(Expr::path("this.who")),
                ],
            )),
            inverse: None,
        })]))
        .unwrap();
    let mut r = h.render(&t).unwrap();
    assert_eq!(h.html(), "[Tme]");

    h.set(Value::object([("who", Value::str("you"))]));
    h.rerender(&mut r).unwrap();
    assert_eq!(h.html(), "[Tyou]");
}

#[test]
fn debugger_reports_this_and_arguments() {
    let mut h = Harness::default();
    let def = h
        .define(
            "Dbg",
            Capabilities::default(),
            &Layout::tagless(vec![
                Statement::append(Expr::path("@title")),
                Statement::Debugger,
            ]),
        )
        .unwrap();
    assert!(def.layout().has_eval);
    assert!(!def.allows_fast_path());
    let t = h
        .compile(&Template::new(vec![Statement::component(
            "Dbg",
            Args::default().with("title", Expr::lit("x")),
        )]))
        .unwrap();
    let _r = h.render(&t).unwrap();
    assert_eq!(h.html(), "x");
    let seen = &h.vm.env().debugged;
    assert_eq!(seen.len(), 1);
    let names: Vec<&str> = seen[0].iter().map(|(n, _)| &**n).collect();
    assert_eq!(names, ["this", "@title"]);
    assert_eq!(seen[0][0].1.get("name"), Value::str("Dbg"));
    assert_eq!(seen[0][1].1, Value::str("x"));
}

#[test]
fn modifiers_install_update_and_remove() {
    let mut h = Harness::new(Value::object([("n", Value::Int(1))]));
    let t = h
        .compile(&Template::new(vec![
            Element::new("div")
                .modifier("focus", Args::default().arg(Expr::path("this.n")))
                .build(),
        ]))
        .unwrap();
    let mut r = h.render(&t).unwrap();
    h.set(Value::object([("n", Value::Int(2))]));
    h.rerender(&mut r).unwrap();
    r.destroy(&mut h.vm);

    let events = h.vm.env().tree.modifier_events();
    assert_eq!(events.len(), 3);
    assert!(matches!(
        &events[0],
        ModifierEvent::Install { name, args, .. } if &**name == "focus" && args.at(0) == Value::Int(1)
    ));
    assert!(matches!(
        &events[1],
        ModifierEvent::Update { args, .. } if args.at(0) == Value::Int(2)
    ));
    assert!(matches!(&events[2], ModifierEvent::Remove { .. }));
}

#[test]
fn volatile_helpers_recompute_every_rerender() {
    let mut h = Harness::default();
    let calls = Rc::new(Cell::new(0_i64));
    let counter = calls.clone();
    let tick = move |_: &EvaluatedArgs| -> Result<Value, ExprError> {
        counter.set(counter.get() + 1);
        Ok(Value::Int(counter.get()))
    };
    let helper: Rc<dyn Helper> = Rc::new(Volatile(tick));
    h.helper("tick", helper);
    let t = h
        .compile(&Template::new(vec![Statement::append(Expr::helper(
            "tick",
            vec![],
        ))]))
        .unwrap();
    let mut r = h.render(&t).unwrap();
    assert_eq!(h.html(), "1");
    h.rerender(&mut r).unwrap();
    h.rerender(&mut r).unwrap();
    assert_eq!(h.html(), "3");
    assert_eq!(calls.get(), 3);
}

#[test]
fn template_iterator_steps_to_completion() {
    let mut h = Harness::new(title("step"));
    let t = h.compile(&heading()).unwrap();
    let root = RenderRoot::new(h.vm.env().tree.root(), h.model.clone());
    let mut it = h
        .vm
        .render_iter(&h.program, &t, &root, TraceMask::NONE, None)
        .unwrap();
    let mut steps = 0;
    let result = loop {
        match it.next().unwrap() {
            IteratorResult::Pending => steps += 1,
            IteratorResult::Done(result) => break result,
        }
    };
    assert!(steps > 5);
    assert!(matches!(it.next(), Err(RenderError::Destroyed)));
    drop(it);
    assert!(!result.is_destroyed());
    assert!(result.bounds().is_some());
    assert_eq!(h.html(), r#"<h1 class="t">step</h1>"#);
}

#[test]
fn failed_renders_tear_down_what_they_built() {
    let fail = |b: bool| Value::object([("fail", Value::Bool(b))]);
    let mut h = Harness::new(fail(true));
    h.define(
        "Card",
        Capabilities::default(),
        &Layout::tagless(vec![Statement::text("card")]),
    )
    .unwrap();
    let boom = |args: &EvaluatedArgs| -> Result<Value, ExprError> {
        if args.at(0).is_truthy() {
            Err(ExprError::new("boom"))
        } else {
            Ok(Value::str("ok"))
        }
    };
    h.helper("boom", Rc::new(boom));
    let t = h
        .compile(&Template::new(vec![
            Statement::component("Card", Args::default()),
            Statement::append(Expr::helper("boom", vec![Expr::path("this.fail")])),
        ]))
        .unwrap();

    let err = h.render(&t).unwrap_err();
    assert!(matches!(&err, RenderError::Expression(e) if e.message().contains("boom")));
    assert_eq!(h.html(), "");
    assert_eq!(
        h.take_log(),
        ["create:Card", "did_render:Card", "destroy:Card"]
    );

    h.set(fail(false));
    let _r = h.render(&t).unwrap();
    assert_eq!(h.html(), "cardok");
}

#[test]
fn unknown_names_fail_at_compile_time() {
    let mut h = Harness::default();
    let before = h.program.heap().len();
    assert!(
        h.compile(&Template::new(vec![Statement::component(
            "Missing",
            Args::default()
        )]))
        .is_err()
    );
    assert!(
        h.compile(&Template::new(vec![Statement::append(Expr::helper(
            "missing",
            vec![]
        ))]))
        .is_err()
    );
    assert_eq!(h.program.heap().len(), before);
}
