// Copyright 2026 the Render Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `render_tape`: a template engine that compiles to bytecode and re-executes incrementally.
//!
//! A parsed template ([`syntax`]) is compiled into fixed-width instructions ([`compile`], [`asm`])
//! stored in a [`heap::Program`]. The [`vm::Vm`] executes them once against an output tree
//! ([`env::TreeAdapter`]) and records an update program alongside the output. Later rerenders walk
//! only that update program: spans whose inputs kept their revision tags ([`tag`], [`reference`])
//! are skipped, the rest are patched or re-executed in place.
//!
//! ## Example
//!
//! ```
//! extern crate alloc;
//!
//! use alloc::vec;
//!
//! use render_tape::compile::{Registry, compile_template};
//! use render_tape::heap::Program;
//! use render_tape::reference::RootReference;
//! use render_tape::rerender::RerenderOptions;
//! use render_tape::syntax::{Element, Expr, Statement, Template};
//! use render_tape::trace::TraceMask;
//! use render_tape::tree::MemoryTree;
//! use render_tape::value::Value;
//! use render_tape::vm::{Limits, RenderRoot, Vm};
//!
//! let mut program = Program::new();
//! let template = Template::new(vec![
//!     Element::new("h1")
//!         .child(Statement::append(Expr::path("this.title")))
//!         .build(),
//! ]);
//! let compiled = compile_template(&mut program, &Registry::new(), &template)?;
//!
//! let model = RootReference::new(Value::object([("title", Value::str("Hello"))]));
//! let mut vm = Vm::new(MemoryTree::new(), Limits::default());
//! let root = RenderRoot::new(vm.env().root(), model.clone());
//! let mut result = vm.render(&program, &compiled, &root, TraceMask::NONE, None)?;
//! assert_eq!(vm.env().inner_html(vm.env().root()), "<h1>Hello</h1>");
//!
//! model.update(Value::object([("title", Value::str("Goodbye"))]));
//! result.rerender(&mut vm, &program, RerenderOptions::default(), TraceMask::NONE, None)?;
//! assert_eq!(vm.env().inner_html(vm.env().root()), "<h1>Goodbye</h1>");
//!
//! result.destroy(&mut vm);
//! assert_eq!(vm.env().inner_html(vm.env().root()), "");
//! # Ok::<(), Box<dyn core::error::Error>>(())
//! ```

#![no_std]

extern crate alloc;

pub mod asm;
pub mod bounds;
pub mod compile;
pub mod component;
pub mod constants;
pub mod disasm;
pub(crate) mod elements;
pub mod env;
pub mod heap;
pub mod iterate;
pub mod opcode;
pub mod reference;
pub mod render;
pub mod rerender;
pub mod scope;
pub mod syntax;
pub mod tag;
pub mod trace;
pub mod tree;
pub(crate) mod updating;
pub mod value;
pub mod vm;
