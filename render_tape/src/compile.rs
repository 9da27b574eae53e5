// Copyright 2026 the Render Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Template compiler: lowers [`crate::syntax`] trees to bytecode through [`Asm`].
//!
//! Names resolve to scope symbols at compile time. Each template (or layout) owns one symbol
//! table; slot 0 is `self`, every block parameter gets a fresh slot, and a layout's named
//! arguments and yieldable blocks get the slots `@name`, `&default` and `&inverse`.
//!
//! Nested blocks are compiled eagerly into their own heap allocations before the statement that
//! uses them is emitted.
//!
//! Spans whose shape depends on a value (`if`, `each`, guarded appends, `{{component}}`) are
//! emitted as replayable spans:
//!
//! ```text
//!     push_frame
//!     return_to END
//!     <operands>
//!     enter n          ; records a re-executable span over the top n operands
//!     <body>
//! FINALLY:
//!     exit
//!     return
//! END:
//!     pop_frame
//! ```
//!
//! On first render `return` lands on `END`; when the span is replayed on its own, `return` halts.

use alloc::boxed::Box;
use alloc::format;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::fmt;

use hashbrown::HashMap;

use crate::asm::{Asm, AsmError};
use crate::component::{ComponentDefinition, Helper};
use crate::heap::{CompiledBlock, CompiledLayout, CompiledTemplate, Heap, HeapError, Program};
use crate::iterate::DEFAULT_KEY;
use crate::opcode::Register;
use crate::syntax::{Args, Attr, Block, Element, Expr, Layout, LayoutKind, Statement, Template};
use crate::value::Value;

/// A template compilation error. Nothing is finalized for the template that failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CompileError {
    /// The assembler rejected the instruction stream.
    Asm(AsmError),
    /// Heap allocation failed.
    Heap(HeapError),
    /// A component name the resolver does not know.
    UnknownComponent {
        /// The name.
        name: Box<str>,
    },
    /// A helper name the resolver does not know.
    UnknownHelper {
        /// The name.
        name: Box<str>,
    },
    /// A block parameter or `@arg` that is not in scope.
    UnknownLocal {
        /// The name.
        name: Box<str>,
    },
    /// `yield`, `has-block` or `has-block-params` outside a layout, or naming a block other than
    /// `default` and `inverse`.
    InvalidBlockTarget {
        /// The block name.
        name: Box<str>,
    },
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asm(e) => write!(f, "assembler error: {e}"),
            Self::Heap(e) => write!(f, "heap error: {e}"),
            Self::UnknownComponent { name } => write!(f, "unknown component '{name}'"),
            Self::UnknownHelper { name } => write!(f, "unknown helper '{name}'"),
            Self::UnknownLocal { name } => write!(f, "'{name}' is not in scope"),
            Self::InvalidBlockTarget { name } => write!(f, "cannot address block '{name}' here"),
        }
    }
}

impl core::error::Error for CompileError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Asm(e) => Some(e),
            Self::Heap(e) => Some(e),
            _ => None,
        }
    }
}

impl From<AsmError> for CompileError {
    fn from(e: AsmError) -> Self {
        Self::Asm(e)
    }
}

impl From<HeapError> for CompileError {
    fn from(e: HeapError) -> Self {
        Self::Heap(e)
    }
}

/// Compile-time name resolution for components and helpers.
pub trait Resolver {
    /// Looks up a component definition.
    fn component(&self, name: &str) -> Option<Rc<ComponentDefinition>>;
    /// Looks up a helper.
    fn helper(&self, name: &str) -> Option<Rc<dyn Helper>>;
}

/// A map-backed [`Resolver`].
#[derive(Clone, Default)]
pub struct Registry {
    components: HashMap<Box<str>, Rc<ComponentDefinition>>,
    helpers: HashMap<Box<str>, Rc<dyn Helper>>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("components", &self.components.keys().collect::<Vec<_>>())
            .field("helpers", &self.helpers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a component under its definition's name, replacing any previous one.
    pub fn register_component(&mut self, definition: Rc<ComponentDefinition>) -> &mut Self {
        self.components
            .insert(definition.name().into(), definition);
        self
    }

    /// Registers a helper.
    pub fn register_helper(&mut self, name: &str, helper: Rc<dyn Helper>) -> &mut Self {
        self.helpers.insert(name.into(), helper);
        self
    }
}

impl Resolver for Registry {
    fn component(&self, name: &str) -> Option<Rc<ComponentDefinition>> {
        self.components.get(name).cloned()
    }

    fn helper(&self, name: &str) -> Option<Rc<dyn Helper>> {
        self.helpers.get(name).cloned()
    }
}

/// Compiles a top-level template into `program`.
///
/// On failure the heap is left as it was, including any nested blocks already committed.
pub fn compile_template(
    program: &mut Program,
    resolver: &dyn Resolver,
    template: &Template,
) -> Result<CompiledTemplate, CompileError> {
    let (heap, constants) = program.parts_mut();
    all_or_nothing(heap, |heap| {
        let mut compiler = Compiler::new(resolver, false);
        let mut asm = Asm::new(constants);
        compiler.statements(&mut asm, heap, &template.statements)?;
        let handle = asm.commit(heap)?;
        Ok(CompiledTemplate {
            handle,
            symbols: compiler.symbols.names.into_boxed_slice(),
        })
    })
}

/// Compiles a component layout into `program`.
///
/// A wrapped layout renders inside an element named by the instance's tag name; the component's
/// `did_create_element` hook sees that element before its children are rendered.
pub fn compile_layout(
    program: &mut Program,
    resolver: &dyn Resolver,
    layout: &Layout,
) -> Result<Rc<CompiledLayout>, CompileError> {
    let (heap, constants) = program.parts_mut();
    all_or_nothing(heap, |heap| {
        let mut compiler = Compiler::new(resolver, true);
        let mut asm = Asm::new(constants);
        let wrapped = layout.kind == LayoutKind::Wrapped;
        if wrapped {
            asm.get_component_tag_name(Register::S0)
                .open_dynamic_element()
                .did_create_element(Register::S0)
                .flush_element();
        }
        compiler.statements(&mut asm, heap, &layout.statements)?;
        if wrapped {
            asm.close_element();
        }
        let handle = asm.commit(heap)?;
        Ok(Rc::new(CompiledLayout {
            handle,
            symbols: compiler.symbols.names.into_boxed_slice(),
            has_eval: compiler.symbols.has_eval,
        }))
    })
}

fn all_or_nothing<T>(
    heap: &mut Heap,
    compile: impl FnOnce(&mut Heap) -> Result<T, CompileError>,
) -> Result<T, CompileError> {
    let mark = heap.mark();
    compile(heap).inspect_err(|_| heap.rollback(mark))
}

#[derive(Default)]
struct Symbols {
    /// Slot `i + 1` is `names[i]`.
    names: Vec<Box<str>>,
    /// Block parameters in scope, innermost last.
    locals: Vec<(Rc<str>, u32)>,
    has_eval: bool,
}

impl Symbols {
    fn allocate(&mut self, name: &str) -> u32 {
        self.names.push(name.into());
        u32::try_from(self.names.len()).unwrap_or(u32::MAX)
    }

    /// The slot for a by-name symbol (`@arg`, `&block`), allocating it on first use.
    fn named(&mut self, name: &str) -> u32 {
        match self.names.iter().position(|n| &**n == name) {
            Some(i) => u32::try_from(i + 1).unwrap_or(u32::MAX),
            None => self.allocate(name),
        }
    }

    fn local(&self, name: &str) -> Option<u32> {
        self.locals
            .iter()
            .rev()
            .find(|(n, _)| **n == *name)
            .map(|(_, s)| *s)
    }
}

struct Compiler<'r> {
    resolver: &'r dyn Resolver,
    layout: bool,
    symbols: Symbols,
}

type Step<'s, C> = &'s mut dyn FnMut(&mut C, &mut Asm<'_>, &mut Heap) -> Result<(), CompileError>;

/// Invokes `block` in a child scope, binding its parameters from the top `on_stack` slots.
/// Parameters beyond `on_stack` read as `undefined`.
fn invoke_static_block(
    asm: &mut Asm<'_>,
    block: &Rc<CompiledBlock>,
    on_stack: u32,
) -> Result<(), CompileError> {
    asm.child_scope();
    for (i, &symbol) in block.parameters.iter().enumerate() {
        let i = u32::try_from(i).unwrap_or(u32::MAX);
        if i < on_stack {
            asm.dup(Register::Sp, on_stack - 1 - i);
        } else {
            asm.primitive(&Value::Undefined)?.primitive_reference();
        }
        asm.set_variable(symbol);
    }
    asm.push_frame()
        .push_block(block.clone())
        .invoke_static()
        .pop_frame()
        .pop_scope();
    Ok(())
}

fn push_optional_block(
    asm: &mut Asm<'_>,
    block: Option<&Rc<CompiledBlock>>,
) -> Result<(), CompileError> {
    match block {
        Some(block) => {
            asm.push_block(block.clone());
        }
        None => {
            asm.primitive(&Value::Null)?;
        }
    }
    Ok(())
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

impl<'r> Compiler<'r> {
    fn new(resolver: &'r dyn Resolver, layout: bool) -> Self {
        Self {
            resolver,
            layout,
            symbols: Symbols::default(),
        }
    }

    fn statements(
        &mut self,
        asm: &mut Asm<'_>,
        heap: &mut Heap,
        statements: &[Statement],
    ) -> Result<(), CompileError> {
        for s in statements {
            self.statement(asm, heap, s)?;
        }
        Ok(())
    }

    /// Compiles `block` into its own allocation, with its parameters in scope.
    fn block(
        &mut self,
        asm: &mut Asm<'_>,
        heap: &mut Heap,
        block: &Block,
    ) -> Result<Rc<CompiledBlock>, CompileError> {
        let mark = self.symbols.locals.len();
        let mut parameters = Vec::with_capacity(block.params.len());
        for p in &block.params {
            let symbol = self.symbols.allocate(p);
            self.symbols.locals.push((p.clone(), symbol));
            parameters.push(symbol);
        }
        let mut inner = Asm::new(asm.constants_mut());
        let body = self.statements(&mut inner, heap, &block.statements);
        self.symbols.locals.truncate(mark);
        body?;
        let handle = inner.commit(heap)?;
        Ok(Rc::new(CompiledBlock {
            handle,
            parameters: parameters.into_boxed_slice(),
        }))
    }

    fn optional_block(
        &mut self,
        asm: &mut Asm<'_>,
        heap: &mut Heap,
        block: Option<&Block>,
    ) -> Result<Option<Rc<CompiledBlock>>, CompileError> {
        block.map(|b| self.block(asm, heap, b)).transpose()
    }

    fn replayable(
        &mut self,
        asm: &mut Asm<'_>,
        heap: &mut Heap,
        operands: u32,
        push: Step<'_, Self>,
        body: Step<'_, Self>,
    ) -> Result<(), CompileError> {
        asm.push_frame().start_labels().return_to("END");
        push(self, asm, heap)?;
        asm.enter(operands);
        body(self, asm, heap)?;
        asm.label("FINALLY")
            .exit()
            .ret()
            .label("END")
            .pop_frame();
        asm.stop_labels()?;
        Ok(())
    }

    fn statement(
        &mut self,
        asm: &mut Asm<'_>,
        heap: &mut Heap,
        statement: &Statement,
    ) -> Result<(), CompileError> {
        match statement {
            Statement::Text(text) => {
                asm.text(text);
            }
            Statement::Comment(text) => {
                asm.comment(text);
            }
            Statement::Append { value, trusting } if value.is_read() => {
                self.guarded_append(asm, heap, value, *trusting)?;
            }
            Statement::Append { value, trusting } => {
                self.expr(asm, heap, value)?;
                asm.append_content(*trusting);
            }
            Statement::Element(element) => self.element(asm, heap, element)?,
            Statement::If {
                cond,
                then,
                otherwise,
            } => self.conditional(asm, heap, cond, then, otherwise.as_ref(), false)?,
            Statement::Unless {
                cond,
                then,
                otherwise,
            } => self.conditional(asm, heap, cond, then, otherwise.as_ref(), true)?,
            Statement::Each {
                iterable,
                key,
                body,
                otherwise,
            } => self.each(asm, heap, iterable, key.as_deref(), body, otherwise.as_ref())?,
            Statement::With {
                value,
                body,
                otherwise,
            } => self.with(asm, heap, value, body, otherwise.as_ref())?,
            Statement::WithDynamicVars { vars, body } => {
                let body = self.block(asm, heap, body)?;
                asm.push_dynamic_scope();
                for (_, value) in vars {
                    self.expr(asm, heap, value)?;
                }
                let names: Vec<&str> = vars.iter().map(|(n, _)| &**n).collect();
                asm.bind_dynamic_scope(&names);
                invoke_static_block(asm, &body, 0)?;
                asm.pop_dynamic_scope();
            }
            Statement::Component(invocation) => {
                let definition = self.resolver.component(&invocation.name).ok_or_else(|| {
                    CompileError::UnknownComponent {
                        name: Box::from(&*invocation.name),
                    }
                })?;
                let default = self.optional_block(asm, heap, invocation.default.as_ref())?;
                let inverse = self.optional_block(asm, heap, invocation.inverse.as_ref())?;
                let blocks = [default.as_ref(), inverse.as_ref()];
                if definition.allows_fast_path() {
                    self.invoke_static_component(asm, heap, &definition, &invocation.args, blocks)?;
                } else {
                    asm.push_component_definition(definition);
                    self.invoke_component(asm, heap, &invocation.args, blocks)?;
                }
            }
            Statement::DynamicComponent {
                definition,
                args,
                default,
                inverse,
            } => {
                let default = self.optional_block(asm, heap, default.as_ref())?;
                let inverse = self.optional_block(asm, heap, inverse.as_ref())?;
                self.replayable(
                    asm,
                    heap,
                    1,
                    &mut |c, asm, heap| c.expr(asm, heap, definition),
                    &mut |c, asm, heap| {
                        asm.push_dynamic_component_definition();
                        c.invoke_component(asm, heap, args, [default.as_ref(), inverse.as_ref()])
                    },
                )?;
            }
            Statement::Yield { to, params } => self.yield_to(asm, heap, to, params)?,
            Statement::Debugger => self.debugger(asm),
        }
        Ok(())
    }

    /// `{{a.b}}`: renders a component if the value is a definition, text otherwise. The choice
    /// is made again whenever the value changes kind.
    fn guarded_append(
        &mut self,
        asm: &mut Asm<'_>,
        heap: &mut Heap,
        value: &Expr,
        trusting: bool,
    ) -> Result<(), CompileError> {
        self.replayable(
            asm,
            heap,
            1,
            &mut |c, asm, heap| c.expr(asm, heap, value),
            &mut |c, asm, heap| {
                asm.dup(Register::Sp, 0)
                    .is_component()
                    .jump_unless("TEXT")
                    .push_dynamic_component_definition();
                c.invoke_component(asm, heap, &Args::default(), [None, None])?;
                asm.jump("FINALLY")
                    .label("TEXT")
                    .append_content(trusting);
                Ok(())
            },
        )
    }

    fn element(
        &mut self,
        asm: &mut Asm<'_>,
        heap: &mut Heap,
        element: &Element,
    ) -> Result<(), CompileError> {
        asm.open_element(&element.tag);
        for attr in &element.attrs {
            match attr {
                Attr::Static { name, value } => {
                    asm.static_attr(name, value);
                }
                Attr::Dynamic {
                    name,
                    value,
                    trusting,
                } => {
                    self.expr(asm, heap, value)?;
                    asm.dynamic_attr(name, *trusting);
                }
            }
        }
        for modifier in &element.modifiers {
            asm.primitive(&Value::Null)?.primitive(&Value::Null)?;
            self.args(asm, heap, &modifier.args)?;
            asm.modifier(&modifier.name);
        }
        asm.flush_element();
        self.statements(asm, heap, &element.children)?;
        asm.close_element();
        Ok(())
    }

    fn conditional(
        &mut self,
        asm: &mut Asm<'_>,
        heap: &mut Heap,
        cond: &Expr,
        then: &Block,
        otherwise: Option<&Block>,
        negate: bool,
    ) -> Result<(), CompileError> {
        let then = self.block(asm, heap, then)?;
        let otherwise = self.optional_block(asm, heap, otherwise)?;
        self.replayable(
            asm,
            heap,
            1,
            &mut |c, asm, heap| {
                c.expr(asm, heap, cond)?;
                asm.to_boolean();
                Ok(())
            },
            &mut |_, asm, _| {
                if negate {
                    asm.jump_if("ELSE");
                } else {
                    asm.jump_unless("ELSE");
                }
                invoke_static_block(asm, &then, 0)?;
                asm.jump("FINALLY").label("ELSE");
                if let Some(otherwise) = &otherwise {
                    invoke_static_block(asm, otherwise, 0)?;
                }
                Ok(())
            },
        )
    }

    fn with(
        &mut self,
        asm: &mut Asm<'_>,
        heap: &mut Heap,
        value: &Expr,
        body: &Block,
        otherwise: Option<&Block>,
    ) -> Result<(), CompileError> {
        let body = self.block(asm, heap, body)?;
        let otherwise = self.optional_block(asm, heap, otherwise)?;
        self.replayable(
            asm,
            heap,
            1,
            &mut |c, asm, heap| c.expr(asm, heap, value),
            &mut |_, asm, _| {
                asm.dup(Register::Sp, 0).to_boolean().jump_unless("ELSE");
                invoke_static_block(asm, &body, 1)?;
                asm.jump("FINALLY").label("ELSE");
                if let Some(otherwise) = &otherwise {
                    invoke_static_block(asm, otherwise, 0)?;
                }
                Ok(())
            },
        )
    }

    /// Keyed iteration. Each item runs `body` with its value and memo (index or entry key) as
    /// block parameters, inside its own re-executable span.
    fn each(
        &mut self,
        asm: &mut Asm<'_>,
        heap: &mut Heap,
        iterable: &Expr,
        key: Option<&str>,
        body: &Block,
        otherwise: Option<&Block>,
    ) -> Result<(), CompileError> {
        let body = self.block(asm, heap, body)?;
        let otherwise = self.optional_block(asm, heap, otherwise)?;
        let key = Value::str(key.unwrap_or(DEFAULT_KEY));
        self.replayable(
            asm,
            heap,
            2,
            &mut |c, asm, heap| {
                asm.primitive(&key)?.primitive_reference();
                c.expr(asm, heap, iterable)
            },
            &mut |_, asm, _| {
                asm.put_iterator()
                    .jump_unless("ELSE")
                    .push_frame()
                    .dup(Register::Fp, 1)
                    .return_to("ITER")
                    .enter_list("BODY");
                asm.label("ITER").iterate("BREAK");
                asm.label("BODY");
                invoke_static_block(asm, &body, 2)?;
                asm.pop(2).exit().ret();
                asm.label("BREAK")
                    .exit_list()
                    .pop_frame()
                    .jump("FINALLY")
                    .label("ELSE");
                if let Some(otherwise) = &otherwise {
                    invoke_static_block(asm, otherwise, 0)?;
                }
                Ok(())
            },
        )
    }

    /// Pushes the two yieldable blocks, the positional and named argument references, then
    /// captures them as one arguments slot.
    fn args_with_blocks(
        &mut self,
        asm: &mut Asm<'_>,
        heap: &mut Heap,
        args: &Args,
        blocks: [Option<&Rc<CompiledBlock>>; 2],
    ) -> Result<(), CompileError> {
        for block in blocks {
            push_optional_block(asm, block)?;
        }
        self.args(asm, heap, args)
    }

    fn args(&mut self, asm: &mut Asm<'_>, heap: &mut Heap, args: &Args) -> Result<(), CompileError> {
        for value in &args.positional {
            self.expr(asm, heap, value)?;
        }
        for (_, value) in &args.named {
            self.expr(asm, heap, value)?;
        }
        let names: Vec<&str> = args.named.iter().map(|(n, _)| &**n).collect();
        asm.push_args(&names, count(args.positional.len()));
        Ok(())
    }

    /// The general invocation path. Expects the definition on top of the stack and leaves
    /// nothing behind.
    fn invoke_component(
        &mut self,
        asm: &mut Asm<'_>,
        heap: &mut Heap,
        args: &Args,
        blocks: [Option<&Rc<CompiledBlock>>; 2],
    ) -> Result<(), CompileError> {
        let has_default = blocks[0].is_some();
        asm.fetch(Register::S0)
            .dup(Register::Sp, 1)
            .load(Register::S0);
        self.args_with_blocks(asm, heap, args, blocks)?;
        asm.prepare_args(Register::S0)
            .begin_component_transaction()
            .push_dynamic_scope()
            .create_component(has_default, Register::S0)
            .register_component_destructor(Register::S0)
            .get_component_self(Register::S0)
            .get_component_layout(Register::S0)
            .invoke_component_layout()
            .pop_frame()
            .pop_scope()
            .did_render_layout(Register::S0)
            .pop_dynamic_scope()
            .commit_component_transaction()
            .load(Register::S0)
            .pop(1);
        Ok(())
    }

    /// The fast path: the layout's symbols are known, so only the arguments and blocks it reads
    /// are evaluated and bound straight into its root scope.
    fn invoke_static_component(
        &mut self,
        asm: &mut Asm<'_>,
        heap: &mut Heap,
        definition: &Rc<ComponentDefinition>,
        args: &Args,
        blocks: [Option<&Rc<CompiledBlock>>; 2],
    ) -> Result<(), CompileError> {
        let layout = definition.layout().clone();
        asm.fetch(Register::S0)
            .push_component_definition(definition.clone())
            .load(Register::S0)
            .begin_component_transaction()
            .push_dynamic_scope()
            .create_component(blocks[0].is_some(), Register::S0)
            .register_component_destructor(Register::S0)
            .get_component_self(Register::S0);

        let mut variables = Vec::new();
        for (name, value) in &args.named {
            if let Some(symbol) = layout.symbol(&format!("@{name}")) {
                self.expr(asm, heap, value)?;
                variables.push(symbol);
            }
        }
        let mut block_symbols = Vec::new();
        for (name, block) in ["&default", "&inverse"].into_iter().zip(blocks) {
            if let Some(symbol) = layout.symbol(name) {
                push_optional_block(asm, block)?;
                block_symbols.push(symbol);
            }
        }

        asm.root_scope(layout.scope_size(), true);
        for &symbol in block_symbols.iter().rev() {
            asm.set_block(symbol);
        }
        for &symbol in variables.iter().rev() {
            asm.set_variable(symbol);
        }
        asm.set_variable(0)
            .push_frame()
            .push_layout(layout)
            .invoke_static()
            .pop_frame()
            .pop_scope()
            .did_render_layout(Register::S0)
            .pop_dynamic_scope()
            .commit_component_transaction()
            .load(Register::S0);
        Ok(())
    }

    fn block_symbol(&mut self, name: &str) -> Result<u32, CompileError> {
        if !self.layout || !matches!(name, "default" | "inverse") {
            return Err(CompileError::InvalidBlockTarget { name: name.into() });
        }
        Ok(self.symbols.named(&format!("&{name}")))
    }

    fn yield_to(
        &mut self,
        asm: &mut Asm<'_>,
        heap: &mut Heap,
        to: &str,
        params: &[Expr],
    ) -> Result<(), CompileError> {
        let symbol = self.block_symbol(to)?;
        asm.push_frame()
            .primitive(&Value::Null)?
            .primitive(&Value::Null)?;
        for value in params {
            self.expr(asm, heap, value)?;
        }
        asm.push_args::<&str>(&[], count(params.len()))
            .get_block(symbol)
            .invoke_yield()
            .pop_scope()
            .pop_frame();
        Ok(())
    }

    fn debugger(&mut self, asm: &mut Asm<'_>) {
        let mut names: Vec<Rc<str>> = alloc::vec![Rc::from("this")];
        let mut symbols = alloc::vec![0];
        for (name, symbol) in &self.symbols.locals {
            names.push(name.clone());
            symbols.push(*symbol);
        }
        for (i, name) in self.symbols.names.iter().enumerate() {
            if name.starts_with('@') {
                names.push(Rc::from(&**name));
                symbols.push(count(i + 1));
            }
        }
        asm.debugger(&names, &symbols);
        self.symbols.has_eval = true;
    }

    fn expr(&mut self, asm: &mut Asm<'_>, heap: &mut Heap, expr: &Expr) -> Result<(), CompileError> {
        match expr {
            Expr::Literal(value) if value.is_primitive() => {
                asm.primitive(value)?.primitive_reference();
            }
            Expr::Literal(value) => {
                asm.push_serializable(value.clone());
            }
            Expr::This => {
                asm.get_variable(0);
            }
            Expr::Local(name) => {
                let symbol = self
                    .symbols
                    .local(name)
                    .ok_or_else(|| CompileError::UnknownLocal {
                        name: Box::from(&**name),
                    })?;
                asm.get_variable(symbol);
            }
            Expr::Arg(name) => {
                if !self.layout {
                    return Err(CompileError::UnknownLocal {
                        name: format!("@{name}").into(),
                    });
                }
                let symbol = self.symbols.named(&format!("@{name}"));
                asm.get_variable(symbol);
            }
            Expr::Name(name) => match self.symbols.local(name) {
                Some(symbol) => {
                    asm.get_variable(symbol);
                }
                None => {
                    asm.resolve_maybe_local(name);
                }
            },
            Expr::Path(head, segments) => {
                self.expr(asm, heap, head)?;
                for segment in segments {
                    asm.get_property(segment);
                }
            }
            Expr::Helper { name, args } => {
                let helper =
                    self.resolver
                        .helper(name)
                        .ok_or_else(|| CompileError::UnknownHelper {
                            name: Box::from(&**name),
                        })?;
                asm.primitive(&Value::Null)?.primitive(&Value::Null)?;
                self.args(asm, heap, args)?;
                asm.helper(name, helper);
            }
            Expr::Concat(parts) => {
                for part in parts {
                    self.expr(asm, heap, part)?;
                }
                asm.concat(count(parts.len()));
            }
            Expr::HasBlock(name) => {
                let symbol = self.block_symbol(name)?;
                asm.has_block(symbol);
            }
            Expr::HasBlockParams(name) => {
                let symbol = self.block_symbol(name)?;
                asm.has_block_params(symbol);
            }
        }
        Ok(())
    }
}
