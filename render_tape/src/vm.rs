// Copyright 2026 the Render Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The render VM.
//!
//! The interpreter walks fixed-width instructions from the program heap. It keeps a value stack,
//! a register file (`pc`, `ra`, `fp`, and the temporaries `s0`, `s1`, `t0`, `t1`), a lexical scope
//! stack, a dynamic scope stack, the element builder and the stack of updating-opcode lists that
//! new opcodes are appended to.
//!
//! Every instruction executes against a [`Ctx`]: the environment, the program, the per-render
//! state (regions and update program), the limits and the tracer.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;

use crate::bounds::{Destroyable, RegionId, Regions};
use crate::component::{CapturedArgs, ComponentDefinition, ComponentInstance};
use crate::constants::OtherConst;
use crate::elements::ElementStack;
use crate::env::{Environment, NodeHandle};
use crate::heap::{CompiledBlock, CompiledLayout, Handle, HeapError, Program};
use crate::iterate::{self, DEFAULT_KEY, IterablePresenceReference, Item};
use crate::opcode::{INSTR_SLOTS, Opcode, PrimitiveTag, Register, decode_primitive, immediate};
use crate::reference::{
    ConcatReference, ConditionalReference, ConstReference, ExprError, HelperReference,
    IsComponentReference, Ref, UpdatableReference,
};
use crate::scope::{Binding, DynamicScope, Scope};
use crate::tag::GroupTag;
use crate::trace::{ScopeKind, Tracer};
use crate::updating::{ItemRefs, OpId, OpKind, ResumeState, UpdateProgram};
use crate::value::Value;

/// Execution limits for one render pass (and for each span re-executed during rerender).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Limits {
    /// Instruction budget.
    pub fuel: u64,
    /// Maximum nested frames.
    pub max_call_depth: usize,
    /// Maximum value-stack depth.
    pub max_stack_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            fuel: 10_000_000,
            max_call_depth: 512,
            max_stack_depth: 65_536,
        }
    }
}

/// A resource limit that stopped a pass.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LimitError {
    /// The instruction budget ran out.
    FuelExceeded,
    /// Too many nested frames.
    CallDepthExceeded,
    /// The value stack grew too deep.
    StackDepthExceeded,
}

impl fmt::Display for LimitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FuelExceeded => write!(f, "fuel exceeded"),
            Self::CallDepthExceeded => write!(f, "call depth exceeded"),
            Self::StackDepthExceeded => write!(f, "stack depth exceeded"),
        }
    }
}

/// A VM consistency failure: the program was not produced by a correct compiler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InternalError {
    /// `pc` is not an instruction boundary inside a finalized allocation.
    InvalidPc,
    /// The opcode slot holds an unknown opcode.
    UnknownOpcode(u32),
    /// An operand is out of range for its kind.
    BadOperand,
    /// A constant index is missing or names the wrong kind of constant.
    BadConstant,
    /// Pop from an empty stack.
    StackUnderflow,
    /// A stack slot or register held the wrong kind of value.
    WrongSlot {
        /// What the instruction expected.
        expected: &'static str,
    },
    /// `PopFrame` without a matching `PushFrame`, or frames left open.
    UnbalancedFrames,
    /// Element open/close mismatch.
    UnbalancedElements,
    /// An attribute or modifier instruction with no element under construction.
    NoElement,
    /// A block instruction with no open block, or blocks left open.
    NoBlock,
    /// Scope stack exhausted.
    NoScope,
    /// A region or updating opcode was used after being destroyed.
    StaleState,
    /// A heap lookup failed.
    Heap(HeapError),
}

impl fmt::Display for InternalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPc => write!(f, "invalid pc"),
            Self::UnknownOpcode(op) => write!(f, "unknown opcode {op:#x}"),
            Self::BadOperand => write!(f, "bad operand"),
            Self::BadConstant => write!(f, "bad constant index"),
            Self::StackUnderflow => write!(f, "stack underflow"),
            Self::WrongSlot { expected } => write!(f, "expected {expected} on the stack"),
            Self::UnbalancedFrames => write!(f, "unbalanced frames"),
            Self::UnbalancedElements => write!(f, "unbalanced elements"),
            Self::NoElement => write!(f, "no element under construction"),
            Self::NoBlock => write!(f, "unbalanced blocks"),
            Self::NoScope => write!(f, "scope stack exhausted"),
            Self::StaleState => write!(f, "stale region or updating opcode"),
            Self::Heap(e) => write!(f, "heap error: {e}"),
        }
    }
}

/// A render or rerender failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderError {
    /// User code (a helper, a component hook, a resolution) failed.
    Expression(ExprError),
    /// The program is inconsistent.
    Internal {
        /// Slot address of the failing instruction.
        pc: usize,
        /// What went wrong.
        error: InternalError,
    },
    /// A limit was hit.
    Limit(LimitError),
    /// A stale branch decision reached the top-level exception handler.
    UnhandledUpdate,
    /// The render result was already destroyed.
    Destroyed,
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expression(e) => write!(f, "expression failed: {e}"),
            Self::Internal { pc, error } => write!(f, "internal error at pc {pc}: {error}"),
            Self::Limit(e) => write!(f, "limit: {e}"),
            Self::UnhandledUpdate => write!(f, "unhandled update exception"),
            Self::Destroyed => write!(f, "render result already destroyed"),
        }
    }
}

impl core::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Expression(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ExprError> for RenderError {
    fn from(e: ExprError) -> Self {
        Self::Expression(e)
    }
}

impl From<LimitError> for RenderError {
    fn from(e: LimitError) -> Self {
        Self::Limit(e)
    }
}

/// Where, and against what, a template renders.
#[derive(Clone, Debug)]
pub struct RenderRoot {
    /// The element output is inserted into.
    pub parent: NodeHandle,
    /// Output is inserted before this node, or appended when `None`.
    pub next_sibling: Option<NodeHandle>,
    /// The reference bound to `this`.
    pub self_ref: Ref,
    /// Initial dynamic scope.
    pub dynamic_scope: DynamicScope,
}

impl RenderRoot {
    /// Renders at the end of `parent` with `self_ref` as `this` and an empty dynamic scope.
    #[must_use]
    pub fn new(parent: NodeHandle, self_ref: Ref) -> Self {
        Self {
            parent,
            next_sibling: None,
            self_ref,
            dynamic_scope: DynamicScope::new(),
        }
    }
}

/// Captured arguments plus the blocks passed alongside them.
pub(crate) struct ArgsSlot {
    pub(crate) args: CapturedArgs,
    pub(crate) blocks: [Option<Rc<CompiledBlock>>; 2],
}

pub(crate) struct ComponentState {
    pub(crate) definition: Rc<ComponentDefinition>,
    pub(crate) instance: Rc<dyn ComponentInstance>,
}

pub(crate) struct ListIter {
    items: alloc::vec::IntoIter<Item>,
    iterable: Ref,
    key: Rc<str>,
}

/// One value-stack slot or register.
#[derive(Clone, Default)]
pub(crate) enum Slot {
    #[default]
    Empty,
    Addr(usize),
    Value(Value),
    Ref(Ref),
    Block(Option<Rc<CompiledBlock>>),
    Layout(Rc<CompiledLayout>),
    Args(Rc<ArgsSlot>),
    Definition(Rc<ComponentDefinition>),
    Component(Rc<ComponentState>),
    Iterator(Rc<RefCell<ListIter>>),
}

/// Per-render persistent state: regions and the update program.
#[derive(Default)]
pub(crate) struct RenderState {
    pub(crate) regions: Regions,
    pub(crate) ops: UpdateProgram,
}

pub(crate) struct Ctx<'a, 't> {
    pub(crate) env: &'a mut dyn Environment,
    pub(crate) program: &'a Program,
    pub(crate) state: &'a mut RenderState,
    pub(crate) limits: &'a Limits,
    pub(crate) trace: &'a mut Tracer<'t>,
}

pub(crate) const HALT: usize = usize::MAX;
const NO_FRAME: usize = usize::MAX;

struct Transaction {
    guard: OpId,
    group: Rc<GroupTag>,
}

/// The bytecode interpreter.
pub(crate) struct Interp {
    pc: usize,
    ra: usize,
    fp: usize,
    frames: usize,
    instr_pc: usize,
    fuel: u64,
    stack: Vec<Slot>,
    regs: [Slot; 4],
    scopes: Vec<Rc<Scope>>,
    dynamic_scopes: Vec<DynamicScope>,
    pub(crate) elements: ElementStack,
    owners: Vec<Option<OpId>>,
    groups: Vec<Rc<GroupTag>>,
    transactions: Vec<Transaction>,
}

impl Interp {
    /// Prepares a top-level render of the template at `handle`.
    pub(crate) fn for_template(
        cx: &mut Ctx<'_, '_>,
        handle: Handle,
        scope_size: u32,
        root: &RenderRoot,
    ) -> Result<(Self, RegionId), RenderError> {
        let pc = cx
            .program
            .heap()
            .get_addr(handle)
            .map_err(|e| fault(0, InternalError::Heap(e)))?;
        let scope = Scope::root(scope_size, None);
        scope.bind(0, Binding::Ref(root.self_ref.clone()));
        let mut interp = Self::blank(
            cx,
            pc,
            scope,
            root.dynamic_scope.clone(),
            ElementStack::new(root.parent, root.next_sibling),
        );
        let region = interp.elements.push_block(&mut cx.state.regions);
        interp.owners.push(None);
        Ok((interp, region))
    }

    /// Prepares to run from a recorded point, inserting output into `parent` before `next`.
    pub(crate) fn resume(
        cx: &Ctx<'_, '_>,
        state: &ResumeState,
        parent: NodeHandle,
        next: Option<NodeHandle>,
    ) -> Self {
        let mut interp = Self::blank(
            cx,
            state.pc,
            state.scope.clone(),
            state.dynamic_scope.clone(),
            ElementStack::new(parent, next),
        );
        interp.stack = state.stack.clone();
        interp.groups = state.groups.clone();
        interp
    }

    fn blank(
        cx: &Ctx<'_, '_>,
        pc: usize,
        scope: Rc<Scope>,
        dynamic_scope: DynamicScope,
        elements: ElementStack,
    ) -> Self {
        Self {
            pc,
            ra: HALT,
            fp: NO_FRAME,
            frames: 0,
            instr_pc: pc,
            fuel: cx.limits.fuel,
            stack: Vec::new(),
            regs: Default::default(),
            scopes: alloc::vec![scope],
            dynamic_scopes: alloc::vec![dynamic_scope],
            elements,
            owners: Vec::new(),
            groups: Vec::new(),
            transactions: Vec::new(),
        }
    }

    pub(crate) fn is_halted(&self) -> bool {
        self.pc == HALT
    }

    pub(crate) fn push_owner(&mut self, owner: Option<OpId>) {
        self.owners.push(owner);
    }

    /// Runs until the program returns to `HALT`.
    pub(crate) fn run(&mut self, cx: &mut Ctx<'_, '_>) -> Result<(), RenderError> {
        while !self.is_halted() {
            self.step(cx)?;
        }
        Ok(())
    }

    /// Closes the root block of a top-level render and checks that everything is balanced.
    pub(crate) fn finish_render(&mut self, cx: &mut Ctx<'_, '_>) -> Result<RegionId, RenderError> {
        let root = self
            .elements
            .pop_block(&mut cx.state.regions, cx.env.tree(), true)
            .ok_or_else(|| self.fault(InternalError::NoBlock))?;
        self.check_balanced(1, 0)?;
        Ok(root)
    }

    /// Checks that a run closed everything it opened, leaving `owners` update lists and `blocks`
    /// regions open.
    pub(crate) fn check_balanced(&self, owners: usize, blocks: usize) -> Result<(), RenderError> {
        if self.frames != 0 {
            return Err(self.fault(InternalError::UnbalancedFrames));
        }
        if self.elements.open_elements() != 0 {
            return Err(self.fault(InternalError::UnbalancedElements));
        }
        if self.elements.depth() != blocks || self.owners.len() != owners {
            return Err(self.fault(InternalError::NoBlock));
        }
        Ok(())
    }

    fn fault(&self, error: InternalError) -> RenderError {
        fault(self.instr_pc, error)
    }

    fn wrong(&self, expected: &'static str) -> RenderError {
        self.fault(InternalError::WrongSlot { expected })
    }

    fn push(&mut self, cx: &Ctx<'_, '_>, slot: Slot) -> Result<(), RenderError> {
        if self.stack.len() >= cx.limits.max_stack_depth {
            return Err(LimitError::StackDepthExceeded.into());
        }
        self.stack.push(slot);
        Ok(())
    }

    fn pop(&mut self) -> Result<Slot, RenderError> {
        self.stack
            .pop()
            .ok_or_else(|| self.fault(InternalError::StackUnderflow))
    }

    fn pop_ref(&mut self) -> Result<Ref, RenderError> {
        match self.pop()? {
            Slot::Ref(r) => Ok(r),
            _ => Err(self.wrong("reference")),
        }
    }

    fn pop_block(&mut self) -> Result<Option<Rc<CompiledBlock>>, RenderError> {
        match self.pop()? {
            Slot::Block(b) => Ok(b),
            Slot::Value(Value::Null) => Ok(None),
            _ => Err(self.wrong("block")),
        }
    }

    fn pop_args(&mut self) -> Result<Rc<ArgsSlot>, RenderError> {
        match self.pop()? {
            Slot::Args(a) => Ok(a),
            _ => Err(self.wrong("arguments")),
        }
    }

    fn scope(&self) -> Result<&Rc<Scope>, RenderError> {
        self.scopes
            .last()
            .ok_or_else(|| self.fault(InternalError::NoScope))
    }

    fn dynamic_scope(&self) -> Result<&DynamicScope, RenderError> {
        self.dynamic_scopes
            .last()
            .ok_or_else(|| self.fault(InternalError::NoScope))
    }

    fn owner(&self) -> Option<OpId> {
        self.owners.last().copied().flatten()
    }

    fn register(&self, raw: u32) -> Result<Register, RenderError> {
        Register::from_u32(raw).ok_or_else(|| self.fault(InternalError::BadOperand))
    }

    fn temp(&self, raw: u32) -> Result<usize, RenderError> {
        match self.register(raw)? {
            Register::S0 => Ok(0),
            Register::S1 => Ok(1),
            Register::T0 => Ok(2),
            Register::T1 => Ok(3),
            _ => Err(self.fault(InternalError::BadOperand)),
        }
    }

    fn definition_in(&self, raw: u32) -> Result<Rc<ComponentDefinition>, RenderError> {
        match &self.regs[self.temp(raw)?] {
            Slot::Definition(d) => Ok(d.clone()),
            Slot::Component(c) => Ok(c.definition.clone()),
            _ => Err(self.wrong("component definition")),
        }
    }

    fn component_in(&self, raw: u32) -> Result<Rc<ComponentState>, RenderError> {
        match &self.regs[self.temp(raw)?] {
            Slot::Component(c) => Ok(c.clone()),
            _ => Err(self.wrong("component")),
        }
    }

    fn target(&self, offset: u32) -> Result<usize, RenderError> {
        let at = self.instr_pc as i64 + i64::from(offset as i32);
        usize::try_from(at).map_err(|_| self.fault(InternalError::InvalidPc))
    }

    fn string(&self, cx: &Ctx<'_, '_>, id: u32) -> Result<Rc<str>, RenderError> {
        cx.program
            .constants()
            .get_string(id)
            .cloned()
            .ok_or_else(|| self.fault(InternalError::BadConstant))
    }

    fn strings(&self, cx: &Ctx<'_, '_>, id: u32) -> Result<Vec<Rc<str>>, RenderError> {
        cx.program
            .constants()
            .get_string_array(id)
            .ok_or_else(|| self.fault(InternalError::BadConstant))
    }

    fn call(&mut self, cx: &Ctx<'_, '_>, handle: Handle) -> Result<(), RenderError> {
        self.ra = self.pc;
        self.pc = cx
            .program
            .heap()
            .get_addr(handle)
            .map_err(|e| self.fault(InternalError::Heap(e)))?;
        Ok(())
    }

    fn push_frame(&mut self, cx: &mut Ctx<'_, '_>) -> Result<(), RenderError> {
        if self.frames >= cx.limits.max_call_depth {
            return Err(LimitError::CallDepthExceeded.into());
        }
        self.push(cx, Slot::Addr(self.ra))?;
        self.push(cx, Slot::Addr(self.fp))?;
        self.fp = self.stack.len() - 2;
        self.frames += 1;
        cx.trace.scope_enter(ScopeKind::Frame, self.frames);
        Ok(())
    }

    fn pop_frame(&mut self, cx: &mut Ctx<'_, '_>) -> Result<(), RenderError> {
        if self.frames == 0 || self.fp == NO_FRAME {
            return Err(self.fault(InternalError::UnbalancedFrames));
        }
        let (Some(Slot::Addr(ra)), Some(Slot::Addr(fp))) =
            (self.stack.get(self.fp), self.stack.get(self.fp + 1))
        else {
            return Err(self.fault(InternalError::UnbalancedFrames));
        };
        let (ra, fp) = (*ra, *fp);
        cx.trace.scope_exit(ScopeKind::Frame, self.frames);
        self.stack.truncate(self.fp);
        self.ra = ra;
        self.fp = fp;
        self.frames -= 1;
        Ok(())
    }

    /// Appends an updating opcode to the current list and feeds its tag to open cache groups.
    fn push_op(&mut self, cx: &mut Ctx<'_, '_>, kind: OpKind) -> OpId {
        if !self.groups.is_empty() {
            let tag = kind.tag();
            for g in &self.groups {
                g.add(&tag);
            }
        }
        cx.state.ops.push(self.owner(), kind)
    }

    fn capture(&self, count: usize) -> Result<Rc<ResumeState>, RenderError> {
        let start = self
            .stack
            .len()
            .checked_sub(count)
            .ok_or_else(|| self.fault(InternalError::StackUnderflow))?;
        Ok(Rc::new(ResumeState {
            pc: self.pc,
            scope: self.scope()?.clone(),
            dynamic_scope: self.dynamic_scope()?.clone(),
            stack: self.stack[start..].to_vec(),
            groups: self.groups.clone(),
        }))
    }

    fn decode_primitive(&self, cx: &Ctx<'_, '_>, raw: u32) -> Result<Value, RenderError> {
        let (tag, payload) =
            decode_primitive(raw).ok_or_else(|| self.fault(InternalError::BadOperand))?;
        Ok(match tag {
            PrimitiveTag::Int => Value::Int(i64::from(payload)),
            PrimitiveTag::NegativeInt => Value::Int(-i64::from(payload)),
            PrimitiveTag::Number => cx
                .program
                .constants()
                .get_number(payload)
                .map(Value::from)
                .ok_or_else(|| self.fault(InternalError::BadConstant))?,
            PrimitiveTag::String => Value::Str(self.string(cx, payload)?),
            PrimitiveTag::Immediate => match payload {
                immediate::FALSE => Value::Bool(false),
                immediate::TRUE => Value::Bool(true),
                immediate::NULL => Value::Null,
                immediate::UNDEFINED => Value::Undefined,
                _ => return Err(self.fault(InternalError::BadOperand)),
            },
        })
    }

    /// Pushes an item's value and memo, then opens its block and updating span.
    pub(crate) fn enter_item(
        &mut self,
        cx: &mut Ctx<'_, '_>,
        item: Item,
    ) -> Result<(RegionId, OpId), RenderError> {
        let value = UpdatableReference::new(item.value);
        let memo = UpdatableReference::new(item.memo);
        self.push(cx, Slot::Ref(value.clone()))?;
        self.push(cx, Slot::Ref(memo.clone()))?;
        let state = self.capture(2)?;
        let region = self.elements.push_block(&mut cx.state.regions);
        let id = self.push_op(
            cx,
            OpKind::Try {
                region,
                state,
                item: Some(ItemRefs {
                    key: item.key,
                    value,
                    memo,
                }),
            },
        );
        self.owners.push(Some(id));
        Ok((region, id))
    }

    /// Executes one instruction.
    pub(crate) fn step(&mut self, cx: &mut Ctx<'_, '_>) -> Result<(), RenderError> {
        if self.fuel == 0 {
            return Err(LimitError::FuelExceeded.into());
        }
        self.fuel -= 1;
        let pc = self.pc;
        self.instr_pc = pc;
        let program = cx.program;
        let [raw, a, b, _] = program
            .heap()
            .instr(pc)
            .ok_or_else(|| self.fault(InternalError::InvalidPc))?;
        let op = Opcode::from_u32(raw).ok_or_else(|| self.fault(InternalError::UnknownOpcode(raw)))?;
        cx.trace.instr(pc, op);
        self.pc = pc + INSTR_SLOTS;

        match op {
            Opcode::Nop => {}
            Opcode::Return => self.pc = self.ra,
            Opcode::ReturnTo => self.ra = self.target(a)?,
            Opcode::PushFrame => self.push_frame(cx)?,
            Opcode::PopFrame => self.pop_frame(cx)?,
            Opcode::Jump => self.pc = self.target(a)?,
            Opcode::JumpIf | Opcode::JumpUnless => {
                let r = self.pop_ref()?;
                let value = r.value()?;
                let tag = r.tag();
                let truthy = value.is_truthy();
                if !tag.is_const() {
                    let snapshot = tag.value();
                    self.push_op(
                        cx,
                        OpKind::Assert {
                            reference: r,
                            last: value,
                            snapshot,
                        },
                    );
                }
                if truthy == (op == Opcode::JumpIf) {
                    self.pc = self.target(a)?;
                }
            }
            Opcode::Enter => {
                let state = self.capture(a as usize)?;
                let region = self.elements.push_block(&mut cx.state.regions);
                let id = self.push_op(
                    cx,
                    OpKind::Try {
                        region,
                        state,
                        item: None,
                    },
                );
                self.owners.push(Some(id));
            }
            Opcode::Exit => {
                self.elements
                    .pop_block(&mut cx.state.regions, cx.env.tree(), true)
                    .ok_or_else(|| self.fault(InternalError::NoBlock))?;
                self.owners
                    .pop()
                    .ok_or_else(|| self.fault(InternalError::NoBlock))?;
            }
            Opcode::InvokeStatic => match self.pop()? {
                Slot::Block(Some(block)) => self.call(cx, block.handle)?,
                Slot::Layout(layout) => self.call(cx, layout.handle)?,
                _ => return Err(self.wrong("block or layout")),
            },
            Opcode::InvokeYield => {
                let block = self.pop_block()?;
                let args = self.pop_args()?;
                let current = self.scope()?.clone();
                let scope = match current.caller() {
                    Some(caller) => caller.child(),
                    None => current.child(),
                };
                match block {
                    Some(block) => {
                        for (i, &symbol) in block.parameters.iter().enumerate() {
                            let r = args
                                .args
                                .positional
                                .get(i)
                                .cloned()
                                .unwrap_or_else(|| ConstReference::new(Value::Undefined));
                            scope.bind(symbol, Binding::Ref(r));
                        }
                        self.scopes.push(scope);
                        self.call(cx, block.handle)?;
                    }
                    None => self.scopes.push(scope),
                }
            }
            Opcode::Load => match self.register(a)? {
                Register::Ra | Register::Fp => {
                    let Slot::Addr(addr) = self.pop()? else {
                        return Err(self.wrong("address"));
                    };
                    if self.register(a)? == Register::Ra {
                        self.ra = addr;
                    } else {
                        self.fp = addr;
                    }
                }
                Register::Pc | Register::Sp => return Err(self.fault(InternalError::BadOperand)),
                _ => {
                    let temp = self.temp(a)?;
                    self.regs[temp] = self.pop()?;
                }
            },
            Opcode::Fetch => {
                let slot = match self.register(a)? {
                    Register::Pc => Slot::Addr(self.pc),
                    Register::Ra => Slot::Addr(self.ra),
                    Register::Fp => Slot::Addr(self.fp),
                    Register::Sp => Slot::Addr(self.stack.len().wrapping_sub(1)),
                    _ => self.regs[self.temp(a)?].clone(),
                };
                self.push(cx, slot)?;
            }
            Opcode::Dup => {
                let base = match self.register(a)? {
                    Register::Sp => self.stack.len().checked_sub(1),
                    Register::Fp if self.fp != NO_FRAME => Some(self.fp),
                    _ => None,
                };
                let slot = base
                    .and_then(|base| base.checked_sub(b as usize))
                    .and_then(|i| self.stack.get(i))
                    .cloned()
                    .ok_or_else(|| self.fault(InternalError::StackUnderflow))?;
                self.push(cx, slot)?;
            }
            Opcode::Pop => {
                let len = self
                    .stack
                    .len()
                    .checked_sub(a as usize)
                    .ok_or_else(|| self.fault(InternalError::StackUnderflow))?;
                self.stack.truncate(len);
            }

            Opcode::Primitive => {
                let v = self.decode_primitive(cx, a)?;
                self.push(cx, Slot::Value(v))?;
            }
            Opcode::PrimitiveReference => {
                let Slot::Value(v) = self.pop()? else {
                    return Err(self.wrong("primitive"));
                };
                self.push(cx, Slot::Ref(ConstReference::new(v)))?;
            }
            Opcode::PushConstant => {
                let slot = match program.constants().get_other(a) {
                    Some(OtherConst::Block(block)) => Slot::Block(Some(block.clone())),
                    Some(OtherConst::Layout(layout)) => Slot::Layout(layout.clone()),
                    Some(OtherConst::Component(def)) => Slot::Definition(def.clone()),
                    _ => return Err(self.fault(InternalError::BadConstant)),
                };
                self.push(cx, slot)?;
            }
            Opcode::PushSerializable => {
                let v = program
                    .constants()
                    .get_serializable(a)
                    .cloned()
                    .ok_or_else(|| self.fault(InternalError::BadConstant))?;
                self.push(cx, Slot::Ref(ConstReference::new(v)))?;
            }
            Opcode::GetVariable => {
                let r = match self.scope()?.get(a) {
                    Binding::Ref(r) => r,
                    Binding::Empty => ConstReference::new(Value::Undefined),
                    Binding::Block(_) => return Err(self.wrong("reference binding")),
                };
                self.push(cx, Slot::Ref(r))?;
            }
            Opcode::SetVariable => {
                let r = self.pop_ref()?;
                self.scope()?.bind(a, Binding::Ref(r));
            }
            Opcode::SetBlock => {
                let block = self.pop_block()?;
                self.scope()?.bind(a, Binding::Block(block));
            }
            Opcode::GetBlock => {
                let block = match self.scope()?.get(a) {
                    Binding::Block(b) => b,
                    _ => None,
                };
                self.push(cx, Slot::Block(block))?;
            }
            Opcode::HasBlock | Opcode::HasBlockParams => {
                let block = match self.scope()?.get(a) {
                    Binding::Block(b) => b,
                    _ => None,
                };
                let has = match op {
                    Opcode::HasBlock => block.is_some(),
                    _ => block.is_some_and(|b| !b.parameters.is_empty()),
                };
                self.push(cx, Slot::Ref(ConstReference::new(Value::Bool(has))))?;
            }
            Opcode::GetProperty => {
                let key = self.string(cx, a)?;
                let r = self.pop_ref()?;
                self.push(cx, Slot::Ref(r.property(&key)))?;
            }
            Opcode::ResolveMaybeLocal => {
                let name = self.string(cx, a)?;
                let r = match self.dynamic_scope()?.get(&name) {
                    Some(r) => r,
                    None => match self.scope()?.get(0) {
                        Binding::Ref(this) => this.property(&name),
                        _ => ConstReference::new(Value::Undefined),
                    },
                };
                self.push(cx, Slot::Ref(r))?;
            }
            Opcode::Concat => {
                let mut parts = Vec::with_capacity(a as usize);
                for _ in 0..a {
                    parts.push(self.pop_ref()?);
                }
                parts.reverse();
                self.push(cx, Slot::Ref(ConcatReference::new(parts)))?;
            }
            Opcode::Helper => {
                let Some(OtherConst::Helper { name, helper }) = program.constants().get_other(a)
                else {
                    return Err(self.fault(InternalError::BadConstant));
                };
                let args = self.pop_args()?;
                let r = HelperReference::new(name, helper.clone(), args.args.clone());
                self.push(cx, Slot::Ref(r))?;
            }
            Opcode::ToBoolean => {
                let r = self.pop_ref()?;
                self.push(cx, Slot::Ref(ConditionalReference::new(r)))?;
            }
            Opcode::PushArgs => {
                let names = self.strings(cx, a)?;
                let mut named = Vec::with_capacity(names.len());
                for name in names.iter().rev() {
                    named.push((name.clone(), self.pop_ref()?));
                }
                named.reverse();
                let mut positional = Vec::with_capacity(b as usize);
                for _ in 0..b {
                    positional.push(self.pop_ref()?);
                }
                positional.reverse();
                let inverse = self.pop_block()?;
                let default = self.pop_block()?;
                let slot = ArgsSlot {
                    args: CapturedArgs { positional, named },
                    blocks: [default, inverse],
                };
                self.push(cx, Slot::Args(Rc::new(slot)))?;
            }
            Opcode::IsComponent => {
                let r = self.pop_ref()?;
                self.push(cx, Slot::Ref(IsComponentReference::new(r)))?;
            }

            Opcode::RootScope => {
                let caller = if b != 0 {
                    Some(self.scope()?.clone())
                } else {
                    None
                };
                self.scopes.push(Scope::root(a, caller));
            }
            Opcode::ChildScope => {
                let child = self.scope()?.child();
                self.scopes.push(child);
            }
            Opcode::PopScope => {
                if self.scopes.len() <= 1 {
                    return Err(self.fault(InternalError::NoScope));
                }
                self.scopes.pop();
            }
            Opcode::PushDynamicScope => {
                let child = self.dynamic_scope()?.child();
                self.dynamic_scopes.push(child);
            }
            Opcode::PopDynamicScope => {
                if self.dynamic_scopes.len() <= 1 {
                    return Err(self.fault(InternalError::NoScope));
                }
                self.dynamic_scopes.pop();
            }
            Opcode::BindDynamicScope => {
                let names = self.strings(cx, a)?;
                let mut refs = Vec::with_capacity(names.len());
                for _ in 0..names.len() {
                    refs.push(self.pop_ref()?);
                }
                refs.reverse();
                let scope = self.dynamic_scope()?;
                for (name, r) in names.iter().zip(refs) {
                    scope.set(name, r);
                }
            }
            Opcode::Debugger => {
                let names = self.strings(cx, a)?;
                let symbols = program
                    .constants()
                    .get_array(b)
                    .ok_or_else(|| self.fault(InternalError::BadConstant))?;
                let refs = self.scope()?.refs(symbols);
                let mut locals = Vec::new();
                for (name, r) in names.iter().zip(refs) {
                    if let Some(r) = r {
                        locals.push((name.clone(), r.value()?));
                    }
                }
                cx.env.debugger(&locals);
            }

            Opcode::Text | Opcode::Comment => {
                let text = self.string(cx, a)?;
                let tree = cx.env.tree();
                if op == Opcode::Text {
                    self.elements.append_text(&mut cx.state.regions, tree, &text);
                } else {
                    self.elements
                        .append_comment(&mut cx.state.regions, tree, &text);
                }
            }
            Opcode::AppendContent => {
                let r = self.pop_ref()?;
                let value = r.value()?;
                let content = value.to_content();
                let tree = cx.env.tree();
                let node = if a != 0 {
                    self.elements
                        .append_trusted(&mut cx.state.regions, tree, &content)
                } else {
                    self.elements.append_text(&mut cx.state.regions, tree, &content)
                };
                let tag = r.tag();
                if !tag.is_const() {
                    let snapshot = tag.value();
                    self.push_op(
                        cx,
                        OpKind::Text {
                            node,
                            reference: r,
                            last: value,
                            snapshot,
                        },
                    );
                }
            }
            Opcode::OpenElement => {
                let tag = self.string(cx, a)?;
                self.elements.open_element(cx.env.tree(), &tag);
            }
            Opcode::OpenDynamicElement => {
                let tag = match self.pop()? {
                    Slot::Value(v) => v,
                    Slot::Ref(r) => r.value()?,
                    _ => return Err(self.wrong("tag name")),
                };
                self.elements.open_element(cx.env.tree(), &tag.to_content());
            }
            Opcode::FlushElement => {
                self.elements
                    .flush_element(&mut cx.state.regions, cx.env.tree())
                    .ok_or_else(|| self.fault(InternalError::NoElement))?;
            }
            Opcode::CloseElement => {
                self.elements
                    .close_element(&mut cx.state.regions)
                    .ok_or_else(|| self.fault(InternalError::UnbalancedElements))?;
            }
            Opcode::StaticAttr => {
                let name = self.string(cx, a)?;
                let value = self.string(cx, b)?;
                let element = self
                    .elements
                    .constructing()
                    .ok_or_else(|| self.fault(InternalError::NoElement))?;
                cx.env.tree().set_attribute(element, &name, Some(&value));
            }
            Opcode::DynamicAttr => {
                let name = self.string(cx, a)?;
                let r = self.pop_ref()?;
                let element = self
                    .elements
                    .constructing()
                    .ok_or_else(|| self.fault(InternalError::NoElement))?;
                let attr = r.value()?.to_attribute();
                if let Some(text) = &attr {
                    cx.env.tree().set_attribute(element, &name, Some(text));
                }
                let tag = r.tag();
                if !tag.is_const() {
                    let snapshot = tag.value();
                    self.push_op(
                        cx,
                        OpKind::Attr {
                            element,
                            name,
                            reference: r,
                            last: attr,
                            snapshot,
                        },
                    );
                }
            }
            Opcode::Modifier => {
                let name = self.string(cx, a)?;
                let args = self.pop_args()?;
                let element = self
                    .elements
                    .constructing()
                    .ok_or_else(|| self.fault(InternalError::NoElement))?;
                let evaluated = args.args.evaluate()?;
                cx.env.tree().add_modifier(element, &name, &evaluated);
                if let Some(block) = self.elements.block() {
                    cx.state.regions.register(
                        block,
                        Destroyable::Modifier {
                            element,
                            name: name.clone(),
                        },
                    );
                }
                let tag = args.args.tag();
                if !tag.is_const() {
                    let snapshot = tag.value();
                    self.push_op(
                        cx,
                        OpKind::Modifier {
                            element,
                            name,
                            args: args.args.clone(),
                            last: evaluated,
                            snapshot,
                        },
                    );
                }
            }

            Opcode::PutIterator => {
                let iterable = self.pop_ref()?;
                let key = match self.pop_ref()?.value()? {
                    Value::Str(s) => s,
                    _ => Rc::from(DEFAULT_KEY),
                };
                let items = iterate::items(&iterable.value()?, &key);
                let presence = IterablePresenceReference::new(iterable.clone());
                let iter = ListIter {
                    items: items.into_iter(),
                    iterable,
                    key,
                };
                self.push(cx, Slot::Iterator(Rc::new(RefCell::new(iter))))?;
                self.push(cx, Slot::Ref(presence))?;
            }
            Opcode::EnterList => {
                let Some(Slot::Iterator(iter)) = self.stack.last() else {
                    return Err(self.wrong("iterator"));
                };
                let (iterable, key) = {
                    let iter = iter.borrow();
                    (iter.iterable.clone(), iter.key.clone())
                };
                let body = self.target(a)?;
                let region = self.elements.push_block(&mut cx.state.regions);
                let state = Rc::new(ResumeState {
                    pc: body,
                    scope: self.scope()?.clone(),
                    dynamic_scope: self.dynamic_scope()?.clone(),
                    stack: Vec::new(),
                    groups: self.groups.clone(),
                });
                let snapshot = iterable.tag().value();
                let id = self.push_op(
                    cx,
                    OpKind::List {
                        region,
                        state,
                        iterable,
                        key,
                        snapshot,
                    },
                );
                self.owners.push(Some(id));
            }
            Opcode::Iterate => {
                let Some(Slot::Iterator(iter)) = self.stack.last() else {
                    return Err(self.wrong("iterator"));
                };
                let next = iter.borrow_mut().items.next();
                match next {
                    Some(item) => {
                        self.enter_item(cx, item)?;
                    }
                    None => self.pc = self.target(a)?,
                }
            }
            Opcode::ExitList => {
                self.elements
                    .pop_block(&mut cx.state.regions, cx.env.tree(), false)
                    .ok_or_else(|| self.fault(InternalError::NoBlock))?;
                self.owners
                    .pop()
                    .ok_or_else(|| self.fault(InternalError::NoBlock))?;
            }

            Opcode::PushComponentDefinition => {
                let Some(OtherConst::Component(def)) = program.constants().get_other(a) else {
                    return Err(self.fault(InternalError::BadConstant));
                };
                self.push(cx, Slot::Definition(def.clone()))?;
            }
            Opcode::PushDynamicComponentDefinition => {
                let r = self.pop_ref()?;
                let value = r.value()?;
                let tag = r.tag();
                if !tag.is_const() {
                    let snapshot = tag.value();
                    self.push_op(
                        cx,
                        OpKind::Assert {
                            reference: r,
                            last: value.clone(),
                            snapshot,
                        },
                    );
                }
                let def = match value {
                    Value::Component(def) => def,
                    Value::Str(name) => cx.env.resolve_component(&name).ok_or_else(|| {
                        ExprError::new(alloc::format!("no component named '{name}'"))
                    })?,
                    other => {
                        return Err(ExprError::new(alloc::format!(
                            "expected a component, found {}",
                            other.type_name()
                        ))
                        .into());
                    }
                };
                self.push(cx, Slot::Definition(def))?;
            }
            Opcode::PrepareArgs => {
                let def = self.definition_in(a)?;
                if def.capabilities().prepare_args {
                    let args = self.pop_args()?;
                    let slot = match def.manager().prepare_args(&def, &args.args)? {
                        Some(prepared) => Rc::new(ArgsSlot {
                            args: prepared,
                            blocks: args.blocks.clone(),
                        }),
                        None => args,
                    };
                    self.push(cx, Slot::Args(slot))?;
                }
            }
            Opcode::CreateComponent => {
                let def = self.definition_in(b)?;
                let args = if def.capabilities().create_args {
                    match self.stack.last() {
                        Some(Slot::Args(args)) => Some(args.args.clone()),
                        _ => return Err(self.wrong("arguments")),
                    }
                } else {
                    None
                };
                let instance = def.manager().create(
                    &def,
                    args.as_ref(),
                    self.dynamic_scope()?,
                    a != 0,
                )?;
                cx.trace.scope_enter(
                    ScopeKind::Component { name: def.name() },
                    self.frames,
                );
                if let Some(args) = args {
                    let tag = args.tag();
                    if !tag.is_const() {
                        let snapshot = tag.value();
                        self.push_op(
                            cx,
                            OpKind::Component {
                                instance: instance.clone(),
                                args,
                                snapshot,
                            },
                        );
                    }
                }
                let temp = self.temp(b)?;
                self.regs[temp] = Slot::Component(Rc::new(ComponentState {
                    definition: def,
                    instance,
                }));
            }
            Opcode::RegisterComponentDestructor => {
                let component = self.component_in(a)?;
                let block = self
                    .elements
                    .block()
                    .ok_or_else(|| self.fault(InternalError::NoBlock))?;
                cx.state.regions.register(
                    block,
                    Destroyable::Component {
                        definition: component.definition.clone(),
                        instance: component.instance.clone(),
                    },
                );
            }
            Opcode::BeginComponentTransaction => {
                let group = GroupTag::new();
                let guard = self.push_op(
                    cx,
                    OpKind::Guard {
                        group: group.clone(),
                        snapshot: 0,
                        end: None,
                    },
                );
                self.groups.push(group.clone());
                self.transactions.push(Transaction { guard, group });
                self.elements.push_block(&mut cx.state.regions);
            }
            Opcode::CommitComponentTransaction => {
                self.elements
                    .pop_block(&mut cx.state.regions, cx.env.tree(), true)
                    .ok_or_else(|| self.fault(InternalError::NoBlock))?;
                let tx = self
                    .transactions
                    .pop()
                    .ok_or_else(|| self.fault(InternalError::NoBlock))?;
                self.groups.pop();
                let end = self.push_op(cx, OpKind::DidModify { guard: tx.guard });
                if let Some(op) = cx.state.ops.get_mut(tx.guard) {
                    if let OpKind::Guard {
                        snapshot, end: e, ..
                    } = &mut op.kind
                    {
                        *snapshot = crate::tag::Tag::Group(tx.group).value();
                        *e = Some(end);
                    }
                }
            }
            Opcode::GetComponentSelf => {
                let component = self.component_in(a)?;
                self.push(cx, Slot::Ref(component.instance.self_ref()))?;
            }
            Opcode::GetComponentTagName => {
                let component = self.component_in(a)?;
                let tag = component
                    .instance
                    .tag_name()
                    .unwrap_or_else(|| Rc::from("div"));
                self.push(cx, Slot::Value(Value::Str(tag)))?;
            }
            Opcode::GetComponentLayout => {
                let def = self.definition_in(a)?;
                self.push(cx, Slot::Layout(def.layout().clone()))?;
            }
            Opcode::InvokeComponentLayout => {
                let Slot::Layout(layout) = self.pop()? else {
                    return Err(self.wrong("layout"));
                };
                let this = self.pop_ref()?;
                let args = self.pop_args()?;
                let scope = Scope::root(layout.scope_size(), Some(self.scope()?.clone()));
                scope.bind(0, Binding::Ref(this));
                for (name, r) in &args.args.named {
                    if let Some(symbol) = layout.symbol(&alloc::format!("@{name}")) {
                        scope.bind(symbol, Binding::Ref(r.clone()));
                    }
                }
                for (name, block) in ["&default", "&inverse"].iter().zip(&args.blocks) {
                    if let Some(symbol) = layout.symbol(name) {
                        scope.bind(symbol, Binding::Block(block.clone()));
                    }
                }
                self.scopes.push(scope);
                self.push_frame(cx)?;
                self.call(cx, layout.handle)?;
            }
            Opcode::DidCreateElement => {
                let component = self.component_in(a)?;
                let element = self
                    .elements
                    .constructing()
                    .ok_or_else(|| self.fault(InternalError::NoElement))?;
                component.instance.did_create_element(element);
            }
            Opcode::DidRenderLayout => {
                let component = self.component_in(a)?;
                let region = self
                    .elements
                    .block()
                    .ok_or_else(|| self.fault(InternalError::NoBlock))?;
                let bounds = cx
                    .state
                    .regions
                    .bounds(region)
                    .ok_or_else(|| self.fault(InternalError::StaleState))?;
                component.instance.did_render_layout(bounds);
                self.push_op(
                    cx,
                    OpKind::DidUpdateLayout {
                        instance: component.instance.clone(),
                        region,
                    },
                );
                cx.trace.scope_exit(
                    ScopeKind::Component {
                        name: component.definition.name(),
                    },
                    self.frames,
                );
            }
        }
        Ok(())
    }
}

pub(crate) fn fault(pc: usize, error: InternalError) -> RenderError {
    RenderError::Internal { pc, error }
}

/// The render VM: an environment plus execution limits.
pub struct Vm<E> {
    pub(crate) env: E,
    pub(crate) limits: Limits,
}

impl<E: fmt::Debug> fmt::Debug for Vm<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vm")
            .field("env", &self.env)
            .field("limits", &self.limits)
            .finish()
    }
}

impl<E: Environment> Vm<E> {
    /// Creates a VM over `env`.
    #[must_use]
    pub fn new(env: E, limits: Limits) -> Self {
        Self { env, limits }
    }

    /// The environment.
    #[must_use]
    pub fn env(&self) -> &E {
        &self.env
    }

    /// The environment, mutably.
    pub fn env_mut(&mut self) -> &mut E {
        &mut self.env
    }

    /// Consumes the VM, returning its environment.
    pub fn into_env(self) -> E {
        self.env
    }

    /// The limits applied to each pass.
    #[must_use]
    pub fn limits(&self) -> &Limits {
        &self.limits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::String;
    use alloc::vec;

    use crate::compile::{Registry, compile_layout, compile_template};
    use crate::component::{Capabilities, ComponentManager};
    use crate::env::TreeAdapter;
    use crate::reference::RootReference;
    use crate::render::RenderResult;
    use crate::rerender::RerenderOptions;
    use crate::syntax::{Block, Element, Expr, Invocation, Layout, Statement, Template};
    use crate::trace::TraceMask;
    use crate::tree::MemoryTree;

    struct Fixture {
        program: Program,
        vm: Vm<MemoryTree>,
        model: Rc<RootReference>,
    }

    impl Fixture {
        fn new(model: Value, limits: Limits) -> Self {
            Self {
                program: Program::new(),
                vm: Vm::new(MemoryTree::new(), limits),
                model: RootReference::new(model),
            }
        }

        fn render(&mut self, statements: Vec<Statement>) -> Result<RenderResult, RenderError> {
            self.render_with(&Registry::new(), statements)
        }

        fn render_with(
            &mut self,
            registry: &Registry,
            statements: Vec<Statement>,
        ) -> Result<RenderResult, RenderError> {
            let compiled =
                compile_template(&mut self.program, registry, &Template::new(statements)).unwrap();
            let root = RenderRoot::new(self.vm.env().root(), self.model.clone());
            self.vm
                .render(&self.program, &compiled, &root, TraceMask::NONE, None)
        }

        fn rerender(&mut self, result: &mut RenderResult, model: Value) {
            self.model.update(model);
            result
                .rerender(
                    &mut self.vm,
                    &self.program,
                    RerenderOptions::default(),
                    TraceMask::NONE,
                    None,
                )
                .unwrap();
        }

        fn html(&self) -> String {
            self.vm.env().inner_html(self.vm.env().root())
        }
    }

    struct Plain;

    impl ComponentManager for Plain {
        fn create(
            &self,
            _definition: &ComponentDefinition,
            _args: Option<&CapturedArgs>,
            _dynamic_scope: &DynamicScope,
            _has_default_block: bool,
        ) -> Result<Rc<dyn ComponentInstance>, ExprError> {
            Ok(Rc::new(PlainInstance))
        }
    }

    struct PlainInstance;

    impl ComponentInstance for PlainInstance {
        fn self_ref(&self) -> Ref {
            ConstReference::new(Value::Null)
        }
    }

    #[test]
    fn running_out_of_fuel_stops_and_tears_down() {
        let mut f = Fixture::new(
            Value::Null,
            Limits {
                fuel: 3,
                ..Limits::default()
            },
        );
        let statements = (0..10).map(|_| Statement::text("x")).collect();
        let err = f.render(statements).unwrap_err();
        assert_eq!(err, RenderError::Limit(LimitError::FuelExceeded));
        assert_eq!(f.html(), "");
    }

    #[test]
    fn call_depth_limit_covers_replayable_spans() {
        let mut f = Fixture::new(
            Value::object([("ok", Value::Bool(true))]),
            Limits {
                max_call_depth: 0,
                ..Limits::default()
            },
        );
        let err = f
            .render(vec![Statement::if_(
                Expr::path("this.ok"),
                vec![Statement::text("yes")],
            )])
            .unwrap_err();
        assert_eq!(err, RenderError::Limit(LimitError::CallDepthExceeded));
    }

    #[test]
    fn stack_depth_limit_is_enforced() {
        let mut f = Fixture::new(
            Value::object([("title", Value::str("t"))]),
            Limits {
                max_stack_depth: 1,
                ..Limits::default()
            },
        );
        let err = f
            .render(vec![Statement::append(Expr::path("this.title"))])
            .unwrap_err();
        assert_eq!(err, RenderError::Limit(LimitError::StackDepthExceeded));
    }

    #[test]
    fn dynamic_vars_shadow_the_root_scope_inside_their_body() {
        let mut f = Fixture::new(Value::object([]), Limits::default());
        let compiled = compile_template(
            &mut f.program,
            &Registry::new(),
            &Template::new(vec![
                Statement::WithDynamicVars {
                    vars: vec![(Rc::from("theme"), Expr::lit("dark"))],
                    body: Block::new(vec![Statement::append(Expr::path("theme"))]),
                },
                Statement::text("/"),
                Statement::append(Expr::path("theme")),
            ]),
        )
        .unwrap();
        let root = RenderRoot::new(f.vm.env().root(), f.model.clone());
        root.dynamic_scope
            .set("theme", ConstReference::new(Value::str("light")));
        f.vm.render(&f.program, &compiled, &root, TraceMask::NONE, None)
            .unwrap();
        assert_eq!(f.html(), "dark/light");
    }

    #[test]
    fn unresolved_names_fall_back_to_this() {
        let mut f = Fixture::new(Value::object([("theme", Value::str("plain"))]), Limits::default());
        f.render(vec![Statement::append(Expr::path("theme"))])
            .unwrap();
        assert_eq!(f.html(), "plain");
    }

    #[test]
    fn with_binds_truthy_values_and_falls_back_to_else() {
        let mut f = Fixture::new(
            Value::object([("user", Value::object([("name", Value::str("Ann"))]))]),
            Limits::default(),
        );
        let mut result = f
            .render(vec![Statement::With {
                value: Expr::path("this.user"),
                body: Block::with_params(
                    &["u"],
                    vec![Statement::append(Expr::local_path("u", "name"))],
                ),
                otherwise: Some(Block::new(vec![Statement::text("anon")])),
            }])
            .unwrap();
        assert_eq!(f.html(), "Ann");

        f.rerender(&mut result, Value::object([("user", Value::Null)]));
        assert_eq!(f.html(), "anon");

        f.rerender(
            &mut result,
            Value::object([("user", Value::object([("name", Value::str("Bo"))]))]),
        );
        assert_eq!(f.html(), "Bo");
    }

    #[test]
    fn unless_renders_on_falsy_and_leaves_a_placeholder() {
        let mut f = Fixture::new(Value::object([("hidden", Value::Bool(false))]), Limits::default());
        let mut result = f
            .render(vec![Statement::Unless {
                cond: Expr::path("this.hidden"),
                then: Block::new(vec![Statement::text("shown")]),
                otherwise: None,
            }])
            .unwrap();
        assert_eq!(f.html(), "shown");

        f.rerender(&mut result, Value::object([("hidden", Value::Bool(true))]));
        assert_eq!(f.html(), "<!---->");
    }

    #[test]
    fn trusting_append_inserts_markup_unescaped() {
        let mut f = Fixture::new(
            Value::object([("html", Value::str("<b>x</b>"))]),
            Limits::default(),
        );
        f.render(vec![
            Statement::Append {
                value: Expr::path("this.html"),
                trusting: true,
            },
            Statement::append(Expr::path("this.html")),
        ])
        .unwrap();
        assert_eq!(f.html(), "<b>x</b>&lt;b&gt;x&lt;/b&gt;");
    }

    #[test]
    fn concatenated_attributes_update_with_their_parts() {
        let mut f = Fixture::new(Value::object([("id", Value::Int(7))]), Limits::default());
        let mut result = f
            .render(vec![
                Element::new("a")
                    .bind(
                        "href",
                        Expr::Concat(vec![Expr::lit("/u/"), Expr::path("this.id")]),
                    )
                    .build(),
            ])
            .unwrap();
        assert_eq!(f.html(), "<a href=\"/u/7\"></a>");

        f.rerender(&mut result, Value::object([("id", Value::Int(8))]));
        assert_eq!(f.html(), "<a href=\"/u/8\"></a>");
    }

    #[test]
    fn has_block_reports_whether_a_block_was_passed() {
        let mut f = Fixture::new(Value::Null, Limits::default());
        let mut registry = Registry::new();
        let layout = compile_layout(
            &mut f.program,
            &registry,
            &Layout::tagless(vec![Statement::If {
                cond: Expr::HasBlock(Rc::from("default")),
                then: Block::new(vec![Statement::yield_(vec![])]),
                otherwise: Some(Block::new(vec![Statement::text("none")])),
            }]),
        )
        .unwrap();
        registry.register_component(ComponentDefinition::new(
            "Frame",
            Rc::new(Plain),
            Capabilities::default(),
            layout,
        ));
        f.render_with(
            &registry,
            vec![
                Statement::Component(Invocation {
                    name: Rc::from("Frame"),
                    args: Default::default(),
                    default: Some(Block::new(vec![Statement::text("body")])),
                    inverse: None,
                }),
                Statement::text("|"),
                Statement::component("Frame", Default::default()),
            ],
        )
        .unwrap();
        assert_eq!(f.html(), "body|none");
    }

    #[test]
    fn output_lands_before_the_next_sibling() {
        let mut f = Fixture::new(Value::object([("n", Value::Int(1))]), Limits::default());
        let tail = f.vm.env_mut().create_text("tail");
        let parent = f.vm.env().root();
        f.vm.env_mut().insert_before(parent, tail, None);

        let compiled = compile_template(
            &mut f.program,
            &Registry::new(),
            &Template::new(vec![
                Statement::text("n="),
                Statement::append(Expr::path("this.n")),
            ]),
        )
        .unwrap();
        let root = RenderRoot {
            next_sibling: Some(tail),
            ..RenderRoot::new(parent, f.model.clone())
        };
        let mut result = f
            .vm
            .render(&f.program, &compiled, &root, TraceMask::NONE, None)
            .unwrap();
        assert_eq!(f.html(), "n=1tail");

        f.rerender(&mut result, Value::object([("n", Value::Int(2))]));
        assert_eq!(f.html(), "n=2tail");

        result.destroy(&mut f.vm);
        assert_eq!(f.html(), "tail");
    }
}
