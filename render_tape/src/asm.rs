// Copyright 2026 the Render Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bytecode builder ("assembler") for `render_tape`.
//!
//! Every instruction is four `u32` slots `{opcode, operand1, operand2, operand3}`; an
//! instruction's address is its slot offset. Jump-class instructions name a label in the current
//! label scope. The jump is reserved when emitted and patched with the relative offset
//! `label - site` when the scope closes with [`Asm::stop_labels`].
//!
//! Emitters chain (`&mut Self`). Label misuse is recorded and surfaced by the next
//! [`Asm::stop_labels`] or [`Asm::commit`]; nothing is finalized while an error is pending.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::fmt;

use crate::component::{ComponentDefinition, Helper};
use crate::constants::{Constants, Number, OtherConst};
use crate::heap::{CompiledBlock, CompiledLayout, Handle, Heap, HeapError};
use crate::opcode::{
    INSTR_SLOTS, Opcode, PRIMITIVE_PAYLOAD_MAX, PrimitiveTag, Register, encode_primitive,
    immediate,
};
use crate::value::Value;

/// A bytecode builder error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AsmError {
    /// A jump named a label that was never bound in its scope.
    UnresolvedLabel {
        /// The missing label.
        name: Box<str>,
    },
    /// A label was bound twice in one scope.
    DuplicateLabel {
        /// The repeated label.
        name: Box<str>,
    },
    /// A jump or label was emitted with no open label scope.
    NoLabelScope {
        /// The label involved.
        name: Box<str>,
    },
    /// `stop_labels` without `start_labels`, or `commit` with scopes still open.
    UnbalancedLabels,
    /// A patch site no longer holds the jump that reserved it.
    PatchMismatch {
        /// Slot address of the patch site.
        at: usize,
    },
    /// A value that cannot be encoded as a primitive literal.
    InvalidPrimitive {
        /// The offending value's type.
        type_name: &'static str,
    },
    /// Heap allocation failed.
    Heap(HeapError),
}

impl fmt::Display for AsmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnresolvedLabel { name } => write!(f, "unresolved label '{name}'"),
            Self::DuplicateLabel { name } => write!(f, "duplicate label '{name}'"),
            Self::NoLabelScope { name } => write!(f, "label '{name}' used outside a label scope"),
            Self::UnbalancedLabels => write!(f, "unbalanced label scopes"),
            Self::PatchMismatch { at } => write!(f, "patch site {at} does not hold a jump"),
            Self::InvalidPrimitive { type_name } => {
                write!(f, "a {type_name} cannot be encoded as a primitive literal")
            }
            Self::Heap(e) => write!(f, "heap error: {e}"),
        }
    }
}

impl core::error::Error for AsmError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Heap(e) => Some(e),
            _ => None,
        }
    }
}

impl From<HeapError> for AsmError {
    fn from(e: HeapError) -> Self {
        Self::Heap(e)
    }
}

#[derive(Clone, Debug)]
struct Target {
    at: usize,
    opcode: Opcode,
    label: Box<str>,
}

#[derive(Clone, Debug, Default)]
struct LabelScope {
    labels: Vec<(Box<str>, usize)>,
    targets: Vec<Target>,
}

/// Bytecode builder.
///
/// Strings and other operands are interned into the borrowed constant pool as they are emitted.
pub struct Asm<'c> {
    constants: &'c mut Constants,
    buffer: Vec<u32>,
    scopes: Vec<LabelScope>,
    error: Option<AsmError>,
}

impl fmt::Debug for Asm<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Asm")
            .field("buffer", &self.buffer)
            .field("scopes", &self.scopes)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<'c> Asm<'c> {
    /// Creates an empty assembler writing constants into `constants`.
    #[must_use]
    pub fn new(constants: &'c mut Constants) -> Self {
        Self {
            constants,
            buffer: Vec::new(),
            scopes: Vec::new(),
            error: None,
        }
    }

    /// The constant pool this assembler interns into.
    pub fn constants_mut(&mut self) -> &mut Constants {
        self.constants
    }

    /// Slot address of the next instruction.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.buffer.len()
    }

    /// The slots emitted so far (patch sites of open scopes still hold placeholders).
    #[must_use]
    pub fn slots(&self) -> &[u32] {
        &self.buffer
    }

    fn fail(&mut self, e: AsmError) {
        if self.error.is_none() {
            self.error = Some(e);
        }
    }

    /// Opens a label scope.
    pub fn start_labels(&mut self) -> &mut Self {
        self.scopes.push(LabelScope::default());
        self
    }

    /// Closes the innermost label scope and patches every jump recorded in it.
    pub fn stop_labels(&mut self) -> Result<(), AsmError> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        let scope = self.scopes.pop().ok_or(AsmError::UnbalancedLabels)?;
        for t in &scope.targets {
            let address = scope
                .labels
                .iter()
                .find(|(name, _)| *name == t.label)
                .map(|(_, at)| *at)
                .ok_or_else(|| AsmError::UnresolvedLabel {
                    name: t.label.clone(),
                })?;
            if self.buffer.get(t.at).copied() != Some(t.opcode.raw()) {
                return Err(AsmError::PatchMismatch { at: t.at });
            }
            let offset = address as i64 - t.at as i64;
            self.buffer[t.at + 1] = offset as i32 as u32;
        }
        Ok(())
    }

    /// Binds `name` to the address of the next instruction in the current scope.
    pub fn label(&mut self, name: &str) -> &mut Self {
        let at = self.pos();
        match self.scopes.last_mut() {
            None => self.fail(AsmError::NoLabelScope { name: name.into() }),
            Some(scope) if scope.labels.iter().any(|(n, _)| &**n == name) => {
                self.fail(AsmError::DuplicateLabel { name: name.into() });
            }
            Some(scope) => scope.labels.push((name.into(), at)),
        }
        self
    }

    /// Appends a `Return` and copies the buffer into a fresh heap allocation.
    pub fn commit(mut self, heap: &mut Heap) -> Result<Handle, AsmError> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        if !self.scopes.is_empty() {
            return Err(AsmError::UnbalancedLabels);
        }
        self.emit(Opcode::Return, 0, 0, 0);
        let handle = heap.malloc()?;
        heap.extend(&self.buffer)?;
        heap.finish_malloc(handle)?;
        Ok(handle)
    }

    fn emit(&mut self, op: Opcode, a: u32, b: u32, c: u32) -> &mut Self {
        self.buffer.extend_from_slice(&[op.raw(), a, b, c]);
        debug_assert_eq!(self.buffer.len() % INSTR_SLOTS, 0);
        self
    }

    fn emit_jump(&mut self, op: Opcode, label: &str) -> &mut Self {
        let at = self.pos();
        match self.scopes.last_mut() {
            Some(scope) => scope.targets.push(Target {
                at,
                opcode: op,
                label: label.into(),
            }),
            None => self.fail(AsmError::NoLabelScope { name: label.into() }),
        }
        self.emit(op, u32::MAX, 0, 0)
    }

    fn string(&mut self, s: &str) -> u32 {
        self.constants.string(s)
    }

    fn other(&mut self, value: OtherConst) -> u32 {
        self.constants.other(value)
    }

    // --- control flow -----------------------------------------------------------------------

    /// `nop`
    pub fn nop(&mut self) -> &mut Self {
        self.emit(Opcode::Nop, 0, 0, 0)
    }

    /// `return`
    pub fn ret(&mut self) -> &mut Self {
        self.emit(Opcode::Return, 0, 0, 0)
    }

    /// `return_to label`
    pub fn return_to(&mut self, label: &str) -> &mut Self {
        self.emit_jump(Opcode::ReturnTo, label)
    }

    /// `push_frame`
    pub fn push_frame(&mut self) -> &mut Self {
        self.emit(Opcode::PushFrame, 0, 0, 0)
    }

    /// `pop_frame`
    pub fn pop_frame(&mut self) -> &mut Self {
        self.emit(Opcode::PopFrame, 0, 0, 0)
    }

    /// `jump label`
    pub fn jump(&mut self, label: &str) -> &mut Self {
        self.emit_jump(Opcode::Jump, label)
    }

    /// `jump_if label`
    pub fn jump_if(&mut self, label: &str) -> &mut Self {
        self.emit_jump(Opcode::JumpIf, label)
    }

    /// `jump_unless label`
    pub fn jump_unless(&mut self, label: &str) -> &mut Self {
        self.emit_jump(Opcode::JumpUnless, label)
    }

    /// `enter count`
    pub fn enter(&mut self, count: u32) -> &mut Self {
        self.emit(Opcode::Enter, count, 0, 0)
    }

    /// `exit`
    pub fn exit(&mut self) -> &mut Self {
        self.emit(Opcode::Exit, 0, 0, 0)
    }

    /// `invoke_static`
    pub fn invoke_static(&mut self) -> &mut Self {
        self.emit(Opcode::InvokeStatic, 0, 0, 0)
    }

    /// `invoke_yield`
    pub fn invoke_yield(&mut self) -> &mut Self {
        self.emit(Opcode::InvokeYield, 0, 0, 0)
    }

    // --- stack and registers ----------------------------------------------------------------

    /// `load reg`
    pub fn load(&mut self, reg: Register) -> &mut Self {
        self.emit(Opcode::Load, reg as u32, 0, 0)
    }

    /// `fetch reg`
    pub fn fetch(&mut self, reg: Register) -> &mut Self {
        self.emit(Opcode::Fetch, reg as u32, 0, 0)
    }

    /// `dup reg offset`
    pub fn dup(&mut self, reg: Register, offset: u32) -> &mut Self {
        self.emit(Opcode::Dup, reg as u32, offset, 0)
    }

    /// `pop count`
    pub fn pop(&mut self, count: u32) -> &mut Self {
        self.emit(Opcode::Pop, count, 0, 0)
    }

    // --- expressions ------------------------------------------------------------------------

    /// `primitive value`
    ///
    /// Small integers are stored inline; larger numbers and strings go through the constant
    /// pool. Lists, records and component definitions are rejected.
    pub fn primitive(&mut self, value: &Value) -> Result<&mut Self, AsmError> {
        let encoded = match value {
            Value::Bool(false) => encode_primitive(PrimitiveTag::Immediate, immediate::FALSE),
            Value::Bool(true) => encode_primitive(PrimitiveTag::Immediate, immediate::TRUE),
            Value::Null => encode_primitive(PrimitiveTag::Immediate, immediate::NULL),
            Value::Undefined => encode_primitive(PrimitiveTag::Immediate, immediate::UNDEFINED),
            Value::Int(i) if (0..=i64::from(PRIMITIVE_PAYLOAD_MAX)).contains(i) => {
                encode_primitive(PrimitiveTag::Int, *i as u32)
            }
            Value::Int(i) if (-i64::from(PRIMITIVE_PAYLOAD_MAX)..0).contains(i) => {
                encode_primitive(PrimitiveTag::NegativeInt, i.unsigned_abs() as u32)
            }
            Value::Int(i) => self.pooled(PrimitiveTag::Number, Number::Int(*i))?,
            Value::Float(x) => self.pooled(PrimitiveTag::Number, Number::Float(*x))?,
            Value::Str(s) => {
                let id = self.string(s);
                Self::payload(PrimitiveTag::String, id)?
            }
            other => {
                return Err(AsmError::InvalidPrimitive {
                    type_name: other.type_name(),
                });
            }
        };
        Ok(self.emit(Opcode::Primitive, encoded, 0, 0))
    }

    fn pooled(&mut self, tag: PrimitiveTag, n: Number) -> Result<u32, AsmError> {
        let id = self.constants.number(n);
        Self::payload(tag, id)
    }

    fn payload(tag: PrimitiveTag, id: u32) -> Result<u32, AsmError> {
        if id > PRIMITIVE_PAYLOAD_MAX {
            return Err(AsmError::InvalidPrimitive {
                type_name: "constant index",
            });
        }
        Ok(encode_primitive(tag, id))
    }

    /// `primitive_reference`
    pub fn primitive_reference(&mut self) -> &mut Self {
        self.emit(Opcode::PrimitiveReference, 0, 0, 0)
    }

    /// `push_constant` for a compiled block.
    pub fn push_block(&mut self, block: Rc<CompiledBlock>) -> &mut Self {
        let id = self.other(OtherConst::Block(block));
        self.emit(Opcode::PushConstant, id, 0, 0)
    }

    /// `push_constant` for a compiled layout.
    pub fn push_layout(&mut self, layout: Rc<CompiledLayout>) -> &mut Self {
        let id = self.other(OtherConst::Layout(layout));
        self.emit(Opcode::PushConstant, id, 0, 0)
    }

    /// `push_serializable value`
    pub fn push_serializable(&mut self, value: Value) -> &mut Self {
        let id = self.constants.serializable(value);
        self.emit(Opcode::PushSerializable, id, 0, 0)
    }

    /// `get_variable symbol`
    pub fn get_variable(&mut self, symbol: u32) -> &mut Self {
        self.emit(Opcode::GetVariable, symbol, 0, 0)
    }

    /// `set_variable symbol`
    pub fn set_variable(&mut self, symbol: u32) -> &mut Self {
        self.emit(Opcode::SetVariable, symbol, 0, 0)
    }

    /// `set_block symbol`
    pub fn set_block(&mut self, symbol: u32) -> &mut Self {
        self.emit(Opcode::SetBlock, symbol, 0, 0)
    }

    /// `get_block symbol`
    pub fn get_block(&mut self, symbol: u32) -> &mut Self {
        self.emit(Opcode::GetBlock, symbol, 0, 0)
    }

    /// `has_block symbol`
    pub fn has_block(&mut self, symbol: u32) -> &mut Self {
        self.emit(Opcode::HasBlock, symbol, 0, 0)
    }

    /// `has_block_params symbol`
    pub fn has_block_params(&mut self, symbol: u32) -> &mut Self {
        self.emit(Opcode::HasBlockParams, symbol, 0, 0)
    }

    /// `get_property key`
    pub fn get_property(&mut self, key: &str) -> &mut Self {
        let key = self.string(key);
        self.emit(Opcode::GetProperty, key, 0, 0)
    }

    /// `resolve_maybe_local name`
    pub fn resolve_maybe_local(&mut self, name: &str) -> &mut Self {
        let name = self.string(name);
        self.emit(Opcode::ResolveMaybeLocal, name, 0, 0)
    }

    /// `concat count`
    pub fn concat(&mut self, count: u32) -> &mut Self {
        self.emit(Opcode::Concat, count, 0, 0)
    }

    /// `helper`
    pub fn helper(&mut self, name: &str, helper: Rc<dyn Helper>) -> &mut Self {
        let id = self.other(OtherConst::Helper {
            name: name.into(),
            helper,
        });
        self.emit(Opcode::Helper, id, 0, 0)
    }

    /// `to_boolean`
    pub fn to_boolean(&mut self) -> &mut Self {
        self.emit(Opcode::ToBoolean, 0, 0, 0)
    }

    /// `push_args names positional`
    pub fn push_args<S: AsRef<str>>(&mut self, names: &[S], positional: u32) -> &mut Self {
        let names = self.constants.string_array(names);
        self.emit(Opcode::PushArgs, names, positional, 0)
    }

    /// `is_component`
    pub fn is_component(&mut self) -> &mut Self {
        self.emit(Opcode::IsComponent, 0, 0, 0)
    }

    // --- scopes -----------------------------------------------------------------------------

    /// `root_scope symbols bind_caller`
    pub fn root_scope(&mut self, symbols: u32, bind_caller: bool) -> &mut Self {
        self.emit(Opcode::RootScope, symbols, u32::from(bind_caller), 0)
    }

    /// `child_scope`
    pub fn child_scope(&mut self) -> &mut Self {
        self.emit(Opcode::ChildScope, 0, 0, 0)
    }

    /// `pop_scope`
    pub fn pop_scope(&mut self) -> &mut Self {
        self.emit(Opcode::PopScope, 0, 0, 0)
    }

    /// `push_dynamic_scope`
    pub fn push_dynamic_scope(&mut self) -> &mut Self {
        self.emit(Opcode::PushDynamicScope, 0, 0, 0)
    }

    /// `pop_dynamic_scope`
    pub fn pop_dynamic_scope(&mut self) -> &mut Self {
        self.emit(Opcode::PopDynamicScope, 0, 0, 0)
    }

    /// `bind_dynamic_scope names`
    pub fn bind_dynamic_scope<S: AsRef<str>>(&mut self, names: &[S]) -> &mut Self {
        let names = self.constants.string_array(names);
        self.emit(Opcode::BindDynamicScope, names, 0, 0)
    }

    /// `debugger names symbols`
    pub fn debugger<S: AsRef<str>>(&mut self, names: &[S], symbols: &[u32]) -> &mut Self {
        let names = self.constants.string_array(names);
        let symbols = self.constants.array(symbols);
        self.emit(Opcode::Debugger, names, symbols, 0)
    }

    // --- output -----------------------------------------------------------------------------

    /// `text`
    pub fn text(&mut self, text: &str) -> &mut Self {
        let text = self.string(text);
        self.emit(Opcode::Text, text, 0, 0)
    }

    /// `comment`
    pub fn comment(&mut self, text: &str) -> &mut Self {
        let text = self.string(text);
        self.emit(Opcode::Comment, text, 0, 0)
    }

    /// `append_content trusting`
    pub fn append_content(&mut self, trusting: bool) -> &mut Self {
        self.emit(Opcode::AppendContent, u32::from(trusting), 0, 0)
    }

    /// `open_element tag`
    pub fn open_element(&mut self, tag: &str) -> &mut Self {
        let tag = self.string(tag);
        self.emit(Opcode::OpenElement, tag, 0, 0)
    }

    /// `open_dynamic_element`
    pub fn open_dynamic_element(&mut self) -> &mut Self {
        self.emit(Opcode::OpenDynamicElement, 0, 0, 0)
    }

    /// `flush_element`
    pub fn flush_element(&mut self) -> &mut Self {
        self.emit(Opcode::FlushElement, 0, 0, 0)
    }

    /// `close_element`
    pub fn close_element(&mut self) -> &mut Self {
        self.emit(Opcode::CloseElement, 0, 0, 0)
    }

    /// `static_attr name value`
    pub fn static_attr(&mut self, name: &str, value: &str) -> &mut Self {
        let name = self.string(name);
        let value = self.string(value);
        self.emit(Opcode::StaticAttr, name, value, 0)
    }

    /// `dynamic_attr name trusting`
    pub fn dynamic_attr(&mut self, name: &str, trusting: bool) -> &mut Self {
        let name = self.string(name);
        self.emit(Opcode::DynamicAttr, name, u32::from(trusting), 0)
    }

    /// `modifier name`
    pub fn modifier(&mut self, name: &str) -> &mut Self {
        let name = self.string(name);
        self.emit(Opcode::Modifier, name, 0, 0)
    }

    // --- lists ------------------------------------------------------------------------------

    /// `put_iterator`
    pub fn put_iterator(&mut self) -> &mut Self {
        self.emit(Opcode::PutIterator, 0, 0, 0)
    }

    /// `enter_list body`
    pub fn enter_list(&mut self, body: &str) -> &mut Self {
        self.emit_jump(Opcode::EnterList, body)
    }

    /// `iterate breaks`
    pub fn iterate(&mut self, breaks: &str) -> &mut Self {
        self.emit_jump(Opcode::Iterate, breaks)
    }

    /// `exit_list`
    pub fn exit_list(&mut self) -> &mut Self {
        self.emit(Opcode::ExitList, 0, 0, 0)
    }

    // --- components -------------------------------------------------------------------------

    /// `push_component_definition`
    pub fn push_component_definition(&mut self, def: Rc<ComponentDefinition>) -> &mut Self {
        let id = self.other(OtherConst::Component(def));
        self.emit(Opcode::PushComponentDefinition, id, 0, 0)
    }

    /// `push_dynamic_component_definition`
    pub fn push_dynamic_component_definition(&mut self) -> &mut Self {
        self.emit(Opcode::PushDynamicComponentDefinition, 0, 0, 0)
    }

    /// `prepare_args state`
    pub fn prepare_args(&mut self, state: Register) -> &mut Self {
        self.emit(Opcode::PrepareArgs, state as u32, 0, 0)
    }

    /// `create_component has_default state`
    pub fn create_component(&mut self, has_default: bool, state: Register) -> &mut Self {
        self.emit(
            Opcode::CreateComponent,
            u32::from(has_default),
            state as u32,
            0,
        )
    }

    /// `register_component_destructor state`
    pub fn register_component_destructor(&mut self, state: Register) -> &mut Self {
        self.emit(Opcode::RegisterComponentDestructor, state as u32, 0, 0)
    }

    /// `begin_component_transaction`
    pub fn begin_component_transaction(&mut self) -> &mut Self {
        self.emit(Opcode::BeginComponentTransaction, 0, 0, 0)
    }

    /// `commit_component_transaction`
    pub fn commit_component_transaction(&mut self) -> &mut Self {
        self.emit(Opcode::CommitComponentTransaction, 0, 0, 0)
    }

    /// `get_component_self state`
    pub fn get_component_self(&mut self, state: Register) -> &mut Self {
        self.emit(Opcode::GetComponentSelf, state as u32, 0, 0)
    }

    /// `get_component_tag_name state`
    pub fn get_component_tag_name(&mut self, state: Register) -> &mut Self {
        self.emit(Opcode::GetComponentTagName, state as u32, 0, 0)
    }

    /// `get_component_layout state`
    pub fn get_component_layout(&mut self, state: Register) -> &mut Self {
        self.emit(Opcode::GetComponentLayout, state as u32, 0, 0)
    }

    /// `invoke_component_layout`
    pub fn invoke_component_layout(&mut self) -> &mut Self {
        self.emit(Opcode::InvokeComponentLayout, 0, 0, 0)
    }

    /// `did_create_element state`
    pub fn did_create_element(&mut self, state: Register) -> &mut Self {
        self.emit(Opcode::DidCreateElement, state as u32, 0, 0)
    }

    /// `did_render_layout state`
    pub fn did_render_layout(&mut self, state: Register) -> &mut Self {
        self.emit(Opcode::DidRenderLayout, state as u32, 0, 0)
    }
}
