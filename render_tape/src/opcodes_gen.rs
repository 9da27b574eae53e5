// Copyright 2026 the Render Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// @generated by render_tape_codegen. Do not edit by hand.

/// Operand kinds used by the opcode table.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OperandKind {
    /// A relative instruction offset patched from a label.
    Offset,
    /// An immediate unsigned integer.
    Imm,
    /// An immediate boolean (`0` or `1`).
    Flag,
    /// A register identifier.
    Register,
    /// A scope symbol slot.
    Symbol,
    /// An encoded primitive literal.
    Primitive,
    /// A string constant index.
    ConstString,
    /// An array constant index.
    ConstArray,
    /// An opaque constant index.
    ConstOther,
    /// A serializable constant index.
    ConstSerializable,
}

/// Operand roles used by the opcode table.
///
/// Roles are a best-effort description for disassembly/tooling.
#[allow(missing_docs, reason = "generated")]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OperandRole {
    Target,
    Count,
    Reg,
    Offset,
    Value,
    Symbol,
    Key,
    Name,
    Helper,
    Names,
    Positional,
    Symbols,
    BindCaller,
    Text,
    Trusting,
    Tag,
    Body,
    Breaks,
    Definition,
    State,
    HasDefault,
}

/// Operand schema metadata (kind/role).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OperandSchema {
    /// Operand kind (semantic type).
    pub kind: OperandKind,
    /// Operand role (how this operand is used).
    pub role: OperandRole,
}

impl OperandSchema {
    const fn new(kind: OperandKind, role: OperandRole) -> Self {
        Self { kind, role }
    }
}

/// Per-opcode metadata used by the assembler, VM and disassembler.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OpcodeInfo {
    /// Stable, parseable opcode name.
    pub mnemonic: &'static str,
    /// Whether control never falls through to the next instruction.
    pub is_terminator: bool,
    /// Optional per-opcode traits.
    pub flags: OpcodeFlags,
    /// Operand schemas, in slot order.
    pub operands: &'static [OperandSchema],
}

/// Optional per-opcode traits.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(transparent)]
pub struct OpcodeFlags(u8);

impl OpcodeFlags {
    /// No flags set.
    pub const NONE: Self = Self(0);
    /// The first operand is a label-relative offset.
    pub const JUMP: Self = Self(1 << 0);

    /// Returns `true` if `other` is a subset of `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

/// Metadata indexed by opcode byte.
pub const OPCODE_INFO_BY_BYTE: &[OpcodeInfo] = &[
    // 0x00 Nop
    OpcodeInfo { mnemonic: "nop", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[] },
    // 0x01 Return
    OpcodeInfo { mnemonic: "return", is_terminator: true, flags: OpcodeFlags::NONE, operands: &[] },
    // 0x02 ReturnTo
    OpcodeInfo { mnemonic: "return_to", is_terminator: false, flags: OpcodeFlags::JUMP, operands: &[OperandSchema::new(OperandKind::Offset, OperandRole::Target)] },
    // 0x03 PushFrame
    OpcodeInfo { mnemonic: "push_frame", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[] },
    // 0x04 PopFrame
    OpcodeInfo { mnemonic: "pop_frame", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[] },
    // 0x05 Jump
    OpcodeInfo { mnemonic: "jump", is_terminator: true, flags: OpcodeFlags::JUMP, operands: &[OperandSchema::new(OperandKind::Offset, OperandRole::Target)] },
    // 0x06 JumpIf
    OpcodeInfo { mnemonic: "jump_if", is_terminator: false, flags: OpcodeFlags::JUMP, operands: &[OperandSchema::new(OperandKind::Offset, OperandRole::Target)] },
    // 0x07 JumpUnless
    OpcodeInfo { mnemonic: "jump_unless", is_terminator: false, flags: OpcodeFlags::JUMP, operands: &[OperandSchema::new(OperandKind::Offset, OperandRole::Target)] },
    // 0x08 Enter
    OpcodeInfo { mnemonic: "enter", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[OperandSchema::new(OperandKind::Imm, OperandRole::Count)] },
    // 0x09 Exit
    OpcodeInfo { mnemonic: "exit", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[] },
    // 0x0A InvokeStatic
    OpcodeInfo { mnemonic: "invoke_static", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[] },
    // 0x0B InvokeYield
    OpcodeInfo { mnemonic: "invoke_yield", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[] },
    // 0x0C Load
    OpcodeInfo { mnemonic: "load", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[OperandSchema::new(OperandKind::Register, OperandRole::Reg)] },
    // 0x0D Fetch
    OpcodeInfo { mnemonic: "fetch", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[OperandSchema::new(OperandKind::Register, OperandRole::Reg)] },
    // 0x0E Dup
    OpcodeInfo { mnemonic: "dup", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[OperandSchema::new(OperandKind::Register, OperandRole::Reg), OperandSchema::new(OperandKind::Imm, OperandRole::Offset)] },
    // 0x0F Pop
    OpcodeInfo { mnemonic: "pop", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[OperandSchema::new(OperandKind::Imm, OperandRole::Count)] },
    // 0x10 Primitive
    OpcodeInfo { mnemonic: "primitive", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[OperandSchema::new(OperandKind::Primitive, OperandRole::Value)] },
    // 0x11 PrimitiveReference
    OpcodeInfo { mnemonic: "primitive_reference", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[] },
    // 0x12 PushConstant
    OpcodeInfo { mnemonic: "push_constant", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[OperandSchema::new(OperandKind::ConstOther, OperandRole::Value)] },
    // 0x13 GetVariable
    OpcodeInfo { mnemonic: "get_variable", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[OperandSchema::new(OperandKind::Symbol, OperandRole::Symbol)] },
    // 0x14 SetVariable
    OpcodeInfo { mnemonic: "set_variable", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[OperandSchema::new(OperandKind::Symbol, OperandRole::Symbol)] },
    // 0x15 SetBlock
    OpcodeInfo { mnemonic: "set_block", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[OperandSchema::new(OperandKind::Symbol, OperandRole::Symbol)] },
    // 0x16 GetBlock
    OpcodeInfo { mnemonic: "get_block", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[OperandSchema::new(OperandKind::Symbol, OperandRole::Symbol)] },
    // 0x17 HasBlock
    OpcodeInfo { mnemonic: "has_block", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[OperandSchema::new(OperandKind::Symbol, OperandRole::Symbol)] },
    // 0x18 HasBlockParams
    OpcodeInfo { mnemonic: "has_block_params", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[OperandSchema::new(OperandKind::Symbol, OperandRole::Symbol)] },
    // 0x19 GetProperty
    OpcodeInfo { mnemonic: "get_property", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[OperandSchema::new(OperandKind::ConstString, OperandRole::Key)] },
    // 0x1A ResolveMaybeLocal
    OpcodeInfo { mnemonic: "resolve_maybe_local", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[OperandSchema::new(OperandKind::ConstString, OperandRole::Name)] },
    // 0x1B Concat
    OpcodeInfo { mnemonic: "concat", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[OperandSchema::new(OperandKind::Imm, OperandRole::Count)] },
    // 0x1C Helper
    OpcodeInfo { mnemonic: "helper", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[OperandSchema::new(OperandKind::ConstOther, OperandRole::Helper)] },
    // 0x1D ToBoolean
    OpcodeInfo { mnemonic: "to_boolean", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[] },
    // 0x1E PushArgs
    OpcodeInfo { mnemonic: "push_args", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[OperandSchema::new(OperandKind::ConstArray, OperandRole::Names), OperandSchema::new(OperandKind::Imm, OperandRole::Positional)] },
    // 0x1F IsComponent
    OpcodeInfo { mnemonic: "is_component", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[] },
    // 0x20 RootScope
    OpcodeInfo { mnemonic: "root_scope", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[OperandSchema::new(OperandKind::Imm, OperandRole::Symbols), OperandSchema::new(OperandKind::Flag, OperandRole::BindCaller)] },
    // 0x21 ChildScope
    OpcodeInfo { mnemonic: "child_scope", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[] },
    // 0x22 PopScope
    OpcodeInfo { mnemonic: "pop_scope", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[] },
    // 0x23 PushDynamicScope
    OpcodeInfo { mnemonic: "push_dynamic_scope", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[] },
    // 0x24 PopDynamicScope
    OpcodeInfo { mnemonic: "pop_dynamic_scope", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[] },
    // 0x25 BindDynamicScope
    OpcodeInfo { mnemonic: "bind_dynamic_scope", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[OperandSchema::new(OperandKind::ConstArray, OperandRole::Names)] },
    // 0x26 Debugger
    OpcodeInfo { mnemonic: "debugger", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[OperandSchema::new(OperandKind::ConstArray, OperandRole::Names), OperandSchema::new(OperandKind::ConstArray, OperandRole::Symbols)] },
    // 0x27 PushSerializable
    OpcodeInfo { mnemonic: "push_serializable", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[OperandSchema::new(OperandKind::ConstSerializable, OperandRole::Value)] },
    // 0x28
    OpcodeInfo { mnemonic: "<invalid>", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[] },
    // 0x29
    OpcodeInfo { mnemonic: "<invalid>", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[] },
    // 0x2A
    OpcodeInfo { mnemonic: "<invalid>", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[] },
    // 0x2B
    OpcodeInfo { mnemonic: "<invalid>", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[] },
    // 0x2C
    OpcodeInfo { mnemonic: "<invalid>", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[] },
    // 0x2D
    OpcodeInfo { mnemonic: "<invalid>", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[] },
    // 0x2E
    OpcodeInfo { mnemonic: "<invalid>", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[] },
    // 0x2F
    OpcodeInfo { mnemonic: "<invalid>", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[] },
    // 0x30 Text
    OpcodeInfo { mnemonic: "text", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[OperandSchema::new(OperandKind::ConstString, OperandRole::Text)] },
    // 0x31 Comment
    OpcodeInfo { mnemonic: "comment", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[OperandSchema::new(OperandKind::ConstString, OperandRole::Text)] },
    // 0x32 AppendContent
    OpcodeInfo { mnemonic: "append_content", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[OperandSchema::new(OperandKind::Flag, OperandRole::Trusting)] },
    // 0x33 OpenElement
    OpcodeInfo { mnemonic: "open_element", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[OperandSchema::new(OperandKind::ConstString, OperandRole::Tag)] },
    // 0x34 OpenDynamicElement
    OpcodeInfo { mnemonic: "open_dynamic_element", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[] },
    // 0x35 FlushElement
    OpcodeInfo { mnemonic: "flush_element", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[] },
    // 0x36 CloseElement
    OpcodeInfo { mnemonic: "close_element", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[] },
    // 0x37 StaticAttr
    OpcodeInfo { mnemonic: "static_attr", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[OperandSchema::new(OperandKind::ConstString, OperandRole::Name), OperandSchema::new(OperandKind::ConstString, OperandRole::Value)] },
    // 0x38 DynamicAttr
    OpcodeInfo { mnemonic: "dynamic_attr", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[OperandSchema::new(OperandKind::ConstString, OperandRole::Name), OperandSchema::new(OperandKind::Flag, OperandRole::Trusting)] },
    // 0x39 Modifier
    OpcodeInfo { mnemonic: "modifier", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[OperandSchema::new(OperandKind::ConstString, OperandRole::Name)] },
    // 0x3A
    OpcodeInfo { mnemonic: "<invalid>", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[] },
    // 0x3B
    OpcodeInfo { mnemonic: "<invalid>", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[] },
    // 0x3C
    OpcodeInfo { mnemonic: "<invalid>", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[] },
    // 0x3D
    OpcodeInfo { mnemonic: "<invalid>", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[] },
    // 0x3E
    OpcodeInfo { mnemonic: "<invalid>", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[] },
    // 0x3F
    OpcodeInfo { mnemonic: "<invalid>", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[] },
    // 0x40 PutIterator
    OpcodeInfo { mnemonic: "put_iterator", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[] },
    // 0x41 EnterList
    OpcodeInfo { mnemonic: "enter_list", is_terminator: false, flags: OpcodeFlags::JUMP, operands: &[OperandSchema::new(OperandKind::Offset, OperandRole::Body)] },
    // 0x42 Iterate
    OpcodeInfo { mnemonic: "iterate", is_terminator: false, flags: OpcodeFlags::JUMP, operands: &[OperandSchema::new(OperandKind::Offset, OperandRole::Breaks)] },
    // 0x43 ExitList
    OpcodeInfo { mnemonic: "exit_list", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[] },
    // 0x44
    OpcodeInfo { mnemonic: "<invalid>", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[] },
    // 0x45
    OpcodeInfo { mnemonic: "<invalid>", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[] },
    // 0x46
    OpcodeInfo { mnemonic: "<invalid>", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[] },
    // 0x47
    OpcodeInfo { mnemonic: "<invalid>", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[] },
    // 0x48
    OpcodeInfo { mnemonic: "<invalid>", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[] },
    // 0x49
    OpcodeInfo { mnemonic: "<invalid>", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[] },
    // 0x4A
    OpcodeInfo { mnemonic: "<invalid>", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[] },
    // 0x4B
    OpcodeInfo { mnemonic: "<invalid>", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[] },
    // 0x4C
    OpcodeInfo { mnemonic: "<invalid>", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[] },
    // 0x4D
    OpcodeInfo { mnemonic: "<invalid>", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[] },
    // 0x4E
    OpcodeInfo { mnemonic: "<invalid>", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[] },
    // 0x4F
    OpcodeInfo { mnemonic: "<invalid>", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[] },
    // 0x50 PushComponentDefinition
    OpcodeInfo { mnemonic: "push_component_definition", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[OperandSchema::new(OperandKind::ConstOther, OperandRole::Definition)] },
    // 0x51 PushDynamicComponentDefinition
    OpcodeInfo { mnemonic: "push_dynamic_component_definition", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[] },
    // 0x52 PrepareArgs
    OpcodeInfo { mnemonic: "prepare_args", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[OperandSchema::new(OperandKind::Register, OperandRole::State)] },
    // 0x53 CreateComponent
    OpcodeInfo { mnemonic: "create_component", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[OperandSchema::new(OperandKind::Flag, OperandRole::HasDefault), OperandSchema::new(OperandKind::Register, OperandRole::State)] },
    // 0x54 RegisterComponentDestructor
    OpcodeInfo { mnemonic: "register_component_destructor", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[OperandSchema::new(OperandKind::Register, OperandRole::State)] },
    // 0x55 BeginComponentTransaction
    OpcodeInfo { mnemonic: "begin_component_transaction", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[] },
    // 0x56 CommitComponentTransaction
    OpcodeInfo { mnemonic: "commit_component_transaction", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[] },
    // 0x57 GetComponentSelf
    OpcodeInfo { mnemonic: "get_component_self", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[OperandSchema::new(OperandKind::Register, OperandRole::State)] },
    // 0x58 GetComponentTagName
    OpcodeInfo { mnemonic: "get_component_tag_name", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[OperandSchema::new(OperandKind::Register, OperandRole::State)] },
    // 0x59 GetComponentLayout
    OpcodeInfo { mnemonic: "get_component_layout", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[OperandSchema::new(OperandKind::Register, OperandRole::State)] },
    // 0x5A InvokeComponentLayout
    OpcodeInfo { mnemonic: "invoke_component_layout", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[] },
    // 0x5B DidCreateElement
    OpcodeInfo { mnemonic: "did_create_element", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[OperandSchema::new(OperandKind::Register, OperandRole::State)] },
    // 0x5C DidRenderLayout
    OpcodeInfo { mnemonic: "did_render_layout", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[OperandSchema::new(OperandKind::Register, OperandRole::State)] },
];

/// Opcode byte for the template instruction set.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    /// Does nothing.
    Nop = 0x00,
    /// Jumps to the address held in `ra`.
    Return = 0x01,
    /// Sets `ra` to a label address.
    ReturnTo = 0x02,
    /// Saves `ra` and `fp` on the stack and points `fp` at the saved `ra`.
    PushFrame = 0x03,
    /// Restores `ra` and `fp` and truncates the stack to the frame base.
    PopFrame = 0x04,
    /// Unconditional relative jump.
    Jump = 0x05,
    /// Pops a reference and jumps if its value is truthy; records an assertion when the reference can change.
    JumpIf = 0x06,
    /// Pops a reference and jumps if its value is falsy; records an assertion when the reference can change.
    JumpUnless = 0x07,
    /// Opens a re-executable span capturing the top `count` stack slots.
    Enter = 0x08,
    /// Closes the innermost re-executable span.
    Exit = 0x09,
    /// Pops a block or layout and calls its handle.
    InvokeStatic = 0x0A,
    /// Pops a yieldable block and its arguments, binds block parameters in a caller scope and calls it.
    InvokeYield = 0x0B,
    /// Pops the stack into a register.
    Load = 0x0C,
    /// Pushes the contents of a register.
    Fetch = 0x0D,
    /// Pushes a copy of the slot `offset` below the position held in a register.
    Dup = 0x0E,
    /// Discards `count` stack slots.
    Pop = 0x0F,
    /// Pushes an encoded primitive value.
    Primitive = 0x10,
    /// Wraps the primitive on top of the stack in a constant reference.
    PrimitiveReference = 0x11,
    /// Pushes a block, layout or definition constant.
    PushConstant = 0x12,
    /// Pushes the reference bound to a scope symbol.
    GetVariable = 0x13,
    /// Pops a reference into a scope symbol.
    SetVariable = 0x14,
    /// Pops a block into a scope symbol.
    SetBlock = 0x15,
    /// Pushes the block bound to a scope symbol.
    GetBlock = 0x16,
    /// Pushes a constant reference telling whether a block symbol is bound.
    HasBlock = 0x17,
    /// Pushes a constant reference telling whether a bound block takes parameters.
    HasBlockParams = 0x18,
    /// Replaces the reference on top of the stack with its child reference for `key`.
    GetProperty = 0x19,
    /// Pushes a dynamic-scope binding for `name`, or the matching property of `self`.
    ResolveMaybeLocal = 0x1A,
    /// Pops `count` references and pushes their string concatenation.
    Concat = 0x1B,
    /// Pops captured arguments and pushes a helper reference over them.
    Helper = 0x1C,
    /// Replaces the reference on top of the stack with its truthiness.
    ToBoolean = 0x1D,
    /// Captures positional and named references and two yieldable blocks into an argument set.
    PushArgs = 0x1E,
    /// Replaces the reference on top of the stack with whether it holds a component definition.
    IsComponent = 0x1F,
    /// Pushes a fresh scope with `symbols` slots, optionally remembering the current scope as its caller.
    RootScope = 0x20,
    /// Pushes a copy of the current scope.
    ChildScope = 0x21,
    /// Pops the current scope.
    PopScope = 0x22,
    /// Pushes a child of the current dynamic scope.
    PushDynamicScope = 0x23,
    /// Pops the current dynamic scope.
    PopDynamicScope = 0x24,
    /// Pops one reference per name into the current dynamic scope.
    BindDynamicScope = 0x25,
    /// Hands the named locals of the current scope to the environment.
    Debugger = 0x26,
    /// Pushes a constant reference to a serializable list or record.
    PushSerializable = 0x27,
    /// Appends a static text node.
    Text = 0x30,
    /// Appends a static comment node.
    Comment = 0x31,
    /// Pops a reference and appends its value as text, recording an update.
    AppendContent = 0x32,
    /// Starts constructing an element with a static tag name.
    OpenElement = 0x33,
    /// Pops a reference and starts constructing an element named by its value.
    OpenDynamicElement = 0x34,
    /// Inserts the element under construction and makes it the insertion parent.
    FlushElement = 0x35,
    /// Restores the insertion parent that was current before the matching open.
    CloseElement = 0x36,
    /// Sets a static attribute on the element under construction.
    StaticAttr = 0x37,
    /// Pops a reference and binds it to an attribute, recording an update.
    DynamicAttr = 0x38,
    /// Pops captured arguments and installs a named modifier on the element under construction.
    Modifier = 0x39,
    /// Pops an iteration key and iterable, pushing an iterator and a presence reference.
    PutIterator = 0x40,
    /// Opens a keyed list region whose items start at `body`.
    EnterList = 0x41,
    /// Advances the iterator, opening an item span, or jumps to `breaks` when exhausted.
    Iterate = 0x42,
    /// Closes the innermost list region.
    ExitList = 0x43,
    /// Pushes a statically resolved component definition.
    PushComponentDefinition = 0x50,
    /// Resolves the reference on top of the stack to a component definition.
    PushDynamicComponentDefinition = 0x51,
    /// Lets the component manager rewrite the captured arguments.
    PrepareArgs = 0x52,
    /// Creates a component instance from the definition held in a register.
    CreateComponent = 0x53,
    /// Registers the component instance with the current region for teardown.
    RegisterComponentDestructor = 0x54,
    /// Opens a component region and its cache group.
    BeginComponentTransaction = 0x55,
    /// Closes the innermost component cache group.
    CommitComponentTransaction = 0x56,
    /// Pushes the component's `self` reference.
    GetComponentSelf = 0x57,
    /// Pushes the component's wrapper tag name, or `null` for tagless components.
    GetComponentTagName = 0x58,
    /// Pushes the component's compiled layout.
    GetComponentLayout = 0x59,
    /// Pops layout, self and arguments, binds them in a root scope and calls the layout.
    InvokeComponentLayout = 0x5A,
    /// Notifies the component that its wrapper element exists.
    DidCreateElement = 0x5B,
    /// Closes the component region and notifies the component of its bounds.
    DidRenderLayout = 0x5C,
}

impl Opcode {
    /// Decodes an opcode slot.
    #[must_use]
    pub fn from_u32(raw: u32) -> Option<Self> {
        Some(match raw {
            0x00 => Self::Nop,
            0x01 => Self::Return,
            0x02 => Self::ReturnTo,
            0x03 => Self::PushFrame,
            0x04 => Self::PopFrame,
            0x05 => Self::Jump,
            0x06 => Self::JumpIf,
            0x07 => Self::JumpUnless,
            0x08 => Self::Enter,
            0x09 => Self::Exit,
            0x0A => Self::InvokeStatic,
            0x0B => Self::InvokeYield,
            0x0C => Self::Load,
            0x0D => Self::Fetch,
            0x0E => Self::Dup,
            0x0F => Self::Pop,
            0x10 => Self::Primitive,
            0x11 => Self::PrimitiveReference,
            0x12 => Self::PushConstant,
            0x13 => Self::GetVariable,
            0x14 => Self::SetVariable,
            0x15 => Self::SetBlock,
            0x16 => Self::GetBlock,
            0x17 => Self::HasBlock,
            0x18 => Self::HasBlockParams,
            0x19 => Self::GetProperty,
            0x1A => Self::ResolveMaybeLocal,
            0x1B => Self::Concat,
            0x1C => Self::Helper,
            0x1D => Self::ToBoolean,
            0x1E => Self::PushArgs,
            0x1F => Self::IsComponent,
            0x20 => Self::RootScope,
            0x21 => Self::ChildScope,
            0x22 => Self::PopScope,
            0x23 => Self::PushDynamicScope,
            0x24 => Self::PopDynamicScope,
            0x25 => Self::BindDynamicScope,
            0x26 => Self::Debugger,
            0x27 => Self::PushSerializable,
            0x30 => Self::Text,
            0x31 => Self::Comment,
            0x32 => Self::AppendContent,
            0x33 => Self::OpenElement,
            0x34 => Self::OpenDynamicElement,
            0x35 => Self::FlushElement,
            0x36 => Self::CloseElement,
            0x37 => Self::StaticAttr,
            0x38 => Self::DynamicAttr,
            0x39 => Self::Modifier,
            0x40 => Self::PutIterator,
            0x41 => Self::EnterList,
            0x42 => Self::Iterate,
            0x43 => Self::ExitList,
            0x50 => Self::PushComponentDefinition,
            0x51 => Self::PushDynamicComponentDefinition,
            0x52 => Self::PrepareArgs,
            0x53 => Self::CreateComponent,
            0x54 => Self::RegisterComponentDestructor,
            0x55 => Self::BeginComponentTransaction,
            0x56 => Self::CommitComponentTransaction,
            0x57 => Self::GetComponentSelf,
            0x58 => Self::GetComponentTagName,
            0x59 => Self::GetComponentLayout,
            0x5A => Self::InvokeComponentLayout,
            0x5B => Self::DidCreateElement,
            0x5C => Self::DidRenderLayout,
            _ => return None,
        })
    }

    /// Returns `true` if control never falls through this opcode.
    #[must_use]
    pub fn is_terminator(self) -> bool {
        self.info().is_terminator
    }

    /// Stable, parseable opcode name.
    ///
    /// This string is used by the disassembler output.
    #[must_use]
    pub fn mnemonic(self) -> &'static str {
        self.info().mnemonic
    }

    /// Returns opcode metadata for this opcode.
    #[must_use]
    pub fn info(self) -> &'static OpcodeInfo {
        &OPCODE_INFO_BY_BYTE[usize::from(self as u8)]
    }

    /// Returns `true` if the first operand is patched from a label.
    #[must_use]
    pub fn is_jump(self) -> bool {
        self.info().flags.contains(OpcodeFlags::JUMP)
    }

    /// Returns operand schema descriptors for this opcode.
    #[must_use]
    pub fn operands(self) -> &'static [OperandSchema] {
        self.info().operands
    }
}
