// Copyright 2026 the Render Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Disassembler for compiled templates.
//!
//! [`disassemble`] decodes one heap allocation into [`InstrView`]s; the returned [`Listing`]
//! renders one instruction per line with jump targets resolved to labels (`L0`, `L1`, ...) and
//! constant operands resolved against the program's pool.

use alloc::vec::Vec;
use core::fmt;

use crate::constants::Constants;
use crate::heap::{Handle, HeapError, Program};
use crate::opcode::{
    INSTR_SLOTS, Opcode, OperandKind, OperandRole, PrimitiveTag, Register, decode_primitive,
    immediate,
};
use crate::value::Value;

/// A disassembly failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DisasmError {
    /// The handle does not name a finalized allocation.
    Heap(HeapError),
    /// An opcode slot holds an unknown opcode.
    UnknownOpcode {
        /// Slot offset within the allocation.
        at: usize,
        /// The raw slot.
        raw: u32,
    },
}

impl fmt::Display for DisasmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Heap(e) => write!(f, "heap error: {e}"),
            Self::UnknownOpcode { at, raw } => write!(f, "unknown opcode {raw:#x} at {at}"),
        }
    }
}

impl core::error::Error for DisasmError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Heap(e) => Some(e),
            Self::UnknownOpcode { .. } => None,
        }
    }
}

impl From<HeapError> for DisasmError {
    fn from(e: HeapError) -> Self {
        Self::Heap(e)
    }
}

/// One decoded instruction.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct InstrView {
    /// Slot offset within the allocation.
    pub at: usize,
    /// The opcode.
    pub opcode: Opcode,
    /// Raw operand slots.
    pub operands: [u32; INSTR_SLOTS - 1],
}

impl InstrView {
    /// The slot offset a jump-class instruction targets.
    #[must_use]
    pub fn target(&self) -> Option<usize> {
        if !self.opcode.is_jump() {
            return None;
        }
        let at = self.at as i64 + i64::from(self.operands[0] as i32);
        usize::try_from(at).ok()
    }
}

/// A decoded allocation.
#[derive(Debug)]
pub struct Listing<'p> {
    constants: &'p Constants,
    instrs: Vec<InstrView>,
    labels: Vec<usize>,
}

/// Decodes the instructions of `handle`.
pub fn disassemble(program: &Program, handle: Handle) -> Result<Listing<'_>, DisasmError> {
    let slots = program.heap().slots_of(handle)?;
    let mut instrs = Vec::with_capacity(slots.len() / INSTR_SLOTS);
    for (i, chunk) in slots.chunks_exact(INSTR_SLOTS).enumerate() {
        let at = i * INSTR_SLOTS;
        let opcode =
            Opcode::from_u32(chunk[0]).ok_or(DisasmError::UnknownOpcode { at, raw: chunk[0] })?;
        instrs.push(InstrView {
            at,
            opcode,
            operands: [chunk[1], chunk[2], chunk[3]],
        });
    }
    let mut labels: Vec<usize> = instrs.iter().filter_map(InstrView::target).collect();
    labels.sort_unstable();
    labels.dedup();
    Ok(Listing {
        constants: program.constants(),
        instrs,
        labels,
    })
}

impl Listing<'_> {
    /// The decoded instructions.
    #[must_use]
    pub fn instrs(&self) -> &[InstrView] {
        &self.instrs
    }

    /// Slot offsets that some jump targets, in ascending order.
    #[must_use]
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    fn label(&self, at: usize) -> Option<usize> {
        self.labels.binary_search(&at).ok()
    }

    fn operand(&self, f: &mut fmt::Formatter<'_>, instr: &InstrView, i: usize) -> fmt::Result {
        let schema = instr.opcode.operands()[i];
        let raw = instr.operands[i];
        let c = self.constants;
        match schema.kind {
            OperandKind::Offset => match instr.target().and_then(|t| self.label(t)) {
                Some(label) => write!(f, "L{label}"),
                None => write!(f, "{:+}", raw as i32),
            },
            OperandKind::Imm => write!(f, "{raw}"),
            OperandKind::Flag => write!(f, "{}", raw != 0),
            OperandKind::Register => match Register::from_u32(raw) {
                Some(r) => f.write_str(r.name()),
                None => write!(f, "$?{raw}"),
            },
            OperandKind::Symbol => write!(f, "%{raw}"),
            OperandKind::Primitive => match decode_primitive(raw) {
                Some((PrimitiveTag::Int, n)) => write!(f, "{n}"),
                Some((PrimitiveTag::NegativeInt, n)) => write!(f, "-{n}"),
                Some((PrimitiveTag::Number, id)) => match c.get_number(id) {
                    Some(n) => write!(f, "{}", Value::from(n)),
                    None => write!(f, "#{id}?"),
                },
                Some((PrimitiveTag::String, id)) => string(f, c, id),
                Some((PrimitiveTag::Immediate, v)) => f.write_str(match v {
                    immediate::FALSE => "false",
                    immediate::TRUE => "true",
                    immediate::NULL => "null",
                    immediate::UNDEFINED => "undefined",
                    _ => "?",
                }),
                None => write!(f, "?{raw:#x}"),
            },
            OperandKind::ConstString => string(f, c, raw),
            OperandKind::ConstArray => {
                let Some(items) = c.get_array(raw) else {
                    return write!(f, "[#{raw}?]");
                };
                f.write_str("[")?;
                for (j, &item) in items.iter().enumerate() {
                    if j > 0 {
                        f.write_str(", ")?;
                    }
                    if schema.role == OperandRole::Names {
                        string(f, c, item)?;
                    } else {
                        write!(f, "%{item}")?;
                    }
                }
                f.write_str("]")
            }
            OperandKind::ConstOther => match c.get_other(raw) {
                Some(other) => write!(f, "<{other:?}>"),
                None => write!(f, "<#{raw}?>"),
            },
            OperandKind::ConstSerializable => match c.get_serializable(raw) {
                Some(v) => write!(f, "{v:?}"),
                None => write!(f, "#{raw}?"),
            },
        }
    }
}

fn string(f: &mut fmt::Formatter<'_>, c: &Constants, id: u32) -> fmt::Result {
    match c.get_string(id) {
        Some(s) => write!(f, "{:?}", &**s),
        None => write!(f, "#{id}?"),
    }
}

impl fmt::Display for Listing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for instr in &self.instrs {
            if let Some(label) = self.label(instr.at) {
                writeln!(f, "L{label}:")?;
            }
            write!(f, "  {:04} {}", instr.at, instr.opcode.mnemonic())?;
            for i in 0..instr.opcode.operands().len() {
                f.write_str(if i == 0 { " " } else { ", " })?;
                self.operand(f, instr, i)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
