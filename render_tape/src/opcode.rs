// Copyright 2026 the Render Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Opcode values for the template instruction set.
//!
//! This module is a small wrapper around generated opcode tables, plus the register and
//! primitive-literal encodings shared by the assembler and the VM.

include!("opcodes_gen.rs");

/// Number of `u32` slots in every instruction.
pub const INSTR_SLOTS: usize = 4;

impl Opcode {
    /// Returns the opcode slot value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self as u32
    }
}

/// VM registers addressable from bytecode.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum Register {
    /// Program counter.
    Pc = 0,
    /// Return address.
    Ra = 1,
    /// Frame pointer: the stack index of the saved `ra` of the current frame.
    Fp = 2,
    /// Stack pointer: the index of the top stack slot.
    Sp = 3,
    /// Saved temporary, preserved across component invocations.
    S0 = 4,
    /// Saved temporary.
    S1 = 5,
    /// Scratch temporary.
    T0 = 6,
    /// Scratch temporary.
    T1 = 7,
}

impl Register {
    /// Decodes a register operand.
    #[must_use]
    pub fn from_u32(raw: u32) -> Option<Self> {
        Some(match raw {
            0 => Self::Pc,
            1 => Self::Ra,
            2 => Self::Fp,
            3 => Self::Sp,
            4 => Self::S0,
            5 => Self::S1,
            6 => Self::T0,
            7 => Self::T1,
            _ => return None,
        })
    }

    /// Short assembly name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Pc => "$pc",
            Self::Ra => "$ra",
            Self::Fp => "$fp",
            Self::Sp => "$sp",
            Self::S0 => "$s0",
            Self::S1 => "$s1",
            Self::T0 => "$t0",
            Self::T1 => "$t1",
        }
    }
}

/// Tag stored in the low three bits of an encoded primitive operand.
///
/// The payload lives in the remaining 29 bits.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PrimitiveTag {
    /// Non-negative integer stored inline.
    Int = 0,
    /// Index into the number constants.
    Number = 1,
    /// Index into the string constants.
    String = 2,
    /// `false`, `true`, `null`, `undefined` as `0..=3`.
    Immediate = 3,
    /// Negative integer stored inline as its magnitude.
    NegativeInt = 4,
}

/// Largest payload that fits in an encoded primitive.
pub const PRIMITIVE_PAYLOAD_MAX: u32 = (1 << 29) - 1;

/// Immediate payloads for [`PrimitiveTag::Immediate`].
pub mod immediate {
    /// `false`.
    pub const FALSE: u32 = 0;
    /// `true`.
    pub const TRUE: u32 = 1;
    /// `null`.
    pub const NULL: u32 = 2;
    /// `undefined`.
    pub const UNDEFINED: u32 = 3;
}

/// Packs a primitive operand.
#[must_use]
pub const fn encode_primitive(tag: PrimitiveTag, payload: u32) -> u32 {
    (payload << 3) | tag as u32
}

/// Unpacks a primitive operand into its tag and payload.
#[must_use]
pub fn decode_primitive(raw: u32) -> Option<(PrimitiveTag, u32)> {
    let tag = match raw & 0b111 {
        0 => PrimitiveTag::Int,
        1 => PrimitiveTag::Number,
        2 => PrimitiveTag::String,
        3 => PrimitiveTag::Immediate,
        4 => PrimitiveTag::NegativeInt,
        _ => return None,
    };
    Some((tag, raw >> 3))
}
