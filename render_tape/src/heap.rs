// Copyright 2026 the Render Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Instruction heap and compiled-program container.
//!
//! The heap is append-only: an allocation is opened with [`Heap::malloc`], filled with
//! [`Heap::push`], and sealed with [`Heap::finish_malloc`]. Only sealed allocations can be read
//! through their [`Handle`], so new templates can be compiled while earlier ones are running.
//! A failed compilation rolls the heap back to a [`HeapMark`].

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

use crate::constants::Constants;
use crate::opcode::INSTR_SLOTS;

/// An opaque reference to a finalized instruction range.
///
/// A handle is only meaningful for the [`Heap`] that issued it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Handle(pub u32);

/// A heap error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HeapError {
    /// The handle was not issued by this heap.
    UnknownHandle(Handle),
    /// The handle's allocation has not been finalized yet.
    NotFinalized(Handle),
    /// `malloc` was called while another allocation was still open.
    AllocationInProgress,
    /// `push`/`finish_malloc` was called without a matching open allocation.
    NoOpenAllocation,
}

impl fmt::Display for HeapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownHandle(h) => write!(f, "unknown handle {}", h.0),
            Self::NotFinalized(h) => write!(f, "handle {} is not finalized", h.0),
            Self::AllocationInProgress => write!(f, "an allocation is already in progress"),
            Self::NoOpenAllocation => write!(f, "no allocation is in progress"),
        }
    }
}

impl core::error::Error for HeapError {}

#[derive(Copy, Clone, Debug)]
struct Allocation {
    start: usize,
    len: usize,
    finalized: bool,
}

/// The end of a [`Heap`] at some point, for [`Heap::rollback`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HeapMark {
    slots: usize,
    table: usize,
}

/// Append-only instruction storage.
#[derive(Clone, Debug, Default)]
pub struct Heap {
    slots: Vec<u32>,
    table: Vec<Allocation>,
    open: Option<Handle>,
}

impl Heap {
    /// Creates an empty heap.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a new allocation at the end of the heap.
    pub fn malloc(&mut self) -> Result<Handle, HeapError> {
        if self.open.is_some() {
            return Err(HeapError::AllocationInProgress);
        }
        let handle = Handle(u32::try_from(self.table.len()).unwrap_or(u32::MAX));
        self.table.push(Allocation {
            start: self.slots.len(),
            len: 0,
            finalized: false,
        });
        self.open = Some(handle);
        Ok(handle)
    }

    /// Appends one slot to the open allocation.
    pub fn push(&mut self, slot: u32) -> Result<(), HeapError> {
        if self.open.is_none() {
            return Err(HeapError::NoOpenAllocation);
        }
        self.slots.push(slot);
        Ok(())
    }

    /// Appends slots to the open allocation.
    pub fn extend(&mut self, slots: &[u32]) -> Result<(), HeapError> {
        if self.open.is_none() {
            return Err(HeapError::NoOpenAllocation);
        }
        self.slots.extend_from_slice(slots);
        Ok(())
    }

    /// Seals the open allocation, making `handle` readable.
    pub fn finish_malloc(&mut self, handle: Handle) -> Result<(), HeapError> {
        if self.open != Some(handle) {
            return Err(HeapError::NoOpenAllocation);
        }
        let entry = self
            .table
            .get_mut(handle.0 as usize)
            .ok_or(HeapError::UnknownHandle(handle))?;
        entry.len = self.slots.len() - entry.start;
        entry.finalized = true;
        self.open = None;
        Ok(())
    }

    fn allocation(&self, handle: Handle) -> Result<Allocation, HeapError> {
        let entry = *self
            .table
            .get(handle.0 as usize)
            .ok_or(HeapError::UnknownHandle(handle))?;
        if !entry.finalized {
            return Err(HeapError::NotFinalized(handle));
        }
        Ok(entry)
    }

    /// Returns the slot address of the first instruction behind `handle`.
    pub fn get_addr(&self, handle: Handle) -> Result<usize, HeapError> {
        Ok(self.allocation(handle)?.start)
    }

    /// Returns the number of slots behind `handle`.
    pub fn size_of(&self, handle: Handle) -> Result<usize, HeapError> {
        Ok(self.allocation(handle)?.len)
    }

    /// Returns the finalized slots behind `handle`.
    pub fn slots_of(&self, handle: Handle) -> Result<&[u32], HeapError> {
        let a = self.allocation(handle)?;
        Ok(&self.slots[a.start..a.start + a.len])
    }

    /// Reads the instruction starting at `addr`, if it lies in a finalized allocation.
    #[must_use]
    pub fn instr(&self, addr: usize) -> Option<[u32; INSTR_SLOTS]> {
        let sealed_end = match self.open {
            Some(h) => self.table.get(h.0 as usize).map_or(self.slots.len(), |a| a.start),
            None => self.slots.len(),
        };
        if addr % INSTR_SLOTS != 0 {
            return None;
        }
        let end = addr.checked_add(INSTR_SLOTS).filter(|&end| end <= sealed_end)?;
        let s = self.slots.get(addr..end)?;
        Some([s[0], s[1], s[2], s[3]])
    }

    /// Marks the current end of the heap.
    #[must_use]
    pub fn mark(&self) -> HeapMark {
        HeapMark {
            slots: self.slots.len(),
            table: self.table.len(),
        }
    }

    /// Drops every allocation made after `mark`, including an open one.
    ///
    /// Handles issued since then become unknown.
    pub fn rollback(&mut self, mark: HeapMark) {
        self.slots.truncate(mark.slots);
        self.table.truncate(mark.table);
        if self.open.is_some_and(|h| h.0 as usize >= mark.table) {
            self.open = None;
        }
    }

    /// Total number of slots in the heap.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if nothing has been allocated yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// A compiled block: an instruction range plus the scope symbols its parameters bind to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompiledBlock {
    /// Where the block's instructions live.
    pub handle: Handle,
    /// Symbol slot for each block parameter, in order.
    pub parameters: Box<[u32]>,
}

/// A compiled component layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompiledLayout {
    /// Where the layout's instructions live.
    pub handle: Handle,
    /// Symbol names in slot order; slot `i + 1` is `symbols[i]` (slot 0 is `self`).
    ///
    /// Named arguments appear as `@name`, yieldable blocks as `&default` / `&inverse`.
    pub symbols: Box<[Box<str>]>,
    /// The layout inspects its scope at runtime, so arguments must be bound by name.
    pub has_eval: bool,
}

impl CompiledLayout {
    /// Returns the scope slot of `name`, if the layout uses it.
    #[must_use]
    pub fn symbol(&self, name: &str) -> Option<u32> {
        self.symbols
            .iter()
            .position(|s| &**s == name)
            .map(|i| u32::try_from(i + 1).unwrap_or(u32::MAX))
    }

    /// Number of scope slots the layout needs, including `self`.
    #[must_use]
    pub fn scope_size(&self) -> u32 {
        u32::try_from(self.symbols.len() + 1).unwrap_or(u32::MAX)
    }
}

/// A compiled top-level template.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompiledTemplate {
    /// Where the template's instructions live.
    pub handle: Handle,
    /// Symbol names in slot order (slot 0 is `self`).
    pub symbols: Box<[Box<str>]>,
}

impl CompiledTemplate {
    /// Number of scope slots the template needs, including `self`.
    #[must_use]
    pub fn scope_size(&self) -> u32 {
        u32::try_from(self.symbols.len() + 1).unwrap_or(u32::MAX)
    }
}

/// Compiled bytecode plus the constants it references.
#[derive(Debug, Default)]
pub struct Program {
    heap: Heap,
    constants: Constants,
}

impl Program {
    /// Creates an empty program.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The instruction heap.
    #[must_use]
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// The constant pool.
    #[must_use]
    pub fn constants(&self) -> &Constants {
        &self.constants
    }

    /// Borrows the heap and constant pool separately, for compilation.
    pub fn parts_mut(&mut self) -> (&mut Heap, &mut Constants) {
        (&mut self.heap, &mut self.constants)
    }
}
