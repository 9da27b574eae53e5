// Copyright 2026 the Render Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing hooks for `render_tape`.
//!
//! Tracing is optional and `no_std` friendly. The VM only emits events requested by a
//! [`TraceMask`].
//!
//! To enable tracing, pass a [`TraceMask`] and [`TraceSink`] to [`Vm::render`] or
//! [`RenderResult::rerender`].

#[cfg(doc)]
use crate::render::RenderResult;
#[cfg(doc)]
use crate::vm::Vm;

use crate::opcode::Opcode;
use crate::vm::RenderError;

/// A set of trace events requested by a [`TraceSink`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TraceMask(u32);

impl core::ops::BitOr for TraceMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl core::ops::BitOrAssign for TraceMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl TraceMask {
    /// No tracing.
    pub const NONE: Self = Self(0);
    /// Trace pass boundaries.
    ///
    /// Enables:
    /// - [`TraceSink::run_start`]
    /// - [`TraceSink::run_end`]
    pub const RUN: Self = Self(1 << 0);
    /// Trace each executed instruction.
    ///
    /// Enables:
    /// - [`TraceSink::instr`]
    pub const INSTR: Self = Self(1 << 1);
    /// Trace call frames.
    ///
    /// Enables (for [`ScopeKind::Frame`]):
    /// - [`TraceSink::scope_enter`]
    /// - [`TraceSink::scope_exit`]
    pub const FRAME: Self = Self(1 << 2);
    /// Trace component invocations.
    ///
    /// Enables (for [`ScopeKind::Component`]):
    /// - [`TraceSink::scope_enter`]
    /// - [`TraceSink::scope_exit`]
    pub const COMPONENT: Self = Self(1 << 3);
    /// Trace updating opcodes during rerender.
    ///
    /// Enables:
    /// - [`TraceSink::update`]
    pub const UPDATE: Self = Self(1 << 4);
    /// Trace teardown.
    ///
    /// Enables:
    /// - [`TraceSink::destroy`]
    pub const DESTROY: Self = Self(1 << 5);
    /// Every event.
    pub const ALL: Self = Self(0b11_1111);

    /// Returns `true` if this mask includes all bits in `other`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

/// What kind of pass is running.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RunKind {
    /// The initial render of a template.
    Render,
    /// A walk of the update program.
    Rerender,
    /// Re-execution of one stale span during rerender.
    Reexecute,
    /// Rendering one list item inserted during rerender.
    ListInsert,
}

/// The kind of scope being entered/exited.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ScopeKind<'a> {
    /// A VM call frame.
    Frame,
    /// A component invocation (creation through layout completion).
    Component {
        /// The definition's name.
        name: &'a str,
    },
}

/// The outcome of one updating opcode.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UpdateEvent {
    /// The opcode's tag was still valid.
    Skipped(UpdateKind),
    /// The opcode recomputed its value; `changed` reports whether output was touched.
    Revalidated {
        /// Which opcode.
        kind: UpdateKind,
        /// Whether output was mutated.
        changed: bool,
    },
    /// A span was torn down and rendered again.
    Reexecuted,
    /// A keyed list was reconciled.
    ListSynced {
        /// Items kept in place or moved.
        retained: usize,
        /// Items relocated.
        moved: usize,
        /// Items rendered fresh.
        inserted: usize,
        /// Items destroyed.
        removed: usize,
    },
}

/// Kinds of updating opcode that revalidate in place.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UpdateKind {
    /// A branch condition.
    Assert,
    /// Dynamic text content.
    Text,
    /// A dynamic attribute.
    Attribute,
    /// An element modifier.
    Modifier,
    /// A keyed list.
    List,
    /// A component's captured arguments.
    Component,
    /// A component cache group.
    Guard,
}

/// Something torn down.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DestroyEvent<'a> {
    /// A region and its output.
    Region,
    /// A component destructor.
    Component {
        /// The definition's name.
        name: &'a str,
    },
    /// An element modifier.
    Modifier {
        /// The modifier's name.
        name: &'a str,
    },
}

/// Run outcome for tracing.
#[derive(Clone, Debug)]
pub enum TraceOutcome<'a> {
    /// Successful pass.
    Ok,
    /// The pass failed.
    Error(&'a RenderError),
}

/// A trace sink that can receive VM events.
pub trait TraceSink {
    /// Returns the set of events the sink wants.
    fn mask(&self) -> TraceMask {
        TraceMask::NONE
    }

    /// Called at the start of a pass.
    ///
    /// Called only if the mask includes [`TraceMask::RUN`].
    fn run_start(&mut self, _kind: RunKind) {}

    /// Called for each executed instruction.
    ///
    /// Called only if the mask includes [`TraceMask::INSTR`].
    ///
    /// - `pc`: slot address of the instruction
    /// - `opcode`: the decoded opcode
    fn instr(&mut self, _pc: usize, _opcode: Opcode) {}

    /// Called when entering a scope.
    ///
    /// Called only if the mask includes:
    /// - [`TraceMask::FRAME`] (for [`ScopeKind::Frame`])
    /// - [`TraceMask::COMPONENT`] (for [`ScopeKind::Component`])
    ///
    /// `depth` is the number of open frames after entering.
    fn scope_enter(&mut self, _kind: ScopeKind<'_>, _depth: usize) {}

    /// Called when exiting a scope.
    ///
    /// `depth` is the number of open frames before exiting.
    fn scope_exit(&mut self, _kind: ScopeKind<'_>, _depth: usize) {}

    /// Called for each updating opcode visited during rerender.
    ///
    /// Called only if the mask includes [`TraceMask::UPDATE`].
    fn update(&mut self, _event: UpdateEvent) {}

    /// Called for each region destroyed and each destructor run.
    ///
    /// Called only if the mask includes [`TraceMask::DESTROY`].
    fn destroy(&mut self, _event: DestroyEvent<'_>) {}

    /// Called at the end of a pass.
    ///
    /// Called only if the mask includes [`TraceMask::RUN`].
    fn run_end(&mut self, _kind: RunKind, _outcome: TraceOutcome<'_>) {}
}

/// The mask and optional sink of one pass.
pub(crate) struct Tracer<'t> {
    mask: TraceMask,
    sink: Option<&'t mut dyn TraceSink>,
}

impl<'t> Tracer<'t> {
    pub(crate) fn new(mask: TraceMask, sink: Option<&'t mut dyn TraceSink>) -> Self {
        Self { mask, sink }
    }

    fn sink(&mut self, want: TraceMask) -> Option<&mut (dyn TraceSink + 't)> {
        if !self.mask.contains(want) {
            return None;
        }
        self.sink.as_deref_mut()
    }

    pub(crate) fn run_start(&mut self, kind: RunKind) {
        if let Some(s) = self.sink(TraceMask::RUN) {
            s.run_start(kind);
        }
    }

    pub(crate) fn run_end(&mut self, kind: RunKind, outcome: TraceOutcome<'_>) {
        if let Some(s) = self.sink(TraceMask::RUN) {
            s.run_end(kind, outcome);
        }
    }

    pub(crate) fn instr(&mut self, pc: usize, opcode: Opcode) {
        if let Some(s) = self.sink(TraceMask::INSTR) {
            s.instr(pc, opcode);
        }
    }

    pub(crate) fn scope_enter(&mut self, kind: ScopeKind<'_>, depth: usize) {
        if let Some(s) = self.sink(scope_mask(kind)) {
            s.scope_enter(kind, depth);
        }
    }

    pub(crate) fn scope_exit(&mut self, kind: ScopeKind<'_>, depth: usize) {
        if let Some(s) = self.sink(scope_mask(kind)) {
            s.scope_exit(kind, depth);
        }
    }

    pub(crate) fn update(&mut self, event: UpdateEvent) {
        if let Some(s) = self.sink(TraceMask::UPDATE) {
            s.update(event);
        }
    }

    pub(crate) fn destroy(&mut self, event: DestroyEvent<'_>) {
        if let Some(s) = self.sink(TraceMask::DESTROY) {
            s.destroy(event);
        }
    }
}

fn scope_mask(kind: ScopeKind<'_>) -> TraceMask {
    match kind {
        ScopeKind::Frame => TraceMask::FRAME,
        ScopeKind::Component { .. } => TraceMask::COMPONENT,
    }
}
