//! Backends turn an optimized [`IrFunction`] into a callable
//! [`CompiledFunction`].
//!
//! Every backend runs [`verify`] first, so a backend only ever sees
//! well-formed IR: register indices in range, operand types consistent,
//! jumps inside loops.

mod closure;
mod verify;

use std::fmt;
use std::sync::Arc;

pub use closure::ClosureBackend;
pub use verify::verify;

use crate::error::BackendError;
use crate::ir::IrFunction;
use crate::registry::TargetKind;
use crate::runtime::{ElementState, Value};

/// Compiles IR for one execution target.
pub trait Backend {
    /// Backend name (e.g. "closure").
    fn name(&self) -> &'static str;

    fn compile(&self, func: &IrFunction) -> Result<CompiledFunction, BackendError>;
}

/// Control-flow outcome of one compiled instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Flow {
    Next,
    Break,
    Continue,
    Return,
}

/// Per-invocation storage: the register file plus the element being
/// processed.
pub(crate) struct Frame<'s> {
    pub(crate) regs: Vec<Value>,
    pub(crate) state: &'s mut ElementState,
}

pub(crate) type Op = Box<dyn Fn(&mut Frame<'_>) -> Flow + Send + Sync>;

pub(crate) struct Program {
    pub(crate) target: TargetKind,
    pub(crate) slots: usize,
    /// Initial register file: every register starts at the zero of its type.
    pub(crate) init: Vec<Value>,
    pub(crate) body: Vec<Op>,
    pub(crate) instructions: usize,
}

/// An immutable compiled program, cheap to clone and safe to call from
/// many threads at once.
#[derive(Clone)]
pub struct CompiledFunction {
    program: Arc<Program>,
}

impl CompiledFunction {
    pub(crate) fn new(program: Program) -> Self {
        Self {
            program: Arc::new(program),
        }
    }

    pub fn target(&self) -> TargetKind {
        self.program.target
    }

    /// Number of element slots the program reads and writes.
    pub fn slots(&self) -> usize {
        self.program.slots
    }

    /// Run the program once against one element.
    ///
    /// `state.values` must hold one value per slot, in registry order.
    pub fn call(&self, state: &mut ElementState) {
        let mut frame = Frame {
            regs: self.program.init.clone(),
            state,
        };
        closure::run(&self.program.body, &mut frame);
    }
}

impl fmt::Debug for CompiledFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledFunction")
            .field("target", &self.program.target)
            .field("slots", &self.program.slots)
            .field("registers", &self.program.init.len())
            .field("instructions", &self.program.instructions)
            .finish()
    }
}
