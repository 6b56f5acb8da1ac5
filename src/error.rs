//! Error types outside the diagnostic flow.

use thiserror::Error;

use crate::ast::NodeId;
use crate::span::Span;
use crate::types::Ty;

/// Failure of an in-place tree rewrite.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RewriteError {
    #[error("node {0:?} has no parent (the root block cannot be replaced)")]
    NoParent(NodeId),

    #[error("node {node:?} is not among the children of {parent:?}")]
    NotAChild { node: NodeId, parent: NodeId },

    #[error("node {0:?} is not live in this tree")]
    Stale(NodeId),

    #[error("replacement {0:?} is not a detached subtree of this tree")]
    ReplacementAttached(NodeId),
}

/// Raised by a [`Frontend`](crate::api::Frontend) on malformed source.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("syntax error: {message}")]
pub struct SyntaxError {
    pub message: String,
    pub span: Option<Span>,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, span: Option<Span>) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

/// Host data-layer lookup failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccessError {
    #[error("'{0}' does not exist")]
    Missing(String),

    #[error("'{name}' holds {found}, expected {expected}")]
    TypeMismatch { name: String, expected: Ty, found: Ty },

    #[error("'{name}' cannot be created as {ty}: {reason}")]
    Unsupported { name: String, ty: Ty, reason: String },
}

/// Execute-time failure to bind a registry entry to host data.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BindingError {
    #[error("required read-only {kind} '{name}' ({ty}) is missing")]
    MissingReadOnly {
        kind: &'static str,
        name: String,
        ty: Ty,
    },

    #[error("{kind} '{name}' is {found} in the data set but the program uses {expected}")]
    TypeMismatch {
        kind: &'static str,
        name: String,
        expected: Ty,
        found: Ty,
    },

    #[error("could not create {kind} '{name}': {source}")]
    Create {
        kind: &'static str,
        name: String,
        #[source]
        source: AccessError,
    },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecuteError {
    #[error(transparent)]
    Binding(#[from] BindingError),

    #[error("execution interrupted after {completed} of {total} elements")]
    Interrupted { completed: usize, total: usize },

    #[error("selection index {index} is out of range for {len} elements")]
    SelectionOutOfRange { index: usize, len: usize },
}

/// The backend rejected an IR function.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("register r{reg} used but the function only has {count} registers")]
    BadRegister { reg: u32, count: usize },

    #[error("instruction `{inst}` expects {expected}, register r{reg} holds {found}")]
    TypeMismatch {
        inst: String,
        reg: u32,
        expected: Ty,
        found: Ty,
    },

    #[error("`{0}` outside of a loop")]
    StrayJump(&'static str),

    #[error("attribute slot {slot} is outside the bound registry of {count} entries")]
    BadSlot { slot: usize, count: usize },
}
