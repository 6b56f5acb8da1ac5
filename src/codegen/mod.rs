//! CodeGenerator: lowers a tree into one [`IrFunction`] per target.
//!
//! Attribute accesses become slot reads and writes against the program's
//! [`Registry`]; calls are resolved against a [`FunctionRegistry`]. Errors
//! are recorded into the [`DiagnosticSink`] and generation continues with
//! the next statement, so one run reports every independent problem.

mod call;
mod expr;
mod stmt;
#[cfg(test)]
mod tests;

use std::collections::HashMap;

use tracing::debug;

use crate::ast::{NodeId, Tree};
use crate::diagnostic::{Diagnostic, DiagnosticSink, ErrorKind, SourceMap};
use crate::function::FunctionRegistry;
use crate::ir::{IrBuilder, IrFunction, Operand};
use crate::registry::Registry;
use crate::runtime::CustomData;
use crate::types::Ty;

/// Shared, read-only inputs of one generation run.
#[derive(Clone, Copy)]
pub struct CodegenContext<'a> {
    pub registry: &'a Registry,
    pub functions: &'a FunctionRegistry,
    pub custom_data: &'a CustomData,
    pub source_map: &'a SourceMap,
}

// ─── CodeGenerator ─────────────────────────────────────────────────

pub struct CodeGenerator<'a> {
    pub(crate) tree: &'a Tree,
    pub(crate) ctx: CodegenContext<'a>,
    pub(crate) sink: &'a mut DiagnosticSink,
    pub(crate) builder: IrBuilder,
    /// Open block scopes, innermost last: local name -> register.
    pub(crate) scopes: Vec<HashMap<String, Operand>>,
    /// Number of enclosing loops.
    pub(crate) loop_depth: usize,
}

impl<'a> CodeGenerator<'a> {
    pub fn new(tree: &'a Tree, ctx: CodegenContext<'a>, sink: &'a mut DiagnosticSink) -> Self {
        let builder = IrBuilder::new(ctx.registry.target(), ctx.registry.len());
        Self {
            tree,
            ctx,
            sink,
            builder,
            scopes: Vec::new(),
            loop_depth: 0,
        }
    }

    /// Generate the whole tree. The result is only meaningful when the
    /// sink recorded no new errors.
    pub fn generate(mut self) -> IrFunction {
        let errors = self.sink.error_count();
        self.stmt(self.tree.root());
        let func = self.builder.finish();
        debug!(
            target = %func.target,
            instructions = func.len(),
            registers = func.regs.len(),
            errors = self.sink.error_count() - errors,
            "code generated"
        );
        func
    }

    // ── Diagnostics ──

    pub(crate) fn diag(&mut self, diag: Diagnostic) {
        self.sink.push(diag);
    }

    pub(crate) fn error(&mut self, kind: ErrorKind, node: NodeId, message: String) {
        let span = self.ctx.source_map.lookup(self.tree, node);
        self.sink.push(Diagnostic::error(kind, message, span));
    }

    pub(crate) fn error_at(&self, kind: ErrorKind, node: NodeId, message: String) -> Diagnostic {
        Diagnostic::error(kind, message, self.ctx.source_map.lookup(self.tree, node))
    }

    // ── Scopes ──

    pub(crate) fn lookup_local(&self, name: &str) -> Option<Operand> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }

    pub(crate) fn declare_local(&mut self, name: &str, reg: Operand) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), reg);
        }
    }

    // ── Typing helpers ──

    /// `op` implicitly converted to `to`, or an error at `node`.
    pub(crate) fn coerce(&mut self, op: Operand, to: Ty, node: NodeId) -> Option<Operand> {
        if op.ty.implicitly_converts_to(&to) {
            Some(self.builder.convert(op, to))
        } else {
            self.error(
                ErrorKind::Semantic,
                node,
                format!("cannot implicitly convert {} to {}", op.ty, to),
            );
            None
        }
    }

    /// Scalar condition as `bool`.
    pub(crate) fn condition(&mut self, op: Operand, node: NodeId) -> Option<Operand> {
        if op.ty.is_scalar() {
            Some(self.builder.convert(op, Ty::BOOL))
        } else {
            self.error(
                ErrorKind::Semantic,
                node,
                format!("condition must be a scalar, found {}", op.ty),
            );
            None
        }
    }
}
