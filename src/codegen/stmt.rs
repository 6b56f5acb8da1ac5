//! Statements: blocks, control flow and local declarations.

use std::collections::HashMap;

use crate::ast::{KeywordKind, Node, NodeId};
use crate::diagnostic::ErrorKind;
use crate::ir::Inst;
use crate::runtime::Value;
use crate::types::Ty;

use super::CodeGenerator;

impl CodeGenerator<'_> {
    pub(crate) fn stmt(&mut self, id: NodeId) {
        let tree = self.tree;
        let Some(node) = tree.get(id) else {
            return;
        };
        match node {
            Node::Block(stmts) => {
                self.scopes.push(HashMap::new());
                for &stmt in stmts {
                    self.stmt(stmt);
                }
                self.scopes.pop();
            }
            Node::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                let Some(cond) = self
                    .expr(*condition)
                    .and_then(|c| self.condition(c, *condition))
                else {
                    return;
                };
                self.builder.begin_block();
                self.stmt(*then_branch);
                let then_body = self.builder.end_block();
                self.builder.begin_block();
                self.stmt(*else_branch);
                let else_body = self.builder.end_block();
                self.builder.emit(Inst::If {
                    cond: cond.reg,
                    then_body,
                    else_body,
                });
            }
            Node::Loop {
                kind,
                init,
                condition,
                iteration,
                body,
            } => {
                self.scopes.push(HashMap::new());
                if let Some(init) = init {
                    self.stmt(*init);
                }

                self.builder.begin_block();
                let cond = condition.and_then(|c| {
                    self.expr(c).and_then(|op| self.condition(op, c))
                });
                let cond_body = self.builder.end_block();
                if condition.is_some() && cond.is_none() {
                    self.scopes.pop();
                    return;
                }

                self.loop_depth += 1;
                self.builder.begin_block();
                self.stmt(*body);
                let body = self.builder.end_block();
                self.loop_depth -= 1;

                self.builder.begin_block();
                if let Some(iteration) = iteration {
                    self.stmt(*iteration);
                }
                let iteration = self.builder.end_block();

                self.builder.emit(Inst::Loop {
                    kind: *kind,
                    cond_body,
                    cond: cond.map(|c| c.reg),
                    body,
                    iteration,
                });
                self.scopes.pop();
            }
            Node::Keyword(kind) => match kind {
                KeywordKind::Return => self.builder.emit(Inst::Return),
                KeywordKind::Break | KeywordKind::Continue if self.loop_depth == 0 => {
                    let word = if *kind == KeywordKind::Break {
                        "break"
                    } else {
                        "continue"
                    };
                    self.error(
                        ErrorKind::Semantic,
                        id,
                        format!("'{}' outside of a loop", word),
                    );
                }
                KeywordKind::Break => self.builder.emit(Inst::Break),
                KeywordKind::Continue => self.builder.emit(Inst::Continue),
            },
            Node::DeclareLocal { ty, local, init } => self.declare(id, *ty, *local, *init),
            _ => {
                self.expr(id);
            }
        }
    }

    fn declare(&mut self, id: NodeId, ty: Ty, local: NodeId, init: Option<NodeId>) {
        let tree = self.tree;
        let Some(Node::Local { name }) = tree.get(local) else {
            self.error(
                ErrorKind::Declaration,
                id,
                "declaration without a local name".to_string(),
            );
            return;
        };
        if self.lookup_local(name).is_some() {
            let diag = self
                .error_at(
                    ErrorKind::Declaration,
                    local,
                    format!("local '{}' is already declared", name),
                )
                .with_help("locals may not shadow locals of an enclosing scope".to_string());
            self.diag(diag);
            return;
        }
        if ty == Ty::Void {
            self.error(
                ErrorKind::Declaration,
                id,
                format!("local '{}' cannot be void", name),
            );
            return;
        }

        let value = match init {
            Some(init) => {
                let Some(value) = self.expr(init).and_then(|v| self.coerce(v, ty, init)) else {
                    return;
                };
                Some(value)
            }
            None => None,
        };
        let reg = self.builder.alloc(ty);
        match value {
            Some(value) => self.builder.assign(reg, value),
            None => self.builder.emit(Inst::Const {
                dst: reg.reg,
                value: Value::zero(&ty),
            }),
        }
        self.declare_local(name, reg);
    }
}
