//! In-place structural rewriting through parent back-references.

use super::{NodeId, Tree};
use crate::error::RewriteError;

impl Tree {
    /// Splice the detached subtree `replacement` into the position held by
    /// `node`, freeing `node` and its descendants.
    pub fn replace(&mut self, node: NodeId, replacement: NodeId) -> Result<(), RewriteError> {
        if !self.contains(node) {
            return Err(RewriteError::Stale(node));
        }
        if !self.is_detached(replacement) {
            return Err(RewriteError::ReplacementAttached(replacement));
        }
        let parent = self.parent(node).ok_or(RewriteError::NoParent(node))?;
        let parent_node = self.get_mut(parent).ok_or(RewriteError::Stale(parent))?;
        let slot = parent_node
            .children_mut()
            .into_iter()
            .find(|child| **child == node)
            .ok_or(RewriteError::NotAChild { node, parent })?;
        *slot = replacement;

        self.set_parent(replacement, Some(parent));
        self.set_parent(node, None);
        self.free(node);
        Ok(())
    }

    /// Remove `node` from its parent block, freeing it.
    ///
    /// Only statements of a block can be removed: every other child slot is
    /// structurally required.
    pub fn remove_statement(&mut self, node: NodeId) -> Result<(), RewriteError> {
        if !self.contains(node) {
            return Err(RewriteError::Stale(node));
        }
        let parent = self.parent(node).ok_or(RewriteError::NoParent(node))?;
        match self.get_mut(parent) {
            Some(super::Node::Block(stmts)) => {
                let pos = stmts
                    .iter()
                    .position(|s| *s == node)
                    .ok_or(RewriteError::NotAChild { node, parent })?;
                stmts.remove(pos);
            }
            _ => return Err(RewriteError::NotAChild { node, parent }),
        }
        self.set_parent(node, None);
        self.free(node);
        Ok(())
    }
}
