//! Abstract syntax tree: a single-owner arena of nodes.
//!
//! A [`Tree`] owns every node in one arena keyed by [`NodeId`]. Children are
//! referenced by id, and each slot records its parent id so a node can be
//! replaced in place (see [`rewrite`]). Nothing outside the tree holds a node.

pub mod display;
pub mod hash;
pub mod rewrite;
pub mod visit;

use std::collections::HashSet;
use std::ops::Index;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::Ty;

pub use hash::ContentHash;
pub use visit::{node_type, walk, NodeType, Visitor, Walk};

// ─── Identities ────────────────────────────────────────────────────

/// Index of a node inside its owning tree's arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Process-unique identity of a tree. Copies receive a fresh id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TreeId(u64);

impl TreeId {
    fn fresh() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        TreeId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Identity of one node: the tree it lives in plus its arena index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub tree: TreeId,
    pub node: NodeId,
}

// ─── Operators and tags ────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LoopKind {
    For,
    While,
    DoWhile,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeywordKind {
    Return,
    Break,
    Continue,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

/// Operator families that share typing rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpClass {
    Arithmetic,
    Equality,
    Relational,
    Logical,
    Bitwise,
}

impl BinaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
        }
    }

    pub fn class(&self) -> OpClass {
        match self {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
                OpClass::Arithmetic
            }
            BinaryOp::Eq | BinaryOp::Ne => OpClass::Equality,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => OpClass::Relational,
            BinaryOp::And | BinaryOp::Or => OpClass::Logical,
            BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor | BinaryOp::Shl | BinaryOp::Shr => {
                OpClass::Bitwise
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
    BitNot,
}

impl UnaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Plus => "+",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CrementOp {
    Increment,
    Decrement,
}

/// A literal value of one of the supported scalar or string types.
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float(f32),
    Double(f64),
    Str(String),
}

impl Literal {
    pub fn ty(&self) -> Ty {
        match self {
            Literal::Bool(_) => Ty::BOOL,
            Literal::Int16(_) => Ty::INT16,
            Literal::Int32(_) => Ty::INT32,
            Literal::Int64(_) => Ty::INT64,
            Literal::Float(_) => Ty::FLOAT,
            Literal::Double(_) => Ty::DOUBLE,
            Literal::Str(_) => Ty::Str,
        }
    }
}

// ─── Nodes ─────────────────────────────────────────────────────────

/// The closed set of node variants. Children are arena ids owned by the tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    // ── Statements ──
    /// Ordered statements; order is execution order.
    Block(Vec<NodeId>),
    /// `else_branch` is always a block, possibly empty.
    Conditional {
        condition: NodeId,
        then_branch: NodeId,
        else_branch: NodeId,
    },
    Loop {
        kind: LoopKind,
        init: Option<NodeId>,
        condition: Option<NodeId>,
        iteration: Option<NodeId>,
        body: NodeId,
    },
    Keyword(KeywordKind),
    /// `local` is always a [`Node::Local`].
    DeclareLocal {
        ty: Ty,
        local: NodeId,
        init: Option<NodeId>,
    },

    // ── Expressions ──
    BinaryOperator {
        op: BinaryOp,
        lhs: NodeId,
        rhs: NodeId,
    },
    UnaryOperator {
        op: UnaryOp,
        operand: NodeId,
    },
    Crement {
        op: CrementOp,
        post: bool,
        target: NodeId,
    },
    /// `compound` is the operator of `+=`-style forms.
    Assign {
        target: NodeId,
        value: NodeId,
        compound: Option<BinaryOp>,
    },
    Cast {
        ty: Ty,
        operand: NodeId,
    },
    FunctionCall {
        name: String,
        args: Vec<NodeId>,
    },
    ArrayPack(Vec<NodeId>),
    /// `index2` selects a matrix column when present.
    ArrayUnpack {
        array: NodeId,
        index: NodeId,
        index2: Option<NodeId>,
    },
    Value(Literal),

    // ── Variables ──
    Local {
        name: String,
    },
    /// Per-element field. `inferred` is set when the source gave no type;
    /// `writable` is the front end's hint that the field is written.
    /// Assignment targets are writable whether or not the hint is set.
    Attribute {
        name: String,
        ty: Ty,
        inferred: bool,
        writable: bool,
    },
    ExternalVariable {
        name: String,
        ty: Ty,
    },
}

/// Payload-free discriminant of a [`Node`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Block,
    Conditional,
    Loop,
    Keyword,
    DeclareLocal,
    BinaryOperator,
    UnaryOperator,
    Crement,
    Assign,
    Cast,
    FunctionCall,
    ArrayPack,
    ArrayUnpack,
    Value,
    Local,
    Attribute,
    ExternalVariable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeCategory {
    Statement,
    Expression,
    Variable,
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Block(_) => NodeKind::Block,
            Node::Conditional { .. } => NodeKind::Conditional,
            Node::Loop { .. } => NodeKind::Loop,
            Node::Keyword(_) => NodeKind::Keyword,
            Node::DeclareLocal { .. } => NodeKind::DeclareLocal,
            Node::BinaryOperator { .. } => NodeKind::BinaryOperator,
            Node::UnaryOperator { .. } => NodeKind::UnaryOperator,
            Node::Crement { .. } => NodeKind::Crement,
            Node::Assign { .. } => NodeKind::Assign,
            Node::Cast { .. } => NodeKind::Cast,
            Node::FunctionCall { .. } => NodeKind::FunctionCall,
            Node::ArrayPack(_) => NodeKind::ArrayPack,
            Node::ArrayUnpack { .. } => NodeKind::ArrayUnpack,
            Node::Value(_) => NodeKind::Value,
            Node::Local { .. } => NodeKind::Local,
            Node::Attribute { .. } => NodeKind::Attribute,
            Node::ExternalVariable { .. } => NodeKind::ExternalVariable,
        }
    }

    pub fn category(&self) -> NodeCategory {
        match self {
            Node::Block(_)
            | Node::Conditional { .. }
            | Node::Loop { .. }
            | Node::Keyword(_)
            | Node::DeclareLocal { .. } => NodeCategory::Statement,
            Node::Local { .. } | Node::Attribute { .. } | Node::ExternalVariable { .. } => {
                NodeCategory::Variable
            }
            _ => NodeCategory::Expression,
        }
    }

    /// Variables are expressions too.
    pub fn is_expression(&self) -> bool {
        self.category() != NodeCategory::Statement
    }

    /// Name and type of a variable node.
    pub fn variable(&self) -> Option<(&str, Option<Ty>)> {
        match self {
            Node::Local { name } => Some((name.as_str(), None)),
            Node::Attribute { name, ty, .. } | Node::ExternalVariable { name, ty } => {
                Some((name.as_str(), Some(*ty)))
            }
            _ => None,
        }
    }

    /// Children in declaration order.
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            Node::Block(stmts) => stmts.clone(),
            Node::Conditional {
                condition,
                then_branch,
                else_branch,
            } => vec![*condition, *then_branch, *else_branch],
            Node::Loop {
                init,
                condition,
                iteration,
                body,
                ..
            } => init
                .iter()
                .chain(condition.iter())
                .chain(iteration.iter())
                .copied()
                .chain(std::iter::once(*body))
                .collect(),
            Node::DeclareLocal { local, init, .. } => {
                std::iter::once(*local).chain(init.iter().copied()).collect()
            }
            Node::BinaryOperator { lhs, rhs, .. } => vec![*lhs, *rhs],
            Node::UnaryOperator { operand, .. } | Node::Cast { operand, .. } => vec![*operand],
            Node::Crement { target, .. } => vec![*target],
            Node::Assign { target, value, .. } => vec![*target, *value],
            Node::FunctionCall { args, .. } => args.clone(),
            Node::ArrayPack(items) => items.clone(),
            Node::ArrayUnpack {
                array,
                index,
                index2,
            } => std::iter::once(*array)
                .chain(std::iter::once(*index))
                .chain(index2.iter().copied())
                .collect(),
            Node::Keyword(_)
            | Node::Value(_)
            | Node::Local { .. }
            | Node::Attribute { .. }
            | Node::ExternalVariable { .. } => Vec::new(),
        }
    }

    /// Mutable child slots in the same order as [`Node::children`].
    pub(crate) fn children_mut(&mut self) -> Vec<&mut NodeId> {
        match self {
            Node::Block(stmts) => stmts.iter_mut().collect(),
            Node::Conditional {
                condition,
                then_branch,
                else_branch,
            } => vec![condition, then_branch, else_branch],
            Node::Loop {
                init,
                condition,
                iteration,
                body,
                ..
            } => init
                .iter_mut()
                .chain(condition.iter_mut())
                .chain(iteration.iter_mut())
                .chain(std::iter::once(body))
                .collect(),
            Node::DeclareLocal { local, init, .. } => {
                std::iter::once(local).chain(init.iter_mut()).collect()
            }
            Node::BinaryOperator { lhs, rhs, .. } => vec![lhs, rhs],
            Node::UnaryOperator { operand, .. } | Node::Cast { operand, .. } => vec![operand],
            Node::Crement { target, .. } => vec![target],
            Node::Assign { target, value, .. } => vec![target, value],
            Node::FunctionCall { args, .. } => args.iter_mut().collect(),
            Node::ArrayPack(items) => items.iter_mut().collect(),
            Node::ArrayUnpack {
                array,
                index,
                index2,
            } => std::iter::once(array)
                .chain(std::iter::once(index))
                .chain(index2.iter_mut())
                .collect(),
            Node::Keyword(_)
            | Node::Value(_)
            | Node::Local { .. }
            | Node::Attribute { .. }
            | Node::ExternalVariable { .. } => Vec::new(),
        }
    }
}

// ─── Tree ──────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
struct Slot {
    node: Node,
    parent: Option<NodeId>,
}

/// A program: one root block and every node below it.
#[derive(Debug)]
pub struct Tree {
    id: TreeId,
    slots: Vec<Option<Slot>>,
    root: NodeId,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    /// An empty program.
    pub fn new() -> Self {
        let mut tree = Self::unrooted();
        tree.root = tree.add(Node::Block(Vec::new()));
        tree
    }

    fn unrooted() -> Self {
        Self {
            id: TreeId::fresh(),
            slots: Vec::new(),
            root: NodeId(u32::MAX),
        }
    }

    pub fn id(&self) -> TreeId {
        self.id
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node_ref(&self, node: NodeId) -> NodeRef {
        NodeRef {
            tree: self.id,
            node,
        }
    }

    /// The node at `id`, or `None` if it was freed by a rewrite.
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.slots
            .get(id.index())
            .and_then(|s| s.as_ref())
            .map(|s| &s.node)
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.index())
            .and_then(|s| s.as_mut())
            .map(|s| &mut s.node)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Weak back-reference to the owning parent.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.slots
            .get(id.index())
            .and_then(|s| s.as_ref())
            .and_then(|s| s.parent)
    }

    pub(crate) fn set_parent(&mut self, id: NodeId, parent: Option<NodeId>) {
        if let Some(Some(slot)) = self.slots.get_mut(id.index()) {
            slot.parent = parent;
        }
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.statements().is_empty()
    }

    /// Statements of the root block.
    pub fn statements(&self) -> &[NodeId] {
        match self.get(self.root) {
            Some(Node::Block(stmts)) => stmts,
            _ => &[],
        }
    }

    /// Whether `id` is live, not the root and not owned by any parent.
    pub fn is_detached(&self, id: NodeId) -> bool {
        id != self.root && self.contains(id) && self.parent(id).is_none()
    }

    /// Allocate a node, taking ownership of its children.
    ///
    /// # Panics
    ///
    /// Panics if a child is not a detached node of this tree, or is listed
    /// twice: sharing a subtree between two parents would break single
    /// ownership.
    pub fn add(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.slots.len() as u32);
        let mut seen = HashSet::new();
        for child in node.children() {
            assert!(
                self.is_detached(child) && seen.insert(child),
                "node {:?} is already owned or does not exist",
                child
            );
        }
        for child in node.children() {
            self.set_parent(child, Some(id));
        }
        self.slots.push(Some(Slot { node, parent: None }));
        id
    }

    /// Append a detached statement to `block`.
    ///
    /// # Panics
    ///
    /// Panics if `block` is not a block or `stmt` is not detached.
    pub fn push_statement(&mut self, block: NodeId, stmt: NodeId) {
        assert!(self.is_detached(stmt), "statement {:?} is not detached", stmt);
        match self.get_mut(block) {
            Some(Node::Block(stmts)) => stmts.push(stmt),
            _ => panic!("{:?} is not a block", block),
        }
        self.set_parent(stmt, Some(block));
    }

    /// Append a detached statement to the root block.
    pub fn append(&mut self, stmt: NodeId) -> NodeId {
        let root = self.root;
        self.push_statement(root, stmt);
        stmt
    }

    /// Free `id` and everything below it.
    pub(crate) fn free(&mut self, id: NodeId) {
        let children = match self.get(id) {
            Some(node) => node.children(),
            None => return,
        };
        for child in children {
            self.free(child);
        }
        if let Some(slot) = self.slots.get_mut(id.index()) {
            *slot = None;
        }
    }

    /// Pre-order node ids, children in declaration order.
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.slots.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.get(id) {
                out.push(id);
                stack.extend(node.children().into_iter().rev());
            }
        }
        out
    }

    /// Variant discriminants in traversal order.
    pub fn linearize(&self) -> Vec<NodeKind> {
        self.preorder()
            .into_iter()
            .filter_map(|id| self.get(id).map(Node::kind))
            .collect()
    }

    /// Fully independent deep copy with new node identities.
    pub fn copy(&self) -> Tree {
        let mut out = Tree::unrooted();
        out.root = out.import(self, self.root);
        out
    }

    /// Deep-copy `node` of `other` into this arena as a detached subtree.
    pub fn import(&mut self, other: &Tree, node: NodeId) -> NodeId {
        let mut copied = match other.get(node) {
            Some(n) => n.clone(),
            None => return self.add(Node::Block(Vec::new())),
        };
        for child in copied.children_mut() {
            *child = self.import(other, *child);
        }
        self.add(copied)
    }

    // ── Construction helpers ──────────────────────────────────────

    pub fn value(&mut self, literal: Literal) -> NodeId {
        self.add(Node::Value(literal))
    }

    pub fn local(&mut self, name: &str) -> NodeId {
        self.add(Node::Local {
            name: name.to_string(),
        })
    }

    /// An attribute with an explicit type.
    pub fn attribute(&mut self, name: &str, ty: Ty) -> NodeId {
        self.add(Node::Attribute {
            name: name.to_string(),
            ty,
            inferred: false,
            writable: false,
        })
    }

    /// An attribute the host wants writable even if nothing assigns it,
    /// so it is created when missing.
    pub fn writable_attribute(&mut self, name: &str, ty: Ty) -> NodeId {
        self.add(Node::Attribute {
            name: name.to_string(),
            ty,
            inferred: false,
            writable: true,
        })
    }

    /// An attribute written without a type; inferred as `float`.
    pub fn attribute_inferred(&mut self, name: &str) -> NodeId {
        self.add(Node::Attribute {
            name: name.to_string(),
            ty: Ty::FLOAT,
            inferred: true,
            writable: false,
        })
    }

    pub fn external(&mut self, name: &str, ty: Ty) -> NodeId {
        self.add(Node::ExternalVariable {
            name: name.to_string(),
            ty,
        })
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.add(Node::BinaryOperator { op, lhs, rhs })
    }

    pub fn unary(&mut self, op: UnaryOp, operand: NodeId) -> NodeId {
        self.add(Node::UnaryOperator { op, operand })
    }

    pub fn assign(&mut self, target: NodeId, value: NodeId) -> NodeId {
        self.add(Node::Assign {
            target,
            value,
            compound: None,
        })
    }

    pub fn compound_assign(&mut self, op: BinaryOp, target: NodeId, value: NodeId) -> NodeId {
        self.add(Node::Assign {
            target,
            value,
            compound: Some(op),
        })
    }

    pub fn crement(&mut self, op: CrementOp, post: bool, target: NodeId) -> NodeId {
        self.add(Node::Crement { op, post, target })
    }

    pub fn cast(&mut self, ty: Ty, operand: NodeId) -> NodeId {
        self.add(Node::Cast { ty, operand })
    }

    pub fn call(&mut self, name: &str, args: Vec<NodeId>) -> NodeId {
        self.add(Node::FunctionCall {
            name: name.to_string(),
            args,
        })
    }

    pub fn pack(&mut self, items: Vec<NodeId>) -> NodeId {
        self.add(Node::ArrayPack(items))
    }

    pub fn unpack(&mut self, array: NodeId, index: NodeId) -> NodeId {
        self.add(Node::ArrayUnpack {
            array,
            index,
            index2: None,
        })
    }

    pub fn unpack2(&mut self, array: NodeId, row: NodeId, col: NodeId) -> NodeId {
        self.add(Node::ArrayUnpack {
            array,
            index: row,
            index2: Some(col),
        })
    }

    pub fn declare(&mut self, ty: Ty, name: &str, init: Option<NodeId>) -> NodeId {
        let local = self.local(name);
        self.add(Node::DeclareLocal { ty, local, init })
    }

    pub fn block(&mut self, stmts: Vec<NodeId>) -> NodeId {
        self.add(Node::Block(stmts))
    }

    pub fn conditional(
        &mut self,
        condition: NodeId,
        then_branch: NodeId,
        else_branch: Option<NodeId>,
    ) -> NodeId {
        let else_branch = match else_branch {
            Some(b) => b,
            None => self.block(Vec::new()),
        };
        self.add(Node::Conditional {
            condition,
            then_branch,
            else_branch,
        })
    }

    pub fn loop_(
        &mut self,
        kind: LoopKind,
        init: Option<NodeId>,
        condition: Option<NodeId>,
        iteration: Option<NodeId>,
        body: NodeId,
    ) -> NodeId {
        self.add(Node::Loop {
            kind,
            init,
            condition,
            iteration,
            body,
        })
    }

    pub fn keyword(&mut self, kind: KeywordKind) -> NodeId {
        self.add(Node::Keyword(kind))
    }
}

impl Index<NodeId> for Tree {
    type Output = Node;

    /// # Panics
    ///
    /// Panics if the node was freed by a rewrite.
    fn index(&self, id: NodeId) -> &Node {
        match self.get(id) {
            Some(node) => node,
            None => panic!("node {:?} is not live in this tree", id),
        }
    }
}
