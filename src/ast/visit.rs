//! Generic traversal: per-variant visitor callbacks and typed node scans.

use super::{Node, NodeId, Tree};

/// Whether [`walk`] should descend into the children of the visited node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Walk {
    Continue,
    SkipChildren,
}

/// Per-variant callbacks. Every method defaults to [`Visitor::visit_node`],
/// so implementors only override the variants they care about.
pub trait Visitor {
    fn visit_node(&mut self, _tree: &Tree, _id: NodeId) -> Walk {
        Walk::Continue
    }

    fn visit_block(&mut self, tree: &Tree, id: NodeId) -> Walk {
        self.visit_node(tree, id)
    }
    fn visit_conditional(&mut self, tree: &Tree, id: NodeId) -> Walk {
        self.visit_node(tree, id)
    }
    fn visit_loop(&mut self, tree: &Tree, id: NodeId) -> Walk {
        self.visit_node(tree, id)
    }
    fn visit_keyword(&mut self, tree: &Tree, id: NodeId) -> Walk {
        self.visit_node(tree, id)
    }
    fn visit_declare_local(&mut self, tree: &Tree, id: NodeId) -> Walk {
        self.visit_node(tree, id)
    }
    fn visit_binary_operator(&mut self, tree: &Tree, id: NodeId) -> Walk {
        self.visit_node(tree, id)
    }
    fn visit_unary_operator(&mut self, tree: &Tree, id: NodeId) -> Walk {
        self.visit_node(tree, id)
    }
    fn visit_crement(&mut self, tree: &Tree, id: NodeId) -> Walk {
        self.visit_node(tree, id)
    }
    fn visit_assign(&mut self, tree: &Tree, id: NodeId) -> Walk {
        self.visit_node(tree, id)
    }
    fn visit_cast(&mut self, tree: &Tree, id: NodeId) -> Walk {
        self.visit_node(tree, id)
    }
    fn visit_function_call(&mut self, tree: &Tree, id: NodeId) -> Walk {
        self.visit_node(tree, id)
    }
    fn visit_array_pack(&mut self, tree: &Tree, id: NodeId) -> Walk {
        self.visit_node(tree, id)
    }
    fn visit_array_unpack(&mut self, tree: &Tree, id: NodeId) -> Walk {
        self.visit_node(tree, id)
    }
    fn visit_value(&mut self, tree: &Tree, id: NodeId) -> Walk {
        self.visit_node(tree, id)
    }
    fn visit_local(&mut self, tree: &Tree, id: NodeId) -> Walk {
        self.visit_node(tree, id)
    }
    fn visit_attribute(&mut self, tree: &Tree, id: NodeId) -> Walk {
        self.visit_node(tree, id)
    }
    fn visit_external_variable(&mut self, tree: &Tree, id: NodeId) -> Walk {
        self.visit_node(tree, id)
    }
}

/// Dispatch `id` to the matching callback, then recurse into its children
/// in declaration order unless the callback returned [`Walk::SkipChildren`].
pub fn walk<V: Visitor + ?Sized>(visitor: &mut V, tree: &Tree, id: NodeId) {
    let Some(node) = tree.get(id) else {
        return;
    };
    let next = match node {
        Node::Block(_) => visitor.visit_block(tree, id),
        Node::Conditional { .. } => visitor.visit_conditional(tree, id),
        Node::Loop { .. } => visitor.visit_loop(tree, id),
        Node::Keyword(_) => visitor.visit_keyword(tree, id),
        Node::DeclareLocal { .. } => visitor.visit_declare_local(tree, id),
        Node::BinaryOperator { .. } => visitor.visit_binary_operator(tree, id),
        Node::UnaryOperator { .. } => visitor.visit_unary_operator(tree, id),
        Node::Crement { .. } => visitor.visit_crement(tree, id),
        Node::Assign { .. } => visitor.visit_assign(tree, id),
        Node::Cast { .. } => visitor.visit_cast(tree, id),
        Node::FunctionCall { .. } => visitor.visit_function_call(tree, id),
        Node::ArrayPack(_) => visitor.visit_array_pack(tree, id),
        Node::ArrayUnpack { .. } => visitor.visit_array_unpack(tree, id),
        Node::Value(_) => visitor.visit_value(tree, id),
        Node::Local { .. } => visitor.visit_local(tree, id),
        Node::Attribute { .. } => visitor.visit_attribute(tree, id),
        Node::ExternalVariable { .. } => visitor.visit_external_variable(tree, id),
    };
    if next == Walk::Continue {
        for child in node.children() {
            walk(visitor, tree, child);
        }
    }
}

// ─── Typed scans ───────────────────────────────────────────────────

/// A node filter: a single variant or a capability group of variants.
pub trait NodeType {
    fn matches(node: &Node) -> bool;
}

/// Marker types for [`Tree::visit_node_type`].
pub mod node_type {
    use super::NodeType;
    use crate::ast::Node;

    macro_rules! variant_marker {
        ($($name:ident => $pat:pat),* $(,)?) => {
            $(
                pub struct $name;

                impl NodeType for $name {
                    fn matches(node: &Node) -> bool {
                        matches!(node, $pat)
                    }
                }
            )*
        };
    }

    variant_marker! {
        Block => Node::Block(_),
        Conditional => Node::Conditional { .. },
        Loop => Node::Loop { .. },
        Keyword => Node::Keyword(_),
        DeclareLocal => Node::DeclareLocal { .. },
        BinaryOperator => Node::BinaryOperator { .. },
        UnaryOperator => Node::UnaryOperator { .. },
        Crement => Node::Crement { .. },
        Assign => Node::Assign { .. },
        Cast => Node::Cast { .. },
        FunctionCall => Node::FunctionCall { .. },
        ArrayPack => Node::ArrayPack(_),
        ArrayUnpack => Node::ArrayUnpack { .. },
        Value => Node::Value(_),
        Local => Node::Local { .. },
        Attribute => Node::Attribute { .. },
        ExternalVariable => Node::ExternalVariable { .. },
        Variable => Node::Local { .. } | Node::Attribute { .. } | Node::ExternalVariable { .. },
    }

    /// Every statement variant.
    pub struct Statement;

    impl NodeType for Statement {
        fn matches(node: &Node) -> bool {
            !node.is_expression()
        }
    }

    /// Every expression variant, variables included.
    pub struct Expression;

    impl NodeType for Expression {
        fn matches(node: &Node) -> bool {
            node.is_expression()
        }
    }
}

impl Tree {
    /// Visit every node matching `T` in traversal order; returns the match count.
    pub fn visit_node_type<T: NodeType>(&self, mut f: impl FnMut(NodeId, &Node)) -> usize {
        let mut count = 0;
        for id in self.preorder() {
            let node = &self[id];
            if T::matches(node) {
                count += 1;
                f(id, node);
            }
        }
        count
    }

    /// Ids of every node matching `T`, in traversal order.
    pub fn collect<T: NodeType>(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.visit_node_type::<T>(|id, _| out.push(id));
        out
    }
}
