//! Indented, one-node-per-line printing of trees.

use std::fmt;

use super::{CrementOp, KeywordKind, Literal, LoopKind, Node, NodeId, Tree};

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Int16(v) => write!(f, "{}", v),
            Literal::Int32(v) => write!(f, "{}", v),
            Literal::Int64(v) => write!(f, "{}", v),
            Literal::Float(v) => write!(f, "{:?}", v),
            Literal::Double(v) => write!(f, "{:?}", v),
            Literal::Str(s) => write!(f, "{:?}", s),
        }
    }
}

/// One-line label of a node, without its children.
pub fn node_label(node: &Node) -> String {
    match node {
        Node::Block(stmts) => format!("Block ({})", stmts.len()),
        Node::Conditional { .. } => "Conditional".to_string(),
        Node::Loop { kind, .. } => match kind {
            LoopKind::For => "Loop for".to_string(),
            LoopKind::While => "Loop while".to_string(),
            LoopKind::DoWhile => "Loop do-while".to_string(),
        },
        Node::Keyword(k) => match k {
            KeywordKind::Return => "Keyword return".to_string(),
            KeywordKind::Break => "Keyword break".to_string(),
            KeywordKind::Continue => "Keyword continue".to_string(),
        },
        Node::DeclareLocal { ty, .. } => format!("DeclareLocal {}", ty),
        Node::BinaryOperator { op, .. } => format!("BinaryOperator {}", op.as_str()),
        Node::UnaryOperator { op, .. } => format!("UnaryOperator {}", op.as_str()),
        Node::Crement { op, post, .. } => {
            let sym = match op {
                CrementOp::Increment => "++",
                CrementOp::Decrement => "--",
            };
            if *post {
                format!("Crement post{}", sym)
            } else {
                format!("Crement pre{}", sym)
            }
        }
        Node::Assign { compound, .. } => match compound {
            Some(op) => format!("Assign {}=", op.as_str()),
            None => "Assign".to_string(),
        },
        Node::Cast { ty, .. } => format!("Cast {}", ty),
        Node::FunctionCall { name, args } => format!("FunctionCall {} ({})", name, args.len()),
        Node::ArrayPack(items) => format!("ArrayPack ({})", items.len()),
        Node::ArrayUnpack { .. } => "ArrayUnpack".to_string(),
        Node::Value(lit) => format!("Value {}: {}", lit, lit.ty()),
        Node::Local { name } => format!("Local {}", name),
        Node::Attribute {
            name,
            ty,
            inferred,
            writable,
        } => {
            let mut line = format!("Attribute @{}: {}", name, ty);
            if *inferred {
                line.push_str(" (inferred)");
            }
            if *writable {
                line.push_str(" (writable)");
            }
            line
        }
        Node::ExternalVariable { name, ty } => format!("ExternalVariable ${}: {}", name, ty),
    }
}

fn write_node(tree: &Tree, id: NodeId, depth: usize, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let Some(node) = tree.get(id) else {
        return writeln!(f, "{:indent$}<freed {:?}>", "", id, indent = depth * 2);
    };
    writeln!(f, "{:indent$}{}", "", node_label(node), indent = depth * 2)?;
    for child in node.children() {
        write_node(tree, child, depth + 1, f)?;
    }
    Ok(())
}

impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_node(self, self.root(), 0, f)
    }
}
