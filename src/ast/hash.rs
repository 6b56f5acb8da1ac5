//! Content addressing for trees: deterministic serialization + BLAKE3.
//!
//! Two trees with the same structure, names, types and literals hash the
//! same regardless of arena layout, so hosts can key executable caches on
//! [`Tree::content_hash`]. Copies hash identically to their original.

use super::{BinaryOp, CrementOp, KeywordKind, Literal, LoopKind, Node, NodeId, Tree, UnaryOp};
use crate::types::{ScalarTy, Ty};

// ─── Serialization Format Tags ─────────────────────────────────────

const TAG_BLOCK: u8 = 0x01;
const TAG_CONDITIONAL: u8 = 0x02;
const TAG_LOOP: u8 = 0x03;
const TAG_KEYWORD: u8 = 0x04;
const TAG_DECLARE: u8 = 0x05;
const TAG_BINARY: u8 = 0x06;
const TAG_UNARY: u8 = 0x07;
const TAG_CREMENT: u8 = 0x08;
const TAG_ASSIGN: u8 = 0x09;
const TAG_CAST: u8 = 0x0A;
const TAG_CALL: u8 = 0x0B;
const TAG_PACK: u8 = 0x0C;
const TAG_UNPACK: u8 = 0x0D;
const TAG_VALUE: u8 = 0x0E;
const TAG_LOCAL: u8 = 0x0F;
const TAG_ATTRIBUTE: u8 = 0x10;
const TAG_EXTERNAL: u8 = 0x11;
/// Marks an absent optional child.
const TAG_NONE: u8 = 0x7F;

// Type tags
const TAG_TY_SCALAR: u8 = 0x80;
const TAG_TY_VECTOR: u8 = 0x81;
const TAG_TY_MATRIX: u8 = 0x82;
const TAG_TY_STRING: u8 = 0x83;
const TAG_TY_VOID: u8 = 0x84;

// Version byte for hash stability
const HASH_VERSION: u8 = 1;

// ─── Content Hash ──────────────────────────────────────────────────

/// A 256-bit BLAKE3 content hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash(pub [u8; 32]);

impl ContentHash {
    /// Display as full hex.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Display as short base-32 (8 characters, 40 bits).
    pub fn to_short(&self) -> String {
        const ALPHABET: &[u8] = b"0123456789abcdefghjkmnpqrstuvwxyz";
        let val = u64::from_be_bytes([
            0, 0, 0, self.0[0], self.0[1], self.0[2], self.0[3], self.0[4],
        ]);
        let mut result = String::with_capacity(8);
        for i in (0..8).rev() {
            let idx = ((val >> (i * 5)) & 0x1F) as usize;
            result.push(ALPHABET[idx] as char);
        }
        result
    }
}

impl std::fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.to_short())
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.to_short())
    }
}

// ─── Serializer ────────────────────────────────────────────────────

struct Serializer<'a> {
    tree: &'a Tree,
    buf: Vec<u8>,
}

impl Serializer<'_> {
    fn byte(&mut self, b: u8) {
        self.buf.push(b);
    }

    fn str(&mut self, s: &str) {
        self.buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
        self.buf.extend_from_slice(s.as_bytes());
    }

    fn ty(&mut self, ty: &Ty) {
        match ty {
            Ty::Scalar(s) => {
                self.byte(TAG_TY_SCALAR);
                self.byte(scalar_tag(*s));
            }
            Ty::Vector(s, n) => {
                self.byte(TAG_TY_VECTOR);
                self.byte(scalar_tag(*s));
                self.byte(*n);
            }
            Ty::Matrix(s, n) => {
                self.byte(TAG_TY_MATRIX);
                self.byte(scalar_tag(*s));
                self.byte(*n);
            }
            Ty::Str => self.byte(TAG_TY_STRING),
            Ty::Void => self.byte(TAG_TY_VOID),
        }
    }

    fn opt(&mut self, id: Option<NodeId>) {
        match id {
            Some(id) => self.node(id),
            None => self.byte(TAG_NONE),
        }
    }

    fn node(&mut self, id: NodeId) {
        let Some(node) = self.tree.get(id) else {
            self.byte(TAG_NONE);
            return;
        };
        match node {
            Node::Block(stmts) => {
                self.byte(TAG_BLOCK);
                self.buf.extend_from_slice(&(stmts.len() as u32).to_le_bytes());
                for s in stmts {
                    self.node(*s);
                }
            }
            Node::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                self.byte(TAG_CONDITIONAL);
                self.node(*condition);
                self.node(*then_branch);
                self.node(*else_branch);
            }
            Node::Loop {
                kind,
                init,
                condition,
                iteration,
                body,
            } => {
                self.byte(TAG_LOOP);
                self.byte(match kind {
                    LoopKind::For => 0,
                    LoopKind::While => 1,
                    LoopKind::DoWhile => 2,
                });
                self.opt(*init);
                self.opt(*condition);
                self.opt(*iteration);
                self.node(*body);
            }
            Node::Keyword(k) => {
                self.byte(TAG_KEYWORD);
                self.byte(match k {
                    KeywordKind::Return => 0,
                    KeywordKind::Break => 1,
                    KeywordKind::Continue => 2,
                });
            }
            Node::DeclareLocal { ty, local, init } => {
                self.byte(TAG_DECLARE);
                self.ty(ty);
                self.node(*local);
                self.opt(*init);
            }
            Node::BinaryOperator { op, lhs, rhs } => {
                self.byte(TAG_BINARY);
                self.byte(binary_tag(*op));
                self.node(*lhs);
                self.node(*rhs);
            }
            Node::UnaryOperator { op, operand } => {
                self.byte(TAG_UNARY);
                self.byte(match op {
                    UnaryOp::Neg => 0,
                    UnaryOp::Plus => 1,
                    UnaryOp::Not => 2,
                    UnaryOp::BitNot => 3,
                });
                self.node(*operand);
            }
            Node::Crement { op, post, target } => {
                self.byte(TAG_CREMENT);
                self.byte(matches!(op, CrementOp::Decrement) as u8);
                self.byte(*post as u8);
                self.node(*target);
            }
            Node::Assign {
                target,
                value,
                compound,
            } => {
                self.byte(TAG_ASSIGN);
                self.byte(compound.map(binary_tag).unwrap_or(TAG_NONE));
                self.node(*target);
                self.node(*value);
            }
            Node::Cast { ty, operand } => {
                self.byte(TAG_CAST);
                self.ty(ty);
                self.node(*operand);
            }
            Node::FunctionCall { name, args } => {
                self.byte(TAG_CALL);
                self.str(name);
                self.buf.extend_from_slice(&(args.len() as u32).to_le_bytes());
                for a in args {
                    self.node(*a);
                }
            }
            Node::ArrayPack(items) => {
                self.byte(TAG_PACK);
                self.buf.extend_from_slice(&(items.len() as u32).to_le_bytes());
                for i in items {
                    self.node(*i);
                }
            }
            Node::ArrayUnpack {
                array,
                index,
                index2,
            } => {
                self.byte(TAG_UNPACK);
                self.node(*array);
                self.node(*index);
                self.opt(*index2);
            }
            Node::Value(lit) => {
                self.byte(TAG_VALUE);
                self.literal(lit);
            }
            Node::Local { name } => {
                self.byte(TAG_LOCAL);
                self.str(name);
            }
            Node::Attribute {
                name,
                ty,
                inferred,
                writable,
            } => {
                self.byte(TAG_ATTRIBUTE);
                self.str(name);
                self.ty(ty);
                self.byte(*inferred as u8);
                self.byte(*writable as u8);
            }
            Node::ExternalVariable { name, ty } => {
                self.byte(TAG_EXTERNAL);
                self.str(name);
                self.ty(ty);
            }
        }
    }

    fn literal(&mut self, lit: &Literal) {
        self.ty(&lit.ty());
        match lit {
            Literal::Bool(b) => self.byte(*b as u8),
            Literal::Int16(v) => self.buf.extend_from_slice(&v.to_le_bytes()),
            Literal::Int32(v) => self.buf.extend_from_slice(&v.to_le_bytes()),
            Literal::Int64(v) => self.buf.extend_from_slice(&v.to_le_bytes()),
            Literal::Float(v) => self.buf.extend_from_slice(&v.to_bits().to_le_bytes()),
            Literal::Double(v) => self.buf.extend_from_slice(&v.to_bits().to_le_bytes()),
            Literal::Str(s) => self.str(s),
        }
    }
}

fn scalar_tag(s: ScalarTy) -> u8 {
    s as u8
}

fn binary_tag(op: BinaryOp) -> u8 {
    op as u8
}

impl Tree {
    /// BLAKE3 hash of the tree's normalized serialization.
    pub fn content_hash(&self) -> ContentHash {
        let mut ser = Serializer {
            tree: self,
            buf: vec![HASH_VERSION],
        };
        ser.node(self.root());
        ContentHash(*blake3::hash(&ser.buf).as_bytes())
    }
}
