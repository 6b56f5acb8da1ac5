//! Expressions, variables and assignment targets.

use crate::ast::{BinaryOp, CrementOp, Literal, Node, NodeId, OpClass, UnaryOp};
use crate::diagnostic::{Diagnostic, ErrorKind};
use crate::ir::{Inst, Operand};
use crate::runtime::Value;
use crate::types::{ScalarTy, Ty};

use super::CodeGenerator;

/// Storage location of an assignment or crement target.
pub(crate) enum Place {
    Local(Operand),
    Attr { slot: usize, ty: Ty },
    /// One component of an array; `container` holds the whole array,
    /// loaded once.
    Component {
        base: Box<Place>,
        container: Operand,
        index: Operand,
    },
}

impl Place {
    fn ty(&self) -> Ty {
        match self {
            Place::Local(op) => op.ty,
            Place::Attr { ty, .. } => *ty,
            Place::Component { container, .. } => {
                container.ty.element().map_or(Ty::Void, Ty::Scalar)
            }
        }
    }
}

impl CodeGenerator<'_> {
    pub(crate) fn expr(&mut self, id: NodeId) -> Option<Operand> {
        let tree = self.tree;
        let Some(node) = tree.get(id) else {
            return None;
        };
        match node {
            Node::Value(lit) => Some(self.builder.constant(Value::from(lit))),
            Node::Local { name } => match self.lookup_local(name) {
                Some(op) => Some(op),
                None => {
                    self.error(
                        ErrorKind::Declaration,
                        id,
                        format!("local '{}' is not declared", name),
                    );
                    None
                }
            },
            Node::Attribute { name, ty, .. } => {
                let slot = self.attribute_slot(id, name, *ty, false)?;
                Some(self.builder.read_attr(slot, *ty))
            }
            Node::ExternalVariable { name, ty } => self.external(id, name, *ty),
            Node::BinaryOperator { op, lhs, rhs } => {
                if op.class() == OpClass::Logical {
                    return self.logical(*op, *lhs, *rhs);
                }
                let l = self.expr(*lhs)?;
                let r = self.expr(*rhs)?;
                self.binary_values(id, *op, l, r)
            }
            Node::UnaryOperator { op, operand } => {
                let v = self.expr(*operand)?;
                self.unary(id, *op, v)
            }
            Node::Crement { op, post, target } => self.crement(id, *op, *post, *target),
            Node::Assign {
                target,
                value,
                compound,
            } => self.assign(id, *target, *value, *compound),
            Node::Cast { ty, operand } => {
                let v = self.expr(*operand)?;
                if v.ty.implicitly_converts_to(ty) {
                    Some(self.builder.convert(v, *ty))
                } else {
                    self.error(
                        ErrorKind::Semantic,
                        id,
                        format!("cannot cast {} to {}", v.ty, ty),
                    );
                    None
                }
            }
            Node::FunctionCall { name, args } => self.call(id, name, args),
            Node::ArrayPack(items) => self.pack(id, items),
            Node::ArrayUnpack {
                array,
                index,
                index2,
            } => {
                let container = self.expr(*array)?;
                let index = self.component_index(container, *index, *index2, id)?;
                Some(self.builder.extract(container, index))
            }
            Node::Block(_)
            | Node::Conditional { .. }
            | Node::Loop { .. }
            | Node::Keyword(_)
            | Node::DeclareLocal { .. } => {
                self.error(
                    ErrorKind::Semantic,
                    id,
                    "statement used as an expression".to_string(),
                );
                None
            }
        }
    }

    // ── Variables ──

    /// Registry slot of `@name`, checking type and writability.
    fn attribute_slot(&mut self, id: NodeId, name: &str, ty: Ty, write: bool) -> Option<usize> {
        let kind = self.ctx.registry.target().entry_kind();
        let Some(entry) = self.ctx.registry.get(name) else {
            self.error(
                ErrorKind::Semantic,
                id,
                format!("{} '@{}' is not registered", kind, name),
            );
            return None;
        };
        if entry.ty != ty {
            self.error(
                ErrorKind::TypeConflict,
                id,
                format!(
                    "{} '@{}' is registered as {} but used as {}",
                    kind, name, entry.ty, ty
                ),
            );
            return None;
        }
        if write && !entry.writable {
            self.error(
                ErrorKind::Semantic,
                id,
                format!("{} '@{}' is read-only", kind, name),
            );
            return None;
        }
        Some(entry.index)
    }

    /// External variables are resolved against the custom data at compile
    /// time; a missing name reads as zero.
    fn external(&mut self, id: NodeId, name: &str, ty: Ty) -> Option<Operand> {
        match self.ctx.custom_data.get(name) {
            None => {
                let span = self.ctx.source_map.lookup(self.tree, id);
                self.diag(Diagnostic::warning(
                    ErrorKind::Semantic,
                    format!("external '${}' is not in the custom data, reading zero", name),
                    span,
                ));
                Some(self.builder.constant(Value::zero(&ty)))
            }
            Some(value) if value.ty() != ty => {
                self.error(
                    ErrorKind::TypeConflict,
                    id,
                    format!(
                        "external '${}' is {} in the custom data but used as {}",
                        name,
                        value.ty(),
                        ty
                    ),
                );
                None
            }
            Some(value) => Some(self.builder.constant(value.clone())),
        }
    }

    // ── Operators ──

    /// Type and emit `l op r` for a non-logical operator.
    pub(crate) fn binary_values(
        &mut self,
        id: NodeId,
        op: BinaryOp,
        l: Operand,
        r: Operand,
    ) -> Option<Operand> {
        let class = op.class();
        let valid = match class {
            OpClass::Relational => l.ty.is_scalar() && r.ty.is_scalar(),
            OpClass::Bitwise => l.ty.is_integer_scalar() && r.ty.is_integer_scalar(),
            OpClass::Arithmetic => l.ty.is_numeric() && r.ty.is_numeric(),
            OpClass::Equality | OpClass::Logical => true,
        };
        let common = Ty::common(&l.ty, &r.ty).filter(|_| valid);
        let Some(common) = common else {
            self.error(
                ErrorKind::Semantic,
                id,
                format!(
                    "operator '{}' cannot be applied to {} and {}",
                    op.as_str(),
                    l.ty,
                    r.ty
                ),
            );
            return None;
        };
        let operand_ty = match class {
            OpClass::Arithmetic | OpClass::Bitwise if common == Ty::BOOL => Ty::INT32,
            _ => common,
        };
        let l = self.builder.convert(l, operand_ty);
        let r = self.builder.convert(r, operand_ty);
        let result = match class {
            OpClass::Equality | OpClass::Relational => Ty::BOOL,
            _ => operand_ty,
        };
        Some(self.builder.binary(op, l, r, result))
    }

    /// `&&` / `||` with short-circuit evaluation of the right operand.
    fn logical(&mut self, op: BinaryOp, lhs: NodeId, rhs: NodeId) -> Option<Operand> {
        let l = self.expr(lhs)?;
        let l = self.logical_operand(l, lhs)?;
        let result = self.builder.alloc(Ty::BOOL);
        self.builder.assign(result, l);

        self.builder.begin_block();
        let r = self
            .expr(rhs)
            .and_then(|r| self.logical_operand(r, rhs));
        if let Some(r) = r {
            self.builder.assign(result, r);
        }
        let body = self.builder.end_block();
        r?;

        let (then_body, else_body) = match op {
            BinaryOp::And => (body, Vec::new()),
            _ => (Vec::new(), body),
        };
        self.builder.emit(Inst::If {
            cond: l.reg,
            then_body,
            else_body,
        });
        Some(result)
    }

    fn logical_operand(&mut self, op: Operand, node: NodeId) -> Option<Operand> {
        if op.ty.is_scalar() {
            Some(self.builder.convert(op, Ty::BOOL))
        } else {
            self.error(
                ErrorKind::Semantic,
                node,
                format!("logical operators need scalar operands, found {}", op.ty),
            );
            None
        }
    }

    fn unary(&mut self, id: NodeId, op: UnaryOp, v: Operand) -> Option<Operand> {
        let ty = match op {
            UnaryOp::Neg | UnaryOp::Plus if v.ty.is_numeric() => Some(v.ty),
            UnaryOp::Not if v.ty.is_scalar() => Some(Ty::BOOL),
            UnaryOp::BitNot if v.ty.is_integer_scalar() => Some(v.ty),
            _ => None,
        };
        let Some(ty) = ty else {
            self.error(
                ErrorKind::Semantic,
                id,
                format!("operator '{}' cannot be applied to {}", op.as_str(), v.ty),
            );
            return None;
        };
        let ty = if ty == Ty::BOOL && op != UnaryOp::Not {
            Ty::INT32
        } else {
            ty
        };
        let v = self.builder.convert(v, ty);
        Some(self.builder.unary(op, v, ty))
    }

    // ── Assignment ──

    fn crement(&mut self, id: NodeId, op: CrementOp, post: bool, target: NodeId) -> Option<Operand> {
        let place = self.place(target)?;
        let ty = place.ty();
        if !ty.is_scalar() || ty == Ty::BOOL {
            self.error(
                ErrorKind::Semantic,
                id,
                format!("cannot increment or decrement {}", ty),
            );
            return None;
        }
        let current = self.load(&place);
        let old = post.then(|| {
            let old = self.builder.alloc(ty);
            self.builder.assign(old, current);
            old
        });
        let one = self.builder.convert_value(Value::Int32(1), ty);
        let op = match op {
            CrementOp::Increment => BinaryOp::Add,
            CrementOp::Decrement => BinaryOp::Sub,
        };
        let new = self.builder.binary(op, current, one, ty);
        self.store(&place, new);
        Some(old.unwrap_or(new))
    }

    fn assign(
        &mut self,
        id: NodeId,
        target: NodeId,
        value: NodeId,
        compound: Option<BinaryOp>,
    ) -> Option<Operand> {
        let place = self.place(target)?;
        let v = self.expr(value)?;
        let v = match compound {
            Some(op) => {
                let current = self.load(&place);
                self.binary_values(id, op, current, v)?
            }
            None => v,
        };
        let stored = self.coerce(v, place.ty(), value)?;
        self.store(&place, stored);
        Some(stored)
    }

    pub(crate) fn place(&mut self, id: NodeId) -> Option<Place> {
        let tree = self.tree;
        match tree.get(id)? {
            Node::Local { name } => match self.lookup_local(name) {
                Some(op) => Some(Place::Local(op)),
                None => {
                    self.error(
                        ErrorKind::Declaration,
                        id,
                        format!("local '{}' is not declared", name),
                    );
                    None
                }
            },
            Node::Attribute { name, ty, .. } => {
                let slot = self.attribute_slot(id, name, *ty, true)?;
                Some(Place::Attr { slot, ty: *ty })
            }
            Node::ArrayUnpack {
                array,
                index,
                index2,
            } => {
                let base = self.place(*array)?;
                let container = self.load(&base);
                let index = self.component_index(container, *index, *index2, id)?;
                Some(Place::Component {
                    base: Box::new(base),
                    container,
                    index,
                })
            }
            _ => {
                self.error(
                    ErrorKind::Semantic,
                    id,
                    "expression is not assignable".to_string(),
                );
                None
            }
        }
    }

    fn load(&mut self, place: &Place) -> Operand {
        match place {
            Place::Local(op) => *op,
            Place::Attr { slot, ty } => self.builder.read_attr(*slot, *ty),
            Place::Component {
                container, index, ..
            } => self.builder.extract(*container, *index),
        }
    }

    /// Store `value`, already of the place's type.
    fn store(&mut self, place: &Place, value: Operand) {
        match place {
            Place::Local(op) => self.builder.assign(*op, value),
            Place::Attr { slot, .. } => self.builder.write_attr(*slot, value),
            Place::Component {
                base,
                container,
                index,
            } => {
                self.builder.insert(*container, *index, value);
                match base.as_ref() {
                    Place::Local(op) if op.reg == container.reg => {}
                    base => self.store(base, *container),
                }
            }
        }
    }

    // ── Arrays ──

    fn pack(&mut self, id: NodeId, items: &[NodeId]) -> Option<Operand> {
        let mut ops = Vec::with_capacity(items.len());
        for &item in items {
            ops.push(self.expr(item)?);
        }
        let elem = ops
            .iter()
            .map(|o| match o.ty {
                Ty::Scalar(s) => Some(s),
                _ => None,
            })
            .collect::<Option<Vec<ScalarTy>>>()
            .and_then(|elems| elems.into_iter().max());
        let ty = elem.and_then(|e| Ty::array_of(e, ops.len()));
        let Some(ty) = ty else {
            self.error(
                ErrorKind::Semantic,
                id,
                format!(
                    "cannot pack {} component(s); arrays hold 2, 3, 4, 9 or 16 scalars",
                    ops.len()
                ),
            );
            return None;
        };
        let elem = ty.element().map_or(Ty::Void, Ty::Scalar);
        let items: Vec<Operand> = ops
            .into_iter()
            .map(|o| self.builder.convert(o, elem))
            .collect();
        Some(self.builder.pack(&items, ty))
    }

    /// Flat component index into `container` as an int32 operand.
    pub(crate) fn component_index(
        &mut self,
        container: Operand,
        index: NodeId,
        index2: Option<NodeId>,
        id: NodeId,
    ) -> Option<Operand> {
        let (limit, dim) = match (container.ty, index2) {
            (Ty::Vector(_, n), None) => (n as i64, None),
            (Ty::Matrix(_, n), None) => ((n as i64) * (n as i64), None),
            (Ty::Matrix(_, n), Some(_)) => (n as i64, Some(n as i32)),
            (ty, _) => {
                self.error(
                    ErrorKind::Semantic,
                    id,
                    format!(
                        "cannot index into {} with {} index(es)",
                        ty,
                        1 + index2.iter().count()
                    ),
                );
                return None;
            }
        };
        let i = self.index_operand(index, limit)?;
        match (dim, index2) {
            (Some(dim), Some(col)) => {
                let j = self.index_operand(col, limit)?;
                let dim = self.builder.int(dim);
                let row = self.builder.binary(BinaryOp::Mul, i, dim, Ty::INT32);
                Some(self.builder.binary(BinaryOp::Add, row, j, Ty::INT32))
            }
            _ => Some(i),
        }
    }

    fn index_operand(&mut self, index: NodeId, limit: i64) -> Option<Operand> {
        let constant = match self.tree.get(index) {
            Some(Node::Value(Literal::Int16(v))) => Some(*v as i64),
            Some(Node::Value(Literal::Int32(v))) => Some(*v as i64),
            Some(Node::Value(Literal::Int64(v))) => Some(*v),
            _ => None,
        };
        if let Some(v) = constant {
            if !(0..limit).contains(&v) {
                self.error(
                    ErrorKind::Semantic,
                    index,
                    format!("index {} is out of range 0..{}", v, limit),
                );
                return None;
            }
        }
        let op = self.expr(index)?;
        if !op.ty.is_integer_scalar() {
            self.error(
                ErrorKind::Semantic,
                index,
                format!("array index must be an integer, found {}", op.ty),
            );
            return None;
        }
        Some(self.builder.convert(op, Ty::INT32))
    }
}
