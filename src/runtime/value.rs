//! Runtime values and the operator semantics shared by the backend and the
//! constant folder.

use std::fmt;

use crate::ast::{BinaryOp, Literal, UnaryOp};
use crate::types::{ScalarTy, Ty};

/// A typed runtime value. Vector and matrix components are scalars of one
/// element kind; matrices are row-major.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float(f32),
    Double(f64),
    Vector(Vec<Value>),
    Matrix(Vec<Value>),
    Str(String),
    Void,
}

impl From<&Literal> for Value {
    fn from(lit: &Literal) -> Self {
        match lit {
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Int16(v) => Value::Int16(*v),
            Literal::Int32(v) => Value::Int32(*v),
            Literal::Int64(v) => Value::Int64(*v),
            Literal::Float(v) => Value::Float(*v),
            Literal::Double(v) => Value::Double(*v),
            Literal::Str(s) => Value::Str(s.clone()),
        }
    }
}

impl Value {
    /// The zero value of `ty`: false, 0, empty string, zero components.
    pub fn zero(ty: &Ty) -> Value {
        match ty {
            Ty::Scalar(s) => Value::from_f64(*s, 0.0),
            Ty::Vector(s, n) => Value::Vector(vec![Value::from_f64(*s, 0.0); *n as usize]),
            Ty::Matrix(s, n) => {
                Value::Matrix(vec![Value::from_f64(*s, 0.0); (*n as usize) * (*n as usize)])
            }
            Ty::Str => Value::Str(String::new()),
            Ty::Void => Value::Void,
        }
    }

    pub fn vec3f(x: f32, y: f32, z: f32) -> Value {
        Value::Vector(vec![Value::Float(x), Value::Float(y), Value::Float(z)])
    }

    pub fn vec3d(x: f64, y: f64, z: f64) -> Value {
        Value::Vector(vec![Value::Double(x), Value::Double(y), Value::Double(z)])
    }

    pub fn vec3i(x: i32, y: i32, z: i32) -> Value {
        Value::Vector(vec![Value::Int32(x), Value::Int32(y), Value::Int32(z)])
    }

    pub fn scalar_ty(&self) -> Option<ScalarTy> {
        match self {
            Value::Bool(_) => Some(ScalarTy::Bool),
            Value::Int16(_) => Some(ScalarTy::Int16),
            Value::Int32(_) => Some(ScalarTy::Int32),
            Value::Int64(_) => Some(ScalarTy::Int64),
            Value::Float(_) => Some(ScalarTy::Float),
            Value::Double(_) => Some(ScalarTy::Double),
            _ => None,
        }
    }

    pub fn ty(&self) -> Ty {
        let elem = |c: &[Value]| {
            c.first()
                .and_then(Value::scalar_ty)
                .unwrap_or(ScalarTy::Float)
        };
        match self {
            Value::Vector(c) => Ty::Vector(elem(c), c.len() as u8),
            Value::Matrix(c) => {
                let dim = if c.len() == 16 { 4 } else { 3 };
                Ty::Matrix(elem(c), dim)
            }
            Value::Str(_) => Ty::Str,
            Value::Void => Ty::Void,
            scalar => scalar.scalar_ty().map(Ty::Scalar).unwrap_or(Ty::Void),
        }
    }

    /// Components of a vector or matrix; a scalar is its own single component.
    pub fn components(&self) -> &[Value] {
        match self {
            Value::Vector(c) | Value::Matrix(c) => c,
            other => std::slice::from_ref(other),
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            Value::Bool(b) => *b as i32 as f64,
            Value::Int16(v) => *v as f64,
            Value::Int32(v) => *v as f64,
            Value::Int64(v) => *v as f64,
            Value::Float(v) => *v as f64,
            Value::Double(v) => *v,
            _ => 0.0,
        }
    }

    pub fn as_i64(&self) -> i64 {
        match self {
            Value::Bool(b) => *b as i64,
            Value::Int16(v) => *v as i64,
            Value::Int32(v) => *v as i64,
            Value::Int64(v) => *v,
            Value::Float(v) => *v as i64,
            Value::Double(v) => *v as i64,
            _ => 0,
        }
    }

    /// Scalar truthiness: non-zero.
    pub fn as_bool(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Float(v) => *v != 0.0,
            Value::Double(v) => *v != 0.0,
            Value::Str(s) => !s.is_empty(),
            other => other.as_i64() != 0,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    fn from_f64(ty: ScalarTy, v: f64) -> Value {
        match ty {
            ScalarTy::Bool => Value::Bool(v != 0.0),
            ScalarTy::Int16 => Value::Int16(v as i16),
            ScalarTy::Int32 => Value::Int32(v as i32),
            ScalarTy::Int64 => Value::Int64(v as i64),
            ScalarTy::Float => Value::Float(v as f32),
            ScalarTy::Double => Value::Double(v),
        }
    }

    fn from_i64(ty: ScalarTy, v: i64) -> Value {
        match ty {
            ScalarTy::Bool => Value::Bool(v != 0),
            ScalarTy::Int16 => Value::Int16(v as i16),
            ScalarTy::Int32 => Value::Int32(v as i32),
            ScalarTy::Int64 => Value::Int64(v),
            ScalarTy::Float => Value::Float(v as f32),
            ScalarTy::Double => Value::Double(v as f64),
        }
    }

    fn cast_scalar(&self, to: ScalarTy) -> Value {
        match self {
            Value::Float(_) | Value::Double(_) => Value::from_f64(to, self.as_f64()),
            Value::Bool(b) if to == ScalarTy::Bool => Value::Bool(*b),
            _ => Value::from_i64(to, self.as_i64()),
        }
    }

    /// Convert to `to` following the implicit conversion rules; `None` when
    /// the shapes are incompatible.
    pub fn convert(&self, to: &Ty) -> Option<Value> {
        if self.ty() == *to {
            return Some(self.clone());
        }
        match (self, to) {
            (Value::Vector(c), Ty::Vector(s, n)) if c.len() == *n as usize => {
                Some(Value::Vector(c.iter().map(|v| v.cast_scalar(*s)).collect()))
            }
            (Value::Matrix(c), Ty::Matrix(s, n)) if c.len() == (*n as usize).pow(2) => {
                Some(Value::Matrix(c.iter().map(|v| v.cast_scalar(*s)).collect()))
            }
            (Value::Vector(_) | Value::Matrix(_) | Value::Str(_) | Value::Void, _) => None,
            (scalar, Ty::Scalar(s)) => Some(scalar.cast_scalar(*s)),
            (scalar, Ty::Vector(s, n)) => {
                Some(Value::Vector(vec![scalar.cast_scalar(*s); *n as usize]))
            }
            (scalar, Ty::Matrix(s, n)) => {
                let dim = *n as usize;
                let zero = Value::from_f64(*s, 0.0);
                let diag = scalar.cast_scalar(*s);
                Some(Value::Matrix(
                    (0..dim * dim)
                        .map(|i| {
                            if i / dim == i % dim {
                                diag.clone()
                            } else {
                                zero.clone()
                            }
                        })
                        .collect(),
                ))
            }
            _ => None,
        }
    }

    /// Apply a binary operator to two operands already promoted to the same
    /// type. Comparisons yield `Bool`; logical operators use truthiness.
    pub fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Value {
        match op {
            BinaryOp::Eq => Value::Bool(lhs == rhs),
            BinaryOp::Ne => Value::Bool(lhs != rhs),
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                Value::Bool(compare(op, lhs, rhs))
            }
            BinaryOp::And => Value::Bool(lhs.as_bool() && rhs.as_bool()),
            BinaryOp::Or => Value::Bool(lhs.as_bool() || rhs.as_bool()),
            _ => match (lhs, rhs) {
                (Value::Vector(a), Value::Vector(b)) => Value::Vector(zip_with(op, a, b)),
                (Value::Matrix(a), Value::Matrix(b)) => Value::Matrix(zip_with(op, a, b)),
                (a, b) => scalar_arith(op, a, b),
            },
        }
    }

    pub fn unary(op: UnaryOp, operand: &Value) -> Value {
        match (op, operand) {
            (UnaryOp::Plus, v) => v.clone(),
            (UnaryOp::Not, v) => Value::Bool(!v.as_bool()),
            (op, Value::Vector(c)) => Value::Vector(c.iter().map(|v| Value::unary(op, v)).collect()),
            (op, Value::Matrix(c)) => Value::Matrix(c.iter().map(|v| Value::unary(op, v)).collect()),
            (UnaryOp::Neg, Value::Float(v)) => Value::Float(-v),
            (UnaryOp::Neg, Value::Double(v)) => Value::Double(-v),
            (UnaryOp::Neg, v) => match v.scalar_ty() {
                Some(s) => Value::from_i64(s, v.as_i64().wrapping_neg()),
                None => v.clone(),
            },
            (UnaryOp::BitNot, v) => match v.scalar_ty() {
                Some(s) if s.is_integer() => Value::from_i64(s, !v.as_i64()),
                _ => v.clone(),
            },
        }
    }

    /// Assemble components into the array type `ty`.
    pub fn pack(items: Vec<Value>, ty: &Ty) -> Value {
        match ty {
            Ty::Matrix(..) => Value::Matrix(items),
            _ => Value::Vector(items),
        }
    }

    /// Component `index`, or `None` when out of range or not an array.
    pub fn extract(&self, index: usize) -> Option<Value> {
        match self {
            Value::Vector(c) | Value::Matrix(c) => c.get(index).cloned(),
            _ => None,
        }
    }

    /// Copy of `self` with component `index` replaced; unchanged when out of range.
    pub fn insert(&self, index: usize, component: Value) -> Value {
        let mut out = self.clone();
        if let Value::Vector(c) | Value::Matrix(c) = &mut out {
            if let Some(slot) = c.get_mut(index) {
                *slot = component;
            }
        }
        out
    }
}

fn zip_with(op: BinaryOp, a: &[Value], b: &[Value]) -> Vec<Value> {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| scalar_arith(op, x, y))
        .collect()
}

fn compare(op: BinaryOp, lhs: &Value, rhs: &Value) -> bool {
    let ord = match (lhs, rhs) {
        (Value::Float(_) | Value::Double(_), _) | (_, Value::Float(_) | Value::Double(_)) => {
            lhs.as_f64().partial_cmp(&rhs.as_f64())
        }
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        _ => Some(lhs.as_i64().cmp(&rhs.as_i64())),
    };
    let Some(ord) = ord else {
        return false;
    };
    match op {
        BinaryOp::Lt => ord.is_lt(),
        BinaryOp::Le => ord.is_le(),
        BinaryOp::Gt => ord.is_gt(),
        BinaryOp::Ge => ord.is_ge(),
        _ => false,
    }
}

fn scalar_arith(op: BinaryOp, lhs: &Value, rhs: &Value) -> Value {
    let Some(ty) = lhs.scalar_ty() else {
        return lhs.clone();
    };
    if ty.is_floating() {
        let (a, b) = (lhs.as_f64(), rhs.as_f64());
        let v = match op {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            BinaryOp::Rem => a % b,
            _ => return lhs.clone(),
        };
        return Value::from_f64(ty, v);
    }
    let (a, b) = (lhs.as_i64(), rhs.as_i64());
    let bits = match ty {
        ScalarTy::Int16 => 16,
        ScalarTy::Int64 => 64,
        _ => 32,
    };
    let v = match op {
        BinaryOp::Add => a.wrapping_add(b),
        BinaryOp::Sub => a.wrapping_sub(b),
        BinaryOp::Mul => a.wrapping_mul(b),
        BinaryOp::Div if b == 0 => 0,
        BinaryOp::Div => a.wrapping_div(b),
        BinaryOp::Rem if b == 0 => 0,
        BinaryOp::Rem => a.wrapping_rem(b),
        BinaryOp::BitAnd => a & b,
        BinaryOp::BitOr => a | b,
        BinaryOp::BitXor => a ^ b,
        BinaryOp::Shl => a.wrapping_shl(b.rem_euclid(bits) as u32),
        BinaryOp::Shr => a.wrapping_shr(b.rem_euclid(bits) as u32),
        _ => return lhs.clone(),
    };
    let ty = if ty == ScalarTy::Bool {
        ScalarTy::Int32
    } else {
        ty
    };
    Value::from_i64(ty, v)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int16(v) => write!(f, "{}", v),
            Value::Int32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{:?}", v),
            Value::Double(v) => write!(f, "{:?}", v),
            Value::Vector(c) | Value::Matrix(c) => {
                write!(f, "[")?;
                for (i, v) in c.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::Str(s) => write!(f, "{}", s),
            Value::Void => write!(f, "void"),
        }
    }
}
