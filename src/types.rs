//! Value types of the language and the conversion rules between them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Scalar element kinds, declared in promotion rank order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ScalarTy {
    Bool,
    Int16,
    Int32,
    Int64,
    Float,
    Double,
}

impl ScalarTy {
    pub fn is_integer(self) -> bool {
        matches!(self, ScalarTy::Int16 | ScalarTy::Int32 | ScalarTy::Int64)
    }

    pub fn is_floating(self) -> bool {
        matches!(self, ScalarTy::Float | ScalarTy::Double)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScalarTy::Bool => "bool",
            ScalarTy::Int16 => "int16",
            ScalarTy::Int32 => "int32",
            ScalarTy::Int64 => "int64",
            ScalarTy::Float => "float",
            ScalarTy::Double => "double",
        }
    }

    /// Element kind used when this scalar becomes a vector component.
    fn vector_element(self) -> ScalarTy {
        match self {
            ScalarTy::Float => ScalarTy::Float,
            ScalarTy::Double => ScalarTy::Double,
            _ => ScalarTy::Int32,
        }
    }

    /// Element kind used when this scalar becomes a matrix entry.
    fn matrix_element(self) -> ScalarTy {
        match self {
            ScalarTy::Double => ScalarTy::Double,
            _ => ScalarTy::Float,
        }
    }

    fn suffix(self) -> char {
        match self {
            ScalarTy::Double => 'd',
            ScalarTy::Float => 'f',
            _ => 'i',
        }
    }
}

/// Semantic type of an expression, attribute or volume.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ty {
    Scalar(ScalarTy),
    /// 2, 3 or 4 components of int32, float or double.
    Vector(ScalarTy, u8),
    /// 3x3 or 4x4 entries of float or double, row-major.
    Matrix(ScalarTy, u8),
    Str,
    Void,
}

impl Ty {
    pub const BOOL: Ty = Ty::Scalar(ScalarTy::Bool);
    pub const INT16: Ty = Ty::Scalar(ScalarTy::Int16);
    pub const INT32: Ty = Ty::Scalar(ScalarTy::Int32);
    pub const INT64: Ty = Ty::Scalar(ScalarTy::Int64);
    pub const FLOAT: Ty = Ty::Scalar(ScalarTy::Float);
    pub const DOUBLE: Ty = Ty::Scalar(ScalarTy::Double);
    pub const VEC2I: Ty = Ty::Vector(ScalarTy::Int32, 2);
    pub const VEC2F: Ty = Ty::Vector(ScalarTy::Float, 2);
    pub const VEC2D: Ty = Ty::Vector(ScalarTy::Double, 2);
    pub const VEC3I: Ty = Ty::Vector(ScalarTy::Int32, 3);
    pub const VEC3F: Ty = Ty::Vector(ScalarTy::Float, 3);
    pub const VEC3D: Ty = Ty::Vector(ScalarTy::Double, 3);
    pub const VEC4I: Ty = Ty::Vector(ScalarTy::Int32, 4);
    pub const VEC4F: Ty = Ty::Vector(ScalarTy::Float, 4);
    pub const VEC4D: Ty = Ty::Vector(ScalarTy::Double, 4);
    pub const MAT3F: Ty = Ty::Matrix(ScalarTy::Float, 3);
    pub const MAT3D: Ty = Ty::Matrix(ScalarTy::Double, 3);
    pub const MAT4F: Ty = Ty::Matrix(ScalarTy::Float, 4);
    pub const MAT4D: Ty = Ty::Matrix(ScalarTy::Double, 4);

    /// Build a vector type, normalizing the element kind.
    pub fn vector(elem: ScalarTy, size: u8) -> Option<Ty> {
        (2..=4)
            .contains(&size)
            .then(|| Ty::Vector(elem.vector_element(), size))
    }

    /// Build a square matrix type, normalizing the element kind.
    pub fn matrix(elem: ScalarTy, dim: u8) -> Option<Ty> {
        (dim == 3 || dim == 4).then(|| Ty::Matrix(elem.matrix_element(), dim))
    }

    /// Array type holding `count` components: vectors for 2..=4, matrices for 9 and 16.
    pub fn array_of(elem: ScalarTy, count: usize) -> Option<Ty> {
        match count {
            2..=4 => Ty::vector(elem, count as u8),
            9 => Ty::matrix(elem, 3),
            16 => Ty::matrix(elem, 4),
            _ => None,
        }
    }

    pub fn element(&self) -> Option<ScalarTy> {
        match self {
            Ty::Scalar(s) | Ty::Vector(s, _) | Ty::Matrix(s, _) => Some(*s),
            Ty::Str | Ty::Void => None,
        }
    }

    /// Number of scalar components: 1 for scalars, 0 for string/void.
    pub fn component_count(&self) -> usize {
        match self {
            Ty::Scalar(_) => 1,
            Ty::Vector(_, n) => *n as usize,
            Ty::Matrix(_, n) => (*n as usize) * (*n as usize),
            Ty::Str | Ty::Void => 0,
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Ty::Scalar(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Ty::Vector(..) | Ty::Matrix(..))
    }

    pub fn is_numeric(&self) -> bool {
        self.element().is_some()
    }

    pub fn is_integer_scalar(&self) -> bool {
        matches!(self, Ty::Scalar(s) if s.is_integer() || *s == ScalarTy::Bool)
    }

    /// Same shape with a different element kind.
    pub fn with_element(&self, elem: ScalarTy) -> Ty {
        match self {
            Ty::Scalar(_) => Ty::Scalar(elem),
            Ty::Vector(_, n) => Ty::Vector(elem.vector_element(), *n),
            Ty::Matrix(_, n) => Ty::Matrix(elem.matrix_element(), *n),
            other => *other,
        }
    }

    /// Look up a type by its source spelling (`float`, `vec3f`, `mat4d`, ...).
    pub fn from_name(name: &str) -> Option<Ty> {
        let ty = match name {
            "bool" => Ty::BOOL,
            "int16" | "short" => Ty::INT16,
            "int32" | "int" => Ty::INT32,
            "int64" | "long" => Ty::INT64,
            "float" => Ty::FLOAT,
            "double" => Ty::DOUBLE,
            "string" => Ty::Str,
            "void" => Ty::Void,
            "vec2i" => Ty::VEC2I,
            "vec2f" => Ty::VEC2F,
            "vec2d" => Ty::VEC2D,
            "vec3i" => Ty::VEC3I,
            "vec3f" => Ty::VEC3F,
            "vec3d" => Ty::VEC3D,
            "vec4i" => Ty::VEC4I,
            "vec4f" => Ty::VEC4F,
            "vec4d" => Ty::VEC4D,
            "mat3f" => Ty::MAT3F,
            "mat3d" => Ty::MAT3D,
            "mat4f" => Ty::MAT4F,
            "mat4d" => Ty::MAT4D,
            _ => return None,
        };
        Some(ty)
    }

    /// Whether a value of this type may be assigned to `target` without a cast.
    pub fn implicitly_converts_to(&self, target: &Ty) -> bool {
        match (self, target) {
            (a, b) if a == b => true,
            (Ty::Scalar(_), Ty::Scalar(_)) => true,
            (Ty::Scalar(_), Ty::Vector(..) | Ty::Matrix(..)) => true,
            (Ty::Vector(_, a), Ty::Vector(_, b)) => a == b,
            (Ty::Matrix(_, a), Ty::Matrix(_, b)) => a == b,
            _ => false,
        }
    }

    /// Parameter-passing variant of [`Ty::implicitly_converts_to`]: an array
    /// argument only converts to a differently typed array parameter when
    /// the callee promises not to write through it.
    pub fn converts_to_parameter(&self, param: &Ty, readonly: bool) -> bool {
        if self == param {
            return true;
        }
        match (self, param) {
            (Ty::Vector(..), Ty::Vector(..)) | (Ty::Matrix(..), Ty::Matrix(..)) => {
                readonly && self.implicitly_converts_to(param)
            }
            _ => self.implicitly_converts_to(param),
        }
    }

    /// Operand type both sides of an arithmetic or equality operator are
    /// promoted to, or `None` if the shapes are incompatible.
    pub fn common(lhs: &Ty, rhs: &Ty) -> Option<Ty> {
        match (lhs, rhs) {
            (Ty::Str, Ty::Str) => Some(Ty::Str),
            (Ty::Scalar(a), Ty::Scalar(b)) => Some(Ty::Scalar((*a).max(*b))),
            (Ty::Scalar(s), arr @ (Ty::Vector(..) | Ty::Matrix(..)))
            | (arr @ (Ty::Vector(..) | Ty::Matrix(..)), Ty::Scalar(s)) => {
                let elem = arr.element()?.max(*s);
                Some(arr.with_element(elem))
            }
            (Ty::Vector(a, n), Ty::Vector(b, m)) if n == m => Some(Ty::Vector((*a).max(*b), *n)),
            (Ty::Matrix(a, n), Ty::Matrix(b, m)) if n == m => Some(Ty::Matrix((*a).max(*b), *n)),
            _ => None,
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Scalar(s) => f.write_str(s.as_str()),
            Ty::Vector(s, n) => write!(f, "vec{}{}", n, s.suffix()),
            Ty::Matrix(s, n) => write!(f, "mat{}{}", n, s.suffix()),
            Ty::Str => f.write_str("string"),
            Ty::Void => f.write_str("void"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_round_trips_through_from_name() {
        for ty in [
            Ty::BOOL,
            Ty::INT16,
            Ty::INT64,
            Ty::DOUBLE,
            Ty::VEC2I,
            Ty::VEC3F,
            Ty::VEC4D,
            Ty::MAT3F,
            Ty::MAT4D,
            Ty::Str,
        ] {
            assert_eq!(Ty::from_name(&ty.to_string()), Some(ty));
        }
    }

    #[test]
    fn test_vector_element_is_normalized() {
        assert_eq!(Ty::vector(ScalarTy::Int64, 3), Some(Ty::VEC3I));
        assert_eq!(Ty::vector(ScalarTy::Bool, 2), Some(Ty::VEC2I));
        assert_eq!(Ty::matrix(ScalarTy::Int32, 4), Some(Ty::MAT4F));
        assert_eq!(Ty::vector(ScalarTy::Float, 5), None);
        assert_eq!(Ty::array_of(ScalarTy::Double, 9), Some(Ty::MAT3D));
    }

    #[test]
    fn test_scalar_conversions_are_implicit() {
        assert!(Ty::INT16.implicitly_converts_to(&Ty::INT32));
        assert!(Ty::DOUBLE.implicitly_converts_to(&Ty::BOOL));
        assert!(Ty::FLOAT.implicitly_converts_to(&Ty::VEC3D));
        assert!(!Ty::VEC3F.implicitly_converts_to(&Ty::FLOAT));
        assert!(!Ty::Str.implicitly_converts_to(&Ty::FLOAT));
        assert!(!Ty::VEC3F.implicitly_converts_to(&Ty::VEC4F));
    }

    #[test]
    fn test_array_parameters_need_readonly_for_conversion() {
        assert!(Ty::VEC3I.converts_to_parameter(&Ty::VEC3F, true));
        assert!(!Ty::VEC3I.converts_to_parameter(&Ty::VEC3F, false));
        assert!(Ty::VEC3F.converts_to_parameter(&Ty::VEC3F, false));
        assert!(Ty::INT32.converts_to_parameter(&Ty::VEC3F, false));
    }

    #[test]
    fn test_common_type() {
        assert_eq!(Ty::common(&Ty::INT32, &Ty::FLOAT), Some(Ty::FLOAT));
        assert_eq!(Ty::common(&Ty::VEC3I, &Ty::DOUBLE), Some(Ty::VEC3D));
        assert_eq!(Ty::common(&Ty::VEC3F, &Ty::VEC3D), Some(Ty::VEC3D));
        assert_eq!(Ty::common(&Ty::VEC3F, &Ty::VEC2F), None);
        assert_eq!(Ty::common(&Ty::Str, &Ty::INT32), None);
    }
}
