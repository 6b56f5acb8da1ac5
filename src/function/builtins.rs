//! The standard function library. Overload order within each group is
//! observable through resolution and must not be shuffled.

use super::{emitted, native, EmitFn, FunctionGroup, FunctionRegistry, NativeFn, Signature};
use crate::types::Ty;

const FLOATS: [Ty; 2] = [Ty::DOUBLE, Ty::FLOAT];
const SCALARS: [Ty; 3] = [Ty::INT32, Ty::DOUBLE, Ty::FLOAT];
const VECTORS: [Ty; 9] = [
    Ty::VEC2D,
    Ty::VEC2F,
    Ty::VEC2I,
    Ty::VEC3D,
    Ty::VEC3F,
    Ty::VEC3I,
    Ty::VEC4D,
    Ty::VEC4F,
    Ty::VEC4I,
];
const FLOAT_VECTORS: [Ty; 6] = [
    Ty::VEC2D,
    Ty::VEC2F,
    Ty::VEC3D,
    Ty::VEC3F,
    Ty::VEC4D,
    Ty::VEC4F,
];
const MATRICES: [Ty; 4] = [Ty::MAT3F, Ty::MAT3D, Ty::MAT4F, Ty::MAT4D];

fn scalar_of(ty: Ty) -> Ty {
    ty.element().map_or(Ty::Void, Ty::Scalar)
}

/// `name(T) -> T` for each floating type, double first.
fn float_unary(name: &str, doc: &'static str, func: NativeFn) -> FunctionGroup {
    FLOATS
        .iter()
        .fold(FunctionGroup::new(name), |g, &t| g.native(vec![t], t, func))
        .with_doc(doc)
}

pub(super) fn standard_library() -> FunctionRegistry {
    let mut reg = FunctionRegistry::new();

    // ── Native scalar math ──
    reg.insert(
        [Ty::INT32, Ty::INT64, Ty::FLOAT, Ty::DOUBLE]
            .iter()
            .fold(FunctionGroup::new("abs"), |g, &t| g.native(vec![t], t, native::abs))
            .with_doc("Absolute value."),
    );
    reg.insert(float_unary("sqrt", "Square root.", native::sqrt));
    reg.insert(float_unary("sin", "Sine of an angle in radians.", native::sin));
    reg.insert(float_unary("cos", "Cosine of an angle in radians.", native::cos));
    reg.insert(float_unary("tan", "Tangent of an angle in radians.", native::tan));
    reg.insert(float_unary("exp", "e raised to the argument.", native::exp));
    reg.insert(float_unary("log", "Natural logarithm.", native::log));
    reg.insert(float_unary("floor", "Round down.", native::floor));
    reg.insert(float_unary("ceil", "Round up.", native::ceil));
    reg.insert(float_unary("round", "Round half away from zero.", native::round));
    reg.insert(
        FLOATS
            .iter()
            .fold(FunctionGroup::new("pow"), |g, &t| {
                g.native(vec![t, t], t, native::pow)
            })
            .with_doc("First argument raised to the second."),
    );
    let min_max: [(&str, NativeFn, &'static str); 2] = [
        ("min", native::min, "Smaller of two values."),
        ("max", native::max, "Larger of two values."),
    ];
    for (name, func, doc) in min_max {
        reg.insert(
            SCALARS
                .iter()
                .fold(FunctionGroup::new(name), |g, &t| g.native(vec![t, t], t, func))
                .with_doc(doc),
        );
    }
    reg.insert(
        SCALARS
            .iter()
            .fold(FunctionGroup::new("clamp"), |g, &t| {
                g.native(vec![t, t, t], t, native::clamp)
            })
            .with_doc("Restrict a value to [min, max]."),
    );
    reg.insert(
        FLOATS
            .iter()
            .fold(FunctionGroup::new("lerp"), |g, &t| {
                g.native(vec![t, t, t], t, native::lerp)
            })
            .with_doc("Linear interpolation between two values."),
    );
    reg.insert(
        FunctionGroup::new("fit")
            .native(vec![Ty::DOUBLE; 5], Ty::DOUBLE, native::fit)
            .with_doc("Remap a value from one range to another, clamping to the source range."),
    );
    reg.insert(
        MATRICES
            .iter()
            .fold(FunctionGroup::new("mmmult"), |g, &t| {
                g.native(vec![t, t], t, native::mmmult)
            })
            .with_doc("Matrix product."),
    );
    reg.insert(
        [Ty::INT32, Ty::INT64, Ty::FLOAT, Ty::DOUBLE, Ty::Str, Ty::VEC3F]
            .iter()
            .fold(FunctionGroup::new("print"), |g, &t| {
                g.native(vec![t], Ty::Void, native::print)
            })
            .with_doc("Log a value."),
    );

    // ── Emitted vector and matrix functions ──
    reg.insert(
        VECTORS
            .iter()
            .fold(FunctionGroup::new("dot"), |g, &t| {
                g.emitted(Signature::new(vec![t, t], scalar_of(t)).readonly(), emitted::dot)
            })
            .with_doc("Dot product."),
    );
    reg.insert(
        [Ty::VEC3D, Ty::VEC3F, Ty::VEC3I]
            .iter()
            .fold(FunctionGroup::new("cross"), |g, &t| {
                g.emitted(Signature::new(vec![t, t], t).readonly(), emitted::cross)
            })
            .with_doc("Cross product."),
    );
    let lengths: [(&str, EmitFn, &'static str); 2] = [
        ("length", emitted::length, "Euclidean length."),
        ("lengthsq", emitted::lengthsq, "Squared euclidean length."),
    ];
    for (name, func, doc) in lengths {
        reg.insert(
            FLOAT_VECTORS
                .iter()
                .fold(FunctionGroup::new(name), |g, &t| {
                    g.emitted(Signature::new(vec![t], scalar_of(t)).readonly(), func)
                })
                .with_doc(doc),
        );
    }
    reg.insert(
        FLOAT_VECTORS
            .iter()
            .fold(FunctionGroup::new("normalize"), |g, &t| {
                g.emitted(Signature::new(vec![t], t).readonly(), emitted::normalize)
            })
            .with_doc("Unit vector in the same direction; zero stays zero."),
    );
    reg.insert(
        MATRICES
            .iter()
            .fold(FunctionGroup::new("transpose"), |g, &t| {
                g.emitted(Signature::new(vec![t], t).readonly(), emitted::transpose)
            })
            .with_doc("Matrix transpose."),
    );

    // ── Volume intrinsics ──
    let coords: [(&str, EmitFn, &'static str); 3] = [
        ("getcoordx", emitted::getcoordx, "X index of the current voxel."),
        ("getcoordy", emitted::getcoordy, "Y index of the current voxel."),
        ("getcoordz", emitted::getcoordz, "Z index of the current voxel."),
    ];
    for (name, func, doc) in coords {
        reg.insert(
            FunctionGroup::new(name)
                .emitted(Signature::new(Vec::new(), Ty::INT32), func)
                .volume_only()
                .with_doc(doc),
        );
    }
    reg.insert(
        FunctionGroup::new("getvoxelpws")
            .emitted(Signature::new(Vec::new(), Ty::VEC3F), emitted::getvoxelpws)
            .volume_only()
            .with_doc("World-space position of the current voxel center."),
    );

    reg
}
