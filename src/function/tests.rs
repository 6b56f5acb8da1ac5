use std::sync::Arc;

use super::*;
use crate::registry::TargetKind;

fn noop(_: &[Value]) -> Value {
    Value::Void
}

fn group(name: &str, overloads: &[&[Ty]]) -> FunctionGroup {
    overloads.iter().fold(FunctionGroup::new(name), |g, params| {
        g.native(params.to_vec(), Ty::Void, noop)
    })
}

#[test]
fn test_first_implicit_match_wins() {
    let f = group("f", &[&[Ty::INT32], &[Ty::FLOAT]]);
    let resolved = f.resolve(&[Ty::INT16]).unwrap();
    assert_eq!(resolved.tier, MatchTier::Implicit);
    assert_eq!(resolved.index, 0);
    assert_eq!(resolved.function.signature.params, vec![Ty::INT32]);
}

#[test]
fn test_explicit_beats_earlier_implicit() {
    let f = group("f", &[&[Ty::INT32], &[Ty::FLOAT]]);
    let resolved = f.resolve(&[Ty::FLOAT]).unwrap();
    assert_eq!(resolved.tier, MatchTier::Explicit);
    assert_eq!(resolved.index, 1);
}

#[test]
fn test_ints_resolve_implicitly_to_float_pair() {
    let g = group("g", &[&[Ty::FLOAT, Ty::FLOAT]]);
    let resolved = g.resolve(&[Ty::INT32, Ty::INT32]).unwrap();
    assert_eq!(resolved.tier, MatchTier::Implicit);
    assert_eq!(resolved.function.signature.params, vec![Ty::FLOAT, Ty::FLOAT]);
}

#[test]
fn test_size_and_none_tiers_are_distinguishable() {
    let f = group("f", &[&[Ty::INT32], &[Ty::FLOAT]]);

    let err = f.resolve(&[Ty::INT32, Ty::INT32]).unwrap_err();
    assert_eq!(err.tier, MatchTier::None);
    assert_eq!(err.candidates.len(), 2);
    assert_eq!(
        err.to_string(),
        "no overload of 'f' takes 2 argument(s): f(int32, int32)"
    );

    let err = f.resolve(&[Ty::Str]).unwrap_err();
    assert_eq!(err.tier, MatchTier::Size);
    assert_eq!(err.args, vec![Ty::Str]);
    assert_eq!(err.to_string(), "invalid argument types for f(string)");
}

#[test]
fn test_array_conversion_requires_readonly_parameter() {
    let writable = group("h", &[&[Ty::VEC3F]]);
    assert_eq!(
        writable.resolve(&[Ty::VEC3I]).unwrap_err().tier,
        MatchTier::Size
    );

    let readonly = FunctionGroup::new("h").emitted(
        Signature::new(vec![Ty::VEC3F], Ty::FLOAT).readonly(),
        |_, _| None,
    );
    assert_eq!(readonly.resolve(&[Ty::VEC3I]).unwrap().tier, MatchTier::Implicit);
    // Scalar broadcast does not need the flag.
    assert_eq!(writable.resolve(&[Ty::FLOAT]).unwrap().tier, MatchTier::Implicit);
}

#[test]
fn test_variadic_final_parameter() {
    let mut g = FunctionGroup::new("sum");
    g.push(
        Signature::new(vec![Ty::Str, Ty::FLOAT], Ty::Void).variadic(),
        FunctionImpl::Native(noop),
    );
    assert_eq!(g.resolve(&[Ty::Str, Ty::FLOAT]).unwrap().tier, MatchTier::Explicit);
    assert_eq!(
        g.resolve(&[Ty::Str, Ty::FLOAT, Ty::INT32, Ty::DOUBLE]).unwrap().tier,
        MatchTier::Implicit
    );
    assert_eq!(g.resolve(&[Ty::Str]).unwrap_err().tier, MatchTier::None);
    assert_eq!(
        g.resolve(&[Ty::Str, Ty::FLOAT, Ty::Str]).unwrap_err().tier,
        MatchTier::Size
    );
    assert_eq!(
        g.functions()[0].signature.to_string(),
        "(string, float...) -> void"
    );
}

#[test]
fn test_unknown_function_is_none_tier() {
    let reg = FunctionRegistry::new().with(group("f", &[&[Ty::INT32]]));
    let err = reg.resolve("g", &[Ty::INT32]).unwrap_err();
    assert_eq!(err.tier, MatchTier::None);
    assert!(err.candidates.is_empty());
}

#[test]
fn test_standard_library_is_shared() {
    let a = FunctionRegistry::standard();
    let b = FunctionRegistry::standard();
    assert!(Arc::ptr_eq(&a, &b));
    for name in ["abs", "sqrt", "pow", "fit", "mmmult", "print", "dot", "cross", "normalize"] {
        assert!(a.get(name).is_some(), "missing {}", name);
    }
    assert!(a.get("getcoordx").is_some_and(FunctionGroup::is_volume_only));
    assert!(!a.get("dot").is_some_and(FunctionGroup::is_volume_only));
}

#[test]
fn test_standard_overload_order() {
    let std = FunctionRegistry::standard();

    let abs = std.resolve("abs", &[Ty::INT16]).unwrap();
    assert_eq!((abs.tier, abs.index), (MatchTier::Implicit, 0));

    let sqrt = std.resolve("sqrt", &[Ty::INT32]).unwrap();
    assert_eq!(sqrt.function.signature.ret, Ty::DOUBLE);

    let dot = std.resolve("dot", &[Ty::VEC3I, Ty::VEC3F]).unwrap();
    assert_eq!(dot.function.signature.params, vec![Ty::VEC3D, Ty::VEC3D]);

    let dot = std.resolve("dot", &[Ty::VEC3F, Ty::VEC3F]).unwrap();
    assert_eq!(dot.tier, MatchTier::Explicit);
    assert_eq!(dot.function.signature.ret, Ty::FLOAT);
}

#[test]
fn test_emitted_builtins_return_declared_types() {
    let custom = CustomData::new();
    let std = FunctionRegistry::standard();
    for group in std.groups() {
        for function in group.functions() {
            let FunctionImpl::Emitted(emit) = function.implementation else {
                continue;
            };
            let mut builder = IrBuilder::new(TargetKind::Volumes, 0);
            let args: Vec<Operand> = function
                .signature
                .params
                .iter()
                .map(|ty| builder.alloc(*ty))
                .collect();
            let mut emitter = FunctionEmitter::new(&mut builder, &custom);
            let result = emit(&mut emitter, &args);
            assert_eq!(
                result.map(|o| o.ty),
                Some(function.signature.ret),
                "{}{}",
                group.name(),
                function.signature
            );
        }
    }
}

#[test]
fn test_emitter_exposes_custom_data() {
    fn scale(e: &mut FunctionEmitter<'_>, args: &[Operand]) -> Option<Operand> {
        let factor = e.custom_data().get("scale").cloned()?;
        let factor = e.convert_value(factor, args[0].ty);
        Some(e.binary(crate::ast::BinaryOp::Mul, args[0], factor, args[0].ty))
    }
    let custom = CustomData::new().with("scale", Value::Double(2.0));
    let mut builder = IrBuilder::new(TargetKind::Points, 0);
    let x = builder.alloc(Ty::FLOAT);
    let out = scale(&mut FunctionEmitter::new(&mut builder, &custom), &[x]);
    assert_eq!(out.map(|o| o.ty), Some(Ty::FLOAT));
    let func = builder.finish();
    assert!(matches!(
        func.body[0],
        crate::ir::Inst::Const { value: Value::Float(v), .. } if v == 2.0
    ));
}
