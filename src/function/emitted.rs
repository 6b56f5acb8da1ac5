//! Generators for built-ins expanded inline at the call site.

use super::{native, FunctionEmitter};
use crate::ast::BinaryOp;
use crate::ir::{Inst, Intrinsic, Operand};
use crate::runtime::Value;
use crate::types::Ty;

fn elem_ty(op: Operand) -> Ty {
    op.ty.element().map_or(Ty::Void, Ty::Scalar)
}

fn components(e: &mut FunctionEmitter<'_>, v: Operand) -> Vec<Operand> {
    (0..v.ty.component_count())
        .map(|i| e.extract_at(v, i))
        .collect()
}

pub(super) fn dot(e: &mut FunctionEmitter<'_>, args: &[Operand]) -> Option<Operand> {
    let (a, b) = (*args.first()?, *args.get(1)?);
    let ty = elem_ty(a);
    let xs = components(e, a);
    let ys = components(e, b);
    let mut products = xs
        .into_iter()
        .zip(ys)
        .map(|(x, y)| e.binary(BinaryOp::Mul, x, y, ty))
        .collect::<Vec<_>>()
        .into_iter();
    let first = products.next()?;
    Some(products.fold(first, |acc, p| e.binary(BinaryOp::Add, acc, p, ty)))
}

pub(super) fn cross(e: &mut FunctionEmitter<'_>, args: &[Operand]) -> Option<Operand> {
    let (a, b) = (*args.first()?, *args.get(1)?);
    let ty = elem_ty(a);
    let x = components(e, a);
    let y = components(e, b);
    if x.len() != 3 || y.len() != 3 {
        return None;
    }
    let mut out = Vec::with_capacity(3);
    for (i, j) in [(1, 2), (2, 0), (0, 1)] {
        let l = e.binary(BinaryOp::Mul, x[i], y[j], ty);
        let r = e.binary(BinaryOp::Mul, x[j], y[i], ty);
        out.push(e.binary(BinaryOp::Sub, l, r, ty));
    }
    Some(e.pack(&out, a.ty))
}

pub(super) fn lengthsq(e: &mut FunctionEmitter<'_>, args: &[Operand]) -> Option<Operand> {
    let v = *args.first()?;
    dot(e, &[v, v])
}

pub(super) fn length(e: &mut FunctionEmitter<'_>, args: &[Operand]) -> Option<Operand> {
    let sq = lengthsq(e, args)?;
    Some(e.call_native("sqrt", native::sqrt, &[sq], sq.ty))
}

/// Unit vector; the zero vector stays zero.
pub(super) fn normalize(e: &mut FunctionEmitter<'_>, args: &[Operand]) -> Option<Operand> {
    let v = *args.first()?;
    let len = length(e, args)?;
    let zero = e.convert_value(Value::Int32(0), len.ty);
    let is_zero = e.binary(BinaryOp::Eq, len, zero, Ty::BOOL);
    let divisor = e.alloc(len.ty);
    e.assign(divisor, len);
    e.begin_block();
    let one = e.convert_value(Value::Int32(1), len.ty);
    e.assign(divisor, one);
    let then_body = e.end_block();
    e.emit(Inst::If {
        cond: is_zero.reg,
        then_body,
        else_body: Vec::new(),
    });
    let divisor = e.convert(divisor, v.ty);
    Some(e.binary(BinaryOp::Div, v, divisor, v.ty))
}

pub(super) fn transpose(e: &mut FunctionEmitter<'_>, args: &[Operand]) -> Option<Operand> {
    let m = *args.first()?;
    let Ty::Matrix(_, dim) = m.ty else {
        return None;
    };
    let dim = dim as usize;
    let entries = components(e, m);
    let transposed: Vec<Operand> = (0..dim * dim)
        .map(|i| entries[(i % dim) * dim + i / dim])
        .collect();
    Some(e.pack(&transposed, m.ty))
}

pub(super) fn getcoordx(e: &mut FunctionEmitter<'_>, _: &[Operand]) -> Option<Operand> {
    Some(e.intrinsic(Intrinsic::CoordX))
}

pub(super) fn getcoordy(e: &mut FunctionEmitter<'_>, _: &[Operand]) -> Option<Operand> {
    Some(e.intrinsic(Intrinsic::CoordY))
}

pub(super) fn getcoordz(e: &mut FunctionEmitter<'_>, _: &[Operand]) -> Option<Operand> {
    Some(e.intrinsic(Intrinsic::CoordZ))
}

pub(super) fn getvoxelpws(e: &mut FunctionEmitter<'_>, _: &[Operand]) -> Option<Operand> {
    Some(e.intrinsic(Intrinsic::VoxelWorldPos))
}
