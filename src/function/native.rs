//! Bodies of natively bound built-ins. Each body serves every overload of
//! its group: arguments arrive converted to the chosen overload's
//! parameter types, so the value variant selects the arithmetic.

use tracing::info;

use crate::runtime::Value;

fn arg(args: &[Value], i: usize) -> f64 {
    args.get(i).map_or(0.0, Value::as_f64)
}

/// Apply `f` in double precision, returning the precision of argument 0.
fn map_float(args: &[Value], f: impl Fn(&[f64]) -> f64) -> Value {
    let xs: Vec<f64> = args.iter().map(Value::as_f64).collect();
    match args.first() {
        Some(Value::Float(_)) => Value::Float(f(&xs) as f32),
        _ => Value::Double(f(&xs)),
    }
}

pub(super) fn abs(args: &[Value]) -> Value {
    match args.first() {
        Some(Value::Int32(v)) => Value::Int32(v.wrapping_abs()),
        Some(Value::Int64(v)) => Value::Int64(v.wrapping_abs()),
        Some(Value::Float(v)) => Value::Float(v.abs()),
        Some(v) => Value::Double(v.as_f64().abs()),
        None => Value::Void,
    }
}

pub(super) fn sqrt(args: &[Value]) -> Value {
    map_float(args, |x| x[0].sqrt())
}

pub(super) fn sin(args: &[Value]) -> Value {
    map_float(args, |x| x[0].sin())
}

pub(super) fn cos(args: &[Value]) -> Value {
    map_float(args, |x| x[0].cos())
}

pub(super) fn tan(args: &[Value]) -> Value {
    map_float(args, |x| x[0].tan())
}

pub(super) fn exp(args: &[Value]) -> Value {
    map_float(args, |x| x[0].exp())
}

pub(super) fn log(args: &[Value]) -> Value {
    map_float(args, |x| x[0].ln())
}

pub(super) fn floor(args: &[Value]) -> Value {
    map_float(args, |x| x[0].floor())
}

pub(super) fn ceil(args: &[Value]) -> Value {
    map_float(args, |x| x[0].ceil())
}

pub(super) fn round(args: &[Value]) -> Value {
    map_float(args, |x| x[0].round())
}

pub(super) fn pow(args: &[Value]) -> Value {
    map_float(args, |x| x[0].powf(x[1]))
}

pub(super) fn lerp(args: &[Value]) -> Value {
    map_float(args, |x| x[0] + (x[1] - x[0]) * x[2])
}

/// `fit(value, omin, omax, nmin, nmax)`: clamp `value` to the old range and
/// remap it linearly onto the new one. A degenerate old range maps to the
/// midpoint of the new range.
pub(super) fn fit(args: &[Value]) -> Value {
    let (value, mut omin, mut omax) = (arg(args, 0), arg(args, 1), arg(args, 2));
    let (mut nmin, mut nmax) = (arg(args, 3), arg(args, 4));
    if omin == omax {
        return Value::Double((nmin + nmax) * 0.5);
    }
    if omin > omax {
        std::mem::swap(&mut omin, &mut omax);
        std::mem::swap(&mut nmin, &mut nmax);
    }
    let t = (value.clamp(omin, omax) - omin) / (omax - omin);
    Value::Double(nmin + (nmax - nmin) * t)
}

fn fold_ints(args: &[Value], f: impl Fn(i64, i64) -> i64) -> Option<Value> {
    match args {
        [Value::Int32(a), Value::Int32(b)] => Some(Value::Int32(f(*a as i64, *b as i64) as i32)),
        _ => None,
    }
}

pub(super) fn min(args: &[Value]) -> Value {
    fold_ints(args, i64::min).unwrap_or_else(|| map_float(args, |x| x[0].min(x[1])))
}

pub(super) fn max(args: &[Value]) -> Value {
    fold_ints(args, i64::max).unwrap_or_else(|| map_float(args, |x| x[0].max(x[1])))
}

/// `clamp(value, lo, hi)`; `lo` wins when the bounds cross.
pub(super) fn clamp(args: &[Value]) -> Value {
    if let [Value::Int32(v), Value::Int32(lo), Value::Int32(hi)] = args {
        return Value::Int32((*v).min(*hi).max(*lo));
    }
    map_float(args, |x| x[0].min(x[2]).max(x[1]))
}

/// Row-major matrix product of two square matrices of one size.
pub(super) fn mmmult(args: &[Value]) -> Value {
    let (Some(a), Some(b)) = (args.first(), args.get(1)) else {
        return Value::Void;
    };
    let (a, b) = (a.components(), b.components());
    let dim = if a.len() == 16 { 4 } else { 3 };
    let double = matches!(a.first(), Some(Value::Double(_)));
    let product = (0..dim * dim)
        .map(|i| {
            let (row, col) = (i / dim, i % dim);
            let sum: f64 = (0..dim)
                .map(|k| {
                    let x = a.get(row * dim + k).map_or(0.0, Value::as_f64);
                    let y = b.get(k * dim + col).map_or(0.0, Value::as_f64);
                    x * y
                })
                .sum();
            if double {
                Value::Double(sum)
            } else {
                Value::Float(sum as f32)
            }
        })
        .collect();
    Value::Matrix(product)
}

pub(super) fn print(args: &[Value]) -> Value {
    for value in args {
        info!(target: "voxl::print", %value);
    }
    Value::Void
}
