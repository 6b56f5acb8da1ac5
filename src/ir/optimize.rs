//! IR optimizer.
//!
//! `O1` folds instructions whose inputs are single-definition constants.
//! `O2` additionally resolves constant branches, drops code after jumps
//! and removes side-effect-free instructions whose result is never read.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Inst, IrFunction, Reg};
use crate::runtime::Value;
use crate::types::Ty;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OptLevel {
    /// No optimization.
    O0,
    /// Constant folding.
    #[default]
    O1,
    /// Constant folding, unreachable and dead code removal.
    O2,
}

/// Optimize `func` in place until no pass makes progress.
pub fn optimize(func: &mut IrFunction, level: OptLevel) {
    if level == OptLevel::O0 {
        return;
    }
    let before = func.len();
    loop {
        let mut changed = fold_constants(func);
        if level == OptLevel::O2 {
            changed |= resolve_branches(func);
            changed |= remove_unreachable(&mut func.body);
            changed |= remove_dead(func);
        }
        if !changed {
            break;
        }
    }
    debug!(?level, before, after = func.len(), "ir optimized");
}

// ─── Analysis ──────────────────────────────────────────────────────

fn count_defs(body: &[Inst], defs: &mut HashMap<Reg, usize>) {
    for inst in body {
        if let Some(dst) = inst.dst() {
            *defs.entry(dst).or_default() += 1;
        }
        for nested in inst.bodies() {
            count_defs(nested, defs);
        }
    }
}

fn count_uses(body: &[Inst], uses: &mut HashMap<Reg, usize>) {
    for inst in body {
        for reg in inst.uses() {
            *uses.entry(reg).or_default() += 1;
        }
        for nested in inst.bodies() {
            count_uses(nested, uses);
        }
    }
}

/// Registers defined exactly once, by a `Const`.
fn constants(func: &IrFunction) -> HashMap<Reg, Value> {
    let mut defs = HashMap::new();
    count_defs(&func.body, &mut defs);
    let mut out = HashMap::new();
    collect_consts(&func.body, &defs, &mut out);
    out
}

fn collect_consts(body: &[Inst], defs: &HashMap<Reg, usize>, out: &mut HashMap<Reg, Value>) {
    for inst in body {
        if let Inst::Const { dst, value } = inst {
            if defs.get(dst) == Some(&1) {
                out.insert(*dst, value.clone());
            }
        }
        for nested in inst.bodies() {
            collect_consts(nested, defs, out);
        }
    }
}

// ─── Passes ────────────────────────────────────────────────────────

fn fold_constants(func: &mut IrFunction) -> bool {
    let consts = constants(func);
    if consts.is_empty() {
        return false;
    }
    let regs = func.regs.clone();
    fold_body(&mut func.body, &consts, &regs)
}

fn fold_body(body: &mut [Inst], consts: &HashMap<Reg, Value>, regs: &[Ty]) -> bool {
    let mut changed = false;
    for inst in body.iter_mut() {
        for nested in inst.bodies_mut() {
            changed |= fold_body(nested, consts, regs);
        }
        if let Some(value) = evaluate(inst, consts, regs) {
            if let Some(dst) = inst.dst() {
                *inst = Inst::Const { dst, value };
                changed = true;
            }
        }
    }
    changed
}

/// Result of `inst` when every input is a known constant.
fn evaluate(inst: &Inst, consts: &HashMap<Reg, Value>, regs: &[Ty]) -> Option<Value> {
    let get = |r: &Reg| consts.get(r);
    let dst_ty = |r: &Reg| regs.get(r.index()).copied();
    match inst {
        Inst::Copy { src, .. } => get(src).cloned(),
        Inst::Binary { op, lhs, rhs, .. } => Some(Value::binary(*op, get(lhs)?, get(rhs)?)),
        Inst::Unary { op, src, .. } => Some(Value::unary(*op, get(src)?)),
        Inst::Convert { dst, src } => get(src)?.convert(&dst_ty(dst)?),
        Inst::Pack { dst, items } => {
            let values = items.iter().map(|r| get(r).cloned()).collect::<Option<Vec<_>>>()?;
            Some(Value::pack(values, &dst_ty(dst)?))
        }
        Inst::Extract { dst, src, index } => {
            let index = usize::try_from(get(index)?.as_i64()).ok();
            let component = index.and_then(|i| get(src).and_then(|v| v.extract(i)));
            match component {
                Some(v) => Some(v),
                None if get(src).is_some() => Some(Value::zero(&dst_ty(dst)?)),
                None => None,
            }
        }
        _ => None,
    }
}

/// Replace `if` on a constant condition with the taken branch.
fn resolve_branches(func: &mut IrFunction) -> bool {
    let consts = constants(func);
    resolve_in(&mut func.body, &consts)
}

fn resolve_in(body: &mut Vec<Inst>, consts: &HashMap<Reg, Value>) -> bool {
    let mut changed = false;
    let mut out = Vec::with_capacity(body.len());
    for mut inst in body.drain(..) {
        for nested in inst.bodies_mut() {
            changed |= resolve_in(nested, consts);
        }
        match inst {
            Inst::If {
                cond,
                then_body,
                else_body,
            } if consts.contains_key(&cond) => {
                let taken = consts.get(&cond).is_some_and(Value::as_bool);
                out.extend(if taken { then_body } else { else_body });
                changed = true;
            }
            other => out.push(other),
        }
    }
    *body = out;
    changed
}

fn remove_unreachable(body: &mut Vec<Inst>) -> bool {
    let mut changed = false;
    if let Some(pos) = body.iter().position(Inst::is_jump) {
        if pos + 1 < body.len() {
            body.truncate(pos + 1);
            changed = true;
        }
    }
    for inst in body.iter_mut() {
        for nested in inst.bodies_mut() {
            changed |= remove_unreachable(nested);
        }
    }
    changed
}

fn remove_dead(func: &mut IrFunction) -> bool {
    let mut uses = HashMap::new();
    count_uses(&func.body, &mut uses);
    remove_dead_in(&mut func.body, &uses)
}

fn remove_dead_in(body: &mut Vec<Inst>, uses: &HashMap<Reg, usize>) -> bool {
    let before = body.len();
    body.retain(|inst| {
        inst.has_side_effects() || inst.dst().is_some_and(|d| uses.contains_key(&d))
    });
    let mut changed = body.len() != before;
    for inst in body.iter_mut() {
        for nested in inst.bodies_mut() {
            changed |= remove_dead_in(nested, uses);
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, LoopKind};
    use crate::ir::IrBuilder;
    use crate::registry::TargetKind;

    /// `write @0, (1 + 2) * x` with a dead temporary.
    fn sample() -> IrFunction {
        let mut b = IrBuilder::new(TargetKind::Points, 1);
        let one = b.int(1);
        let two = b.int(2);
        let sum = b.binary(BinaryOp::Add, one, two, Ty::INT32);
        let x = b.read_attr(0, Ty::INT32);
        let product = b.binary(BinaryOp::Mul, sum, x, Ty::INT32);
        let _unused = b.binary(BinaryOp::Sub, x, one, Ty::INT32);
        b.write_attr(0, product);
        b.finish()
    }

    #[test]
    fn test_o0_leaves_function_untouched() {
        let mut func = sample();
        let before = func.to_string();
        optimize(&mut func, OptLevel::O0);
        assert_eq!(func.to_string(), before);
    }

    #[test]
    fn test_o1_folds_constant_arithmetic() {
        let mut func = sample();
        optimize(&mut func, OptLevel::O1);
        assert!(matches!(
            &func.body[2],
            Inst::Const { value: Value::Int32(3), .. }
        ));
        assert_eq!(func.len(), 7);
    }

    #[test]
    fn test_o2_removes_dead_temporaries() {
        let mut func = sample();
        optimize(&mut func, OptLevel::O2);
        insta::assert_snapshot!(func.to_string(), @r"
        fn points(slots: 1, regs: 6)
          r2: int32 = const 3
          r3: int32 = read @0
          r4: int32 = r2 * r3
          write @0, r4
        ");
    }

    #[test]
    fn test_o2_resolves_constant_branches_and_drops_unreachable() {
        let mut b = IrBuilder::new(TargetKind::Points, 1);
        let cond = b.constant(Value::Bool(false));
        let v = b.int(5);
        b.begin_block();
        b.write_attr(0, v);
        let then_body = b.end_block();
        b.begin_block();
        b.emit(Inst::Return);
        b.write_attr(0, v);
        let else_body = b.end_block();
        b.emit(Inst::If {
            cond: cond.reg,
            then_body,
            else_body,
        });
        let mut func = b.finish();
        optimize(&mut func, OptLevel::O2);
        assert_eq!(func.body.len(), 1);
        assert!(matches!(func.body[0], Inst::Return));
    }

    #[test]
    fn test_loop_counters_are_not_folded() {
        let mut b = IrBuilder::new(TargetKind::Points, 1);
        let i = b.int(0);
        let limit = b.int(3);
        b.begin_block();
        let cond = b.binary(BinaryOp::Lt, i, limit, Ty::BOOL);
        let cond_body = b.end_block();
        b.begin_block();
        b.write_attr(0, i);
        let body = b.end_block();
        b.begin_block();
        let one = b.int(1);
        let next = b.binary(BinaryOp::Add, i, one, Ty::INT32);
        b.assign(i, next);
        let iteration = b.end_block();
        b.emit(Inst::Loop {
            kind: LoopKind::For,
            cond_body,
            cond: Some(cond.reg),
            body,
            iteration,
        });
        let mut func = b.finish();
        optimize(&mut func, OptLevel::O2);
        let Inst::Loop { cond_body, .. } = &func.body[2] else {
            panic!("loop expected, got {}", func);
        };
        assert!(matches!(cond_body[0], Inst::Binary { .. }));
    }
}
