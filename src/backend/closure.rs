//! Closure-tree backend: each instruction becomes one boxed closure over
//! the register file. Structural control flow maps onto nested closure
//! vectors, so no jump targets need resolving.

use tracing::debug;

use super::{verify, Backend, CompiledFunction, Flow, Frame, Op, Program};
use crate::ast::LoopKind;
use crate::error::BackendError;
use crate::ir::{Inst, Intrinsic, IrFunction};
use crate::runtime::Value;
use crate::types::Ty;

#[derive(Clone, Copy, Debug, Default)]
pub struct ClosureBackend;

impl Backend for ClosureBackend {
    fn name(&self) -> &'static str {
        "closure"
    }

    fn compile(&self, func: &IrFunction) -> Result<CompiledFunction, BackendError> {
        verify(func)?;
        let init = func.regs.iter().map(Value::zero).collect();
        let body = compile_body(func, &func.body);
        debug!(
            backend = self.name(),
            target = %func.target,
            instructions = func.len(),
            "backend compiled"
        );
        Ok(CompiledFunction::new(Program {
            target: func.target,
            slots: func.slots,
            init,
            body,
            instructions: func.len(),
        }))
    }
}

/// Run `ops` in order, stopping at the first jump.
pub(crate) fn run(ops: &[Op], frame: &mut Frame<'_>) -> Flow {
    for op in ops {
        match op(frame) {
            Flow::Next => {}
            jump => return jump,
        }
    }
    Flow::Next
}

fn op(f: impl Fn(&mut Frame<'_>) -> Flow + Send + Sync + 'static) -> Op {
    Box::new(f)
}

fn compile_body(func: &IrFunction, body: &[Inst]) -> Vec<Op> {
    body.iter().map(|inst| compile_inst(func, inst)).collect()
}

fn reg_ty(func: &IrFunction, reg: crate::ir::Reg) -> Ty {
    func.reg_ty(reg).unwrap_or(Ty::Void)
}

fn compile_inst(func: &IrFunction, inst: &Inst) -> Op {
    match inst {
        Inst::Const { dst, value } => {
            let (d, value) = (dst.index(), value.clone());
            op(move |f| {
                f.regs[d] = value.clone();
                Flow::Next
            })
        }
        Inst::Copy { dst, src } => {
            let (d, s) = (dst.index(), src.index());
            op(move |f| {
                f.regs[d] = f.regs[s].clone();
                Flow::Next
            })
        }
        Inst::Binary { dst, op: bin, lhs, rhs } => {
            let (d, l, r, bin) = (dst.index(), lhs.index(), rhs.index(), *bin);
            op(move |f| {
                f.regs[d] = Value::binary(bin, &f.regs[l], &f.regs[r]);
                Flow::Next
            })
        }
        Inst::Unary { dst, op: un, src } => {
            let (d, s, un) = (dst.index(), src.index(), *un);
            op(move |f| {
                f.regs[d] = Value::unary(un, &f.regs[s]);
                Flow::Next
            })
        }
        Inst::Convert { dst, src } => {
            let (d, s, ty) = (dst.index(), src.index(), reg_ty(func, *dst));
            op(move |f| {
                f.regs[d] = f.regs[s].convert(&ty).unwrap_or_else(|| Value::zero(&ty));
                Flow::Next
            })
        }
        Inst::Pack { dst, items } => {
            let d = dst.index();
            let ty = reg_ty(func, *dst);
            let items: Vec<usize> = items.iter().map(|r| r.index()).collect();
            op(move |f| {
                let values = items.iter().map(|&i| f.regs[i].clone()).collect();
                f.regs[d] = Value::pack(values, &ty);
                Flow::Next
            })
        }
        Inst::Extract { dst, src, index } => {
            let (d, s, i) = (dst.index(), src.index(), index.index());
            let elem = reg_ty(func, *dst);
            op(move |f| {
                let value = usize::try_from(f.regs[i].as_i64())
                    .ok()
                    .and_then(|index| f.regs[s].extract(index));
                f.regs[d] = value.unwrap_or_else(|| Value::zero(&elem));
                Flow::Next
            })
        }
        Inst::Insert {
            dst,
            src,
            index,
            value,
        } => {
            let (d, s, i, v) = (dst.index(), src.index(), index.index(), value.index());
            op(move |f| {
                let index = usize::try_from(f.regs[i].as_i64()).unwrap_or(usize::MAX);
                f.regs[d] = f.regs[s].insert(index, f.regs[v].clone());
                Flow::Next
            })
        }
        Inst::ReadAttr { dst, slot } => {
            let (d, slot, ty) = (dst.index(), *slot, reg_ty(func, *dst));
            op(move |f| {
                f.regs[d] = f
                    .state
                    .values
                    .get(slot)
                    .cloned()
                    .unwrap_or_else(|| Value::zero(&ty));
                Flow::Next
            })
        }
        Inst::WriteAttr { slot, src } => {
            let (slot, s) = (*slot, src.index());
            op(move |f| {
                let value = f.regs[s].clone();
                if let Some(target) = f.state.values.get_mut(slot) {
                    *target = value;
                    if let Some(written) = f.state.written.get_mut(slot) {
                        *written = true;
                    }
                }
                Flow::Next
            })
        }
        Inst::Intrinsic { dst, op: intrinsic } => {
            let (d, intrinsic) = (dst.index(), *intrinsic);
            op(move |f| {
                let [x, y, z] = f.state.coord.unwrap_or([0, 0, 0]);
                f.regs[d] = match intrinsic {
                    Intrinsic::CoordX => Value::Int32(x),
                    Intrinsic::CoordY => Value::Int32(y),
                    Intrinsic::CoordZ => Value::Int32(z),
                    Intrinsic::VoxelWorldPos => Value::vec3f(x as f32, y as f32, z as f32),
                };
                Flow::Next
            })
        }
        Inst::CallNative {
            dst, func: native, args, ..
        } => {
            let (d, native) = (dst.index(), *native);
            let args: Vec<usize> = args.iter().map(|r| r.index()).collect();
            op(move |f| {
                let values: Vec<Value> = args.iter().map(|&i| f.regs[i].clone()).collect();
                f.regs[d] = native(&values);
                Flow::Next
            })
        }
        Inst::If {
            cond,
            then_body,
            else_body,
        } => {
            let c = cond.index();
            let then_body = compile_body(func, then_body);
            let else_body = compile_body(func, else_body);
            op(move |f| {
                if f.regs[c].as_bool() {
                    run(&then_body, f)
                } else {
                    run(&else_body, f)
                }
            })
        }
        Inst::Loop {
            kind,
            cond_body,
            cond,
            body,
            iteration,
        } => {
            let (kind, c) = (*kind, cond.map(|r| r.index()));
            let cond_body = compile_body(func, cond_body);
            let body = compile_body(func, body);
            let iteration = compile_body(func, iteration);
            op(move |f| {
                let test = |f: &mut Frame<'_>| -> Result<bool, Flow> {
                    match run(&cond_body, f) {
                        Flow::Return => Err(Flow::Return),
                        _ => Ok(c.map_or(true, |c| f.regs[c].as_bool())),
                    }
                };
                let mut first = true;
                loop {
                    if kind != LoopKind::DoWhile || !first {
                        match test(f) {
                            Ok(true) => {}
                            Ok(false) => return Flow::Next,
                            Err(flow) => return flow,
                        }
                    }
                    first = false;
                    match run(&body, f) {
                        Flow::Break => return Flow::Next,
                        Flow::Return => return Flow::Return,
                        Flow::Next | Flow::Continue => {}
                    }
                    if run(&iteration, f) == Flow::Return {
                        return Flow::Return;
                    }
                }
            })
        }
        Inst::Break => op(|_| Flow::Break),
        Inst::Continue => op(|_| Flow::Continue),
        Inst::Return => op(|_| Flow::Return),
    }
}
