//! Structural and type checks run before any backend compiles a function.

use crate::error::BackendError;
use crate::ir::{Inst, IrFunction, Reg};
use crate::types::Ty;

/// Reject IR a backend cannot execute.
pub fn verify(func: &IrFunction) -> Result<(), BackendError> {
    Verifier { func, loops: 0 }.body(&func.body)
}

struct Verifier<'a> {
    func: &'a IrFunction,
    loops: usize,
}

impl Verifier<'_> {
    fn body(&mut self, body: &[Inst]) -> Result<(), BackendError> {
        body.iter().try_for_each(|inst| self.inst(inst))
    }

    fn ty(&self, reg: Reg) -> Result<Ty, BackendError> {
        self.func.reg_ty(reg).ok_or(BackendError::BadRegister {
            reg: reg.0,
            count: self.func.regs.len(),
        })
    }

    fn expect(&self, inst: &str, reg: Reg, expected: Ty) -> Result<(), BackendError> {
        let found = self.ty(reg)?;
        if found == expected {
            Ok(())
        } else {
            Err(BackendError::TypeMismatch {
                inst: inst.to_string(),
                reg: reg.0,
                expected,
                found,
            })
        }
    }

    fn slot(&self, slot: usize) -> Result<(), BackendError> {
        if slot < self.func.slots {
            Ok(())
        } else {
            Err(BackendError::BadSlot {
                slot,
                count: self.func.slots,
            })
        }
    }

    fn inst(&mut self, inst: &Inst) -> Result<(), BackendError> {
        if let Some(dst) = inst.dst() {
            self.ty(dst)?;
        }
        for reg in inst.uses() {
            self.ty(reg)?;
        }
        match inst {
            Inst::Copy { dst, src } => self.expect("copy", *src, self.ty(*dst)?),
            Inst::Binary { lhs, rhs, .. } => self.expect("binary", *rhs, self.ty(*lhs)?),
            Inst::Extract { index, .. } => self.expect("extract", *index, Ty::INT32),
            Inst::Insert {
                dst,
                src,
                index,
                value,
            } => {
                let container = self.ty(*dst)?;
                self.expect("insert", *src, container)?;
                self.expect("insert", *index, Ty::INT32)?;
                let elem = container.element().map_or(Ty::Void, Ty::Scalar);
                self.expect("insert", *value, elem)
            }
            Inst::ReadAttr { slot, .. } | Inst::WriteAttr { slot, .. } => self.slot(*slot),
            Inst::If {
                cond,
                then_body,
                else_body,
            } => {
                self.expect("if", *cond, Ty::BOOL)?;
                self.body(then_body)?;
                self.body(else_body)
            }
            Inst::Loop {
                cond_body,
                cond,
                body,
                iteration,
                ..
            } => {
                self.body(cond_body)?;
                if let Some(cond) = cond {
                    self.expect("loop", *cond, Ty::BOOL)?;
                }
                self.loops += 1;
                let result = self.body(body);
                self.loops -= 1;
                result?;
                self.body(iteration)
            }
            Inst::Break if self.loops == 0 => Err(BackendError::StrayJump("break")),
            Inst::Continue if self.loops == 0 => Err(BackendError::StrayJump("continue")),
            _ => Ok(()),
        }
    }
}
