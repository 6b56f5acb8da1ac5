//! Register allocation and instruction emission.

use super::{Inst, Intrinsic, IrFunction, Operand, Reg};
use crate::ast::{BinaryOp, UnaryOp};
use crate::function::NativeFn;
use crate::registry::TargetKind;
use crate::runtime::Value;
use crate::types::Ty;

/// Builds one [`IrFunction`]. Instructions go to the innermost open block;
/// [`IrBuilder::begin_block`] / [`IrBuilder::end_block`] bracket the nested
/// bodies of structural instructions.
pub struct IrBuilder {
    target: TargetKind,
    slots: usize,
    regs: Vec<Ty>,
    blocks: Vec<Vec<Inst>>,
}

impl IrBuilder {
    pub fn new(target: TargetKind, slots: usize) -> Self {
        Self {
            target,
            slots,
            regs: Vec::new(),
            blocks: vec![Vec::new()],
        }
    }

    pub fn target(&self) -> TargetKind {
        self.target
    }

    /// Fresh register of type `ty`.
    pub fn alloc(&mut self, ty: Ty) -> Operand {
        let reg = Reg(self.regs.len() as u32);
        self.regs.push(ty);
        Operand { reg, ty }
    }

    pub fn emit(&mut self, inst: Inst) {
        if let Some(block) = self.blocks.last_mut() {
            block.push(inst);
        }
    }

    pub fn begin_block(&mut self) {
        self.blocks.push(Vec::new());
    }

    pub fn end_block(&mut self) -> Vec<Inst> {
        if self.blocks.len() > 1 {
            self.blocks.pop().unwrap_or_default()
        } else {
            Vec::new()
        }
    }

    pub fn constant(&mut self, value: Value) -> Operand {
        let dst = self.alloc(value.ty());
        self.emit(Inst::Const {
            dst: dst.reg,
            value,
        });
        dst
    }

    /// Constant `value` converted to `ty` at build time.
    pub fn convert_value(&mut self, value: Value, ty: Ty) -> Operand {
        let value = value.convert(&ty).unwrap_or_else(|| Value::zero(&ty));
        self.constant(value)
    }

    pub fn int(&mut self, value: i32) -> Operand {
        self.constant(Value::Int32(value))
    }

    /// Overwrite `dst` with `src`; both must have the same type.
    pub fn assign(&mut self, dst: Operand, src: Operand) {
        self.emit(Inst::Copy {
            dst: dst.reg,
            src: src.reg,
        });
    }

    /// `src` as `to`; returns `src` unchanged when the types already match.
    pub fn convert(&mut self, src: Operand, to: Ty) -> Operand {
        if src.ty == to {
            return src;
        }
        let dst = self.alloc(to);
        self.emit(Inst::Convert {
            dst: dst.reg,
            src: src.reg,
        });
        dst
    }

    /// Operands must already share one type; `ty` is the result type.
    pub fn binary(&mut self, op: BinaryOp, lhs: Operand, rhs: Operand, ty: Ty) -> Operand {
        let dst = self.alloc(ty);
        self.emit(Inst::Binary {
            dst: dst.reg,
            op,
            lhs: lhs.reg,
            rhs: rhs.reg,
        });
        dst
    }

    pub fn unary(&mut self, op: UnaryOp, src: Operand, ty: Ty) -> Operand {
        let dst = self.alloc(ty);
        self.emit(Inst::Unary {
            dst: dst.reg,
            op,
            src: src.reg,
        });
        dst
    }

    /// Pack components already converted to the element type of `ty`.
    pub fn pack(&mut self, items: &[Operand], ty: Ty) -> Operand {
        let dst = self.alloc(ty);
        self.emit(Inst::Pack {
            dst: dst.reg,
            items: items.iter().map(|o| o.reg).collect(),
        });
        dst
    }

    pub fn extract(&mut self, src: Operand, index: Operand) -> Operand {
        let elem = src.ty.element().map_or(Ty::Void, Ty::Scalar);
        let dst = self.alloc(elem);
        self.emit(Inst::Extract {
            dst: dst.reg,
            src: src.reg,
            index: index.reg,
        });
        dst
    }

    /// Component at a constant index.
    pub fn extract_at(&mut self, src: Operand, index: usize) -> Operand {
        let index = self.int(index as i32);
        self.extract(src, index)
    }

    /// Replace component `index` of `target` in place.
    pub fn insert(&mut self, target: Operand, index: Operand, value: Operand) {
        self.emit(Inst::Insert {
            dst: target.reg,
            src: target.reg,
            index: index.reg,
            value: value.reg,
        });
    }

    pub fn read_attr(&mut self, slot: usize, ty: Ty) -> Operand {
        let dst = self.alloc(ty);
        self.emit(Inst::ReadAttr { dst: dst.reg, slot });
        dst
    }

    pub fn write_attr(&mut self, slot: usize, src: Operand) {
        self.emit(Inst::WriteAttr { slot, src: src.reg });
    }

    pub fn intrinsic(&mut self, op: Intrinsic) -> Operand {
        let dst = self.alloc(op.ty());
        self.emit(Inst::Intrinsic { dst: dst.reg, op });
        dst
    }

    pub fn call_native(&mut self, name: &str, func: NativeFn, args: &[Operand], ret: Ty) -> Operand {
        let dst = self.alloc(ret);
        self.emit(Inst::CallNative {
            dst: dst.reg,
            name: name.to_string(),
            func,
            args: args.iter().map(|o| o.reg).collect(),
        });
        dst
    }

    pub fn finish(mut self) -> IrFunction {
        let body = self.blocks.drain(..).next().unwrap_or_default();
        IrFunction {
            target: self.target,
            regs: self.regs,
            slots: self.slots,
            body,
        }
    }
}
