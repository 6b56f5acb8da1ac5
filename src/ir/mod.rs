//! Typed register IR between the AST and the backend.
//!
//! Every register has a fixed type recorded in [`IrFunction::regs`].
//! Registers are mutable: locals are registers reassigned with
//! [`Inst::Copy`], temporaries are written once. Control flow is
//! structural (`If`, `Loop` carry nested bodies) so the backend never
//! deals with labels.

pub mod builder;
pub mod optimize;

use std::fmt;

pub use builder::IrBuilder;
pub use optimize::{optimize, OptLevel};

use crate::ast::{BinaryOp, LoopKind, UnaryOp};
use crate::function::NativeFn;
use crate::registry::TargetKind;
use crate::runtime::Value;
use crate::types::Ty;

// ─── Registers ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Reg(pub u32);

impl Reg {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// A register together with its type, as handed around by codegen and
/// emitted built-ins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operand {
    pub reg: Reg,
    pub ty: Ty,
}

/// Values provided by the executing voxel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intrinsic {
    CoordX,
    CoordY,
    CoordZ,
    /// World-space position of the voxel center.
    VoxelWorldPos,
}

impl Intrinsic {
    pub fn ty(self) -> Ty {
        match self {
            Intrinsic::VoxelWorldPos => Ty::VEC3F,
            _ => Ty::INT32,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Intrinsic::CoordX => "coord.x",
            Intrinsic::CoordY => "coord.y",
            Intrinsic::CoordZ => "coord.z",
            Intrinsic::VoxelWorldPos => "voxel.pws",
        }
    }
}

// ─── Instructions ──────────────────────────────────────────────────

/// One IR instruction. Operands of `Binary` share one type; the result of
/// a comparison is `bool`.
#[derive(Debug, Clone)]
pub enum Inst {
    // ── Registers ──
    Const { dst: Reg, value: Value },
    Copy { dst: Reg, src: Reg },

    // ── Arithmetic ──
    Binary { dst: Reg, op: BinaryOp, lhs: Reg, rhs: Reg },
    Unary { dst: Reg, op: UnaryOp, src: Reg },
    /// `src` converted to the type of `dst`.
    Convert { dst: Reg, src: Reg },

    // ── Arrays ──
    Pack { dst: Reg, items: Vec<Reg> },
    /// Component `index` of `src`; zero when out of range.
    Extract { dst: Reg, src: Reg, index: Reg },
    /// `src` with component `index` replaced by `value`; unchanged when
    /// out of range. `dst` may equal `src`.
    Insert { dst: Reg, src: Reg, index: Reg, value: Reg },

    // ── Element data ──
    ReadAttr { dst: Reg, slot: usize },
    WriteAttr { slot: usize, src: Reg },
    Intrinsic { dst: Reg, op: Intrinsic },

    // ── Calls ──
    CallNative { dst: Reg, name: String, func: NativeFn, args: Vec<Reg> },

    // ── Control flow ──
    If { cond: Reg, then_body: Vec<Inst>, else_body: Vec<Inst> },
    /// `cond_body` computes `cond` before each iteration (after the first,
    /// for do-while). A missing condition loops until `Break`/`Return`.
    Loop {
        kind: LoopKind,
        cond_body: Vec<Inst>,
        cond: Option<Reg>,
        body: Vec<Inst>,
        iteration: Vec<Inst>,
    },
    Break,
    Continue,
    Return,
}

impl Inst {
    /// Register written, if any.
    pub fn dst(&self) -> Option<Reg> {
        match self {
            Inst::Const { dst, .. }
            | Inst::Copy { dst, .. }
            | Inst::Binary { dst, .. }
            | Inst::Unary { dst, .. }
            | Inst::Convert { dst, .. }
            | Inst::Pack { dst, .. }
            | Inst::Extract { dst, .. }
            | Inst::Insert { dst, .. }
            | Inst::ReadAttr { dst, .. }
            | Inst::Intrinsic { dst, .. }
            | Inst::CallNative { dst, .. } => Some(*dst),
            _ => None,
        }
    }

    /// Registers read directly by this instruction (not by nested bodies).
    pub fn uses(&self) -> Vec<Reg> {
        match self {
            Inst::Copy { src, .. }
            | Inst::Unary { src, .. }
            | Inst::Convert { src, .. }
            | Inst::WriteAttr { src, .. } => vec![*src],
            Inst::Binary { lhs, rhs, .. } => vec![*lhs, *rhs],
            Inst::Pack { items, .. } => items.clone(),
            Inst::Extract { src, index, .. } => vec![*src, *index],
            Inst::Insert {
                src, index, value, ..
            } => vec![*src, *index, *value],
            Inst::CallNative { args, .. } => args.clone(),
            Inst::If { cond, .. } => vec![*cond],
            Inst::Loop { cond, .. } => cond.iter().copied().collect(),
            Inst::Const { .. }
            | Inst::ReadAttr { .. }
            | Inst::Intrinsic { .. }
            | Inst::Break
            | Inst::Continue
            | Inst::Return => Vec::new(),
        }
    }

    /// Nested instruction bodies.
    pub fn bodies(&self) -> Vec<&[Inst]> {
        match self {
            Inst::If {
                then_body,
                else_body,
                ..
            } => vec![then_body.as_slice(), else_body.as_slice()],
            Inst::Loop {
                cond_body,
                body,
                iteration,
                ..
            } => vec![cond_body.as_slice(), body.as_slice(), iteration.as_slice()],
            _ => Vec::new(),
        }
    }

    pub(crate) fn bodies_mut(&mut self) -> Vec<&mut Vec<Inst>> {
        match self {
            Inst::If {
                then_body,
                else_body,
                ..
            } => vec![then_body, else_body],
            Inst::Loop {
                cond_body,
                body,
                iteration,
                ..
            } => vec![cond_body, body, iteration],
            _ => Vec::new(),
        }
    }

    /// Whether removing this instruction could change observable behavior
    /// beyond its destination register.
    pub fn has_side_effects(&self) -> bool {
        matches!(
            self,
            Inst::WriteAttr { .. }
                | Inst::CallNative { .. }
                | Inst::If { .. }
                | Inst::Loop { .. }
                | Inst::Break
                | Inst::Continue
                | Inst::Return
        )
    }

    /// Control never falls through past this instruction.
    pub fn is_jump(&self) -> bool {
        matches!(self, Inst::Break | Inst::Continue | Inst::Return)
    }
}

/// One compiled program body.
#[derive(Debug, Clone)]
pub struct IrFunction {
    pub target: TargetKind,
    /// Type of every register, indexed by register number.
    pub regs: Vec<Ty>,
    /// Number of registry slots the body may touch.
    pub slots: usize,
    pub body: Vec<Inst>,
}

impl IrFunction {
    pub fn reg_ty(&self, reg: Reg) -> Option<Ty> {
        self.regs.get(reg.index()).copied()
    }

    /// Total instruction count including nested bodies.
    pub fn len(&self) -> usize {
        fn count(body: &[Inst]) -> usize {
            body.iter()
                .map(|i| 1 + i.bodies().into_iter().map(count).sum::<usize>())
                .sum()
        }
        count(&self.body)
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    fn write_body(&self, f: &mut fmt::Formatter<'_>, body: &[Inst], depth: usize) -> fmt::Result {
        for inst in body {
            f.write_str("\n")?;
            self.write_inst(f, inst, depth)?;
        }
        Ok(())
    }

    fn write_inst(&self, f: &mut fmt::Formatter<'_>, inst: &Inst, depth: usize) -> fmt::Result {
        let pad = "  ".repeat(depth);
        let ty = |r: &Reg| self.reg_ty(*r).map_or("?".to_string(), |t| t.to_string());
        let list = |regs: &[Reg]| {
            regs.iter()
                .map(Reg::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };
        match inst {
            Inst::Const { dst, value } => {
                write!(f, "{}{}: {} = const {}", pad, dst, ty(dst), value)
            }
            Inst::Copy { dst, src } => write!(f, "{}{}: {} = {}", pad, dst, ty(dst), src),
            Inst::Binary { dst, op, lhs, rhs } => write!(
                f,
                "{}{}: {} = {} {} {}",
                pad,
                dst,
                ty(dst),
                lhs,
                op.as_str(),
                rhs
            ),
            Inst::Unary { dst, op, src } => {
                write!(f, "{}{}: {} = {}{}", pad, dst, ty(dst), op.as_str(), src)
            }
            Inst::Convert { dst, src } => {
                write!(f, "{}{}: {} = convert {}", pad, dst, ty(dst), src)
            }
            Inst::Pack { dst, items } => {
                write!(f, "{}{}: {} = pack [{}]", pad, dst, ty(dst), list(items.as_slice()))
            }
            Inst::Extract { dst, src, index } => {
                write!(f, "{}{}: {} = {}[{}]", pad, dst, ty(dst), src, index)
            }
            Inst::Insert {
                dst,
                src,
                index,
                value,
            } => write!(
                f,
                "{}{}: {} = insert {}[{}] = {}",
                pad,
                dst,
                ty(dst),
                src,
                index,
                value
            ),
            Inst::ReadAttr { dst, slot } => {
                write!(f, "{}{}: {} = read @{}", pad, dst, ty(dst), slot)
            }
            Inst::WriteAttr { slot, src } => write!(f, "{}write @{}, {}", pad, slot, src),
            Inst::Intrinsic { dst, op } => {
                write!(f, "{}{}: {} = {}", pad, dst, ty(dst), op.as_str())
            }
            Inst::CallNative {
                dst, name, args, ..
            } => write!(
                f,
                "{}{}: {} = call {}({})",
                pad,
                dst,
                ty(dst),
                name,
                list(args.as_slice())
            ),
            Inst::If {
                cond,
                then_body,
                else_body,
            } => {
                write!(f, "{}if {} {{", pad, cond)?;
                self.write_body(f, then_body, depth + 1)?;
                if !else_body.is_empty() {
                    write!(f, "\n{}}} else {{", pad)?;
                    self.write_body(f, else_body, depth + 1)?;
                }
                write!(f, "\n{}}}", pad)
            }
            Inst::Loop {
                kind,
                cond_body,
                cond,
                body,
                iteration,
            } => {
                let kind = match kind {
                    LoopKind::For => "for",
                    LoopKind::While => "while",
                    LoopKind::DoWhile => "do-while",
                };
                write!(f, "{}loop {} {{", pad, kind)?;
                if let Some(cond) = cond {
                    write!(f, "\n{}  cond {}:", pad, cond)?;
                    self.write_body(f, cond_body, depth + 2)?;
                }
                write!(f, "\n{}  body:", pad)?;
                self.write_body(f, body, depth + 2)?;
                if !iteration.is_empty() {
                    write!(f, "\n{}  next:", pad)?;
                    self.write_body(f, iteration, depth + 2)?;
                }
                write!(f, "\n{}}}", pad)
            }
            Inst::Break => write!(f, "{}break", pad),
            Inst::Continue => write!(f, "{}continue", pad),
            Inst::Return => write!(f, "{}return", pad),
        }
    }
}

impl fmt::Display for IrFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fn {}(slots: {}, regs: {})",
            self.target,
            self.slots,
            self.regs.len()
        )?;
        self.write_body(f, &self.body, 1)
    }
}
