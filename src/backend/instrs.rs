use std::fmt::Display;

use crate::backend::operand::Reg;
use crate::container::bitmap::Bitmap;

#[derive(Clone, Debug, PartialEq)]
pub enum InstrsType {
    // dst = src
    Copy,
    // dsts = op srcs, 具体的运算不影响寄存器分配
    Op(String),
    // call "funcname", clobbers里面的物理寄存器在调用之后不再有效
    Call { callee: String, clobbers: Bitmap },
    // dst: reg, src: stackslot
    LoadFromStack,
    // src: reg, dst: stackslot
    StoreToStack,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operand {
    Reg(Reg),
    // 不读取值的use, 不延长活跃区间
    UndefReg(Reg),
    StackSlot(usize),
}

impl Operand {
    pub fn reg(&self) -> Option<Reg> {
        match self {
            Operand::Reg(r) | Operand::UndefReg(r) => Some(*r),
            Operand::StackSlot(_) => None,
        }
    }
}

impl Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Reg(r) => write!(f, "{}", r),
            Operand::UndefReg(r) => write!(f, "undef {}", r),
            Operand::StackSlot(s) => write!(f, "ss{}", s),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LIRInst {
    inst_type: InstrsType,
    pub defs: Vec<Operand>,
    pub uses: Vec<Operand>,
}

impl LIRInst {
    pub fn new(inst_type: InstrsType, defs: Vec<Operand>, uses: Vec<Operand>) -> LIRInst {
        LIRInst {
            inst_type,
            defs,
            uses,
        }
    }

    pub fn copy(dst: Reg, src: Reg) -> LIRInst {
        LIRInst::new(
            InstrsType::Copy,
            vec![Operand::Reg(dst)],
            vec![Operand::Reg(src)],
        )
    }

    pub fn load_from_stack(dst: Reg, slot: usize) -> LIRInst {
        LIRInst::new(
            InstrsType::LoadFromStack,
            vec![Operand::Reg(dst)],
            vec![Operand::StackSlot(slot)],
        )
    }

    pub fn store_to_stack(src: Reg, slot: usize) -> LIRInst {
        LIRInst::new(
            InstrsType::StoreToStack,
            vec![],
            vec![Operand::Reg(src), Operand::StackSlot(slot)],
        )
    }

    pub fn get_type(&self) -> &InstrsType {
        &self.inst_type
    }

    pub fn get_reg_def(&self) -> Vec<Reg> {
        self.defs
            .iter()
            .filter_map(|op| match op {
                Operand::Reg(r) => Some(*r),
                _ => None,
            })
            .collect()
    }

    /// 真正读取值的use, 不包括undef
    pub fn get_reg_use(&self) -> Vec<Reg> {
        self.uses
            .iter()
            .filter_map(|op| match op {
                Operand::Reg(r) => Some(*r),
                _ => None,
            })
            .collect()
    }

    /// 所有出现的寄存器, 包括undef use
    pub fn get_regs(&self) -> Vec<Reg> {
        self.defs
            .iter()
            .chain(self.uses.iter())
            .filter_map(|op| op.reg())
            .collect()
    }

    pub fn is_copy(&self) -> bool {
        self.inst_type == InstrsType::Copy
    }

    /// 复制指令的 (dst, src)
    pub fn copy_regs(&self) -> Option<(Reg, Reg)> {
        if !self.is_copy() {
            return None;
        }
        match (self.defs.first(), self.uses.first()) {
            (Some(Operand::Reg(dst)), Some(Operand::Reg(src))) => Some((*dst, *src)),
            _ => None,
        }
    }

    pub fn regmask(&self) -> Option<&Bitmap> {
        match &self.inst_type {
            InstrsType::Call { clobbers, .. } => Some(clobbers),
            _ => None,
        }
    }

    /// 把所有出现的from替换成to, undef标记保留
    pub fn replace_reg(&mut self, from: Reg, to: Operand) {
        for op in self.defs.iter_mut().chain(self.uses.iter_mut()) {
            match (*op, to) {
                (Operand::Reg(r), _) if r == from => *op = to,
                (Operand::UndefReg(r), Operand::Reg(t)) if r == from => *op = Operand::UndefReg(t),
                (Operand::UndefReg(r), _) if r == from => *op = to,
                _ => {}
            }
        }
    }

    pub fn defines(&self, reg: Reg) -> bool {
        self.defs.contains(&Operand::Reg(reg))
    }

    pub fn reads(&self, reg: Reg) -> bool {
        self.uses.contains(&Operand::Reg(reg))
    }
}
