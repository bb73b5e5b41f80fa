//! 把函数, 目标寄存器模型和活跃区间组合起来, 提供寄存器分配需要的全部服务

use super::liveness::LiveIntervals;
use super::*;
use crate::backend::regalloc::regalloc::{
    AllocFunction, BlockFrequency, CopyInfo, LiveRangeQuery, RegisterModel, Spiller,
};
use crate::container::bitmap::Bitmap;

pub struct FuncContext<'a> {
    pub func: &'a mut Func,
    pub info: &'a RegisterInfo,
    lis: LiveIntervals,
}

impl<'a> FuncContext<'a> {
    pub fn new(func: &'a mut Func, info: &'a RegisterInfo) -> Self {
        let lis = LiveIntervals::compute(func, info);
        FuncContext { func, info, lis }
    }

    /// 指令流变化后重新计算活跃区间
    pub fn recompute(&mut self) {
        self.lis = LiveIntervals::compute(self.func, self.info);
    }
}

impl LiveRangeQuery for FuncContext<'_> {
    fn overlaps(&self, a: Reg, b: Reg) -> bool {
        self.lis.overlaps(a, b)
    }

    fn weight(&self, vreg: Reg) -> f32 {
        self.lis.weight(vreg)
    }

    fn is_empty(&self, vreg: Reg) -> bool {
        self.lis.is_empty(vreg)
    }

    fn reg_units_overlapping(&self, vreg: Reg, preg: Reg) -> bool {
        self.info
            .units(preg)
            .iter()
            .any(|unit| self.lis.unit_overlaps(vreg, *unit))
    }

    fn regmask_clobbers_overlapping(&self, vreg: Reg) -> Bitmap {
        self.lis.regmask_clobbers(vreg)
    }
}

impl RegisterModel for FuncContext<'_> {
    fn allocation_order(&self, class: RegClassId) -> Vec<Reg> {
        self.info.class(class).order.clone()
    }

    fn reserved(&self) -> Bitmap {
        self.info.reserved().clone()
    }

    fn regs_overlap(&self, a: Reg, b: Reg) -> bool {
        self.info.regs_overlap(a, b)
    }

    fn is_allocatable(&self, preg: Reg) -> bool {
        self.info.is_allocatable(preg)
    }

    fn reg_name(&self, preg: Reg) -> String {
        self.info.name(preg).to_string()
    }
}

impl BlockFrequency for FuncContext<'_> {
    fn block_frequency(&self, block: usize) -> f32 {
        self.func.blocks[block].freq
    }

    fn entry_frequency(&self) -> f32 {
        self.func.blocks.first().map(|b| b.freq).unwrap_or(1.0)
    }
}

impl Spiller for FuncContext<'_> {
    fn spill(&mut self, vreg: Reg) -> Vec<Reg> {
        let new_vregs = self.func.spill_vreg(vreg);
        self.recompute();
        new_vregs
    }

    fn stack_slots(&self) -> usize {
        self.func.stack_slots
    }
}

impl AllocFunction for FuncContext<'_> {
    fn label(&self) -> &str {
        &self.func.label
    }

    fn virt_regs(&self) -> Vec<Reg> {
        self.func.vreg_classes.keys().copied().collect()
    }

    fn reg_class(&self, vreg: Reg) -> Option<RegClassId> {
        self.func.vreg_classes.get(&vreg).copied()
    }

    /// 与可分配物理寄存器之间的第一条复制指令
    fn simple_hint(&self, vreg: Reg) -> Option<Reg> {
        self.copies().into_iter().find_map(|copy| {
            let other = if copy.dst == vreg {
                copy.src
            } else if copy.src == vreg {
                copy.dst
            } else {
                return None;
            };
            if other.is_physic() && self.info.is_allocatable(other) {
                Some(other)
            } else {
                None
            }
        })
    }

    fn has_operands(&self, vreg: Reg) -> bool {
        self.lis.is_referenced(vreg)
    }

    fn copies(&self) -> Vec<CopyInfo> {
        let mut out = Vec::new();
        for (b, block) in self.func.blocks.iter().enumerate() {
            for inst in block.insts.iter() {
                if let Some((dst, src)) = inst.copy_regs() {
                    out.push(CopyInfo { dst, src, block: b });
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::super::parse::parse_module;
    use super::*;

    #[test]
    fn test_hint_and_copies() {
        let text = "
            func f
            vreg %0 gpr
            vreg %1 gpr
            block entry
              %0 = li
              %1 = copy %0
              a0 = copy %1
              ret a0
        ";
        let (info, mut funcs) = parse_module(text).unwrap();
        let ctx = FuncContext::new(&mut funcs[0], &info);
        assert_eq!(ctx.copies().len(), 2);
        assert_eq!(ctx.simple_hint(Reg::virt(1)), info.reg_by_name("a0"));
        assert_eq!(ctx.simple_hint(Reg::virt(0)), None);
        assert!(ctx.has_operands(Reg::virt(0)));
        assert!(!ctx.overlaps(Reg::virt(0), Reg::virt(1)));
        assert_eq!(ctx.entry_frequency(), 1.0);
    }

    #[test]
    fn test_spill_recomputes() {
        let text = "
            func f
            vreg %0 gpr
            block entry
              %0 = li
              op
              ret %0
        ";
        let (info, mut funcs) = parse_module(text).unwrap();
        let mut ctx = FuncContext::new(&mut funcs[0], &info);
        let new_vregs = ctx.spill(Reg::virt(0));
        assert_eq!(new_vregs.len(), 2);
        assert!(!ctx.has_operands(Reg::virt(0)));
        for r in new_vregs {
            assert!(!ctx.is_empty(r));
            assert_eq!(ctx.weight(r), 1.0e9);
        }
        assert_eq!(ctx.stack_slots(), 1);
    }
}
