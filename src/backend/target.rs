//! 目标寄存器模型: 物理寄存器, 寄存器单元, 寄存器类, 保留寄存器
//!
//! 两个物理寄存器有公共的寄存器单元就认为它们重叠(别名)

use std::collections::HashMap;

use crate::backend::operand::{Reg, RegClassId, PHYS_REG_LIMIT};
use crate::container::bitmap::Bitmap;

#[derive(Clone, Debug)]
pub struct PhysRegInfo {
    pub name: String,
    pub units: Vec<usize>,
}

#[derive(Clone, Debug)]
pub struct RegClass {
    pub name: String,
    pub order: Vec<Reg>, //分配顺序
}

#[derive(Clone, Debug, Default)]
pub struct RegisterInfo {
    regs: Vec<PhysRegInfo>,
    classes: Vec<RegClass>,
    reserved: Bitmap,
    reg_by_name: HashMap<String, Reg>,
    class_by_name: HashMap<String, RegClassId>,
}

impl RegisterInfo {
    pub fn new() -> RegisterInfo {
        RegisterInfo::default()
    }

    /// 对于riscv来说,通用寄存器映射到0-31,浮点寄存器映射到32-63
    /// x0-x4有特殊用途保留, f0保留
    pub fn riscv() -> RegisterInfo {
        const INAMES: [&str; 32] = [
            "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2", "s0", "s1", "a0", "a1", "a2", "a3",
            "a4", "a5", "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7", "s8", "s9", "s10", "s11",
            "t3", "t4", "t5", "t6",
        ];
        let mut info = RegisterInfo::new();
        let iregs: Vec<Reg> = INAMES
            .iter()
            .enumerate()
            .map(|(i, name)| info.add_reg(name, &[i]))
            .collect();
        let fregs: Vec<Reg> = (0..32)
            .map(|i| info.add_reg(&format!("f{}", i), &[32 + i]))
            .collect();
        info.add_class("gpr", iregs.clone());
        info.add_class("fpr", fregs.clone());
        for reg in iregs.iter().take(5) {
            info.reserve(*reg);
        }
        info.reserve(fregs[0]);
        info
    }

    pub fn add_reg(&mut self, name: &str, units: &[usize]) -> Reg {
        assert!(
            (self.regs.len() as i32) < PHYS_REG_LIMIT,
            "too many physical registers"
        );
        let reg = Reg::phys(self.regs.len() as i32);
        self.regs.push(PhysRegInfo {
            name: name.to_string(),
            units: units.to_vec(),
        });
        self.reg_by_name.insert(name.to_string(), reg);
        reg
    }

    pub fn add_class(&mut self, name: &str, order: Vec<Reg>) -> RegClassId {
        let id = RegClassId(self.classes.len());
        self.classes.push(RegClass {
            name: name.to_string(),
            order,
        });
        self.class_by_name.insert(name.to_string(), id);
        id
    }

    pub fn reserve(&mut self, reg: Reg) {
        self.reserved.insert(reg.bit_code());
    }

    pub fn is_reserved(&self, reg: Reg) -> bool {
        self.reserved.contains(reg.bit_code())
    }

    pub fn reserved(&self) -> &Bitmap {
        &self.reserved
    }

    pub fn num_regs(&self) -> usize {
        self.regs.len()
    }

    pub fn reg_by_name(&self, name: &str) -> Option<Reg> {
        self.reg_by_name.get(name).copied()
    }

    pub fn class_by_name(&self, name: &str) -> Option<RegClassId> {
        self.class_by_name.get(name).copied()
    }

    pub fn class(&self, id: RegClassId) -> &RegClass {
        &self.classes[id.0]
    }

    pub fn name(&self, reg: Reg) -> &str {
        &self.regs[reg.get_id() as usize].name
    }

    pub fn units(&self, reg: Reg) -> &[usize] {
        &self.regs[reg.get_id() as usize].units
    }

    pub fn regs_overlap(&self, a: Reg, b: Reg) -> bool {
        if a == b {
            return true;
        }
        let ub = self.units(b);
        self.units(a).iter().any(|u| ub.contains(u))
    }

    /// 属于某个寄存器类并且没有被保留
    pub fn is_allocatable(&self, reg: Reg) -> bool {
        !self.is_reserved(reg) && self.classes.iter().any(|c| c.order.contains(&reg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_riscv_preset() {
        let info = RegisterInfo::riscv();
        assert_eq!(info.num_regs(), 64);
        let gpr = info.class_by_name("gpr").unwrap();
        assert_eq!(info.class(gpr).order.len(), 32);
        let sp = info.reg_by_name("sp").unwrap();
        assert!(info.is_reserved(sp));
        assert!(!info.is_allocatable(sp));
        assert!(info.is_allocatable(info.reg_by_name("a0").unwrap()));
        assert_eq!(info.name(Reg::phys(10)), "a0");
    }

    #[test]
    fn test_aliasing_units() {
        // d0 = s0 + s1
        let mut info = RegisterInfo::new();
        let s0 = info.add_reg("s0", &[0]);
        let s1 = info.add_reg("s1", &[1]);
        let d0 = info.add_reg("d0", &[0, 1]);
        assert!(info.regs_overlap(s0, d0));
        assert!(info.regs_overlap(d0, s1));
        assert!(!info.regs_overlap(s0, s1));
        assert!(info.regs_overlap(s0, s0));
    }
}
