pub mod context;
pub mod liveness;
pub mod parse;
pub mod spill;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Write;

use crate::backend::block::BB;
use crate::backend::instrs::{InstrsType, LIRInst, Operand};
use crate::backend::operand::{Reg, RegClassId};
use crate::backend::regalloc::structs::FuncAllocStat;
use crate::backend::target::RegisterInfo;

#[derive(Clone, Debug)]
pub struct Func {
    pub label: String,
    pub blocks: Vec<BB>, //第0个块是入口块
    pub vreg_classes: BTreeMap<Reg, RegClassId>,
    pub stack_slots: usize,
    pub spill_stack_map: HashMap<Reg, usize>, //被spill的寄存器(以及由它产生的寄存器)对应的栈槽
    pub unspillable: HashSet<Reg>,            //spill产生的寄存器,不能再spill
    next_vreg: i32,
}

/// 函数的构造
impl Func {
    pub fn new(name: &str) -> Self {
        Self {
            label: name.to_string(),
            blocks: Vec::new(),
            vreg_classes: BTreeMap::new(),
            stack_slots: 0,
            spill_stack_map: HashMap::new(),
            unspillable: HashSet::new(),
            next_vreg: 0,
        }
    }

    /// 声明一个已经编号的虚拟寄存器
    pub fn declare_vreg(&mut self, vreg: Reg, class: RegClassId) {
        assert!(vreg.is_virtual());
        self.vreg_classes.insert(vreg, class);
        self.next_vreg = self.next_vreg.max(vreg.virt_index() + 1);
    }

    pub fn new_vreg(&mut self, class: RegClassId) -> Reg {
        let vreg = Reg::virt(self.next_vreg);
        self.declare_vreg(vreg, class);
        vreg
    }

    pub fn new_stack_slot(&mut self) -> usize {
        self.stack_slots += 1;
        self.stack_slots - 1
    }

    pub fn add_block(&mut self, block: BB) -> usize {
        self.blocks.push(block);
        self.blocks.len() - 1
    }

    pub fn block_index(&self, label: &str) -> Option<usize> {
        self.blocks.iter().position(|b| b.label == label)
    }

    /// 前驱表, 由out_edge反推
    pub fn in_edges(&self) -> Vec<Vec<usize>> {
        let mut preds = vec![Vec::new(); self.blocks.len()];
        for (i, block) in self.blocks.iter().enumerate() {
            for succ in block.out_edge.iter() {
                preds[*succ].push(i);
            }
        }
        preds
    }

    /// 按分配结果把虚拟寄存器替换成物理寄存器
    pub fn rewrite(&mut self, stat: &FuncAllocStat) {
        for block in self.blocks.iter_mut() {
            for inst in block.insts.iter_mut() {
                for reg in inst.get_regs() {
                    if reg.is_physic() {
                        continue;
                    }
                    match stat.phys_of(reg) {
                        Some(preg) => inst.replace_reg(reg, Operand::Reg(preg)),
                        None => panic!("{} is not allocated in func {}", reg, self.label),
                    }
                }
            }
        }
    }

    fn fmt_operand(info: &RegisterInfo, op: &Operand) -> String {
        match op {
            Operand::Reg(r) if r.is_physic() => info.name(*r).to_string(),
            Operand::UndefReg(r) if r.is_physic() => format!("undef {}", info.name(*r)),
            _ => op.to_string(),
        }
    }

    fn fmt_inst(info: &RegisterInfo, inst: &LIRInst) -> String {
        let defs: Vec<String> = inst.defs.iter().map(|op| Func::fmt_operand(info, op)).collect();
        let uses: Vec<String> = inst.uses.iter().map(|op| Func::fmt_operand(info, op)).collect();
        let mut out = String::new();
        if !defs.is_empty() {
            out.push_str(&defs.join(", "));
            out.push_str(" = ");
        }
        match inst.get_type() {
            InstrsType::Copy => out.push_str("copy"),
            InstrsType::Op(op) => out.push_str(op),
            InstrsType::LoadFromStack => out.push_str("reload"),
            InstrsType::StoreToStack => out.push_str("store"),
            InstrsType::Call { callee, clobbers } => {
                out.push_str("call ");
                out.push_str(callee);
                if !uses.is_empty() {
                    out.push(' ');
                    out.push_str(&uses.join(", "));
                }
                if !clobbers.is_empty() {
                    let names: Vec<&str> = clobbers
                        .iter()
                        .map(|r| info.name(Reg::phys(r as i32)))
                        .collect();
                    out.push_str(" clobbers ");
                    out.push_str(&names.join(" "));
                }
                return out;
            }
        }
        if !uses.is_empty() {
            out.push(' ');
            out.push_str(&uses.join(", "));
        }
        out
    }

    /// 打印成可以重新解析的文本格式
    pub fn to_text(&self, info: &RegisterInfo) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "func {}", self.label);
        for (vreg, class) in self.vreg_classes.iter() {
            let _ = writeln!(out, "vreg {} {}", vreg, info.class(*class).name);
        }
        for block in self.blocks.iter() {
            let succs: Vec<&str> = block
                .out_edge
                .iter()
                .map(|b| self.blocks[*b].label.as_str())
                .collect();
            let _ = write!(out, "block {} freq {}", block.label, block.freq);
            if !succs.is_empty() {
                let _ = write!(out, " -> {}", succs.join(", "));
            }
            out.push('\n');
            for inst in block.insts.iter() {
                let _ = writeln!(out, "  {}", Func::fmt_inst(info, inst));
            }
        }
        out
    }
}
