use super::*;

use crate::log_file;

/// 简单的内联spill:
/// 每个引用被spill寄存器的指令使用一个新的寄存器, 使用前从栈槽reload, 定义后store回栈槽.
/// 新寄存器的区间只覆盖一条指令, 不能再spill. 如果它仍然分配不到寄存器,
/// 就把栈槽直接折叠进指令作为内存操作数, 不再产生新寄存器.
impl Func {
    pub fn spill_vreg(&mut self, vreg: Reg) -> Vec<Reg> {
        let spill_file = "spill.txt";
        if self.unspillable.contains(&vreg) {
            let slot = match self.spill_stack_map.get(&vreg) {
                Some(slot) => *slot,
                None => panic!("unspillable {} has no stack slot", vreg),
            };
            self.fold_stack_slot(vreg, slot);
            log_file!(spill_file, "{}: fold {} into ss{}", self.label, vreg, slot);
            return vec![];
        }
        let class = match self.vreg_classes.get(&vreg) {
            Some(class) => *class,
            None => panic!("{} has no register class", vreg),
        };
        let slot = self.new_stack_slot();
        self.spill_stack_map.insert(vreg, slot);
        let mut new_vregs = Vec::new();
        for b in 0..self.blocks.len() {
            let insts = std::mem::take(&mut self.blocks[b].insts);
            let mut out = Vec::with_capacity(insts.len());
            for mut inst in insts {
                if !inst.get_regs().contains(&vreg) {
                    out.push(inst);
                    continue;
                }
                let new_vreg = self.new_vreg(class);
                self.unspillable.insert(new_vreg);
                self.spill_stack_map.insert(new_vreg, slot);
                new_vregs.push(new_vreg);
                let (reads, defines) = (inst.reads(vreg), inst.defines(vreg));
                inst.replace_reg(vreg, Operand::Reg(new_vreg));
                if reads {
                    out.push(LIRInst::load_from_stack(new_vreg, slot));
                }
                out.push(inst);
                if defines {
                    out.push(LIRInst::store_to_stack(new_vreg, slot));
                }
            }
            self.blocks[b].insts = out;
        }
        let names: Vec<String> = new_vregs.iter().map(|r| r.to_string()).collect();
        log_file!(
            spill_file,
            "{}: {} -> ss{}, new vregs [{}]",
            self.label,
            vreg,
            slot,
            names.join(", ")
        );
        new_vregs
    }

    /// 所有出现vreg的地方直接用栈槽代替, 变成同一个栈槽自己到自己的reload/store直接删掉
    pub fn fold_stack_slot(&mut self, vreg: Reg, slot: usize) {
        for block in self.blocks.iter_mut() {
            for inst in block.insts.iter_mut() {
                inst.replace_reg(vreg, Operand::StackSlot(slot));
            }
            block.insts.retain(|inst| match inst.get_type() {
                InstrsType::LoadFromStack | InstrsType::StoreToStack => inst
                    .defs
                    .iter()
                    .chain(inst.uses.iter())
                    .any(|op| *op != Operand::StackSlot(slot)),
                _ => true,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::target::RegisterInfo;

    fn sample() -> (Func, Reg) {
        let info = RegisterInfo::riscv();
        let gpr = info.class_by_name("gpr").unwrap();
        let mut func = Func::new("f");
        let a = func.new_vreg(gpr);
        let mut bb = BB::new("entry");
        bb.push_inst(LIRInst::new(
            InstrsType::Op("li".to_string()),
            vec![Operand::Reg(a)],
            vec![],
        ));
        bb.push_inst(LIRInst::new(
            InstrsType::Op("add".to_string()),
            vec![Operand::Reg(a)],
            vec![Operand::Reg(a), Operand::Reg(a)],
        ));
        bb.push_inst(LIRInst::new(
            InstrsType::Op("ret".to_string()),
            vec![],
            vec![Operand::Reg(a)],
        ));
        func.add_block(bb);
        (func, a)
    }

    #[test]
    fn test_spill_inserts_reload_and_store() {
        let (mut func, a) = sample();
        let new_vregs = func.spill_vreg(a);
        assert_eq!(new_vregs.len(), 3);
        assert_eq!(func.stack_slots, 1);
        let insts = &func.blocks[0].insts;
        // li; store; reload; add; store; reload; ret
        assert_eq!(insts.len(), 7);
        assert_eq!(insts[1].get_type(), &InstrsType::StoreToStack);
        assert_eq!(insts[2].get_type(), &InstrsType::LoadFromStack);
        assert!(insts.iter().all(|inst| !inst.get_regs().contains(&a)));
        for r in new_vregs.iter() {
            assert!(func.unspillable.contains(r));
            assert_eq!(func.spill_stack_map.get(r), Some(&0));
        }
    }

    #[test]
    fn test_spill_unspillable_folds() {
        let (mut func, a) = sample();
        let new_vregs = func.spill_vreg(a);
        let last = new_vregs[2];
        assert!(func.spill_vreg(last).is_empty());
        let insts = &func.blocks[0].insts;
        // reload被折叠掉了
        assert_eq!(insts.len(), 6);
        assert_eq!(insts[5].uses, vec![Operand::StackSlot(0)]);
        assert_eq!(func.stack_slots, 1);
    }

    #[test]
    fn test_fold_keeps_move_between_slots() {
        let info = RegisterInfo::riscv();
        let gpr = info.class_by_name("gpr").unwrap();
        let mut func = Func::new("f");
        func.stack_slots = 1;
        let a = func.new_vreg(gpr);
        let mut bb = BB::new("entry");
        bb.push_inst(LIRInst::load_from_stack(a, 0));
        bb.push_inst(LIRInst::new(
            InstrsType::Op("ret".to_string()),
            vec![],
            vec![Operand::Reg(a)],
        ));
        func.add_block(bb);
        let new_vregs = func.spill_vreg(a);
        assert_eq!(func.spill_stack_map.get(&a), Some(&1));
        // %1 = reload ss0; store %1, ss1; %2 = reload ss1; ret %2
        func.spill_vreg(new_vregs[0]);
        let insts = &func.blocks[0].insts;
        // ss1 = reload ss0 留下, store ss1, ss1 删掉
        assert_eq!(insts.len(), 3);
        assert_eq!(insts[0].defs, vec![Operand::StackSlot(1)]);
        assert_eq!(insts[0].uses, vec![Operand::StackSlot(0)]);
    }
}
