use super::*;

use crate::backend::pbqp::Solution;

impl Allocator {
    /// 把解翻译成 (vreg, 物理寄存器), None表示spill
    pub fn extract_decisions(g: &PBQPRAGraph, solution: &Solution) -> Vec<(Reg, Option<Reg>)> {
        g.node_ids()
            .into_iter()
            .map(|n| {
                let md = g.node_metadata(n);
                (md.vreg, md.option_reg(solution.selection(n)))
            })
            .collect()
    }

    /// 提交分配结果, 对选了spill选项的寄存器调用spiller.
    /// 返回是否产生了需要进入下一轮的新活跃区间
    pub fn map_pbqp_to_regalloc(
        &mut self,
        ctx: &mut dyn RegallocContext,
        decisions: Vec<(Reg, Option<Reg>)>,
    ) -> bool {
        let label = ctx.label().to_string();
        let info = self.info_mut();
        // 上一轮的结果作废
        info.vrm.clear_all_virt();
        let mut another_round_needed = false;
        for (vreg, preg) in decisions {
            match preg {
                Some(preg) => {
                    log_file!(PBQP_LOG, "VREG {} -> {}", vreg, ctx.reg_name(preg));
                    info.vrm.assign_virt_to_phys(vreg, preg);
                }
                None => {
                    let weight = ctx.weight(vreg);
                    let new_vregs = ctx.spill(vreg);
                    info.vregs_to_alloc.remove(&vreg);
                    info.spillings.insert(vreg.get_id());
                    let names: Vec<String> = new_vregs.iter().map(|r| r.to_string()).collect();
                    log_file!(
                        PBQP_LOG,
                        "VREG {} -> SPILLED (Cost: {}, New vregs: {{ {} }})",
                        vreg,
                        weight,
                        names.join(" ")
                    );
                    config::record_spill(&label, &vreg.to_string());
                    for new_vreg in new_vregs.iter() {
                        if ctx.is_empty(*new_vreg) {
                            info.empty_interval_vregs.insert(*new_vreg);
                        } else {
                            info.vregs_to_alloc.insert(*new_vreg);
                        }
                    }
                    another_round_needed |= !new_vregs.is_empty();
                }
            }
        }
        another_round_needed
    }
}
