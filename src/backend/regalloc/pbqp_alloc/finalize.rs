use super::*;

impl Allocator {
    /// 空活跃区间不进图: 有提示寄存器就用提示, 否则取寄存器类分配顺序中第一个没有保留的
    pub fn finalize_alloc(&mut self, ctx: &dyn RegallocContext) {
        let info = self.info_mut();
        for vreg in info.empty_interval_vregs.iter().copied() {
            if info.vrm.has_phys(vreg) || info.spillings.contains(&vreg.get_id()) {
                continue;
            }
            let preg = match ctx.simple_hint(vreg) {
                Some(hint) => hint,
                None => {
                    let class = match ctx.reg_class(vreg) {
                        Some(class) => class,
                        None => panic!("{} has no register class", vreg),
                    };
                    match ctx
                        .allocation_order(class)
                        .into_iter()
                        .find(|preg| !info.reserved.contains(preg.bit_code()))
                    {
                        Some(preg) => preg,
                        None => panic!("no unreserved register for empty interval {}", vreg),
                    }
                }
            };
            log_file!(PBQP_LOG, "empty interval {} -> {}", vreg, ctx.reg_name(preg));
            info.vrm.assign_virt_to_phys(vreg, preg);
        }
    }
}
