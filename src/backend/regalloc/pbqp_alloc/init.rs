use super::*;

use crate::backend::pbqp::Vector;

impl Allocator {
    /// 函数开始时冻结保留寄存器, 并把虚拟寄存器按活跃区间是否为空分成两组
    pub fn init(&mut self, ctx: &dyn RegallocContext) {
        let (vregs_to_alloc, empty_interval_vregs) = Allocator::find_vreg_intervals_to_alloc(ctx);
        self.info = Some(AllocatorInfo {
            label: ctx.label().to_string(),
            reserved: ctx.reserved(),
            vregs_to_alloc,
            empty_interval_vregs,
            vrm: VirtRegMap::new(),
            spillings: HashSet::new(),
            round: 0,
        });
    }

    /// 没有操作数引用的虚拟寄存器直接忽略
    pub fn find_vreg_intervals_to_alloc(
        ctx: &dyn RegallocContext,
    ) -> (BTreeSet<Reg>, BTreeSet<Reg>) {
        let mut to_alloc = BTreeSet::new();
        let mut empty = BTreeSet::new();
        for vreg in ctx.virt_regs() {
            if !ctx.has_operands(vreg) {
                continue;
            }
            if ctx.is_empty(vreg) {
                empty.insert(vreg);
            } else {
                to_alloc.insert(vreg);
            }
        }
        (to_alloc, empty)
    }

    /// 候选寄存器 = 分配顺序 - 保留寄存器 - 区间内调用破坏的寄存器 - 寄存器单元冲突的寄存器
    pub fn allowed_regs(ctx: &dyn RegallocContext, reserved: &Bitmap, vreg: Reg) -> Vec<Reg> {
        let class = match ctx.reg_class(vreg) {
            Some(class) => class,
            None => panic!("{} has no register class", vreg),
        };
        let clobbers = ctx.regmask_clobbers_overlapping(vreg);
        ctx.allocation_order(class)
            .into_iter()
            .filter(|preg| {
                !reserved.contains(preg.bit_code())
                    && !clobbers.contains(preg.bit_code())
                    && !ctx.reg_units_overlapping(vreg, *preg)
            })
            .collect()
    }

    /// 每个要分配的虚拟寄存器一个节点, 代价先全部置0, 由约束来填
    pub fn initialize_graph(&mut self, g: &mut PBQPRAGraph) {
        let ctx = g.metadata().ctx;
        let reserved = g.metadata().reserved.clone();
        for vreg in self.info().vregs_to_alloc.iter().copied() {
            let allowed = Allocator::allowed_regs(ctx, &reserved, vreg);
            if allowed.is_empty() {
                // 只剩spill选项, 求解后一定被spill
                log_file!(PBQP_LOG, "{} has no allowed register", vreg);
            }
            let costs = Vector::new(allowed.len() + 1, 0.0);
            let n = g.add_node(costs, NodeMetadata { vreg, allowed });
            g.metadata_mut().node_id_for_vreg.insert(vreg, n);
        }
    }
}
