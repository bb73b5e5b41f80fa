//! 构图后施加到PBQP图上的约束
//!
//! 每个约束对整张图做一次修改, 约束按加入顺序依次施加.
//! 每一轮都会重新构图, 所以同一个约束不会在一张图上被施加两次.

use crate::backend::operand::Reg;
use crate::backend::pbqp::{add_cost, Matrix, NodeId, PBQPNum, INF};
use crate::backend::regalloc::regalloc::CopyInfo;
use crate::backend::regalloc::structs::PBQPRAGraph;
use crate::log_file;

use super::PBQP_LOG;

/// 复制指令消除的收益系数
const COPY_BENEFIT_FACTOR: PBQPNum = 0.5;

pub trait PBQPRAConstraint {
    fn apply(&mut self, g: &mut PBQPRAGraph);
    fn name(&self) -> &'static str;
}

pub struct ConstraintList {
    constraints: Vec<Box<dyn PBQPRAConstraint>>,
}

impl ConstraintList {
    pub fn new() -> ConstraintList {
        ConstraintList {
            constraints: Vec::new(),
        }
    }

    pub fn add_constraint(&mut self, constraint: Box<dyn PBQPRAConstraint>) {
        self.constraints.push(constraint);
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }
}

impl Default for ConstraintList {
    fn default() -> Self {
        ConstraintList::new()
    }
}

impl PBQPRAConstraint for ConstraintList {
    fn apply(&mut self, g: &mut PBQPRAGraph) {
        for constraint in self.constraints.iter_mut() {
            log_file!(PBQP_LOG, "apply {}", constraint.name());
            constraint.apply(g);
        }
    }

    fn name(&self) -> &'static str {
        "constraint-list"
    }
}

/// 权重为0的区间的spill代价: 比0小, 但不会吞掉折叠进来的其他代价
pub const ZERO_WEIGHT_SPILL_COST: PBQPNum = -PBQPNum::MIN_POSITIVE;

/// spill选项的代价设为活跃区间的权重, 权重为0时用ZERO_WEIGHT_SPILL_COST, 让它一定优先被spill
pub struct SpillCosts;

impl PBQPRAConstraint for SpillCosts {
    fn apply(&mut self, g: &mut PBQPRAGraph) {
        let ctx = g.metadata().ctx;
        for n in g.node_ids() {
            let weight = ctx.weight(g.node_metadata(n).vreg);
            let spill_cost = if weight == 0.0 {
                ZERO_WEIGHT_SPILL_COST
            } else {
                weight
            };
            let mut costs = g.node_costs(n).clone();
            costs[0] = spill_cost;
            g.set_node_costs(n, costs);
        }
    }

    fn name(&self) -> &'static str {
        "spill-costs"
    }
}

/// 活跃区间重叠的两个节点之间加边, 选到互相重叠的物理寄存器时代价为无穷
pub struct Interference;

impl Interference {
    /// 全0的矩阵返回None, 不需要加边
    fn interference_matrix(g: &PBQPRAGraph, n1: NodeId, n2: NodeId) -> Option<Matrix> {
        let ctx = g.metadata().ctx;
        let a1 = &g.node_metadata(n1).allowed;
        let a2 = &g.node_metadata(n2).allowed;
        let mut m = Matrix::new(a1.len() + 1, a2.len() + 1, 0.0);
        let mut any = false;
        for (i, p1) in a1.iter().enumerate() {
            for (j, p2) in a2.iter().enumerate() {
                if ctx.regs_overlap(*p1, *p2) {
                    m.set(i + 1, j + 1, INF);
                    any = true;
                }
            }
        }
        if any {
            Some(m)
        } else {
            None
        }
    }
}

impl PBQPRAConstraint for Interference {
    fn apply(&mut self, g: &mut PBQPRAGraph) {
        let ctx = g.metadata().ctx;
        let nodes = g.node_ids();
        for (idx, n1) in nodes.iter().enumerate() {
            for n2 in nodes[idx + 1..].iter() {
                let (v1, v2) = (g.node_metadata(*n1).vreg, g.node_metadata(*n2).vreg);
                if !ctx.overlaps(v1, v2) {
                    continue;
                }
                if let Some(m) = Interference::interference_matrix(g, *n1, *n2) {
                    g.add_edge(*n1, *n2, m);
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "interference"
    }
}

/// 复制指令两端选到同一个寄存器时减去收益
/// 收益 = 0.5 * 复制所在块的频率 / 入口块频率, 多条复制指令的收益直接累加
pub struct Coalescing;

impl Coalescing {
    fn benefit(g: &PBQPRAGraph, copy: &CopyInfo) -> PBQPNum {
        let ctx = g.metadata().ctx;
        let entry = ctx.entry_frequency();
        let entry = if entry > 0.0 { entry } else { 1.0 };
        COPY_BENEFIT_FACTOR * ctx.block_frequency(copy.block) / entry
    }

    /// 一端是物理寄存器: 直接降低另一端选这个寄存器的代价
    fn add_phys_benefit(g: &mut PBQPRAGraph, vreg: Reg, preg: Reg, benefit: PBQPNum) {
        let ctx = g.metadata().ctx;
        if !ctx.is_allocatable(preg) || g.metadata().reserved.contains(preg.bit_code()) {
            return;
        }
        let n = match g.metadata().node_id_for_vreg(vreg) {
            Some(n) => n,
            None => return,
        };
        let pos = match g.node_metadata(n).allowed.iter().position(|r| *r == preg) {
            Some(pos) => pos,
            None => return,
        };
        let mut costs = g.node_costs(n).clone();
        costs[pos + 1] = add_cost(costs[pos + 1], -benefit);
        g.set_node_costs(n, costs);
    }

    /// 两端都是虚拟寄存器: 在两边选同一个寄存器的位置减去收益, 无穷的位置保持无穷
    fn add_virt_benefit(g: &mut PBQPRAGraph, dst: Reg, src: Reg, benefit: PBQPNum) {
        let (n1, n2) = match (
            g.metadata().node_id_for_vreg(dst),
            g.metadata().node_id_for_vreg(src),
        ) {
            (Some(n1), Some(n2)) => (n1, n2),
            _ => return,
        };
        let a1 = g.node_metadata(n1).allowed.clone();
        let a2 = g.node_metadata(n2).allowed.clone();
        let mut m = Matrix::new(a1.len() + 1, a2.len() + 1, 0.0);
        let mut related = false;
        for (i, p1) in a1.iter().enumerate() {
            if let Some(j) = a2.iter().position(|p2| p2 == p1) {
                m.set(i + 1, j + 1, -benefit);
                related = true;
            }
        }
        // 两边没有公共的寄存器, 寄存器类不相关
        if !related {
            return;
        }
        g.add_edge(n1, n2, m);
    }
}

impl PBQPRAConstraint for Coalescing {
    fn apply(&mut self, g: &mut PBQPRAGraph) {
        let ctx = g.metadata().ctx;
        for copy in ctx.copies() {
            if copy.dst == copy.src {
                continue;
            }
            let benefit = Coalescing::benefit(g, &copy);
            match (copy.dst.is_physic(), copy.src.is_physic()) {
                (true, true) => {}
                (true, false) => Coalescing::add_phys_benefit(g, copy.src, copy.dst, benefit),
                (false, true) => Coalescing::add_phys_benefit(g, copy.dst, copy.src, benefit),
                (false, false) => Coalescing::add_virt_benefit(g, copy.dst, copy.src, benefit),
            }
        }
    }

    fn name(&self) -> &'static str {
        "coalescing"
    }
}
