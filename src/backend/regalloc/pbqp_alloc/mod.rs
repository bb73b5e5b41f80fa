//! 基于PBQP的寄存器分配
//!
//! 每一轮: 构图 -> 施加约束 -> 求解 -> 映射或者spill,
//! 有spill产生新的活跃区间时进入下一轮, 直到某一轮没有新的spill.
//! 空的活跃区间不进图, 在循环结束后单独分配.
mod constraints;
mod dump;
mod finalize;
mod init;
mod map;

use std::collections::{BTreeSet, HashSet};

use crate::backend::operand::Reg;
use crate::backend::pbqp::{build_heuristic, solve, RnHeuristic};
use crate::backend::regalloc::regalloc::{RegallocContext, Regalloc};
use crate::backend::regalloc::structs::{
    FuncAllocStat, GraphMetadata, NodeMetadata, PBQPRAGraph, VirtRegMap,
};
use crate::config::{self, PbqpOptions};
use crate::container::bitmap::Bitmap;
use crate::log_file;

pub use constraints::{
    Coalescing, ConstraintList, Interference, PBQPRAConstraint, SpillCosts, ZERO_WEIGHT_SPILL_COST,
};

const PBQP_LOG: &str = "pbqp_alloc.txt";

/// 分配一个函数过程中的状态
pub struct AllocatorInfo {
    pub label: String,
    pub reserved: Bitmap,                  //函数开始时冻结的保留寄存器
    pub vregs_to_alloc: BTreeSet<Reg>,     //下一轮要进图的虚拟寄存器
    pub empty_interval_vregs: BTreeSet<Reg>, //活跃区间为空的虚拟寄存器,最后单独处理
    pub vrm: VirtRegMap,
    pub spillings: HashSet<i32>,
    pub round: usize,
}

pub struct Allocator {
    info: Option<AllocatorInfo>,
    options: PbqpOptions,
    constraints: ConstraintList,
    heuristic: Box<dyn RnHeuristic>,
}

impl Allocator {
    pub fn new(options: PbqpOptions) -> Allocator {
        let mut constraints = ConstraintList::new();
        constraints.add_constraint(Box::new(SpillCosts));
        constraints.add_constraint(Box::new(Interference));
        if options.coalescing {
            constraints.add_constraint(Box::new(Coalescing));
        }
        let heuristic = build_heuristic(options.heuristic);
        Allocator {
            info: None,
            options,
            constraints,
            heuristic,
        }
    }

    /// 目标相关的约束, 排在内置约束之后
    pub fn add_constraint(&mut self, constraint: Box<dyn PBQPRAConstraint>) {
        self.constraints.add_constraint(constraint);
    }

    fn info(&self) -> &AllocatorInfo {
        match self.info.as_ref() {
            Some(info) => info,
            None => panic!("allocator used before init"),
        }
    }

    fn info_mut(&mut self) -> &mut AllocatorInfo {
        match self.info.as_mut() {
            Some(info) => info,
            None => panic!("allocator used before init"),
        }
    }

    /// 跑一轮PBQP, 返回这一轮是否产生了新的需要分配的活跃区间
    pub fn run_round(&mut self, ctx: &mut dyn RegallocContext) -> bool {
        self.info_mut().round += 1;
        let round = self.info().round;
        log_file!(PBQP_LOG, "round {}", round);

        let decisions = {
            let reserved = self.info().reserved.clone();
            let mut g: PBQPRAGraph = PBQPRAGraph::new(GraphMetadata::new(&*ctx, reserved));
            self.initialize_graph(&mut g);
            self.constraints.apply(&mut g);
            if let Some(dir) = self.options.dump_graphs.clone() {
                self.dump_graph(&g, &dir);
            }
            let solution = solve(&g, self.heuristic.as_mut());
            let label = &self.info().label;
            config::record_round(
                label,
                &format!(
                    "round {}: {} nodes, {} edges",
                    round,
                    g.num_nodes(),
                    g.num_edges()
                ),
            );
            for _ in 0..solution.num_rn_reductions() {
                config::record_heuristic(label, self.heuristic.name());
            }
            Allocator::extract_decisions(&g, &solution)
        };
        self.map_pbqp_to_regalloc(ctx, decisions)
    }

    fn build_stat(&self, ctx: &dyn RegallocContext) -> FuncAllocStat {
        let info = self.info();
        let mut stat = FuncAllocStat::new();
        for (vreg, preg) in info.vrm.iter() {
            stat.dstr.insert(vreg.get_id(), preg.get_id());
        }
        stat.spillings = info.spillings.clone();
        stat.rounds = info.round;
        stat.stack_slots = ctx.stack_slots();
        stat
    }
}

impl Regalloc for Allocator {
    fn alloc(&mut self, ctx: &mut dyn RegallocContext) -> FuncAllocStat {
        self.init(&*ctx);
        log_file!(
            PBQP_LOG,
            "********** PBQP Register Allocating func {} **********",
            ctx.label()
        );
        // 没有要进图的寄存器或者没有新的spill就结束
        while !self.info().vregs_to_alloc.is_empty() && self.run_round(ctx) {}
        self.finalize_alloc(&*ctx);
        self.dump_vrm(&*ctx);
        let stat = self.build_stat(&*ctx);
        self.info = None;
        stat
    }
}
