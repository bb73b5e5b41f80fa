//! RN规约的选点启发式
//!
//! 图中没有度数<=2的节点时, 求解器把剩余节点作为候选交给启发式,
//! 由启发式挑出下一个要贪心固定的节点.

use std::cmp::Ordering;

extern crate biheap;
use biheap::BiHeap;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::config::HeuristicKind;

use super::graph::NodeId;
use super::math::PBQPNum;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RnCandidate {
    pub node: NodeId,
    /// 0号选项(spill)的当前代价
    pub spill_cost: PBQPNum,
    pub degree: usize,
}

pub trait RnHeuristic {
    fn select(&mut self, candidates: &[RnCandidate]) -> NodeId;
    fn name(&self) -> &'static str;
}

#[derive(PartialEq, Clone, Copy)]
struct OperItem {
    node: NodeId,
    cost: PBQPNum, //spill cost / degree, 小优先
}

impl Eq for OperItem {}

impl PartialOrd for OperItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OperItem {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cost
            .partial_cmp(&other.cost)
            .unwrap_or(Ordering::Equal)
            .then(self.node.cmp(&other.node))
    }
}

/// spill代价除以度数最小的节点优先, 也就是最便宜又最碍事的节点
pub struct SpillCostRatio;

impl RnHeuristic for SpillCostRatio {
    fn select(&mut self, candidates: &[RnCandidate]) -> NodeId {
        let mut heap: BiHeap<OperItem> = BiHeap::new();
        for c in candidates {
            let degree = c.degree.max(1) as PBQPNum;
            heap.push(OperItem {
                node: c.node,
                cost: c.spill_cost / degree,
            });
        }
        match heap.pop_min() {
            Some(item) => item.node,
            None => panic!("RN reduction without candidates"),
        }
    }

    fn name(&self) -> &'static str {
        "spill-cost-ratio"
    }
}

/// 度数最小的优先, 相同度数取id小的
pub struct LowestDegree;

impl RnHeuristic for LowestDegree {
    fn select(&mut self, candidates: &[RnCandidate]) -> NodeId {
        match candidates.iter().min_by_key(|c| (c.degree, c.node)) {
            Some(c) => c.node,
            None => panic!("RN reduction without candidates"),
        }
    }

    fn name(&self) -> &'static str {
        "lowest-degree"
    }
}

pub struct RandomPick {
    rng: StdRng,
}

impl RandomPick {
    pub fn new(seed: u64) -> RandomPick {
        RandomPick {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl RnHeuristic for RandomPick {
    fn select(&mut self, candidates: &[RnCandidate]) -> NodeId {
        assert!(!candidates.is_empty(), "RN reduction without candidates");
        candidates[self.rng.gen_range(0..candidates.len())].node
    }

    fn name(&self) -> &'static str {
        "random"
    }
}

pub fn build_heuristic(kind: HeuristicKind) -> Box<dyn RnHeuristic> {
    match kind {
        HeuristicKind::SpillCostRatio => Box::new(SpillCostRatio),
        HeuristicKind::LowestDegree => Box::new(LowestDegree),
        HeuristicKind::Random(seed) => Box::new(RandomPick::new(seed)),
    }
}
