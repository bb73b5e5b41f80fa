use std::collections::BTreeMap;

use super::graph::{Graph, NodeId};
use super::math::{add_cost, PBQPNum};

/// 每个节点选中的选项, 0号选项是spill
#[derive(Clone, Debug, Default)]
pub struct Solution {
    selections: BTreeMap<NodeId, usize>,
    num_rn_reductions: usize,
}

impl Solution {
    pub fn new() -> Solution {
        Solution::default()
    }

    pub fn set_selection(&mut self, n: NodeId, option: usize) {
        self.selections.insert(n, option);
    }

    pub fn selection(&self, n: NodeId) -> usize {
        match self.selections.get(&n) {
            Some(option) => *option,
            None => panic!("no selection recorded for node {}", n),
        }
    }

    pub fn len(&self) -> usize {
        self.selections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, usize)> + '_ {
        self.selections.iter().map(|(n, o)| (*n, *o))
    }

    pub fn record_rn_reduction(&mut self) {
        self.num_rn_reductions += 1;
    }

    /// 使用启发式(非最优)规约的次数, 为0时解是最优的
    pub fn num_rn_reductions(&self) -> usize {
        self.num_rn_reductions
    }

    /// 在原图上计算这个解的总代价
    pub fn total_cost<GM, NM>(&self, g: &Graph<GM, NM>) -> PBQPNum {
        let mut cost = 0.0;
        for n in g.node_ids() {
            cost = add_cost(cost, g.node_costs(n)[self.selection(n)]);
        }
        for e in g.edge_ids() {
            let (n1, n2) = (g.edge_node1(e), g.edge_node2(e));
            cost = add_cost(
                cost,
                g.edge_costs(e).get(self.selection(n1), self.selection(n2)),
            );
        }
        cost
    }
}
