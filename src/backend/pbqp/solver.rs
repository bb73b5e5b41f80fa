//! 基于规约的PBQP启发式求解器
//!
//! 1. 按度数把节点放入工作表
//! 2. 度数为0/1/2的节点用R0/R1/R2规约消去, 这几条规则保持最优
//! 3. 没有低度数节点时用RN规约: 由启发式选点, 贪心固定它的选项
//! 4. 所有节点消去后, 倒序回代消去记录得到每个节点的选项

use std::collections::{BTreeSet, HashMap};

use crate::log_file;

use super::graph::{Graph, NodeId};
use super::heuristic::{RnCandidate, RnHeuristic};
use super::math::{add_cost, Matrix, PBQPNum, Vector, INF};
use super::solution::Solution;

const SOLVER_LOG: &str = "pbqp_solver.txt";

/// 消去记录, 回代时需要的数据都存在这里
#[derive(Clone, Debug)]
pub enum Elimination {
    R0 {
        node: NodeId,
        costs: Vector,
    },
    R1 {
        node: NodeId,
        costs: Vector,
        neighbor: NodeId,
        // 行对应node, 列对应neighbor
        matrix: Matrix,
    },
    R2 {
        node: NodeId,
        costs: Vector,
        n1: NodeId,
        m1: Matrix,
        n2: NodeId,
        m2: Matrix,
    },
    RN {
        node: NodeId,
        option: usize,
    },
}

impl Elimination {
    pub fn node(&self) -> NodeId {
        match self {
            Elimination::R0 { node, .. }
            | Elimination::R1 { node, .. }
            | Elimination::R2 { node, .. }
            | Elimination::RN { node, .. } => *node,
        }
    }
}

// 第一个最小值的下标
fn argmin(len: usize, cost: impl Fn(usize) -> PBQPNum) -> usize {
    let mut out = 0;
    let mut best = INF;
    for i in 0..len {
        let c = cost(i);
        if c < best {
            best = c;
            out = i;
        }
    }
    out
}

/// 度数分桶: 0,1,2 以及 >=3
struct Worklist {
    buckets: [BTreeSet<NodeId>; 4],
    bucket_of: HashMap<NodeId, usize>,
}

impl Worklist {
    fn new() -> Worklist {
        Worklist {
            buckets: [
                BTreeSet::new(),
                BTreeSet::new(),
                BTreeSet::new(),
                BTreeSet::new(),
            ],
            bucket_of: HashMap::new(),
        }
    }

    fn update(&mut self, n: NodeId, degree: usize) {
        let b = degree.min(3);
        if let Some(old) = self.bucket_of.insert(n, b) {
            self.buckets[old].remove(&n);
        }
        self.buckets[b].insert(n);
    }

    fn remove(&mut self, n: NodeId) {
        if let Some(old) = self.bucket_of.remove(&n) {
            self.buckets[old].remove(&n);
        }
    }

    /// 度数最低的非空桶中id最小的节点
    fn pop_reducible(&mut self) -> Option<(usize, NodeId)> {
        for b in 0..3 {
            if let Some(n) = self.buckets[b].iter().next().copied() {
                self.remove(n);
                return Some((b, n));
            }
        }
        None
    }

    fn rest(&self) -> Vec<NodeId> {
        self.buckets[3].iter().copied().collect()
    }
}

pub struct ReductionSolver<'a> {
    heuristic: &'a mut dyn RnHeuristic,
    work: Graph<(), ()>,
    worklist: Worklist,
    stack: Vec<Elimination>,
    num_rn: usize,
}

impl<'a> ReductionSolver<'a> {
    pub fn new<GM, NM>(g: &Graph<GM, NM>, heuristic: &'a mut dyn RnHeuristic) -> Self {
        let work = g.costs_only();
        let mut worklist = Worklist::new();
        for n in work.node_ids() {
            worklist.update(n, work.degree(n));
        }
        ReductionSolver {
            heuristic,
            work,
            worklist,
            stack: Vec::new(),
            num_rn: 0,
        }
    }

    /// 规约整张图
    pub fn reduce(&mut self) {
        while self.work.num_nodes() > 0 {
            match self.worklist.pop_reducible() {
                Some((0, n)) => self.reduce_r0(n),
                Some((1, n)) => self.reduce_r1(n),
                Some((_, n)) => self.reduce_r2(n),
                None => self.reduce_rn(),
            }
        }
    }

    fn remove_node(&mut self, n: NodeId) {
        let neighbors: Vec<NodeId> = self
            .work
            .adj_edges(n)
            .iter()
            .map(|e| self.work.other_node(*e, n))
            .collect();
        self.work.remove_node(n);
        self.worklist.remove(n);
        for m in neighbors {
            self.worklist.update(m, self.work.degree(m));
        }
    }

    fn reduce_r0(&mut self, n: NodeId) {
        log_file!(SOLVER_LOG, "R0 node {}", n);
        let costs = self.work.node_costs(n).clone();
        self.stack.push(Elimination::R0 { node: n, costs });
        self.remove_node(n);
    }

    fn reduce_r1(&mut self, n: NodeId) {
        let e = self.work.adj_edges(n)[0];
        let y = self.work.other_node(e, n);
        log_file!(SOLVER_LOG, "R1 node {} into {}", n, y);
        let costs = self.work.node_costs(n).clone();
        let matrix = self.work.edge_costs_from(e, n);
        // y的每个选项加上n在该选项下的最小代价
        let mut y_costs = self.work.node_costs(y).clone();
        let delta = Vector::from(
            (0..matrix.cols())
                .map(|j| {
                    (0..matrix.rows())
                        .map(|i| add_cost(costs[i], matrix.get(i, j)))
                        .fold(INF, PBQPNum::min)
                })
                .collect::<Vec<PBQPNum>>(),
        );
        y_costs.add_assign(&delta);
        self.work.set_node_costs(y, y_costs);
        self.stack.push(Elimination::R1 {
            node: n,
            costs,
            neighbor: y,
            matrix,
        });
        self.remove_node(n);
    }

    fn reduce_r2(&mut self, n: NodeId) {
        let (e1, e2) = (self.work.adj_edges(n)[0], self.work.adj_edges(n)[1]);
        let (y, z) = (self.work.other_node(e1, n), self.work.other_node(e2, n));
        log_file!(SOLVER_LOG, "R2 node {} into ({}, {})", n, y, z);
        let costs = self.work.node_costs(n).clone();
        let my = self.work.edge_costs_from(e1, n);
        let mz = self.work.edge_costs_from(e2, n);
        // min-plus 合成出 y 和 z 之间的新边
        let mut delta = Matrix::new(my.cols(), mz.cols(), 0.0);
        for j in 0..my.cols() {
            for k in 0..mz.cols() {
                let cost =
                    |i: usize| add_cost(add_cost(costs[i], my.get(i, j)), mz.get(i, k));
                let i = argmin(costs.len(), &cost);
                delta.set(j, k, cost(i));
            }
        }
        self.work.add_edge(y, z, delta);
        self.stack.push(Elimination::R2 {
            node: n,
            costs,
            n1: y,
            m1: my,
            n2: z,
            m2: mz,
        });
        self.remove_node(n);
    }

    fn reduce_rn(&mut self) {
        let candidates: Vec<RnCandidate> = self
            .worklist
            .rest()
            .into_iter()
            .map(|n| RnCandidate {
                node: n,
                spill_cost: self.work.node_costs(n)[0],
                degree: self.work.degree(n),
            })
            .collect();
        let n = self.heuristic.select(&candidates);
        let costs = self.work.node_costs(n).clone();
        let adj: Vec<(NodeId, Matrix)> = self
            .work
            .adj_edges(n)
            .iter()
            .map(|e| (self.work.other_node(*e, n), self.work.edge_costs_from(*e, n)))
            .collect();
        // 选项代价 = 自身代价 + 每个邻居在该选项下能取到的最小代价
        let work = &self.work;
        let option = argmin(costs.len(), |i| {
            let mut c = costs[i];
            for (y, m) in adj.iter() {
                let y_costs = work.node_costs(*y);
                let j = argmin(m.cols(), |j| add_cost(m.get(i, j), y_costs[j]));
                c = add_cost(c, add_cost(m.get(i, j), y_costs[j]));
            }
            c
        });
        log_file!(
            SOLVER_LOG,
            "RN node {} fixed to option {} by {}",
            n,
            option,
            self.heuristic.name()
        );
        // 把选中的那一行折叠到邻居的代价上
        for (y, m) in adj.iter() {
            let mut y_costs = self.work.node_costs(*y).clone();
            y_costs.add_assign(&m.row(option));
            self.work.set_node_costs(*y, y_costs);
        }
        self.stack.push(Elimination::RN { node: n, option });
        self.num_rn += 1;
        self.remove_node(n);
    }

    /// 倒序回代
    pub fn backpropagate(&self) -> Solution {
        let mut solution = Solution::new();
        for record in self.stack.iter().rev() {
            let option = match record {
                Elimination::R0 { costs, .. } => costs.min_index(),
                Elimination::R1 {
                    costs,
                    neighbor,
                    matrix,
                    ..
                } => {
                    let j = solution.selection(*neighbor);
                    argmin(costs.len(), |i| add_cost(costs[i], matrix.get(i, j)))
                }
                Elimination::R2 {
                    costs,
                    n1,
                    m1,
                    n2,
                    m2,
                    ..
                } => {
                    let (j, k) = (solution.selection(*n1), solution.selection(*n2));
                    argmin(costs.len(), |i| {
                        add_cost(add_cost(costs[i], m1.get(i, j)), m2.get(i, k))
                    })
                }
                Elimination::RN { option, .. } => *option,
            };
            solution.set_selection(record.node(), option);
        }
        for _ in 0..self.num_rn {
            solution.record_rn_reduction();
        }
        solution
    }
}

/// 求解一张PBQP图, 原图不会被修改
pub fn solve<GM, NM>(g: &Graph<GM, NM>, heuristic: &mut dyn RnHeuristic) -> Solution {
    let mut solver = ReductionSolver::new(g, heuristic);
    solver.reduce();
    solver.backpropagate()
}
