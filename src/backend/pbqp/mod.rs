//! 通用的PBQP求解部件, 与寄存器分配无关
pub mod dump;
pub mod graph;
pub mod heuristic;
pub mod math;
pub mod solution;
pub mod solver;

pub use graph::{EdgeId, Graph, NodeId};
pub use heuristic::{build_heuristic, RnCandidate, RnHeuristic};
pub use math::{add_cost, Matrix, PBQPNum, Vector, INF};
pub use solution::Solution;
pub use solver::solve;
