//! PBQP图
//!
//! 节点和边都放在扁平的数组里面, 用下标作为id, 删除时留下空位并记入空闲表.
//! 节点记录自己相连的边id, 边记录两端的节点id, 没有引用环.

use super::math::{Matrix, Vector};

pub type NodeId = usize;
pub type EdgeId = usize;

struct NodeEntry<NM> {
    costs: Vector,
    adj: Vec<EdgeId>,
    metadata: NM,
}

struct EdgeEntry {
    n1: NodeId,
    n2: NodeId,
    // 行对应n1的选项, 列对应n2的选项
    costs: Matrix,
}

pub struct Graph<GM, NM> {
    metadata: GM,
    nodes: Vec<Option<NodeEntry<NM>>>,
    edges: Vec<Option<EdgeEntry>>,
    free_nodes: Vec<NodeId>,
    free_edges: Vec<EdgeId>,
}

impl<GM, NM> Graph<GM, NM> {
    pub fn new(metadata: GM) -> Self {
        Graph {
            metadata,
            nodes: Vec::new(),
            edges: Vec::new(),
            free_nodes: Vec::new(),
            free_edges: Vec::new(),
        }
    }

    pub fn metadata(&self) -> &GM {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut GM {
        &mut self.metadata
    }

    fn node(&self, n: NodeId) -> &NodeEntry<NM> {
        match self.nodes.get(n) {
            Some(Some(entry)) => entry,
            _ => panic!("invalid node id {}", n),
        }
    }

    fn node_mut(&mut self, n: NodeId) -> &mut NodeEntry<NM> {
        match self.nodes.get_mut(n) {
            Some(Some(entry)) => entry,
            _ => panic!("invalid node id {}", n),
        }
    }

    fn edge(&self, e: EdgeId) -> &EdgeEntry {
        match self.edges.get(e) {
            Some(Some(entry)) => entry,
            _ => panic!("invalid edge id {}", e),
        }
    }

    fn edge_mut(&mut self, e: EdgeId) -> &mut EdgeEntry {
        match self.edges.get_mut(e) {
            Some(Some(entry)) => entry,
            _ => panic!("invalid edge id {}", e),
        }
    }

    pub fn contains_node(&self, n: NodeId) -> bool {
        matches!(self.nodes.get(n), Some(Some(_)))
    }

    pub fn add_node(&mut self, costs: Vector, metadata: NM) -> NodeId {
        assert!(!costs.is_empty(), "node needs at least the spill option");
        let entry = NodeEntry {
            costs,
            adj: Vec::new(),
            metadata,
        };
        match self.free_nodes.pop() {
            Some(n) => {
                self.nodes[n] = Some(entry);
                n
            }
            None => {
                self.nodes.push(Some(entry));
                self.nodes.len() - 1
            }
        }
    }

    /// 加一条边, 如果两点之间已经有边, 把代价累加到原有的边上
    pub fn add_edge(&mut self, n1: NodeId, n2: NodeId, costs: Matrix) -> EdgeId {
        assert_ne!(n1, n2, "self edge on node {}", n1);
        assert!(
            costs.rows() == self.node(n1).costs.len() && costs.cols() == self.node(n2).costs.len(),
            "edge matrix {}x{} does not match nodes {}({}) and {}({})",
            costs.rows(),
            costs.cols(),
            n1,
            self.node(n1).costs.len(),
            n2,
            self.node(n2).costs.len()
        );
        if let Some(e) = self.find_edge(n1, n2) {
            let edge = self.edge_mut(e);
            if edge.n1 == n1 {
                edge.costs.add_assign(&costs);
            } else {
                edge.costs.add_assign(&costs.transpose());
            }
            return e;
        }
        let entry = EdgeEntry { n1, n2, costs };
        let e = match self.free_edges.pop() {
            Some(e) => {
                self.edges[e] = Some(entry);
                e
            }
            None => {
                self.edges.push(Some(entry));
                self.edges.len() - 1
            }
        };
        self.node_mut(n1).adj.push(e);
        self.node_mut(n2).adj.push(e);
        e
    }

    pub fn find_edge(&self, n1: NodeId, n2: NodeId) -> Option<EdgeId> {
        self.node(n1)
            .adj
            .iter()
            .copied()
            .find(|e| self.other_node(*e, n1) == n2)
    }

    pub fn node_costs(&self, n: NodeId) -> &Vector {
        &self.node(n).costs
    }

    pub fn set_node_costs(&mut self, n: NodeId, costs: Vector) {
        let node = self.node_mut(n);
        assert_eq!(node.costs.len(), costs.len(), "node cost length changed");
        node.costs = costs;
    }

    pub fn node_metadata(&self, n: NodeId) -> &NM {
        &self.node(n).metadata
    }

    pub fn node_metadata_mut(&mut self, n: NodeId) -> &mut NM {
        &mut self.node_mut(n).metadata
    }

    pub fn edge_costs(&self, e: EdgeId) -> &Matrix {
        &self.edge(e).costs
    }

    pub fn set_edge_costs(&mut self, e: EdgeId, costs: Matrix) {
        let edge = self.edge_mut(e);
        assert!(
            edge.costs.rows() == costs.rows() && edge.costs.cols() == costs.cols(),
            "edge cost shape changed"
        );
        edge.costs = costs;
    }

    /// 以n为行节点的代价矩阵
    pub fn edge_costs_from(&self, e: EdgeId, n: NodeId) -> Matrix {
        let edge = self.edge(e);
        if edge.n1 == n {
            edge.costs.clone()
        } else {
            assert_eq!(edge.n2, n, "node {} is not on edge {}", n, e);
            edge.costs.transpose()
        }
    }

    pub fn edge_node1(&self, e: EdgeId) -> NodeId {
        self.edge(e).n1
    }

    pub fn edge_node2(&self, e: EdgeId) -> NodeId {
        self.edge(e).n2
    }

    pub fn other_node(&self, e: EdgeId, n: NodeId) -> NodeId {
        let edge = self.edge(e);
        if edge.n1 == n {
            edge.n2
        } else {
            edge.n1
        }
    }

    pub fn adj_edges(&self, n: NodeId) -> &[EdgeId] {
        &self.node(n).adj
    }

    pub fn degree(&self, n: NodeId) -> usize {
        self.node(n).adj.len()
    }

    pub fn remove_edge(&mut self, e: EdgeId) {
        let (n1, n2) = (self.edge(e).n1, self.edge(e).n2);
        self.node_mut(n1).adj.retain(|x| *x != e);
        self.node_mut(n2).adj.retain(|x| *x != e);
        self.edges[e] = None;
        self.free_edges.push(e);
    }

    pub fn remove_node(&mut self, n: NodeId) {
        let adj = self.node(n).adj.clone();
        for e in adj {
            self.remove_edge(e);
        }
        self.nodes[n] = None;
        self.free_nodes.push(n);
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        (0..self.nodes.len()).filter(|n| self.nodes[*n].is_some()).collect()
    }

    pub fn edge_ids(&self) -> Vec<EdgeId> {
        (0..self.edges.len()).filter(|e| self.edges[*e].is_some()).collect()
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len() - self.free_nodes.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len() - self.free_edges.len()
    }

    /// 只拷贝代价和结构, 节点和边的id保持不变
    pub fn costs_only(&self) -> Graph<(), ()> {
        Graph {
            metadata: (),
            nodes: self
                .nodes
                .iter()
                .map(|entry| {
                    entry.as_ref().map(|entry| NodeEntry {
                        costs: entry.costs.clone(),
                        adj: entry.adj.clone(),
                        metadata: (),
                    })
                })
                .collect(),
            edges: self
                .edges
                .iter()
                .map(|entry| {
                    entry.as_ref().map(|entry| EdgeEntry {
                        n1: entry.n1,
                        n2: entry.n2,
                        costs: entry.costs.clone(),
                    })
                })
                .collect(),
            free_nodes: self.free_nodes.clone(),
            free_edges: self.free_edges.clone(),
        }
    }
}
