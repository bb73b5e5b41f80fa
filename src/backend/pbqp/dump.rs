//! 把PBQP图打印成文本或者graphviz格式, 调试用

use std::io::{self, Write};

use super::graph::{Graph, NodeId};
use super::math::{Matrix, Vector};

fn fmt_vector(v: &Vector) -> String {
    let items: Vec<String> = v.iter().map(|c| format!("{}", c)).collect();
    format!("[ {} ]", items.join(" "))
}

fn fmt_matrix_rows(m: &Matrix) -> Vec<String> {
    (0..m.rows()).map(|r| fmt_vector(&m.row(r))).collect()
}

/// 文本格式:
/// ```text
/// node 0 (%1): [ 1.5 0 0 ]
/// edge 0 (0, 1):
///   [ 0 0 0 ]
///   [ 0 inf 0 ]
/// ```
/// `describe`给出节点在括号里的说明
pub fn dump_to_stream<GM, NM, W: Write>(
    g: &Graph<GM, NM>,
    out: &mut W,
    describe: impl Fn(NodeId, &NM) -> String,
) -> io::Result<()> {
    for n in g.node_ids() {
        writeln!(
            out,
            "node {} ({}): {}",
            n,
            describe(n, g.node_metadata(n)),
            fmt_vector(g.node_costs(n))
        )?;
    }
    for e in g.edge_ids() {
        writeln!(out, "edge {} ({}, {}):", e, g.edge_node1(e), g.edge_node2(e))?;
        for row in fmt_matrix_rows(g.edge_costs(e)) {
            writeln!(out, "  {}", row)?;
        }
    }
    Ok(())
}

/// graphviz格式, 全0的边只画连线不画矩阵
pub fn print_dot<GM, NM, W: Write>(
    g: &Graph<GM, NM>,
    out: &mut W,
    describe: impl Fn(NodeId, &NM) -> String,
) -> io::Result<()> {
    writeln!(out, "graph {{")?;
    for n in g.node_ids() {
        writeln!(
            out,
            "  node{} [ label=\"{}: {}\\n{}\" ]",
            n,
            n,
            describe(n, g.node_metadata(n)),
            fmt_vector(g.node_costs(n))
        )?;
    }
    for e in g.edge_ids() {
        let (n1, n2) = (g.edge_node1(e), g.edge_node2(e));
        let costs = g.edge_costs(e);
        if costs.is_zero() {
            writeln!(out, "  node{} -- node{}", n1, n2)?;
        } else {
            writeln!(
                out,
                "  node{} -- node{} [ label=\"{}\" ]",
                n1,
                n2,
                fmt_matrix_rows(costs).join("\\n")
            )?;
        }
    }
    writeln!(out, "}}")?;
    Ok(())
}
