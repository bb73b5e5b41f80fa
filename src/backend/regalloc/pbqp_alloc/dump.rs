use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::*;

use crate::backend::pbqp::dump::{dump_to_stream, print_dot};

impl Allocator {
    fn describe_node(ctx: &dyn RegallocContext, md: &NodeMetadata) -> String {
        let names: Vec<String> = md.allowed.iter().map(|r| ctx.reg_name(*r)).collect();
        format!("{} [spill {}]", md.vreg, names.join(" "))
    }

    /// 把这一轮的图写到 <dir>/<func>.<round>.pbqpgraph, 同时写一份 .dot
    pub fn dump_graph(&self, g: &PBQPRAGraph, dir: &Path) {
        let info = self.info();
        let ctx = g.metadata().ctx;
        let base = format!("{}.{}", info.label, info.round);
        let result = std::fs::create_dir_all(dir)
            .and_then(|_| File::create(dir.join(format!("{}.pbqpgraph", base))))
            .and_then(|f| {
                let mut w = BufWriter::new(f);
                dump_to_stream(g, &mut w, |_, md| Allocator::describe_node(ctx, md))?;
                w.flush()
            })
            .and_then(|_| File::create(dir.join(format!("{}.dot", base))))
            .and_then(|f| {
                let mut w = BufWriter::new(f);
                print_dot(g, &mut w, |_, md| Allocator::describe_node(ctx, md))?;
                w.flush()
            });
        // dump失败不影响分配
        if let Err(e) = result {
            log_file!(PBQP_LOG, "fail to dump graph {}: {}", base, e);
        }
    }

    /// 分配结束后的映射
    pub fn dump_vrm(&self, ctx: &dyn RegallocContext) {
        let info = self.info();
        let mut pairs: Vec<(Reg, Reg)> = info.vrm.iter().collect();
        pairs.sort();
        log_file!(PBQP_LOG, "Post alloc VirtRegMap of {}:", info.label);
        for (vreg, preg) in pairs {
            log_file!(PBQP_LOG, "  {} -> {}", vreg, ctx.reg_name(preg));
        }
        let mut spilled: Vec<i32> = info.spillings.iter().copied().collect();
        spilled.sort_unstable();
        for id in spilled {
            log_file!(PBQP_LOG, "  {} -> spilled", Reg::new(id));
        }
    }
}
