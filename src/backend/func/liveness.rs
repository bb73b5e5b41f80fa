//! 活跃分析与活跃区间
//!
//! 指令按块的顺序整体编号, 第n条指令有两个槽位: 2n 是读(use), 2n+1 是写(def).
//! 区间都是左闭右开的槽位段. 在n定义, 最后在m使用的值的区间是 [2n+1, 2m+1),
//! 从块入口活跃的值从 2*first 开始, 在块出口活跃的值到 2*last+2 结束.

use std::collections::{HashMap, HashSet, VecDeque};

use super::Func;
use crate::backend::operand::Reg;
use crate::backend::target::RegisterInfo;
use crate::container::bitmap::Bitmap;
use crate::log_file;

/// 不能再spill的寄存器的权重
pub const UNSPILLABLE_WEIGHT: f32 = 1.0e9;

pub type Segment = (usize, usize);

#[derive(Clone, Debug, Default)]
pub struct LiveIntervals {
    ranges: HashMap<Reg, Vec<Segment>>,
    unit_ranges: HashMap<usize, Vec<Segment>>,
    weights: HashMap<Reg, f32>,
    regmasks: Vec<(usize, Bitmap)>, //(调用指令编号, 破坏的寄存器)
    referenced: HashSet<Reg>,
    pub live_in: Vec<HashSet<Reg>>,
    pub live_out: Vec<HashSet<Reg>>,
}

/// 排序并合并相交或者相邻的段
fn normalize(segs: &mut Vec<Segment>) {
    segs.sort_unstable();
    let mut out: Vec<Segment> = Vec::with_capacity(segs.len());
    for seg in segs.iter() {
        match out.last_mut() {
            Some(last) if seg.0 <= last.1 => last.1 = last.1.max(seg.1),
            _ => out.push(*seg),
        }
    }
    *segs = out;
}

pub fn segments_overlap(a: &[Segment], b: &[Segment]) -> bool {
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i].0 < b[j].1 && b[j].0 < a[i].1 {
            return true;
        }
        if a[i].1 <= b[j].1 {
            i += 1;
        } else {
            j += 1;
        }
    }
    false
}

impl LiveIntervals {
    pub fn compute(func: &Func, info: &RegisterInfo) -> LiveIntervals {
        let calc_live_file = "calc_live.txt";
        let mut lis = LiveIntervals::default();
        lis.calc_live_base(func);

        // 块内倒序扫描生成区间
        let mut first = 0;
        for (b, block) in func.blocks.iter().enumerate() {
            let block_start = 2 * first;
            let block_end = 2 * (first + block.insts.len());
            let mut cur_end: HashMap<Reg, usize> = HashMap::new();
            for reg in lis.live_out[b].iter() {
                cur_end.insert(*reg, block_end);
            }
            for (i, inst) in block.insts.iter().enumerate().rev() {
                let n = first + i;
                for reg in inst.get_reg_def() {
                    let end = cur_end.remove(&reg).unwrap_or(2 * n + 2);
                    lis.ranges.entry(reg).or_default().push((2 * n + 1, end));
                }
                for reg in inst.get_reg_use() {
                    cur_end.entry(reg).or_insert(2 * n + 1);
                }
                for reg in inst.get_regs() {
                    lis.referenced.insert(reg);
                }
                if let Some(mask) = inst.regmask() {
                    lis.regmasks.push((n, mask.clone()));
                }
            }
            for (reg, end) in cur_end {
                if block_start < end {
                    lis.ranges.entry(reg).or_default().push((block_start, end));
                }
            }
            first += block.insts.len();
        }
        for segs in lis.ranges.values_mut() {
            normalize(segs);
        }

        // 物理寄存器的区间落到寄存器单元上
        for (reg, segs) in lis.ranges.iter() {
            if reg.is_virtual() {
                continue;
            }
            for unit in info.units(*reg) {
                lis.unit_ranges
                    .entry(*unit)
                    .or_default()
                    .extend(segs.iter().copied());
            }
        }
        for segs in lis.unit_ranges.values_mut() {
            normalize(segs);
        }

        lis.calc_weights(func);
        for (reg, segs) in lis.ranges.iter() {
            if reg.is_virtual() {
                log_file!(calc_live_file, "{} {:?} weight {}", reg, segs, lis.weight(*reg));
            }
        }
        lis
    }

    /// live in 来自所有后继的live in 去掉块内先定义的, 加上块内向上暴露的use
    fn calc_live_base(&mut self, func: &Func) {
        let num_blocks = func.blocks.len();
        let mut live_use: Vec<HashSet<Reg>> = vec![HashSet::new(); num_blocks];
        let mut live_def: Vec<HashSet<Reg>> = vec![HashSet::new(); num_blocks];
        let mut queue: VecDeque<(usize, Reg)> = VecDeque::new();
        for (b, block) in func.blocks.iter().enumerate() {
            for inst in block.insts.iter().rev() {
                for reg in inst.get_reg_def() {
                    live_use[b].remove(&reg);
                    live_def[b].insert(reg);
                }
                for reg in inst.get_reg_use() {
                    live_def[b].remove(&reg);
                    live_use[b].insert(reg);
                }
            }
            for reg in live_use[b].iter() {
                queue.push_back((b, *reg));
            }
        }
        self.live_in = live_use;
        self.live_out = vec![HashSet::new(); num_blocks];
        let preds = func.in_edges();
        while let Some((block, reg)) = queue.pop_front() {
            for pred in preds[block].iter() {
                if self.live_out[*pred].insert(reg) {
                    if live_def[*pred].contains(&reg) {
                        continue;
                    }
                    if self.live_in[*pred].insert(reg) {
                        queue.push_back((*pred, reg));
                    }
                }
            }
        }
    }

    /// 权重 = sum(块频率 * (是否定义 + 是否使用)) / (区间长度 + 25)
    fn calc_weights(&mut self, func: &Func) {
        let mut use_def_freq: HashMap<Reg, f32> = HashMap::new();
        for block in func.blocks.iter() {
            for inst in block.insts.iter() {
                let mut regs = inst.get_reg_def();
                regs.extend(inst.get_reg_use());
                regs.sort();
                regs.dedup();
                for reg in regs {
                    if reg.is_physic() {
                        continue;
                    }
                    let times = inst.defines(reg) as u8 + inst.reads(reg) as u8;
                    *use_def_freq.entry(reg).or_insert(0.0) += block.freq * times as f32;
                }
            }
        }
        for (reg, segs) in self.ranges.iter() {
            if reg.is_physic() {
                continue;
            }
            let weight = if func.unspillable.contains(reg) {
                UNSPILLABLE_WEIGHT
            } else {
                let size: usize = segs.iter().map(|(s, e)| e - s).sum();
                let size = size as f32 / 2.0;
                let freq = use_def_freq.get(reg).copied().unwrap_or(0.0);
                // 频率累加可能溢出, spill代价必须有限
                freq.min(f32::MAX) / (size + 25.0)
            };
            debug_assert!(weight.is_finite(), "weight of {} is {}", reg, weight);
            self.weights.insert(*reg, weight);
        }
    }

    pub fn range(&self, reg: Reg) -> &[Segment] {
        self.ranges.get(&reg).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn is_empty(&self, reg: Reg) -> bool {
        self.range(reg).is_empty()
    }

    pub fn is_referenced(&self, reg: Reg) -> bool {
        self.referenced.contains(&reg)
    }

    pub fn overlaps(&self, a: Reg, b: Reg) -> bool {
        segments_overlap(self.range(a), self.range(b))
    }

    pub fn weight(&self, reg: Reg) -> f32 {
        self.weights.get(&reg).copied().unwrap_or(0.0)
    }

    pub fn unit_overlaps(&self, reg: Reg, unit: usize) -> bool {
        match self.unit_ranges.get(&unit) {
            Some(segs) => segments_overlap(self.range(reg), segs),
            None => false,
        }
    }

    /// 跨越调用指令(同时覆盖它的读槽和写槽)的区间会被它的regmask破坏
    pub fn regmask_clobbers(&self, reg: Reg) -> Bitmap {
        let mut out = Bitmap::new();
        let segs = self.range(reg);
        for (n, mask) in self.regmasks.iter() {
            if segs.iter().any(|(s, e)| *s <= 2 * n && *e >= 2 * n + 2) {
                out.or_other(mask);
            }
        }
        out
    }
}
