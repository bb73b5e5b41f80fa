use crate::backend::operand::{Reg, RegClassId};
use crate::backend::regalloc::structs::FuncAllocStat;
use crate::container::bitmap::Bitmap;

// 以函数为寄存器分配的基本单位
pub trait Regalloc {
    fn alloc(&mut self, ctx: &mut dyn RegallocContext) -> FuncAllocStat;
}

/// 活跃区间查询
pub trait LiveRangeQuery {
    fn overlaps(&self, a: Reg, b: Reg) -> bool;
    /// spill权重, 按块频率加权的use/def密度
    fn weight(&self, vreg: Reg) -> f32;
    fn is_empty(&self, vreg: Reg) -> bool;
    /// 物理寄存器preg的某个寄存器单元在vreg活跃期间被占用
    fn reg_units_overlapping(&self, vreg: Reg, preg: Reg) -> bool;
    /// vreg活跃期间经过的所有regmask(调用)破坏的物理寄存器
    fn regmask_clobbers_overlapping(&self, vreg: Reg) -> Bitmap;
}

/// 目标寄存器模型
pub trait RegisterModel {
    fn allocation_order(&self, class: RegClassId) -> Vec<Reg>;
    /// 保留寄存器集合, 以物理寄存器的bit_code为下标
    fn reserved(&self) -> Bitmap;
    fn regs_overlap(&self, a: Reg, b: Reg) -> bool;
    /// 属于某个寄存器类且没有被保留
    fn is_allocatable(&self, preg: Reg) -> bool;
    fn reg_name(&self, preg: Reg) -> String;
}

pub trait BlockFrequency {
    fn block_frequency(&self, block: usize) -> f32;
    fn entry_frequency(&self) -> f32;
}

pub trait Spiller {
    /// 把vreg放到栈上, 返回新产生的(更小的)活跃区间
    fn spill(&mut self, vreg: Reg) -> Vec<Reg>;
    fn stack_slots(&self) -> usize;
}

/// 复制指令 dst = src, 以及它所在的块
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CopyInfo {
    pub dst: Reg,
    pub src: Reg,
    pub block: usize,
}

pub trait AllocFunction {
    fn label(&self) -> &str;
    fn virt_regs(&self) -> Vec<Reg>;
    fn reg_class(&self, vreg: Reg) -> Option<RegClassId>;
    fn simple_hint(&self, vreg: Reg) -> Option<Reg>;
    fn has_operands(&self, vreg: Reg) -> bool;
    fn copies(&self) -> Vec<CopyInfo>;
}

/// 分配一个函数需要的全部外部服务
pub trait RegallocContext:
    LiveRangeQuery + RegisterModel + BlockFrequency + Spiller + AllocFunction
{
}

impl<T> RegallocContext for T where
    T: LiveRangeQuery + RegisterModel + BlockFrequency + Spiller + AllocFunction
{
}
