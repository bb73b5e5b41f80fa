use std::collections::{HashMap, HashSet};

use crate::backend::operand::Reg;
use crate::backend::pbqp::{Graph, NodeId};
use crate::container::bitmap::Bitmap;

use super::regalloc::RegallocContext;

#[derive(Clone, Debug, Default)]
pub struct FuncAllocStat {
    pub dstr: HashMap<i32, i32>,    //记录分配结果, 虚拟寄存器id -> 物理寄存器id
    pub spillings: HashSet<i32>,    //记录被spill的虚拟寄存器id
    pub rounds: usize,              //PBQP求解的轮数
    pub stack_slots: usize,         //spill用到的栈槽数量
}

impl FuncAllocStat {
    pub fn new() -> FuncAllocStat {
        FuncAllocStat::default()
    }

    pub fn phys_of(&self, vreg: Reg) -> Option<Reg> {
        self.dstr.get(&vreg.get_id()).map(|id| Reg::new(*id))
    }

    pub fn is_spilled(&self, vreg: Reg) -> bool {
        self.spillings.contains(&vreg.get_id())
    }
}

/// 虚拟寄存器到物理寄存器的映射
#[derive(Clone, Debug, Default)]
pub struct VirtRegMap {
    virt2phys: HashMap<Reg, Reg>,
}

impl VirtRegMap {
    pub fn new() -> VirtRegMap {
        VirtRegMap::default()
    }

    pub fn assign_virt_to_phys(&mut self, vreg: Reg, preg: Reg) {
        assert!(vreg.is_virtual() && preg.is_physic());
        if let Some(old) = self.virt2phys.insert(vreg, preg) {
            panic!("{} already assigned to {}", vreg, old);
        }
    }

    pub fn clear_all_virt(&mut self) {
        self.virt2phys.clear();
    }

    pub fn has_phys(&self, vreg: Reg) -> bool {
        self.virt2phys.contains_key(&vreg)
    }

    pub fn get_phys(&self, vreg: Reg) -> Option<Reg> {
        self.virt2phys.get(&vreg).copied()
    }

    pub fn len(&self) -> usize {
        self.virt2phys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.virt2phys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Reg, Reg)> + '_ {
        self.virt2phys.iter().map(|(v, p)| (*v, *p))
    }
}

/// 节点对应的虚拟寄存器和它的候选物理寄存器, 第i个选项(i>=1)是allowed[i-1]
#[derive(Clone, Debug)]
pub struct NodeMetadata {
    pub vreg: Reg,
    pub allowed: Vec<Reg>,
}

impl NodeMetadata {
    pub fn option_reg(&self, option: usize) -> Option<Reg> {
        if option == 0 {
            return None;
        }
        assert!(
            option <= self.allowed.len(),
            "option {} out of range for {}",
            option,
            self.vreg
        );
        Some(self.allowed[option - 1])
    }
}

/// 一轮分配的全局信息
pub struct GraphMetadata<'a> {
    pub ctx: &'a dyn RegallocContext,
    pub reserved: Bitmap,
    pub node_id_for_vreg: HashMap<Reg, NodeId>,
}

impl<'a> GraphMetadata<'a> {
    pub fn new(ctx: &'a dyn RegallocContext, reserved: Bitmap) -> Self {
        GraphMetadata {
            ctx,
            reserved,
            node_id_for_vreg: HashMap::new(),
        }
    }

    pub fn node_id_for_vreg(&self, vreg: Reg) -> Option<NodeId> {
        self.node_id_for_vreg.get(&vreg).copied()
    }
}

pub type PBQPRAGraph<'a> = Graph<GraphMetadata<'a>, NodeMetadata>;
