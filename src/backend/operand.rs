use std::fmt::Display;

/// 物理寄存器的编号都小于这个值, 大于等于它的都是虚拟寄存器
pub const PHYS_REG_LIMIT: i32 = 64;

/// 输入中虚拟寄存器编号(%n)的上限, spill新建的寄存器接在后面编号
pub const VIRT_INDEX_LIMIT: i32 = 1 << 24;

#[derive(Clone, Copy, PartialEq, Hash, Eq, Debug, PartialOrd, Ord)]
pub struct Reg {
    id: i32,
}

/// 寄存器类在目标寄存器模型中的下标
#[derive(Clone, Copy, PartialEq, Hash, Eq, Debug, PartialOrd, Ord)]
pub struct RegClassId(pub usize);

impl Display for Reg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_physic() {
            write!(f, "$p{}", self.id)
        } else {
            write!(f, "%{}", self.id - PHYS_REG_LIMIT)
        }
    }
}

impl Reg {
    pub fn new(id: i32) -> Self {
        debug_assert!(id >= 0, "illegal reg id {}", id);
        Self { id }
    }

    /// 第n个物理寄存器
    pub fn phys(n: i32) -> Self {
        assert!(n >= 0 && n < PHYS_REG_LIMIT, "phys reg {} out of range", n);
        Self { id: n }
    }

    /// 第n个虚拟寄存器,打印为%n
    pub fn virt(n: i32) -> Self {
        assert!(n >= 0, "virt reg {} out of range", n);
        Self {
            id: n + PHYS_REG_LIMIT,
        }
    }

    pub fn get_id(&self) -> i32 {
        self.id
    }

    pub fn is_physic(&self) -> bool {
        self.id < PHYS_REG_LIMIT
    }

    pub fn is_virtual(&self) -> bool {
        !self.is_physic()
    }

    /// 虚拟寄存器在%n表示中的n
    pub fn virt_index(&self) -> i32 {
        debug_assert!(self.is_virtual());
        self.id - PHYS_REG_LIMIT
    }

    /// 用在bitmap里面的位置
    pub fn bit_code(&self) -> usize {
        self.id as usize
    }
}
