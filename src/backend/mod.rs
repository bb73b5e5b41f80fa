pub mod block;
pub mod func;
pub mod instrs;
pub mod operand;
pub mod pbqp;
pub mod regalloc;
pub mod target;
