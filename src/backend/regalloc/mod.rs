pub mod pbqp_alloc;
pub mod regalloc;
pub mod structs;

#[cfg(test)]
mod tests;
