use crate::backend::instrs::LIRInst;

#[derive(Clone, Debug, PartialEq)]
pub struct BB {
    pub label: String,
    pub freq: f32, //块的相对执行频率, 入口块一般为1
    pub insts: Vec<LIRInst>,
    pub out_edge: Vec<usize>, //后继块在函数中的下标
}

impl BB {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            freq: 1.0,
            insts: Vec::new(),
            out_edge: Vec::new(),
        }
    }

    pub fn with_freq(label: &str, freq: f32) -> Self {
        Self {
            freq,
            ..BB::new(label)
        }
    }

    pub fn push_inst(&mut self, inst: LIRInst) {
        self.insts.push(inst);
    }
}
