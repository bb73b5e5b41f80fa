//! 函数描述的文本格式
//!
//! ```text
//! # 目标声明, 不写时使用riscv预设
//! reg r0 units 0
//! class gpr r0 r1
//! reserve r1
//!
//! func main
//! vreg %0 gpr
//! block entry freq 1 -> loop
//!   %0 = li
//!   %1 = copy %0
//!   call foo clobbers t0 t1
//! block loop freq 8 -> loop, exit
//!   op %1, undef %2
//! block exit
//! ```

use std::fmt::{self, Display};

use lazy_static::lazy_static;
use regex::Regex;

use super::*;
use crate::backend::operand::{PHYS_REG_LIMIT, VIRT_INDEX_LIMIT};
use crate::container::bitmap::Bitmap;

#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    UnknownRegister { line: usize, name: String },
    UnknownClass { line: usize, name: String },
    UnknownBlock { func: String, name: String },
    BadLine { line: usize, text: String },
    MissingFunction { line: usize },
    NoAllocatableRegister { func: String, class: String },
    Io(String),
}

impl Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnknownRegister { line, name } => {
                write!(f, "line {}: unknown register {}", line, name)
            }
            ParseError::UnknownClass { line, name } => {
                write!(f, "line {}: unknown register class {}", line, name)
            }
            ParseError::UnknownBlock { func, name } => {
                write!(f, "func {}: unknown block {}", func, name)
            }
            ParseError::BadLine { line, text } => write!(f, "line {}: cannot parse `{}`", line, text),
            ParseError::MissingFunction { line } => {
                write!(f, "line {}: no function declared before this line", line)
            }
            ParseError::NoAllocatableRegister { func, class } => write!(
                f,
                "func {}: register class {} has no unreserved register",
                func, class
            ),
            ParseError::Io(msg) => write!(f, "io error: {}", msg),
        }
    }
}

impl std::error::Error for ParseError {}

impl From<std::io::Error> for ParseError {
    fn from(e: std::io::Error) -> Self {
        ParseError::Io(e.to_string())
    }
}

lazy_static! {
    static ref FUNC_RE: Regex = Regex::new(r"^func\s+([\w.]+)$").unwrap();
    static ref VREG_RE: Regex = Regex::new(r"^vreg\s+%(\d+)\s+(\w+)$").unwrap();
    static ref REG_RE: Regex = Regex::new(r"^reg\s+(\w+)\s+units\s+([\d\s,]+)$").unwrap();
    static ref CLASS_RE: Regex = Regex::new(r"^class\s+(\w+)((?:[\s,]+\w+)*)$").unwrap();
    static ref RESERVE_RE: Regex = Regex::new(r"^reserve((?:[\s,]+\w+)+)$").unwrap();
    static ref BLOCK_RE: Regex =
        Regex::new(r"^block\s+([\w.]+)(?:\s+freq\s+([0-9.eE+-]+))?(?:\s*->\s*(.+))?$").unwrap();
    static ref INST_RE: Regex =
        Regex::new(r"^(?:([^=]+?)\s*=\s*)?([A-Za-z_][\w.]*)(.*)$").unwrap();
    static ref SLOT_RE: Regex = Regex::new(r"^ss(\d+)$").unwrap();
}

/// %n中的n, 超出范围的编号按坏行处理
fn virt_index(line: usize, text: &str, index: &str) -> Result<Reg, ParseError> {
    match index.parse::<i32>() {
        Ok(index) if (0..VIRT_INDEX_LIMIT).contains(&index) => Ok(Reg::virt(index)),
        _ => Err(ParseError::BadLine {
            line,
            text: text.to_string(),
        }),
    }
}

fn split_list(text: &str) -> Vec<&str> {
    text.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .collect()
}

struct Parser {
    info: RegisterInfo,
    declared_target: bool,
    funcs: Vec<Func>,
    // 当前函数中还没有解析的后继 (块下标, 后继名字)
    pending_succs: Vec<(usize, String)>,
}

impl Parser {
    fn new() -> Parser {
        Parser {
            info: RegisterInfo::new(),
            declared_target: false,
            funcs: Vec::new(),
            pending_succs: Vec::new(),
        }
    }

    fn phys(&self, line: usize, name: &str) -> Result<Reg, ParseError> {
        self.info
            .reg_by_name(name)
            .ok_or_else(|| ParseError::UnknownRegister {
                line,
                name: name.to_string(),
            })
    }

    fn class(&self, line: usize, name: &str) -> Result<RegClassId, ParseError> {
        self.info
            .class_by_name(name)
            .ok_or_else(|| ParseError::UnknownClass {
                line,
                name: name.to_string(),
            })
    }

    fn cur_func(&mut self, line: usize) -> Result<&mut Func, ParseError> {
        self.funcs
            .last_mut()
            .ok_or(ParseError::MissingFunction { line })
    }

    /// 函数结束时解析块的后继
    fn finish_func(&mut self) -> Result<(), ParseError> {
        let pending = std::mem::take(&mut self.pending_succs);
        if let Some(func) = self.funcs.last_mut() {
            for (block, name) in pending {
                match func.block_index(&name) {
                    Some(succ) => func.blocks[block].out_edge.push(succ),
                    None => {
                        return Err(ParseError::UnknownBlock {
                            func: func.label.clone(),
                            name,
                        })
                    }
                }
            }
        }
        Ok(())
    }

    fn operand(&self, line: usize, func: &Func, token: &str) -> Result<Operand, ParseError> {
        if let Some(index) = token.strip_prefix('%') {
            let vreg = virt_index(line, token, index)?;
            if !func.vreg_classes.contains_key(&vreg) {
                return Err(ParseError::UnknownRegister {
                    line,
                    name: token.to_string(),
                });
            }
            return Ok(Operand::Reg(vreg));
        }
        if let Some(caps) = SLOT_RE.captures(token) {
            if let Ok(slot) = caps[1].parse::<u32>() {
                return Ok(Operand::StackSlot(slot as usize));
            }
        }
        Ok(Operand::Reg(self.phys(line, token)?))
    }

    fn operands(&self, line: usize, func: &Func, text: &str) -> Result<Vec<Operand>, ParseError> {
        let mut out = Vec::new();
        let mut undef = false;
        for token in split_list(text) {
            if token == "undef" {
                undef = true;
                continue;
            }
            let op = self.operand(line, func, token)?;
            out.push(match (undef, op) {
                (true, Operand::Reg(r)) => Operand::UndefReg(r),
                (_, op) => op,
            });
            undef = false;
        }
        Ok(out)
    }

    fn parse_inst(&mut self, line: usize, text: &str) -> Result<(), ParseError> {
        let bad = || ParseError::BadLine {
            line,
            text: text.to_string(),
        };
        let caps = INST_RE.captures(text).ok_or_else(bad)?;
        let func = self.funcs.last().ok_or(ParseError::MissingFunction { line })?;
        if func.blocks.is_empty() {
            return Err(bad());
        }
        let defs = match caps.get(1) {
            Some(m) => self.operands(line, func, m.as_str())?,
            None => vec![],
        };
        let rest = caps.get(3).map(|m| m.as_str()).unwrap_or("");
        let inst = match &caps[2] {
            "copy" => {
                let uses = self.operands(line, func, rest)?;
                if defs.len() != 1 || uses.len() != 1 {
                    return Err(bad());
                }
                LIRInst::new(InstrsType::Copy, defs, uses)
            }
            "reload" => LIRInst::new(InstrsType::LoadFromStack, defs, self.operands(line, func, rest)?),
            "store" => LIRInst::new(InstrsType::StoreToStack, defs, self.operands(line, func, rest)?),
            "call" => {
                let (head, clobber_text) = match rest.split_once(" clobbers ") {
                    Some((head, clobbers)) => (head, clobbers),
                    None => (rest, ""),
                };
                let mut head = split_list(head).into_iter();
                let callee = head.next().ok_or_else(bad)?.to_string();
                let args: Vec<&str> = head.collect();
                let uses = self.operands(line, func, &args.join(" "))?;
                let mut clobbers = Bitmap::new();
                for name in split_list(clobber_text) {
                    clobbers.insert(self.phys(line, name)?.bit_code());
                }
                LIRInst::new(InstrsType::Call { callee, clobbers }, defs, uses)
            }
            op => LIRInst::new(
                InstrsType::Op(op.to_string()),
                defs,
                self.operands(line, func, rest)?,
            ),
        };
        let func = self.cur_func(line)?;
        // 输入里已经用到的栈槽不能再分给spill
        for op in inst.defs.iter().chain(inst.uses.iter()) {
            if let Operand::StackSlot(slot) = op {
                func.stack_slots = func.stack_slots.max(slot + 1);
            }
        }
        if let Some(block) = func.blocks.last_mut() {
            block.push_inst(inst);
        }
        Ok(())
    }

    fn parse_line(&mut self, line: usize, text: &str) -> Result<(), ParseError> {
        let bad = || ParseError::BadLine {
            line,
            text: text.to_string(),
        };
        if text == "target riscv" {
            self.info = RegisterInfo::riscv();
            self.declared_target = true;
        } else if let Some(caps) = REG_RE.captures(text) {
            if self.info.num_regs() as i32 >= PHYS_REG_LIMIT {
                return Err(bad());
            }
            let mut units = Vec::new();
            for unit in split_list(&caps[2]) {
                units.push(unit.parse::<usize>().map_err(|_| bad())?);
            }
            self.info.add_reg(&caps[1], &units);
            self.declared_target = true;
        } else if let Some(caps) = CLASS_RE.captures(text) {
            let mut order = Vec::new();
            for name in split_list(&caps[2]) {
                order.push(self.phys(line, name)?);
            }
            self.info.add_class(&caps[1], order);
            self.declared_target = true;
        } else if let Some(caps) = RESERVE_RE.captures(text) {
            for name in split_list(&caps[1]) {
                let reg = self.phys(line, name)?;
                self.info.reserve(reg);
            }
        } else if let Some(caps) = FUNC_RE.captures(text) {
            self.finish_func()?;
            if !self.declared_target {
                self.info = RegisterInfo::riscv();
                self.declared_target = true;
            }
            self.funcs.push(Func::new(&caps[1]));
        } else if let Some(caps) = VREG_RE.captures(text) {
            let vreg = virt_index(line, text, &caps[1])?;
            self.cur_func(line)?;
            let class = self.class(line, &caps[2])?;
            self.cur_func(line)?.declare_vreg(vreg, class);
        } else if let Some(caps) = BLOCK_RE.captures(text) {
            let freq = match caps.get(2) {
                Some(m) => m.as_str().parse::<f32>().map_err(|_| bad())?,
                None => 1.0,
            };
            if !freq.is_finite() || freq < 0.0 {
                return Err(bad());
            }
            let func = self.cur_func(line)?;
            let index = func.add_block(BB::with_freq(&caps[1], freq));
            if let Some(succs) = caps.get(3) {
                for name in split_list(succs.as_str()) {
                    self.pending_succs.push((index, name.to_string()));
                }
            }
        } else {
            self.parse_inst(line, text)?;
        }
        Ok(())
    }

    /// reserve可以出现在函数之后, 整个文件解析完再检查
    fn check_classes(&self) -> Result<(), ParseError> {
        for func in self.funcs.iter() {
            for class in func.vreg_classes.values() {
                let class = self.info.class(*class);
                if class.order.iter().all(|r| self.info.is_reserved(*r)) {
                    return Err(ParseError::NoAllocatableRegister {
                        func: func.label.clone(),
                        class: class.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// 解析整个文件, 返回目标寄存器模型和其中的所有函数
pub fn parse_module(text: &str) -> Result<(RegisterInfo, Vec<Func>), ParseError> {
    let mut parser = Parser::new();
    let mut last_line = 0;
    for (i, raw) in text.lines().enumerate() {
        last_line = i + 1;
        let line = match raw.find('#') {
            Some(pos) => &raw[..pos],
            None => raw,
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        parser.parse_line(i + 1, line)?;
    }
    parser.finish_func()?;
    if parser.funcs.is_empty() {
        return Err(ParseError::MissingFunction { line: last_line });
    }
    parser.check_classes()?;
    Ok((parser.info, parser.funcs))
}

pub fn parse_file(path: &std::path::Path) -> Result<(RegisterInfo, Vec<Func>), ParseError> {
    let text = std::fs::read_to_string(path)?;
    parse_module(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "
        func main
        vreg %0 gpr
        vreg %1 gpr
        block entry freq 1 -> loop   # 入口
          %0 = li
          %1 = copy %0
          call foo a0 clobbers t0 t1
        block loop freq 8 -> loop, exit
          op %1, undef %0
        block exit
          ret
    ";

    #[test]
    fn test_parse_sample() {
        let (info, funcs) = parse_module(SAMPLE).unwrap();
        assert_eq!(funcs.len(), 1);
        let f = &funcs[0];
        assert_eq!(f.label, "main");
        assert_eq!(f.blocks.len(), 3);
        assert_eq!(f.blocks[0].out_edge, vec![1]);
        assert_eq!(f.blocks[1].out_edge, vec![1, 2]);
        assert_eq!(f.blocks[1].freq, 8.0);
        assert_eq!(f.blocks[0].insts[1].copy_regs(), Some((Reg::virt(1), Reg::virt(0))));
        let call = &f.blocks[0].insts[2];
        let t0 = info.reg_by_name("t0").unwrap();
        assert!(call.regmask().unwrap().contains(t0.bit_code()));
        assert_eq!(call.uses, vec![Operand::Reg(info.reg_by_name("a0").unwrap())]);
        assert_eq!(f.blocks[1].insts[0].uses[1], Operand::UndefReg(Reg::virt(0)));
    }

    #[test]
    fn test_roundtrip_text() {
        let (info, funcs) = parse_module(SAMPLE).unwrap();
        let text = funcs[0].to_text(&info);
        let (_, again) = parse_module(&text).unwrap();
        assert_eq!(again[0].blocks, funcs[0].blocks);
    }

    #[test]
    fn test_custom_target() {
        let text = "
            reg r0 units 0
            reg r1 units 1
            reg w0 units 0, 1
            class one r0
            class wide w0
            reserve r1
            func f
            vreg %3 one
            block b
              %3 = op r0
        ";
        let (info, funcs) = parse_module(text).unwrap();
        assert_eq!(info.num_regs(), 3);
        assert!(info.is_reserved(info.reg_by_name("r1").unwrap()));
        assert!(info.regs_overlap(info.reg_by_name("w0").unwrap(), info.reg_by_name("r0").unwrap()));
        assert_eq!(funcs[0].vreg_classes.len(), 1);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            parse_module("vreg %0 gpr"),
            Err(ParseError::MissingFunction { line: 1 })
        ));
        assert!(matches!(
            parse_module("func f\nvreg %0 nope"),
            Err(ParseError::UnknownClass { line: 2, .. })
        ));
        assert!(matches!(
            parse_module("func f\nblock a -> b"),
            Err(ParseError::UnknownBlock { .. })
        ));
        assert!(matches!(
            parse_module("func f\nblock a\n%0 = li"),
            Err(ParseError::UnknownRegister { line: 3, .. })
        ));
        assert!(matches!(
            parse_module("func f\nvreg %0 gpr\nblock a\n%0 = copy"),
            Err(ParseError::BadLine { line: 4, .. })
        ));
        assert!(matches!(parse_module(""), Err(ParseError::MissingFunction { .. })));
        let e = ParseError::UnknownBlock {
            func: "f".to_string(),
            name: "b".to_string(),
        };
        assert_eq!(e.to_string(), "func f: unknown block b");
    }

    #[test]
    fn test_input_limits() {
        let mut regs = String::new();
        for i in 0..PHYS_REG_LIMIT {
            regs.push_str(&format!("reg r{} units {}\n", i, i));
        }
        // 第65个物理寄存器
        let text = format!("{}reg extra units 99\nclass c r0\nfunc f", regs);
        assert!(matches!(parse_module(&text), Err(ParseError::BadLine { line: 65, .. })));
        assert!(matches!(
            parse_module("func f\nvreg %2147483647 gpr"),
            Err(ParseError::BadLine { line: 2, .. })
        ));
        assert!(matches!(
            parse_module("func f\nvreg %0 gpr\nblock a\nop %-1"),
            Err(ParseError::BadLine { line: 4, .. })
        ));
        assert!(matches!(
            parse_module("func f\nblock a freq 1e40"),
            Err(ParseError::BadLine { line: 2, .. })
        ));
        assert!(matches!(
            parse_module("func f\nblock a freq -2"),
            Err(ParseError::BadLine { line: 2, .. })
        ));
        assert!(parse_module("func f\nblock a freq 0").is_ok());
    }

    #[test]
    fn test_class_without_unreserved_register() {
        let text = "
            reg r0 units 0
            class one r0
            func f
            vreg %0 one
            block entry
              op undef %0
            reserve r0
        ";
        assert_eq!(
            parse_module(text).unwrap_err(),
            ParseError::NoAllocatableRegister {
                func: "f".to_string(),
                class: "one".to_string(),
            }
        );
    }

    #[test]
    fn test_stack_slots_in_input_are_taken() {
        let text = "
            func f
            vreg %0 gpr
            block entry
              %0 = reload ss2
              store %0, ss0
        ";
        let (_, mut funcs) = parse_module(text).unwrap();
        assert_eq!(funcs[0].stack_slots, 3);
        assert_eq!(funcs[0].new_stack_slot(), 3);
    }
}
