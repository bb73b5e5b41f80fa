//! 从文本构造函数, 完整跑一遍PBQP分配

use std::collections::BTreeSet;

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::backend::func::context::FuncContext;
use crate::backend::func::parse::parse_module;
use crate::backend::func::Func;
use crate::backend::operand::Reg;
use crate::backend::pbqp::{build_heuristic, solve};
use crate::backend::regalloc::pbqp_alloc::{
    Allocator, Interference, PBQPRAConstraint, SpillCosts, ZERO_WEIGHT_SPILL_COST,
};
use crate::backend::regalloc::regalloc::{
    AllocFunction, LiveRangeQuery, Regalloc, RegisterModel,
};
use crate::backend::regalloc::structs::{FuncAllocStat, GraphMetadata, PBQPRAGraph};
use crate::backend::target::RegisterInfo;
use crate::config::{HeuristicKind, PbqpOptions};

const ONE_REG: &str = "
    reg r0 units 0
    class one r0
";

const TWO_REGS: &str = "
    reg r0 units 0
    reg r1 units 1
    class two r0 r1
";

const ALIASED: &str = "
    reg r0 units 0
    reg r1 units 1
    reg r2 units 2
    reg w0 units 0, 1
    reg w1 units 1, 2
    class narrow r0 r1 r2
    class wide w0 w1
";

/// 分配结果必须合法: 所有还在指令里的虚拟寄存器都有物理寄存器,
/// 重叠的区间不会拿到重叠的寄存器, 不会用到保留的, 被调用破坏的或者与物理寄存器冲突的寄存器
fn check_assignment(ctx: &FuncContext, stat: &FuncAllocStat) {
    let mut vregs = BTreeSet::new();
    for block in ctx.func.blocks.iter() {
        for inst in block.insts.iter() {
            vregs.extend(inst.get_regs().into_iter().filter(|r| r.is_virtual()));
        }
    }
    let reserved = ctx.reserved();
    for vreg in vregs.iter() {
        let preg = match stat.phys_of(*vreg) {
            Some(preg) => preg,
            None => panic!("{} is left unallocated", vreg),
        };
        assert!(!stat.is_spilled(*vreg), "{} is both spilled and assigned", vreg);
        assert!(!reserved.contains(preg.bit_code()));
        assert!(!ctx.reg_units_overlapping(*vreg, preg), "{} clashes with {}", vreg, preg);
        assert!(!ctx.regmask_clobbers_overlapping(*vreg).contains(preg.bit_code()));
        let class = ctx.reg_class(*vreg).unwrap();
        assert!(ctx.allocation_order(class).contains(&preg));
    }
    let vregs: Vec<Reg> = vregs.into_iter().collect();
    for (i, a) in vregs.iter().enumerate() {
        for b in vregs[i + 1..].iter() {
            if ctx.overlaps(*a, *b) {
                let (pa, pb) = (stat.phys_of(*a).unwrap(), stat.phys_of(*b).unwrap());
                assert!(!ctx.regs_overlap(pa, pb), "{} and {} share {}", a, b, pa);
            }
        }
    }
}

fn run(text: &str, options: PbqpOptions) -> (RegisterInfo, Func, FuncAllocStat) {
    let (info, mut funcs) = parse_module(text).unwrap();
    let mut func = funcs.remove(0);
    let stat = {
        let mut ctx = FuncContext::new(&mut func, &info);
        let stat = Allocator::new(options).alloc(&mut ctx);
        check_assignment(&ctx, &stat);
        stat
    };
    func.rewrite(&stat);
    (info, func, stat)
}

fn reg(info: &RegisterInfo, name: &str) -> Reg {
    info.reg_by_name(name).unwrap()
}

#[test]
fn test_overlap_in_single_register_class() {
    let text = format!(
        "{}
        func f
        vreg %0 one
        vreg %1 one
        block entry
          %0 = li
          %1 = li
          op %0, %1
        ",
        ONE_REG
    );
    let (_, func, stat) = run(&text, PbqpOptions::new());
    assert!(!stat.spillings.is_empty());
    assert!(stat.rounds >= 2);
    assert!(stat.stack_slots >= 1);
    // 改写之后不再有虚拟寄存器
    for inst in func.blocks[0].insts.iter() {
        assert!(inst.get_regs().iter().all(|r| r.is_physic()));
    }
}

#[test]
fn test_disjoint_ranges_share_register() {
    let text = format!(
        "{}
        func f
        vreg %0 one
        vreg %1 one
        block entry
          %0 = li
          op %0
          %1 = li
          op %1
        ",
        ONE_REG
    );
    let (info, _, stat) = run(&text, PbqpOptions::new());
    let r0 = reg(&info, "r0");
    assert_eq!(stat.phys_of(Reg::virt(0)), Some(r0));
    assert_eq!(stat.phys_of(Reg::virt(1)), Some(r0));
    assert!(stat.spillings.is_empty());
    assert_eq!(stat.rounds, 1);
    assert_eq!(stat.stack_slots, 0);
}

#[test]
fn test_coalescing_with_physical_register() {
    let text = format!(
        "{}
        func f
        vreg %0 two
        block entry
          %0 = li
          r1 = copy %0
          op r1
        ",
        TWO_REGS
    );
    let (info, _, stat) = run(&text, PbqpOptions::new());
    assert_eq!(stat.phys_of(Reg::virt(0)), Some(reg(&info, "r0")));
    let (info, func, stat) = run(&text, PbqpOptions::new().with_coalescing(true));
    let r1 = reg(&info, "r1");
    assert_eq!(stat.phys_of(Reg::virt(0)), Some(r1));
    assert_eq!(func.blocks[0].insts[1].copy_regs(), Some((r1, r1)));
}

#[test]
fn test_coalescing_between_virtual_registers() {
    // r0 跨过 %0 的定义, %0 只能用 r1
    let text = format!(
        "{}
        func f
        vreg %0 two
        vreg %1 two
        block entry
          r0 = li
          %0 = li
          op r0
          %1 = copy %0
          op %1
        ",
        TWO_REGS
    );
    let (info, _, stat) = run(&text, PbqpOptions::new());
    assert_eq!(stat.phys_of(Reg::virt(0)), Some(reg(&info, "r1")));
    assert_eq!(stat.phys_of(Reg::virt(1)), Some(reg(&info, "r0")));
    let (info, func, stat) = run(&text, PbqpOptions::new().with_coalescing(true));
    let r1 = reg(&info, "r1");
    assert_eq!(stat.phys_of(Reg::virt(0)), Some(r1));
    assert_eq!(stat.phys_of(Reg::virt(1)), Some(r1));
    assert_eq!(func.blocks[0].insts[3].copy_regs(), Some((r1, r1)));
}

const COLD_TEXT: &str = "
    func f
    vreg %0 one
    vreg %1 one
    block entry freq 1 -> cold
      %1 = li
    block cold freq 0 -> exit
      %0 = li
      op %0
    block exit freq 1
      op %1
";

#[test]
fn test_zero_weight_spill_cost() {
    let text = format!("{}{}", ONE_REG, COLD_TEXT);
    let (info, mut funcs) = parse_module(&text).unwrap();
    let ctx = FuncContext::new(&mut funcs[0], &info);
    assert_eq!(ctx.weight(Reg::virt(0)), 0.0);
    assert!(ctx.overlaps(Reg::virt(0), Reg::virt(1)));

    let mut allocator = Allocator::new(PbqpOptions::new());
    allocator.init(&ctx);
    let mut g: PBQPRAGraph = PBQPRAGraph::new(GraphMetadata::new(&ctx, ctx.reserved()));
    allocator.initialize_graph(&mut g);
    SpillCosts.apply(&mut g);
    Interference.apply(&mut g);
    let cold = g.metadata().node_id_for_vreg(Reg::virt(0)).unwrap();
    let hot = g.metadata().node_id_for_vreg(Reg::virt(1)).unwrap();
    assert_eq!(g.node_costs(cold)[0], ZERO_WEIGHT_SPILL_COST);
    assert!(g.node_costs(hot)[0] > 0.0);
    assert_eq!(g.num_edges(), 1);

    let mut heuristic = build_heuristic(HeuristicKind::SpillCostRatio);
    let solution = solve(&g, heuristic.as_mut());
    // 死的区间让出唯一的寄存器
    assert_eq!(solution.selection(cold), 0);
    assert_eq!(solution.selection(hot), 1);
}

#[test]
fn test_zero_weight_range_spilled_first() {
    let text = format!("{}{}", ONE_REG, COLD_TEXT);
    let (_, _, stat) = run(&text, PbqpOptions::new());
    assert!(stat.is_spilled(Reg::virt(0)));
}

#[test]
fn test_empty_range_uses_first_unreserved() {
    let text = "
        func f
        vreg %0 gpr
        vreg %1 gpr
        block entry
          op undef %0
    ";
    let (info, func, stat) = run(text, PbqpOptions::new());
    assert_eq!(stat.phys_of(Reg::virt(0)), Some(reg(&info, "t0")));
    // 没有操作数的寄存器不分配
    assert_eq!(stat.phys_of(Reg::virt(1)), None);
    // 没有要进图的寄存器, 不跑PBQP
    assert_eq!(stat.rounds, 0);
    assert_eq!(func.to_text(&info).lines().last(), Some("  op undef t0"));
}

#[test]
fn test_wide_register_blocked_by_unit() {
    // r0 活跃时 w0 不能用, w1 是唯一的选择
    let text = format!(
        "{}
        func f
        vreg %0 wide
        block entry
          r0 = li
          %0 = li
          op r0, %0
        ",
        ALIASED
    );
    let (info, _, stat) = run(&text, PbqpOptions::new());
    assert_eq!(stat.phys_of(Reg::virt(0)), Some(reg(&info, "w1")));
}

#[test]
fn test_unallocatable_range_folds_to_stack() {
    let text = format!(
        "{}
        func f
        vreg %0 wide
        block entry
          r0 = li
          r2 = li
          %0 = li
          op r0, r2, %0
        ",
        ALIASED
    );
    let (info, func, stat) = run(&text, PbqpOptions::new());
    assert!(stat.is_spilled(Reg::virt(0)));
    // 两轮: 第二轮只有不能再spill的寄存器, 全部折叠进栈槽
    assert_eq!(stat.rounds, 2);
    assert_eq!(stat.stack_slots, 1);
    let text = func.to_text(&info);
    assert!(text.contains("ss0 = li"));
    assert!(text.contains("op r0, r2, ss0"));
}

#[test]
fn test_spill_slots_after_input_slots() {
    let text = format!(
        "{}
        func f
        vreg %0 one
        vreg %1 one
        block entry
          %0 = li
          %1 = reload ss0
          op %0, %1
        ",
        ONE_REG
    );
    let (info, func, stat) = run(&text, PbqpOptions::new());
    assert!(!stat.spillings.is_empty());
    assert!(stat.stack_slots >= 2);
    let text = func.to_text(&info);
    // 输入的reload还在, spill不会往ss0里写
    assert!(text.contains("reload ss0"));
    assert!(text.lines().any(|l| l.contains("store")));
    assert!(text
        .lines()
        .filter(|l| l.contains("store"))
        .all(|l| !l.contains("ss0")));
}

#[test]
fn test_call_clobbers_excluded() {
    let text = "
        func f
        vreg %0 gpr
        block entry
          %0 = li
          call g clobbers t0 t1 t2
          ret %0
    ";
    let (info, _, stat) = run(text, PbqpOptions::new());
    // t0 t1 t2 被调用破坏, 下一个是 s0
    assert_eq!(stat.phys_of(Reg::virt(0)), Some(reg(&info, "s0")));
}

#[test]
fn test_dump_graphs_per_round() {
    let dir = std::env::temp_dir().join(format!("pbqp_dump_{}", std::process::id()));
    let text = format!(
        "{}
        func dumped
        vreg %0 one
        vreg %1 one
        block entry
          %0 = li
          %1 = li
          op %0, %1
        ",
        ONE_REG
    );
    let (_, _, stat) = run(&text, PbqpOptions::new().with_dump_graphs(Some(dir.clone())));
    for round in 1..=stat.rounds {
        assert!(dir.join(format!("dumped.{}.pbqpgraph", round)).exists());
        assert!(dir.join(format!("dumped.{}.dot", round)).exists());
    }
    let first = std::fs::read_to_string(dir.join("dumped.1.pbqpgraph")).unwrap();
    assert!(first.contains("%0 [spill r0]"));
    assert!(first.contains("edge"));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_dump_failure_does_not_abort() {
    // 目录位置上是一个普通文件, 所有dump都会失败
    let path = std::env::temp_dir().join(format!("pbqp_dump_file_{}", std::process::id()));
    std::fs::write(&path, "x").unwrap();
    let text = format!(
        "{}
        func f
        vreg %0 one
        block entry
          %0 = li
          op %0
        ",
        ONE_REG
    );
    let (info, _, stat) = run(&text, PbqpOptions::new().with_dump_graphs(Some(path.clone())));
    assert_eq!(stat.phys_of(Reg::virt(0)), Some(reg(&info, "r0")));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "x");
    let _ = std::fs::remove_file(&path);
}

fn random_program(rng: &mut StdRng) -> String {
    let num_vregs = rng.gen_range(2..10);
    let num_blocks = rng.gen_range(1..4);
    let mut text = String::from(ALIASED);
    text.push_str("func rand\n");
    for v in 0..num_vregs {
        let class = if rng.gen_bool(0.3) { "wide" } else { "narrow" };
        text.push_str(&format!("vreg %{} {}\n", v, class));
    }
    for b in 0..num_blocks {
        let freq = [0.0, 1.0, 4.0][rng.gen_range(0..3)];
        let mut succs = Vec::new();
        if b + 1 < num_blocks {
            succs.push(format!("b{}", b + 1));
        }
        if b > 0 && rng.gen_bool(0.3) {
            succs.push(format!("b{}", b));
        }
        text.push_str(&format!("block b{} freq {}", b, freq));
        if !succs.is_empty() {
            text.push_str(&format!(" -> {}", succs.join(", ")));
        }
        text.push('\n');
        for _ in 0..rng.gen_range(1..6) {
            let d = rng.gen_range(0..num_vregs);
            let u1 = rng.gen_range(0..num_vregs);
            let u2 = rng.gen_range(0..num_vregs);
            let line = match rng.gen_range(0..6) {
                0 => format!("%{} = op %{}, %{}", d, u1, u2),
                1 => format!("%{} = copy %{}", d, u1),
                2 => format!("call g %{} clobbers r1", u1),
                3 => "r2 = li".to_string(),
                4 => format!("op r2, undef %{}", u1),
                _ => format!("%{} = li", d),
            };
            text.push_str(&line);
            text.push('\n');
        }
    }
    text
}

#[test]
fn test_random_programs_allocate_legally() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..40 {
        let text = random_program(&mut rng);
        let num_vregs = parse_module(&text).unwrap().1[0].vreg_classes.len();
        for heuristic in [
            HeuristicKind::SpillCostRatio,
            HeuristicKind::LowestDegree,
            HeuristicKind::Random(3),
        ]
        .iter()
        {
            for coalescing in [false, true].iter() {
                let options = PbqpOptions::new()
                    .with_heuristic(*heuristic)
                    .with_coalescing(*coalescing);
                let (_, _, stat) = run(&text, options);
                // 每一轮继续都至少spill掉一个原来的寄存器
                assert!(stat.rounds <= num_vregs + 1, "{}", text);
            }
        }
    }
}
