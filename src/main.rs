use std::path::{Path, PathBuf};

use pbqplib::backend::func::context::FuncContext;
use pbqplib::backend::func::parse::parse_file;
use pbqplib::backend::regalloc::pbqp_alloc::Allocator;
use pbqplib::backend::regalloc::regalloc::Regalloc;
use pbqplib::config::{self, HeuristicKind, PbqpOptions};

fn main() {
    run_main();
}

fn run_main() {
    use clap::{App, Arg};
    // 获取命令行解析
    let matches = App::new("pbqp-regalloc")
        .arg(Arg::with_name("filename").required(true))
        .arg(Arg::with_name("o").short("o").takes_value(true))
        .arg(Arg::with_name("coalescing").long("coalescing"))
        .arg(
            Arg::with_name("dump-graphs")
                .long("dump-graphs")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("heuristic")
                .long("heuristic")
                .takes_value(true)
                .possible_values(&["ratio", "degree", "random"])
                .default_value("ratio"),
        )
        .arg(Arg::with_name("seed").long("seed").takes_value(true))
        .arg(Arg::with_name("log").long("log").takes_value(true))
        .get_matches();

    // 获取文件名
    let filename = matches.value_of("filename").unwrap_or_default();

    // 日志目录
    config::set_log_dir(matches.value_of("log").map(Path::new));

    let seed = match matches.value_of("seed").map(|s| s.parse::<u64>()) {
        Some(Ok(seed)) => seed,
        Some(Err(e)) => {
            eprintln!("error: bad seed: {}", e);
            std::process::exit(1);
        }
        None => 0,
    };
    let heuristic = match matches.value_of("heuristic") {
        Some("degree") => HeuristicKind::LowestDegree,
        Some("random") => HeuristicKind::Random(seed),
        _ => HeuristicKind::SpillCostRatio,
    };
    let options = PbqpOptions::new()
        .with_coalescing(matches.is_present("coalescing"))
        .with_heuristic(heuristic)
        .with_dump_graphs(matches.value_of("dump-graphs").map(PathBuf::from));

    // 读取并解析文件
    let (info, mut funcs) = match parse_file(Path::new(filename)) {
        Ok(module) => module,
        Err(e) => {
            eprintln!("error: {}: {}", filename, e);
            std::process::exit(1);
        }
    };

    // 逐个函数分配并改写
    let mut out = String::new();
    for func in funcs.iter_mut() {
        let stat = {
            let mut ctx = FuncContext::new(func, &info);
            Allocator::new(options.clone()).alloc(&mut ctx)
        };
        func.rewrite(&stat);
        out.push_str(&func.to_text(&info));
        out.push_str(&format!(
            "# rounds {}, spilled {}, stack slots {}\n\n",
            stat.rounds,
            stat.spillings.len(),
            stat.stack_slots
        ));
    }

    // 输出文件名
    match matches.value_of("o") {
        Some(output) => {
            if let Err(e) = std::fs::write(output, out) {
                eprintln!("error: {}: {}", output, e);
                std::process::exit(1);
            }
        }
        None => print!("{}", out),
    }

    config::dump();
}
