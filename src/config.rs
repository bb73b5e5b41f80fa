use std::{
    collections::{HashMap, HashSet, LinkedList},
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::Mutex,
};

use lazy_static::lazy_static;

use crate::log_file;

///选择RN规约节点的启发式
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeuristicKind {
    /// spill cost / degree 最小的优先
    SpillCostRatio,
    /// 度数最小的优先
    LowestDegree,
    /// 随机选择,参数为随机种子
    Random(u64),
}

impl Default for HeuristicKind {
    fn default() -> Self {
        HeuristicKind::SpillCostRatio
    }
}

///PBQP分配器的选项
#[derive(Clone, Debug, Default)]
pub struct PbqpOptions {
    /// 是否在构图时加入合并(coalescing)代价
    pub coalescing: bool,
    /// 每一轮的图dump到这个目录下, None表示不dump
    pub dump_graphs: Option<PathBuf>,
    pub heuristic: HeuristicKind,
}

impl PbqpOptions {
    pub fn new() -> PbqpOptions {
        PbqpOptions::default()
    }
    pub fn with_coalescing(mut self, coalescing: bool) -> PbqpOptions {
        self.coalescing = coalescing;
        self
    }
    pub fn with_heuristic(mut self, heuristic: HeuristicKind) -> PbqpOptions {
        self.heuristic = heuristic;
        self
    }
    pub fn with_dump_graphs(mut self, dir: Option<PathBuf>) -> PbqpOptions {
        self.dump_graphs = dir;
        self
    }
}

///记录需要保存打印的各种信息
///统计分配的表现,记录产生的各种属性
/// 1. spill数量
/// 2. 分配轮数
/// 3. RN启发式规约次数
/// 信息格式: {信息要输出到的文件名}-{函数名}-{信息}
struct ConfigInfo {
    file_infos: HashMap<String, LinkedList<String>>, //记录要写入的文件以及要往文件中写入的信息 (默认是append模式)
    times: HashMap<String, i32>,                     //统计各种事件次数
    baned_set: HashSet<String>,
}

impl ConfigInfo {
    fn new() -> ConfigInfo {
        let mut info = ConfigInfo {
            file_infos: HashMap::new(),
            times: HashMap::new(),
            baned_set: HashSet::new(),
        };
        for kind in ORDER.iter() {
            info.times.insert(kind.to_string(), 0);
        }
        info
    }

    fn record(&mut self, path: &str, kind: &str, msg: String) {
        *self.times.entry(kind.to_string()).or_insert(0) += 1;
        self.file_infos
            .entry(path.to_string())
            .or_insert_with(LinkedList::new)
            .push_back(msg);
    }
}

const ORDER: [&str; 3] = ["spill", "round", "rn_reduction"];

lazy_static! {
    static ref LOG_DIR: Mutex<Option<PathBuf>> = Mutex::new(None);
    static ref CONFIG_INFO: Mutex<ConfigInfo> = Mutex::new(ConfigInfo::new());
}

///打开(Some)或者关闭(None)文件日志
pub fn set_log_dir(dir: Option<&Path>) {
    if let Some(dir) = dir {
        let _ = fs::create_dir_all(dir);
    }
    *LOG_DIR.lock().unwrap_or_else(|e| e.into_inner()) = dir.map(Path::to_path_buf);
}

pub fn log_enabled() -> bool {
    LOG_DIR.lock().unwrap_or_else(|e| e.into_inner()).is_some()
}

/// log_file!的落地实现,写失败直接忽略,日志不能影响分配
pub fn append_log(file: &str, msg: &str, newline: bool) {
    let dir = match LOG_DIR.lock().unwrap_or_else(|e| e.into_inner()).clone() {
        Some(dir) => dir,
        None => return,
    };
    let banned = CONFIG_INFO
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .baned_set
        .contains(file);
    if banned {
        return;
    }
    let path = dir.join(file);
    if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(path) {
        let _ = if newline {
            writeln!(f, "{}", msg)
        } else {
            write!(f, "{}", msg)
        };
    }
}

///记录在ban列表中的文件就不会被打印
pub fn ban(path: &str) {
    CONFIG_INFO
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .baned_set
        .insert(path.to_string());
}

///每发生一次spill调用一次
pub fn record_spill(func: &str, msg: &str) {
    let msg = format!("{} :{}", func, msg);
    CONFIG_INFO
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .record("spill.txt", "spill", msg);
}

///每完成一轮PBQP求解调用一次
pub fn record_round(func: &str, msg: &str) {
    let msg = format!("{} :{}", func, msg);
    CONFIG_INFO
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .record("round.txt", "round", msg);
}

///求解器每用一次RN启发式调用一次
pub fn record_heuristic(func: &str, msg: &str) {
    let msg = format!("{} :{}", func, msg);
    CONFIG_INFO
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .record("rn_reduction.txt", "rn_reduction", msg);
}

///获取某类事件目前为止的发生次数
pub fn times(kind: &str) -> i32 {
    *CONFIG_INFO
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .times
        .get(kind)
        .unwrap_or(&0)
}

///把信息打印出来
pub fn dump() {
    // 先把要写的内容取出来,append_log里面还要再拿锁
    let (file_infos, totals) = {
        let info = CONFIG_INFO.lock().unwrap_or_else(|e| e.into_inner());
        let file_infos: Vec<(String, Vec<String>)> = info
            .file_infos
            .iter()
            .map(|(file, infos)| (file.clone(), infos.iter().cloned().collect()))
            .collect();
        let totals: Vec<(&str, i32)> = ORDER
            .iter()
            .map(|kind| (*kind, *info.times.get(*kind).unwrap_or(&0)))
            .collect();
        (file_infos, totals)
    };
    for (file, infos) in file_infos.iter() {
        for info in infos.iter() {
            log_file!(file, "{}", info);
        }
    }
    //统计的总属性输出到一个专门的文件中
    for (kind, times) in totals {
        log_file!("performance_eval.txt", "{}\t:{} times", kind, times);
    }
}
