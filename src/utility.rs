/// 往日志目录下的指定文件追加一行信息
/// 只有通过 config::set_log_dir 打开日志之后才会真正写文件
#[macro_export]
macro_rules! log_file {
    ($file:expr, $($arg:tt)*) => {
        if $crate::config::log_enabled() {
            $crate::config::append_log($file, &format!($($arg)*), true);
        }
    };
}

/// 同 log_file, 但是不换行
#[macro_export]
macro_rules! log_file_uln {
    ($file:expr, $($arg:tt)*) => {
        if $crate::config::log_enabled() {
            $crate::config::append_log($file, &format!($($arg)*), false);
        }
    };
}
