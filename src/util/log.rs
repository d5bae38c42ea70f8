//! 条件编译日志系统
//!
//! 根据 feature 选择不同的日志后端:
//! - `log-defmt`: 使用 defmt (高效二进制日志)
//! - `dev` / `log-std`: 使用 `log` 门面 (主机端由 simplelog 输出文本)
//! - 无日志 feature: 完全禁用日志 (零开销)
//!
//! # 日志级别
//! - `log_error!`: 错误信息
//! - `log_warn!`: 警告信息 (缓冲区满、跳过写入)
//! - `log_info!`: 一般信息 (写入、读取、状态报告)
//! - `log_debug!`: 调试信息
//! - `log_trace!`: 详细跟踪 (空读、超时)
//!
//! 宏通过 `#[macro_use]` 在 crate 内可见，对外由 `#[macro_export]` 导出。

// ===================================================================
// defmt 后端 (feature = "log-defmt")
// ===================================================================
#[cfg(feature = "log-defmt")]
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => { ::defmt::info!($($arg)*) };
}

#[cfg(feature = "log-defmt")]
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => { ::defmt::debug!($($arg)*) };
}

#[cfg(feature = "log-defmt")]
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => { ::defmt::warn!($($arg)*) };
}

#[cfg(feature = "log-defmt")]
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => { ::defmt::error!($($arg)*) };
}

#[cfg(feature = "log-defmt")]
#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => { ::defmt::trace!($($arg)*) };
}

// ===================================================================
// log 门面后端 (feature = "dev" 或 "log-std")
// ===================================================================
#[cfg(all(feature = "log-std", not(feature = "log-defmt")))]
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => { ::log::info!($($arg)*) };
}

#[cfg(all(feature = "log-std", not(feature = "log-defmt")))]
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => { ::log::debug!($($arg)*) };
}

#[cfg(all(feature = "log-std", not(feature = "log-defmt")))]
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => { ::log::warn!($($arg)*) };
}

#[cfg(all(feature = "log-std", not(feature = "log-defmt")))]
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => { ::log::error!($($arg)*) };
}

#[cfg(all(feature = "log-std", not(feature = "log-defmt")))]
#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => { ::log::trace!($($arg)*) };
}

// ===================================================================
// 空实现 (无日志 feature)
// ===================================================================
#[cfg(not(any(feature = "log-std", feature = "log-defmt")))]
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {{}};
}

#[cfg(not(any(feature = "log-std", feature = "log-defmt")))]
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {{}};
}

#[cfg(not(any(feature = "log-std", feature = "log-defmt")))]
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {{}};
}

#[cfg(not(any(feature = "log-std", feature = "log-defmt")))]
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {{}};
}

#[cfg(not(any(feature = "log-std", feature = "log-defmt")))]
#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => {{}};
}

// ===================================================================
// 性能计时宏 (启用日志时有效)
// ===================================================================

/// 测量代码块执行时间，结果以 trace 级别输出
///
/// # Example
/// ```ignore
/// let report = timed!("monitor snapshot", monitor.report());
/// // 输出: [TIME] monitor snapshot: 12us
/// ```
#[cfg(any(feature = "log-std", feature = "log-defmt"))]
#[macro_export]
macro_rules! timed {
    ($name:expr, $block:expr) => {{
        let start = ::embassy_time::Instant::now();
        let result = $block;
        let elapsed = start.elapsed().as_micros();
        $crate::log_trace!("[TIME] {}: {}us", $name, elapsed);
        result
    }};
}

#[cfg(not(any(feature = "log-std", feature = "log-defmt")))]
#[macro_export]
macro_rules! timed {
    ($name:expr, $block:expr) => {
        $block
    };
}

// ===================================================================
// 断言宏 (release 模式下不检查)
// ===================================================================

/// Debug 断言 (仅在 debug 模式下检查)，失败时先记录日志再 panic
#[macro_export]
macro_rules! debug_assert_msg {
    ($cond:expr, $($arg:tt)*) => {
        #[cfg(debug_assertions)]
        {
            if !$cond {
                $crate::log_error!($($arg)*);
                panic!("Assertion failed");
            }
        }
    };
}
