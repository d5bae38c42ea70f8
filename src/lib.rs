//! dualring - 交叉连接的双环形缓冲区交换
//!
//! 两个交换任务通过一对有界缓冲区互相传递数据，监视任务定期输出缓冲区状态:
//! - Task1 写 Buffer1、读 Buffer2
//! - Task2 写 Buffer2、读 Buffer1
//! - Monitor 按固定顺序锁住两个缓冲区并输出快照
//!
//! 本库提供以下核心功能:
//! - 定长环形缓冲区 (外部加锁)
//! - 带锁和广播事件的缓冲区
//! - 交换任务与监视任务
//! - 条件编译日志系统

#![cfg_attr(not(test), no_std)]

#[macro_use]
pub mod util;

pub mod sync;
pub mod tasks;

// ===== 重导出常用类型 =====
pub use sync::{
    AtomicCounter,
    BoundedRingBuffer,
    BufferError,
    EventListener,
    GuardedBuffer,
    SpinRawMutex,
};
pub use tasks::exchange::{ExchangeConfig, ExchangeTask, StepOrder};
pub use tasks::monitor::MonitorTask;

// ===== 版本信息 =====
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// 交换系统使用的缓冲区类型，每个缓冲区一把独立的锁
pub type ExchangeBuffer = GuardedBuffer<i32, { config::BUFFER_CAPACITY }, SpinRawMutex>;

/// 系统配置常量
pub mod config {
    /// 每个缓冲区的容量
    pub const BUFFER_CAPACITY: usize = 10;

    /// Task1 周期 (ms): 写 Buffer1，读 Buffer2
    pub const TASK1_PERIOD_MS: u64 = 200;

    /// Task2 周期 (ms): 读 Buffer1，写 Buffer2
    pub const TASK2_PERIOD_MS: u64 = 300;

    /// 监视任务输出周期 (ms)
    pub const MONITOR_PERIOD_MS: u64 = 1000;

    /// 读取步骤等待事件的超时 (ms)
    pub const DRAIN_TIMEOUT_MS: u64 = 10;

    /// 每个缓冲区事件源的最大监听者数量
    pub const MAX_LISTENERS: usize = 4;
}
