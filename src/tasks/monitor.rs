//! 监视任务
//!
//! 定期同时锁住两个缓冲区，拷贝一致的快照后输出。
//! 两把锁总是按 rank 从小到大获取 (Buffer1 先于 Buffer2)，
//! 这是系统中唯一同时持有两把锁的地方。监视任务从不修改缓冲区。

use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, RawMutex};
use embassy_time::{Duration, Ticker};

use crate::sync::{inspect_pair, BoundedRingBuffer, GuardedBuffer};

/// 单个缓冲区的状态快照
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferState<const N: usize> {
    pub name: &'static str,
    pub count: usize,
    pub head: usize,
    pub tail: usize,
    /// tail -> head 顺序的内容
    pub contents: heapless::Vec<i32, N>,
}

impl<const N: usize> BufferState<N> {
    /// 从已加锁的环形缓冲区拷贝状态
    pub fn capture(name: &'static str, ring: &BoundedRingBuffer<i32, N>) -> Self {
        Self {
            name,
            count: ring.len(),
            head: ring.head(),
            tail: ring.tail(),
            contents: ring.snapshot(),
        }
    }
}

/// 一次监视报告，按加锁顺序排列
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorReport<const N: usize> {
    pub buffers: [BufferState<N>; 2],
}

impl<const N: usize> MonitorReport<N> {
    /// 输出报告
    pub fn emit(&self) {
        log_info!("=== Buffer Status ===");
        for state in self.buffers.iter() {
            log_info!(
                "{}: count={}/{}, head={}, tail={}, contents={:?}",
                state.name,
                state.count,
                N,
                state.head,
                state.tail,
                state.contents.as_slice()
            );
        }
        log_info!("====================");
    }
}

/// 监视任务
pub struct MonitorTask<'a, const N: usize, M: RawMutex = CriticalSectionRawMutex> {
    /// 已按 rank 排序
    buffers: [&'a GuardedBuffer<i32, N, M>; 2],
    period: Duration,
}

impl<'a, const N: usize, M: RawMutex> MonitorTask<'a, N, M> {
    /// 创建监视任务，参数顺序不影响加锁顺序
    pub fn new(
        first: &'a GuardedBuffer<i32, N, M>,
        second: &'a GuardedBuffer<i32, N, M>,
        period: Duration,
    ) -> Self {
        let buffers = if first.rank() <= second.rank() {
            [first, second]
        } else {
            [second, first]
        };

        Self { buffers, period }
    }

    #[inline(always)]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// 在同时持有两把锁的情况下拷贝两个缓冲区的状态
    pub fn report(&self) -> MonitorReport<N> {
        let [first, second] = self.buffers;

        inspect_pair(first, second, |a, b| MonitorReport {
            buffers: [
                BufferState::capture(first.name(), a),
                BufferState::capture(second.name(), b),
            ],
        })
    }

    /// 以配置的周期输出 `reports` 次报告
    pub async fn run_reports(&self, reports: u32) {
        let mut ticker = Ticker::every(self.period);

        for _ in 0..reports {
            let report = timed!("monitor snapshot", self.report());
            report.emit();
            ticker.next().await;
        }
    }

    /// 以配置的周期永久运行
    pub async fn run(self) -> ! {
        log_info!(
            "[MONITOR] started: {} and {}, every {} ms",
            self.buffers[0].name(),
            self.buffers[1].name(),
            self.period.as_millis()
        );

        let mut ticker = Ticker::every(self.period);

        loop {
            let report = timed!("monitor snapshot", self.report());
            report.emit();
            ticker.next().await;
        }
    }
}
