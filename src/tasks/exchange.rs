//! 交换任务
//!
//! 每个交换任务写一个缓冲区 (outbox)，读另一个缓冲区 (inbox)，
//! 两个任务交叉连接形成双向流水线:
//! - Task1: 写 Buffer1，读 Buffer2
//! - Task2: 写 Buffer2，读 Buffer1
//!
//! 每个周期执行一次写步骤和一次读步骤，然后等待下一个周期:
//! 1. 写: 从共享计数器取下一个值写入 outbox，满则记录并丢弃
//! 2. 读: 在锁外等待 inbox 的写入广播 (有超时)，然后尝试读一次，
//!    无论是收到广播还是超时都同样处理，读空不算错误
//!
//! 任何时刻一个交换任务最多持有一把缓冲区锁，且从不持锁等待。
//! "Added" / "Read" 日志在缓冲区锁内输出，同一个值的写入记录总在读取记录之前。

use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, RawMutex};
use embassy_time::{Duration, Ticker};

use crate::config::{DRAIN_TIMEOUT_MS, TASK1_PERIOD_MS, TASK2_PERIOD_MS};
use crate::sync::{AtomicCounter, BufferError, EventListener, GuardedBuffer};

/// 一个周期内写步骤和读步骤的先后顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "log-defmt", derive(defmt::Format))]
pub enum StepOrder {
    /// 先写 outbox 再读 inbox
    ProduceFirst,
    /// 先读 inbox 再写 outbox
    DrainFirst,
}

/// 交换任务配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeConfig {
    /// 日志中的任务标识
    pub name: &'static str,
    /// 周期
    pub period: Duration,
    /// 读步骤等待广播的超时
    pub drain_timeout: Duration,
    /// 步骤顺序
    pub order: StepOrder,
}

impl ExchangeConfig {
    /// 创建默认配置 (Task1 周期，先写后读)
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            period: Duration::from_millis(TASK1_PERIOD_MS),
            drain_timeout: Duration::from_millis(DRAIN_TIMEOUT_MS),
            order: StepOrder::ProduceFirst,
        }
    }

    /// Task1: 每 200ms 先写 Buffer1 再读 Buffer2
    pub const fn task1() -> Self {
        Self::new("TASK1")
    }

    /// Task2: 每 300ms 先读 Buffer1 再写 Buffer2
    pub const fn task2() -> Self {
        Self::new("TASK2")
            .with_period(Duration::from_millis(TASK2_PERIOD_MS))
            .with_order(StepOrder::DrainFirst)
    }

    pub const fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub const fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    pub const fn with_order(mut self, order: StepOrder) -> Self {
        self.order = order;
        self
    }
}

/// 写步骤结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProduceOutcome {
    /// 写入成功，`count` 为写入后的元素数量
    Added { value: i32, count: usize },
    /// outbox 已满，该值被丢弃
    Skipped { value: i32 },
}

/// 读步骤结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// 读到一个值，`count` 为读取后的元素数量
    Read { value: i32, count: usize },
    /// 没有可读数据，`signalled` 表示等待是否因广播结束
    Idle { signalled: bool },
}

/// 交换任务统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExchangeStats {
    /// 成功写入 outbox 的次数
    pub produced: u32,
    /// outbox 满而丢弃的次数
    pub skipped: u32,
    /// 成功从 inbox 读出的次数
    pub drained: u32,
    /// 读步骤空手而归的次数
    pub idle: u32,
}

/// 交换任务
///
/// # Example
/// ```ignore
/// let mut task1 = ExchangeTask::new(ExchangeConfig::task1(), buffer1, buffer2, counter)?;
/// task1.run().await;
/// ```
pub struct ExchangeTask<'a, const N: usize, M: RawMutex = CriticalSectionRawMutex> {
    config: ExchangeConfig,
    outbox: &'a GuardedBuffer<i32, N, M>,
    inbox: &'a GuardedBuffer<i32, N, M>,
    inbox_events: EventListener<'a, M>,
    counter: &'a AtomicCounter,
    stats: ExchangeStats,
}

impl<'a, const N: usize, M: RawMutex> ExchangeTask<'a, N, M> {
    /// 创建交换任务，并在 inbox 上注册事件监听者
    ///
    /// # Errors
    /// inbox 的监听槽位已用完时返回 [`BufferError::ListenersExhausted`]
    pub fn new(
        config: ExchangeConfig,
        outbox: &'a GuardedBuffer<i32, N, M>,
        inbox: &'a GuardedBuffer<i32, N, M>,
        counter: &'a AtomicCounter,
    ) -> Result<Self, BufferError> {
        let inbox_events = inbox.listener()?;

        Ok(Self {
            config,
            outbox,
            inbox,
            inbox_events,
            counter,
            stats: ExchangeStats::default(),
        })
    }

    #[inline(always)]
    pub fn name(&self) -> &'static str {
        self.config.name
    }

    #[inline(always)]
    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    #[inline(always)]
    pub fn stats(&self) -> ExchangeStats {
        self.stats
    }

    /// 写步骤: 取下一个序列号写入 outbox
    pub fn produce_step(&mut self) -> ProduceOutcome {
        // 序列号只用于区分数值，截断回绕可以接受
        let value = self.counter.increment() as i32;
        let (name, outbox) = (self.config.name, self.outbox);

        let pushed = outbox.push_with(value, |count| {
            log_info!(
                "[{}] Added to {}: {} (count: {}/{})",
                name,
                outbox.name(),
                value,
                count,
                N
            );
            count
        });

        match pushed {
            Ok(count) => {
                self.stats.produced += 1;
                ProduceOutcome::Added { value, count }
            }
            Err(_) => {
                self.stats.skipped += 1;
                log_warn!(
                    "[{}] {} full, skipping write (value {})",
                    self.config.name,
                    self.outbox.name(),
                    value
                );
                ProduceOutcome::Skipped { value }
            }
        }
    }

    /// 读步骤: 锁外限时等待广播，然后尝试读一次
    pub async fn drain_step(&mut self) -> DrainOutcome {
        let signalled = self
            .inbox
            .wait_for_signal(&mut self.inbox_events, self.config.drain_timeout)
            .await;

        let (name, inbox) = (self.config.name, self.inbox);
        let popped = inbox.pop_with(|value, count| {
            log_info!(
                "[{}] Read from {}: {} (count: {}/{})",
                name,
                inbox.name(),
                value,
                count,
                N
            );
            (value, count)
        });

        match popped {
            Ok((value, count)) => {
                self.stats.drained += 1;
                DrainOutcome::Read { value, count }
            }
            Err(_) => {
                self.stats.idle += 1;
                log_trace!(
                    "[{}] {} empty after {}",
                    self.config.name,
                    self.inbox.name(),
                    if signalled { "signal" } else { "timeout" }
                );
                DrainOutcome::Idle { signalled }
            }
        }
    }

    /// 按配置顺序执行一个完整周期
    pub async fn run_cycle(&mut self) -> (ProduceOutcome, DrainOutcome) {
        match self.config.order {
            StepOrder::ProduceFirst => {
                let produced = self.produce_step();
                let drained = self.drain_step().await;
                (produced, drained)
            }
            StepOrder::DrainFirst => {
                let drained = self.drain_step().await;
                let produced = self.produce_step();
                (produced, drained)
            }
        }
    }

    /// 以配置的周期运行 `cycles` 个周期
    pub async fn run_cycles(&mut self, cycles: u32) {
        let mut ticker = Ticker::every(self.config.period);

        for _ in 0..cycles {
            self.run_cycle().await;
            ticker.next().await;
        }
    }

    /// 以配置的周期永久运行
    pub async fn run(mut self) -> ! {
        log_info!(
            "[{}] started: writes {}, reads {}, every {} ms",
            self.config.name,
            self.outbox.name(),
            self.inbox.name(),
            self.config.period.as_millis()
        );

        let mut ticker = Ticker::every(self.config.period);

        loop {
            self.run_cycle().await;
            ticker.next().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::SpinRawMutex;
    use crate::tasks::monitor::MonitorTask;
    use embassy_futures::block_on;
    use embassy_time::Instant;
    use std::sync::{mpsc, Arc};

    type SmallBuffer = GuardedBuffer<i32, 4, SpinRawMutex>;

    fn lcg(seed: &mut u32) -> u32 {
        *seed = seed.wrapping_mul(1103515245).wrapping_add(12345);
        *seed >> 16
    }

    /// 不等待的配置，便于单线程确定性调度
    fn immediate(name: &'static str) -> ExchangeConfig {
        ExchangeConfig::new(name)
            .with_period(Duration::from_millis(1))
            .with_drain_timeout(Duration::from_ticks(0))
    }

    #[test]
    fn test_default_configs() {
        let task1 = ExchangeConfig::task1();
        let task2 = ExchangeConfig::task2();

        assert_eq!(task1.period, Duration::from_millis(200));
        assert_eq!(task1.order, StepOrder::ProduceFirst);
        assert_eq!(task2.period, Duration::from_millis(300));
        assert_eq!(task2.order, StepOrder::DrainFirst);
        assert_eq!(task1.drain_timeout, Duration::from_millis(10));
    }

    #[test]
    fn test_produce_skips_when_full() {
        let a: GuardedBuffer<i32, 2> = GuardedBuffer::new(0, "Buffer1");
        let b: GuardedBuffer<i32, 2> = GuardedBuffer::new(1, "Buffer2");
        let counter = AtomicCounter::new();
        let mut task = ExchangeTask::new(immediate("TASK1"), &a, &b, &counter).unwrap();

        assert_eq!(task.produce_step(), ProduceOutcome::Added { value: 1, count: 1 });
        assert_eq!(task.produce_step(), ProduceOutcome::Added { value: 2, count: 2 });
        assert_eq!(task.produce_step(), ProduceOutcome::Skipped { value: 3 });

        let stats = task.stats();
        assert_eq!(stats.produced, 2);
        assert_eq!(stats.skipped, 1);
        assert_eq!(a.snapshot_locked().as_slice(), &[1, 2]);
    }

    #[test]
    fn test_cross_wired_exchange() {
        let a = SmallBuffer::new(0, "Buffer1");
        let b = SmallBuffer::new(1, "Buffer2");
        let counter = AtomicCounter::new();
        let mut task1 = ExchangeTask::new(immediate("TASK1"), &a, &b, &counter).unwrap();
        let mut task2 = ExchangeTask::new(immediate("TASK2"), &b, &a, &counter).unwrap();

        assert_eq!(task1.produce_step(), ProduceOutcome::Added { value: 1, count: 1 });

        let drained = block_on(task2.drain_step());
        assert_eq!(drained, DrainOutcome::Read { value: 1, count: 0 });

        assert_eq!(task2.produce_step(), ProduceOutcome::Added { value: 2, count: 1 });
        let drained = block_on(task1.drain_step());
        assert_eq!(drained, DrainOutcome::Read { value: 2, count: 0 });

        assert!(a.is_empty());
        assert!(b.is_empty());
    }

    #[test]
    fn test_drain_times_out_when_idle() {
        let a = SmallBuffer::new(0, "Buffer1");
        let b = SmallBuffer::new(1, "Buffer2");
        let counter = AtomicCounter::new();
        let config = ExchangeConfig::new("TASK1").with_drain_timeout(Duration::from_millis(10));
        let mut task = ExchangeTask::new(config, &a, &b, &counter).unwrap();

        let start = Instant::now();
        let drained = block_on(task.drain_step());

        let elapsed = start.elapsed();

        assert_eq!(drained, DrainOutcome::Idle { signalled: false });
        assert!(elapsed >= Duration::from_millis(10));
        assert!(elapsed < Duration::from_secs(1));
        assert_eq!(task.stats().idle, 1);
    }

    #[test]
    fn test_drain_reads_after_timeout() {
        let a = SmallBuffer::new(0, "Buffer1");
        let b = SmallBuffer::new(1, "Buffer2");
        let counter = AtomicCounter::new();

        // 监听者注册前写入的值不会触发广播，但超时后仍会被读到
        assert!(b.write(42));
        let mut task = ExchangeTask::new(immediate("TASK1"), &a, &b, &counter).unwrap();

        let drained = block_on(task.drain_step());
        assert_eq!(drained, DrainOutcome::Read { value: 42, count: 0 });
    }

    #[test]
    fn test_step_order_within_cycle() {
        let counter = AtomicCounter::new();

        // outbox 与 inbox 相同: 先写后读能读回自己的值
        let looped = SmallBuffer::new(0, "Loop");
        let mut produce_first = ExchangeTask::new(immediate("P"), &looped, &looped, &counter).unwrap();
        let (produced, drained) = block_on(produce_first.run_cycle());
        assert_eq!(produced, ProduceOutcome::Added { value: 1, count: 1 });
        assert_eq!(drained, DrainOutcome::Read { value: 1, count: 0 });

        // 先读后写: 读时还是空的
        let looped = SmallBuffer::new(0, "Loop");
        let config = immediate("D").with_order(StepOrder::DrainFirst);
        let mut drain_first = ExchangeTask::new(config, &looped, &looped, &counter).unwrap();
        let (produced, drained) = block_on(drain_first.run_cycle());
        assert_eq!(drained, DrainOutcome::Idle { signalled: false });
        assert_eq!(produced, ProduceOutcome::Added { value: 2, count: 1 });
        assert_eq!(looped.len(), 1);
    }

    #[test]
    fn test_no_lost_updates_under_interleaving() {
        for seed in [1u32, 7, 42, 1234, 0xdead] {
            let a = SmallBuffer::new(0, "Buffer1");
            let b = SmallBuffer::new(1, "Buffer2");
            let counter = AtomicCounter::new();
            let mut task1 = ExchangeTask::new(immediate("TASK1"), &a, &b, &counter).unwrap();
            let mut task2 = ExchangeTask::new(immediate("TASK2"), &b, &a, &counter).unwrap();

            let mut seed = seed;
            let mut last_from_a = 0;
            let mut last_from_b = 0;

            for _ in 0..400 {
                match lcg(&mut seed) % 4 {
                    0 => {
                        task1.produce_step();
                    }
                    1 => {
                        task2.produce_step();
                    }
                    2 => {
                        if let DrainOutcome::Read { value, .. } = block_on(task1.drain_step()) {
                            // FIFO: 同一缓冲区读出的值严格递增
                            assert!(value > last_from_b);
                            last_from_b = value;
                        }
                    }
                    _ => {
                        if let DrainOutcome::Read { value, .. } = block_on(task2.drain_step()) {
                            assert!(value > last_from_a);
                            last_from_a = value;
                        }
                    }
                }

                let (s1, s2) = (task1.stats(), task2.stats());
                assert_eq!((s1.produced - s2.drained) as usize, a.len());
                assert_eq!((s2.produced - s1.drained) as usize, b.len());
                assert!(a.len() <= 4 && b.len() <= 4);
            }
        }
    }

    #[test]
    fn test_concurrent_tasks_terminate() {
        const CYCLES: u32 = 40;

        let a = Arc::new(SmallBuffer::new(0, "Buffer1"));
        let b = Arc::new(SmallBuffer::new(1, "Buffer2"));
        let counter = Arc::new(AtomicCounter::new());
        let (tx, rx) = mpsc::channel::<(usize, Option<ExchangeStats>)>();

        let mut seed = 0x1dea;
        for role in 0..2usize {
            let (a, b, counter, tx) = (a.clone(), b.clone(), counter.clone(), tx.clone());
            let period = Duration::from_millis(1 + (lcg(&mut seed) % 3) as u64);
            let timeout = Duration::from_millis(1 + (lcg(&mut seed) % 2) as u64);

            std::thread::spawn(move || {
                let (outbox, inbox) = if role == 0 { (&*a, &*b) } else { (&*b, &*a) };
                let config = ExchangeConfig::new(if role == 0 { "TASK1" } else { "TASK2" })
                    .with_period(period)
                    .with_drain_timeout(timeout);
                let mut task = ExchangeTask::new(config, outbox, inbox, &counter).unwrap();

                block_on(task.run_cycles(CYCLES));
                tx.send((role, Some(task.stats()))).unwrap();
            });
        }

        {
            let (a, b, tx) = (a.clone(), b.clone(), tx.clone());
            std::thread::spawn(move || {
                // 故意反序传入，加锁顺序仍由 rank 决定
                let monitor = MonitorTask::new(&*b, &*a, Duration::from_millis(1));
                block_on(monitor.run_reports(CYCLES));
                tx.send((2, None)).unwrap();
            });
        }

        let mut stats = [ExchangeStats::default(); 2];
        for _ in 0..3 {
            let (role, result) = rx
                .recv_timeout(std::time::Duration::from_secs(30))
                .expect("task did not finish in time");
            if let Some(result) = result {
                stats[role] = result;
            }
        }

        assert_eq!(stats[0].produced + stats[0].skipped, CYCLES);
        assert_eq!(stats[1].produced + stats[1].skipped, CYCLES);
        assert_eq!((stats[0].produced - stats[1].drained) as usize, a.len());
        assert_eq!((stats[1].produced - stats[0].drained) as usize, b.len());
    }
}
