//! dualring - 双环形缓冲区交换演示
//!
//! 每个任务运行在独立的 OS 线程上，每个线程一个 Embassy thread-mode 执行器:
//! - task1 线程: Task1 (写 Buffer1，读 Buffer2)
//! - task2 线程: Task2 (读 Buffer1，写 Buffer2)
//! - 主线程: Monitor (周期性输出两个缓冲区状态)
//!
//! 日志级别由环境变量 `DUALRING_LOG` 控制 (默认 info)。

use embassy_executor::{Executor, Spawner};
use embassy_time::Duration;
use static_cell::StaticCell;

use dualring::config::{BUFFER_CAPACITY, MONITOR_PERIOD_MS};
use dualring::{
    log_error, log_info, AtomicCounter, ExchangeBuffer, ExchangeConfig, ExchangeTask, MonitorTask,
    NAME, VERSION,
};

// ===== 静态分配 =====
static BUFFER1: StaticCell<ExchangeBuffer> = StaticCell::new();
static BUFFER2: StaticCell<ExchangeBuffer> = StaticCell::new();
static COUNTER: StaticCell<AtomicCounter> = StaticCell::new();

/// 每个线程一个执行器
static TASK1_EXECUTOR: StaticCell<Executor> = StaticCell::new();
static TASK2_EXECUTOR: StaticCell<Executor> = StaticCell::new();
static MONITOR_EXECUTOR: StaticCell<Executor> = StaticCell::new();

/// 交换任务入口
#[embassy_executor::task(pool_size = 2)]
async fn exchange_task(
    config: ExchangeConfig,
    outbox: &'static ExchangeBuffer,
    inbox: &'static ExchangeBuffer,
    counter: &'static AtomicCounter,
) {
    match ExchangeTask::new(config, outbox, inbox, counter) {
        Ok(task) => task.run().await,
        Err(e) => log_error!("[{}] failed to start: {}", config.name, e),
    }
}

/// 监视任务入口
#[embassy_executor::task]
async fn monitor_task(first: &'static ExchangeBuffer, second: &'static ExchangeBuffer) {
    MonitorTask::new(first, second, Duration::from_millis(MONITOR_PERIOD_MS))
        .run()
        .await
}

/// 启动一个线程并在其中运行独立的执行器
fn spawn_executor_thread(
    name: &str,
    executor: &'static StaticCell<Executor>,
    init: impl FnOnce(Spawner) + Send + 'static,
) -> std::io::Result<()> {
    let _handle: std::thread::JoinHandle<()> = std::thread::Builder::new()
        .name(name.into())
        .spawn(move || {
            let executor = executor.init(Executor::new());
            executor.run(init)
        })?;

    Ok(())
}

#[cfg(feature = "log-std")]
fn init_logger() {
    use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

    let level = std::env::var("DUALRING_LOG")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(LevelFilter::Info);

    if let Err(e) = TermLogger::init(level, Config::default(), TerminalMode::Mixed, ColorChoice::Auto) {
        eprintln!("failed to install logger: {}", e);
    }
}

#[cfg(not(feature = "log-std"))]
fn init_logger() {}

fn main() -> std::io::Result<()> {
    init_logger();

    // ========================================
    // 1. 共享状态: 两个缓冲区 + 共享计数器
    // ========================================
    let buffer1: &'static ExchangeBuffer = BUFFER1.init(ExchangeBuffer::new(0, "Buffer1"));
    let buffer2: &'static ExchangeBuffer = BUFFER2.init(ExchangeBuffer::new(1, "Buffer2"));
    let counter: &'static AtomicCounter = COUNTER.init(AtomicCounter::new());

    let task1 = ExchangeConfig::task1();
    let task2 = ExchangeConfig::task2();

    log_info!("=== {} {}: Dual Ring Buffer Exchange ===", NAME, VERSION);
    log_info!(
        "{} every {} ms (writes {}, reads {})",
        task1.name,
        task1.period.as_millis(),
        buffer1.name(),
        buffer2.name()
    );
    log_info!(
        "{} every {} ms (reads {}, writes {})",
        task2.name,
        task2.period.as_millis(),
        buffer1.name(),
        buffer2.name()
    );
    log_info!("Monitor every {} ms", MONITOR_PERIOD_MS);
    log_info!("Buffer size: {} items each", BUFFER_CAPACITY);

    // ========================================
    // 2. 交换任务: 各自一个线程
    // ========================================
    spawn_executor_thread("task1", &TASK1_EXECUTOR, move |spawner| {
        spawner.must_spawn(exchange_task(task1, buffer1, buffer2, counter));
    })?;

    spawn_executor_thread("task2", &TASK2_EXECUTOR, move |spawner| {
        spawner.must_spawn(exchange_task(task2, buffer2, buffer1, counter));
    })?;

    log_info!("Exchange tasks spawned, monitor running on main thread");

    // ========================================
    // 3. 监视任务: 主线程
    // ========================================
    let executor = MONITOR_EXECUTOR.init(Executor::new());
    executor.run(move |spawner| {
        spawner.must_spawn(monitor_task(buffer1, buffer2));
    })
}
