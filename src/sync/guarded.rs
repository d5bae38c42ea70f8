//! 带锁的环形缓冲区
//!
//! [`GuardedBuffer`] 把一个 [`BoundedRingBuffer`] 放进阻塞互斥锁，并附带一个
//! 无负载的广播事件源。每次写入成功都会广播一次，等待方收到的只是
//! "有变化，重新检查" 的提示，不携带数据。
//!
//! # 加锁规则
//! - 读写都是非阻塞的: 拿锁、尝试一次、放锁
//! - 等待事件 ([`GuardedBuffer::wait_for_signal`]) 必须在锁外进行
//! - 需要同时持有两把锁时只能通过 [`inspect_pair`]，按 `rank` 从小到大加锁
//!
//! 锁由闭包作用域持有，闭包内不能 `.await`，所以持锁挂起在类型上就不可能发生。

use core::cell::RefCell;
use core::fmt;

use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, RawMutex};
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::watch::{Receiver, Watch};
use embassy_time::{with_timeout, Duration};

use crate::config::MAX_LISTENERS;
use crate::sync::ringbuffer::BoundedRingBuffer;

/// 缓冲区操作结果
///
/// `Full` / `Empty` 是正常的流控结果，调用方记录后跳过即可
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "log-defmt", derive(defmt::Format))]
pub enum BufferError {
    /// 缓冲区已满，写入被拒绝
    Full,
    /// 缓冲区为空，没有可读数据
    Empty,
    /// 事件源的监听者数量已达上限
    ListenersExhausted,
}

impl fmt::Display for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "buffer full"),
            Self::Empty => write!(f, "buffer empty"),
            Self::ListenersExhausted => write!(f, "no free listener slot"),
        }
    }
}

type EventSource<M> = Watch<M, (), MAX_LISTENERS>;

/// 事件监听者
///
/// 通过 [`GuardedBuffer::listener`] 注册，只会观察到注册之后发生的广播。
/// Drop 时自动释放监听槽位。
pub struct EventListener<'a, M: RawMutex = CriticalSectionRawMutex> {
    source: &'a EventSource<M>,
    receiver: Receiver<'a, M, (), MAX_LISTENERS>,
}

impl<'a, M: RawMutex> EventListener<'a, M> {
    /// 等待广播，最多等待 `timeout`
    ///
    /// # Returns
    /// - `true`: 收到广播
    /// - `false`: 超时
    pub async fn wait(&mut self, timeout: Duration) -> bool {
        with_timeout(timeout, self.receiver.changed()).await.is_ok()
    }

    /// 非阻塞地检查并消费一次待处理的广播
    pub fn try_take(&mut self) -> bool {
        self.receiver.try_changed().is_some()
    }

    /// 该监听者是否注册在 `buffer` 上
    pub fn is_registered_on<T: Copy, const N: usize>(&self, buffer: &GuardedBuffer<T, N, M>) -> bool {
        core::ptr::eq(self.source, &buffer.event)
    }
}

/// 带锁和事件通知的环形缓冲区
///
/// `M` 决定锁的实现: 默认的 `CriticalSectionRawMutex` 在主机上是全局临界区，
/// 所有缓冲区共用一把；多线程下需要每个缓冲区独立加锁时使用
/// [`SpinRawMutex`](crate::sync::SpinRawMutex)。
///
/// # Example
/// ```ignore
/// static BUFFER: StaticCell<GuardedBuffer<i32, 10, SpinRawMutex>> = StaticCell::new();
/// let buffer = BUFFER.init(GuardedBuffer::new(0, "Buffer1"));
///
/// let mut listener = buffer.listener()?;
/// buffer.write(42);
/// if buffer.wait_for_signal(&mut listener, Duration::from_millis(10)).await {
///     let value = buffer.read();
/// }
/// ```
pub struct GuardedBuffer<T, const N: usize, M: RawMutex = CriticalSectionRawMutex> {
    /// 全局加锁顺序，数值小的先加锁
    rank: u8,
    name: &'static str,
    ring: Mutex<M, RefCell<BoundedRingBuffer<T, N>>>,
    event: EventSource<M>,
}

impl<T: Copy, const N: usize, M: RawMutex> GuardedBuffer<T, N, M> {
    /// 创建新的空缓冲区
    ///
    /// # Arguments
    /// * `rank` - 加锁顺序，同一组缓冲区内必须互不相同
    /// * `name` - 诊断输出中使用的名字
    pub const fn new(rank: u8, name: &'static str) -> Self {
        Self {
            rank,
            name,
            ring: Mutex::new(RefCell::new(BoundedRingBuffer::new())),
            event: Watch::new(),
        }
    }

    #[inline(always)]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline(always)]
    pub fn rank(&self) -> u8 {
        self.rank
    }

    #[inline(always)]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// 写入一个值，成功时在锁内广播，然后仍在锁内调用 `on_added`
    ///
    /// `on_added` 收到写入后的元素数量，不能再访问本缓冲区。
    /// 需要和写入保持原子顺序的输出放在这里。
    pub fn push_with<R>(&self, value: T, on_added: impl FnOnce(usize) -> R) -> Result<R, BufferError> {
        self.ring.lock(|ring| {
            let mut ring = ring.borrow_mut();
            if !ring.try_push(value) {
                return Err(BufferError::Full);
            }
            self.event.sender().send(());
            Ok(on_added(ring.len()))
        })
    }

    /// 写入一个值，成功时在锁内广播
    ///
    /// # Returns
    /// 写入后的元素数量
    pub fn push(&self, value: T) -> Result<usize, BufferError> {
        self.push_with(value, |count| count)
    }

    /// 写入一个值，`false` 表示缓冲区已满
    pub fn write(&self, value: T) -> bool {
        self.push(value).is_ok()
    }

    /// 读取一个值，不等待；成功时在锁内调用 `on_removed`
    ///
    /// `on_removed` 收到读出的值和读取后的元素数量，不能再访问本缓冲区
    pub fn pop_with<R>(&self, on_removed: impl FnOnce(T, usize) -> R) -> Result<R, BufferError> {
        self.ring.lock(|ring| {
            let mut ring = ring.borrow_mut();
            let value = ring.try_pop().ok_or(BufferError::Empty)?;
            Ok(on_removed(value, ring.len()))
        })
    }

    /// 读取一个值，不等待
    ///
    /// # Returns
    /// 读出的值和读取后的元素数量
    pub fn pop(&self) -> Result<(T, usize), BufferError> {
        self.pop_with(|value, count| (value, count))
    }

    /// 读取一个值，`None` 表示缓冲区为空
    pub fn read(&self) -> Option<T> {
        self.pop().ok().map(|(value, _)| value)
    }

    /// 注册一个事件监听者
    ///
    /// 注册之前的广播不会被观察到
    pub fn listener(&self) -> Result<EventListener<'_, M>, BufferError> {
        let mut receiver = self.event.receiver().ok_or(BufferError::ListenersExhausted)?;
        // 丢弃注册前的广播
        let _ = receiver.try_changed();
        Ok(EventListener {
            source: &self.event,
            receiver,
        })
    }

    /// 在锁外等待写入广播，最多等待 `timeout`
    ///
    /// 超时和虚假唤醒对调用方都只是 "重新检查" 的提示
    pub async fn wait_for_signal(&self, listener: &mut EventListener<'_, M>, timeout: Duration) -> bool {
        debug_assert_msg!(
            listener.is_registered_on(self),
            "listener is not registered on {}",
            self.name
        );
        listener.wait(timeout).await
    }

    /// 在锁内对环形缓冲区执行只读闭包
    pub fn inspect<R>(&self, f: impl FnOnce(&BoundedRingBuffer<T, N>) -> R) -> R {
        self.ring.lock(|ring| f(&ring.borrow()))
    }

    /// 在锁内拷贝当前内容
    pub fn snapshot_locked(&self) -> heapless::Vec<T, N> {
        self.inspect(|ring| ring.snapshot())
    }

    /// 当前元素数量
    pub fn len(&self) -> usize {
        self.inspect(|ring| ring.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 同时持有两个缓冲区的锁并执行只读闭包
///
/// 无论参数顺序如何，总是先锁 `rank` 较小的缓冲区。
/// 闭包参数顺序与调用参数顺序一致。两个参数是同一个缓冲区时只加一次锁。
pub fn inspect_pair<T: Copy, const N: usize, M: RawMutex, R>(
    first: &GuardedBuffer<T, N, M>,
    second: &GuardedBuffer<T, N, M>,
    f: impl FnOnce(&BoundedRingBuffer<T, N>, &BoundedRingBuffer<T, N>) -> R,
) -> R {
    if core::ptr::eq(first, second) {
        return first.inspect(|ring| f(ring, ring));
    }

    debug_assert_msg!(
        first.rank != second.rank,
        "{} and {} share lock rank {}",
        first.name,
        second.name,
        first.rank
    );

    if first.rank <= second.rank {
        first.inspect(|a| second.inspect(|b| f(a, b)))
    } else {
        second.inspect(|b| first.inspect(|a| f(a, b)))
    }
}
