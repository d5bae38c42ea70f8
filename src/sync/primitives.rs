//! 同步原语封装
//!
//! 补充 embassy-sync 的原始锁:
//! - embassy-sync 的 `CriticalSectionRawMutex` 是全局临界区，所有实例共用一把
//! - [`SpinRawMutex`]: 每个实例独立的自旋锁，多线程下互不阻塞

use embassy_sync::blocking_mutex::{raw::RawMutex, Mutex};
use portable_atomic::{AtomicBool, AtomicU64, Ordering};

// ===== 自旋锁 =====

/// 每个实例独立的自旋原始锁
///
/// 与 `CriticalSectionRawMutex` 不同，两个 `SpinRawMutex` 互不影响:
/// 持有一把时另一把仍可被其他线程获取。不可重入。
///
/// # Example
/// ```ignore
/// static SHARED: SpinBlockingMutex<RefCell<u32>> = SpinBlockingMutex::new(RefCell::new(0));
///
/// SHARED.lock(|cell| *cell.borrow_mut() += 1);
/// ```
pub struct SpinRawMutex {
    locked: AtomicBool,
}

impl SpinRawMutex {
    pub const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }

    /// 当前是否被持有
    #[inline(always)]
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    fn acquire(&self) {
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            while self.is_locked() {
                core::hint::spin_loop();
            }
        }
    }
}

impl Default for SpinRawMutex {
    fn default() -> Self {
        Self::new()
    }
}

/// 闭包返回或 panic 时释放
struct SpinRelease<'a>(&'a AtomicBool);

impl Drop for SpinRelease<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// Safety: 同一时刻只有一个闭包在 `lock` 内执行，
// acquire/release 排序保证被保护数据的可见性
unsafe impl RawMutex for SpinRawMutex {
    const INIT: Self = Self::new();

    fn lock<R>(&self, f: impl FnOnce() -> R) -> R {
        self.acquire();
        let _release = SpinRelease(&self.locked);
        f()
    }
}

/// 自旋阻塞互斥锁
pub type SpinBlockingMutex<T> = Mutex<SpinRawMutex, T>;

// ===== 原子计数器 =====

/// 原子计数器 - 用于生成序列号
///
/// 多个生产者共享一个计数器，只要求数值可区分，不要求全局唯一
pub struct AtomicCounter {
    count: AtomicU64,
}

impl AtomicCounter {
    /// 创建新的计数器
    pub const fn new() -> Self {
        Self {
            count: AtomicU64::new(0),
        }
    }

    /// 创建指定初始值的计数器
    pub const fn with_value(value: u64) -> Self {
        Self {
            count: AtomicU64::new(value),
        }
    }

    /// 增加并返回新值
    #[inline(always)]
    pub fn increment(&self) -> u64 {
        self.count.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// 获取当前值
    #[inline(always)]
    pub fn get(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

impl Default for AtomicCounter {
    fn default() -> Self {
        Self::new()
    }
}
