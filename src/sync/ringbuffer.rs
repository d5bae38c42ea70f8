//! 定长环形缓冲区
//!
//! 固定容量的 FIFO 队列，使用 head/tail/count 记账:
//! - `head`: 下一个写入位置
//! - `tail`: 下一个读取位置
//! - `count`: 当前有效元素数量
//!
//! 本结构体不带任何并发保护，必须由外部加锁串行访问
//! (见 [`GuardedBuffer`](crate::sync::guarded::GuardedBuffer))。

use core::mem::MaybeUninit;

/// 定长环形缓冲区
///
/// 满时拒绝写入，空时拒绝读取，从不覆盖旧数据。
///
/// # Type Parameters
/// * `T` - 元素类型
/// * `N` - 容量 (必须大于 0，不要求 2 的幂)
///
/// # Example
/// ```ignore
/// let mut ring: BoundedRingBuffer<i32, 10> = BoundedRingBuffer::new();
///
/// assert!(ring.try_push(1));
/// assert_eq!(ring.try_pop(), Some(1));
/// assert_eq!(ring.try_pop(), None);
/// ```
pub struct BoundedRingBuffer<T, const N: usize> {
    /// 数据存储，仅 [tail, tail + count) 区间内的槽位已初始化
    slots: [MaybeUninit<T>; N],
    head: usize,
    tail: usize,
    count: usize,
}

impl<T, const N: usize> BoundedRingBuffer<T, N> {
    /// 创建新的空缓冲区
    ///
    /// # Panics
    /// 编译期检查 N 必须大于 0
    pub const fn new() -> Self {
        assert!(N > 0, "N must be greater than 0");

        Self {
            slots: [const { MaybeUninit::uninit() }; N],
            head: 0,
            tail: 0,
            count: 0,
        }
    }

    /// 缓冲区容量
    #[inline(always)]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// 当前元素数量
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline(always)]
    pub fn is_full(&self) -> bool {
        self.count == N
    }

    /// 下一个写入位置
    #[inline(always)]
    pub fn head(&self) -> usize {
        self.head
    }

    /// 下一个读取位置
    #[inline(always)]
    pub fn tail(&self) -> usize {
        self.tail
    }

    /// 清空缓冲区
    pub fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.count = 0;
    }
}

impl<T: Copy, const N: usize> BoundedRingBuffer<T, N> {
    /// 尝试写入单个元素
    ///
    /// # Returns
    /// - `true`: 写入成功
    /// - `false`: 缓冲区已满，状态不变
    #[inline]
    pub fn try_push(&mut self, value: T) -> bool {
        if self.count == N {
            return false; // 已满
        }

        self.slots[self.head].write(value);
        self.head = (self.head + 1) % N;
        self.count += 1;

        self.check_positions();
        true
    }

    /// 尝试读取单个元素
    ///
    /// # Returns
    /// - `Some(T)`: 读取成功
    /// - `None`: 缓冲区为空，状态不变
    #[inline]
    pub fn try_pop(&mut self) -> Option<T> {
        if self.count == 0 {
            return None; // 为空
        }

        // Safety: count > 0 时 tail 处的槽位一定已经被 try_push 写入
        let value = unsafe { self.slots[self.tail].assume_init_read() };
        self.tail = (self.tail + 1) % N;
        self.count -= 1;

        self.check_positions();
        Some(value)
    }

    /// head 总是在 tail 之后 count 个槽位
    #[inline(always)]
    fn check_positions(&self) {
        debug_assert_msg!(
            self.head == (self.tail + self.count) % N,
            "ring positions out of sync: head={}, tail={}, count={}",
            self.head,
            self.tail,
            self.count
        );
    }

    /// 按 tail -> head 顺序遍历当前元素 (只读)
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        (0..self.count).map(move |offset| {
            let idx = (self.tail + offset) % N;
            // Safety: idx 落在 [tail, tail + count) 区间内，已初始化
            unsafe { self.slots[idx].assume_init_read() }
        })
    }

    /// 当前内容的拷贝，长度等于 `len()`，用于诊断输出
    pub fn snapshot(&self) -> heapless::Vec<T, N> {
        self.iter().collect()
    }
}

impl<T, const N: usize> Default for BoundedRingBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}
