//! 同步原语模块
//!
//! 提供线程安全的缓冲区与通知原语，基于 embassy-sync 封装:
//! - `BoundedRingBuffer`: 无锁保护的定长环形缓冲区
//! - `GuardedBuffer`: 互斥锁 + 广播事件源包装的环形缓冲区
//! - `SpinRawMutex`: 每个实例独立的原始锁
//! - `AtomicCounter`: 共享序列号计数器

pub mod guarded;
pub mod primitives;
pub mod ringbuffer;

pub use guarded::{inspect_pair, BufferError, EventListener, GuardedBuffer};
pub use primitives::{AtomicCounter, SpinBlockingMutex, SpinRawMutex};
pub use ringbuffer::BoundedRingBuffer;
