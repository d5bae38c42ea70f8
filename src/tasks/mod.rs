//! 任务模块
//!
//! 提供交叉连接的交换任务和只读监视任务:
//! - `exchange`: 写一个缓冲区、读另一个缓冲区的交换任务
//! - `monitor`: 周期性输出两个缓冲区状态的监视任务
//!
//! 任务本身只是 async 循环，由宿主负责在独立线程/执行器上运行。

pub mod exchange;
pub mod monitor;
