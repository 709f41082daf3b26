// lib.rs
// 调度器库入口，声明并导出各子模块。

//! 把一组相互独立的任务切成连续的块，每块交给一个 worker 线程顺序执行，
//! 结果按提交顺序返回。
//!
//! 用法：实现 [`Task`]（或用 [`task_fn`] 包装闭包），交给 [`Scheduler`] 运行：
//!
//! ```
//! use scheduler::{task_fn, Outcome, Scheduler, TaskError};
//!
//! let make = |x: i32| task_fn(move || Ok::<_, TaskError>(x + 1));
//! let mut scheduler = Scheduler::new(2, vec![make(1), make(2), make(3)]).unwrap();
//! let results = scheduler.run().unwrap();
//! assert_eq!(results, &[Outcome::Success(2), Outcome::Success(3), Outcome::Success(4)]);
//! ```
pub mod config;    // 配置模块
pub mod error;     // 错误类型模块
pub mod partition; // 分块模块
pub mod scheduler; // 任务调度器模块
pub mod task;      // 任务接口模块
pub mod worker;    // worker 模块

pub use config::{CorePolicy, FailurePolicy, SchedulerConfig};
pub use error::{Error, Result};
pub use scheduler::{run_tasks, CancelHandle, RunSummary, Scheduler, SchedulerState};
pub use task::{task_fn, FnTask, Outcome, Task, TaskError};
pub use worker::{StopSignal, Worker, WorkerState, WorkerStats};
