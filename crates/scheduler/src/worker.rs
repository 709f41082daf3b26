// worker.rs
// Worker：持有一个连续的任务块，在自己的线程里按顺序逐个执行，并把结果经单向通道送回调度器。
use crate::config::FailurePolicy;
use crate::task::{Outcome, Task, TaskError};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Worker 的生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerState {
    /// 已创建，尚未执行
    Created,
    /// 正在执行
    Running,
    /// 整个块执行完毕（其中的任务可能有失败）
    Completed,
    /// 收到停止信号，剩余任务未执行
    Cancelled,
}

impl WorkerState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkerState::Completed | WorkerState::Cancelled)
    }
}

/// 所有 worker 共享的停止信号，只在任务之间检查
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// worker 经通道送回的结果，带上 worker 下标以便调度器按块顺序归位
#[derive(Debug)]
pub struct WorkerReport<O> {
    pub worker: usize,
    pub outcomes: Vec<Outcome<O>>,
}

/// 单个 worker 的执行统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStats {
    pub succeeded: usize,
    pub failed: usize,
    pub not_executed: usize,
    pub elapsed: Duration,
}

/// 执行一个任务块的 worker
pub struct Worker<T: Task> {
    /// worker 下标，与块顺序一致
    index: usize,
    /// 本块在原始任务序列中的 [start, end) 区间
    range: Range<usize>,
    tasks: Vec<T>,
    state: WorkerState,
    stats: WorkerStats,
}

impl<T: Task> Worker<T> {
    /// 创建 worker，`start` 为本块第一个任务在原始序列中的下标
    pub fn new(index: usize, start: usize, tasks: Vec<T>) -> Self {
        let range = start..start + tasks.len();
        Self {
            index,
            range,
            tasks,
            state: WorkerState::Created,
            stats: WorkerStats::default(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// 本块的任务。执行后可读到任务在 run 中对自身做的修改（同进程线程共享内存）
    pub fn tasks(&self) -> &[T] {
        &self.tasks
    }

    pub fn into_tasks(self) -> Vec<T> {
        self.tasks
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    /// 在当前线程中执行整个块：失败不中断，不可取消
    pub fn run(&mut self) -> Vec<Outcome<T::Output>> {
        self.execute(&StopSignal::new(), FailurePolicy::FailSoft)
    }

    /// 按块内顺序逐个执行任务。
    ///
    /// 每个任务开始前检查 `stop`，已置位则剩余任务记为 NotExecuted。
    /// FailFast 策略下，任务失败会置位 `stop`，从而通知其他 worker。
    /// 返回值长度恒等于块大小。
    pub fn execute(&mut self, stop: &StopSignal, policy: FailurePolicy) -> Vec<Outcome<T::Output>> {
        if self.state.is_terminal() {
            warn!(worker = self.index, "worker 已执行过，忽略重复执行");
            return (0..self.tasks.len()).map(|_| Outcome::NotExecuted).collect();
        }

        let started = Instant::now();
        self.state = WorkerState::Running;
        debug!(worker = self.index, start = self.range.start, end = self.range.end, "worker 开始执行");

        let mut outcomes = Vec::with_capacity(self.tasks.len());
        let mut cancelled = false;
        for (offset, task) in self.tasks.iter_mut().enumerate() {
            if stop.is_raised() {
                cancelled = true;
                break;
            }
            let position = self.range.start + offset;
            let outcome = match run_contained(task) {
                Ok(value) => {
                    self.stats.succeeded += 1;
                    Outcome::Success(value)
                }
                Err(err) => {
                    self.stats.failed += 1;
                    warn!(worker = self.index, task = position, error = %err, "任务执行失败");
                    if policy == FailurePolicy::FailFast {
                        stop.raise();
                    }
                    Outcome::Failure(err)
                }
            };
            outcomes.push(outcome);
        }

        let skipped = self.tasks.len() - outcomes.len();
        self.stats.not_executed += skipped;
        outcomes.extend((0..skipped).map(|_| Outcome::NotExecuted));

        self.stats.elapsed = started.elapsed();
        self.state = if cancelled { WorkerState::Cancelled } else { WorkerState::Completed };
        debug!(
            worker = self.index,
            succeeded = self.stats.succeeded,
            failed = self.stats.failed,
            skipped,
            "worker 执行结束"
        );
        outcomes
    }

    /// 执行整个块并把结果发到 `sink`。接收端已关闭时返回 false
    pub fn execute_and_report(
        &mut self,
        stop: &StopSignal,
        policy: FailurePolicy,
        sink: &Sender<WorkerReport<T::Output>>,
    ) -> bool {
        let outcomes = self.execute(stop, policy);
        sink.send(WorkerReport { worker: self.index, outcomes }).is_ok()
    }
}

/// 执行单个任务，把 panic 收敛为 TaskError
fn run_contained<T: Task>(task: &mut T) -> Result<T::Output, TaskError> {
    panic::catch_unwind(AssertUnwindSafe(|| task.run())).unwrap_or_else(|payload| {
        Err(TaskError::new(format!("任务 panic: {}", panic_message(payload.as_ref()))))
    })
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "未知 panic".to_string()
    }
}
