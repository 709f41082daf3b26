// scheduler.rs
// 任务调度器：分块、为每块启动一个 worker 线程、等待完成，并按原始顺序拼接结果。
use crate::config::SchedulerConfig;
use crate::error::{Error, Result};
use crate::partition;
use crate::task::{Outcome, Task};
use crate::worker::{panic_message, StopSignal, Worker, WorkerReport};
use serde::{Deserialize, Serialize};
use std::io;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// 一次运行的状态机：Idle → Partitioning → Dispatching → Awaiting → Collecting → Done，
/// 编排失败时进入 Aborted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerState {
    Idle,
    Partitioning,
    Dispatching,
    /// 还在运行的 worker 数
    Awaiting(usize),
    Collecting,
    Done,
    Aborted,
}

/// 可跨线程持有的取消句柄，在 run 执行期间调用 terminate 即可协作式停止
#[derive(Debug, Clone)]
pub struct CancelHandle {
    stop: StopSignal,
}

impl CancelHandle {
    /// 通知所有 worker 在当前任务结束后停止，剩余任务记为 NotExecuted
    pub fn terminate(&self) {
        self.stop.raise();
    }

    pub fn is_terminated(&self) -> bool {
        self.stop.is_raised()
    }
}

/// 一次运行的汇总信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub workers: usize,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub not_executed: usize,
    pub elapsed: Duration,
    /// 运行期间停止信号是否被置位（terminate、fail-fast 或超时）
    pub cancelled: bool,
    pub timed_out: bool,
}

/// 并行任务调度器。
///
/// 任务被切成 `ncores` 个连续且大小均衡的块，每块交给一个 worker 线程顺序执行。
/// 无论 worker 以何种顺序完成，`results()[i]` 总是对应第 i 个提交的任务。
pub struct Scheduler<T: Task> {
    run_id: Uuid,
    config: SchedulerConfig,
    /// 实际使用的 worker 数（按策略收缩后）
    ncores: usize,
    /// 尚未分块的任务，run 之后移交给各 worker
    pending: Vec<T>,
    workers: Vec<Worker<T>>,
    results: Vec<Outcome<T::Output>>,
    state: SchedulerState,
    stop: StopSignal,
    summary: Option<RunSummary>,
    /// 测试用：在该下标的 worker 处模拟线程创建失败
    #[cfg(test)]
    refuse_spawn_at: Option<usize>,
}

impl<T: Task> Scheduler<T> {
    /// 使用默认配置创建调度器
    pub fn new(ncores: usize, tasks: Vec<T>) -> Result<Self> {
        Self::with_config(SchedulerConfig::with_ncores(ncores), tasks)
    }

    /// 创建调度器，配置错误在这里就会被拒绝，不会进入分发阶段
    pub fn with_config(config: SchedulerConfig, tasks: Vec<T>) -> Result<Self> {
        let ncores = config.effective_ncores(tasks.len())?;
        if ncores != config.ncores {
            debug!(requested = config.ncores, effective = ncores, "worker 数已按任务数收缩");
        }
        Ok(Self {
            run_id: Uuid::new_v4(),
            config,
            ncores,
            pending: tasks,
            workers: Vec::new(),
            results: Vec::new(),
            state: SchedulerState::Idle,
            stop: StopSignal::new(),
            summary: None,
            #[cfg(test)]
            refuse_spawn_at: None,
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn ncores(&self) -> usize {
        self.ncores
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// 运行后构造出的 worker，按块顺序排列，用于事后检查
    pub fn workers(&self) -> &[Worker<T>] {
        &self.workers
    }

    /// 按原始提交顺序排列的结果，run 成功前为空
    pub fn results(&self) -> &[Outcome<T::Output>] {
        &self.results
    }

    pub fn into_results(self) -> Vec<Outcome<T::Output>> {
        self.results
    }

    pub fn summary(&self) -> Option<&RunSummary> {
        self.summary.as_ref()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle { stop: self.stop.clone() }
    }

    /// 在 run 之前置位停止信号，之后的 run 会把全部任务记为 NotExecuted。
    ///
    /// run 期间调度器被 `&mut` 借用，无法调用本方法；要在运行中停止 worker，
    /// 先取得 `cancel_handle()`，再从其他线程调用 `CancelHandle::terminate`。
    pub fn terminate(&self) {
        self.stop.raise();
    }

    /// 取回全部任务，顺序与提交时一致
    pub fn into_tasks(self) -> Vec<T> {
        if self.workers.is_empty() {
            return self.pending;
        }
        self.workers.into_iter().flat_map(Worker::into_tasks).collect()
    }

    /// 执行全部任务，返回按原始顺序排列的结果。
    ///
    /// 任务失败记为 Failure，不会让 run 返回错误；只有编排失败
    /// （无法创建线程、结果通道异常）才返回 Err，此时状态为 Aborted。
    pub fn run(&mut self) -> Result<&[Outcome<T::Output>]> {
        if self.state != SchedulerState::Idle {
            return Err(Error::InvalidState(format!(
                "调度器当前状态为 {:?}，只能运行一次",
                self.state
            )));
        }
        match self.run_inner() {
            Ok(()) => Ok(self.results.as_slice()),
            Err(e) => {
                self.state = SchedulerState::Aborted;
                error!(run_id = %self.run_id, error = %e, "运行中止");
                Err(e)
            }
        }
    }

    fn run_inner(&mut self) -> Result<()> {
        let started = Instant::now();
        let total = self.pending.len();
        info!(run_id = %self.run_id, tasks = total, ncores = self.ncores, "开始运行");

        let state = &mut self.state;
        let workers = &mut self.workers;
        let config = &self.config;
        let stop = self.stop.clone();
        #[cfg(test)]
        let refuse_spawn_at = self.refuse_spawn_at;
        #[cfg(not(test))]
        let refuse_spawn_at: Option<usize> = None;

        transition(state, SchedulerState::Partitioning);
        let tasks = std::mem::take(&mut self.pending);
        let bounds = partition::boundaries(total, self.ncores)?;
        let chunks = partition::split_owned(tasks, self.ncores)?;
        *workers = chunks
            .into_iter()
            .zip(bounds)
            .filter(|(chunk, _)| !chunk.is_empty())
            .enumerate()
            .map(|(index, (chunk, start))| Worker::new(index, start, chunk))
            .collect();

        let n_workers = workers.len();
        let policy = config.failure_policy;
        // 超时大到无法表示为时间点时视为不设截止时间
        let deadline = config.timeout_duration().and_then(|timeout| started.checked_add(timeout));
        let (tx, rx) = mpsc::channel::<WorkerReport<T::Output>>();
        let mut slots: Vec<Option<Vec<Outcome<T::Output>>>> = (0..n_workers).map(|_| None).collect();
        let mut timed_out = false;

        transition(state, SchedulerState::Dispatching);
        thread::scope(|scope| -> Result<()> {
            let mut handles = Vec::with_capacity(n_workers);
            for worker in workers.iter_mut() {
                let index = worker.index();
                let tx = tx.clone();
                let worker_stop = stop.clone();
                let spawned = if refuse_spawn_at == Some(index) {
                    Err(io::Error::other("线程创建被拒绝"))
                } else {
                    thread::Builder::new()
                        .name(format!("{}-{}", config.thread_name_prefix, index))
                        .spawn_scoped(scope, move || {
                            if !worker.execute_and_report(&worker_stop, policy, &tx) {
                                warn!(worker = index, "结果通道已关闭，丢弃 worker 结果");
                            }
                        })
                };
                match spawned {
                    Ok(handle) => {
                        debug!(worker = index, "worker 已启动");
                        handles.push((index, handle));
                    }
                    Err(e) => {
                        // 已启动的 worker 会在当前任务后停止，并在 scope 结束时被回收
                        stop.raise();
                        return Err(Error::SpawnError { worker: index, reason: e.to_string() });
                    }
                }
            }
            drop(tx);

            transition(state, SchedulerState::Awaiting(n_workers));
            let mut received = 0;
            while received < n_workers {
                let next = match deadline {
                    Some(deadline) if !timed_out => {
                        match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
                            Ok(report) => Some(report),
                            Err(RecvTimeoutError::Timeout) => {
                                warn!(run_id = %self.run_id, "运行超时，通知所有 worker 停止");
                                timed_out = true;
                                stop.raise();
                                continue;
                            }
                            Err(RecvTimeoutError::Disconnected) => None,
                        }
                    }
                    _ => rx.recv().ok(),
                };
                let Some(report) = next else { break };
                match slots.get_mut(report.worker) {
                    Some(slot) if slot.is_none() => *slot = Some(report.outcomes),
                    _ => {
                        return Err(Error::ChannelError(format!(
                            "收到未知或重复的 worker 结果: {}",
                            report.worker
                        )))
                    }
                }
                received += 1;
                transition(state, SchedulerState::Awaiting(n_workers - received));
            }

            for (index, handle) in handles {
                if let Err(payload) = handle.join() {
                    return Err(Error::WorkerPanicked {
                        worker: index,
                        reason: panic_message(payload.as_ref()),
                    });
                }
            }
            Ok(())
        })?;

        transition(state, SchedulerState::Collecting);
        let mut results = Vec::with_capacity(total);
        for (index, slot) in slots.into_iter().enumerate() {
            let outcomes = slot
                .ok_or_else(|| Error::ChannelError(format!("worker {} 未返回结果", index)))?;
            if outcomes.len() != workers[index].len() {
                return Err(Error::ChannelError(format!(
                    "worker {} 返回 {} 个结果，期望 {} 个",
                    index,
                    outcomes.len(),
                    workers[index].len()
                )));
            }
            results.extend(outcomes);
        }

        let summary = RunSummary {
            run_id: self.run_id,
            workers: n_workers,
            total,
            succeeded: results.iter().filter(|o| o.is_success()).count(),
            failed: results.iter().filter(|o| o.is_failure()).count(),
            not_executed: results.iter().filter(|o| !o.is_executed()).count(),
            elapsed: started.elapsed(),
            cancelled: stop.is_raised(),
            timed_out,
        };
        info!(
            run_id = %self.run_id,
            succeeded = summary.succeeded,
            failed = summary.failed,
            not_executed = summary.not_executed,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "运行结束"
        );
        if summary.cancelled {
            warn!(run_id = %self.run_id, not_executed = summary.not_executed, "运行被提前停止");
        }

        transition(state, SchedulerState::Done);
        self.results = results;
        self.summary = Some(summary);
        Ok(())
    }
}

/// 便捷函数：用给定 worker 数运行任务并返回有序结果
pub fn run_tasks<T: Task>(ncores: usize, tasks: Vec<T>) -> Result<Vec<Outcome<T::Output>>> {
    let mut scheduler = Scheduler::new(ncores, tasks)?;
    scheduler.run()?;
    Ok(scheduler.into_results())
}

fn transition(state: &mut SchedulerState, next: SchedulerState) {
    debug!(from = ?state, to = ?next, "调度器状态变更");
    *state = next;
}
