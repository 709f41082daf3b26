// task.rs
// 任务接口与单个任务的执行结果。任务只需实现一个无参数的 run 方法。
use serde::{Deserialize, Serialize};
use std::fmt;

/// 可被调度器执行的任务。
///
/// `run` 可以修改任务自身的状态，也可以产生外部副作用（如写文件）。
/// 注意：只有 `run` 的返回值和外部可见的副作用是可靠的完成信号；
/// 对自身字段的修改只在与调用方共享内存的执行环境中可见。
/// 本库的 worker 运行在同一进程的线程里，因此运行结束后可以通过
/// [`Worker::tasks`](crate::worker::Worker::tasks) 读取这些修改。
pub trait Task: Send {
    /// 任务的返回值，没有意义时可用 `()`
    type Output: Send;

    fn run(&mut self) -> Result<Self::Output, TaskError>;
}

/// 任务级别的失败信息，可序列化以便跨执行环境传递
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskError {
    pub message: String,
}

impl TaskError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TaskError {}

impl From<String> for TaskError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for TaskError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<std::io::Error> for TaskError {
    fn from(e: std::io::Error) -> Self {
        Self::new(format!("IO错误: {}", e))
    }
}

impl From<anyhow::Error> for TaskError {
    fn from(e: anyhow::Error) -> Self {
        // {:#} 会带上整条 context 链
        Self::new(format!("{:#}", e))
    }
}

/// 单个任务的执行结果，按任务在原序列中的位置排列
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Outcome<T> {
    /// 执行成功，包含返回值
    Success(T),
    /// 执行失败（返回错误或 panic）
    Failure(TaskError),
    /// 因取消、超时或 fail-fast 而未执行
    NotExecuted,
}

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure(_))
    }

    /// 任务是否真正执行过（成功或失败）
    pub fn is_executed(&self) -> bool {
        !matches!(self, Outcome::NotExecuted)
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Outcome::Success(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&TaskError> {
        match self {
            Outcome::Failure(err) => Some(err),
            _ => None,
        }
    }

    /// 转换为 Result，未执行的任务视为错误
    pub fn into_result(self) -> Result<T, TaskError> {
        match self {
            Outcome::Success(value) => Ok(value),
            Outcome::Failure(err) => Err(err),
            Outcome::NotExecuted => Err(TaskError::new("任务未执行")),
        }
    }
}

impl<T> From<Result<T, TaskError>> for Outcome<T> {
    fn from(result: Result<T, TaskError>) -> Self {
        match result {
            Ok(value) => Outcome::Success(value),
            Err(err) => Outcome::Failure(err),
        }
    }
}

/// 把闭包包装成任务
pub struct FnTask<F> {
    f: F,
}

impl<F, T> Task for FnTask<F>
where
    F: FnMut() -> Result<T, TaskError> + Send,
    T: Send,
{
    type Output = T;

    fn run(&mut self) -> Result<T, TaskError> {
        (self.f)()
    }
}

/// 用闭包创建任务
pub fn task_fn<F, T>(f: F) -> FnTask<F>
where
    F: FnMut() -> Result<T, TaskError> + Send,
    T: Send,
{
    FnTask { f }
}
