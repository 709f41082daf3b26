// error.rs
// 定义调度器的通用错误类型（配置、状态、线程创建、通道、IO等）和Result类型。
// 任务自身的失败不走这里，而是记录为 Outcome::Failure，见 task.rs。
use std::fmt;
use std::io;

/// 调度器通用错误类型。
/// 除 ConfigError / InvalidState 外，其余变体都属于编排失败，会使本次运行进入 Aborted 状态。
#[derive(Debug)]
pub enum Error {
    /// 配置错误：工作线程数非法、任务列表为空、配置文件无法解析等
    ConfigError(String),
    /// 调度器状态不允许当前操作（例如重复调用 run）
    InvalidState(String),
    /// 无法为某个 worker 创建执行线程
    SpawnError { worker: usize, reason: String },
    /// 结果通道意外关闭或缺少某个 worker 的结果
    ChannelError(String),
    /// worker 线程在任务之外发生 panic
    WorkerPanicked { worker: usize, reason: String },
    /// IO错误
    Io(io::Error),
    /// JSON 解析错误
    Json(serde_json::Error),
}

/// 通用结果类型
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// 是否为编排失败（区别于调用前即可发现的配置/状态错误）
    pub fn is_orchestration_failure(&self) -> bool {
        matches!(
            self,
            Error::SpawnError { .. } | Error::ChannelError(_) | Error::WorkerPanicked { .. }
        )
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ConfigError(msg) => write!(f, "配置错误: {}", msg),
            Error::InvalidState(msg) => write!(f, "状态错误: {}", msg),
            Error::SpawnError { worker, reason } => {
                write!(f, "无法启动 worker {}: {}", worker, reason)
            }
            Error::ChannelError(msg) => write!(f, "结果通道错误: {}", msg),
            Error::WorkerPanicked { worker, reason } => {
                write!(f, "worker {} 异常退出: {}", worker, reason)
            }
            Error::Io(e) => write!(f, "IO错误: {}", e),
            Error::Json(e) => write!(f, "JSON错误: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Json(e) => Some(e),
            _ => None,
        }
    }
}
