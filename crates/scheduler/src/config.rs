// config.rs
// 调度器配置结构体及其默认实现，包含工作线程数、失败策略、线程数超出任务数时的处理方式和可选超时。
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

/// 任务失败时的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// 记录失败并继续执行其余任务
    #[default]
    FailSoft,
    /// 第一个失败出现后通知所有 worker 在当前任务结束后停止
    FailFast,
}

/// 工作线程数大于任务数时的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CorePolicy {
    /// 收缩为 max(1, min(ncores, 任务数))
    #[default]
    Clamp,
    /// 直接报配置错误
    Reject,
}

/// 调度器配置。并发度必须显式传入，不存在全局默认值。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// 工作线程数（即分块数）
    pub ncores: usize,
    /// 任务失败策略
    pub failure_policy: FailurePolicy,
    /// ncores 超过任务数时的策略
    pub core_policy: CorePolicy,
    /// 运行截止时间（毫秒），到期后协作式停止所有 worker
    pub timeout_ms: Option<u64>,
    /// worker 线程名前缀
    pub thread_name_prefix: String,
}

impl Default for SchedulerConfig {
    /// 默认配置：单线程、失败不中断、自动收缩线程数、不设超时
    fn default() -> Self {
        Self {
            ncores: 1,
            failure_policy: FailurePolicy::FailSoft,
            core_policy: CorePolicy::Clamp,
            timeout_ms: None,
            thread_name_prefix: "parallel-worker".to_string(),
        }
    }
}

impl SchedulerConfig {
    pub fn with_ncores(ncores: usize) -> Self {
        Self {
            ncores,
            ..Self::default()
        }
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn core_policy(mut self, policy: CorePolicy) -> Self {
        self.core_policy = policy;
        self
    }

    /// 设置超时，不足 1 毫秒的部分向上取整，超出 u64 的部分饱和
    pub fn timeout(mut self, timeout: Duration) -> Self {
        let millis = timeout.as_nanos().div_ceil(1_000_000);
        self.timeout_ms = Some(u64::try_from(millis).unwrap_or(u64::MAX));
        self
    }

    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// 从 JSON 配置文件读取配置，缺失的字段取默认值
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            Error::ConfigError(format!("打开配置文件 {} 失败: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    /// 校验配置本身是否合法（与任务数无关的部分）
    pub fn validate(&self) -> Result<()> {
        if self.ncores == 0 {
            return Err(Error::ConfigError("ncores 必须大于等于 1".to_string()));
        }
        if self.thread_name_prefix.is_empty() {
            return Err(Error::ConfigError("thread_name_prefix 不能为空".to_string()));
        }
        // 线程名不允许包含 NUL
        if self.thread_name_prefix.contains('\0') {
            return Err(Error::ConfigError("thread_name_prefix 不能包含 NUL 字符".to_string()));
        }
        Ok(())
    }

    /// 结合任务数计算实际使用的 worker 数
    pub fn effective_ncores(&self, n_tasks: usize) -> Result<usize> {
        self.validate()?;
        if n_tasks == 0 {
            return Err(Error::ConfigError("任务列表为空".to_string()));
        }
        match self.core_policy {
            CorePolicy::Clamp => Ok(self.ncores.min(n_tasks).max(1)),
            CorePolicy::Reject if self.ncores > n_tasks => Err(Error::ConfigError(format!(
                "ncores {} 大于任务数 {}",
                self.ncores, n_tasks
            ))),
            CorePolicy::Reject => Ok(self.ncores),
        }
    }
}
