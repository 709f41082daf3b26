// main.rs
// 演示程序：生成一批随机耗时的加一任务，用调度器并行执行，并打印每个 worker 的执行情况。
use anyhow::Context;
use clap::Parser;
use prettytable::{cell, row, Table};
use rand::Rng;
use scheduler::{FailurePolicy, Outcome, Scheduler, SchedulerConfig, Task, TaskError, Worker};
use serde::Serialize;
use std::thread;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(version, about = "把一批独立任务分块并行执行，按提交顺序汇总结果", long_about = None)]
struct Args {
    /// JSON 配置文件路径，命令行参数会覆盖其中的同名字段
    #[arg(long)]
    config: Option<String>,
    /// worker 数
    #[arg(long)]
    ncores: Option<usize>,
    /// 任务数
    #[arg(long, default_value_t = 20)]
    tasks: usize,
    /// 每隔多少个任务制造一次失败，0 表示不失败
    #[arg(long, default_value_t = 0)]
    fail_every: usize,
    /// 第一个失败后停止其余任务
    #[arg(long)]
    fail_fast: bool,
    /// 单个任务的最大随机耗时（毫秒）
    #[arg(long, default_value_t = 50)]
    max_delay_ms: u64,
}

/// 睡眠一段时间后返回输入加一
struct DemoTask {
    input: i64,
    delay: Duration,
    fail: bool,
}

impl Task for DemoTask {
    type Output = i64;

    fn run(&mut self) -> Result<i64, TaskError> {
        thread::sleep(self.delay);
        if self.fail {
            return Err(TaskError::new(format!("输入 {} 被配置为失败", self.input)));
        }
        Ok(self.input + 1)
    }
}

#[derive(Serialize)]
struct FailureEntry<'a> {
    position: usize,
    message: &'a str,
}

fn build_config(args: &Args) -> anyhow::Result<SchedulerConfig> {
    let mut config = match &args.config {
        Some(path) => SchedulerConfig::from_json_file(path)
            .with_context(|| format!("读取配置文件 {} 失败", path))?,
        None => SchedulerConfig::default(),
    };
    if let Some(ncores) = args.ncores {
        config.ncores = ncores;
    }
    if args.fail_fast {
        config.failure_policy = FailurePolicy::FailFast;
    }
    Ok(config)
}

fn print_workers(workers: &[Worker<DemoTask>]) {
    let mut table = Table::new();
    table.add_row(row!["worker", "区间", "状态", "成功", "失败", "未执行", "耗时(ms)"]);
    for worker in workers {
        let range = worker.range();
        let stats = worker.stats();
        table.add_row(row![
            worker.index(),
            format!("[{}, {})", range.start, range.end),
            format!("{:?}", worker.state()),
            stats.succeeded,
            stats.failed,
            stats.not_executed,
            stats.elapsed.as_millis()
        ]);
    }
    table.printstd();
}

fn main() -> anyhow::Result<()> {
    // setup tracing
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = build_config(&args)?;

    let mut rng = rand::thread_rng();
    let tasks: Vec<DemoTask> = (0..args.tasks)
        .map(|i| DemoTask {
            input: i as i64,
            delay: Duration::from_millis(rng.gen_range(0..=args.max_delay_ms)),
            fail: args.fail_every > 0 && (i + 1) % args.fail_every == 0,
        })
        .collect();

    let mut scheduler = Scheduler::with_config(config, tasks)?;
    info!(run_id = %scheduler.run_id(), ncores = scheduler.ncores(), "调度器已创建");
    scheduler.run()?;

    print_workers(scheduler.workers());

    let failures: Vec<FailureEntry> = scheduler
        .results()
        .iter()
        .enumerate()
        .filter_map(|(position, outcome)| match outcome {
            Outcome::Failure(err) => Some(FailureEntry { position, message: &err.message }),
            _ => None,
        })
        .collect();
    if !failures.is_empty() {
        println!("失败任务: {}", serde_json::to_string_pretty(&failures)?);
    }
    if let Some(summary) = scheduler.summary() {
        println!("{}", serde_json::to_string_pretty(summary)?);
    }
    Ok(())
}
