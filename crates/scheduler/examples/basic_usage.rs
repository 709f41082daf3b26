//! basic_usage.rs
//!
//! 最基本的用法：实现 Task，交给 Scheduler 并行执行，按提交顺序取回结果。

use scheduler::error::Result;
use scheduler::partition::{boundaries, split};
use scheduler::{Scheduler, Task, TaskError};

/// 输入加一，结果同时记录在任务自身
struct Increment {
    input: i32,
    output: Option<i32>,
}

impl Task for Increment {
    type Output = i32;

    fn run(&mut self) -> std::result::Result<i32, TaskError> {
        self.output = Some(self.input + 1);
        Ok(self.input + 1)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    println!("=== 分块边界 ===");
    println!("boundaries(10, 3) = {:?}", boundaries(10, 3)?);
    println!("boundaries(10, 4) = {:?}", boundaries(10, 4)?);
    let items: Vec<i32> = (1..=10).collect();
    println!("split(1..=10, 3) = {:?}", split(&items, 3)?);

    println!("\n=== 并行执行 ===");
    let tasks = (1..=10).map(|input| Increment { input, output: None }).collect();
    let mut scheduler = Scheduler::new(3, tasks)?;
    let results = scheduler.run()?;
    for (i, outcome) in results.iter().enumerate() {
        println!("任务 #{} -> {:?}", i, outcome);
    }

    // 线程与调用方共享内存，任务对自身的修改在运行后可见
    for worker in scheduler.workers() {
        let outputs: Vec<_> = worker.tasks().iter().map(|t| t.output).collect();
        println!("worker {} {:?}: {:?}", worker.index(), worker.range(), outputs);
    }
    Ok(())
}
