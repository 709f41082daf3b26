//! cancellation.rs
//!
//! 在运行过程中从另一个线程调用 terminate：worker 在当前任务结束后停止，
//! 未执行的任务以 NotExecuted 占位，结果顺序不变。

use scheduler::{Outcome, Scheduler, SchedulerConfig, Task, TaskError};
use std::thread;
use std::time::Duration;

struct Slow {
    id: usize,
}

impl Task for Slow {
    type Output = usize;

    fn run(&mut self) -> Result<usize, TaskError> {
        thread::sleep(Duration::from_millis(30));
        Ok(self.id)
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let tasks = (0..24).map(|id| Slow { id }).collect();
    let config = SchedulerConfig::with_ncores(4).timeout(Duration::from_secs(5));
    let mut scheduler = Scheduler::with_config(config, tasks)?;

    let handle = scheduler.cancel_handle();
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        println!("发送取消信号");
        handle.terminate();
    });

    let results = scheduler.run()?;
    let line: Vec<String> = results
        .iter()
        .map(|outcome| match outcome {
            Outcome::Success(id) => id.to_string(),
            Outcome::Failure(_) => "x".to_string(),
            Outcome::NotExecuted => "-".to_string(),
        })
        .collect();
    println!("{}", line.join(" "));
    let _ = canceller.join();

    if let Some(summary) = scheduler.summary() {
        println!("{:#?}", summary);
    }
    Ok(())
}
