//! file_tasks.rs
//!
//! 任务通过外部副作用（创建文件）完成工作，没有返回值。
//! 运行结束后检查文件是否存在，这种信号不依赖任务对象的内存状态。

use scheduler::{task_fn, Scheduler, TaskError};
use std::fs::File;
use std::path::PathBuf;
use uuid::Uuid;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let dir = tempfile::tempdir()?;
    let paths: Vec<PathBuf> = (0..6)
        .map(|_| dir.path().join(Uuid::new_v4().simple().to_string()))
        .collect();

    let make = |path: PathBuf| {
        task_fn(move || -> Result<(), TaskError> {
            File::create(&path)?;
            Ok(())
        })
    };
    let tasks = paths.iter().cloned().map(make).collect();

    let mut scheduler = Scheduler::new(2, tasks)?;
    let results = scheduler.run()?;
    println!("结果: {:?}", results);

    for path in &paths {
        println!("{} 存在: {}", path.display(), path.exists());
    }
    Ok(())
}
