use rand::Rng;
use scheduler::{
    CorePolicy, Error, FailurePolicy, Outcome, Scheduler, SchedulerConfig, SchedulerState, Task,
    TaskError, WorkerState,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use uuid::Uuid;

/// 输入加一，结果同时写回自身
struct Increment {
    input: i32,
    output: Option<i32>,
}

impl Increment {
    fn new(input: i32) -> Self {
        Self { input, output: None }
    }
}

impl Task for Increment {
    type Output = i32;

    fn run(&mut self) -> Result<i32, TaskError> {
        self.output = Some(self.input + 1);
        Ok(self.input + 1)
    }
}

/// 创建一个空文件，没有返回值
struct FileTask {
    path: PathBuf,
}

impl Task for FileTask {
    type Output = ();

    fn run(&mut self) -> Result<(), TaskError> {
        std::fs::File::create(&self.path)?;
        Ok(())
    }
}

/// 睡眠随机时长后返回自己的下标，用来打乱 worker 的完成顺序
struct Sleepy {
    index: usize,
    delay: Duration,
    fail: bool,
}

impl Task for Sleepy {
    type Output = usize;

    fn run(&mut self) -> Result<usize, TaskError> {
        thread::sleep(self.delay);
        if self.fail {
            return Err(TaskError::new(format!("task {} failed", self.index)));
        }
        Ok(self.index)
    }
}

/// 记录执行次数，便于确认取消后没有多余任务被执行
struct Counted {
    delay: Duration,
    executed: Arc<AtomicUsize>,
}

impl Task for Counted {
    type Output = ();

    fn run(&mut self) -> Result<(), TaskError> {
        thread::sleep(self.delay);
        self.executed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn sleepy_tasks(n: usize, max_delay_ms: u64) -> Vec<Sleepy> {
    let mut rng = rand::thread_rng();
    (0..n)
        .map(|index| Sleepy {
            index,
            delay: Duration::from_millis(rng.gen_range(0..=max_delay_ms)),
            fail: false,
        })
        .collect()
}

#[test]
fn test_scheduler_results_single_core() {
    let mut scheduler = Scheduler::new(1, vec![Increment::new(1), Increment::new(2), Increment::new(3)]).unwrap();
    scheduler.run().unwrap();

    let values: Vec<i32> = scheduler.results().iter().filter_map(|o| o.value().copied()).collect();
    assert_eq!(values, vec![2, 3, 4]);
    assert_eq!(scheduler.workers()[0].state(), WorkerState::Completed);
    let outputs: Vec<Option<i32>> = scheduler.workers()[0].tasks().iter().map(|t| t.output).collect();
    assert_eq!(outputs, vec![Some(2), Some(3), Some(4)]);
}

#[test]
fn test_scheduler_files_exist_after_run() {
    let dir = tempfile::tempdir().unwrap();
    let paths: Vec<PathBuf> = (0..3)
        .map(|_| dir.path().join(Uuid::new_v4().simple().to_string()))
        .collect();
    let tasks = paths.iter().map(|path| FileTask { path: path.clone() }).collect();

    let mut scheduler = Scheduler::new(1, tasks).unwrap();
    let results = scheduler.run().unwrap();
    assert!(results.iter().all(|o| *o == Outcome::Success(())));

    for task in scheduler.workers()[0].tasks() {
        assert!(task.path.exists(), "{} 未被创建", task.path.display());
    }
    for path in &paths {
        assert!(path.exists());
    }
}

#[test]
fn test_file_task_failure_is_reported_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let tasks = vec![
        FileTask { path: dir.path().join("a") },
        FileTask { path: dir.path().join("missing").join("b") },
        FileTask { path: dir.path().join("c") },
    ];
    let mut scheduler = Scheduler::new(1, tasks).unwrap();
    let results = scheduler.run().unwrap();

    assert_eq!(results.len(), 3);
    assert!(results[0].is_success());
    assert!(results[1].error().unwrap().message.contains("IO错误"));
    assert!(results[2].is_success());
}

#[test]
fn test_mixed_failure_fail_soft() {
    let tasks = vec![
        Sleepy { index: 0, delay: Duration::ZERO, fail: false },
        Sleepy { index: 1, delay: Duration::ZERO, fail: true },
        Sleepy { index: 2, delay: Duration::ZERO, fail: false },
    ];
    let mut scheduler = Scheduler::new(1, tasks).unwrap();
    let results = scheduler.run().unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(results[0], Outcome::Success(0));
    assert_eq!(results[1], Outcome::Failure(TaskError::new("task 1 failed")));
    assert_eq!(results[2], Outcome::Success(2));

    let summary = scheduler.summary().unwrap();
    assert_eq!((summary.succeeded, summary.failed, summary.not_executed), (2, 1, 0));
    assert!(!summary.cancelled);
}

#[test]
fn test_order_preserved_under_random_completion() {
    for ncores in [1, 2, 3, 4, 7, 16] {
        let tasks = sleepy_tasks(23, 15);
        let mut scheduler = Scheduler::new(ncores, tasks).unwrap();
        let results = scheduler.run().unwrap();

        let indices: Vec<usize> = results.iter().map(|o| *o.value().unwrap()).collect();
        assert_eq!(indices, (0..23).collect::<Vec<_>>(), "ncores={}", ncores);
        assert_eq!(scheduler.workers().len(), ncores.min(23));
        assert_eq!(scheduler.state(), SchedulerState::Done);
    }
}

#[test]
fn test_partitioning_is_deterministic() {
    let ranges = |ncores| {
        let mut scheduler = Scheduler::new(ncores, sleepy_tasks(10, 0)).unwrap();
        scheduler.run().unwrap();
        scheduler.workers().iter().map(|w| w.range()).collect::<Vec<_>>()
    };
    assert_eq!(ranges(3), vec![0..4, 4..7, 7..10]);
    assert_eq!(ranges(3), ranges(3));
}

#[test]
fn test_failures_across_workers_stay_in_position() {
    let tasks: Vec<Sleepy> = (0..12)
        .map(|index| Sleepy { index, delay: Duration::from_millis(1), fail: index % 5 == 0 })
        .collect();
    let mut scheduler = Scheduler::new(4, tasks).unwrap();
    let results = scheduler.run().unwrap();

    for (index, outcome) in results.iter().enumerate() {
        if index % 5 == 0 {
            assert!(outcome.is_failure(), "位置 {} 应当失败", index);
        } else {
            assert_eq!(outcome, &Outcome::Success(index));
        }
    }
}

#[test]
fn test_terminate_during_run_keeps_order() {
    let executed = Arc::new(AtomicUsize::new(0));
    let tasks: Vec<Counted> = (0..40)
        .map(|_| Counted { delay: Duration::from_millis(20), executed: executed.clone() })
        .collect();
    let mut scheduler = Scheduler::new(2, tasks).unwrap();
    let handle = scheduler.cancel_handle();

    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(70));
        handle.terminate();
    });
    let results = scheduler.run().unwrap().to_vec();
    canceller.join().unwrap();

    assert_eq!(results.len(), 40);
    let done = executed.load(Ordering::SeqCst);
    assert!(done < 40, "取消后仍执行了全部任务");
    assert_eq!(results.iter().filter(|o| o.is_executed()).count(), done);

    // 每个块内已执行的任务是前缀，未执行的在后
    for worker in scheduler.workers() {
        let chunk = &results[worker.range()];
        let executed_prefix = chunk.iter().take_while(|o| o.is_executed()).count();
        assert!(chunk[executed_prefix..].iter().all(|o| !o.is_executed()));
        assert_eq!(worker.state(), WorkerState::Cancelled);
    }
    assert!(scheduler.summary().unwrap().cancelled);
}

#[test]
fn test_fail_fast_stops_other_workers() {
    let mut tasks = sleepy_tasks(30, 0);
    for task in tasks.iter_mut() {
        task.delay = Duration::from_millis(10);
    }
    tasks[0].fail = true;
    tasks[0].delay = Duration::ZERO;

    let config = SchedulerConfig::with_ncores(3).failure_policy(FailurePolicy::FailFast);
    let mut scheduler = Scheduler::with_config(config, tasks).unwrap();
    let results = scheduler.run().unwrap();

    assert_eq!(results.len(), 30);
    assert!(results[0].is_failure());
    assert!(results[1..10].iter().all(|o| !o.is_executed()));
    assert!(results.iter().any(|o| !o.is_executed()));
    assert_eq!(scheduler.summary().unwrap().failed, 1);
}

#[test]
fn test_timeout_marks_remaining_not_executed() {
    let executed = Arc::new(AtomicUsize::new(0));
    let tasks: Vec<Counted> = (0..20)
        .map(|_| Counted { delay: Duration::from_millis(25), executed: executed.clone() })
        .collect();
    let config = SchedulerConfig::with_ncores(2).timeout(Duration::from_millis(60));
    let mut scheduler = Scheduler::with_config(config, tasks).unwrap();
    let results = scheduler.run().unwrap();

    assert_eq!(results.len(), 20);
    assert!(results.iter().any(|o| !o.is_executed()));
    let summary = scheduler.summary().unwrap();
    assert!(summary.timed_out);
    assert_eq!(summary.total, 20);
    assert_eq!(summary.not_executed + summary.succeeded, 20);
}

#[test]
fn test_config_from_file_drives_scheduler() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("parallel.json");
    std::fs::write(&path, r#"{"ncores": 5, "core_policy": "reject"}"#).unwrap();

    let config = SchedulerConfig::from_json_file(&path).unwrap();
    assert_eq!(config.core_policy, CorePolicy::Reject);
    assert!(matches!(
        Scheduler::with_config(config.clone(), sleepy_tasks(3, 0)),
        Err(Error::ConfigError(_))
    ));

    let mut scheduler = Scheduler::with_config(config, sleepy_tasks(5, 0)).unwrap();
    scheduler.run().unwrap();
    assert_eq!(scheduler.workers().len(), 5);
    assert!(scheduler.workers().iter().all(|w| w.len() == 1));
}
