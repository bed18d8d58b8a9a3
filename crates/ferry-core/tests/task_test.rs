use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use ferry_core::{
    ConcurrentTask, ConstantBackoff, ExponentialBackoff, NoopTask, RetryTask, Task, TaskError,
};

/// Fails until it has been called `failures` times, then succeeds.
struct FlakyTask {
    name: String,
    failures: u32,
    calls: Arc<AtomicU32>,
}

impl FlakyTask {
    fn new(name: &str, failures: u32) -> (Self, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let task = Self {
            name: name.to_owned(),
            failures,
            calls: Arc::clone(&calls),
        };
        (task, calls)
    }
}

impl fmt::Display for FlakyTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "flaky {}", self.name)
    }
}

#[async_trait]
impl Task for FlakyTask {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> Result<(), TaskError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            Err(TaskError::failed(
                &self.name,
                std::io::Error::other(format!("attempt {call} failed")),
            ))
        } else {
            Ok(())
        }
    }
}

/// Sleeps, optionally fails, and records that it ran to completion.
struct SleepyTask {
    name: String,
    delay: Duration,
    fail: bool,
    finished: Arc<AtomicBool>,
}

impl SleepyTask {
    fn boxed(name: &str, delay_ms: u64, fail: bool) -> (Box<dyn Task>, Arc<AtomicBool>) {
        let finished = Arc::new(AtomicBool::new(false));
        let task = Self {
            name: name.to_owned(),
            delay: Duration::from_millis(delay_ms),
            fail,
            finished: Arc::clone(&finished),
        };
        (Box::new(task), finished)
    }
}

impl fmt::Display for SleepyTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sleep {}", self.name)
    }
}

#[async_trait]
impl Task for SleepyTask {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> Result<(), TaskError> {
        tokio::time::sleep(self.delay).await;
        self.finished.store(true, Ordering::SeqCst);
        if self.fail {
            Err(TaskError::failed(
                &self.name,
                std::io::Error::new(std::io::ErrorKind::NotFound, self.name.clone()),
            ))
        } else {
            Ok(())
        }
    }
}

// ── NoopTask ──

#[tokio::test]
async fn noop_always_succeeds() {
    let task = NoopTask::new("placeholder");
    assert!(task.run().await.is_ok());
    assert_eq!(task.name(), "placeholder");
    assert!(task.to_string().contains("placeholder"));
}

// ── RetryTask ──

#[tokio::test(start_paused = true)]
async fn retry_succeeds_after_transient_failures() {
    let (flaky, calls) = FlakyTask::new("push", 2);
    let task = RetryTask::new(
        Box::new(flaky),
        ConstantBackoff::new(Duration::from_secs(1), 5),
    );

    task.run().await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn retry_returns_last_error_when_backoff_gives_up() {
    let (flaky, calls) = FlakyTask::new("push", 10);
    let task = RetryTask::new(Box::new(flaky), ExponentialBackoff::new(Duration::from_secs(1), 2));

    let err = task.run().await.unwrap_err();

    // one initial attempt plus two retries
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(err.task(), "push");
    let io = err.downcast_ref::<std::io::Error>().unwrap();
    assert_eq!(io.to_string(), "attempt 3 failed");
}

#[tokio::test(start_paused = true)]
async fn retry_backoff_state_is_fresh_for_every_run() {
    let (flaky, calls) = FlakyTask::new("login", 1);
    let task = RetryTask::new(
        Box::new(flaky),
        ConstantBackoff::new(Duration::from_millis(10), 1),
    );

    task.run().await.unwrap();
    // A second run would have no retries left if the counter leaked.
    calls.store(0, Ordering::SeqCst);
    task.run().await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn retry_instances_do_not_share_backoff_counters() {
    let policy = ConstantBackoff::new(Duration::from_millis(10), 1);
    let (a, a_calls) = FlakyTask::new("a", 1);
    let (b, b_calls) = FlakyTask::new("b", 1);
    let first = RetryTask::new(Box::new(a), policy.clone());
    let second = RetryTask::new(Box::new(b), policy);

    first.run().await.unwrap();
    second.run().await.unwrap();
    assert_eq!(a_calls.load(Ordering::SeqCst), 2);
    assert_eq!(b_calls.load(Ordering::SeqCst), 2);
}

#[test]
fn retry_description_wraps_inner_task() {
    let (flaky, _) = FlakyTask::new("push", 0);
    let task = RetryTask::new(Box::new(flaky), ConstantBackoff::new(Duration::ZERO, 1));
    assert_eq!(task.to_string(), "flaky push (with retries)");
    assert_eq!(task.name(), "push");
}

// ── ConcurrentTask ──

#[tokio::test(start_paused = true)]
async fn concurrent_waits_for_all_when_one_fails() {
    let (fast_fail, fast_done) = SleepyTask::boxed("fast-fail", 10, true);
    let (slow_a, slow_a_done) = SleepyTask::boxed("slow-a", 500, false);
    let (slow_b, slow_b_done) = SleepyTask::boxed("slow-b", 1_000, false);

    let task = ConcurrentTask::new("push images", vec![fast_fail, slow_a, slow_b]);
    let err = task.run().await.unwrap_err();

    assert_eq!(err.task(), "fast-fail");
    assert!(fast_done.load(Ordering::SeqCst));
    assert!(slow_a_done.load(Ordering::SeqCst));
    assert!(slow_b_done.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn concurrent_reports_earliest_child_error() {
    let (a, _) = SleepyTask::boxed("a", 300, false);
    let (b, _) = SleepyTask::boxed("b", 200, true);
    let (c, _) = SleepyTask::boxed("c", 10, true);

    let task = ConcurrentTask::new("group", vec![a, b, c]);
    let err = task.run().await.unwrap_err();

    // c fails first in time, but b comes first in construction order
    assert_eq!(err.task(), "b");
}

#[tokio::test(start_paused = true)]
async fn concurrent_children_run_in_parallel() {
    let (a, _) = SleepyTask::boxed("a", 1_000, false);
    let (b, _) = SleepyTask::boxed("b", 1_000, false);
    let (c, _) = SleepyTask::boxed("c", 1_000, false);

    let started = tokio::time::Instant::now();
    ConcurrentTask::new("group", vec![a, b, c])
        .run()
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_millis(2_000));
}

#[tokio::test]
async fn concurrent_with_no_children_succeeds() {
    let task = ConcurrentTask::new("empty", vec![]);
    assert!(task.is_empty());
    assert!(task.run().await.is_ok());
}

#[test]
fn concurrent_description_lists_children() {
    let task = ConcurrentTask::new(
        "push",
        vec![
            Box::new(NoopTask::new("a")) as Box<dyn Task>,
            Box::new(NoopTask::new("b")),
        ],
    );
    assert_eq!(task.len(), 2);
    assert_eq!(
        task.to_string(),
        "push [a (nothing to do); b (nothing to do)]"
    );
}

// ── TaskError ──

#[test]
fn error_chain_includes_cause() {
    let err = TaskError::failed("login", std::io::Error::other("denied"));
    assert_eq!(err.chain(), "task `login` failed: denied");
    assert!(err.downcast_ref::<std::fmt::Error>().is_none());
}
