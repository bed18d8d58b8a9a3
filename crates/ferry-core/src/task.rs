//! The unit of work a [`Workflow`](crate::Workflow) is made of.
//!
//! ```text
//! Task ── NoopTask
//!      ├─ RetryTask<B: Backoff>   reruns one task until it succeeds or B gives up
//!      ├─ ConcurrentTask          spawns children, awaits all, reports first failure
//!      └─ (ferry-exec) ExecTask, (ferry-build) TemplateTask
//! ```

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::backoff::Backoff;

/// Boxed error carried by a failed task.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A named, runnable step. `Display` is the human description shown in logs
/// and must not leak secrets.
#[async_trait]
pub trait Task: fmt::Display + Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self) -> Result<(), TaskError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("task `{task}` failed")]
    Failed { task: String, source: BoxError },

    #[error("task `{task}` panicked")]
    Panicked { task: String },

    #[error("task `{task}` was cancelled")]
    Cancelled { task: String },
}

impl TaskError {
    pub fn failed(task: impl Into<String>, source: impl Into<BoxError>) -> Self {
        TaskError::Failed {
            task: task.into(),
            source: source.into(),
        }
    }

    /// Name of the task that produced this error.
    pub fn task(&self) -> &str {
        match self {
            TaskError::Failed { task, .. }
            | TaskError::Panicked { task }
            | TaskError::Cancelled { task } => task,
        }
    }

    /// The underlying error, if it is of type `E`.
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        match self {
            TaskError::Failed { source, .. } => source.downcast_ref::<E>(),
            _ => None,
        }
    }

    /// This error and its causes joined with `: `.
    pub fn chain(&self) -> String {
        let mut message = self.to_string();
        let mut cause = std::error::Error::source(self);
        while let Some(err) = cause {
            message.push_str(": ");
            message.push_str(&err.to_string());
            cause = err.source();
        }
        message
    }
}

/// Placeholder for a slot where no work applies.
#[derive(Debug, Clone)]
pub struct NoopTask {
    name: String,
}

impl NoopTask {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl fmt::Display for NoopTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (nothing to do)", self.name)
    }
}

#[async_trait]
impl Task for NoopTask {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> Result<(), TaskError> {
        Ok(())
    }
}

/// Reruns a task until it succeeds or the backoff policy gives up.
///
/// The last attempt's error is returned unchanged.
pub struct RetryTask<B: Backoff> {
    task: Box<dyn Task>,
    backoff: B,
}

impl<B: Backoff> RetryTask<B> {
    pub fn new(task: Box<dyn Task>, backoff: B) -> Self {
        Self { task, backoff }
    }
}

impl<B: Backoff> fmt::Display for RetryTask<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (with retries)", self.task)
    }
}

#[async_trait]
impl<B: Backoff + 'static> Task for RetryTask<B> {
    fn name(&self) -> &str {
        self.task.name()
    }

    async fn run(&self) -> Result<(), TaskError> {
        let mut backoff = self.backoff.clone();
        let mut attempt: u32 = 1;
        loop {
            let err = match self.task.run().await {
                Ok(()) => return Ok(()),
                Err(err) => err,
            };
            let Some(delay) = backoff.next_delay() else {
                tracing::warn!(task = self.task.name(), attempt, error = %err.chain(), "giving up");
                return Err(err);
            };
            tracing::warn!(
                task = self.task.name(),
                attempt,
                error = %err.chain(),
                retry_in = ?delay,
                "task failed, retrying",
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

/// Runs its children in parallel and waits for every one of them.
///
/// When several children fail, the error of the earliest child (in
/// construction order) is returned; the others are logged.
pub struct ConcurrentTask {
    name: String,
    tasks: Vec<Arc<dyn Task>>,
}

impl ConcurrentTask {
    pub fn new(name: impl Into<String>, tasks: Vec<Box<dyn Task>>) -> Self {
        Self {
            name: name.into(),
            tasks: tasks.into_iter().map(Arc::from).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl fmt::Display for ConcurrentTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [", self.name)?;
        for (i, task) in self.tasks.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{task}")?;
        }
        f.write_str("]")
    }
}

#[async_trait]
impl Task for ConcurrentTask {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> Result<(), TaskError> {
        let handles: Vec<_> = self
            .tasks
            .iter()
            .map(|task| {
                let task = Arc::clone(task);
                tokio::spawn(async move { task.run().await })
            })
            .collect();

        let mut first_error = None;
        for (task, handle) in self.tasks.iter().zip(handles) {
            let outcome = match handle.await {
                Ok(result) => result,
                Err(join_error) if join_error.is_panic() => Err(TaskError::Panicked {
                    task: task.name().to_owned(),
                }),
                Err(_) => Err(TaskError::Cancelled {
                    task: task.name().to_owned(),
                }),
            };

            if let Err(err) = outcome {
                if first_error.is_none() {
                    first_error = Some(err);
                } else {
                    tracing::warn!(group = %self.name, error = %err.chain(), "additional failure");
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
