use crate::task::{Task, TaskError};

/// Ordered list of tasks run one at a time, stopping at the first failure.
///
/// There is no resume: running again starts from the first task.
#[derive(Default)]
pub struct Workflow {
    tasks: Vec<Box<dyn Task>>,
}

impl Workflow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, task: impl Task + 'static) {
        self.tasks.push(Box::new(task));
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Human-readable description of every step, in execution order.
    pub fn describe(&self) -> Vec<String> {
        self.tasks.iter().map(|t| t.to_string()).collect()
    }

    pub async fn run(&self) -> Result<(), TaskError> {
        let total = self.tasks.len();
        for (index, task) in self.tasks.iter().enumerate() {
            tracing::info!(step = index + 1, total, "{task}");
            if let Err(err) = task.run().await {
                tracing::error!(task = task.name(), error = %err.chain(), "workflow stopped");
                return Err(err);
            }
        }
        Ok(())
    }
}

impl FromIterator<Box<dyn Task>> for Workflow {
    fn from_iter<I: IntoIterator<Item = Box<dyn Task>>>(iter: I) -> Self {
        Self {
            tasks: iter.into_iter().collect(),
        }
    }
}
