use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use ferry_core::{Task, TaskError};

use crate::executor::{CommandExecutor, SystemExecutor};
use crate::redact::redact_command;

/// Runs one external command, streaming its output.
///
/// Name and arguments are fixed at construction. The description redacts
/// `*password*=value` arguments.
pub struct ExecTask<E: CommandExecutor = SystemExecutor> {
    name: String,
    args: Vec<String>,
    dir: PathBuf,
    executor: Arc<E>,
}

impl ExecTask<SystemExecutor> {
    pub fn new(name: impl Into<String>, args: Vec<String>, dir: impl Into<PathBuf>) -> Self {
        Self::with_executor(Arc::new(SystemExecutor), name, args, dir)
    }
}

impl<E: CommandExecutor> ExecTask<E> {
    pub fn with_executor(
        executor: Arc<E>,
        name: impl Into<String>,
        args: Vec<String>,
        dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            args,
            dir: dir.into(),
            executor,
        }
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn working_dir(&self) -> &Path {
        &self.dir
    }
}

impl<E: CommandExecutor> fmt::Display for ExecTask<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&redact_command(&self.args))
    }
}

impl<E: CommandExecutor> fmt::Debug for ExecTask<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecTask")
            .field("name", &self.name)
            .field("args", &redact_command(&self.args))
            .field("dir", &self.dir)
            .finish()
    }
}

#[async_trait]
impl<E: CommandExecutor + 'static> Task for ExecTask<E> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> Result<(), TaskError> {
        self.executor
            .run(&self.args, &self.dir)
            .await
            .map_err(|e| TaskError::failed(&self.name, e))
    }
}

/// Owned argument vector from string literals and formatted values.
pub(crate) fn args<const N: usize>(a: [&str; N]) -> Vec<String> {
    a.iter().map(|s| (*s).to_owned()).collect()
}
