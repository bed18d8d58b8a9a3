//! `helm` command builders.

use std::path::Path;
use std::sync::Arc;

use crate::executor::CommandExecutor;
use crate::task::{ExecTask, args};

/// `helm package` a chart directory into `destination` as one `.tgz`,
/// stamping both chart and app version.
pub fn package<E: CommandExecutor>(
    executor: &Arc<E>,
    chart_dir: &Path,
    destination: &Path,
    version: &str,
) -> ExecTask<E> {
    let mut command = args(["helm", "package"]);
    command.push(chart_dir.display().to_string());
    command.extend([
        "--destination".to_owned(),
        destination.display().to_string(),
        "--version".to_owned(),
        version.to_owned(),
        "--app-version".to_owned(),
        version.to_owned(),
    ]);
    ExecTask::with_executor(Arc::clone(executor), "helm-package", command, "")
}

/// `helm lint` a chart directory.
pub fn lint<E: CommandExecutor>(executor: &Arc<E>, chart_dir: &Path) -> ExecTask<E> {
    let mut command = args(["helm", "lint"]);
    command.push(chart_dir.display().to_string());
    ExecTask::with_executor(Arc::clone(executor), "helm-lint", command, "")
}
