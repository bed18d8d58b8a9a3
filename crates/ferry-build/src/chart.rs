//! Helm chart discovery and packaging.

use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use ferry_exec::{CommandExecutor, ExecTask, helm};
use regex::Regex;

pub const CHART_FILE: &str = "Chart.yaml";

static TOP_LEVEL_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(?P<key>[A-Za-z][A-Za-z0-9_]*):[ \t]*(?P<value>.*?)[ \t\r]*$")
        .expect("static regex is valid")
});

#[derive(Debug, thiserror::Error)]
pub enum ChartError {
    #[error("no {CHART_FILE} in {dir}")]
    MissingChartFile { dir: PathBuf },

    #[error("{path} has no `{key}`")]
    MissingKey { path: PathBuf, key: &'static str },

    #[error("failed to access {path}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// The parts of `Chart.yaml` ferry cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartMetadata {
    pub dir: PathBuf,
    pub name: String,
    pub version: String,
    pub app_version: Option<String>,
}

impl ChartMetadata {
    pub fn load_dir(dir: &Path) -> Result<Self, ChartError> {
        let path = dir.join(CHART_FILE);
        let content = std::fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ChartError::MissingChartFile {
                    dir: dir.to_path_buf(),
                }
            } else {
                ChartError::Io {
                    path: path.clone(),
                    source: e,
                }
            }
        })?;

        let mut name = None;
        let mut version = None;
        let mut app_version = None;
        for caps in TOP_LEVEL_KEY.captures_iter(&content) {
            let value = unquote(&caps["value"]).to_owned();
            match &caps["key"] {
                "name" => name = Some(value),
                "version" => version = Some(value),
                "appVersion" => app_version = Some(value),
                _ => {}
            }
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            name: name.ok_or_else(|| ChartError::MissingKey {
                path: path.clone(),
                key: "name",
            })?,
            version: version.ok_or(ChartError::MissingKey { path, key: "version" })?,
            app_version,
        })
    }

    /// `helm package` this chart into `destination` at `version`.
    pub fn package_task<E: CommandExecutor>(
        &self,
        executor: &Arc<E>,
        destination: &Path,
        version: &str,
    ) -> ExecTask<E> {
        helm::package(executor, &self.dir, destination, version)
    }

    pub fn lint_task<E: CommandExecutor>(&self, executor: &Arc<E>) -> ExecTask<E> {
        helm::lint(executor, &self.dir)
    }
}

/// Immediate subdirectories of `charts_dir` that hold a `Chart.yaml`,
/// sorted. A missing `charts_dir` has no charts.
pub fn discover(charts_dir: &Path) -> Result<Vec<ChartMetadata>, ChartError> {
    let entries = match std::fs::read_dir(charts_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(dir = %charts_dir.display(), "no charts directory");
            return Ok(Vec::new());
        }
        Err(e) => {
            return Err(ChartError::Io {
                path: charts_dir.to_path_buf(),
                source: e,
            });
        }
    };

    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ChartError::Io {
            path: charts_dir.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();
        if path.is_dir() && path.join(CHART_FILE).is_file() {
            dirs.push(path);
        }
    }
    dirs.sort();
    dirs.iter().map(|dir| ChartMetadata::load_dir(dir)).collect()
}

fn unquote(value: &str) -> &str {
    let value = value.split(" #").next().unwrap_or(value).trim();
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value)
}
