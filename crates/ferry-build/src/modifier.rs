//! Release-time rewrites of `CHANGELOG.md` and the project version file.
//!
//! Both edits are all-or-nothing. Every pattern has to match exactly once,
//! otherwise the file is left untouched and an error names the pattern and
//! how often it matched.

use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

const UNRELEASED_HEADING: &str = "## [Unreleased]";
const UNRELEASED_LINK: &str = "[Unreleased]: https://github.com/<repo>/...";
const VERSION_DECLARATION: &str = "version = \"X.Y.Z\"";

static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^## \[Unreleased\][ \t\r]*$").expect("static regex is valid"));

static VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bversion(\s*=\s*")(?P<version>\d+\.\d+\.\d+(?:-[0-9A-Za-z.-]+)?)""#)
        .expect("static regex is valid")
});

#[derive(Debug, thiserror::Error)]
pub enum ModifierError {
    #[error("invalid {field}: {reason}")]
    Validation {
        field: &'static str,
        reason: &'static str,
    },

    #[error("expected exactly one `{pattern}` in {path}, found {count}")]
    AmbiguousMatch {
        path: PathBuf,
        pattern: &'static str,
        count: usize,
    },

    #[error("file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("failed to access {path}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl ModifierError {
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, ModifierError::AmbiguousMatch { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ModifierError::NotFound { .. })
    }
}

#[derive(Debug, Clone)]
pub struct Modifier {
    version: String,
    repository: String,
    working_dir: PathBuf,
    date: NaiveDate,
    changelog: PathBuf,
    version_file: PathBuf,
}

impl Modifier {
    /// `repository` is `<organisation>/<project>`; `version` carries no
    /// leading `v`.
    pub fn new(
        version: impl Into<String>,
        repository: impl Into<String>,
        working_dir: impl Into<PathBuf>,
    ) -> Result<Self, ModifierError> {
        let version = version.into();
        let repository = repository.into();
        let working_dir = working_dir.into();

        if version.is_empty() {
            return Err(ModifierError::Validation {
                field: "version",
                reason: "must not be empty",
            });
        }
        if version.starts_with('v') {
            return Err(ModifierError::Validation {
                field: "version",
                reason: "must not start with `v`",
            });
        }
        match repository.split_once('/') {
            Some((org, project)) if !org.is_empty() && !project.is_empty() => {}
            _ => {
                return Err(ModifierError::Validation {
                    field: "repository",
                    reason: "must be <organisation>/<project>",
                });
            }
        }
        if working_dir.as_os_str().is_empty() {
            return Err(ModifierError::Validation {
                field: "working_dir",
                reason: "must not be empty",
            });
        }

        Ok(Self {
            version,
            repository,
            working_dir,
            date: chrono::Local::now().date_naive(),
            changelog: PathBuf::from("CHANGELOG.md"),
            version_file: PathBuf::from("pkg/project/project.go"),
        })
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = date;
        self
    }

    /// Changelog location relative to the working directory.
    pub fn with_changelog(mut self, path: impl Into<PathBuf>) -> Self {
        self.changelog = path.into();
        self
    }

    /// Version file location relative to the working directory.
    pub fn with_version_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.version_file = path.into();
        self
    }

    pub fn changelog_path(&self) -> PathBuf {
        self.working_dir.join(&self.changelog)
    }

    pub fn version_file_path(&self) -> PathBuf {
        self.working_dir.join(&self.version_file)
    }

    /// Open a dated section for this version under `## [Unreleased]` and
    /// rewrite the footer comparison links.
    pub fn add_release_to_changelog_md(&self) -> Result<(), ModifierError> {
        let path = self.changelog_path();
        let content = read(&path)?;
        let updated = add_release(&content, &self.version, &self.repository, self.date, &path)?;
        write(&path, &updated)?;
        tracing::info!(path = %path.display(), version = %self.version, "added release to changelog");
        Ok(())
    }

    /// Set the single `version = "..."` declaration to this version with any
    /// numeric pre-release suffix removed.
    pub fn update_version_in_project_go(&self) -> Result<(), ModifierError> {
        let path = self.version_file_path();
        let content = read(&path)?;
        let updated = set_version(&content, &self.version, &path)?;
        if updated != content {
            write(&path, &updated)?;
        }
        tracing::info!(path = %path.display(), version = %self.version, "updated version file");
        Ok(())
    }
}

fn add_release(
    content: &str,
    version: &str,
    repository: &str,
    date: NaiveDate,
    path: &Path,
) -> Result<String, ModifierError> {
    let heading = exactly_one(&HEADING, content, UNRELEASED_HEADING, path)?;
    let section = format!(
        "{UNRELEASED_HEADING}\n\n## [{version}] - {}",
        date.format("%Y-%m-%d")
    );
    let content = splice(content, heading.start(), heading.end(), &section);

    let repo = regex::escape(repository);
    let compare = Regex::new(&format!(
        r"(?m)^\[Unreleased\]:[ \t]*https://github\.com/{repo}/compare/v(?P<previous>\S+?)\.\.\.HEAD[ \t\r]*$"
    ))
    .expect("escaped repository forms a valid regex");
    let tree = Regex::new(&format!(
        r"(?m)^\[Unreleased\]:[ \t]*https://github\.com/{repo}/tree/\S+[ \t\r]*$"
    ))
    .expect("escaped repository forms a valid regex");

    let compares: Vec<(Range<usize>, &str)> = compare
        .captures_iter(&content)
        .filter_map(|c| Some((c.get(0)?.range(), c.name("previous")?.as_str())))
        .collect();
    let trees: Vec<Range<usize>> = tree.find_iter(&content).map(|m| m.range()).collect();
    let count = compares.len() + trees.len();
    if count != 1 {
        return Err(ModifierError::AmbiguousMatch {
            path: path.to_path_buf(),
            pattern: UNRELEASED_LINK,
            count,
        });
    }

    let base = format!("https://github.com/{repository}");
    let unreleased = format!("[Unreleased]: {base}/compare/v{version}...HEAD");
    let (range, released) = match (compares.first(), trees.first()) {
        (Some((range, previous)), _) => (
            range.clone(),
            format!("[{version}]: {base}/compare/v{previous}...v{version}"),
        ),
        (None, Some(range)) => (
            range.clone(),
            format!("[{version}]: {base}/releases/tag/v{version}"),
        ),
        (None, None) => unreachable!("count checked above"),
    };

    let footer = format!("{unreleased}\n{released}");
    Ok(splice(&content, range.start, range.end, &footer))
}

fn set_version(content: &str, version: &str, path: &Path) -> Result<String, ModifierError> {
    let found: Vec<regex::Match<'_>> = VERSION
        .captures_iter(content)
        .filter_map(|c| c.name("version"))
        .collect();
    match found.as_slice() {
        [current] => {
            let stripped = ferry_core::version::strip_numeric_suffix(version);
            Ok(splice(content, current.start(), current.end(), stripped))
        }
        _ => Err(ModifierError::AmbiguousMatch {
            path: path.to_path_buf(),
            pattern: VERSION_DECLARATION,
            count: found.len(),
        }),
    }
}

fn exactly_one<'a>(
    re: &Regex,
    content: &'a str,
    pattern: &'static str,
    path: &Path,
) -> Result<regex::Match<'a>, ModifierError> {
    let mut matches = re.find_iter(content);
    match (matches.next(), matches.count()) {
        (Some(m), 0) => Ok(m),
        (first, rest) => Err(ModifierError::AmbiguousMatch {
            path: path.to_path_buf(),
            pattern,
            count: usize::from(first.is_some()) + rest,
        }),
    }
}

fn splice(content: &str, start: usize, end: usize, replacement: &str) -> String {
    let mut out = String::with_capacity(content.len() + replacement.len());
    out.push_str(&content[..start]);
    out.push_str(replacement);
    out.push_str(&content[end..]);
    out
}

fn read(path: &Path) -> Result<String, ModifierError> {
    std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ModifierError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ModifierError::Io {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })
}

fn write(path: &Path, content: &str) -> Result<(), ModifierError> {
    std::fs::write(path, content).map_err(|e| ModifierError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}
