//! Read-only queries against the git repository being released.

use std::path::PathBuf;
use std::sync::Arc;

use crate::executor::{CommandExecutor, ExecError};
use crate::task::args;

#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("git {operation} failed")]
    Command {
        operation: &'static str,
        source: ExecError,
    },

    #[error("git {operation} returned nothing")]
    EmptyOutput { operation: &'static str },

    #[error("unexpected `git describe` output: {output:?}")]
    Describe { output: String },

    #[error("remote '{url}' is not a GitHub repository")]
    NotGithub { url: String },
}

/// Git queries for one working directory, parameterized over the executor.
pub struct GitRepo<E: CommandExecutor> {
    executor: Arc<E>,
    dir: PathBuf,
}

impl<E: CommandExecutor> GitRepo<E> {
    pub fn new(executor: Arc<E>, dir: impl Into<PathBuf>) -> Self {
        Self {
            executor,
            dir: dir.into(),
        }
    }

    /// Full SHA of `HEAD`.
    pub async fn head_sha(&self) -> Result<String, GitError> {
        self.query("rev-parse", args(["git", "rev-parse", "HEAD"]))
            .await
    }

    /// Current branch name (`HEAD` when detached).
    pub async fn head_branch(&self) -> Result<String, GitError> {
        self.query(
            "rev-parse",
            args(["git", "rev-parse", "--abbrev-ref", "HEAD"]),
        )
        .await
    }

    /// Tag pointing exactly at `HEAD`, or `None` when `HEAD` is untagged.
    pub async fn head_tag(&self) -> Result<Option<String>, GitError> {
        let command = args(["git", "describe", "--tags", "--exact-match", "HEAD"]);
        match self.executor.run_with_output(&command, &self.dir).await {
            Ok(out) => {
                let tag = out.trim();
                Ok((!tag.is_empty()).then(|| tag.to_owned()))
            }
            Err(ExecError::CommandFailed { stderr, .. }) if no_matching_tag(&stderr) => Ok(None),
            Err(e) => Err(GitError::Command {
                operation: "describe",
                source: e,
            }),
        }
    }

    /// Version string for `reference` derived from the nearest `v*` tag.
    ///
    /// See [`version_from_describe`]; a repository without tags resolves to
    /// `0.0.0-<sha>`.
    pub async fn resolve_version(&self, reference: &str) -> Result<String, GitError> {
        let mut rev_parse = args(["git", "rev-parse"]);
        rev_parse.push(reference.to_owned());
        let sha = self.query("rev-parse", rev_parse).await?;

        let mut describe = args(["git", "describe", "--tags", "--long", "--match", "v*"]);
        describe.push(reference.to_owned());
        match self.executor.run_with_output(&describe, &self.dir).await {
            Ok(out) => version_from_describe(out.trim(), &sha).ok_or(GitError::Describe {
                output: out.trim().to_owned(),
            }),
            Err(ExecError::CommandFailed { stderr, .. }) if no_matching_tag(&stderr) => {
                Ok(format!("0.0.0-{sha}"))
            }
            Err(e) => Err(GitError::Command {
                operation: "describe",
                source: e,
            }),
        }
    }

    /// `owner/repo` parsed from the `origin` remote URL.
    pub async fn remote_repository(&self) -> Result<String, GitError> {
        let url = self
            .query("remote", args(["git", "remote", "get-url", "origin"]))
            .await?;
        parse_github_repo(&url).ok_or(GitError::NotGithub { url })
    }

    async fn query(&self, operation: &'static str, command: Vec<String>) -> Result<String, GitError> {
        let out = self
            .executor
            .run_with_output(&command, &self.dir)
            .await
            .map_err(|e| GitError::Command {
                operation,
                source: e,
            })?;
        let out = out.trim();
        if out.is_empty() {
            return Err(GitError::EmptyOutput { operation });
        }
        Ok(out.to_owned())
    }
}

/// `git describe` failed only because no tag applies, as opposed to a
/// broken repository or missing binary.
fn no_matching_tag(stderr: &str) -> bool {
    ["no tag exactly matches", "No names found", "No tags can describe"]
        .iter()
        .any(|marker| stderr.contains(marker))
}

/// Turn `git describe --long` output into a version.
///
/// `v1.2.3-0-gabc1234` (tag at the commit) → `1.2.3`;
/// `v1.2.3-4-gabc1234` (4 commits later) → `1.2.3-<sha>`.
pub fn version_from_describe(describe: &str, sha: &str) -> Option<String> {
    let mut parts = describe.rsplitn(3, '-');
    let hash = parts.next()?;
    let distance: u32 = parts
        .next()?
        .parse()
        // arch-lint: allow(no-silent-result-drop) reason="a non-numeric distance means the input is not describe output"
        .ok()?;
    let tag = parts.next()?;
    if !hash.starts_with('g') || tag.is_empty() {
        return None;
    }

    let version = tag.strip_prefix('v').unwrap_or(tag);
    if distance == 0 {
        Some(version.to_owned())
    } else {
        Some(format!("{version}-{sha}"))
    }
}

/// Parse "owner/repo" from various GitHub URL formats.
pub fn parse_github_repo(url: &str) -> Option<String> {
    // SSH: git@github.com:owner/repo.git
    if let Some(rest) = url.strip_prefix("git@github.com:") {
        let repo = rest.strip_suffix(".git").unwrap_or(rest);
        return Some(repo.to_owned());
    }

    // HTTPS: https://github.com/owner/repo.git
    if let Some(rest) = url
        .strip_prefix("https://github.com/")
        .or_else(|| url.strip_prefix("http://github.com/"))
    {
        let repo = rest.strip_suffix(".git").unwrap_or(rest);
        let repo = repo.strip_suffix('/').unwrap_or(repo);
        return Some(repo.to_owned());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_at_tag_is_plain_version() {
        assert_eq!(
            version_from_describe("v1.2.3-0-gabc1234", "abc1234ffff"),
            Some("1.2.3".to_owned())
        );
    }

    #[test]
    fn describe_after_tag_appends_sha() {
        assert_eq!(
            version_from_describe("v1.2.3-4-gabc1234", "abc1234ffff"),
            Some("1.2.3-abc1234ffff".to_owned())
        );
    }

    #[test]
    fn describe_keeps_prerelease_tags() {
        assert_eq!(
            version_from_describe("v2.0.0-rc.1-0-gdeadbee", "deadbeef"),
            Some("2.0.0-rc.1".to_owned())
        );
    }

    #[test]
    fn describe_rejects_garbage() {
        assert_eq!(version_from_describe("", "x"), None);
        assert_eq!(version_from_describe("v1.2.3", "x"), None);
        assert_eq!(version_from_describe("v1.2.3-x-gabc", "x"), None);
    }

    #[test]
    fn parse_github_repo_ssh() {
        assert_eq!(
            parse_github_repo("git@github.com:acme/widget.git"),
            Some("acme/widget".to_owned())
        );
    }

    #[test]
    fn parse_github_repo_https_trailing_slash() {
        assert_eq!(
            parse_github_repo("https://github.com/owner/repo/"),
            Some("owner/repo".to_owned())
        );
    }

    #[test]
    fn parse_github_repo_non_github() {
        assert_eq!(parse_github_repo("git@gitlab.com:owner/repo.git"), None);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn describe_never_panics(s in "\\PC*") {
                let _ = version_from_describe(&s, "sha");
            }

            #[test]
            fn describe_distance_zero_roundtrip(
                major in 0u32..100, minor in 0u32..100, patch in 0u32..100,
            ) {
                let describe = format!("v{major}.{minor}.{patch}-0-gabcdef0");
                prop_assert_eq!(
                    version_from_describe(&describe, "sha"),
                    Some(format!("{major}.{minor}.{patch}"))
                );
            }

            #[test]
            fn parse_github_repo_https_roundtrip(
                owner in "[a-zA-Z0-9_-]{1,39}",
                repo in "[a-zA-Z0-9._-]{1,100}",
            ) {
                let url = format!("https://github.com/{owner}/{repo}.git");
                prop_assert_eq!(parse_github_repo(&url), Some(format!("{owner}/{repo}")));
            }
        }
    }
}
