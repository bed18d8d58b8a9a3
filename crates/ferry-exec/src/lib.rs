//! External collaborators for ferry: child processes, git, docker, helm and
//! the GitHub REST API.
//!
//! Every process invocation goes through [`CommandExecutor`] so tests can
//! substitute a mock; [`ExecTask`] lifts one invocation into a
//! [`Task`](ferry_core::Task).

pub mod docker;
pub mod executor;
pub mod git;
pub mod github;
pub mod helm;
pub mod redact;
pub mod release;
pub mod task;

pub use executor::{CommandExecutor, ExecError, SystemExecutor};
pub use git::{GitError, GitRepo};
pub use github::{GithubApi, GithubClient, GithubError};
pub use release::{PublishError, PublishReport, ReleaseInfo, ReleasePublisher};
pub use task::ExecTask;
