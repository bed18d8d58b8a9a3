//! `docker` command builders for one project's image.

use std::sync::Arc;

use ferry_core::ProjectInfo;
use secrecy::ExposeSecret;

use crate::executor::CommandExecutor;
use crate::task::{ExecTask, args};

#[derive(Debug, thiserror::Error)]
pub enum DockerError {
    #[error("registry {field} not set; pass --registry-{field} or set DOCKER_{env}")]
    MissingCredentials {
        field: &'static str,
        env: &'static str,
    },
}

/// Builds docker tasks for the image described by a [`ProjectInfo`].
pub struct Docker<'a, E: CommandExecutor> {
    executor: Arc<E>,
    info: &'a ProjectInfo,
}

impl<'a, E: CommandExecutor> Docker<'a, E> {
    pub fn new(executor: Arc<E>, info: &'a ProjectInfo) -> Self {
        Self { executor, info }
    }

    /// `image:tag` for this project.
    pub fn image_ref(&self, tag: &str) -> String {
        format!("{}:{tag}", self.info.image())
    }

    /// `docker build` in the working directory, tagged with the commit SHA.
    pub fn build(&self) -> ExecTask<E> {
        let mut command = args(["docker", "build", "--tag"]);
        command.push(self.image_ref(&self.info.build.sha));
        command.push(".".to_owned());
        self.task("docker-build", command)
    }

    /// `docker login` against the configured registry.
    pub fn login(&self) -> Result<ExecTask<E>, DockerError> {
        let registry = &self.info.registry;
        let username = registry
            .username
            .as_deref()
            .ok_or(DockerError::MissingCredentials {
                field: "username",
                env: "USERNAME",
            })?;
        let password = registry
            .password
            .as_ref()
            .ok_or(DockerError::MissingCredentials {
                field: "password",
                env: "PASSWORD",
            })?;

        let mut command = args(["docker", "login"]);
        command.push(format!("--username={username}"));
        command.push(format!("--password={}", password.expose_secret()));
        command.push(registry.host.clone());
        Ok(self.task("docker-login", command))
    }

    /// `docker tag` the SHA-tagged image under another tag.
    pub fn tag(&self, target: &str) -> ExecTask<E> {
        let mut command = args(["docker", "tag"]);
        command.push(self.image_ref(&self.info.build.sha));
        command.push(self.image_ref(target));
        self.task("docker-tag", command)
    }

    /// `docker push image:tag`.
    pub fn push(&self, tag: &str) -> ExecTask<E> {
        let mut command = args(["docker", "push"]);
        command.push(self.image_ref(tag));
        self.task(&format!("docker-push-{tag}"), command)
    }

    fn task(&self, name: &str, command: Vec<String>) -> ExecTask<E> {
        ExecTask::with_executor(
            Arc::clone(&self.executor),
            name,
            command,
            self.info.working_dir.clone(),
        )
    }
}
