use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::Args;
use ferry_core::{BuildInfo, FerryConfig, ProjectInfo, Registry};
use ferry_exec::{GitRepo, SystemExecutor};
use secrecy::SecretString;

/// Flags shared by every subcommand.
///
/// Each one falls back to the CircleCI/Docker environment variable named in
/// its help, then to `ferry.toml`, then to the git repository itself.
#[derive(Debug, Clone, Args)]
pub struct GlobalArgs {
    /// Repository to operate on
    #[arg(long, short = 'd', global = true, default_value = ".")]
    pub working_directory: PathBuf,

    /// GitHub organisation owning the repository
    #[arg(long, global = true, env = "CIRCLE_PROJECT_USERNAME")]
    pub organisation: Option<String>,

    /// Repository name
    #[arg(long, global = true, env = "CIRCLE_PROJECT_REPONAME")]
    pub project: Option<String>,

    /// Commit being built. When given, branch and tag are taken only from
    /// their flags instead of being read from git.
    #[arg(long, global = true, env = "CIRCLE_SHA1")]
    pub sha: Option<String>,

    #[arg(long, global = true, env = "CIRCLE_BRANCH")]
    pub branch: Option<String>,

    #[arg(long, global = true, env = "CIRCLE_TAG")]
    pub tag: Option<String>,

    #[arg(long, global = true, env = "DOCKER_USERNAME")]
    pub registry_username: Option<String>,

    #[arg(long, global = true, env = "DOCKER_PASSWORD", hide_env_values = true)]
    pub registry_password: Option<String>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

/// Everything a command needs, resolved once from flags, environment,
/// `ferry.toml` and git.
pub struct Context {
    pub working_dir: PathBuf,
    pub config: FerryConfig,
    pub executor: Arc<SystemExecutor>,
    args: GlobalArgs,
}

impl Context {
    pub fn load(args: &GlobalArgs) -> anyhow::Result<Self> {
        let working_dir = args.working_directory.clone();
        if !working_dir.is_dir() {
            anyhow::bail!("working directory {} does not exist", working_dir.display());
        }
        let config = FerryConfig::load(&working_dir)?;
        Ok(Self {
            working_dir,
            config,
            executor: Arc::new(SystemExecutor),
            args: args.clone(),
        })
    }

    /// `relative` resolved against the working directory.
    pub fn path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.working_dir.join(relative)
    }

    fn git(&self) -> GitRepo<SystemExecutor> {
        GitRepo::new(Arc::clone(&self.executor), self.working_dir.clone())
    }

    /// `(organisation, project)` for GitHub.
    pub async fn repository(&self) -> anyhow::Result<(String, String)> {
        let organisation = present(&self.args.organisation)
            .or_else(|| self.config.project.organisation.clone());
        let project = present(&self.args.project).or_else(|| self.config.project.name.clone());

        match (organisation, project) {
            (Some(organisation), Some(project)) => Ok((organisation, project)),
            (organisation, project) => {
                let remote = self.git().remote_repository().await.context(
                    "cannot determine the repository; pass --organisation and --project",
                )?;
                let (remote_org, remote_project) = remote
                    .split_once('/')
                    .with_context(|| format!("unexpected repository name {remote}"))?;
                Ok((
                    organisation.unwrap_or_else(|| remote_org.to_owned()),
                    project.unwrap_or_else(|| remote_project.to_owned()),
                ))
            }
        }
    }

    /// Tag for the build: `--tag`, else the tag at `HEAD` unless the commit
    /// was given explicitly.
    pub async fn tag(&self) -> anyhow::Result<Option<String>> {
        if let Some(tag) = present(&self.args.tag) {
            return Ok(Some(tag));
        }
        if present(&self.args.sha).is_some() {
            return Ok(None);
        }
        Ok(self.git().head_tag().await?)
    }

    pub async fn build_info(&self) -> anyhow::Result<BuildInfo> {
        let git = self.git();
        let (sha, branch) = match present(&self.args.sha) {
            Some(sha) => (sha, present(&self.args.branch).unwrap_or_default()),
            None => {
                let sha = git
                    .head_sha()
                    .await
                    .context("cannot determine the commit; pass --sha")?;
                let branch = match present(&self.args.branch) {
                    Some(branch) => branch,
                    None => git.head_branch().await?,
                };
                (sha, branch)
            }
        };
        let tag = self.tag().await?;

        let version = match tag.as_deref().and_then(|t| t.strip_prefix('v')) {
            Some(version) if !version.is_empty() => version.to_owned(),
            _ => git
                .resolve_version(&sha)
                .await
                .context("cannot derive a version; pass --tag")?,
        };

        tracing::debug!(%sha, %branch, ?tag, %version, "resolved build info");
        Ok(BuildInfo {
            sha,
            branch,
            tag,
            version,
        })
    }

    pub async fn project_info(&self) -> anyhow::Result<ProjectInfo> {
        let (organisation, project) = self.repository().await?;
        let build = self.build_info().await?;
        let registry = Registry {
            host: self.config.registry.host.clone(),
            organisation: self
                .config
                .registry
                .organisation
                .clone()
                .unwrap_or_else(|| organisation.clone()),
            username: present(&self.args.registry_username)
                .or_else(|| self.config.registry.username.clone()),
            password: present(&self.args.registry_password).map(SecretString::from),
        };

        Ok(ProjectInfo::new(
            self.working_dir.clone(),
            organisation,
            project,
            build,
            registry,
            self.config.release.channels.clone(),
        )?)
    }
}

/// CI systems export empty variables for unset values.
fn present(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.trim().is_empty()).cloned()
}
