use ferry_exec::github::NewDeployment;
use ferry_exec::{GithubApi, GithubClient};
use secrecy::SecretString;

use super::Context;

/// Ask GitHub to deploy the current commit to `environment`.
pub async fn deploy(ctx: &Context, environment: &str, token: SecretString) -> anyhow::Result<()> {
    let (organisation, project) = ctx.repository().await?;
    let build = ctx.build_info().await?;

    let request = NewDeployment {
        reference: build.sha.clone(),
        environment: environment.to_owned(),
        description: format!("ferry deploy of {} ({})", build.version, build.sha),
        auto_merge: false,
        required_contexts: Vec::new(),
    };
    let deployment = GithubClient::new(token)
        .create_deployment(&organisation, &project, &request)
        .await?;

    println!(
        "Created deployment {} of {} to {}",
        deployment.id, deployment.sha, deployment.environment
    );
    Ok(())
}
