use std::path::PathBuf;

use ferry_exec::{GithubClient, ReleaseInfo, ReleasePublisher};
use secrecy::SecretString;

use super::Context;

/// Make sure the GitHub release for the current tag exists and carries
/// every file in the assets directory.
pub async fn release(
    ctx: &Context,
    assets_dir: Option<PathBuf>,
    draft: bool,
    token: SecretString,
) -> anyhow::Result<()> {
    let tag = ctx
        .tag()
        .await?
        .ok_or_else(|| anyhow::anyhow!("release needs a tag; pass --tag or set CIRCLE_TAG"))?;
    let (organisation, project) = ctx.repository().await?;
    let build = ctx.build_info().await?;
    let assets_dir = match assets_dir {
        Some(dir) => ctx.path(dir),
        None => ctx.path(&ctx.config.release.assets_dir),
    };

    let info = ReleaseInfo {
        assets_dir,
        draft,
        organisation,
        project,
        sha: build.sha,
        tag,
    };
    let report = ReleasePublisher::new(GithubClient::new(token))
        .ensure(&info)
        .await?;

    let verb = if report.created { "Created" } else { "Updated" };
    println!("{verb} release {} ({})", info.tag, report.release_id);
    for name in &report.uploaded {
        println!("  uploaded {name}");
    }
    for name in &report.skipped {
        println!("  unchanged {name}");
    }
    Ok(())
}
