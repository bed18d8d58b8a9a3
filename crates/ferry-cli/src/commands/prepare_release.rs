use ferry_build::Modifier;

use super::Context;

/// Record `version` in the changelog and the version file.
pub async fn prepare_release(ctx: &Context, version: &str) -> anyhow::Result<()> {
    let (organisation, project) = ctx.repository().await?;
    let version = version.strip_prefix('v').unwrap_or(version);

    let modifier = Modifier::new(version, format!("{organisation}/{project}"), &ctx.working_dir)?
        .with_changelog(&ctx.config.release.changelog)
        .with_version_file(&ctx.config.release.version_file);

    modifier.add_release_to_changelog_md()?;

    match modifier.update_version_in_project_go() {
        Ok(()) => {}
        Err(e) if e.is_not_found() => {
            tracing::info!(
                path = %modifier.version_file_path().display(),
                "no version file, skipping"
            );
        }
        Err(e) => return Err(e.into()),
    }

    println!("Prepared release {version}");
    Ok(())
}
