use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use ferry_build::template::copy_dir;
use ferry_build::{ChartMetadata, TemplateTask, discover_charts};
use ferry_core::{NoopTask, TemplateConfiguration, Workflow};
use ferry_exec::docker::Docker;

use super::Context;

/// Charts are copied here before templating so the sources stay untouched.
const STAGING_DIR: &str = ".ferry/charts";

/// Template charts, build the image, then lint and package each chart.
pub async fn build(ctx: &Context) -> anyhow::Result<()> {
    let info = ctx.project_info().await?;
    match info.release_channels() {
        Ok(channels) => tracing::info!(version = %info.build.version, ?channels, "building"),
        Err(error) => tracing::warn!(%error, "version has no release channels"),
    }
    let charts = discover_charts(&ctx.path(&ctx.config.release.charts_dir))?;
    let staged = stage_charts(&charts, &ctx.path(STAGING_DIR))?;
    let destination = ctx.path(&ctx.config.release.assets_dir);
    std::fs::create_dir_all(&destination)
        .with_context(|| format!("failed to create {}", destination.display()))?;

    let mut workflow = Workflow::new();

    if !staged.is_empty() {
        let engine = Arc::new(super::chart_engine(&info.build.sha)?);
        let context = TemplateConfiguration {
            build_info: info.build.clone(),
            installation: ctx.config.installation.clone(),
        };
        let dirs = staged.iter().map(|c| c.dir.clone()).collect();
        workflow.push(TemplateTask::new("template-charts", engine, dirs, context));
    }

    if info.working_dir.join("Dockerfile").is_file() {
        workflow.push(Docker::new(Arc::clone(&ctx.executor), &info).build());
    } else {
        workflow.push(NoopTask::new("docker-build"));
    }

    for chart in &staged {
        workflow.push(chart.lint_task(&ctx.executor));
        workflow.push(chart.package_task(&ctx.executor, &destination, &info.build.version));
    }

    for step in workflow.describe() {
        tracing::debug!(%step, "planned");
    }
    workflow.run().await?;

    println!(
        "Built {} at {} ({} chart(s) in {})",
        info.image(),
        info.build.sha,
        staged.len(),
        destination.display()
    );
    Ok(())
}

fn stage_charts(charts: &[ChartMetadata], staging: &Path) -> anyhow::Result<Vec<ChartMetadata>> {
    if staging.exists() {
        std::fs::remove_dir_all(staging)
            .with_context(|| format!("failed to clear {}", staging.display()))?;
    }

    charts
        .iter()
        .map(|chart| -> anyhow::Result<ChartMetadata> {
            let target = staging.join(&chart.name);
            copy_dir(&chart.dir, &target)?;
            Ok(ChartMetadata {
                dir: target,
                ..chart.clone()
            })
        })
        .collect()
}
