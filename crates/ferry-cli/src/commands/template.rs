use std::path::PathBuf;
use std::sync::Arc;

use ferry_build::TemplateTask;
use ferry_core::{TemplateConfiguration, Workflow};

use super::Context;

/// Render the given paths (or the charts directory) in place.
pub async fn template(ctx: &Context, paths: Vec<PathBuf>) -> anyhow::Result<()> {
    let build = ctx.build_info().await?;
    let paths = if paths.is_empty() {
        vec![ctx.path(&ctx.config.release.charts_dir)]
    } else {
        paths.into_iter().map(|p| ctx.path(p)).collect()
    };

    let engine = Arc::new(super::chart_engine(&build.sha)?);
    let context = TemplateConfiguration {
        build_info: build,
        installation: ctx.config.installation.clone(),
    };

    let mut workflow = Workflow::new();
    workflow.push(TemplateTask::new("template", engine, paths, context));
    workflow.run().await?;
    Ok(())
}
