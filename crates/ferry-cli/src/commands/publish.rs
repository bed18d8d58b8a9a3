use std::sync::Arc;

use ferry_core::{ConcurrentTask, ExponentialBackoff, RetryTask, Task, Workflow};
use ferry_exec::docker::Docker;

use super::Context;

/// Log in to the registry, then push every image tag in parallel.
pub async fn publish(ctx: &Context) -> anyhow::Result<()> {
    let info = ctx.project_info().await?;
    let docker = Docker::new(Arc::clone(&ctx.executor), &info);
    let tags = info.image_tags();

    let mut workflow = Workflow::new();
    workflow.push(RetryTask::new(
        Box::new(docker.login()?),
        ExponentialBackoff::default(),
    ));

    let retagging: Vec<Box<dyn Task>> = tags
        .iter()
        .filter(|tag| **tag != info.build.sha)
        .map(|tag| Box::new(docker.tag(tag)) as Box<dyn Task>)
        .collect();
    if !retagging.is_empty() {
        workflow.push(ConcurrentTask::new("docker-tag", retagging));
    }

    let pushes: Vec<Box<dyn Task>> = tags
        .iter()
        .map(|tag| {
            Box::new(RetryTask::new(
                Box::new(docker.push(tag)),
                ExponentialBackoff::default(),
            )) as Box<dyn Task>
        })
        .collect();
    workflow.push(ConcurrentTask::new("docker-push", pushes));

    workflow.run().await?;

    println!("Pushed {} as {}", info.image(), tags.join(", "));
    Ok(())
}
