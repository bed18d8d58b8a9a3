mod build;
mod context;
mod deploy;
mod prepare_release;
mod publish;
mod release;
mod template;
mod version;

use ferry_build::template::LEGACY_DOCKER_TAG;
use ferry_build::{Delimiters, TemplateEngine};

pub use build::build;
pub use context::{Context, GlobalArgs};
pub use deploy::deploy;
pub use prepare_release::prepare_release;
pub use publish::publish;
pub use release::release;
pub use template::template;
pub use version::version;

/// Engine for chart manifests: `[[ ]]` placeholders plus the old
/// `%%DOCKER_TAG%%` token, both resolved against the current commit.
pub(crate) fn chart_engine(sha: &str) -> anyhow::Result<TemplateEngine> {
    Ok(TemplateEngine::new(&Delimiters::default())?.with_legacy_token(LEGACY_DOCKER_TAG, sha))
}
