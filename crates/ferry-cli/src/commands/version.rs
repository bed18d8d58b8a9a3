use ferry_core::BuildInfo;
use serde::Serialize;

use super::Context;

#[derive(Serialize)]
struct VersionOutput {
    #[serde(flatten)]
    build: BuildInfo,
    #[serde(rename = "Channels", skip_serializing_if = "Option::is_none")]
    channels: Option<Vec<String>>,
}

/// Print the resolved build info, plus release channels when asked.
pub async fn version(ctx: &Context, channels: bool) -> anyhow::Result<()> {
    let output = if channels {
        let info = ctx.project_info().await?;
        VersionOutput {
            channels: Some(info.release_channels()?),
            build: info.build,
        }
    } else {
        VersionOutput {
            build: ctx.build_info().await?,
            channels: None,
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
