//! Idempotent GitHub release publishing.
//!
//! Re-running after a partial failure only uploads what is missing: an
//! existing release for the tag is reused, and an asset already uploaded
//! with the same name and size is skipped.

use std::path::{Path, PathBuf};

use crate::github::{GithubApi, GithubError, NewRelease, Release};

/// Identifies one release-publish operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseInfo {
    pub assets_dir: PathBuf,
    pub draft: bool,
    pub organisation: String,
    pub project: String,
    pub sha: String,
    pub tag: String,
}

/// What [`ReleasePublisher::ensure`] did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub release_id: u64,
    pub created: bool,
    pub uploaded: Vec<String>,
    pub skipped: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("failed to read assets directory {path}")]
    ReadAssets {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to read asset {path}")]
    ReadAsset {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to look up release {tag}")]
    Lookup { tag: String, source: GithubError },

    #[error("failed to create release {tag}")]
    Create { tag: String, source: GithubError },

    #[error("failed to upload asset {name}")]
    Upload { name: String, source: GithubError },

    #[error("failed to delete stale asset {name}")]
    DeleteStale { name: String, source: GithubError },
}

/// A regular file in the assets directory.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LocalAsset {
    name: String,
    path: PathBuf,
    size: u64,
}

/// Publishes release assets, parameterized over the API for testability.
pub struct ReleasePublisher<A: GithubApi> {
    api: A,
}

impl<A: GithubApi> ReleasePublisher<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    /// Make sure a release exists for `info.tag` and carries every file in
    /// `info.assets_dir`.
    pub async fn ensure(&self, info: &ReleaseInfo) -> Result<PublishReport, PublishError> {
        let assets = local_assets(&info.assets_dir)?;
        let (release, created) = self.get_or_create(info).await?;

        let mut report = PublishReport {
            release_id: release.id,
            created,
            ..PublishReport::default()
        };

        for asset in assets {
            let remote = release.assets.iter().find(|r| r.name == asset.name);
            if let Some(remote) = remote {
                if remote.size == asset.size && remote.is_uploaded() {
                    tracing::info!(asset = %asset.name, "already uploaded, skipping");
                    report.skipped.push(asset.name);
                    continue;
                }
                tracing::warn!(
                    asset = %asset.name,
                    remote_size = remote.size,
                    local_size = asset.size,
                    state = %remote.state,
                    "replacing stale asset",
                );
                self.api
                    .delete_release_asset(&info.organisation, &info.project, remote.id)
                    .await
                    .map_err(|e| PublishError::DeleteStale {
                        name: asset.name.clone(),
                        source: e,
                    })?;
            }

            let content = std::fs::read(&asset.path).map_err(|e| PublishError::ReadAsset {
                path: asset.path.clone(),
                source: e,
            })?;
            tracing::info!(asset = %asset.name, size = asset.size, "uploading");
            self.api
                .upload_release_asset(
                    &info.organisation,
                    &info.project,
                    release.id,
                    &asset.name,
                    content,
                )
                .await
                .map_err(|e| PublishError::Upload {
                    name: asset.name.clone(),
                    source: e,
                })?;
            report.uploaded.push(asset.name);
        }

        Ok(report)
    }

    async fn get_or_create(&self, info: &ReleaseInfo) -> Result<(Release, bool), PublishError> {
        let existing = self
            .api
            .get_release_by_tag(&info.organisation, &info.project, &info.tag)
            .await
            .map_err(|e| PublishError::Lookup {
                tag: info.tag.clone(),
                source: e,
            })?;
        let existing = match existing {
            Some(release) => Some(release),
            None => self.find_draft(info).await?,
        };
        if let Some(release) = existing {
            tracing::info!(tag = %info.tag, id = release.id, draft = release.draft, "release exists");
            return Ok((release, false));
        }

        let request = NewRelease {
            tag_name: info.tag.clone(),
            target_commitish: info.sha.clone(),
            name: info.tag.clone(),
            draft: info.draft,
        };
        let release = self
            .api
            .create_release(&info.organisation, &info.project, &request)
            .await
            .map_err(|e| PublishError::Create {
                tag: info.tag.clone(),
                source: e,
            })?;
        tracing::info!(tag = %info.tag, id = release.id, draft = info.draft, "created release");
        Ok((release, true))
    }

    /// The by-tag endpoint never returns drafts, so fall back to scanning the
    /// release list for one carrying this tag.
    async fn find_draft(&self, info: &ReleaseInfo) -> Result<Option<Release>, PublishError> {
        let releases = self
            .api
            .list_releases(&info.organisation, &info.project)
            .await
            .map_err(|e| PublishError::Lookup {
                tag: info.tag.clone(),
                source: e,
            })?;
        Ok(releases.into_iter().find(|r| r.tag_name == info.tag))
    }
}

/// Regular files directly inside `dir`, sorted by name. Subdirectories and
/// symlinks are ignored.
fn local_assets(dir: &Path) -> Result<Vec<LocalAsset>, PublishError> {
    let read_err = |e: std::io::Error| PublishError::ReadAssets {
        path: dir.to_path_buf(),
        source: e,
    };

    let mut assets = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let file_type = entry.file_type().map_err(read_err)?;
        if !file_type.is_file() {
            tracing::debug!(path = %entry.path().display(), "not a regular file, skipping");
            continue;
        }
        let size = entry.metadata().map_err(read_err)?.len();
        assets.push(LocalAsset {
            name: entry.file_name().to_string_lossy().into_owned(),
            path: entry.path(),
            size,
        });
    }
    assets.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(assets)
}
