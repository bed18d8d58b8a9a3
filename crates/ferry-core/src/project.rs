use std::fmt;
use std::path::PathBuf;

use secrecy::SecretString;
use serde::{Serialize, Serializer};

use crate::config::Installation;
use crate::{Error, Result};

/// Commit, branch, tag and resolved version describing one build.
///
/// Serialises with the field names templates refer to: `SHA`, `Branch`,
/// `Tag`, `Version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BuildInfo {
    #[serde(rename = "SHA")]
    pub sha: String,
    pub branch: String,
    /// `None` when HEAD is untagged; templates see an empty string.
    #[serde(serialize_with = "tag_or_empty")]
    pub tag: Option<String>,
    pub version: String,
}

fn tag_or_empty<S: Serializer>(
    tag: &Option<String>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(tag.as_deref().unwrap_or_default())
}

/// Resolved container registry coordinates and credentials.
#[derive(Clone)]
pub struct Registry {
    pub host: String,
    pub organisation: String,
    pub username: Option<String>,
    pub password: Option<SecretString>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("host", &self.host)
            .field("organisation", &self.organisation)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Registry {
    /// Fully qualified image repository: `host/organisation/project`.
    pub fn image(&self, project: &str) -> String {
        format!("{}/{}/{project}", self.host, self.organisation)
    }
}

/// Everything one invocation knows about the project it operates on.
///
/// Constructed once by the CLI and handed to task constructors by
/// reference; never mutated afterwards.
#[derive(Debug, Clone)]
pub struct ProjectInfo {
    pub working_dir: PathBuf,
    pub organisation: String,
    pub project: String,
    pub build: BuildInfo,
    pub registry: Registry,
    pub channels: Vec<String>,
}

impl ProjectInfo {
    /// Validate and assemble project info.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] when the working directory, organisation,
    /// project, commit SHA or version is empty.
    pub fn new(
        working_dir: PathBuf,
        organisation: String,
        project: String,
        build: BuildInfo,
        registry: Registry,
        channels: Vec<String>,
    ) -> Result<Self> {
        if working_dir.as_os_str().is_empty() {
            return Err(missing("working_dir"));
        }
        if organisation.trim().is_empty() {
            return Err(missing("organisation"));
        }
        if project.trim().is_empty() {
            return Err(missing("project"));
        }
        if build.sha.trim().is_empty() {
            return Err(missing("sha"));
        }
        if build.version.trim().is_empty() {
            return Err(missing("version"));
        }

        Ok(Self {
            working_dir,
            organisation,
            project,
            build,
            registry,
            channels,
        })
    }

    /// `organisation/project`, as used in GitHub URLs.
    pub fn repository(&self) -> String {
        format!("{}/{}", self.organisation, self.project)
    }

    /// Image repository for this project in the configured registry.
    pub fn image(&self) -> String {
        self.registry.image(&self.project)
    }

    /// Tags the container image is pushed under: the commit SHA, plus the
    /// git tag when HEAD is tagged.
    pub fn image_tags(&self) -> Vec<String> {
        let mut tags = vec![self.build.sha.clone()];
        if let Some(tag) = &self.build.tag {
            if !tags.contains(tag) {
                tags.push(tag.clone());
            }
        }
        tags
    }

    /// Channels this build's version is published to, one per configured
    /// stability track.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidVersion`] when the version is not semver.
    pub fn release_channels(&self) -> Result<Vec<String>> {
        crate::version::release_channels(&self.build.version, &self.channels)
    }
}

/// Data context for rendering installation-specific manifests.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TemplateConfiguration {
    #[serde(flatten)]
    pub build_info: BuildInfo,
    pub installation: Installation,
}

fn missing(field: &'static str) -> Error {
    Error::Validation {
        field,
        reason: "must not be empty",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build() -> BuildInfo {
        BuildInfo {
            sha: "abc123".to_owned(),
            branch: "main".to_owned(),
            tag: None,
            version: "1.0.0-abc123".to_owned(),
        }
    }

    fn registry() -> Registry {
        Registry {
            host: "quay.io".to_owned(),
            organisation: "acme".to_owned(),
            username: Some("bot".to_owned()),
            password: Some(SecretString::from("hunter2")),
        }
    }

    fn project(working_dir: &str, org: &str, build: BuildInfo) -> Result<ProjectInfo> {
        ProjectInfo::new(
            PathBuf::from(working_dir),
            org.to_owned(),
            "widget".to_owned(),
            build,
            registry(),
            vec![],
        )
    }

    #[test]
    fn new_accepts_complete_info() {
        let info = project(".", "acme", build()).unwrap();
        assert_eq!(info.repository(), "acme/widget");
        assert_eq!(info.image(), "quay.io/acme/widget");
    }

    #[test]
    fn new_rejects_empty_working_dir() {
        let err = project("", "acme", build()).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("working_dir"));
    }

    #[test]
    fn new_rejects_empty_organisation_and_version() {
        assert!(project(".", " ", build()).unwrap_err().is_validation());

        let mut no_version = build();
        no_version.version.clear();
        assert!(project(".", "acme", no_version).unwrap_err().is_validation());
    }

    #[test]
    fn image_tags_include_git_tag() {
        let mut tagged = build();
        tagged.tag = Some("v1.0.0".to_owned());
        let info = project(".", "acme", tagged).unwrap();
        assert_eq!(info.image_tags(), vec!["abc123", "v1.0.0"]);
    }

    #[test]
    fn untagged_build_serialises_empty_tag() {
        let rendered = toml::to_string(&build()).unwrap();
        assert!(rendered.contains("Tag = \"\""), "{rendered}");

        let mut tagged = build();
        tagged.tag = Some("v1.0.0".to_owned());
        let rendered = toml::to_string(&tagged).unwrap();
        assert!(rendered.contains("Tag = \"v1.0.0\""), "{rendered}");
    }

    #[test]
    fn release_channels_follow_configured_stabilities() {
        let mut info = project(".", "acme", build()).unwrap();
        info.channels = vec!["beta".to_owned(), "stable".to_owned()];
        assert_eq!(info.release_channels().unwrap(), vec!["1-0-beta", "1-0-stable"]);

        info.build.version = "latest".to_owned();
        assert!(matches!(
            info.release_channels().unwrap_err(),
            Error::InvalidVersion { .. }
        ));
    }

    #[test]
    fn debug_redacts_registry_password() {
        let rendered = format!("{:?}", registry());
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("hunter2"));
    }
}
